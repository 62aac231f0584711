//! The closed validation-warning taxonomy (§4.8), grounded directly on
//! `cd-icc.c`'s `cd_icc_check_*` family and `cd_icc_get_warnings`. Each
//! check is a free function over plain values rather than a method on
//! [`super::IccProfile`] so it can be unit-tested without constructing a
//! full profile.

use crate::color::{lab_to_xyz, xyz_to_lab, Lab, Xyz, D50};
use crate::cmm::RgbModel;
use crate::enums::ProfileWarning;
use crate::tonecurve::ToneCurve;
use std::collections::BTreeSet;

const GRAY_ERROR: f64 = 5.0;
const RGB_ERROR: f64 = 0.05;
const ADDITIVE_ERROR: f64 = 0.1;
const WHITE_ERROR: f64 = 0.05;

#[must_use]
pub fn check_whitepoint(temperature_k: u32) -> Option<ProfileWarning> {
    if temperature_k == 0 {
        return None;
    }
    (!(3000..=10000).contains(&temperature_k)).then_some(ProfileWarning::WhitepointUnlikely)
}

/// Samples a VCGT tone-curve triple at 32 equi-spaced points and flags a
/// decrease in any channel between consecutive samples.
#[must_use]
pub fn check_vcgt(vcgt: Option<&[ToneCurve; 3]>) -> Option<ProfileWarning> {
    let curves = vcgt?;
    const SIZE: usize = 32;
    let mut previous = [f64::NEG_INFINITY; 3];
    for i in 0..SIZE {
        let x = i as f64 / (SIZE - 1) as f64;
        let now = [curves[0].eval(x), curves[1].eval(x), curves[2].eval(x)];
        if now.iter().zip(previous.iter()).any(|(n, p)| *n < *p) {
            return Some(ProfileWarning::VcgtNonMonotonic);
        }
        previous = now;
    }
    None
}

/// Lab(100,0,0) run through the profile's relative-colorimetric PCS-to-device
/// direction should land on RGB(255,255,255); if it doesn't, output built
/// from this profile will leave an unprintable "scum dot" in highlights.
#[must_use]
pub fn check_scum_dot(model: &RgbModel) -> Option<ProfileWarning> {
    let xyz = lab_to_xyz(Lab { l: 100.0, a: 0.0, b: 0.0 });
    let rgb = model.from_pcs_xyz(xyz);
    let rgb8 = crate::color::Rgb::new(rgb[0], rgb[1], rgb[2]).to_rgb8();
    (rgb8.r != 255 || rgb8.g != 255 || rgb8.b != 255).then_some(ProfileWarning::ScumDot)
}

/// Runs a 16-step neutral ramp through the profile (display profiles only)
/// and flags a non-neutral result (`|a|`/`|b|` too large) or a non-monotonic
/// lightness progression.
#[must_use]
pub fn check_gray_axis(model: &RgbModel, is_display: bool) -> BTreeSet<ProfileWarning> {
    let mut warnings = BTreeSet::new();
    if !is_display {
        return warnings;
    }
    let labs: Vec<Lab> = (0..16)
        .map(|i| {
            let level = f64::from((255.0 / 15.0 * i as f64) as u8) / 255.0;
            xyz_to_lab(model.to_pcs_xyz([level, level, level]))
        })
        .collect();
    if labs.iter().any(|l| l.a.abs() > GRAY_ERROR || l.b.abs() > GRAY_ERROR) {
        warnings.insert(ProfileWarning::GrayAxisInvalid);
    }
    let mut last: Option<f64> = None;
    for lab in &labs {
        if let Some(prev) = last {
            if lab.l < prev {
                warnings.insert(ProfileWarning::GrayAxisNonMonotonic);
                break;
            }
        }
        last = Some(lab.l);
    }
    warnings
}

/// Colorant tristimulus values outside the ultra-wide-gamut envelope
/// colord calibrated against ProPhoto/CIERGB.
#[must_use]
pub fn check_primaries_invalid(red: Xyz, green: Xyz, blue: Xyz) -> Option<ProfileWarning> {
    let invalid = red.x > 0.85 || red.y < 0.15 || red.z < -0.01
        || green.x < 0.10 || green.y > 0.85 || green.z < -0.01
        || blue.x < 0.01 || blue.y < 0.0 || blue.z > 0.87;
    invalid.then_some(ProfileWarning::PrimariesInvalid)
}

/// Primaries in xy chromaticity outside a tolerance band around Rec.2020-ish
/// bounds — not strictly invalid, just an unusual gamut worth flagging.
#[must_use]
pub fn check_primaries_unlikely(red: Xyz, green: Xyz, blue: Xyz) -> Option<ProfileWarning> {
    let r = red.to_yxy();
    let g = green.to_yxy();
    let b = blue.to_yxy();
    let unlikely = (r.x - 0.735 > RGB_ERROR || 0.265 - r.y > RGB_ERROR)
        || (0.160 - g.x > RGB_ERROR || g.y - 0.840 > RGB_ERROR)
        || (0.037 - b.x > RGB_ERROR || b.y - 0.358 > RGB_ERROR);
    unlikely.then_some(ProfileWarning::PrimariesUnlikely)
}

#[must_use]
pub fn check_whitepoint_invalid(white: Xyz, is_display: bool) -> Option<ProfileWarning> {
    if !is_display {
        return None;
    }
    let off = (white.x - D50.x).abs() > WHITE_ERROR
        || (white.y - D50.y).abs() > WHITE_ERROR
        || (white.z - D50.z).abs() > WHITE_ERROR;
    off.then_some(ProfileWarning::WhitepointInvalid)
}

#[must_use]
pub fn check_primaries_non_additive(red: Xyz, green: Xyz, blue: Xyz, is_display: bool) -> Option<ProfileWarning> {
    if !is_display {
        return None;
    }
    let sum = Xyz::new(red.x + green.x + blue.x, red.y + green.y + blue.y, red.z + green.z + blue.z);
    let off = (sum.x - D50.x).abs() > ADDITIVE_ERROR
        || (sum.y - D50.y).abs() > ADDITIVE_ERROR
        || (sum.z - D50.z).abs() > ADDITIVE_ERROR;
    off.then_some(ProfileWarning::PrimariesNonAdditive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmm::primaries_to_matrix;

    fn srgb_model() -> RgbModel {
        let white = Xyz::new(0.9642, 1.0, 0.8249);
        let matrix = primaries_to_matrix(
            Xyz::new(0.4361, 0.2225, 0.0139),
            Xyz::new(0.3851, 0.7169, 0.0971),
            Xyz::new(0.1431, 0.0606, 0.7139),
            white,
        )
        .unwrap();
        RgbModel { matrix, trc: [ToneCurve::Gamma(2.2), ToneCurve::Gamma(2.2), ToneCurve::Gamma(2.2)], white }
    }

    #[test]
    fn whitepoint_outside_range_is_flagged() {
        assert_eq!(check_whitepoint(2000), Some(ProfileWarning::WhitepointUnlikely));
        assert_eq!(check_whitepoint(6500), None);
        assert_eq!(check_whitepoint(0), None);
    }

    #[test]
    fn monotonic_vcgt_has_no_warning() {
        let curves = [ToneCurve::identity(), ToneCurve::identity(), ToneCurve::identity()];
        assert_eq!(check_vcgt(Some(&curves)), None);
    }

    #[test]
    fn decreasing_vcgt_is_flagged() {
        let down = ToneCurve::Tabulated(vec![65535, 0]);
        let curves = [down.clone(), down.clone(), down];
        assert_eq!(check_vcgt(Some(&curves)), Some(ProfileWarning::VcgtNonMonotonic));
    }

    #[test]
    fn no_vcgt_tag_is_not_a_warning() {
        assert_eq!(check_vcgt(None), None);
    }

    #[test]
    fn srgb_like_model_has_no_scum_dot() {
        assert_eq!(check_scum_dot(&srgb_model()), None);
    }

    #[test]
    fn srgb_primaries_pass_the_hard_box() {
        let red = Xyz::new(0.4361, 0.2225, 0.0139);
        let green = Xyz::new(0.3851, 0.7169, 0.0971);
        let blue = Xyz::new(0.1431, 0.0606, 0.7139);
        assert_eq!(check_primaries_invalid(red, green, blue), None);
    }

    #[test]
    fn degenerate_red_primary_is_invalid() {
        let red = Xyz::new(0.95, 0.05, -0.02);
        let green = Xyz::new(0.3851, 0.7169, 0.0971);
        let blue = Xyz::new(0.1431, 0.0606, 0.7139);
        assert_eq!(check_primaries_invalid(red, green, blue), Some(ProfileWarning::PrimariesInvalid));
    }

    #[test]
    fn additive_primaries_near_d50_pass() {
        let red = Xyz::new(0.4361, 0.2225, 0.0139);
        let green = Xyz::new(0.3851, 0.7169, 0.0971);
        let blue = Xyz::new(0.1431, 0.0606, 0.7139);
        assert_eq!(check_primaries_non_additive(red, green, blue, true), None);
    }

    #[test]
    fn non_additive_primaries_only_flagged_for_display_profiles() {
        let red = Xyz::new(0.1, 0.1, 0.1);
        let green = Xyz::new(0.1, 0.1, 0.1);
        let blue = Xyz::new(0.1, 0.1, 0.1);
        assert_eq!(check_primaries_non_additive(red, green, blue, true), Some(ProfileWarning::PrimariesNonAdditive));
        assert_eq!(check_primaries_non_additive(red, green, blue, false), None);
    }
}
