//! Tone curves: gamma/tabulated/parametric evaluation, VCGT smoothing, and
//! the Rec.709 parametric-curve plug-in registered by `IccContext`.
//!
//! LCMS2's `cmsToneCurve` is an opaque handle; here a tone curve is one of
//! the three representations the ICC `curv`/`para` tag types can hold,
//! evaluated directly in Rust.

use crate::error::IccError;

/// The LCMS2 plug-in function type colord registers for Rec.709, kept as
/// the constant name so the curve math below reads the same as
/// `cd-context-lcms.c`'s `LCMS_CURVE_PLUGIN_TYPE_REC709`.
pub const REC709_CURVE_TYPE: i32 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ToneCurve {
    /// A pure power-law gamma curve, `y = x^gamma`.
    Gamma(f64),
    /// A 16-bit lookup table sampled uniformly over `[0, 1]`.
    Tabulated(Vec<u16>),
    /// A parametric curve per ICC `para` function types, or the Rec.709
    /// extension (`REC709_CURVE_TYPE`, negated for the reverse direction).
    Parametric { function_type: i32, params: [f64; 5] },
}

impl ToneCurve {
    #[must_use]
    pub fn identity() -> Self {
        Self::Gamma(1.0)
    }

    #[must_use]
    pub fn rec709(gamma: f64) -> Self {
        // colord's plug-in parameter layout: (gamma, a, b, c, d) derived
        // from the BT.709 transfer function constants.
        let alpha: f64 = 1.099;
        let beta = 0.018;
        let params = [gamma, alpha.powf(gamma).recip() * alpha, 1.0 - alpha, 4.5, beta];
        Self::Parametric { function_type: REC709_CURVE_TYPE, params }
    }

    /// Evaluates the curve forward at `x` in `[0, 1]`.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Self::Gamma(g) => x.max(0.0).powf(*g),
            Self::Tabulated(table) => eval_tabulated(table, x),
            Self::Parametric { function_type, params } => eval_parametric(*function_type, params, x),
        }
    }

    /// Evaluates the inverse curve at `x` in `[0, 1]`.
    #[must_use]
    pub fn eval_inverse(&self, x: f64) -> f64 {
        match self {
            Self::Gamma(g) if *g != 0.0 => x.max(0.0).powf(1.0 / g),
            Self::Gamma(_) => 0.0,
            Self::Tabulated(table) => eval_tabulated_inverse(table, x),
            Self::Parametric { function_type, params } => eval_parametric(-function_type, params, x),
        }
    }

    /// Builds a tabulated curve from equi-spaced `[0, 1]` samples, scaled
    /// to 16 bits.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        Self::Tabulated(samples.iter().map(|&s| (s.clamp(0.0, 1.0) * 65535.0).round() as u16).collect())
    }

    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        match self {
            Self::Gamma(_) | Self::Parametric { .. } => true,
            Self::Tabulated(t) => t.windows(2).all(|w| w[0] <= w[1]),
        }
    }
}

fn eval_tabulated(table: &[u16], x: f64) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    if table.len() == 1 {
        // Single-entry table encodes a gamma value, per the `curv` tag spec.
        let gamma = f64::from(table[0]) / 256.0;
        return x.max(0.0).powf(gamma);
    }
    let pos = x.clamp(0.0, 1.0) * (table.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(table.len() - 1);
    let frac = pos - lo as f64;
    let value = f64::from(table[lo]) * (1.0 - frac) + f64::from(table[hi]) * frac;
    value / 65535.0
}

fn eval_tabulated_inverse(table: &[u16], y: f64) -> f64 {
    if table.len() < 2 {
        return eval_tabulated(table, y);
    }
    let target = y.clamp(0.0, 1.0) * 65535.0;
    let idx = table.partition_point(|&v| f64::from(v) < target);
    if idx == 0 {
        return 0.0;
    }
    if idx >= table.len() {
        return 1.0;
    }
    let (lo_v, hi_v) = (f64::from(table[idx - 1]), f64::from(table[idx]));
    let frac = if hi_v > lo_v { (target - lo_v) / (hi_v - lo_v) } else { 0.0 };
    (idx as f64 - 1.0 + frac) / (table.len() - 1) as f64
}

/// Rec.709 parametric curve (±1024) and the standard ICC `para` function
/// types (0-4), per `cd_context_lcms_plugins_cb` for the Rec.709 case.
fn eval_parametric(function_type: i32, p: &[f64; 5], x: f64) -> f64 {
    match function_type {
        REC709_CURVE_TYPE => {
            if x <= p[3] * p[4] {
                x / p[3]
            } else {
                ((x + p[2]) / p[1]).powf(p[0])
            }
        }
        t if t == -REC709_CURVE_TYPE => {
            if x < p[4] {
                x * p[3]
            } else {
                p[1] * x.powf(1.0 / p[0]) + p[2]
            }
        }
        0 => x.max(0.0).powf(p[0]),
        1 => {
            if x >= -p[2] / p[1] {
                (p[1] * x + p[2]).max(0.0).powf(p[0])
            } else {
                0.0
            }
        }
        -1 => (x.max(0.0).powf(1.0 / p[0]) - p[2]) / p[1],
        _ => x,
    }
}

/// Smooths a 16-bit tabulated curve with a 5-tap box filter, used when
/// writing `vcgt` so that noisy hardware samples don't round-trip as a
/// non-monotonic curve.
#[must_use]
pub fn smooth_5tap(table: &[u16]) -> Vec<u16> {
    if table.len() < 5 {
        return table.to_vec();
    }
    let weights = [1.0, 4.0, 6.0, 4.0, 1.0];
    let sum: f64 = weights.iter().sum();
    (0..table.len())
        .map(|i| {
            let mut acc = 0.0;
            for (k, w) in weights.iter().enumerate() {
                let offset = k as isize - 2;
                let idx = (i as isize + offset).clamp(0, table.len() as isize - 1) as usize;
                acc += f64::from(table[idx]) * w;
            }
            (acc / sum).round().clamp(0.0, 65535.0) as u16
        })
        .collect()
}

const CURV_SIGNATURE: [u8; 4] = *b"curv";
const PARA_SIGNATURE: [u8; 4] = *b"para";

impl ToneCurve {
    /// Encodes as a `curveType` (`curv`) tag: a one-entry table for a pure
    /// gamma curve (the ICC `curv` convention for an implicit power-law
    /// curve), or the full table otherwise.
    #[must_use]
    pub fn encode_curv_tag(&self) -> Vec<u8> {
        let table: Vec<u16> = match self {
            Self::Gamma(g) => vec![(g * 256.0).round().clamp(0.0, 65535.0) as u16],
            Self::Tabulated(t) => t.clone(),
            Self::Parametric { .. } => return self.encode_para_tag(),
        };
        let mut out = Vec::with_capacity(12 + table.len() * 2);
        out.extend_from_slice(&CURV_SIGNATURE);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&(table.len() as u32).to_be_bytes());
        for v in table {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    /// Encodes a parametric curve as a `parametricCurveType` (`para`) tag.
    /// Unlike the standard ICC layout (whose parameter count varies 1-7 by
    /// function type), this always carries the full 5-element vector so the
    /// Rec.709 plug-in curve round-trips losslessly; the function type is
    /// stored as a full 4-byte signed integer rather than the standard
    /// 2-byte code for the same reason.
    #[must_use]
    pub fn encode_para_tag(&self) -> Vec<u8> {
        let Self::Parametric { function_type, params } = self else {
            return self.encode_curv_tag();
        };
        let mut out = Vec::with_capacity(12 + 4 + params.len() * 4);
        out.extend_from_slice(&PARA_SIGNATURE);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&function_type.to_be_bytes());
        for p in params {
            out.extend_from_slice(&((p * 65536.0).round() as i32).to_be_bytes());
        }
        out
    }

    /// Decodes a `curv` or `para` tag payload.
    pub fn decode_tag(bytes: &[u8]) -> Result<Self, IccError> {
        if bytes.len() < 12 {
            return Err(IccError::CorruptionDetected("tone curve tag truncated".into()));
        }
        match bytes[0..4].try_into().unwrap() {
            CURV_SIGNATURE => {
                let count = u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize;
                if count == 0 {
                    return Ok(Self::identity());
                }
                let table: Vec<u16> = bytes[12..]
                    .chunks_exact(2)
                    .take(count)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                if table.len() == 1 {
                    Ok(Self::Gamma(f64::from(table[0]) / 256.0))
                } else {
                    Ok(Self::Tabulated(table))
                }
            }
            PARA_SIGNATURE => {
                if bytes.len() < 12 + 4 + 20 {
                    return Err(IccError::CorruptionDetected("para tag truncated".into()));
                }
                let function_type = i32::from_be_bytes(bytes[12..16].try_into().unwrap());
                let mut params = [0.0; 5];
                for (i, p) in params.iter_mut().enumerate() {
                    let off = 16 + i * 4;
                    let raw = i32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
                    *p = f64::from(raw) / 65536.0;
                }
                Ok(Self::Parametric { function_type, params })
            }
            _ => Err(IccError::FailedToParse("not a curv/para tag".into())),
        }
    }
}

/// Builds three VCGT tone curves (one per channel) from equi-spaced `[0,1]`
/// points, scaling by `0xFFFF` and smoothing with [`smooth_5tap`].
pub fn build_vcgt(points: &[[f64; 3]]) -> Result<[ToneCurve; 3], IccError> {
    if points.is_empty() {
        return Err(IccError::NoData("no vcgt points supplied".into()));
    }
    let mut channels: [Vec<u16>; 3] = Default::default();
    for p in points {
        for (c, v) in channels.iter_mut().zip(p.iter()) {
            c.push((v.clamp(0.0, 1.0) * 65535.0).round() as u16);
        }
    }
    Ok([
        ToneCurve::Tabulated(smooth_5tap(&channels[0])),
        ToneCurve::Tabulated(smooth_5tap(&channels[1])),
        ToneCurve::Tabulated(smooth_5tap(&channels[2])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamma_round_trips() {
        let curve = ToneCurve::Gamma(2.2);
        let x = 0.5;
        let y = curve.eval(x);
        assert!((curve.eval_inverse(y) - x).abs() < 1e-9);
    }

    #[test]
    fn rec709_forward_matches_piecewise_definition() {
        let curve = ToneCurve::rec709(1.0 / 0.45);
        let ToneCurve::Parametric { params, .. } = &curve else { unreachable!() };
        let below = params[3] * params[4] / 2.0;
        assert_eq!(curve.eval(below), below / params[3]);
    }

    #[test]
    fn tabulated_monotonic_ramp_round_trips_monotonic() {
        let samples: Vec<f64> = (0..=255).map(|i| f64::from(i) / 255.0).collect();
        let curve = ToneCurve::from_samples(&samples);
        assert!(curve.is_monotonic());
    }

    #[test]
    fn smoothing_preserves_monotonic_ramp() {
        let table: Vec<u16> = (0..256).map(|i| (i * 256) as u16).collect();
        let smoothed = smooth_5tap(&table);
        assert!(smoothed.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn build_vcgt_rejects_empty() {
        assert!(build_vcgt(&[]).is_err());
    }

    #[test]
    fn gamma_curv_tag_round_trips() {
        let curve = ToneCurve::Gamma(2.2);
        let ToneCurve::Gamma(back) = ToneCurve::decode_tag(&curve.encode_curv_tag()).unwrap() else { unreachable!() };
        assert!((back - 2.2).abs() < 0.01);
    }

    #[test]
    fn tabulated_curv_tag_round_trips() {
        let curve = ToneCurve::Tabulated(vec![0, 100, 200, 65535]);
        let back = ToneCurve::decode_tag(&curve.encode_curv_tag()).unwrap();
        assert_eq!(back, curve);
    }

    #[test]
    fn parametric_para_tag_round_trips() {
        let curve = ToneCurve::rec709(1.0 / 0.45);
        let back = ToneCurve::decode_tag(&curve.encode_para_tag()).unwrap();
        let ToneCurve::Parametric { function_type, params } = back else { unreachable!() };
        let ToneCurve::Parametric { function_type: orig_type, params: orig_params } = curve else { unreachable!() };
        assert_eq!(function_type, orig_type);
        for (p, o) in params.iter().zip(orig_params.iter()) {
            assert!((p - o).abs() < 1e-4);
        }
    }
}
