//! The pixel transform pipeline (§4.9/§5): wires two or three [`IccProfile`]
//! colorimetric models together through a [`CmmBackend`] and pushes whole
//! images through the compiled result, in parallel when asked to.
//!
//! Grounded on `cd-transform.c`'s `CdTransform` (lazy-compiled `cmsHTRANSFORM`
//! cache invalidated by every setter, row-major `cmsDoTransform` loop) with
//! the threading model generalized from a single worker queue to a
//! `rayon` thread pool sized by `max_threads`, matching §5's band-of-rows
//! job description. Compiling the transform runs through its own
//! [`IccContext`], sandwiched by `guard`'s clear-before/check-after
//! contract, the same way every CMM call in the source is.

use crate::cmm::{CmmBackend, ColorModel, CompiledTransform, SoftwareCmm};
use crate::context::IccContext;
use crate::enums::{Colorspace, PixelFormat, RenderingIntent};
use crate::error::TransformError;
use crate::profile::IccProfile;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A cheap, cloneable flag a long-running [`Transform::process`] call can
/// be asked to watch. Matches §5's "advisory, no rollback" cancellation
/// contract: setting it only stops *further* rows/bands from starting,
/// it never undoes work already written to `data_out`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn profile_to_color_model(profile: &IccProfile) -> Result<ColorModel, TransformError> {
    match profile.colorspace {
        Colorspace::Rgb => Ok(ColorModel::Rgb(profile.build_rgb_model()?)),
        Colorspace::Lab => Ok(ColorModel::Lab),
        Colorspace::Gray => Ok(ColorModel::Gray(profile.build_gray_curve()?)),
        other => Err(TransformError::InvalidColorspace(format!("{other} is not a supported transform endpoint"))),
    }
}

fn clamp_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn read_pixel(format: PixelFormat, px: &[u8]) -> [f64; 3] {
    let c = |b: u8| f64::from(b) / 255.0;
    match format {
        PixelFormat::Rgb24 => [c(px[0]), c(px[1]), c(px[2])],
        PixelFormat::Argb32 => [c(px[1]), c(px[2]), c(px[3])],
        PixelFormat::Rgba32 => [c(px[0]), c(px[1]), c(px[2])],
        PixelFormat::Bgra32 => [c(px[2]), c(px[1]), c(px[0])],
        PixelFormat::Cmyk32 => {
            let (cy, m, y, k) = (c(px[0]), c(px[1]), c(px[2]), c(px[3]));
            [(1.0 - cy) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]
        }
        PixelFormat::Unknown => [0.0, 0.0, 0.0],
    }
}

fn write_pixel(format: PixelFormat, rgb: [f64; 3], px: &mut [u8]) {
    let [r, g, b] = [clamp_u8(rgb[0]), clamp_u8(rgb[1]), clamp_u8(rgb[2])];
    match format {
        PixelFormat::Rgb24 => {
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }
        PixelFormat::Argb32 => {
            px[0] = 0xff;
            px[1] = r;
            px[2] = g;
            px[3] = b;
        }
        PixelFormat::Rgba32 => {
            px[0] = r;
            px[1] = g;
            px[2] = b;
            px[3] = 0xff;
        }
        PixelFormat::Bgra32 => {
            px[0] = b;
            px[1] = g;
            px[2] = r;
            px[3] = 0xff;
        }
        PixelFormat::Cmyk32 => {
            let k = 1.0 - rgb[0].max(rgb[1]).max(rgb[2]);
            let denom = (1.0 - k).max(1e-9);
            let cy = (1.0 - rgb[0] - k) / denom;
            let m = (1.0 - rgb[1] - k) / denom;
            let y = (1.0 - rgb[2] - k) / denom;
            px[0] = clamp_u8(cy);
            px[1] = clamp_u8(m);
            px[2] = clamp_u8(y);
            px[3] = clamp_u8(k);
        }
        PixelFormat::Unknown => {}
    }
}

fn process_row(
    compiled: &CompiledTransform,
    in_format: PixelFormat,
    out_format: PixelFormat,
    in_row: &[u8],
    out_row: &mut [u8],
    width: usize,
    bpp_in: usize,
    bpp_out: usize,
) -> Result<(), TransformError> {
    for x in 0..width {
        let in_off = x * bpp_in;
        let in_px = in_row
            .get(in_off..in_off + bpp_in)
            .ok_or_else(|| TransformError::Internal("input row shorter than width*bpp".into()))?;
        let device_out = compiled.convert(read_pixel(in_format, in_px));
        let out_off = x * bpp_out;
        let out_px = out_row
            .get_mut(out_off..out_off + bpp_out)
            .ok_or_else(|| TransformError::Internal("output row shorter than width*bpp".into()))?;
        write_pixel(out_format, device_out, out_px);
    }
    Ok(())
}

/// A configured, lazily-compiled image transform between up to three ICC
/// profiles. Holds strong references to the profiles for its lifetime but
/// does not own their backing storage, matching §4.9's handle semantics.
pub struct Transform {
    cmm: Arc<dyn CmmBackend>,
    context: IccContext,
    input: Option<Arc<IccProfile>>,
    output: Option<Arc<IccProfile>>,
    abstract_profile: Option<Arc<IccProfile>>,
    input_format: Option<PixelFormat>,
    output_format: Option<PixelFormat>,
    intent: RenderingIntent,
    bpc: bool,
    max_threads: usize,
    compiled: Option<Arc<CompiledTransform>>,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(Arc::new(SoftwareCmm))
    }

    /// Builds a transform against a caller-supplied CMM back-end rather
    /// than the default [`SoftwareCmm`], matching the pluggable boundary
    /// `cmm.rs`'s module doc describes.
    #[must_use]
    pub fn with_backend(cmm: Arc<dyn CmmBackend>) -> Self {
        Self {
            cmm,
            context: IccContext::new(),
            input: None,
            output: None,
            abstract_profile: None,
            input_format: None,
            output_format: None,
            intent: RenderingIntent::Unknown,
            bpc: false,
            max_threads: 1,
            compiled: None,
        }
    }

    pub fn set_input(&mut self, profile: Arc<IccProfile>) {
        self.input = Some(profile);
        self.compiled = None;
    }

    pub fn set_output(&mut self, profile: Arc<IccProfile>) {
        self.output = Some(profile);
        self.compiled = None;
    }

    pub fn set_abstract(&mut self, profile: Option<Arc<IccProfile>>) {
        self.abstract_profile = profile;
        self.compiled = None;
    }

    pub fn set_input_pixel_format(&mut self, format: PixelFormat) {
        self.input_format = Some(format);
        self.compiled = None;
    }

    pub fn set_output_pixel_format(&mut self, format: PixelFormat) {
        self.output_format = Some(format);
        self.compiled = None;
    }

    pub fn set_rendering_intent(&mut self, intent: RenderingIntent) {
        self.intent = intent;
        self.compiled = None;
    }

    pub fn set_bpc(&mut self, bpc: bool) {
        self.bpc = bpc;
        self.compiled = None;
    }

    /// `0` means "detect the host's core count", matching §4.9 step 2; the
    /// detection itself happens in [`Self::process`], not here, so a
    /// transform built on one machine and moved to another still picks up
    /// the right count at run time.
    pub fn set_max_threads(&mut self, max_threads: usize) {
        self.max_threads = max_threads;
        self.compiled = None;
    }

    fn endpoint_model(profile: &Option<Arc<IccProfile>>) -> Result<ColorModel, TransformError> {
        match profile {
            Some(p) => profile_to_color_model(p),
            None => Ok(ColorModel::Rgb(crate::cmm::default_srgb_model())),
        }
    }

    fn ensure_compiled(&mut self) -> Result<Arc<CompiledTransform>, TransformError> {
        if let Some(compiled) = &self.compiled {
            return Ok(Arc::clone(compiled));
        }
        if self.intent == RenderingIntent::Unknown {
            return Err(TransformError::FailedToSetupTransform("rendering intent not set".into()));
        }
        if self.input_format.is_none() {
            return Err(TransformError::FailedToSetupTransform("input pixel format not set".into()));
        }
        if self.output_format.is_none() {
            return Err(TransformError::FailedToSetupTransform("output pixel format not set".into()));
        }
        if let Some(ap) = &self.abstract_profile {
            if ap.colorspace != Colorspace::Lab {
                return Err(TransformError::InvalidColorspace("abstract profile must be Lab".into()));
            }
        }

        let input_model = Self::endpoint_model(&self.input)?;
        let output_model = Self::endpoint_model(&self.output)?;
        let abstract_model = match &self.abstract_profile {
            Some(p) => Some(profile_to_color_model(p)?),
            None => None,
        };
        let cmm = Arc::clone(&self.cmm);
        let context = &self.context;
        let (intent, bpc) = (self.intent, self.bpc);
        let compiled = context
            .guard(|| cmm.compile(context, input_model, output_model, abstract_model, intent, bpc))
            .map_err(|e| TransformError::FailedToSetupTransform(e.to_string()))?;
        let compiled = Arc::new(compiled);
        self.compiled = Some(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Converts a whole image from `data_in` to `data_out`, row by row,
    /// through the (lazily built and cached) compiled transform. `stride`
    /// is in pixels, not bytes; rows may be padded beyond `width`.
    ///
    /// Single-threaded (`max_threads == 1`) iterates rows directly.
    /// Multi-threaded splits `height` into `max_threads` horizontal bands
    /// (the last absorbing any remainder) and runs them on a bounded
    /// `rayon` pool; per §5, row order within a band and band independence
    /// make the result identical to the single-threaded path regardless of
    /// scheduling. `cancel` is polled between rows (single-threaded) or
    /// between bands (multi-threaded); a cancelled run leaves the already
    /// written rows in place and returns [`TransformError::UserAbort`].
    pub fn process(
        &mut self,
        data_in: &[u8],
        data_out: &mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        cancel: &CancelToken,
    ) -> Result<(), TransformError> {
        let compiled = self.ensure_compiled()?;
        let in_format = self.input_format.expect("checked by ensure_compiled");
        let out_format = self.output_format.expect("checked by ensure_compiled");
        let bpp_in = in_format.bytes_per_pixel();
        let bpp_out = out_format.bytes_per_pixel();
        let row_bytes_in = stride * bpp_in;
        let row_bytes_out = stride * bpp_out;

        let threads = if self.max_threads == 0 {
            std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
        } else {
            self.max_threads
        };

        if threads <= 1 || height <= 1 {
            for row in 0..height {
                if cancel.is_cancelled() {
                    return Err(TransformError::UserAbort);
                }
                let in_off = row * row_bytes_in;
                let out_off = row * row_bytes_out;
                let in_row = &data_in[in_off..in_off + row_bytes_in];
                let out_row = &mut data_out[out_off..out_off + row_bytes_out];
                process_row(&compiled, in_format, out_format, in_row, out_row, width, bpp_in, bpp_out)?;
            }
            return Ok(());
        }

        let band_size = (height / threads).max(1);
        let mut bands = Vec::new();
        let mut start = 0;
        while start < height {
            let end = if bands.len() + 1 == threads || start + band_size >= height { height } else { start + band_size };
            bands.push((start, end));
            start = end;
        }

        let mut out_remaining = data_out;
        let mut jobs: Vec<((usize, usize), &mut [u8])> = Vec::with_capacity(bands.len());
        for &(band_start, band_end) in &bands {
            let band_bytes = (band_end - band_start) * row_bytes_out;
            let (band, rest) = out_remaining.split_at_mut(band_bytes);
            jobs.push(((band_start, band_end), band));
            out_remaining = rest;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| TransformError::Internal(e.to_string()))?;
        let first_error: Mutex<Option<TransformError>> = Mutex::new(None);

        pool.install(|| {
            jobs.into_par_iter().for_each(|((band_start, band_end), out_band)| {
                if cancel.is_cancelled() {
                    let mut slot = first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(TransformError::UserAbort);
                    }
                    return;
                }
                for row in band_start..band_end {
                    let local = row - band_start;
                    let in_off = row * row_bytes_in;
                    let in_row = &data_in[in_off..in_off + row_bytes_in];
                    let out_off = local * row_bytes_out;
                    let out_row = &mut out_band[out_off..out_off + row_bytes_out];
                    if let Err(e) = process_row(&compiled, in_format, out_format, in_row, out_row, width, bpp_in, bpp_out) {
                        let mut slot = first_error.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                        return;
                    }
                }
            });
        });

        match first_error.into_inner().unwrap() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::IccProfile;

    fn srgb_profile() -> Arc<IccProfile> {
        let mut p = IccProfile::new();
        p.create_default_srgb().unwrap();
        Arc::new(p)
    }

    #[test]
    fn process_requires_rendering_intent() {
        let mut t = Transform::new();
        t.set_input_pixel_format(PixelFormat::Rgb24);
        t.set_output_pixel_format(PixelFormat::Rgb24);
        let mut out = [0u8; 3];
        let err = t.process(&[10, 20, 30], &mut out, 1, 1, 1, &CancelToken::new()).unwrap_err();
        assert_eq!(err, TransformError::FailedToSetupTransform("rendering intent not set".into()));
    }

    #[test]
    fn identity_srgb_round_trip_is_close() {
        let mut t = Transform::new();
        t.set_input(srgb_profile());
        t.set_output(srgb_profile());
        t.set_input_pixel_format(PixelFormat::Rgb24);
        t.set_output_pixel_format(PixelFormat::Rgb24);
        t.set_rendering_intent(RenderingIntent::RelativeColorimetric);
        let data_in = [128u8, 64, 32, 255, 0, 10];
        let mut data_out = [0u8; 6];
        t.process(&data_in, &mut data_out, 2, 1, 2, &CancelToken::new()).unwrap();
        for (a, b) in data_in.iter().zip(data_out.iter()) {
            assert!((i32::from(*a) - i32::from(*b)).abs() <= 2);
        }
    }

    #[test]
    fn multi_threaded_output_matches_single_threaded() {
        let width = 4;
        let height = 9;
        let stride = width;
        let mut data_in = vec![0u8; width * height * 3];
        for (i, b) in data_in.iter_mut().enumerate() {
            *b = (i * 7 % 256) as u8;
        }

        let run = |threads: usize| -> Vec<u8> {
            let mut t = Transform::new();
            t.set_input(srgb_profile());
            t.set_output(srgb_profile());
            t.set_input_pixel_format(PixelFormat::Rgb24);
            t.set_output_pixel_format(PixelFormat::Rgb24);
            t.set_rendering_intent(RenderingIntent::RelativeColorimetric);
            t.set_max_threads(threads);
            let mut data_out = vec![0u8; width * height * 3];
            t.process(&data_in, &mut data_out, width, height, stride, &CancelToken::new()).unwrap();
            data_out
        };

        assert_eq!(run(1), run(4));
    }

    #[test]
    fn cancelled_run_aborts() {
        let mut t = Transform::new();
        t.set_input(srgb_profile());
        t.set_output(srgb_profile());
        t.set_input_pixel_format(PixelFormat::Rgb24);
        t.set_output_pixel_format(PixelFormat::Rgb24);
        t.set_rendering_intent(RenderingIntent::Perceptual);
        let cancel = CancelToken::new();
        cancel.cancel();
        let data_in = vec![0u8; 3 * 4];
        let mut data_out = vec![0u8; 3 * 4];
        let err = t.process(&data_in, &mut data_out, 4, 1, 4, &cancel).unwrap_err();
        assert_eq!(err, TransformError::UserAbort);
    }

    struct FailingCmm;

    impl CmmBackend for FailingCmm {
        fn compile(
            &self,
            ctx: &IccContext,
            _input: ColorModel,
            _output: ColorModel,
            _abstract_model: Option<ColorModel>,
            _intent: RenderingIntent,
            _bpc: bool,
        ) -> Option<CompiledTransform> {
            ctx.set_error(crate::error::IccError::Internal("backend refused".into()));
            None
        }
    }

    #[test]
    fn backend_error_is_latched_through_context_and_surfaced() {
        let mut t = Transform::with_backend(Arc::new(FailingCmm));
        t.set_input_pixel_format(PixelFormat::Rgb24);
        t.set_output_pixel_format(PixelFormat::Rgb24);
        t.set_rendering_intent(RenderingIntent::Perceptual);
        let err = t.process(&[0, 0, 0], &mut [0u8; 3], 1, 1, 1, &CancelToken::new()).unwrap_err();
        assert_eq!(err, TransformError::FailedToSetupTransform("internal error: backend refused".into()));
    }

    #[test]
    fn cmyk_round_trip_is_close_for_neutral() {
        let mut t = Transform::new();
        t.set_input(srgb_profile());
        t.set_output(srgb_profile());
        t.set_input_pixel_format(PixelFormat::Cmyk32);
        t.set_output_pixel_format(PixelFormat::Rgb24);
        t.set_rendering_intent(RenderingIntent::RelativeColorimetric);
        let data_in = [0u8, 0, 0, 64];
        let mut data_out = [0u8; 3];
        t.process(&data_in, &mut data_out, 1, 1, 1, &CancelToken::new()).unwrap();
        assert!(data_out[0] > 150 && data_out[0] == data_out[1] && data_out[1] == data_out[2]);
    }
}
