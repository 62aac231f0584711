//! The ICC profile object: the central entity this crate models.
//!
//! LCMS2's opaque `cmsHPROFILE` is wrapped behind a thin Rust type there;
//! here the profile is the thing itself, grounded directly on colord's
//! `CdIcc` (`cd-icc.c`) lifecycle and tag surface, reading/writing the
//! binary layout [`io`] defines and surfacing the closed validation
//! taxonomy in [`warnings`].

pub mod edid;
pub mod io;
pub mod warnings;

use crate::cmm::{bradford_adapt, identity3, mat_mul, primaries_to_matrix, Matrix3, RgbModel};
use crate::color::{Rgb, Swatch, Xyz, Yxy, D50};
use crate::context::IccContext;
use crate::enums::{Colorspace, ProfileKind, ProfileWarning, RenderingIntent};
use crate::error::IccError;
use crate::flags::LoadFlags;
use crate::locale::Locale;
use crate::mlu::{LocalizedText, Mlu};
use crate::namedcolorlist;
use crate::tag::{TagSignature, TagTable};
use crate::tonecurve::{self, ToneCurve};
use edid::EdidInfo;
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// An externally-allocated byte image adopted by [`IccProfile::load_handle`],
/// carrying the id of the context it was created under.
#[derive(Debug, Clone)]
pub struct ProfileHandle {
    pub context_id: u64,
    pub bytes: Vec<u8>,
}

impl ProfileHandle {
    #[must_use]
    pub fn new(context_id: u64, bytes: Vec<u8>) -> Self {
        Self { context_id, bytes }
    }
}

/// A typed, in-memory ICC v2/v4 profile.
#[derive(Debug)]
pub struct IccProfile {
    context: IccContext,
    loaded: bool,
    pub kind: ProfileKind,
    pub colorspace: Colorspace,
    pcs: Colorspace,
    pub version: f64,
    size_bytes: usize,
    checksum: Option<String>,
    filename: Option<PathBuf>,
    can_delete: bool,
    created: Option<u64>,
    characterization_data: Option<String>,
    pub red: Xyz,
    pub green: Xyz,
    pub blue: Xyz,
    pub white: Xyz,
    pub temperature_k: u32,
    text: LocalizedText,
    metadata: Vec<(String, String)>,
    named_colors: Vec<Swatch>,
    tags: TagTable,
    vcgt: Option<[ToneCurve; 3]>,
    header_rendering_intent: RenderingIntent,
    attributes: io::DeviceAttributes,
}

impl IccProfile {
    /// Creates an empty profile bound to a fresh CMM context. An opaque CMM
    /// profile is conceptually allocated here; populate it with one of the
    /// `load_*`/`create_*` methods, each of which may run at most once.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: IccContext::new(),
            loaded: false,
            kind: ProfileKind::Unknown,
            colorspace: Colorspace::Unknown,
            pcs: Colorspace::Xyz,
            version: 0.0,
            size_bytes: 0,
            checksum: None,
            filename: None,
            can_delete: true,
            created: None,
            characterization_data: None,
            red: Xyz::default(),
            green: Xyz::default(),
            blue: Xyz::default(),
            white: Xyz::default(),
            temperature_k: 0,
            text: LocalizedText::default(),
            metadata: Vec::new(),
            named_colors: Vec::new(),
            tags: TagTable::new(),
            vcgt: None,
            header_rendering_intent: RenderingIntent::Unknown,
            attributes: io::DeviceAttributes::default(),
        }
    }

    #[must_use]
    pub fn context_id(&self) -> u64 {
        self.context.id()
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    #[must_use]
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    #[must_use]
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    #[must_use]
    pub fn can_delete(&self) -> bool {
        self.can_delete
    }

    #[must_use]
    pub fn created(&self) -> Option<u64> {
        self.created
    }

    #[must_use]
    pub fn characterization_data(&self) -> Option<&str> {
        self.characterization_data.as_deref()
    }

    pub fn set_characterization_data(&mut self, data: Option<String>) {
        self.characterization_data = data;
    }

    #[must_use]
    pub fn named_colors(&self) -> &[Swatch] {
        &self.named_colors
    }

    pub fn set_named_colors(&mut self, swatches: Vec<Swatch>) {
        self.named_colors = swatches;
    }

    #[must_use]
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.metadata.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.metadata.push((key, value)),
        }
    }

    pub fn remove_metadata(&mut self, key: &str) {
        self.metadata.retain(|(k, _)| k != key);
    }

    // -- localized text -----------------------------------------------

    pub fn description(&self, locale: &str) -> Result<String, IccError> {
        Self::lookup_text(&self.text.description, locale)
    }

    pub fn set_description(&mut self, locale: &str, text: impl Into<String>) -> Result<(), IccError> {
        self.text.description.set(Locale::normalize(locale)?, text);
        Ok(())
    }

    pub fn copyright(&self, locale: &str) -> Result<String, IccError> {
        Self::lookup_text(&self.text.copyright, locale)
    }

    pub fn set_copyright(&mut self, locale: &str, text: impl Into<String>) -> Result<(), IccError> {
        self.text.copyright.set(Locale::normalize(locale)?, text);
        Ok(())
    }

    pub fn manufacturer(&self, locale: &str) -> Result<String, IccError> {
        Self::lookup_text(&self.text.manufacturer, locale)
    }

    pub fn set_manufacturer(&mut self, locale: &str, text: impl Into<String>) -> Result<(), IccError> {
        self.text.manufacturer.set(Locale::normalize(locale)?, text);
        Ok(())
    }

    pub fn model_name(&self, locale: &str) -> Result<String, IccError> {
        Self::lookup_text(&self.text.model, locale)
    }

    pub fn set_model_name(&mut self, locale: &str, text: impl Into<String>) -> Result<(), IccError> {
        self.text.model.set(Locale::normalize(locale)?, text);
        Ok(())
    }

    /// Normalizes the requested locale, then falls back to the default
    /// entry when no exact key matches, per §4.3.
    fn lookup_text(mlu: &Mlu, locale: &str) -> Result<String, IccError> {
        let loc = Locale::normalize(locale)?;
        Ok(mlu.get(&loc).or_else(|| mlu.get(&Locale::default_locale())).unwrap_or("").to_owned())
    }

    // -- tag surface ----------------------------------------------------

    #[must_use]
    pub fn get_tags(&self) -> Vec<String> {
        self.tags.signatures().into_iter().map(TagSignature::to_fourcc).collect()
    }

    pub fn get_tag_data(&self, tag: &str) -> Result<Vec<u8>, IccError> {
        let sig = TagSignature::from_fourcc(tag)?;
        self.tags.get_or_no_data(sig).map(<[u8]>::to_vec)
    }

    /// Deletes any existing entry for `tag`, then writes `data` if present —
    /// the two-step form the underlying CMM's "won't overwrite a structured
    /// tag with raw bytes" limitation requires.
    pub fn set_tag_data(&mut self, tag: &str, data: Option<Vec<u8>>) -> Result<(), IccError> {
        let sig = TagSignature::from_fourcc(tag)?;
        self.tags.remove(sig);
        if let Some(bytes) = data {
            self.tags.set(sig, bytes)?;
        }
        Ok(())
    }

    // -- loading ----------------------------------------------------------

    pub fn load_bytes(&mut self, data: &[u8], flags: LoadFlags) -> Result<(), IccError> {
        if self.loaded {
            return Err(IccError::FailedToCreate("profile already populated".into()));
        }
        let (header, tags) = io::parse(data)?;
        self.version = header.version;
        self.kind = header.kind;
        self.colorspace = header.colorspace;
        self.pcs = header.pcs;
        self.created = header.created_epoch_secs;
        self.attributes = header.attributes;
        self.header_rendering_intent = header.rendering_intent;
        self.tags = tags;
        self.size_bytes = data.len();

        if flags.contains(LoadFlags::METADATA) {
            if let Some(raw) = self.tags.get(TagSignature::METADATA) {
                self.metadata = decode_metadata(raw)?;
            }
        }

        if let Some(id) = header.profile_id {
            self.checksum = Some(io::hex_id(id));
        } else if flags.contains(LoadFlags::FALLBACK_MD5) {
            self.checksum = Some(io::hex_id(io::md5_of(data)));
        }

        self.load_default_text()?;

        if flags.contains(LoadFlags::NAMED_COLORS) {
            if let Some(raw) = self.tags.get(TagSignature::NAMED_COLOR2) {
                self.named_colors = namedcolorlist::decode(raw)?;
            }
        }

        if let Some(raw) = self.tags.get(TagSignature::VCGT) {
            self.vcgt = decode_vcgt_tag(raw).ok();
        }

        if flags.contains(LoadFlags::PRIMARIES) && self.colorspace == Colorspace::Rgb {
            self.load_primaries()?;
        }

        if flags.contains(LoadFlags::CHARACTERIZATION) {
            if let Some(raw) = self.tags.get(TagSignature::CHAR_TARGET) {
                let text = String::from_utf8(raw.to_vec())
                    .map_err(|_| IccError::CorruptionDetected("targ tag is not valid ASCII/UTF-8".into()))?;
                self.characterization_data = Some(text);
            }
        }

        self.loaded = true;
        Ok(())
    }

    fn load_default_text(&mut self) -> Result<(), IccError> {
        if let Some(raw) = self
            .tags
            .get(TagSignature::PROFILE_DESCRIPTION_ML)
            .or_else(|| self.tags.get(TagSignature::PROFILE_DESCRIPTION))
        {
            self.text.description = decode_any_text(raw)?;
        }
        if let Some(raw) = self.tags.get(TagSignature::COPYRIGHT) {
            self.text.copyright = decode_any_text(raw)?;
        }
        if let Some(raw) = self.tags.get(TagSignature::DEVICE_MFG_DESC) {
            self.text.manufacturer = decode_any_text(raw)?;
        }
        if let Some(raw) = self.tags.get(TagSignature::DEVICE_MODEL_DESC) {
            self.text.model = decode_any_text(raw)?;
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path, flags: LoadFlags) -> Result<(), IccError> {
        let data = fs::read(path).map_err(|e| IccError::FailedToOpen(e.to_string()))?;
        self.load_bytes(&data, flags)?;
        self.filename = Some(path.to_path_buf());
        self.can_delete = fs::metadata(path).map(|m| !m.permissions().readonly()).unwrap_or(false);
        Ok(())
    }

    pub fn load_fd<R: Read>(&mut self, reader: &mut R, flags: LoadFlags) -> Result<(), IccError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(|e| IccError::FailedToOpen(e.to_string()))?;
        self.load_bytes(&data, flags)
    }

    /// Adopts an externally-created byte image; the handle must have been
    /// minted under this profile's own context.
    pub fn load_handle(&mut self, handle: ProfileHandle, flags: LoadFlags) -> Result<(), IccError> {
        if handle.context_id != self.context.id() {
            return Err(IccError::FailedToCreate("handle was allocated under a different context".into()));
        }
        self.load_bytes(&handle.bytes, flags)
    }

    // -- primaries --------------------------------------------------------

    /// Builds the matrix/shaper colorimetric model this profile's RGB tags
    /// describe. When `rXYZ`/`gXYZ`/`bXYZ` colorant tags are present they
    /// are already PCS(D50)-relative, so the model's own white is pinned to
    /// D50 — making the Bradford step in [`RgbModel::to_pcs_xyz`] a no-op
    /// rather than double-adapting already-adapted data.
    pub fn build_rgb_model(&self) -> Result<RgbModel, IccError> {
        if self.colorspace != Colorspace::Rgb {
            return Err(IccError::InvalidColorspace("profile is not RGB".into()));
        }
        let red_trc = ToneCurve::decode_tag(self.tags.get_or_no_data(TagSignature::RED_TRC)?)?;
        let green_trc = ToneCurve::decode_tag(self.tags.get_or_no_data(TagSignature::GREEN_TRC)?)?;
        let blue_trc = ToneCurve::decode_tag(self.tags.get_or_no_data(TagSignature::BLUE_TRC)?)?;

        if self.tags.contains(TagSignature::RED_COLORANT) {
            let red = io::decode_xyz_tag(self.tags.get_or_no_data(TagSignature::RED_COLORANT)?)?;
            let green = io::decode_xyz_tag(self.tags.get_or_no_data(TagSignature::GREEN_COLORANT)?)?;
            let blue = io::decode_xyz_tag(self.tags.get_or_no_data(TagSignature::BLUE_COLORANT)?)?;
            let matrix: Matrix3 = [[red.x, green.x, blue.x], [red.y, green.y, blue.y], [red.z, green.z, blue.z]];
            Ok(RgbModel { matrix, trc: [red_trc, green_trc, blue_trc], white: D50 })
        } else {
            // No matrix-column tags: a general CLUT profile, out of scope
            // for the matrix/shaper CMM back-end (see `cmm.rs`'s module
            // doc). Approximate with an identity matrix relative to
            // whatever native white is already on record.
            let white = if self.white != Xyz::default() { self.white } else { D50 };
            Ok(RgbModel { matrix: identity3(), trc: [red_trc, green_trc, blue_trc], white })
        }
    }

    /// The single tone curve a gray-colorspace profile's `kTRC` tag
    /// describes, used by [`crate::transform::Transform`] to build a
    /// gray colorimetric model without reaching into private tag storage.
    pub fn build_gray_curve(&self) -> Result<ToneCurve, IccError> {
        if self.colorspace != Colorspace::Gray {
            return Err(IccError::InvalidColorspace("profile is not gray".into()));
        }
        ToneCurve::decode_tag(self.tags.get_or_no_data(TagSignature::GRAY_TRC)?)
    }

    fn load_primaries(&mut self) -> Result<(), IccError> {
        let model = self.build_rgb_model()?;
        let white = model.to_native_xyz([1.0, 1.0, 1.0]);
        self.white = white;

        let cct = crate::color::correlated_color_temperature(white);
        self.temperature_k = if cct > 0.0 { (cct / 100.0).floor() as u32 * 100 } else { 0 };

        if self.tags.contains(TagSignature::RED_COLORANT) {
            self.red = io::decode_xyz_tag(self.tags.get_or_no_data(TagSignature::RED_COLORANT)?)?;
            self.green = io::decode_xyz_tag(self.tags.get_or_no_data(TagSignature::GREEN_COLORANT)?)?;
            self.blue = io::decode_xyz_tag(self.tags.get_or_no_data(TagSignature::BLUE_COLORANT)?)?;
        } else {
            self.red = model.to_native_xyz([1.0, 0.0, 0.0]);
            self.green = model.to_native_xyz([0.0, 1.0, 0.0]);
            self.blue = model.to_native_xyz([0.0, 0.0, 1.0]);
        }
        Ok(())
    }

    // -- creation helpers --------------------------------------------------

    /// Builds a matrix/shaper RGB profile from chromaticity primaries and a
    /// uniform gamma, storing colorant tags already adapted to the D50 PCS
    /// (the standard ICC matrix/TRC convention) rather than the device's
    /// native white, and sets the device class to display.
    pub fn create_from_edid(&mut self, gamma: f64, red: Yxy, green: Yxy, blue: Yxy, white: Yxy) -> Result<(), IccError> {
        if self.loaded {
            return Err(IccError::FailedToCreate("profile already populated".into()));
        }
        let red_xyz = red.to_xyz();
        let green_xyz = green.to_xyz();
        let blue_xyz = blue.to_xyz();
        let white_xyz = white.to_xyz();

        let matrix_native = primaries_to_matrix(red_xyz, green_xyz, blue_xyz, white_xyz)
            .ok_or_else(|| IccError::FailedToCreate("degenerate primaries".into()))?;
        let adapt = bradford_adapt(white_xyz, D50);
        let matrix_d50 = mat_mul(&adapt, &matrix_native);
        let red_d50 = Xyz::new(matrix_d50[0][0], matrix_d50[1][0], matrix_d50[2][0]);
        let green_d50 = Xyz::new(matrix_d50[0][1], matrix_d50[1][1], matrix_d50[2][1]);
        let blue_d50 = Xyz::new(matrix_d50[0][2], matrix_d50[1][2], matrix_d50[2][2]);

        self.tags.set(TagSignature::RED_COLORANT, io::encode_xyz_tag(red_d50))?;
        self.tags.set(TagSignature::GREEN_COLORANT, io::encode_xyz_tag(green_d50))?;
        self.tags.set(TagSignature::BLUE_COLORANT, io::encode_xyz_tag(blue_d50))?;
        self.tags.set(TagSignature::MEDIA_WHITE_POINT, io::encode_xyz_tag(white_xyz))?;

        let curve = ToneCurve::Gamma(gamma);
        self.tags.set(TagSignature::RED_TRC, curve.encode_curv_tag())?;
        self.tags.set(TagSignature::GREEN_TRC, curve.encode_curv_tag())?;
        self.tags.set(TagSignature::BLUE_TRC, curve.encode_curv_tag())?;

        self.colorspace = Colorspace::Rgb;
        self.kind = ProfileKind::DisplayDevice;
        self.header_rendering_intent = RenderingIntent::Perceptual;
        self.version = 4.3;
        self.loaded = true;

        self.load_primaries()?;
        self.set_metadata("DATA_source", "edid");
        Ok(())
    }

    /// Builds a default sRGB profile (IEC 61966-2-1 chromaticities, a plain
    /// 2.2 power-law curve rather than the piecewise sRGB transfer
    /// function) via [`create_from_edid`](Self::create_from_edid).
    pub fn create_default_srgb(&mut self) -> Result<(), IccError> {
        const SRGB_GAMMA: f64 = 2.2;
        let red = Yxy::new(1.0, 0.6400, 0.3300);
        let green = Yxy::new(1.0, 0.3000, 0.6000);
        let blue = Yxy::new(1.0, 0.1500, 0.0600);
        let white = Yxy::new(1.0, 0.3127, 0.3290);
        self.create_from_edid(SRGB_GAMMA, red, green, blue, white)?;
        self.set_metadata("DATA_source", "standard");
        self.set_metadata("STANDARD_space", "srgb");
        Ok(())
    }

    /// As [`create_from_edid`](Self::create_from_edid), additionally
    /// stamping the EDID-derived metadata and a fixed copyright string
    /// (deliberately not localized, matching the monitor-vendor data it
    /// annotates).
    pub fn create_from_edid_data(&mut self, edid: &EdidInfo) -> Result<(), IccError> {
        self.create_from_edid(edid.gamma, edid.red, edid.green, edid.blue, edid.white)?;
        if let Some(md5) = &edid.checksum_md5 {
            self.set_metadata("EDID_md5", md5.clone());
        }
        if let Some(model) = &edid.monitor_name {
            self.set_metadata("EDID_model", model.clone());
        }
        if let Some(serial) = &edid.serial_number {
            self.set_metadata("EDID_serial", serial.clone());
        }
        if let Some(mnft) = &edid.pnp_id {
            self.set_metadata("EDID_mnft", mnft.clone());
        }
        if let Some(vendor) = &edid.vendor_name {
            self.set_metadata("EDID_manufacturer", vendor.clone());
        }
        self.set_copyright("", "This profile is free of known copyright restrictions.")?;
        Ok(())
    }

    // -- saving -------------------------------------------------------------

    /// Updates tag data from the in-memory model and serializes a fresh
    /// byte image, recomputing the Profile ID over the canonical-form
    /// bytes. `flags` is accepted for symmetry with the load side; every
    /// optional section here is always rewritten from whatever is
    /// currently in memory.
    pub fn save_bytes(&mut self, _flags: LoadFlags) -> Result<Vec<u8>, IccError> {
        if self.metadata.is_empty() {
            self.tags.remove(TagSignature::METADATA);
        } else {
            self.tags.set(TagSignature::METADATA, encode_metadata(&self.metadata))?;
        }

        match self.characterization_data.clone() {
            Some(text) => {
                self.tags.set(TagSignature::CHAR_TARGET, text.into_bytes())?;
            }
            None => self.tags.remove(TagSignature::CHAR_TARGET),
        }

        if self.named_colors.is_empty() {
            self.tags.remove(TagSignature::NAMED_COLOR2);
        } else {
            self.tags.set(TagSignature::NAMED_COLOR2, namedcolorlist::encode("", "", &self.named_colors))?;
        }

        if let Some(curves) = self.vcgt.clone() {
            self.tags.set(TagSignature::VCGT, encode_vcgt_tag(&curves))?;
        }

        self.write_localized_tags()?;

        let header = io::HeaderFields {
            version: self.version,
            kind: self.kind,
            colorspace: self.colorspace,
            pcs: self.pcs,
            created_epoch_secs: self.created,
            attributes: self.attributes,
            rendering_intent: self.header_rendering_intent,
            profile_id: None,
        };
        let mut bytes = io::serialize(&header, &self.tags);
        let id = io::compute_profile_id(&bytes);
        bytes[84..100].copy_from_slice(&id);
        self.checksum = Some(io::hex_id(id));
        self.size_bytes = bytes.len();
        Ok(bytes)
    }

    /// Writes the four localized-text tags: a v4 profile gets `mluc` in all
    /// four; a v2 profile gets the legacy `textDescriptionType` encoding in
    /// all four, plus an Apple-style `dscm` extension carrying the full
    /// multi-locale description.
    fn write_localized_tags(&mut self) -> Result<(), IccError> {
        if self.version >= 4.0 {
            self.tags.set(TagSignature::PROFILE_DESCRIPTION, self.text.description.encode())?;
            self.tags.set(TagSignature::COPYRIGHT, self.text.copyright.encode())?;
            self.tags.set(TagSignature::DEVICE_MFG_DESC, self.text.manufacturer.encode())?;
            self.tags.set(TagSignature::DEVICE_MODEL_DESC, self.text.model.encode())?;
        } else {
            self.tags.set(TagSignature::PROFILE_DESCRIPTION, self.text.description.encode_v2_desc())?;
            self.tags.set(TagSignature::PROFILE_DESCRIPTION_ML, self.text.description.encode())?;
            self.tags.set(TagSignature::COPYRIGHT, self.text.copyright.encode_v2_desc())?;
            self.tags.set(TagSignature::DEVICE_MFG_DESC, self.text.manufacturer.encode_v2_desc())?;
            self.tags.set(TagSignature::DEVICE_MODEL_DESC, self.text.model.encode_v2_desc())?;
        }
        Ok(())
    }

    pub fn save_file(&mut self, path: &Path, flags: LoadFlags) -> Result<(), IccError> {
        let bytes = self.save_bytes(flags)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| IccError::FailedToSave(e.to_string()))?;
            }
        }
        let tmp_path = path.with_extension("icc.tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| IccError::FailedToSave(e.to_string()))?;
        fs::rename(&tmp_path, path).map_err(|e| IccError::FailedToSave(e.to_string()))?;
        self.filename = Some(path.to_path_buf());
        self.can_delete = true;
        Ok(())
    }

    /// Writes to the per-user profile directory under `edid-<checksum>.icc`.
    pub fn save_default(&mut self, flags: LoadFlags) -> Result<PathBuf, IccError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| IccError::FailedToSave("no per-user data directory available".into()))?
            .join("icc");
        let checksum = self.checksum.clone().unwrap_or_default();
        let path = dir.join(format!("edid-{checksum}.icc"));
        self.save_file(&path, flags)?;
        Ok(path)
    }

    // -- VCGT and response ----------------------------------------------

    pub fn get_vcgt(&self, size: usize) -> Result<Vec<Rgb>, IccError> {
        let curves = self.vcgt.as_ref().ok_or_else(|| IccError::no_data_for_tag("vcgt"))?;
        let denom = (size.max(2) - 1) as f64;
        Ok((0..size)
            .map(|i| {
                let x = i as f64 / denom;
                Rgb::new(curves[0].eval(x), curves[1].eval(x), curves[2].eval(x))
            })
            .collect())
    }

    pub fn set_vcgt(&mut self, points: &[[f64; 3]]) -> Result<(), IccError> {
        let curves = tonecurve::build_vcgt(points)?;
        self.tags.set(TagSignature::VCGT, encode_vcgt_tag(&curves))?;
        self.vcgt = Some(curves);
        Ok(())
    }

    /// Three orthogonal RGB ramps pushed through a relative-colorimetric
    /// transform from this profile to a reference sRGB model.
    pub fn get_response(&self, size: usize) -> Result<Vec<Rgb>, IccError> {
        if self.colorspace != Colorspace::Rgb {
            return Err(IccError::InvalidColorspace("profile is not RGB".into()));
        }
        let model = self.build_rgb_model()?;
        let srgb = crate::cmm::default_srgb_model();
        let denom = (size.max(2) - 1) as f64;
        let mut out = Vec::with_capacity(size);
        for i in 0..size {
            let t = i as f64 / denom;
            let r = srgb.from_pcs_xyz(model.to_pcs_xyz([t, 0.0, 0.0]))[0].max(0.0);
            let g = srgb.from_pcs_xyz(model.to_pcs_xyz([0.0, t, 0.0]))[1].max(0.0);
            let b = srgb.from_pcs_xyz(model.to_pcs_xyz([0.0, 0.0, t]))[2].max(0.0);
            out.push(Rgb::new(r, g, b));
        }
        Ok(out)
    }

    // -- validation warnings ----------------------------------------------

    #[must_use]
    pub fn get_warnings(&self) -> BTreeSet<ProfileWarning> {
        let mut set = BTreeSet::new();
        if self.description("").unwrap_or_default().is_empty() {
            set.insert(ProfileWarning::DescriptionMissing);
        }
        if self.copyright("").unwrap_or_default().is_empty() {
            set.insert(ProfileWarning::CopyrightMissing);
        }
        if self.colorspace != Colorspace::Rgb {
            return set;
        }

        if let Some(w) = warnings::check_whitepoint(self.temperature_k) {
            set.insert(w);
        }
        if let Some(w) = warnings::check_vcgt(self.vcgt.as_ref()) {
            set.insert(w);
        }
        let is_display = self.kind == ProfileKind::DisplayDevice;
        if let Ok(model) = self.build_rgb_model() {
            if let Some(w) = warnings::check_scum_dot(&model) {
                set.insert(w);
            }
            set.extend(warnings::check_gray_axis(&model, is_display));
        }
        if let Some(w) = warnings::check_primaries_invalid(self.red, self.green, self.blue) {
            set.insert(w);
        }
        if let Some(w) = warnings::check_primaries_unlikely(self.red, self.green, self.blue) {
            set.insert(w);
        }
        if let Some(w) = warnings::check_whitepoint_invalid(self.white, is_display) {
            set.insert(w);
        }
        if let Some(w) = warnings::check_primaries_non_additive(self.red, self.green, self.blue, is_display) {
            set.insert(w);
        }
        set
    }
}

impl Default for IccProfile {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_any_text(bytes: &[u8]) -> Result<Mlu, IccError> {
    if bytes.len() >= 4 {
        match &<[u8; 4]>::try_from(&bytes[0..4]).unwrap() {
            b"mluc" => return Mlu::decode(bytes),
            b"desc" => return Mlu::decode_v2_desc(bytes),
            b"text" => {
                let ascii = bytes.get(8..).unwrap_or(&[]);
                let text = String::from_utf8(ascii.iter().take_while(|&&b| b != 0).copied().collect())
                    .map_err(|_| IccError::CorruptionDetected("text tag is not valid UTF-8".into()))?;
                let mut mlu = Mlu::new();
                mlu.set(Locale::default_locale(), text);
                return Ok(mlu);
            }
            _ => {}
        }
    }
    Err(IccError::FailedToParse("unrecognized text tag type".into()))
}

fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().unwrap())
}

/// Encodes the ordered metadata list as a `meta` dict tag: a 16-byte
/// header, one 16-byte record (key offset/size, value offset/size) per
/// entry, then UTF-8 key/value bytes.
fn encode_metadata(entries: &[(String, String)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"meta");
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    out.extend_from_slice(&16u32.to_be_bytes());

    let header_len = 16 + entries.len() * 16;
    let mut data = Vec::new();
    let mut records = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let koff = header_len + data.len();
        data.extend_from_slice(key.as_bytes());
        let voff = header_len + data.len();
        data.extend_from_slice(value.as_bytes());
        records.push((koff as u32, key.len() as u32, voff as u32, value.len() as u32));
    }
    for (koff, ksize, voff, vsize) in records {
        out.extend_from_slice(&koff.to_be_bytes());
        out.extend_from_slice(&ksize.to_be_bytes());
        out.extend_from_slice(&voff.to_be_bytes());
        out.extend_from_slice(&vsize.to_be_bytes());
    }
    out.extend_from_slice(&data);
    out
}

fn decode_metadata(bytes: &[u8]) -> Result<Vec<(String, String)>, IccError> {
    if bytes.len() < 16 || bytes[0..4] != *b"meta" {
        return Err(IccError::FailedToParse("not a metadata dict tag".into()));
    }
    let count = be32(&bytes[8..12]) as usize;
    let record_size = be32(&bytes[12..16]) as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let rec_off = 16 + i * record_size;
        let rec =
            bytes.get(rec_off..rec_off + 16).ok_or_else(|| IccError::CorruptionDetected("metadata record truncated".into()))?;
        let (koff, ksize) = (be32(&rec[0..4]) as usize, be32(&rec[4..8]) as usize);
        let (voff, vsize) = (be32(&rec[8..12]) as usize, be32(&rec[12..16]) as usize);
        let key_bytes = bytes.get(koff..koff + ksize).ok_or_else(|| IccError::CorruptionDetected("metadata key truncated".into()))?;
        let value_bytes =
            bytes.get(voff..voff + vsize).ok_or_else(|| IccError::CorruptionDetected("metadata value truncated".into()))?;
        let key = String::from_utf8(key_bytes.to_vec())
            .map_err(|_| IccError::CorruptionDetected("metadata key is not valid UTF-8".into()))?;
        let value = String::from_utf8(value_bytes.to_vec())
            .map_err(|_| IccError::CorruptionDetected("metadata value is not valid UTF-8".into()))?;
        out.push((key, value));
    }
    Ok(out)
}

fn encode_vcgt_tag(curves: &[ToneCurve; 3]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"vcgt");
    out.extend_from_slice(&[0; 4]);
    for curve in curves {
        let payload = curve.encode_curv_tag();
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
    }
    out
}

fn decode_vcgt_tag(bytes: &[u8]) -> Result<[ToneCurve; 3], IccError> {
    if bytes.len() < 8 || bytes[0..4] != *b"vcgt" {
        return Err(IccError::FailedToParse("not a vcgt tag".into()));
    }
    let mut pos = 8;
    let mut curves = Vec::with_capacity(3);
    for _ in 0..3 {
        let len_bytes = bytes.get(pos..pos + 4).ok_or_else(|| IccError::CorruptionDetected("vcgt tag truncated".into()))?;
        let len = be32(len_bytes) as usize;
        pos += 4;
        let payload = bytes.get(pos..pos + len).ok_or_else(|| IccError::CorruptionDetected("vcgt channel truncated".into()))?;
        curves.push(ToneCurve::decode_tag(payload)?);
        pos += len;
    }
    Ok([curves[0].clone(), curves[1].clone(), curves[2].clone()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_srgb_round_trips_through_bytes() {
        let mut profile = IccProfile::new();
        profile.create_default_srgb().unwrap();
        profile.set_description("", "sRGB built-in").unwrap();
        profile.set_copyright("", "nobody").unwrap();
        let bytes = profile.save_bytes(LoadFlags::ALL).unwrap();

        let mut back = IccProfile::new();
        back.load_bytes(&bytes, LoadFlags::ALL).unwrap();
        assert_eq!(back.colorspace, Colorspace::Rgb);
        assert_eq!(back.kind, ProfileKind::DisplayDevice);
        assert_eq!(back.description("").unwrap(), "sRGB built-in");
        assert_eq!(back.get_metadata("STANDARD_space"), Some("srgb"));
        assert_eq!(back.checksum(), profile.checksum());
    }

    #[test]
    fn load_bytes_rejects_short_image() {
        let mut profile = IccProfile::new();
        assert!(profile.load_bytes(&[0u8; 10], LoadFlags::NONE).is_err());
    }

    #[test]
    fn load_at_most_once() {
        let mut profile = IccProfile::new();
        profile.create_default_srgb().unwrap();
        assert!(profile.create_default_srgb().is_err());
    }

    #[test]
    fn load_handle_requires_matching_context() {
        let mut source = IccProfile::new();
        source.create_default_srgb().unwrap();
        let bytes = source.save_bytes(LoadFlags::ALL).unwrap();

        let other_context_id = IccContext::new().id();
        let mut target = IccProfile::new();
        let handle = ProfileHandle::new(other_context_id, bytes);
        assert!(matches!(target.load_handle(handle, LoadFlags::ALL), Err(IccError::FailedToCreate(_))));
    }

    #[test]
    fn named_colors_round_trip_through_save() {
        let mut profile = IccProfile::new();
        profile.create_default_srgb().unwrap();
        profile.set_named_colors(vec![crate::color::Swatch {
            name: "Cool Gray 1".into(),
            lab: crate::color::Lab { l: 90.0, a: 0.0, b: 0.5 },
        }]);
        let bytes = profile.save_bytes(LoadFlags::ALL).unwrap();

        let mut back = IccProfile::new();
        back.load_bytes(&bytes, LoadFlags::NAMED_COLORS).unwrap();
        assert_eq!(back.named_colors().len(), 1);
        assert_eq!(back.named_colors()[0].name, "Cool Gray 1");
    }

    #[test]
    fn vcgt_round_trips_through_save() {
        let mut profile = IccProfile::new();
        profile.create_default_srgb().unwrap();
        let points: Vec<[f64; 3]> = (0..16).map(|i| [f64::from(i) / 15.0; 3]).collect();
        profile.set_vcgt(&points).unwrap();
        let bytes = profile.save_bytes(LoadFlags::ALL).unwrap();

        let mut back = IccProfile::new();
        back.load_bytes(&bytes, LoadFlags::NONE).unwrap();
        let sampled = back.get_vcgt(4).unwrap();
        assert!((sampled[0].r - 0.0).abs() < 1e-3);
        assert!((sampled[3].b - 1.0).abs() < 1e-2);
    }

    #[test]
    fn get_vcgt_without_tag_is_no_data() {
        let profile = IccProfile::new();
        assert!(matches!(profile.get_vcgt(4), Err(IccError::NoData(_))));
    }

    #[test]
    fn warnings_on_textless_srgb_flag_missing_text() {
        let mut profile = IccProfile::new();
        profile.create_default_srgb().unwrap();
        let warnings = profile.get_warnings();
        assert!(warnings.contains(&ProfileWarning::DescriptionMissing));
        assert!(warnings.contains(&ProfileWarning::CopyrightMissing));
        assert!(!warnings.contains(&ProfileWarning::PrimariesInvalid));
    }

    #[test]
    fn non_rgb_profile_only_gets_text_warnings() {
        let mut profile = IccProfile::new();
        profile.colorspace = Colorspace::Gray;
        let warnings = profile.get_warnings();
        assert!(warnings.iter().all(|w| matches!(w, ProfileWarning::DescriptionMissing | ProfileWarning::CopyrightMissing)));
    }

    #[test]
    fn response_requires_rgb_colorspace() {
        let mut profile = IccProfile::new();
        profile.colorspace = Colorspace::Gray;
        assert!(matches!(profile.get_response(4), Err(IccError::InvalidColorspace(_))));
    }

    #[test]
    fn raw_tag_set_then_get_round_trips() {
        let mut profile = IccProfile::new();
        profile.set_tag_data("cprt", Some(vec![1, 2, 3])).unwrap();
        assert_eq!(profile.get_tag_data("cprt").unwrap(), vec![1, 2, 3]);
        assert_eq!(profile.get_tags(), vec!["cprt".to_string()]);
        profile.set_tag_data("cprt", None).unwrap();
        assert!(profile.get_tag_data("cprt").is_err());
    }

    #[test]
    fn save_file_then_load_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.icc");

        let mut profile = IccProfile::new();
        profile.create_default_srgb().unwrap();
        profile.save_file(&path, LoadFlags::ALL).unwrap();

        let mut back = IccProfile::new();
        back.load_file(&path, LoadFlags::ALL).unwrap();
        assert_eq!(back.colorspace, profile.colorspace);
        assert_eq!(back.checksum(), profile.checksum());
    }

    #[test]
    fn from_edid_data_stamps_metadata_and_copyright() {
        let edid = EdidInfo {
            gamma: 2.2,
            red: Yxy::new(1.0, 0.64, 0.33),
            green: Yxy::new(1.0, 0.30, 0.60),
            blue: Yxy::new(1.0, 0.15, 0.06),
            white: Yxy::new(1.0, 0.3127, 0.3290),
            checksum_md5: Some("abc123".into()),
            monitor_name: Some("Test Monitor".into()),
            serial_number: None,
            pnp_id: Some("ABC".into()),
            vendor_name: None,
        };
        let mut profile = IccProfile::new();
        profile.create_from_edid_data(&edid).unwrap();
        assert_eq!(profile.get_metadata("EDID_md5"), Some("abc123"));
        assert_eq!(profile.get_metadata("EDID_model"), Some("Test Monitor"));
        assert_eq!(profile.copyright("").unwrap(), "This profile is free of known copyright restrictions.");
    }
}
