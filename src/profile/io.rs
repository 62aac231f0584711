//! Binary ICC header and tag-table codec.
//!
//! Lays the header out per ICC.1 (128 bytes), followed by a 4-byte tag
//! count and a 12-byte-per-entry tag table, the way every ICC v2/v4 file
//! on disk is structured; this is what `IccProfile::load_bytes`/
//! `save_bytes` parse and emit.

use crate::enums::{Colorspace, ProfileKind, RenderingIntent};
use crate::error::IccError;
use crate::tag::{TagSignature, TagTable};
use md5::{Digest, Md5};

pub const HEADER_SIZE: usize = 128;
/// Minimum byte image size the loader accepts: header + tag count.
pub const MIN_PROFILE_SIZE: usize = HEADER_SIZE + 4;

const ACSP_SIGNATURE: [u8; 4] = *b"acsp";

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceAttributes {
    pub transparency: bool,
    pub glossy: bool,
    pub matte: bool,
    pub negative: bool,
}

#[derive(Debug, Clone)]
pub struct HeaderFields {
    pub version: f64,
    pub kind: ProfileKind,
    pub colorspace: Colorspace,
    pub pcs: Colorspace,
    pub created_epoch_secs: Option<u64>,
    pub attributes: DeviceAttributes,
    pub rendering_intent: RenderingIntent,
    pub profile_id: Option<[u8; 16]>,
}

impl Default for HeaderFields {
    fn default() -> Self {
        Self {
            version: 4.3,
            kind: ProfileKind::Unknown,
            colorspace: Colorspace::Unknown,
            pcs: Colorspace::Xyz,
            created_epoch_secs: None,
            attributes: DeviceAttributes::default(),
            rendering_intent: RenderingIntent::Unknown,
            profile_id: None,
        }
    }
}

fn kind_to_class_sig(kind: ProfileKind) -> [u8; 4] {
    match kind {
        ProfileKind::InputDevice => *b"scnr",
        ProfileKind::DisplayDevice => *b"mntr",
        ProfileKind::OutputDevice => *b"prtr",
        ProfileKind::DeviceLink => *b"link",
        ProfileKind::ColorspaceConversion => *b"spac",
        ProfileKind::Abstract => *b"abst",
        ProfileKind::NamedColor => *b"nmcl",
        ProfileKind::Unknown => [0; 4],
    }
}

fn class_sig_to_kind(sig: [u8; 4]) -> ProfileKind {
    match &sig {
        b"scnr" => ProfileKind::InputDevice,
        b"mntr" => ProfileKind::DisplayDevice,
        b"prtr" => ProfileKind::OutputDevice,
        b"link" => ProfileKind::DeviceLink,
        b"spac" => ProfileKind::ColorspaceConversion,
        b"abst" => ProfileKind::Abstract,
        b"nmcl" => ProfileKind::NamedColor,
        _ => ProfileKind::Unknown,
    }
}

fn colorspace_to_sig(cs: Colorspace) -> [u8; 4] {
    match cs {
        Colorspace::Xyz => *b"XYZ ",
        Colorspace::Lab => *b"Lab ",
        Colorspace::Luv => *b"Luv ",
        Colorspace::YCbCr => *b"YCbr",
        Colorspace::Yxy => *b"Yxy ",
        Colorspace::Rgb => *b"RGB ",
        Colorspace::Gray => *b"GRAY",
        Colorspace::Hsv => *b"HSV ",
        Colorspace::Cmyk => *b"CMYK",
        Colorspace::Cmy => *b"CMY ",
        Colorspace::Unknown => [0; 4],
    }
}

fn sig_to_colorspace(sig: [u8; 4]) -> Colorspace {
    match &sig {
        b"XYZ " => Colorspace::Xyz,
        b"Lab " => Colorspace::Lab,
        b"Luv " => Colorspace::Luv,
        b"YCbr" => Colorspace::YCbCr,
        b"Yxy " => Colorspace::Yxy,
        b"RGB " => Colorspace::Rgb,
        b"GRAY" => Colorspace::Gray,
        b"HSV " => Colorspace::Hsv,
        b"CMYK" => Colorspace::Cmyk,
        b"CMY " => Colorspace::Cmy,
        _ => Colorspace::Unknown,
    }
}

fn intent_to_code(intent: RenderingIntent) -> u32 {
    match intent {
        RenderingIntent::Perceptual | RenderingIntent::Unknown => 0,
        RenderingIntent::RelativeColorimetric => 1,
        RenderingIntent::Saturation => 2,
        RenderingIntent::AbsoluteColorimetric => 3,
    }
}

fn code_to_intent(code: u32) -> RenderingIntent {
    match code {
        0 => RenderingIntent::Perceptual,
        1 => RenderingIntent::RelativeColorimetric,
        2 => RenderingIntent::Saturation,
        3 => RenderingIntent::AbsoluteColorimetric,
        _ => RenderingIntent::Unknown,
    }
}

fn encode_version(v: f64) -> [u8; 4] {
    let major = v.trunc().clamp(0.0, 255.0) as u8;
    let minor = ((v.fract() * 10.0).round() as u8).min(15);
    [major, minor << 4, 0, 0]
}

fn decode_version(bytes: [u8; 4]) -> f64 {
    f64::from(bytes[0]) + f64::from(bytes[1] >> 4) / 10.0
}

/// Serializes the header + tag table. The Profile ID field is written as
/// zero; callers that want a stamped ID call [`compute_profile_id`] on the
/// result and patch bytes `84..100` in place, matching the "compute the ID
/// over the canonical-form bytes with the ID field zeroed" rule from the
/// ICC spec that `cmsMD5computeID` implements.
#[must_use]
pub fn serialize(header: &HeaderFields, tags: &TagTable) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE];
    out[8..12].copy_from_slice(&encode_version(header.version));
    out[12..16].copy_from_slice(&kind_to_class_sig(header.kind));
    out[16..20].copy_from_slice(&colorspace_to_sig(header.colorspace));
    out[20..24].copy_from_slice(&colorspace_to_sig(header.pcs));
    out[24..32].copy_from_slice(&header.created_epoch_secs.unwrap_or(0).to_be_bytes());
    out[36..40].copy_from_slice(&ACSP_SIGNATURE);
    let mut attr = 0u64;
    if header.attributes.transparency {
        attr |= 1 << 0;
    }
    if header.attributes.glossy {
        attr |= 1 << 1;
    }
    if header.attributes.negative {
        attr |= 1 << 2;
    }
    if header.attributes.matte {
        attr |= 1 << 3;
    }
    out[56..64].copy_from_slice(&attr.to_be_bytes());
    out[64..68].copy_from_slice(&intent_to_code(header.rendering_intent).to_be_bytes());
    if let Some(id) = header.profile_id {
        out[84..100].copy_from_slice(&id);
    }

    out.extend_from_slice(&(tags.len() as u32).to_be_bytes());

    let table_start = out.len();
    let table_len = tags.len() * 12;
    out.resize(table_start + table_len, 0);

    let mut data_offset = table_start + table_len;
    let mut data_blob = Vec::new();
    for (i, sig) in tags.signatures().into_iter().enumerate() {
        let payload = tags.get(sig).unwrap_or(&[]);
        let entry_off = table_start + i * 12;
        out[entry_off..entry_off + 4].copy_from_slice(&sig.to_bytes());
        out[entry_off + 4..entry_off + 8].copy_from_slice(&(data_offset as u32).to_be_bytes());
        out[entry_off + 8..entry_off + 12].copy_from_slice(&(payload.len() as u32).to_be_bytes());
        data_blob.extend_from_slice(payload);
        let padded = (4 - payload.len() % 4) % 4;
        data_blob.extend(std::iter::repeat(0).take(padded));
        data_offset += payload.len() + padded;
    }
    out.extend_from_slice(&data_blob);

    let total_len = out.len() as u32;
    out[0..4].copy_from_slice(&total_len.to_be_bytes());
    out
}

/// Parses a byte image into header fields and a tag table.
pub fn parse(data: &[u8]) -> Result<(HeaderFields, TagTable), IccError> {
    if data.len() < MIN_PROFILE_SIZE {
        return Err(IccError::FailedToParse(format!(
            "image is {} bytes, shorter than the minimum {MIN_PROFILE_SIZE}",
            data.len()
        )));
    }
    let version = decode_version(data[8..12].try_into().unwrap());
    let kind = class_sig_to_kind(data[12..16].try_into().unwrap());
    let colorspace = sig_to_colorspace(data[16..20].try_into().unwrap());
    let pcs = sig_to_colorspace(data[20..24].try_into().unwrap());
    let created = u64::from_be_bytes(data[24..32].try_into().unwrap());
    let attr_bits = u64::from_be_bytes(data[56..64].try_into().unwrap());
    let attributes = DeviceAttributes {
        transparency: attr_bits & (1 << 0) != 0,
        glossy: attr_bits & (1 << 1) != 0,
        negative: attr_bits & (1 << 2) != 0,
        matte: attr_bits & (1 << 3) != 0,
    };
    let rendering_intent = code_to_intent(u32::from_be_bytes(data[64..68].try_into().unwrap()));
    let id_bytes: [u8; 16] = data[84..100].try_into().unwrap();
    let profile_id = (id_bytes != [0u8; 16]).then_some(id_bytes);

    let header = HeaderFields {
        version,
        kind,
        colorspace,
        pcs,
        created_epoch_secs: (created != 0).then_some(created),
        attributes,
        rendering_intent,
        profile_id,
    };

    let tag_count = u32::from_be_bytes(data[128..132].try_into().unwrap()) as usize;
    let mut tags = TagTable::new();
    for i in 0..tag_count {
        let entry_off = 132 + i * 12;
        let entry = data
            .get(entry_off..entry_off + 12)
            .ok_or_else(|| IccError::CorruptionDetected("tag table entry truncated".into()))?;
        let sig = TagSignature::from_bytes(entry[0..4].try_into().unwrap());
        let offset = u32::from_be_bytes(entry[4..8].try_into().unwrap()) as usize;
        let size = u32::from_be_bytes(entry[8..12].try_into().unwrap()) as usize;
        let payload = data
            .get(offset..offset + size)
            .ok_or_else(|| IccError::CorruptionDetected(format!("tag '{sig}' data truncated")))?;
        tags.set(sig, payload.to_vec())?;
    }
    Ok((header, tags))
}

/// Computes the Profile ID: an MD5 over the byte image with the profile
/// flags, rendering intent, and Profile ID fields zeroed, per ICC.1
/// Annex B — the computation `cmsMD5computeID` performs internally.
#[must_use]
pub fn compute_profile_id(serialized: &[u8]) -> [u8; 16] {
    let mut canonical = serialized.to_vec();
    for b in &mut canonical[44..48] {
        *b = 0;
    }
    for b in &mut canonical[64..68] {
        *b = 0;
    }
    for b in &mut canonical[84..100] {
        *b = 0;
    }
    let digest = Md5::digest(&canonical);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// MD5 over the raw byte image, used for the `FALLBACK_MD5` load path when
/// the header carries no embedded Profile ID.
#[must_use]
pub fn md5_of(data: &[u8]) -> [u8; 16] {
    let digest = Md5::digest(data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

#[must_use]
pub fn hex_id(id: [u8; 16]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}

const XYZ_SIGNATURE: [u8; 4] = *b"XYZ ";

/// Encodes an `XYZType` colorant tag: 8-byte header + one s15Fixed16 triplet.
#[must_use]
pub fn encode_xyz_tag(xyz: crate::color::Xyz) -> Vec<u8> {
    let mut out = Vec::with_capacity(20);
    out.extend_from_slice(&XYZ_SIGNATURE);
    out.extend_from_slice(&[0; 4]);
    for v in [xyz.x, xyz.y, xyz.z] {
        out.extend_from_slice(&((v * 65536.0).round() as i32).to_be_bytes());
    }
    out
}

pub fn decode_xyz_tag(bytes: &[u8]) -> Result<crate::color::Xyz, IccError> {
    if bytes.len() < 20 || bytes[0..4] != XYZ_SIGNATURE {
        return Err(IccError::FailedToParse("not an XYZType tag".into()));
    }
    let read = |off: usize| f64::from(i32::from_be_bytes(bytes[off..off + 4].try_into().unwrap())) / 65536.0;
    Ok(crate::color::Xyz::new(read(8), read(12), read(16)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = HeaderFields {
            version: 4.3,
            kind: ProfileKind::DisplayDevice,
            colorspace: Colorspace::Rgb,
            pcs: Colorspace::Xyz,
            created_epoch_secs: Some(12345),
            attributes: DeviceAttributes { matte: true, ..Default::default() },
            rendering_intent: RenderingIntent::Perceptual,
            profile_id: None,
        };
        let mut tags = TagTable::new();
        tags.set(TagSignature::COPYRIGHT, vec![1, 2, 3, 4]).unwrap();
        let bytes = serialize(&header, &tags);
        let (back_header, back_tags) = parse(&bytes).unwrap();
        assert_eq!(back_header.kind, ProfileKind::DisplayDevice);
        assert_eq!(back_header.colorspace, Colorspace::Rgb);
        assert!(back_header.attributes.matte);
        assert_eq!(back_tags.get(TagSignature::COPYRIGHT), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn rejects_short_image() {
        assert!(parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn xyz_tag_round_trips() {
        let xyz = crate::color::Xyz::new(0.4361, 0.2225, 0.0139);
        let back = decode_xyz_tag(&encode_xyz_tag(xyz)).unwrap();
        assert!((back.x - xyz.x).abs() < 1e-4);
        assert!((back.y - xyz.y).abs() < 1e-4);
        assert!((back.z - xyz.z).abs() < 1e-4);
    }

    #[test]
    fn profile_id_ignores_flags_and_intent() {
        let header = HeaderFields::default();
        let tags = TagTable::new();
        let bytes_a = serialize(&header, &tags);
        let mut header_b = header.clone();
        header_b.rendering_intent = RenderingIntent::Saturation;
        let bytes_b = serialize(&header_b, &tags);
        assert_eq!(compute_profile_id(&bytes_a), compute_profile_id(&bytes_b));
    }
}
