//! Named-color list (`ncl2` tag) codec.
//!
//! Grounded on `cd-icc.c`'s named-color load path: each entry's
//! `prefix " " name " " suffix` is concatenated, trimmed, and validated as
//! UTF-8; entries from profiles that used a Latin-1-ish vendor encoding are
//! repaired with the two documented byte fixups before a final validation
//! pass, and anything still broken is dropped rather than surfacing an
//! error for the whole tag.

use crate::color::{Lab, Swatch};
use crate::error::IccError;

const NCL2_SIGNATURE: [u8; 4] = *b"ncl2";
const NAME_FIELD_LEN: usize = 32;

/// Repairs the two documented high-bit byte sequences colord's named-color
/// loader special-cases, then re-validates as UTF-8. Returns `None` if the
/// bytes are still not valid UTF-8 afterwards.
fn repair_and_validate(mut bytes: Vec<u8>) -> Option<String> {
    if String::from_utf8(bytes.clone()).is_ok() {
        return String::from_utf8(bytes).ok();
    }
    let mut repaired = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0xAE => {
                repaired.push(0xC2);
                repaired.push(0xAE);
            }
            0x86 => {} // dropped
            b => repaired.push(b),
        }
        i += 1;
    }
    bytes = repaired;
    String::from_utf8(bytes).ok()
}

fn read_fixed_ascii(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().take_while(|&&b| b != 0).copied().collect()
}

/// Trims leading/trailing ASCII whitespace at the byte level, without going
/// through a `String` first — the bytes may not be valid UTF-8 yet.
fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !b.is_ascii_whitespace()).map_or(start, |e| e + 1);
    &bytes[start..end]
}

/// Encodes the 0..100 / -128..127 Lab triple into the ICC v2 16-bit PCS
/// encoding used by `namedColor2Type`.
fn encode_lab16(lab: Lab) -> [u16; 3] {
    let l = ((lab.l.clamp(0.0, 100.0) * 65280.0 / 100.0).round()) as u16;
    let a = (((lab.a.clamp(-128.0, 127.0) + 128.0) * 65280.0 / 255.0).round()) as u16;
    let b = (((lab.b.clamp(-128.0, 127.0) + 128.0) * 65280.0 / 255.0).round()) as u16;
    [l, a, b]
}

fn decode_lab16(v: [u16; 3]) -> Lab {
    Lab {
        l: f64::from(v[0]) * 100.0 / 65280.0,
        a: f64::from(v[1]) * 255.0 / 65280.0 - 128.0,
        b: f64::from(v[2]) * 255.0 / 65280.0 - 128.0,
    }
}

/// Encodes a list of swatches as an `ncl2` tag with no device coordinates.
#[must_use]
pub fn encode(prefix: &str, suffix: &str, swatches: &[Swatch]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&NCL2_SIGNATURE);
    out.extend_from_slice(&[0; 4]); // reserved
    out.extend_from_slice(&0u32.to_be_bytes()); // vendor flags
    out.extend_from_slice(&(swatches.len() as u32).to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // nDeviceCoords

    let mut field = |s: &str| {
        let mut buf = [0u8; NAME_FIELD_LEN];
        let bytes = s.as_bytes();
        let n = bytes.len().min(NAME_FIELD_LEN - 1);
        buf[..n].copy_from_slice(&bytes[..n]);
        buf
    };
    out.extend_from_slice(&field(prefix));
    out.extend_from_slice(&field(suffix));

    for swatch in swatches {
        out.extend_from_slice(&field(&swatch.name));
        for component in encode_lab16(swatch.lab) {
            out.extend_from_slice(&component.to_be_bytes());
        }
    }
    out
}

/// Decodes an `ncl2` tag, repairing and skipping malformed names per the
/// rules above rather than failing the whole tag.
pub fn decode(bytes: &[u8]) -> Result<Vec<Swatch>, IccError> {
    if bytes.len() < 84 || bytes[0..4] != NCL2_SIGNATURE {
        return Err(IccError::FailedToParse("not an ncl2 tag".into()));
    }
    let count = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;
    let device_coords = u32::from_be_bytes(bytes[16..20].try_into().unwrap()) as usize;
    let prefix = read_fixed_ascii(&bytes[20..52]);
    let suffix = read_fixed_ascii(&bytes[52..84]);

    let entry_len = NAME_FIELD_LEN + 3 * 2 + device_coords * 2;
    let mut swatches = Vec::with_capacity(count);
    for i in 0..count {
        let off = 84 + i * entry_len;
        let entry = match bytes.get(off..off + entry_len) {
            Some(e) => e,
            None => break, // truncated tail: stop rather than error, matching "skip entries that still fail"
        };
        let name = read_fixed_ascii(&entry[0..NAME_FIELD_LEN]);
        let mut joined = Vec::with_capacity(prefix.len() + name.len() + suffix.len() + 2);
        joined.extend_from_slice(&prefix);
        joined.push(b' ');
        joined.extend_from_slice(&name);
        joined.push(b' ');
        joined.extend_from_slice(&suffix);
        let trimmed = trim_ascii_whitespace(&joined).to_vec();
        let Some(text) = repair_and_validate(trimmed) else { continue };

        let mut pcs = [0u16; 3];
        for (j, p) in pcs.iter_mut().enumerate() {
            let o = NAME_FIELD_LEN + j * 2;
            *p = u16::from_be_bytes([entry[o], entry[o + 1]]);
        }
        swatches.push(Swatch { name: text, lab: decode_lab16(pcs) });
    }
    Ok(swatches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_ascii() {
        let swatches = vec![
            Swatch { name: "Red".into(), lab: Lab { l: 53.24, a: 80.09, b: 67.2 } },
            Swatch { name: "Green".into(), lab: Lab { l: 87.73, a: -86.18, b: 83.18 } },
        ];
        let bytes = encode("PANTONE", "C", &swatches);
        let back = decode(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].name, "PANTONE Red C");
        assert!((back[0].lab.l - 53.24).abs() < 0.01);
    }

    #[test]
    fn repairs_register_mark_byte() {
        let joined = vec![b'a', 0xAE, b'b'];
        assert_eq!(repair_and_validate(joined).unwrap(), "a\u{ae}b");
    }

    #[test]
    fn drops_0x86_byte() {
        let joined = vec![b'a', 0x86, b'b'];
        assert_eq!(repair_and_validate(joined).unwrap(), "ab");
    }

    #[test]
    fn still_invalid_after_repair_is_skipped() {
        assert!(repair_and_validate(vec![0xFF, 0xFE]).is_none());
    }

    #[test]
    fn decode_repairs_register_mark_byte_in_raw_name() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&NCL2_SIGNATURE);
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; NAME_FIELD_LEN]); // prefix
        bytes.extend_from_slice(&[0u8; NAME_FIELD_LEN]); // suffix

        let mut name = vec![b'X', 0xAE];
        name.resize(NAME_FIELD_LEN, 0);
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&[0u8; 6]); // Lab16 placeholder

        let swatches = decode(&bytes).unwrap();
        assert_eq!(swatches.len(), 1);
        assert_eq!(swatches[0].name, "X\u{ae}");
    }
}
