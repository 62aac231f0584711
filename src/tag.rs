//! Tag signatures and the raw tag table.
//!
//! ICC tags are identified by a 4-byte signature ("fourCC"); the table
//! itself is an ordered list (index order is observable through
//! `IccProfile::tags`) of raw byte payloads. Structured tag types
//! (`mluc`, `XYZ`, `curv`, `vcgt`, ...) are encoded/decoded by their own
//! modules (`mlu.rs`, `tonecurve.rs`, `namedcolorlist.rs`) on top of this
//! raw storage.

use crate::error::IccError;

/// Tags larger than this are rejected, matching the bound colord applies
/// to `targ`/`meta`/named-color payloads to avoid pathological allocations
/// from a hostile byte image.
pub const MAX_TAG_SIZE: usize = 16 * 1024 * 1024;

/// A 4-character tag signature, e.g. `desc`, `wtpt`, `vcgt`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TagSignature([u8; 4]);

macro_rules! known_signatures {
    ($( $const_name:ident => $fourcc:literal ),+ $(,)?) => {
        impl TagSignature {
            $(
                pub const $const_name: TagSignature = TagSignature(*$fourcc);
            )+
        }
    };
}

known_signatures! {
    PROFILE_DESCRIPTION => b"desc",
    PROFILE_DESCRIPTION_ML => b"dscm",
    COPYRIGHT => b"cprt",
    DEVICE_MFG_DESC => b"dmnd",
    DEVICE_MODEL_DESC => b"dmdd",
    RED_COLORANT => b"rXYZ",
    GREEN_COLORANT => b"gXYZ",
    BLUE_COLORANT => b"bXYZ",
    RED_TRC => b"rTRC",
    GREEN_TRC => b"gTRC",
    BLUE_TRC => b"bTRC",
    GRAY_TRC => b"kTRC",
    MEDIA_WHITE_POINT => b"wtpt",
    MEDIA_BLACK_POINT => b"bkpt",
    CHROMATIC_ADAPTATION => b"chad",
    METADATA => b"meta",
    NAMED_COLOR2 => b"ncl2",
    CHAR_TARGET => b"targ",
    VCGT => b"vcgt",
    CICP => b"cicp",
    PROFILE_SEQUENCE_DESC => b"pseq",
    TECHNOLOGY => b"tech",
}

impl TagSignature {
    /// Parses a 4-byte ASCII signature, rejecting anything that isn't
    /// printable ASCII, the way `cd_icc_str_to_tag` validates its input.
    pub fn from_fourcc(s: &str) -> Result<Self, IccError> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(IccError::FailedToParse(format!("invalid tag signature '{s}'")));
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    #[must_use]
    pub fn to_fourcc(self) -> String {
        self.0.iter().map(|&b| b as char).collect()
    }
}

impl std::fmt::Display for TagSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_fourcc())
    }
}

/// Ordered raw tag storage: the `IccProfile`'s tag table.
#[derive(Debug, Default, Clone)]
pub struct TagTable {
    entries: Vec<(TagSignature, Vec<u8>)>,
}

impl TagTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signatures present, in index order.
    #[must_use]
    pub fn signatures(&self) -> Vec<TagSignature> {
        self.entries.iter().map(|(sig, _)| *sig).collect()
    }

    #[must_use]
    pub fn get(&self, sig: TagSignature) -> Option<&[u8]> {
        self.entries.iter().find(|(s, _)| *s == sig).map(|(_, data)| data.as_slice())
    }

    pub fn get_or_no_data(&self, sig: TagSignature) -> Result<&[u8], IccError> {
        self.get(sig).ok_or_else(|| IccError::no_data_for_tag(&sig.to_fourcc()))
    }

    /// Writes raw tag data, first deleting any existing entry for this
    /// signature. The delete-then-write two-step mirrors the source's
    /// workaround for a CMM backend that refuses to overwrite a
    /// structured tag with a raw byte blob in place.
    pub fn set(&mut self, sig: TagSignature, data: Vec<u8>) -> Result<(), IccError> {
        if data.len() > MAX_TAG_SIZE {
            return Err(IccError::FailedToSave(format!(
                "tag '{sig}' is {} bytes, exceeds the {MAX_TAG_SIZE} byte bound",
                data.len()
            )));
        }
        self.remove(sig);
        self.entries.push((sig, data));
        Ok(())
    }

    pub fn remove(&mut self, sig: TagSignature) {
        self.entries.retain(|(s, _)| *s != sig);
    }

    #[must_use]
    pub fn contains(&self, sig: TagSignature) -> bool {
        self.get(sig).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_round_trip() {
        let sig = TagSignature::from_fourcc("cprt").unwrap();
        assert_eq!(sig.to_fourcc(), "cprt");
        assert_eq!(sig, TagSignature::COPYRIGHT);
    }

    #[test]
    fn rejects_malformed_fourcc() {
        assert!(TagSignature::from_fourcc("ab").is_err());
        assert!(TagSignature::from_fourcc("\0bcd").is_err());
    }

    #[test]
    fn set_overwrites_rather_than_duplicates() {
        let mut table = TagTable::new();
        table.set(TagSignature::COPYRIGHT, vec![1, 2, 3]).unwrap();
        table.set(TagSignature::COPYRIGHT, vec![4, 5]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(TagSignature::COPYRIGHT), Some(&[4, 5][..]));
    }

    #[test]
    fn rejects_oversized_tag() {
        let mut table = TagTable::new();
        let data = vec![0u8; MAX_TAG_SIZE + 1];
        assert!(table.set(TagSignature::CHAR_TARGET, data).is_err());
    }

    #[test]
    fn index_order_is_preserved() {
        let mut table = TagTable::new();
        table.set(TagSignature::COPYRIGHT, vec![]).unwrap();
        table.set(TagSignature::PROFILE_DESCRIPTION, vec![]).unwrap();
        assert_eq!(
            table.signatures(),
            vec![TagSignature::COPYRIGHT, TagSignature::PROFILE_DESCRIPTION]
        );
    }
}
