//! Multi-localized Unicode ("MLU") tag codec and the ICC object's
//! locale-keyed text store.
//!
//! LCMS2's `cmsMLU` is an opaque handle; there is no FFI boundary left to
//! wrap here, so `Mlu` is the plain in-memory model the binary `mluc` tag
//! type serializes to/from, and `LocalizedText` is the four locale-keyed
//! mappings `IccProfile` stores (description, copyright, manufacturer,
//! model).

use crate::error::IccError;
use crate::locale::Locale;
use std::collections::BTreeMap;

const MLUC_SIGNATURE: [u8; 4] = *b"mluc";
const DESC_SIGNATURE: [u8; 4] = *b"desc";

/// One `mluc` tag's worth of per-locale text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mlu {
    entries: BTreeMap<Locale, String>,
}

impl Mlu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, locale: Locale, text: impl Into<String>) {
        self.entries.insert(locale, text.into());
    }

    #[must_use]
    pub fn get(&self, locale: &Locale) -> Option<&str> {
        self.entries.get(locale).map(String::as_str)
    }

    #[must_use]
    pub fn locales(&self) -> Vec<Locale> {
        self.entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes as a v4-style `mluc` tag: a 12-byte header, a record table,
    /// then UTF-16BE string data.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MLUC_SIGNATURE);
        out.extend_from_slice(&[0; 4]); // reserved
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        out.extend_from_slice(&12u32.to_be_bytes()); // record size

        let header_len = 12 + self.entries.len() * 12;
        let mut data = Vec::new();
        let mut records = Vec::new();
        for (locale, text) in &self.entries {
            let (lang, country) = split_locale(locale);
            let utf16: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
            records.push((lang, country, utf16.len() as u32, (header_len + data.len()) as u32));
            data.extend_from_slice(&utf16);
        }
        for (lang, country, len, offset) in records {
            out.extend_from_slice(&lang);
            out.extend_from_slice(&country);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out.extend_from_slice(&data);
        out
    }

    /// Decodes an `mluc` tag payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, IccError> {
        if bytes.len() < 16 || bytes[0..4] != MLUC_SIGNATURE {
            return Err(IccError::FailedToParse("not an mluc tag".into()));
        }
        let count = u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let record_size = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let mut entries = BTreeMap::new();
        for i in 0..count {
            let rec_off = 16 + i * record_size;
            let rec = bytes
                .get(rec_off..rec_off + 12)
                .ok_or_else(|| IccError::CorruptionDetected("mluc record truncated".into()))?;
            let lang = [rec[0], rec[1]];
            let country = [rec[2], rec[3]];
            let len = u32::from_be_bytes(rec[4..8].try_into().unwrap()) as usize;
            let offset = u32::from_be_bytes(rec[8..12].try_into().unwrap()) as usize;
            let raw = bytes
                .get(offset..offset + len)
                .ok_or_else(|| IccError::CorruptionDetected("mluc string data truncated".into()))?;
            if raw.len() % 2 != 0 {
                return Err(IccError::CorruptionDetected("mluc string has odd byte length".into()));
            }
            let units: Vec<u16> = raw.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
            let text = String::from_utf16(&units)
                .map_err(|_| IccError::CorruptionDetected("mluc string is not valid UTF-16".into()))?;
            let locale = join_locale(lang, country);
            entries.insert(locale, text);
        }
        Ok(Self { entries })
    }

    /// Encodes the default-locale entry as a v2 `textDescriptionType`
    /// (`desc`): ASCII payload only, empty Unicode and Macintosh sections.
    #[must_use]
    pub fn encode_v2_desc(&self) -> Vec<u8> {
        let ascii = self
            .get(&Locale::default_locale())
            .map(str::to_owned)
            .unwrap_or_default();
        let mut cstr = ascii.into_bytes();
        cstr.push(0);

        let mut out = Vec::new();
        out.extend_from_slice(&DESC_SIGNATURE);
        out.extend_from_slice(&[0; 4]); // reserved
        out.extend_from_slice(&(cstr.len() as u32).to_be_bytes());
        out.extend_from_slice(&cstr);
        out.extend_from_slice(&[0; 4]); // Unicode language code
        out.extend_from_slice(&0u32.to_be_bytes()); // Unicode count
        out.extend_from_slice(&[0; 2]); // ScriptCode code
        out.push(0); // Macintosh count
        out.extend_from_slice(&[0; 67]); // Macintosh data
        out
    }

    /// Decodes a v2 `textDescriptionType`, reading only the ASCII section.
    pub fn decode_v2_desc(bytes: &[u8]) -> Result<Self, IccError> {
        if bytes.len() < 12 || bytes[0..4] != DESC_SIGNATURE {
            return Err(IccError::FailedToParse("not a textDescriptionType tag".into()));
        }
        let count = u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let ascii = bytes
            .get(12..12 + count)
            .ok_or_else(|| IccError::CorruptionDetected("desc ASCII section truncated".into()))?;
        let text = String::from_utf8(ascii.iter().take_while(|&&b| b != 0).copied().collect())
            .map_err(|_| IccError::CorruptionDetected("desc ASCII section is not valid UTF-8".into()))?;
        let mut mlu = Self::new();
        mlu.set(Locale::default_locale(), text);
        Ok(mlu)
    }
}

fn split_locale(locale: &Locale) -> ([u8; 2], [u8; 2]) {
    let s = locale.as_str();
    let mut parts = s.splitn(2, '_');
    let lang = parts.next().unwrap_or("");
    let country = parts.next().unwrap_or("");
    let pack = |s: &str| {
        let mut buf = [b' '; 2];
        for (b, c) in buf.iter_mut().zip(s.bytes()) {
            *b = c;
        }
        buf
    };
    (pack(lang), pack(country))
}

fn join_locale(lang: [u8; 2], country: [u8; 2]) -> Locale {
    let trim = |b: [u8; 2]| -> String { b.iter().filter(|&&c| c != b' ' && c != 0).map(|&c| c as char).collect() };
    let lang = trim(lang);
    let country = trim(country);
    let s = if lang.is_empty() {
        String::new()
    } else if country.is_empty() {
        lang
    } else {
        format!("{lang}_{country}")
    };
    Locale::normalize(&s).unwrap_or_else(|_| Locale::default_locale())
}

/// The four locale-keyed localized-text fields an `IccProfile` stores.
#[derive(Debug, Clone, Default)]
pub struct LocalizedText {
    pub description: Mlu,
    pub copyright: Mlu,
    pub manufacturer: Mlu,
    pub model: Mlu,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mluc_round_trips_unicode() {
        let mut mlu = Mlu::new();
        mlu.set(Locale::default_locale(), "hello");
        mlu.set(Locale::normalize("fr").unwrap(), "bonjour \u{e9}t\u{e9}");
        let bytes = mlu.encode();
        let back = Mlu::decode(&bytes).unwrap();
        assert_eq!(back.get(&Locale::default_locale()), Some("hello"));
        assert_eq!(back.get(&Locale::normalize("fr").unwrap()), Some("bonjour \u{e9}t\u{e9}"));
    }

    #[test]
    fn v2_desc_round_trips_ascii() {
        let mut mlu = Mlu::new();
        mlu.set(Locale::default_locale(), "sRGB built-in");
        let bytes = mlu.encode_v2_desc();
        let back = Mlu::decode_v2_desc(&bytes).unwrap();
        assert_eq!(back.get(&Locale::default_locale()), Some("sRGB built-in"));
    }

    #[test]
    fn empty_mlu_round_trips() {
        let mlu = Mlu::new();
        let bytes = mlu.encode();
        let back = Mlu::decode(&bytes).unwrap();
        assert!(back.is_empty());
    }
}
