//! Client-visible device/profile handles (§4.10): thin, typed proxies an
//! application uses to address a device or profile by stable identifier.
//! Storage and change notification are external — modeled here as the
//! [`DeviceProfileAuthority`] trait — so these types only cache what the
//! authority last told them and relay writes back to it.
//!
//! Grounded on colord's `CdDevice`/`CdProfile` GObject proxies
//! (`cd-device.c`/`cd-profile.c`): one-time `set_object_path` bind that
//! pulls every cached property in a single round trip, `cd_device_*_sync`
//! setters that write through then refresh, and
//! `cd_device_get_profile_for_qualifiers` resolving a qualifier list
//! against the device's profile-relation array.

use crate::enums::{Colorspace, DeviceKind, DeviceMode, DeviceRelation, ProfileKind, ProfileQuality, ProfileWarning};
use crate::error::IccError;
use crate::transform::CancelToken;
use std::collections::BTreeSet;

/// The external collaborator that owns authoritative device/profile state
/// and relation data. A real deployment backs this with the session-bus
/// daemon (out of scope per §1); tests back it with [`tests::MemoryAuthority`].
pub trait DeviceProfileAuthority: Send + Sync {
    fn get_property(&self, object_path: &str, key: &str) -> Option<String>;
    fn set_property(&self, object_path: &str, key: &str, value: &str) -> Result<(), IccError>;
    /// Profiles associated with a device, in the authority's own priority
    /// order (hard relations first; the first entry is the resolved
    /// default). Each entry is `(profile_id, qualifier, relation)`.
    fn list_profiles(&self, object_path: &str) -> Vec<(String, String, DeviceRelation)>;
}

/// Checks a three-token dot-separated qualifier (e.g. `"RGB.Matte.300dpi"`)
/// against a pattern of the same shape where any token may be `*`.
#[must_use]
pub fn qualifier_matches(qualifier: &str, pattern: &str) -> bool {
    let q: Vec<&str> = qualifier.split('.').collect();
    let p: Vec<&str> = pattern.split('.').collect();
    q.len() == 3 && p.len() == 3 && q.iter().zip(p.iter()).all(|(qt, pt)| *pt == "*" || qt == pt)
}

#[derive(Debug, Clone)]
struct DeviceProfileEntry {
    profile_id: String,
    qualifier: String,
    relation: DeviceRelation,
}

/// A client-side device proxy. Caches fields are only valid once
/// [`Self::set_object_path`] has bound it to an authority; reading before
/// that returns the constructor defaults.
#[derive(Debug)]
pub struct ClientDevice {
    object_path: Option<String>,
    pub id: String,
    pub kind: DeviceKind,
    pub mode: DeviceMode,
    pub colorspace: Colorspace,
    pub model: String,
    pub vendor: String,
    pub serial: String,
    pub created: Option<u64>,
    pub modified: Option<u64>,
    metadata: Vec<(String, String)>,
    profiles: Vec<DeviceProfileEntry>,
    profiling_inhibited: bool,
}

impl ClientDevice {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            object_path: None,
            id: id.into(),
            kind: DeviceKind::Unknown,
            mode: DeviceMode::Unknown,
            colorspace: Colorspace::Unknown,
            model: String::new(),
            vendor: String::new(),
            serial: String::new(),
            created: None,
            modified: None,
            metadata: Vec::new(),
            profiles: Vec::new(),
            profiling_inhibited: false,
        }
    }

    #[must_use]
    pub fn object_path(&self) -> Option<&str> {
        self.object_path.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Associated profiles in the authority's priority order (hard
    /// relations first); the first entry, if any, is the resolved default.
    #[must_use]
    pub fn profiles(&self) -> impl Iterator<Item = (&str, DeviceRelation)> {
        self.profiles.iter().map(|e| (e.profile_id.as_str(), e.relation))
    }

    /// Binds this handle to a stable object path and pulls every cached
    /// property from `authority` in one round trip. May only be called
    /// once per handle.
    pub fn set_object_path(&mut self, authority: &dyn DeviceProfileAuthority, path: impl Into<String>) -> Result<(), IccError> {
        if self.object_path.is_some() {
            return Err(IccError::FailedToCreate("device object path already bound".into()));
        }
        self.object_path = Some(path.into());
        self.refresh(authority)
    }

    /// Re-pulls every cached property, as if the authority had just sent a
    /// change notification. Real deployments call this from the bus
    /// notification handler; synchronous callers can call it directly.
    pub fn refresh(&mut self, authority: &dyn DeviceProfileAuthority) -> Result<(), IccError> {
        let path = self.object_path.as_deref().ok_or_else(|| IccError::FailedToCreate("device has no object path".into()))?;
        if let Some(v) = authority.get_property(path, "Kind") {
            self.kind = DeviceKind::parse(&v);
        }
        if let Some(v) = authority.get_property(path, "Mode") {
            self.mode = DeviceMode::parse(&v);
        }
        if let Some(v) = authority.get_property(path, "Colorspace") {
            self.colorspace = Colorspace::parse(&v);
        }
        if let Some(v) = authority.get_property(path, "Model") {
            self.model = v;
        }
        if let Some(v) = authority.get_property(path, "Vendor") {
            self.vendor = v;
        }
        if let Some(v) = authority.get_property(path, "Serial") {
            self.serial = v;
        }
        self.created = authority.get_property(path, "Created").and_then(|v| v.parse().ok());
        self.modified = authority.get_property(path, "Modified").and_then(|v| v.parse().ok());
        self.profiles = authority
            .list_profiles(path)
            .into_iter()
            .map(|(profile_id, qualifier, relation)| DeviceProfileEntry { profile_id, qualifier, relation })
            .collect();
        Ok(())
    }

    /// Writes `Model` through to the authority, then refreshes the local
    /// cache as if its change notification had already arrived.
    pub fn set_model(&mut self, authority: &dyn DeviceProfileAuthority, model: impl Into<String>) -> Result<(), IccError> {
        let path = self.object_path.clone().ok_or_else(|| IccError::FailedToCreate("device has no object path".into()))?;
        authority.set_property(&path, "Model", &model.into())?;
        self.refresh(authority)
    }

    pub fn set_metadata(&mut self, authority: &dyn DeviceProfileAuthority, key: impl Into<String>, value: impl Into<String>) -> Result<(), IccError> {
        let path = self.object_path.clone().ok_or_else(|| IccError::FailedToCreate("device has no object path".into()))?;
        let (key, value) = (key.into(), value.into());
        authority.set_property(&path, &format!("Metadata.{key}"), &value)?;
        match self.metadata.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.metadata.push((key, value)),
        }
        Ok(())
    }

    /// The two-state latch from §4.10: while inhibited,
    /// [`Self::get_profile_for_qualifiers`] always reports no match,
    /// regardless of what profiles are actually associated.
    pub fn inhibit_profiling(&mut self) {
        self.profiling_inhibited = true;
    }

    pub fn uninhibit_profiling(&mut self) {
        self.profiling_inhibited = false;
    }

    #[must_use]
    pub fn is_profiling_inhibited(&self) -> bool {
        self.profiling_inhibited
    }

    /// Tries each pattern left to right; for each, returns the
    /// highest-priority associated profile (authority order, hard first)
    /// whose qualifier matches it. `None` if inhibited or nothing matches
    /// any pattern.
    #[must_use]
    pub fn get_profile_for_qualifiers(&self, qualifiers: &[&str]) -> Option<&str> {
        if self.profiling_inhibited {
            return None;
        }
        for pattern in qualifiers {
            if let Some(entry) = self.profiles.iter().find(|e| qualifier_matches(&e.qualifier, pattern)) {
                return Some(&entry.profile_id);
            }
        }
        None
    }

    /// Promise-style entry point: `on_done` runs with the refreshed result,
    /// or with [`IccError::UserAbort`] if `cancel` was already set.
    /// Synchronous in this crate (there is no bus event loop to suspend
    /// on), matching §4.10's "synchronous and promise-style asynchronous
    /// entry points" as a single implementation with two call shapes.
    pub fn refresh_async(&mut self, authority: &dyn DeviceProfileAuthority, cancel: &CancelToken, on_done: impl FnOnce(Result<(), IccError>)) {
        if cancel.is_cancelled() {
            on_done(Err(IccError::UserAbort));
            return;
        }
        on_done(self.refresh(authority));
    }
}

/// A client-side profile proxy, mirroring [`ClientDevice`]'s cache/refresh
/// shape for the profile-half of §4.10's data model.
#[derive(Debug)]
pub struct ClientProfile {
    object_path: Option<String>,
    pub id: String,
    pub kind: ProfileKind,
    pub filename: Option<String>,
    pub qualifier: Option<String>,
    pub format: Option<String>,
    pub title: String,
    pub colorspace: Colorspace,
    pub created: Option<u64>,
    pub has_vcgt: bool,
    pub is_system_wide: bool,
    pub quality: ProfileQuality,
    pub owner: Option<String>,
    metadata: Vec<(String, String)>,
    warnings: BTreeSet<ProfileWarning>,
}

impl ClientProfile {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            object_path: None,
            id: id.into(),
            kind: ProfileKind::Unknown,
            filename: None,
            qualifier: None,
            format: None,
            title: String::new(),
            colorspace: Colorspace::Unknown,
            created: None,
            has_vcgt: false,
            is_system_wide: false,
            quality: ProfileQuality::Low,
            owner: None,
            metadata: Vec::new(),
            warnings: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn object_path(&self) -> Option<&str> {
        self.object_path.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    #[must_use]
    pub fn warnings(&self) -> &BTreeSet<ProfileWarning> {
        &self.warnings
    }

    pub fn set_object_path(&mut self, authority: &dyn DeviceProfileAuthority, path: impl Into<String>) -> Result<(), IccError> {
        if self.object_path.is_some() {
            return Err(IccError::FailedToCreate("profile object path already bound".into()));
        }
        self.object_path = Some(path.into());
        self.refresh(authority)
    }

    pub fn refresh(&mut self, authority: &dyn DeviceProfileAuthority) -> Result<(), IccError> {
        let path = self.object_path.as_deref().ok_or_else(|| IccError::FailedToCreate("profile has no object path".into()))?;
        if let Some(v) = authority.get_property(path, "Kind") {
            self.kind = ProfileKind::parse(&v);
        }
        self.filename = authority.get_property(path, "Filename");
        self.qualifier = authority.get_property(path, "Qualifier");
        self.format = authority.get_property(path, "Format");
        if let Some(v) = authority.get_property(path, "Title") {
            self.title = v;
        }
        if let Some(v) = authority.get_property(path, "Colorspace") {
            self.colorspace = Colorspace::parse(&v);
        }
        self.created = authority.get_property(path, "Created").and_then(|v| v.parse().ok());
        self.has_vcgt = authority.get_property(path, "HasVcgt").is_some_and(|v| v == "true");
        self.is_system_wide = authority.get_property(path, "IsSystemWide").is_some_and(|v| v == "true");
        if let Some(v) = authority.get_property(path, "Quality") {
            self.quality = ProfileQuality::parse(&v);
        }
        self.owner = authority.get_property(path, "Owner");
        Ok(())
    }

    pub fn set_qualifier(&mut self, authority: &dyn DeviceProfileAuthority, qualifier: impl Into<String>) -> Result<(), IccError> {
        let path = self.object_path.clone().ok_or_else(|| IccError::FailedToCreate("profile has no object path".into()))?;
        authority.set_property(&path, "Qualifier", &qualifier.into())?;
        self.refresh(authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// An in-process stand-in for the session-bus daemon: a flat
    /// `(path, key) -> value` store plus a fixed per-path profile list.
    #[derive(Default)]
    pub struct MemoryAuthority {
        properties: RwLock<HashMap<(String, String), String>>,
        profiles: HashMap<String, Vec<(String, String, DeviceRelation)>>,
    }

    impl MemoryAuthority {
        fn with_property(self, path: &str, key: &str, value: &str) -> Self {
            self.properties.write().unwrap().insert((path.to_string(), key.to_string()), value.to_string());
            self
        }

        fn with_profiles(mut self, path: &str, profiles: Vec<(String, String, DeviceRelation)>) -> Self {
            self.profiles.insert(path.to_string(), profiles);
            self
        }
    }

    impl DeviceProfileAuthority for MemoryAuthority {
        fn get_property(&self, object_path: &str, key: &str) -> Option<String> {
            self.properties.read().unwrap().get(&(object_path.to_string(), key.to_string())).cloned()
        }

        fn set_property(&self, object_path: &str, key: &str, value: &str) -> Result<(), IccError> {
            self.properties.write().unwrap().insert((object_path.to_string(), key.to_string()), value.to_string());
            Ok(())
        }

        fn list_profiles(&self, object_path: &str) -> Vec<(String, String, DeviceRelation)> {
            self.profiles.get(object_path).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn qualifier_wildcards_match_token_wise() {
        assert!(qualifier_matches("RGB.Matte.300dpi", "RGB.*.*"));
        assert!(qualifier_matches("RGB.Matte.300dpi", "*.*.*"));
        assert!(!qualifier_matches("RGB.Matte.300dpi", "CMYK.*.*"));
        assert!(!qualifier_matches("RGB.Matte", "RGB.*.*"));
    }

    #[test]
    fn set_object_path_pulls_cached_properties() {
        let authority = MemoryAuthority::default()
            .with_property("/dev/0", "Kind", "display")
            .with_property("/dev/0", "Mode", "physical")
            .with_property("/dev/0", "Model", "U2720Q");
        let mut device = ClientDevice::new("dev-0");
        device.set_object_path(&authority, "/dev/0").unwrap();
        assert_eq!(device.kind, DeviceKind::Display);
        assert_eq!(device.mode, DeviceMode::Physical);
        assert_eq!(device.model, "U2720Q");
    }

    #[test]
    fn second_set_object_path_fails() {
        let authority = MemoryAuthority::default();
        let mut device = ClientDevice::new("dev-0");
        device.set_object_path(&authority, "/dev/0").unwrap();
        assert!(device.set_object_path(&authority, "/dev/1").is_err());
    }

    #[test]
    fn get_profile_for_qualifiers_prefers_first_matching_pattern() {
        let authority = MemoryAuthority::default().with_profiles(
            "/dev/0",
            vec![
                ("icc-hard".into(), "RGB.Matte.300dpi".into(), DeviceRelation::Hard),
                ("icc-soft".into(), "RGB.Glossy.*".into(), DeviceRelation::Soft),
            ],
        );
        let mut device = ClientDevice::new("dev-0");
        device.set_object_path(&authority, "/dev/0").unwrap();
        assert_eq!(device.get_profile_for_qualifiers(&["RGB.Matte.300dpi"]), Some("icc-hard"));
        assert_eq!(device.get_profile_for_qualifiers(&["CMYK.*.*", "RGB.*.*"]), Some("icc-hard"));
    }

    #[test]
    fn inhibited_device_matches_nothing() {
        let authority = MemoryAuthority::default()
            .with_profiles("/dev/0", vec![("icc-hard".into(), "RGB.Matte.300dpi".into(), DeviceRelation::Hard)]);
        let mut device = ClientDevice::new("dev-0");
        device.set_object_path(&authority, "/dev/0").unwrap();
        device.inhibit_profiling();
        assert_eq!(device.get_profile_for_qualifiers(&["*.*.*"]), None);
    }

    #[test]
    fn set_model_round_trips_through_authority() {
        let authority = MemoryAuthority::default().with_property("/dev/0", "Model", "old");
        let mut device = ClientDevice::new("dev-0");
        device.set_object_path(&authority, "/dev/0").unwrap();
        device.set_model(&authority, "new").unwrap();
        assert_eq!(device.model, "new");
        assert_eq!(authority.get_property("/dev/0", "Model"), Some("new".to_string()));
    }

    #[test]
    fn refresh_async_reports_cancellation() {
        let authority = MemoryAuthority::default();
        let mut device = ClientDevice::new("dev-0");
        device.set_object_path(&authority, "/dev/0").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut result = None;
        device.refresh_async(&authority, &cancel, |r| result = Some(r));
        assert_eq!(result, Some(Err(IccError::UserAbort)));
    }

    #[test]
    fn profile_refresh_reads_flags_and_qualifier() {
        let authority = MemoryAuthority::default()
            .with_property("/icc/0", "Kind", "output-device")
            .with_property("/icc/0", "HasVcgt", "true")
            .with_property("/icc/0", "Qualifier", "RGB.Matte.300dpi");
        let mut profile = ClientProfile::new("icc-0");
        profile.set_object_path(&authority, "/icc/0").unwrap();
        assert_eq!(profile.kind, ProfileKind::OutputDevice);
        assert!(profile.has_vcgt);
        assert_eq!(profile.qualifier.as_deref(), Some("RGB.Matte.300dpi"));
    }
}
