use colorcore::{ColorModel, IccError, IccProfile, LoadFlags, ProfileKind};

#[test]
fn default_srgb_has_no_primary_warnings() {
    let mut profile = IccProfile::new();
    profile.create_default_srgb().unwrap();
    let warnings = profile.get_warnings();
    assert!(!warnings.iter().any(|w| w.as_str().starts_with("primaries")));
}

#[test]
fn save_and_reload_preserves_colorspace_and_kind() {
    let mut profile = IccProfile::new();
    profile.create_default_srgb().unwrap();
    let bytes = profile.save_bytes(LoadFlags::ALL).unwrap();

    let mut reloaded = IccProfile::new();
    reloaded.load_bytes(&bytes, LoadFlags::ALL).unwrap();
    assert_eq!(reloaded.colorspace, profile.colorspace);
    assert_eq!(reloaded.kind, ProfileKind::DisplayDevice);
}

#[test]
fn load_bytes_twice_is_rejected() {
    let mut profile = IccProfile::new();
    profile.create_default_srgb().unwrap();
    let bytes = profile.save_bytes(LoadFlags::ALL).unwrap();
    let err = profile.load_bytes(&bytes, LoadFlags::ALL).unwrap_err();
    assert!(matches!(err, IccError::FailedToCreate(_)));
}

#[test]
fn build_rgb_model_matches_color_model_enum_variant() {
    let mut profile = IccProfile::new();
    profile.create_default_srgb().unwrap();
    let model = profile.build_rgb_model().unwrap();
    let wrapped = ColorModel::Rgb(model);
    assert!(matches!(wrapped, ColorModel::Rgb(_)));
}
