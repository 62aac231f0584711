//! ICC v2/v4 profile object model and color-transform pipeline for system
//! color management (§2): color primitives, a per-thread CMM context, the
//! closed enumeration taxonomy, the ICC profile object itself, a pixel
//! transform pipeline, and client-visible device/profile handles.
//!
//! The session-bus surface, device/profile/sensor registry and
//! persistence, sensor drivers, GUI, and CLI/config loading are external
//! collaborators this crate does not implement; see the module docs below
//! for the interfaces it exposes or consumes instead.

#![allow(dead_code)]

pub mod client;
pub mod cmm;
pub mod color;
pub mod context;
pub mod enums;
pub mod error;
pub mod flags;
pub mod locale;
pub mod mlu;
pub mod namedcolorlist;
pub mod profile;
pub mod tag;
pub mod tonecurve;
pub mod transform;

pub use client::{ClientDevice, ClientProfile, DeviceProfileAuthority};
pub use cmm::{CmmBackend, ColorModel, CompiledTransform, RgbModel, SoftwareCmm};
pub use color::{Lab, Rgb, Rgb8, Spectrum, Swatch, Xyz, Yxy, D50};
pub use context::IccContext;
pub use enums::{
    Colorspace, DeviceKind, DeviceMode, DeviceRelation, ObjectScope, PixelFormat, ProfileKind, ProfileQuality,
    ProfileWarning, RenderingIntent, SensorCap, SensorKind, SensorState,
};
pub use error::{IccError, TransformError};
pub use flags::LoadFlags;
pub use locale::Locale;
pub use mlu::{LocalizedText, Mlu};
pub use profile::{IccProfile, ProfileHandle};
pub use tag::{TagSignature, TagTable};
pub use tonecurve::ToneCurve;
pub use transform::{CancelToken, Transform};
