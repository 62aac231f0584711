//! Closed taxonomies shared across the crate.
//!
//! Every enum here round-trips through a stable, lowercase, hyphen-separated
//! wire spelling and falls through to `Unknown`/`None` rather than erroring
//! on an unrecognised string — callers that read tags from a profile written
//! by a newer implementation should not crash on an enum value they don't
//! recognise.

use std::fmt;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $variant:ident => $wire:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }

            #[must_use]
            pub fn parse(s: &str) -> Self {
                match s {
                    $( $wire => Self::$variant, )+
                    _ => Self::default_unknown(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    pub enum DeviceKind {
        Unknown => "unknown",
        Display => "display",
        Scanner => "scanner",
        Printer => "printer",
        Camera => "camera",
        Webcam => "webcam",
    }
}

wire_enum! {
    pub enum ProfileKind {
        Unknown => "unknown",
        InputDevice => "input-device",
        DisplayDevice => "display-device",
        OutputDevice => "output-device",
        DeviceLink => "devicelink",
        ColorspaceConversion => "colorspace-conversion",
        Abstract => "abstract",
        NamedColor => "named-color",
    }
}

wire_enum! {
    pub enum RenderingIntent {
        Unknown => "unknown",
        Perceptual => "perceptual",
        RelativeColorimetric => "relative-colorimetric",
        Saturation => "saturation",
        AbsoluteColorimetric => "absolute-colorimetric",
    }
}

wire_enum! {
    pub enum Colorspace {
        Unknown => "unknown",
        Xyz => "xyz",
        Lab => "lab",
        Luv => "luv",
        YCbCr => "ycbcr",
        Yxy => "yxy",
        Rgb => "rgb",
        Gray => "gray",
        Hsv => "hsv",
        Cmyk => "cmyk",
        Cmy => "cmy",
    }
}

wire_enum! {
    pub enum DeviceMode {
        Unknown => "unknown",
        Physical => "physical",
        Virtual => "virtual",
    }
}

wire_enum! {
    pub enum DeviceRelation {
        Unknown => "unknown",
        Hard => "hard",
        Soft => "soft",
    }
}

wire_enum! {
    pub enum ObjectScope {
        Unknown => "unknown",
        Normal => "normal",
        Temp => "temp",
        Disk => "disk",
    }
}

wire_enum! {
    pub enum ProfileWarning {
        None => "none",
        DescriptionMissing => "description-missing",
        CopyrightMissing => "copyright-missing",
        VcgtNonMonotonic => "vcgt-non-monotonic",
        ScumDot => "scum-dot",
        GrayAxisInvalid => "gray-axis-invalid",
        GrayAxisNonMonotonic => "gray-axis-non-monotonic",
        PrimariesInvalid => "primaries-invalid",
        PrimariesNonAdditive => "primaries-non-additive",
        PrimariesUnlikely => "primaries-unlikely",
        WhitepointInvalid => "whitepoint-invalid",
        WhitepointUnlikely => "whitepoint-unlikely",
    }
}

wire_enum! {
    pub enum SensorKind {
        Unknown => "unknown",
        Dummy => "dummy",
        Huey => "huey",
        ColorMunki => "color-munki",
        Spyder => "spyder",
        I1Display3 => "i1-display3",
        ColorHug => "colorhug",
    }
}

wire_enum! {
    pub enum SensorState {
        Unknown => "unknown",
        Starting => "starting",
        Idle => "idle",
        Measuring => "measuring",
        Busy => "busy",
    }
}

wire_enum! {
    pub enum SensorCap {
        Unknown => "unknown",
        Lcd => "lcd",
        Crt => "crt",
        Printer => "printer",
        Spot => "spot",
        Projector => "projector",
        Ambient => "ambient",
        Calibration => "calibration",
        LedDisplay => "led",
    }
}

/// Per-channel pixel format. The numeric bytes-per-pixel are fixed
/// properties of the wire format, not something a caller can override.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Unknown,
    Argb32,
    Rgb24,
    Bgra32,
    Rgba32,
    Cmyk32,
}

impl PixelFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Argb32 => "argb32",
            Self::Rgb24 => "rgb24",
            Self::Bgra32 => "bgra32",
            Self::Rgba32 => "rgba32",
            Self::Cmyk32 => "cmyk32",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "argb32" => Self::Argb32,
            "rgb24" => Self::Rgb24,
            "bgra32" => Self::Bgra32,
            "rgba32" => Self::Rgba32,
            "cmyk32" => Self::Cmyk32,
            _ => Self::Unknown,
        }
    }

    /// Bytes occupied by one pixel on the wire.
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Argb32 | Self::Bgra32 | Self::Rgba32 | Self::Cmyk32 => 4,
            Self::Unknown => 0,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

wire_enum! {
    pub enum ProfileQuality {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

trait DefaultUnknown {
    fn default_unknown() -> Self;
}

macro_rules! default_unknown_variant {
    ($name:ident, $variant:ident) => {
        impl DefaultUnknown for $name {
            fn default_unknown() -> Self {
                Self::$variant
            }
        }
    };
}

default_unknown_variant!(DeviceKind, Unknown);
default_unknown_variant!(ProfileKind, Unknown);
default_unknown_variant!(RenderingIntent, Unknown);
default_unknown_variant!(Colorspace, Unknown);
default_unknown_variant!(DeviceMode, Unknown);
default_unknown_variant!(DeviceRelation, Unknown);
default_unknown_variant!(ObjectScope, Unknown);
default_unknown_variant!(ProfileWarning, None);
default_unknown_variant!(SensorKind, Unknown);
default_unknown_variant!(SensorState, Unknown);
default_unknown_variant!(SensorCap, Unknown);
default_unknown_variant!(ProfileQuality, Low);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        assert_eq!(RenderingIntent::parse("perceptual"), RenderingIntent::Perceptual);
        assert_eq!(RenderingIntent::Perceptual.as_str(), "perceptual");
        assert_eq!(Colorspace::parse("bogus"), Colorspace::Unknown);
        assert_eq!(ProfileWarning::parse("bogus"), ProfileWarning::None);
    }

    #[test]
    fn pixel_format_bpp() {
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Argb32.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Cmyk32.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Unknown.bytes_per_pixel(), 0);
    }
}
