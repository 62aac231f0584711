//! Already-parsed EDID fields `create_from_edid_data` consumes.
//!
//! The USB/udev EDID *parsing* itself (`cd-edid.c`'s binary block reader) is
//! out of scope per spec §1; this is the plain data handed to the ICC
//! object once some other layer has already done that parsing.

use crate::color::Yxy;

#[derive(Debug, Clone, Default)]
pub struct EdidInfo {
    pub gamma: f64,
    pub red: Yxy,
    pub green: Yxy,
    pub blue: Yxy,
    pub white: Yxy,
    pub checksum_md5: Option<String>,
    pub monitor_name: Option<String>,
    pub serial_number: Option<String>,
    pub pnp_id: Option<String>,
    pub vendor_name: Option<String>,
}
