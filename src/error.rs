//! The two closed error taxonomies: one for the ICC object, one for the
//! transform pipeline. Both are plain enums matched by callers, not
//! free-form error strings — mirroring colord's `GError` domains
//! (`CD_ICC_ERROR_*`, `CD_TRANSFORM_ERROR_*`) without the mutable message
//! buffer, since `IccContext` already owns that latch (see `context.rs`).

use thiserror::Error;

/// Errors raised by [`crate::profile::IccProfile`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IccError {
    #[error("failed to open: {0}")]
    FailedToOpen(String),

    #[error("failed to parse: {0}")]
    FailedToParse(String),

    #[error("invalid locale: {0}")]
    InvalidLocale(String),

    #[error("no data: {0}")]
    NoData(String),

    #[error("failed to save: {0}")]
    FailedToSave(String),

    #[error("failed to create: {0}")]
    FailedToCreate(String),

    #[error("invalid colorspace: {0}")]
    InvalidColorspace(String),

    #[error("corruption detected: {0}")]
    CorruptionDetected(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("failed to setup transform: {0}")]
    FailedToSetupTransform(String),

    #[error("operation aborted by caller")]
    UserAbort,
}

impl IccError {
    /// A `NoData` error naming the tag that was missing, matching
    /// `cd_context_lcms_error_check`'s "fabricate a generic error with the
    /// tag's signature embedded" fallback.
    #[must_use]
    pub fn no_data_for_tag(tag: &str) -> Self {
        Self::NoData(format!("tag '{tag}' not present"))
    }
}

/// Errors raised by [`crate::transform::Transform::process`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("transform not configured: {0}")]
    FailedToSetupTransform(String),

    #[error("invalid colorspace: {0}")]
    InvalidColorspace(String),

    #[error("operation aborted by caller")]
    UserAbort,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IccError> for TransformError {
    fn from(e: IccError) -> Self {
        match e {
            IccError::FailedToSetupTransform(m) => Self::FailedToSetupTransform(m),
            IccError::InvalidColorspace(m) => Self::InvalidColorspace(m),
            IccError::UserAbort => Self::UserAbort,
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_embeds_tag_signature() {
        let e = IccError::no_data_for_tag("cprt");
        assert!(e.to_string().contains("cprt"));
    }

    #[test]
    fn transform_error_from_icc_error() {
        let e: TransformError = IccError::UserAbort.into();
        assert_eq!(e, TransformError::UserAbort);
    }
}
