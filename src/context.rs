//! Per-thread CMM context: a latched error slot plus the registered
//! Rec.709 parametric-curve plug-in, grounded directly on
//! `cd-context-lcms.c`'s `cd_context_lcms_new`/`cd_context_lcms2_error_cb`/
//! `cd_context_lcms_error_check` (colord's LCMS2 context wrapper), with the
//! re-architecture note from the design notes applied: the error slot is
//! owned by the context value itself, not reached through a thread-local
//! raw pointer.

use crate::error::IccError;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Error codes the CMM back-end (`crate::cmm`) may report through the
/// context's logging hook. Named after the `cmsERROR_*` family the source
/// switches on.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CmmErrorCode {
    CorruptionDetected,
    File,
    Read,
    Seek,
    Write,
    ColorspaceCheck,
    BadSignature,
    AlreadyDefined,
    Internal,
    NotSuitable,
    Null,
    Range,
    Undefined,
    UnknownExtension,
}

impl CmmErrorCode {
    fn to_icc_error(self, message: &str) -> IccError {
        match self {
            Self::CorruptionDetected => IccError::CorruptionDetected(message.to_owned()),
            Self::File | Self::Read | Self::Seek => IccError::FailedToOpen(message.to_owned()),
            Self::Write => IccError::FailedToSave(message.to_owned()),
            Self::ColorspaceCheck => IccError::InvalidColorspace(message.to_owned()),
            Self::BadSignature => IccError::FailedToParse(message.to_owned()),
            Self::AlreadyDefined
            | Self::Internal
            | Self::NotSuitable
            | Self::Null
            | Self::Range
            | Self::Undefined
            | Self::UnknownExtension => IccError::Internal(message.to_owned()),
        }
    }
}

/// A Rec.709 parametric-curve plug-in call, registered for the lifetime of
/// the context. See `tonecurve::rec709_forward`/`rec709_reverse` for the
/// evaluator itself; this flag only records that the context has the
/// plug-in available, the way `cmsPluginTHR`'s registration is scoped to
/// one context handle in the source.
#[derive(Debug)]
pub struct IccContext {
    id: u64,
    error: RefCell<Option<IccError>>,
    rec709_registered: bool,
}

impl IccContext {
    /// Creates a context bound to an empty error slot with the Rec.709
    /// plug-in registered.
    #[must_use]
    pub fn new() -> Self {
        Self { id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed), error: RefCell::new(None), rec709_registered: true }
    }

    /// A process-unique id, used by `IccProfile::load_handle` to check that
    /// an adopted handle was allocated under this same context.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn has_rec709_plugin(&self) -> bool {
        self.rec709_registered
    }

    /// The logging hook: on being called, replaces the slot's error if
    /// empty, else prefixes the new message onto the existing one, matching
    /// `cd_context_lcms2_error_cb`'s `g_prefix_error(error_ctx, "%s & ", message)`.
    pub fn log_error(&self, code: CmmErrorCode, message: &str) {
        let mut slot = self.error.borrow_mut();
        match slot.as_mut() {
            Some(existing) => {
                let combined = format!("{message} & {existing}");
                *existing = match existing {
                    IccError::UserAbort => IccError::UserAbort,
                    _ => code.to_icc_error(&combined),
                };
            }
            None => {
                *slot = Some(code.to_icc_error(message));
            }
        }
    }

    /// Records a raw error directly, bypassing code translation; used when
    /// the crate itself (not the CMM back-end) detects the failure.
    pub fn set_error(&self, error: IccError) {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Clears the latched error without inspecting it.
    pub fn error_clear(&self) {
        *self.error.borrow_mut() = None;
    }

    /// Moves the latched error out, if any, clearing the slot either way.
    pub fn error_check(&self) -> Result<(), IccError> {
        match self.error.borrow_mut().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Runs `f` with the error slot cleared first and checked after,
    /// matching the "clear before, check after" contract every CMM call
    /// in the source is sandwiched by.
    pub fn guard<T>(&self, f: impl FnOnce() -> Option<T>) -> Result<T, IccError> {
        self.error_clear();
        match f() {
            Some(value) => self.error_check().map(|()| value),
            None => {
                let err = self.error_check();
                match err {
                    Ok(()) => Err(IccError::Internal("CMM returned no data with no latched error".into())),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

impl Default for IccContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IccContext {
    fn drop(&mut self) {
        self.rec709_registered = false;
        self.error_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_no_error() {
        let ctx = IccContext::new();
        assert!(ctx.error_check().is_ok());
        assert!(ctx.has_rec709_plugin());
    }

    #[test]
    fn first_error_latches() {
        let ctx = IccContext::new();
        ctx.log_error(CmmErrorCode::BadSignature, "bad header");
        let err = ctx.error_check().unwrap_err();
        assert_eq!(err, IccError::FailedToParse("bad header".into()));
        assert!(ctx.error_check().is_ok());
    }

    #[test]
    fn second_error_prefixes_first() {
        let ctx = IccContext::new();
        ctx.log_error(CmmErrorCode::Internal, "first");
        ctx.log_error(CmmErrorCode::Internal, "second");
        let err = ctx.error_check().unwrap_err();
        assert_eq!(err, IccError::Internal("second & first".into()));
    }

    #[test]
    fn contexts_have_distinct_ids() {
        let a = IccContext::new();
        let b = IccContext::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn guard_fabricates_no_data_when_unlatched() {
        let ctx = IccContext::new();
        let result: Result<(), IccError> = ctx.guard(|| None::<()>);
        assert!(matches!(result, Err(IccError::Internal(_))));
    }
}
