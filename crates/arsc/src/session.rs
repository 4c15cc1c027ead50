use crate::errors::ArscError;

/// Per-session decode options.
///
/// Every switch lives here instead of in process-wide state, so independent
/// sessions can decode with different settings in parallel.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecodeOptions {
    /// Accept malformed chunks: skip to the next chunk boundary instead of
    /// failing. Referential failures downgrade to warnings and synthetic
    /// placeholders.
    pub keep_broken: bool,

    /// Suppress post-decode mutations: every decoded package stays in the
    /// main set instead of the selection in
    /// [`crate::decoder::select_main_packages`].
    pub analysis_mode: bool,

    /// Treat the package id as non-standard (permits id < 0x7f without
    /// complaint, including the shared-library id 0).
    pub shared_library: bool,

    /// Hint that the input uses sparse type encoding (aapt2
    /// `--enable-sparse-encoding`). Only used for diagnostics.
    pub sparse_resources: bool,

    /// Replace an existing resource when a second one arrives for the same
    /// (spec, config) pair instead of failing with
    /// [`ArscError::DuplicateResource`].
    pub overwrite: bool,
}

/// Cooperative cancellation, polled between top-level chunks.
pub type CancelFn<'a> = dyn Fn() -> bool + 'a;

/// A single decode session: options plus the cancellation hook.
///
/// Sessions are not shared across threads; the decoder owns one for the
/// duration of a decode call.
pub struct Session<'a> {
    pub options: DecodeOptions,
    cancel: Option<&'a CancelFn<'a>>,
}

impl<'a> Session<'a> {
    pub fn new(options: DecodeOptions) -> Session<'a> {
        Session {
            options,
            cancel: None,
        }
    }

    pub fn with_cancel(options: DecodeOptions, cancel: &'a CancelFn<'a>) -> Session<'a> {
        Session {
            options,
            cancel: Some(cancel),
        }
    }

    /// True when structural failures should be recovered instead of raised.
    #[inline(always)]
    pub fn lenient(&self) -> bool {
        self.options.keep_broken
    }

    /// Poll the caller's cancellation predicate.
    pub fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f())
    }

    /// Raise `err` in strict mode, hand it back for recording in lenient mode.
    pub fn recover(&self, err: ArscError) -> Result<ArscError, ArscError> {
        if self.lenient() { Ok(err) } else { Err(err) }
    }
}
