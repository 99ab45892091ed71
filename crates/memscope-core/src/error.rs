//! # Error Types
//!
//! General error handling for the inspection core.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and user-facing messages. Every variant renders as a sentence that can be
//! shown to the user as-is.

use thiserror::Error;

use crate::types::ProcessId;

/// Main error type for inspection operations
///
/// ## Error Categories
///
/// 1. **Attach errors**: InvalidProcess, AlreadyAttached, AlreadyTraced,
///    PermissionDenied, AttachFailed, NotAttached
/// 2. **Advisories**: ThreadInjectionPartial (non-fatal, attachment stands)
/// 3. **Per-read errors**: UnresolvedAddress, ReadFault, MalformedData.
///    These never escape the memory accessor's display path; they become a
///    placeholder value instead.
/// 4. **Input errors**: InvalidLength, InvalidValue, UnknownEntry,
///    ScanCommandRejected
/// 5. **Transport errors**: BackendUnavailable, Io
#[derive(Error, Debug)]
pub enum InspectError
{
    /// The target PID does not refer to a live process
    #[error("Selected process is not valid: PID {0}")]
    InvalidProcess(ProcessId),

    /// The target PID is already the current attachment
    #[error("Already attached to process {0}")]
    AlreadyAttached(ProcessId),

    /// Another controller (debugger, tracer) already owns the target
    ///
    /// `owner` identifies the tracer, typically `"name (pid)"`.
    #[error("Process {pid} is already being traced by {owner}, could not attach to the process")]
    AlreadyTraced
    {
        /// The process we tried to attach to
        pid: ProcessId,
        /// Identity of the controller currently tracing it
        owner: String,
    },

    /// The backend refused the attach probe
    ///
    /// On Linux this usually means `/proc/<pid>/mem` cannot be opened: the
    /// target belongs to another user or `kernel.yama.ptrace_scope` forbids
    /// it.
    #[error("Permission denied, could not attach to process {0}")]
    PermissionDenied(ProcessId),

    /// Attach succeeded but auxiliary instrumentation did not
    ///
    /// This is an advisory, not a failure: basic memory reads still work.
    #[error("Attached to process {0}, but thread injection failed; advanced instrumentation may not work")]
    ThreadInjectionPartial(ProcessId),

    /// The backend reported the attach itself as unsuccessful
    #[error("Failed to attach to process: {0}")]
    AttachFailed(String),

    /// Operation requires an active attachment
    #[error("Not attached to a process")]
    NotAttached,

    /// An address expression could not be turned into a numeric address
    #[error("Could not resolve address expression '{0}'")]
    UnresolvedAddress(String),

    /// The backend could not read the requested range
    ///
    /// Happens when the process exits mid-read, the page is protected, or the
    /// pointer is simply invalid.
    #[error("Failed to read {len} bytes at 0x{address:x}: {reason}")]
    ReadFault
    {
        /// Start of the requested range
        address: u64,
        /// Number of bytes requested
        len: usize,
        /// Backend-provided detail
        reason: String,
    },

    /// A buffer did not match the width implied by its value type
    #[error("Malformed data: expected {expected} bytes, got {actual}")]
    MalformedData
    {
        /// Width implied by the value type
        expected: usize,
        /// Width of the buffer actually supplied
        actual: usize,
    },

    /// A string or byte-array type was given no length, or a zero length
    #[error("A length greater than zero is required for {0}")]
    InvalidLength(&'static str),

    /// Text could not be encoded as the requested value type
    #[error("'{text}' is not a valid {kind} value")]
    InvalidValue
    {
        /// Label of the value type
        kind: &'static str,
        /// The offending input
        text: String,
    },

    /// No watch entry exists with this identifier
    #[error("No watch entry with id {0}")]
    UnknownEntry(u64),

    /// A scan command is not enabled in the current session state
    #[error("Cannot {command} while the scan session is {state}")]
    ScanCommandRejected
    {
        /// The rejected command
        command: &'static str,
        /// The state the session was in
        state: &'static str,
    },

    /// The debug transport itself is gone
    ///
    /// Fatal to the current attachment: the supervisor treats it exactly like
    /// a terminated process.
    #[error("Debug backend unavailable: {0}")]
    BackendUnavailable(String),

    /// I/O error (reading `/proc`, log files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InspectError
{
    /// Whether this error belongs to the per-read family that is absorbed
    /// into a placeholder value.
    #[must_use]
    pub fn is_read_error(&self) -> bool
    {
        matches!(
            self,
            Self::UnresolvedAddress(_)
                | Self::ReadFault { .. }
                | Self::MalformedData { .. }
                | Self::InvalidLength(_)
                | Self::NotAttached
        )
    }
}

/// Convenience type alias for `Result<T, InspectError>`
///
/// ```rust
/// use memscope_core::error::InspectResult;
/// fn foo() -> InspectResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type InspectResult<T> = std::result::Result<T, InspectError>;
