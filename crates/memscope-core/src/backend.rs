//! # Debug Backend Trait
//!
//! The interface the core uses to talk to the operating system.
//!
//! Everything that touches a real process goes through this trait:
//! enumeration, liveness, tracer detection, attach/detach, memory reads,
//! symbol translation, and memory map enumeration. The rest of the crate is
//! written against `dyn DebugBackend`, which keeps it platform-agnostic and
//! lets tests drive it with a scripted in-memory implementation.
//!
//! ## Platform Support
//!
//! - **Linux**: [`ProcfsBackend`](crate::platform::linux::ProcfsBackend),
//!   built on `/proc/<pid>/{status,mem,maps}`
//! - **Other platforms**: not yet implemented; [`create_backend`] errors

use std::sync::Arc;

use crate::error::InspectResult;
use crate::types::{Address, MemoryRegion, ProcessHandle, ProcessId, RegionFilter};

/// Outcome of a successful backend attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendAttach
{
    /// Whether the attach itself went through
    pub ok: bool,
    /// Whether auxiliary instrumentation was set up as well
    pub thread_injection_ok: bool,
}

/// Operations a debug backend provides
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: the supervisor and every live
/// watch poller call into the same backend from background tasks. The core
/// serializes attach/detach itself (see
/// [`Attachment`](crate::attach::Attachment)); implementations only need to
/// make individual calls safe to run concurrently with reads.
///
/// ## Blocking
///
/// All methods are synchronous and assumed to be short. Async callers run
/// them on `tokio::task::spawn_blocking`.
pub trait DebugBackend: Send + Sync
{
    /// List processes that could be attached to
    ///
    /// Recomputed on every call; nothing is cached.
    ///
    /// ## Errors
    ///
    /// - `Io`: the process table could not be read
    fn enumerate_processes(&self) -> InspectResult<Vec<ProcessHandle>>;

    /// Whether `pid` refers to a live process
    ///
    /// ## Errors
    ///
    /// - `BackendUnavailable`: the transport is down; liveness is unknown
    fn is_valid(&self, pid: ProcessId) -> InspectResult<bool>;

    /// Identity of whoever is already tracing `pid`, if anyone
    ///
    /// ## Errors
    ///
    /// - `InvalidProcess`: `pid` vanished while being inspected
    fn is_traced(&self, pid: ProcessId) -> InspectResult<Option<String>>;

    /// Permission probe: could we attach to `pid` right now?
    ///
    /// Must not attach.
    ///
    /// ## Errors
    ///
    /// - `BackendUnavailable`: the transport is down
    fn can_attach(&self, pid: ProcessId) -> InspectResult<bool>;

    /// Attach to `pid`
    ///
    /// The core guarantees no other attachment is active when this is
    /// called.
    ///
    /// ## Errors
    ///
    /// - `PermissionDenied`, `InvalidProcess`, `AttachFailed`
    fn attach(&self, pid: ProcessId) -> InspectResult<BackendAttach>;

    /// Release the current attachment
    ///
    /// Idempotent: detaching with nothing attached succeeds.
    ///
    /// ## Errors
    ///
    /// - `BackendUnavailable`: the transport is down
    fn detach(&self) -> InspectResult<()>;

    /// Read `len` bytes at `address` from the attached process
    ///
    /// ## Errors
    ///
    /// - `NotAttached`: nothing is attached
    /// - `ReadFault`: the range is unreadable (exited, protected, unmapped)
    fn read_memory(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>;

    /// Resolve a symbolic expression such as `libc.so.6+0x10` to an address
    ///
    /// ## Errors
    ///
    /// - `UnresolvedAddress`: the expression names nothing known
    fn resolve_symbol(&self, expr: &str) -> InspectResult<Address>;

    /// Best-effort symbolic rendering of `address`
    ///
    /// Falls back to the hex literal; never fails.
    fn symbolize(&self, address: Address) -> String;

    /// Memory map of `pid`, filtered by permission
    ///
    /// ## Errors
    ///
    /// - `InvalidProcess`: `pid` is gone
    /// - `Io`: the map could not be read
    fn enumerate_memory_regions(&self, pid: ProcessId, filter: RegionFilter) -> InspectResult<Vec<MemoryRegion>>;
}

/// Shared, type-erased backend handle
pub type SharedBackend = Arc<dyn DebugBackend>;

/// Create the backend for the current platform
///
/// ## Platform Support
///
/// - ✅ Linux: returns [`ProcfsBackend`](crate::platform::linux::ProcfsBackend)
/// - ⏳ macOS / Windows: not yet implemented
///
/// ## Errors
///
/// `BackendUnavailable` on platforms without a backend.
pub fn create_backend() -> InspectResult<SharedBackend>
{
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(crate::platform::linux::ProcfsBackend::new()))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(crate::error::InspectError::BackendUnavailable(format!(
            "no debug backend for platform: {}",
            std::env::consts::OS
        )))
    }
}
