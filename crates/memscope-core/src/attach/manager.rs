//! Attach/detach transitions.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::state::{AttachmentState, SharedAttachment};
use crate::backend::SharedBackend;
use crate::error::{InspectError, InspectResult};
use crate::types::{ProcessHandle, ProcessId};

/// Result of a successful attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOutcome
{
    /// The new attachment
    pub state: AttachmentState,
    /// Whether auxiliary instrumentation came up as well
    pub thread_injection_ok: bool,
}

impl AttachOutcome
{
    /// Attached PID
    #[must_use]
    pub fn pid(&self) -> Option<ProcessId>
    {
        self.state.pid()
    }

    /// The one-shot warning to surface, if instrumentation failed
    #[must_use]
    pub fn advisory(&self) -> Option<InspectError>
    {
        match (self.thread_injection_ok, self.state.pid()) {
            (false, Some(pid)) => Some(InspectError::ThreadInjectionPartial(pid)),
            _ => None,
        }
    }
}

/// Callback run inside every attach or detach transition
///
/// Receives the state the transition ended in and runs while the
/// attachment's write lock is still held. It must not touch the attachment.
pub type TransitionHook = Arc<dyn Fn(AttachmentState) + Send + Sync>;

/// Owns the attach/detach lifecycle of the shared [`Attachment`](super::Attachment)
///
/// Every transition runs with the attachment's write lock held, so two
/// attaches, or an attach and a detach, can never overlap, and no memory
/// read can observe a half-finished transition.
#[derive(Clone)]
pub struct AttachManager
{
    backend: SharedBackend,
    attachment: SharedAttachment,
    on_transition: Option<TransitionHook>,
}

impl AttachManager
{
    /// Create a manager over `backend` and the shared `attachment`
    #[must_use]
    pub fn new(backend: SharedBackend, attachment: SharedAttachment) -> Self
    {
        Self {
            backend,
            attachment,
            on_transition: None,
        }
    }

    /// Run `hook` at the end of every transition this manager performs
    #[must_use]
    pub fn with_transition_hook(mut self, hook: TransitionHook) -> Self
    {
        self.on_transition = Some(hook);
        self
    }

    /// Snapshot of the current attachment
    #[must_use]
    pub fn current(&self) -> AttachmentState
    {
        self.attachment.current()
    }

    /// Processes that could be attached to, freshly enumerated
    ///
    /// ## Errors
    ///
    /// Whatever the backend's enumeration reports.
    pub fn list_candidates(&self) -> InspectResult<Vec<ProcessHandle>>
    {
        self.backend.enumerate_processes()
    }

    /// Permission probe; never attaches
    ///
    /// ## Errors
    ///
    /// Whatever the backend's probe reports.
    pub fn can_attach(&self, pid: ProcessId) -> InspectResult<bool>
    {
        self.backend.can_attach(pid)
    }

    /// Attach to `pid`, detaching from any previous process first
    ///
    /// Preconditions are checked in order, each with its own error:
    ///
    /// 1. `pid` is a live process (`InvalidProcess`)
    /// 2. `pid` is not the current attachment (`AlreadyAttached`)
    /// 3. nobody else is tracing `pid` (`AlreadyTraced`, carrying the owner)
    /// 4. the permission probe passes (`PermissionDenied`)
    ///
    /// A failed precondition leaves the current attachment untouched. Once
    /// they pass, the previous attachment (if any) is released before the
    /// backend attaches, so two attachments never coexist.
    ///
    /// A thread-injection failure does not fail the attach; check
    /// [`AttachOutcome::advisory`].
    ///
    /// ## Errors
    ///
    /// The precondition errors above, or backend attach errors. If the
    /// backend attach fails after the previous process was released, the
    /// state is `Detached`.
    pub fn attach(&self, pid: ProcessId) -> InspectResult<AttachOutcome>
    {
        if pid.raw() == 0 {
            return Err(InspectError::InvalidProcess(pid));
        }

        let mut transition = self.attachment.transition();

        if !self.backend.is_valid(pid)? {
            return Err(InspectError::InvalidProcess(pid));
        }
        if transition.state().pid() == Some(pid) {
            return Err(InspectError::AlreadyAttached(pid));
        }
        if let Some(owner) = self.backend.is_traced(pid)? {
            return Err(InspectError::AlreadyTraced { pid, owner });
        }
        if !self.backend.can_attach(pid)? {
            return Err(InspectError::PermissionDenied(pid));
        }

        if let Some(previous) = transition.state().pid() {
            info!(%previous, "Detaching from previous process");
            let released = self.backend.detach();
            transition.set_detached();
            self.notify(AttachmentState::Detached);
            released?;
        }

        let result = self.backend.attach(pid)?;
        if !result.ok {
            return Err(InspectError::AttachFailed(format!("backend declined process {pid}")));
        }

        let state = transition.set_attached(pid);
        self.notify(state);
        info!(%pid, generation = state.generation(), "Attached");
        if !result.thread_injection_ok {
            warn!(%pid, "Unable to inject threads, instrumentation may not work properly");
        }

        Ok(AttachOutcome {
            state,
            thread_injection_ok: result.thread_injection_ok,
        })
    }

    /// Release the current attachment
    ///
    /// Idempotent: with nothing attached this is a no-op.
    ///
    /// ## Errors
    ///
    /// The backend's detach error. The state is `Detached` regardless.
    pub fn detach(&self) -> InspectResult<()>
    {
        let mut transition = self.attachment.transition();
        let Some(pid) = transition.state().pid() else {
            debug!("Detach requested with no attachment");
            return Ok(());
        };

        let released = self.backend.detach();
        transition.set_detached();
        self.notify(AttachmentState::Detached);
        info!(%pid, "Detached");
        released
    }

    fn notify(&self, state: AttachmentState)
    {
        if let Some(hook) = &self.on_transition {
            hook(state);
        }
    }
}
