//! Background liveness supervision of the attached process.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{AttachmentState, SharedAttachment};
use crate::backend::SharedBackend;
use crate::error::InspectError;
use crate::events::{EventSender, InspectorEvent, TerminationReason};
use crate::types::ProcessId;

/// Callback run when a supervised process terminates
///
/// Runs synchronously inside the termination transition, before the event
/// is published and before any new attach can start. Use it to reset state
/// that depends on the attachment. It must not touch the attachment itself.
pub type TerminationHook = Arc<dyn Fn(ProcessId) + Send + Sync>;

/// Watches the shared attachment and detects external termination
///
/// One supervisor serves every attachment the inspector makes. Each tick
/// it looks at the current attachment:
///
/// - **Detached**: nothing to watch. This is the idle state, not an error,
///   and never produces a notification.
/// - **Attached**: asks the backend whether the PID is still valid. The
///   first negative answer clears the attachment (detaching the backend),
///   runs the [`TerminationHook`], and emits exactly one
///   [`InspectorEvent::AttachmentTerminated`].
///
/// Because termination clears the attachment, the supervisor goes idle
/// afterwards and re-arms by itself when the next attach happens. The
/// reset only applies if the attachment still has the generation that was
/// probed, so a slow probe can never tear down a newer attachment.
///
/// A backend that reports itself unavailable is treated like a terminated
/// process. Any other probe error is logged and retried on the next tick.
pub struct AttachSupervisor
{
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Watch
{
    backend: SharedBackend,
    attachment: SharedAttachment,
    events: EventSender,
    on_terminated: Option<TerminationHook>,
}

impl AttachSupervisor
{
    /// Start supervising on the current tokio runtime
    ///
    /// ## Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(
        backend: SharedBackend,
        attachment: SharedAttachment,
        events: EventSender,
        interval: Duration,
        on_terminated: Option<TerminationHook>,
    ) -> Self
    {
        let token = CancellationToken::new();
        let watch = Arc::new(Watch {
            backend,
            attachment,
            events,
            on_terminated,
        });
        let handle = tokio::spawn(run(watch, interval, token.clone()));
        Self { token, handle }
    }

    /// Ask the supervisor to stop; it exits within one interval
    pub fn stop(&self)
    {
        self.token.cancel();
    }

    /// Stop the supervisor and wait for it to exit
    pub async fn shutdown(mut self)
    {
        self.token.cancel();
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                warn!(error = %e, "Supervisor task failed");
            }
        }
    }

    /// Whether the background task is still running
    #[must_use]
    pub fn is_running(&self) -> bool
    {
        !self.handle.is_finished()
    }
}

impl Drop for AttachSupervisor
{
    fn drop(&mut self)
    {
        self.token.cancel();
    }
}

async fn run(watch: Arc<Watch>, interval: Duration, token: CancellationToken)
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(?interval, "Supervisor started");

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let AttachmentState::Attached { pid, generation } = watch.attachment.current() else {
            continue;
        };

        let probe = Arc::clone(&watch);
        let reason = match tokio::task::spawn_blocking(move || probe.backend.is_valid(pid)).await {
            Ok(Ok(true)) => continue,
            Ok(Ok(false)) => TerminationReason::Exited,
            Ok(Err(InspectError::BackendUnavailable(detail))) => TerminationReason::BackendLost(detail),
            Ok(Err(e)) => {
                warn!(%pid, error = %e, "Liveness probe failed");
                continue;
            }
            Err(e) => {
                warn!(%pid, error = %e, "Liveness probe task failed");
                continue;
            }
        };

        if token.is_cancelled() {
            break;
        }

        let terminating = Arc::clone(&watch);
        if let Err(e) = tokio::task::spawn_blocking(move || terminating.terminate(pid, generation, reason)).await {
            warn!(%pid, error = %e, "Termination task failed");
        }
    }

    debug!("Supervisor stopped");
}

impl Watch
{
    /// Clear the attachment if it is still `generation` and announce it
    fn terminate(&self, pid: ProcessId, generation: u64, reason: TerminationReason)
    {
        let mut transition = self.attachment.transition();
        if transition.state().generation() != Some(generation) {
            debug!(%pid, generation, "Attachment changed before termination; ignoring");
            return;
        }

        if let Err(e) = self.backend.detach() {
            warn!(%pid, error = %e, "Detach after termination failed");
        }
        transition.set_detached();
        if let Some(hook) = &self.on_terminated {
            hook(pid);
        }

        info!(%pid, ?reason, "Attached process terminated");
        // Published before the transition ends so it precedes anything a
        // later attachment could emit.
        let _ = self.events.send(InspectorEvent::AttachmentTerminated { pid, reason });
    }
}
