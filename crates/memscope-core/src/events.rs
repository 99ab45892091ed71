//! Inspector event types and helpers.
//!
//! Higher layers (the CLI, a future GUI) consume these events to react to
//! asynchronous changes without polling: the attached process going away,
//! and watched values being re-read by a background task.

use tokio::sync::mpsc;

use crate::types::ProcessId;
use crate::watch::{SurfaceId, WatchEntryId};

/// Why an attachment ended without being detached by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason
{
    /// The backend reported the process as no longer valid
    Exited,
    /// The debug transport itself went away
    BackendLost(String),
}

/// Event emitted by the inspector's background tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectorEvent
{
    /// The attached process terminated; the attachment has been cleared.
    ///
    /// Sent at most once per attachment.
    AttachmentTerminated
    {
        /// The process that went away
        pid: ProcessId,
        /// What the supervisor observed
        reason: TerminationReason,
    },
    /// A live watch surface re-read its address
    SurfaceValueUpdated
    {
        /// Which surface
        surface: SurfaceId,
        /// Display value, or the placeholder if the read failed
        value: String,
    },
    /// A watch-list refresh changed an entry's cached value
    EntryValueUpdated
    {
        /// Which entry
        id: WatchEntryId,
        /// New display value
        value: String,
    },
}

impl InspectorEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::AttachmentTerminated {
                pid,
                reason: TerminationReason::Exited,
            } => format!("Process {pid} has been terminated"),
            Self::AttachmentTerminated {
                pid,
                reason: TerminationReason::BackendLost(detail),
            } => format!("Lost debug backend while attached to {pid}: {detail}"),
            Self::SurfaceValueUpdated { surface, value } => format!("[surface {}] {value}", surface.0),
            Self::EntryValueUpdated { id, value } => format!("[entry {}] {value}", id.0),
        }
    }
}

/// Sender side of the inspector event channel.
pub type EventSender = mpsc::UnboundedSender<InspectorEvent>;
/// Receiver side of the inspector event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<InspectorEvent>;

/// Create a new inspector event channel.
///
/// Unbounded so that background tasks can publish from inside a transition
/// without awaiting.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver)
{
    mpsc::unbounded_channel()
}
