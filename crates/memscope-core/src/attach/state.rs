//! The shared attachment handle.
//!
//! There is exactly one [`Attachment`] per inspector. It is shared by
//! reference between the attach manager, the supervisor, and every memory
//! accessor, and guarded by a single `RwLock`:
//!
//! - transitions (attach, detach, supervised termination) take the write
//!   side through [`Attachment::transition`], so only one is ever in flight;
//! - memory reads hold the read side for the duration of the backend call,
//!   so a read never interleaves with a transition, while reads from
//!   different pollers still run concurrently.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::ProcessId;

/// Which process, if any, the inspector is attached to
///
/// Every successful attach gets a fresh `generation`, so two attachments to
/// the same PID are still distinguishable. The supervisor relies on this to
/// never act on an attachment newer than the one it observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachmentState
{
    /// No attachment
    #[default]
    Detached,
    /// Attached to `pid`
    Attached
    {
        /// Attached process (never 0)
        pid: ProcessId,
        /// Monotonic attachment counter
        generation: u64,
    },
}

impl AttachmentState
{
    /// Attached PID, if any
    #[must_use]
    pub const fn pid(self) -> Option<ProcessId>
    {
        match self {
            Self::Detached => None,
            Self::Attached { pid, .. } => Some(pid),
        }
    }

    /// Attachment generation, if any
    #[must_use]
    pub const fn generation(self) -> Option<u64>
    {
        match self {
            Self::Detached => None,
            Self::Attached { generation, .. } => Some(generation),
        }
    }

    /// Whether a process is attached
    #[must_use]
    pub const fn is_attached(self) -> bool
    {
        matches!(self, Self::Attached { .. })
    }
}

impl fmt::Display for AttachmentState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Detached => write!(f, "No Process Selected"),
            Self::Attached { pid, .. } => write!(f, "Attached to {pid}"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner
{
    state: AttachmentState,
    generations: u64,
}

/// Single-writer owner of the current [`AttachmentState`]
#[derive(Debug, Default)]
pub struct Attachment
{
    inner: RwLock<Inner>,
}

/// Shared handle to the attachment
pub type SharedAttachment = Arc<Attachment>;

impl Attachment
{
    /// A detached attachment
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// A detached attachment, ready to share
    #[must_use]
    pub fn shared() -> SharedAttachment
    {
        Arc::new(Self::new())
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn current(&self) -> AttachmentState
    {
        self.read().state()
    }

    /// Hold the state steady while a backend read is in flight
    ///
    /// Blocks while a transition is in progress. Do not call any other
    /// `Attachment` method while holding the guard.
    pub fn read(&self) -> AttachmentReadGuard<'_>
    {
        AttachmentReadGuard(self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Begin a transition; blocks until no reads or transitions are in flight
    pub(crate) fn transition(&self) -> Transition<'_>
    {
        Transition(self.inner.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Read access to the attachment for the lifetime of the guard
pub struct AttachmentReadGuard<'a>(RwLockReadGuard<'a, Inner>);

impl AttachmentReadGuard<'_>
{
    /// State as of when the guard was taken; cannot change while it is held
    #[must_use]
    pub fn state(&self) -> AttachmentState
    {
        self.0.state
    }
}

/// Exclusive access to the attachment for one transition
pub(crate) struct Transition<'a>(RwLockWriteGuard<'a, Inner>);

impl Transition<'_>
{
    pub(crate) fn state(&self) -> AttachmentState
    {
        self.0.state
    }

    pub(crate) fn set_attached(&mut self, pid: ProcessId) -> AttachmentState
    {
        debug_assert_ne!(pid.raw(), 0, "pid 0 cannot be attached");
        self.0.generations += 1;
        self.0.state = AttachmentState::Attached {
            pid,
            generation: self.0.generations,
        };
        self.0.state
    }

    pub(crate) fn set_detached(&mut self)
    {
        self.0.state = AttachmentState::Detached;
    }
}
