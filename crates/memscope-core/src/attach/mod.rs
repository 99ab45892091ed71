//! # Attachment
//!
//! The process-attachment lifecycle: the shared state, the manager that
//! performs transitions, and the supervisor that notices when the target
//! goes away on its own.

pub mod manager;
pub mod state;
pub mod supervisor;

pub use manager::{AttachManager, AttachOutcome, TransitionHook};
pub use state::{Attachment, AttachmentReadGuard, AttachmentState, SharedAttachment};
pub use supervisor::{AttachSupervisor, TerminationHook};
