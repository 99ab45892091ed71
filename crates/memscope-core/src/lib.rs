//! # memscope-core
//!
//! Process attachment and live memory inspection for memscope.
//!
//! This crate provides:
//! - Attaching to a process, with ordered precondition checks
//! - Background supervision that notices when the target exits
//! - Typed single-address reads with placeholder fallback
//! - Live inspect surfaces that re-read after every edit
//! - A watch list with frozen entries
//! - The scan-session state machine
//!
//! All of it is reachable through [`Inspector`]; the components are public
//! for callers that want to wire them differently.
//!
//! ## Platform Support
//!
//! - **Linux**: procfs backend (`/proc/<pid>/mem`, `/proc/<pid>/maps`)
//! - Other platforms: implement [`DebugBackend`] and pass it in
//!
//! ## Concurrency
//!
//! The attachment is one `RwLock`-guarded state shared by every component.
//! Attach, detach and supervised termination take the write side one at a
//! time; reads hold the read side for the duration of the backend call.
//! Background loops run on tokio and stop through cancellation tokens.

pub mod attach;
pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod inspector;
pub mod memory;
pub mod platform;
pub mod prelude;
pub mod scan;
pub mod types;
pub mod watch;

pub use backend::{create_backend, DebugBackend, SharedBackend};
pub use error::{InspectError, InspectResult};
pub use inspector::Inspector;
#[cfg(target_os = "linux")]
pub use platform::linux::ProcfsBackend;
pub use types::{Address, ProcessId, ValueKind, ValueType};
