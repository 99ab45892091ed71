//! Common module for library exports

pub use crate::attach::{AttachManager, AttachOutcome, AttachSupervisor, Attachment, AttachmentState};
pub use crate::backend::{create_backend, BackendAttach, DebugBackend, SharedBackend};
pub use crate::config::InspectorConfig;
pub use crate::error::{InspectError, InspectResult};
pub use crate::events::{InspectorEvent, TerminationReason};
pub use crate::inspector::Inspector;
pub use crate::memory::MemoryAccessor;
pub use crate::scan::{ScanCommand, ScanScope, ScanSession, ScanSessionState};
pub use crate::types::{Address, MemoryRegion, ProcessHandle, ProcessId, RegionFilter, ValueKind, ValueType};
pub use crate::watch::{InspectFields, LiveWatchPoller, SurfaceId, WatchEntry, WatchEntryId, WatchList};
