//! # Types
//!
//! Plain data types shared by every component: addresses, process
//! snapshots, memory regions, and value types.

pub mod address;
pub mod process;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use process::{MemoryRegion, ProcessHandle, ProcessId, RegionFilter};
pub use value::{ValueKind, ValueType};
