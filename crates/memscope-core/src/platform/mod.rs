//! # Platform-Specific Implementations
//!
//! Each platform has its own submodule implementing
//! [`DebugBackend`](crate::backend::DebugBackend) with that platform's
//! native facilities:
//!
//! - **Linux**: procfs (`/proc/<pid>/status`, `mem`, `maps`)
//!   - See: [proc(5) man page](https://man7.org/linux/man-pages/man5/proc.5.html)

#[cfg(target_os = "linux")]
pub mod linux;
