//! Process and memory region types.

use std::fmt;

use super::Address;

/// Process identifier (PID)
///
/// Newtype over the kernel's `u32` PID so a process id cannot be confused
/// with any other integer.
///
/// ```rust
/// use memscope_core::types::ProcessId;
///
/// let pid = ProcessId::from(100);
/// assert_eq!(u32::from(pid), 100);
/// assert_eq!(pid.to_string(), "100");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl ProcessId
{
    /// Raw PID value
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a process that could be attached to
///
/// Produced by enumeration and never updated in place; callers re-enumerate
/// to get fresh data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle
{
    /// Process id
    pub pid: ProcessId,
    /// Short process name (`comm` on Linux)
    pub name: String,
    /// Name of the owning user, or the numeric uid if it cannot be resolved
    pub owner: String,
}

impl ProcessHandle
{
    /// Create a new process snapshot
    pub fn new(pid: impl Into<ProcessId>, name: impl Into<String>, owner: impl Into<String>) -> Self
    {
        Self {
            pid: pid.into(),
            name: name.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for ProcessHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} - {}", self.pid, self.name)
    }
}

/// Memory region in a process
///
/// A contiguous mapping such as the stack, heap, or a file-backed segment.
///
/// ```
/// use memscope_core::types::{Address, MemoryRegion};
///
/// let heap = MemoryRegion::new(
///     Address::from(0x2000),
///     Address::from(0x3000),
///     "rw-p".to_string(),
///     Some("[heap]".to_string()),
/// );
/// assert_eq!(heap.size(), 0x1000);
/// assert!(heap.is_writable());
/// assert!(heap.contains(Address::from(0x2fff)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion
{
    /// Start address (inclusive)
    pub start: Address,
    /// End address (exclusive)
    pub end: Address,
    /// Permission string as the kernel prints it, e.g. `"r-xp"`
    pub permissions: String,
    /// Backing path or pseudo-name (`[heap]`, `[stack]`), if any
    pub name: Option<String>,
}

impl MemoryRegion
{
    /// Create a new memory region
    #[must_use]
    pub fn new(start: Address, end: Address, permissions: String, name: Option<String>) -> Self
    {
        Self {
            start,
            end,
            permissions,
            name,
        }
    }

    /// Size in bytes (0 if `end <= start`)
    #[must_use]
    pub fn size(&self) -> u64
    {
        self.end.value().saturating_sub(self.start.value())
    }

    /// Whether the permission string contains `r`
    #[must_use]
    pub fn is_readable(&self) -> bool
    {
        self.permissions.contains('r')
    }

    /// Whether the permission string contains `w`
    #[must_use]
    pub fn is_writable(&self) -> bool
    {
        self.permissions.contains('w')
    }

    /// Whether the permission string contains `x`
    #[must_use]
    pub fn is_executable(&self) -> bool
    {
        self.permissions.contains('x')
    }

    /// Whether `address` lies in `[start, end)`
    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.start && address < self.end
    }

    /// File name component of the backing path, for file-backed regions only
    #[must_use]
    pub fn module_name(&self) -> Option<&str>
    {
        let name = self.name.as_deref()?;
        if !name.starts_with('/') {
            return None;
        }
        name.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Whether this region passes `filter`
    #[must_use]
    pub fn matches(&self, filter: RegionFilter) -> bool
    {
        match filter {
            RegionFilter::Readable => self.is_readable(),
            RegionFilter::ReadOnly => self.is_readable() && !self.is_writable() && !self.is_executable(),
            RegionFilter::Writable => self.is_writable(),
            RegionFilter::Executable => self.is_executable(),
        }
    }
}

/// Permission filter for region enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionFilter
{
    /// Any region with read permission
    Readable,
    /// Readable, neither writable nor executable
    ReadOnly,
    /// Any region with write permission
    Writable,
    /// Any region with execute permission
    Executable,
}

impl std::str::FromStr for RegionFilter
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "r" | "readable" => Ok(Self::Readable),
            "ro" | "readonly" | "read-only" => Ok(Self::ReadOnly),
            "w" | "writable" | "writeable" => Ok(Self::Writable),
            "x" | "executable" => Ok(Self::Executable),
            _ => Err(format!(
                "Unknown region filter: {s}. Use 'readable', 'readonly', 'writable', or 'executable'"
            )),
        }
    }
}
