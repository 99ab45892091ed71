//! # Scan Session
//!
//! The phase of a memory-search workflow and the commands each phase
//! allows.
//!
//! ```text
//!          new_scan             scan              scan / next_scan / undo
//!   Idle ──────────▶ FirstScanPending ──────▶ Scanning ◀──────┐
//!                          ▲                     │  └─────────┘
//!                          └──── new_scan ───────┘
//! ```
//!
//! `new_scan` is accepted in every state. `next_scan` and `undo` are only
//! accepted while `Scanning`; anywhere else they are rejected without any
//! state change. The session owns no memory access: callers ask
//! [`ScanSession::is_enabled`] before doing backend work, so a rejected
//! command never reaches the backend.

use std::fmt;

use tracing::debug;

use crate::error::{InspectError, InspectResult};
use crate::types::MemoryRegion;

/// Phase of the scan workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanSessionState
{
    /// No scan target; nothing is attached or the session was reset
    #[default]
    Idle,
    /// Armed for a first scan
    FirstScanPending,
    /// At least one scan pass has run
    Scanning
    {
        /// Number of passes currently applied (first scan included)
        passes: u32,
    },
}

impl ScanSessionState
{
    /// Short lowercase name, used in messages
    #[must_use]
    pub fn name(self) -> &'static str
    {
        match self {
            Self::Idle => "idle",
            Self::FirstScanPending => "waiting for a first scan",
            Self::Scanning { .. } => "scanning",
        }
    }

    #[must_use]
    pub fn is_scanning(self) -> bool
    {
        matches!(self, Self::Scanning { .. })
    }
}

impl fmt::Display for ScanSessionState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Scanning { passes } => write!(f, "scanning ({passes} passes)"),
            other => f.write_str(other.name()),
        }
    }
}

/// A command the scan UI can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanCommand
{
    /// Discard results and re-arm for a first scan
    NewScan,
    /// Run the first scan, or refine when already scanning
    Scan,
    /// Refine the current results
    NextScan,
    /// Drop the most recent refinement
    Undo,
}

impl ScanCommand
{
    pub const ALL: [Self; 4] = [Self::NewScan, Self::Scan, Self::NextScan, Self::Undo];

    #[must_use]
    pub fn name(self) -> &'static str
    {
        match self {
            Self::NewScan => "start a new scan",
            Self::Scan => "scan",
            Self::NextScan => "run the next scan",
            Self::Undo => "undo the last scan",
        }
    }
}

/// Result of an accepted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTransition
{
    pub command: ScanCommand,
    pub from: ScanSessionState,
    pub to: ScanSessionState,
}

/// Scan-phase state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSession
{
    state: ScanSessionState,
}

impl ScanSession
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ScanSessionState
    {
        self.state
    }

    /// Whether `command` would be accepted right now
    #[must_use]
    pub fn is_enabled(&self, command: ScanCommand) -> bool
    {
        match command {
            ScanCommand::NewScan => true,
            ScanCommand::Scan => !matches!(self.state, ScanSessionState::Idle),
            ScanCommand::NextScan | ScanCommand::Undo => self.state.is_scanning(),
        }
    }

    /// Every command currently accepted, for rendering controls
    #[must_use]
    pub fn enabled_commands(&self) -> Vec<ScanCommand>
    {
        ScanCommand::ALL.into_iter().filter(|c| self.is_enabled(*c)).collect()
    }

    /// Text of the primary scan button: "First Scan" until a scan has run,
    /// then "New Scan"
    #[must_use]
    pub fn primary_label(&self) -> &'static str
    {
        if self.state.is_scanning() { "New Scan" } else { "First Scan" }
    }

    /// The command the primary button issues in the current state
    #[must_use]
    pub fn primary_command(&self) -> ScanCommand
    {
        if self.state.is_scanning() {
            ScanCommand::NewScan
        } else {
            ScanCommand::Scan
        }
    }

    /// Re-arm for a first scan; accepted in every state
    pub fn new_scan(&mut self) -> ScanTransition
    {
        self.apply(ScanCommand::NewScan, ScanSessionState::FirstScanPending)
    }

    /// Run the first scan, or refine if already scanning
    ///
    /// ## Errors
    ///
    /// `ScanCommandRejected` while `Idle`.
    pub fn scan(&mut self) -> InspectResult<ScanTransition>
    {
        let next = match self.state {
            ScanSessionState::Idle => return Err(self.reject(ScanCommand::Scan)),
            ScanSessionState::FirstScanPending => ScanSessionState::Scanning { passes: 1 },
            ScanSessionState::Scanning { passes } => ScanSessionState::Scanning {
                passes: passes.saturating_add(1),
            },
        };
        Ok(self.apply(ScanCommand::Scan, next))
    }

    /// Refine the current results
    ///
    /// ## Errors
    ///
    /// `ScanCommandRejected` unless `Scanning`.
    pub fn next_scan(&mut self) -> InspectResult<ScanTransition>
    {
        let ScanSessionState::Scanning { passes } = self.state else {
            return Err(self.reject(ScanCommand::NextScan));
        };
        Ok(self.apply(ScanCommand::NextScan, ScanSessionState::Scanning {
            passes: passes.saturating_add(1),
        }))
    }

    /// Drop the most recent refinement; the first pass is never undone
    ///
    /// ## Errors
    ///
    /// `ScanCommandRejected` unless `Scanning`.
    pub fn undo(&mut self) -> InspectResult<ScanTransition>
    {
        let ScanSessionState::Scanning { passes } = self.state else {
            return Err(self.reject(ScanCommand::Undo));
        };
        Ok(self.apply(ScanCommand::Undo, ScanSessionState::Scanning {
            passes: passes.saturating_sub(1).max(1),
        }))
    }

    /// Back to `Idle`; used when the attachment goes away
    pub fn reset(&mut self)
    {
        if self.state != ScanSessionState::Idle {
            debug!(from = %self.state, "Scan session reset");
        }
        self.state = ScanSessionState::Idle;
    }

    fn apply(&mut self, command: ScanCommand, to: ScanSessionState) -> ScanTransition
    {
        let from = std::mem::replace(&mut self.state, to);
        debug!(?command, %from, %to, "Scan session transition");
        ScanTransition { command, from, to }
    }

    /// The error for `command` being refused in the current state
    pub(crate) fn reject(&self, command: ScanCommand) -> InspectError
    {
        InspectError::ScanCommandRejected {
            command: command.name(),
            state: self.state.name(),
        }
    }
}

/// Pseudo-mappings the kernel provides to every process
const KERNEL_MAPPINGS: [&str; 4] = ["[vvar]", "[vvar_vclock]", "[vsyscall]", "[vdso]"];

/// Directories holding system shared libraries
const SYSTEM_LIBRARY_DIRS: [&str; 5] = ["/lib/", "/lib64/", "/usr/lib/", "/usr/lib64/", "/usr/libexec/"];

/// The memory a scan session searches
///
/// Built from the target's readable regions with kernel pseudo-mappings
/// and system libraries removed. Opaque to the session itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanScope
{
    regions: Vec<MemoryRegion>,
}

impl ScanScope
{
    /// Keep only the regions worth scanning
    #[must_use]
    pub fn from_regions(regions: impl IntoIterator<Item = MemoryRegion>) -> Self
    {
        Self {
            regions: regions.into_iter().filter(|r| !is_system_region(r)).collect(),
        }
    }

    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion]
    {
        &self.regions
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.regions.is_empty()
    }

    /// Total bytes covered
    #[must_use]
    pub fn total_bytes(&self) -> u64
    {
        self.regions.iter().map(MemoryRegion::size).sum()
    }
}

fn is_system_region(region: &MemoryRegion) -> bool
{
    match region.name.as_deref() {
        Some(name) => {
            KERNEL_MAPPINGS.contains(&name) || SYSTEM_LIBRARY_DIRS.iter().any(|dir| name.starts_with(dir))
        }
        None => false,
    }
}
