//! # Linux procfs backend
//!
//! A [`DebugBackend`] that needs nothing but `/proc`.
//!
//! Attaching does not stop the target. Holding an open `/proc/<pid>/mem`
//! file *is* the attachment: the kernel performs the same
//! `PTRACE_MODE_ATTACH` permission check on open that `ptrace(2)` would, and
//! positional reads on the file go straight to the target's address space.
//! Detaching drops the file.
//!
//! "Thread injection" here means write access to the mem file, which the
//! instrumentation features (value freezing, patching) need. If only read
//! access can be obtained the attach still succeeds and the caller is
//! warned.
//!
//! See: [proc(5)](https://man7.org/linux/man-pages/man5/proc.5.html)

pub mod procfs;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::backend::{BackendAttach, DebugBackend};
use crate::error::{InspectError, InspectResult};
use crate::types::{Address, MemoryRegion, ProcessHandle, ProcessId, RegionFilter};

/// Largest single positional read on the mem file
const READ_CHUNK: usize = 64 * 1024;

/// Open mem file of the attached process
#[derive(Debug)]
struct MemHandle
{
    pid: ProcessId,
    file: File,
}

/// procfs-based backend
#[derive(Debug)]
pub struct ProcfsBackend
{
    root: PathBuf,
    passwd: PathBuf,
    attached: Mutex<Option<Arc<MemHandle>>>,
}

impl ProcfsBackend
{
    /// Backend over the real `/proc` and `/etc/passwd`
    #[must_use]
    pub fn new() -> Self
    {
        Self::with_paths("/proc", "/etc/passwd")
    }

    /// Backend over an alternate proc root, e.g. a container's
    pub fn with_paths(root: impl Into<PathBuf>, passwd: impl Into<PathBuf>) -> Self
    {
        Self {
            root: root.into(),
            passwd: passwd.into(),
            attached: Mutex::new(None),
        }
    }

    fn proc_path(&self, pid: ProcessId, file: &str) -> PathBuf
    {
        self.root.join(pid.raw().to_string()).join(file)
    }

    fn read_status(&self, pid: ProcessId) -> InspectResult<String>
    {
        fs::read_to_string(self.proc_path(pid, "status")).map_err(|e| match e.kind() {
            ErrorKind::NotFound => InspectError::InvalidProcess(pid),
            _ => InspectError::Io(e),
        })
    }

    fn read_comm(&self, pid: ProcessId) -> Option<String>
    {
        fs::read_to_string(self.proc_path(pid, "comm")).ok().map(|s| s.trim_end().to_string())
    }

    fn current(&self) -> Option<Arc<MemHandle>>
    {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn regions_of(&self, pid: ProcessId) -> InspectResult<Vec<MemoryRegion>>
    {
        let maps = fs::read_to_string(self.proc_path(pid, "maps")).map_err(|e| match e.kind() {
            ErrorKind::NotFound => InspectError::InvalidProcess(pid),
            _ => InspectError::Io(e),
        })?;
        Ok(procfs::parse_maps(&maps))
    }

    fn users(&self) -> HashMap<u32, String>
    {
        fs::read_to_string(&self.passwd)
            .map(|text| procfs::parse_passwd(&text))
            .unwrap_or_default()
    }
}

impl Default for ProcfsBackend
{
    fn default() -> Self
    {
        Self::new()
    }
}

fn open_mem(path: &Path, write: bool) -> std::io::Result<File>
{
    OpenOptions::new().read(true).write(write).open(path)
}

impl DebugBackend for ProcfsBackend
{
    fn enumerate_processes(&self) -> InspectResult<Vec<ProcessHandle>>
    {
        let users = self.users();
        let mut processes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let pid = ProcessId::from(pid);
            // Processes exit while we walk the table; skip the ones that vanish.
            let Ok(status) = self.read_status(pid) else { continue };
            let name = self
                .read_comm(pid)
                .or_else(|| procfs::status_field(&status, "Name").map(str::to_string))
                .unwrap_or_default();
            let owner = match procfs::status_uid(&status) {
                Some(uid) => users.get(&uid).cloned().unwrap_or_else(|| uid.to_string()),
                None => String::new(),
            };
            processes.push(ProcessHandle::new(pid, name, owner));
        }
        processes.sort_by_key(|p| p.pid);
        trace!(count = processes.len(), "Enumerated processes");
        Ok(processes)
    }

    fn is_valid(&self, pid: ProcessId) -> InspectResult<bool>
    {
        match self.read_status(pid) {
            Ok(status) => Ok(!procfs::status_is_defunct(&status)),
            Err(InspectError::InvalidProcess(_)) => Ok(false),
            Err(e) => Err(InspectError::BackendUnavailable(e.to_string())),
        }
    }

    fn is_traced(&self, pid: ProcessId) -> InspectResult<Option<String>>
    {
        let status = self.read_status(pid)?;
        Ok(procfs::status_tracer(&status).map(|tracer| {
            let tracer = ProcessId::from(tracer);
            match self.read_comm(tracer) {
                Some(name) => format!("{name} ({tracer})"),
                None => tracer.to_string(),
            }
        }))
    }

    fn can_attach(&self, pid: ProcessId) -> InspectResult<bool>
    {
        match open_mem(&self.proc_path(pid, "mem"), false) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(InspectError::InvalidProcess(pid)),
            Err(e) => {
                debug!(%pid, error = %e, "Attach probe refused");
                Ok(false)
            }
        }
    }

    fn attach(&self, pid: ProcessId) -> InspectResult<BackendAttach>
    {
        let path = self.proc_path(pid, "mem");
        let (file, writable) = match open_mem(&path, true) {
            Ok(file) => (file, true),
            Err(_) => match open_mem(&path, false) {
                Ok(file) => (file, false),
                Err(e) => {
                    return Err(match e.kind() {
                        ErrorKind::NotFound => InspectError::InvalidProcess(pid),
                        ErrorKind::PermissionDenied => InspectError::PermissionDenied(pid),
                        _ => InspectError::AttachFailed(e.to_string()),
                    })
                }
            },
        };

        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(MemHandle { pid, file }));
        debug!(%pid, writable, "Opened target memory");
        Ok(BackendAttach {
            ok: true,
            thread_injection_ok: writable,
        })
    }

    fn detach(&self) -> InspectResult<()>
    {
        if let Some(handle) = self.attached.lock().unwrap_or_else(PoisonError::into_inner).take() {
            debug!(pid = %handle.pid, "Closed target memory");
        }
        Ok(())
    }

    fn read_memory(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        let handle = self.current().ok_or(InspectError::NotAttached)?;
        let fault = |reason: String| InspectError::ReadFault {
            address: address.value(),
            len,
            reason,
        };

        // The buffer grows only as far as the target's memory actually reads,
        // so a bogus length faults instead of exhausting our own heap.
        let mut buf = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        while buf.len() < len {
            let want = (len - buf.len()).min(READ_CHUNK);
            let offset = address
                .checked_add(buf.len() as u64)
                .ok_or_else(|| fault("range wraps the address space".to_string()))?;
            handle
                .file
                .read_exact_at(&mut chunk[..want], offset.value())
                .map_err(|e| fault(e.to_string()))?;
            buf.try_reserve(want).map_err(|e| fault(e.to_string()))?;
            buf.extend_from_slice(&chunk[..want]);
        }
        Ok(buf)
    }

    fn resolve_symbol(&self, expr: &str) -> InspectResult<Address>
    {
        let unresolved = || InspectError::UnresolvedAddress(expr.to_string());
        let handle = self.current().ok_or_else(unresolved)?;
        let (module, offset) = procfs::split_symbol(expr).ok_or_else(unresolved)?;
        let regions = self.regions_of(handle.pid).map_err(|_| unresolved())?;
        procfs::module_base(&regions, module)
            .and_then(|base| base.checked_add(offset))
            .ok_or_else(unresolved)
    }

    fn symbolize(&self, address: Address) -> String
    {
        let fallback = || address.to_string();
        let Some(handle) = self.current() else {
            return fallback();
        };
        let Ok(regions) = self.regions_of(handle.pid) else {
            return fallback();
        };
        regions
            .iter()
            .find(|r| r.contains(address))
            .and_then(MemoryRegion::module_name)
            .and_then(|module| {
                let base = procfs::module_base(&regions, module)?;
                Some(format!("{module}+0x{:x}", address.value() - base.value()))
            })
            .unwrap_or_else(fallback)
    }

    fn enumerate_memory_regions(&self, pid: ProcessId, filter: RegionFilter) -> InspectResult<Vec<MemoryRegion>>
    {
        Ok(self.regions_of(pid)?.into_iter().filter(|r| r.matches(filter)).collect())
    }
}
