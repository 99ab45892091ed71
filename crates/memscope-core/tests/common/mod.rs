//! Scripted in-memory backend shared by the integration tests.
//!
//! Every behavior is configurable after the backend has been shared, and
//! every call is counted so tests can assert how often the core reached the
//! backend.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use memscope_core::backend::{BackendAttach, DebugBackend, SharedBackend};
use memscope_core::error::{InspectError, InspectResult};
use memscope_core::types::{Address, MemoryRegion, ProcessHandle, ProcessId, RegionFilter};

/// Per-method call counters
#[derive(Debug, Default)]
pub struct Calls
{
    pub enumerate: AtomicUsize,
    pub is_valid: AtomicUsize,
    pub is_traced: AtomicUsize,
    pub can_attach: AtomicUsize,
    pub attach: AtomicUsize,
    pub detach: AtomicUsize,
    pub read: AtomicUsize,
    pub regions: AtomicUsize,
}

impl Calls
{
    pub fn get(counter: &AtomicUsize) -> usize
    {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Script
{
    processes: Vec<ProcessHandle>,
    live: HashSet<u32>,
    tracers: HashMap<u32, String>,
    denied: HashSet<u32>,
    declined: HashSet<u32>,
    no_injection: HashSet<u32>,
    memory: HashMap<u64, Vec<u8>>,
    symbols: HashMap<String, u64>,
    regions: Vec<MemoryRegion>,
    attached: Option<ProcessId>,
}

/// Holds one liveness check until the test answers it
#[derive(Debug, Default)]
struct LivenessGate
{
    armed: bool,
    holding: bool,
    answer: bool,
}

/// In-memory stand-in for a debug backend
#[derive(Debug, Default)]
pub struct ScriptedBackend
{
    script: Mutex<Script>,
    unavailable: AtomicBool,
    gate: Mutex<LivenessGate>,
    released: Condvar,
    pub calls: Calls,
}

impl ScriptedBackend
{
    pub fn new() -> Arc<Self>
    {
        Arc::new(Self::default())
    }

    /// The backend as the core sees it
    pub fn shared(self: &Arc<Self>) -> SharedBackend
    {
        Arc::clone(self) as SharedBackend
    }

    /// Add a live process
    pub fn spawn_process(&self, pid: u32, name: &str)
    {
        let mut script = self.script.lock().unwrap();
        script.processes.push(ProcessHandle::new(pid, name, "tester"));
        script.live.insert(pid);
    }

    /// Make a process exit
    pub fn kill(&self, pid: u32)
    {
        self.script.lock().unwrap().live.remove(&pid);
    }

    pub fn set_tracer(&self, pid: u32, owner: &str)
    {
        self.script.lock().unwrap().tracers.insert(pid, owner.to_string());
    }

    pub fn deny(&self, pid: u32)
    {
        self.script.lock().unwrap().denied.insert(pid);
    }

    /// Backend attach reports `ok: false`
    pub fn decline(&self, pid: u32)
    {
        self.script.lock().unwrap().declined.insert(pid);
    }

    pub fn fail_injection(&self, pid: u32)
    {
        self.script.lock().unwrap().no_injection.insert(pid);
    }

    /// Place bytes at an address; reads must fall inside one placed block
    pub fn poke(&self, address: u64, bytes: &[u8])
    {
        self.script.lock().unwrap().memory.insert(address, bytes.to_vec());
    }

    pub fn define_symbol(&self, name: &str, address: u64)
    {
        self.script.lock().unwrap().symbols.insert(name.to_string(), address);
    }

    pub fn add_region(&self, start: u64, end: u64, permissions: &str, name: Option<&str>)
    {
        self.script.lock().unwrap().regions.push(MemoryRegion::new(
            Address::new(start),
            Address::new(end),
            permissions.to_string(),
            name.map(str::to_string),
        ));
    }

    /// Make every liveness probe report the transport as down
    pub fn set_unavailable(&self, unavailable: bool)
    {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Block the next `is_valid` call until [`release_check`](Self::release_check)
    pub fn hold_next_check(&self)
    {
        self.gate.lock().unwrap().armed = true;
    }

    /// Whether a liveness check is currently blocked in the gate
    pub fn check_held(&self) -> bool
    {
        self.gate.lock().unwrap().holding
    }

    /// Let the blocked check return `answer`
    pub fn release_check(&self, answer: bool)
    {
        let mut gate = self.gate.lock().unwrap();
        gate.holding = false;
        gate.answer = answer;
        self.released.notify_all();
    }

    pub fn attached(&self) -> Option<ProcessId>
    {
        self.script.lock().unwrap().attached
    }

    pub fn reads(&self) -> usize
    {
        Calls::get(&self.calls.read)
    }
}

impl DebugBackend for ScriptedBackend
{
    fn enumerate_processes(&self) -> InspectResult<Vec<ProcessHandle>>
    {
        self.calls.enumerate.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        Ok(script
            .processes
            .iter()
            .filter(|p| script.live.contains(&p.pid.raw()))
            .cloned()
            .collect())
    }

    fn is_valid(&self, pid: ProcessId) -> InspectResult<bool>
    {
        self.calls.is_valid.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InspectError::BackendUnavailable("transport closed".to_string()));
        }

        let mut gate = self.gate.lock().unwrap();
        if gate.armed {
            gate.armed = false;
            gate.holding = true;
            let gate = self.released.wait_while(gate, |g| g.holding).unwrap();
            return Ok(gate.answer);
        }
        drop(gate);

        Ok(self.script.lock().unwrap().live.contains(&pid.raw()))
    }

    fn is_traced(&self, pid: ProcessId) -> InspectResult<Option<String>>
    {
        self.calls.is_traced.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().tracers.get(&pid.raw()).cloned())
    }

    fn can_attach(&self, pid: ProcessId) -> InspectResult<bool>
    {
        self.calls.can_attach.fetch_add(1, Ordering::SeqCst);
        Ok(!self.script.lock().unwrap().denied.contains(&pid.raw()))
    }

    fn attach(&self, pid: ProcessId) -> InspectResult<BackendAttach>
    {
        self.calls.attach.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        assert!(script.attached.is_none(), "core attached twice without detaching");
        if script.declined.contains(&pid.raw()) {
            return Ok(BackendAttach {
                ok: false,
                thread_injection_ok: false,
            });
        }
        script.attached = Some(pid);
        Ok(BackendAttach {
            ok: true,
            thread_injection_ok: !script.no_injection.contains(&pid.raw()),
        })
    }

    fn detach(&self) -> InspectResult<()>
    {
        self.calls.detach.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().attached = None;
        Ok(())
    }

    fn read_memory(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        self.calls.read.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        if script.attached.is_none() {
            return Err(InspectError::NotAttached);
        }

        let start = address.value();
        script
            .memory
            .iter()
            .find_map(|(&base, bytes)| {
                let offset = usize::try_from(start.checked_sub(base)?).ok()?;
                bytes.get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
            })
            .ok_or_else(|| InspectError::ReadFault {
                address: start,
                len,
                reason: "unmapped".to_string(),
            })
    }

    fn resolve_symbol(&self, expr: &str) -> InspectResult<Address>
    {
        self.script
            .lock()
            .unwrap()
            .symbols
            .get(expr)
            .map(|&a| Address::new(a))
            .ok_or_else(|| InspectError::UnresolvedAddress(expr.to_string()))
    }

    fn symbolize(&self, address: Address) -> String
    {
        let script = self.script.lock().unwrap();
        script
            .symbols
            .iter()
            .find(|(_, &a)| a == address.value())
            .map_or_else(|| address.to_string(), |(name, _)| name.clone())
    }

    fn enumerate_memory_regions(&self, _pid: ProcessId, filter: RegionFilter) -> InspectResult<Vec<MemoryRegion>>
    {
        self.calls.regions.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .unwrap()
            .regions
            .iter()
            .filter(|r| r.matches(filter))
            .cloned()
            .collect())
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}
