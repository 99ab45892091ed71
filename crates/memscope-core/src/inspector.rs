//! # Inspector
//!
//! The entry point that wires the components together around one backend
//! and one shared attachment.
//!
//! Every method that talks to the backend is `async` and runs the backend
//! work on tokio's blocking pool, so an interactive caller never stalls on
//! a slow `/proc` read or a hung attach.
//!
//! ## Example
//!
//! ```no_run
//! use memscope_core::prelude::*;
//!
//! # async fn demo() -> InspectResult<()> {
//! let (inspector, mut events) = Inspector::new(create_backend()?, InspectorConfig::from_env());
//!
//! let outcome = inspector.attach(ProcessId::from(1234)).await?;
//! if let Some(advisory) = outcome.advisory() {
//!     eprintln!("warning: {advisory}");
//! }
//!
//! let value = inspector.read_single_address("0x7ffd4a3c", ValueKind::Int32, None, false).await;
//! println!("{value}");
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.describe());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::attach::{
    AttachManager, AttachOutcome, AttachSupervisor, Attachment, AttachmentState, SharedAttachment,
    TerminationHook, TransitionHook,
};
use crate::backend::SharedBackend;
use crate::config::InspectorConfig;
use crate::error::{InspectError, InspectResult};
use crate::events::{event_channel, EventReceiver, EventSender, InspectorEvent};
use crate::memory::MemoryAccessor;
use crate::scan::{ScanCommand, ScanScope, ScanSession, ScanSessionState, ScanTransition};
use crate::types::{MemoryRegion, ProcessHandle, ProcessId, RegionFilter, ValueKind, ValueType};
use crate::watch::{InspectFields, LiveWatchPoller, SurfaceId, WatchEntry, WatchEntryId, WatchList};

/// Scan session plus the memory it searches
///
/// Attachment hooks lock this while holding the attachment's write lock, so
/// never acquire the attachment (or read memory) while holding it.
#[derive(Debug, Default)]
struct ScanSlot
{
    session: ScanSession,
    scope: Option<ScanScope>,
}

impl ScanSlot
{
    fn reset(&mut self)
    {
        self.session.reset();
        self.scope = None;
    }
}

/// Process inspector: attach, read, watch, and scan
///
/// Created inside a tokio runtime; it owns a background supervisor for its
/// whole lifetime. When the attached process exits, the attachment is
/// cleared, the scan session goes back to idle, and one
/// [`InspectorEvent::AttachmentTerminated`] is sent.
pub struct Inspector
{
    config: InspectorConfig,
    backend: SharedBackend,
    attachment: SharedAttachment,
    manager: AttachManager,
    accessor: MemoryAccessor,
    watches: Arc<Mutex<WatchList>>,
    scan: Arc<Mutex<ScanSlot>>,
    events: EventSender,
    supervisor: AttachSupervisor,
    next_surface: AtomicU64,
}

impl Inspector
{
    /// Create an inspector and the receiver for its events
    ///
    /// ## Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(backend: SharedBackend, config: InspectorConfig) -> (Self, EventReceiver)
    {
        let (events, receiver) = event_channel();
        let attachment = Attachment::shared();
        let scan = Arc::new(Mutex::new(ScanSlot::default()));

        let on_transition: TransitionHook = {
            let scan = Arc::clone(&scan);
            Arc::new(move |state: AttachmentState| {
                let mut slot = lock(&scan);
                if state.is_attached() {
                    slot.session.new_scan();
                    slot.scope = None;
                } else {
                    slot.reset();
                }
            })
        };
        let on_terminated: TerminationHook = {
            let scan = Arc::clone(&scan);
            Arc::new(move |_: ProcessId| lock(&scan).reset())
        };

        let manager =
            AttachManager::new(Arc::clone(&backend), Arc::clone(&attachment)).with_transition_hook(on_transition);
        let accessor = MemoryAccessor::new(Arc::clone(&backend), Arc::clone(&attachment), config.placeholder.as_str());
        let supervisor = AttachSupervisor::spawn(
            Arc::clone(&backend),
            Arc::clone(&attachment),
            events.clone(),
            config.supervisor_interval,
            Some(on_terminated),
        );

        let inspector = Self {
            config,
            backend,
            attachment,
            manager,
            accessor,
            watches: Arc::new(Mutex::new(WatchList::new())),
            scan,
            events,
            supervisor,
            next_surface: AtomicU64::new(1),
        };
        (inspector, receiver)
    }

    #[must_use]
    pub fn config(&self) -> &InspectorConfig
    {
        &self.config
    }

    /// The accessor used for all reads, for callers that manage their own
    /// threads
    #[must_use]
    pub fn accessor(&self) -> &MemoryAccessor
    {
        &self.accessor
    }

    /// Snapshot of the current attachment
    #[must_use]
    pub fn attachment_state(&self) -> AttachmentState
    {
        self.attachment.current()
    }

    /// Processes that could be attached to
    ///
    /// ## Errors
    ///
    /// Backend enumeration errors.
    pub async fn list_candidates(&self) -> InspectResult<Vec<ProcessHandle>>
    {
        let manager = self.manager.clone();
        blocking(move || manager.list_candidates()).await
    }

    /// Permission probe; never attaches
    ///
    /// ## Errors
    ///
    /// Backend probe errors.
    pub async fn can_attach(&self, pid: ProcessId) -> InspectResult<bool>
    {
        let manager = self.manager.clone();
        blocking(move || manager.can_attach(pid)).await
    }

    /// Attach to `pid`, releasing any previous process first
    ///
    /// A successful attach arms the scan session for a first scan and puts
    /// the process under supervision.
    ///
    /// ## Errors
    ///
    /// See [`AttachManager::attach`].
    pub async fn attach(&self, pid: ProcessId) -> InspectResult<AttachOutcome>
    {
        let manager = self.manager.clone();
        blocking(move || manager.attach(pid)).await
    }

    /// Release the current process; a no-op when nothing is attached
    ///
    /// ## Errors
    ///
    /// The backend's detach error. The inspector is detached regardless.
    pub async fn detach(&self) -> InspectResult<()>
    {
        let manager = self.manager.clone();
        blocking(move || manager.detach()).await
    }

    /// Memory regions of `pid` matching `filter`
    ///
    /// ## Errors
    ///
    /// Backend errors reading the process's mappings.
    pub async fn memory_regions(&self, pid: ProcessId, filter: RegionFilter) -> InspectResult<Vec<MemoryRegion>>
    {
        let backend = Arc::clone(&self.backend);
        blocking(move || backend.enumerate_memory_regions(pid, filter)).await
    }

    /// Read one value for display; failures show the placeholder
    pub async fn read_single_address(
        &self,
        address_expr: impl Into<String>,
        kind: ValueKind,
        length: Option<usize>,
        unicode: bool,
    ) -> String
    {
        let accessor = self.accessor.clone();
        let address_expr = address_expr.into();
        let read = blocking(move || Ok(accessor.read_single_address(&address_expr, kind, length, unicode)));
        match read.await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Read task failed");
                self.accessor.placeholder().to_string()
            }
        }
    }

    /// Read one value, reporting why it failed
    ///
    /// ## Errors
    ///
    /// See [`MemoryAccessor::try_read`].
    pub async fn try_read(&self, address_expr: impl Into<String>, ty: ValueType) -> InspectResult<String>
    {
        let accessor = self.accessor.clone();
        let address_expr = address_expr.into();
        blocking(move || accessor.try_read(&address_expr, ty)).await
    }

    /// Symbolic form of an address for display, or the input unchanged
    ///
    /// Runs [`MemoryAccessor::convert_address_to_symbol`] on the blocking
    /// pool, since symbolizing reads the target's memory map.
    pub async fn symbolize(&self, address_expr: impl Into<String>) -> String
    {
        let accessor = self.accessor.clone();
        let address_expr = address_expr.into();
        let fallback = address_expr.trim().to_string();
        match blocking(move || Ok(accessor.convert_address_to_symbol(&address_expr))).await {
            Ok(label) => label,
            Err(e) => {
                warn!(error = %e, "Symbolize task failed");
                fallback
            }
        }
    }

    /// Open a live inspect surface that re-reads after every edit
    ///
    /// The surface stops when the returned poller is closed or dropped.
    #[must_use]
    pub fn open_inspect_surface(&self, fields: InspectFields) -> LiveWatchPoller
    {
        let id = SurfaceId(self.next_surface.fetch_add(1, Ordering::Relaxed));
        debug!(surface = %id, address = %fields.address_expr, "Opening inspect surface");
        LiveWatchPoller::spawn(
            id,
            self.accessor.clone(),
            fields,
            self.events.clone(),
            self.config.poll_interval,
        )
    }

    /// Add a watch entry and read its initial value
    ///
    /// ## Errors
    ///
    /// `InvalidLength` for a zero-length string or byte array; nothing is
    /// added in that case.
    pub async fn add_watch(
        &self,
        description: impl Into<String>,
        address_expr: impl Into<String>,
        ty: ValueType,
    ) -> InspectResult<WatchEntryId>
    {
        let watches = Arc::clone(&self.watches);
        let accessor = self.accessor.clone();
        let description = description.into();
        let address_expr = address_expr.into();
        blocking(move || lock(&watches).add(&accessor, description, address_expr, ty)).await
    }

    /// Re-read every unfrozen entry and announce the values that changed
    ///
    /// ## Errors
    ///
    /// `BackendUnavailable` if the refresh task itself failed.
    pub async fn refresh_watches(&self) -> InspectResult<Vec<(WatchEntryId, String)>>
    {
        let watches = Arc::clone(&self.watches);
        let accessor = self.accessor.clone();
        let changed = blocking(move || Ok(lock(&watches).refresh(&accessor))).await?;
        for (id, value) in &changed {
            let _ = self.events.send(InspectorEvent::EntryValueUpdated {
                id: *id,
                value: value.clone(),
            });
        }
        Ok(changed)
    }

    /// Freeze or unfreeze an entry
    ///
    /// ## Errors
    ///
    /// `UnknownEntry` if `id` is not in the list.
    pub fn freeze_watch(&self, id: WatchEntryId, frozen: bool) -> InspectResult<()>
    {
        lock(&self.watches).freeze(id, frozen)
    }

    /// Remove an entry
    ///
    /// ## Errors
    ///
    /// `UnknownEntry` if `id` is not in the list.
    pub fn remove_watch(&self, id: WatchEntryId) -> InspectResult<WatchEntry>
    {
        lock(&self.watches).remove(id)
    }

    /// Remove every entry
    pub fn clear_watches(&self)
    {
        lock(&self.watches).clear();
    }

    /// Copy of the watch list in display order
    #[must_use]
    pub fn watches(&self) -> Vec<WatchEntry>
    {
        lock(&self.watches).iter().cloned().collect()
    }

    #[must_use]
    pub fn scan_state(&self) -> ScanSessionState
    {
        lock(&self.scan).session.state()
    }

    /// Commands the scan controls should offer right now
    #[must_use]
    pub fn enabled_scan_commands(&self) -> Vec<ScanCommand>
    {
        lock(&self.scan).session.enabled_commands()
    }

    /// "First Scan" or "New Scan"
    #[must_use]
    pub fn scan_primary_label(&self) -> &'static str
    {
        lock(&self.scan).session.primary_label()
    }

    /// Memory selected by the first scan, if one has run
    #[must_use]
    pub fn scan_scope(&self) -> Option<ScanScope>
    {
        lock(&self.scan).scope.clone()
    }

    /// Discard scan results and re-arm for a first scan
    pub fn new_scan(&self) -> ScanTransition
    {
        let mut slot = lock(&self.scan);
        slot.scope = None;
        slot.session.new_scan()
    }

    /// Run the first scan, or refine the current one
    ///
    /// The first scan collects the target's readable regions, minus system
    /// mappings, as the [`ScanScope`].
    ///
    /// ## Errors
    ///
    /// `ScanCommandRejected` while idle (without touching the backend),
    /// `NotAttached` if the attachment went away, or backend errors while
    /// enumerating regions.
    pub async fn scan(&self) -> InspectResult<ScanTransition>
    {
        let attachment = Arc::clone(&self.attachment);
        let backend = Arc::clone(&self.backend);
        let scan = Arc::clone(&self.scan);

        blocking(move || {
            let current = attachment.current();
            let observed = {
                let slot = lock(&scan);
                if !slot.session.is_enabled(ScanCommand::Scan) {
                    return Err(slot.session.reject(ScanCommand::Scan));
                }
                slot.session.state()
            };

            let scope = if observed == ScanSessionState::FirstScanPending {
                let pid = current.pid().ok_or(InspectError::NotAttached)?;
                let regions = backend.enumerate_memory_regions(pid, RegionFilter::Readable)?;
                let scope = ScanScope::from_regions(regions);
                info!(%pid, regions = scope.len(), bytes = scope.total_bytes(), "First scan scope collected");
                Some(scope)
            } else {
                None
            };

            let mut slot = lock(&scan);
            if slot.session.state() != observed {
                // The session moved on (detach, termination, new scan) while
                // regions were collected.
                return Err(slot.session.reject(ScanCommand::Scan));
            }
            let transition = slot.session.scan()?;
            if scope.is_some() {
                slot.scope = scope;
            }
            Ok(transition)
        })
        .await
    }

    /// Refine the current results
    ///
    /// ## Errors
    ///
    /// `ScanCommandRejected` unless a scan is in progress.
    pub fn next_scan(&self) -> InspectResult<ScanTransition>
    {
        lock(&self.scan).session.next_scan()
    }

    /// Drop the most recent refinement
    ///
    /// ## Errors
    ///
    /// `ScanCommandRejected` unless a scan is in progress.
    pub fn undo_scan(&self) -> InspectResult<ScanTransition>
    {
        lock(&self.scan).session.undo()
    }

    /// Detach if attached and stop the supervisor
    ///
    /// Live inspect surfaces are independent of the inspector; close them
    /// separately.
    pub async fn shutdown(self)
    {
        if self.attachment.current().is_attached() {
            if let Err(e) = self.detach().await {
                warn!(error = %e, "Detach during shutdown failed");
            }
        }
        self.supervisor.shutdown().await;
        info!("Inspector shut down");
    }
}

/// Run backend work on the blocking pool
async fn blocking<T, F>(work: F) -> InspectResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> InspectResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| InspectError::BackendUnavailable(format!("backend task failed: {e}")))?
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T>
{
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
