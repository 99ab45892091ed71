//! Live re-reading of a single address for an open inspect surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::events::{EventSender, InspectorEvent};
use crate::memory::MemoryAccessor;
use crate::types::ValueKind;

/// Identifies one open inspect surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "surface {}", self.0)
    }
}

/// The editable fields of an inspect surface
///
/// These are the raw selector values, not a validated
/// [`ValueType`](crate::types::ValueType): a surface can hold a string kind
/// with no length while the user is still typing, and the read for that
/// state simply shows the placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectFields
{
    /// Address literal or symbol expression
    pub address_expr: String,
    /// Selected value kind
    pub kind: ValueKind,
    /// Length for string and byte-array kinds
    pub length: Option<usize>,
    /// Whether strings are read as UTF-16
    pub unicode: bool,
}

impl InspectFields
{
    /// Fields for a fixed-width read at `address_expr`
    pub fn new(address_expr: impl Into<String>, kind: ValueKind) -> Self
    {
        Self {
            address_expr: address_expr.into(),
            kind,
            length: None,
            unicode: false,
        }
    }

    /// Set the length used by string and byte-array kinds
    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self
    {
        self.length = Some(length);
        self
    }

    /// Read strings as UTF-16
    #[must_use]
    pub fn with_unicode(mut self, unicode: bool) -> Self
    {
        self.unicode = unicode;
        self
    }
}

/// Background loop that re-reads an inspect surface's address after edits
///
/// Every edit marks the surface dirty. Each poll interval the loop
/// read-and-clears that flag; if it was set, it snapshots the current
/// fields and performs exactly one
/// [`read_single_address`](MemoryAccessor::read_single_address), then
/// publishes [`InspectorEvent::SurfaceValueUpdated`]. A burst of edits
/// between two ticks therefore costs one read, made with whatever the fields
/// held at the tick. Reads for one surface are strictly sequential.
///
/// The poller starts dirty, so the initial fields are read on the first
/// tick.
///
/// The loop lives exactly as long as the poller: [`stop`](Self::stop),
/// [`close`](Self::close) and dropping the poller all cancel it, and once
/// cancellation is observed no further read is issued and no further event
/// is published.
pub struct LiveWatchPoller
{
    id: SurfaceId,
    fields: Arc<Mutex<InspectFields>>,
    dirty: Arc<AtomicBool>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Surface
{
    id: SurfaceId,
    accessor: MemoryAccessor,
    fields: Arc<Mutex<InspectFields>>,
    dirty: Arc<AtomicBool>,
    events: EventSender,
}

impl LiveWatchPoller
{
    /// Start polling on the current tokio runtime
    ///
    /// ## Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(
        id: SurfaceId,
        accessor: MemoryAccessor,
        fields: InspectFields,
        events: EventSender,
        interval: Duration,
    ) -> Self
    {
        let fields = Arc::new(Mutex::new(fields));
        let dirty = Arc::new(AtomicBool::new(true));
        let token = CancellationToken::new();
        let surface = Surface {
            id,
            accessor,
            fields: Arc::clone(&fields),
            dirty: Arc::clone(&dirty),
            events,
        };
        let handle = tokio::spawn(run(surface, interval, token.clone()));

        Self {
            id,
            fields,
            dirty,
            token,
            handle,
        }
    }

    /// The surface this poller serves
    #[must_use]
    pub fn id(&self) -> SurfaceId
    {
        self.id
    }

    /// A copy of the current fields
    #[must_use]
    pub fn fields(&self) -> InspectFields
    {
        lock(&self.fields).clone()
    }

    /// Change the address expression
    pub fn set_address(&self, address_expr: impl Into<String>)
    {
        let address_expr = address_expr.into();
        self.edit(|f| f.address_expr = address_expr);
    }

    /// Change the value kind
    pub fn set_kind(&self, kind: ValueKind)
    {
        self.edit(|f| f.kind = kind);
    }

    /// Change the string or byte-array length
    pub fn set_length(&self, length: Option<usize>)
    {
        self.edit(|f| f.length = length);
    }

    /// Toggle UTF-16 string decoding
    pub fn set_unicode(&self, unicode: bool)
    {
        self.edit(|f| f.unicode = unicode);
    }

    /// Apply an arbitrary edit to the fields and mark the surface dirty
    pub fn edit(&self, apply: impl FnOnce(&mut InspectFields))
    {
        apply(&mut lock(&self.fields));
        self.dirty.store(true, Ordering::Release);
    }

    /// Request a re-read without changing any field
    pub fn refresh(&self)
    {
        self.dirty.store(true, Ordering::Release);
    }

    /// Signal the loop to stop; observed within one poll interval
    pub fn stop(&self)
    {
        self.token.cancel();
    }

    /// Stop the loop and wait for it to exit
    pub async fn close(mut self)
    {
        self.token.cancel();
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                warn!(surface = %self.id, error = %e, "Live watch task failed");
            }
        }
    }

    /// Whether the background loop is still running
    #[must_use]
    pub fn is_running(&self) -> bool
    {
        !self.handle.is_finished()
    }
}

impl Drop for LiveWatchPoller
{
    fn drop(&mut self)
    {
        self.token.cancel();
    }
}

impl std::fmt::Debug for LiveWatchPoller
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("LiveWatchPoller")
            .field("id", &self.id)
            .field("fields", &self.fields())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn run(surface: Surface, interval: Duration, token: CancellationToken)
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(surface = %surface.id, ?interval, "Live watch started");

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !surface.dirty.swap(false, Ordering::AcqRel) {
            continue;
        }
        let fields = lock(&surface.fields).clone();
        if token.is_cancelled() {
            break;
        }

        trace!(surface = %surface.id, address = %fields.address_expr, kind = %fields.kind, "Re-reading");
        let accessor = surface.accessor.clone();
        let read = tokio::task::spawn_blocking(move || {
            accessor.read_single_address(&fields.address_expr, fields.kind, fields.length, fields.unicode)
        });
        let value = match read.await {
            Ok(value) => value,
            Err(e) => {
                warn!(surface = %surface.id, error = %e, "Live watch read task failed");
                surface.accessor.placeholder().to_string()
            }
        };

        if token.is_cancelled() {
            break;
        }
        let _ = surface.events.send(InspectorEvent::SurfaceValueUpdated {
            surface: surface.id,
            value,
        });
    }

    debug!(surface = %surface.id, "Live watch stopped");
}

fn lock(fields: &Mutex<InspectFields>) -> MutexGuard<'_, InspectFields>
{
    fields.lock().unwrap_or_else(PoisonError::into_inner)
}
