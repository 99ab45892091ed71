//! Tests for live inspect surfaces

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedBackend;
use memscope_core::attach::{AttachManager, Attachment};
use memscope_core::events::{event_channel, EventReceiver, InspectorEvent};
use memscope_core::memory::MemoryAccessor;
use memscope_core::types::{ProcessId, ValueKind};
use memscope_core::watch::{InspectFields, LiveWatchPoller, SurfaceId};

const INTERVAL: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(2);

struct Harness
{
    backend: Arc<ScriptedBackend>,
    accessor: MemoryAccessor,
    manager: AttachManager,
}

fn attached() -> Harness
{
    let backend = ScriptedBackend::new();
    backend.spawn_process(100, "game");
    backend.poke(0x1000, &42i32.to_ne_bytes());
    backend.poke(0x2000, &7i32.to_ne_bytes());
    backend.poke(0x3000, b"hello\0\0\0");
    let wide: Vec<u8> = "héllo\0".encode_utf16().flat_map(u16::to_ne_bytes).collect();
    backend.poke(0x4000, &wide);

    let attachment = Attachment::shared();
    let manager = AttachManager::new(backend.shared(), Arc::clone(&attachment));
    manager.attach(ProcessId::from(100)).unwrap();
    let accessor = MemoryAccessor::new(backend.shared(), attachment, "??");

    Harness {
        backend,
        accessor,
        manager,
    }
}

async fn next_value(events: &mut EventReceiver) -> String
{
    match tokio::time::timeout(WAIT, events.recv()).await {
        Ok(Some(InspectorEvent::SurfaceValueUpdated { value, .. })) => value,
        other => panic!("Expected a surface update, got {other:?}"),
    }
}

async fn assert_quiet(events: &mut EventReceiver)
{
    let extra = tokio::time::timeout(INTERVAL * 3, events.recv()).await;
    assert!(extra.is_err(), "unexpected event: {extra:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_fields_are_read_once()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(1),
        h.accessor.clone(),
        InspectFields::new("0x1000", ValueKind::Int32),
        tx,
        INTERVAL,
    );

    assert_eq!(next_value(&mut events).await, "42");
    assert_quiet(&mut events).await;
    assert_eq!(h.backend.reads(), 1);

    poller.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_of_edits_costs_one_read()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(1),
        h.accessor.clone(),
        InspectFields::new("0x1000", ValueKind::Int32),
        tx,
        INTERVAL,
    );
    assert_eq!(next_value(&mut events).await, "42");

    // Right after a tick, so the whole burst lands inside one interval.
    for i in 0..25u64 {
        poller.set_address(format!("0x{:x}", 0x1000 + i * 4));
        poller.set_kind(if i % 2 == 0 { ValueKind::Int16 } else { ValueKind::Int64 });
    }
    poller.set_address("0x2000");
    poller.set_kind(ValueKind::Int32);

    assert_eq!(next_value(&mut events).await, "7");
    assert_quiet(&mut events).await;
    assert_eq!(h.backend.reads(), 2);
    assert_eq!(poller.fields().address_expr, "0x2000");

    poller.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_string_fields()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(3),
        h.accessor.clone(),
        InspectFields::new("0x3000", ValueKind::String),
        tx,
        INTERVAL,
    );

    // No length yet: the placeholder, not an error.
    assert_eq!(next_value(&mut events).await, "??");

    poller.set_length(Some(8));
    assert_eq!(next_value(&mut events).await, "hello");

    poller.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wide_string_fields()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let fields = InspectFields::new("0x4000", ValueKind::String)
        .with_length(6)
        .with_unicode(true);
    assert!(fields.kind.supports_unicode());
    let poller = LiveWatchPoller::spawn(SurfaceId(4), h.accessor.clone(), fields, tx, INTERVAL);

    assert_eq!(next_value(&mut events).await, "héllo");

    poller.set_length(Some(3));
    assert_eq!(next_value(&mut events).await, "hél");

    poller.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_read_shows_placeholder_and_keeps_polling()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(2),
        h.accessor.clone(),
        InspectFields::new("0xdead0000", ValueKind::Int32),
        tx,
        INTERVAL,
    );

    assert_eq!(next_value(&mut events).await, "??");
    assert!(poller.is_running());

    poller.set_address("0x1000");
    assert_eq!(next_value(&mut events).await, "42");

    poller.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_reads_after_stop()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(1),
        h.accessor.clone(),
        InspectFields::new("0x1000", ValueKind::Int32),
        tx,
        INTERVAL,
    );
    assert_eq!(next_value(&mut events).await, "42");

    poller.stop();
    poller.set_address("0x2000");
    poller.refresh();

    assert!(common::eventually(WAIT, || !poller.is_running()).await);
    assert_quiet(&mut events).await;
    assert_eq!(h.backend.reads(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_the_surface_cancels()
{
    let h = attached();
    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(1),
        h.accessor.clone(),
        InspectFields::new("0x1000", ValueKind::Int32),
        tx,
        INTERVAL,
    );
    assert_eq!(next_value(&mut events).await, "42");

    poller.refresh();
    drop(poller);

    // The loop owned the last sender, so the channel closes once it exits.
    let closed = tokio::time::timeout(WAIT, events.recv()).await;
    assert!(matches!(closed, Ok(None)), "expected the channel to close, got {closed:?}");
    assert_eq!(h.backend.reads(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_detached_surface_shows_placeholder()
{
    let h = attached();
    h.manager.detach().unwrap();

    let (tx, mut events) = event_channel();
    let poller = LiveWatchPoller::spawn(
        SurfaceId(1),
        h.accessor.clone(),
        InspectFields::new("0x1000", ValueKind::Int32),
        tx,
        INTERVAL,
    );

    assert_eq!(next_value(&mut events).await, "??");
    assert_eq!(h.backend.reads(), 0);

    poller.close().await;
}
