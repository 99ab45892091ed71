//! End-to-end tests through the inspector facade

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Calls, ScriptedBackend};
use memscope_core::prelude::*;

const WAIT: Duration = Duration::from_secs(2);

fn config() -> InspectorConfig
{
    InspectorConfig {
        supervisor_interval: Duration::from_millis(5),
        poll_interval: Duration::from_millis(10),
        placeholder: "--".to_string(),
    }
}

fn backend() -> Arc<ScriptedBackend>
{
    let backend = ScriptedBackend::new();
    backend.spawn_process(100, "game");
    backend.poke(0x7000, &500i32.to_ne_bytes());
    backend.define_symbol("game+0x6000", 0x7000);
    backend.add_region(0x1000, 0x3000, "rw-p", Some("/opt/game/game"));
    backend.add_region(0x7000, 0x8000, "rw-p", Some("[heap]"));
    backend.add_region(0x9000, 0xa000, "r-xp", Some("/usr/lib/libc.so.6"));
    backend.add_region(0xb000, 0xc000, "r--p", Some("[vvar]"));
    backend.add_region(0xd000, 0xe000, "---p", None);
    backend
}

async fn next_event(events: &mut memscope_core::events::EventReceiver) -> InspectorEvent
{
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_attach_and_read()
{
    let backend = backend();
    let (inspector, _events) = Inspector::new(backend.shared(), config());

    let candidates = inspector.list_candidates().await.unwrap();
    assert_eq!(candidates[0].name, "game");

    let outcome = inspector.attach(ProcessId::from(100)).await.unwrap();
    assert!(outcome.advisory().is_none());
    assert_eq!(inspector.attachment_state().pid(), Some(ProcessId::from(100)));

    assert_eq!(inspector.read_single_address("0x7000", ValueKind::Int32, None, false).await, "500");
    assert_eq!(inspector.read_single_address("0x7ff0", ValueKind::Int64, None, false).await, "--");
    assert_eq!(inspector.try_read("0x7000", ValueType::Int32).await.unwrap(), "500");

    inspector.shutdown().await;
    assert_eq!(backend.attached(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_symbolize_for_display()
{
    let backend = backend();
    let (inspector, _events) = Inspector::new(backend.shared(), config());

    assert_eq!(inspector.symbolize("0x7000").await, "0x7000");

    inspector.attach(ProcessId::from(100)).await.unwrap();
    assert_eq!(inspector.symbolize("0x7000").await, "game+0x6000");
    assert_eq!(inspector.symbolize(" 0x7004 ").await, "0x7004");
    assert_eq!(inspector.symbolize("game+0x6000").await, "game+0x6000");

    inspector.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_commands_follow_attachment()
{
    let backend = backend();
    let (inspector, _events) = Inspector::new(backend.shared(), config());

    assert_eq!(inspector.scan_state(), ScanSessionState::Idle);
    assert!(matches!(
        inspector.scan().await,
        Err(InspectError::ScanCommandRejected { .. })
    ));
    assert_eq!(Calls::get(&backend.calls.regions), 0);

    inspector.attach(ProcessId::from(100)).await.unwrap();
    assert_eq!(inspector.scan_state(), ScanSessionState::FirstScanPending);
    assert_eq!(inspector.scan_primary_label(), "First Scan");
    assert!(inspector.next_scan().is_err());
    assert!(inspector.undo_scan().is_err());
    assert_eq!(inspector.scan_state(), ScanSessionState::FirstScanPending);

    let first = inspector.scan().await.unwrap();
    assert_eq!(first.to, ScanSessionState::Scanning { passes: 1 });
    assert_eq!(Calls::get(&backend.calls.regions), 1);
    let scope = inspector.scan_scope().unwrap();
    let names: Vec<_> = scope.regions().iter().filter_map(|r| r.name.as_deref()).collect();
    assert_eq!(names, vec!["/opt/game/game", "[heap]"]);
    assert_eq!(inspector.scan_primary_label(), "New Scan");
    assert_eq!(
        inspector.enabled_scan_commands(),
        vec![ScanCommand::NewScan, ScanCommand::Scan, ScanCommand::NextScan, ScanCommand::Undo]
    );

    inspector.next_scan().unwrap();
    inspector.scan().await.unwrap();
    assert_eq!(inspector.scan_state(), ScanSessionState::Scanning { passes: 3 });
    inspector.undo_scan().unwrap();
    assert_eq!(inspector.scan_state(), ScanSessionState::Scanning { passes: 2 });
    // Refinements reuse the first scan's scope.
    assert_eq!(Calls::get(&backend.calls.regions), 1);

    let rearm = inspector.new_scan();
    assert_eq!(rearm.to, ScanSessionState::FirstScanPending);
    assert!(inspector.scan_scope().is_none());

    inspector.detach().await.unwrap();
    assert_eq!(inspector.scan_state(), ScanSessionState::Idle);

    inspector.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_termination_resets_session()
{
    let backend = backend();
    let (inspector, mut events) = Inspector::new(backend.shared(), config());
    inspector.attach(ProcessId::from(100)).await.unwrap();
    inspector.scan().await.unwrap();

    backend.kill(100);
    let event = next_event(&mut events).await;

    assert!(matches!(event, InspectorEvent::AttachmentTerminated { .. }));
    assert_eq!(inspector.attachment_state(), AttachmentState::Detached);
    assert_eq!(inspector.scan_state(), ScanSessionState::Idle);
    assert!(inspector.scan_scope().is_none());
    assert_eq!(inspector.read_single_address("0x7000", ValueKind::Int32, None, false).await, "--");

    inspector.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_refresh_publishes_changes()
{
    let backend = backend();
    let (inspector, mut events) = Inspector::new(backend.shared(), config());
    inspector.attach(ProcessId::from(100)).await.unwrap();

    let id = inspector.add_watch("gold", "0x7000", ValueType::Int32).await.unwrap();
    assert_eq!(inspector.watches()[0].cached_value(), Some("500"));
    assert!(inspector.refresh_watches().await.unwrap().is_empty());

    backend.poke(0x7000, &750i32.to_ne_bytes());
    assert_eq!(inspector.refresh_watches().await.unwrap(), vec![(id, "750".to_string())]);
    assert_eq!(
        next_event(&mut events).await,
        InspectorEvent::EntryValueUpdated {
            id,
            value: "750".to_string()
        }
    );

    inspector.freeze_watch(id, true).unwrap();
    backend.poke(0x7000, &1i32.to_ne_bytes());
    assert!(inspector.refresh_watches().await.unwrap().is_empty());

    inspector.remove_watch(id).unwrap();
    assert!(inspector.watches().is_empty());

    inspector.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_inspect_surface_publishes_values()
{
    let backend = backend();
    let (inspector, mut events) = Inspector::new(backend.shared(), config());
    inspector.attach(ProcessId::from(100)).await.unwrap();

    let surface = inspector.open_inspect_surface(InspectFields::new("0x7000", ValueKind::Int32));
    match next_event(&mut events).await {
        InspectorEvent::SurfaceValueUpdated { surface: id, value } => {
            assert_eq!(id, surface.id());
            assert_eq!(value, "500");
        }
        other => panic!("Expected a surface update, got {other:?}"),
    }

    surface.close().await;
    inspector.shutdown().await;
}
