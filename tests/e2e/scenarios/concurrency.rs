use crate::harness::workspace::TestWorkspace;
use crate::harness::{Assertion, Scenario};
use clipd_core::{Config, MemoryClipboard};
use crossbeam_channel::bounded;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_user_operation_dropped_while_tick_holds_lock() {
    Scenario::new("dropped_during_slow_capture")
        .copy_and_tick("A")
        .other_app_copies("slow")
        .user_removes_during_slow_tick("A", Duration::from_millis(400))
        .assert(Assertion::LastOperationDropped)
        .assert(Assertion::LastTickAdded("slow".into()))
        .assert_history(&["slow", "A"])
        // Nothing is queued; the user simply tries again.
        .user_removes("A")
        .assert_history(&["slow"])
        .run()
        .unwrap();
}

#[test]
fn test_poll_loop_records_and_stops() {
    let workspace = TestWorkspace::empty().unwrap();
    let mut config = Config::default();
    config.poll.interval_ms = 10;

    let clipboard = MemoryClipboard::new();
    let engine = Arc::new(
        workspace
            .start_engine(&config, Box::new(clipboard.clone()))
            .unwrap(),
    );

    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let poller = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.run_poll_loop(&shutdown_rx))
    };

    clipboard.copy_text("from the loop");
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.entries().unwrap().is_empty() {
        assert!(Instant::now() < deadline, "poll loop never captured");
        thread::sleep(Duration::from_millis(5));
    }

    drop(shutdown_tx);
    poller.join().unwrap();
    assert_eq!(engine.entries().unwrap()[0].display_title(), "from the loop");
}
