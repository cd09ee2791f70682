use crate::harness::{Assertion, Scenario};

#[test]
fn test_toggle_pin_resurfaces_entry() {
    Scenario::new("toggle_pin")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .copy_and_tick("C")
        .user_toggles_pin("A")
        .assert_history(&["A", "C", "B"])
        .assert_pinned("A")
        .user_toggles_pin("B")
        .assert_history(&["B", "A", "C"])
        .user_toggles_pin("A")
        .assert(Assertion::NotPinned("A".into()))
        .assert_history(&["A", "B", "C"])
        .run()
        .unwrap();
}

#[test]
fn test_user_quit_keeps_only_pins() {
    Scenario::new("quit_keeps_pins")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .other_app_copies_image("cat", 32, 32)
        .tick()
        .user_toggles_pin("A")
        .user_quits()
        .assert(Assertion::SideFileMissing("cat".into()))
        // The live clipboard is left alone.
        .assert(Assertion::ClipboardImage("cat".into()))
        .restart()
        .assert_history(&["A"])
        .assert_pinned("A")
        .run()
        .unwrap();
}

#[test]
fn test_pin_survives_copy_from_other_app() {
    Scenario::new("pin_survives_external_copy")
        .copy_and_tick("X")
        .user_toggles_pin("X")
        .copy_and_tick("Y")
        .copy_and_tick("X")
        .assert(Assertion::LastTickAdded("X".into()))
        .assert_history(&["X", "Y"])
        .assert_pinned("X")
        .user_quits()
        .restart()
        .assert_history(&["X"])
        .assert_pinned("X")
        .run()
        .unwrap();
}

#[test]
fn test_clear_respecting_pins() {
    Scenario::new("clear_respecting_pins")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .copy_and_tick("C")
        .user_toggles_pin("B")
        .user_clears(true)
        .assert_history(&["B"])
        .assert(Assertion::ClipboardEmpty)
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .run()
        .unwrap();
}

#[test]
fn test_clear_everything() {
    Scenario::new("clear_everything")
        .copy_and_tick("A")
        .other_app_copies_image("cat", 8, 8)
        .tick()
        .user_toggles_pin("img:cat")
        .user_clears(false)
        .assert(Assertion::HistoryLen(0))
        .assert(Assertion::SideFileMissing("cat".into()))
        // Copying the same content again after a clear is recorded.
        .copy_and_tick("A")
        .assert_history(&["A"])
        .run()
        .unwrap();
}

#[test]
fn test_remove_then_copy_again() {
    Scenario::new("remove_then_copy")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .user_removes("B")
        .assert_history(&["A"])
        .other_app_copies("B")
        .tick()
        .assert(Assertion::LastTickAdded("B".into()))
        .assert_history(&["B", "A"])
        .run()
        .unwrap();
}

#[test]
fn test_recopy_is_not_captured_again() {
    Scenario::new("recopy_text")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .copy_and_tick("C")
        .user_recopies("A")
        .assert_clipboard_text("A")
        .assert_history(&["A", "C", "B"])
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .assert(Assertion::HistoryLen(3))
        .run()
        .unwrap();
}

#[test]
fn test_recopy_pinned_entry_keeps_position() {
    Scenario::new("recopy_pinned")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .user_toggles_pin("A")
        .copy_and_tick("C")
        .assert_history(&["C", "A", "B"])
        .user_recopies("A")
        .assert_clipboard_text("A")
        .assert_history(&["C", "A", "B"])
        .run()
        .unwrap();
}

#[test]
fn test_recopy_image() {
    Scenario::new("recopy_image")
        .other_app_copies_image("cat", 40, 30)
        .tick()
        .copy_and_tick("X")
        .user_recopies("img:cat")
        .assert(Assertion::ClipboardImage("cat".into()))
        .assert_history(&["img:cat", "X"])
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .run()
        .unwrap();
}

#[test]
fn test_recopy_restores_all_representations() {
    Scenario::new("recopy_representations")
        .other_app_copies_representations(&[
            ("text", "report"),
            ("file-url", "file:///tmp/report.pdf"),
        ])
        .tick()
        .copy_and_tick("X")
        .user_recopies("file:///tmp/report.pdf")
        .assert_clipboard_text("report")
        .run()
        .unwrap();
}
