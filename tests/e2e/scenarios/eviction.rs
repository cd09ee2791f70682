use crate::harness::{Assertion, Scenario};

#[test]
fn test_oldest_unpinned_entry_is_evicted() {
    Scenario::new("evict_oldest")
        .with_history_len(3)
        .copy_and_tick("A")
        .copy_and_tick("B")
        .copy_and_tick("C")
        .copy_and_tick("D")
        .assert_history(&["D", "C", "B"])
        .assert(Assertion::NotContains("A".into()))
        .run()
        .unwrap();
}

#[test]
fn test_pinned_entry_survives_eviction() {
    Scenario::new("pinned_survives")
        .with_history_len(3)
        .copy_and_tick("A")
        .copy_and_tick("B")
        .copy_and_tick("C")
        .copy_and_tick("D")
        .user_toggles_pin("B")
        .assert_history(&["B", "D", "C"])
        .copy_and_tick("E")
        .assert_history(&["E", "B", "D"])
        .assert_pinned("B")
        .run()
        .unwrap();
}

#[test]
fn test_copying_known_text_moves_it_to_top() {
    Scenario::new("dedupe_moves_to_top")
        .copy_and_tick("A")
        .copy_and_tick("B")
        .copy_and_tick("C")
        .copy_and_tick("A")
        .assert(Assertion::LastTickAdded("A".into()))
        .assert_history(&["A", "C", "B"])
        .run()
        .unwrap();
}

#[test]
fn test_unchanged_content_is_not_recorded_twice() {
    Scenario::new("same_text_twice")
        .copy_and_tick("A")
        .copy_and_tick("A")
        .assert(Assertion::LastTickAddedNothing)
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .assert(Assertion::HistoryLen(1))
        .run()
        .unwrap();
}

#[test]
fn test_empty_clipboard_records_nothing() {
    Scenario::new("empty_clipboard")
        .copy_and_tick("A")
        .other_app_clears()
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .other_app_copies("")
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .assert_history(&["A"])
        .run()
        .unwrap();
}

#[test]
fn test_evicted_image_releases_side_file() {
    Scenario::new("image_eviction")
        .with_history_len(2)
        .other_app_copies_image("cat", 64, 48)
        .tick()
        .assert(Assertion::LastTickAdded("img:cat".into()))
        .assert(Assertion::SideFileExists("cat".into()))
        .copy_and_tick("X")
        .copy_and_tick("Y")
        .assert_history(&["Y", "X"])
        .assert(Assertion::SideFileMissing("cat".into()))
        .run()
        .unwrap();
}

#[test]
fn test_same_image_twice_is_not_recorded_twice() {
    Scenario::new("same_image_twice")
        .other_app_copies_image("cat", 16, 16)
        .tick()
        .other_app_copies_image("cat", 16, 16)
        .tick()
        .assert(Assertion::LastTickAddedNothing)
        .other_app_copies_image("dog", 16, 16)
        .tick()
        .assert_history(&["img:dog", "img:cat"])
        .assert(Assertion::ImageId {
            name: "dog".into(),
            id: 2,
        })
        .run()
        .unwrap();
}

#[test]
fn test_text_captures_every_representation() {
    Scenario::new("representations")
        .other_app_copies_representations(&[
            ("text", "report"),
            ("file-url", "file:///tmp/report.pdf"),
            ("html", ""),
        ])
        .tick()
        .assert(Assertion::LastTickAdded("file:///tmp/report.pdf".into()))
        .assert(Assertion::Custom(Box::new(|engine: &clipd_core::Engine| {
            let entries = engine.entries()?;
            match &entries[0] {
                clipd_core::HistoryEntry::Text(text) => {
                    anyhow::ensure!(text.raw_data.len() == 2, "empty representation kept");
                    anyhow::ensure!(text.raw_data["text"] == "report");
                }
                other => anyhow::bail!("expected text entry, got {:?}", other),
            }
            Ok(())
        })))
        .run()
        .unwrap();
}
