use super::*;
use common::{DbError, PageConfig};
use pretty_assertions::assert_eq;

fn inserted(page: &mut SlottedPage, record: &[u8]) -> SlotId {
    match page.insert(record).unwrap() {
        InsertOutcome::Inserted(slot) => slot,
        InsertOutcome::PageFull => panic!("expected room for {} bytes", record.len()),
    }
}

#[test]
fn fresh_page_has_empty_directory() {
    for capacity in [12, 64, 1024, 4096] {
        let page = SlottedPage::new(capacity, BlockId(3)).unwrap();
        assert_eq!(page.capacity(), capacity);
        assert_eq!(page.slot_count().unwrap(), 0);
        assert_eq!(page.free_space_offset().unwrap(), capacity);
        assert_eq!(page.space_available().unwrap(), capacity - HEADER_SIZE);
        assert_eq!(page.block_id().unwrap(), BlockId(3));
        page.validate().unwrap();
    }
}

#[test]
fn pages_smaller_than_header_are_rejected() {
    let err = SlottedPage::new(11, BlockId(0)).unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
}

#[test]
fn with_config_uses_configured_block_and_size() {
    let config = PageConfig::builder()
        .page_size(256)
        .block_id(BlockId(-9))
        .build();
    let page = SlottedPage::with_config(&config).unwrap();
    assert_eq!(page.capacity(), 256);
    assert_eq!(page.block_id().unwrap(), BlockId(-9));
}

#[test]
fn block_id_can_be_reassigned() {
    let mut page = SlottedPage::new(64, BlockId(1)).unwrap();
    page.set_block_id(BlockId(77)).unwrap();
    assert_eq!(page.block_id().unwrap(), BlockId(77));
    assert_eq!(page.header().unwrap().block_id, 77);
}

#[test]
fn first_slot_id_is_zero() {
    let mut page = SlottedPage::new(1024, BlockId(1)).unwrap();
    assert_eq!(page.insert(b"hello, world!").unwrap(), InsertOutcome::Inserted(SlotId(0)));
}

#[test]
fn insert_then_read_returns_same_bytes() {
    let mut page = SlottedPage::new(1024, BlockId(1)).unwrap();
    let slot = inserted(&mut page, b"hello, world!");

    assert_eq!(page.read(slot).unwrap(), b"hello, world!");
    assert_eq!(page.slot_count().unwrap(), 1);
    assert_eq!(page.free_space_offset().unwrap(), 1024 - 13);
    assert_eq!(page.slot_state(slot).unwrap(), SlotState::Live(13));
}

#[test]
fn hello_world_scenario_restores_space() {
    let mut page = SlottedPage::new(1024, BlockId(0)).unwrap();
    let slot = inserted(&mut page, b"hello, world!");
    assert_eq!(page.space_available().unwrap(), 991);

    page.tombstone(slot).unwrap();
    assert_eq!(page.space_available().unwrap(), 991);

    page.reclaim(slot).unwrap();
    assert_eq!(page.space_available().unwrap(), 1012);
    assert_eq!(page.slot_count().unwrap(), 0);
    assert_eq!(page.free_space_offset().unwrap(), 1024);
}

#[test]
fn appending_costs_record_plus_entry() {
    let mut page = SlottedPage::new(512, BlockId(0)).unwrap();
    let before = page.space_available().unwrap();
    inserted(&mut page, b"abcdef");
    assert_eq!(page.space_available().unwrap(), before - 6 - SLOT_SIZE);
}

#[test]
fn reusing_a_hole_costs_only_the_record() {
    let mut page = SlottedPage::new(512, BlockId(0)).unwrap();
    let a = inserted(&mut page, b"aaaa");
    inserted(&mut page, b"bbbb");
    page.reclaim(a).unwrap();

    let before = page.space_available().unwrap();
    let reused = inserted(&mut page, b"cccccc");
    assert_eq!(reused, a);
    assert_eq!(page.space_available().unwrap(), before - 6);
}

#[test]
fn tombstone_is_idempotent_and_hides_record() {
    let mut page = SlottedPage::new(256, BlockId(0)).unwrap();
    let slot = inserted(&mut page, b"record");

    page.tombstone(slot).unwrap();
    let once = page.slot_state(slot).unwrap();
    page.tombstone(slot).unwrap();
    assert_eq!(page.slot_state(slot).unwrap(), once);
    assert_eq!(once, SlotState::Tombstoned(6));

    let err = page.read(slot).unwrap_err();
    assert!(matches!(err, DbError::Storage(msg) if msg.contains("tombstoned")));
    // Bytes stay in place until reclaimed.
    assert_eq!(page.stats().unwrap().dead_bytes, 6);
}

#[test]
fn tombstone_writes_negated_size() {
    let mut page = SlottedPage::new(64, BlockId(0)).unwrap();
    let slot = inserted(&mut page, b"abc");
    page.tombstone(slot).unwrap();
    let raw = page.buffer().read_i32(16).unwrap();
    assert_eq!(raw, -3);
}

#[test]
fn reclaiming_a_middle_slot_shifts_newer_records() {
    let mut page = SlottedPage::new(1024, BlockId(0)).unwrap();
    let a = inserted(&mut page, b"alpha");
    let b = inserted(&mut page, b"bravo!");
    let c = inserted(&mut page, b"charlie");
    assert_eq!(page.free_space_offset().unwrap(), 1006);

    page.tombstone(b).unwrap();
    page.reclaim(b).unwrap();

    assert_eq!(page.read(a).unwrap(), b"alpha");
    assert_eq!(page.read(c).unwrap(), b"charlie");
    assert_eq!(page.free_space_offset().unwrap(), 1012);
    assert_eq!(page.slot_count().unwrap(), 3);
    assert_eq!(page.slot_state(b).unwrap(), SlotState::Empty);
    assert_eq!(page.space_available().unwrap(), 1012 - (HEADER_SIZE + 3 * SLOT_SIZE));

    let slots = page.slots().unwrap();
    assert_eq!(slots[0].offset, 1019);
    assert_eq!(slots[1].offset, 0);
    assert_eq!(slots[2].offset, 1012);
    page.validate().unwrap();
}

#[test]
fn hole_is_reused_before_appending() {
    let mut page = SlottedPage::new(1024, BlockId(0)).unwrap();
    inserted(&mut page, b"alpha");
    let b = inserted(&mut page, b"bravo!");
    inserted(&mut page, b"charlie");
    page.reclaim(b).unwrap();

    assert_eq!(page.first_free_slot().unwrap(), b);
    let d = inserted(&mut page, b"delta");
    assert_eq!(d, b);
    assert_eq!(page.read(d).unwrap(), b"delta");
    assert_eq!(page.slot_count().unwrap(), 3);
    assert_eq!(page.first_free_slot().unwrap(), SlotId(3));
}

#[test]
fn reclaiming_the_last_slot_trims_trailing_holes() {
    let mut page = SlottedPage::new(1024, BlockId(0)).unwrap();
    let a = inserted(&mut page, b"one");
    let b = inserted(&mut page, b"two");
    let c = inserted(&mut page, b"three");

    page.reclaim(b).unwrap();
    assert_eq!(page.slot_count().unwrap(), 3);

    page.reclaim(c).unwrap();
    assert_eq!(page.slot_count().unwrap(), 1);
    assert_eq!(page.read(a).unwrap(), b"one");
    assert_eq!(page.space_available().unwrap(), 1024 - HEADER_SIZE - SLOT_SIZE - 3);
}

#[test]
fn reclaim_accepts_live_records() {
    let mut page = SlottedPage::new(128, BlockId(0)).unwrap();
    let slot = inserted(&mut page, b"never tombstoned");
    page.reclaim(slot).unwrap();
    assert_eq!(page.space_available().unwrap(), 128 - HEADER_SIZE);
}

#[test]
fn operations_on_missing_or_empty_slots_fail() {
    let mut page = SlottedPage::new(128, BlockId(0)).unwrap();
    assert!(matches!(page.read(SlotId(0)), Err(DbError::Storage(_))));
    assert!(matches!(page.tombstone(SlotId(0)), Err(DbError::Storage(_))));

    let a = inserted(&mut page, b"a");
    inserted(&mut page, b"b");
    page.reclaim(a).unwrap();

    let err = page.reclaim(a).unwrap_err();
    assert!(matches!(err, DbError::Storage(msg) if msg.contains("empty")));
    let err = page.read(a).unwrap_err();
    assert!(matches!(err, DbError::Storage(msg) if msg.contains("empty")));
    let err = page.reclaim(SlotId(5)).unwrap_err();
    assert!(matches!(err, DbError::Storage(msg) if msg.contains("invalid slot")));
}

#[test]
fn zero_length_records_are_rejected() {
    let mut page = SlottedPage::new(128, BlockId(0)).unwrap();
    assert!(matches!(page.insert(b""), Err(DbError::Storage(_))));
    assert_eq!(page.slot_count().unwrap(), 0);
}

#[test]
fn exact_fit_is_accepted_and_overflow_refused() {
    let capacity = HEADER_SIZE + SLOT_SIZE + 5;
    let mut page = SlottedPage::new(capacity, BlockId(0)).unwrap();
    assert!(page.can_fit(5).unwrap());
    assert!(!page.can_fit(6).unwrap());

    assert_eq!(page.insert(b"123456").unwrap(), InsertOutcome::PageFull);
    assert_eq!(page.slot_count().unwrap(), 0);
    assert_eq!(page.free_space_offset().unwrap(), capacity);

    inserted(&mut page, b"12345");
    assert_eq!(page.space_available().unwrap(), 0);
    assert!(!page.can_fit(1).unwrap());
    assert_eq!(page.insert(b"x").unwrap(), InsertOutcome::PageFull);
}

#[test]
fn can_fit_agrees_with_insert() {
    let mut page = SlottedPage::new(1024, BlockId(0)).unwrap();
    let record = b"hello, world!";
    let mut count = 0;
    while page.can_fit(record.len()).unwrap() {
        inserted(&mut page, record);
        count += 1;
    }
    assert_eq!(count, (1024 - HEADER_SIZE) / (record.len() + SLOT_SIZE));
    assert_eq!(page.insert(record).unwrap(), InsertOutcome::PageFull);
}

#[test]
fn draining_a_full_page_newest_first_empties_it() {
    let words = ["anchor", "harbor", "scroll", "dragon", "hoard", "gem"];
    let mut page = SlottedPage::new(1024, BlockId(0)).unwrap();
    let mut slots = Vec::new();
    for word in words.iter().cycle() {
        match page.insert(word.as_bytes()).unwrap() {
            InsertOutcome::Inserted(slot) => slots.push(slot),
            InsertOutcome::PageFull => break,
        }
    }
    assert!(slots.len() > words.len());

    for slot in slots.into_iter().rev() {
        page.tombstone(slot).unwrap();
        page.reclaim(slot).unwrap();
        page.validate().unwrap();
    }
    assert_eq!(page.slot_count().unwrap(), 0);
    assert_eq!(page.space_available().unwrap(), 1024 - HEADER_SIZE);
}

#[test]
fn vacuum_reclaims_only_tombstones() {
    let mut page = SlottedPage::new(512, BlockId(0)).unwrap();
    let a = inserted(&mut page, b"keep-a");
    let b = inserted(&mut page, b"drop-b");
    let c = inserted(&mut page, b"keep-c");
    let d = inserted(&mut page, b"drop-d");
    page.tombstone(b).unwrap();
    page.tombstone(d).unwrap();

    assert_eq!(page.vacuum().unwrap(), 2);
    assert_eq!(page.vacuum().unwrap(), 0);

    let live = page.live_records().unwrap();
    assert_eq!(live, vec![(a, &b"keep-a"[..]), (c, &b"keep-c"[..])]);
    assert_eq!(page.slot_count().unwrap(), 3);
    page.validate().unwrap();
}

#[test]
fn stats_summarize_directory() {
    let mut page = SlottedPage::new(256, BlockId(4)).unwrap();
    let a = inserted(&mut page, b"aaaa");
    let b = inserted(&mut page, b"bbbbbb");
    inserted(&mut page, b"cc");
    page.tombstone(b).unwrap();
    page.reclaim(a).unwrap();

    let stats = page.stats().unwrap();
    assert_eq!(
        stats,
        PageStats {
            block_id: BlockId(4),
            capacity: 256,
            slot_count: 3,
            live_slots: 1,
            tombstoned_slots: 1,
            empty_slots: 1,
            live_bytes: 2,
            dead_bytes: 6,
            free_space_offset: 248,
            space_available: 248 - HEADER_SIZE - 3 * SLOT_SIZE,
        }
    );
}

#[test]
fn page_image_round_trips() {
    let mut page = SlottedPage::new(256, BlockId(12)).unwrap();
    let a = inserted(&mut page, b"persisted");
    let b = inserted(&mut page, b"tombstone me");
    page.tombstone(b).unwrap();

    let image = page.buffer().as_slice().to_vec();
    let loaded = SlottedPage::from_bytes(&image).unwrap();
    assert_eq!(loaded.block_id().unwrap(), BlockId(12));
    assert_eq!(loaded.read(a).unwrap(), b"persisted");
    assert_eq!(loaded.slot_state(b).unwrap(), SlotState::Tombstoned(12));
    assert_eq!(loaded.stats().unwrap(), page.stats().unwrap());
}

#[test]
fn corrupt_images_are_rejected() {
    let mut page = SlottedPage::new(128, BlockId(0)).unwrap();
    inserted(&mut page, b"first");
    inserted(&mut page, b"second");
    let image = page.into_buffer().into_vec();

    let mut bad_free = image.clone();
    bad_free[4..8].copy_from_slice(&129i32.to_le_bytes());
    assert!(matches!(SlottedPage::from_bytes(&bad_free), Err(DbError::Storage(_))));

    let mut bad_count = image.clone();
    bad_count[8..12].copy_from_slice(&(-1i32).to_le_bytes());
    assert!(matches!(SlottedPage::from_bytes(&bad_count), Err(DbError::Storage(_))));

    let mut directory_overrun = image.clone();
    directory_overrun[8..12].copy_from_slice(&100i32.to_le_bytes());
    assert!(SlottedPage::from_bytes(&directory_overrun).is_err());

    // Slide slot 1 into the middle of slot 0's bytes.
    let mut overlapping = image.clone();
    let slot0_offset = i32::from_le_bytes(overlapping[12..16].try_into().unwrap());
    assert_eq!(slot0_offset, 123);
    overlapping[20..24].copy_from_slice(&120i32.to_le_bytes());
    let err = SlottedPage::from_bytes(&overlapping).unwrap_err();
    assert!(matches!(err, DbError::Storage(msg) if msg.contains("overlap")));

    let mut past_end = image;
    past_end[16..20].copy_from_slice(&500i32.to_le_bytes());
    assert!(SlottedPage::from_bytes(&past_end).is_err());

    assert!(SlottedPage::from_bytes(&[0u8; 4]).is_err());
}

#[test]
fn empty_slot_offset_is_ignored_in_adopted_images() {
    let mut page = SlottedPage::new(128, BlockId(0)).unwrap();
    let a = inserted(&mut page, b"first");
    let b = inserted(&mut page, b"second");
    page.reclaim(a).unwrap();
    let mut image = page.into_buffer().into_vec();
    image[12..16].copy_from_slice(&(-1i32).to_le_bytes());

    let loaded = SlottedPage::from_bytes(&image).unwrap();
    let slots = loaded.slots().unwrap();
    assert_eq!(slots[0], SlotInfo { slot: a, offset: 0, state: SlotState::Empty });
    assert_eq!(slots[1].state, SlotState::Live(6));

    let stats = loaded.stats().unwrap();
    assert_eq!(stats.empty_slots, 1);
    assert_eq!(stats.live_slots, 1);
    assert_eq!(loaded.read(b).unwrap(), b"second");
}
