//! Tests for `stylusd::descriptor` - report length derivation.

use stylusd::descriptor::{ReportLengths, report_lengths};

#[test]
fn test_empty_descriptor() {
    assert_eq!(report_lengths(&[]), ReportLengths::default());
}

#[test]
fn test_boot_mouse_without_report_ids() {
    let descriptor = [
        0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x09, 0x01, 0xA1, 0x00, // collections
        0x05, 0x09, 0x19, 0x01, 0x29, 0x03, 0x15, 0x00, 0x25, 0x01, // buttons
        0x95, 0x03, 0x75, 0x01, 0x81, 0x02, // 3 x 1 bit
        0x95, 0x01, 0x75, 0x05, 0x81, 0x01, // padding
        0x05, 0x01, 0x09, 0x30, 0x09, 0x31, 0x15, 0x81, 0x25, 0x7F, // axes
        0x75, 0x08, 0x95, 0x02, 0x81, 0x06, // 2 x 8 bit
        0xC0, 0xC0,
    ];
    assert_eq!(
        report_lengths(&descriptor),
        ReportLengths {
            input: Some(3),
            output: None,
        }
    );
}

#[test]
fn test_report_ids_add_prefix_byte_and_longest_wins() {
    let descriptor = [
        0x85, 0x02, 0x75, 0x08, 0x95, 0x09, 0x81, 0x02, // id 2: 9 bytes in
        0x85, 0x03, 0x75, 0x08, 0x95, 0x03, 0x81, 0x02, // id 3: 3 bytes in
        0x85, 0x04, 0x75, 0x08, 0x95, 0x07, 0x91, 0x02, // id 4: 7 bytes out
    ];
    assert_eq!(
        report_lengths(&descriptor),
        ReportLengths {
            input: Some(10),
            output: Some(8),
        }
    );
}

#[test]
fn test_push_pop_restores_globals() {
    let descriptor = [
        0x75, 0x08, 0x95, 0x04, 0xA4, // push size 8 count 4
        0x95, 0x10, 0x81, 0x02, // 16 bytes
        0xB4, // pop back to count 4
        0x81, 0x02, // 4 bytes
    ];
    assert_eq!(report_lengths(&descriptor).input, Some(20));
}

#[test]
fn test_truncated_item_stops_scan() {
    let descriptor = [0x75, 0x08, 0x95, 0x02, 0x81, 0x02, 0x95];
    assert_eq!(report_lengths(&descriptor).input, Some(2));
}

#[test]
fn test_long_item_is_skipped() {
    let descriptor = [
        0xFE, 0x02, 0x10, 0xAA, 0xBB, // long item
        0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
    ];
    assert_eq!(report_lengths(&descriptor).input, Some(1));
}
