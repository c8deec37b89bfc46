//! Fuzz target for the top-level field locator and id insertion.
//!
//! Any line accepted as a record must stay valid JSON after insertion, and
//! removing the inserted pair must give back the original bytes.

#![no_main]

use cidretro::record::RecordView;
use libfuzzer_sys::fuzz_target;

const PAIR: &[u8] = b",\"community_id\":\"1:fuzz=\"";

fuzz_target!(|data: &[u8]| {
    let Ok(view) = RecordView::parse(data, "uid", "community_id") else {
        return;
    };
    let _ = view.uid();

    let mut out = Vec::new();
    if !view.insert_after_uid("community_id", "1:fuzz=", &mut out) {
        assert!(out.is_empty());
        return;
    }

    assert!(serde_json::from_slice::<serde_json::Value>(&out).is_ok());

    let Some(span) = view.uid_span() else {
        return;
    };
    let at = span.end;
    assert_eq!(&out[at..at + PAIR.len()], PAIR);
    assert_eq!(&out[..at], &data[..at]);
    assert_eq!(&out[at + PAIR.len()..], &data[at..]);
});
