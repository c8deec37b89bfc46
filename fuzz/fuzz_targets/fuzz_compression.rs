//! Fuzz target for compression sniffing and line reading.
//!
//! Arbitrary bytes (valid, truncated or corrupt gzip, or plain text) must
//! either read or fail with an error, never panic.

#![no_main]

use std::io::Write;

use cidretro::io::{Compression, LogReader};
use libfuzzer_sys::fuzz_target;

/// Stop after this many decompressed bytes.
const MAX_READ: usize = 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    let expected = Compression::detect(data);

    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    if file.write_all(data).is_err() {
        return;
    }

    let Ok(mut reader) = LogReader::open(file.path()) else {
        return;
    };
    assert_eq!(reader.compression(), expected);

    let mut line = Vec::new();
    let mut total = 0usize;
    while let Ok(true) = reader.read_line(&mut line) {
        total += line.len();
        if total > MAX_READ {
            break;
        }
    }
});
