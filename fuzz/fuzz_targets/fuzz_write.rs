#![no_main]

use asset_splice::{rewrite_stream, Edits};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Try rewriting with various edit configurations
    let configs = [
        Edits::new(),
        Edits::strip_all(),
        Edits::new().set_xmp(b"<test>fuzz</test>".to_vec()),
        Edits::new().set_exif(b"II*\0\x08\0\0\0\0\0".to_vec()).with_chunk_size(13),
    ];

    for edits in &configs {
        let mut output = Vec::new();
        let _ = rewrite_stream(&mut Cursor::new(data), &mut output, edits);
    }
});
