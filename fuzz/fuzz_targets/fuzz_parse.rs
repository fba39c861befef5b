#![no_main]

use asset_splice::{open_random_access, Edits, MemorySource};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any input must either parse or return an error, never panic
    let edits = Edits::strip_all().set_xmp(b"<x:xmpmeta/>".to_vec());
    if let Ok(mut view) = open_random_access(MemorySource::new(data.to_vec()), &edits) {
        let len = view.duration_logical().unwrap_or(0);

        // Read the logical stream in odd-sized pieces
        let mut offset = 0u64;
        while offset < len {
            match view.read_logical_range(offset, 97) {
                Ok(out) if !out.is_empty() => offset += out.len() as u64,
                _ => break,
            }
        }
    }
});
