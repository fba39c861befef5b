//! Example: List the metadata carriers of a media file
//!
//! Every EXIF, XMP and IPTC carrier the container parser finds is printed
//! with its position, without reading past the start of the image data.
//!
//! Run: `cargo run --example inspect -- <file>`

use asset_splice::{open_random_access, Edits, ReadSeekSource};
use std::{env, fs::File};

fn main() -> asset_splice::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <image_file>", args[0]);
        std::process::exit(1);
    }

    let filename = &args[1];
    println!("Parsing: {}", filename);

    let source = ReadSeekSource::new(File::open(filename)?)?;
    let view = open_random_access(source, &Edits::strip_all())?;
    let chunks = view.chunks();

    println!("\nFile structure:");
    println!("  Original size: {:?} bytes", chunks.duration_original());
    println!("  Without metadata: {:?} bytes", chunks.duration_logical());

    if chunks.strip().is_empty() {
        println!("\n✗ No metadata carriers found");
    }
    for chunk in chunks.strip() {
        println!(
            "  {:<5} {:>10} .. {:<10} ({} bytes)",
            chunk.kind,
            chunk.offset_original,
            chunk.end_original(),
            chunk.size
        );
    }

    Ok(())
}
