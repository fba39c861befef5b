//! Example: Strip or replace metadata while copying a file
//!
//! Run: `cargo run --example rewrite -- <input> <output> [--strip-all] [--xmp <file>]`

use asset_splice::{rewrite_file, Edits};
use std::env;

fn main() -> asset_splice::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} <input> <output> [--strip-all] [--strip-exif] [--xmp <file>]",
            args[0]
        );
        std::process::exit(1);
    }

    let mut edits = Edits::new();
    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        edits = match flag.as_str() {
            "--strip-all" => Edits::strip_all(),
            "--strip-exif" => edits.strip_exif(),
            "--strip-xmp" => edits.strip_xmp(),
            "--strip-iptc" => edits.strip_iptc(),
            "--xmp" => match rest.next() {
                Some(path) => edits.set_xmp(std::fs::read(path)?),
                None => {
                    eprintln!("--xmp needs a file");
                    std::process::exit(1);
                }
            },
            other => {
                eprintln!("Unknown option: {}", other);
                std::process::exit(1);
            }
        };
    }

    let summary = rewrite_file(&args[1], &args[2], &edits)?;
    println!("Container: {:?}", summary.container);
    println!("Read {} bytes, wrote {}", summary.bytes_read, summary.bytes_written);
    println!("Stripped {} bytes, injected {}", summary.stripped, summary.injected);
    Ok(())
}
