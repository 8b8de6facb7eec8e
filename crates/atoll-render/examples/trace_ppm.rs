//! Render the procedural scene in parallel and write a PPM image.
//!
//! Usage: cargo run --example trace_ppm [output.ppm]

use std::io::Write;

use atoll_render::{render_parallel, RayScene};

fn main() -> std::io::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "trace.ppm".to_string());

    let scene = RayScene::new(640, 480);
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let frame = render_parallel(&scene, 50, workers);

    let mut out = std::io::BufWriter::new(std::fs::File::create(&path)?);
    writeln!(out, "P6 {} {} 255", frame.width, frame.height)?;
    // PPM carries no alpha; drop the fixed 255 byte.
    for pixel in frame.data.chunks_exact(4) {
        out.write_all(&pixel[..3])?;
    }

    eprintln!("wrote {path}");
    Ok(())
}
