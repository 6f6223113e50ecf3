//! Info command - describe the planes of a frame file.

use std::path::PathBuf;

use texblock::frame::FrameHeader;

use super::common::format_size;
use crate::error::CliError;

/// Run the info command. With dimensions, each plane's ratio against its
/// raw block size is shown too.
pub fn run(input: PathBuf, dimensions: Option<(u32, u32)>) -> Result<(), CliError> {
    let data = std::fs::read(&input).map_err(|e| CliError::io(&input, e))?;
    let header = FrameHeader::parse(&data)?;

    println!("{}", input.display());
    println!("  Size:   {}", format_size(data.len() as u64));
    println!("  Header: {} bytes", header.len());
    println!("  Planes: {}", header.planes().len());

    for (i, plane) in header.planes().iter().enumerate() {
        print!(
            "  [{}] {:<12} {:<8} offset {:>8}  length {:>10}",
            i,
            plane.format.name(),
            plane.stage.name(),
            plane.offset,
            format_size(plane.length as u64)
        );
        if let Some((width, height)) = dimensions {
            let raw = plane.format.encoded_size(width, height);
            print!("  raw {:>10}  ratio {:.2}:1", format_size(raw as u64), raw as f64 / plane.length.max(1) as f64);
        }
        println!();
    }
    Ok(())
}
