use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sidereal_core::io::load_image;

#[derive(Args)]
pub struct InfoArgs {
    /// Image files (PNG, TIFF, JPEG)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    for (i, path) in args.files.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let image =
            load_image(path).with_context(|| format!("Failed to read {}", path.display()))?;

        println!("File:        {}", path.display());
        println!("Dimensions:  {}x{}", image.width(), image.height());
        println!(
            "Planes:      {} ({})",
            image.planes(),
            if image.planes() == 1 { "mono" } else { "color" }
        );
        let (lo, hi) = image.levels();
        println!("Levels:      {:.4} .. {:.4}", lo, hi);
        for p in 0..image.planes() {
            let (lo, hi) = image.plane_levels(p);
            println!("  plane {}:   {:.4} .. {:.4}", p, lo, hi);
        }
        let mb = image.memory_size() as f64 / (1024.0 * 1024.0);
        println!("Memory:      {:.1} MB", mb);
    }
    Ok(())
}
