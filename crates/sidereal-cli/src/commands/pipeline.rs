use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use sidereal_core::config::RunConfig;
use sidereal_core::geometry::IntegerSize;
use sidereal_core::io::{load_image, save_image};
use sidereal_core::item::{ImageItem, ImageList, ProcessableItem};
use sidereal_core::process::{ProcessController, ProcessKind};
use tracing::warn;

use crate::progress::BarObserver;
use crate::summary::{print_process_result, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Run config file (TOML), see `sidereal config`
    pub config: PathBuf,

    /// Override the worker thread count (0 = one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Override the output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let mut config: RunConfig = toml::from_str(&contents).context("Invalid run config")?;
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    execute(&config)
}

fn item_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Load every input; files that cannot be decoded become unreadable items.
fn load_list(inputs: &[PathBuf]) -> ImageList {
    let items = inputs
        .iter()
        .map(|path| {
            let name = item_name(path);
            let item = match load_image(path) {
                Ok(image) => ImageItem::new(name, image),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "cannot read input");
                    ImageItem::unreadable(name, IntegerSize::default(), 1)
                }
            };
            Arc::new(item) as Arc<dyn ProcessableItem>
        })
        .collect();
    ImageList::new(items)
}

/// Align then stack the inputs of `config` and save the result.
pub fn execute(config: &RunConfig) -> Result<()> {
    if config.inputs.is_empty() {
        bail!("No input files");
    }
    print_run_summary(config);

    let list = load_list(&config.inputs);
    let reference_name = match &config.alignment.reference {
        Some(name) => name.clone(),
        None => item_name(&config.inputs[0]),
    };
    let reference = list
        .find(&reference_name)
        .with_context(|| format!("Reference '{}' is not among the inputs", reference_name))?;
    let size = reference.size();
    if reference.image().is_none() {
        bail!("Reference '{}' cannot be read", reference_name);
    }

    let controller =
        ProcessController::new(config.threads).with_observer(Arc::new(BarObserver::new()?));
    let stacking = config.stacking.to_params(size.width, size.height)?;

    if stacking.mode.uses_alignment() {
        let alignment = config
            .alignment
            .to_params(&reference_name, size.width, size.height);
        let summary =
            controller.start_list_process(&ProcessKind::Align(alignment), &list.enumerator())?;
        print_process_result(&summary);
        if !summary.is_complete() {
            bail!("Alignment was cancelled");
        }
    }

    let summary =
        controller.start_list_process(&ProcessKind::Stack(stacking), &list.enumerator())?;
    print_process_result(&summary);
    let Some(image) = summary.image else {
        bail!("No image could be stacked");
    };

    save_image(&image, &config.output)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    println!("\nOutput saved to {}", config.output.display());
    Ok(())
}
