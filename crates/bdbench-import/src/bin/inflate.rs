//! Inflate `.deflate` files to stdout.
//!
//! ```bash
//! bdbench-inflate data/tiny/rankings/000000_0.deflate | head
//! ```

use anyhow::{Context, Result};
use bdbench_core::inflate::inflate_to;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Inflate deflated benchmark files to stdout.
#[derive(Parser, Debug)]
#[command(name = "bdbench-inflate")]
#[command(about = "Inflate .deflate files to stdout")]
#[command(version)]
struct Args {
    /// Files to inflate, written in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for the inflated text.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for path in &args.files {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let written = inflate_to(file, &mut out)
            .with_context(|| format!("Failed to inflate {}", path.display()))?;
        tracing::debug!("Inflated {} to {} bytes", path.display(), written);
    }

    out.flush()?;
    Ok(())
}
