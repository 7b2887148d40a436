use super::read_stored;
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Stored post content (block JSON or legacy HTML)
    pub input: PathBuf,

    /// Write the block JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn convert(args: ConvertArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut ids = config.id_generator();
    let mut loaded = read_stored(&args.input, &mut ids)?;
    let relocated = loaded.document.normalize();
    let json = loaded.document.to_json_pretty()?;
    debug!(relocated, "Document normalized for output");

    let Some(output) = args.output else {
        // Status goes to stderr so stdout stays valid JSON
        println!("{}", json);
        if loaded.converted_from_legacy {
            eprintln!("{} Converted legacy HTML", "✓".green());
        }
        return Ok(());
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    std::fs::write(&output, format!("{}\n", json))
        .with_context(|| format!("Cannot write {}", output.display()))?;

    println!(
        "{} {} → {} ({} blocks{})",
        "✓".green(),
        args.input.display(),
        output.display(),
        loaded.document.block_count(),
        if loaded.converted_from_legacy {
            ", converted from legacy HTML"
        } else {
            ""
        }
    );

    Ok(())
}
