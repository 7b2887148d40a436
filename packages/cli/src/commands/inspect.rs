use super::read_stored;
use crate::config::Config;
use anvil_blocks::{Block, Document};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Longest attribute preview shown in the outline
const PREVIEW_CHARS: usize = 40;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Stored post content (block JSON or legacy HTML)
    pub input: PathBuf,

    /// Print the block JSON, as stored, after the outline
    #[arg(long)]
    pub json: bool,
}

pub fn inspect(args: InspectArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut ids = config.id_generator();
    let loaded = read_stored(&args.input, &mut ids)?;
    let doc = &loaded.document;

    println!("📄 {}", args.input.display().to_string().bold());
    if loaded.converted_from_legacy {
        println!(
            "   {} legacy HTML content, shown as a single html block",
            "note:".yellow()
        );
    }
    println!();

    for line in outline(doc) {
        println!("{}", line);
    }

    let counts = count_types(doc);
    println!();
    println!("   Top-level blocks: {}", doc.len());
    println!("   Total blocks:     {}", doc.block_count());
    for (block_type, count) in &counts {
        println!("     {} {}", format!("{:>4}", count).dimmed(), block_type);
    }

    if args.json {
        println!();
        println!("{}", doc.to_json_pretty()?);
    }

    Ok(())
}

/// Indented outline of the tree, one line per block and column slot
pub fn outline(doc: &Document) -> Vec<String> {
    let mut lines = Vec::new();

    for block in doc.blocks() {
        lines.push(format!("- {}", describe(block)));

        if let Some(slots) = &block.columns {
            for (index, slot) in slots.iter().enumerate() {
                if slot.is_empty() {
                    lines.push(format!("  column {} (empty)", index));
                    continue;
                }
                lines.push(format!("  column {}", index));
                for nested in slot {
                    lines.push(format!("    - {}", describe(nested)));
                }
            }
        }
    }

    lines
}

/// Number of blocks per type, nested blocks included
pub fn count_types(doc: &Document) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for block in doc.blocks() {
        *counts.entry(block.block_type.clone()).or_insert(0) += 1;
        for nested in block.nested_blocks() {
            *counts.entry(nested.block_type.clone()).or_insert(0) += 1;
        }
    }
    counts
}

fn describe(block: &Block) -> String {
    let mut line = format!("{} #{}", block.block_type, block.id);

    if block.is_columns() {
        line.push_str(&format!(" [{} columns]", block.column_count()));
    } else if let Some(text) = ["content", "text", "url"]
        .iter()
        .find_map(|key| block.attribute(key).and_then(|v| v.as_str()))
    {
        line.push_str(&format!(" {:?}", preview(text)));
    }

    line
}

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut)
}
