use super::read_stored;
use crate::config::{load_registry, Config};
use anvil_blocks::{BlockTypeRegistry, Document};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Stored post content (block JSON or legacy HTML)
    pub input: PathBuf,

    /// Block type registry JSON, enables attribute checks
    #[arg(short, long)]
    pub registry: Option<PathBuf>,

    /// Show all diagnostics including info level
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub rule: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
}

pub fn validate(args: ValidateArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let registry = match config.registry_path(args.registry.as_deref(), cwd) {
        Some(path) => Some(load_registry(&path)?),
        None => None,
    };

    let mut ids = config.id_generator();
    let loaded = read_stored(&args.input, &mut ids)?;

    let mut diagnostics = check_document(&loaded.document, registry.as_ref());
    if loaded.converted_from_legacy {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warning,
            rule: "legacy-content",
            message: "content is not a block tree and loads as a single html block".to_string(),
            block_id: None,
        });
    }

    let errors = count(&diagnostics, DiagnosticLevel::Error);

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        print_text(&args.input, &diagnostics, args.verbose, registry.is_some());
    }

    // Exit with error code if there are errors
    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Run the structural checks, plus schema checks when a registry is known.
/// Unknown block types are reported as info.
pub fn check_document(doc: &Document, registry: Option<&BlockTypeRegistry>) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = doc
        .check_invariants()
        .into_iter()
        .map(|violation| Diagnostic {
            level: DiagnosticLevel::Error,
            rule: "tree-invariant",
            message: violation.to_string(),
            block_id: None,
        })
        .collect();

    if let Some(registry) = registry {
        for violation in registry.validate_document(doc) {
            let (level, rule) = if violation.is_unknown_type() {
                (DiagnosticLevel::Info, "unknown-type")
            } else {
                (DiagnosticLevel::Error, "attribute-type")
            };
            diagnostics.push(Diagnostic {
                level,
                rule,
                message: violation.to_string(),
                block_id: Some(violation.block_id),
            });
        }
    }

    diagnostics
}

fn count(diagnostics: &[Diagnostic], level: DiagnosticLevel) -> usize {
    diagnostics.iter().filter(|d| d.level == level).count()
}

fn print_text(input: &Path, diagnostics: &[Diagnostic], verbose: bool, schema_checked: bool) {
    println!("🔍 {}", input.display());
    if !schema_checked {
        println!("   {} no registry given, attribute checks skipped", "note:".dimmed());
    }

    for diagnostic in diagnostics {
        let level_str = match diagnostic.level {
            DiagnosticLevel::Error => "error".red().bold(),
            DiagnosticLevel::Warning => "warning".yellow().bold(),
            DiagnosticLevel::Info => "info".blue().bold(),
        };

        if !verbose && diagnostic.level == DiagnosticLevel::Info {
            continue;
        }

        println!("  {} [{}] {}", level_str, diagnostic.rule, diagnostic.message);
    }

    let errors = count(diagnostics, DiagnosticLevel::Error);
    let warnings = count(diagnostics, DiagnosticLevel::Warning);

    println!();
    if errors > 0 {
        println!("   {} {}", "Errors:".red(), errors);
    }
    if warnings > 0 {
        println!("   {} {}", "Warnings:".yellow(), warnings);
    }
    if errors == 0 && warnings == 0 {
        println!("   {} No issues found!", "✓".green());
    }
}
