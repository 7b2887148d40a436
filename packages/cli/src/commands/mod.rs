pub mod convert;
pub mod inspect;
pub mod validate;

pub use convert::{convert, ConvertArgs};
pub use inspect::{inspect, InspectArgs};
pub use validate::{validate, ValidateArgs};

use anvil_blocks::{Document, IdGenerator, LoadedDocument};
use anyhow::{Context, Result};
use std::path::Path;

/// Read stored post content from disk, converting legacy HTML on the way in
pub fn read_stored(path: &Path, ids: &mut IdGenerator) -> Result<LoadedDocument> {
    if !path.is_file() {
        return Err(anyhow::anyhow!("Input file does not exist: {}", path.display()));
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let loaded = Document::from_stored(&raw, ids);

    tracing::debug!(
        path = %path.display(),
        blocks = loaded.document.block_count(),
        converted = loaded.converted_from_legacy,
        "Loaded stored content"
    );

    Ok(loaded)
}
