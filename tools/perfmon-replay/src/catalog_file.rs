//! Catalog files on disk: YAML/JSON definitions or the binary format

use anyhow::{bail, Context, Result};
use perfmon_calc::{load_catalog, save_catalog, Catalog, CatalogDefinition};
use std::path::Path;

/// Extensions treated as the binary catalog format
const BINARY_EXTENSIONS: [&str; 2] = ["bin", "pmc"];

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

pub fn is_binary(path: &Path) -> bool {
    extension(path).is_some_and(|e| BINARY_EXTENSIONS.contains(&e))
}

/// Load a catalog, choosing the format by extension
pub fn load(path: &Path) -> Result<Catalog> {
    let catalog = if is_binary(path) {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        load_catalog(&bytes).with_context(|| format!("Invalid binary catalog {}", path.display()))?
    } else {
        CatalogDefinition::from_path(path)?
            .build()
            .with_context(|| format!("Invalid catalog {}", path.display()))?
    };
    tracing::debug!(
        path = %path.display(),
        device = %catalog.device().name,
        sets = catalog.sets().len(),
        "Catalog loaded"
    );
    Ok(catalog)
}

/// Write a catalog, choosing the format by extension
pub fn save(catalog: &Catalog, path: &Path) -> Result<()> {
    let bytes = match extension(path) {
        _ if is_binary(path) => save_catalog(catalog)?.to_vec(),
        Some("json") => CatalogDefinition::from(catalog).to_json_string()?.into_bytes(),
        Some("yaml") | Some("yml") => CatalogDefinition::from(catalog).to_yaml_string()?.into_bytes(),
        other => bail!("Unsupported catalog extension {:?} for {}", other, path.display()),
    };
    std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Catalog written");
    Ok(())
}
