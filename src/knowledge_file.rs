//! JSON persistence for the local knowledge store.

use std::path::Path;

use vantage_search::{InMemoryKnowledge, KnowledgeSnapshot};

use crate::error::{AppError, Result};

/// Load a knowledge store from `path`. A missing file yields an empty store.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<InMemoryKnowledge> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no knowledge file, starting empty");
        return Ok(InMemoryKnowledge::new());
    }
    let content = std::fs::read_to_string(path)?;
    let snapshot: KnowledgeSnapshot =
        serde_json::from_str(&content).map_err(|e| AppError::Knowledge(e.to_string()))?;
    tracing::debug!(
        path = %path.display(),
        documents = snapshot.documents.len(),
        "knowledge loaded"
    );
    Ok(InMemoryKnowledge::from_snapshot(snapshot))
}

/// Write the contents of `knowledge` to `path`, creating parent directories.
///
/// The file is written next to its destination and renamed into place.
///
/// # Errors
///
/// Returns an error if serialisation or any filesystem step fails.
pub fn save(path: &Path, knowledge: &InMemoryKnowledge) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&knowledge.snapshot())
        .map_err(|e| AppError::Knowledge(e.to_string()))?;
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, content)?;
    std::fs::rename(&staging, path)?;
    tracing::debug!(path = %path.display(), documents = knowledge.len(), "knowledge saved");
    Ok(())
}
