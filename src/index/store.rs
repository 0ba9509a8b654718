use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::schema::SchemaIndex;
use super::{Index, IndexStats, FORMAT_VERSION};

/// An index and schema index built together and served as one unit
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: Index,
    pub schema: SchemaIndex,
}

impl Snapshot {
    pub fn new(index: Index, schema: SchemaIndex) -> Self {
        Self { index, schema }
    }

    pub fn empty() -> Self {
        Self::new(Index::empty(), SchemaIndex::default())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            tables: self.schema.tables.len(),
            ..self.index.stats()
        }
    }
}

/// Shared handle to the current snapshot.
///
/// Readers clone the inner `Arc` and keep using it for the whole request; a
/// rebuild swaps the pointer, so no reader ever sees a half-built index.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.inner.read().clone()
    }

    /// Install a new snapshot, returning the one it replaced
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut guard = self.inner.write();
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move index into place at {}", path.display()))?;

    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        debug!("No cached artifact at {}", path.display());
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt artifact {}: {}", path.display(), e);
            None
        }
    }
}

/// Write an index as JSON
pub fn save_index(index: &Index, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    save_json(index, path)?;
    info!(
        "Saved index with {} declarations to {}",
        index.declarations.len(),
        path.display()
    );
    Ok(())
}

/// Read a previously saved index.
///
/// Missing, unreadable, corrupt or outdated artifacts all yield `None`.
pub fn load_index(path: impl AsRef<Path>) -> Option<Index> {
    let path = path.as_ref();
    let index: Index = load_json(path)?;

    if index.format_version != FORMAT_VERSION {
        warn!(
            "Ignoring index at {} with format version {} (expected {})",
            path.display(),
            index.format_version,
            FORMAT_VERSION
        );
        return None;
    }

    debug!(
        "Loaded index with {} declarations from {}",
        index.declarations.len(),
        path.display()
    );
    Some(index)
}

pub fn save_schema(schema: &SchemaIndex, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    save_json(schema, path)?;
    info!("Saved schema with {} tables to {}", schema.tables.len(), path.display());
    Ok(())
}

pub fn load_schema(path: impl AsRef<Path>) -> Option<SchemaIndex> {
    load_json(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::schema::TableSchema;
    use crate::index::{Declaration, DeclarationKind};
    use tempfile::tempdir;

    #[test]
    fn test_index_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache").join("index.json");

        let mut index = Index::empty();
        index.source_commit = Some("abc123".to_string());
        index
            .declarations
            .push(Declaration::new("Widget", "App", DeclarationKind::Class, "/src/Widget.php"));

        save_index(&index, &path).unwrap();
        let loaded = load_index(&path).unwrap();

        assert_eq!(loaded.source_commit.as_deref(), Some("abc123"));
        assert_eq!(loaded.declarations, index.declarations);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_index(dir.path().join("nope.json")).is_none());
        assert!(load_schema(dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(load_index(&path).is_none());
    }

    #[test]
    fn test_load_outdated_format_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut index = Index::empty();
        index.format_version = "0".to_string();
        save_index(&index, &path).unwrap();

        assert!(load_index(&path).is_none());
    }

    #[test]
    fn test_snapshot_replace() {
        let handle = SnapshotHandle::new(Snapshot::empty());
        let before = handle.current();

        let table = TableSchema {
            qualified_name: "#__users".to_string(),
            short_name: "users".to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            engine: None,
            charset: None,
            comment: None,
        };
        let old = handle.replace(Snapshot::new(Index::empty(), SchemaIndex::from_tables(vec![table])));

        // Existing readers keep their snapshot
        assert!(before.schema.is_empty());
        assert!(old.schema.is_empty());
        assert_eq!(handle.current().schema.tables.len(), 1);
    }
}
