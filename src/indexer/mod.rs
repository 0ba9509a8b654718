// Index building: walk, parse, derive

pub mod events;
pub mod parser;
pub mod source;
pub mod sql;
pub mod walker;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info};

use crate::config::Config;
use crate::index::schema::SchemaIndex;
use crate::index::store::{self, Snapshot};
use crate::index::{Declaration, Index, FORMAT_VERSION};
use parser::PhpParser;
use source::{LocalSource, Provenance, SourceProvider};
use sql::SqlSchemaParser;
use walker::TreeWalker;

/// Coordinates discovery and parsing for both the declaration tree and the SQL tree
pub struct Indexer {
    php: PhpParser,
    sql: SqlSchemaParser,
    sources: TreeWalker,
    schema_files: TreeWalker,
    batch_size: usize,
}

impl Indexer {
    pub fn new(config: &Config) -> Self {
        Self {
            php: PhpParser::with_extensions(&config.indexing.extensions),
            sql: SqlSchemaParser::new(&config.schema.table_prefix, &config.indexing.schema_extensions),
            sources: TreeWalker::for_sources(config),
            schema_files: TreeWalker::for_schema(config),
            batch_size: config.indexing.batch_size.max(1),
        }
    }

    /// Parse every source file under `source_root`, one after another
    pub fn build(&self, source_root: &Path, provenance: Provenance) -> Index {
        info!("Indexing declarations under {}", source_root.display());
        let declarations = self.sources.walk_and_parse(source_root, &self.php);
        assemble(declarations, provenance)
    }

    /// Same result set as [`Indexer::build`], with files parsed in batches on
    /// blocking worker tasks. Declaration order may differ.
    pub async fn build_concurrent(&self, source_root: &Path, provenance: Provenance) -> Result<Index> {
        let files = self.sources.discover(source_root);
        info!(
            "Indexing {} files under {} in batches of {}",
            files.len(),
            source_root.display(),
            self.batch_size
        );

        let tasks = files.chunks(self.batch_size).map(|batch| {
            let batch: Vec<PathBuf> = batch.to_vec();
            let parser = self.php.clone();
            tokio::task::spawn_blocking(move || {
                batch
                    .iter()
                    .flat_map(|path| walker::parse_file(path, &parser))
                    .collect::<Vec<Declaration>>()
            })
        });

        let mut declarations = Vec::new();
        for batch in join_all(tasks).await {
            declarations.extend(batch?);
        }

        Ok(assemble(declarations, provenance))
    }

    /// Parse the SQL files under `sql_root` into a table map
    pub fn build_schema(&self, sql_root: &Path) -> SchemaIndex {
        info!("Indexing schema under {}", sql_root.display());
        let tables = self.schema_files.walk_and_parse(sql_root, &self.sql);
        let schema = SchemaIndex::from_tables(tables);
        info!("Indexed {} tables", schema.tables.len());
        schema
    }

    /// Build declarations and schema from one source provider
    pub async fn build_snapshot<S: SourceProvider>(&self, source: &S, concurrent: bool) -> Result<Snapshot> {
        let provenance = source.provenance();
        let index = if concurrent {
            self.build_concurrent(source.source_root(), provenance).await?
        } else {
            self.build(source.source_root(), provenance)
        };
        let schema = self.build_schema(source.schema_root());
        Ok(Snapshot::new(index, schema))
    }
}

/// Namespace to simple names, in discovery order. Global-namespace
/// declarations are left out.
pub fn build_namespace_map(declarations: &[Declaration]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for declaration in declarations.iter().filter(|d| !d.namespace.is_empty()) {
        map.entry(declaration.namespace.clone())
            .or_default()
            .push(declaration.name.clone());
    }
    map
}

fn assemble(declarations: Vec<Declaration>, provenance: Provenance) -> Index {
    let namespace_map = build_namespace_map(&declarations);
    let event_map = events::build_event_map(&declarations);

    info!(
        "Indexed {} declarations in {} namespaces ({} events)",
        declarations.len(),
        namespace_map.len(),
        event_map.len()
    );

    Index {
        format_version: FORMAT_VERSION.to_string(),
        built_at: Utc::now(),
        source_commit: provenance.commit,
        source_branch: provenance.branch,
        declarations,
        namespace_map,
        event_map,
    }
}

/// Where a snapshot handed out by [`load_or_build`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    Cache,
    Built,
}

/// Load the persisted snapshot, or build and persist a fresh one.
///
/// Returns `None` when nothing is cached and there is no source tree to build from.
pub async fn load_or_build(
    config: &Config,
    project_dir: &Path,
    rebuild: bool,
) -> Result<Option<(Snapshot, SnapshotOrigin)>> {
    let index_path = config.index_path(project_dir);
    let schema_path = config.schema_path(project_dir);

    if !rebuild {
        if let Some(index) = store::load_index(&index_path) {
            let schema = store::load_schema(&schema_path).unwrap_or_default();
            debug!("Using cached index from {}", index_path.display());
            return Ok(Some((Snapshot::new(index, schema), SnapshotOrigin::Cache)));
        }
    }

    let source = LocalSource::from_config(config, project_dir);
    if !source.has_sources() {
        info!("No source tree at {}", source.source_root().display());
        return Ok(None);
    }

    let indexer = Indexer::new(config);
    let snapshot = indexer
        .build_snapshot(&source, config.indexing.concurrent)
        .await?;

    store::save_index(&snapshot.index, &index_path)?;
    store::save_schema(&snapshot.schema, &schema_path)?;

    Ok(Some((snapshot, SnapshotOrigin::Built)))
}
