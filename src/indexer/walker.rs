// Source tree discovery

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::Parser;

/// Finds candidate files by extension under a root directory
#[derive(Debug, Clone)]
pub struct TreeWalker {
    extensions: Vec<String>,
    recursive: bool,
    config: Config,
}

impl TreeWalker {
    /// Walker for PHP declaration files
    pub fn for_sources(config: &Config) -> Self {
        Self {
            extensions: config.indexing.extensions.clone(),
            recursive: true,
            config: config.clone(),
        }
    }

    /// Walker for SQL files; single-level unless the config asks for recursion
    pub fn for_schema(config: &Config) -> Self {
        Self {
            extensions: config.indexing.schema_extensions.clone(),
            recursive: config.indexing.schema_recursive,
            config: config.clone(),
        }
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// List matching files. A missing or unreadable root yields an empty list.
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            debug!("Scan root {} does not exist", root.display());
            return Vec::new();
        }

        let mut walker = WalkDir::new(root).follow_links(false);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker.into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.has_extension(path) {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.config.should_index_file(&relative.to_string_lossy()) {
                files.push(path.to_path_buf());
            }
        }

        debug!("Discovered {} files under {}", files.len(), root.display());
        files
    }

    /// Parse every discovered file, skipping (and logging) the ones that fail
    pub fn walk_and_parse<P: Parser>(&self, root: &Path, parser: &P) -> Vec<P::Output> {
        let mut results = Vec::new();
        for path in self.discover(root) {
            results.extend(parse_file(&path, parser));
        }
        results
    }
}

/// Read and parse one file; failures are logged and produce nothing
pub fn parse_file<P: Parser>(path: &Path, parser: &P) -> Vec<P::Output> {
    let path_str = path.to_string_lossy();
    if !parser.can_parse(&path_str) {
        return Vec::new();
    }

    let content = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match parser.parse(&content, &path_str) {
        Ok(items) => {
            debug!("Parsed {} ({} items)", path.display(), items.len());
            items
        }
        Err(e) => {
            warn!("Failed to parse {}: {:#}", path.display(), e);
            Vec::new()
        }
    }
}
