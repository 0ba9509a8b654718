// CLI command implementations

pub mod build;
pub mod query;
pub mod stats;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::frontend::QueryContext;
use crate::indexer;

/// Load the cached snapshot (building it if needed) for one query.
///
/// `None` means there is neither a cached index nor a source tree; a message
/// telling the user what to do has already been printed.
pub async fn open_context(project: &str, config: Config) -> Result<Option<QueryContext>> {
    let project_dir = PathBuf::from(project);
    let Some((snapshot, _)) = indexer::load_or_build(&config, &project_dir, false).await? else {
        print_missing_source(&config, &project_dir);
        return Ok(None);
    };

    let source_root = config.source_root(&project_dir);
    Ok(Some(QueryContext::new(Arc::new(snapshot), config, source_root)))
}

pub(crate) fn print_missing_source(config: &Config, project_dir: &Path) {
    println!(
        "No index found and no source tree at {}.",
        config.source_root(project_dir).display()
    );
    println!(
        "Set project.source_root in {} and run `phpindex build` first.",
        crate::config::CONFIG_FILE
    );
}
