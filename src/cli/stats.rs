use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::frontend::{ToolArgs, ToolRegistry};

pub async fn show_stats(project: &str, config: Config) -> Result<()> {
    let project_dir = PathBuf::from(project);
    let has_config = project_dir.join(CONFIG_FILE).exists();

    println!("phpindex v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", config.project.name);
    println!("Config: {}", if has_config { "loaded" } else { "default" });

    let index_path = config.index_path(&project_dir);
    let schema_path = config.schema_path(&project_dir);
    println!("Index file: {} ({})", index_path.display(), file_size(&index_path));
    println!("Schema file: {} ({})", schema_path.display(), file_size(&schema_path));

    let Some(ctx) = super::open_context(project, config).await? else {
        return Ok(());
    };

    let output = ToolRegistry::new().call("index_stats", &ctx, &ToolArgs::new())?;
    println!("\n{}", output);
    Ok(())
}

fn file_size(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(metadata) => format!("{:.2} MB", metadata.len() as f64 / (1024.0 * 1024.0)),
        Err(_) => "missing".to_string(),
    }
}
