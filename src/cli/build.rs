use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::Config;
use crate::frontend::text;
use crate::indexer::{self, SnapshotOrigin};

pub async fn build_project(project: &str, mut config: Config, rebuild: bool, concurrent: bool) -> Result<()> {
    let project_dir = PathBuf::from(project);
    config.indexing.concurrent |= concurrent;
    config.validate()?;

    println!("phpindex v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", config.project.name);
    println!("Source root: {}", config.source_root(&project_dir).display());
    println!("Schema root: {}", config.schema_root(&project_dir).display());
    println!("Concurrent: {}", config.indexing.concurrent);

    let start = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(if rebuild { "Indexing..." } else { "Loading index..." });
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = indexer::load_or_build(&config, &project_dir, rebuild).await;
    spinner.finish_and_clear();

    let Some((snapshot, origin)) = result? else {
        super::print_missing_source(&config, &project_dir);
        return Ok(());
    };

    if origin == SnapshotOrigin::Cache {
        println!(
            "\nUsing cached index at {} (pass --rebuild to re-parse)",
            config.index_path(&project_dir).display()
        );
    } else {
        info!("Build finished in {:.2?}", start.elapsed());
        println!("\nIndexed in {:.2?}", start.elapsed());
        println!("Index: {}", config.index_path(&project_dir).display());
        println!("Schema: {}", config.schema_path(&project_dir).display());
    }

    println!("\n{}", text::render_stats(&snapshot.stats(), &snapshot.index));
    Ok(())
}
