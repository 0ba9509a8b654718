// Source provider: where declaration and schema files come from

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;

/// Commit and branch the index was built from. Passed through, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub commit: Option<String>,
    pub branch: Option<String>,
}

pub trait SourceProvider {
    fn source_root(&self) -> &Path;
    fn schema_root(&self) -> &Path;
    fn provenance(&self) -> Provenance;

    fn has_sources(&self) -> bool {
        self.source_root().is_dir()
    }
}

/// A checkout on local disk
#[derive(Debug, Clone)]
pub struct LocalSource {
    source_root: PathBuf,
    schema_root: PathBuf,
    repo_root: PathBuf,
    configured: Provenance,
}

impl LocalSource {
    pub fn new(source_root: impl Into<PathBuf>, schema_root: impl Into<PathBuf>) -> Self {
        let source_root = source_root.into();
        Self {
            repo_root: source_root.clone(),
            source_root,
            schema_root: schema_root.into(),
            configured: Provenance::default(),
        }
    }

    pub fn from_config(config: &Config, project_dir: &Path) -> Self {
        Self {
            source_root: config.source_root(project_dir),
            schema_root: config.schema_root(project_dir),
            repo_root: project_dir.to_path_buf(),
            configured: Provenance {
                commit: config.source.commit.clone(),
                branch: config.source.branch.clone(),
            },
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.configured = provenance;
        self
    }
}

impl SourceProvider for LocalSource {
    fn source_root(&self) -> &Path {
        &self.source_root
    }

    fn schema_root(&self) -> &Path {
        &self.schema_root
    }

    fn provenance(&self) -> Provenance {
        let git = read_git_head(&self.repo_root);
        Provenance {
            commit: self.configured.commit.clone().or(git.commit),
            branch: self.configured.branch.clone().or(git.branch),
        }
    }
}

/// Resolve `.git/HEAD` to a commit, following a symbolic ref to its loose ref
/// file or `packed-refs`
fn read_git_head(repo_root: &Path) -> Provenance {
    let git_dir = repo_root.join(".git");
    let head = match std::fs::read_to_string(git_dir.join("HEAD")) {
        Ok(head) => head,
        Err(_) => {
            debug!("No git HEAD under {}", repo_root.display());
            return Provenance::default();
        }
    };
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref:").map(str::trim) else {
        return Provenance {
            commit: Some(head.to_string()),
            branch: None,
        };
    };

    let branch = reference.strip_prefix("refs/heads/").map(str::to_string);
    let commit = std::fs::read_to_string(git_dir.join(reference))
        .ok()
        .map(|c| c.trim().to_string())
        .or_else(|| {
            let packed = std::fs::read_to_string(git_dir.join("packed-refs")).ok()?;
            packed.lines().find_map(|line| {
                let (hash, name) = line.split_once(' ')?;
                (name.trim() == reference).then(|| hash.to_string())
            })
        });

    Provenance { commit, branch }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_provenance_from_symbolic_ref() {
        let dir = tempdir().unwrap();
        let git = dir.path().join(".git");
        std::fs::create_dir_all(git.join("refs/heads")).unwrap();
        std::fs::write(git.join("HEAD"), "ref: refs/heads/5.2-dev\n").unwrap();
        std::fs::write(git.join("refs/heads/5.2-dev"), "a1b2c3\n").unwrap();

        let source = LocalSource::new(dir.path(), dir.path().join("sql"));
        let provenance = source.provenance();
        assert_eq!(provenance.commit.as_deref(), Some("a1b2c3"));
        assert_eq!(provenance.branch.as_deref(), Some("5.2-dev"));
    }

    #[test]
    fn test_provenance_from_packed_refs() {
        let dir = tempdir().unwrap();
        let git = dir.path().join(".git");
        std::fs::create_dir_all(&git).unwrap();
        std::fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(
            git.join("packed-refs"),
            "# pack-refs with: peeled fully-peeled sorted\nffee00 refs/heads/main\n",
        )
        .unwrap();

        let provenance = LocalSource::new(dir.path(), dir.path()).provenance();
        assert_eq!(provenance.commit.as_deref(), Some("ffee00"));
    }

    #[test]
    fn test_configured_provenance_wins() {
        let dir = tempdir().unwrap();
        let git = dir.path().join(".git");
        std::fs::create_dir_all(&git).unwrap();
        std::fs::write(git.join("HEAD"), "0123abcd\n").unwrap();

        let source = LocalSource::new(dir.path(), dir.path()).with_provenance(Provenance {
            commit: Some("pinned".to_string()),
            branch: None,
        });
        let provenance = source.provenance();
        assert_eq!(provenance.commit.as_deref(), Some("pinned"));
        assert_eq!(provenance.branch, None);
    }

    #[test]
    fn test_no_checkout() {
        let dir = tempdir().unwrap();
        let source = LocalSource::new(dir.path().join("missing"), dir.path());
        assert_eq!(source.provenance(), Provenance::default());
        assert!(!source.has_sources());
    }
}
