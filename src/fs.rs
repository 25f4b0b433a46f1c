//! Narrow abstraction over the pieces of filesystem access the agent needs,
//! so tests can inject a fake directory tree instead of touching `/etc`.
//!
//! Mirrors the read-modify-write shape used directly against `std::fs` in
//! the old config-file writers, generalized into a trait seam.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes `contents` to `path` atomically (write to a sibling temp file,
    /// then rename) with the given Unix mode, creating parent directories as
    /// needed.
    async fn write_atomic(&self, path: &Path, contents: &str, mode: u32) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    async fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    /// Lists entries directly under `dir` whose file name matches `predicate`.
    async fn list_files(
        &self,
        dir: &Path,
        predicate: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

#[async_trait]
impl FileSystem for RealFileSystem {
    async fn read_to_string(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AgentError::system(format!("reading {}", path.display()), e))
    }

    async fn write_atomic(&self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::system(format!("creating {}", parent.display()), e))?;
        }

        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(|e| AgentError::system(format!("writing {}", tmp_path.display()), e))?;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| AgentError::system(format!("chmod {}", tmp_path.display()), e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| AgentError::system(format!("renaming into {}", path.display()), e))?;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AgentError::system(format!("removing {}", path.display()), e)),
        }
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::system(format!("creating {}", parent.display()), e))?;
        }
        tokio::fs::copy(from, to)
            .await
            .map(|_| ())
            .map_err(|e| {
                AgentError::system(
                    format!("copying {} to {}", from.display(), to.display()),
                    e,
                )
            })
    }

    async fn list_files(
        &self,
        dir: &Path,
        predicate: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AgentError::system(format!("reading {}", dir.display()), e)),
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::system(format!("reading {}", dir.display()), e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if predicate(&name) {
                matches.push(entry.path());
            }
        }
        matches.sort();
        Ok(matches)
    }
}

#[cfg(test)]
pub mod fake {
    use super::{AgentError, FileSystem, Path, PathBuf, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// An in-memory filesystem keyed by path, good enough to exercise the
    /// drift detector and configurers without touching `/etc`.
    #[derive(Default)]
    pub struct FakeFileSystem {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl FakeFileSystem {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
            self.files
                .lock()
                .expect("fake fs lock poisoned")
                .insert(path.into(), contents.into());
        }
    }

    #[async_trait]
    impl FileSystem for FakeFileSystem {
        async fn read_to_string(&self, path: &Path) -> Result<String> {
            self.files
                .lock()
                .expect("fake fs lock poisoned")
                .get(path)
                .cloned()
                .ok_or_else(|| AgentError::not_found(path.display()))
        }

        async fn write_atomic(&self, path: &Path, contents: &str, _mode: u32) -> Result<()> {
            self.files
                .lock()
                .expect("fake fs lock poisoned")
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        async fn exists(&self, path: &Path) -> bool {
            self.files
                .lock()
                .expect("fake fs lock poisoned")
                .contains_key(path)
        }

        async fn remove_file(&self, path: &Path) -> Result<()> {
            self.files
                .lock()
                .expect("fake fs lock poisoned")
                .remove(path);
            Ok(())
        }

        async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
            let contents = self.read_to_string(from).await?;
            self.write_atomic(to, &contents, 0o644).await
        }

        async fn list_files(
            &self,
            dir: &Path,
            predicate: &(dyn Fn(&str) -> bool + Sync),
        ) -> Result<Vec<PathBuf>> {
            let mut out: Vec<PathBuf> = self
                .files
                .lock()
                .expect("fake fs lock poisoned")
                .keys()
                .filter(|p| {
                    p.parent() == Some(dir)
                        && p.file_name()
                            .map(|n| predicate(&n.to_string_lossy()))
                            .unwrap_or(false)
                })
                .cloned()
                .collect();
            out.sort();
            Ok(out)
        }
    }
}
