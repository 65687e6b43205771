//! Workspace registry - named, absolute directories that tools refer to by name
//!
//! The registry is shared between tool handlers, so every access goes through
//! a readers-writer lock: lookups and listings take the read side, registration
//! takes the write side. Filesystem checks and directory creation happen before
//! the write lock is taken; `create_dir_all` tolerates a directory that a
//! concurrent registration already created, and the map insert re-checks for
//! a conflicting entry under the lock.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{LazyLock, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Names start alphanumeric, then up to 63 of `[A-Za-z0-9._-]`
pub const NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("workspace name pattern is valid"));

/// Workspace registry errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("invalid workspace name: {0}")]
    InvalidName(String),

    #[error("invalid workspace path: {0}")]
    InvalidPath(String),

    #[error("workspace not found: {0:?}")]
    NotFound(String),

    #[error("workspace {name:?} is already registered as {existing:?}")]
    AlreadyRegistered { name: String, existing: PathBuf },

    #[error("workspace I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A registered workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub path: PathBuf,
}

/// Concurrency-safe store of workspaces, keyed by name
#[derive(Debug, Default)]
pub struct WorkspaceRegistry {
    workspaces: RwLock<BTreeMap<String, Workspace>>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as the directory at `path`.
    ///
    /// Re-registering a name with the same normalized path returns the existing
    /// record. A different path is rejected with
    /// [`WorkspaceError::AlreadyRegistered`] and the original entry is kept.
    /// A missing directory is created (with parents) only when
    /// `create_if_missing` is set.
    pub fn register(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        create_if_missing: bool,
    ) -> Result<Workspace, WorkspaceError> {
        validate_name(name)?;
        let path = validate_abs_path(path.as_ref())?;

        // Fail fast before touching the filesystem
        if let Some(existing) = self.lookup(name) {
            return resolve_existing(existing, &path);
        }

        ensure_directory(&path, create_if_missing)?;

        let workspace = Workspace {
            name: name.to_string(),
            path,
        };

        let mut workspaces = self.workspaces.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = workspaces.get(name) {
            return resolve_existing(existing.clone(), &workspace.path);
        }
        workspaces.insert(workspace.name.clone(), workspace.clone());
        info!(name = %workspace.name, path = %workspace.path.display(), "Registered workspace");

        Ok(workspace)
    }

    /// Look up a workspace by name
    pub fn get(&self, name: &str) -> Result<Workspace, WorkspaceError> {
        validate_name(name)?;
        self.lookup(name)
            .ok_or_else(|| WorkspaceError::NotFound(name.to_string()))
    }

    /// Resolve a workspace name to its directory
    pub fn resolve(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        self.get(name).map(|workspace| workspace.path)
    }

    /// Snapshot of all workspaces, sorted by name
    pub fn list(&self) -> Vec<Workspace> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workspaces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, name: &str) -> Option<Workspace> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

fn resolve_existing(existing: Workspace, path: &Path) -> Result<Workspace, WorkspaceError> {
    if existing.path == path {
        debug!(name = %existing.name, "Workspace already registered with same path");
        Ok(existing)
    } else {
        Err(WorkspaceError::AlreadyRegistered {
            name: existing.name,
            existing: existing.path,
        })
    }
}

/// Check a workspace name is a safe identifier
pub fn validate_name(name: &str) -> Result<(), WorkspaceError> {
    if name.trim().is_empty() {
        return Err(WorkspaceError::InvalidName("empty".to_string()));
    }
    if name.contains("..") {
        return Err(WorkspaceError::InvalidName(format!(
            "contains \"..\": {:?}",
            name
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(WorkspaceError::InvalidName(format!(
            "contains path separator: {:?}",
            name
        )));
    }
    if !NAME_RE.is_match(name) {
        return Err(WorkspaceError::InvalidName(format!(
            "must match {}: {:?}",
            NAME_PATTERN, name
        )));
    }
    Ok(())
}

fn validate_abs_path(path: &Path) -> Result<PathBuf, WorkspaceError> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(WorkspaceError::InvalidPath("empty".to_string()));
    }
    let clean = clean_path(path);
    if !clean.is_absolute() {
        return Err(WorkspaceError::InvalidPath(format!(
            "must be absolute: {:?}",
            path
        )));
    }
    Ok(clean)
}

fn ensure_directory(path: &Path, create_if_missing: bool) -> Result<(), WorkspaceError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !create_if_missing {
                return Err(WorkspaceError::InvalidPath(format!(
                    "does not exist: {:?}",
                    path
                )));
            }
            fs::create_dir_all(path).map_err(|source| WorkspaceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "Created workspace directory");
            fs::metadata(path).map_err(|source| WorkspaceError::Io {
                path: path.to_path_buf(),
                source,
            })?
        }
        Err(source) => {
            return Err(WorkspaceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.is_dir() {
        return Err(WorkspaceError::InvalidPath(format!(
            "not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Lexically normalize a path: drop `.`, fold `..` into its parent, never
/// climbing above the root. Does not touch the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => clean.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = clean.parent().is_none() && clean.has_root();
                let ends_in_parent = matches!(clean.components().next_back(), Some(Component::ParentDir));
                if clean.as_os_str().is_empty() || ends_in_parent {
                    clean.push("..");
                } else if !at_root {
                    clean.pop();
                }
            }
            Component::Normal(part) => clean.push(part),
        }
    }
    if clean.as_os_str().is_empty() {
        clean.push(".");
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("demo").is_ok());
        assert!(validate_name("my-api_v1.2").is_ok());

        for bad in ["", "   ", "..", "a..b", "a/b", "a\\b", "-lead", ".hidden", "sp ace"] {
            assert!(
                matches!(validate_name(bad), Err(WorkspaceError::InvalidName(_))),
                "expected {:?} to be rejected",
                bad
            );
        }

        assert!(validate_name(&"a".repeat(64)).is_ok());
        assert!(validate_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(clean_path(Path::new("/a/b/")), PathBuf::from("/a/b"));
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(clean_path(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_register_existing_dir() {
        let dir = TempDir::new().unwrap();
        let registry = WorkspaceRegistry::new();

        let ws = registry.register("demo", dir.path(), false).unwrap();
        assert_eq!(ws.name, "demo");
        assert_eq!(ws.path, dir.path());
        assert_eq!(registry.get("demo").unwrap(), ws);
    }

    #[test]
    fn test_register_relative_path_rejected() {
        let registry = WorkspaceRegistry::new();
        let err = registry.register("demo", "relative/dir", true).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPath(_)));

        let err = registry.register("demo", "", true).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPath(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_missing_dir() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("ws");
        let registry = WorkspaceRegistry::new();

        let err = registry.register("demo", &target, false).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!target.exists());

        let ws = registry.register("demo", &target, true).unwrap();
        assert!(target.is_dir());
        assert_eq!(ws.path, target);
    }

    #[test]
    fn test_register_file_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let registry = WorkspaceRegistry::new();
        let err = registry.register("demo", &file, true).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_register_idempotent_and_conflict() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let registry = WorkspaceRegistry::new();

        let a = registry.register("demo", first.path(), false).unwrap();
        // Unnormalized spelling of the same directory
        let b = registry
            .register("demo", first.path().join(".").join("sub").join(".."), false)
            .unwrap();
        assert_eq!(a, b);

        let err = registry.register("demo", second.path(), false).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyRegistered { .. }));
        assert_eq!(registry.get("demo").unwrap().path, first.path());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_not_found_and_invalid() {
        let registry = WorkspaceRegistry::new();
        match registry.get("ghost") {
            Err(WorkspaceError::NotFound(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(matches!(
            registry.get("../etc"),
            Err(WorkspaceError::InvalidName(_))
        ));
    }

    #[test]
    fn test_list_sorted() {
        let dir = TempDir::new().unwrap();
        let registry = WorkspaceRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(name, dir.path().join(name), true)
                .unwrap();
        }

        let names: Vec<String> = registry.list().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_concurrent_register_same_name() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shared");
        let registry = Arc::new(WorkspaceRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let target = target.clone();
                thread::spawn(move || registry.register("shared", &target, true))
            })
            .collect();

        for handle in handles {
            let ws = handle.join().unwrap().unwrap();
            assert_eq!(ws.path, target);
        }
        assert_eq!(registry.list().len(), 1);
    }
}
