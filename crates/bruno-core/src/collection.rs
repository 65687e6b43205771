//! Collection inspection
//!
//! A Bruno collection is a directory holding a `bruno.json` descriptor; its
//! requests are the `.bru` files below it. The inspector only reads what the
//! Bruno tooling lays out on disk, except for [`CollectionInspector::create_collection`]
//! which writes a fresh descriptor.

use serde_json::json;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;

pub const COLLECTION_DESCRIPTOR: &str = "bruno.json";
pub const REQUEST_EXTENSION: &str = "bru";

/// `.bru` files that describe a collection or folder rather than a request
const NON_REQUEST_FILES: &[&str] = &["collection.bru", "folder.bru"];

/// Collection inspection errors
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("not found: {0:?}")]
    NotFound(PathBuf),

    #[error("not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("not a Bruno collection (missing bruno.json): {0:?}")]
    NotACollection(PathBuf),

    #[error("invalid collection path: {0}")]
    InvalidCollectionPath(String),

    #[error("invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("collection already exists: {0:?}")]
    AlreadyExists(PathBuf),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk collection: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to encode collection descriptor: {0}")]
    Encode(#[from] serde_json::Error),
}

impl InspectError {
    /// Whether the error stems from caller input rather than the environment
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::NotADirectory(_)
                | Self::NotACollection(_)
                | Self::InvalidCollectionPath(_)
                | Self::InvalidCollectionName(_)
                | Self::AlreadyExists(_)
        )
    }
}

/// Options for [`CollectionInspector::create_collection`]
#[derive(Debug, Clone, Default)]
pub struct CreateCollectionOptions {
    /// Reuse an existing directory, replacing any descriptor in it
    pub overwrite: bool,
    /// `ignore` entries for the descriptor; empty means the inspector's defaults
    pub ignore: Vec<String>,
}

/// Lists and creates collections inside a workspace directory
pub trait CollectionInspector: Send + Sync {
    /// Collection names found in `workspace_dir`, sorted
    fn list_collections(&self, workspace_dir: &Path) -> Result<Vec<String>, InspectError>;

    /// Request files of `collection`, as `/`-separated paths relative to the
    /// collection root, sorted
    fn list_requests(
        &self,
        workspace_dir: &Path,
        collection: &str,
    ) -> Result<Vec<String>, InspectError>;

    /// Create `name` as a new collection and return its directory
    fn create_collection(
        &self,
        workspace_dir: &Path,
        name: &str,
        options: &CreateCollectionOptions,
    ) -> Result<PathBuf, InspectError>;
}

/// Filesystem-backed inspector
#[derive(Debug, Clone)]
pub struct FsInspector {
    ignore: Vec<String>,
    request_skip_dirs: Vec<String>,
}

impl Default for FsInspector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FsInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            ignore: config.collection_ignore.clone(),
            request_skip_dirs: config.request_skip_dirs.clone(),
        }
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|i| i == name)
    }

    fn is_skipped_for_requests(&self, name: &str) -> bool {
        self.is_ignored(name) || self.request_skip_dirs.iter().any(|s| s == name)
    }

    /// The workspace itself when it is a collection named `collection`,
    /// otherwise `collection` safely joined below it
    fn collection_root(&self, workspace_dir: &Path, collection: &str) -> Result<PathBuf, InspectError> {
        if is_collection(workspace_dir) && base_name(workspace_dir).as_deref() == Some(collection) {
            return Ok(workspace_dir.to_path_buf());
        }
        safe_join(workspace_dir, collection)
    }
}

impl CollectionInspector for FsInspector {
    fn list_collections(&self, workspace_dir: &Path) -> Result<Vec<String>, InspectError> {
        let workspace_dir = crate::workspace::clean_path(workspace_dir);
        require_dir(&workspace_dir)?;

        let mut collections = Vec::new();

        if is_collection(&workspace_dir) {
            if let Some(name) = base_name(&workspace_dir) {
                collections.push(name);
            }
        }

        let entries = fs::read_dir(&workspace_dir).map_err(|source| InspectError::Io {
            path: workspace_dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| InspectError::Io {
                path: workspace_dir.clone(),
                source,
            })?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if self.is_ignored(&name) {
                continue;
            }
            if is_collection(&entry.path()) {
                collections.push(name);
            }
        }

        collections.sort();
        debug!(dir = %workspace_dir.display(), count = collections.len(), "Listed collections");
        Ok(collections)
    }

    fn list_requests(
        &self,
        workspace_dir: &Path,
        collection: &str,
    ) -> Result<Vec<String>, InspectError> {
        let workspace_dir = crate::workspace::clean_path(workspace_dir);
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(InspectError::InvalidCollectionPath(
                "collection is required".to_string(),
            ));
        }

        let root = self.collection_root(&workspace_dir, collection)?;
        require_dir(&root)?;
        if !is_collection(&root) {
            return Err(InspectError::NotACollection(root));
        }

        let mut requests = Vec::new();
        let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
            // never prune the root itself
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !self.is_skipped_for_requests(&entry.file_name().to_string_lossy())
        });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(REQUEST_EXTENSION) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if NON_REQUEST_FILES.contains(&file_name.as_ref()) {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(&root) {
                requests.push(to_slash(rel));
            }
        }

        requests.sort();
        debug!(collection = %root.display(), count = requests.len(), "Listed requests");
        Ok(requests)
    }

    fn create_collection(
        &self,
        workspace_dir: &Path,
        name: &str,
        options: &CreateCollectionOptions,
    ) -> Result<PathBuf, InspectError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InspectError::InvalidCollectionName("empty".to_string()));
        }
        if name.contains("..") || name.contains(['/', '\\']) {
            return Err(InspectError::InvalidCollectionName(format!("{:?}", name)));
        }

        let workspace_dir = crate::workspace::clean_path(workspace_dir);
        require_dir(&workspace_dir)?;
        let collection_dir = safe_join(&workspace_dir, name)?;

        match fs::metadata(&collection_dir) {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(InspectError::AlreadyExists(collection_dir));
            }
            Ok(_) if !options.overwrite => {
                return Err(InspectError::AlreadyExists(collection_dir));
            }
            Ok(_) => {}
            Err(_) => {
                fs::create_dir_all(&collection_dir).map_err(|source| InspectError::Io {
                    path: collection_dir.clone(),
                    source,
                })?;
            }
        }

        let ignore = if options.ignore.is_empty() {
            self.ignore.clone()
        } else {
            options.ignore.clone()
        };
        let descriptor = json!({
            "version": "1",
            "name": name,
            "type": "collection",
            "ignore": ignore,
        });

        let descriptor_path = collection_dir.join(COLLECTION_DESCRIPTOR);
        fs::write(&descriptor_path, serde_json::to_string_pretty(&descriptor)?).map_err(
            |source| InspectError::Io {
                path: descriptor_path.clone(),
                source,
            },
        )?;

        let collection_bru = collection_dir.join("collection.bru");
        if !collection_bru.exists() {
            fs::write(&collection_bru, "").map_err(|source| InspectError::Io {
                path: collection_bru.clone(),
                source,
            })?;
        }

        debug!(collection = %collection_dir.display(), "Created collection");
        Ok(collection_dir)
    }
}

fn is_collection(dir: &Path) -> bool {
    dir.join(COLLECTION_DESCRIPTOR).is_file()
}

fn base_name(dir: &Path) -> Option<String> {
    dir.file_name().map(|n| n.to_string_lossy().to_string())
}

fn require_dir(dir: &Path) -> Result<(), InspectError> {
    let metadata = fs::metadata(dir).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => InspectError::NotFound(dir.to_path_buf()),
        _ => InspectError::Io {
            path: dir.to_path_buf(),
            source,
        },
    })?;
    if !metadata.is_dir() {
        return Err(InspectError::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

fn to_slash(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a relative path below `base`, refusing anything that would leave it
pub fn safe_join(base: &Path, rel: &str) -> Result<PathBuf, InspectError> {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() || rel_path.has_root() {
        return Err(InspectError::InvalidCollectionPath(format!(
            "absolute: {:?}",
            rel
        )));
    }

    let clean = crate::workspace::clean_path(rel_path);
    match clean.components().next() {
        None | Some(Component::CurDir) => {
            return Err(InspectError::InvalidCollectionPath(format!("{:?}", rel)));
        }
        Some(Component::ParentDir) => {
            return Err(InspectError::InvalidCollectionPath(format!(
                "traversal: {:?}",
                rel
            )));
        }
        _ => {}
    }

    Ok(base.join(clean))
}
