use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::io::config_io;
use crate::model::{List, StoreConfig};
use crate::parse::{ParsedList, parse_list, serialize_list};

/// Name of the store directory, relative to the store root
pub const STORE_DIR: &str = "lists";

/// Name of the config file inside the store directory
pub const CONFIG_FILE: &str = "lists.toml";

/// Error type for store I/O operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not a list store: no lists/lists.toml found")]
    NotAStore,
    #[error("a list store already exists at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("a list named {0:?} already exists")]
    AlreadyExists(String),
    #[error("no list named {0:?}")]
    NoSuchList(String),
    #[error("invalid list name {0:?}: {1}")]
    InvalidName(String, &'static str),
    #[error("could not parse lists.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit lists.toml: {0}")]
    ConfigEditError(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An opened list store: the directory holding the list documents and its
/// configuration.
#[derive(Debug, Clone)]
pub struct Store {
    /// Directory containing `lists/`
    pub root: PathBuf,
    /// The `lists/` directory itself
    pub dir: PathBuf,
    pub config: StoreConfig,
}

impl Store {
    pub fn extension(&self) -> &str {
        &self.config.store.extension
    }

    /// Location of the document for list `name`
    pub fn list_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        list_path(&self.dir, name, self.extension())
    }

    /// Every list document in the store, sorted by path
    pub fn locations(&self) -> Result<Vec<PathBuf>, StoreError> {
        list_locations(&self.dir, self.extension())
    }
}

/// Discover the store by walking up from the given directory, looking for
/// a `lists/` subdirectory with a `lists.toml` in it.
pub fn discover_store(start: &Path) -> Result<PathBuf, StoreError> {
    let mut current = start.to_path_buf();
    loop {
        let dir = current.join(STORE_DIR);
        if dir.is_dir() && dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(StoreError::NotAStore);
        }
    }
}

/// Open the store rooted at `root`
pub fn open_store(root: &Path) -> Result<Store, StoreError> {
    let dir = root.join(STORE_DIR);
    if !dir.is_dir() {
        return Err(StoreError::NotAStore);
    }
    let (config, _doc) = config_io::read_config(&dir)?;
    Ok(Store {
        root: root.to_path_buf(),
        dir,
        config,
    })
}

/// Create `lists/` and a default `lists.toml` under `root`
pub fn init_store(root: &Path, force: bool) -> Result<Store, StoreError> {
    let dir = root.join(STORE_DIR);
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        return Err(StoreError::AlreadyInitialized(dir));
    }
    fs::create_dir_all(&dir).map_err(|e| StoreError::WriteError {
        path: dir.clone(),
        source: e,
    })?;
    atomic_write(&config_path, config_io::CONFIG_TEMPLATE.as_bytes()).map_err(|e| {
        StoreError::WriteError {
            path: config_path.clone(),
            source: e,
        }
    })?;
    open_store(root)
}

/// Check that `name` can be used as a file stem
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = |why| Err(StoreError::InvalidName(name.to_string(), why));
    if name.trim().is_empty() {
        return invalid("name cannot be empty");
    }
    if name.starts_with('.') {
        return invalid("name cannot start with '.'");
    }
    if name.contains(['/', '\\', '\0']) {
        return invalid("name cannot contain path separators");
    }
    if name != name.trim() {
        return invalid("name cannot start or end with whitespace");
    }
    Ok(())
}

/// Location of the document for list `name` inside `dir`
pub fn list_path(dir: &Path, name: &str, extension: &str) -> Result<PathBuf, StoreError> {
    validate_name(name)?;
    Ok(dir.join(format!("{}.{}", name, extension)))
}

/// Every regular file in `dir` with the given extension, sorted by path.
/// Hidden files (including in-flight temp files) are skipped.
pub fn list_locations(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::ReadError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut locations: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_list_document(path, extension))
        .collect();
    locations.sort();
    Ok(locations)
}

/// Whether `path` names a list document with the given extension
pub fn is_list_document(path: &Path, extension: &str) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(extension) && path.is_file()
}

/// Read and parse a list document. Dropped lines are logged, not fatal.
pub fn read_list(path: &Path) -> Result<ParsedList, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parsed = parse_list(&text);
    for dropped in &parsed.dropped {
        warn!(
            path = %path.display(),
            line = dropped.line,
            text = %dropped.text,
            "ignoring unrecognized line"
        );
    }
    Ok(parsed)
}

/// Replace the document at `path` with `list`
pub fn write_list(path: &Path, list: &List) -> Result<(), StoreError> {
    debug!(path = %path.display(), items = list.len(), "writing list");
    atomic_write(path, serialize_list(list).as_bytes()).map_err(|e| StoreError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a new document at `path`, failing if one already exists there.
pub fn create_list(path: &Path, list: &List) -> Result<(), StoreError> {
    match atomic_create(path, serialize_list(list).as_bytes()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists(
            crate::model::name_from_location(path),
        )),
        Err(e) => Err(StoreError::WriteError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Delete the document at `path`
pub fn delete_list(path: &Path) -> Result<(), StoreError> {
    fs::remove_file(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::NoSuchList(crate::model::name_from_location(path))
        } else {
            StoreError::WriteError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Write `content` to `path` via a temp file in the same directory and a
/// rename, so readers never see a partial document.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp = write_temp_beside(path, content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Like [`atomic_write`], but fails with `AlreadyExists` instead of
/// replacing an existing file.
pub fn atomic_create(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp = write_temp_beside(path, content)?;
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_temp_beside(path: &Path, content: &[u8]) -> io::Result<NamedTempFile> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new().prefix(".tmp").tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    Ok(tmp)
}
