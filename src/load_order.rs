//! The ordered list of plugin files making up one data set.
//!
//! Order matters: a later file overrides records of earlier files, and a file
//! may only depend on files before it. The load order is built once and never
//! changes; nothing here opens plugin files, that happens lazily in the pool.

use crate::error::{Result, StoreError};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Largest number of plugins a global identifier can address.
pub const MAX_PLUGINS: usize = 255;

/// One entry of the load order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFile {
    name: String,
    path: PathBuf,
}

impl PluginFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// File name as it appears in other files' master lists
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is a master (`.esm`) rather than a plugin (`.esp`)
    pub fn is_master(&self) -> bool {
        has_extension(&self.name, "esm")
    }
}

/// Immutable ordered sequence of plugin files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder {
    files: Vec<PluginFile>,
}

impl LoadOrder {
    /// Build from already-ordered entries
    pub fn new(files: Vec<PluginFile>) -> Result<Self> {
        if files.len() > MAX_PLUGINS {
            return Err(StoreError::TooManyPlugins { count: files.len() });
        }
        Ok(Self { files })
    }

    /// Build from file names that all live in `dir`, in the given order
    pub fn from_names<S: AsRef<str>>(
        dir: impl AsRef<Path>,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let files = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                PluginFile::new(name, dir.join(name))
            })
            .collect();
        Self::new(files)
    }

    /// Build from explicit paths, in the given order
    pub fn from_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    StoreError::config(format!("not a plugin file path: {}", path.display()))
                })?;
            files.push(PluginFile::new(name, path));
        }
        Self::new(files)
    }

    /// Scan a data directory for `.esm` and `.esp` files.
    ///
    /// # Ordering
    /// - Masters (`.esm`) before plugins (`.esp`)
    /// - Then by modification time, oldest first
    /// - Then by file name
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut found: Vec<(PluginFile, SystemTime)> = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(has_extension(&name, "esm") || has_extension(&name, "esp")) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((PluginFile::new(name, entry.path()), modified));
        }

        found.sort_by(|(a, a_time), (b, b_time)| {
            b.is_master()
                .cmp(&a.is_master())
                .then_with(|| a_time.cmp(b_time))
                .then_with(|| a.name.cmp(&b.name))
        });
        debug!("Found {} plugins in {}", found.len(), dir.display());

        Self::new(found.into_iter().map(|(file, _)| file).collect())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PluginFile> {
        self.files.get(index)
    }

    /// Global index of a file name, compared case-insensitively
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.files
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginFile> {
        self.files.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name()).collect()
    }
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Validate a path given on the command line before building a load order
///
/// # Validations Performed
/// - Path exists
/// - A directory is accepted as a data directory
/// - A file must be at least one record header long
///
/// Plugin files inside a scanned directory are not checked here; they are
/// opened lazily and fail at first access.
pub fn validate_data_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(StoreError::FileOpen {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "path does not exist"),
        });
    }

    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        return Ok(());
    }

    if metadata.len() < crate::format::RECORD_HEADER_SIZE {
        return Err(StoreError::FileOpen {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "file is too small to hold a plugin header",
            ),
        });
    }
    Ok(())
}
