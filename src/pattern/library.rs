//! Pattern asset resolution
//!
//! The host supplies a [`PatternSource`] that opens named pattern documents;
//! [`PatternLibrary`] parses each one once and hands out shared handles.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Pattern;
use crate::error::{PatternError, Result};

/// Opens pattern documents by name
pub trait PatternSource {
    /// Open the named document for reading
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>>;

    /// Names of all documents this source can open
    fn list(&self) -> Result<Vec<String>>;
}

/// Pattern documents stored as `<name>.xml` files in one directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let file = if name.ends_with(".xml") {
            name.to_string()
        } else {
            format!("{}.xml", name)
        };
        self.root.join(file)
    }
}

impl PatternSource for DirectorySource {
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(PatternError::PatternNotFound(name.to_string()));
        }
        let file = File::open(&path).map_err(|e| PatternError::io(path.display().to_string(), e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| PatternError::io(self.root.display().to_string(), e))?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Parsed patterns, loaded lazily from a source and cached by name
#[derive(Debug)]
pub struct PatternLibrary<S> {
    source: S,
    cache: HashMap<String, Arc<Pattern>>,
}

impl<S: PatternSource> PatternLibrary<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load (or fetch from cache) the named pattern
    pub fn load(&mut self, name: &str) -> Result<Arc<Pattern>> {
        if let Some(pattern) = self.cache.get(name) {
            return Ok(Arc::clone(pattern));
        }
        let reader = self.source.open(name)?;
        let pattern = Arc::new(Pattern::from_reader(name, reader)?);
        self.cache.insert(name.to_string(), Arc::clone(&pattern));
        Ok(pattern)
    }

    /// Names available from the underlying source
    pub fn available(&self) -> Result<Vec<String>> {
        self.source.list()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Drop all cached patterns (bullets keep their own handles)
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
