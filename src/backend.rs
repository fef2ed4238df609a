//! Durable persistence of the whole note collection.
//!
//! A backend knows two things: how to replace everything it holds with a new
//! collection, and how to hand the whole collection back. There are no
//! partial writes.

use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::models::Note;
use crate::storage::{atomic_write, ensure_parent_dir};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed notes data: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("could not encode notes: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0}")]
    Crypto(String),
}

pub trait Backend {
    /// Replaces the persisted collection with `notes`.
    fn save_all(&mut self, notes: &[Note]) -> Result<(), BackendError>;

    /// Returns the persisted collection, empty if nothing was saved yet.
    fn load_all(&mut self) -> Result<Vec<Note>, BackendError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn save_all(&mut self, notes: &[Note]) -> Result<(), BackendError> {
        (**self).save_all(notes)
    }

    fn load_all(&mut self) -> Result<Vec<Note>, BackendError> {
        (**self).load_all()
    }
}

/// Keeps the collection as a pretty-printed JSON array in one file.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    path: PathBuf,
}

impl FileSystemBackend {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        ensure_parent_dir(&path).map_err(|source| BackendError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for FileSystemBackend {
    fn save_all(&mut self, notes: &[Note]) -> Result<(), BackendError> {
        let data = serde_json::to_string_pretty(notes).map_err(BackendError::Encode)?;
        atomic_write(&self.path, data.as_bytes()).map_err(|source| BackendError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), count = notes.len(), "notes written");
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<Note>, BackendError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no notes file yet");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(BackendError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(BackendError::Decode)
    }
}

/// In-process backend. Clones share the same collection, so a test can keep a
/// handle and look at what the store synchronized.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    notes: Rc<RefCell<Vec<Note>>>,
    saves: Rc<RefCell<usize>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: Rc::new(RefCell::new(notes)),
            saves: Rc::default(),
        }
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.borrow().clone()
    }

    /// Number of `save_all` calls seen so far.
    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl Backend for MemoryBackend {
    fn save_all(&mut self, notes: &[Note]) -> Result<(), BackendError> {
        *self.notes.borrow_mut() = notes.to_vec();
        *self.saves.borrow_mut() += 1;
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<Note>, BackendError> {
        Ok(self.notes.borrow().clone())
    }
}
