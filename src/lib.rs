//! Termnotes: short markdown notes in the terminal.
//!
//! The [`store::Store`] owns the notes and writes the whole collection to its
//! [`backend::Backend`] after every change. [`state::App`] turns key and mouse
//! events into edits of a draft and calls into the store on save or delete.

pub mod app;
pub mod backend;
pub mod crypto;
pub mod demo;
pub mod logging;
pub mod markdown;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
pub mod ui;

pub use backend::{Backend, BackendError, FileSystemBackend, MemoryBackend};
pub use models::{Note, NoteId};
pub use state::{Action, App, Draft, Field, Mode};
pub use store::{Store, StoreError, SyncPolicy};
