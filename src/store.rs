//! The canonical in-memory note collection.
//!
//! Every mutation is followed by a full-collection write to the configured
//! backend before the call returns. Rewriting everything on every change is
//! fine for a personal notebook and a scaling limit for anything larger.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError};
use crate::models::{Note, NoteId};

/// What a failed backend write does to the mutating call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// Log the failure, keep the change in memory, report it through
    /// [`Store::take_sync_warning`].
    #[default]
    Soft,
    /// Undo the in-memory change and return [`StoreError::Sync`].
    Hard,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to load notes: {0}")]
    Load(#[source] BackendError),
    #[error("failed to save notes: {0}")]
    Sync(#[source] BackendError),
    #[error("note {0} not found")]
    NotFound(NoteId),
    #[error("no note ids left to assign")]
    IdsExhausted,
}

pub struct Store {
    notes: BTreeMap<NoteId, Note>,
    backend: Option<Box<dyn Backend>>,
    policy: SyncPolicy,
    /// `None` once the id after the largest one in use would overflow.
    next_id: Option<NoteId>,
    last_stamp: Option<DateTime<Utc>>,
    sync_warning: Option<String>,
}

impl Store {
    /// A store without persistence. Nothing outlives the process.
    pub fn in_memory() -> Self {
        Self {
            notes: BTreeMap::new(),
            backend: None,
            policy: SyncPolicy::Soft,
            next_id: Some(1),
            last_stamp: None,
            sync_warning: None,
        }
    }

    /// Loads everything `backend` holds, keeping ids and timestamps.
    pub fn open(backend: impl Backend + 'static, policy: SyncPolicy) -> Result<Self, StoreError> {
        let mut backend: Box<dyn Backend> = Box::new(backend);
        let loaded = backend.load_all().map_err(StoreError::Load)?;

        let mut store = Self::in_memory();
        store.policy = policy;
        for note in loaded {
            store.next_id = match (store.next_id, note.id.checked_add(1)) {
                (Some(next), Some(after)) => Some(next.max(after)),
                _ => None,
            };
            store.last_stamp = store.last_stamp.max(Some(note.updated_at));
            if let Some(dup) = store.notes.insert(note.id, note) {
                warn!(id = dup.id, "duplicate note id in persisted data, keeping the later one");
            }
        }
        store.backend = Some(backend);
        info!(count = store.notes.len(), ?policy, "notes loaded");
        Ok(store)
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn create(&mut self, title: &str, content: &str) -> Result<Note, StoreError> {
        let id = self.next_id.ok_or(StoreError::IdsExhausted)?;
        // ids are never handed out twice, even if this create is rolled back
        self.next_id = id.checked_add(1);
        let now = self.stamp();
        let note = Note {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        let created = note.clone();
        self.mutate(move |notes| {
            notes.insert(id, note);
        })?;
        info!(id, "note created");
        Ok(created)
    }

    pub fn update(&mut self, id: NoteId, title: &str, content: &str) -> Result<Note, StoreError> {
        if !self.notes.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let now = self.stamp();
        let updated = self.mutate(|notes| {
            notes.get_mut(&id).map(|note| {
                note.title = title.to_string();
                note.content = content.to_string();
                note.updated_at = now;
                note.clone()
            })
        })?;
        info!(id, "note updated");
        updated.ok_or(StoreError::NotFound(id))
    }

    /// Removes the note if present. Returns whether anything was removed.
    pub fn delete(&mut self, id: NoteId) -> Result<bool, StoreError> {
        if !self.notes.contains_key(&id) {
            debug!(id, "delete of absent note ignored");
            return Ok(false);
        }
        self.mutate(|notes| {
            notes.remove(&id);
        })?;
        info!(id, "note deleted");
        Ok(true)
    }

    pub fn get(&self, id: NoteId) -> Result<&Note, StoreError> {
        self.notes.get(&id).ok_or(StoreError::NotFound(id))
    }

    /// All notes, most recently updated first. Ties keep id order.
    pub fn list(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.notes.values().cloned().collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    /// The last soft sync failure, if it has not been collected yet.
    pub fn take_sync_warning(&mut self) -> Option<String> {
        self.sync_warning.take()
    }

    fn mutate<T>(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<NoteId, Note>) -> T,
    ) -> Result<T, StoreError> {
        let before = (self.policy == SyncPolicy::Hard).then(|| self.notes.clone());
        let out = change(&mut self.notes);
        if let Err(err) = self.sync() {
            match before {
                Some(previous) => {
                    self.notes = previous;
                    warn!(error = %err, "sync failed, change rolled back");
                    return Err(StoreError::Sync(err));
                }
                None => {
                    warn!(error = %err, "sync failed, change kept in memory only");
                    self.sync_warning = Some(err.to_string());
                }
            }
        }
        Ok(out)
    }

    fn sync(&mut self) -> Result<(), BackendError> {
        if self.backend.is_none() {
            return Ok(());
        }
        let snapshot = self.list();
        match self.backend.as_mut() {
            Some(backend) => backend.save_all(&snapshot),
            None => Ok(()),
        }
    }

    /// Current time, nudged forward so stamps strictly increase.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::MemoryBackend;

    /// Delegates to a memory backend until told to fail.
    #[derive(Clone, Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        failing: Rc<Cell<bool>>,
    }

    impl Backend for FlakyBackend {
        fn save_all(&mut self, notes: &[Note]) -> Result<(), BackendError> {
            if self.failing.get() {
                return Err(BackendError::Io {
                    path: "flaky".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.save_all(notes)
        }

        fn load_all(&mut self) -> Result<Vec<Note>, BackendError> {
            self.inner.load_all()
        }
    }

    struct BrokenLoad;

    impl Backend for BrokenLoad {
        fn save_all(&mut self, _notes: &[Note]) -> Result<(), BackendError> {
            Ok(())
        }

        fn load_all(&mut self) -> Result<Vec<Note>, BackendError> {
            Err(BackendError::Crypto("bad data".into()))
        }
    }

    #[test]
    fn create_assigns_id_and_equal_timestamps() {
        let mut store = Store::in_memory();
        let note = store.create("Shopping List", "- milk").unwrap();
        let listed = store.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Shopping List");
        assert_eq!(listed[0].created_at, listed[0].updated_at);
        assert_eq!(listed[0].id, note.id);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut store = Store::in_memory();
        let ids: Vec<NoteId> = (0..20)
            .map(|i| store.create(&format!("n{i}"), "").unwrap().id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut store = Store::in_memory();
        let a = store.create("a", "").unwrap();
        store.delete(a.id).unwrap();
        let b = store.create("b", "").unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn update_refreshes_updated_at_only() {
        let mut store = Store::in_memory();
        let note = store.create("A", "x").unwrap();
        store.update(note.id, "B", "y").unwrap();
        let got = store.get(note.id).unwrap();
        assert_eq!(got.title, "B");
        assert_eq!(got.content, "y");
        assert_eq!(got.created_at, note.created_at);
        assert!(got.updated_at > got.created_at);
    }

    #[test]
    fn updated_note_moves_to_front() {
        let mut store = Store::in_memory();
        let first = store.create("first", "").unwrap();
        store.create("second", "").unwrap();
        store.create("third", "").unwrap();
        assert_eq!(store.list()[0].title, "third");

        store.update(first.id, "first, edited", "").unwrap();
        assert_eq!(store.list()[0].title, "first, edited");
    }

    #[test]
    fn list_is_sorted_by_updated_at_descending() {
        let mut store = Store::in_memory();
        for i in 0..5 {
            store.create(&i.to_string(), "").unwrap();
        }
        let ids: Vec<NoteId> = store.list().iter().map(|n| n.id).collect();
        store.update(ids[3], "bumped", "").unwrap();
        let listed = store.list();
        assert!(listed.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
    }

    #[test]
    fn delete_of_absent_id_is_a_noop() {
        let backend = MemoryBackend::new();
        let mut store = Store::open(backend.clone(), SyncPolicy::Soft).unwrap();
        store.create("keep", "").unwrap();
        let saves = backend.save_count();

        assert!(!store.delete(999).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(backend.save_count(), saves);
    }

    #[test]
    fn update_of_absent_id_is_not_found() {
        let mut store = Store::in_memory();
        let err = store.update(42, "t", "c").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
        assert!(store.is_empty());
    }

    #[test]
    fn get_of_absent_id_is_not_found() {
        let store = Store::in_memory();
        assert!(matches!(store.get(1), Err(StoreError::NotFound(1))));
    }

    #[test]
    fn every_mutation_is_synchronized() {
        let backend = MemoryBackend::new();
        let mut store = Store::open(backend.clone(), SyncPolicy::Soft).unwrap();

        let a = store.create("a", "1").unwrap();
        assert_eq!(backend.snapshot(), store.list());
        store.create("b", "2").unwrap();
        assert_eq!(backend.snapshot(), store.list());
        store.update(a.id, "a2", "1").unwrap();
        assert_eq!(backend.snapshot(), store.list());
        store.delete(a.id).unwrap();
        assert_eq!(backend.snapshot(), store.list());
        assert_eq!(backend.save_count(), 4);
    }

    #[test]
    fn open_preserves_ids_and_timestamps() {
        let backend = MemoryBackend::new();
        let mut first = Store::open(backend.clone(), SyncPolicy::Soft).unwrap();
        let a = first.create("a", "").unwrap();
        let b = first.create("b", "").unwrap();

        let mut second = Store::open(backend.clone(), SyncPolicy::Soft).unwrap();
        assert_eq!(second.get(a.id).unwrap(), &a);
        assert_eq!(second.get(b.id).unwrap(), &b);
        let c = second.create("c", "").unwrap();
        assert!(c.id > b.id);
        assert!(c.updated_at > b.updated_at);
    }

    #[test]
    fn largest_possible_id_loads_but_blocks_create() {
        let stamp = Utc::now();
        let backend = MemoryBackend::with_notes(vec![Note {
            id: NoteId::MAX,
            title: "last".into(),
            content: String::new(),
            created_at: stamp,
            updated_at: stamp,
        }]);
        let mut store = Store::open(backend.clone(), SyncPolicy::Soft).unwrap();
        assert_eq!(store.get(NoteId::MAX).unwrap().title, "last");

        assert!(matches!(store.create("one more", ""), Err(StoreError::IdsExhausted)));
        assert_eq!(store.len(), 1);
        assert_eq!(backend.save_count(), 0);

        store.update(NoteId::MAX, "still editable", "").unwrap();
        assert!(store.delete(NoteId::MAX).unwrap());
    }

    #[test]
    fn create_hands_out_the_largest_id_once() {
        let stamp = Utc::now();
        let backend = MemoryBackend::with_notes(vec![Note {
            id: NoteId::MAX - 1,
            title: "almost".into(),
            content: String::new(),
            created_at: stamp,
            updated_at: stamp,
        }]);
        let mut store = Store::open(backend, SyncPolicy::Soft).unwrap();
        assert_eq!(store.create("last", "").unwrap().id, NoteId::MAX);
        assert!(matches!(store.create("overflow", ""), Err(StoreError::IdsExhausted)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_failure_is_fatal() {
        assert!(matches!(
            Store::open(BrokenLoad, SyncPolicy::Soft),
            Err(StoreError::Load(_))
        ));
    }

    #[test]
    fn soft_policy_keeps_change_and_reports_warning() {
        let backend = FlakyBackend::default();
        let mut store = Store::open(backend.clone(), SyncPolicy::Soft).unwrap();
        backend.failing.set(true);

        let note = store.create("unsaved", "").unwrap();
        assert_eq!(store.get(note.id).unwrap().title, "unsaved");
        assert!(backend.inner.snapshot().is_empty());
        let warning = store.take_sync_warning().unwrap();
        assert!(warning.contains("disk full"));
        assert!(store.take_sync_warning().is_none());
    }

    #[test]
    fn hard_policy_rolls_back_and_errors() {
        let backend = FlakyBackend::default();
        let mut store = Store::open(backend.clone(), SyncPolicy::Hard).unwrap();
        let kept = store.create("kept", "v1").unwrap();
        backend.failing.set(true);

        assert!(matches!(store.create("lost", ""), Err(StoreError::Sync(_))));
        assert!(matches!(store.update(kept.id, "changed", "v2"), Err(StoreError::Sync(_))));
        assert!(matches!(store.delete(kept.id), Err(StoreError::Sync(_))));

        assert_eq!(store.list(), vec![kept.clone()]);
        assert_eq!(backend.inner.snapshot(), store.list());

        backend.failing.set(false);
        let next = store.create("after", "").unwrap();
        assert!(next.id > kept.id + 1);
    }

    #[test]
    fn in_memory_store_never_warns() {
        let mut store = Store::in_memory();
        store.create("x", "").unwrap();
        assert!(!store.is_persistent());
        assert!(store.take_sync_warning().is_none());
    }
}
