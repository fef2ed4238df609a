//! Interaction state: modes, the edit draft, and how input events move
//! between them.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use tracing::{debug, warn};

use crate::models::{Note, NoteId, UNTITLED};
use crate::store::Store;

/// Rows above the first sidebar entry (the block's top border).
pub const SIDEBAR_HEADER_ROWS: u16 = 1;
/// Each sidebar entry shows a title line and a preview line.
pub const NOTE_ROW_HEIGHT: u16 = 2;
/// Help line under the panes.
pub const FOOTER_ROWS: u16 = 1;

pub const NORMAL_HELP: &str = "↑/↓ move | n new | e edit | d delete | q quit";
pub const EDIT_HELP: &str = "Ctrl+S save | Esc cancel | Tab switch field";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Content,
}

/// Uncommitted title and content, plus the caret within the active field.
/// The caret counts characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub field: Field,
    pub caret: usize,
}

impl Draft {
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            field: Field::Title,
            caret: 0,
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            content: note.content.clone(),
            field: Field::Title,
            caret: note.title.chars().count(),
        }
    }

    pub fn active_text(&self) -> &str {
        match self.field {
            Field::Title => &self.title,
            Field::Content => &self.content,
        }
    }

    fn active_text_mut(&mut self) -> &mut String {
        match self.field {
            Field::Title => &mut self.title,
            Field::Content => &mut self.content,
        }
    }

    fn active_len(&self) -> usize {
        self.active_text().chars().count()
    }

    pub fn switch_field(&mut self) {
        self.field = match self.field {
            Field::Title => Field::Content,
            Field::Content => Field::Title,
        };
        self.caret = self.active_len();
    }

    pub fn insert_char(&mut self, c: char) {
        let caret = self.caret.min(self.active_len());
        let text = self.active_text_mut();
        let at = byte_index(text, caret);
        text.insert(at, c);
        self.caret = caret + 1;
    }

    /// Enter: titles are single-line, so on the title it moves to the content.
    pub fn newline(&mut self) {
        match self.field {
            Field::Title => self.switch_field(),
            Field::Content => self.insert_char('\n'),
        }
    }

    pub fn backspace(&mut self) {
        let caret = self.caret.min(self.active_len());
        if caret == 0 {
            return;
        }
        let text = self.active_text_mut();
        let at = byte_index(text, caret - 1);
        text.remove(at);
        self.caret = caret - 1;
    }

    pub fn move_left(&mut self) {
        self.caret = self.caret.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.caret = (self.caret + 1).min(self.active_len());
    }

    /// Title to save: empty titles become the placeholder.
    pub fn title_or_placeholder(&self) -> &str {
        if self.title.is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }
}

pub(crate) fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Create(Draft),
    Edit { id: NoteId, draft: Draft },
}

impl Mode {
    pub fn draft(&self) -> Option<&Draft> {
        match self {
            Mode::Normal => None,
            Mode::Create(draft) | Mode::Edit { draft, .. } => Some(draft),
        }
    }

    fn draft_mut(&mut self) -> Option<&mut Draft> {
        match self {
            Mode::Normal => None,
            Mode::Create(draft) | Mode::Edit { draft, .. } => Some(draft),
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Mode::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    New,
    Edit,
    Delete,
    Up,
    Down,
    Cancel,
    Save,
    SwitchField,
    Insert(char),
    Newline,
    Backspace,
    Left,
    Right,
}

/// Maps a key to what it means in the given mode.
pub fn action_for(mode: &Mode, key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    if mode.is_normal() {
        return match key.code {
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            _ if ctrl || alt => None,
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('n') => Some(Action::New),
            KeyCode::Char('e') | KeyCode::Enter => Some(Action::Edit),
            KeyCode::Char('d') | KeyCode::Delete => Some(Action::Delete),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::Down),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char('s') if ctrl => Some(Action::Save),
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Tab | KeyCode::BackTab => Some(Action::SwitchField),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Left => Some(Action::Left),
        KeyCode::Right => Some(Action::Right),
        KeyCode::Enter => Some(Action::Newline),
        KeyCode::Char(c) if !ctrl && !alt => Some(Action::Insert(c)),
        _ => None,
    }
}

pub fn sidebar_width(total_width: u16) -> u16 {
    total_width / 3
}

/// How many entries fit in the sidebar for a terminal of `total_height` rows.
pub fn sidebar_capacity(total_height: u16) -> usize {
    let inner = total_height.saturating_sub(FOOTER_ROWS).saturating_sub(2);
    usize::from((inner / NOTE_ROW_HEIGHT).max(1))
}

/// First visible sidebar entry: scrolls just enough to keep `selected` shown.
pub fn sidebar_offset(selected: usize, capacity: usize) -> usize {
    selected.saturating_sub(capacity.max(1) - 1)
}

pub struct App {
    store: Store,
    notes: Vec<Note>,
    selected: usize,
    mode: Mode,
    error: Option<String>,
    status: Option<String>,
    width: u16,
    height: u16,
    quit: bool,
}

impl App {
    pub fn new(store: Store) -> Self {
        let mut app = Self {
            notes: store.list(),
            store,
            selected: 0,
            mode: Mode::Normal,
            error: None,
            status: None,
            width: 80,
            height: 24,
            quit: false,
        };
        app.collect_sync_warning();
        app
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes.get(self.selected)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(*key),
            Event::Mouse(mouse) => self.handle_mouse(*mouse),
            Event::Resize(width, height) => self.resize(*width, *height),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if let Some(action) = action_for(&self.mode, key) {
            self.apply(action);
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            self.click(mouse.column, mouse.row);
        }
    }

    /// Selects the sidebar entry under a pointer click, if there is one.
    pub fn click(&mut self, column: u16, row: u16) {
        if !self.mode.is_normal() || column >= sidebar_width(self.width) {
            return;
        }
        let Some(rel) = row.checked_sub(SIDEBAR_HEADER_ROWS) else {
            return;
        };
        let slot = usize::from(rel / NOTE_ROW_HEIGHT);
        let capacity = sidebar_capacity(self.height);
        if slot >= capacity {
            return;
        }
        let index = sidebar_offset(self.selected, capacity) + slot;
        if index < self.notes.len() {
            self.selected = index;
        }
    }

    pub fn apply(&mut self, action: Action) {
        if self.mode.is_normal() {
            self.apply_normal(action);
        } else {
            self.apply_editing(action);
        }
    }

    fn apply_normal(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit = true,
            Action::New => {
                self.error = None;
                self.mode = Mode::Create(Draft::empty());
            }
            Action::Edit => {
                if let Some(note) = self.notes.get(self.selected) {
                    self.error = None;
                    self.mode = Mode::Edit {
                        id: note.id,
                        draft: Draft::from_note(note),
                    };
                }
            }
            Action::Delete => self.delete_selected(),
            Action::Up => self.selected = self.selected.saturating_sub(1),
            Action::Down => {
                self.selected = (self.selected + 1).min(self.notes.len().saturating_sub(1));
            }
            _ => {}
        }
    }

    fn apply_editing(&mut self, action: Action) {
        match action {
            Action::Cancel => {
                debug!("edit cancelled");
                self.error = None;
                self.mode = Mode::Normal;
            }
            Action::Save => self.save(),
            _ => {
                let Some(draft) = self.mode.draft_mut() else {
                    return;
                };
                match action {
                    Action::SwitchField => draft.switch_field(),
                    Action::Insert(c) => draft.insert_char(c),
                    Action::Newline => draft.newline(),
                    Action::Backspace => draft.backspace(),
                    Action::Left => draft.move_left(),
                    Action::Right => draft.move_right(),
                    _ => {}
                }
            }
        }
    }

    fn save(&mut self) {
        let result = match &self.mode {
            Mode::Normal => return,
            Mode::Create(draft) => self
                .store
                .create(draft.title_or_placeholder(), &draft.content),
            Mode::Edit { id, draft } => {
                self.store
                    .update(*id, draft.title_or_placeholder(), &draft.content)
            }
        };
        match result {
            Ok(note) => {
                self.mode = Mode::Normal;
                self.error = None;
                self.status = Some(format!("Saved '{}'", note.title));
                self.reload();
                if let Some(pos) = self.notes.iter().position(|n| n.id == note.id) {
                    self.selected = pos;
                }
            }
            Err(e) => {
                warn!(error = %e, "save failed");
                self.error = Some(e.to_string());
            }
        }
    }

    fn delete_selected(&mut self) {
        let Some(note) = self.notes.get(self.selected) else {
            return;
        };
        let (id, title) = (note.id, note.title.clone());
        match self.store.delete(id) {
            Ok(_) => self.status = Some(format!("Deleted '{title}'")),
            Err(e) => {
                warn!(error = %e, id, "delete failed");
                self.status = Some(format!("Delete failed: {e}"));
            }
        }
        self.reload();
    }

    /// Re-reads the note list and keeps the selection in range.
    fn reload(&mut self) {
        self.notes = self.store.list();
        self.selected = self.selected.min(self.notes.len().saturating_sub(1));
        self.collect_sync_warning();
    }

    fn collect_sync_warning(&mut self) {
        if let Some(warning) = self.store.take_sync_warning() {
            self.status = Some(format!("Warning: not saved to disk: {warning}"));
        }
    }
}
