use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NoteId = i64;

/// Title given to notes saved without one.
pub const UNTITLED: &str = "Untitled";

/// A single note as held by the store and persisted by a backend.
///
/// Field names follow the on-disk format; the capitalized aliases are what
/// older note files used.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Note {
    #[serde(alias = "ID")]
    pub id: NoteId,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Content")]
    pub content: String,
    #[serde(rename = "createdAt", alias = "CreatedAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", alias = "UpdatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// First line of the content, shortened for list display.
    pub fn preview(&self, max_chars: usize) -> String {
        let first = self.content.lines().next().unwrap_or("");
        if first.is_empty() {
            return "No content".to_string();
        }
        if first.chars().count() > max_chars {
            let cut: String = first.chars().take(max_chars).collect();
            format!("{cut}...")
        } else {
            first.to_string()
        }
    }
}
