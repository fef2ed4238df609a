use crate::store::{Store, StoreError};

pub const DEMO_NOTES: [(&str, &str); 4] = [
    (
        "Welcome to Termnotes",
        "# Welcome!\n\nA small terminal notebook.\n\n## Features\n\n- **Markdown** rendering in the content pane\n- Notes saved to `~/.termnotes/notes.json` after every change\n- Mouse support in the sidebar\n\nTry creating a new note with **n**!",
    ),
    (
        "Shopping List",
        "# Shopping List\n\n- [ ] Milk\n- [ ] Eggs\n- [ ] Bread\n- [x] Coffee\n- [ ] Butter\n\nDon't forget to check the pantry first!",
    ),
    (
        "Keyboard Shortcuts",
        "## Browsing\n\n| Key | Action |\n| --- | --- |\n| `n` | new note |\n| `e` | edit note |\n| `d` | delete note |\n| `q` | quit |\n\n## Editing\n\n- `Tab` switches between title and content\n- `Ctrl+S` saves, `Esc` cancels",
    ),
    (
        "Code Snippet",
        "```rust\nfn fibonacci(n: u64) -> u64 {\n    match n {\n        0 | 1 => n,\n        _ => fibonacci(n - 1) + fibonacci(n - 2),\n    }\n}\n```\n\n> Recursion is fine for small n.",
    ),
];

/// Fills an empty store with sample notes. Returns how many were added.
pub fn seed_demo_notes(store: &mut Store) -> Result<usize, StoreError> {
    if !store.is_empty() {
        return Ok(0);
    }
    for (title, content) in DEMO_NOTES {
        store.create(title, content)?;
    }
    Ok(DEMO_NOTES.len())
}
