//! Markdown to styled terminal text.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use thiserror::Error;

const HEADING_COLOR: Color = Color::Rgb(0x87, 0x87, 0xFF);
const CODE_COLOR: Color = Color::Rgb(0xD7, 0xAF, 0x5F);
const QUOTE_COLOR: Color = Color::Rgb(0x8A, 0x8A, 0x8A);
const LINK_COLOR: Color = Color::Rgb(0x5F, 0xAF, 0xD7);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("cannot render into a zero-width area")]
    ZeroWidth,
}

/// Renders `source`, falling back to the raw text if rendering fails.
pub fn render_or_raw(source: &str, width: u16) -> Text<'static> {
    match render(source, width) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "markdown render failed, showing raw text");
            Text::raw(source.to_string())
        }
    }
}

pub fn render(source: &str, width: u16) -> Result<Text<'static>, RenderError> {
    if width == 0 {
        return Err(RenderError::ZeroWidth);
    }
    let mut renderer = Renderer::new(width);
    for event in Parser::new_ext(source, Options::all()) {
        renderer.event(event);
    }
    Ok(renderer.finish())
}

/// What each open tag contributes; popped on the matching end event.
enum Open {
    Heading,
    Paragraph,
    Emphasis,
    Strong,
    Strike,
    Link,
    Quote,
    List,
    Item,
    Code,
    Table,
    TableHead,
    TableRow,
    TableCell,
    Other,
}

/// Cells are buffered until the table ends so columns can be padded.
#[derive(Default)]
struct TableBuf {
    rows: Vec<Vec<Vec<Span<'static>>>>,
    header_rows: usize,
}

struct Renderer {
    width: u16,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    open: Vec<Open>,
    // next number per nested ordered list; None for bullets
    lists: Vec<Option<u64>>,
    table: Option<TableBuf>,
}

impl Renderer {
    fn new(width: u16) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: Vec::new(),
            open: Vec::new(),
            lists: Vec::new(),
            table: None,
        }
    }

    fn style(&self) -> Style {
        let mut style = Style::default();
        for open in &self.open {
            style = match open {
                Open::Heading => style.fg(HEADING_COLOR).add_modifier(Modifier::BOLD),
                Open::Emphasis => style.add_modifier(Modifier::ITALIC),
                Open::Strong => style.add_modifier(Modifier::BOLD),
                Open::Strike => style.add_modifier(Modifier::CROSSED_OUT),
                Open::Link => style.fg(LINK_COLOR).add_modifier(Modifier::UNDERLINED),
                Open::Quote => style.fg(QUOTE_COLOR).add_modifier(Modifier::ITALIC),
                Open::Code => style.fg(CODE_COLOR),
                _ => style,
            };
        }
        style
    }

    fn in_code_block(&self) -> bool {
        self.open.iter().any(|o| matches!(o, Open::Code))
    }

    fn quote_depth(&self) -> usize {
        self.open.iter().filter(|o| matches!(o, Open::Quote)).count()
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::new();
        let depth = self.quote_depth();
        if depth > 0 {
            spans.push(Span::styled("│ ".repeat(depth), Style::default().fg(QUOTE_COLOR)));
        }
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn push_text(&mut self, text: &str) {
        let style = self.style();
        if self.in_code_block() {
            let mut parts = text.split('\n').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_none() && part.is_empty() {
                    break;
                }
                self.current.push(Span::styled(format!("  {part}"), style));
                if parts.peek().is_some() {
                    self.flush();
                }
            }
            return;
        }
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                let style = self.style().fg(CODE_COLOR);
                self.current.push(Span::styled(format!("`{code}`"), style));
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.blank();
                let width = usize::from(self.width.min(80));
                self.lines.push(Line::styled(
                    "─".repeat(width),
                    Style::default().fg(QUOTE_COLOR),
                ));
                self.lines.push(Line::default());
            }
            Event::TaskListMarker(done) => {
                let mark = if done { "[x] " } else { "[ ] " };
                self.current.push(Span::styled(mark, Style::default().fg(CODE_COLOR)));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let open = match tag {
            Tag::Heading { level, .. } => {
                self.blank();
                let hashes = "#".repeat(heading_rank(level));
                self.current.push(Span::styled(
                    format!("{hashes} "),
                    Style::default().fg(HEADING_COLOR).add_modifier(Modifier::BOLD),
                ));
                Open::Heading
            }
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.blank();
                }
                Open::Paragraph
            }
            Tag::Emphasis => Open::Emphasis,
            Tag::Strong => Open::Strong,
            Tag::Strikethrough => Open::Strike,
            Tag::Link { .. } => Open::Link,
            Tag::BlockQuote(..) => {
                self.blank();
                Open::Quote
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
                self.lists.push(start);
                Open::List
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.current.push(Span::raw(marker));
                Open::Item
            }
            Tag::CodeBlock(kind) => {
                self.blank();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::styled(
                            format!("  [{lang}]"),
                            Style::default().fg(QUOTE_COLOR),
                        ));
                    }
                }
                Open::Code
            }
            Tag::Table(_) => {
                self.blank();
                self.table = Some(TableBuf::default());
                Open::Table
            }
            Tag::TableHead => {
                self.start_row();
                Open::TableHead
            }
            Tag::TableRow => {
                self.start_row();
                Open::TableRow
            }
            Tag::TableCell => Open::TableCell,
            _ => Open::Other,
        };
        self.open.push(open);
    }

    fn end(&mut self) {
        match self.open.pop() {
            Some(Open::Heading) | Some(Open::Paragraph) | Some(Open::Item) => self.flush(),
            Some(Open::Code) => {
                self.flush();
                self.lines.push(Line::default());
            }
            Some(Open::Quote) => self.flush(),
            Some(Open::List) => {
                self.flush();
                self.lists.pop();
            }
            Some(Open::TableCell) => {
                let cell = std::mem::take(&mut self.current);
                if let Some(row) = self.table.as_mut().and_then(|t| t.rows.last_mut()) {
                    row.push(cell);
                }
            }
            Some(Open::TableHead) => {
                if let Some(table) = self.table.as_mut() {
                    table.header_rows = table.rows.len();
                }
            }
            Some(Open::Table) => {
                if let Some(table) = self.table.take() {
                    self.emit_table(table);
                }
            }
            _ => {}
        }
    }

    fn start_row(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.rows.push(Vec::new());
        }
    }

    fn emit_table(&mut self, table: TableBuf) {
        let cell_width = |cell: &[Span<'_>]| cell.iter().map(Span::width).sum::<usize>();
        let mut widths: Vec<usize> = Vec::new();
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = cell_width(cell);
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }
        let border = Style::default().fg(QUOTE_COLOR);

        for (r, row) in table.rows.into_iter().enumerate() {
            let header = r < table.header_rows;
            let cells = row.len();
            for (i, cell) in row.into_iter().enumerate() {
                if i > 0 {
                    self.current.push(Span::styled(" │ ", border));
                }
                let width = cell_width(&cell);
                for span in cell {
                    self.current.push(if header {
                        span.patch_style(Style::default().add_modifier(Modifier::BOLD))
                    } else {
                        span
                    });
                }
                if i + 1 < cells {
                    self.current.push(Span::raw(" ".repeat(widths[i] - width)));
                }
            }
            self.flush();
            if header && r + 1 == table.header_rows {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                self.current.push(Span::styled(rule.join("─┼─"), border));
                self.flush();
            }
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

fn heading_rank(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn headings_keep_their_markers_and_style() {
        let text = render("# Title\n\nbody", 40).unwrap();
        let lines = plain(&text);
        assert_eq!(lines[0], "# Title");
        assert_eq!(lines.last().unwrap(), "body");
        assert!(text.lines[0].spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn bullet_and_ordered_lists() {
        let lines = plain(&render("- milk\n- eggs\n\n1. one\n2. two", 40).unwrap());
        assert!(lines.contains(&"• milk".to_string()));
        assert!(lines.contains(&"• eggs".to_string()));
        assert!(lines.contains(&"1. one".to_string()));
        assert!(lines.contains(&"2. two".to_string()));
    }

    #[test]
    fn task_list_markers() {
        let lines = plain(&render("- [x] Coffee\n- [ ] Butter", 40).unwrap());
        assert!(lines.contains(&"• [x] Coffee".to_string()));
        assert!(lines.contains(&"• [ ] Butter".to_string()));
    }

    #[test]
    fn code_blocks_are_indented_line_by_line() {
        let lines = plain(&render("```rust\nfn main() {}\nlet x = 1;\n```", 40).unwrap());
        assert!(lines.contains(&"  [rust]".to_string()));
        assert!(lines.contains(&"  fn main() {}".to_string()));
        assert!(lines.contains(&"  let x = 1;".to_string()));
    }

    #[test]
    fn inline_styles() {
        let text = render("a *b* **c** `d`", 40).unwrap();
        let spans = &text.lines[0].spans;
        let b = spans.iter().find(|s| s.content == "b").unwrap();
        assert!(b.style.add_modifier.contains(Modifier::ITALIC));
        let c = spans.iter().find(|s| s.content == "c").unwrap();
        assert!(c.style.add_modifier.contains(Modifier::BOLD));
        assert!(spans.iter().any(|s| s.content == "`d`"));
    }

    #[test]
    fn quotes_get_a_gutter() {
        let lines = plain(&render("> quoted", 40).unwrap());
        assert!(lines.iter().any(|l| l == "│ quoted"));
    }

    #[test]
    fn tables_keep_one_line_per_row() {
        let source = "| Key | Action |\n| --- | --- |\n| `n` | new note |\n| `q` | quit |";
        let text = render(source, 60).unwrap();
        assert_eq!(
            plain(&text),
            vec!["Key │ Action", "────┼─────────", "`n` │ new note", "`q` │ quit"]
        );
        let key = text.lines[0].spans.iter().find(|s| s.content == "Key").unwrap();
        assert!(key.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn table_columns_are_padded_to_the_widest_cell() {
        let lines = plain(&render("| a | b |\n|---|---|\n| longer | x |", 60).unwrap());
        assert_eq!(lines, vec!["a      │ b", "───────┼──", "longer │ x"]);
    }

    #[test]
    fn shortcut_table_in_demo_note_renders_row_by_row() {
        let (_, source) = crate::demo::DEMO_NOTES
            .iter()
            .find(|(title, _)| *title == "Keyboard Shortcuts")
            .unwrap();
        let lines = plain(&render(source, 60).unwrap());
        assert!(lines.contains(&"`n` │ new note".to_string()));
        assert!(lines.contains(&"`q` │ quit".to_string()));
    }

    #[test]
    fn text_after_a_table_starts_a_new_block() {
        let lines = plain(&render("| h |\n|---|\n| v |\n\nafter", 40).unwrap());
        assert_eq!(lines, vec!["h", "─", "v", "", "after"]);
    }

    #[test]
    fn zero_width_falls_back_to_raw() {
        assert_eq!(render("# x", 0), Err(RenderError::ZeroWidth));
        let text = render_or_raw("# x\n*y*", 0);
        assert_eq!(plain(&text), vec!["# x", "*y*"]);
    }
}
