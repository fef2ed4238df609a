use ratatui::{
    Frame,
    prelude::*,
    style::Style,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::markdown::render_or_raw;
use crate::models::Note;
use crate::state::{
    App, Draft, EDIT_HELP, FOOTER_ROWS, Field, Mode, NORMAL_HELP, byte_index, sidebar_capacity,
    sidebar_offset, sidebar_width,
};

pub const MIN_WIDTH: u16 = 40;
pub const MIN_HEIGHT: u16 = 10;
pub const TOO_SMALL: &str = "Terminal too small. Please resize.";
const PREVIEW_CHARS: usize = 50;
const CARET: char = '█';

const COLOR_ACCENT: Color = Color::Rgb(0x87, 0x87, 0xFF);
const COLOR_MUTED: Color = Color::Rgb(0x62, 0x62, 0x62);
const COLOR_LABEL: Color = Color::Rgb(0x8A, 0x8A, 0x8A);
const COLOR_ERROR: Color = Color::Rgb(0xFF, 0x5F, 0x5F);
const COLOR_WARN: Color = Color::Rgb(0xD7, 0xAF, 0x5F);

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let area = f.size();
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        draw_too_small(f, area);
        return;
    }
    match app.mode() {
        Mode::Normal => draw_normal(f, app),
        Mode::Create(draft) => draw_editor(f, "Create New Note", draft, app.error()),
        Mode::Edit { draft, .. } => draw_editor(f, "Edit Note", draft, app.error()),
    }
}

fn draw_too_small(f: &mut Frame<'_>, area: Rect) {
    let top = (area.height / 2).saturating_sub(1);
    let row = Rect::new(area.x, area.y + top, area.width, area.height - top);
    let msg = Paragraph::new(TOO_SMALL)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(COLOR_WARN));
    f.render_widget(msg, row);
}

fn draw_normal(f: &mut Frame<'_>, app: &App) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(FOOTER_ROWS)])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(sidebar_width(area.width)),
            Constraint::Min(1),
        ])
        .split(layout[0]);

    // Sidebar
    let items: Vec<ListItem> = if app.notes().is_empty() {
        vec![ListItem::new(Text::from(vec![
            Line::from("No notes"),
            Line::styled("press n to create one", Style::default().fg(COLOR_MUTED)),
        ]))]
    } else {
        app.notes().iter().map(note_item).collect()
    };
    let mut list_state = ListState::default();
    if !app.notes().is_empty() {
        let capacity = sidebar_capacity(area.height);
        list_state = list_state
            .with_offset(sidebar_offset(app.selected(), capacity))
            .with_selected(Some(app.selected()));
    }
    let list = List::new(items)
        .block(Block::default().title("Notes").borders(Borders::ALL))
        .highlight_symbol("▶ ")
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, body[0], &mut list_state);

    // Content pane
    let pane = Block::default().borders(Borders::ALL);
    let inner_width = pane.inner(body[1]).width;
    let content = match app.selected_note() {
        Some(note) => note_body(note, inner_width),
        None => Text::from("No note selected"),
    };
    let detail = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(pane);
    f.render_widget(detail, body[1]);

    let footer = match app.status() {
        Some(status) if status.starts_with("Warning") || status.starts_with("Delete failed") => {
            Line::styled(status.to_string(), Style::default().fg(COLOR_WARN))
        }
        Some(status) => Line::from(vec![
            Span::raw(status.to_string()),
            Span::styled(format!("  |  {NORMAL_HELP}"), Style::default().fg(COLOR_MUTED)),
        ]),
        None => Line::styled(NORMAL_HELP, Style::default().fg(COLOR_MUTED)),
    };
    f.render_widget(Paragraph::new(footer), layout[1]);
}

fn note_item(note: &Note) -> ListItem<'static> {
    ListItem::new(Text::from(vec![
        Line::from(note.title.clone()),
        Line::styled(
            format!("  {}", note.preview(PREVIEW_CHARS)),
            Style::default().fg(COLOR_MUTED),
        ),
    ]))
}

fn note_body(note: &Note, width: u16) -> Text<'static> {
    let mut lines = vec![
        Line::styled(
            note.title.clone(),
            Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Line::styled(
            "─".repeat(usize::from(width.min(80))),
            Style::default().fg(COLOR_MUTED),
        ),
        Line::default(),
    ];
    lines.extend(render_or_raw(&note.content, width).lines);
    Text::from(lines)
}

fn draw_editor(f: &mut Frame<'_>, heading: &str, draft: &Draft, error: Option<&str>) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(FOOTER_ROWS)])
        .split(area);

    let label = Style::default().fg(COLOR_LABEL);
    let mut lines = vec![
        Line::styled("Title (Tab to switch fields):", label),
        field_lines(&draft.title, draft.field == Field::Title, draft.caret)
            .into_iter()
            .next()
            .unwrap_or_default(),
        Line::default(),
        Line::styled("Content:", label),
    ];
    lines.extend(field_lines(
        &draft.content,
        draft.field == Field::Content,
        draft.caret,
    ));
    if let Some(err) = error {
        lines.push(Line::default());
        lines.push(Line::styled(
            format!("Error: {err}"),
            Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
        ));
    }

    let editor = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                heading.to_string(),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(editor, layout[0]);
    f.render_widget(
        Paragraph::new(Line::styled(EDIT_HELP, Style::default().fg(COLOR_MUTED))),
        layout[1],
    );
}

/// One line per text line; the active field shows the caret and a `>` gutter.
fn field_lines(text: &str, active: bool, caret: usize) -> Vec<Line<'static>> {
    let shown = if active {
        let mut with_caret = text.to_string();
        with_caret.insert(byte_index(text, caret), CARET);
        with_caret
    } else {
        text.to_string()
    };
    shown
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            let gutter = if active && i == 0 { "> " } else { "  " };
            Line::from(format!("{gutter}{line}"))
        })
        .collect()
}
