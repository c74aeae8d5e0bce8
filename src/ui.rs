use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};

pub const HEADER_HEIGHT: u16 = 4;
pub const FOOTER_HEIGHT: u16 = 5;

#[derive(Debug, Clone)]
pub struct RowModel {
    pub owner: String,
    pub item: String,
    pub file: String,
    pub is_loading: bool,
    pub actionable: bool,
}

#[derive(Debug, Clone)]
pub struct ViewModel {
    pub steam_root: String,
    pub scan_status: String,
    pub rows: Vec<RowModel>,
    pub selected_index: usize,
    pub table_scroll_offset: usize,
    pub warning_line: Option<String>,
    pub message_line: Option<String>,
    pub loading_hint: Option<String>,
    pub live_loading_line: Option<String>,
    pub next_enabled: bool,
    pub dump: Option<String>,
    pub help_modal_open: bool,
}

pub fn render(frame: &mut ratatui::Frame<'_>, model: &ViewModel) {
    let chunks = Layout::vertical([
        Constraint::Length(HEADER_HEIGHT),
        Constraint::Min(6),
        Constraint::Length(FOOTER_HEIGHT),
    ])
    .split(frame.area());

    let header = Paragraph::new(vec![
        Line::from(format!("Steam: {}", model.steam_root)),
        Line::from(format!("Status: {}", model.scan_status)),
    ])
    .block(Block::default().borders(Borders::ALL).title("VdfScope"));
    frame.render_widget(header, chunks[0]);

    render_table(frame, chunks[1], model);
    render_footer(frame, chunks[2], model);

    if let Some(dump) = &model.dump {
        render_dump_dialog(frame, dump);
    }

    if model.help_modal_open {
        render_help_dialog(frame);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, model: &ViewModel) {
    let title = "Profiles (Enter imports the selected one)";

    if model.rows.is_empty() {
        let text = model
            .loading_hint
            .clone()
            .unwrap_or_else(|| "No importable profiles found.".to_string());

        let empty = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });

        frame.render_widget(empty, area);
        return;
    }

    let visible = area.height.saturating_sub(3) as usize;
    let rows = model
        .rows
        .iter()
        .enumerate()
        .skip(model.table_scroll_offset)
        .take(visible)
        .map(|(idx, row)| {
            let style = if idx == model.selected_index {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else if row.is_loading {
                Style::default().fg(Color::Yellow)
            } else if !row.actionable {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(row.owner.clone()),
                Cell::from(row.item.clone()),
                Cell::from(row.file.clone()),
            ])
            .style(style)
        });

    let widths = [
        Constraint::Length(32),
        Constraint::Length(32),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["Game", "Profile", "File"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title));

    frame.render_widget(table, area);
}

fn render_footer(frame: &mut ratatui::Frame<'_>, area: Rect, model: &ViewModel) {
    let mut lines = Vec::new();

    lines.push(Line::from(
        "Legend: ?/F1 help | q quit | j/k move | d dump profile file",
    ));
    if model.next_enabled {
        lines.push(Line::from("Enter: import selected profile"));
    } else {
        lines.push(Line::from("Enter: (profile file not known for this row)"));
    }

    if let Some(message) = &model.message_line {
        lines.push(Line::from(message.clone()));
    } else if let Some(warning) = &model.warning_line {
        lines.push(Line::from(format!("Warning: {warning}")));
    }

    if let Some(live_line) = &model.live_loading_line {
        lines.push(Line::from(live_line.clone()));
    }

    let footer = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });

    frame.render_widget(footer, area);
}

fn render_dump_dialog(frame: &mut ratatui::Frame<'_>, dump: &str) {
    let area = centered_rect(80, 80, frame.area());
    frame.render_widget(Clear, area);

    let dialog = Paragraph::new(dump.to_string())
        .block(
            Block::default()
                .title("Profile dump (Esc closes)")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::White)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(dialog, area);
}

fn render_help_dialog(frame: &mut ratatui::Frame<'_>) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let text = "VdfScope Help\n\n\
Navigation:\n\
  j / k or Up / Down: move selection\n\
  Enter: import the selected profile (prints its path and exits)\n\
  d: show the contents of the selected profile file\n\n\
Loading Indicators:\n\
  yellow rows are still waiting for a game or profile name\n\
  grey rows have no profile file and cannot be imported\n\
  footer spinner means profile lists are still being read\n\n\
Help:\n\
  ? or F1: open/close this help\n\
  q: quit app (or close help when this modal is open)";

    let dialog = Paragraph::new(text)
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::White)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(dialog, area);
}

/// Shortens `text` to at most `max` characters, keeping the tail.
pub fn truncate_left(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().skip(count - max).collect();
    }
    let tail: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{tail}")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
