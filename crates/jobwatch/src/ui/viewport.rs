use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::log_sanitize::{display_text, display_width};
use crate::model::{LogBuffer, Severity};
use crate::tracker::{Conclusion, Lifecycle};
use crate::watch::WatchView;

use super::{spinner_frame, status_icon};

/// Header line plus rule.
pub const HEADER_ROWS: u16 = 2;
/// Rule plus hint line.
pub const FOOTER_ROWS: u16 = 2;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    /// Size of the controlling terminal, 80x24 when it cannot be queried.
    pub fn current() -> Self {
        let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
        Self { width, height }
    }
}

/// Sanitizes `text` and cuts it to `width` columns, ending in `…` when cut.
pub fn fit_width(text: &str, width: usize) -> String {
    let text = display_text(text);
    if display_width(&text) <= width {
        return text.into_owned();
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push(ELLIPSIS);
    out
}

/// The tail of the log that fits `rows` x `width`, padded with blank lines to
/// exactly `rows` entries so the layout does not jump while the log grows.
pub fn visible_lines(logs: &LogBuffer, rows: usize, width: usize) -> Vec<(Severity, String)> {
    let mut out: Vec<(Severity, String)> = logs
        .tail(rows)
        .iter()
        .map(|l| (l.severity, fit_width(&l.display(), width)))
        .collect();
    out.resize(rows, (Severity::Plain, String::new()));
    out
}

pub fn draw(f: &mut Frame, view: &WatchView<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_ROWS),
            Constraint::Min(0),
            Constraint::Length(FOOTER_ROWS),
        ])
        .split(f.area());

    draw_header(f, chunks[0], view);
    draw_logs(f, chunks[1], view);
    draw_footer(f, chunks[2], view);
}

fn lifecycle_color(lifecycle: Option<Lifecycle>) -> Color {
    match lifecycle {
        Some(Lifecycle::Queued) => Color::Gray,
        Some(Lifecycle::Running) => Color::Cyan,
        Some(Lifecycle::Finished(Conclusion::Succeeded)) => Color::Green,
        Some(Lifecycle::Finished(Conclusion::Failed)) => Color::Red,
        Some(Lifecycle::Finished(Conclusion::Canceled)) => Color::Yellow,
        None => Color::DarkGray,
    }
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Error => Style::default().fg(Color::Red),
        Severity::Warning => Style::default().fg(Color::Yellow),
        Severity::Info => Style::default(),
        Severity::Plain => Style::default().fg(Color::Gray),
    }
}

fn draw_header(f: &mut Frame, area: Rect, view: &WatchView<'_>) {
    let width = usize::from(area.width);
    let color = lifecycle_color(view.lifecycle);
    let (name, number, url) = match view.snapshot {
        Some(s) => (s.name.as_str(), s.number, s.url.as_str()),
        None => ("", 0, ""),
    };
    let mut status = view.status_text.to_string();
    if let Some(p) = view.percent {
        status.push_str(&format!(" {p}%"));
    }

    let left = format!(
        "{} {} ({}) #{number}",
        status_icon(view.lifecycle, view.frame),
        if name.is_empty() { "job" } else { name },
        view.session.id,
    );
    let line = Line::from(vec![
        Span::styled(
            fit_width(&left, width),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(status, Style::default().fg(color)),
        Span::raw("  "),
        Span::styled(display_text(url).into_owned(), Style::default().fg(Color::LightBlue)),
    ]);
    let p = Paragraph::new(Text::from(line)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_type(BorderType::Plain),
    );
    f.render_widget(p, area);
}

fn draw_logs(f: &mut Frame, area: Rect, view: &WatchView<'_>) {
    let lines = visible_lines(view.logs, usize::from(area.height), usize::from(area.width))
        .into_iter()
        .map(|(severity, text)| Line::from(Span::styled(text, severity_style(severity))))
        .collect::<Vec<_>>();
    f.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn draw_footer(f: &mut Frame, area: Rect, view: &WatchView<'_>) {
    let mut spans = vec![Span::styled(
        "[q/Esc/Ctrl+C] Detach",
        Style::default().fg(Color::Gray),
    )];
    if !view.is_finished() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!(
                "{} {}",
                spinner_frame(view.frame),
                crate::session::format_elapsed_hms(view.elapsed)
            ),
            Style::default().fg(Color::Yellow),
        ));
    }
    let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::TOP));
    f.render_widget(p, area);
}
