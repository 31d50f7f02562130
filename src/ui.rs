use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use verbatim::model::{AssistanceConfig, TimeRecord};
use verbatim::session::Handoff;
use verbatim::util::{format_elapsed, format_record_time, humanize_completed_at};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 3;
const VERTICAL_MARGIN: u16 = 1;
const MAX_FULL_TEXT_LINES: u16 = 12;

fn assistance_label(assistance: &AssistanceConfig) -> String {
    let flags = assistance.enabled_flags();
    if flags.is_empty() {
        "no assistance".to_string()
    } else {
        flags.join(" · ")
    }
}

/// Lay out styled runs as lines, breaking wherever a run contains `\n`.
pub fn styled_lines(runs: &[(&str, Style)]) -> Vec<Line<'static>> {
    let mut lines = vec![Line::default()];
    for (text, style) in runs {
        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Line::default());
            }
            if !piece.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push_span(Span::styled(piece.to_string(), *style));
                }
            }
        }
    }
    lines
}

/// Rows `text` occupies when wrapped at `width` columns.
pub fn wrapped_height(text: &str, width: u16) -> u16 {
    let width = width.max(1) as usize;
    text.split('\n')
        .map(|line| line.width().max(1).div_ceil(width) as u16)
        .sum()
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Studying => render_study(self, area, buf),
            AppState::Done => render_done(self, area, buf),
        }
    }
}

fn render_study(app: &App, area: Rect, buf: &mut Buffer) {
    let controller = &app.controller;
    let plan = controller.plan();

    let border_style = if app.is_shaking() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title = plan
        .deck_name()
        .unwrap_or(controller.current_card().title.as_str());
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    let inner = outer.inner(area);
    outer.render(area, buf);

    let body_width = inner.width.saturating_sub(HORIZONTAL_MARGIN * 2);
    let full_text = controller.full_text();
    let full_text_rows = full_text
        .map(|t| (wrapped_height(t, body_width.saturating_sub(2)) + 2).min(MAX_FULL_TEXT_LINES))
        .unwrap_or(0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),              // header
            Constraint::Length(1),              // padding
            Constraint::Length(full_text_rows), // full text
            Constraint::Min(1),                 // typing surface
            Constraint::Length(1),              // legend
        ])
        .split(inner);

    let dim = Style::default().add_modifier(Modifier::DIM);
    let mut header = Vec::new();
    if controller.card_count() > 1 {
        header.push(Span::styled(
            format!(
                "Card {} / {}",
                controller.card_index() + 1,
                controller.card_count()
            ),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        header.push(Span::raw("   "));
    }
    header.push(Span::styled(
        controller.current_card().title.clone(),
        Style::default().fg(Color::Cyan),
    ));
    header.push(Span::raw("   "));
    header.push(Span::styled(format_elapsed(controller.elapsed_ms(app.now_ms)), dim));
    if controller.card_count() > 1 {
        header.push(Span::styled(
            format!(" (this card {})", format_elapsed(controller.card_elapsed_ms(app.now_ms))),
            dim,
        ));
    }
    let header = Line::from(header);
    Paragraph::new(header).render(chunks[0], buf);

    if let Some(text) = full_text {
        Paragraph::new(text.to_string())
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::ALL).title(" Full text "))
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);
    }

    let buffer = controller.buffer();
    let typed_style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let ghost_style = Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC);
    let cursor_style = Style::default().add_modifier(Modifier::REVERSED);

    let ghost = controller.ghost_text().unwrap_or("");
    let mut lines = styled_lines(&[(&buffer, typed_style), (ghost, ghost_style)]);
    if let Some(line) = lines.last_mut() {
        line.push_span(Span::styled(" ", cursor_style));
    }
    if buffer.is_empty() && !controller.has_started() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Start typing…", dim)));
    }

    Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        assistance_label(&controller.assistance()) + "   (esc) cancel",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}

fn best_times_lines(best: &[TimeRecord], wall_now_ms: i64) -> Vec<Line<'static>> {
    if best.is_empty() {
        return vec![Line::from("no times yet")];
    }
    best.iter()
        .enumerate()
        .map(|(i, r)| {
            Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format_record_time(r.elapsed_ms), Style::default().fg(Color::Green)),
                Span::raw(format!(
                    "   {}   {}",
                    assistance_label(&r.assistance),
                    humanize_completed_at(r.completed_at, wall_now_ms)
                )),
            ])
        })
        .collect()
}

fn summary_lines(handoff: &Handoff) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    vec![
        Line::from(Span::styled(
            "Session complete",
            bold.fg(Color::Green),
        )),
        Line::default(),
        Line::from(vec![Span::raw(format!("{}: ", handoff.mode)), Span::styled(handoff.title.clone(), bold)]),
        Line::from(vec![
            Span::raw("time: "),
            Span::styled(format_record_time(handoff.elapsed_ms), bold.fg(Color::Magenta)),
        ]),
        Line::from(assistance_label(&handoff.assistance)),
    ]
}

fn render_done(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    if let Some(handoff) = &app.handoff {
        Paragraph::new(Text::from(summary_lines(handoff)))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);
    }

    Paragraph::new(Text::from(best_times_lines(&app.best, app.wall_now_ms)))
        .block(Block::default().borders(Borders::ALL).title(" Best times "))
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(any key) exit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}
