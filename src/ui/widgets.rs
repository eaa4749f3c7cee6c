use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};
use ratatui_image::{protocol::StatefulProtocol, Resize, StatefulImage};
use std::collections::HashMap;

use crate::app::theme::ThemeConfig;
use crate::backend::models::CatalogItem;

pub const CARD_WIDTH: u16 = 35;

pub fn accent_style(theme: &ThemeConfig) -> Style {
    Style::default()
        .fg(theme.accent.secondary)
        .add_modifier(Modifier::BOLD)
}

pub fn border_style(theme: &ThemeConfig, focused: bool) -> Style {
    if focused {
        accent_style(theme)
    } else {
        Style::default().fg(theme.accent.primary)
    }
}

pub fn spinner(theme: &ThemeConfig) -> &'static str {
    let frames = theme.loading_variant.frames();
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    frames[(millis / 100) as usize % frames.len()]
}

pub fn draw_loading(f: &mut Frame, area: Rect, theme: &ThemeConfig, message: &str) {
    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(area);

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner(theme)),
            Style::default()
                .fg(theme.accent.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading...",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]);
    f.render_widget(
        Paragraph::new(loading_text).alignment(Alignment::Center),
        center_layout[1],
    );

    let message = Paragraph::new(message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

/// Horizontal strip of cards starting at `offset`.
#[allow(clippy::too_many_arguments)]
pub fn draw_manga_section(
    f: &mut Frame,
    area: Rect,
    title: &str,
    mangas: &[CatalogItem],
    offset: &mut usize,
    focused: bool,
    image_states: &mut HashMap<String, StatefulProtocol>,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style(theme, focused));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if mangas.is_empty() {
        let empty = Paragraph::new("No manga available")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }

    let max_offset = mangas.len().saturating_sub(1);
    if *offset > max_offset {
        *offset = max_offset;
    }

    let cards_visible = (inner.width as usize / CARD_WIDTH as usize).max(1);
    let card_constraints: Vec<Constraint> = (0..cards_visible)
        .map(|_| Constraint::Length(CARD_WIDTH))
        .collect();
    let card_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(card_constraints)
        .split(inner);

    for (i, card_area) in card_areas.iter().enumerate() {
        let Some(manga) = mangas.get(*offset + i) else {
            break;
        };
        draw_manga_card(
            f,
            *card_area,
            manga,
            focused && i == 0,
            image_states.get_mut(&manga.id),
            theme,
            priority,
        );
    }

    let indicator = accent_style(theme);
    if *offset > 0 {
        let left_area = Rect::new(inner.x, inner.y + inner.height / 2, 1, 1);
        f.render_widget(Paragraph::new("◀").style(indicator), left_area);
    }
    if *offset + cards_visible < mangas.len() {
        let right_area = Rect::new(
            inner.x + inner.width.saturating_sub(1),
            inner.y + inner.height / 2,
            1,
            1,
        );
        f.render_widget(Paragraph::new("▶").style(indicator), right_area);
    }
}

pub fn draw_cover(f: &mut Frame, area: Rect, image_state: Option<&mut StatefulProtocol>) {
    match image_state {
        Some(state) => {
            let image_widget = StatefulImage::new().resize(Resize::Scale(None));
            f.render_stateful_widget(image_widget, area, state);
        }
        None => {
            let placeholder = vec![
                Line::from(""),
                Line::from(""),
                Line::from(Span::styled("📚", Style::default().fg(Color::Magenta))),
                Line::from(Span::styled("Loading...", Style::default().fg(Color::DarkGray))),
            ];
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray));
            f.render_widget(
                Paragraph::new(placeholder)
                    .block(block)
                    .alignment(Alignment::Center),
                area,
            );
        }
    }
}

pub fn draw_manga_card(
    f: &mut Frame,
    area: Rect,
    manga: &CatalogItem,
    selected: bool,
    image_state: Option<&mut StatefulProtocol>,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if selected {
            Style::default()
                .fg(theme.accent.primary)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        });

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 4 || inner.width < 5 {
        return;
    }

    let card_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // cover
            Constraint::Length(2), // title
            Constraint::Min(2),    // description
            Constraint::Length(1), // status
        ])
        .split(inner);

    draw_cover(f, card_layout[0], image_state);

    let title = truncate_text(
        &manga.display_title(priority),
        inner.width.saturating_sub(2) as usize,
    );
    f.render_widget(
        Paragraph::new(title).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        card_layout[1],
    );

    let desc_width = inner.width.saturating_sub(1) as usize;
    let max_desc_lines = card_layout[2].height as usize;
    let desc_lines = wrap_text(
        &manga.display_description(priority),
        desc_width,
        max_desc_lines.max(1),
    );
    f.render_widget(
        Paragraph::new(desc_lines.join("\n")).style(Style::default().fg(Color::DarkGray)),
        card_layout[2],
    );

    let status_line = Line::from(vec![
        Span::styled("★ ", Style::default().fg(theme.accent.secondary)),
        Span::styled(manga.status(), Style::default().fg(theme.accent.primary)),
    ]);
    f.render_widget(Paragraph::new(status_line), card_layout[3]);
}

/// Wide banner for the featured title: cover on the left, details on the right.
pub fn draw_banner(
    f: &mut Frame,
    area: Rect,
    manga: &CatalogItem,
    image_state: Option<&mut StatefulProtocol>,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Featured")
        .border_style(Style::default().fg(theme.accent.primary));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(20), Constraint::Min(10)])
        .split(inner);

    draw_cover(f, columns[0], image_state);

    let text = vec![
        Line::from(Span::styled(manga.display_title(priority), accent_style(theme))),
        Line::from(Span::styled(
            format!("{} · {}", manga.author_name(), manga.genres()),
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(manga.display_description(priority)),
    ];
    f.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: true }),
        columns[1],
    );
}

pub fn draw_progress(f: &mut Frame, area: Rect, label: String, ratio: f64, theme: &ThemeConfig) {
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(theme.accent.primary))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, area);
}

/// Key hints as `key: action` pairs.
pub fn draw_footer(f: &mut Frame, area: Rect, hints: &[(&str, &str)], theme: &ThemeConfig) {
    let mut spans = Vec::new();
    for (key, action) in hints {
        spans.push(Span::styled(*key, Style::default().fg(theme.accent.secondary)));
        spans.push(Span::raw(format!(": {}  ", action)));
    }

    let p = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.accent.primary)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

pub fn wrap_text(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    if width == 0 || max_lines == 0 {
        return vec![];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            if lines.len() >= max_lines {
                if let Some(last) = lines.last_mut() {
                    let char_count = last.chars().count();
                    if char_count > 3 {
                        *last = last.chars().take(char_count - 3).collect::<String>() + "...";
                    }
                }
                return lines;
            }
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() && lines.len() < max_lines {
        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_characters_not_bytes() {
        assert_eq!(truncate_text("短いタイトル", 10), "短いタイトル");
        assert_eq!(truncate_text("とても長いタイトルです", 6), "とても...");
    }

    #[test]
    fn wraps_and_marks_overflow() {
        let lines = wrap_text("one two three four five six", 9, 2);
        assert_eq!(lines, vec!["one two", "three..."]);
        assert!(wrap_text("anything", 0, 3).is_empty());
        assert_eq!(wrap_text("short", 20, 3), vec!["short"]);
    }
}
