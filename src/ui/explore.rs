use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use ratatui_image::protocol::StatefulProtocol;
use std::collections::HashMap;

use super::widgets::{accent_style, border_style, draw_manga_card, spinner, truncate_text};
use crate::app::pager::Pager;
use crate::app::theme::ThemeConfig;
use crate::backend::filters::{ListFilters, GENRES};
use crate::backend::models::CatalogItem;

/// How close to the end of the list the selection gets before the next page is requested.
pub const PREFETCH_THRESHOLD: usize = 5;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum ExploreFocus {
    #[default]
    Genres,
    List,
}

pub struct ExploreState {
    pub pager: Pager,
    pub focus: ExploreFocus,
    pub genre_cursor: usize,
    pub list_state: ListState,
    pub last_error: Option<String>,
}

impl ExploreState {
    pub fn new(filters: ListFilters, page_size: usize) -> Self {
        Self {
            pager: Pager::new(filters, page_size),
            focus: ExploreFocus::Genres,
            genre_cursor: 0,
            list_state: ListState::default(),
            last_error: None,
        }
    }

    pub fn selected(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    pub fn selected_item(&self) -> Option<&CatalogItem> {
        self.pager.items().get(self.selected())
    }

    pub fn select_next(&mut self) {
        let len = self.pager.items().len();
        if len == 0 {
            return;
        }
        let next = (self.selected() + 1).min(len - 1);
        self.list_state.select(Some(next));
    }

    pub fn select_previous(&mut self) {
        if self.pager.items().is_empty() {
            return;
        }
        self.list_state.select(Some(self.selected().saturating_sub(1)));
    }

    pub fn genre_left(&mut self) {
        self.genre_cursor = self.genre_cursor.checked_sub(1).unwrap_or(GENRES.len() - 1);
    }

    pub fn genre_right(&mut self) {
        self.genre_cursor = (self.genre_cursor + 1) % GENRES.len();
    }

    /// Toggles the genre under the cursor. True when the listing started over.
    pub fn toggle_genre(&mut self) -> bool {
        let mut filters = self.pager.filters().clone();
        filters.toggle_tag(GENRES[self.genre_cursor].1);
        self.restart_with(filters)
    }

    pub fn cycle_sort(&mut self) -> bool {
        let mut filters = self.pager.filters().clone();
        filters.sort = filters.sort.next_in_menu();
        self.restart_with(filters)
    }

    fn restart_with(&mut self, filters: ListFilters) -> bool {
        if !self.pager.set_filters(filters) {
            return false;
        }
        self.list_state = ListState::default();
        self.last_error = None;
        true
    }

    pub fn should_prefetch(&self) -> bool {
        self.pager.needs_more(self.selected(), PREFETCH_THRESHOLD)
    }
}

pub fn draw(
    f: &mut Frame,
    area: Rect,
    explore: &mut ExploreState,
    content_focused: bool,
    image_states: &mut HashMap<String, StatefulProtocol>,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // genres
            Constraint::Length(3), // sort + count
            Constraint::Min(8),    // list + preview
        ])
        .split(area);

    draw_genres(
        f,
        rows[0],
        explore,
        content_focused && explore.focus == ExploreFocus::Genres,
        theme,
    );
    draw_sort_bar(f, rows[1], explore, theme);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(37)])
        .split(rows[2]);

    draw_list(
        f,
        columns[0],
        explore,
        content_focused && explore.focus == ExploreFocus::List,
        theme,
        priority,
    );

    if let Some(item) = explore.selected_item() {
        draw_manga_card(
            f,
            columns[1],
            item,
            true,
            image_states.get_mut(&item.id),
            theme,
            priority,
        );
    }
}

fn draw_genres(f: &mut Frame, area: Rect, explore: &ExploreState, focused: bool, theme: &ThemeConfig) {
    let filters = explore.pager.filters();
    let mut spans = Vec::new();
    for (i, (name, id)) in GENRES.iter().enumerate() {
        let mut style = if filters.has_tag(id) {
            Style::default()
                .fg(theme.accent.text)
                .bg(theme.accent.primary)
        } else {
            Style::default().fg(Color::Gray)
        };
        if focused && i == explore.genre_cursor {
            style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
        }
        spans.push(Span::styled(format!(" {} ", name), style));
        spans.push(Span::raw(" "));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Genres")
        .border_style(border_style(theme, focused));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_sort_bar(f: &mut Frame, area: Rect, explore: &ExploreState, theme: &ThemeConfig) {
    let pager = &explore.pager;
    let count = match pager.total() {
        Some(total) => format!("{} of {} titles", pager.items().len(), total),
        None => format!("{} titles", pager.items().len()),
    };
    let genres = pager.filters().selected_genres();
    let line = Line::from(vec![
        Span::styled("Sort: ", Style::default().fg(Color::Gray)),
        Span::styled(pager.filters().sort.label(), accent_style(theme)),
        Span::raw("   "),
        Span::styled(count, Style::default().fg(Color::Gray)),
        Span::raw("   "),
        Span::styled(
            if genres.is_empty() {
                "All genres".to_string()
            } else {
                genres.join(", ")
            },
            Style::default().fg(theme.accent.primary),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent.primary));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_list(
    f: &mut Frame,
    area: Rect,
    explore: &mut ExploreState,
    focused: bool,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Explore")
        .border_style(border_style(theme, focused));

    let pager = &explore.pager;
    if pager.items().is_empty() {
        let message = if pager.in_flight() {
            format!("{} Loading titles...", spinner(theme))
        } else if let Some(err) = &explore.last_error {
            format!("{} (r to retry)", err)
        } else {
            "No titles match these filters".to_string()
        };
        f.render_widget(
            Paragraph::new(message)
                .block(block)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let width = area.width.saturating_sub(8) as usize;
    let mut items: Vec<ListItem> = pager
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let line = Line::from(vec![
                Span::styled(format!("{:>4}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::raw(truncate_text(&item.display_title(priority), width.saturating_sub(20))),
                Span::styled(
                    format!("  {}", item.status()),
                    Style::default().fg(theme.accent.primary),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let footer = if pager.in_flight() {
        format!("{} Loading more...", spinner(theme))
    } else if let Some(err) = &explore.last_error {
        format!("{} (r to retry)", err)
    } else if !pager.has_more() {
        format!("You've reached the end · {} titles", pager.items().len())
    } else {
        String::new()
    };
    if !footer.is_empty() {
        items.push(ListItem::new(Span::styled(
            footer,
            Style::default().fg(Color::DarkGray),
        )));
    }

    if explore.list_state.selected().is_none() {
        explore.list_state.select(Some(0));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(accent_style(theme).add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut explore.list_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::filters::SortKey;

    #[test]
    fn genre_cursor_wraps_both_ways() {
        let mut explore = ExploreState::new(ListFilters::default(), 20);
        explore.genre_left();
        assert_eq!(explore.genre_cursor, GENRES.len() - 1);
        explore.genre_right();
        assert_eq!(explore.genre_cursor, 0);
    }

    #[test]
    fn filter_changes_restart_the_listing() {
        let mut explore = ExploreState::new(ListFilters::default(), 20);
        explore.list_state.select(Some(4));
        explore.genre_cursor = 7;

        assert!(explore.toggle_genre());
        assert_eq!(explore.pager.filters().selected_genres(), vec!["Romance"]);
        assert_eq!(explore.list_state.selected(), None);

        assert!(explore.cycle_sort());
        assert_eq!(explore.pager.filters().sort, SortKey::FollowedCount);
        assert!(explore.should_prefetch());
    }
}
