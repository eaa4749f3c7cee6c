use image::DynamicImage;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::collections::HashMap;
use std::time::Instant;

use super::widgets::{accent_style, draw_footer, draw_loading, draw_progress, spinner};
use crate::app::reader::{ReaderCommand, ReaderEffect, ReaderState, ReadingMode, ZoomMode};
use crate::app::theme::ThemeConfig;
use crate::backend::chapters::ChapterList;
use crate::backend::models::{CatalogItem, ChapterItem, PageCollection};

/// Rows scrolled per up/down step in vertical mode.
pub const SCROLL_STEP: i64 = 5;

/// One open chapter: its pages, decoded images and reader state.
pub struct ReaderSession {
    pub manga: CatalogItem,
    pub chapters: ChapterList,
    pub chapter_id: String,
    pub chapter: Option<ChapterItem>,
    pub pages: Option<PageCollection>,
    pub state: ReaderState,
    images: HashMap<usize, StatefulProtocol>,
    scroll: i64,
    viewport_rows: u16,
}

impl ReaderSession {
    pub fn new(manga: CatalogItem, chapters: ChapterList, chapter_id: String, now: Instant) -> Self {
        let chapter = chapters
            .position(&chapter_id)
            .and_then(|i| chapters.get(i))
            .cloned();
        Self {
            manga,
            chapters,
            chapter_id,
            chapter,
            pages: None,
            state: ReaderState::new(0, now),
            images: HashMap::new(),
            scroll: 0,
            viewport_rows: 0,
        }
    }

    /// Starts over on another chapter of the same title, keeping the layout choices.
    pub fn switch_to(&mut self, chapter_id: String, now: Instant) {
        let (mode, zoom) = (self.state.mode(), self.state.zoom());
        self.chapter = self
            .chapters
            .position(&chapter_id)
            .and_then(|i| self.chapters.get(i))
            .cloned();
        self.chapter_id = chapter_id;
        self.pages = None;
        self.images.clear();
        self.scroll = 0;
        self.state = ReaderState::new(0, now);
        self.state.set_mode(mode);
        self.state.set_zoom(zoom);
    }

    pub fn set_pages(&mut self, chapter: Option<ChapterItem>, pages: PageCollection, now: Instant) {
        let (mode, zoom) = (self.state.mode(), self.state.zoom());
        if chapter.is_some() {
            self.chapter = chapter;
        }
        self.state = ReaderState::new(pages.len(), now);
        self.state.set_mode(mode);
        self.state.set_zoom(zoom);
        self.pages = Some(pages);
    }

    pub fn is_loading(&self) -> bool {
        self.pages.is_none()
    }

    pub fn add_image(&mut self, index: usize, image: DynamicImage, picker: Option<&Picker>) {
        if !self.state.mark_loaded(index) {
            return;
        }
        if let Some(picker) = picker {
            self.images.insert(index, picker.new_resize_protocol(image));
        }
    }

    pub fn next_chapter(&self) -> Option<&ChapterItem> {
        self.chapters.next_after(&self.chapter_id)
    }

    pub fn previous_chapter(&self) -> Option<&ChapterItem> {
        self.chapters.previous_before(&self.chapter_id)
    }

    pub fn chapter_label(&self) -> String {
        self.chapter
            .as_ref()
            .map(ChapterItem::label)
            .unwrap_or_else(|| "Chapter".to_string())
    }

    fn max_scroll(&self) -> i64 {
        let total = self.state.page_count() as i64 * self.viewport_rows as i64;
        (total - self.viewport_rows as i64).max(0)
    }

    fn scroll_by(&mut self, rows: i64) {
        self.scroll = (self.scroll + rows).clamp(0, self.max_scroll());
    }

    /// Vertical mode: scroll by a whole screen.
    pub fn scroll_screen(&mut self, down: bool) {
        let rows = self.viewport_rows.max(1) as i64;
        self.scroll_by(if down { rows } else { -rows });
    }

    pub fn command(&mut self, command: ReaderCommand, now: Instant) {
        let before = self.state.mode();
        if let ReaderEffect::Scroll(steps) = self.state.handle(command, now) {
            self.scroll_by(steps as i64 * SCROLL_STEP);
        }
        if before != ReadingMode::Vertical && self.state.mode() == ReadingMode::Vertical {
            let page = self.state.current_page().unwrap_or(0) as i64;
            self.scroll = (page * self.viewport_rows as i64).clamp(0, self.max_scroll());
        }
    }

    /// Vertical mode: the page whose slot covers the middle of the viewport.
    fn page_in_view(&self) -> usize {
        let rows = self.viewport_rows.max(1) as i64;
        ((self.scroll + rows / 2) / rows) as usize
    }
}

fn resize_for(zoom: ZoomMode) -> Resize {
    match zoom {
        ZoomMode::FitWidth => Resize::Scale(None),
        ZoomMode::FitHeight => Resize::Fit(None),
        ZoomMode::Actual => Resize::Crop(None),
    }
}

pub fn draw(f: &mut Frame, session: &mut ReaderSession, theme: &ThemeConfig, priority: &[&str]) {
    let area = f.area();
    let show_controls = session.state.controls_visible() && !session.state.fullscreen();

    let (top, body, progress, footer) = if show_controls {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(area);
        (Some(rows[0]), rows[1], Some(rows[2]), Some(rows[3]))
    } else {
        (None, area, None, None)
    };

    let (pages_area, sidebar_area) = if session.state.sidebar_open() {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(34)])
            .split(body);
        (columns[0], Some(columns[1]))
    } else {
        (body, None)
    };

    if let Some(top) = top {
        draw_top_bar(f, top, session, theme, priority);
    }
    draw_pages(f, pages_area, session, theme);
    if let Some(sidebar) = sidebar_area {
        draw_sidebar(f, sidebar, session, theme);
    }
    if session.state.is_last_page() {
        draw_end_panel(f, pages_area, session, theme);
    }
    if let Some(progress) = progress {
        draw_progress_bars(f, progress, session, theme);
    }
    if let Some(footer) = footer {
        draw_footer(
            f,
            footer,
            &[
                ("←→/ad", "Page"),
                ("↑↓/ws", "Scroll"),
                ("1-3", "Mode"),
                ("+/-", "Zoom"),
                ("m", "Menu"),
                ("f", "Fullscreen"),
                ("n/p", "Chapter"),
                ("Esc", "Back"),
            ],
            theme,
        );
    }
}

fn draw_top_bar(
    f: &mut Frame,
    area: Rect,
    session: &ReaderSession,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let page = match session.state.current_page() {
        Some(current) => format!("Page {} / {}", current + 1, session.state.page_count()),
        None => "No pages".to_string(),
    };
    let line = Line::from(vec![
        Span::styled(session.manga.display_title(priority), accent_style(theme)),
        Span::raw(" · "),
        Span::raw(session.chapter_label()),
        Span::raw("   "),
        Span::styled(page, Style::default().fg(theme.accent.primary)),
        Span::raw("   "),
        Span::styled(
            format!("{} · {}", session.state.mode().label(), session.state.zoom().label()),
            Style::default().fg(Color::Gray),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent.primary));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_progress_bars(f: &mut Frame, area: Rect, session: &ReaderSession, theme: &ThemeConfig) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let state = &session.state;
    draw_progress(
        f,
        halves[0],
        format!("Read {:.0}%", state.read_progress() * 100.0),
        state.read_progress(),
        theme,
    );
    draw_progress(
        f,
        halves[1],
        format!("Loaded {}/{}", state.loaded_count(), state.page_count()),
        state.load_progress(),
        theme,
    );
}

fn draw_pages(f: &mut Frame, area: Rect, session: &mut ReaderSession, theme: &ThemeConfig) {
    if session.is_loading() {
        draw_loading(f, area, theme, "Fetching chapter pages...");
        return;
    }
    if session.state.page_count() == 0 {
        f.render_widget(
            Paragraph::new("This chapter has no pages")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let current = session.state.current_page().unwrap_or(0);
    match session.state.mode() {
        ReadingMode::Single => draw_page(f, area, session, current, theme),
        ReadingMode::Horizontal => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(area);
            draw_page(f, halves[0], session, current, theme);
            if current + 1 < session.state.page_count() {
                draw_page(f, halves[1], session, current + 1, theme);
            }
        }
        ReadingMode::Vertical => draw_strip(f, area, session, theme),
    }
}

/// Pages stacked in screen-high slots, shifted up by the scroll offset.
fn draw_strip(f: &mut Frame, area: Rect, session: &mut ReaderSession, theme: &ThemeConfig) {
    session.viewport_rows = area.height;
    session.scroll = session.scroll.clamp(0, session.max_scroll());
    session.state.observe_visible(session.page_in_view());

    let rows = area.height.max(1) as i64;
    let first = (session.scroll / rows) as usize;
    for index in first..session.state.page_count() {
        let top = index as i64 * rows - session.scroll;
        if top >= rows {
            break;
        }
        let visible_top = top.max(0);
        let visible_bottom = (top + rows).min(rows);
        if visible_bottom <= visible_top {
            continue;
        }
        let slot = Rect::new(
            area.x,
            area.y + visible_top as u16,
            area.width,
            (visible_bottom - visible_top) as u16,
        );
        draw_page(f, slot, session, index, theme);
    }
}

fn draw_page(f: &mut Frame, area: Rect, session: &mut ReaderSession, index: usize, theme: &ThemeConfig) {
    let zoom = session.state.zoom();
    match session.images.get_mut(&index) {
        Some(state) => {
            let image = StatefulImage::new().resize(resize_for(zoom));
            f.render_stateful_widget(image, area, state);
        }
        None => {
            let text = if session.state.is_loaded(index) {
                format!("Page {}", index + 1)
            } else {
                format!("{} Loading page {}...", spinner(theme), index + 1)
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray));
            f.render_widget(
                Paragraph::new(text)
                    .block(block)
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray)),
                area,
            );
        }
    }
}

fn draw_sidebar(f: &mut Frame, area: Rect, session: &ReaderSession, theme: &ThemeConfig) {
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Reader Settings")
        .border_style(accent_style(theme));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(3)])
        .split(inner);

    let option = |label: &str, key: &str, active: bool| {
        let style = if active {
            Style::default()
                .fg(theme.accent.secondary)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Line::from(vec![
            Span::styled(format!("[{}] ", key), Style::default().fg(Color::DarkGray)),
            Span::styled(label.to_string(), style),
        ])
    };

    let mode = session.state.mode();
    let zoom = session.state.zoom();
    let settings = vec![
        Line::from(Span::styled("Reading mode", Style::default().fg(theme.accent.primary))),
        option(ReadingMode::Vertical.label(), "1", mode == ReadingMode::Vertical),
        option(ReadingMode::Horizontal.label(), "2", mode == ReadingMode::Horizontal),
        option(ReadingMode::Single.label(), "3", mode == ReadingMode::Single),
        Line::from(""),
        Line::from(Span::styled("Zoom", Style::default().fg(theme.accent.primary))),
        option(ZoomMode::FitWidth.label(), "+/-", zoom == ZoomMode::FitWidth),
        option(ZoomMode::FitHeight.label(), "+/-", zoom == ZoomMode::FitHeight),
        option(ZoomMode::Actual.label(), "+/-", zoom == ZoomMode::Actual),
    ];
    f.render_widget(Paragraph::new(settings), rows[0]);

    let items: Vec<ListItem> = session
        .chapters
        .as_slice()
        .iter()
        .map(|c| ListItem::new(c.label()))
        .collect();
    let mut list_state = ListState::default().with_selected(session.chapters.position(&session.chapter_id));
    let list = List::new(items)
        .block(Block::default().borders(Borders::TOP).title("Chapters"))
        .highlight_style(accent_style(theme).add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, rows[1], &mut list_state);
}

fn draw_end_panel(f: &mut Frame, area: Rect, session: &ReaderSession, theme: &ThemeConfig) {
    let height = 5.min(area.height);
    let width = 60.min(area.width);
    let panel = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + area.height - height,
        width,
        height,
    );
    f.render_widget(Clear, panel);

    let text = match session.next_chapter() {
        Some(next) => vec![
            Line::from(Span::styled("End of chapter", accent_style(theme))),
            Line::from(format!("Next up: {}", next.label())),
            Line::from(Span::styled("Press n to continue", Style::default().fg(Color::Gray))),
        ],
        None => vec![
            Line::from(Span::styled("End of chapter", accent_style(theme))),
            Line::from("You're all caught up."),
            Line::from(Span::styled("Esc to return to the title", Style::default().fg(Color::Gray))),
        ],
    };
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.accent.primary)),
        ),
        panel,
    );
}
