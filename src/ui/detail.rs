use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use ratatui_image::protocol::StatefulProtocol;

use super::widgets::{accent_style, draw_cover, draw_footer, spinner};
use crate::app::theme::ThemeConfig;
use crate::backend::chapters::ChapterList;
use crate::backend::models::{CatalogItem, ChapterItem};

pub const CHAPTERS_PER_PAGE: usize = 20;

pub fn title_url(manga_id: &str) -> String {
    format!("https://mangadex.org/title/{}", manga_id)
}

pub struct DetailState {
    pub manga: CatalogItem,
    pub chapters: Option<ChapterList>,
    pub chapter_error: Option<String>,
    pub chapter_page: usize,
    pub list_state: ListState,
}

impl DetailState {
    pub fn new(manga: CatalogItem) -> Self {
        Self {
            manga,
            chapters: None,
            chapter_error: None,
            chapter_page: 0,
            list_state: ListState::default().with_selected(Some(0)),
        }
    }

    pub fn set_chapters(&mut self, chapters: ChapterList) {
        self.chapters = Some(chapters);
        self.chapter_error = None;
        self.chapter_page = 0;
        self.list_state.select(Some(0));
    }

    fn visible(&self) -> &[ChapterItem] {
        match &self.chapters {
            Some(list) => list.page(self.chapter_page, CHAPTERS_PER_PAGE),
            None => &[],
        }
    }

    pub fn page_count(&self) -> usize {
        self.chapters
            .as_ref()
            .map(|list| list.page_count(CHAPTERS_PER_PAGE))
            .unwrap_or(0)
    }

    pub fn selected_chapter(&self) -> Option<&ChapterItem> {
        self.visible().get(self.list_state.selected().unwrap_or(0))
    }

    pub fn select_next(&mut self) {
        let len = self.visible().len();
        let selected = self.list_state.selected().unwrap_or(0);
        if selected + 1 < len {
            self.list_state.select(Some(selected + 1));
        }
    }

    pub fn select_previous(&mut self) {
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(selected.saturating_sub(1)));
    }

    pub fn next_chapter_page(&mut self) {
        if self.chapter_page + 1 < self.page_count() {
            self.chapter_page += 1;
            self.list_state.select(Some(0));
        }
    }

    pub fn previous_chapter_page(&mut self) {
        if self.chapter_page > 0 {
            self.chapter_page -= 1;
            self.list_state.select(Some(0));
        }
    }
}

pub fn draw(
    f: &mut Frame,
    detail: &mut DetailState,
    cover: Option<&mut StatefulProtocol>,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(root[0]);

    draw_info(f, columns[0], &detail.manga, cover, theme, priority);
    draw_chapters(f, columns[1], detail, theme);

    draw_footer(
        f,
        root[1],
        &[
            ("↑↓", "Select"),
            ("←→", "Chapter page"),
            ("Enter", "Read"),
            ("o", "Open in browser"),
            ("Esc", "Back"),
            ("q", "Quit"),
        ],
        theme,
    );
}

fn draw_info(
    f: &mut Frame,
    area: Rect,
    manga: &CatalogItem,
    cover: Option<&mut StatefulProtocol>,
    theme: &ThemeConfig,
    priority: &[&str],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(manga.display_title(priority))
        .border_style(Style::default().fg(theme.accent.primary));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(14), Constraint::Min(4)])
        .split(inner);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(10)])
        .split(rows[0]);

    draw_cover(f, top[0], cover);

    let label = Style::default().fg(Color::Gray);
    let mut facts = vec![
        Line::from(Span::styled(manga.display_title(priority), accent_style(theme))),
        Line::from(""),
        Line::from(vec![
            Span::styled("Author: ", label),
            Span::raw(manga.author_name().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Artist: ", label),
            Span::raw(manga.artist_name().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Status: ", label),
            Span::styled(manga.status().to_string(), Style::default().fg(theme.accent.primary)),
        ]),
    ];
    if let Some(year) = manga.year {
        facts.push(Line::from(vec![
            Span::styled("Year: ", label),
            Span::raw(year.to_string()),
        ]));
    }
    facts.push(Line::from(vec![
        Span::styled("Genres: ", label),
        Span::raw(manga.genres()),
    ]));
    f.render_widget(Paragraph::new(facts).wrap(Wrap { trim: true }), top[1]);

    let description = Paragraph::new(manga.display_description(priority))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::TOP).title("Synopsis"));
    f.render_widget(description, rows[1]);
}

fn draw_chapters(f: &mut Frame, area: Rect, detail: &mut DetailState, theme: &ThemeConfig) {
    let title = match &detail.chapters {
        Some(list) if !list.is_empty() => format!(
            "Chapters ({}) · page {}/{}",
            list.len(),
            detail.chapter_page + 1,
            detail.page_count()
        ),
        _ => "Chapters".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(accent_style(theme));

    let message = match (&detail.chapters, &detail.chapter_error) {
        (_, Some(err)) => Some(err.clone()),
        (None, None) => Some(format!("{} Loading chapters...", spinner(theme))),
        (Some(list), None) if list.is_empty() => {
            Some("No chapters available in this language".to_string())
        }
        _ => None,
    };
    if let Some(message) = message {
        f.render_widget(
            Paragraph::new(message)
                .block(block)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = detail
        .visible()
        .iter()
        .map(|chapter| {
            let date = chapter
                .publish_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::raw(chapter.label()),
                Span::styled(format!("  {}", date), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .fg(theme.accent.secondary)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        )
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut detail.list_state);
}
