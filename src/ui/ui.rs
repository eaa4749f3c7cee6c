use image::DynamicImage;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::detail::{self, DetailState};
use super::explore::{self, ExploreState};
use super::reader::{self, ReaderSession};
use super::widgets::{
    accent_style, draw_banner, draw_footer, draw_loading, draw_manga_section,
};
use crate::app::search::SearchState;
use crate::app::theme::ThemeContext;
use crate::backend::chapters::ChapterList;
use crate::backend::filters::{ListFilters, SortKey};
use crate::backend::models::{CatalogItem, ChapterItem, PageCollection};
use crate::config::Settings;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Home,
    Explore,
    Search,
}

impl Tab {
    pub fn next(self) -> Self {
        match self {
            Tab::Home => Tab::Explore,
            Tab::Explore => Tab::Search,
            Tab::Search => Tab::Home,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Tab::Home => Tab::Search,
            Tab::Explore => Tab::Home,
            Tab::Search => Tab::Explore,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Header,
    Latest,
    Popular,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Detail,
    Reader,
    Error,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

/// The three home sections, fetched together.
#[derive(Debug, Clone, Default)]
pub struct HomeFeed {
    pub featured: Option<CatalogItem>,
    pub latest: Vec<CatalogItem>,
    pub popular: Vec<CatalogItem>,
}

/// What `r` does on the error view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retry {
    Home,
    Manga { manga_id: String },
    Chapter { chapter_id: String },
}

pub struct ErrorState {
    pub message: String,
    pub retry: Retry,
}

pub struct App {
    pub state: AppState,
    pub loading_message: String,
    pub view: View,
    pub tab: Tab,
    pub focus: Focus,
    pub settings: Arc<Settings>,
    pub theme: ThemeContext,
    pub home: HomeFeed,
    pub home_fetched: Option<Instant>,
    pub home_loading: bool,
    pub latest_offset: usize,
    pub popular_offset: usize,
    pub explore: ExploreState,
    pub search: SearchState,
    pub search_offset: usize,
    pub detail: Option<DetailState>,
    pub reader: Option<ReaderSession>,
    pub error: Option<ErrorState>,
    pub picker: Option<Picker>,
    pub image_states: HashMap<String, StatefulProtocol>,
}

impl App {
    pub fn new(settings: Arc<Settings>, theme: ThemeContext) -> Self {
        Self::with_picker(settings, theme, Picker::from_query_stdio().ok())
    }

    /// `None` draws covers and pages as placeholders.
    pub fn with_picker(settings: Arc<Settings>, theme: ThemeContext, picker: Option<Picker>) -> Self {
        let filters = ListFilters::new(SortKey::LatestUploadedChapter, &settings.content_ratings);

        Self {
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            view: View::Home,
            tab: Tab::Home,
            focus: Focus::Header,
            explore: ExploreState::new(filters, settings.page_size),
            search: SearchState::new(settings.search_debounce(), settings.search_min_chars),
            settings,
            theme,
            home: HomeFeed::default(),
            home_fetched: None,
            home_loading: false,
            latest_offset: 0,
            popular_offset: 0,
            search_offset: 0,
            detail: None,
            reader: None,
            error: None,
            picker,
            image_states: HashMap::new(),
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn add_cover_image(&mut self, manga_id: &str, image: DynamicImage) {
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.image_states.insert(manga_id.to_string(), protocol);
        }
    }

    pub fn set_home(&mut self, feed: HomeFeed, now: Instant) {
        self.home = feed;
        self.home_fetched = Some(now);
        self.home_loading = false;
    }

    /// Home sections older than the revalidation window are fetched again.
    pub fn home_is_stale(&self, now: Instant) -> bool {
        !self.home_loading
            && self
                .home_fetched
                .is_some_and(|at| now.saturating_duration_since(at) >= self.settings.home_revalidate())
    }

    pub fn open_manga(&mut self, manga: CatalogItem) {
        self.detail = Some(DetailState::new(manga));
        self.view = View::Detail;
    }

    pub fn set_chapters(&mut self, manga_id: &str, chapters: ChapterList) {
        if let Some(detail) = self.detail.as_mut().filter(|d| d.manga.id == manga_id) {
            detail.set_chapters(chapters);
        }
    }

    pub fn set_chapters_failed(&mut self, manga_id: &str, message: String) {
        if let Some(detail) = self.detail.as_mut().filter(|d| d.manga.id == manga_id) {
            detail.chapter_error = Some(message);
        }
    }

    /// Opens `chapter_id` from the title on the detail view. False when there is none.
    pub fn open_reader(&mut self, chapter_id: String, now: Instant) -> bool {
        let Some(detail) = &self.detail else {
            return false;
        };
        let chapters = detail.chapters.clone().unwrap_or_default();
        self.reader = Some(ReaderSession::new(detail.manga.clone(), chapters, chapter_id, now));
        self.view = View::Reader;
        true
    }

    /// Loads another chapter into the open reader, or opens one from the detail view.
    pub fn switch_chapter(&mut self, chapter_id: String, now: Instant) -> bool {
        match self.reader.as_mut() {
            Some(session) => {
                session.switch_to(chapter_id, now);
                self.view = View::Reader;
                true
            }
            None => self.open_reader(chapter_id, now),
        }
    }

    pub fn set_chapter_pages(
        &mut self,
        chapter_id: &str,
        chapter: Option<ChapterItem>,
        pages: PageCollection,
        now: Instant,
    ) -> bool {
        match self.reader.as_mut().filter(|r| r.chapter_id == chapter_id) {
            Some(session) => {
                session.set_pages(chapter, pages, now);
                true
            }
            None => false,
        }
    }

    pub fn add_page_image(&mut self, chapter_id: &str, index: usize, image: DynamicImage) {
        if let Some(session) = self.reader.as_mut().filter(|r| r.chapter_id == chapter_id) {
            session.add_image(index, image, self.picker.as_ref());
        }
    }

    pub fn show_error(&mut self, message: String, retry: Retry) {
        self.error = Some(ErrorState { message, retry });
        self.view = View::Error;
        self.set_ready();
    }

    pub fn go_home(&mut self) {
        self.error = None;
        self.reader = None;
        self.detail = None;
        self.view = View::Home;
    }

    pub fn go_back(&mut self) {
        match self.view {
            View::Reader if self.detail.is_some() => {
                self.reader = None;
                self.view = View::Detail;
            }
            View::Reader | View::Detail | View::Error => self.go_home(),
            View::Home => {}
        }
    }
}

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Loading => {
            let theme = app.theme.config();
            let block = Block::default()
                .borders(Borders::ALL)
                .title("MangaVerse")
                .border_style(Style::default().fg(theme.accent.primary));
            let inner = block.inner(f.area());
            f.render_widget(block, f.area());
            draw_loading(f, inner, &theme, &app.loading_message);
        }
        AppState::Ready => match app.view {
            View::Home => draw_browse(f, app),
            View::Detail => {
                let theme = app.theme.config();
                let priority = app.settings.language_priority();
                if let Some(detail) = app.detail.as_mut() {
                    let cover = app.image_states.get_mut(&detail.manga.id);
                    detail::draw(f, detail, cover, &theme, &priority);
                }
            }
            View::Reader => {
                let theme = app.theme.config();
                let priority = app.settings.language_priority();
                if let Some(session) = app.reader.as_mut() {
                    reader::draw(f, session, &theme, &priority);
                }
            }
            View::Error => draw_error(f, app),
        },
    }
}

fn draw_browse(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let theme = app.theme.config();
    let priority = app.settings.language_priority();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header/tabs
            Constraint::Min(10),   // content
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_header(f, root[0], app);

    match app.tab {
        Tab::Home => {
            let content = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(9),      // featured
                    Constraint::Percentage(50), // latest updates
                    Constraint::Percentage(50), // popular
                ])
                .split(root[1]);

            match &app.home.featured {
                Some(featured) => {
                    let cover = app.image_states.get_mut(&featured.id);
                    draw_banner(f, content[0], featured, cover, &theme, &priority);
                }
                None => {
                    let block = Block::default()
                        .borders(Borders::ALL)
                        .title("Featured")
                        .border_style(Style::default().fg(theme.accent.primary));
                    f.render_widget(
                        Paragraph::new("Nothing featured right now")
                            .block(block)
                            .alignment(Alignment::Center)
                            .style(Style::default().fg(Color::DarkGray)),
                        content[0],
                    );
                }
            }

            draw_manga_section(
                f,
                content[1],
                "Latest Updates",
                &app.home.latest,
                &mut app.latest_offset,
                app.focus == Focus::Latest,
                &mut app.image_states,
                &theme,
                &priority,
            );
            draw_manga_section(
                f,
                content[2],
                "Popular Now",
                &app.home.popular,
                &mut app.popular_offset,
                app.focus == Focus::Popular,
                &mut app.image_states,
                &theme,
                &priority,
            );
        }
        Tab::Explore => explore::draw(
            f,
            root[1],
            &mut app.explore,
            app.focus != Focus::Header,
            &mut app.image_states,
            &theme,
            &priority,
        ),
        Tab::Search => {
            let content = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(8)])
                .split(root[1]);
            draw_search_box(f, content[0], app);

            let title = if app.search.searching {
                "Searching...".to_string()
            } else if app.search.query.trim().chars().count() < app.settings.search_min_chars {
                format!("Type at least {} characters", app.settings.search_min_chars)
            } else {
                format!("Results ({})", app.search.results.len())
            };
            draw_manga_section(
                f,
                content[1],
                &title,
                &app.search.results,
                &mut app.search_offset,
                app.focus != Focus::Header,
                &mut app.image_states,
                &theme,
                &priority,
            );
        }
    }

    let hints: &[(&str, &str)] = match app.tab {
        Tab::Home => &[
            ("Tab/↑↓", "Section"),
            ("←→", "Browse"),
            ("Enter", "Open"),
            ("o", "Browser"),
            ("t", "Theme"),
            ("q", "Quit"),
        ],
        Tab::Explore => &[
            ("↑↓", "Move"),
            ("Tab", "Genres/List"),
            ("Space", "Toggle genre"),
            ("s", "Sort"),
            ("Enter", "Open"),
            ("t", "Theme"),
            ("q", "Quit"),
        ],
        Tab::Search => &[
            ("type", "Search"),
            ("Enter", "Search/Open"),
            ("↓", "Results"),
            ("Esc", "Clear"),
        ],
    };
    draw_footer(f, root[2], hints, &theme);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme.config();
    let selected = match app.tab {
        Tab::Home => 0,
        Tab::Explore => 1,
        Tab::Search => 2,
    };

    let header_style = if app.focus == Focus::Header {
        accent_style(&theme)
    } else {
        Style::default().fg(Color::White)
    };

    let tabs = Tabs::new(vec!["Home", "Explore", "Search"])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("MangaVerse · {}", theme.name))
                .border_style(Style::default().fg(theme.accent.primary)),
        )
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(header_style);

    f.render_widget(tabs, area);
}

fn draw_search_box(f: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme.config();
    let typing = app.focus == Focus::Header;
    let cursor = if typing { "█" } else { "" };

    let line = Line::from(vec![
        Span::styled("🔍 ", Style::default().fg(theme.accent.secondary)),
        Span::raw(app.search.query.clone()),
        Span::styled(cursor, Style::default().fg(theme.accent.primary)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Search")
        .border_style(if typing {
            accent_style(&theme)
        } else {
            Style::default().fg(theme.accent.primary)
        });
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_error(f: &mut Frame, app: &App) {
    let theme = app.theme.config();
    let message = app
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("Something went wrong");

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .split(f.area());

    let text = vec![
        Line::from(Span::styled(
            "Oops!",
            Style::default()
                .fg(theme.accent.secondary)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(vec![
            Span::styled("r", accent_style(&theme)),
            Span::raw(": Try again   "),
            Span::styled("h", accent_style(&theme)),
            Span::raw(": Home   "),
            Span::styled("q", accent_style(&theme)),
            Span::raw(": Quit"),
        ]),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent.primary));
    f.render_widget(
        Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        rows[1],
    );
}
