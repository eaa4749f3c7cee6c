mod app;
mod backend;
mod config;
mod error;
mod ui;

use app::pager::{Outcome, PageRequest};
use app::reader::{ReaderCommand, ReadingMode};
use app::theme::ThemeContext;
use backend::chapters::ChapterList;
use backend::mangadex::{Catalog, MangaDexClient};
use backend::models::{AtHomeServer, CatalogItem, ChapterItem, ListPage, PageCollection, Quality};
use config::Settings;
use error::Result as FetchResult;
use image::DynamicImage;
use ui::detail::title_url;
use ui::explore::ExploreFocus;
use ui::ui::{App, AppState, Focus, HomeFeed, Retry, Tab, View, ui};

use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEventKind,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use log::{debug, error, info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{collections::HashSet, error::Error, fs, io, path::PathBuf, sync::Arc, time::Instant};
use tokio::{sync::mpsc, task::JoinHandle};

const PAGE_IMAGE_CONCURRENCY: usize = 4;
const COVER_PRELOAD: usize = 8;

#[derive(Parser)]
#[command(name = "mangaverse", version, about = "Browse and read MangaDex in the terminal")]
struct Cli {
    /// Read settings from this file instead of the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Relay /api/mangadex requests to the MangaDex API
    Proxy {
        /// Address to listen on, e.g. 127.0.0.1:8787
        #[arg(long)]
        listen: Option<String>,
    },
}

enum BackgroundTask {
    HomeLoaded(FetchResult<HomeFeed>),
    CoverLoaded { manga_id: String, image: DynamicImage },
    CoverFailed { manga_id: String },
    ExplorePage { request: PageRequest, result: FetchResult<ListPage> },
    SearchResults { query: String, result: FetchResult<Vec<CatalogItem>> },
    MangaLoaded { manga_id: String, result: FetchResult<CatalogItem> },
    ChaptersLoaded { manga_id: String, result: FetchResult<ChapterList> },
    ChapterOpened {
        chapter_id: String,
        result: FetchResult<(Option<ChapterItem>, AtHomeServer)>,
    },
    PageImageLoaded { chapter_id: String, index: usize, image: DynamicImage },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(matches!(cli.command, Some(Command::Proxy { .. })));

    let settings = Arc::new(Settings::load(cli.config.as_deref()));

    if let Some(Command::Proxy { listen }) = cli.command {
        let listen = listen.unwrap_or_else(|| settings.proxy_listen.clone());
        backend::proxy::serve(&settings, &listen).await?;
        return Ok(());
    }

    let client = MangaDexClient::new(settings.clone())?;
    let theme = ThemeContext::load(config::config_dir().join("theme.json"));
    info!("starting with theme {:?}", theme.kind());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings, theme);
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let mut tasks = Tasks::new(client, task_tx);

    app.set_loading("Connecting to MangaDex...");
    terminal.draw(|f| ui(f, &mut app))?;

    app.set_loading("Fetching latest updates and popular titles...");
    terminal.draw(|f| ui(f, &mut app))?;

    match load_home(&tasks.client).await {
        Ok(feed) => {
            app.set_home(feed, Instant::now());
            preload_home_covers(&app, &mut tasks);
            app.set_ready();
        }
        Err(e) => {
            error!("home sections failed: {}", e);
            app.show_error(e.user_message(), Retry::Home);
        }
    }

    let res = run_app(&mut terminal, &mut app, &mut task_rx, &mut tasks).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("terminal error: {}", err);
        eprintln!("{err}");
    }
    Ok(())
}

/// The terminal belongs to the UI, so logs go to a file unless we're serving.
fn init_logging(to_stderr: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if !to_stderr {
        let dir = config::cache_dir();
        let file = fs::create_dir_all(&dir).and_then(|_| {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("mangaverse.log"))
        });
        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

async fn load_home(client: &MangaDexClient) -> FetchResult<HomeFeed> {
    let limit = client.settings().page_size;
    let (featured, latest, popular) = tokio::join!(
        client.featured(),
        client.latest_updates(limit),
        client.popular(limit)
    );
    let featured = featured.unwrap_or_else(|e| {
        warn!("featured title unavailable: {}", e);
        None
    });
    Ok(HomeFeed {
        featured,
        latest: latest?,
        popular: popular?,
    })
}

/// Spawns the background fetches and remembers what is already underway.
struct Tasks {
    client: MangaDexClient,
    tx: mpsc::UnboundedSender<BackgroundTask>,
    pending_covers: HashSet<String>,
    page_loader: Option<JoinHandle<()>>,
}

impl Tasks {
    fn new(client: MangaDexClient, tx: mpsc::UnboundedSender<BackgroundTask>) -> Self {
        Self {
            client,
            tx,
            pending_covers: HashSet::new(),
            page_loader: None,
        }
    }

    fn home(&self) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = load_home(&client).await;
            let _ = tx.send(BackgroundTask::HomeLoaded(result));
        });
    }

    fn covers(&mut self, mangas: &[CatalogItem], offset: usize, app: &App) {
        let uploads = &self.client.settings().uploads_base_url;
        for manga in mangas.iter().skip(offset).take(COVER_PRELOAD) {
            if app.image_states.contains_key(&manga.id) || self.pending_covers.contains(&manga.id) {
                continue;
            }
            let Some(cover_url) = manga.cover_url(uploads) else {
                continue;
            };
            self.pending_covers.insert(manga.id.clone());

            let manga_id = manga.id.clone();
            let client = self.client.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                match client.fetch_cover(&cover_url).await {
                    Ok(image) => {
                        let _ = tx.send(BackgroundTask::CoverLoaded { manga_id, image });
                    }
                    Err(e) => {
                        debug!("cover for {} failed: {}", manga_id, e);
                        let _ = tx.send(BackgroundTask::CoverFailed { manga_id });
                    }
                }
            });
        }
    }

    fn manga(&self, manga_id: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.get_by_id(&manga_id).await;
            let _ = tx.send(BackgroundTask::MangaLoaded { manga_id, result });
        });
    }

    fn chapters(&self, manga_id: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.chapter_feed(&manga_id).await;
            let _ = tx.send(BackgroundTask::ChaptersLoaded { manga_id, result });
        });
    }

    /// Chapter header and image server, fetched together.
    fn chapter(&mut self, chapter_id: String) {
        if let Some(loader) = self.page_loader.take() {
            loader.abort();
        }
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (header, server) =
                tokio::join!(client.chapter(&chapter_id), client.chapter_pages(&chapter_id));
            let header = header
                .map_err(|e| warn!("chapter header for {} unavailable: {}", chapter_id, e))
                .ok();
            let result = server.map(|server| (header, server));
            let _ = tx.send(BackgroundTask::ChapterOpened { chapter_id, result });
        });
    }

    fn page_images(&mut self, chapter_id: String, urls: Vec<String>) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        let loader = tokio::spawn(async move {
            futures::stream::iter(urls.into_iter().enumerate())
                .map(|(index, url)| {
                    let client = client.clone();
                    async move { (index, client.fetch_image(&url).await) }
                })
                .buffer_unordered(PAGE_IMAGE_CONCURRENCY)
                .for_each(|(index, result)| {
                    match result {
                        Ok(image) => {
                            let _ = tx.send(BackgroundTask::PageImageLoaded {
                                chapter_id: chapter_id.clone(),
                                index,
                                image,
                            });
                        }
                        Err(e) => warn!("page {} of {} failed: {}", index + 1, chapter_id, e),
                    }
                    futures::future::ready(())
                })
                .await;
        });
        self.page_loader = Some(loader);
    }

    fn search(&self, query: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.search(&query).await;
            let _ = tx.send(BackgroundTask::SearchResults { query, result });
        });
    }

    fn explore_page(&self, request: PageRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .list(request.offset, request.limit, &request.filters)
                .await;
            let _ = tx.send(BackgroundTask::ExplorePage { request, result });
        });
    }
}

fn preload_home_covers(app: &App, tasks: &mut Tasks) {
    tasks.covers(&app.home.latest, app.latest_offset, app);
    tasks.covers(&app.home.popular, app.popular_offset, app);
    if let Some(featured) = &app.home.featured {
        tasks.covers(std::slice::from_ref(featured), 0, app);
    }
}

fn open_in_browser(manga: &CatalogItem) {
    let url = title_url(&manga.id);
    if let Err(e) = webbrowser::open(&url) {
        warn!("could not open {}: {}", url, e);
    }
}

fn is_typing(app: &App) -> bool {
    app.view == View::Home && app.tab == Tab::Search && app.focus == Focus::Header
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    tasks: &mut Tasks,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        let now = Instant::now();
        if let Some(session) = app.reader.as_mut() {
            session.state.tick(now);
        }

        terminal.draw(|f| ui(f, app))?;

        if let Some(query) = app.search.due(now) {
            debug!("searching for {:?}", query);
            tasks.search(query);
        }

        if app.home_is_stale(now) {
            info!("home sections are stale, refreshing");
            app.home_loading = true;
            tasks.home();
        }

        tokio::select! {
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(50)) => {}

            Some(Ok(event)) = event_stream.next() => {
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !is_typing(app) {
                            if key.code == KeyCode::Char('q') {
                                return Ok(());
                            }
                            if key.code == KeyCode::Char('t') && app.view != View::Reader {
                                let kind = app.theme.cycle();
                                info!("theme changed to {:?}", kind);
                                continue;
                            }
                        }
                        if app.state == AppState::Loading {
                            continue;
                        }
                        match app.view {
                            View::Home => handle_browse_input(app, key.code, tasks),
                            View::Detail => handle_detail_input(app, key.code, tasks),
                            View::Reader => handle_reader_input(app, key.code, tasks),
                            View::Error => handle_error_input(app, key.code, tasks),
                        }
                    }
                    Event::Mouse(mouse) if mouse.kind == MouseEventKind::Moved => {
                        if let Some(session) = app.reader.as_mut() {
                            session.state.on_pointer_move(Instant::now());
                        }
                    }
                    _ => {}
                }
            }

            Some(task) = task_rx.recv() => handle_task(app, task, tasks),
        }
    }
}

fn handle_task(app: &mut App, task: BackgroundTask, tasks: &mut Tasks) {
    match task {
        BackgroundTask::HomeLoaded(result) => match result {
            Ok(feed) => {
                app.set_home(feed, Instant::now());
                preload_home_covers(app, tasks);
                if app.state == AppState::Loading {
                    app.set_ready();
                }
            }
            Err(e) => {
                error!("home sections failed: {}", e);
                app.home_loading = false;
                if app.home.latest.is_empty() && app.home.popular.is_empty() {
                    app.show_error(e.user_message(), Retry::Home);
                } else {
                    // Keep what we have and try again next window.
                    app.home_fetched = Some(Instant::now());
                }
            }
        },
        BackgroundTask::CoverLoaded { manga_id, image } => {
            app.add_cover_image(&manga_id, image);
            tasks.pending_covers.remove(&manga_id);
        }
        // Free the slot so the next scroll past it tries again.
        BackgroundTask::CoverFailed { manga_id } => {
            tasks.pending_covers.remove(&manga_id);
        }
        BackgroundTask::ExplorePage { request, result } => {
            match app.explore.pager.apply(&request, result) {
                Ok(Outcome::Merged { added }) => {
                    debug!("explore: {} new titles at offset {}", added, request.offset);
                    app.explore.last_error = None;
                    let selected = app.explore.selected();
                    tasks.covers(app.explore.pager.items(), selected, app);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("explore page at offset {} failed: {}", request.offset, e);
                    app.explore.last_error = Some(e.user_message());
                }
            }
        }
        BackgroundTask::SearchResults { query, result } => {
            let results = result.unwrap_or_else(|e| {
                warn!("search for {:?} failed: {}", query, e);
                Vec::new()
            });
            if app.search.apply_results(&query, results) {
                app.search_offset = 0;
                tasks.covers(&app.search.results, 0, app);
            }
        }
        BackgroundTask::MangaLoaded { manga_id, result } => match result {
            Ok(manga) => {
                app.set_ready();
                show_title(app, manga, tasks);
            }
            Err(e) => {
                error!("title {} failed: {}", manga_id, e);
                app.show_error(e.user_message(), Retry::Manga { manga_id });
            }
        },
        BackgroundTask::ChaptersLoaded { manga_id, result } => match result {
            Ok(chapters) => app.set_chapters(&manga_id, chapters),
            Err(e) => {
                error!("chapters for {} failed: {}", manga_id, e);
                app.set_chapters_failed(&manga_id, e.user_message());
            }
        },
        BackgroundTask::ChapterOpened { chapter_id, result } => match result {
            Ok((header, server)) => {
                let quality = Quality::from_data_saver(app.settings.data_saver);
                let pages = PageCollection::build(&server, quality, &app.settings.uploads_base_url);
                let urls = pages.urls().to_vec();
                if app.set_chapter_pages(&chapter_id, header, pages, Instant::now()) {
                    info!("chapter {}: {} pages", chapter_id, urls.len());
                    tasks.page_images(chapter_id, urls);
                }
            }
            Err(e) => {
                error!("chapter {} failed: {}", chapter_id, e);
                let current = app
                    .reader
                    .as_ref()
                    .is_some_and(|r| r.chapter_id == chapter_id);
                if current {
                    app.show_error(e.user_message(), Retry::Chapter { chapter_id });
                }
            }
        },
        BackgroundTask::PageImageLoaded {
            chapter_id,
            index,
            image,
        } => app.add_page_image(&chapter_id, index, image),
    }
}

/// List and search records lack the artist, so the detail view always
/// waits for the full record.
fn open_title(app: &mut App, manga_id: String, tasks: &Tasks) {
    app.set_loading("Loading title...");
    tasks.manga(manga_id);
}

fn show_title(app: &mut App, manga: CatalogItem, tasks: &mut Tasks) {
    let manga_id = manga.id.clone();
    tasks.covers(std::slice::from_ref(&manga), 0, app);
    app.open_manga(manga);
    tasks.chapters(manga_id);
}

fn open_chapter(app: &mut App, chapter_id: String, tasks: &mut Tasks) {
    if app.switch_chapter(chapter_id.clone(), Instant::now()) {
        tasks.chapter(chapter_id);
    }
}

fn request_explore_page(app: &mut App, tasks: &Tasks) {
    if let Some(request) = app.explore.pager.begin() {
        debug!("explore: requesting offset {}", request.offset);
        tasks.explore_page(request);
    }
}

fn enter_tab(app: &mut App, tab: Tab, tasks: &Tasks) {
    app.tab = tab;
    let pager = &app.explore.pager;
    if tab == Tab::Explore && pager.items().is_empty() && app.explore.last_error.is_none() {
        request_explore_page(app, tasks);
    }
}

fn handle_browse_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    match app.tab {
        Tab::Home => handle_home_tab_input(app, key, tasks),
        Tab::Explore => handle_explore_tab_input(app, key, tasks),
        Tab::Search => handle_search_tab_input(app, key, tasks),
    }
}

fn handle_home_tab_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    match key {
        KeyCode::Tab | KeyCode::Down => {
            app.focus = match app.focus {
                Focus::Header => Focus::Latest,
                Focus::Latest => Focus::Popular,
                Focus::Popular => Focus::Header,
            }
        }
        KeyCode::Up => {
            app.focus = match app.focus {
                Focus::Header => Focus::Popular,
                Focus::Latest => Focus::Header,
                Focus::Popular => Focus::Latest,
            }
        }
        KeyCode::Left => match app.focus {
            Focus::Header => enter_tab(app, app.tab.previous(), tasks),
            Focus::Latest => app.latest_offset = app.latest_offset.saturating_sub(1),
            Focus::Popular => app.popular_offset = app.popular_offset.saturating_sub(1),
        },
        KeyCode::Right => match app.focus {
            Focus::Header => enter_tab(app, app.tab.next(), tasks),
            Focus::Latest => {
                if app.latest_offset + 1 < app.home.latest.len() {
                    app.latest_offset += 1;
                }
                tasks.covers(&app.home.latest, app.latest_offset, app);
            }
            Focus::Popular => {
                if app.popular_offset + 1 < app.home.popular.len() {
                    app.popular_offset += 1;
                }
                tasks.covers(&app.home.popular, app.popular_offset, app);
            }
        },
        KeyCode::Enter | KeyCode::Char('o') => {
            let manga = match app.focus {
                Focus::Latest => app.home.latest.get(app.latest_offset).cloned(),
                Focus::Popular => app.home.popular.get(app.popular_offset).cloned(),
                Focus::Header => app.home.featured.clone(),
            };
            if let Some(manga) = manga {
                if key == KeyCode::Char('o') {
                    open_in_browser(&manga);
                } else {
                    open_title(app, manga.id, tasks);
                }
            }
        }
        _ => {}
    }
}

fn handle_explore_tab_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    if app.focus == Focus::Header {
        match key {
            KeyCode::Left => enter_tab(app, app.tab.previous(), tasks),
            KeyCode::Right => enter_tab(app, app.tab.next(), tasks),
            KeyCode::Tab | KeyCode::Down => {
                app.focus = Focus::Latest;
                app.explore.focus = ExploreFocus::Genres;
            }
            _ => {}
        }
        return;
    }

    let explore = &mut app.explore;
    match (explore.focus, key) {
        (_, KeyCode::Tab) => {
            explore.focus = match explore.focus {
                ExploreFocus::Genres => ExploreFocus::List,
                ExploreFocus::List => ExploreFocus::Genres,
            }
        }
        (_, KeyCode::Esc) | (ExploreFocus::Genres, KeyCode::Up) => app.focus = Focus::Header,
        (ExploreFocus::Genres, KeyCode::Left) => explore.genre_left(),
        (ExploreFocus::Genres, KeyCode::Right) => explore.genre_right(),
        (ExploreFocus::Genres, KeyCode::Down) => explore.focus = ExploreFocus::List,
        (ExploreFocus::Genres, KeyCode::Char(' ') | KeyCode::Enter) => {
            if explore.toggle_genre() {
                info!("explore genres: {:?}", explore.pager.filters().selected_genres());
                request_explore_page(app, tasks);
            }
        }
        (_, KeyCode::Char('s')) => {
            if explore.cycle_sort() {
                info!("explore sort: {}", explore.pager.filters().sort.label());
                request_explore_page(app, tasks);
            }
        }
        (_, KeyCode::Char('r')) => {
            explore.last_error = None;
            request_explore_page(app, tasks);
        }
        (ExploreFocus::List, KeyCode::Up) => {
            if explore.selected() == 0 {
                explore.focus = ExploreFocus::Genres;
            } else {
                explore.select_previous();
            }
        }
        (ExploreFocus::List, KeyCode::Down) => {
            explore.select_next();
            let selected = explore.selected();
            if explore.should_prefetch() {
                request_explore_page(app, tasks);
            }
            tasks.covers(app.explore.pager.items(), selected, app);
        }
        (ExploreFocus::List, KeyCode::Enter) => {
            if let Some(manga_id) = explore.selected_item().map(|m| m.id.clone()) {
                open_title(app, manga_id, tasks);
            }
        }
        (ExploreFocus::List, KeyCode::Char('o')) => {
            if let Some(manga) = explore.selected_item() {
                open_in_browser(manga);
            }
        }
        _ => {}
    }
}

fn handle_search_tab_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    let now = Instant::now();
    match key {
        KeyCode::Char(c) if app.focus == Focus::Header => app.search.push_char(c, now),
        KeyCode::Char('o') => {
            if let Some(manga) = app.search.results.get(app.search_offset) {
                open_in_browser(manga);
            }
        }
        KeyCode::Backspace if app.focus == Focus::Header => app.search.backspace(now),
        KeyCode::Enter => {
            if app.focus == Focus::Header {
                if let Some(query) = app.search.submit() {
                    tasks.search(query);
                }
            } else if let Some(manga) = app.search.results.get(app.search_offset) {
                let manga_id = manga.id.clone();
                open_title(app, manga_id, tasks);
            }
        }
        KeyCode::Left => {
            if app.focus == Focus::Header {
                enter_tab(app, app.tab.previous(), tasks);
            } else {
                app.search_offset = app.search_offset.saturating_sub(1);
            }
        }
        KeyCode::Right => {
            if app.focus == Focus::Header {
                enter_tab(app, app.tab.next(), tasks);
            } else if app.search_offset + 1 < app.search.results.len() {
                app.search_offset += 1;
                tasks.covers(&app.search.results, app.search_offset, app);
            }
        }
        KeyCode::Tab | KeyCode::Down => app.focus = Focus::Latest,
        KeyCode::Up => app.focus = Focus::Header,
        KeyCode::Esc => {
            if app.focus != Focus::Header {
                app.focus = Focus::Header;
            } else {
                app.search.clear();
            }
        }
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    let Some(detail) = app.detail.as_mut() else {
        app.go_home();
        return;
    };
    match key {
        KeyCode::Esc => app.go_back(),
        KeyCode::Up => detail.select_previous(),
        KeyCode::Down => detail.select_next(),
        KeyCode::Left => detail.previous_chapter_page(),
        KeyCode::Right => detail.next_chapter_page(),
        KeyCode::Char('o') => open_in_browser(&detail.manga),
        KeyCode::Enter => {
            if let Some(chapter_id) = detail.selected_chapter().map(|c| c.id.clone()) {
                open_chapter(app, chapter_id, tasks);
            }
        }
        _ => {}
    }
}

fn handle_reader_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    let now = Instant::now();
    let Some(session) = app.reader.as_mut() else {
        app.go_back();
        return;
    };
    session.state.on_pointer_move(now);

    let command = match key {
        KeyCode::Esc => {
            if session.state.sidebar_open() {
                session.state.close_sidebar(now);
            } else {
                app.go_back();
            }
            return;
        }
        KeyCode::Char('n') => {
            if let Some(next) = session.next_chapter().map(|c| c.id.clone()) {
                open_chapter(app, next, tasks);
            }
            return;
        }
        KeyCode::Char('p') => {
            if let Some(previous) = session.previous_chapter().map(|c| c.id.clone()) {
                open_chapter(app, previous, tasks);
            }
            return;
        }
        KeyCode::PageDown if session.state.mode() == ReadingMode::Vertical => {
            session.scroll_screen(true);
            return;
        }
        KeyCode::PageUp if session.state.mode() == ReadingMode::Vertical => {
            session.scroll_screen(false);
            return;
        }
        KeyCode::Left => Some(ReaderCommand::Previous),
        KeyCode::Right | KeyCode::PageDown => Some(ReaderCommand::Next),
        KeyCode::PageUp => Some(ReaderCommand::Previous),
        KeyCode::Up => Some(ReaderCommand::Up),
        KeyCode::Down => Some(ReaderCommand::Down),
        KeyCode::Char(c) => ReaderCommand::from_char(c),
        _ => None,
    };
    if let Some(command) = command {
        session.command(command, now);
    }
}

fn handle_error_input(app: &mut App, key: KeyCode, tasks: &mut Tasks) {
    match key {
        KeyCode::Char('r') => {
            let Some(retry) = app.error.take().map(|e| e.retry) else {
                return;
            };
            info!("retrying {:?}", retry);
            match retry {
                Retry::Home => {
                    app.go_home();
                    app.set_loading("Fetching latest updates and popular titles...");
                    app.home_loading = true;
                    tasks.home();
                }
                Retry::Manga { manga_id } => open_title(app, manga_id, tasks),
                Retry::Chapter { chapter_id } => open_chapter(app, chapter_id, tasks),
            }
        }
        KeyCode::Char('h') | KeyCode::Esc => {
            app.go_home();
            if app.home.latest.is_empty() && !app.home_loading {
                app.set_loading("Fetching latest updates and popular titles...");
                app.home_loading = true;
                tasks.home();
            }
        }
        _ => {}
    }
}
