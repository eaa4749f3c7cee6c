//! Chapter reader state: page position, layout modes and image load flags.

use std::time::{Duration, Instant};

pub const CONTROLS_HIDE_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingMode {
    #[default]
    Vertical,
    Horizontal,
    Single,
}

impl ReadingMode {
    pub fn label(self) -> &'static str {
        match self {
            ReadingMode::Vertical => "Vertical",
            ReadingMode::Horizontal => "Horizontal",
            ReadingMode::Single => "Single",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomMode {
    #[default]
    FitWidth,
    FitHeight,
    Actual,
}

impl ZoomMode {
    pub fn label(self) -> &'static str {
        match self {
            ZoomMode::FitWidth => "Fit Width",
            ZoomMode::FitHeight => "Fit Height",
            ZoomMode::Actual => "Actual",
        }
    }

    /// `+`: fit-height -> fit-width -> actual.
    pub fn zoomed_in(self) -> Self {
        match self {
            ZoomMode::FitHeight => ZoomMode::FitWidth,
            ZoomMode::FitWidth | ZoomMode::Actual => ZoomMode::Actual,
        }
    }

    /// `-`: actual -> fit-width -> fit-height.
    pub fn zoomed_out(self) -> Self {
        match self {
            ZoomMode::Actual => ZoomMode::FitWidth,
            ZoomMode::FitWidth | ZoomMode::FitHeight => ZoomMode::FitHeight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderCommand {
    Next,
    Previous,
    Up,
    Down,
    ToggleFullscreen,
    ToggleSidebar,
    SetMode(ReadingMode),
    SetZoom(ZoomMode),
    ZoomIn,
    ZoomOut,
}

impl ReaderCommand {
    /// Reader shortcuts: arrows or WASD, `f`, `m`, `1`-`3`, `+`/`=`, `-`.
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'a' => ReaderCommand::Previous,
            'd' => ReaderCommand::Next,
            'w' => ReaderCommand::Up,
            's' => ReaderCommand::Down,
            'f' => ReaderCommand::ToggleFullscreen,
            'm' => ReaderCommand::ToggleSidebar,
            '1' => ReaderCommand::SetMode(ReadingMode::Vertical),
            '2' => ReaderCommand::SetMode(ReadingMode::Horizontal),
            '3' => ReaderCommand::SetMode(ReadingMode::Single),
            '+' | '=' => ReaderCommand::ZoomIn,
            '-' => ReaderCommand::ZoomOut,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEffect {
    None,
    PageChanged(usize),
    /// Vertical mode: scroll the viewport by this many steps.
    Scroll(i32),
}

/// Hides reader controls after a stretch without pointer activity.
#[derive(Debug, Clone, Copy)]
pub struct ControlsTimer {
    visible: bool,
    last_activity: Instant,
}

impl ControlsTimer {
    pub fn new(now: Instant) -> Self {
        Self {
            visible: true,
            last_activity: now,
        }
    }

    pub fn on_pointer_move(&mut self, now: Instant) {
        self.visible = true;
        self.last_activity = now;
    }

    /// Never hides while the sidebar is open.
    pub fn tick(&mut self, now: Instant, sidebar_open: bool) {
        if sidebar_open || !self.visible {
            return;
        }
        if now.saturating_duration_since(self.last_activity) >= CONTROLS_HIDE_AFTER {
            self.visible = false;
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, Clone)]
pub struct ReaderState {
    current_page: usize,
    mode: ReadingMode,
    zoom: ZoomMode,
    loaded: Vec<bool>,
    sidebar_open: bool,
    fullscreen: bool,
    controls: ControlsTimer,
}

impl ReaderState {
    pub fn new(page_count: usize, now: Instant) -> Self {
        Self {
            current_page: 0,
            mode: ReadingMode::default(),
            zoom: ZoomMode::default(),
            loaded: vec![false; page_count],
            sidebar_open: false,
            fullscreen: false,
            controls: ControlsTimer::new(now),
        }
    }

    pub fn page_count(&self) -> usize {
        self.loaded.len()
    }

    /// `None` only for a chapter with no pages.
    pub fn current_page(&self) -> Option<usize> {
        (!self.loaded.is_empty()).then_some(self.current_page)
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn zoom(&self) -> ZoomMode {
        self.zoom
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn controls_visible(&self) -> bool {
        self.controls.visible()
    }

    fn last_index(&self) -> usize {
        self.loaded.len().saturating_sub(1)
    }

    pub fn is_last_page(&self) -> bool {
        !self.loaded.is_empty() && self.current_page == self.last_index()
    }

    fn step(&mut self, forward: bool) -> ReaderEffect {
        if self.mode == ReadingMode::Vertical || self.loaded.is_empty() {
            return ReaderEffect::None;
        }
        let target = if forward {
            (self.current_page + 1).min(self.last_index())
        } else {
            self.current_page.saturating_sub(1)
        };
        if target == self.current_page {
            return ReaderEffect::None;
        }
        self.current_page = target;
        ReaderEffect::PageChanged(target)
    }

    /// Ignored in vertical mode, where the page follows the viewport.
    pub fn next_page(&mut self) -> ReaderEffect {
        self.step(true)
    }

    pub fn previous_page(&mut self) -> ReaderEffect {
        self.step(false)
    }

    /// Jumps to `index`, clamped to the chapter.
    pub fn go_to(&mut self, index: usize) -> ReaderEffect {
        if self.loaded.is_empty() {
            return ReaderEffect::None;
        }
        let target = index.min(self.last_index());
        if target == self.current_page {
            return ReaderEffect::None;
        }
        self.current_page = target;
        ReaderEffect::PageChanged(target)
    }

    /// Vertical mode: the page element most in view.
    pub fn observe_visible(&mut self, index: usize) -> ReaderEffect {
        if self.mode != ReadingMode::Vertical {
            return ReaderEffect::None;
        }
        self.go_to(index)
    }

    pub fn set_mode(&mut self, mode: ReadingMode) {
        self.mode = mode;
    }

    pub fn set_zoom(&mut self, zoom: ZoomMode) {
        self.zoom = zoom;
    }

    pub fn zoom_in(&mut self) {
        self.zoom = self.zoom.zoomed_in();
    }

    pub fn zoom_out(&mut self) {
        self.zoom = self.zoom.zoomed_out();
    }

    pub fn toggle_sidebar(&mut self, now: Instant) {
        self.sidebar_open = !self.sidebar_open;
        self.controls.on_pointer_move(now);
    }

    pub fn close_sidebar(&mut self, now: Instant) {
        if self.sidebar_open {
            self.toggle_sidebar(now);
        }
    }

    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    pub fn on_pointer_move(&mut self, now: Instant) {
        self.controls.on_pointer_move(now);
    }

    pub fn tick(&mut self, now: Instant) {
        self.controls.tick(now, self.sidebar_open);
    }

    /// Returns false for an index outside the chapter.
    pub fn mark_loaded(&mut self, index: usize) -> bool {
        match self.loaded.get_mut(index) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.loaded.get(index).copied().unwrap_or(false)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.iter().filter(|l| **l).count()
    }

    /// Share of page images decoded, 0.0 to 1.0.
    pub fn load_progress(&self) -> f64 {
        if self.loaded.is_empty() {
            return 1.0;
        }
        self.loaded_count() as f64 / self.loaded.len() as f64
    }

    /// Position in the chapter, 0.0 on the first page and 1.0 on the last.
    pub fn read_progress(&self) -> f64 {
        match self.loaded.len() {
            0 | 1 => 1.0,
            n => self.current_page as f64 / (n - 1) as f64,
        }
    }

    pub fn handle(&mut self, command: ReaderCommand, now: Instant) -> ReaderEffect {
        match command {
            ReaderCommand::Next => self.next_page(),
            ReaderCommand::Previous => self.previous_page(),
            ReaderCommand::Up if self.mode == ReadingMode::Vertical => ReaderEffect::Scroll(-1),
            ReaderCommand::Down if self.mode == ReadingMode::Vertical => ReaderEffect::Scroll(1),
            ReaderCommand::Up => self.previous_page(),
            ReaderCommand::Down => self.next_page(),
            ReaderCommand::ToggleFullscreen => {
                self.toggle_fullscreen();
                ReaderEffect::None
            }
            ReaderCommand::ToggleSidebar => {
                self.toggle_sidebar(now);
                ReaderEffect::None
            }
            ReaderCommand::SetMode(mode) => {
                self.set_mode(mode);
                ReaderEffect::None
            }
            ReaderCommand::SetZoom(zoom) => {
                self.set_zoom(zoom);
                ReaderEffect::None
            }
            ReaderCommand::ZoomIn => {
                self.zoom_in();
                ReaderEffect::None
            }
            ReaderCommand::ZoomOut => {
                self.zoom_out();
                ReaderEffect::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paged(count: usize) -> ReaderState {
        let mut reader = ReaderState::new(count, Instant::now());
        reader.set_mode(ReadingMode::Horizontal);
        reader
    }

    #[test]
    fn page_index_stays_in_bounds() {
        let mut reader = paged(3);
        for _ in 0..10 {
            reader.next_page();
        }
        assert_eq!(reader.current_page(), Some(2));
        assert!(reader.is_last_page());
        assert_eq!(reader.next_page(), ReaderEffect::None);

        for _ in 0..10 {
            reader.previous_page();
        }
        assert_eq!(reader.current_page(), Some(0));
        assert_eq!(reader.go_to(99), ReaderEffect::PageChanged(2));
    }

    #[test]
    fn vertical_mode_follows_the_viewport() {
        let now = Instant::now();
        let mut reader = ReaderState::new(5, now);
        assert_eq!(reader.mode(), ReadingMode::Vertical);
        assert_eq!(reader.next_page(), ReaderEffect::None);
        assert_eq!(reader.handle(ReaderCommand::Down, now), ReaderEffect::Scroll(1));
        assert_eq!(reader.current_page(), Some(0));

        assert_eq!(reader.observe_visible(3), ReaderEffect::PageChanged(3));
        assert_eq!(reader.observe_visible(40), ReaderEffect::PageChanged(4));

        reader.set_mode(ReadingMode::Single);
        assert_eq!(reader.observe_visible(0), ReaderEffect::None);
        assert_eq!(reader.handle(ReaderCommand::Up, now), ReaderEffect::PageChanged(3));
    }

    #[test]
    fn switching_modes_keeps_load_flags() {
        let mut reader = paged(4);
        assert!(reader.mark_loaded(0));
        assert!(reader.mark_loaded(2));
        assert!(!reader.mark_loaded(9));
        assert_eq!(reader.load_progress(), 0.5);

        reader.set_mode(ReadingMode::Single);
        reader.set_mode(ReadingMode::Vertical);
        assert!(reader.is_loaded(0));
        assert!(reader.is_loaded(2));
        assert!(!reader.is_loaded(1));
        assert_eq!(reader.loaded_count(), 2);
    }

    #[test]
    fn empty_chapter_has_no_current_page() {
        let mut reader = paged(0);
        assert_eq!(reader.current_page(), None);
        assert_eq!(reader.next_page(), ReaderEffect::None);
        assert_eq!(reader.go_to(3), ReaderEffect::None);
        assert!(!reader.is_last_page());
        assert_eq!(reader.load_progress(), 1.0);
    }

    #[test]
    fn read_progress_spans_first_to_last() {
        let mut reader = paged(5);
        assert_eq!(reader.read_progress(), 0.0);
        reader.go_to(2);
        assert_eq!(reader.read_progress(), 0.5);
        assert_eq!(paged(1).read_progress(), 1.0);
    }

    #[test]
    fn zoom_steps_match_the_shortcuts() {
        let mut reader = paged(1);
        assert_eq!(reader.zoom(), ZoomMode::FitWidth);
        reader.zoom_in();
        assert_eq!(reader.zoom(), ZoomMode::Actual);
        reader.zoom_in();
        assert_eq!(reader.zoom(), ZoomMode::Actual);
        reader.zoom_out();
        reader.zoom_out();
        assert_eq!(reader.zoom(), ZoomMode::FitHeight);
        reader.zoom_out();
        assert_eq!(reader.zoom(), ZoomMode::FitHeight);
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(ReaderCommand::from_char('3'), Some(ReaderCommand::SetMode(ReadingMode::Single)));
        assert_eq!(ReaderCommand::from_char('='), Some(ReaderCommand::ZoomIn));
        assert_eq!(ReaderCommand::from_char('d'), Some(ReaderCommand::Next));
        assert_eq!(ReaderCommand::from_char('x'), None);
    }

    #[test]
    fn controls_hide_after_three_idle_seconds() {
        let start = Instant::now();
        let mut reader = ReaderState::new(2, start);

        reader.tick(start + Duration::from_millis(2900));
        assert!(reader.controls_visible());
        reader.tick(start + Duration::from_secs(3));
        assert!(!reader.controls_visible());

        let moved = start + Duration::from_secs(4);
        reader.on_pointer_move(moved);
        assert!(reader.controls_visible());
        reader.tick(moved + Duration::from_secs(2));
        assert!(reader.controls_visible());
    }

    #[test]
    fn open_sidebar_suspends_hiding() {
        let start = Instant::now();
        let mut reader = ReaderState::new(2, start);
        reader.toggle_sidebar(start);
        reader.tick(start + Duration::from_secs(60));
        assert!(reader.controls_visible());

        let closed = start + Duration::from_secs(61);
        reader.close_sidebar(closed);
        assert!(!reader.sidebar_open());
        reader.tick(closed + Duration::from_secs(1));
        assert!(reader.controls_visible());
        reader.tick(closed + Duration::from_secs(3));
        assert!(!reader.controls_visible());
    }
}
