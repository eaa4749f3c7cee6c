//! Anime accent themes and the context object that owns the current choice.

use log::warn;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThemeKind {
    #[default]
    Default,
    Naruto,
    Bleach,
    OnePiece,
    Jjk,
    SoloLeveling,
    DemonSlayer,
    DragonBall,
}

impl ThemeKind {
    pub const ALL: [ThemeKind; 8] = [
        ThemeKind::Default,
        ThemeKind::Naruto,
        ThemeKind::Bleach,
        ThemeKind::OnePiece,
        ThemeKind::Jjk,
        ThemeKind::SoloLeveling,
        ThemeKind::DemonSlayer,
        ThemeKind::DragonBall,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn config(self) -> ThemeConfig {
        let (name, loading_variant, primary, secondary, text) = match self {
            ThemeKind::Default => ("Default", LoadingVariant::Default, None, None, None),
            ThemeKind::Naruto => ("Naruto", LoadingVariant::Chakra, Some("#FF6B00"), Some("#FFA500"), Some("#000000")),
            ThemeKind::Bleach => ("Bleach", LoadingVariant::Bankai, Some("#000000"), Some("#FFFFFF"), Some("#FFFFFF")),
            ThemeKind::OnePiece => ("One Piece", LoadingVariant::Gear, Some("#FF0000"), Some("#FFD700"), Some("#000000")),
            ThemeKind::Jjk => ("Jujutsu Kaisen", LoadingVariant::Domain, Some("#4B0082"), Some("#9370DB"), Some("#FFFFFF")),
            ThemeKind::SoloLeveling => ("Solo Leveling", LoadingVariant::Hunter, Some("#800080"), Some("#4B0082"), Some("#FFFFFF")),
            ThemeKind::DemonSlayer => ("Demon Slayer", LoadingVariant::Slice, Some("#FF1493"), Some("#4169E1"), Some("#FFFFFF")),
            ThemeKind::DragonBall => ("Dragon Ball", LoadingVariant::Dragon, Some("#FFA500"), Some("#4169E1"), Some("#000000")),
        };

        ThemeConfig {
            name,
            loading_variant,
            accent: Accent {
                primary: primary.and_then(hex_color).unwrap_or(Color::Cyan),
                secondary: secondary.and_then(hex_color).unwrap_or(Color::Yellow),
                text: text.and_then(hex_color).unwrap_or(Color::White),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingVariant {
    Default,
    Chakra,
    Bankai,
    Gear,
    Domain,
    Hunter,
    Dragon,
    Slice,
}

impl LoadingVariant {
    /// Spinner frames for the loading screen.
    pub fn frames(self) -> &'static [&'static str] {
        match self {
            LoadingVariant::Default => &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
            LoadingVariant::Chakra => &["◐", "◓", "◑", "◒"],
            LoadingVariant::Bankai => &["⚔", "†", "⚔", "‡"],
            LoadingVariant::Gear => &["⚙", "✲", "⚙", "✳"],
            LoadingVariant::Domain => &["◇", "◈", "◆", "◈"],
            LoadingVariant::Hunter => &["▖", "▘", "▝", "▗"],
            LoadingVariant::Dragon => &["✦", "✧", "★", "✧"],
            LoadingVariant::Slice => &["╱", "─", "╲", "│"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accent {
    pub primary: Color,
    pub secondary: Color,
    pub text: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeConfig {
    pub name: &'static str,
    pub loading_variant: LoadingVariant,
    pub accent: Accent,
}

fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTheme {
    #[serde(rename = "manga-reader-theme")]
    theme: Option<ThemeKind>,
}

/// Current theme plus where to persist it. Handed to whatever draws.
#[derive(Debug, Clone)]
pub struct ThemeContext {
    kind: ThemeKind,
    path: PathBuf,
}

impl ThemeContext {
    /// Starts from the persisted choice, or the default theme.
    pub fn load(path: PathBuf) -> Self {
        let kind = fs::read_to_string(&path)
            .ok()
            .and_then(|content| match serde_json::from_str::<StoredTheme>(&content) {
                Ok(stored) => stored.theme,
                Err(e) => {
                    warn!("ignoring stored theme {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        Self { kind, path }
    }

    pub fn kind(&self) -> ThemeKind {
        self.kind
    }

    pub fn config(&self) -> ThemeConfig {
        self.kind.config()
    }

    pub fn set(&mut self, kind: ThemeKind) {
        self.kind = kind;
        self.save();
    }

    pub fn cycle(&mut self) -> ThemeKind {
        self.set(self.kind.next());
        self.kind
    }

    fn save(&self) {
        let path = &self.path;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let stored = StoredTheme {
            theme: Some(self.kind),
        };
        match serde_json::to_string_pretty(&stored) {
            Ok(content) => {
                if let Err(e) = fs::write(path, content) {
                    warn!("could not save theme to {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("could not encode theme: {}", e),
        }
    }
}
