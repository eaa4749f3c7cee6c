use chrono::{DateTime, FixedOffset};
use reqwest::Url;
use serde::Deserialize;

use super::localize::{Localized, Lookup};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const NO_DESCRIPTION: &str = "No description available.";

// ---- wire format ----

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionResponse<T> {
    #[serde(default)]
    pub result: Option<String>,
    pub data: Vec<T>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntityResponse<T> {
    #[serde(default)]
    pub result: Option<String>,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<RelationshipData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default)]
    title: Localized,
    #[serde(default)]
    alt_titles: Vec<Localized>,
    #[serde(default)]
    description: Localized,
    status: Option<String>,
    year: Option<u32>,
    content_rating: Option<String>,
    #[serde(default)]
    tags: Vec<TagData>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    id: String,
    attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: Localized,
    #[serde(default)]
    group: String,
}

#[derive(Debug, Deserialize)]
struct RelationshipData {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
struct RelationshipAttributes {
    name: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    volume: Option<String>,
    chapter: Option<String>,
    title: Option<String>,
    #[serde(default)]
    translated_language: String,
    #[serde(default)]
    pages: usize,
    #[serde(default)]
    publish_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    updated_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AtHomeResponse {
    #[serde(default)]
    pub result: Option<String>,
    pub base_url: String,
    pub chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AtHomeChapter {
    pub hash: String,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub data_saver: Vec<String>,
}

// ---- domain records ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    Author,
    Artist,
    CoverArt,
    Other,
}

impl From<&str> for RelationshipKind {
    fn from(s: &str) -> Self {
        match s {
            "author" => Self::Author,
            "artist" => Self::Artist,
            "cover_art" => Self::CoverArt,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub kind: RelationshipKind,
    pub name: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: String,
    pub group: String,
    pub name: Localized,
}

/// One browsable title.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub title: Localized,
    pub alt_titles: Vec<Localized>,
    pub description: Localized,
    pub status: Option<String>,
    pub year: Option<u32>,
    pub content_rating: Option<String>,
    pub tags: Vec<Tag>,
    pub relationships: Vec<Relationship>,
}

impl From<MangaData> for CatalogItem {
    fn from(m: MangaData) -> Self {
        let tags = m
            .attributes
            .tags
            .into_iter()
            .map(|t| Tag {
                id: t.id,
                group: t.attributes.group,
                name: t.attributes.name,
            })
            .collect();

        let relationships = m
            .relationships
            .into_iter()
            .map(|r| {
                let (name, file_name) = match r.attributes {
                    Some(attrs) => (attrs.name, attrs.file_name),
                    None => (None, None),
                };
                Relationship {
                    id: r.id,
                    kind: RelationshipKind::from(r.rel_type.as_str()),
                    name,
                    file_name,
                }
            })
            .collect();

        CatalogItem {
            id: m.id,
            title: m.attributes.title,
            alt_titles: m.attributes.alt_titles,
            description: m.attributes.description,
            status: m.attributes.status,
            year: m.attributes.year,
            content_rating: m.attributes.content_rating,
            tags,
            relationships,
        }
    }
}

impl CatalogItem {
    /// Title map, then alt titles by priority, then the first alt title.
    pub fn title_lookup(&self, priority: &[&str]) -> Lookup<&str> {
        self.title
            .lookup(priority)
            .or_else(|| {
                self.alt_titles
                    .iter()
                    .map(|alt| alt.preferred(priority))
                    .find(Lookup::is_found)
                    .unwrap_or(Lookup::NotFound)
            })
            .or_else(|| {
                self.alt_titles
                    .first()
                    .map_or(Lookup::NotFound, Localized::first)
            })
    }

    pub fn display_title(&self, priority: &[&str]) -> String {
        self.title_lookup(priority).unwrap_or(UNKNOWN_TITLE).to_string()
    }

    pub fn display_description(&self, priority: &[&str]) -> String {
        self.description
            .lookup(priority)
            .unwrap_or(NO_DESCRIPTION)
            .to_string()
    }

    fn related_name(&self, kind: RelationshipKind) -> Option<&str> {
        self.relationships
            .iter()
            .find(|r| r.kind == kind)
            .and_then(|r| r.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn author_name(&self) -> &str {
        self.related_name(RelationshipKind::Author)
            .unwrap_or("Unknown Author")
    }

    pub fn artist_name(&self) -> &str {
        self.related_name(RelationshipKind::Artist)
            .unwrap_or("Unknown Artist")
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("Unknown")
    }

    pub fn genres(&self) -> String {
        let names: Vec<&str> = self
            .tags
            .iter()
            .filter(|t| t.group == "genre")
            .map(|t| {
                t.name
                    .get("en")
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| t.name.first().unwrap_or("Unknown"))
            })
            .collect();

        if names.is_empty() {
            "N/A".to_string()
        } else {
            names.join(", ")
        }
    }

    pub fn cover_url(&self, uploads_base: &str) -> Option<String> {
        if self.id.is_empty() {
            return None;
        }
        let file_name = self
            .relationships
            .iter()
            .find(|r| r.kind == RelationshipKind::CoverArt)
            .and_then(|r| r.file_name.as_deref())
            .filter(|f| !f.is_empty())?;
        Some(format!("{}/covers/{}/{}", uploads_base, self.id, file_name))
    }
}

/// One chapter from a title's feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterItem {
    pub id: String,
    pub volume: Option<String>,
    pub chapter: Option<String>,
    pub title: Option<String>,
    pub translated_language: String,
    pub pages: usize,
    pub publish_at: Option<DateTime<FixedOffset>>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl From<ChapterData> for ChapterItem {
    fn from(c: ChapterData) -> Self {
        ChapterItem {
            id: c.id,
            volume: c.attributes.volume,
            chapter: c.attributes.chapter,
            title: c.attributes.title,
            translated_language: c.attributes.translated_language,
            pages: c.attributes.pages,
            publish_at: c.attributes.publish_at,
            updated_at: c.attributes.updated_at,
        }
    }
}

impl ChapterItem {
    /// Chapter number for ordering; missing or unparsable counts as 0.
    pub fn number(&self) -> f64 {
        self.chapter
            .as_deref()
            .and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
    }

    pub fn label(&self) -> String {
        let mut label = String::new();
        if let Some(volume) = self.volume.as_deref().filter(|v| !v.is_empty()) {
            label.push_str(&format!("Vol. {} ", volume));
        }
        let chapter = self
            .chapter
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or("N/A");
        label.push_str(&format!("Chapter {}", chapter));
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            label.push_str(&format!(": {}", title));
        }
        label
    }
}

/// Where a chapter's images are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtHomeServer {
    pub base_url: String,
    pub hash: String,
    pub data: Vec<String>,
    pub data_saver: Vec<String>,
}

impl From<AtHomeResponse> for AtHomeServer {
    fn from(r: AtHomeResponse) -> Self {
        AtHomeServer {
            base_url: r.base_url,
            hash: r.chapter.hash,
            data: r.chapter.data,
            data_saver: r.chapter.data_saver,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Data,
    DataSaver,
}

impl Quality {
    pub fn from_data_saver(data_saver: bool) -> Self {
        if data_saver { Quality::DataSaver } else { Quality::Data }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Data => "data",
            Quality::DataSaver => "data-saver",
        }
    }
}

/// Absolute page image URLs for one chapter, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCollection {
    urls: Vec<String>,
}

impl PageCollection {
    pub fn build(server: &AtHomeServer, quality: Quality, fallback_host: &str) -> Self {
        let base = if server.base_url.starts_with("http") {
            server.base_url.as_str()
        } else {
            fallback_host
        };
        let filenames = match quality {
            Quality::Data => &server.data,
            Quality::DataSaver => &server.data_saver,
        };

        let urls = filenames
            .iter()
            .map(|filename| {
                let url = format!("{}/{}/{}/{}", base, quality.as_str(), server.hash, filename);
                if Url::parse(&url).is_ok() {
                    url
                } else {
                    log::warn!("invalid page url for {}, using default host", filename);
                    format!(
                        "{}/{}/{}/{}",
                        fallback_host,
                        quality.as_str(),
                        server.hash,
                        filename
                    )
                }
            })
            .collect();

        PageCollection { urls }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.urls.get(index).map(String::as_str)
    }
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub items: Vec<CatalogItem>,
    pub total: usize,
}
