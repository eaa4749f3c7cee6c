use image::DynamicImage;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;

use super::chapters::ChapterList;
use super::filters::{ListFilters, SortKey};
use super::models::{
    AtHomeResponse, AtHomeServer, CatalogItem, ChapterData, ChapterItem, CollectionResponse,
    EntityResponse, ListPage, MangaData,
};
use super::retry;
use crate::config::Settings;
use crate::error::{validate_id, FetchError, Result};

const FEED_PAGE_SIZE: usize = 100;

/// What the rest of the app needs from a manga catalog.
pub trait Catalog {
    fn search(&self, title: &str) -> impl Future<Output = Result<Vec<CatalogItem>>> + Send;

    fn list(
        &self,
        offset: usize,
        limit: usize,
        filters: &ListFilters,
    ) -> impl Future<Output = Result<ListPage>> + Send;

    fn get_by_id(&self, id: &str) -> impl Future<Output = Result<CatalogItem>> + Send;

    fn chapter_feed(&self, manga_id: &str) -> impl Future<Output = Result<ChapterList>> + Send;

    fn chapter_pages(&self, chapter_id: &str) -> impl Future<Output = Result<AtHomeServer>> + Send;
}

#[derive(Clone)]
pub struct MangaDexClient {
    http: reqwest::Client,
    settings: Arc<Settings>,
}

type Query = Vec<(String, String)>;

fn pair(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn check_envelope(result: Option<&str>, url: &str) -> Result<()> {
    match result {
        Some(result) if result != "ok" => Err(FetchError::Malformed(format!(
            "{} envelope from {}",
            result, url
        ))),
        _ => Ok(()),
    }
}

impl MangaDexClient {
    pub fn new(settings: Arc<Settings>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T> {
        let url = format!("{}{}", self.settings.api_base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: response.url().to_string(),
            });
        }
        Ok(response.json().await?)
    }

    async fn manga_list(&self, query: &Query) -> Result<ListPage> {
        let response: CollectionResponse<MangaData> = self.get_json("/manga", query).await?;
        check_envelope(response.result.as_deref(), "/manga")?;
        Ok(ListPage {
            items: response.data.into_iter().map(CatalogItem::from).collect(),
            total: response.total,
        })
    }

    fn content_rating_pairs(&self, query: &mut Query) {
        for rating in &self.settings.content_ratings {
            query.push(pair("contentRating[]", rating));
        }
    }

    /// Titles ordered by `sort`, first `limit` only.
    pub async fn top(&self, sort: SortKey, limit: usize) -> Result<Vec<CatalogItem>> {
        let filters = ListFilters::new(sort, &self.settings.content_ratings);
        Ok(self.list(0, limit, &filters).await?.items)
    }

    pub async fn latest_updates(&self, limit: usize) -> Result<Vec<CatalogItem>> {
        self.top(SortKey::LatestUploadedChapter, limit).await
    }

    pub async fn popular(&self, limit: usize) -> Result<Vec<CatalogItem>> {
        self.top(SortKey::FollowedCount, limit).await
    }

    /// Most followed safe title, for the banner.
    pub async fn featured(&self) -> Result<Option<CatalogItem>> {
        let filters = ListFilters::new(SortKey::FollowedCount, &["safe".to_string()]);
        Ok(self.list(0, 1, &filters).await?.items.into_iter().next())
    }

    /// Chapter header (number, title, volume) for the reader.
    pub async fn chapter(&self, chapter_id: &str) -> Result<ChapterItem> {
        let chapter_id = validate_id(chapter_id)?;
        let query = vec![pair("includes[]", "scanlation_group")];
        let response: EntityResponse<ChapterData> = self
            .get_json(&format!("/chapter/{}", chapter_id), &query)
            .await?;
        check_envelope(response.result.as_deref(), "/chapter")?;
        Ok(ChapterItem::from(response.data))
    }

    async fn at_home(&self, chapter_id: &str) -> Result<AtHomeServer> {
        let response: AtHomeResponse = self
            .get_json(&format!("/at-home/server/{}", chapter_id), &Vec::new())
            .await?;
        check_envelope(response.result.as_deref(), "/at-home/server")?;
        Ok(AtHomeServer::from(response))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let bytes = self.fetch_bytes(url).await?;
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FetchError::Malformed(format!("{}: {}", url, e)))?
            .decode()
            .map_err(|e| FetchError::Malformed(format!("{}: {}", url, e)))
    }

    // Thumbnail size (256px) keeps cards fast.
    pub async fn fetch_cover(&self, cover_url: &str) -> Result<DynamicImage> {
        self.fetch_image(&format!("{}.256.jpg", cover_url)).await
    }
}

impl Catalog for MangaDexClient {
    async fn search(&self, title: &str) -> Result<Vec<CatalogItem>> {
        let title = title.trim();
        if title.chars().count() < self.settings.search_min_chars {
            return Ok(Vec::new());
        }

        let mut query = vec![
            pair("limit", self.settings.search_limit),
            pair("title", title),
        ];
        self.content_rating_pairs(&mut query);
        query.push(pair("includes[]", "cover_art"));
        query.push(pair("includes[]", "author"));
        query.push(pair("order[relevance]", "desc"));

        Ok(self.manga_list(&query).await?.items)
    }

    async fn list(&self, offset: usize, limit: usize, filters: &ListFilters) -> Result<ListPage> {
        self.manga_list(&filters.query(offset, limit)).await
    }

    async fn get_by_id(&self, id: &str) -> Result<CatalogItem> {
        let id = validate_id(id)?;
        let query = vec![
            pair("includes[]", "cover_art"),
            pair("includes[]", "author"),
            pair("includes[]", "artist"),
        ];
        let response: EntityResponse<MangaData> =
            self.get_json(&format!("/manga/{}", id), &query).await?;
        check_envelope(response.result.as_deref(), "/manga/{id}")?;
        Ok(CatalogItem::from(response.data))
    }

    async fn chapter_feed(&self, manga_id: &str) -> Result<ChapterList> {
        let manga_id = validate_id(manga_id)?;
        let path = format!("/manga/{}/feed", manga_id);
        let mut all: Vec<ChapterItem> = Vec::new();
        let mut offset = 0;

        loop {
            let query = vec![
                pair("limit", FEED_PAGE_SIZE),
                pair("offset", offset),
                pair("translatedLanguage[]", &self.settings.translated_language),
                pair("order[volume]", "desc"),
                pair("order[chapter]", "desc"),
                pair("includes[]", "scanlation_group"),
            ];
            let response: CollectionResponse<ChapterData> = self.get_json(&path, &query).await?;
            check_envelope(response.result.as_deref(), &path)?;

            let fetched = response.data.len();
            all.extend(response.data.into_iter().map(ChapterItem::from));
            debug!(
                "feed {}: fetched {} chapters, {} of {}",
                manga_id,
                fetched,
                all.len(),
                response.total
            );

            offset += FEED_PAGE_SIZE;
            if fetched < FEED_PAGE_SIZE || offset >= response.total {
                break;
            }
        }

        info!("loaded {} chapters for {}", all.len(), manga_id);
        Ok(ChapterList::from_feed(all))
    }

    async fn chapter_pages(&self, chapter_id: &str) -> Result<AtHomeServer> {
        let chapter_id = validate_id(chapter_id)?;
        retry::with_backoff(
            &format!("chapter {}", chapter_id),
            self.settings.retry_attempts,
            self.settings.retry_base_delay(),
            || self.at_home(chapter_id),
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn client() -> MangaDexClient {
        MangaDexClient::new(Arc::new(Settings::default())).unwrap()
    }

    /// Loopback API answering each request with `reply(target)` as a 200
    /// JSON body. Request targets are reported in arrival order.
    pub(crate) async fn fake_api<F>(reply: F) -> (String, mpsc::UnboundedReceiver<String>)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let reply = Arc::new(reply);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let reply = reply.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = stream.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        head.extend_from_slice(&chunk[..n]);
                    }
                    let target = String::from_utf8_lossy(&head)
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or_default()
                        .to_string();
                    let body = reply(&target);
                    let _ = tx.send(target);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    let _ = stream.shutdown().await;
                });
            }
        });
        (format!("http://{}", addr), rx)
    }

    fn chapter(id: &str, number: usize, title: &str, updated: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "chapter",
            "attributes": {
                "chapter": number.to_string(),
                "title": title,
                "translatedLanguage": "en",
                "pages": 12,
                "updatedAt": updated
            }
        })
    }

    #[tokio::test]
    async fn chapter_feed_pages_until_a_short_page() {
        let (api, mut requests) = fake_api(|target| {
            let data: Vec<_> = if target.contains("&offset=0&") {
                (0..100)
                    .map(|n| chapter(&format!("c{}", n), n, "first", "2024-05-01T00:00:00+00:00"))
                    .collect()
            } else {
                vec![
                    chapter("c5", 5, "revised", "2024-05-02T00:00:00+00:00"),
                    chapter("c100", 100, "newest", "2024-05-02T00:00:00+00:00"),
                ]
            };
            json!({"result": "ok", "data": data, "total": 102}).to_string()
        })
        .await;
        let settings = Settings {
            api_base_url: api,
            ..Settings::default()
        };
        let client = MangaDexClient::new(Arc::new(settings)).unwrap();

        let list = client.chapter_feed("m1").await.unwrap();
        assert_eq!(list.len(), 101);
        assert_eq!(list.get(0).unwrap().id, "c100");
        let revised = list.get(list.position("c5").unwrap()).unwrap();
        assert_eq!(revised.title.as_deref(), Some("revised"));

        let first = requests.recv().await.unwrap();
        let second = requests.recv().await.unwrap();
        assert!(first.starts_with("/manga/m1/feed?limit=100&offset=0&"), "{}", first);
        assert!(second.starts_with("/manga/m1/feed?limit=100&offset=100&"), "{}", second);
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn short_search_skips_the_network() {
        let results = client().search(" a ").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn path_like_ids_never_reach_the_network() {
        let client = client();
        assert!(matches!(client.get_by_id("favicon.ico").await, Err(FetchError::InvalidId(_))));
        assert!(matches!(client.chapter_feed("a/b").await, Err(FetchError::InvalidId(_))));
        assert!(matches!(client.chapter_pages("x.png").await, Err(FetchError::InvalidId(_))));
        assert!(matches!(client.chapter("").await, Err(FetchError::InvalidId(_))));
    }

    #[test]
    fn error_envelope_is_malformed() {
        assert!(check_envelope(Some("ok"), "/manga").is_ok());
        assert!(check_envelope(None, "/manga").is_ok());
        assert!(matches!(check_envelope(Some("error"), "/manga"), Err(FetchError::Malformed(_))));
        assert!(matches!(check_envelope(Some("ko"), "/manga"), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn decodes_a_list_envelope() {
        let response: CollectionResponse<MangaData> = serde_json::from_str(
            r#"{"result": "ok", "limit": 1, "offset": 0, "total": 321,
                "data": [{"id": "m1", "attributes": {"title": {"en": "One"}}, "relationships": []}]}"#,
        )
        .unwrap();
        assert_eq!(response.total, 321);
        let item = CatalogItem::from(response.data.into_iter().next().unwrap());
        assert_eq!(item.display_title(&["en"]), "One");
    }

    #[test]
    fn decodes_an_at_home_envelope() {
        let response: AtHomeResponse = serde_json::from_str(
            r#"{"result": "ok", "baseUrl": "https://node.example.org",
                "chapter": {"hash": "h", "data": ["a.png"], "dataSaver": ["a.jpg"]}}"#,
        )
        .unwrap();
        let server = AtHomeServer::from(response);
        assert_eq!(server.base_url, "https://node.example.org");
        assert_eq!(server.data, vec!["a.png"]);
        assert_eq!(server.data_saver, vec!["a.jpg"]);
    }
}
