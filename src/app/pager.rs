//! Offset-based incremental loading over a filtered catalog listing.

use log::debug;
use std::collections::HashSet;

use crate::backend::filters::ListFilters;
use crate::backend::models::{CatalogItem, ListPage};
use crate::error::Result;

/// One issued fetch. Carried to the background task and back so a response
/// can be matched against the pager state that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub offset: usize,
    pub limit: usize,
    pub filters: ListFilters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Merged a page; `added` counts items that were not already listed.
    Merged { added: usize },
    /// Nothing issued: a fetch is in flight or the listing is exhausted.
    Skipped,
    /// The response belonged to a listing that has since been reset.
    Stale,
}

pub struct Pager {
    filters: ListFilters,
    page_size: usize,
    items: Vec<CatalogItem>,
    seen: HashSet<String>,
    offset: usize,
    has_more: bool,
    in_flight: bool,
    generation: u64,
    total: Option<usize>,
}

impl Pager {
    pub fn new(filters: ListFilters, page_size: usize) -> Self {
        Self {
            filters,
            page_size: page_size.max(1),
            items: Vec::new(),
            seen: HashSet::new(),
            offset: 0,
            has_more: true,
            in_flight: false,
            generation: 0,
            total: None,
        }
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.seen.clear();
        self.offset = 0;
        self.has_more = true;
        self.in_flight = false;
        self.total = None;
        self.generation += 1;
    }

    /// Switches filters, starting over when they differ.
    pub fn set_filters(&mut self, filters: ListFilters) -> bool {
        if filters == self.filters {
            return false;
        }
        self.filters = filters;
        self.reset();
        true
    }

    pub fn filters(&self) -> &ListFilters {
        &self.filters
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Upstream total from the last merged page.
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// True when the item at `visible_index` is within `threshold` of the
    /// end of the list and another page could be requested.
    pub fn needs_more(&self, visible_index: usize, threshold: usize) -> bool {
        self.has_more && !self.in_flight && visible_index + threshold >= self.items.len()
    }

    /// Claims the in-flight slot and describes the fetch to make.
    pub fn begin(&mut self) -> Option<PageRequest> {
        if self.in_flight || !self.has_more {
            return None;
        }
        self.in_flight = true;
        Some(PageRequest {
            generation: self.generation,
            offset: self.offset,
            limit: self.page_size,
            filters: self.filters.clone(),
        })
    }

    fn is_current(&self, request: &PageRequest) -> bool {
        request.generation == self.generation
            && request.offset == self.offset
            && request.filters == self.filters
    }

    /// Folds a fetch result into the listing.
    ///
    /// The offset advances by the number of items the upstream returned, not
    /// by the number that survived deduplication, matching upstream paging.
    pub fn apply(&mut self, request: &PageRequest, result: Result<ListPage>) -> Result<Outcome> {
        if !self.is_current(request) {
            debug!(
                "discarding stale page (generation {}, offset {})",
                request.generation, request.offset
            );
            return Ok(Outcome::Stale);
        }
        self.in_flight = false;

        let page = result?;
        let raw = page.items.len();
        let mut added = 0;
        for item in page.items {
            if self.seen.insert(item.id.clone()) {
                self.items.push(item);
                added += 1;
            }
        }

        self.offset += raw;
        self.has_more = raw == request.limit;
        self.total = Some(page.total);
        Ok(Outcome::Merged { added })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::chapters::ChapterList;
    use crate::backend::mangadex::Catalog;
    use crate::backend::localize::Localized;
    use crate::backend::models::AtHomeServer;
    use crate::error::FetchError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn item(id: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            title: [("en", id)].into_iter().collect(),
            alt_titles: Vec::new(),
            description: Localized::new(),
            status: None,
            year: None,
            content_rating: None,
            tags: Vec::new(),
            relationships: Vec::new(),
        }
    }

    fn page(ids: &[&str]) -> Result<ListPage> {
        Ok(ListPage {
            items: ids.iter().map(|id| item(id)).collect(),
            total: 100,
        })
    }

    /// Serves canned pages in order and records each (offset, limit).
    #[derive(Default)]
    struct FakeCatalog {
        pages: Mutex<VecDeque<Result<ListPage>>>,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl FakeCatalog {
        fn with(pages: Vec<Result<ListPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<(usize, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Catalog for FakeCatalog {
        async fn search(&self, _title: &str) -> Result<Vec<CatalogItem>> {
            Ok(Vec::new())
        }

        async fn list(&self, offset: usize, limit: usize, _filters: &ListFilters) -> Result<ListPage> {
            self.calls.lock().unwrap().push((offset, limit));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| page(&[]))
        }

        async fn get_by_id(&self, id: &str) -> Result<CatalogItem> {
            Ok(item(id))
        }

        async fn chapter_feed(&self, _manga_id: &str) -> Result<ChapterList> {
            Ok(ChapterList::default())
        }

        async fn chapter_pages(&self, _chapter_id: &str) -> Result<AtHomeServer> {
            Err(FetchError::Malformed("no pages".into()))
        }
    }

    /// One full fetch-and-merge step, the way the explore view drives it.
    async fn load_next(pager: &mut Pager, catalog: &FakeCatalog) -> Result<Outcome> {
        let Some(request) = pager.begin() else {
            return Ok(Outcome::Skipped);
        };
        let result = catalog
            .list(request.offset, request.limit, &request.filters)
            .await;
        pager.apply(&request, result)
    }

    fn ids(pager: &Pager) -> Vec<&str> {
        pager.items().iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn overlapping_pages_never_duplicate() {
        let catalog = FakeCatalog::with(vec![page(&["a", "b", "c"]), page(&["c", "d", "a"])]);
        let mut pager = Pager::new(ListFilters::default(), 3);

        load_next(&mut pager, &catalog).await.unwrap();
        let outcome = load_next(&mut pager, &catalog).await.unwrap();

        assert_eq!(outcome, Outcome::Merged { added: 1 });
        assert_eq!(ids(&pager), vec!["a", "b", "c", "d"]);
        // Raw count, not unique count.
        assert_eq!(pager.offset(), 6);
        assert_eq!(catalog.calls(), vec![(0, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn short_page_ends_the_listing() {
        let catalog = FakeCatalog::with(vec![page(&["a", "b", "c"]), page(&["d"])]);
        let mut pager = Pager::new(ListFilters::default(), 3);

        load_next(&mut pager, &catalog).await.unwrap();
        assert!(pager.has_more());
        load_next(&mut pager, &catalog).await.unwrap();
        assert!(!pager.has_more());

        assert_eq!(load_next(&mut pager, &catalog).await.unwrap(), Outcome::Skipped);
        assert_eq!(catalog.calls().len(), 2);
        assert!(!pager.needs_more(3, 5));
    }

    #[tokio::test]
    async fn reset_then_load_reproduces_first_page() {
        let catalog = FakeCatalog::with(vec![
            page(&["a", "b", "a"]),
            page(&["c", "d", "e"]),
            page(&["a", "b", "a"]),
        ]);
        let mut pager = Pager::new(ListFilters::default(), 3);
        load_next(&mut pager, &catalog).await.unwrap();
        load_next(&mut pager, &catalog).await.unwrap();

        pager.reset();
        assert!(pager.items().is_empty());
        assert_eq!(pager.offset(), 0);
        assert!(pager.has_more());

        load_next(&mut pager, &catalog).await.unwrap();
        assert_eq!(ids(&pager), vec!["a", "b"]);
        assert_eq!(catalog.calls()[2], (0, 3));
    }

    #[tokio::test]
    async fn failure_only_clears_in_flight() {
        let catalog = FakeCatalog::with(vec![
            page(&["a", "b"]),
            Err(FetchError::Malformed("boom".into())),
        ]);
        let mut pager = Pager::new(ListFilters::default(), 2);
        load_next(&mut pager, &catalog).await.unwrap();

        let err = load_next(&mut pager, &catalog).await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert_eq!(ids(&pager), vec!["a", "b"]);
        assert_eq!(pager.offset(), 2);
        assert!(pager.has_more());
        assert!(!pager.in_flight());
    }

    #[test]
    fn only_one_fetch_in_flight() {
        let mut pager = Pager::new(ListFilters::default(), 20);
        let first = pager.begin();
        assert!(first.is_some());
        assert!(pager.begin().is_none());
        assert!(!pager.needs_more(0, 5));
    }

    #[test]
    fn responses_for_old_filters_are_discarded() {
        let mut pager = Pager::new(ListFilters::default(), 2);
        let old = pager.begin().unwrap();

        let mut filters = ListFilters::default();
        filters.toggle_tag("romance");
        assert!(pager.set_filters(filters.clone()));
        let fresh = pager.begin().unwrap();

        assert_eq!(pager.apply(&old, page(&["x", "y"])).unwrap(), Outcome::Stale);
        assert!(pager.items().is_empty());
        assert!(pager.in_flight());

        assert_eq!(
            pager.apply(&fresh, page(&["r1", "r2"])).unwrap(),
            Outcome::Merged { added: 2 }
        );
        assert_eq!(ids(&pager), vec!["r1", "r2"]);
        assert_eq!(pager.total(), Some(100));
        assert!(!pager.set_filters(filters));
    }

    #[test]
    fn near_the_end_asks_for_more() {
        let mut pager = Pager::new(ListFilters::default(), 2);
        let request = pager.begin().unwrap();
        pager.apply(&request, page(&["a", "b"])).unwrap();
        assert!(!pager.needs_more(0, 1));
        assert!(pager.needs_more(1, 1));
    }
}
