use super::models::ChapterItem;
use std::cmp::Ordering;

/// Chapters of one title: unique by id, highest chapter number first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterList {
    chapters: Vec<ChapterItem>,
}

impl ChapterList {
    /// Deduplicates a raw feed (the later `updated_at` wins and moves to the
    /// back) and sorts it by chapter number, descending. Ties keep feed order.
    pub fn from_feed(feed: impl IntoIterator<Item = ChapterItem>) -> Self {
        let mut chapters: Vec<ChapterItem> = Vec::new();
        for current in feed {
            match chapters.iter().position(|c| c.id == current.id) {
                Some(pos) if current.updated_at > chapters[pos].updated_at => {
                    chapters.remove(pos);
                    chapters.push(current);
                }
                Some(_) => {}
                None => chapters.push(current),
            }
        }

        chapters.sort_by(|a, b| b.number().partial_cmp(&a.number()).unwrap_or(Ordering::Equal));
        ChapterList { chapters }
    }

    pub fn as_slice(&self) -> &[ChapterItem] {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChapterItem> {
        self.chapters.get(index)
    }

    pub fn position(&self, chapter_id: &str) -> Option<usize> {
        self.chapters.iter().position(|c| c.id == chapter_id)
    }

    /// The chapter to read after `chapter_id`: the entry just before it in
    /// descending order.
    pub fn next_after(&self, chapter_id: &str) -> Option<&ChapterItem> {
        let pos = self.position(chapter_id)?;
        pos.checked_sub(1).and_then(|i| self.chapters.get(i))
    }

    pub fn previous_before(&self, chapter_id: &str) -> Option<&ChapterItem> {
        let pos = self.position(chapter_id)?;
        self.chapters.get(pos + 1)
    }

    pub fn page_count(&self, per_page: usize) -> usize {
        self.chapters.len().div_ceil(per_page.max(1))
    }

    /// Zero-based page of the list, `per_page` entries at a time.
    pub fn page(&self, page: usize, per_page: usize) -> &[ChapterItem] {
        let per_page = per_page.max(1);
        let start = (page * per_page).min(self.chapters.len());
        let end = (start + per_page).min(self.chapters.len());
        &self.chapters[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn chapter(id: &str, number: &str, updated: Option<&str>) -> ChapterItem {
        ChapterItem {
            id: id.to_string(),
            volume: None,
            chapter: Some(number.to_string()),
            title: None,
            translated_language: "en".to_string(),
            pages: 10,
            publish_at: None,
            updated_at: updated.map(|u| DateTime::parse_from_rfc3339(u).unwrap()),
        }
    }

    fn ids(list: &ChapterList) -> Vec<&str> {
        list.as_slice().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn later_update_wins_and_order_is_descending() {
        let mut newer = chapter("a", "1", Some("2024-05-01T00:00:00+00:00"));
        newer.title = Some("revised".to_string());
        let list = ChapterList::from_feed(vec![
            chapter("a", "1", None),
            chapter("b", "2", None),
            newer,
        ]);

        assert_eq!(ids(&list), vec!["b", "a"]);
        assert_eq!(list.get(1).unwrap().title.as_deref(), Some("revised"));
    }

    #[test]
    fn older_duplicate_is_dropped() {
        let list = ChapterList::from_feed(vec![
            chapter("a", "1", Some("2024-05-02T00:00:00+00:00")),
            chapter("a", "1", Some("2024-05-01T00:00:00+00:00")),
        ]);
        assert_eq!(list.len(), 1);
        assert_eq!(
            list.get(0).unwrap().updated_at,
            Some(DateTime::parse_from_rfc3339("2024-05-02T00:00:00+00:00").unwrap())
        );
    }

    #[test]
    fn fractional_and_missing_numbers_sort_numerically() {
        let mut unnumbered = chapter("x", "", None);
        unnumbered.chapter = None;
        let list = ChapterList::from_feed(vec![
            chapter("c10", "10", None),
            unnumbered,
            chapter("c2", "2", None),
            chapter("c2.5", "2.5", None),
        ]);
        assert_eq!(ids(&list), vec!["c10", "c2.5", "c2", "x"]);
    }

    #[test]
    fn next_chapter_is_the_preceding_entry() {
        let list = ChapterList::from_feed(vec![
            chapter("c1", "1", None),
            chapter("c2", "2", None),
            chapter("c3", "3", None),
        ]);
        assert_eq!(list.next_after("c2").map(|c| c.id.as_str()), Some("c3"));
        assert_eq!(list.previous_before("c2").map(|c| c.id.as_str()), Some("c1"));
        assert!(list.next_after("c3").is_none());
        assert!(list.previous_before("c1").is_none());
        assert!(list.next_after("missing").is_none());
    }

    #[test]
    fn pages_of_twenty() {
        let list = ChapterList::from_feed((1..=45).map(|n| chapter(&format!("c{n}"), &n.to_string(), None)));
        assert_eq!(list.page_count(20), 3);
        assert_eq!(list.page(0, 20).len(), 20);
        assert_eq!(list.page(2, 20).len(), 5);
        assert_eq!(list.page(2, 20)[0].id, "c5");
        assert!(list.page(9, 20).is_empty());
    }
}
