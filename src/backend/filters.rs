//! Listing filters and how they turn into MangaDex query parameters.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    LatestUploadedChapter,
    FollowedCount,
    CreatedAt,
    Relevance,
    Title,
    Rating,
}

impl SortKey {
    /// Options offered by the explore view, in menu order.
    pub const MENU: [SortKey; 6] = [
        SortKey::LatestUploadedChapter,
        SortKey::FollowedCount,
        SortKey::CreatedAt,
        SortKey::Relevance,
        SortKey::Title,
        SortKey::Rating,
    ];

    pub fn api_name(self) -> &'static str {
        match self {
            SortKey::LatestUploadedChapter => "latestUploadedChapter",
            SortKey::FollowedCount => "followedCount",
            SortKey::CreatedAt => "createdAt",
            SortKey::Relevance => "relevance",
            SortKey::Title => "title",
            SortKey::Rating => "rating",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::LatestUploadedChapter => "Latest Updates",
            SortKey::FollowedCount => "Popular",
            SortKey::CreatedAt => "Recently Added",
            SortKey::Relevance => "Relevance",
            SortKey::Title => "Title (A-Z)",
            SortKey::Rating => "Top Rated",
        }
    }

    /// Titles read A-Z, everything else newest/biggest first.
    pub fn direction(self) -> &'static str {
        match self {
            SortKey::Title => "asc",
            _ => "desc",
        }
    }

    pub fn next_in_menu(self) -> SortKey {
        let idx = Self::MENU.iter().position(|k| *k == self).unwrap_or(0);
        Self::MENU[(idx + 1) % Self::MENU.len()]
    }
}

/// Genre name and MangaDex tag id.
pub const GENRES: [(&str, &str); 10] = [
    ("Action", "391b0423-d847-456f-aff0-8b0cfc03066b"),
    ("Adventure", "87cc87cd-a395-47af-b27a-93258283ef6c"),
    ("Comedy", "4d32cc48-9f00-4cca-9b5a-a839f0764984"),
    ("Drama", "b9af3a63-f058-46de-a9a0-e0c13906197a"),
    ("Fantasy", "cdc58593-87dd-415e-bbc0-2ec27bf404cc"),
    ("Horror", "cdad7e68-1419-41dd-bdce-27753074a640"),
    ("Mystery", "07251805-a27e-4d59-b488-f0bfbec15168"),
    ("Romance", "423e2eae-a7a2-4a8b-ac03-a8351462d71d"),
    ("Sci-Fi", "256c8bd9-4904-4360-bf4f-508a76d67183"),
    ("Slice of Life", "e5301a23-ebd9-49dd-a0cb-2add944c7fe9"),
];

/// Everything that decides which titles a listing returns and in what order.
/// A change to any field starts the listing over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListFilters {
    pub sort: SortKey,
    pub content_ratings: Vec<String>,
    pub included_tags: Vec<String>,
}

impl ListFilters {
    pub fn new(sort: SortKey, content_ratings: &[String]) -> Self {
        Self {
            sort,
            content_ratings: content_ratings.to_vec(),
            included_tags: Vec::new(),
        }
    }

    /// Adds the tag if absent, removes it otherwise.
    pub fn toggle_tag(&mut self, tag_id: &str) {
        if let Some(pos) = self.included_tags.iter().position(|t| t == tag_id) {
            self.included_tags.remove(pos);
        } else {
            self.included_tags.push(tag_id.to_string());
        }
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.included_tags.iter().any(|t| t == tag_id)
    }

    pub fn selected_genres(&self) -> Vec<&'static str> {
        GENRES
            .iter()
            .filter(|(_, id)| self.has_tag(id))
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn query(&self, offset: usize, limit: usize) -> Vec<(String, String)> {
        let mut params = vec![
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
            (
                format!("order[{}]", self.sort.api_name()),
                self.sort.direction().to_string(),
            ),
        ];
        for rating in &self.content_ratings {
            params.push(("contentRating[]".to_string(), rating.clone()));
        }
        for tag in &self.included_tags {
            params.push(("includedTags[]".to_string(), tag.clone()));
        }
        params.push(("includes[]".to_string(), "cover_art".to_string()));
        params.push(("includes[]".to_string(), "author".to_string()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre_tag_id(name: &str) -> Option<&'static str> {
        GENRES
            .iter()
            .find(|(g, _)| g.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

    fn ratings() -> Vec<String> {
        vec!["safe".to_string(), "suggestive".to_string()]
    }

    #[test]
    fn query_repeats_array_parameters() {
        let mut filters = ListFilters::new(SortKey::FollowedCount, &ratings());
        filters.toggle_tag(genre_tag_id("action").unwrap());

        let query = filters.query(40, 20);
        let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("limit", "20"),
                ("offset", "40"),
                ("order[followedCount]", "desc"),
                ("contentRating[]", "safe"),
                ("contentRating[]", "suggestive"),
                ("includedTags[]", "391b0423-d847-456f-aff0-8b0cfc03066b"),
                ("includes[]", "cover_art"),
                ("includes[]", "author"),
            ]
        );
    }

    #[test]
    fn title_sort_is_ascending() {
        let filters = ListFilters::new(SortKey::Title, &[]);
        assert!(filters.query(0, 1).contains(&("order[title]".to_string(), "asc".to_string())));
    }

    #[test]
    fn toggling_twice_restores_filters() {
        let mut filters = ListFilters::default();
        let before = filters.clone();
        filters.toggle_tag("x");
        assert_ne!(filters, before);
        filters.toggle_tag("x");
        assert_eq!(filters, before);
    }

    #[test]
    fn selected_genres_follow_menu_order() {
        let mut filters = ListFilters::default();
        filters.toggle_tag(genre_tag_id("Romance").unwrap());
        filters.toggle_tag(genre_tag_id("Comedy").unwrap());
        assert_eq!(filters.selected_genres(), vec!["Comedy", "Romance"]);
    }

    #[test]
    fn sort_menu_wraps() {
        assert_eq!(SortKey::Title.next_in_menu(), SortKey::Rating);
        assert_eq!(SortKey::Rating.next_in_menu(), SortKey::LatestUploadedChapter);
    }
}
