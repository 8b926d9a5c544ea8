use std::collections::HashSet;

use crate::{
    browser_controller::PageSession,
    utils::{is_navigable, normalize_url},
};

/// Addresses already captured or attempted during one crawl.
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn seeded(seed: &str) -> Self {
        let mut v = VisitedSet::default();
        v.insert(seed);
        v
    }

    /// Returns false when the address was already present.
    pub fn insert(&mut self, url: &str) -> bool {
        self.urls.insert(normalize_url(url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(&normalize_url(url))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Anchor targets of the loaded page not yet visited, in DOM order.
/// Extraction failures are logged and yield no candidates.
pub async fn candidates<S: PageSession + ?Sized>(
    session: &mut S,
    visited: &VisitedSet,
) -> Vec<String> {
    let links = match session.extract_links().await {
        Ok(links) => links,
        Err(e) => {
            warn!("treating page as having no links: {}", e);
            return vec![];
        }
    };
    filter_candidates(links, visited)
}

pub fn filter_candidates(links: Vec<String>, visited: &VisitedSet) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|l| is_navigable(l))
        .filter(|l| !visited.contains(l))
        .filter(|l| seen.insert(normalize_url(l)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn seed_is_filtered_even_with_trailing_slash() {
        let visited = VisitedSet::seeded("https://example.com");
        let out = filter_candidates(
            vec![
                "https://example.com/".into(),
                "https://example.com/#top".into(),
                "https://example.com/a".into(),
            ],
            &visited,
        );
        assert_eq!(out, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn keeps_dom_order_and_drops_duplicates() {
        let visited = VisitedSet::seeded("https://example.com");
        let out = filter_candidates(
            vec![
                "https://example.com/c".into(),
                "https://example.com/a".into(),
                "https://example.com/c/".into(),
                "https://example.com/b".into(),
            ],
            &visited,
        );
        assert_eq!(
            out,
            vec![
                "https://example.com/c".to_string(),
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
            ]
        );
    }

    #[test]
    fn skips_non_navigable_schemes() {
        let visited = VisitedSet::default();
        let out = filter_candidates(
            vec![
                "mailto:hi@example.com".into(),
                "javascript:void(0)".into(),
                "https://example.com/ok".into(),
            ],
            &visited,
        );
        assert_eq!(out, vec!["https://example.com/ok".to_string()]);
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut visited = VisitedSet::seeded("https://example.com/");
        assert!(!visited.insert("https://example.com"));
        assert!(visited.insert("https://example.com/?page=2"));
        assert_eq!(visited.len(), 2);
    }
}
