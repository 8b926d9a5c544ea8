use std::path::{Path, PathBuf};

use url::Url;
use uuid::Uuid;

use crate::types::{CaptureRole, CrawlError};

pub const DEFAULT_OUTPUT_DIR: &str = "screenshots";
pub const DEFAULT_IMAGE_EXT: &str = "png";
pub const DEFAULT_INDEX_FILE: &str = "pagesnap-index.json";

/// Canonical form used for visited checks and stored source addresses:
/// fragment removed and trailing slash stripped. Query strings are kept.
pub fn normalize_url(url: &str) -> String {
    let serialized = match Url::parse(url) {
        Ok(mut u) => {
            // we remove the fragments (#)
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => url.split('#').next().unwrap_or(url).to_string(),
    };
    serialized.trim_end_matches('/').to_string()
}

pub fn is_navigable(url: &str) -> bool {
    match Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host().is_some(),
        Err(_) => false,
    }
}

pub fn parse_seed(seed: &str) -> Result<Url, CrawlError> {
    let u = Url::parse(seed).map_err(|e| CrawlError::InvalidSeed {
        url: seed.into(),
        reason: e.to_string(),
    })?;
    if !is_navigable(u.as_str()) {
        return Err(CrawlError::InvalidSeed {
            url: seed.into(),
            reason: "only absolute http(s) addresses can be crawled".into(),
        });
    }
    Ok(u)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Where the slice `sequence` of one page visit is written.
/// `{dir}/{crawl_id}_{capture_id}_{role}{sequence}.{ext}`
pub fn artifact_path(
    dir: &Path,
    crawl_id: &str,
    capture_id: &str,
    role: CaptureRole,
    sequence: u32,
    ext: &str,
) -> PathBuf {
    dir.join(format!(
        "{}_{}_{}{}.{}",
        crawl_id, capture_id, role, sequence, ext
    ))
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn remove_fragments_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/#hello"),
            "https://example.com"
        );
        assert_eq!(
            normalize_url("https://example.com/docs/"),
            "https://example.com/docs"
        );
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn query_strings_are_significant() {
        assert_ne!(
            normalize_url("https://example.com/p?a=1"),
            normalize_url("https://example.com/p?a=2")
        );
    }

    #[test]
    fn seed_must_be_http() {
        assert!(parse_seed("https://example.com").is_ok());
        assert!(parse_seed("example.com").is_err());
        assert!(parse_seed("mailto:someone@example.com").is_err());
        assert!(parse_seed("file:///etc/hosts").is_err());
    }

    #[test]
    fn artifact_paths_follow_convention() {
        let p = artifact_path(Path::new("out"), "k", "c", CaptureRole::Linked, 3, "png");
        assert_eq!(p, PathBuf::from("out/k_c_linked3.png"));
    }

    #[test]
    fn artifact_paths_never_collide_within_a_crawl() {
        let dir = Path::new("out");
        let mut seen = HashSet::new();
        for capture_id in [new_id(), new_id()] {
            for role in [CaptureRole::Seed, CaptureRole::Linked] {
                for seq in 1..=12 {
                    let p = artifact_path(dir, "crawl", &capture_id, role, seq, "png");
                    assert!(seen.insert(p));
                }
            }
        }
    }
}
