use std::{path::Path, time::Duration};

use chrono::Utc;
use tokio::time::sleep;

use crate::{
    browser_controller::PageSession,
    types::{CaptureError, CaptureRecord, CaptureRole},
    utils::{artifact_path, new_id},
};

/// Number of viewport slices needed to cover `total`, never fewer than one.
pub fn page_count(total: u64, viewport: u64) -> Option<u64> {
    if viewport == 0 {
        return None;
    }
    Some(total.div_ceil(viewport).max(1))
}

/// Everything the paginator needs besides the session itself.
#[derive(Debug, Clone)]
pub struct PageTarget<'a> {
    pub crawl_id: &'a str,
    pub source_url: &'a str,
    pub role: CaptureRole,
    pub output_dir: &'a Path,
    pub image_ext: &'a str,
}

/// Captures the page currently loaded in `session`, top to bottom.
/// A scroll is always followed by `settle` before the next capture.
pub async fn paginate<S: PageSession + ?Sized>(
    session: &mut S,
    target: &PageTarget<'_>,
    settle: Duration,
) -> Result<Vec<CaptureRecord>, CaptureError> {
    let total = session.total_height().await?;
    let viewport = session.viewport_height().await?;
    let pages = match page_count(total, viewport) {
        Some(p) => p as u32,
        None => {
            return Err(CaptureError::DegenerateViewport {
                url: target.source_url.into(),
            })
        }
    };

    debug!(
        "paginating {} into {} slices (height {}, viewport {})",
        target.source_url, pages, total, viewport
    );

    // shared by every slice of this visit
    let capture_id = new_id();
    let mut records = Vec::with_capacity(pages as usize);

    for sequence in 1..=pages {
        let path = artifact_path(
            target.output_dir,
            target.crawl_id,
            &capture_id,
            target.role,
            sequence,
            target.image_ext,
        );
        session.capture_to(&path).await?;
        debug!("saved slice {}/{} of {} to {:?}", sequence, pages, target.source_url, path);

        records.push(CaptureRecord {
            capture_id: capture_id.clone(),
            crawl_id: target.crawl_id.into(),
            source_url: target.source_url.into(),
            role: target.role,
            sequence,
            artifact_path: path,
            captured_at: Utc::now(),
        });

        if sequence < pages {
            session.scroll_by(viewport).await?;
            sleep(settle).await;
        }
    }

    Ok(records)
}
