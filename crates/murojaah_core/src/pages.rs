//! crates/murojaah_core/src/pages.rs
//!
//! Page arithmetic over (juz, page-within-juz) coordinates.

use crate::domain::PagePosition;
use crate::error::LedgerError;

/// Number of pages counted per juz.
///
/// This is a fixed simplification shared by every part of the system. It does not
/// match any real print edition, where the page count varies from juz to juz.
pub const PAGES_PER_JUZ: i32 = 20;

/// Counts the pages spanned by `start..=end` using [`PAGES_PER_JUZ`].
pub fn total_pages(start: PagePosition, end: PagePosition) -> Result<i32, LedgerError> {
    total_pages_with(start, end, PAGES_PER_JUZ)
}

/// Counts the pages spanned by `start..=end` for a given page count per juz.
///
/// Both end points are inclusive. Fails with [`LedgerError::InvalidRange`] when `end`
/// precedes `start` (a smaller juz, or the same juz with a smaller page), or when the
/// span does not fit in an `i32`.
pub fn total_pages_with(
    start: PagePosition,
    end: PagePosition,
    pages_per_juz: i32,
) -> Result<i32, LedgerError> {
    if end < start {
        return Err(LedgerError::InvalidRange { start, end });
    }

    let (start_juz, start_page) = (i64::from(start.juz), i64::from(start.page));
    let (end_juz, end_page) = (i64::from(end.juz), i64::from(end.page));
    let pages_per_juz = i64::from(pages_per_juz);

    let pages = if start_juz == end_juz {
        Some(end_page - start_page + 1)
    } else {
        let rest_of_start_juz = pages_per_juz - start_page + 1;
        (end_juz - start_juz - 1)
            .checked_mul(pages_per_juz)
            .and_then(|full_juz_between| full_juz_between.checked_add(rest_of_start_juz))
            .and_then(|pages| pages.checked_add(end_page))
    };

    pages
        .and_then(|pages| i32::try_from(pages).ok())
        .ok_or(LedgerError::InvalidRange { start, end })
}
