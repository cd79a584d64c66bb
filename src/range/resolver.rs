//! Number-to-index resolution over paginated lists
//!
//! Item numbers ascend strictly but with gaps, and page boundaries are
//! unrelated to number values, so resolution runs in two phases: a binary
//! search over pages followed by a binary search inside the chosen page.
//! Absent numbers always resolve to the nearest existing number below them.

use crate::range::{RangeError, RequestedRange};
use crate::transport::{Item, PagedList};

/// A requested range clamped to the numbers the list actually holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizedRange {
    pub start: u64,
    pub end: u64,

    /// Number of the first item in the list
    pub lowest: u64,

    /// Number of the last item in the list
    pub highest: u64,

    /// Whether either requested bound had to be moved
    pub clamped: bool,
}

/// A position inside a paged list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub index: usize,
    pub number: u64,
}

/// Concrete list indices for a requested range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start_index: usize,
    pub end_index: usize,
    pub start_number: u64,
    pub end_number: u64,
    pub clamped: bool,
}

impl ResolvedRange {
    /// Number of indices the range spans
    pub fn span(&self) -> usize {
        self.end_index - self.start_index + 1
    }
}

/// Clamps both bounds of `requested` into `[lowest, highest]`
///
/// Reads the first and last page of the list.
pub async fn sanitize<L>(list: &L, requested: RequestedRange) -> Result<SanitizedRange, RangeError>
where
    L: PagedList + ?Sized,
{
    if list.is_empty() {
        return Err(RangeError::NoItems);
    }

    let last_page_index = list.page_count() - 1;
    let last_page = list.page(last_page_index).await?;
    let highest = last_page.last().map(|i| i.number).ok_or(RangeError::NoItems)?;

    let lowest = if last_page_index == 0 {
        last_page.first().map(|i| i.number)
    } else {
        list.page(0).await?.first().map(|i| i.number)
    }
    .ok_or(RangeError::NoItems)?;

    let start = requested.start.max(lowest).min(highest);
    let end = requested.end.max(lowest).min(highest);

    Ok(SanitizedRange {
        start,
        end,
        lowest,
        highest,
        clamped: start != requested.start || end != requested.end,
    })
}

/// Resolves a requested number range to inclusive list indices
///
/// # Arguments
///
/// * `list` - A non-empty list sorted by ascending item number
/// * `requested` - Inclusive item-number bounds
///
/// # Returns
///
/// * `Ok(ResolvedRange)` - Indices of the nearest existing items at or below each bound
/// * `Err(RangeError::NoItems)` - The list is empty
/// * `Err(RangeError::Transport)` - A page could not be fetched
pub async fn resolve<L>(list: &L, requested: RequestedRange) -> Result<ResolvedRange, RangeError>
where
    L: PagedList + ?Sized,
{
    let sanitized = sanitize(list, requested).await?;
    let start = find_index(list, sanitized.start).await?;
    let end = find_index(list, sanitized.end).await?;

    Ok(ResolvedRange {
        start_index: start.index,
        end_index: end.index,
        start_number: start.number,
        end_number: end.number,
        clamped: sanitized.clamped,
    })
}

/// Finds the index of `target`, or of the nearest number below it
///
/// A target below every number resolves to index 0.
pub async fn find_index<L>(list: &L, target: u64) -> Result<Located, RangeError>
where
    L: PagedList + ?Sized,
{
    let (page_index, page) = find_page(list, target).await?;
    let in_page = find_in_page(&page, target);

    Ok(Located {
        index: in_page + page_index * list.page_len(),
        number: page[in_page].number,
    })
}

/// Binary search for the last page whose first number is `<= target`
///
/// Stops early on a page whose `[first, last]` contains the target.
async fn find_page<L>(list: &L, target: u64) -> Result<(usize, Vec<Item>), RangeError>
where
    L: PagedList + ?Sized,
{
    if list.is_empty() {
        return Err(RangeError::NoItems);
    }

    let mut low = 0;
    let mut high = list.page_count() - 1;
    let mut low_page: Option<Vec<Item>> = None;

    while low < high {
        let mid = low + (high - low + 1) / 2;
        let page = list.page(mid).await?;
        let (first, last) = match (page.first(), page.last()) {
            (Some(first), Some(last)) => (first.number, last.number),
            _ => return Err(RangeError::NoItems),
        };

        if target < first {
            high = mid - 1;
        } else if target <= last {
            return Ok((mid, page));
        } else {
            low = mid;
            low_page = Some(page);
        }
    }

    let page = match low_page {
        Some(page) => page,
        None => list.page(low).await?,
    };
    if page.is_empty() {
        return Err(RangeError::NoItems);
    }
    Ok((low, page))
}

/// Index of the last item numbered `<= target`, or 0 when every item is above it
fn find_in_page(page: &[Item], target: u64) -> usize {
    page.partition_point(|item| item.number <= target)
        .saturating_sub(1)
}
