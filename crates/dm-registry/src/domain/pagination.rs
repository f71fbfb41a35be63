//! # Public Listing Pagination
//!
//! Pages over the ascending-id subsequence of publicly listed datasets.
//!
//! Each call walks the whole registry: O(n) per page. There is no secondary
//! index of public ids, so nothing can drift out of sync with the records.
//! Cursors are positions in the public subsequence, not dataset ids, and stay
//! valid because records are never deleted and flags never change.

use crate::domain::entities::{Dataset, PublicPage};

/// Number of publicly listed datasets.
#[must_use]
pub fn public_count(datasets: &[Dataset]) -> u64 {
    datasets.iter().filter(|d| d.is_publicly_listed()).count() as u64
}

/// Return up to `limit` public datasets starting at position `start`.
///
/// - `start >= total`: empty page, `next_start = None`.
/// - `limit == 0`: empty page, `next_start = Some(start)`.
/// - otherwise `next_start` is the position after the last returned entry,
///   or `None` when that reaches the end of the public subsequence.
#[must_use]
pub fn public_page(datasets: &[Dataset], start: u64, limit: u64) -> PublicPage {
    let total = public_count(datasets);
    if start >= total {
        return PublicPage::exhausted();
    }

    let end = start.saturating_add(limit).min(total);
    let page = datasets
        .iter()
        .filter(|d| d.is_publicly_listed())
        .zip(0u64..)
        .skip_while(|(_, position)| *position < start)
        .take_while(|(_, position)| *position < end)
        .map(|(dataset, _)| dataset.clone())
        .collect();

    PublicPage {
        datasets: page,
        next_start: (end < total).then_some(end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Address, Cid, U256};

    /// Builds datasets where `pattern[i]` says whether id `i` is public.
    fn datasets(pattern: &[bool]) -> Vec<Dataset> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, public)| Dataset {
                id: i as u64,
                dataset_cid: Cid::new(format!("cid-{i}")),
                analysis_cid: Cid::new("analysis"),
                uploader: Address::repeat_byte(1),
                is_public: *public,
                is_private: !*public,
                created_at: 0,
                views: 0,
                downloads: 0,
                is_paid: false,
                price: U256::zero(),
                earnings: U256::zero(),
            })
            .collect()
    }

    #[test]
    fn test_first_page_skips_private() {
        let all = datasets(&[true, false, true, true, false, true]);
        let page = public_page(&all, 0, 2);
        assert_eq!(page.ids(), vec![0, 2]);
        assert_eq!(page.next_start, Some(2));

        let page = public_page(&all, 2, 2);
        assert_eq!(page.ids(), vec![3, 5]);
        assert_eq!(page.next_start, None);
    }

    #[test]
    fn test_start_past_end_is_exhausted() {
        let all = datasets(&[true, true]);
        assert_eq!(public_page(&all, 2, 10), PublicPage::exhausted());
        assert_eq!(public_page(&all, u64::MAX, 10), PublicPage::exhausted());
        assert_eq!(public_page(&[], 0, 10), PublicPage::exhausted());
    }

    #[test]
    fn test_zero_limit_keeps_cursor() {
        let all = datasets(&[true, true, true]);
        let page = public_page(&all, 1, 0);
        assert!(page.datasets.is_empty());
        assert_eq!(page.next_start, Some(1));
    }

    #[test]
    fn test_huge_limit_does_not_overflow() {
        let all = datasets(&[false, true, true]);
        let page = public_page(&all, 1, u64::MAX);
        assert_eq!(page.ids(), vec![2]);
        assert!(page.is_last());
    }

    #[test]
    fn test_public_count() {
        assert_eq!(public_count(&datasets(&[true, false, true])), 2);
    }
}
