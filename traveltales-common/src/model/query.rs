use crate::model::user::Username;
use serde::Deserialize;
use std::num::NonZeroU32;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// 1-based offset pagination. A full page (result length == limit) is the
/// client's has-more signal; there is no total-count query.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize)]
pub struct Page {
    #[serde(default = "Page::first")]
    pub page: NonZeroU32,
    #[serde(default = "Page::default_limit")]
    pub limit: NonZeroU32,
}

impl Page {
    #[must_use]
    pub fn new(page: NonZeroU32, limit: NonZeroU32) -> Self {
        Self { page, limit }
    }

    fn first() -> NonZeroU32 {
        NonZeroU32::MIN
    }

    fn default_limit() -> NonZeroU32 {
        const { NonZeroU32::new(DEFAULT_PAGE_LIMIT).unwrap() }
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.page.get() - 1).saturating_mul(i64::from(self.limit.get()))
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.limit.get())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: Self::first(),
            limit: Self::default_limit(),
        }
    }
}

/// Sort axis for post listings. Keys match the `sortBy` query parameter.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostSort {
    #[default]
    Newest,
    MostLiked,
    MostCommented,
}

/// Filter axis for post listings. `Country` and `Author` are mutually
/// exclusive; country wins when a request supplies both.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum PostFilter {
    #[default]
    All,
    Country(String),
    Author(Username),
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PAGE_LIMIT, Page, PostSort};
    use std::num::NonZeroU32;

    fn page(page: u32, limit: u32) -> Page {
        Page::new(
            NonZeroU32::new(page).unwrap(),
            NonZeroU32::new(limit).unwrap(),
        )
    }

    #[test]
    fn offset_arithmetic() {
        assert_eq!(page(1, 10).offset(), 0);
        assert_eq!(page(2, 10).offset(), 10);
        assert_eq!(page(3, 9).offset(), 18);
        assert_eq!(page(u32::MAX, u32::MAX).offset(), i64::MAX);
    }

    #[test]
    fn defaults() {
        let page = Page::default();
        assert_eq!(page.page.get(), 1);
        assert_eq!(page.limit.get(), DEFAULT_PAGE_LIMIT);
        assert_eq!(PostSort::default(), PostSort::Newest);
    }

    #[test]
    fn sort_keys_deserialize_camel_case() {
        let sort: PostSort = serde_json::from_str("\"mostLiked\"").unwrap();
        assert_eq!(sort, PostSort::MostLiked);
        let sort: PostSort = serde_json::from_str("\"mostCommented\"").unwrap();
        assert_eq!(sort, PostSort::MostCommented);
        let sort: PostSort = serde_json::from_str("\"newest\"").unwrap();
        assert_eq!(sort, PostSort::Newest);
    }
}
