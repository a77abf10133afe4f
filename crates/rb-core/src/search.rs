//! # Search
//!
//! Optional narrowing of the flat comment listing: a keyword matched against
//! content and/or author, or a depth filter.

use serde::{Deserialize, Serialize};

use crate::models::Comment;
use crate::pagination::PageRequest;

/// Which rows the flat listing returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommentFilter {
    #[default]
    All,
    /// Only comments at this depth.
    Depth(u8),
    /// Content contains the keyword.
    Content(String),
    /// Decimal author id contains the keyword.
    Author(String),
    ContentOrAuthor(String),
}

impl CommentFilter {
    /// In-process evaluation. Matching is substring based and ignores ASCII
    /// case, like SQLite's `LIKE`.
    pub fn matches(&self, comment: &Comment) -> bool {
        match self {
            Self::All => true,
            Self::Depth(depth) => comment.depth == *depth,
            Self::Content(keyword) => contains_ignore_ascii_case(&comment.content, keyword),
            Self::Author(keyword) => comment.author_id.to_string().contains(keyword.as_str()),
            Self::ContentOrAuthor(keyword) => {
                Self::Content(keyword.clone()).matches(comment) || Self::Author(keyword.clone()).matches(comment)
            }
        }
    }
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

/// Query string of the flat listing, e.g. `?page=2&size=20&type=cw&keyword=rust`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: i64,
    pub size: i64,
    /// Fields searched by `keyword`: `c` content, `w` writer (author), or both.
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub keyword: Option<String>,
    pub depth: Option<u8>,
}

impl Default for ListQuery {
    fn default() -> Self {
        let page = PageRequest::default();
        Self {
            page: page.page,
            size: page.size,
            search_type: None,
            keyword: None,
            depth: None,
        }
    }
}

impl ListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }

    /// A non-blank keyword takes precedence over `depth`. A keyword without a
    /// recognised type filters nothing.
    pub fn filter(&self) -> CommentFilter {
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            let types = self.search_type.as_deref().unwrap_or_default();
            let keyword = keyword.to_string();
            return match (types.contains('c'), types.contains('w')) {
                (true, true) => CommentFilter::ContentOrAuthor(keyword),
                (true, false) => CommentFilter::Content(keyword),
                (false, true) => CommentFilter::Author(keyword),
                (false, false) => CommentFilter::All,
            };
        }
        match self.depth {
            Some(depth) => CommentFilter::Depth(depth),
            None => CommentFilter::All,
        }
    }
}
