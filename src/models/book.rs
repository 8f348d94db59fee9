use serde::{Deserialize, Serialize};

use crate::utils::wire::null_as_default;

/// Catalog entry as served by `GET /api/Book`.
///
/// Only the id and title are guaranteed by the API; every other field is
/// defaulted when missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub genre_name: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    // Older catalog rows use the PascalCase key
    #[serde(default, alias = "PublishYear")]
    pub published_year: Option<i32>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub available_copies: i32,
}

impl Book {
    /// Copy count for display, never negative
    pub fn displayed_copies(&self) -> u32 {
        self.available_copies.max(0) as u32
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Take one copy off the local count. Refuses (returns false) when the
    /// count is already zero; the server is the authority on availability.
    pub fn take_copy(&mut self) -> bool {
        if self.available_copies <= 0 {
            return false;
        }
        self.available_copies -= 1;
        true
    }

    pub fn genre_matches(&self, genre: &str) -> bool {
        self.genre_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase() == genre.to_lowercase())
    }
}
