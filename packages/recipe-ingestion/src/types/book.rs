//! Recipe books and their membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{RecipeBookId, RecipeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeBook {
    pub id: RecipeBookId,
    pub name: String,
    /// Lowercased, whitespace-collapsed name; unique across books
    pub normalized_name: String,
    pub description: Option<String>,
    pub recipe_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A book plus the ids of its recipes, oldest membership first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeBookDetail {
    #[serde(flatten)]
    pub book: RecipeBook,
    pub recipe_ids: Vec<RecipeId>,
}

/// Result of `create_book`: an existing book with the same normalized name is returned as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedBook {
    pub book: RecipeBook,
    pub created: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookStats {
    pub total_recipe_books: i64,
    pub total_recipe_book_links: i64,
    pub unique_recipes_in_books: i64,
    pub avg_recipes_per_book: f64,
}

impl BookStats {
    /// Fill in the average (two decimals) from the raw counts.
    pub fn from_counts(books: i64, links: i64, unique_recipes: i64) -> Self {
        let avg = if books > 0 {
            ((links as f64 / books as f64) * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            total_recipe_books: books,
            total_recipe_book_links: links,
            unique_recipes_in_books: unique_recipes,
            avg_recipes_per_book: avg,
        }
    }
}

/// Display form of a book name: trimmed, inner whitespace collapsed.
pub fn clean_book_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup key for a book name.
pub fn normalize_book_name(name: &str) -> String {
    clean_book_name(name).to_lowercase()
}

/// Blank descriptions are stored as absent.
pub fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
