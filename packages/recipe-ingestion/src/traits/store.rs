//! Storage traits for recipes and recipe books.
//!
//! - `RecipeStore`: atomic recipe writes, reads, deletes and vector search
//! - `RecipeBookStore`: books and book membership
//! - `Store`: both, which is what the pipeline and the service layer take

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{
    book::{BookStats, CreatedBook, RecipeBook, RecipeBookDetail},
    ids::{RecipeBookId, RecipeId},
    recipe::{NewRecipe, Recipe, RecipeSummary, RecipeWithEmbeddings},
    search::EmbeddingMatch,
};

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Write the recipe, its ingredients, instructions and embedding in one transaction.
    ///
    /// Either every row commits or none does. The returned snapshot carries the
    /// id generated for the new recipe.
    async fn store_recipe(&self, recipe: &NewRecipe) -> StoreResult<Recipe>;

    async fn get_recipe(&self, id: RecipeId) -> StoreResult<Option<Recipe>>;

    async fn get_recipe_with_embeddings(
        &self,
        id: RecipeId,
    ) -> StoreResult<Option<RecipeWithEmbeddings>>;

    /// Newest first.
    async fn list_recipes(&self, limit: usize) -> StoreResult<Vec<RecipeSummary>>;

    /// Delete a recipe; children and book memberships go with it.
    ///
    /// Returns false if no such recipe existed.
    async fn delete_recipe(&self, id: RecipeId) -> StoreResult<bool>;

    async fn recipe_exists(&self, id: RecipeId) -> StoreResult<bool> {
        Ok(self.get_recipe(id).await?.is_some())
    }

    /// Embeddings of `embedding_type` closest to `vector`, highest similarity first.
    async fn nearest_embeddings(
        &self,
        vector: &[f32],
        embedding_type: &str,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingMatch>>;

    /// First `max` ingredient texts per recipe, in order.
    async fn ingredient_previews(
        &self,
        ids: &[RecipeId],
        max: usize,
    ) -> StoreResult<HashMap<RecipeId, Vec<String>>>;
}

#[async_trait]
pub trait RecipeBookStore: Send + Sync {
    /// Create a book, or return the one whose normalized name already matches.
    ///
    /// Blank names fail with `StoreError::InvalidData`.
    async fn create_book(&self, name: &str, description: Option<&str>)
        -> StoreResult<CreatedBook>;

    async fn get_book(&self, id: RecipeBookId) -> StoreResult<Option<RecipeBookDetail>>;

    /// Case- and whitespace-insensitive lookup.
    async fn get_book_by_name(&self, name: &str) -> StoreResult<Option<RecipeBookDetail>>;

    /// Newest first.
    async fn list_books(&self, limit: usize) -> StoreResult<Vec<RecipeBook>>;

    async fn delete_book(&self, id: RecipeBookId) -> StoreResult<bool>;

    /// Idempotent: returns false when the pair already existed.
    ///
    /// Fails with `StoreError::NotFound` if either side does not exist.
    async fn add_recipe_to_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> StoreResult<bool>;

    /// Returns false when the pair did not exist.
    ///
    /// Fails with `StoreError::NotFound` if either side does not exist.
    async fn remove_recipe_from_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> StoreResult<bool>;

    /// Books containing the recipe, by name.
    async fn books_for_recipe(&self, recipe_id: RecipeId) -> StoreResult<Vec<RecipeBook>>;

    async fn stats(&self) -> StoreResult<BookStats>;
}

/// Composite storage trait.
pub trait Store: RecipeStore + RecipeBookStore {}

impl<T: RecipeStore + RecipeBookStore> Store for T {}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
