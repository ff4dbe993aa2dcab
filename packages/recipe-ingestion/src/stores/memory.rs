//! In-memory storage implementation for testing and development.
//!
//! Recipe writes are staged and only published under a single write lock, so a
//! failure part-way through (see [`FailPoint`]) leaves nothing behind, the same
//! as a rolled-back transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{cosine_similarity, RecipeBookStore, RecipeStore};
use crate::types::{
    book::{
        clean_book_name, clean_description, normalize_book_name, BookStats, CreatedBook,
        RecipeBook, RecipeBookDetail,
    },
    ids::{RecipeBookId, RecipeId},
    recipe::{
        Ingredient, Instruction, NewRecipe, Recipe, RecipeEmbedding, RecipeSummary,
        RecipeWithEmbeddings,
    },
    search::EmbeddingMatch,
};

/// Write step at which `store_recipe` can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Recipe,
    Ingredients,
    Instructions,
    Embedding,
}

impl FailPoint {
    fn as_str(&self) -> &'static str {
        match self {
            FailPoint::Recipe => "recipe insert",
            FailPoint::Ingredients => "ingredient insert",
            FailPoint::Instructions => "instruction insert",
            FailPoint::Embedding => "embedding insert",
        }
    }
}

/// Row counts per table, for assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub recipes: usize,
    pub ingredients: usize,
    pub instructions: usize,
    pub embeddings: usize,
    pub books: usize,
    pub memberships: usize,
}

#[derive(Debug, Clone)]
struct RecipeRow {
    id: RecipeId,
    title: String,
    servings: Option<String>,
    total_time: Option<String>,
    source_url: Option<String>,
    is_test: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct BookRow {
    id: RecipeBookId,
    name: String,
    normalized_name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    recipes: HashMap<RecipeId, RecipeRow>,
    ingredients: HashMap<RecipeId, Vec<Ingredient>>,
    instructions: HashMap<RecipeId, Vec<Instruction>>,
    embeddings: HashMap<RecipeId, Vec<RecipeEmbedding>>,
    books: HashMap<RecipeBookId, BookRow>,
    /// Insertion order is membership order
    memberships: IndexMap<(RecipeBookId, RecipeId), DateTime<Utc>>,
}

impl State {
    fn recipe(&self, id: RecipeId) -> Option<Recipe> {
        let row = self.recipes.get(&id)?;
        Some(Recipe {
            id: row.id,
            title: row.title.clone(),
            servings: row.servings.clone(),
            total_time: row.total_time.clone(),
            source_url: row.source_url.clone(),
            is_test: row.is_test,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ingredients: self.ingredients.get(&id).cloned().unwrap_or_default(),
            instructions: self.instructions.get(&id).cloned().unwrap_or_default(),
        })
    }

    fn book(&self, row: &BookRow) -> RecipeBook {
        let recipe_count = self
            .memberships
            .keys()
            .filter(|(book_id, _)| *book_id == row.id)
            .count() as i64;
        RecipeBook {
            id: row.id,
            name: row.name.clone(),
            normalized_name: row.normalized_name.clone(),
            description: row.description.clone(),
            recipe_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn book_detail(&self, row: &BookRow) -> RecipeBookDetail {
        let recipe_ids = self
            .memberships
            .keys()
            .filter(|(book_id, _)| *book_id == row.id)
            .map(|(_, recipe_id)| *recipe_id)
            .collect();
        RecipeBookDetail {
            book: self.book(row),
            recipe_ids,
        }
    }

    fn check_pair(&self, book_id: RecipeBookId, recipe_id: RecipeId) -> StoreResult<()> {
        if !self.books.contains_key(&book_id) {
            return Err(StoreError::NotFound {
                entity: "recipe book",
                id: book_id.to_string(),
            });
        }
        if !self.recipes.contains_key(&recipe_id) {
            return Err(StoreError::NotFound {
                entity: "recipe",
                id: recipe_id.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory storage for recipes and recipe books.
///
/// Not suitable for production as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_point: RwLock<Option<FailPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `store_recipe` fail at `point`; `None` clears it.
    pub fn fail_at(&self, point: Option<FailPoint>) {
        *self
            .fail_point
            .write()
            .unwrap_or_else(PoisonError::into_inner) = point;
    }

    pub fn row_counts(&self) -> RowCounts {
        let state = self.read();
        RowCounts {
            recipes: state.recipes.len(),
            ingredients: state.ingredients.values().map(Vec::len).sum(),
            instructions: state.instructions.values().map(Vec::len).sum(),
            embeddings: state.embeddings.values().map(Vec::len).sum(),
            books: state.books.len(),
            memberships: state.memberships.len(),
        }
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        *self.write() = State::default();
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn step(&self, point: FailPoint) -> StoreResult<()> {
        let armed = *self
            .fail_point
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if armed == Some(point) {
            return Err(StoreError::Injected(point.as_str().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn store_recipe(&self, new: &NewRecipe) -> StoreResult<Recipe> {
        let now = Utc::now();
        let id = RecipeId::new();

        self.step(FailPoint::Recipe)?;
        let row = RecipeRow {
            id,
            title: new.recipe.title.clone(),
            servings: new.recipe.servings.clone(),
            total_time: new.recipe.total_time.clone(),
            source_url: new.source_url.clone(),
            is_test: new.is_test,
            created_at: now,
            updated_at: now,
        };

        self.step(FailPoint::Ingredients)?;
        let ingredients = new.ingredient_rows();

        self.step(FailPoint::Instructions)?;
        let instructions = new.instruction_rows();

        self.step(FailPoint::Embedding)?;
        if new.embedding.is_empty() {
            return Err(StoreError::InvalidData("embedding is empty".into()));
        }
        let embedding = RecipeEmbedding {
            embedding_type: new.embedding_type.clone(),
            vector: new.embedding.clone(),
            created_at: now,
        };

        let mut state = self.write();
        state.recipes.insert(id, row);
        state.ingredients.insert(id, ingredients);
        state.instructions.insert(id, instructions);
        state.embeddings.insert(id, vec![embedding]);

        debug!(recipe_id = %id, "Recipe stored");
        state
            .recipe(id)
            .ok_or_else(|| StoreError::InvalidData("recipe missing after insert".into()))
    }

    async fn get_recipe(&self, id: RecipeId) -> StoreResult<Option<Recipe>> {
        Ok(self.read().recipe(id))
    }

    async fn get_recipe_with_embeddings(
        &self,
        id: RecipeId,
    ) -> StoreResult<Option<RecipeWithEmbeddings>> {
        let state = self.read();
        Ok(state.recipe(id).map(|recipe| RecipeWithEmbeddings {
            recipe,
            embeddings: state.embeddings.get(&id).cloned().unwrap_or_default(),
        }))
    }

    async fn list_recipes(&self, limit: usize) -> StoreResult<Vec<RecipeSummary>> {
        let state = self.read();
        let mut rows: Vec<&RecipeRow> = state.recipes.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|r| RecipeSummary {
                id: r.id,
                title: r.title.clone(),
                servings: r.servings.clone(),
                total_time: r.total_time.clone(),
                source_url: r.source_url.clone(),
                created_at: r.created_at,
            })
            .collect())
    }

    async fn delete_recipe(&self, id: RecipeId) -> StoreResult<bool> {
        let mut state = self.write();
        if state.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        state.ingredients.remove(&id);
        state.instructions.remove(&id);
        state.embeddings.remove(&id);
        state.memberships.retain(|(_, recipe_id), _| *recipe_id != id);
        Ok(true)
    }

    async fn recipe_exists(&self, id: RecipeId) -> StoreResult<bool> {
        Ok(self.read().recipes.contains_key(&id))
    }

    async fn nearest_embeddings(
        &self,
        vector: &[f32],
        embedding_type: &str,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingMatch>> {
        let state = self.read();

        let mut matches: Vec<EmbeddingMatch> = state
            .embeddings
            .iter()
            .flat_map(|(id, rows)| rows.iter().map(move |row| (id, row)))
            .filter(|(_, row)| row.embedding_type == embedding_type)
            .filter_map(|(id, row)| {
                let recipe = state.recipes.get(id)?;
                Some(EmbeddingMatch {
                    recipe_id: *id,
                    title: recipe.title.clone(),
                    similarity: cosine_similarity(vector, &row.vector),
                    recipe_created_at: recipe.created_at,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.recipe_created_at.cmp(&a.recipe_created_at))
                .then_with(|| a.recipe_id.cmp(&b.recipe_id))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn ingredient_previews(
        &self,
        ids: &[RecipeId],
        max: usize,
    ) -> StoreResult<HashMap<RecipeId, Vec<String>>> {
        let state = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                let items = state.ingredients.get(id)?;
                Some((*id, items.iter().take(max).map(|i| i.text.clone()).collect()))
            })
            .collect())
    }
}

#[async_trait]
impl RecipeBookStore for MemoryStore {
    async fn create_book(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<CreatedBook> {
        let normalized_name = normalize_book_name(name);
        if normalized_name.is_empty() {
            return Err(StoreError::InvalidData(
                "recipe book name cannot be empty".into(),
            ));
        }

        let mut state = self.write();
        if let Some(existing) = state
            .books
            .values()
            .find(|b| b.normalized_name == normalized_name)
        {
            return Ok(CreatedBook {
                book: state.book(existing),
                created: false,
            });
        }

        let now = Utc::now();
        let row = BookRow {
            id: RecipeBookId::new(),
            name: clean_book_name(name),
            normalized_name,
            description: clean_description(description),
            created_at: now,
            updated_at: now,
        };
        let book = state.book(&row);
        state.books.insert(row.id, row);
        Ok(CreatedBook {
            book,
            created: true,
        })
    }

    async fn get_book(&self, id: RecipeBookId) -> StoreResult<Option<RecipeBookDetail>> {
        let state = self.read();
        Ok(state.books.get(&id).map(|row| state.book_detail(row)))
    }

    async fn get_book_by_name(&self, name: &str) -> StoreResult<Option<RecipeBookDetail>> {
        let normalized_name = normalize_book_name(name);
        let state = self.read();
        Ok(state
            .books
            .values()
            .find(|b| b.normalized_name == normalized_name)
            .map(|row| state.book_detail(row)))
    }

    async fn list_books(&self, limit: usize) -> StoreResult<Vec<RecipeBook>> {
        let state = self.read();
        let mut rows: Vec<&BookRow> = state.books.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows.into_iter().take(limit).map(|r| state.book(r)).collect())
    }

    async fn delete_book(&self, id: RecipeBookId) -> StoreResult<bool> {
        let mut state = self.write();
        if state.books.remove(&id).is_none() {
            return Ok(false);
        }
        state.memberships.retain(|(book_id, _), _| *book_id != id);
        Ok(true)
    }

    async fn add_recipe_to_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> StoreResult<bool> {
        let mut state = self.write();
        state.check_pair(book_id, recipe_id)?;

        if state.memberships.contains_key(&(book_id, recipe_id)) {
            return Ok(false);
        }
        state.memberships.insert((book_id, recipe_id), Utc::now());
        Ok(true)
    }

    async fn remove_recipe_from_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> StoreResult<bool> {
        let mut state = self.write();
        state.check_pair(book_id, recipe_id)?;
        Ok(state.memberships.shift_remove(&(book_id, recipe_id)).is_some())
    }

    async fn books_for_recipe(&self, recipe_id: RecipeId) -> StoreResult<Vec<RecipeBook>> {
        let state = self.read();
        let mut books: Vec<RecipeBook> = state
            .memberships
            .keys()
            .filter(|(_, r)| *r == recipe_id)
            .filter_map(|(book_id, _)| state.books.get(book_id))
            .map(|row| state.book(row))
            .collect();
        books.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(books)
    }

    async fn stats(&self) -> StoreResult<BookStats> {
        let state = self.read();
        let unique: HashSet<RecipeId> = state.memberships.keys().map(|(_, r)| *r).collect();
        Ok(BookStats::from_counts(
            state.books.len() as i64,
            state.memberships.len() as i64,
            unique.len() as i64,
        ))
    }
}
