//! PostgreSQL storage backed by pgvector.
//!
//! The schema lives in the server's migrations; this store only reads and
//! writes. Similarity is `1 - cosine distance`. `nearest_embeddings` orders
//! by bare distance over `recipe_embeddings` alone, so the HNSW cosine index
//! can drive the scan; the join to `recipes` and the recency tie-break are
//! applied to that k-row result.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{RecipeBookStore, RecipeStore};
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

const BOOK_COLUMNS: &str = r#"
    b.id, b.name, b.normalized_name, b.description, b.created_at, b.updated_at,
    (SELECT COUNT(*) FROM recipe_book_recipes m WHERE m.recipe_book_id = b.id) AS recipe_count
"#;

/// PostgreSQL recipe and recipe book store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Reuse an existing pool; the schema must already be migrated.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_children(&self, recipe: RecipeRow) -> StoreResult<Recipe> {
        let ingredients = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT ingredient_text, order_index
            FROM recipe_ingredients
            WHERE recipe_id = $1
            ORDER BY order_index ASC
            "#,
        )
        .bind(recipe.id)
        .fetch_all(&self.pool)
        .await?;

        let instructions = sqlx::query_as::<_, InstructionRow>(
            r#"
            SELECT instruction_text, step_number
            FROM recipe_instructions
            WHERE recipe_id = $1
            ORDER BY step_number ASC
            "#,
        )
        .bind(recipe.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(recipe.into_recipe(
            ingredients.into_iter().map(Ingredient::from).collect(),
            instructions.into_iter().map(Instruction::from).collect(),
        ))
    }

    async fn book_by_id(&self, id: RecipeBookId) -> StoreResult<Option<RecipeBook>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM recipe_books b WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RecipeBook::from))
    }

    async fn with_recipe_ids(&self, book: RecipeBook) -> StoreResult<RecipeBookDetail> {
        let recipe_ids = sqlx::query_scalar::<_, RecipeId>(
            r#"
            SELECT recipe_id
            FROM recipe_book_recipes
            WHERE recipe_book_id = $1
            ORDER BY added_at ASC, recipe_id ASC
            "#,
        )
        .bind(book.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(RecipeBookDetail { book, recipe_ids })
    }

    async fn check_pair(&self, book_id: RecipeBookId, recipe_id: RecipeId) -> StoreResult<()> {
        let (book_exists, recipe_exists) = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM recipe_books WHERE id = $1),
                EXISTS(SELECT 1 FROM recipes WHERE id = $2)
            "#,
        )
        .bind(book_id)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await?;

        if !book_exists {
            return Err(StoreError::NotFound {
                entity: "recipe book",
                id: book_id.to_string(),
            });
        }
        if !recipe_exists {
            return Err(StoreError::NotFound {
                entity: "recipe",
                id: recipe_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for PostgresStore {
    #[instrument(skip(self, new), fields(title = %new.recipe.title))]
    async fn store_recipe(&self, new: &NewRecipe) -> StoreResult<Recipe> {
        if new.embedding.is_empty() {
            return Err(StoreError::InvalidData("embedding is empty".into()));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            INSERT INTO recipes (id, title, servings, total_time, source_url, is_test)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, servings, total_time, source_url, is_test, created_at, updated_at
            "#,
        )
        .bind(RecipeId::new())
        .bind(&new.recipe.title)
        .bind(&new.recipe.servings)
        .bind(&new.recipe.total_time)
        .bind(&new.source_url)
        .bind(new.is_test)
        .fetch_one(&mut *tx)
        .await?;

        let ingredients = new.ingredient_rows();
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_text, order_index)
            SELECT $1, t.ingredient_text, t.order_index
            FROM UNNEST($2::text[], $3::int4[]) AS t(ingredient_text, order_index)
            "#,
        )
        .bind(row.id)
        .bind(ingredients.iter().map(|i| i.text.clone()).collect::<Vec<_>>())
        .bind(ingredients.iter().map(|i| i.order_index).collect::<Vec<_>>())
        .execute(&mut *tx)
        .await?;

        let instructions = new.instruction_rows();
        sqlx::query(
            r#"
            INSERT INTO recipe_instructions (recipe_id, instruction_text, step_number)
            SELECT $1, t.instruction_text, t.step_number
            FROM UNNEST($2::text[], $3::int4[]) AS t(instruction_text, step_number)
            "#,
        )
        .bind(row.id)
        .bind(instructions.iter().map(|i| i.text.clone()).collect::<Vec<_>>())
        .bind(instructions.iter().map(|i| i.step_number).collect::<Vec<_>>())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO recipe_embeddings (recipe_id, embedding_type, embedding)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(row.id)
        .bind(&new.embedding_type)
        .bind(Vector::from(new.embedding.clone()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(recipe_id = %row.id, "Recipe stored");
        Ok(row.into_recipe(ingredients, instructions))
    }

    async fn get_recipe(&self, id: RecipeId) -> StoreResult<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, title, servings, total_time, source_url, is_test, created_at, updated_at
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_children(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_recipe_with_embeddings(
        &self,
        id: RecipeId,
    ) -> StoreResult<Option<RecipeWithEmbeddings>> {
        let Some(recipe) = self.get_recipe(id).await? else {
            return Ok(None);
        };

        let embeddings = sqlx::query_as::<_, EmbeddingRow>(
            r#"
            SELECT embedding_type, embedding, created_at
            FROM recipe_embeddings
            WHERE recipe_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(RecipeWithEmbeddings {
            recipe,
            embeddings: embeddings.into_iter().map(RecipeEmbedding::from).collect(),
        }))
    }

    async fn list_recipes(&self, limit: usize) -> StoreResult<Vec<RecipeSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT id, title, servings, total_time, source_url, created_at
            FROM recipes
            ORDER BY created_at DESC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RecipeSummary::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_recipe(&self, id: RecipeId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recipe_exists(&self, id: RecipeId) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM recipes WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    #[instrument(skip(self, vector), fields(dim = vector.len()))]
    async fn nearest_embeddings(
        &self,
        vector: &[f32],
        embedding_type: &str,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingMatch>> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT
                nearest.recipe_id,
                r.title,
                (1 - nearest.distance)::float4 AS similarity,
                r.created_at AS recipe_created_at
            FROM (
                SELECT recipe_id, embedding <=> $1 AS distance
                FROM recipe_embeddings
                WHERE embedding_type = $2
                ORDER BY embedding <=> $1
                LIMIT $3
            ) nearest
            JOIN recipes r ON r.id = nearest.recipe_id
            ORDER BY nearest.distance ASC, r.created_at DESC, nearest.recipe_id ASC
            "#,
        )
        .bind(Vector::from(vector.to_vec()))
        .bind(embedding_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmbeddingMatch::from).collect())
    }

    async fn ingredient_previews(
        &self,
        ids: &[RecipeId],
        max: usize,
    ) -> StoreResult<HashMap<RecipeId, Vec<String>>> {
        if ids.is_empty() || max == 0 {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (RecipeId, String)>(
            r#"
            SELECT recipe_id, ingredient_text
            FROM recipe_ingredients
            WHERE recipe_id = ANY($1) AND order_index < $2
            ORDER BY recipe_id, order_index ASC
            "#,
        )
        .bind(ids)
        .bind(max as i32)
        .fetch_all(&self.pool)
        .await?;

        let mut previews: HashMap<RecipeId, Vec<String>> = HashMap::new();
        for (recipe_id, text) in rows {
            previews.entry(recipe_id).or_default().push(text);
        }
        Ok(previews)
    }
}

#[async_trait]
impl RecipeBookStore for PostgresStore {
    #[instrument(skip(self, description))]
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

        let inserted = sqlx::query_scalar::<_, RecipeBookId>(
            r#"
            INSERT INTO recipe_books (id, name, normalized_name, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (normalized_name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(RecipeBookId::new())
        .bind(clean_book_name(name))
        .bind(&normalized_name)
        .bind(clean_description(description))
        .fetch_optional(&self.pool)
        .await?;

        let created = inserted.is_some();
        let book = match inserted {
            Some(id) => self.book_by_id(id).await?,
            None => self
                .get_book_by_name(&normalized_name)
                .await?
                .map(|detail| detail.book),
        };

        let book = book.ok_or_else(|| {
            StoreError::InvalidData(format!("recipe book '{normalized_name}' vanished"))
        })?;
        Ok(CreatedBook { book, created })
    }

    async fn get_book(&self, id: RecipeBookId) -> StoreResult<Option<RecipeBookDetail>> {
        match self.book_by_id(id).await? {
            Some(book) => Ok(Some(self.with_recipe_ids(book).await?)),
            None => Ok(None),
        }
    }

    async fn get_book_by_name(&self, name: &str) -> StoreResult<Option<RecipeBookDetail>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM recipe_books b WHERE b.normalized_name = $1"
        ))
        .bind(normalize_book_name(name))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_recipe_ids(row.into()).await?)),
            None => Ok(None),
        }
    }

    async fn list_books(&self, limit: usize) -> StoreResult<Vec<RecipeBook>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM recipe_books b ORDER BY b.created_at DESC, b.id ASC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RecipeBook::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_book(&self, id: RecipeBookId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM recipe_books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn add_recipe_to_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> StoreResult<bool> {
        self.check_pair(book_id, recipe_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO recipe_book_recipes (recipe_book_id, recipe_id)
            VALUES ($1, $2)
            ON CONFLICT (recipe_book_id, recipe_id) DO NOTHING
            "#,
        )
        .bind(book_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove_recipe_from_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> StoreResult<bool> {
        self.check_pair(book_id, recipe_id).await?;

        let result = sqlx::query(
            "DELETE FROM recipe_book_recipes WHERE recipe_book_id = $1 AND recipe_id = $2",
        )
        .bind(book_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn books_for_recipe(&self, recipe_id: RecipeId) -> StoreResult<Vec<RecipeBook>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM recipe_books b
            JOIN recipe_book_recipes link ON link.recipe_book_id = b.id
            WHERE link.recipe_id = $1
            ORDER BY b.name ASC
            "#
        ))
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RecipeBook::from).collect())
    }

    async fn stats(&self) -> StoreResult<BookStats> {
        let (books, links, unique) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM recipe_books),
                (SELECT COUNT(*) FROM recipe_book_recipes),
                (SELECT COUNT(DISTINCT recipe_id) FROM recipe_book_recipes)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(BookStats::from_counts(books, links, unique))
    }
}

// Row types
#[derive(Debug, FromRow)]
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

impl RecipeRow {
    fn into_recipe(self, ingredients: Vec<Ingredient>, instructions: Vec<Instruction>) -> Recipe {
        Recipe {
            id: self.id,
            title: self.title,
            servings: self.servings,
            total_time: self.total_time,
            source_url: self.source_url,
            is_test: self.is_test,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ingredients,
            instructions,
        }
    }
}

#[derive(Debug, FromRow)]
struct IngredientRow {
    ingredient_text: String,
    order_index: i32,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Ingredient {
            text: row.ingredient_text,
            order_index: row.order_index,
        }
    }
}

#[derive(Debug, FromRow)]
struct InstructionRow {
    instruction_text: String,
    step_number: i32,
}

impl From<InstructionRow> for Instruction {
    fn from(row: InstructionRow) -> Self {
        Instruction {
            text: row.instruction_text,
            step_number: row.step_number,
        }
    }
}

#[derive(Debug, FromRow)]
struct EmbeddingRow {
    embedding_type: String,
    embedding: Vector,
    created_at: DateTime<Utc>,
}

impl From<EmbeddingRow> for RecipeEmbedding {
    fn from(row: EmbeddingRow) -> Self {
        RecipeEmbedding {
            embedding_type: row.embedding_type,
            vector: row.embedding.to_vec(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: RecipeId,
    title: String,
    servings: Option<String>,
    total_time: Option<String>,
    source_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SummaryRow> for RecipeSummary {
    fn from(row: SummaryRow) -> Self {
        RecipeSummary {
            id: row.id,
            title: row.title,
            servings: row.servings,
            total_time: row.total_time,
            source_url: row.source_url,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MatchRow {
    recipe_id: RecipeId,
    title: String,
    similarity: f32,
    recipe_created_at: DateTime<Utc>,
}

impl From<MatchRow> for EmbeddingMatch {
    fn from(row: MatchRow) -> Self {
        EmbeddingMatch {
            recipe_id: row.recipe_id,
            title: row.title,
            similarity: row.similarity,
            recipe_created_at: row.recipe_created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BookRow {
    id: RecipeBookId,
    name: String,
    normalized_name: String,
    description: Option<String>,
    recipe_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookRow> for RecipeBook {
    fn from(row: BookRow) -> Self {
        RecipeBook {
            id: row.id,
            name: row.name,
            normalized_name: row.normalized_name,
            description: row.description,
            recipe_count: row.recipe_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
