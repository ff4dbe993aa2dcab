//! Integration tests for the PostgreSQL store against a real pgvector database.

mod common;

use crate::common::{new_recipe_titled, unique_title, TestHarness};
use recipe_ingestion::testing::deterministic_embedding;
use recipe_ingestion::{RecipeBookId, RecipeBookStore, RecipeId, RecipeStore, StoreError};
use test_context::test_context;

// =============================================================================
// Recipes
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn store_recipe_writes_ordered_children(ctx: &TestHarness) {
    let store = ctx.store();
    let new = new_recipe_titled(&unique_title("Ordered"));

    let stored = store.store_recipe(&new).await.unwrap();
    let fetched = store.get_recipe(stored.id).await.unwrap().unwrap();

    assert_eq!(fetched.ingredient_texts(), new.recipe.ingredients);
    assert_eq!(
        fetched.ingredients.iter().map(|i| i.order_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        fetched.instructions.iter().map(|i| i.step_number).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(fetched.servings.as_deref(), Some("12"));
    assert!(fetched.is_test);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_instruction_insert_rolls_back_everything(ctx: &TestHarness) {
    let store = ctx.store();
    let title = unique_title("Rollback");
    let mut new = new_recipe_titled(&title);
    // Postgres rejects NUL bytes in text columns
    new.recipe.instructions[1] = "Bake\0".into();

    let err = store.store_recipe(&new).await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    let recipes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recipes WHERE title = $1")
        .bind(&title)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(recipes, 0);

    let ingredients = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM recipe_ingredients WHERE ingredient_text = $1",
    )
    .bind(format!("1 pinch of {title}"))
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(ingredients, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn embeddings_round_trip_through_pgvector(ctx: &TestHarness) {
    let store = ctx.store();
    let new = new_recipe_titled(&unique_title("Vector"));
    let stored = store.store_recipe(&new).await.unwrap();

    let with = store
        .get_recipe_with_embeddings(stored.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(with.embeddings.len(), 1);
    assert_eq!(with.embeddings[0].embedding_type, "title_ingredients");
    assert_eq!(with.embeddings[0].vector.len(), 768);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn nearest_embedding_is_the_identical_vector(ctx: &TestHarness) {
    let store = ctx.store();
    let target = new_recipe_titled(&unique_title("Nearest"));
    let target_id = store.store_recipe(&target).await.unwrap().id;
    store
        .store_recipe(&new_recipe_titled(&unique_title("Other")))
        .await
        .unwrap();

    let matches = store
        .nearest_embeddings(&target.embedding, "title_ingredients", 3)
        .await
        .unwrap();

    assert_eq!(matches[0].recipe_id, target_id);
    assert!((matches[0].similarity - 1.0).abs() < 1e-4);
    assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn nearest_equal_distance_prefers_newer_recipe(ctx: &TestHarness) {
    let store = ctx.store();
    let shared = deterministic_embedding(&unique_title("Shared vector"), 768);

    let mut older = new_recipe_titled(&unique_title("Older"));
    older.embedding = shared.clone();
    let older_id = store.store_recipe(&older).await.unwrap().id;
    let mut newer = new_recipe_titled(&unique_title("Newer"));
    newer.embedding = shared.clone();
    let newer_id = store.store_recipe(&newer).await.unwrap().id;

    let matches = store
        .nearest_embeddings(&shared, "title_ingredients", 2)
        .await
        .unwrap();

    let ids: Vec<RecipeId> = matches.iter().map(|m| m.recipe_id).collect();
    assert_eq!(ids, vec![newer_id, older_id]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn delete_recipe_cascades(ctx: &TestHarness) {
    let store = ctx.store();
    let recipe = store
        .store_recipe(&new_recipe_titled(&unique_title("Cascade")))
        .await
        .unwrap();
    let book = store
        .create_book(&unique_title("Cascade Book"), None)
        .await
        .unwrap()
        .book;
    store.add_recipe_to_book(book.id, recipe.id).await.unwrap();

    assert!(store.delete_recipe(recipe.id).await.unwrap());
    assert!(!store.delete_recipe(recipe.id).await.unwrap());

    for table in [
        "recipes",
        "recipe_ingredients",
        "recipe_instructions",
        "recipe_embeddings",
        "recipe_book_recipes",
    ] {
        assert_eq!(ctx.count(table, recipe.id).await, 0, "{table}");
    }
    let detail = store.get_book(book.id).await.unwrap().unwrap();
    assert!(detail.recipe_ids.is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn ingredient_previews_are_capped_and_ordered(ctx: &TestHarness) {
    let store = ctx.store();
    let recipe = store
        .store_recipe(&new_recipe_titled(&unique_title("Preview")))
        .await
        .unwrap();

    let previews = store.ingredient_previews(&[recipe.id], 2).await.unwrap();

    assert_eq!(
        previews.get(&recipe.id).unwrap(),
        &vec!["2 cups flour".to_string(), "1 cup sugar".to_string()]
    );
}

// =============================================================================
// Recipe books
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn create_book_returns_existing_by_normalized_name(ctx: &TestHarness) {
    let store = ctx.store();
    let name = unique_title("Weeknight  Dinners");

    let first = store.create_book(&name, Some("  fast  ")).await.unwrap();
    let second = store
        .create_book(&format!("  {}  ", name.to_uppercase()), None)
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.book.id, second.book.id);
    assert_eq!(first.book.description.as_deref(), Some("fast"));
    assert!(!first.book.name.contains("  "));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn membership_is_idempotent_and_checked(ctx: &TestHarness) {
    let store = ctx.store();
    let recipe = store
        .store_recipe(&new_recipe_titled(&unique_title("Member")))
        .await
        .unwrap();
    let book = store
        .create_book(&unique_title("Members"), None)
        .await
        .unwrap()
        .book;

    assert!(store.add_recipe_to_book(book.id, recipe.id).await.unwrap());
    assert!(!store.add_recipe_to_book(book.id, recipe.id).await.unwrap());
    assert_eq!(
        store.get_book(book.id).await.unwrap().unwrap().book.recipe_count,
        1
    );

    let books = store.books_for_recipe(recipe.id).await.unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].id, book.id);

    assert!(store.remove_recipe_from_book(book.id, recipe.id).await.unwrap());
    assert!(!store.remove_recipe_from_book(book.id, recipe.id).await.unwrap());

    let err = store
        .add_recipe_to_book(RecipeBookId::new(), recipe.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "recipe book", .. }));

    let err = store
        .add_recipe_to_book(book.id, RecipeId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "recipe", .. }));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn book_recipe_ids_follow_membership_order(ctx: &TestHarness) {
    let store = ctx.store();
    let book = store
        .create_book(&unique_title("Ordered Book"), None)
        .await
        .unwrap()
        .book;

    let mut expected = Vec::new();
    for prefix in ["First", "Second", "Third"] {
        let recipe = store
            .store_recipe(&new_recipe_titled(&unique_title(prefix)))
            .await
            .unwrap();
        store.add_recipe_to_book(book.id, recipe.id).await.unwrap();
        expected.push(recipe.id);
    }

    let detail = store.get_book(book.id).await.unwrap().unwrap();
    assert_eq!(detail.recipe_ids, expected);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stats_reflect_links(ctx: &TestHarness) {
    let store = ctx.store();
    let recipe = store
        .store_recipe(&new_recipe_titled(&unique_title("Stats")))
        .await
        .unwrap();
    let book = store
        .create_book(&unique_title("Stats Book"), None)
        .await
        .unwrap()
        .book;
    store.add_recipe_to_book(book.id, recipe.id).await.unwrap();

    let stats = store.stats().await.unwrap();

    assert!(stats.total_recipe_books >= 1);
    assert!(stats.total_recipe_book_links >= 1);
    assert!(stats.unique_recipes_in_books <= stats.total_recipe_book_links);
    assert!(stats.avg_recipes_per_book > 0.0);
}
