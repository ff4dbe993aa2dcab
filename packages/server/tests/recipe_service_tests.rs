//! End-to-end tests of the recipe service over Postgres with a scripted gateway.

mod common;

use crate::common::{gateway_for, raw_recipe_text, unique_title, TestHarness};
use recipe_ingestion::{ErrorKind, GatewayError, IngestRequest, Stage};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn process_and_store_creates_recipe(ctx: &TestHarness) {
    let title = unique_title("Chocolate Chip Cookies");
    let service = ctx.service(gateway_for(&title));

    let response = service
        .process_and_store(
            IngestRequest::new(raw_recipe_text(&title))
                .with_source_url("https://example.org/cookies")
                .as_test(),
        )
        .await;

    assert!(response.error.is_none(), "{:?}", response.error);
    assert!(response.created);
    let recipe = response.recipe.unwrap();
    assert!(recipe.title.contains("Chocolate Chip Cookies"));
    assert_eq!(recipe.ingredients.len(), 3);
    assert_eq!(recipe.instructions.len(), 2);
    assert_eq!(recipe.source_url.as_deref(), Some("https://example.org/cookies"));

    let fetched = service.get_recipe(recipe.id).await.unwrap();
    assert_eq!(fetched.title, recipe.title);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn deduplication_returns_existing_recipe(ctx: &TestHarness) {
    let title = unique_title("Dedup Brownies");
    let service = ctx.service(gateway_for(&title));
    let request = IngestRequest::new(raw_recipe_text(&title))
        .with_deduplication(true)
        .as_test();

    let first = service.process_and_store(request.clone()).await;
    let second = service.process_and_store(request).await;

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.recipe_id, second.recipe_id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn without_dedup_the_same_text_is_stored_twice(ctx: &TestHarness) {
    let title = unique_title("Twice Muffins");
    let service = ctx.service(gateway_for(&title));
    let request = IngestRequest::new(raw_recipe_text(&title)).as_test();

    let first = service.process_and_store(request.clone()).await;
    let second = service.process_and_store(request).await;

    assert!(first.created && second.created);
    assert_ne!(first.recipe_id, second.recipe_id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn short_input_never_reaches_storage(ctx: &TestHarness) {
    let gateway = gateway_for("unused");
    let service = ctx.service(gateway.clone());

    let response = service.process_and_store(IngestRequest::new("  soup  ")).await;

    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.stage, Some(Stage::Received));
    assert!(gateway.calls().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn embedding_failure_stores_nothing(ctx: &TestHarness) {
    let title = unique_title("No Vector Stew");
    let gateway =
        gateway_for(&title).fail_embed_with(GatewayError::Unavailable("embeddings down".into()));
    let service = ctx.service(gateway);

    let response = service
        .process_and_store(IngestRequest::new(raw_recipe_text(&title)))
        .await;

    let error = response.error.unwrap();
    assert_eq!(error.stage, Some(Stage::Embedding));
    assert_eq!(error.kind, ErrorKind::UpstreamUnavailable);

    let stored = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recipes WHERE title = $1")
        .bind(&title)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn search_finds_the_ingested_recipe_first(ctx: &TestHarness) {
    let title = unique_title("Search Lasagna");
    let gateway = gateway_for(&title);
    let service = ctx.service(gateway.clone());

    let stored = service
        .process_and_store(IngestRequest::new(raw_recipe_text(&title)).as_test())
        .await;
    let recipe = stored.recipe.unwrap();

    // Make the query embed to exactly the stored recipe's vector.
    let with_embeddings = service.get_recipe_with_embeddings(recipe.id).await.unwrap();
    let gateway = gateway.with_embedding("lasagna please", with_embeddings.embeddings[0].vector.clone());
    let service = ctx.service(gateway);

    let response = service.semantic_search("  \"lasagna please\" ", Some(1)).await;

    assert!(response.error.is_none());
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, recipe.id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn book_flow_through_the_service(ctx: &TestHarness) {
    let title = unique_title("Book Flow Pie");
    let service = ctx.service(gateway_for(&title));
    let recipe_id = service
        .process_and_store(IngestRequest::new(raw_recipe_text(&title)).as_test())
        .await
        .recipe_id
        .unwrap();

    let name = unique_title("Desserts");
    let book = service.create_book(&name, None).await.unwrap().book;

    assert!(service.add_recipe_to_book(book.id, recipe_id).await.unwrap().added);
    assert!(!service.add_recipe_to_book(book.id, recipe_id).await.unwrap().added);

    let by_name = service.get_book_by_name(&name.to_lowercase()).await.unwrap();
    assert_eq!(by_name.recipe_ids, vec![recipe_id]);

    let books = service.books_for_recipe(recipe_id).await.unwrap();
    assert_eq!(books[0].id, book.id);

    service.delete_recipe(recipe_id).await.unwrap();
    let err = service.get_recipe(recipe_id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(service.get_book(book.id).await.unwrap().recipe_ids.is_empty());
}
