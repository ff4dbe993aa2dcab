//! Operator CLI over the recipe service.
//!
//! Every command prints one JSON document to stdout.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forkfolio_core::{config::Config, ServerDeps};
use recipe_ingestion::{IngestRequest, RecipeBookId, RecipeId};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "forkfolio")]
#[command(about = "Recipe ingestion and search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Run raw recipe text through the pipeline (stdin unless --file)
    Ingest {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Return an existing near-identical recipe instead of storing a new one
        #[arg(long)]
        dedupe: bool,
        #[arg(long)]
        source_url: Option<String>,
        /// Mark the stored recipe as test data
        #[arg(long)]
        test: bool,
    },

    /// Run only the cleanup stage and print the cleaned text
    Cleanup {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        source_url: Option<String>,
    },

    /// Extract a structured recipe from raw text without storing it
    Extract {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Semantic search over stored recipes
    Search {
        query: String,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Fetch a recipe
    Get {
        id: String,
        #[arg(long)]
        embeddings: bool,
    },

    /// List recipes, newest first
    List {
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Delete a recipe and its book memberships
    Delete { id: String },

    /// Recipe books
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
}

#[derive(Subcommand)]
enum BookCommands {
    /// Create a book, or return the existing one with the same name
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Show a book and its recipe ids
    Get { id: String },

    List {
        #[arg(long)]
        limit: Option<i64>,
    },

    Delete { id: String },

    /// Add a recipe to a book
    Add { book: String, recipe: String },

    /// Remove a recipe from a book
    Remove { book: String, recipe: String },

    /// Books containing a recipe
    ForRecipe { recipe: String },

    Stats,
}

#[derive(Serialize)]
struct Migrated {
    migrated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,forkfolio_core=debug,recipe_ingestion=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let deps = ServerDeps::from_config(&config).await?;
    let result = run(&deps, cli.command).await;
    deps.shutdown().await;
    result
}

async fn run(deps: &ServerDeps, command: Commands) -> Result<()> {
    let service = deps.recipe_service();

    match command {
        Commands::Migrate => {
            deps.db.migrate().await?;
            print_json(&Migrated { migrated: true })
        }
        Commands::Ingest {
            file,
            dedupe,
            source_url,
            test,
        } => {
            let raw_input = read_input(file)?;
            let mut request = IngestRequest::new(raw_input).with_deduplication(dedupe);
            if let Some(url) = source_url {
                request = request.with_source_url(url);
            }
            if test {
                request = request.as_test();
            }
            print_json(&service.process_and_store(request).await)
        }
        Commands::Cleanup { file, source_url } => {
            let raw_text = read_input(file)?;
            print_result(service.cleanup(&raw_text, source_url).await)
        }
        Commands::Extract { file } => {
            let raw_input = read_input(file)?;
            print_result(service.extract_only(&raw_input).await)
        }
        Commands::Search { query, limit } => {
            print_json(&service.semantic_search(&query, limit).await)
        }
        Commands::Get { id, embeddings } => {
            let id = recipe_id(&id)?;
            if embeddings {
                print_result(service.get_recipe_with_embeddings(id).await)
            } else {
                print_result(service.get_recipe(id).await)
            }
        }
        Commands::List { limit } => print_result(service.list_recipes(limit).await),
        Commands::Delete { id } => print_result(service.delete_recipe(recipe_id(&id)?).await),
        Commands::Book { command } => match command {
            BookCommands::Create { name, description } => {
                print_result(service.create_book(&name, description.as_deref()).await)
            }
            BookCommands::Get { id } => print_result(service.get_book(book_id(&id)?).await),
            BookCommands::List { limit } => print_result(service.list_books(limit).await),
            BookCommands::Delete { id } => {
                print_result(service.delete_book(book_id(&id)?).await)
            }
            BookCommands::Add { book, recipe } => print_result(
                service
                    .add_recipe_to_book(book_id(&book)?, recipe_id(&recipe)?)
                    .await,
            ),
            BookCommands::Remove { book, recipe } => print_result(
                service
                    .remove_recipe_from_book(book_id(&book)?, recipe_id(&recipe)?)
                    .await,
            ),
            BookCommands::ForRecipe { recipe } => {
                print_result(service.books_for_recipe(recipe_id(&recipe)?).await)
            }
            BookCommands::Stats => print_result(service.book_stats().await),
        },
    }
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn recipe_id(raw: &str) -> Result<RecipeId> {
    RecipeId::parse(raw).with_context(|| format!("Invalid recipe id: {raw}"))
}

fn book_id(raw: &str) -> Result<RecipeBookId> {
    RecipeBookId::parse(raw).with_context(|| format!("Invalid recipe book id: {raw}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(untagged)]
enum Outcome<T> {
    Ok(T),
    Err { error: forkfolio_core::ServiceError },
}

/// Print either the value or `{ "error": { stage, kind, message } }`.
fn print_result<T: Serialize>(result: forkfolio_core::ServiceResult<T>) -> Result<()> {
    match result {
        Ok(value) => print_json(&Outcome::Ok(value)),
        Err(error) => print_json(&Outcome::<T>::Err { error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_and_extract_parse() {
        let cli = Cli::try_parse_from([
            "forkfolio",
            "cleanup",
            "--file",
            "page.html",
            "--source-url",
            "https://example.org/cookies",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cleanup { file: Some(_), source_url: Some(_) }
        ));

        let cli = Cli::try_parse_from(["forkfolio", "extract"]).unwrap();
        assert!(matches!(cli.command, Commands::Extract { file: None }));
    }

    #[test]
    fn test_book_add_takes_two_ids() {
        assert!(Cli::try_parse_from(["forkfolio", "book", "add", "only-one"]).is_err());
    }
}
