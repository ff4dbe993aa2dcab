//! LLM prompts for the ingestion pipeline.

use crate::types::recipe::ValidatedRecipe;

/// System prompt for stripping scraped noise down to plain recipe text.
pub const CLEANUP_SYSTEM_PROMPT: &str = r#"You clean up messy text, usually scraped from recipe websites, and return well-formatted recipe text.

Your task is to:
1. Remove HTML tags, markup, JavaScript and CSS
2. Remove navigation, ads, promotional text, comments and reviews
3. Normalize whitespace and fix encoding problems
4. Keep ONLY recipe content

Format the output as:
- Recipe title on the first line
- Empty line
- "Ingredients:" followed by one ingredient per line, each prefixed with "- "
- Empty line
- "Instructions:" followed by numbered steps (1. 2. 3.)
- Prep time, cook time and servings when the source gives them

Keep exact quantities and fractions (1/2, 1/4). Keep preparation notes such as
"chopped" or "softened". Each ingredient and each step stays on ONE line.

If the text contains no recipe, return an empty response.
Return ONLY the cleaned recipe text, with no explanations."#;

/// System prompt for structured extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract a single recipe from clean recipe text into structured JSON.

Fields:
- title: the recipe name, never empty
- ingredients: one string per ingredient line, in the order given, quantities included
- instructions: one string per step, in the order given, without step numbers
- servings: yield as written (e.g. "4 servings", "24 cookies"), or null
- total_time: total time as written (e.g. "45 minutes"), or null

Do not invent ingredients or steps that are not in the text."#;

/// System prompt for adjudicating near-duplicate recipes.
pub const DEDUP_SYSTEM_PROMPT: &str = r#"You decide whether two recipes are the same dish.

Answer "duplicate" when they are essentially the same recipe with only minor
variations: wording, formatting, rounding of quantities, an optional garnish.
Answer "distinct" when a reasonable cook would consider them different recipes:
a different main ingredient, technique or result.

Give a one-sentence reason."#;

/// System prompt for reranking semantic search candidates.
pub const RERANK_SYSTEM_PROMPT: &str = r#"You rerank recipe search candidates for a user's query.

You receive JSON with the query, max_results and candidates (id, title, similarity,
ingredients_preview). Score each relevant candidate from 0.0 (irrelevant) to 1.0
(exactly what the user wants). Use only ids from the candidate list.
Return at most max_results entries, best first."#;

pub fn format_cleanup_prompt(raw_input: &str) -> String {
    format!("Please clean up this messy recipe data:\n\n{}", raw_input)
}

pub fn format_extraction_prompt(clean_text: &str) -> String {
    format!("Extract the recipe from this text:\n\n{}", clean_text)
}

/// Side-by-side comparison of a new recipe against a stored one.
pub fn format_dedup_prompt(new: &ValidatedRecipe, existing: &ValidatedRecipe) -> String {
    format!(
        "Compare the NEW recipe with the EXISTING recipe. \
         Decide if they are essentially the same dish with only minor variations.\n\n\
         NEW RECIPE:\n{}\n\nEXISTING RECIPE:\n{}",
        render_recipe(new),
        render_recipe(existing)
    )
}

fn render_recipe(recipe: &ValidatedRecipe) -> String {
    let ingredients = recipe
        .ingredients
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n");
    let instructions = recipe
        .instructions
        .iter()
        .enumerate()
        .map(|(n, step)| format!("{}. {}", n + 1, step))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Title: {}\nIngredients:\n{}\n\nInstructions:\n{}",
        recipe.title, ingredients, instructions
    )
}
