//! Recipe records: what extraction produces, what storage writes, what reads return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RecipeId;

/// A recipe that passed extraction validation.
///
/// List order is authoritative: ingredient `order_index` and instruction
/// `step_number` are assigned from position when the recipe is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub servings: Option<String>,
    pub total_time: Option<String>,
}

/// Everything written by one storage transaction.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub recipe: ValidatedRecipe,
    pub source_url: Option<String>,
    pub is_test: bool,
    pub embedding_type: String,
    pub embedding: Vec<f32>,
}

impl NewRecipe {
    /// Ingredient rows with zero-based `order_index` in list order.
    pub fn ingredient_rows(&self) -> Vec<Ingredient> {
        self.recipe
            .ingredients
            .iter()
            .enumerate()
            .map(|(i, text)| Ingredient {
                text: text.clone(),
                order_index: i as i32,
            })
            .collect()
    }

    /// Instruction rows with one-based `step_number` in list order.
    pub fn instruction_rows(&self) -> Vec<Instruction> {
        self.recipe
            .instructions
            .iter()
            .enumerate()
            .map(|(i, text)| Instruction {
                text: text.clone(),
                step_number: i as i32 + 1,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub text: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub text: String,
    pub step_number: i32,
}

/// A stored recipe with its children, ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub servings: Option<String>,
    pub total_time: Option<String>,
    pub source_url: Option<String>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<Instruction>,
}

impl Recipe {
    pub fn ingredient_texts(&self) -> Vec<String> {
        self.ingredients.iter().map(|i| i.text.clone()).collect()
    }

    pub fn instruction_texts(&self) -> Vec<String> {
        self.instructions.iter().map(|i| i.text.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeEmbedding {
    pub embedding_type: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeWithEmbeddings {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub embeddings: Vec<RecipeEmbedding>,
}

/// Row-level view used by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    pub title: String,
    pub servings: Option<String>,
    pub total_time: Option<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn new_recipe(ingredients: Vec<String>, instructions: Vec<String>) -> NewRecipe {
        NewRecipe {
            recipe: ValidatedRecipe {
                title: "Soup".into(),
                ingredients,
                instructions,
                servings: None,
                total_time: None,
            },
            source_url: None,
            is_test: false,
            embedding_type: "title_ingredients".into(),
            embedding: vec![0.0; 4],
        }
    }

    proptest! {
        #[test]
        fn ingredient_rows_are_zero_based_in_input_order(
            items in proptest::collection::vec(".{0,20}", 0..30)
        ) {
            let rows = new_recipe(items.clone(), vec![]).ingredient_rows();

            prop_assert_eq!(rows.len(), items.len());
            for (i, row) in rows.iter().enumerate() {
                prop_assert_eq!(row.order_index, i as i32);
                prop_assert_eq!(&row.text, &items[i]);
            }
        }

        #[test]
        fn instruction_rows_are_one_based_in_input_order(
            steps in proptest::collection::vec(".{0,20}", 0..30)
        ) {
            let rows = new_recipe(vec![], steps.clone()).instruction_rows();

            prop_assert_eq!(rows.len(), steps.len());
            for (i, row) in rows.iter().enumerate() {
                prop_assert_eq!(row.step_number, i as i32 + 1);
                prop_assert_eq!(&row.text, &steps[i]);
            }
        }
    }
}
