use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::material::MaterialRow;
use crate::{
    error::AppError,
    nutrition::{MaterialId, NutrientVector},
    schema::{recipe_materials, recipes},
};

pub type RecipeId = i64;

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct RecipeRow {
    pub id: RecipeId,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub steps: String,
    pub calories: f64,
    pub protein: f64,
    pub total_fat: f64,
    pub saturated_fat: f64,
    pub trans_fat: f64,
    pub cholesterol: f64,
    pub carbohydrates: f64,
    pub sugar: f64,
    pub fiber: f64,
    pub natrium: f64,
    pub amino_acid: f64,
    pub vitamin_d: f64,
    pub magnesium: f64,
    pub iron: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[table_name = "recipes"]
pub struct NewRecipe<'a> {
    pub user_id: Option<&'a str>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub category: &'a str,
    pub steps: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[table_name = "recipes"]
pub struct RecipeChanges<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub category: &'a str,
    pub steps: &'a str,
}

/// Denormalized nutrition totals stored on the recipe row.
#[derive(Debug, AsChangeset)]
#[table_name = "recipes"]
pub struct RecipeTotals {
    pub calories: f64,
    pub protein: f64,
    pub total_fat: f64,
    pub saturated_fat: f64,
    pub trans_fat: f64,
    pub cholesterol: f64,
    pub carbohydrates: f64,
    pub sugar: f64,
    pub fiber: f64,
    pub natrium: f64,
    pub amino_acid: f64,
    pub vitamin_d: f64,
    pub magnesium: f64,
    pub iron: f64,
}

impl From<&NutrientVector> for RecipeTotals {
    fn from(totals: &NutrientVector) -> Self {
        Self {
            calories: totals.calories.unwrap_or(0.0),
            protein: totals.protein.unwrap_or(0.0),
            total_fat: totals.total_fat.unwrap_or(0.0),
            saturated_fat: totals.saturated_fat.unwrap_or(0.0),
            trans_fat: totals.trans_fat.unwrap_or(0.0),
            cholesterol: totals.cholesterol.unwrap_or(0.0),
            carbohydrates: totals.carbohydrates.unwrap_or(0.0),
            sugar: totals.sugar.unwrap_or(0.0),
            fiber: totals.fiber.unwrap_or(0.0),
            natrium: totals.natrium.unwrap_or(0.0),
            amino_acid: totals.amino_acid.unwrap_or(0.0),
            vitamin_d: totals.vitamin_d.unwrap_or(0.0),
            magnesium: totals.magnesium.unwrap_or(0.0),
            iron: totals.iron.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize)]
#[table_name = "recipe_materials"]
pub struct RecipeMaterialRow {
    pub recipe_id: RecipeId,
    pub material_id: MaterialId,
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct MaterialQuantity {
    pub id: MaterialId,
    pub quantity: Option<f64>,
}

/// Body of `POST /recipes` and `PUT /recipes/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub materials: Option<Vec<MaterialQuantity>>,
    pub steps: Option<Vec<String>>,
}

/// A recipe request that passed validation.
#[derive(Debug, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub steps: String,
    pub materials: Vec<(MaterialId, f64)>,
}

impl RecipePayload {
    /// `default_quantity` is used for a material sent without a quantity, or
    /// with a quantity of zero.
    pub fn validate(self, default_quantity: f64) -> Result<RecipeDraft, AppError> {
        let (name, category, materials, steps) =
            match (self.name, self.category, self.materials, self.steps) {
                (Some(name), Some(category), Some(materials), Some(steps))
                    if !name.trim().is_empty() && !category.trim().is_empty() =>
                {
                    (name, category, materials, steps)
                }
                _ => return Err(AppError::BadRequest("Missing required fields".to_string())),
            };

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(materials.len());
        for material in materials {
            if !seen.insert(material.id) {
                return Err(AppError::BadRequest(format!(
                    "Material {} is listed more than once",
                    material.id
                )));
            }
            let quantity = match material.quantity {
                Some(quantity) if quantity < 0.0 || !quantity.is_finite() => {
                    return Err(AppError::BadRequest(format!(
                        "Invalid quantity for material {}",
                        material.id
                    )))
                }
                Some(quantity) if quantity > 0.0 => quantity,
                _ => default_quantity,
            };
            lines.push((material.id, quantity));
        }

        Ok(RecipeDraft {
            name,
            description: self.description,
            category,
            steps: steps.join("\n"),
            materials: lines,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeMaterialView {
    pub material_id: MaterialId,
    pub quantity: f64,
    pub material: Option<MaterialRow>,
}

#[derive(Debug, Serialize)]
pub struct RecipeView {
    #[serde(flatten)]
    pub recipe: RecipeRow,
    pub recipe_materials: Vec<RecipeMaterialView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> RecipePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn draft_joins_steps_and_defaults_quantity() {
        let draft = payload(
            r#"{
                "name": "Tofu scramble",
                "category": "high-protein",
                "materials": [{"id": 4, "quantity": 200}, {"id": 9}, {"id": 11, "quantity": 0}],
                "steps": ["Crumble the tofu", "Fry for 5 minutes"]
            }"#,
        )
        .validate(1.0)
        .unwrap();

        assert_eq!(draft.steps, "Crumble the tofu\nFry for 5 minutes");
        assert_eq!(draft.materials, vec![(4, 200.0), (9, 1.0), (11, 1.0)]);
        assert_eq!(draft.description, None);
    }

    #[test]
    fn configured_default_quantity_is_used() {
        let draft = payload(
            r#"{"name": "Oats", "category": "fiber", "materials": [{"id": 1}], "steps": []}"#,
        )
        .validate(100.0)
        .unwrap();

        assert_eq!(draft.materials, vec![(1, 100.0)]);
    }

    #[test]
    fn required_fields_are_enforced() {
        for json in [
            r#"{"category": "x", "materials": [], "steps": []}"#,
            r#"{"name": "x", "materials": [], "steps": []}"#,
            r#"{"name": "x", "category": "x", "steps": []}"#,
            r#"{"name": "x", "category": "x", "materials": []}"#,
            r#"{"name": " ", "category": "x", "materials": [], "steps": []}"#,
        ] {
            assert!(matches!(payload(json).validate(1.0), Err(AppError::BadRequest(_))), "{json}");
        }
    }

    #[test]
    fn negative_and_duplicate_materials_are_rejected() {
        let negative = payload(
            r#"{
                "name": "x",
                "category": "x",
                "materials": [{"id": 1, "quantity": -5}],
                "steps": []
            }"#,
        );
        assert!(matches!(negative.validate(1.0), Err(AppError::BadRequest(_))));

        let duplicate = payload(
            r#"{"name": "x", "category": "x", "materials": [{"id": 1}, {"id": 1}], "steps": []}"#,
        );
        assert!(matches!(duplicate.validate(1.0), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn totals_fill_absent_fields_with_zero() {
        let mut totals = NutrientVector::default();
        totals.calories = Some(300.0);

        let row = RecipeTotals::from(&totals);

        assert_eq!(row.calories, 300.0);
        assert_eq!(row.iron, 0.0);
    }
}
