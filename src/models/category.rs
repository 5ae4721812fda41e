use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    nutrition::{Category, CategoryBounds, CategoryId, NutrientRange},
    schema::categories,
};

macro_rules! bounds_of {
    ($row:expr) => {
        CategoryBounds {
            calories: NutrientRange::new($row.calories_min, $row.calories_max),
            protein: NutrientRange::new($row.protein_min, $row.protein_max),
            total_fat: NutrientRange::new($row.total_fat_min, $row.total_fat_max),
            saturated_fat: NutrientRange::new($row.saturated_fat_min, $row.saturated_fat_max),
            trans_fat: NutrientRange::new($row.trans_fat_min, $row.trans_fat_max),
            cholesterol: NutrientRange::new($row.cholesterol_min, $row.cholesterol_max),
            carbohydrates: NutrientRange::new($row.carbohydrates_min, $row.carbohydrates_max),
            sugar: NutrientRange::new($row.sugar_min, $row.sugar_max),
            fiber: NutrientRange::new($row.fiber_min, $row.fiber_max),
            natrium: NutrientRange::new($row.natrium_min, $row.natrium_max),
            amino_acid: NutrientRange::new($row.amino_acid_min, $row.amino_acid_max),
            vitamin_d: NutrientRange::new($row.vitamin_d_min, $row.vitamin_d_max),
            magnesium: NutrientRange::new($row.magnesium_min, $row.magnesium_max),
            iron: NutrientRange::new($row.iron_min, $row.iron_max),
        }
    };
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct CategoryRow {
    pub id: CategoryId,
    pub name: String,
    pub calories_min: Option<f64>,
    pub calories_max: Option<f64>,
    pub protein_min: Option<f64>,
    pub protein_max: Option<f64>,
    pub total_fat_min: Option<f64>,
    pub total_fat_max: Option<f64>,
    pub saturated_fat_min: Option<f64>,
    pub saturated_fat_max: Option<f64>,
    pub trans_fat_min: Option<f64>,
    pub trans_fat_max: Option<f64>,
    pub cholesterol_min: Option<f64>,
    pub cholesterol_max: Option<f64>,
    pub carbohydrates_min: Option<f64>,
    pub carbohydrates_max: Option<f64>,
    pub sugar_min: Option<f64>,
    pub sugar_max: Option<f64>,
    pub fiber_min: Option<f64>,
    pub fiber_max: Option<f64>,
    pub natrium_min: Option<f64>,
    pub natrium_max: Option<f64>,
    pub amino_acid_min: Option<f64>,
    pub amino_acid_max: Option<f64>,
    pub vitamin_d_min: Option<f64>,
    pub vitamin_d_max: Option<f64>,
    pub magnesium_min: Option<f64>,
    pub magnesium_max: Option<f64>,
    pub iron_min: Option<f64>,
    pub iron_max: Option<f64>,
}

impl CategoryRow {
    pub fn to_category(&self) -> Category {
        Category {
            id: self.id,
            name: self.name.clone(),
            bounds: bounds_of!(self),
        }
    }
}

/// Body of `POST /categories`. Bounds left out are stored as NULL.
#[derive(Debug, Deserialize, Insertable)]
#[table_name = "categories"]
pub struct NewCategory {
    pub name: String,
    pub calories_min: Option<f64>,
    pub calories_max: Option<f64>,
    pub protein_min: Option<f64>,
    pub protein_max: Option<f64>,
    pub total_fat_min: Option<f64>,
    pub total_fat_max: Option<f64>,
    pub saturated_fat_min: Option<f64>,
    pub saturated_fat_max: Option<f64>,
    pub trans_fat_min: Option<f64>,
    pub trans_fat_max: Option<f64>,
    pub cholesterol_min: Option<f64>,
    pub cholesterol_max: Option<f64>,
    pub carbohydrates_min: Option<f64>,
    pub carbohydrates_max: Option<f64>,
    pub sugar_min: Option<f64>,
    pub sugar_max: Option<f64>,
    pub fiber_min: Option<f64>,
    pub fiber_max: Option<f64>,
    pub natrium_min: Option<f64>,
    pub natrium_max: Option<f64>,
    pub amino_acid_min: Option<f64>,
    pub amino_acid_max: Option<f64>,
    pub vitamin_d_min: Option<f64>,
    pub vitamin_d_max: Option<f64>,
    pub magnesium_min: Option<f64>,
    pub magnesium_max: Option<f64>,
    pub iron_min: Option<f64>,
    pub iron_max: Option<f64>,
}

impl NewCategory {
    pub fn bounds(&self) -> CategoryBounds {
        bounds_of!(self)
    }
}

// `Some(None)` clears a bound, `None` leaves it untouched.
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

/// Body of `PUT /categories/{id}`. Only the keys present in the request are
/// written; an explicit `null` removes that bound.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[table_name = "categories"]
pub struct CategoryChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub calories_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub calories_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub protein_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub protein_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_fat_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_fat_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub saturated_fat_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub saturated_fat_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub trans_fat_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub trans_fat_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cholesterol_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cholesterol_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub carbohydrates_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub carbohydrates_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sugar_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sugar_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fiber_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fiber_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub natrium_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub natrium_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub amino_acid_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub amino_acid_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub vitamin_d_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub vitamin_d_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub magnesium_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub magnesium_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub iron_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub iron_max: Option<Option<f64>>,
}

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        let bounds = [
            self.calories_min,
            self.calories_max,
            self.protein_min,
            self.protein_max,
            self.total_fat_min,
            self.total_fat_max,
            self.saturated_fat_min,
            self.saturated_fat_max,
            self.trans_fat_min,
            self.trans_fat_max,
            self.cholesterol_min,
            self.cholesterol_max,
            self.carbohydrates_min,
            self.carbohydrates_max,
            self.sugar_min,
            self.sugar_max,
            self.fiber_min,
            self.fiber_max,
            self.natrium_min,
            self.natrium_max,
            self.amino_acid_min,
            self.amino_acid_max,
            self.vitamin_d_min,
            self.vitamin_d_max,
            self.magnesium_min,
            self.magnesium_max,
            self.iron_min,
            self.iron_max,
        ];
        self.name.is_none() && bounds.iter().all(Option::is_none)
    }
}
