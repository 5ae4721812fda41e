use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    nutrition::{MaterialId, NutrientVector},
    schema::materials,
};

macro_rules! nutrients_of {
    ($row:expr) => {
        NutrientVector {
            calories: $row.calories,
            protein: $row.protein,
            total_fat: $row.total_fat,
            saturated_fat: $row.saturated_fat,
            trans_fat: $row.trans_fat,
            cholesterol: $row.cholesterol,
            carbohydrates: $row.carbohydrates,
            sugar: $row.sugar,
            fiber: $row.fiber,
            natrium: $row.natrium,
            amino_acid: $row.amino_acid,
            vitamin_d: $row.vitamin_d,
            magnesium: $row.magnesium,
            iron: $row.iron,
        }
    };
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct MaterialRow {
    pub id: MaterialId,
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub total_fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub trans_fat: Option<f64>,
    pub cholesterol: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugar: Option<f64>,
    pub fiber: Option<f64>,
    pub natrium: Option<f64>,
    pub amino_acid: Option<f64>,
    pub vitamin_d: Option<f64>,
    pub magnesium: Option<f64>,
    pub iron: Option<f64>,
    pub test_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl MaterialRow {
    pub fn nutrients(&self) -> NutrientVector {
        nutrients_of!(self)
    }
}

#[derive(Debug, Insertable)]
#[table_name = "materials"]
pub struct NewMaterial {
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub total_fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub trans_fat: Option<f64>,
    pub cholesterol: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugar: Option<f64>,
    pub fiber: Option<f64>,
    pub natrium: Option<f64>,
    pub amino_acid: Option<f64>,
    pub vitamin_d: Option<f64>,
    pub magnesium: Option<f64>,
    pub iron: Option<f64>,
    pub test_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Body of `POST /materials` and `PUT /materials/{id}`.
///
/// On update only the keys present are written.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[table_name = "materials"]
pub struct MaterialPayload {
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub total_fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub trans_fat: Option<f64>,
    pub cholesterol: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugar: Option<f64>,
    pub fiber: Option<f64>,
    pub natrium: Option<f64>,
    pub amino_acid: Option<f64>,
    pub vitamin_d: Option<f64>,
    pub magnesium: Option<f64>,
    pub iron: Option<f64>,
    pub test_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
}

impl MaterialPayload {
    pub fn nutrients(&self) -> NutrientVector {
        nutrients_of!(self)
    }

    pub fn into_new(
        self,
        owner: Option<String>,
        created_at: NaiveDateTime,
    ) -> Result<NewMaterial, AppError> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(AppError::BadRequest("Material name is required".to_string())),
        };
        Ok(NewMaterial {
            name,
            calories: self.calories,
            protein: self.protein,
            total_fat: self.total_fat,
            saturated_fat: self.saturated_fat,
            trans_fat: self.trans_fat,
            cholesterol: self.cholesterol,
            carbohydrates: self.carbohydrates,
            sugar: self.sugar,
            fiber: self.fiber,
            natrium: self.natrium,
            amino_acid: self.amino_acid,
            vitamin_d: self.vitamin_d,
            magnesium: self.magnesium,
            iron: self.iron,
            test_date: self.test_date,
            notes: self.notes,
            source: self.source,
            image_url: self.image_url,
            user_id: owner,
            created_at,
        })
    }

    /// Checks a partial update before it is written.
    pub fn validate_changes(&self) -> Result<(), AppError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::BadRequest("Material name must not be empty".to_string()));
        }
        let has_metadata = self.name.is_some()
            || self.test_date.is_some()
            || self.notes.is_some()
            || self.source.is_some()
            || self.image_url.is_some();
        if !has_metadata && self.nutrients() == NutrientVector::default() {
            return Err(AppError::BadRequest("No fields provided to update".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MaterialView {
    #[serde(flatten)]
    pub material: MaterialRow,
    pub categories: Vec<String>,
}
