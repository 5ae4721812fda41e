//! Category fitting and recipe nutrition totals.
//!
//! Everything in here works on values that were already fetched from storage.
//! Loading categories or materials and writing the results back is left to
//! `query`, so both [`classify`] and [`aggregate`] can be called from any thread
//! with no coordination.
//!
//! Nutrient values are expressed per 100 reference units of a material (usually
//! grams), which is why [`NutrientVector::scaled`] divides the quantity by 100.
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CategoryId = i64;
pub type MaterialId = i64;

const REFERENCE_UNITS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientField {
    Calories,
    Protein,
    TotalFat,
    SaturatedFat,
    TransFat,
    Cholesterol,
    Carbohydrates,
    Sugar,
    Fiber,
    Natrium,
    AminoAcid,
    VitaminD,
    Magnesium,
    Iron,
}

impl NutrientField {
    pub const ALL: [NutrientField; 14] = [
        NutrientField::Calories,
        NutrientField::Protein,
        NutrientField::TotalFat,
        NutrientField::SaturatedFat,
        NutrientField::TransFat,
        NutrientField::Cholesterol,
        NutrientField::Carbohydrates,
        NutrientField::Sugar,
        NutrientField::Fiber,
        NutrientField::Natrium,
        NutrientField::AminoAcid,
        NutrientField::VitaminD,
        NutrientField::Magnesium,
        NutrientField::Iron,
    ];

    /// Column name shared by `materials`, `recipes` and the `_min`/`_max`
    /// pairs of `categories`.
    pub fn name(self) -> &'static str {
        match self {
            NutrientField::Calories => "calories",
            NutrientField::Protein => "protein",
            NutrientField::TotalFat => "total_fat",
            NutrientField::SaturatedFat => "saturated_fat",
            NutrientField::TransFat => "trans_fat",
            NutrientField::Cholesterol => "cholesterol",
            NutrientField::Carbohydrates => "carbohydrates",
            NutrientField::Sugar => "sugar",
            NutrientField::Fiber => "fiber",
            NutrientField::Natrium => "natrium",
            NutrientField::AminoAcid => "amino_acid",
            NutrientField::VitaminD => "vitamin_d",
            NutrientField::Magnesium => "magnesium",
            NutrientField::Iron => "iron",
        }
    }
}

impl fmt::Display for NutrientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nutrient profile of a material, or the totals of a recipe.
///
/// Every field may be absent. Absent counts as `0` both when summing and when
/// comparing against category bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NutrientVector {
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
}

impl NutrientVector {
    /// All fourteen fields present and set to zero.
    pub fn zero() -> Self {
        let mut vector = NutrientVector::default();
        for field in NutrientField::ALL {
            vector.set(field, Some(0.0));
        }
        vector
    }

    pub fn get(&self, field: NutrientField) -> Option<f64> {
        match field {
            NutrientField::Calories => self.calories,
            NutrientField::Protein => self.protein,
            NutrientField::TotalFat => self.total_fat,
            NutrientField::SaturatedFat => self.saturated_fat,
            NutrientField::TransFat => self.trans_fat,
            NutrientField::Cholesterol => self.cholesterol,
            NutrientField::Carbohydrates => self.carbohydrates,
            NutrientField::Sugar => self.sugar,
            NutrientField::Fiber => self.fiber,
            NutrientField::Natrium => self.natrium,
            NutrientField::AminoAcid => self.amino_acid,
            NutrientField::VitaminD => self.vitamin_d,
            NutrientField::Magnesium => self.magnesium,
            NutrientField::Iron => self.iron,
        }
    }

    pub fn set(&mut self, field: NutrientField, value: Option<f64>) {
        let slot = match field {
            NutrientField::Calories => &mut self.calories,
            NutrientField::Protein => &mut self.protein,
            NutrientField::TotalFat => &mut self.total_fat,
            NutrientField::SaturatedFat => &mut self.saturated_fat,
            NutrientField::TransFat => &mut self.trans_fat,
            NutrientField::Cholesterol => &mut self.cholesterol,
            NutrientField::Carbohydrates => &mut self.carbohydrates,
            NutrientField::Sugar => &mut self.sugar,
            NutrientField::Fiber => &mut self.fiber,
            NutrientField::Natrium => &mut self.natrium,
            NutrientField::AminoAcid => &mut self.amino_acid,
            NutrientField::VitaminD => &mut self.vitamin_d,
            NutrientField::Magnesium => &mut self.magnesium,
            NutrientField::Iron => &mut self.iron,
        };
        *slot = value;
    }

    /// The field's value, with absent read as zero.
    pub fn value(&self, field: NutrientField) -> f64 {
        self.get(field).unwrap_or(0.0)
    }

    /// Contribution of `quantity` reference units of this material.
    pub fn scaled(&self, quantity: f64) -> Self {
        let factor = quantity / REFERENCE_UNITS;
        let mut scaled = NutrientVector::default();
        for field in NutrientField::ALL {
            scaled.set(field, Some(self.value(field) * factor));
        }
        scaled
    }

    pub fn add(&self, other: &NutrientVector) -> Self {
        let mut sum = NutrientVector::default();
        for field in NutrientField::ALL {
            sum.set(field, Some(self.value(field) + other.value(field)));
        }
        sum
    }
}

/// How a stored bound of exactly `0` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundPolicy {
    /// `0` means "no bound". Categories written before bounds became explicit
    /// rely on this.
    Legacy,
    /// Only an absent bound is unset; `0` is a real limit.
    Strict,
}

impl Default for BoundPolicy {
    fn default() -> Self {
        BoundPolicy::Legacy
    }
}

impl BoundPolicy {
    fn effective(self, bound: Option<f64>) -> Option<f64> {
        let bound = bound.filter(|b| !b.is_nan());
        match self {
            BoundPolicy::Legacy => bound.filter(|b| *b != 0.0),
            BoundPolicy::Strict => bound,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl NutrientRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn admits(&self, value: f64, policy: BoundPolicy) -> bool {
        let above_min = policy.effective(self.min).map_or(true, |min| value >= min);
        let below_max = policy.effective(self.max).map_or(true, |max| value <= max);
        above_min && below_max
    }
}

/// Per-field ranges of a category. A field with neither bound set does not
/// constrain anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBounds {
    #[serde(default)]
    pub calories: NutrientRange,
    #[serde(default)]
    pub protein: NutrientRange,
    #[serde(default)]
    pub total_fat: NutrientRange,
    #[serde(default)]
    pub saturated_fat: NutrientRange,
    #[serde(default)]
    pub trans_fat: NutrientRange,
    #[serde(default)]
    pub cholesterol: NutrientRange,
    #[serde(default)]
    pub carbohydrates: NutrientRange,
    #[serde(default)]
    pub sugar: NutrientRange,
    #[serde(default)]
    pub fiber: NutrientRange,
    #[serde(default)]
    pub natrium: NutrientRange,
    #[serde(default)]
    pub amino_acid: NutrientRange,
    #[serde(default)]
    pub vitamin_d: NutrientRange,
    #[serde(default)]
    pub magnesium: NutrientRange,
    #[serde(default)]
    pub iron: NutrientRange,
}

impl CategoryBounds {
    pub fn range(&self, field: NutrientField) -> NutrientRange {
        match field {
            NutrientField::Calories => self.calories,
            NutrientField::Protein => self.protein,
            NutrientField::TotalFat => self.total_fat,
            NutrientField::SaturatedFat => self.saturated_fat,
            NutrientField::TransFat => self.trans_fat,
            NutrientField::Cholesterol => self.cholesterol,
            NutrientField::Carbohydrates => self.carbohydrates,
            NutrientField::Sugar => self.sugar,
            NutrientField::Fiber => self.fiber,
            NutrientField::Natrium => self.natrium,
            NutrientField::AminoAcid => self.amino_acid,
            NutrientField::VitaminD => self.vitamin_d,
            NutrientField::Magnesium => self.magnesium,
            NutrientField::Iron => self.iron,
        }
    }

    /// Rejects a field whose min is greater than its max. Only checked when
    /// both are present.
    pub fn validate(&self) -> Result<(), NutritionError> {
        for field in NutrientField::ALL {
            if let NutrientRange {
                min: Some(min),
                max: Some(max),
            } = self.range(field)
            {
                if min > max {
                    return Err(NutritionError::MalformedBound { field, min, max });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub bounds: CategoryBounds,
}

impl Category {
    /// True when every field of `material` lies inside this category's ranges.
    pub fn admits(&self, material: &NutrientVector, policy: BoundPolicy) -> bool {
        NutrientField::ALL
            .iter()
            .all(|&field| self.bounds.range(field).admits(material.value(field), policy))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NutritionError {
    #[error("material {0} was not resolved")]
    MissingMaterial(MaterialId),

    #[error("{field} bounds are inverted: min {min} is greater than max {max}")]
    MalformedBound {
        field: NutrientField,
        min: f64,
        max: f64,
    },
}

/// Ids of every category the material fits, in the order the categories were
/// given. An empty result is a valid answer; callers decide what it means.
pub fn classify(
    material: &NutrientVector,
    categories: &[Category],
    policy: BoundPolicy,
) -> Vec<CategoryId> {
    categories
        .iter()
        .filter(|category| category.admits(material, policy))
        .map(|category| category.id)
        .collect()
}

/// One line of a recipe: a material (once resolved) and how much of it is used.
#[derive(Debug, Clone, Copy)]
pub struct Portion<'a> {
    pub material_id: MaterialId,
    pub nutrients: Option<&'a NutrientVector>,
    pub quantity: f64,
}

/// Sums the scaled nutrients of every portion. Fails on the first portion
/// whose material was not resolved rather than counting it as zero.
pub fn aggregate<'a, I>(portions: I) -> Result<NutrientVector, NutritionError>
where
    I: IntoIterator<Item = Portion<'a>>,
{
    portions
        .into_iter()
        .try_fold(NutrientVector::zero(), |totals, portion| {
            let nutrients = portion
                .nutrients
                .ok_or(NutritionError::MissingMaterial(portion.material_id))?;
            Ok(totals.add(&nutrients.scaled(portion.quantity)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: CategoryId, name: &str, bounds: CategoryBounds) -> Category {
        Category {
            id,
            name: name.to_string(),
            bounds,
        }
    }

    fn material(calories: f64, protein: f64, carbohydrates: f64) -> NutrientVector {
        let mut vector = NutrientVector::zero();
        vector.calories = Some(calories);
        vector.protein = Some(protein);
        vector.carbohydrates = Some(carbohydrates);
        vector
    }

    fn assert_close(left: &NutrientVector, right: &NutrientVector) {
        for field in NutrientField::ALL {
            let (l, r) = (left.value(field), right.value(field));
            assert!((l - r).abs() < 1e-9, "{field}: {l} != {r}");
        }
    }

    #[test]
    fn unbounded_category_matches_anything() {
        let open = category(1, "everything", CategoryBounds::default());

        for vector in [
            NutrientVector::default(),
            material(900.0, 0.0, 80.0),
            material(-3.0, 1e6, 0.5),
        ] {
            assert_eq!(classify(&vector, &[open.clone()], BoundPolicy::Legacy), vec![1]);
            assert_eq!(classify(&vector, &[open.clone()], BoundPolicy::Strict), vec![1]);
        }
    }

    #[test]
    fn min_above_value_excludes_category() {
        let mut bounds = CategoryBounds::default();
        bounds.protein = NutrientRange::new(Some(25.0), None);
        let strict_protein = category(7, "very-high-protein", bounds);

        let assigned = classify(
            &material(500.0, 20.0, 10.0),
            &[strict_protein],
            BoundPolicy::Legacy,
        );

        assert!(assigned.is_empty());
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut bounds = CategoryBounds::default();
        bounds.calories = NutrientRange::new(Some(100.0), Some(200.0));
        let medium = category(3, "medium", bounds);

        let fits = |calories| {
            !classify(&material(calories, 0.0, 0.0), &[medium.clone()], BoundPolicy::Legacy)
                .is_empty()
        };

        assert!(fits(100.0));
        assert!(fits(200.0));
        assert!(!fits(99.5));
        assert!(!fits(200.5));
    }

    #[test]
    fn zero_min_is_ignored_under_legacy_policy() {
        let mut bounds = CategoryBounds::default();
        bounds.calories = NutrientRange::new(Some(0.0), None);
        let zero_floor = category(4, "zero-floor", bounds);
        let mut negative = NutrientVector::default();
        negative.calories = Some(-5.0);

        assert_eq!(classify(&negative, &[zero_floor.clone()], BoundPolicy::Legacy), vec![4]);
        assert!(classify(&negative, &[zero_floor], BoundPolicy::Strict).is_empty());
    }

    #[test]
    fn zero_max_is_ignored_under_legacy_policy() {
        let mut bounds = CategoryBounds::default();
        bounds.trans_fat = NutrientRange::new(None, Some(0.0));
        let trans_fat_free = category(5, "trans-fat-free", bounds);
        let mut vector = NutrientVector::zero();
        vector.trans_fat = Some(1.5);

        assert_eq!(classify(&vector, &[trans_fat_free.clone()], BoundPolicy::Legacy), vec![5]);
        assert!(classify(&vector, &[trans_fat_free], BoundPolicy::Strict).is_empty());
    }

    #[test]
    fn absent_material_field_compares_as_zero() {
        let mut bounds = CategoryBounds::default();
        bounds.fiber = NutrientRange::new(Some(3.0), None);
        let fibrous = category(6, "fibrous", bounds);
        let mut low_sugar_bounds = CategoryBounds::default();
        low_sugar_bounds.sugar = NutrientRange::new(None, Some(5.0));
        let low_sugar = category(8, "low-sugar", low_sugar_bounds);

        let result = classify(
            &NutrientVector::default(),
            &[fibrous, low_sugar],
            BoundPolicy::Legacy,
        );

        assert_eq!(result, vec![8]);
    }

    #[test]
    fn classify_keeps_category_order() {
        let categories: Vec<Category> = [9, 2, 5]
            .iter()
            .map(|&id| category(id, "any", CategoryBounds::default()))
            .collect();

        let assigned = classify(&material(1.0, 1.0, 1.0), &categories, BoundPolicy::Legacy);

        assert_eq!(assigned, vec![9, 2, 5]);
    }

    #[test]
    fn high_protein_but_not_low_carb() {
        let mut high_protein = CategoryBounds::default();
        high_protein.protein.min = Some(15.0);
        let mut low_carb = CategoryBounds::default();
        low_carb.carbohydrates.max = Some(5.0);
        let categories = vec![
            category(1, "high-protein", high_protein),
            category(2, "low-carb", low_carb),
        ];

        let ids = classify(&material(500.0, 20.0, 10.0), &categories, BoundPolicy::Legacy);
        let names: Vec<&str> = categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| c.name.as_str())
            .collect();

        assert_eq!(names, vec!["high-protein"]);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut bounds = CategoryBounds::default();
        bounds.iron = NutrientRange::new(Some(8.0), Some(2.0));

        assert_eq!(
            bounds.validate(),
            Err(NutritionError::MalformedBound {
                field: NutrientField::Iron,
                min: 8.0,
                max: 2.0
            })
        );

        bounds.iron = NutrientRange::new(Some(2.0), Some(2.0));
        assert_eq!(bounds.validate(), Ok(()));
    }

    #[test]
    fn empty_recipe_is_all_zero() {
        let totals = aggregate(Vec::new()).unwrap();

        assert_eq!(totals, NutrientVector::zero());
        for field in NutrientField::ALL {
            assert_eq!(totals.get(field), Some(0.0));
        }
    }

    #[test]
    fn hundred_units_reproduce_the_material() {
        let mut vector = material(321.0, 12.5, 40.25);
        vector.iron = Some(2.75);
        vector.vitamin_d = Some(0.125);

        let totals = aggregate(vec![Portion {
            material_id: 1,
            nutrients: Some(&vector),
            quantity: 100.0,
        }])
        .unwrap();

        for field in NutrientField::ALL {
            assert_eq!(totals.value(field), vector.value(field), "{field}");
        }
    }

    #[test]
    fn split_portions_equal_a_single_one() {
        let vector = material(500.0, 20.0, 10.0);
        let portion = |quantity| Portion {
            material_id: 1,
            nutrients: Some(&vector),
            quantity,
        };

        let halves = aggregate(vec![portion(50.0), portion(50.0)]).unwrap();
        let whole = aggregate(vec![portion(100.0)]).unwrap();

        assert_close(&halves, &whole);
    }

    #[test]
    fn zero_quantity_contributes_nothing() {
        let vector = material(500.0, 20.0, 10.0);

        let totals = aggregate(vec![Portion {
            material_id: 1,
            nutrients: Some(&vector),
            quantity: 0.0,
        }])
        .unwrap();

        assert_eq!(totals, NutrientVector::zero());
    }

    #[test]
    fn absent_nutrients_sum_as_zero() {
        let mut sparse = NutrientVector::default();
        sparse.sugar = Some(4.0);

        let totals = aggregate(vec![Portion {
            material_id: 3,
            nutrients: Some(&sparse),
            quantity: 200.0,
        }])
        .unwrap();

        assert_eq!(totals.sugar, Some(8.0));
        assert_eq!(totals.calories, Some(0.0));
    }

    #[test]
    fn recipe_totals_scale_by_quantity() {
        let a = material(100.0, 10.0, 0.0);
        let b = material(200.0, 0.0, 0.0);

        let totals = aggregate(vec![
            Portion {
                material_id: 1,
                nutrients: Some(&a),
                quantity: 200.0,
            },
            Portion {
                material_id: 2,
                nutrients: Some(&b),
                quantity: 50.0,
            },
        ])
        .unwrap();

        assert_eq!(totals.calories, Some(300.0));
        assert_eq!(totals.protein, Some(20.0));
        assert_eq!(totals.carbohydrates, Some(0.0));
    }

    #[test]
    fn unresolved_material_fails_aggregation() {
        let a = material(100.0, 10.0, 0.0);

        let result = aggregate(vec![
            Portion {
                material_id: 1,
                nutrients: Some(&a),
                quantity: 100.0,
            },
            Portion {
                material_id: 42,
                nutrients: None,
                quantity: 100.0,
            },
        ]);

        assert_eq!(result, Err(NutritionError::MissingMaterial(42)));
    }
}
