use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::{mysql::Mysql, prelude::*};
use log::info;

use super::{last_insert_id, material};
use crate::{
    error::AppError,
    models::{
        ListQuery, NewRecipe, RecipeChanges, RecipeDraft, RecipeId, RecipeMaterialRow,
        RecipeMaterialView, RecipeRow, RecipeStats, RecipeTotals, RecipeView,
    },
    nutrition::{aggregate, MaterialId, NutrientVector, NutritionError, Portion},
    schema::{recipe_materials, recipes},
};

fn not_found(id: RecipeId) -> AppError {
    AppError::NotFound(format!("Recipe with ID {id} not found"))
}

struct RecipeFilter {
    search: Option<String>,
    owner: Option<String>,
    category: Option<String>,
}

impl RecipeFilter {
    fn boxed(&self) -> recipes::BoxedQuery<'static, Mysql> {
        let mut query = recipes::table.into_boxed();
        if let Some(pattern) = &self.search {
            query = query.filter(recipes::name.like(pattern.clone()));
        }
        if let Some(owner) = &self.owner {
            query = query.filter(recipes::user_id.eq(owner.clone()));
        }
        if let Some(category) = &self.category {
            query = query.filter(recipes::category.eq(category.clone()));
        }
        query
    }
}

/// Recipes matching the list query, with their materials resolved from the
/// researcher realm.
pub(crate) fn list_recipes(
    nutritionist: &MysqlConnection,
    researcher: &MysqlConnection,
    query: &ListQuery,
    category_name: Option<&str>,
    owner: Option<&str>,
) -> Result<(Vec<RecipeView>, i64), AppError> {
    let filter = RecipeFilter {
        search: query.search_pattern(),
        owner: owner.map(str::to_string),
        category: category_name.map(str::to_string),
    };

    let total: i64 = filter.boxed().count().get_result(nutritionist)?;
    let rows = filter
        .boxed()
        .order(recipes::id.asc())
        .limit(query.limit())
        .offset(query.offset())
        .load::<RecipeRow>(nutritionist)?;

    Ok((with_materials(nutritionist, researcher, rows)?, total))
}

pub(crate) fn find_recipe(
    conn: &MysqlConnection,
    recipe_id: RecipeId,
) -> Result<RecipeRow, AppError> {
    recipes::table
        .find(recipe_id)
        .first::<RecipeRow>(conn)
        .optional()?
        .ok_or_else(|| not_found(recipe_id))
}

pub(crate) fn recipe_view(
    nutritionist: &MysqlConnection,
    researcher: &MysqlConnection,
    recipe_id: RecipeId,
) -> Result<RecipeView, AppError> {
    let recipe = find_recipe(nutritionist, recipe_id)?;
    let mut views = with_materials(nutritionist, researcher, vec![recipe])?;
    views.pop().ok_or_else(|| not_found(recipe_id))
}

fn with_materials(
    nutritionist: &MysqlConnection,
    researcher: &MysqlConnection,
    rows: Vec<RecipeRow>,
) -> Result<Vec<RecipeView>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let recipe_ids: Vec<RecipeId> = rows.iter().map(|row| row.id).collect();
    let lines = recipe_materials::table
        .filter(recipe_materials::recipe_id.eq_any(&recipe_ids))
        .order((recipe_materials::recipe_id.asc(), recipe_materials::material_id.asc()))
        .load::<RecipeMaterialRow>(nutritionist)?;

    let mut material_ids: Vec<MaterialId> =
        lines.iter().map(|line| line.material_id).collect();
    material_ids.sort_unstable();
    material_ids.dedup();
    let materials: HashMap<MaterialId, _> =
        material::find_materials(researcher, &material_ids)?
            .into_iter()
            .map(|row| (row.id, row))
            .collect();

    let mut by_recipe: HashMap<RecipeId, Vec<RecipeMaterialView>> = HashMap::new();
    for line in lines {
        by_recipe
            .entry(line.recipe_id)
            .or_default()
            .push(RecipeMaterialView {
                material_id: line.material_id,
                quantity: line.quantity,
                material: materials.get(&line.material_id).cloned(),
            });
    }

    Ok(rows
        .into_iter()
        .map(|recipe| RecipeView {
            recipe_materials: by_recipe.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

/// Resolves the materials of `lines` and sums their nutrients. Every material
/// must exist in the researcher realm.
pub(crate) fn resolve_totals(
    researcher: &MysqlConnection,
    lines: &[(MaterialId, f64)],
) -> Result<NutrientVector, AppError> {
    let ids: Vec<MaterialId> = lines.iter().map(|(id, _)| *id).collect();
    let nutrients: HashMap<MaterialId, NutrientVector> =
        material::find_materials(researcher, &ids)?
            .iter()
            .map(|row| (row.id, row.nutrients()))
            .collect();

    let portions = lines.iter().map(|&(material_id, quantity)| Portion {
        material_id,
        nutrients: nutrients.get(&material_id),
        quantity,
    });

    aggregate(portions).map_err(|err| match err {
        NutritionError::MissingMaterial(id) => {
            AppError::BadRequest(format!("Invalid material ID {id}"))
        }
        other => other.into(),
    })
}

fn write_lines(
    conn: &MysqlConnection,
    recipe_id: RecipeId,
    lines: &[(MaterialId, f64)],
) -> Result<(), AppError> {
    diesel::delete(recipe_materials::table.filter(recipe_materials::recipe_id.eq(recipe_id)))
        .execute(conn)?;

    if lines.is_empty() {
        return Ok(());
    }
    let rows: Vec<RecipeMaterialRow> = lines
        .iter()
        .map(|&(material_id, quantity)| RecipeMaterialRow {
            recipe_id,
            material_id,
            quantity,
        })
        .collect();
    diesel::insert_into(recipe_materials::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

fn store_totals(
    conn: &MysqlConnection,
    recipe_id: RecipeId,
    totals: &NutrientVector,
) -> Result<(), AppError> {
    diesel::update(recipes::table.find(recipe_id))
        .set(&RecipeTotals::from(totals))
        .execute(conn)?;
    Ok(())
}

pub(crate) fn insert_recipe(
    conn: &MysqlConnection,
    draft: &RecipeDraft,
    owner: Option<&str>,
    totals: &NutrientVector,
    created_at: NaiveDateTime,
) -> Result<RecipeRow, AppError> {
    let new_recipe = NewRecipe {
        user_id: owner,
        name: &draft.name,
        description: draft.description.as_deref(),
        category: &draft.category,
        steps: &draft.steps,
        created_at,
    };

    conn.transaction::<_, AppError, _>(|| {
        diesel::insert_into(recipes::table)
            .values(&new_recipe)
            .execute(conn)?;
        let new_id = diesel::select(last_insert_id).first::<u64>(conn)? as RecipeId;
        write_lines(conn, new_id, &draft.materials)?;
        store_totals(conn, new_id, totals)?;
        info!("created recipe {new_id} with {} materials", draft.materials.len());
        find_recipe(conn, new_id)
    })
}

/// Rewrites a recipe's fields, replaces all of its materials and stores the
/// new totals.
pub(crate) fn update_recipe(
    conn: &MysqlConnection,
    recipe_id: RecipeId,
    draft: &RecipeDraft,
    totals: &NutrientVector,
) -> Result<RecipeRow, AppError> {
    find_recipe(conn, recipe_id)?;
    let changes = RecipeChanges {
        name: &draft.name,
        description: draft.description.as_deref(),
        category: &draft.category,
        steps: &draft.steps,
    };

    conn.transaction::<_, AppError, _>(|| {
        diesel::update(recipes::table.find(recipe_id))
            .set(&changes)
            .execute(conn)?;
        write_lines(conn, recipe_id, &draft.materials)?;
        store_totals(conn, recipe_id, totals)?;
        info!("updated recipe {recipe_id} with {} materials", draft.materials.len());
        find_recipe(conn, recipe_id)
    })
}

pub(crate) fn delete_recipe(conn: &MysqlConnection, recipe_id: RecipeId) -> Result<(), AppError> {
    conn.transaction::<_, AppError, _>(|| {
        diesel::delete(recipe_materials::table.filter(recipe_materials::recipe_id.eq(recipe_id)))
            .execute(conn)?;
        let deleted = diesel::delete(recipes::table.find(recipe_id)).execute(conn)?;
        if deleted == 0 {
            return Err(not_found(recipe_id));
        }
        Ok(())
    })
}

pub(crate) fn recipes_using(
    conn: &MysqlConnection,
    material_id: MaterialId,
) -> Result<Vec<RecipeId>, AppError> {
    Ok(recipe_materials::table
        .filter(recipe_materials::material_id.eq(material_id))
        .select(recipe_materials::recipe_id)
        .load::<RecipeId>(conn)?)
}

/// Removes a deleted material from every recipe. Returns the recipes that
/// used it.
pub(crate) fn detach_material(
    conn: &MysqlConnection,
    material_id: MaterialId,
) -> Result<Vec<RecipeId>, AppError> {
    conn.transaction::<_, AppError, _>(|| {
        let affected = recipes_using(conn, material_id)?;
        diesel::delete(
            recipe_materials::table.filter(recipe_materials::material_id.eq(material_id)),
        )
        .execute(conn)?;
        Ok(affected)
    })
}

/// A recipe's `(material, quantity)` pairs, by material id.
fn recipe_lines(
    conn: &MysqlConnection,
    recipe_id: RecipeId,
) -> Result<Vec<(MaterialId, f64)>, AppError> {
    Ok(recipe_materials::table
        .filter(recipe_materials::recipe_id.eq(recipe_id))
        .select((recipe_materials::material_id, recipe_materials::quantity))
        .order(recipe_materials::material_id.asc())
        .load(conn)?)
}

/// Recomputes and stores the totals of each recipe from its current
/// materials and quantities.
pub(crate) fn refresh_totals(
    nutritionist: &MysqlConnection,
    researcher: &MysqlConnection,
    recipe_ids: &[RecipeId],
) -> Result<(), AppError> {
    for &recipe_id in recipe_ids {
        let lines = recipe_lines(nutritionist, recipe_id)?;
        let totals = resolve_totals(researcher, &lines)?;
        store_totals(nutritionist, recipe_id, &totals)?;
    }
    if !recipe_ids.is_empty() {
        info!("refreshed nutrition totals of {} recipes", recipe_ids.len());
    }
    Ok(())
}

pub(crate) fn count_recipes(conn: &MysqlConnection, owner: Option<&str>) -> Result<i64, AppError> {
    let filter = RecipeFilter {
        search: None,
        owner: owner.map(str::to_string),
        category: None,
    };
    Ok(filter.boxed().count().get_result(conn)?)
}

pub(crate) fn recipe_stats(
    nutritionist: &MysqlConnection,
    researcher: &MysqlConnection,
    owner: Option<&str>,
) -> Result<RecipeStats, AppError> {
    let my_recipes = match owner {
        Some(owner) => count_recipes(nutritionist, Some(owner))?,
        None => 0,
    };
    Ok(RecipeStats {
        total_recipes: count_recipes(nutritionist, None)?,
        my_recipes,
        total_materials: material::count_materials(researcher)?,
    })
}

#[cfg(test)]
mod tests {
    use std::env;

    use chrono::Utc;

    use super::*;

    fn test_connection() -> MysqlConnection {
        let url = env::var("NUTRITIONIST_DATABASE_URL").expect("NUTRITIONIST_DATABASE_URL");
        let conn = MysqlConnection::establish(&url).unwrap();
        conn.begin_test_transaction().unwrap();
        conn
    }

    #[test]
    #[ignore = "needs a MySQL nutritionist database in NUTRITIONIST_DATABASE_URL"]
    fn recipe_lines_come_back_by_material_id() {
        let conn = test_connection();
        let draft = RecipeDraft {
            name: "lines-test salad".to_string(),
            description: None,
            category: "low-carb".to_string(),
            steps: "Toss".to_string(),
            materials: vec![(9, 30.0), (2, 150.0), (5, 1.0)],
        };

        let recipe = insert_recipe(
            &conn,
            &draft,
            None,
            &NutrientVector::zero(),
            Utc::now().naive_utc(),
        )
        .unwrap();

        assert_eq!(
            recipe_lines(&conn, recipe.id).unwrap(),
            vec![(2, 150.0), (5, 1.0), (9, 30.0)]
        );
    }
}
