use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use diesel::{mysql::Mysql, prelude::*};
use log::{info, warn};

use super::{category, last_insert_id};
use crate::{
    error::AppError,
    models::{ListQuery, MaterialPayload, MaterialRow, MaterialStats, MaterialView, NewMaterial},
    nutrition::{classify, BoundPolicy, Category, CategoryId, MaterialId},
    schema::{categories, material_categories, materials},
};

const NEW_MATERIAL_WINDOW_DAYS: i64 = 7;

fn conflict(err: AppError) -> AppError {
    match err {
        AppError::Conflict(_) => AppError::Conflict("Material name already exists".to_string()),
        other => other,
    }
}

fn not_found(id: MaterialId) -> AppError {
    AppError::NotFound(format!("Material with ID {id} not found"))
}

#[derive(Debug, Default)]
pub(crate) struct MaterialFilter {
    pub search: Option<String>,
    pub owner: Option<String>,
    pub ids: Option<Vec<MaterialId>>,
}

impl MaterialFilter {
    fn boxed(&self) -> materials::BoxedQuery<'static, Mysql> {
        let mut query = materials::table.into_boxed();
        if let Some(pattern) = &self.search {
            query = query.filter(materials::name.like(pattern.clone()));
        }
        if let Some(owner) = &self.owner {
            query = query.filter(materials::user_id.eq(owner.clone()));
        }
        if let Some(ids) = &self.ids {
            query = query.filter(materials::id.eq_any(ids.clone()));
        }
        query
    }
}

/// Materials matching the list query, each with the names of its categories.
///
/// `query.category()` must already be resolved to a stored category name.
pub(crate) fn list_materials(
    conn: &MysqlConnection,
    query: &ListQuery,
    category_name: Option<&str>,
    owner: Option<&str>,
) -> Result<(Vec<MaterialView>, i64), AppError> {
    let ids = match category_name {
        Some(wanted) => Some(
            material_categories::table
                .inner_join(categories::table)
                .filter(categories::name.eq(wanted))
                .select(material_categories::material_id)
                .load::<MaterialId>(conn)?,
        ),
        None => None,
    };
    let filter = MaterialFilter {
        search: query.search_pattern(),
        owner: owner.map(str::to_string),
        ids,
    };

    let total: i64 = filter.boxed().count().get_result(conn)?;
    let rows = filter
        .boxed()
        .order(materials::id.asc())
        .limit(query.limit())
        .offset(query.offset())
        .load::<MaterialRow>(conn)?;

    Ok((with_category_names(conn, rows)?, total))
}

fn with_category_names(
    conn: &MysqlConnection,
    rows: Vec<MaterialRow>,
) -> Result<Vec<MaterialView>, AppError> {
    let ids: Vec<MaterialId> = rows.iter().map(|row| row.id).collect();
    let mut names = category_names_for(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|material| MaterialView {
            categories: names.remove(&material.id).unwrap_or_default(),
            material,
        })
        .collect())
}

pub(crate) fn category_names_for(
    conn: &MysqlConnection,
    material_ids: &[MaterialId],
) -> Result<HashMap<MaterialId, Vec<String>>, AppError> {
    if material_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let pairs = material_categories::table
        .inner_join(categories::table)
        .filter(material_categories::material_id.eq_any(material_ids))
        .select((material_categories::material_id, categories::name))
        .order(categories::id.asc())
        .load::<(MaterialId, String)>(conn)?;

    let mut names: HashMap<MaterialId, Vec<String>> = HashMap::new();
    for (material_id, name) in pairs {
        names.entry(material_id).or_default().push(name);
    }
    Ok(names)
}

pub(crate) fn find_material(
    conn: &MysqlConnection,
    material_id: MaterialId,
) -> Result<MaterialRow, AppError> {
    materials::table
        .find(material_id)
        .first::<MaterialRow>(conn)
        .optional()?
        .ok_or_else(|| not_found(material_id))
}

pub(crate) fn material_view(
    conn: &MysqlConnection,
    material_id: MaterialId,
) -> Result<MaterialView, AppError> {
    let material = find_material(conn, material_id)?;
    let categories = category_names_for(conn, &[material_id])?
        .remove(&material_id)
        .unwrap_or_default();
    Ok(MaterialView {
        material,
        categories,
    })
}

pub(crate) fn find_materials(
    conn: &MysqlConnection,
    material_ids: &[MaterialId],
) -> Result<Vec<MaterialRow>, AppError> {
    if material_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(materials::table
        .filter(materials::id.eq_any(material_ids))
        .load::<MaterialRow>(conn)?)
}

/// Replaces every category assignment of a material with `category_ids`.
pub(crate) fn replace_assignments(
    conn: &MysqlConnection,
    material_id: MaterialId,
    category_ids: &[CategoryId],
) -> Result<(), AppError> {
    diesel::delete(
        material_categories::table.filter(material_categories::material_id.eq(material_id)),
    )
    .execute(conn)?;

    if category_ids.is_empty() {
        return Ok(());
    }
    let rows: Vec<_> = category_ids
        .iter()
        .map(|&category_id| {
            (
                material_categories::material_id.eq(material_id),
                material_categories::category_id.eq(category_id),
            )
        })
        .collect();
    diesel::insert_into(material_categories::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

/// Classifies a stored material and writes its assignments. A material that
/// fits no category is rejected so the surrounding transaction rolls back.
fn assign_or_reject(
    conn: &MysqlConnection,
    material: &MaterialRow,
    categories: &[Category],
    policy: BoundPolicy,
) -> Result<Vec<CategoryId>, AppError> {
    let assigned = classify(&material.nutrients(), categories, policy);
    if assigned.is_empty() {
        warn!("material {:?} fits none of {} categories", material.name, categories.len());
        return Err(AppError::Unclassified);
    }
    replace_assignments(conn, material.id, &assigned)?;
    Ok(assigned)
}

pub(crate) fn insert_material(
    conn: &MysqlConnection,
    new_material: &NewMaterial,
    categories: &[Category],
    policy: BoundPolicy,
) -> Result<MaterialView, AppError> {
    conn.transaction::<_, AppError, _>(|| {
        diesel::insert_into(materials::table)
            .values(new_material)
            .execute(conn)?;
        let new_id: u64 = diesel::select(last_insert_id).first(conn)?;
        let material = find_material(conn, new_id as MaterialId)?;
        let assigned = assign_or_reject(conn, &material, categories, policy)?;
        info!("created material {} in {} categories", material.id, assigned.len());
        material_view(conn, material.id)
    })
    .map_err(conflict)
}

/// Applies a partial update and re-classifies from the stored row.
pub(crate) fn update_material(
    conn: &MysqlConnection,
    material_id: MaterialId,
    changes: &MaterialPayload,
    categories: &[Category],
    policy: BoundPolicy,
) -> Result<MaterialView, AppError> {
    changes.validate_changes()?;
    find_material(conn, material_id)?;

    conn.transaction::<_, AppError, _>(|| {
        diesel::update(materials::table.find(material_id))
            .set(changes)
            .execute(conn)?;
        let material = find_material(conn, material_id)?;
        let assigned = assign_or_reject(conn, &material, categories, policy)?;
        info!("updated material {} in {} categories", material.id, assigned.len());
        material_view(conn, material.id)
    })
    .map_err(conflict)
}

pub(crate) fn delete_material(
    conn: &MysqlConnection,
    material_id: MaterialId,
) -> Result<(), AppError> {
    conn.transaction::<_, AppError, _>(|| {
        diesel::delete(
            material_categories::table.filter(material_categories::material_id.eq(material_id)),
        )
        .execute(conn)?;
        let deleted = diesel::delete(materials::table.find(material_id)).execute(conn)?;
        if deleted == 0 {
            return Err(not_found(material_id));
        }
        Ok(())
    })
}

/// Re-classifies every material against `categories`, replacing all
/// assignments. Materials that fit nothing are left unassigned. Returns how
/// many of those there were.
pub(crate) fn reclassify_all(
    conn: &MysqlConnection,
    categories: &[Category],
    policy: BoundPolicy,
) -> Result<usize, AppError> {
    let rows = materials::table.load::<MaterialRow>(conn)?;

    conn.transaction::<_, AppError, _>(|| {
        let mut unassigned = 0;
        for material in &rows {
            let assigned = classify(&material.nutrients(), categories, policy);
            if assigned.is_empty() {
                unassigned += 1;
            }
            replace_assignments(conn, material.id, &assigned)?;
        }
        info!("reclassified {} materials, {unassigned} fit no category", rows.len());
        Ok(unassigned)
    })
}

pub(crate) fn count_materials(conn: &MysqlConnection) -> Result<i64, AppError> {
    Ok(materials::table.count().get_result(conn)?)
}

pub(crate) fn material_stats(
    conn: &MysqlConnection,
    now: NaiveDateTime,
) -> Result<MaterialStats, AppError> {
    let since = now - Duration::days(NEW_MATERIAL_WINDOW_DAYS);
    let new_materials: i64 = materials::table
        .filter(materials::created_at.ge(since))
        .count()
        .get_result(conn)?;

    Ok(MaterialStats {
        total_materials: count_materials(conn)?,
        new_materials,
        category_stats: category::category_counts(conn)?,
    })
}
