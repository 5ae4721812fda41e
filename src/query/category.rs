use diesel::prelude::*;

use super::{last_insert_id, material};
use crate::{
    error::AppError,
    models::{CategoryChanges, CategoryCount, CategoryRow, ListQuery, NewCategory},
    nutrition::{BoundPolicy, Category, CategoryId},
};

fn conflict(err: AppError) -> AppError {
    match err {
        AppError::Conflict(_) => AppError::Conflict("Category name already exists".to_string()),
        other => other,
    }
}

fn not_found(id: CategoryId) -> AppError {
    AppError::NotFound(format!("Category with ID {id} not found"))
}

/// Every category, oldest first. This is the list materials are classified
/// against.
pub(crate) fn load_categories(conn: &MysqlConnection) -> Result<Vec<CategoryRow>, AppError> {
    use crate::schema::categories::dsl::*;

    Ok(categories.order(id.asc()).load::<CategoryRow>(conn)?)
}

pub(crate) fn list_categories(
    conn: &MysqlConnection,
    query: &ListQuery,
) -> Result<(Vec<CategoryRow>, i64), AppError> {
    use crate::schema::categories::dsl::*;

    let total: i64 = categories.count().get_result(conn)?;
    let rows = categories
        .order(id.asc())
        .limit(query.limit())
        .offset(query.offset())
        .load::<CategoryRow>(conn)?;
    Ok((rows, total))
}

pub(crate) fn find_category(
    conn: &MysqlConnection,
    category_id: CategoryId,
) -> Result<CategoryRow, AppError> {
    use crate::schema::categories::dsl::*;

    categories
        .find(category_id)
        .first::<CategoryRow>(conn)
        .optional()?
        .ok_or_else(|| not_found(category_id))
}

pub(crate) fn category_names(conn: &MysqlConnection) -> Result<Vec<String>, AppError> {
    use crate::schema::categories::dsl::*;

    Ok(categories.select(name).order(id.asc()).load::<String>(conn)?)
}

/// Looks a category up by name, ignoring case. Returns the stored spelling.
pub(crate) fn resolve_category_name(
    conn: &MysqlConnection,
    wanted: &str,
) -> Result<Option<String>, AppError> {
    Ok(category_names(conn)?
        .into_iter()
        .find(|existing| existing.eq_ignore_ascii_case(wanted)))
}

pub(crate) fn insert_category(
    conn: &MysqlConnection,
    new_category: &NewCategory,
) -> Result<CategoryRow, AppError> {
    use crate::schema::categories::dsl::*;

    new_category.bounds().validate()?;

    conn.transaction::<_, AppError, _>(|| {
        diesel::insert_into(categories)
            .values(new_category)
            .execute(conn)?;
        let new_id: u64 = diesel::select(last_insert_id).first(conn)?;
        Ok(categories.find(new_id as CategoryId).first::<CategoryRow>(conn)?)
    })
    .map_err(conflict)
}

/// Writes the given fields, then validates the merged bounds. Inverted bounds
/// roll the update back.
pub(crate) fn update_category(
    conn: &MysqlConnection,
    category_id: CategoryId,
    changes: &CategoryChanges,
) -> Result<CategoryRow, AppError> {
    use crate::schema::categories::dsl::*;

    if changes.is_empty() {
        return Err(AppError::BadRequest("No fields provided to update".to_string()));
    }
    find_category(conn, category_id)?;

    conn.transaction::<_, AppError, _>(|| {
        diesel::update(categories.find(category_id))
            .set(changes)
            .execute(conn)?;
        let updated = categories.find(category_id).first::<CategoryRow>(conn)?;
        updated.to_category().bounds.validate()?;
        Ok(updated)
    })
    .map_err(conflict)
}

pub(crate) fn delete_category(
    conn: &MysqlConnection,
    category_id: CategoryId,
) -> Result<(), AppError> {
    use crate::schema::{categories, material_categories};

    conn.transaction::<_, AppError, _>(|| {
        diesel::delete(
            material_categories::table.filter(material_categories::category_id.eq(category_id)),
        )
        .execute(conn)?;
        let deleted = diesel::delete(categories::table.find(category_id)).execute(conn)?;
        if deleted == 0 {
            return Err(not_found(category_id));
        }
        Ok(())
    })
}

/// Runs a category write, then re-classifies every material against the list
/// it produced. Both happen in one transaction: a failure in either leaves the
/// categories and their assignments as they were.
pub(crate) fn write_and_reclassify<T, F>(
    conn: &MysqlConnection,
    policy: BoundPolicy,
    write: F,
) -> Result<T, AppError>
where
    F: FnOnce(&MysqlConnection) -> Result<T, AppError>,
{
    conn.transaction::<_, AppError, _>(|| {
        let written = write(conn)?;
        let current: Vec<Category> = load_categories(conn)?
            .iter()
            .map(CategoryRow::to_category)
            .collect();
        material::reclassify_all(conn, &current, policy)?;
        Ok(written)
    })
}

/// Number of materials assigned to each category, categories without any
/// materials included.
pub(crate) fn category_counts(conn: &MysqlConnection) -> Result<Vec<CategoryCount>, AppError> {
    use crate::schema::{categories, material_categories};

    let rows = categories::table
        .left_join(material_categories::table)
        .select((categories::id, categories::name, material_categories::material_id.nullable()))
        .order(categories::id.asc())
        .load::<(CategoryId, String, Option<i64>)>(conn)?;

    let mut counts: Vec<(CategoryId, CategoryCount)> = Vec::new();
    for (category_id, category_name, material_id) in rows {
        match counts.last_mut() {
            Some((last_id, count)) if *last_id == category_id => {
                count.count += material_id.is_some() as i64;
            }
            _ => counts.push((
                category_id,
                CategoryCount {
                    name: category_name,
                    count: material_id.is_some() as i64,
                },
            )),
        }
    }
    Ok(counts.into_iter().map(|(_, count)| count).collect())
}

#[cfg(test)]
mod tests {
    use std::env;

    use chrono::Utc;

    use super::*;
    use crate::{
        models::{MaterialPayload, NewMaterial},
        nutrition::MaterialId,
        schema::{material_categories, materials},
    };

    fn test_connection() -> MysqlConnection {
        let url = env::var("RESEARCHER_DATABASE_URL").expect("RESEARCHER_DATABASE_URL");
        let conn = MysqlConnection::establish(&url).unwrap();
        conn.begin_test_transaction().unwrap();
        conn
    }

    fn insert_material(conn: &MysqlConnection, json: &str) -> MaterialId {
        let payload: MaterialPayload = serde_json::from_str(json).unwrap();
        let new_material: NewMaterial = payload.into_new(None, Utc::now().naive_utc()).unwrap();
        diesel::insert_into(materials::table)
            .values(&new_material)
            .execute(conn)
            .unwrap();
        diesel::select(last_insert_id).first::<u64>(conn).unwrap() as MaterialId
    }

    fn assigned(conn: &MysqlConnection, material_id: MaterialId) -> Vec<CategoryId> {
        material_categories::table
            .filter(material_categories::material_id.eq(material_id))
            .select(material_categories::category_id)
            .order(material_categories::category_id.asc())
            .load(conn)
            .unwrap()
    }

    fn new_category(json: &str) -> NewCategory {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    #[ignore = "needs a MySQL researcher database in RESEARCHER_DATABASE_URL"]
    fn new_category_is_assigned_in_the_same_write() {
        let conn = test_connection();
        let tempeh = insert_material(&conn, r#"{"name": "write-test tempeh", "protein": 20}"#);

        let protein = new_category(r#"{"name": "write-test protein", "protein_min": 15}"#);
        let category = write_and_reclassify(&conn, BoundPolicy::Legacy, |conn| {
            insert_category(conn, &protein)
        })
        .unwrap();

        assert!(assigned(&conn, tempeh).contains(&category.id));
    }

    #[test]
    #[ignore = "needs a MySQL researcher database in RESEARCHER_DATABASE_URL"]
    fn failed_write_leaves_categories_and_assignments_alone() {
        let conn = test_connection();
        let tempeh = insert_material(&conn, r#"{"name": "write-test tempeh", "protein": 20}"#);
        let protein = new_category(r#"{"name": "write-test protein", "protein_min": 15}"#);
        let category = write_and_reclassify(&conn, BoundPolicy::Legacy, |conn| {
            insert_category(conn, &protein)
        })
        .unwrap();
        let before = assigned(&conn, tempeh);

        let result: Result<(), AppError> =
            write_and_reclassify(&conn, BoundPolicy::Legacy, |conn| {
                delete_category(conn, category.id)?;
                Err(AppError::Unavailable("Database is not responding".to_string()))
            });

        assert!(matches!(result, Err(AppError::Unavailable(_))));
        assert_eq!(find_category(&conn, category.id).unwrap().name, "write-test protein");
        assert_eq!(assigned(&conn, tempeh), before);
    }
}
