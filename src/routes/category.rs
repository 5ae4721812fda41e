use actix_web::{delete, get, post, put, web, HttpResponse};
use diesel::mysql::MysqlConnection;
use log::info;

use crate::{
    error::AppError,
    models::{CategoryChanges, Envelope, ListQuery, NewCategory, Pagination},
    nutrition::CategoryId,
    query::{self, guarded},
    state::State,
};

/// Runs a category write together with the re-classification of every
/// material, then drops the cached category list.
fn write_categories<T, F>(state: &State, write: F) -> Result<T, AppError>
where
    F: FnOnce(&MysqlConnection) -> Result<T, AppError>,
{
    let written = guarded(&state.breaker, || {
        let conn = state.researcher.get()?;
        query::category::write_and_reclassify(&conn, state.bound_policy, write)
    })?;
    state.categories.invalidate();
    Ok(written)
}

#[get("/categories")]
pub async fn list_categories(
    state: web::Data<State>,
    list: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let (rows, pagination) = web::block(move || {
        guarded(&state.breaker, || {
            let conn = state.researcher.get()?;
            let (rows, total) = query::category::list_categories(&conn, &list)?;
            Ok((rows, Pagination::new(&list, total)))
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::paged("List of categories", rows, pagination)))
}

#[get("/categories/{category_id}")]
pub async fn get_category(
    state: web::Data<State>,
    category_id: web::Path<CategoryId>,
) -> Result<HttpResponse, AppError> {
    let category_id = category_id.into_inner();
    let category = web::block(move || {
        guarded(&state.breaker, || {
            let conn = state.researcher.get()?;
            query::category::find_category(&conn, category_id)
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Category retrieved successfully", category)))
}

#[post("/categories")]
pub async fn create_category(
    state: web::Data<State>,
    new_category: web::Json<NewCategory>,
) -> Result<HttpResponse, AppError> {
    let new_category = new_category.into_inner();
    let category = web::block(move || {
        write_categories(&state, |conn| {
            query::category::insert_category(conn, &new_category)
        })
    })
    .await??;
    info!("created category {} ({})", category.id, category.name);
    Ok(HttpResponse::Created().json(Envelope::new("Category added successfully", category)))
}

#[put("/categories/{category_id}")]
pub async fn update_category(
    state: web::Data<State>,
    category_id: web::Path<CategoryId>,
    changes: web::Json<CategoryChanges>,
) -> Result<HttpResponse, AppError> {
    let category_id = category_id.into_inner();
    let changes = changes.into_inner();
    let category = web::block(move || {
        write_categories(&state, |conn| {
            query::category::update_category(conn, category_id, &changes)
        })
    })
    .await??;
    info!("updated category {category_id}");
    Ok(HttpResponse::Ok().json(Envelope::new("Category updated successfully", category)))
}

#[delete("/categories/{category_id}")]
pub async fn delete_category(
    state: web::Data<State>,
    category_id: web::Path<CategoryId>,
) -> Result<HttpResponse, AppError> {
    let category_id = category_id.into_inner();
    web::block(move || {
        write_categories(&state, |conn| {
            query::category::delete_category(conn, category_id)
        })
    })
    .await??;
    info!("deleted category {category_id}");
    Ok(HttpResponse::Ok().json(Envelope::new("Category deleted successfully", ())))
}
