use actix_web::{delete, get, post, put, web, HttpResponse};
use log::info;

use super::{list_category, now, Owner};
use crate::{
    error::AppError,
    models::{Envelope, ListQuery, MaterialPayload, MaterialView, Pagination},
    nutrition::MaterialId,
    query::{self, guarded},
    state::State,
};

fn list_page(
    state: &State,
    list: &ListQuery,
    owner: Option<&str>,
) -> Result<(Vec<MaterialView>, Pagination), AppError> {
    guarded(&state.breaker, || {
        let conn = state.researcher.get()?;
        let category = list_category(&conn, list)?;
        let (rows, total) =
            query::material::list_materials(&conn, list, category.as_deref(), owner)?;
        Ok((rows, Pagination::new(list, total)))
    })
}

#[get("/materials")]
pub async fn list_materials(
    state: web::Data<State>,
    list: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let (rows, pagination) = web::block(move || list_page(&state, &list, None)).await??;
    Ok(HttpResponse::Ok().json(Envelope::paged("List of materials", rows, pagination)))
}

#[get("/materials/mine")]
pub async fn my_materials(
    state: web::Data<State>,
    owner: Owner,
    list: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let owner = owner.require()?;
    let (rows, pagination) =
        web::block(move || list_page(&state, &list, Some(owner.as_str()))).await??;
    Ok(HttpResponse::Ok().json(Envelope::paged("List of my materials", rows, pagination)))
}

#[get("/materials/stats")]
pub async fn material_stats(state: web::Data<State>) -> Result<HttpResponse, AppError> {
    let stats = web::block(move || {
        guarded(&state.breaker, || {
            let conn = state.researcher.get()?;
            query::material::material_stats(&conn, now())
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Material statistics", stats)))
}

#[get("/materials/{material_id}")]
pub async fn get_material(
    state: web::Data<State>,
    material_id: web::Path<MaterialId>,
) -> Result<HttpResponse, AppError> {
    let material_id = material_id.into_inner();
    let material = web::block(move || {
        guarded(&state.breaker, || {
            let conn = state.researcher.get()?;
            query::material::material_view(&conn, material_id)
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Material details", material)))
}

#[post("/materials")]
pub async fn create_material(
    state: web::Data<State>,
    owner: Owner,
    payload: web::Json<MaterialPayload>,
) -> Result<HttpResponse, AppError> {
    let new_material = payload.into_inner().into_new(owner.id(), now())?;
    let material = web::block(move || {
        let categories = state.categories.categories(&state.researcher)?;
        guarded(&state.breaker, || {
            let conn = state.researcher.get()?;
            query::material::insert_material(
                &conn,
                &new_material,
                &categories,
                state.bound_policy,
            )
        })
    })
    .await??;
    Ok(HttpResponse::Created().json(Envelope::new("Material added successfully", material)))
}

#[put("/materials/{material_id}")]
pub async fn update_material(
    state: web::Data<State>,
    material_id: web::Path<MaterialId>,
    payload: web::Json<MaterialPayload>,
) -> Result<HttpResponse, AppError> {
    let material_id = material_id.into_inner();
    let changes = payload.into_inner();
    let material = web::block(move || {
        let categories = state.categories.categories(&state.researcher)?;
        guarded(&state.breaker, || {
            let researcher = state.researcher.get()?;
            let material = query::material::update_material(
                &researcher,
                material_id,
                &changes,
                &categories,
                state.bound_policy,
            )?;

            // recipes keep a copy of their totals, recompute the ones using this material
            let nutritionist = state.nutritionist.get()?;
            let recipes = query::recipe::recipes_using(&nutritionist, material_id)?;
            query::recipe::refresh_totals(&nutritionist, &researcher, &recipes)?;
            Ok(material)
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Material updated successfully", material)))
}

#[delete("/materials/{material_id}")]
pub async fn delete_material(
    state: web::Data<State>,
    material_id: web::Path<MaterialId>,
) -> Result<HttpResponse, AppError> {
    let material_id = material_id.into_inner();
    web::block(move || {
        guarded(&state.breaker, || {
            let researcher = state.researcher.get()?;
            query::material::delete_material(&researcher, material_id)?;
            info!("deleted material {material_id}");

            let nutritionist = state.nutritionist.get()?;
            let recipes = query::recipe::detach_material(&nutritionist, material_id)?;
            query::recipe::refresh_totals(&nutritionist, &researcher, &recipes)
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Material deleted successfully", ())))
}
