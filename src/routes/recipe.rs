use actix_web::{delete, get, post, put, web, HttpResponse};
use log::info;

use super::{list_category, now, Owner};
use crate::{
    error::AppError,
    models::{Envelope, ListQuery, Pagination, RecipeDraft, RecipeId, RecipePayload, RecipeView},
    query::{self, category::resolve_category_name, guarded},
    state::State,
};

fn list_page(
    state: &State,
    list: &ListQuery,
    owner: Option<&str>,
) -> Result<(Vec<RecipeView>, Pagination), AppError> {
    guarded(&state.breaker, || {
        let researcher = state.researcher.get()?;
        let nutritionist = state.nutritionist.get()?;
        let category = list_category(&researcher, list)?;
        let (rows, total) = query::recipe::list_recipes(
            &nutritionist,
            &researcher,
            list,
            category.as_deref(),
            owner,
        )?;
        Ok((rows, Pagination::new(list, total)))
    })
}

/// Stores the draft under its category's canonical name and returns the
/// recipe with its totals computed from the current materials.
fn save_recipe(
    state: &State,
    mut draft: RecipeDraft,
    existing: Option<RecipeId>,
    owner: Option<String>,
) -> Result<RecipeView, AppError> {
    guarded(&state.breaker, || {
        let researcher = state.researcher.get()?;
        draft.category = resolve_category_name(&researcher, &draft.category)?.ok_or_else(|| {
            AppError::BadRequest(format!("Category {} does not exist", draft.category))
        })?;
        let totals = query::recipe::resolve_totals(&researcher, &draft.materials)?;

        let nutritionist = state.nutritionist.get()?;
        let recipe = match existing {
            Some(recipe_id) => {
                query::recipe::update_recipe(&nutritionist, recipe_id, &draft, &totals)?
            }
            None => query::recipe::insert_recipe(
                &nutritionist,
                &draft,
                owner.as_deref(),
                &totals,
                now(),
            )?,
        };
        query::recipe::recipe_view(&nutritionist, &researcher, recipe.id)
    })
}

#[get("/recipes")]
pub async fn list_recipes(
    state: web::Data<State>,
    list: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let (rows, pagination) = web::block(move || list_page(&state, &list, None)).await??;
    Ok(HttpResponse::Ok().json(Envelope::paged("List of recipes", rows, pagination)))
}

#[get("/recipes/mine")]
pub async fn my_recipes(
    state: web::Data<State>,
    owner: Owner,
    list: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let owner = owner.require()?;
    let (rows, pagination) =
        web::block(move || list_page(&state, &list, Some(owner.as_str()))).await??;
    Ok(HttpResponse::Ok().json(Envelope::paged("List of my recipes", rows, pagination)))
}

#[get("/recipes/stats")]
pub async fn recipe_stats(
    state: web::Data<State>,
    owner: Owner,
) -> Result<HttpResponse, AppError> {
    let owner = owner.id();
    let stats = web::block(move || {
        guarded(&state.breaker, || {
            let researcher = state.researcher.get()?;
            let nutritionist = state.nutritionist.get()?;
            query::recipe::recipe_stats(&nutritionist, &researcher, owner.as_deref())
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Recipe statistics", stats)))
}

#[get("/recipes/{recipe_id}")]
pub async fn get_recipe(
    state: web::Data<State>,
    recipe_id: web::Path<RecipeId>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    let recipe = web::block(move || {
        guarded(&state.breaker, || {
            let researcher = state.researcher.get()?;
            let nutritionist = state.nutritionist.get()?;
            query::recipe::recipe_view(&nutritionist, &researcher, recipe_id)
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Recipe details", recipe)))
}

#[post("/recipes")]
pub async fn create_recipe(
    state: web::Data<State>,
    owner: Owner,
    payload: web::Json<RecipePayload>,
) -> Result<HttpResponse, AppError> {
    let draft = payload.into_inner().validate(state.default_material_quantity)?;
    let owner = owner.id();
    let recipe = web::block(move || save_recipe(&state, draft, None, owner)).await??;
    Ok(HttpResponse::Created().json(Envelope::new("Recipe added successfully", recipe)))
}

#[put("/recipes/{recipe_id}")]
pub async fn update_recipe(
    state: web::Data<State>,
    recipe_id: web::Path<RecipeId>,
    payload: web::Json<RecipePayload>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    let draft = payload.into_inner().validate(state.default_material_quantity)?;
    let recipe = web::block(move || save_recipe(&state, draft, Some(recipe_id), None)).await??;
    Ok(HttpResponse::Ok().json(Envelope::new("Recipe updated successfully", recipe)))
}

#[delete("/recipes/{recipe_id}")]
pub async fn delete_recipe(
    state: web::Data<State>,
    recipe_id: web::Path<RecipeId>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = recipe_id.into_inner();
    web::block(move || {
        guarded(&state.breaker, || {
            let conn = state.nutritionist.get()?;
            query::recipe::delete_recipe(&conn, recipe_id)
        })
    })
    .await??;
    info!("deleted recipe {recipe_id}");
    Ok(HttpResponse::Ok().json(Envelope::new("Recipe deleted successfully", ())))
}
