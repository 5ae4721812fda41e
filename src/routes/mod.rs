use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use chrono::{NaiveDateTime, Utc};
use diesel::mysql::MysqlConnection;
use uuid::Uuid;

use crate::{error::AppError, models::ListQuery, query::category::resolve_category_name};

mod category;
mod material;
mod recipe;

/// Set by the gateway in front of this service once the caller is
/// authenticated.
pub const USER_ID_HEADER: &str = "X-User-Id";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(category::list_categories)
        .service(category::get_category)
        .service(category::create_category)
        .service(category::update_category)
        .service(category::delete_category)
        // fixed paths first, `{id}` would swallow them
        .service(material::my_materials)
        .service(material::material_stats)
        .service(material::list_materials)
        .service(material::get_material)
        .service(material::create_material)
        .service(material::update_material)
        .service(material::delete_material)
        .service(recipe::my_recipes)
        .service(recipe::recipe_stats)
        .service(recipe::list_recipes)
        .service(recipe::get_recipe)
        .service(recipe::create_recipe)
        .service(recipe::update_recipe)
        .service(recipe::delete_recipe);
}

/// Caller identity taken from [`USER_ID_HEADER`]. Absent for anonymous calls.
#[derive(Debug, PartialEq)]
pub struct Owner(Option<Uuid>);

impl Owner {
    pub fn id(&self) -> Option<String> {
        self.0.map(|id| id.to_string())
    }

    pub fn require(&self) -> Result<String, AppError> {
        self.id()
            .ok_or_else(|| AppError::BadRequest(format!("{USER_ID_HEADER} header is required")))
    }
}

fn parse_owner(header: Option<&HeaderValue>) -> Result<Owner, AppError> {
    let header = match header {
        Some(header) => header,
        None => return Ok(Owner(None)),
    };
    header
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(|id| Owner(Some(id)))
        .ok_or_else(|| AppError::BadRequest(format!("{USER_ID_HEADER} must be a UUID")))
}

impl FromRequest for Owner {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(parse_owner(req.headers().get(USER_ID_HEADER)))
    }
}

/// Resolves the `category` filter of a list query to its stored name.
/// Unknown categories are a client error.
fn list_category(conn: &MysqlConnection, query: &ListQuery) -> Result<Option<String>, AppError> {
    match query.category() {
        Some(wanted) => resolve_category_name(conn, wanted)?
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Category {wanted} does not exist"))),
        None => Ok(None),
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_anonymous() {
        let owner = parse_owner(None).unwrap();

        assert_eq!(owner, Owner(None));
        assert_eq!(owner.id(), None);
        assert!(matches!(owner.require(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn uuid_header_is_the_owner() {
        let header = HeaderValue::from_static("5F0C6A1E-3C1B-4BDE-9A55-2D7F0F3C1E11");

        let owner = parse_owner(Some(&header)).unwrap();

        assert_eq!(
            owner.require().unwrap(),
            "5f0c6a1e-3c1b-4bde-9a55-2d7f0f3c1e11"
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        let header = HeaderValue::from_static("researcher-42");

        assert!(matches!(parse_owner(Some(&header)), Err(AppError::BadRequest(_))));
    }
}
