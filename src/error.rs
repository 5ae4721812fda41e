use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use thiserror::Error;

use crate::nutrition::NutritionError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Nutrition(#[from] NutritionError),

    #[error("material matches no category")]
    Unclassified,

    #[error("{0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(DieselError),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("blocking task failed")]
    Blocking(#[from] actix_web::error::BlockingError),

    #[error("cache error: {0}")]
    Cache(String),
}

impl AppError {
    /// Errors that say something about the health of the backing store rather
    /// than about the request. Only these count against the circuit breaker.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Pool(_) | AppError::Cache(_)
        )
    }
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Name already exists".to_string())
            }
            other => AppError::Database(other),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Conflict(_) | AppError::Nutrition(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unclassified => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Blocking(_)
            | AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{self}");
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::NutrientField;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            AppError::BadRequest("Missing required fields".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("Material with ID 3 not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Unclassified.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let malformed = AppError::from(NutritionError::MalformedBound {
            field: NutrientField::Sugar,
            min: 9.0,
            max: 1.0,
        });
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
        assert!(!malformed.is_infrastructure());
    }

    #[test]
    fn diesel_errors_are_classified() {
        assert!(matches!(AppError::from(DieselError::NotFound), AppError::NotFound(_)));
        assert!(matches!(
            AppError::from(DieselError::RollbackTransaction),
            AppError::Database(_)
        ));
        assert!(AppError::from(DieselError::RollbackTransaction).is_infrastructure());
        assert_eq!(
            AppError::from(DieselError::RollbackTransaction).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn open_breaker_is_service_unavailable() {
        let err = AppError::Unavailable("researcher database is not responding".into());

        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.is_infrastructure());
    }
}
