//! Diesel queries against the two MySQL realms.
//!
//! The researcher realm owns `materials`, `categories` and
//! `material_categories`; the nutritionist realm owns `recipes` and
//! `recipe_materials`. Functions take the connection(s) they need and never
//! reach for a pool themselves. Everything here is blocking and is expected
//! to run inside `web::block`.
use diesel::{
    mysql::MysqlConnection,
    r2d2::{self, ConnectionManager},
    sql_types::{Bigint, Unsigned},
};
use failsafe::{
    backoff::EqualJittered,
    failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow},
    CircuitBreaker, StateMachine,
};
use log::warn;

use crate::error::AppError;

pub mod category;
pub mod material;
pub mod recipe;

pub type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

pub type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

no_arg_sql_function!(
    last_insert_id,
    Unsigned<Bigint>,
    "Id generated by the last INSERT on this connection"
);

/// Runs `f` through the circuit breaker. Only infrastructure failures count
/// against it; a missing row or a rejected payload does not.
pub fn guarded<T, F>(breaker: &CircuitBreakerType, f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError>,
{
    match breaker.call_with(AppError::is_infrastructure, f) {
        Ok(value) => Ok(value),
        Err(failsafe::Error::Inner(err)) => Err(err),
        Err(failsafe::Error::Rejected) => {
            warn!("circuit breaker is open, rejecting database call");
            Err(AppError::Unavailable(
                "Database is not responding, try again later".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use failsafe::Config;

    use super::*;

    #[test]
    fn client_errors_do_not_open_the_breaker() {
        let breaker: CircuitBreakerType = Config::new().build();

        for _ in 0..20 {
            let result: Result<(), AppError> =
                guarded(&breaker, || Err(AppError::NotFound("Recipe not found".into())));
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }

        assert!(breaker.is_call_permitted());
        assert_eq!(guarded(&breaker, || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn repeated_database_failures_open_the_breaker() {
        let breaker: CircuitBreakerType = Config::new().build();

        for _ in 0..10 {
            let _ = guarded(&breaker, || -> Result<(), AppError> {
                Err(AppError::Database(diesel::result::Error::RollbackTransaction))
            });
        }

        let result = guarded(&breaker, || Ok(()));
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }
}
