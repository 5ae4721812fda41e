//! Redis copy of the category list.
//!
//! Every material write classifies against the full category list, so it is
//! kept in Redis as one bincode blob. A miss or a Redis outage falls through to
//! MySQL behind the circuit breaker; category writes drop the blob.
use std::{ops::DerefMut, time::Duration};

use log::{info, warn};
use r2d2_redis::{
    r2d2,
    redis::{Cmd, Commands, RedisError},
    RedisConnectionManager,
};

use crate::{
    error::AppError,
    models::CategoryRow,
    nutrition::Category,
    query::{self, CircuitBreakerType, DbPool},
};

pub type RedisPool = r2d2::Pool<RedisConnectionManager>;

const CACHE_POOL_MAX_OPEN: u32 = 16;
const CACHE_POOL_MIN_IDLE: u32 = 8;
const CACHE_POOL_EXPIRE_SECONDS: u64 = 60;

const ALL_CATEGORIES_KEY: &str = "categories:all";
// longest a stale list can be served after a missed invalidation
const ALL_CATEGORIES_TTL_SECONDS: usize = 60;

pub fn redis_pool(redis_url: &str) -> Result<RedisPool, AppError> {
    let manager =
        RedisConnectionManager::new(redis_url).map_err(|e| AppError::Cache(e.to_string()))?;
    r2d2::Pool::builder()
        .max_size(CACHE_POOL_MAX_OPEN)
        .max_lifetime(Some(Duration::from_secs(CACHE_POOL_EXPIRE_SECONDS)))
        .min_idle(Some(CACHE_POOL_MIN_IDLE))
        .build(manager)
        .map_err(|e| AppError::Cache(e.to_string()))
}

#[derive(Clone)]
pub struct CategoryCache {
    redis: Option<RedisPool>,
    breaker: CircuitBreakerType,
}

impl CategoryCache {
    pub fn new(redis: Option<RedisPool>, breaker: CircuitBreakerType) -> Self {
        Self { redis, breaker }
    }

    /// The current category list, from Redis when possible.
    pub fn categories(&self, pool: &DbPool) -> Result<Vec<Category>, AppError> {
        let redis_pool = match &self.redis {
            Some(redis_pool) => redis_pool,
            None => return self.load(pool),
        };

        let mut redis_conn = match redis_pool.get() {
            Ok(redis_conn) => redis_conn,
            Err(e) => {
                // don't bother caching when redis is unreachable
                warn!("redis unavailable, reading categories from mysql: {e}");
                return self.load(pool);
            }
        };
        let redis_conn = redis_conn.deref_mut();

        let cached: Result<Option<Vec<u8>>, RedisError> = redis_conn.get(ALL_CATEGORIES_KEY);
        match cached {
            Ok(Some(bytes)) => match decode(&bytes) {
                Some(categories) => return Ok(categories),
                None => warn!("discarding undecodable category cache entry"),
            },
            Ok(None) => {}
            Err(e) => {
                warn!("redis read failed, reading categories from mysql: {e}");
                return self.load(pool);
            }
        }

        let categories = self.load(pool)?;
        match bincode::serialize(&categories) {
            Ok(bytes) => {
                let stored: Result<(), RedisError> = store_command(&bytes).query(redis_conn);
                if let Err(e) = stored {
                    warn!("failed to cache categories: {e}");
                }
            }
            Err(e) => warn!("failed to encode categories: {e}"),
        }
        Ok(categories)
    }

    /// Drops the cached list so the next read goes to MySQL.
    pub fn invalidate(&self) {
        let redis_pool = match &self.redis {
            Some(redis_pool) => redis_pool,
            None => return,
        };
        match redis_pool.get() {
            Ok(mut redis_conn) => {
                let removed: Result<(), RedisError> =
                    redis_conn.deref_mut().del(ALL_CATEGORIES_KEY);
                match removed {
                    Ok(()) => info!("category cache invalidated"),
                    Err(e) => warn!("failed to invalidate category cache: {e}"),
                }
            }
            Err(e) => warn!("redis unavailable, category cache not invalidated: {e}"),
        }
    }

    fn load(&self, pool: &DbPool) -> Result<Vec<Category>, AppError> {
        query::guarded(&self.breaker, || {
            let conn = pool.get()?;
            let rows = query::category::load_categories(&conn)?;
            Ok(rows.iter().map(CategoryRow::to_category).collect())
        })
    }
}

fn store_command(bytes: &[u8]) -> Cmd {
    Cmd::set_ex(ALL_CATEGORIES_KEY, bytes, ALL_CATEGORIES_TTL_SECONDS)
}

fn decode(bytes: &[u8]) -> Option<Vec<Category>> {
    bincode::deserialize(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{CategoryBounds, NutrientRange};

    #[test]
    fn cached_blob_decodes_to_the_same_categories() {
        let mut bounds = CategoryBounds::default();
        bounds.protein = NutrientRange::new(Some(15.0), None);
        bounds.sugar = NutrientRange::new(None, Some(0.0));
        let categories = vec![
            Category {
                id: 1,
                name: "high-protein".to_string(),
                bounds,
            },
            Category {
                id: 2,
                name: "anything".to_string(),
                bounds: CategoryBounds::default(),
            },
        ];

        let bytes = bincode::serialize(&categories).unwrap();

        assert_eq!(decode(&bytes), Some(categories));
    }

    #[test]
    fn cached_list_is_written_with_an_expiry() {
        let packed = store_command(&[1, 2, 3]).get_packed_command();
        let contains = |needle: &[u8]| packed.windows(needle.len()).any(|w| w == needle);

        assert!(contains(b"SETEX"));
        assert!(contains(ALL_CATEGORIES_KEY.as_bytes()));
        assert!(contains(ALL_CATEGORIES_TTL_SECONDS.to_string().as_bytes()));
    }

    #[test]
    fn garbage_is_not_a_category_list() {
        assert_eq!(decode(&[0xff, 0x01]), None);
    }
}
