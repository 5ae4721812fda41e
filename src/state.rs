use diesel::{mysql::MysqlConnection, r2d2::ConnectionManager};
use failsafe::Config as BreakerConfig;
use log::{info, warn};

use crate::{
    cache::{redis_pool, CategoryCache},
    config::Config,
    error::AppError,
    nutrition::BoundPolicy,
    query::{CircuitBreakerType, DbPool},
};

pub struct State {
    pub researcher: DbPool,
    pub nutritionist: DbPool,
    pub categories: CategoryCache,
    pub breaker: CircuitBreakerType,
    pub bound_policy: BoundPolicy,
    pub default_material_quantity: f64,
}

impl State {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let researcher = db_pool(&config.researcher_database_url, config.db_pool_max_size)?;
        let nutritionist = db_pool(&config.nutritionist_database_url, config.db_pool_max_size)?;

        let redis = match &config.redis_url {
            Some(url) => match redis_pool(url) {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!("category cache disabled: {e}");
                    None
                }
            },
            None => {
                info!("REDIS_URL not set, category cache disabled");
                None
            }
        };

        let breaker: CircuitBreakerType = BreakerConfig::new().build();

        Ok(Self {
            researcher,
            nutritionist,
            categories: CategoryCache::new(redis, breaker.clone()),
            breaker,
            bound_policy: config.bound_policy,
            default_material_quantity: config.default_material_quantity,
        })
    }
}

fn db_pool(database_url: &str, max_size: u32) -> Result<DbPool, AppError> {
    let manager = ConnectionManager::<MysqlConnection>::new(database_url);
    Ok(diesel::r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)?)
}
