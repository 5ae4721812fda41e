use std::{env, fmt::Display, str::FromStr};

use log::info;

use crate::{error::ConfigError, nutrition::BoundPolicy};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";
const DEFAULT_POOL_MAX_SIZE: &str = "10";
const DEFAULT_MATERIAL_QUANTITY: &str = "1";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub researcher_database_url: String,
    pub nutritionist_database_url: String,
    pub redis_url: Option<String>,
    pub db_pool_max_size: u32,
    pub bound_policy: BoundPolicy,
    /// Quantity recorded for a recipe material sent without one.
    pub default_material_quantity: f64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let zero_bound_is_unset: bool = try_load(&lookup, "ZERO_BOUND_IS_UNSET", "true")?;
        let default_material_quantity: f64 =
            try_load(&lookup, "DEFAULT_MATERIAL_QUANTITY", DEFAULT_MATERIAL_QUANTITY)?;
        if !(default_material_quantity > 0.0) {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_MATERIAL_QUANTITY",
                value: default_material_quantity.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            host: try_load(&lookup, "HOST", DEFAULT_HOST)?,
            port: try_load(&lookup, "PORT", DEFAULT_PORT)?,
            researcher_database_url: required(&lookup, "RESEARCHER_DATABASE_URL")?,
            nutritionist_database_url: required(&lookup, "NUTRITIONIST_DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            db_pool_max_size: try_load(&lookup, "DB_POOL_MAX_SIZE", DEFAULT_POOL_MAX_SIZE)?,
            bound_policy: if zero_bound_is_unset {
                BoundPolicy::Legacy
            } else {
                BoundPolicy::Strict
            },
            default_material_quantity,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or(ConfigError::Missing(key))
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const DATABASES: [(&str, &str); 2] = [
        ("RESEARCHER_DATABASE_URL", "mysql://researcher@localhost/catalog"),
        ("NUTRITIONIST_DATABASE_URL", "mysql://nutritionist@localhost/recipes"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&DATABASES)).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.db_pool_max_size, 10);
        assert_eq!(config.bound_policy, BoundPolicy::Legacy);
        assert_eq!(config.default_material_quantity, 1.0);
    }

    #[test]
    fn strict_bounds_can_be_enabled() {
        let mut vars = DATABASES.to_vec();
        vars.push(("ZERO_BOUND_IS_UNSET", "false"));
        vars.push(("REDIS_URL", "redis://127.0.0.1/"));

        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.bound_policy, BoundPolicy::Strict);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
    }

    #[test]
    fn database_urls_are_required() {
        let err = Config::from_lookup(lookup(&DATABASES[..1])).err().unwrap();

        assert!(matches!(err, ConfigError::Missing("NUTRITIONIST_DATABASE_URL")));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = DATABASES.to_vec();
        vars.push(("PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        let mut vars = DATABASES.to_vec();
        vars.push(("DEFAULT_MATERIAL_QUANTITY", "-4"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid {
                key: "DEFAULT_MATERIAL_QUANTITY",
                ..
            })
        ));
    }
}
