//! Per-profile connection pools, built once at startup and injected into
//! repositories. A repository clones its profile's pool handle, so repeated
//! construction within one request reuses the same connections.

use crate::config::{DatabaseConfig, Settings};
use crate::error::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;

struct Profile {
    pool: PgPool,
    config: DatabaseConfig,
}

/// Process-wide pool registry keyed by profile name.
pub struct PoolRegistry {
    profiles: HashMap<String, Profile>,
}

impl PoolRegistry {
    /// Connect every configured profile. A failed initial connection is
    /// fatal; the message carries driver detail only when `settings.debug`
    /// is set.
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        let mut profiles = HashMap::new();
        for (name, config) in &settings.databases {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.url())
                .await
                .map_err(|e| {
                    AppError::Connection(if settings.debug {
                        format!("unable to connect to database '{}': {}", name, e)
                    } else {
                        "unable to connect to database".into()
                    })
                })?;
            profiles.insert(
                name.clone(),
                Profile {
                    pool,
                    config: config.clone(),
                },
            );
        }
        Ok(PoolRegistry { profiles })
    }

    /// Pool handle and config for a profile.
    pub fn get(&self, profile: &str) -> Result<(&PgPool, &DatabaseConfig), AppError> {
        self.profiles
            .get(profile)
            .map(|p| (&p.pool, &p.config))
            .ok_or_else(|| AppError::UnknownProfile(profile.to_string()))
    }
}
