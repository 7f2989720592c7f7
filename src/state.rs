use std::sync::Arc;

use crate::{
    cache::CatalogCache,
    config::AppConfig,
    db::{DbPool, OrmConn, create_orm_conn},
    services::auth_service::TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub tokens: TokenService,
    pub cache: CatalogCache,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let orm = create_orm_conn(&pool);
        let tokens = TokenService::from_config(&config);
        let cache = CatalogCache::new(std::time::Duration::from_secs(
            config.catalog_cache_ttl_secs,
        ));
        Self {
            pool,
            orm,
            config: Arc::new(config),
            tokens,
            cache,
        }
    }
}
