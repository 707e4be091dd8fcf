use sqlx::PgPool;

use crate::{
    config::Settings,
    db::QueryExecutor,
    repository::{ActivityRepository, AgentMemoryRepository, ProfileRepository},
    utils::jwt::TokenIssuer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub executor: QueryExecutor,
    pub tokens: TokenIssuer,
    pub profiles: ProfileRepository,
    pub activities: ActivityRepository,
    pub memory: AgentMemoryRepository,
}

impl AppState {
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        let executor = QueryExecutor::new(pool, settings.database.retry_policy());
        Self {
            profiles: ProfileRepository::new(executor.clone(), settings.initial_powers),
            activities: ActivityRepository::new(executor.clone()),
            memory: AgentMemoryRepository::new(executor.clone()),
            tokens: TokenIssuer::new(&settings.jwt_secret, settings.jwt_expiry_hours),
            executor,
        }
    }
}
