use std::sync::Arc;

use lms_db::sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::throttle::LoginThrottle;
use crate::tokens::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub tokens: Arc<TokenService>,
    pub throttle: Arc<LoginThrottle>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            tokens: Arc::new(TokenService::from_config(&config)),
            throttle: Arc::new(LoginThrottle::in_memory(
                config.login_max_attempts,
                config.login_window,
            )),
            config: Arc::new(config),
        }
    }
}
