//! Application state shared by every handler

use crate::{
    activity::ActivityLogger,
    auth::{jwt::JwtService, users::UserService},
    database::Database,
    store::{ActivityLogRepository, LedgerRepository, ProvinceRepository, UserRepository},
};
use axum::extract::FromRef;
use ledger_core::{LedgerConfig, LedgerResult};
use std::sync::Arc;
use tracing::{info, warn};

/// Built once at startup and cloned into each request
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<LedgerConfig>,
    pub database: Database,
    pub jwt: JwtService,
    pub accounts: UserService,
    pub users: UserRepository,
    pub ledger: LedgerRepository,
    pub activity: ActivityLogger,
    pub provinces: ProvinceRepository,
}

impl AppState {
    /// Connect to the database, create the schema and bootstrap data
    pub async fn new(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        for warning in config.security_warnings() {
            warn!("{}", warning);
        }

        let database = Database::connect(&config.database).await?;
        let state = Self::with_database(config, database);
        state.bootstrap().await?;
        Ok(state)
    }

    /// Wire repositories over an existing connection pool
    pub fn with_database(config: LedgerConfig, database: Database) -> Self {
        let jwt = JwtService::from_config(&config.auth);
        let users = UserRepository::new(database.clone());
        let accounts = UserService::new(users.clone(), jwt.clone(), config.auth.min_password_length);

        Self {
            jwt,
            accounts,
            users,
            ledger: LedgerRepository::new(database.clone()),
            activity: ActivityLogger::new(ActivityLogRepository::new(database.clone())),
            provinces: ProvinceRepository::new(database.clone()),
            database,
            config: Arc::new(config),
        }
    }

    /// Idempotent: bootstrap admin and default provinces
    pub async fn bootstrap(&self) -> LedgerResult<()> {
        let auth = &self.config.auth;
        if self
            .accounts
            .ensure_bootstrap_admin(&auth.bootstrap_admin_username, &auth.bootstrap_admin_password)
            .await?
        {
            info!(username = %auth.bootstrap_admin_username, "Bootstrap admin ready");
        }
        self.provinces.seed(&self.config.catalog.provinces).await?;
        Ok(())
    }
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
