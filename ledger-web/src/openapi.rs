//! OpenAPI specification for the ledger server

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    auth::users::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest},
    handlers::{
        AdminUserPage, EntryStatistics, HealthResponse, LedgerEntryRequest, LedgerPage,
        LedgerStatsByUser, LogPage, MonthCount, RoleUpdateRequest, Statistics, UserCount,
        UserStatistics, UserTrend,
    },
};
use ledger_core::{AuditEntry, AuditLevel, LedgerEntry, Role, Suggestion, UserProfile, UserSummary};

/// Main OpenAPI specification for the ledger server
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ledger Web API",
        version = "0.1.0",
        description = "Multi-user work ledger with role-based access, export and audit log",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Health
        crate::handlers::health::health_check,

        // Authentication
        crate::auth::handlers::register_user,
        crate::auth::handlers::login_user,
        crate::auth::handlers::current_user,
        crate::auth::handlers::change_password,

        // Ledger
        crate::handlers::ledger::list_entries,
        crate::handlers::ledger::get_entry,
        crate::handlers::ledger::create_entry,
        crate::handlers::ledger::update_entry,
        crate::handlers::ledger::delete_entry,

        // Meta
        crate::handlers::meta::provinces,
        crate::handlers::meta::nature_options,
        crate::handlers::meta::project_item_suggestions,
        crate::handlers::meta::location_suggestions,
        crate::handlers::meta::export_ledger,
        crate::handlers::meta::ledger_stats_by_user,

        // Admin
        crate::handlers::admin::list_users,
        crate::handlers::admin::update_user_role,
        crate::handlers::admin::delete_user,
        crate::handlers::admin::statistics,
        crate::handlers::admin::activity_logs,
        crate::handlers::admin::export_logs,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            UserProfile,
            UserSummary,
            Role,
            LedgerEntry,
            LedgerEntryRequest,
            LedgerPage,
            Suggestion,
            UserCount,
            MonthCount,
            UserTrend,
            LedgerStatsByUser,
            AdminUserPage,
            RoleUpdateRequest,
            AuditEntry,
            AuditLevel,
            LogPage,
            UserStatistics,
            EntryStatistics,
            Statistics,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, login and account"),
        (name = "Ledger", description = "Ledger entry management"),
        (name = "Meta", description = "Lookups, autocomplete, export and reporting"),
        (name = "Admin", description = "User administration and activity log"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Bearer token scheme referenced by protected operations
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Ledger Web API");
        assert!(openapi.paths.paths.contains_key("/api/ledger"));
        assert!(openapi.paths.paths.contains_key("/api/ledger/{id}"));
        assert!(openapi.paths.paths.contains_key("/api/admin/users/{id}/role"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let json = ApiDoc::openapi().to_pretty_json().unwrap();
        assert!(json.contains("bearer_auth"));
        assert!(json.contains("JWT"));
    }
}
