//! Best-effort audit trail

use crate::store::{ActivityLogRepository, NewAuditEntry};
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
};
use ledger_core::AuditLevel;
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::error;

/// Where a request came from, as recorded in audit rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .or_else(|| {
                header("x-forwarded-for")
                    .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            })
            .or_else(|| header("x-real-ip"));

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self {
            ip_address,
            user_agent,
        })
    }
}

/// Writes audit rows. Failures are logged and never reach the caller.
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    repository: ActivityLogRepository,
}

impl ActivityLogger {
    pub fn new(repository: ActivityLogRepository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &ActivityLogRepository {
        &self.repository
    }

    pub async fn record(
        &self,
        level: AuditLevel,
        message: &str,
        user_id: Option<i64>,
        origin: &RequestOrigin,
    ) {
        self.record_with_details(level, message, user_id, None, origin)
            .await
    }

    pub async fn record_with_details(
        &self,
        level: AuditLevel,
        message: &str,
        user_id: Option<i64>,
        details: Option<&str>,
        origin: &RequestOrigin,
    ) {
        let entry = NewAuditEntry {
            level,
            message,
            user_id,
            details,
            ip_address: origin.ip_address.as_deref(),
            user_agent: origin.user_agent.as_deref(),
        };
        if let Err(e) = self.repository.insert(&entry).await {
            error!(error = %e, message = %message, "Failed to log activity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn origin_of(request: Request<()>) -> RequestOrigin {
        let (mut parts, _) = request.into_parts();
        RequestOrigin::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn connect_info_wins_over_headers() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 4000))));

        let origin = origin_of(request).await;
        assert_eq!(origin.ip_address.as_deref(), Some("192.168.1.5"));
        assert_eq!(origin.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[tokio::test]
    async fn forwarded_header_used_without_connect_info() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(())
            .unwrap();
        let origin = origin_of(request).await;
        assert_eq!(origin.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(origin.user_agent, None);
    }
}
