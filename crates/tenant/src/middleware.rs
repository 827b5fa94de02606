use crate::boot::boot;
use crate::config::TenantableConfig;
use crate::context::TenantContext;
use crate::events::EventBus;
use crate::resolver::{Invocation, ResolutionState, Resolver};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tenantable_database::{CredentialCodec, TenantDirectory};

/// Shared, read-only pieces each per-request resolver is built from
#[derive(Clone)]
pub struct TenantableState {
    pub directory: Arc<dyn TenantDirectory>,
    pub codec: Arc<CredentialCodec>,
    pub config: Arc<TenantableConfig>,
    pub events: EventBus,
}

impl TenantableState {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        codec: Arc<CredentialCodec>,
        config: TenantableConfig,
    ) -> Self {
        Self {
            directory,
            codec,
            config: Arc::new(config),
            events: EventBus::new(),
        }
    }

    /// Fresh resolver with its own context; never share one across requests.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(
            self.directory.clone(),
            self.codec.clone(),
            TenantContext::from_config(&self.config),
        )
        .with_events(self.events.clone())
    }
}

/// Resolve the tenant from the Host header and hand the resulting
/// `TenantContext` to downstream handlers as a request extension.
/// Unknown hosts get 404.
pub async fn resolve_tenant(
    State(state): State<TenantableState>,
    mut request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string();

    let mut resolver = state.resolver();

    match boot(&mut resolver, &Invocation::request(&host)).await {
        Ok(ResolutionState::Resolved) => {
            request.extensions_mut().insert(resolver.into_context());
            next.run(request).await
        }
        Ok(_) => (StatusCode::NOT_FOUND, "Tenant not found").into_response(),
        Err(e) => {
            tracing::error!("Tenant resolution failed for host {}: {}", host, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
