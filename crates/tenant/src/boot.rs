use crate::error::Result;
use crate::resolver::{Invocation, ResolutionState, Resolver};

/// Top-level resolution call for a request or console run.
///
/// Persistence errors (unreachable database, tenant tables not migrated
/// yet) are logged and discarded so `migrate` and other setup commands can
/// still run; the invocation simply stays unresolved. Anything else, such
/// as a credential that fails to decrypt, is returned.
pub async fn boot(resolver: &mut Resolver, invocation: &Invocation) -> Result<ResolutionState> {
    match resolver.resolve_tenant(invocation).await {
        Ok(state) => Ok(state),
        Err(e) if e.is_persistence() => {
            tracing::debug!("Tenant resolution skipped: {}", e);
            Ok(resolver.state())
        }
        Err(e) => Err(e),
    }
}
