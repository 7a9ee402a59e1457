//! Per-principal session state.
//!
//! A [`SessionContext`] is created on sign-in and handed to every resolver and
//! bootstrapper call. The [`SessionRegistry`] owns one bootstrapper per
//! signed-in principal and drops it when the Auth Service reports a sign-out.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{Principal, PrincipalEvent};
use crate::identity::{IdentityError, Profile};
use crate::tenant::{TenantBootstrapper, TenantServices};

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub principal: Principal,
    pub profile: Option<Profile>,
}

impl SessionContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal, profile: None }
    }

    pub fn user_id(&self) -> Uuid {
        self.profile.as_ref().map(Profile::id).unwrap_or(self.principal.id)
    }

    pub fn preferred_organization_id(&self) -> Option<Uuid> {
        self.profile.as_ref().and_then(Profile::preferred_organization_id)
    }

    /// Resolve the profile and keep it once it is persisted. A synthesized
    /// fallback is resolved again on the next call.
    pub async fn ensure_profile(&mut self, services: &TenantServices) -> Result<&Profile, IdentityError> {
        if self.profile.as_ref().map_or(true, Profile::is_synthesized) {
            let profile = services.resolver.resolve_profile(&self.principal).await?;
            if self.profile.is_some() && !profile.is_synthesized() {
                debug!(user_id = %profile.id(), "synthesized profile replaced by stored row");
            }
            self.profile = Some(profile);
        }
        match &self.profile {
            Some(p) => Ok(p),
            None => Err(IdentityError::InvalidPrincipal("profile unavailable".into())),
        }
    }
}

pub struct Session {
    pub ctx: SessionContext,
    pub bootstrapper: TenantBootstrapper,
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Live sessions keyed by principal id.
pub struct SessionRegistry {
    services: TenantServices,
    sessions: DashMap<Uuid, SharedSession>,
}

impl SessionRegistry {
    pub fn new(services: TenantServices) -> Self {
        Self { services, sessions: DashMap::new() }
    }

    pub fn services(&self) -> &TenantServices { &self.services }

    /// Existing session for the principal, or a fresh one.
    pub fn attach(&self, principal: Principal) -> SharedSession {
        self.sessions
            .entry(principal.id)
            .or_insert_with(|| {
                debug!(user_id = %principal.id, "session attached");
                Arc::new(Mutex::new(Session {
                    bootstrapper: TenantBootstrapper::new(self.services.clone()),
                    ctx: SessionContext::new(principal),
                }))
            })
            .clone()
    }

    pub fn get(&self, principal_id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(principal_id).map(|s| s.clone())
    }

    pub fn detach(&self, principal_id: &Uuid) -> bool {
        self.sessions.remove(principal_id).is_some()
    }

    pub fn len(&self) -> usize { self.sessions.len() }

    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }

    /// Tear sessions down as sign-out events arrive. Ends when the sender is dropped.
    pub fn spawn_teardown(self: Arc<Self>, mut events: broadcast::Receiver<PrincipalEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PrincipalEvent::SignedOut { principal_id }) => {
                        if self.detach(&principal_id) {
                            info!(user_id = %principal_id, "session torn down");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "principal events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::store::mock::{MemoryStore, StoreOp};
    use crate::store::StoreError;
    use crate::storage::JsonMapStore;

    async fn services() -> TenantServices {
        let path = std::env::temp_dir().join(format!("session_{}.json", Uuid::new_v4()));
        let storage = JsonMapStore::<String, String>::new(path).await.unwrap();
        TenantServices::new(Arc::new(MemoryStore::new()), storage, RetryPolicy::none(), RetryPolicy::none())
    }

    fn principal() -> Principal {
        Principal { id: Uuid::new_v4(), email: "s@example.com".into(), email_confirmed_at: None, metadata: serde_json::json!({}) }
    }

    #[tokio::test]
    async fn attach_reuses_session() {
        let registry = SessionRegistry::new(services().await);
        let p = principal();
        let a = registry.attach(p.clone());
        let b = registry.attach(p.clone());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn ensure_profile_resolves_once() {
        let services = services().await;
        let mut ctx = SessionContext::new(principal());
        let first = ctx.ensure_profile(&services).await.unwrap().clone();
        let second = ctx.ensure_profile(&services).await.unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(ctx.user_id(), first.id());
    }

    #[tokio::test]
    async fn synthesized_profile_recovers_once_store_is_back() {
        let store = Arc::new(MemoryStore::new());
        let path = std::env::temp_dir().join(format!("session_{}.json", Uuid::new_v4()));
        let storage = JsonMapStore::<String, String>::new(path).await.unwrap();
        let services = TenantServices::new(store.clone(), storage, RetryPolicy::none(), RetryPolicy::none());
        let mut ctx = SessionContext::new(principal());

        store.fail_next(StoreOp::FindProfile, StoreError::PermissionDenied("rls".into()));
        assert!(ctx.ensure_profile(&services).await.unwrap().is_synthesized());
        assert_eq!(store.profile_count(), 0);

        let recovered = ctx.ensure_profile(&services).await.unwrap().clone();
        assert!(!recovered.is_synthesized());
        assert_eq!(store.profile_count(), 1);

        ctx.ensure_profile(&services).await.unwrap();
        assert_eq!(store.calls(StoreOp::FindProfile), 2);
    }

    #[tokio::test]
    async fn signed_out_event_tears_down_session() {
        let registry = Arc::new(SessionRegistry::new(services().await));
        let (tx, rx) = broadcast::channel(8);
        let handle = registry.clone().spawn_teardown(rx);

        let keep = principal();
        let gone = principal();
        registry.attach(keep.clone());
        registry.attach(gone.clone());

        tx.send(PrincipalEvent::SignedIn(keep.clone())).unwrap();
        tx.send(PrincipalEvent::SignedOut { principal_id: gone.id }).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(registry.get(&keep.id).is_some());
        assert!(registry.get(&gone.id).is_none());
    }
}
