use std::sync::Arc;

use argon2::{Argon2, password_hash::{PasswordHasher, PasswordVerifier, SaltString}, PasswordHash};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashSet;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header as JwtHeader, Validation};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::domain::{AuthSession, NewIdentity, PasswordReset, Principal, PrincipalEvent, SignInInput, SignUpInput, SignUpOutcome};
use super::errors::AuthError;
use super::repository::AuthRepository;

/// The Auth Service contract the rest of the system consumes.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, input: SignUpInput) -> Result<SignUpOutcome, AuthError>;
    async fn sign_in(&self, input: SignInInput) -> Result<AuthSession, AuthError>;
    /// Exchange the code from the verification link; confirms the email.
    async fn confirm_email(&self, code: &str) -> Result<Principal, AuthError>;
    /// Principal behind a session token, `None` if the token is invalid, expired or revoked.
    async fn current_principal(&self, access_token: &str) -> Result<Option<Principal>, AuthError>;
    fn subscribe(&self) -> broadcast::Receiver<PrincipalEvent>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
    /// Issue a recovery token for `email`. `None` when no identity has that email.
    async fn request_password_reset(&self, email: &str) -> Result<Option<PasswordReset>, AuthError>;
    /// Exchange a recovery token for a new password. Tokens are single use.
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Principal, AuthError>;
    /// Change the password of the principal behind a live session token.
    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthError>;
}

/// Auth service configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub require_email_confirmation: bool,
    pub password_algorithm: String,
    /// Base of the verification and recovery links.
    pub site_url: String,
}

impl From<&configs::AuthSettings> for AuthConfig {
    fn from(s: &configs::AuthSettings) -> Self {
        Self {
            jwt_secret: s.jwt_secret.clone(),
            session_ttl: Duration::hours(s.session_ttl_hours),
            require_email_confirmation: s.require_email_confirmation,
            password_algorithm: "argon2".into(),
            site_url: s.site_url.clone(),
        }
    }
}

impl AuthConfig {
    fn link(&self, path_and_query: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path_and_query)
    }
}

const RECOVERY_TTL_MINUTES: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    jti: String,
    iat: usize,
    exp: usize,
}

/// Auth Service backed by an `AuthRepository`, argon2 hashes and HS256 session tokens.
pub struct LocalAuthProvider<R: AuthRepository> {
    repo: Arc<R>,
    cfg: AuthConfig,
    revoked: DashSet<String>,
    events: broadcast::Sender<PrincipalEvent>,
}

impl<R: AuthRepository> LocalAuthProvider<R> {
    pub fn new(repo: Arc<R>, cfg: AuthConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { repo, cfg, revoked: DashSet::new(), events }
    }

    fn emit(&self, event: PrincipalEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn issue_token(&self, principal: &Principal) -> Result<(String, chrono::DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + self.cfg.session_ttl;
        let claims = Claims {
            sub: principal.id.to_string(),
            email: principal.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };
        let token = encode(&JwtHeader::default(), &claims, &EncodingKey::from_secret(self.cfg.jwt_secret.as_bytes()))
            .map_err(|e| AuthError::TokenError(e.to_string()))?;
        Ok((token, expires_at))
    }

    fn decode_claims(&self, token: &str) -> Option<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &DecodingKey::from_secret(self.cfg.jwt_secret.as_bytes()), &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "rejecting session token");
                None
            }
        }
    }
}

fn confirmation_code() -> String {
    OsRng.sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::Validation("password too short (>=8)".into()));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::HashError(e.to_string()))?
        .to_string())
}

#[async_trait]
impl<R: AuthRepository> AuthProvider for LocalAuthProvider<R> {
    /// Register a new principal with a hashed password.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthConfig, AuthProvider, LocalAuthProvider, repository::mock::MockAuthRepository};
    /// use service::auth::domain::SignUpInput;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let cfg = AuthConfig { jwt_secret: "0123456789abcdef".into(), session_ttl: chrono::Duration::hours(1), require_email_confirmation: true, password_algorithm: "argon2".into(), site_url: "http://localhost:3000".into() };
    /// let auth = LocalAuthProvider::new(repo, cfg);
    /// let input = SignUpInput { email: "user@example.com".into(), password: "Secret123".into(), metadata: serde_json::json!({"name": "Ada"}) };
    /// let outcome = tokio_test::block_on(auth.sign_up(input)).unwrap();
    /// assert!(outcome.requires_email_confirmation);
    /// assert!(outcome.confirmation_token.is_some());
    /// assert!(outcome.verification_link.unwrap().starts_with("http://localhost:3000/auth/callback?code="));
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    async fn sign_up(&self, input: SignUpInput) -> Result<SignUpOutcome, AuthError> {
        models::user::validate_email(&input.email).map_err(|e| AuthError::Validation(e.to_string()))?;
        validate_password(&input.password)?;
        if let Some(existing) = self.repo.find_by_email(&input.email).await? {
            debug!("identity exists: {}", existing.principal.email);
            return Err(AuthError::Conflict);
        }

        let hash = hash_password(&input.password)?;

        let confirmation_token = self.cfg.require_email_confirmation.then(confirmation_code);
        let metadata = if input.metadata.is_null() { serde_json::json!({}) } else { input.metadata };
        let principal = self
            .repo
            .create_identity(NewIdentity {
                email: input.email.trim().to_string(),
                password_hash: hash,
                password_algorithm: self.cfg.password_algorithm.clone(),
                metadata,
                confirmation_token: confirmation_token.clone(),
            })
            .await?;
        info!(principal_id = %principal.id, email = %principal.email, "principal_registered");
        let verification_link = confirmation_token
            .as_deref()
            .map(|code| self.cfg.link(&format!("/auth/callback?code={code}&next=/dashboard")));
        Ok(SignUpOutcome {
            principal_id: principal.id,
            requires_email_confirmation: confirmation_token.is_some(),
            confirmation_token,
            verification_link,
            principal,
        })
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    async fn sign_in(&self, input: SignInInput) -> Result<AuthSession, AuthError> {
        let record = self.repo
            .find_by_email(input.email.trim())
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let parsed = PasswordHash::new(&record.password_hash).map_err(|e| AuthError::HashError(e.to_string()))?;
        if Argon2::default().verify_password(input.password.as_bytes(), &parsed).is_err() {
            return Err(AuthError::Unauthorized);
        }
        if self.cfg.require_email_confirmation && !record.principal.is_confirmed() {
            return Err(AuthError::EmailNotConfirmed);
        }

        let (access_token, expires_at) = self.issue_token(&record.principal)?;
        info!(principal_id = %record.principal.id, "principal_signed_in");
        self.emit(PrincipalEvent::SignedIn(record.principal.clone()));
        Ok(AuthSession { principal: record.principal, access_token, expires_at })
    }

    #[instrument(skip(self, code))]
    async fn confirm_email(&self, code: &str) -> Result<Principal, AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::InvalidConfirmation);
        }
        let principal = self.repo.confirm(code.trim()).await?.ok_or(AuthError::InvalidConfirmation)?;
        info!(principal_id = %principal.id, "email_confirmed");
        self.emit(PrincipalEvent::EmailConfirmed(principal.clone()));
        Ok(principal)
    }

    async fn current_principal(&self, access_token: &str) -> Result<Option<Principal>, AuthError> {
        let Some(claims) = self.decode_claims(access_token) else { return Ok(None) };
        if self.revoked.contains(&claims.jti) {
            return Ok(None);
        }
        let id = Uuid::parse_str(&claims.sub).map_err(|e| AuthError::TokenError(e.to_string()))?;
        self.repo.find_by_id(id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<PrincipalEvent> {
        self.events.subscribe()
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let Some(claims) = self.decode_claims(access_token) else {
            warn!("sign_out with invalid token; nothing to revoke");
            return Ok(());
        };
        let principal_id = Uuid::parse_str(&claims.sub).map_err(|e| AuthError::TokenError(e.to_string()))?;
        self.revoked.insert(claims.jti);
        info!(%principal_id, "principal_signed_out");
        self.emit(PrincipalEvent::SignedOut { principal_id });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn request_password_reset(&self, email: &str) -> Result<Option<PasswordReset>, AuthError> {
        let Some(record) = self.repo.find_by_email(email.trim()).await? else {
            debug!("password reset for unknown email");
            return Ok(None);
        };
        let token = confirmation_code();
        let expires_at = Utc::now() + Duration::minutes(RECOVERY_TTL_MINUTES);
        self.repo.set_recovery_token(record.principal.id, &token, expires_at).await?;
        info!(principal_id = %record.principal.id, "password_reset_requested");
        Ok(Some(PasswordReset {
            principal_id: record.principal.id,
            link: self.cfg.link(&format!("/reset-password?token={token}")),
            token,
        }))
    }

    #[instrument(skip(self, token, new_password))]
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Principal, AuthError> {
        validate_password(new_password)?;
        if token.trim().is_empty() {
            return Err(AuthError::InvalidRecovery);
        }
        let principal = self
            .repo
            .take_recovery_token(token.trim(), Utc::now())
            .await?
            .ok_or(AuthError::InvalidRecovery)?;
        self.repo.update_password_hash(principal.id, hash_password(new_password)?).await?;
        info!(principal_id = %principal.id, "password_reset");
        Ok(principal)
    }

    #[instrument(skip(self, access_token, new_password))]
    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let principal = self.current_principal(access_token).await?.ok_or(AuthError::Unauthorized)?;
        self.repo.update_password_hash(principal.id, hash_password(new_password)?).await?;
        info!(principal_id = %principal.id, "password_updated");
        Ok(())
    }
}
