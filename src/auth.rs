use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    flash::Notice,
    models::AdminId,
    repository::RepositoryState,
};

/// Cookie carrying the signed admin session token.
pub const SESSION_COOKIE: &str = "session";
/// Cookie carrying signed notices across one redirect.
pub const FLASH_COOKIE: &str = "flash";

const FLASH_TTL_SECS: u64 = 300;

/// Claims
///
/// Payload of a session token. Signed with the configured secret and validated on
/// every request that presents it; nothing about the session is stored server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the admin id, as a decimal string.
    pub sub: String,
    /// Session id (sid): random per login, so two logins never share a token.
    pub sid: Uuid,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp). Expired tokens resolve to no session.
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlashClaims {
    notices: Vec<Notice>,
    exp: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to sign token: {0}")]
pub struct SessionError(#[from] jsonwebtoken::errors::Error);

/// SessionManager
///
/// Issues and validates the client-held tokens: the admin session and the flash
/// notices. Both are HS256-signed with the same secret, which makes them
/// tamper-evident.
#[derive(Clone)]
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
    secure: bool,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_secs: u64, secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
            secure,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.secret_key, config.session_ttl_secs, config.secure_cookies())
    }

    /// begin
    ///
    /// Issues a token proving that the bearer authenticated as `admin_id`.
    /// Attach it with [`SessionManager::attach`].
    pub fn begin(&self, admin_id: AdminId) -> Result<String, SessionError> {
        let now = unix_now();
        let claims = Claims {
            sub: admin_id.to_string(),
            sid: Uuid::new_v4(),
            iat: now,
            exp: now.saturating_add(usize::try_from(self.ttl_secs).unwrap_or(usize::MAX)),
        };
        self.sign(&claims)
    }

    /// resolve
    ///
    /// Maps a presented token back to its admin id. Bad signatures, malformed
    /// tokens and expired tokens all resolve to `None`.
    pub fn resolve(&self, token: &str) -> Option<AdminId> {
        let claims: Claims = self.verify(token)?;
        claims.sub.parse().ok()
    }

    /// Adds the session cookie for `token` to the jar.
    pub fn attach(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.cookie(SESSION_COOKIE, token, self.ttl_secs))
    }

    /// end
    ///
    /// Clears the session cookie. Ending an already-ended session is harmless.
    pub fn end(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }

    pub(crate) fn sign_notices(&self, notices: &[Notice]) -> Result<String, SessionError> {
        let claims = FlashClaims {
            notices: notices.to_vec(),
            exp: unix_now() + FLASH_TTL_SECS as usize,
        };
        self.sign(&claims)
    }

    pub(crate) fn read_notices(&self, token: &str) -> Option<Vec<Notice>> {
        self.verify::<FlashClaims>(token).map(|claims| claims.notices)
    }

    pub(crate) fn flash_cookie(&self, token: String) -> Cookie<'static> {
        self.cookie(FLASH_COOKIE, token, FLASH_TTL_SECS)
    }

    pub(crate) fn clear_flash(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(FLASH_COOKIE).path("/"))
    }

    fn cookie(&self, name: &'static str, value: String, max_age_secs: u64) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(
                i64::try_from(max_age_secs).unwrap_or(i64::MAX),
            ))
            .build()
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, SessionError> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let mut validation = Validation::default();
        // Ensure expiration time validation is always active.
        validation.validate_exp = true;
        match decode::<T>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "rejected client token");
                None
            }
        }
    }
}

fn unix_now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

/// AuthContext
///
/// The per-request authentication context, derived from the inbound session
/// cookie. Extracting it never fails: requests without a valid session are
/// simply anonymous. Public handlers use it to know who is looking; the gate
/// uses it through [`AdminSession`].
///
/// When the admin behind a valid token cannot be looked up (database failure),
/// the context is anonymous but remembers the failure, so the gate can answer
/// with an internal error instead of a login redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthContext {
    admin: Option<AdminId>,
    lookup_failed: bool,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(admin_id: AdminId) -> Self {
        Self {
            admin: Some(admin_id),
            lookup_failed: false,
        }
    }

    /// A presented session that could not be checked against the admin table.
    pub fn lookup_failed() -> Self {
        Self {
            admin: None,
            lookup_failed: true,
        }
    }

    /// current
    ///
    /// The admin bound to this request, if any. Pure lookup.
    pub fn current(&self) -> Option<AdminId> {
        self.admin
    }

    pub fn is_authenticated(&self) -> bool {
        self.admin.is_some()
    }

    /// Whether the session could not be resolved because of a storage failure.
    pub fn is_unavailable(&self) -> bool {
        self.lookup_failed
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
    SessionManager: FromRef<S>,
    RepositoryState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Resolved once per request; the gate and the handler share the result.
        if let Some(context) = parts.extensions.get::<AuthContext>() {
            return Ok(*context);
        }

        let sessions = SessionManager::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let claimed = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| sessions.resolve(cookie.value()));

        let context = match claimed {
            None => AuthContext::anonymous(),
            // A valid signature is not enough: the admin must still exist.
            Some(admin_id) => match RepositoryState::from_ref(state).get_admin(admin_id).await {
                Ok(Some(admin)) => AuthContext::authenticated(admin.id),
                Ok(None) => AuthContext::anonymous(),
                Err(e) => {
                    tracing::error!(error = %e, admin_id, "session admin lookup failed");
                    AuthContext::lookup_failed()
                }
            },
        };

        parts.extensions.insert(context);
        Ok(context)
    }
}

/// AdminSession
///
/// Proof that the request carries an authenticated admin session. Protected
/// handlers take it as an argument; extraction fails with
/// [`AppError::Unauthorized`], which redirects to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminSession {
    pub id: AdminId,
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    SessionManager: FromRef<S>,
    RepositoryState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = match AuthContext::from_request_parts(parts, state).await {
            Ok(context) => context,
            Err(never) => match never {},
        };

        match context.current() {
            Some(id) => Ok(AdminSession { id }),
            None if context.is_unavailable() => Err(AppError::Internal(
                "session admin lookup failed".to_string(),
            )),
            None => {
                tracing::info!(path = %parts.uri.path(), "login required");
                Err(AppError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::NoticeLevel;

    fn manager() -> SessionManager {
        SessionManager::new("unit-test-secret", 3600, false)
    }

    #[test]
    fn test_session_token_round_trip() {
        let sessions = manager();
        let token = sessions.begin(7).unwrap();
        assert_eq!(sessions.resolve(&token), Some(7));
    }

    #[test]
    fn test_each_login_issues_a_distinct_token() {
        let sessions = manager();
        assert_ne!(sessions.begin(7).unwrap(), sessions.begin(7).unwrap());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let forged = SessionManager::new("attacker-secret", 3600, false)
            .begin(1)
            .unwrap();
        assert_eq!(manager().resolve(&forged), None);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let sessions = manager();
        let mut token = sessions.begin(1).unwrap();
        token.push('x');
        assert_eq!(sessions.resolve(&token), None);
        assert_eq!(sessions.resolve("not-a-token"), None);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let sessions = manager();
        let claims = Claims {
            sub: "1".to_string(),
            sid: Uuid::new_v4(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = sessions.sign(&claims).unwrap();
        assert_eq!(sessions.resolve(&token), None);
    }

    #[test]
    fn test_oversized_ttl_does_not_overflow() {
        let sessions = SessionManager::new("unit-test-secret", u64::MAX, false);
        let token = sessions.begin(1).unwrap();

        let jar = sessions.attach(CookieJar::new(), token);
        let max_age = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| cookie.max_age())
            .unwrap();
        assert!(max_age.is_positive());
    }

    #[test]
    fn test_failed_lookup_is_not_authenticated() {
        let context = AuthContext::lookup_failed();
        assert_eq!(context.current(), None);
        assert!(context.is_unavailable());
        assert!(!AuthContext::anonymous().is_unavailable());
    }

    #[test]
    fn test_flash_token_is_not_a_session() {
        let sessions = manager();
        let token = sessions
            .sign_notices(&[Notice::new(NoticeLevel::Info, "hello")])
            .unwrap();
        assert_eq!(sessions.resolve(&token), None);
        assert_eq!(sessions.read_notices(&token).unwrap().len(), 1);
    }
}
