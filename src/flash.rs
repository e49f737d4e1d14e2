//! One-shot user-visible notices ("flash" messages).
//!
//! A redirect defers its notices; `carry_flash` stores them in a signed cookie
//! and hands them to the next rendered view, which consumes them.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::auth::{FLASH_COOKIE, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }
}

// Request extension: notices that arrived with the flash cookie.
#[derive(Clone, Default)]
struct PendingNotices(Vec<Notice>);

// Response extension: notices a redirect wants shown on the next page.
#[derive(Clone)]
pub(crate) struct DeferredNotices(pub(crate) Vec<Notice>);

// Response extension: the pending notices were rendered.
#[derive(Clone, Copy)]
pub(crate) struct NoticesShown;

/// Flash
///
/// Extractor yielding the notices waiting to be displayed. Handing them to a view
/// with `Reply::with_flash` marks them as shown.
#[derive(Debug, Clone, Default)]
pub struct Flash(Vec<Notice>);

impl Flash {
    pub fn into_notices(self) -> Vec<Notice> {
        self.0
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Flash(
            parts
                .extensions
                .get::<PendingNotices>()
                .map(|pending| pending.0.clone())
                .unwrap_or_default(),
        ))
    }
}

/// carry_flash
///
/// Middleware moving notices across redirects. Reads the flash cookie into the
/// request, then decides from the response what the cookie should hold next:
/// - a view that displayed the pending notices clears them;
/// - anything else keeps them, plus whatever a redirect deferred.
pub async fn carry_flash(
    State(sessions): State<SessionManager>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let had_cookie = jar.get(FLASH_COOKIE).is_some();
    let pending = jar
        .get(FLASH_COOKIE)
        .and_then(|cookie| sessions.read_notices(cookie.value()))
        .unwrap_or_default();

    request
        .extensions_mut()
        .insert(PendingNotices(pending.clone()));
    let mut response = next.run(request).await;

    let shown = response.extensions_mut().remove::<NoticesShown>().is_some();
    let deferred = response.extensions_mut().remove::<DeferredNotices>();

    let mut carried = if shown { Vec::new() } else { pending };
    if let Some(DeferredNotices(notices)) = deferred {
        carried.extend(notices);
    }

    if carried.is_empty() {
        if had_cookie {
            return (sessions.clear_flash(jar), response).into_response();
        }
        return response;
    }

    match sessions.sign_notices(&carried) {
        Ok(token) => (jar.add(sessions.flash_cookie(token)), response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to store flash notices");
            response
        }
    }
}
