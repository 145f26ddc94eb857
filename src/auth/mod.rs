//! Caller identity
//!
//! Requests identify their user with an opaque session token, sent either as
//! `Authorization: Bearer <token>` or in the `__session` cookie.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;

use crate::config::SessionEntry;
use crate::error::AppError;
use crate::AppState;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "__session";

/// Resolves the user behind a request, if any
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, parts: &Parts) -> Option<String>;
}

/// Static token → user id table
#[derive(Debug, Default, Clone)]
pub struct SessionTable {
    sessions: HashMap<String, String>,
}

impl SessionTable {
    pub fn new(entries: &[SessionEntry]) -> Self {
        Self {
            sessions: entries
                .iter()
                .map(|e| (e.token.clone(), e.user_id.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for SessionTable {
    async fn resolve(&self, parts: &Parts) -> Option<String> {
        let token = session_token(parts)?;
        self.sessions.get(token).cloned()
    }
}

/// Bearer token first, then the session cookie
fn session_token(parts: &Parts) -> Option<&str> {
    if let Some(token) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// The authenticated caller; rejects with 401 when no identity resolves
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.identity.resolve(parts).await {
            Some(user_id) => Ok(CurrentUser(user_id)),
            None => Err(AppError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn table() -> SessionTable {
        SessionTable::new(&[
            SessionEntry {
                token: "tok-1".into(),
                user_id: "user_1".into(),
            },
            SessionEntry {
                token: "tok-2".into(),
                user_id: "user_2".into(),
            },
        ])
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/generate");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_bearer_token() {
        let resolved = table()
            .resolve(&parts(&[("authorization", "Bearer tok-1")]))
            .await;
        assert_eq!(resolved.as_deref(), Some("user_1"));
    }

    #[tokio::test]
    async fn test_session_cookie() {
        let resolved = table()
            .resolve(&parts(&[("cookie", "theme=dark; __session=tok-2; lang=en")]))
            .await;
        assert_eq!(resolved.as_deref(), Some("user_2"));
    }

    #[tokio::test]
    async fn test_unknown_or_missing_token() {
        let table = table();
        assert!(table.resolve(&parts(&[])).await.is_none());
        assert!(table
            .resolve(&parts(&[("authorization", "Bearer nope")]))
            .await
            .is_none());
        assert!(table
            .resolve(&parts(&[("authorization", "Basic dG9rLTE=")]))
            .await
            .is_none());
        assert!(table
            .resolve(&parts(&[("cookie", "__session=")]))
            .await
            .is_none());
    }

    #[test]
    fn test_table_size() {
        assert_eq!(table().len(), 2);
        assert!(SessionTable::default().is_empty());
    }
}
