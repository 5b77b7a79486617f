//! Custom Axum extractors.
//!
//! `AuthenticatedCaller` reads the caller identity from the `X-User-*`
//! headers set by the fronting identity proxy.
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     AuthenticatedCaller(caller): AuthenticatedCaller,
//! ) -> Result<Json<Profile>, AppError> {
//!     Ok(Json(state.service.get_profile(&caller).await?))
//! }
//! ```

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use conference_core::error::ConferenceError;
use conference_core::model::Caller;

/// Header carrying the stable user id. Required.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the caller's email address.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// Header carrying the caller's nickname.
pub const USER_NAME_HEADER: &str = "X-User-Name";

/// The authenticated caller of a request.
///
/// Rejects with 401 when `X-User-Id` is missing or blank. The email defaults
/// to empty and the nickname to the local part of the email, or the user id
/// when there is no email.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller(pub Caller);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::bad_request(format!("{name} header is not valid text")))
        })
        .transpose()
        .map(|value| value.filter(|s| !s.is_empty()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(user_id) = header(parts, USER_ID_HEADER)? else {
            return Err(ConferenceError::Unauthenticated.into());
        };
        let email = header(parts, USER_EMAIL_HEADER)?.unwrap_or_default();
        let nickname = match header(parts, USER_NAME_HEADER)? {
            Some(name) => name,
            None => email
                .split_once('@')
                .map_or(user_id, |(local, _)| local)
                .trim(),
        };
        let nickname = if nickname.is_empty() { user_id } else { nickname };

        Ok(Self(Caller::new(user_id, email, nickname)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn caller_from(req: Request<()>) -> Result<Caller, AppError> {
        let (mut parts, ()) = req.into_parts();
        AuthenticatedCaller::from_request_parts(&mut parts, &())
            .await
            .map(|c| c.0)
    }

    #[tokio::test]
    async fn test_caller_from_all_headers() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-1")
            .header(USER_EMAIL_HEADER, "ada@example.com")
            .header(USER_NAME_HEADER, "Ada")
            .body(())
            .expect("Valid request");

        let caller = caller_from(req).await.expect("Should extract");
        assert_eq!(caller, Caller::new("u-1", "ada@example.com", "Ada"));
    }

    #[tokio::test]
    async fn test_nickname_defaults_to_email_local_part() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-1")
            .header(USER_EMAIL_HEADER, "ada@example.com")
            .body(())
            .expect("Valid request");

        let caller = caller_from(req).await.expect("Should extract");
        assert_eq!(caller.nickname, "ada");
    }

    #[tokio::test]
    async fn test_nickname_defaults_to_user_id_without_email() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-1")
            .body(())
            .expect("Valid request");

        let caller = caller_from(req).await.expect("Should extract");
        assert_eq!(caller.email, "");
        assert_eq!(caller.nickname, "u-1");
    }

    #[tokio::test]
    async fn test_missing_user_id_is_unauthorized() {
        let req = Request::builder()
            .header(USER_EMAIL_HEADER, "ada@example.com")
            .body(())
            .expect("Valid request");

        let err = caller_from(req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), ConferenceError::Unauthenticated.code());
    }

    #[tokio::test]
    async fn test_blank_user_id_is_unauthorized() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "   ")
            .body(())
            .expect("Valid request");

        let err = caller_from(req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
