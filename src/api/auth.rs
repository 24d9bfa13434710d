use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::{Body, Request};
use log::debug;
use uuid::Uuid;

use crate::api::error::{Forbidden, HttpError, HttpResult, Unauthorized};
use crate::api::token::SessionToken;
use crate::model::{ApiContext, Role, UserId};

fn unauthorized() -> Box<dyn HttpError> {
    Box::new(Unauthorized)
}

pub(super) const SESSION_COOKIE: &str = "session";

/// The verified caller of a request. The role comes from the live account,
/// not the token, so a demotion takes effect immediately.
#[derive(Debug, Copy, Clone)]
pub(super) struct Session {
    pub user_id: UserId,
    pub role: Role,
}

impl Session {
    pub fn require_admin(&self) -> HttpResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(Box::new(Forbidden))
        }
    }

    pub fn require_superadmin(&self) -> HttpResult<()> {
        if self.role == Role::SuperAdmin {
            Ok(())
        } else {
            Err(Box::new(Forbidden))
        }
    }
}

/// Verifies the bearer header or session cookie and resolves the account.
pub(super) async fn authenticate(
    context: &ApiContext,
    req: &Request<Body>,
    secret: &[u8],
) -> HttpResult<Session> {
    let raw = extract_token(req).ok_or_else(unauthorized)?;
    let token = SessionToken::decode(&raw, secret).map_err(|err| {
        debug!("Rejected session token: {}", err);
        unauthorized()
    })?;

    let subject: Uuid = token
        .claims
        .subject
        .parse()
        .map_err(|_| unauthorized())?;
    let user_id = UserId(subject);

    let state = context.read_state().await;
    let account = state.user(user_id).ok_or_else(unauthorized)?;
    Ok(Session {
        user_id,
        role: account.role,
    })
}

fn extract_token(req: &Request<Body>) -> Option<String> {
    if let Some(value) = req.headers().get(AUTHORIZATION) {
        let value = value.to_str().ok()?;
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    let cookies = req.headers().get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(header: &'static str, value: String) -> Request<Body> {
        Request::builder()
            .header(header, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn should_prefer_the_bearer_header() {
        let req = request_with("authorization", "Bearer abc.def.ghi".into());
        assert_eq!(extract_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn should_fall_back_to_the_session_cookie() {
        let req = request_with("cookie", "theme=dark; session=abc.def.ghi".into());
        assert_eq!(extract_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn should_yield_nothing_without_credentials() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_token(&req).is_none());
    }
}
