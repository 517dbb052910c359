use crate::storage::{User, SESSION_TTL_DAYS};
use crate::web::error::AppError;
use crate::web::AppState;
use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

pub const SESSION_COOKIE: &str = "visionguard_session";

/// The logged-in user. Extraction fails with a redirect to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    user: User,
    token: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

fn resolve(req: &HttpRequest) -> Result<CurrentUser, AppError> {
    let cookie = req.cookie(SESSION_COOKIE).ok_or(AppError::LoginRequired)?;
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Application state is not configured")))?;

    let token = cookie.value().to_string();
    match state.db.resolve_session(&token)? {
        Some(user) => Ok(CurrentUser { user, token }),
        None => Err(AppError::LoginRequired),
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve(req))
    }
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(SESSION_TTL_DAYS))
        .finish()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}
