use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::auth::{hash_password, verify_password, CurrentUser};
use crate::storage::models::{EMAIL_MAX_LEN, USERNAME_MAX_LEN};
use crate::storage::UserTaken;
use crate::web::error::AppError;
use crate::web::flash::{self, Flash};
use crate::web::{html, AppState};
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub async fn home(req: HttpRequest, user: Option<CurrentUser>) -> HttpResponse {
    flash::page(&req, |flashes| html::home_page(user.as_ref().map(CurrentUser::user), flashes))
}

pub async fn register_form(req: HttpRequest, user: Option<CurrentUser>) -> HttpResponse {
    if user.is_some() {
        return flash::redirect("/dashboard", None);
    }
    flash::page(&req, html::register_page)
}

pub async fn register(
    state: web::Data<AppState>,
    user: Option<CurrentUser>,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    if user.is_some() {
        return Ok(flash::redirect("/dashboard", None));
    }

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let password = form.password.trim().to_string();

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Ok(flash::redirect("/register", Some(Flash::danger("All fields are required."))));
    }
    if username.chars().count() > USERNAME_MAX_LEN || email.chars().count() > EMAIL_MAX_LEN {
        return Ok(flash::redirect("/register", Some(Flash::danger("Username or email is too long."))));
    }
    let taken = flash::redirect("/register", Some(Flash::danger("Username or email already registered.")));
    if state.db.user_exists(&username, &email)? {
        return Ok(taken);
    }

    let password_hash = web::block(move || hash_password(&password)).await?;
    let user = match state.db.create_user(&username, &email, &password_hash) {
        Ok(user) => user,
        // Lost a race with a concurrent registration.
        Err(err) if err.is::<UserTaken>() => return Ok(taken),
        Err(err) => return Err(err.into()),
    };
    info!("Registered user {} ({})", user.username, user.id);

    Ok(flash::redirect(
        "/login",
        Some(Flash::success("Registration successful. You can now log in.")),
    ))
}

pub async fn login_form(req: HttpRequest, user: Option<CurrentUser>) -> HttpResponse {
    if user.is_some() {
        return flash::redirect("/dashboard", None);
    }
    flash::page(&req, html::login_page)
}

pub async fn login(
    state: web::Data<AppState>,
    user: Option<CurrentUser>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    if user.is_some() {
        return Ok(flash::redirect("/dashboard", None));
    }

    let username = form.username.trim();
    let password = form.password.trim().to_string();

    let verified = match state.db.find_user_by_username(username)? {
        Some(user) => {
            let stored = user.password_hash.clone();
            web::block(move || verify_password(&stored, &password))
                .await?
                .then_some(user)
        }
        None => None,
    };

    let Some(user) = verified else {
        info!("Failed login for {username:?}");
        return Ok(flash::redirect("/login", Some(Flash::danger("Invalid username or password."))));
    };

    let token = state.db.create_session(user.id)?;
    info!("User {} logged in", user.username);
    Ok(flash::redirect_with_cookies(
        "/dashboard",
        Some(Flash::success("Login successful.")),
        vec![session_cookie(token)],
    ))
}

pub async fn logout(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse, AppError> {
    state.db.delete_session(user.token())?;
    info!("User {} logged out", user.user().username);

    Ok(flash::redirect_with_cookies(
        "/",
        Some(Flash::info("You have been logged out.")),
        vec![clear_session_cookie()],
    ))
}
