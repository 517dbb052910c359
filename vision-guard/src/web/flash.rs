//! One-shot messages carried across a redirect in a cookie.

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{HttpRequest, HttpResponse};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "visionguard_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Danger,
    Warning,
    Info,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Danger => "danger",
            Category::Warning => "warning",
            Category::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: Category,
    pub message: String,
}

impl Flash {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Category::Success, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Category::Danger, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Category::Info, message)
    }
}

pub fn encode(flashes: &[Flash]) -> String {
    let json = serde_json::to_vec(flashes).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Tampered or stale cookies decode to nothing.
pub fn decode(raw: &str) -> Vec<Flash> {
    URL_SAFE_NO_PAD
        .decode(raw)
        .ok()
        .and_then(|json| serde_json::from_slice(&json).ok())
        .unwrap_or_default()
}

pub fn take(req: &HttpRequest) -> Vec<Flash> {
    req.cookie(FLASH_COOKIE)
        .map(|cookie| decode(cookie.value()))
        .unwrap_or_default()
}

fn flash_cookie(flashes: &[Flash]) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, encode(flashes))
        .path("/")
        .http_only(true)
        .finish()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

pub fn redirect(location: &str, flash: Option<Flash>) -> HttpResponse {
    redirect_with_cookies(location, flash, Vec::new())
}

/// 302 to `location`, queueing `flash` for the next page.
pub fn redirect_with_cookies(location: &str, flash: Option<Flash>, cookies: Vec<Cookie<'static>>) -> HttpResponse {
    let mut response = HttpResponse::Found();
    response.insert_header((header::LOCATION, location));

    if let Some(flash) = flash {
        debug!("Flash [{}] {}", flash.category.as_str(), flash.message);
        response.cookie(flash_cookie(&[flash]));
    }
    for cookie in cookies {
        response.cookie(cookie);
    }

    response.finish()
}

/// Middleware keeping messages that were queued but not yet shown.
///
/// A redirect answering a request that still carries pending messages queues
/// them ahead of its own, so chained redirects lose nothing.
pub async fn carry_pending(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let pending = req
        .cookie(FLASH_COOKIE)
        .map(|cookie| decode(cookie.value()))
        .unwrap_or_default();
    let mut res = next.call(req).await?;
    if pending.is_empty() {
        return Ok(res);
    }

    let queued = res
        .response()
        .cookies()
        .find(|cookie| cookie.name() == FLASH_COOKIE && !cookie.value().is_empty())
        .map(|cookie| decode(cookie.value()));
    if let Some(queued) = queued {
        let merged = pending.into_iter().chain(queued).collect::<Vec<_>>();
        debug!("Carrying {} pending flash messages", merged.len());

        let response = res.response_mut();
        response.del_cookie(FLASH_COOKIE);
        response.add_cookie(&flash_cookie(&merged))?;
    }

    Ok(res)
}

/// Render an HTML page with any pending messages, consuming them.
pub fn page(req: &HttpRequest, render: impl FnOnce(&[Flash]) -> String) -> HttpResponse {
    let flashes = take(req);
    let body = render(&flashes);

    let mut response = HttpResponse::Ok();
    response.content_type(crate::web::html::CONTENT_TYPE);
    if req.cookie(FLASH_COOKIE).is_some() {
        response.cookie(removal_cookie());
    }

    response.body(body)
}
