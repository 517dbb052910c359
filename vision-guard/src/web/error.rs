use crate::web::flash::{self, Category, Flash};
use crate::web::html;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("login required")]
    LoginRequired,
    #[error("not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("worker pool error: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::LoginRequired => StatusCode::FOUND,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::LoginRequired => flash::redirect(
                "/login",
                Some(Flash::new(Category::Warning, "Please log in to access this page.")),
            ),
            AppError::NotFound => HttpResponse::NotFound()
                .content_type(html::CONTENT_TYPE)
                .body(html::not_found_page()),
            AppError::Multipart(err) => HttpResponse::BadRequest().body(format!("Malformed upload: {err}")),
            other => {
                error!("Request failed: {other:#}");
                HttpResponse::InternalServerError().body("Internal server error")
            }
        }
    }
}
