use crate::auth::CurrentUser;
use crate::storage::{InputType, NewDetection};
use crate::web::error::AppError;
use crate::web::flash::{self, Category, Flash};
use crate::web::upload::{
    content_type_for, save_upload, Upload, ALLOWED_IMAGE_EXTENSIONS, ALLOWED_VIDEO_EXTENSIONS,
};
use crate::web::{html, mjpeg, AppState};
use actix_multipart::Multipart;
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;
use vision_media::VideoSource;

/// Per-kind wording and naming for the two upload forms.
struct UploadKind {
    field: &'static str,
    allowed: &'static [&'static str],
    input_type: InputType,
    output_suffix: &'static str,
    missing: &'static str,
    unsupported: &'static str,
    processed: &'static str,
}

const IMAGE_UPLOAD: UploadKind = UploadKind {
    field: "image",
    allowed: ALLOWED_IMAGE_EXTENSIONS,
    input_type: InputType::Image,
    output_suffix: "processed.png",
    missing: "Please select an image file.",
    unsupported: "Unsupported image format.",
    processed: "Image processed successfully.",
};

const VIDEO_UPLOAD: UploadKind = UploadKind {
    field: "video",
    allowed: ALLOWED_VIDEO_EXTENSIONS,
    input_type: InputType::Video,
    output_suffix: "processed.mp4",
    missing: "Please select a video file.",
    unsupported: "Unsupported video format.",
    processed: "Video processed successfully.",
};

fn output_name(suffix: &str) -> String {
    format!("{}_{suffix}", Uuid::new_v4().simple())
}

pub async fn dashboard(req: HttpRequest, user: CurrentUser) -> HttpResponse {
    flash::page(&req, |flashes| {
        html::dashboard_page(user.user(), flashes, ALLOWED_IMAGE_EXTENSIONS, ALLOWED_VIDEO_EXTENSIONS)
    })
}

async fn process_upload(
    state: web::Data<AppState>,
    user: CurrentUser,
    payload: Multipart,
    kind: &UploadKind,
) -> Result<HttpResponse, AppError> {
    let (input, filename) = match save_upload(payload, kind.field, kind.allowed, &state.layout.uploads_dir).await? {
        Upload::Missing => return Ok(flash::redirect("/dashboard", Some(Flash::danger(kind.missing)))),
        Upload::Unsupported => return Ok(flash::redirect("/dashboard", Some(Flash::danger(kind.unsupported)))),
        Upload::Saved { path, filename } => (path, filename),
    };

    let output_filename = output_name(kind.output_suffix);
    let output = state.layout.outputs_dir.join(&output_filename);
    let processor = state.processor.clone();
    let input_type = kind.input_type;

    let processed = web::block(move || match input_type {
        InputType::Image => processor.process_image(&input, &output),
        _ => processor.process_video(&VideoSource::File(input), &output, None),
    })
    .await?;

    let stats = match processed {
        Ok(stats) => stats,
        Err(err) => {
            warn!("Processing {filename} for user {} failed: {err:#}", user.id());
            return Ok(flash::redirect(
                "/dashboard",
                Some(Flash::danger(format!("Processing failed: {err}"))),
            ));
        }
    };

    let record = state.db.insert_detection(&NewDetection::from_stats(
        user.id(),
        kind.input_type,
        Some(filename),
        &output_filename,
        &stats,
    ))?;
    info!("Stored {} result {} for user {}", record.input_type, record.id, user.id());

    Ok(flash::redirect("/results", Some(Flash::success(kind.processed))))
}

pub async fn upload_image(
    state: web::Data<AppState>,
    user: CurrentUser,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    process_upload(state, user, payload, &IMAGE_UPLOAD).await
}

pub async fn upload_video(
    state: web::Data<AppState>,
    user: CurrentUser,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    process_upload(state, user, payload, &VIDEO_UPLOAD).await
}

pub async fn start_live_capture(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse, AppError> {
    let output_filename = output_name("live.mp4");
    let output = state.layout.outputs_dir.join(&output_filename);
    let source = state.live.camera.clone();
    let limit = Duration::from_secs(state.live.capture_seconds);
    let processor = state.processor.clone();

    info!("User {} started a {}s live capture", user.id(), limit.as_secs());
    let captured = web::block(move || processor.process_video(&source, &output, Some(limit))).await?;

    let stats = match captured {
        Ok(stats) => stats,
        Err(err) => {
            warn!("Live capture for user {} failed: {err:#}", user.id());
            return Ok(flash::redirect(
                "/live_camera",
                Some(Flash::danger(format!("Live capture failed: {err}"))),
            ));
        }
    };

    state.db.insert_detection(&NewDetection::from_stats(
        user.id(),
        InputType::Live,
        Some("webcam".to_string()),
        &output_filename,
        &stats,
    ))?;

    Ok(flash::redirect("/results", Some(Flash::success("Live capture completed and saved."))))
}

pub async fn live_camera(req: HttpRequest, state: web::Data<AppState>, user: CurrentUser) -> HttpResponse {
    flash::page(&req, |flashes| html::live_page(user.user(), flashes, state.live.capture_seconds))
}

pub async fn video_feed(state: web::Data<AppState>, user: CurrentUser) -> HttpResponse {
    debug!("Live feed requested by user {}", user.id());
    HttpResponse::Ok()
        .content_type(mjpeg::CONTENT_TYPE)
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(mjpeg::live_stream(state.processor.clone(), state.live.camera.clone()))
}

pub async fn results(req: HttpRequest, state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse, AppError> {
    let records = state.db.list_detections(user.id())?;
    Ok(flash::page(&req, |flashes| html::results_page(user.user(), flashes, &records)))
}

pub async fn delete_result(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let Some(record) = state.db.find_detection(id, user.id())? else {
        return Ok(flash::redirect(
            "/results",
            Some(Flash::new(Category::Warning, "Result not found.")),
        ));
    };

    let file = state.layout.static_dir.join(&record.output_path);
    match tokio::fs::remove_file(&file).await {
        Ok(()) => debug!("Removed {}", file.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("Unable to remove {}: {err}", file.display()),
    }

    state.db.delete_detection(record.id, user.id())?;
    info!("User {} deleted result {}", user.id(), record.id);

    Ok(flash::redirect("/results", Some(Flash::info("Result deleted."))))
}

/// Resolve an output file the user owns. Anything else is a 404.
fn owned_output(state: &AppState, user: &CurrentUser, filename: &str) -> Result<PathBuf, AppError> {
    if filename.is_empty() || filename.starts_with('.') || filename.contains(['/', '\\']) {
        return Err(AppError::NotFound);
    }
    if !state.db.owns_output(user.id(), &format!("outputs/{filename}"))? {
        return Err(AppError::NotFound);
    }

    let path = state.layout.outputs_dir.join(filename);
    if !path.is_file() {
        return Err(AppError::NotFound);
    }
    Ok(path)
}

async fn serve_output(
    state: &AppState,
    user: &CurrentUser,
    filename: &str,
    disposition: DispositionType,
) -> Result<HttpResponse, AppError> {
    let path = owned_output(state, user, filename)?;
    let body = tokio::fs::read(&path).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(filename))
        .insert_header(ContentDisposition {
            disposition,
            parameters: vec![DispositionParam::Filename(filename.to_string())],
        })
        .body(body))
}

pub async fn download(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    serve_output(&state, &user, &path, DispositionType::Attachment).await
}

pub async fn view_output(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    serve_output(&state, &user, &path, DispositionType::Inline).await
}

pub async fn style() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/css; charset=utf-8")
        .body(html::STYLE_CSS)
}
