pub mod accounts;
pub mod detections;
pub mod error;
pub mod flash;
pub mod html;
pub mod mjpeg;
pub mod upload;

use crate::config::Layout;
use crate::detect::pipeline::MediaProcessor;
use crate::storage::Database;
use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use log::info;
use std::sync::Arc;
use vision_media::VideoSource;

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub camera: VideoSource,
    pub capture_seconds: u64,
}

pub struct AppState {
    pub db: Database,
    pub processor: Arc<dyn MediaProcessor>,
    pub layout: Layout,
    pub live: LiveSettings,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .wrap(from_fn(flash::carry_pending))
            .route("/", web::get().to(accounts::home))
            .service(
                web::resource("/register")
                    .route(web::get().to(accounts::register_form))
                    .route(web::post().to(accounts::register)),
            )
            .service(
                web::resource("/login")
                    .route(web::get().to(accounts::login_form))
                    .route(web::post().to(accounts::login)),
            )
            .route("/logout", web::get().to(accounts::logout))
            .route("/dashboard", web::get().to(detections::dashboard))
            .route("/upload_image", web::post().to(detections::upload_image))
            .route("/upload_video", web::post().to(detections::upload_video))
            .route("/start_live_capture", web::post().to(detections::start_live_capture))
            .route("/live_camera", web::get().to(detections::live_camera))
            .route("/video_feed", web::get().to(detections::video_feed))
            .route("/results", web::get().to(detections::results))
            .route("/delete_result/{id}", web::post().to(detections::delete_result))
            .route("/download/{filename}", web::get().to(detections::download))
            .route("/static/style.css", web::get().to(detections::style))
            .route("/static/outputs/{filename}", web::get().to(detections::view_output)),
    );
}

pub async fn serve(state: AppState, host: String, port: u16) -> Result<()> {
    let state = web::Data::new(state);

    info!("VisionGuard listening on http://{host}:{port}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
