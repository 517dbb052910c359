use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use anyhow::{bail, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vision_guard::auth::SESSION_COOKIE;
use vision_guard::config::Layout;
use vision_guard::detect::pipeline::MediaProcessor;
use vision_guard::detect::stats::ProcessStats;
use vision_guard::storage::{Database, InputType};
use vision_guard::web::flash::{self, Flash, FLASH_COOKIE};
use vision_guard::web::{configure, AppState, LiveSettings};
use vision_media::VideoSource;

/// Copies inputs to outputs so routes can be exercised without models or a camera.
#[derive(Default)]
struct CopyProcessor {
    camera_online: bool,
}

impl MediaProcessor for CopyProcessor {
    fn process_image(&self, input: &Path, output: &Path) -> Result<ProcessStats> {
        fs::copy(input, output)?;
        Ok(ProcessStats::single(25.0, 0.04))
    }

    fn process_video(&self, source: &VideoSource, output: &Path, _limit: Option<Duration>) -> Result<ProcessStats> {
        match source {
            VideoSource::File(path) => {
                fs::copy(path, output)?;
                Ok(ProcessStats {
                    frames: 3,
                    average_fps: 20.0,
                    average_inference: 0.05,
                    elapsed_time: Some(0.15),
                })
            }
            VideoSource::Camera(_) if self.camera_online => {
                fs::write(output, b"captured frames")?;
                Ok(ProcessStats {
                    frames: 20,
                    average_fps: 20.0,
                    average_inference: 0.045,
                    elapsed_time: Some(1.0),
                })
            }
            VideoSource::Camera(_) => bail!("Unable to open video source {source}"),
        }
    }

    fn stream_mjpeg(&self, _source: &VideoSource, sink: &mut dyn FnMut(Vec<u8>) -> bool) -> Result<()> {
        for index in 0..2u8 {
            if !sink(vec![0xFF, 0xD8, index, 0xFF, 0xD9]) {
                break;
            }
        }
        Ok(())
    }
}

fn state(dir: &TempDir) -> Result<web::Data<AppState>> {
    state_with(dir, CopyProcessor::default())
}

fn state_with(dir: &TempDir, processor: CopyProcessor) -> Result<web::Data<AppState>> {
    let layout = Layout::new(dir.path());
    layout.ensure()?;

    Ok(web::Data::new(AppState {
        db: Database::in_memory()?,
        processor: Arc::new(processor),
        layout,
        live: LiveSettings {
            camera: VideoSource::Camera(0),
            capture_seconds: 1,
        },
    }))
}

fn location<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn flashes<B>(resp: &ServiceResponse<B>) -> Vec<String> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == FLASH_COOKIE)
        .map(|cookie| flash::decode(cookie.value()))
        .unwrap_or_default()
        .into_iter()
        .map(|flash| flash.message)
        .collect()
}

fn session_of<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn register_request(username: &str, password: &str) -> TestRequest {
    let email = format!("{username}@example.com");
    TestRequest::post()
        .uri("/register")
        .set_form(vec![("username", username), ("email", email.as_str()), ("password", password)])
}

fn login_request(username: &str, password: &str) -> TestRequest {
    TestRequest::post()
        .uri("/login")
        .set_form(vec![("username", username), ("password", password)])
}

fn authed(request: TestRequest, session: &str) -> TestRequest {
    request.cookie(Cookie::new(SESSION_COOKIE, session.to_string()))
}

fn multipart_upload(uri: &str, field: &str, filename: &str, content: &[u8]) -> TestRequest {
    let boundary = "visionguard-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}")))
        .set_payload(body)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    names.sort();
    names
}

macro_rules! sign_in {
    ($app:expr, $username:expr) => {{
        let resp = test::call_service($app, register_request($username, "s3cret").to_request()).await;
        assert_eq!(location(&resp).as_deref(), Some("/login"));

        let resp = test::call_service($app, login_request($username, "s3cret").to_request()).await;
        assert_eq!(location(&resp).as_deref(), Some("/dashboard"));
        session_of(&resp).expect("login sets a session cookie")
    }};
}

#[actix_web::test]
async fn protected_pages_redirect_to_login() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = test::init_service(App::new().app_data(state(&dir)?).configure(configure)).await;

    for uri in ["/dashboard", "/results", "/live_camera", "/video_feed", "/logout"] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{uri}");
        assert_eq!(location(&resp).as_deref(), Some("/login"), "{uri}");
        assert_eq!(flashes(&resp), vec!["Please log in to access this page."]);
    }

    let resp = test::call_service(&app, authed(TestRequest::get().uri("/dashboard"), "forged").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/login"));

    let resp = test::call_service(&app, TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, TestRequest::get().uri("/static/style.css").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[actix_web::test]
async fn registration_and_login_messages() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = test::init_service(App::new().app_data(state(&dir)?).configure(configure)).await;

    let resp = test::call_service(&app, register_request("alice", "  ").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/register"));
    assert_eq!(flashes(&resp), vec!["All fields are required."]);

    let resp = test::call_service(&app, register_request("alice", "s3cret").to_request()).await;
    assert_eq!(flashes(&resp), vec!["Registration successful. You can now log in."]);

    let resp = test::call_service(&app, register_request("alice", "other").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/register"));
    assert_eq!(flashes(&resp), vec!["Username or email already registered."]);

    let resp = test::call_service(&app, login_request("alice", "wrong").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/login"));
    assert_eq!(flashes(&resp), vec!["Invalid username or password."]);
    assert!(session_of(&resp).is_none());

    let resp = test::call_service(&app, login_request("alice", " s3cret ").to_request()).await;
    assert_eq!(flashes(&resp), vec!["Login successful."]);
    let session = session_of(&resp).expect("session cookie");

    let resp = test::call_service(&app, authed(TestRequest::get().uri("/login"), &session).to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/dashboard"));

    let resp = test::call_service(&app, authed(TestRequest::get().uri("/logout"), &session).to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/"));
    assert_eq!(flashes(&resp), vec!["You have been logged out."]);

    let resp = test::call_service(&app, authed(TestRequest::get().uri("/dashboard"), &session).to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/login"));
    Ok(())
}

#[actix_web::test]
async fn upload_results_download_and_delete() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let state = state(&dir)?;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;
    let session = sign_in!(&app, "alice");

    let dashboard = test::call_and_read_body(&app, authed(TestRequest::get().uri("/dashboard"), &session).to_request()).await;
    assert!(String::from_utf8_lossy(&dashboard).contains("Allowed: bmp, jpeg, jpg, png"));

    let upload = multipart_upload("/upload_image", "image", "../My road.PNG", b"not really a png");
    let resp = test::call_service(&app, authed(upload, &session).to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/results"));
    assert_eq!(flashes(&resp), vec!["Image processed successfully."]);

    let uploads = files_in(&state.layout.uploads_dir);
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].ends_with("_My_road.PNG"));

    let user = state.db.find_user_by_username("alice")?.expect("alice exists");
    let records = state.db.list_detections(user.id)?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.input_type, InputType::Image);
    assert_eq!(record.input_filename.as_deref(), Some("My_road.PNG"));
    assert_eq!(record.average_fps, Some(25.0));
    assert_eq!(record.elapsed_time, None);

    let output = record.output_filename().to_string();
    assert!(output.ends_with("_processed.png"));
    assert_eq!(files_in(&state.layout.outputs_dir), vec![output.clone()]);

    let page = test::call_and_read_body(&app, authed(TestRequest::get().uri("/results"), &session).to_request()).await;
    assert!(String::from_utf8_lossy(&page).contains(&format!("/download/{output}")));

    let resp = test::call_service(
        &app,
        authed(TestRequest::get().uri(&format!("/download/{output}")), &session).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert_eq!(&test::read_body(resp).await[..], b"not really a png");

    let view = authed(TestRequest::get().uri(&format!("/static/outputs/{output}")), &session);
    let resp = test::call_service(&app, view.to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let delete = authed(TestRequest::post().uri(&format!("/delete_result/{}", record.id)), &session);
    let resp = test::call_service(&app, delete.to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/results"));
    assert_eq!(flashes(&resp), vec!["Result deleted."]);
    assert!(files_in(&state.layout.outputs_dir).is_empty());
    assert!(state.db.list_detections(user.id)?.is_empty());

    let delete = authed(TestRequest::post().uri(&format!("/delete_result/{}", record.id)), &session);
    let resp = test::call_service(&app, delete.to_request()).await;
    assert_eq!(flashes(&resp), vec!["Result not found."]);
    Ok(())
}

#[actix_web::test]
async fn users_only_reach_their_own_results() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let state = state(&dir)?;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let alice = sign_in!(&app, "alice");
    let upload = multipart_upload("/upload_video", "video", "clip.mp4", b"fake video bytes");
    let resp = test::call_service(&app, authed(upload, &alice).to_request()).await;
    assert_eq!(flashes(&resp), vec!["Video processed successfully."]);

    let alice_id = state.db.find_user_by_username("alice")?.expect("alice exists").id;
    let record = state.db.list_detections(alice_id)?.remove(0);
    assert_eq!(record.input_type, InputType::Video);
    assert_eq!(record.elapsed_time, Some(0.15));
    let output = record.output_filename().to_string();
    assert!(output.ends_with("_processed.mp4"));

    let bob = sign_in!(&app, "bob");
    let page = test::call_and_read_body(&app, authed(TestRequest::get().uri("/results"), &bob).to_request()).await;
    let page = String::from_utf8_lossy(&page);
    assert!(page.contains("No results yet"));
    assert!(!page.contains(&output));

    for uri in [format!("/download/{output}"), format!("/static/outputs/{output}")] {
        let resp = test::call_service(&app, authed(TestRequest::get().uri(&uri), &bob).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let delete = authed(TestRequest::post().uri(&format!("/delete_result/{}", record.id)), &bob);
    let resp = test::call_service(&app, delete.to_request()).await;
    assert_eq!(flashes(&resp), vec!["Result not found."]);
    assert_eq!(files_in(&state.layout.outputs_dir), vec![output]);
    assert_eq!(state.db.list_detections(alice_id)?.len(), 1);
    Ok(())
}

#[actix_web::test]
async fn invalid_uploads_are_flashed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let state = state(&dir)?;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;
    let session = sign_in!(&app, "alice");

    let cases = [
        (multipart_upload("/upload_image", "image", "", b""), "Please select an image file."),
        (multipart_upload("/upload_image", "other", "road.png", b"x"), "Please select an image file."),
        (multipart_upload("/upload_image", "image", "notes.txt", b"x"), "Unsupported image format."),
        (multipart_upload("/upload_video", "video", "", b""), "Please select a video file."),
        (multipart_upload("/upload_video", "video", "still.png", b"x"), "Unsupported video format."),
    ];
    for (request, message) in cases {
        let resp = test::call_service(&app, authed(request, &session).to_request()).await;
        assert_eq!(location(&resp).as_deref(), Some("/dashboard"));
        assert_eq!(flashes(&resp), vec![message]);
    }

    assert!(files_in(&state.layout.uploads_dir).is_empty());
    assert!(files_in(&state.layout.outputs_dir).is_empty());
    Ok(())
}

#[actix_web::test]
async fn live_capture_and_feed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let state = state(&dir)?;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;
    let session = sign_in!(&app, "alice");

    let resp = test::call_service(
        &app,
        authed(TestRequest::post().uri("/start_live_capture"), &session).to_request(),
    )
    .await;
    assert_eq!(location(&resp).as_deref(), Some("/live_camera"));
    assert_eq!(flashes(&resp), vec!["Live capture failed: Unable to open video source camera #0"]);

    let resp = test::call_service(&app, authed(TestRequest::get().uri("/video_feed"), &session).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
        Some("multipart/x-mixed-replace; boundary=frame")
    );

    let body = test::read_body(resp).await;
    let parts = body
        .windows(b"--frame\r\n".len())
        .filter(|window| *window == b"--frame\r\n")
        .count();
    assert_eq!(parts, 2);
    Ok(())
}

#[actix_web::test]
async fn live_capture_is_saved_as_a_result() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let state = state_with(&dir, CopyProcessor { camera_online: true })?;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;
    let session = sign_in!(&app, "alice");

    let resp = test::call_service(
        &app,
        authed(TestRequest::post().uri("/start_live_capture"), &session).to_request(),
    )
    .await;
    assert_eq!(location(&resp).as_deref(), Some("/results"));
    assert_eq!(flashes(&resp), vec!["Live capture completed and saved."]);

    let user = state.db.find_user_by_username("alice")?.expect("alice exists");
    let records = state.db.list_detections(user.id)?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.input_type, InputType::Live);
    assert_eq!(record.input_filename.as_deref(), Some("webcam"));
    assert_eq!(record.elapsed_time, Some(1.0));
    assert_eq!(record.average_inference, Some(0.045));

    let output = record.output_filename().to_string();
    assert!(output.ends_with("_live.mp4"));
    assert_eq!(files_in(&state.layout.outputs_dir), vec![output.clone()]);

    let resp = test::call_service(
        &app,
        authed(TestRequest::get().uri(&format!("/download/{output}")), &session).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&test::read_body(resp).await[..], b"captured frames");
    Ok(())
}

#[actix_web::test]
async fn unread_messages_carry_over_redirects() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = test::init_service(App::new().app_data(state(&dir)?).configure(configure)).await;

    let pending = Cookie::new(FLASH_COOKIE, flash::encode(&[Flash::info("You have been logged out.")]));
    let request = register_request("alice", "").cookie(pending.clone());
    let resp = test::call_service(&app, request.to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/register"));
    assert_eq!(flashes(&resp), vec!["You have been logged out.", "All fields are required."]);

    let request = TestRequest::get().uri("/dashboard").cookie(pending.clone());
    let resp = test::call_service(&app, request.to_request()).await;
    assert_eq!(flashes(&resp), vec!["You have been logged out.", "Please log in to access this page."]);

    let request = TestRequest::get().uri("/login").cookie(pending);
    let resp = test::call_service(&app, request.to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8_lossy(&test::read_body(resp).await).into_owned();
    assert!(page.contains("You have been logged out."));
    Ok(())
}
