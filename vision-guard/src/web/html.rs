//! Server-rendered pages. Markup is embedded in the binary.

use crate::storage::{DetectionRecord, InputType, User};
use crate::web::flash::Flash;
use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";

pub const STYLE_CSS: &str = r#":root {
  --bg: #0f1117;
  --panel: #181b24;
  --border: #2a2f3d;
  --text: #e4e6eb;
  --muted: #9aa0ad;
  --accent: #00bfff;
  --success: #2ecc71;
  --danger: #e74c3c;
  --warning: #f1c40f;
  --info: #3498db;
}
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, sans-serif; background: var(--bg); color: var(--text); }
a { color: var(--accent); text-decoration: none; }
nav { display: flex; gap: 1rem; align-items: center; padding: 0.8rem 1.5rem; background: var(--panel); border-bottom: 1px solid var(--border); }
nav .brand { font-weight: 700; margin-right: auto; }
main { max-width: 1100px; margin: 2rem auto; padding: 0 1.5rem; }
.card { background: var(--panel); border: 1px solid var(--border); border-radius: 8px; padding: 1.2rem; margin-bottom: 1.2rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(320px, 1fr)); gap: 1.2rem; }
form.stack { display: flex; flex-direction: column; gap: 0.7rem; max-width: 420px; }
input, button { font: inherit; padding: 0.55rem 0.7rem; border-radius: 6px; border: 1px solid var(--border); background: #11141b; color: var(--text); }
button { background: var(--accent); color: #00131a; border: none; cursor: pointer; font-weight: 600; }
button.danger { background: var(--danger); color: #fff; }
.flash { padding: 0.7rem 1rem; border-radius: 6px; margin-bottom: 0.8rem; border-left: 4px solid; background: var(--panel); }
.flash.success { border-color: var(--success); }
.flash.danger { border-color: var(--danger); }
.flash.warning { border-color: var(--warning); }
.flash.info { border-color: var(--info); }
.muted { color: var(--muted); }
.result img, .result video, .live img { width: 100%; border-radius: 6px; background: #000; }
.result dl { display: grid; grid-template-columns: auto 1fr; gap: 0.2rem 0.8rem; margin: 0.8rem 0; }
.result dt { color: var(--muted); }
.actions { display: flex; gap: 0.6rem; align-items: center; }
"#;

pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn nav(user: Option<&User>) -> String {
    match user {
        Some(user) => format!(
            r#"<nav><a class="brand" href="/">VisionGuard</a>
<a href="/dashboard">Dashboard</a><a href="/live_camera">Live camera</a><a href="/results">Results</a>
<span class="muted">{}</span><a href="/logout">Log out</a></nav>"#,
            escape(&user.username)
        ),
        None => r#"<nav><a class="brand" href="/">VisionGuard</a>
<a href="/login">Log in</a><a href="/register">Register</a></nav>"#
            .to_string(),
    }
}

fn flashes_html(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|flash| {
            format!(
                r#"<div class="flash {}">{}</div>"#,
                flash.category.as_str(),
                escape(&flash.message)
            )
        })
        .collect()
}

pub fn layout(title: &str, user: Option<&User>, flashes: &[Flash], content: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · VisionGuard</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
{nav}
<main>
{flashes}
{content}
</main>
</body>
</html>
"#,
        title = escape(title),
        nav = nav(user),
        flashes = flashes_html(flashes),
    )
}

pub fn home_page(user: Option<&User>, flashes: &[Flash]) -> String {
    let call_to_action = match user {
        Some(_) => r#"<a href="/dashboard"><button>Open dashboard</button></a>"#,
        None => r#"<div class="actions"><a href="/register"><button>Create an account</button></a><a href="/login">Log in</a></div>"#,
    };

    let content = format!(
        r#"<section class="card">
<h1>VisionGuard</h1>
<p>Vehicle and traffic sign detection with lane overlays for images, videos and a live camera.</p>
{call_to_action}
</section>"#
    );
    layout("Home", user, flashes, &content)
}

pub fn register_page(flashes: &[Flash]) -> String {
    let content = r#"<section class="card">
<h1>Register</h1>
<form class="stack" method="post" action="/register">
<input name="username" placeholder="Username" maxlength="80" required>
<input name="email" type="email" placeholder="Email" maxlength="120" required>
<input name="password" type="password" placeholder="Password" required>
<button type="submit">Create account</button>
</form>
<p class="muted">Already registered? <a href="/login">Log in</a></p>
</section>"#;
    layout("Register", None, flashes, content)
}

pub fn login_page(flashes: &[Flash]) -> String {
    let content = r#"<section class="card">
<h1>Log in</h1>
<form class="stack" method="post" action="/login">
<input name="username" placeholder="Username" required>
<input name="password" type="password" placeholder="Password" required>
<button type="submit">Log in</button>
</form>
<p class="muted">No account yet? <a href="/register">Register</a></p>
</section>"#;
    layout("Log in", None, flashes, content)
}

fn accept_list(extensions: &[&str]) -> String {
    extensions.iter().map(|ext| format!(".{ext}")).collect::<Vec<_>>().join(",")
}

pub fn dashboard_page(user: &User, flashes: &[Flash], image_exts: &[&str], video_exts: &[&str]) -> String {
    let content = format!(
        r#"<h1>Dashboard</h1>
<div class="grid">
<section class="card">
<h2>Image</h2>
<form class="stack" method="post" action="/upload_image" enctype="multipart/form-data">
<input type="file" name="image" accept="{image_accept}">
<p class="muted">Allowed: {image_list}</p>
<button type="submit">Process image</button>
</form>
</section>
<section class="card">
<h2>Video</h2>
<form class="stack" method="post" action="/upload_video" enctype="multipart/form-data">
<input type="file" name="video" accept="{video_accept}">
<p class="muted">Allowed: {video_list}</p>
<button type="submit">Process video</button>
</form>
</section>
<section class="card">
<h2>Live camera</h2>
<p>Watch the annotated camera feed or record a short clip to your results.</p>
<a href="/live_camera"><button>Open live camera</button></a>
</section>
</div>"#,
        image_accept = accept_list(image_exts),
        image_list = image_exts.join(", "),
        video_accept = accept_list(video_exts),
        video_list = video_exts.join(", "),
    );
    layout("Dashboard", Some(user), flashes, &content)
}

pub fn live_page(user: &User, flashes: &[Flash], capture_seconds: u64) -> String {
    let content = format!(
        r#"<h1>Live camera</h1>
<section class="card live">
<img src="/video_feed" alt="Live detection feed">
</section>
<section class="card">
<form method="post" action="/start_live_capture">
<button type="submit">Record {capture_seconds} s and save</button>
</form>
<p class="muted">Recording uses the camera too, close the live view first if your camera allows a single reader.</p>
</section>"#
    );
    layout("Live camera", Some(user), flashes, &content)
}

fn result_card(record: &DetectionRecord) -> String {
    let file = escape(record.output_filename());
    let preview = match record.input_type {
        InputType::Image => format!(r#"<img src="/static/outputs/{file}" alt="Processed image">"#),
        InputType::Video | InputType::Live => {
            format!(r#"<video src="/static/outputs/{file}" controls preload="metadata"></video>"#)
        }
    };

    let mut details = String::new();
    let _ = write!(details, "<dt>Type</dt><dd>{}</dd>", record.input_type);
    if let Some(input) = &record.input_filename {
        let _ = write!(details, "<dt>Input</dt><dd>{}</dd>", escape(input));
    }
    let _ = write!(
        details,
        "<dt>Created</dt><dd>{}</dd>",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(fps) = record.average_fps {
        let _ = write!(details, "<dt>Average FPS</dt><dd>{fps:.2}</dd>");
    }
    if let Some(inference) = record.average_inference {
        let _ = write!(details, "<dt>Inference</dt><dd>{:.1} ms</dd>", inference * 1000.0);
    }
    if let Some(elapsed) = record.elapsed_time {
        let _ = write!(details, "<dt>Elapsed</dt><dd>{elapsed:.1} s</dd>");
    }

    format!(
        r#"<article class="card result">
{preview}
<dl>{details}</dl>
<div class="actions">
<a href="/download/{file}">Download</a>
<form method="post" action="/delete_result/{id}"><button class="danger" type="submit">Delete</button></form>
</div>
</article>"#,
        id = record.id,
    )
}

pub fn results_page(user: &User, flashes: &[Flash], records: &[DetectionRecord]) -> String {
    let body = if records.is_empty() {
        r#"<p class="muted">No results yet. Upload something from the <a href="/dashboard">dashboard</a>.</p>"#.to_string()
    } else {
        format!(
            r#"<div class="grid">{}</div>"#,
            records.iter().map(result_card).collect::<String>()
        )
    };

    layout("Results", Some(user), flashes, &format!("<h1>Your results</h1>\n{body}"))
}

pub fn not_found_page() -> String {
    layout(
        "Not found",
        None,
        &[],
        r#"<section class="card"><h1>Not found</h1><p><a href="/">Back home</a></p></section>"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::flash::Category;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: 1,
            username: "<alice>".into(),
            email: "alice@example.com".into(),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn escape_covers_markup() {
        assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn layout_escapes_user_content() {
        let page = home_page(Some(&user()), &[Flash::new(Category::Danger, "<script>")]);
        assert!(page.contains("&lt;alice&gt;"));
        assert!(page.contains(r#"<div class="flash danger">&lt;script&gt;</div>"#));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn dashboard_lists_extensions() {
        let page = dashboard_page(&user(), &[], &["bmp", "jpeg"], &["avi", "mp4"]);
        assert!(page.contains("Allowed: bmp, jpeg"));
        assert!(page.contains(r#"accept=".avi,.mp4""#));
    }

    #[test]
    fn results_render_by_input_type() {
        let record = DetectionRecord {
            id: 9,
            user_id: 1,
            input_type: InputType::Live,
            input_filename: Some("webcam".into()),
            output_path: "outputs/abc_live.mp4".into(),
            created_at: Utc::now(),
            average_fps: Some(11.0),
            average_inference: Some(0.125),
            elapsed_time: Some(15.02),
        };

        let page = results_page(&user(), &[], &[record]);
        assert!(page.contains(r#"<video src="/static/outputs/abc_live.mp4""#));
        assert!(page.contains(r#"href="/download/abc_live.mp4""#));
        assert!(page.contains(r#"action="/delete_result/9""#));
        assert!(page.contains("125.0 ms"));
        assert!(results_page(&user(), &[], &[]).contains("No results yet"));
    }
}
