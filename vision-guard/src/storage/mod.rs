//! SQLite store for accounts, login sessions and processing history.
//!
//! Timestamps are unix milliseconds. Every detection query is scoped to the
//! owning user.

pub mod models;

pub use models::{DetectionRecord, InputType, NewDetection, User};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("username or email already registered")]
pub struct UserTaken;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS detection_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    input_type TEXT NOT NULL,
    input_filename TEXT,
    output_path TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    average_fps REAL,
    average_inference REAL,
    elapsed_time REAL
);

CREATE INDEX IF NOT EXISTS idx_results_user ON detection_results(user_id, created_at);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL
);
"#;

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";
const DETECTION_COLUMNS: &str = "id, user_id, input_type, input_filename, output_path, created_at, \
                                 average_fps, average_inference, elapsed_time";

/// How long a login stays valid.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: timestamp(row.get(4)?),
    })
}

fn detection_from_row(row: &Row<'_>) -> rusqlite::Result<DetectionRecord> {
    Ok(DetectionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        input_type: row.get(2)?,
        input_filename: row.get(3)?,
        output_path: row.get(4)?,
        created_at: timestamp(row.get(5)?),
        average_fps: row.get(6)?,
        average_inference: row.get(7)?,
        elapsed_time: row.get(8)?,
    })
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Database ready at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // Users

    /// Fails with [`UserTaken`] when the username or email is already registered.
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let created_at = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, email, password_hash, created_at],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                debug!("Rejected duplicate account {username} <{email}>");
                return Err(UserTaken.into());
            }
            Err(err) => return Err(err.into()),
        }
        let id = conn.last_insert_rowid();
        debug!("Created user {username} with id {id}");

        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: timestamp(created_at),
        })
    }

    /// True when either the username or the email is taken.
    pub fn user_exists(&self, username: &str, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 OR email = ?2)",
            params![username, email],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // Detection results

    pub fn insert_detection(&self, new: &NewDetection) -> Result<DetectionRecord> {
        let created_at = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO detection_results
                (user_id, input_type, input_filename, output_path, created_at,
                 average_fps, average_inference, elapsed_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.user_id,
                new.input_type,
                new.input_filename,
                new.output_path,
                created_at,
                new.average_fps,
                new.average_inference,
                new.elapsed_time,
            ],
        )?;

        Ok(DetectionRecord {
            id: conn.last_insert_rowid(),
            user_id: new.user_id,
            input_type: new.input_type,
            input_filename: new.input_filename.clone(),
            output_path: new.output_path.clone(),
            created_at: timestamp(created_at),
            average_fps: new.average_fps,
            average_inference: new.average_inference,
            elapsed_time: new.elapsed_time,
        })
    }

    /// Newest first.
    pub fn list_detections(&self, user_id: i64) -> Result<Vec<DetectionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DETECTION_COLUMNS} FROM detection_results
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;

        let records = stmt
            .query_map(params![user_id], detection_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn find_detection(&self, id: i64, user_id: i64) -> Result<Option<DetectionRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {DETECTION_COLUMNS} FROM detection_results WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                detection_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn delete_detection(&self, id: i64, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM detection_results WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn owns_output(&self, user_id: i64, output_path: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let owned = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM detection_results WHERE user_id = ?1 AND output_path = ?2)",
            params![user_id, output_path],
            |row| row.get(0),
        )?;
        Ok(owned)
    }

    // Sessions

    /// Start a login session, returning the cookie token. Only its hash is stored.
    pub fn create_session(&self, user_id: i64) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![hash_token(&token), user_id, Utc::now().timestamp_millis()],
        )?;
        Ok(token)
    }

    /// The user behind a live session. Expired sessions are removed on lookup.
    pub fn resolve_session(&self, token: &str) -> Result<Option<User>> {
        let cutoff = (Utc::now() - Duration::days(SESSION_TTL_DAYS)).timestamp_millis();
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE created_at < ?1", params![cutoff])?;

        let user = conn
            .query_row(
                "SELECT u.id, u.username, u.email, u.password_hash, u.created_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1",
                params![hash_token(token)],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![hash_token(token)])?;
        Ok(())
    }
}
