//! User persistence using SQLite.
//!
//! Only credential hashes are stored; raw access tokens and API keys never
//! reach this table.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Mutex;

use super::{NewUser, Provider, User, UserFilter, UserRepository};

const USER_COLUMNS: &str = "id, login, provider, name, access_token, apikey, created_at";

/// User table backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE users (
///     id           INTEGER PRIMARY KEY AUTOINCREMENT,
///     login        TEXT NOT NULL,
///     provider     TEXT NOT NULL,
///     name         TEXT NOT NULL,
///     access_token TEXT NOT NULL,   -- hash of the session token
///     apikey       TEXT,            -- hash of the API key (optional)
///     created_at   TEXT NOT NULL,
///     UNIQUE(provider, login)
/// );
/// ```
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    /// Opens (or creates) the SQLite database and ensures the table exists.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user DB at {}", db_path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_table()?;
        Ok(store)
    }

    fn create_table(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                login        TEXT NOT NULL,
                provider     TEXT NOT NULL,
                name         TEXT NOT NULL,
                access_token TEXT NOT NULL,
                apikey       TEXT,
                created_at   TEXT NOT NULL,
                UNIQUE(provider, login)
            );
            CREATE INDEX IF NOT EXISTS idx_users_access_token ON users(access_token);
            CREATE INDEX IF NOT EXISTS idx_users_apikey ON users(apikey);",
        )
        .context("Failed to create users table")?;
        Ok(())
    }
}

type RawUser = (i64, String, String, String, String, Option<String>, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawUser> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_user(raw: RawUser) -> Result<User> {
    let (id, login, provider, name, access_token_hash, api_key_hash, created_at) = raw;
    let provider: Provider = provider
        .parse()
        .with_context(|| format!("Invalid provider stored for user {}", id))?;
    let created_at = created_at
        .parse()
        .with_context(|| format!("Failed to parse created_at for user {}", id))?;
    Ok(User {
        id,
        login,
        provider,
        name,
        access_token_hash,
        api_key_hash,
        created_at,
    })
}

impl UserRepository for SqliteUserStore {
    fn find(&self, filter: UserFilter<'_>) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let raw = match filter {
            UserFilter::Login { login, provider } => conn
                .query_row(
                    &format!(
                        "SELECT {} FROM users WHERE login = ?1 AND provider = ?2",
                        USER_COLUMNS
                    ),
                    params![login, provider.as_str()],
                    read_row,
                )
                .optional(),
            UserFilter::AccessTokenHash(hash) => conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE access_token = ?1", USER_COLUMNS),
                    params![hash],
                    read_row,
                )
                .optional(),
            UserFilter::ApiKeyHash(hash) => conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE apikey = ?1", USER_COLUMNS),
                    params![hash],
                    read_row,
                )
                .optional(),
        }
        .context("Failed to query users")?;

        raw.map(into_user).transpose()
    }

    fn create(&self, user: NewUser) -> Result<User> {
        let created_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (login, provider, name, access_token, apikey, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.login,
                user.provider.as_str(),
                user.name,
                user.access_token_hash,
                user.api_key_hash,
                created_at.to_rfc3339(),
            ],
        )
        .with_context(|| {
            format!(
                "Failed to insert user {}/{}",
                user.provider.as_str(),
                user.login
            )
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            login: user.login,
            provider: user.provider,
            name: user.name,
            access_token_hash: user.access_token_hash,
            api_key_hash: user.api_key_hash,
            created_at,
        })
    }

    fn update_access_token_hash(&self, user_id: i64, hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE users SET access_token = ?1 WHERE id = ?2",
                params![hash, user_id],
            )
            .context("Failed to update access token")?;
        if updated == 0 {
            return Err(anyhow!("User {} not found", user_id));
        }
        Ok(())
    }

    fn update_api_key_hash(&self, user_id: i64, hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE users SET apikey = ?1 WHERE id = ?2",
                params![hash, user_id],
            )
            .context("Failed to update API key")?;
        if updated == 0 {
            return Err(anyhow!("User {} not found", user_id));
        }
        Ok(())
    }
}
