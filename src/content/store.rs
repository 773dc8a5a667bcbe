//! Post and comment persistence using SQLite.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Mutex;

use super::{Comment, CommentUpdate, NewComment, NewPost, Post, PostUpdate};

/// Posts and comments backed by SQLite.
///
/// Comments reference their post with `ON DELETE CASCADE`, so deleting a
/// post removes its comments.
pub struct ContentStore {
    conn: Mutex<Connection>,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        body: row.get(5)?,
    })
}

impl ContentStore {
    /// Opens (or creates) the SQLite database and ensures the tables exist.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open content DB at {}", db_path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS posts (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title   TEXT NOT NULL,
                body    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS comments (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON UPDATE CASCADE ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                name    TEXT NOT NULL,
                email   TEXT NOT NULL,
                body    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);",
        )
        .context("Failed to create content tables")?;
        Ok(())
    }

    /// Lists posts ordered by id, optionally restricted to one author.
    pub fn list_posts(&self, user_id: Option<i64>) -> Result<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, title, body FROM posts
                 WHERE (?1 IS NULL OR user_id = ?1) ORDER BY id ASC",
            )
            .context("Failed to prepare list_posts query")?;
        let posts = stmt
            .query_map(params![user_id], post_from_row)
            .context("Failed to query posts")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read post row")?;
        Ok(posts)
    }

    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, user_id, title, body FROM posts WHERE id = ?1",
            params![id],
            post_from_row,
        )
        .optional()
        .context("Failed to query post")
    }

    pub fn create_post(&self, user_id: i64, post: &NewPost) -> Result<Post> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO posts (user_id, title, body) VALUES (?1, ?2, ?3)",
            params![user_id, post.title, post.body],
        )
        .context("Failed to insert post")?;
        Ok(Post {
            id: conn.last_insert_rowid(),
            user_id,
            title: post.title.clone(),
            body: post.body.clone(),
        })
    }

    /// Replaces title and body. Returns the stored post, or None if absent.
    pub fn update_post(&self, update: &PostUpdate) -> Result<Option<Post>> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE posts SET title = ?1, body = ?2 WHERE id = ?3",
                params![update.title, update.body, update.id],
            )
            .context("Failed to update post")?;
        }
        self.get_post(update.id)
    }

    /// Deletes a post and its comments. Returns whether a row was removed.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])
            .context("Failed to delete post")?;
        Ok(deleted > 0)
    }

    /// Lists comments ordered by id, optionally restricted to one post.
    pub fn list_comments(&self, post_id: Option<i64>) -> Result<Vec<Comment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, post_id, user_id, name, email, body FROM comments
                 WHERE (?1 IS NULL OR post_id = ?1) ORDER BY id ASC",
            )
            .context("Failed to prepare list_comments query")?;
        let comments = stmt
            .query_map(params![post_id], comment_from_row)
            .context("Failed to query comments")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read comment row")?;
        Ok(comments)
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, post_id, user_id, name, email, body FROM comments WHERE id = ?1",
            params![id],
            comment_from_row,
        )
        .optional()
        .context("Failed to query comment")
    }

    pub fn create_comment(&self, user_id: i64, comment: &NewComment) -> Result<Comment> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO comments (post_id, user_id, name, email, body) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                comment.post_id,
                user_id,
                comment.name,
                comment.email,
                comment.body
            ],
        )
        .context("Failed to insert comment")?;
        Ok(Comment {
            id: conn.last_insert_rowid(),
            post_id: comment.post_id,
            user_id,
            name: comment.name.clone(),
            email: comment.email.clone(),
            body: comment.body.clone(),
        })
    }

    /// Updates name, body and (when non-empty) email. Returns the stored
    /// comment, or None if absent.
    pub fn update_comment(&self, update: &CommentUpdate) -> Result<Option<Comment>> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE comments
                 SET name = ?1, body = ?2, email = COALESCE(NULLIF(?3, ''), email)
                 WHERE id = ?4",
                params![update.name, update.body, update.email, update.id],
            )
            .context("Failed to update comment")?;
        }
        self.get_comment(update.id)
    }

    /// Returns whether a row was removed.
    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])
            .context("Failed to delete comment")?;
        Ok(deleted > 0)
    }
}
