//! # rb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rb-core` comment model.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rb_core::models::{Comment, NewComment};
use rb_core::search::CommentFilter;
use rb_core::traits::CommentStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

const COLUMNS: &str = "id, thread_id, author_id, content, parent_id, depth, created_at, updated_at";

pub struct SqliteCommentStore {
    pool: SqlitePool,
}

// Helpers for UUID and timestamp conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Uuid::from_slice(blob).context("malformed comment id in database")
}

fn micros_to_datetime(micros: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).context("timestamp out of range in database")
}

fn row_to_comment(row: &SqliteRow) -> anyhow::Result<Comment> {
    let parent: Option<Vec<u8>> = row.try_get("parent_id")?;
    Ok(Comment {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?,
        thread_id: row.try_get("thread_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        parent_id: parent.as_deref().map(blob_to_uuid).transpose()?,
        depth: u8::try_from(row.try_get::<i64, _>("depth")?).context("depth out of range")?,
        created_at: micros_to_datetime(row.try_get("created_at")?)?,
        updated_at: micros_to_datetime(row.try_get("updated_at")?)?,
    })
}

impl SqliteCommentStore {
    /// Wraps an existing pool. Call [`SqliteCommentStore::migrate`] before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// # Developer Note
    /// Every connection to `sqlite::memory:` is a separate database, so the
    /// pool is pinned to a single connection for in-memory URLs.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let max_connections = if url.contains(":memory:") { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open comment database at {url}"))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_comments(&self, sql: &str, key: SqlKey, limit: Option<(i64, i64)>) -> anyhow::Result<Vec<Comment>> {
        let mut query = match key {
            SqlKey::Thread(thread_id) => sqlx::query(sql).bind(thread_id),
            SqlKey::Parent(parent_id) => sqlx::query(sql).bind(uuid_to_blob(parent_id)),
        };
        if let Some((limit, offset)) = limit {
            query = query.bind(limit).bind(offset);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_comment)
            .collect()
    }

    async fn count(&self, sql: &str, key: SqlKey) -> anyhow::Result<i64> {
        let query = sqlx::query_scalar::<_, i64>(sql);
        let query = match key {
            SqlKey::Thread(thread_id) => query.bind(thread_id),
            SqlKey::Parent(parent_id) => query.bind(uuid_to_blob(parent_id)),
        };
        Ok(query.fetch_one(&self.pool).await?)
    }
}

#[derive(Clone, Copy)]
enum SqlKey {
    Thread(i64),
    Parent(Uuid),
}

#[async_trait]
impl CommentStore for SqliteCommentStore {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now().timestamp_micros();

        sqlx::query(
            "INSERT INTO comments (id, thread_id, author_id, content, parent_id, depth, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(id))
        .bind(comment.thread_id)
        .bind(comment.author_id)
        .bind(comment.content)
        .bind(comment.parent_id.map(uuid_to_blob))
        .bind(i64::from(comment.depth))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(comment_id = %id, "comment row inserted");
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM comments WHERE id = ?"))
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_comment).transpose()
    }

    async fn list_by_thread(
        &self,
        thread_id: i64,
        filter: &CommentFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Comment>, i64)> {
        let (clause, arg) = filter_clause(filter);
        let list_sql = format!(
            "SELECT {COLUMNS} FROM comments WHERE thread_id = ? {clause} \
             ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) FROM comments WHERE thread_id = ? {clause}");

        let mut query = sqlx::query(&list_sql).bind(thread_id);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(thread_id);
        if let Some(arg) = arg {
            query = query.bind(arg.clone());
            count = count.bind(arg);
        }

        let items = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_comment)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let total = count.fetch_one(&self.pool).await?;
        Ok((items, total))
    }

    async fn list_roots_by_thread(&self, thread_id: i64, limit: i64, offset: i64) -> anyhow::Result<(Vec<Comment>, i64)> {
        let items = self
            .fetch_comments(
                &format!(
                    "SELECT {COLUMNS} FROM comments WHERE thread_id = ? AND parent_id IS NULL \
                     ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
                ),
                SqlKey::Thread(thread_id),
                Some((limit, offset)),
            )
            .await?;
        let total = self
            .count(
                "SELECT COUNT(*) FROM comments WHERE thread_id = ? AND parent_id IS NULL",
                SqlKey::Thread(thread_id),
            )
            .await?;
        Ok((items, total))
    }

    async fn list_children(&self, parent_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        self.fetch_comments(
            &format!("SELECT {COLUMNS} FROM comments WHERE parent_id = ? ORDER BY created_at ASC, id ASC"),
            SqlKey::Parent(parent_id),
            None,
        )
        .await
    }

    async fn count_by_thread(&self, thread_id: i64) -> anyhow::Result<i64> {
        self.count("SELECT COUNT(*) FROM comments WHERE thread_id = ?", SqlKey::Thread(thread_id))
            .await
    }

    async fn count_by_parent(&self, parent_id: Uuid) -> anyhow::Result<i64> {
        self.count("SELECT COUNT(*) FROM comments WHERE parent_id = ?", SqlKey::Parent(parent_id))
            .await
    }

    async fn has_children(&self, parent_id: Uuid) -> anyhow::Result<bool> {
        let exists = self
            .count(
                "SELECT EXISTS (SELECT 1 FROM comments WHERE parent_id = ?)",
                SqlKey::Parent(parent_id),
            )
            .await?;
        Ok(exists != 0)
    }

    async fn update(&self, comment: &Comment) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
            .bind(&comment.content)
            .bind(comment.updated_at.timestamp_micros())
            .bind(uuid_to_blob(comment.id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_children_of(&self, parent_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query(&format!("DELETE FROM comments WHERE parent_id = ? RETURNING {COLUMNS}"))
            .bind(uuid_to_blob(parent_id))
            .fetch_all(&self.pool)
            .await?;
        removed_in_order(&rows)
    }

    async fn delete_by_thread(&self, thread_id: i64) -> anyhow::Result<Vec<Comment>> {
        let mut tx = self.pool.begin().await?;
        let replies = sqlx::query(&format!(
            "DELETE FROM comments WHERE thread_id = ? AND parent_id IS NOT NULL RETURNING {COLUMNS}"
        ))
        .bind(thread_id)
        .fetch_all(&mut *tx)
        .await?;
        let roots = sqlx::query(&format!(
            "DELETE FROM comments WHERE thread_id = ? AND parent_id IS NULL RETURNING {COLUMNS}"
        ))
        .bind(thread_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut removed = removed_in_order(&replies)?;
        removed.extend(removed_in_order(&roots)?);
        debug!(thread_id, removed = removed.len(), "thread comments deleted");
        Ok(removed)
    }
}

/// `RETURNING` yields rows in no particular order.
fn removed_in_order(rows: &[SqliteRow]) -> anyhow::Result<Vec<Comment>> {
    let mut removed = rows.iter().map(row_to_comment).collect::<anyhow::Result<Vec<_>>>()?;
    removed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(removed)
}

/// Extra `WHERE` terms for a listing filter and the value they bind, if any.
fn filter_clause(filter: &CommentFilter) -> (String, Option<String>) {
    const CONTENT: &str = "content LIKE '%' || ? || '%' ESCAPE '\\'";
    const AUTHOR: &str = "CAST(author_id AS TEXT) LIKE '%' || ? || '%' ESCAPE '\\'";
    match filter {
        CommentFilter::All => (String::new(), None),
        CommentFilter::Depth(depth) => (format!("AND depth = {depth}"), None),
        CommentFilter::Content(keyword) => (format!("AND {CONTENT}"), Some(escape_like(keyword))),
        CommentFilter::Author(keyword) => (format!("AND {AUTHOR}"), Some(escape_like(keyword))),
        // ?NNN reuses the same bound value for both terms
        CommentFilter::ContentOrAuthor(keyword) => (
            "AND (content LIKE '%' || ?2 || '%' ESCAPE '\\' \
             OR CAST(author_id AS TEXT) LIKE '%' || ?2 || '%' ESCAPE '\\')"
                .to_string(),
            Some(escape_like(keyword)),
        ),
    }
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
