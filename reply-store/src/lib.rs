//! SQLite persistence for the reply history, so a restarted process keeps
//! honoring duplicate and cooldown checks.

#[cfg(test)]
mod tests;

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use responder_core::{CoreError, DatabaseError, ReplyRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info, warn};

const CREATE_REPLIES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS reply_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_uri TEXT NOT NULL,
        hashtag TEXT NOT NULL,
        replied_at_ms INTEGER NOT NULL
    )
"#;

const CREATE_REPLIED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reply_history_replied_at ON reply_history (replied_at_ms)";

pub struct ReplyStore {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl ReplyStore {
    /// Accepts either a `sqlite:` URL or a plain file path.
    pub fn new(location: impl Into<String>) -> Self {
        let location = location.into();
        let connection_string = if location.starts_with("sqlite:") {
            location
        } else {
            format!("sqlite://{location}")
        };
        Self {
            connection_string,
            pool: None,
        }
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to reply history at {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        for statement in [CREATE_REPLIES_TABLE, CREATE_REPLIED_AT_INDEX] {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    migration: format!("reply_history: {e}"),
                })?;
        }
        debug!("Reply history schema is up to date");
        Ok(())
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            CoreError::Database(DatabaseError::ConnectionFailed {
                reason: "store is not connected".to_string(),
            })
        })
    }

    pub async fn save_reply(&self, record: &ReplyRecord) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO reply_history (post_uri, hashtag, replied_at_ms) VALUES (?, ?, ?)",
        )
        .bind(&record.post_uri)
        .bind(&record.hashtag)
        .bind(record.timestamp.timestamp_millis())
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        Ok(())
    }

    /// Records at or after `since`, oldest first.
    pub async fn load_since(&self, since: DateTime<Utc>) -> Result<Vec<ReplyRecord>, CoreError> {
        let rows = sqlx::query(
            "SELECT post_uri, hashtag, replied_at_ms FROM reply_history \
             WHERE replied_at_ms >= ? ORDER BY replied_at_ms ASC, id ASC",
        )
        .bind(since.timestamp_millis())
        .fetch_all(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let millis: i64 = row.try_get("replied_at_ms").map_err(DatabaseError::Sql)?;
            let Some(timestamp) = Utc.timestamp_millis_opt(millis).single() else {
                warn!("Skipping reply history row with bad timestamp {}", millis);
                continue;
            };
            records.push(ReplyRecord {
                post_uri: row.try_get("post_uri").map_err(DatabaseError::Sql)?,
                hashtag: row.try_get("hashtag").map_err(DatabaseError::Sql)?,
                timestamp,
            });
        }

        debug!("Loaded {} reply records", records.len());
        Ok(records)
    }

    /// Deletes records strictly older than `before`.
    pub async fn prune_before(&self, before: DateTime<Utc>) -> Result<u64, CoreError> {
        let deleted = sqlx::query("DELETE FROM reply_history WHERE replied_at_ms < ?")
            .bind(before.timestamp_millis())
            .execute(self.pool()?)
            .await
            .map_err(DatabaseError::Sql)?
            .rows_affected();

        if deleted > 0 {
            info!("Pruned {} expired reply records", deleted);
        }
        Ok(deleted)
    }

    pub async fn count(&self) -> Result<i64, CoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM reply_history")
            .fetch_one(self.pool()?)
            .await
            .map_err(DatabaseError::Sql)?;
        Ok(row.try_get("total").map_err(DatabaseError::Sql)?)
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
