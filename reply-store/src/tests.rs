#[cfg(test)]
mod tests {
    use crate::ReplyStore;
    use chrono::{Duration, TimeZone, Utc};
    use responder_core::{CoreError, DatabaseError, ReplyRecord};

    async fn setup_test_store() -> (ReplyStore, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir
            .path()
            .join(format!("test_replies_{}.db", uuid::Uuid::new_v4()));

        let mut store = ReplyStore::new(db_path.display().to_string());
        store
            .connect()
            .await
            .expect("Failed to connect to test database");
        store.run_migrations().await.expect("Failed to run migrations");

        (store, dir)
    }

    fn record(uri: &str, minutes_ago: i64) -> ReplyRecord {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        ReplyRecord {
            post_uri: uri.to_string(),
            hashtag: "#theblueskyshow".to_string(),
            timestamp: now - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_location_normalization() {
        assert_eq!(
            ReplyStore::new("replies.db").connection_string(),
            "sqlite://replies.db"
        );
        assert_eq!(
            ReplyStore::new("sqlite::memory:").connection_string(),
            "sqlite::memory:"
        );
    }

    #[tokio::test]
    async fn test_queries_before_connect_fail() {
        let store = ReplyStore::new("unused.db");
        let err = store.count().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let (store, _dir) = setup_test_store().await;
        store.run_migrations().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_and_load_since() {
        let (store, _dir) = setup_test_store().await;
        store.save_reply(&record("at://old", 60 * 30)).await.unwrap();
        store.save_reply(&record("at://a", 90)).await.unwrap();
        store.save_reply(&record("at://b", 5)).await.unwrap();

        let since = record("x", 60 * 24).timestamp;
        let loaded = store.load_since(since).await.unwrap();

        let uris: Vec<_> = loaded.iter().map(|r| r.post_uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a", "at://b"]);
        assert_eq!(loaded[1].timestamp, record("at://b", 5).timestamp);
        assert_eq!(loaded[0].hashtag, "#theblueskyshow");
    }

    #[tokio::test]
    async fn test_prune_before_is_strict() {
        let (store, _dir) = setup_test_store().await;
        let boundary = record("at://edge", 60);
        store.save_reply(&boundary).await.unwrap();
        store.save_reply(&record("at://older", 61)).await.unwrap();
        store.save_reply(&record("at://newer", 1)).await.unwrap();

        let deleted = store.prune_before(boundary.timestamp).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_history_survives_reconnect() {
        let (store, dir) = setup_test_store().await;
        store.save_reply(&record("at://kept", 10)).await.unwrap();
        let location = store.connection_string().to_string();
        store.close().await;

        let mut reopened = ReplyStore::new(location);
        reopened.connect().await.unwrap();
        reopened.run_migrations().await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        drop(dir);
    }
}
