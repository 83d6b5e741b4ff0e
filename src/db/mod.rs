//! Database module
//!
//! Visit store (idempotent writes) and the read-only aggregation queries
//! behind the stats pages.

mod error;
mod schema;

pub use error::StoreError;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::time::Duration;

use crate::config::DatabaseConfig;

/// One recorded view of a page by a visitor on a given day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub day: NaiveDate,
    pub visitor_key: String,
    pub path: String,
}

impl Hit {
    pub fn new(day: NaiveDate, visitor_key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            day,
            visitor_key: visitor_key.into(),
            path: path.into(),
        }
    }
}

/// Distinct visitors seen on a day, all pages combined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub visitors: i64,
}

/// Visits to one page on a day. Rows are already distinct per visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCount {
    pub day: NaiveDate,
    pub path: String,
    pub visits: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Self::open(&config.url, config.max_connections).await
    }

    /// Open (creating if missing) the SQLite file at `path`
    pub async fn open(path: &str, max_connections: u32) -> Result<Self, StoreError> {
        // WAL lets the stats queries read while a hit is being written
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the visits table and its unique index. Safe to run on every start.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(schema::CREATE_VISITS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_UNIQUE_VISIT)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a hit. A duplicate (day, visitor, path) is a successful no-op.
    ///
    /// Returns `true` when a new row was written.
    pub async fn record(&self, hit: &Hit) -> Result<bool, StoreError> {
        let result = sqlx::query("INSERT OR IGNORE INTO visits (date, ip, path) VALUES (?, ?, ?)")
            .bind(hit.day)
            .bind(&hit.visitor_key)
            .bind(&hit.path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Distinct visitors per day, ascending by day. Days without hits are absent.
    pub async fn total_by_day(&self) -> Result<Vec<DailyCount>, StoreError> {
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r#"
            SELECT date, COUNT(DISTINCT ip) AS visitors
            FROM visits
            GROUP BY date
            ORDER BY date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, visitors)| DailyCount { day, visitors })
            .collect())
    }

    /// Visits per (day, path), ascending by day then path.
    pub async fn by_day_and_path(&self) -> Result<Vec<PathCount>, StoreError> {
        let rows: Vec<(NaiveDate, String, i64)> = sqlx::query_as(
            r#"
            SELECT date, path, COUNT(*) AS visits
            FROM visits
            GROUP BY date, path
            ORDER BY date ASC, path ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, path, visits)| PathCount { day, path, visits })
            .collect())
    }

    #[cfg(test)]
    pub async fn hit_count(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM visits")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TempDb;
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn seed_example(db: &Database) {
        for (d, ip, path) in [
            ("2024-01-01", "1.2.3.4", "/alpha"),
            ("2024-01-01", "5.6.7.8", "/alpha"),
            ("2024-01-01", "1.2.3.4", "/beta"),
            ("2024-01-02", "1.2.3.4", "/alpha"),
        ] {
            db.record(&Hit::new(day(d), ip, path)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let tmp = TempDb::new().await;
        tmp.db.ensure_schema().await.unwrap();
        tmp.db.ensure_schema().await.unwrap();
        assert_eq!(tmp.db.hit_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_hits_store_one_row() {
        let tmp = TempDb::new().await;
        let hit = Hit::new(day("2024-03-10"), "10.0.0.1", "/verbs");

        assert!(tmp.db.record(&hit).await.unwrap());
        for _ in 0..4 {
            assert!(!tmp.db.record(&hit).await.unwrap());
        }

        assert_eq!(tmp.db.hit_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_store_aggregates_to_nothing() {
        let tmp = TempDb::new().await;
        assert!(tmp.db.total_by_day().await.unwrap().is_empty());
        assert!(tmp.db.by_day_and_path().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn totals_count_distinct_visitors_across_paths() {
        let tmp = TempDb::new().await;
        let d = day("2024-05-05");
        for (ip, path) in [
            ("a", "/one"),
            ("a", "/two"),
            ("b", "/one"),
            ("c", "/two"),
            ("b", "/two"),
        ] {
            tmp.db.record(&Hit::new(d, ip, path)).await.unwrap();
        }

        let totals = tmp.db.total_by_day().await.unwrap();
        assert_eq!(totals, vec![DailyCount { day: d, visitors: 3 }]);
    }

    #[tokio::test]
    async fn worked_example() {
        let tmp = TempDb::new().await;
        seed_example(&tmp.db).await;

        assert_eq!(
            tmp.db.total_by_day().await.unwrap(),
            vec![
                DailyCount { day: day("2024-01-01"), visitors: 2 },
                DailyCount { day: day("2024-01-02"), visitors: 1 },
            ]
        );
        assert_eq!(
            tmp.db.by_day_and_path().await.unwrap(),
            vec![
                PathCount { day: day("2024-01-01"), path: "/alpha".into(), visits: 2 },
                PathCount { day: day("2024-01-01"), path: "/beta".into(), visits: 1 },
                PathCount { day: day("2024-01-02"), path: "/alpha".into(), visits: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn aggregates_are_ordered_regardless_of_insert_order() {
        let tmp = TempDb::new().await;
        for (d, ip, path) in [
            ("2024-02-03", "x", "/zeta"),
            ("2023-12-31", "x", "/beta"),
            ("2024-02-03", "y", "/alpha"),
            ("2023-12-31", "y", "/alpha"),
        ] {
            tmp.db.record(&Hit::new(day(d), ip, path)).await.unwrap();
        }

        let days: Vec<_> = tmp.db.total_by_day().await.unwrap().into_iter().map(|c| c.day).collect();
        assert_eq!(days, vec![day("2023-12-31"), day("2024-02-03")]);

        let keys: Vec<_> = tmp
            .db
            .by_day_and_path()
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.day, c.path))
            .collect();
        assert_eq!(
            keys,
            vec![
                (day("2023-12-31"), "/alpha".to_string()),
                (day("2023-12-31"), "/beta".to_string()),
                (day("2024-02-03"), "/alpha".to_string()),
                (day("2024-02-03"), "/zeta".to_string()),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_inserts_resolve_to_one_row() {
        let tmp = TempDb::new().await;
        let hit = Hit::new(day("2024-07-01"), "203.0.113.9", "/nouns");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let db = tmp.db.clone();
                let hit = hit.clone();
                tokio::spawn(async move { db.record(&hit).await })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(tmp.db.hit_count().await.unwrap(), 1);
    }
}
