use async_trait::async_trait;
use jiff::Timestamp;
use rotator_core::error::StorageError;
use rotator_core::repository::{Repository, Result};
use rotator_core::{LinkId, LinkRecord, NewShortCode, ShortCode, ShortCodeRecord, Strategy};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

const SHORTCODES_DDL: &str = include_str!("../ddl/mysql/shortcodes.sql");
const URLS_DDL: &str = include_str!("../ddl/mysql/urls.sql");

/// MySQL implementation of the repository contract.
///
/// Short codes live in `shortcodes`, their destinations in `urls`. Times
/// are stored as unix milliseconds. Rows are never deleted.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the tables if they do not exist yet. Safe to run on every
    /// start.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in [SHORTCODES_DDL, URLS_DDL] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

fn now_unix_millis() -> i64 {
    Timestamp::now().as_millisecond()
}

fn parse_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn short_code_from_row(row: &MySqlRow) -> Result<ShortCodeRecord> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    let strategy: String = row.try_get("strategy").map_err(map_sqlx_error)?;
    let strategy = strategy
        .parse::<Strategy>()
        .map_err(|e| StorageError::InvalidData(e.to_string()))?;

    Ok(ShortCodeRecord {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        code: ShortCode::new_unchecked(code),
        total_hit: row.try_get("total_hit").map_err(map_sqlx_error)?,
        strategy,
        created_at: parse_millis("created_at", row.try_get("created_at").map_err(map_sqlx_error)?)?,
        updated_at: parse_millis("updated_at", row.try_get("updated_at").map_err(map_sqlx_error)?)?,
    })
}

fn link_from_row(row: &MySqlRow) -> Result<LinkRecord> {
    let code: String = row.try_get("shortcode").map_err(map_sqlx_error)?;

    Ok(LinkRecord {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        code: ShortCode::new_unchecked(code),
        original: row.try_get("original").map_err(map_sqlx_error)?,
        total_hit: row.try_get("total_hit").map_err(map_sqlx_error)?,
        created_at: parse_millis("created_at", row.try_get("created_at").map_err(map_sqlx_error)?)?,
        updated_at: parse_millis("updated_at", row.try_get("updated_at").map_err(map_sqlx_error)?)?,
    })
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn save_short_code_with_links(
        &self,
        short_code: NewShortCode,
        urls: &[String],
    ) -> Result<(ShortCodeRecord, Vec<LinkRecord>)> {
        if urls.is_empty() {
            return Err(StorageError::InvalidData(format!(
                "short code '{}' needs at least one url",
                short_code.code
            )));
        }

        let now = now_unix_millis();
        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO shortcodes (code, total_hit, strategy, created_at, updated_at)
            VALUES (?, 0, ?, ?, ?)
            "#,
        )
        .bind(short_code.code.as_str())
        .bind(short_code.strategy.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        let short_code_id = match inserted {
            Ok(result) => result.last_insert_id(),
            Err(err) if is_unique_violation(&err) => {
                return Err(StorageError::Conflict(short_code.code.to_string()))
            }
            Err(err) => return Err(map_sqlx_error(err)),
        };

        let mut insert_urls: QueryBuilder<MySql> = QueryBuilder::new(
            "INSERT INTO urls (shortcode, original, total_hit, created_at, updated_at) ",
        );
        insert_urls.push_values(urls, |mut row, url| {
            row.push_bind(short_code.code.as_str())
                .push_bind(url.as_str())
                .push_bind(0_u64)
                .push_bind(now)
                .push_bind(now);
        });
        insert_urls
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        // MySQL has no RETURNING: read the rows back inside the transaction.
        let row = sqlx::query(
            r#"
            SELECT id, code, total_hit, strategy, created_at, updated_at
            FROM shortcodes
            WHERE id = ?
            "#,
        )
        .bind(short_code_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let record = short_code_from_row(&row)?;

        let rows = sqlx::query(
            r#"
            SELECT id, shortcode, original, total_hit, created_at, updated_at
            FROM urls
            WHERE shortcode = ?
            ORDER BY id
            "#,
        )
        .bind(short_code.code.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let links = rows.iter().map(link_from_row).collect::<Result<Vec<_>>>()?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok((record, links))
    }

    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, total_hit, strategy, created_at, updated_at
            FROM shortcodes
            WHERE code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(short_code_from_row).transpose()
    }

    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, shortcode, original, total_hit, created_at, updated_at
            FROM urls
            WHERE shortcode = ?
            ORDER BY id
            "#,
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(link_from_row).collect()
    }

    async fn update_short_code_hit(&self, code: &ShortCode) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            UPDATE shortcodes
            SET total_hit = total_hit + 1, updated_at = ?
            WHERE code = ?
            "#,
        )
        .bind(now_unix_millis())
        .bind(code.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn update_link_hit(&self, link_id: LinkId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            UPDATE urls
            SET total_hit = total_hit + 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now_unix_millis())
        .bind(link_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }
}
