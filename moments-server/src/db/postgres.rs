//! PostgreSQL catalog

use moments_core::{AssociationDetail, NewAssociation, StampSummary};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    AssociationRow, CatalogError, CreateStamp, CreateVideo, DeletePolicy, StampRow, VideoRow,
};

const UNIQUE_VIOLATION: &str = "23505";

fn query_error(e: sqlx::Error) -> CatalogError {
    CatalogError::Query(e.to_string())
}

/// Escape `%`, `_` and `\` so user text is matched literally by `ILIKE`.
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Association joined with its stamp and video columns (all nullable).
#[derive(Debug, FromRow)]
struct AssociationJoinRow {
    id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    stamp_id: Uuid,
    video_id: Uuid,
    s_created_at: Option<chrono::DateTime<chrono::Utc>>,
    s_name: Option<String>,
    s_image_key: Option<String>,
    s_image_url: Option<String>,
    s_processed_image_key: Option<String>,
    s_processed_image_url: Option<String>,
    s_fingerprint: Option<String>,
    v_created_at: Option<chrono::DateTime<chrono::Utc>>,
    v_title: Option<String>,
    v_video_key: Option<String>,
    v_video_url: Option<String>,
}

impl From<AssociationJoinRow> for AssociationDetail {
    fn from(row: AssociationJoinRow) -> Self {
        let stamp = match (row.s_created_at, row.s_name, row.s_image_key, row.s_image_url) {
            (Some(created_at), Some(name), Some(image_key), Some(image_url)) => Some(
                StampRow {
                    id: row.stamp_id,
                    created_at,
                    name,
                    image_key,
                    image_url,
                    processed_image_key: row.s_processed_image_key,
                    processed_image_url: row.s_processed_image_url,
                    fingerprint: row.s_fingerprint,
                }
                .into(),
            ),
            _ => None,
        };
        let video = match (row.v_created_at, row.v_title, row.v_video_key, row.v_video_url) {
            (Some(created_at), Some(title), Some(video_key), Some(video_url)) => Some(
                VideoRow {
                    id: row.video_id,
                    created_at,
                    title,
                    video_key,
                    video_url,
                }
                .into(),
            ),
            _ => None,
        };
        Self {
            association: AssociationRow {
                id: row.id,
                created_at: row.created_at,
                stamp_id: row.stamp_id,
                video_id: row.video_id,
            }
            .into(),
            stamp,
            video,
        }
    }
}

/// PostgreSQL-backed catalog
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(database_url)
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))?;

        tracing::info!(max_connections, min_connections, "Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), CatalogError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CatalogError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub async fn check_health(&self) -> Result<(), CatalogError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, CatalogError> {
        self.pool.begin().await.map_err(query_error)
    }

    /// Count associations referencing a record and apply the delete policy.
    /// Must run inside the transaction that deletes the record.
    async fn release_references(
        tx: &mut Transaction<'static, Postgres>,
        column: &'static str,
        id: Uuid,
        policy: DeletePolicy,
        what: &str,
    ) -> Result<(), CatalogError> {
        let count_sql = format!("SELECT COUNT(*) FROM associations WHERE {} = $1", column);
        let (count,): (i64,) = sqlx::query_as(&count_sql)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
            .map_err(query_error)?;

        if count == 0 {
            return Ok(());
        }

        match policy {
            DeletePolicy::Restrict => Err(CatalogError::Conflict(format!(
                "{} is used by {} association(s)",
                what, count
            ))),
            DeletePolicy::Cascade => {
                let delete_sql = format!("DELETE FROM associations WHERE {} = $1", column);
                sqlx::query(&delete_sql)
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .map_err(query_error)?;
                tracing::info!(%id, removed = count, "Cascaded association delete");
                Ok(())
            }
        }
    }

    // ==================== Stamps ====================

    pub async fn list_stamps(&self) -> Result<Vec<StampRow>, CatalogError> {
        sqlx::query_as::<_, StampRow>("SELECT * FROM stamps ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)
    }

    pub async fn get_stamp(&self, id: Uuid) -> Result<StampRow, CatalogError> {
        sqlx::query_as::<_, StampRow>("SELECT * FROM stamps WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| CatalogError::stamp_not_found(id))
    }

    pub async fn insert_stamp(&self, input: CreateStamp) -> Result<StampRow, CatalogError> {
        sqlx::query_as::<_, StampRow>(
            r#"
            INSERT INTO stamps
                (id, name, image_key, image_url, processed_image_key, processed_image_url, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.image_key)
        .bind(&input.image_url)
        .bind(&input.processed_image_key)
        .bind(&input.processed_image_url)
        .bind(&input.fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)
    }

    pub async fn rename_stamp(&self, id: Uuid, name: &str) -> Result<StampRow, CatalogError> {
        sqlx::query_as::<_, StampRow>("UPDATE stamps SET name = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| CatalogError::stamp_not_found(id))
    }

    pub async fn delete_stamp(&self, id: Uuid, policy: DeletePolicy) -> Result<StampRow, CatalogError> {
        let mut tx = self.begin().await?;

        // Row lock blocks concurrent association inserts (their FK check needs a key share lock)
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM stamps WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if exists.is_none() {
            return Err(CatalogError::stamp_not_found(id));
        }

        Self::release_references(&mut tx, "stamp_id", id, policy, "Stamp").await?;

        let row = sqlx::query_as::<_, StampRow>("DELETE FROM stamps WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(row)
    }

    pub async fn search_stamps(&self, fragment: &str) -> Result<Vec<StampSummary>, CatalogError> {
        let fragment = moments_core::normalize_label(fragment);
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, name FROM stamps WHERE name ILIKE $1 ESCAPE '\\' ORDER BY created_at DESC",
        )
        .bind(like_pattern(&fragment))
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| StampSummary { id, name })
            .collect())
    }

    // ==================== Videos ====================

    pub async fn list_videos(&self) -> Result<Vec<VideoRow>, CatalogError> {
        sqlx::query_as::<_, VideoRow>("SELECT * FROM videos ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)
    }

    pub async fn get_video(&self, id: Uuid) -> Result<VideoRow, CatalogError> {
        sqlx::query_as::<_, VideoRow>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| CatalogError::video_not_found(id))
    }

    pub async fn insert_video(&self, input: CreateVideo) -> Result<VideoRow, CatalogError> {
        sqlx::query_as::<_, VideoRow>(
            r#"
            INSERT INTO videos (id, title, video_key, video_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.video_key)
        .bind(&input.video_url)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)
    }

    pub async fn retitle_video(&self, id: Uuid, title: &str) -> Result<VideoRow, CatalogError> {
        sqlx::query_as::<_, VideoRow>("UPDATE videos SET title = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| CatalogError::video_not_found(id))
    }

    pub async fn delete_video(&self, id: Uuid, policy: DeletePolicy) -> Result<VideoRow, CatalogError> {
        let mut tx = self.begin().await?;

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM videos WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if exists.is_none() {
            return Err(CatalogError::video_not_found(id));
        }

        Self::release_references(&mut tx, "video_id", id, policy, "Video").await?;

        let row = sqlx::query_as::<_, VideoRow>("DELETE FROM videos WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(row)
    }

    // ==================== Associations ====================

    pub async fn list_associations(&self) -> Result<Vec<AssociationDetail>, CatalogError> {
        let rows = sqlx::query_as::<_, AssociationJoinRow>(
            r#"
            SELECT a.id, a.created_at, a.stamp_id, a.video_id,
                   s.created_at AS s_created_at, s.name AS s_name,
                   s.image_key AS s_image_key, s.image_url AS s_image_url,
                   s.processed_image_key AS s_processed_image_key,
                   s.processed_image_url AS s_processed_image_url,
                   s.fingerprint AS s_fingerprint,
                   v.created_at AS v_created_at, v.title AS v_title,
                   v.video_key AS v_video_key, v.video_url AS v_video_url
            FROM associations a
            LEFT JOIN stamps s ON s.id = a.stamp_id
            LEFT JOIN videos v ON v.id = a.video_id
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows.into_iter().map(AssociationDetail::from).collect())
    }

    pub async fn create_association(&self, input: NewAssociation) -> Result<AssociationRow, CatalogError> {
        let mut tx = self.begin().await?;

        let stamp: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM stamps WHERE id = $1 FOR KEY SHARE")
            .bind(input.stamp_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if stamp.is_none() {
            return Err(CatalogError::stamp_not_found(input.stamp_id));
        }

        let video: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM videos WHERE id = $1 FOR KEY SHARE")
            .bind(input.video_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if video.is_none() {
            return Err(CatalogError::video_not_found(input.video_id));
        }

        let row = sqlx::query_as::<_, AssociationRow>(
            r#"
            INSERT INTO associations (id, stamp_id, video_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.stamp_id)
        .bind(input.video_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                CatalogError::Conflict("Stamp is already associated with this video".to_string())
            }
            _ => query_error(e),
        })?;

        tx.commit().await.map_err(query_error)?;
        Ok(row)
    }

    pub async fn delete_association(&self, id: Uuid) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM associations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::association_not_found(id));
        }
        Ok(())
    }

    pub async fn playback_for_stamp(&self, stamp_id: Uuid) -> Result<Option<VideoRow>, CatalogError> {
        self.get_stamp(stamp_id).await?;

        sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT v.*
            FROM associations a
            JOIN videos v ON v.id = a.video_id
            WHERE a.stamp_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT 1
            "#,
        )
        .bind(stamp_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)
    }
}
