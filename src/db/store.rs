use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    LicenseRecord, LicenseRequest, NewLicenseRecord, NewLicenseRequest, RecordFilter,
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another record already holds this key; `field` is `"cpf"` or `"registro"`.
    #[error("Duplicate license {field}")]
    Duplicate { field: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for license requests and records.
///
/// Handlers only talk to this trait, so the Postgres store and the in-memory
/// store are interchangeable.
#[async_trait]
pub trait CnhStore: Send + Sync {
    /// Records whose owning request matches every filter that is set, by id.
    async fn search_records(&self, filter: &RecordFilter) -> StoreResult<Vec<LicenseRecord>>;

    /// The record whose owning request has both `cpf` and `registro`.
    async fn find_record(&self, cpf: &str, registro: &str) -> StoreResult<Option<LicenseRecord>>;

    async fn cpf_taken(&self, cpf: &str) -> StoreResult<bool>;
    async fn registro_taken(&self, registro: &str) -> StoreResult<bool>;

    /// Inserts the request and its record atomically.
    async fn create_license(
        &self,
        request: NewLicenseRequest,
        record: NewLicenseRecord,
    ) -> StoreResult<(LicenseRequest, LicenseRecord)>;

    /// Inserts a standalone audit request.
    async fn insert_request(&self, request: NewLicenseRequest) -> StoreResult<LicenseRequest>;

    async fn record_elapsed(&self, request_id: i64, elapsed_ms: i32) -> StoreResult<()>;

    async fn request_count(&self) -> StoreResult<i64>;
    async fn record_count(&self) -> StoreResult<i64>;

    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps a unique-index violation on `cnh_responses` to the key that collided.
fn duplicate_field(err: &sqlx::Error) -> Option<&'static str> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }

    match db_err.constraint() {
        Some("uq_cnh_responses_cpf") => Some("cpf"),
        Some("uq_cnh_responses_registro") => Some("registro"),
        _ => None,
    }
}

#[async_trait]
impl CnhStore for PgStore {
    async fn search_records(&self, filter: &RecordFilter) -> StoreResult<Vec<LicenseRecord>> {
        Ok(LicenseRecord::search(&self.pool, filter).await?)
    }

    async fn find_record(&self, cpf: &str, registro: &str) -> StoreResult<Option<LicenseRecord>> {
        Ok(LicenseRecord::find_by_keys(&self.pool, cpf, registro).await?)
    }

    async fn cpf_taken(&self, cpf: &str) -> StoreResult<bool> {
        Ok(LicenseRecord::exists_with_cpf(&self.pool, cpf).await?)
    }

    async fn registro_taken(&self, registro: &str) -> StoreResult<bool> {
        Ok(LicenseRecord::exists_with_registro(&self.pool, registro).await?)
    }

    async fn create_license(
        &self,
        request: NewLicenseRequest,
        record: NewLicenseRecord,
    ) -> StoreResult<(LicenseRequest, LicenseRecord)> {
        let mut tx = self.pool.begin().await?;

        let request = LicenseRequest::create_in(&mut tx, &request).await?;
        let record = match LicenseRecord::create_in(&mut tx, request.id, &record).await {
            Ok(record) => record,
            Err(e) => {
                // Dropping `tx` rolls the request insert back.
                return Err(match duplicate_field(&e) {
                    Some(field) => StoreError::Duplicate { field },
                    None => StoreError::Database(e),
                });
            }
        };

        tx.commit().await?;

        Ok((request, record))
    }

    async fn insert_request(&self, request: NewLicenseRequest) -> StoreResult<LicenseRequest> {
        Ok(LicenseRequest::create(&self.pool, &request).await?)
    }

    async fn record_elapsed(&self, request_id: i64, elapsed_ms: i32) -> StoreResult<()> {
        Ok(LicenseRequest::record_elapsed(&self.pool, request_id, elapsed_ms).await?)
    }

    async fn request_count(&self) -> StoreResult<i64> {
        Ok(LicenseRequest::count(&self.pool).await?)
    }

    async fn record_count(&self) -> StoreResult<i64> {
        Ok(LicenseRecord::count(&self.pool).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
