use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// Audit row written for every call that reaches persistence.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LicenseRequest {
    pub id: i64,
    pub cpf: String,
    pub registro: String,
    pub codigo_seguranca: String,
    pub login_cpf: Option<String>,
    #[serde(skip_serializing)]
    pub login_senha: Option<String>, // one-way hash, never the raw password
    pub nome_condutor: Option<String>,
    pub nome_mae: Option<String>,
    pub client_name: Option<String>,
    pub token_name: Option<String>,
    pub billable: bool,
    pub price: Decimal,
    pub remote_ip: Option<String>,
    pub elapsed_time_in_milliseconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLicenseRequest {
    pub cpf: String,
    pub registro: String,
    pub codigo_seguranca: String,
    pub login_cpf: Option<String>,
    pub login_senha_hash: Option<String>,
    pub nome_condutor: Option<String>,
    pub nome_mae: Option<String>,
    pub client_name: String,
    pub token_name: Option<String>,
    pub billable: bool,
    pub price: Decimal,
    pub remote_ip: String,
}

impl LicenseRequest {
    /// Inserts an audit row outside of any transaction
    pub async fn create(pool: &PgPool, data: &NewLicenseRequest) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::insert(&mut conn, data).await
    }

    /// Inserts an audit row inside an open transaction
    pub async fn create_in(
        tx: &mut Transaction<'_, Postgres>,
        data: &NewLicenseRequest,
    ) -> Result<Self, sqlx::Error> {
        Self::insert(&mut **tx, data).await
    }

    async fn insert(
        conn: &mut sqlx::PgConnection,
        data: &NewLicenseRequest,
    ) -> Result<Self, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO cnh_requests (
                cpf, registro, codigo_seguranca, login_cpf, login_senha,
                nome_condutor, nome_mae, client_name, token_name,
                billable, price, remote_ip
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&data.cpf)
        .bind(&data.registro)
        .bind(&data.codigo_seguranca)
        .bind(&data.login_cpf)
        .bind(&data.login_senha_hash)
        .bind(&data.nome_condutor)
        .bind(&data.nome_mae)
        .bind(&data.client_name)
        .bind(&data.token_name)
        .bind(data.billable)
        .bind(data.price)
        .bind(&data.remote_ip)
        .fetch_one(conn)
        .await?;

        Ok(request)
    }

    /// Backfills the measured handling time once the response is known
    pub async fn record_elapsed(
        pool: &PgPool,
        id: i64,
        elapsed_ms: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE cnh_requests
            SET elapsed_time_in_milliseconds = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(elapsed_ms)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cnh_requests")
            .fetch_one(pool)
            .await
    }
}
