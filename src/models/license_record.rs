use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// Response-only status emitted when the submitted identity fields disagree.
pub const SITUACAO_INVALIDA: &str = "inválida";

/// License categories accepted at registration.
pub const CATEGORIAS: &[&str] = &["A", "B", "AB", "C", "D", "E", "AC", "AD", "AE"];

/// Persistable license statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Situacao {
    #[serde(rename = "válida")]
    Valida,
    #[serde(rename = "suspensa")]
    Suspensa,
    #[serde(rename = "cassada")]
    Cassada,
    #[serde(rename = "vencida")]
    Vencida,
}

impl Situacao {
    pub const ALL: &'static [&'static str] = &["válida", "suspensa", "cassada", "vencida"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Situacao::Valida => "válida",
            Situacao::Suspensa => "suspensa",
            Situacao::Cassada => "cassada",
            Situacao::Vencida => "vencida",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "válida" => Some(Situacao::Valida),
            "suspensa" => Some(Situacao::Suspensa),
            "cassada" => Some(Situacao::Cassada),
            "vencida" => Some(Situacao::Vencida),
            _ => None,
        }
    }
}

/// Canonical license entry, owned by the request that registered it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LicenseRecord {
    pub id: i64,
    pub cnh_request_id: i64,
    pub categoria: String,
    pub codigo_seguranca: String,
    pub cpf: String,
    pub emissao_data: NaiveDate,
    pub espelho: String,
    pub mae: String,
    pub nome: String,
    pub nome_condutor_identico_ao_informado: bool,
    pub nome_mae_identico_ao_informado: bool,
    pub registro: String,
    pub situacao: String, // one of Situacao::ALL
    pub validade_data: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLicenseRecord {
    pub categoria: String,
    pub codigo_seguranca: String,
    pub cpf: String,
    pub emissao_data: NaiveDate,
    pub espelho: String,
    pub mae: String,
    pub nome: String,
    pub registro: String,
    pub situacao: Situacao,
    pub validade_data: NaiveDate,
}

/// Optional equality filters on the owning request's keys.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub cpf: Option<String>,
    pub registro: Option<String>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.cpf.is_none() && self.registro.is_none()
    }

    /// Exact string comparison against the owning request; absent filters always pass.
    pub fn matches(&self, cpf: &str, registro: &str) -> bool {
        self.cpf.as_deref().map_or(true, |c| c == cpf)
            && self.registro.as_deref().map_or(true, |r| r == registro)
    }
}

impl LicenseRecord {
    /// Inserts a record for `request_id` with both identity flags set
    pub async fn create_in(
        tx: &mut Transaction<'_, Postgres>,
        request_id: i64,
        data: &NewLicenseRecord,
    ) -> Result<Self, sqlx::Error> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO cnh_responses (
                cnh_request_id, categoria, codigo_seguranca, cpf, emissao_data,
                espelho, mae, nome, nome_condutor_identico_ao_informado,
                nome_mae_identico_ao_informado, registro, situacao, validade_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, TRUE, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(&data.categoria)
        .bind(&data.codigo_seguranca)
        .bind(&data.cpf)
        .bind(data.emissao_data)
        .bind(&data.espelho)
        .bind(&data.mae)
        .bind(&data.nome)
        .bind(&data.registro)
        .bind(data.situacao.as_str())
        .bind(data.validade_data)
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }

    /// Lists records whose owning request matches the filter
    pub async fn search(pool: &PgPool, filter: &RecordFilter) -> Result<Vec<Self>, sqlx::Error> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT r.* FROM cnh_responses r
            JOIN cnh_requests q ON q.id = r.cnh_request_id
            WHERE ($1::TEXT IS NULL OR q.cpf = $1)
              AND ($2::TEXT IS NULL OR q.registro = $2)
            ORDER BY r.id
            "#,
        )
        .bind(&filter.cpf)
        .bind(&filter.registro)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    /// Finds the record whose owning request has both keys
    pub async fn find_by_keys(
        pool: &PgPool,
        cpf: &str,
        registro: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            SELECT r.* FROM cnh_responses r
            JOIN cnh_requests q ON q.id = r.cnh_request_id
            WHERE q.cpf = $1 AND q.registro = $2
            ORDER BY r.id
            LIMIT 1
            "#,
        )
        .bind(cpf)
        .bind(registro)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    pub async fn exists_with_cpf(pool: &PgPool, cpf: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cnh_responses r
                JOIN cnh_requests q ON q.id = r.cnh_request_id
                WHERE q.cpf = $1
            )
            "#,
        )
        .bind(cpf)
        .fetch_one(pool)
        .await
    }

    pub async fn exists_with_registro(pool: &PgPool, registro: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cnh_responses r
                JOIN cnh_requests q ON q.id = r.cnh_request_id
                WHERE q.registro = $1
            )
            "#,
        )
        .bind(registro)
        .fetch_one(pool)
        .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cnh_responses")
            .fetch_one(pool)
            .await
    }
}
