use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::db::StoreError;
use crate::services::envelope::{ResponseBuilder, Service};
use crate::services::{password::PasswordError, signature::EncryptionError};

pub const INTERNAL_ERROR: &str = "Erro interno do servidor.";

/// Failures that abort a request with a 5xx. Business outcomes (invalid
/// input, conflicts, not found, mismatches) are regular envelopes instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Signature error: {0}")]
    Signature(#[from] EncryptionError),

    #[error("Password hashing error: {0}")]
    Password(#[from] PasswordError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Logs the full error and answers with a 500 envelope for `service`.
    ///
    /// Only the generic message reaches the caller.
    pub fn respond(self, service: Service, remote_ip: impl Into<String>) -> Response {
        tracing::error!(error = ?self, service = service.as_str(), "Request failed");

        ResponseBuilder::new(service, remote_ip)
            .errors(vec![INTERNAL_ERROR.to_string()])
            .respond(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_storage_failure_answers_generic_envelope() {
        let err = AppError::Store(StoreError::Database(sqlx::Error::Protocol(
            "relation cnh_requests: connection to 10.0.0.5 refused".into(),
        )));

        let response = err.respond(Service::SalvarCnh, "127.0.0.1");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["code"], json!(500));
        assert_eq!(body["code_message"], json!(INTERNAL_ERROR));
        assert_eq!(body["errors"], json!([INTERNAL_ERROR]));
        assert_eq!(body["data_count"], json!(0));
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["header"]["api_version"], json!("v2"));
        assert_eq!(body["header"]["service"], json!("senatran/salvar-cnh"));
        assert_eq!(body["header"]["remote_ip"], json!("127.0.0.1"));
        assert!(body["header"]["requested_at"].is_string());
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = AppError::Internal(anyhow::anyhow!("validated payload did not decode"));

        let body = body_json(err.respond(Service::ValidarCnh, "unknown")).await;
        assert_eq!(body["header"]["service"], json!("senatran/validar-cnh"));
        assert!(!body.to_string().contains("decode"));
    }
}
