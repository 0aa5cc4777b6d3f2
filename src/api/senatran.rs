use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Instant;

use crate::api::middleware::{client_ip::ClientIp, state::AppState};
use crate::db::StoreError;
use crate::error::{AppError, Result};
use crate::models::{NewLicenseRecord, NewLicenseRequest, RecordFilter, Situacao};
use crate::services::envelope::{record_row, Billing, ResponseBuilder, RowShape, Service};
use crate::services::matcher::{self, IdentityClaim, CPF_TAKEN, REGISTRO_TAKEN};
use crate::services::validator::{
    parse_date, validate, CREATE_RULES, DATE_FORMAT, SEARCH_RULES, VALIDATE_RULES,
};

const INPUT_INVALID: &str = "Dados de entrada inválidos.";
const BODY_NOT_OBJECT: &str = "O corpo da requisição deve ser um objeto JSON válido.";

const SEARCH_FOUND: &str = "CNHs encontradas com sucesso.";
const SEARCH_EMPTY: &str = "Nenhuma CNH encontrada.";
const NO_RECORDS: &str = "Nenhuma CNH foi encontrada no sistema.";
const NO_MATCHING_RECORDS: &str = "Nenhuma CNH foi encontrada com os dados informados.";

const CREATED: &str = "CNH cadastrada com sucesso.";
const ALREADY_REGISTERED: &str = "CNH já cadastrada no sistema.";

const VALIDATED: &str = "A requisição foi processada com sucesso.";
const MISMATCH: &str = "Dados informados não conferem com a CNH cadastrada.";
const LICENSE_NOT_FOUND: &str = "CNH não encontrada no banco de dados.";
const LICENSE_NOT_FOUND_DETAIL: &str = "A CNH com os dados informados não foi encontrada.";

// Secrets (login_senha, pkcs12_*) are never echoed back.
const SEARCH_ECHO: &[&str] = &["cpf", "registro"];
const CREATE_ECHO: &[&str] = &["cpf", "registro", "codigo_seguranca", "nome_condutor", "nome_mae"];
const VALIDATE_ECHO: &[&str] = &[
    "cpf",
    "registro",
    "codigo_seguranca",
    "login_cpf",
    "nome_condutor",
    "nome_mae",
];

#[derive(Debug, Deserialize)]
struct SalvarCnhPayload {
    token: String,
    cpf: String,
    registro: String,
    codigo_seguranca: String,
    nome_condutor: String,
    nome_mae: String,
    categoria: String,
    emissao_data: String,
    validade_data: String,
    espelho: String,
    situacao: String,
    login_cpf: Option<String>,
    login_senha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidarCnhPayload {
    token: String,
    cpf: String,
    registro: String,
    codigo_seguranca: String,
    nome_condutor: Option<String>,
    nome_mae: Option<String>,
    login_cpf: Option<String>,
    login_senha: Option<String>,
}

/// Non-blank string value of `field`.
fn filled(input: &Map<String, Value>, field: &str) -> Option<String> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn body_fields(body: std::result::Result<Json<Value>, JsonRejection>) -> Option<Map<String, Value>> {
    match body {
        Ok(Json(Value::Object(fields))) => Some(fields),
        Ok(_) => None,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            None
        }
    }
}

/// Whole milliseconds since `started`.
fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn payload<T: serde::de::DeserializeOwned>(input: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(input.clone()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("validated payload did not decode: {}", e)))
}

/// Hashes a non-blank `login_senha` off the async workers.
async fn hash_login_senha(state: &AppState, login_senha: Option<String>) -> Result<Option<String>> {
    let Some(secret) = non_blank(login_senha) else {
        return Ok(None);
    };

    let hasher = state.hasher.clone();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&secret))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    Ok(Some(hash))
}

/// Backfills timing on the audit row and signs it.
async fn finish_audit(state: &AppState, request_id: i64, started: Instant) -> Result<(i64, String)> {
    let elapsed = elapsed_ms(started);
    let stored = i32::try_from(elapsed).unwrap_or(i32::MAX);
    state.store.record_elapsed(request_id, stored).await?;

    let signature = state.signer.sign(request_id)?;

    Ok((elapsed, signature))
}

fn conflict(response: ResponseBuilder, cpf: &str, registro: &str, errors: Vec<String>) -> Response {
    tracing::info!(cpf = %cpf, registro = %registro, "License already registered");

    response
        .errors(errors)
        .row(json!({ "cpf": cpf, "registro": registro }))
        .respond(StatusCode::CONFLICT, ALREADY_REGISTERED)
}

/// GET /v2/senatran/buscar-cnh
///
/// Lists every license, or those whose owning request matches `cpf` and/or
/// `registro`. Read-only: no audit row is written.
async fn buscar_cnh(
    State(state): State<AppState>,
    ClientIp(remote_ip): ClientIp,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    search_licenses(&state, remote_ip.clone(), query)
        .await
        .unwrap_or_else(|e| e.respond(Service::BuscarCnh, remote_ip))
}

async fn search_licenses(
    state: &AppState,
    remote_ip: String,
    query: HashMap<String, String>,
) -> Result<Response> {
    let started = Instant::now();

    let input: Map<String, Value> = query
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    let response = ResponseBuilder::new(Service::BuscarCnh, remote_ip).echo(&input, SEARCH_ECHO);

    let errors = validate(&input, SEARCH_RULES);
    if !errors.is_empty() {
        return Ok(response
            .errors(errors)
            .respond(StatusCode::UNPROCESSABLE_ENTITY, INPUT_INVALID));
    }

    let filter = RecordFilter {
        cpf: filled(&input, "cpf"),
        registro: filled(&input, "registro"),
    };
    let records = matcher::search(state.store.as_ref(), &filter).await?;

    if records.is_empty() {
        let detail = if filter.is_empty() {
            NO_RECORDS
        } else {
            NO_MATCHING_RECORDS
        };
        return Ok(response
            .errors(vec![detail.to_string()])
            .respond(StatusCode::NOT_FOUND, SEARCH_EMPTY));
    }

    let billing = Billing {
        client_name: None,
        token_name: filled(&input, "token"),
        billable: false,
        price: Decimal::ZERO,
        elapsed_ms: elapsed_ms(started),
        signature: None,
    };

    tracing::debug!(count = records.len(), "License search completed");

    Ok(response
        .billing(billing)
        .rows(
            records
                .iter()
                .map(|record| record_row(record, RowShape::Listing, &record.situacao)),
        )
        .respond(StatusCode::OK, SEARCH_FOUND))
}

/// POST /v2/senatran/salvar-cnh
///
/// Registers a new license together with its owning request. Both `cpf`
/// and `registro` must be unused.
async fn salvar_cnh(
    State(state): State<AppState>,
    ClientIp(remote_ip): ClientIp,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    register_license(&state, remote_ip.clone(), body)
        .await
        .unwrap_or_else(|e| e.respond(Service::SalvarCnh, remote_ip))
}

async fn register_license(
    state: &AppState,
    remote_ip: String,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let started = Instant::now();
    let response = ResponseBuilder::new(Service::SalvarCnh, remote_ip.clone());

    let Some(input) = body_fields(body) else {
        return Ok(response
            .errors(vec![BODY_NOT_OBJECT.to_string()])
            .respond(StatusCode::UNPROCESSABLE_ENTITY, INPUT_INVALID));
    };
    let response = response.echo(&input, CREATE_ECHO);

    let errors = validate(&input, CREATE_RULES);
    if !errors.is_empty() {
        return Ok(response
            .errors(errors)
            .respond(StatusCode::UNPROCESSABLE_ENTITY, INPUT_INVALID));
    }
    let payload: SalvarCnhPayload = payload(&input)?;

    let conflicts =
        matcher::find_conflicts(state.store.as_ref(), &payload.cpf, &payload.registro).await?;
    if !conflicts.is_empty() {
        return Ok(conflict(response, &payload.cpf, &payload.registro, conflicts));
    }

    let (Some(emissao_data), Some(validade_data), Some(situacao)) = (
        parse_date(&payload.emissao_data, DATE_FORMAT),
        parse_date(&payload.validade_data, DATE_FORMAT),
        Situacao::parse(&payload.situacao),
    ) else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "validated dates or situacao failed to parse"
        )));
    };

    let new_request = NewLicenseRequest {
        cpf: payload.cpf.clone(),
        registro: payload.registro.clone(),
        codigo_seguranca: payload.codigo_seguranca.clone(),
        login_cpf: non_blank(payload.login_cpf),
        login_senha_hash: hash_login_senha(state, payload.login_senha).await?,
        nome_condutor: Some(payload.nome_condutor.clone()),
        nome_mae: Some(payload.nome_mae.clone()),
        client_name: state.config.registration_client_name.clone(),
        token_name: Some(payload.token),
        billable: false,
        price: Decimal::ZERO,
        remote_ip,
    };
    let new_record = NewLicenseRecord {
        categoria: payload.categoria,
        codigo_seguranca: payload.codigo_seguranca,
        cpf: payload.cpf.clone(),
        emissao_data,
        espelho: payload.espelho,
        mae: payload.nome_mae,
        nome: payload.nome_condutor,
        registro: payload.registro.clone(),
        situacao,
        validade_data,
    };

    let (request, record) = match state.store.create_license(new_request, new_record).await {
        Ok(created) => created,
        Err(StoreError::Duplicate { field }) => {
            // Lost a race against a concurrent registration.
            let detail = if field == "cpf" { CPF_TAKEN } else { REGISTRO_TAKEN };
            return Ok(conflict(
                response,
                &payload.cpf,
                &payload.registro,
                vec![detail.to_string()],
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let (elapsed, signature) = finish_audit(state, request.id, started).await?;

    tracing::info!(
        request_id = request.id,
        record_id = record.id,
        elapsed_ms = elapsed,
        "License registered"
    );

    Ok(response
        .requested_at(request.created_at)
        .billing(Billing::for_request(&request, elapsed, signature))
        .row(record_row(&record, RowShape::Registered, &record.situacao))
        .respond(StatusCode::CREATED, CREATED))
}

/// POST /v2/senatran/validar-cnh
///
/// Checks submitted identity fields against the stored license. Every call
/// that finds a license is billed and audited; a mismatch answers 400 with
/// situacao "inválida".
async fn validar_cnh(
    State(state): State<AppState>,
    ClientIp(remote_ip): ClientIp,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    validate_license(&state, remote_ip.clone(), body)
        .await
        .unwrap_or_else(|e| e.respond(Service::ValidarCnh, remote_ip))
}

async fn validate_license(
    state: &AppState,
    remote_ip: String,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let started = Instant::now();
    let response = ResponseBuilder::new(Service::ValidarCnh, remote_ip.clone());

    let Some(input) = body_fields(body) else {
        return Ok(response
            .errors(vec![BODY_NOT_OBJECT.to_string()])
            .respond(StatusCode::UNPROCESSABLE_ENTITY, INPUT_INVALID));
    };
    let response = response.echo(&input, VALIDATE_ECHO);

    let errors = validate(&input, VALIDATE_RULES);
    if !errors.is_empty() {
        return Ok(response
            .errors(errors)
            .respond(StatusCode::UNPROCESSABLE_ENTITY, INPUT_INVALID));
    }
    let payload: ValidarCnhPayload = payload(&input)?;

    let Some(record) =
        matcher::lookup(state.store.as_ref(), &payload.cpf, &payload.registro).await?
    else {
        tracing::info!(cpf = %payload.cpf, registro = %payload.registro, "License not found");
        return Ok(response
            .errors(vec![LICENSE_NOT_FOUND_DETAIL.to_string()])
            .respond(StatusCode::NOT_FOUND, LICENSE_NOT_FOUND));
    };

    let request = state
        .store
        .insert_request(NewLicenseRequest {
            cpf: payload.cpf.clone(),
            registro: payload.registro.clone(),
            codigo_seguranca: payload.codigo_seguranca.clone(),
            login_cpf: non_blank(payload.login_cpf),
            login_senha_hash: hash_login_senha(state, payload.login_senha).await?,
            nome_condutor: Some(payload.nome_condutor.clone().unwrap_or_default()),
            nome_mae: Some(payload.nome_mae.clone().unwrap_or_default()),
            client_name: state.config.validation_client_name.clone(),
            token_name: Some(payload.token),
            billable: true,
            price: state.config.validation_price,
            remote_ip,
        })
        .await?;

    let report = matcher::compare(
        &record,
        &IdentityClaim {
            codigo_seguranca: payload.codigo_seguranca,
            nome_condutor: payload.nome_condutor,
            nome_mae: payload.nome_mae,
        },
    );

    let (elapsed, signature) = finish_audit(state, request.id, started).await?;

    let (status, code_message) = if report.is_valid() {
        (StatusCode::OK, VALIDATED)
    } else {
        (StatusCode::BAD_REQUEST, MISMATCH)
    };

    tracing::info!(
        request_id = request.id,
        valid = report.is_valid(),
        elapsed_ms = elapsed,
        "License validated"
    );

    let row = record_row(
        &record,
        RowShape::Validated {
            nome_condutor_identico: report.nome_condutor_identico,
            nome_mae_identico: report.nome_mae_identico,
        },
        report.situacao(&record),
    );

    Ok(response
        .requested_at(request.created_at)
        .billing(Billing::for_request(&request, elapsed, signature))
        .errors(report.errors.clone())
        .row(row)
        .respond(status, code_message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v2/senatran/buscar-cnh", get(buscar_cnh))
        .route("/v2/senatran/salvar-cnh", post(salvar_cnh))
        .route("/v2/senatran/validar-cnh", post(validar_cnh))
}
