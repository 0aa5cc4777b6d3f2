//! Uniform response envelope shared by every endpoint.
//!
//! ```json
//! { "code": 200, "code_message": "...", "errors": [], "header": {...},
//!   "data_count": 1, "data": [...], "site_receipts": [] }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{LicenseRecord, LicenseRequest};

pub const API_VERSION: &str = "v2";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
const OUTPUT_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    BuscarCnh,
    SalvarCnh,
    ValidarCnh,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::BuscarCnh => "senatran/buscar-cnh",
            Service::SalvarCnh => "senatran/salvar-cnh",
            Service::ValidarCnh => "senatran/validar-cnh",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub code: u16,
    pub code_message: String,
    pub errors: Vec<String>,
    pub header: Header,
    pub data_count: usize,
    pub data: Vec<Value>,
    pub site_receipts: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct Header {
    pub api_version: &'static str,
    pub service: &'static str,
    pub parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub requested_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time_in_milliseconds: Option<i64>,
    pub remote_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Billing block of the header, present on paths that report cost.
#[derive(Debug, Clone)]
pub struct Billing {
    pub client_name: Option<String>,
    pub token_name: Option<String>,
    pub billable: bool,
    pub price: Decimal,
    pub elapsed_ms: i64,
    pub signature: Option<String>,
}

impl Billing {
    /// Billing block for a persisted audit request.
    pub fn for_request(request: &LicenseRequest, elapsed_ms: i64, signature: String) -> Self {
        Self {
            client_name: request.client_name.clone(),
            token_name: request.token_name.clone(),
            billable: request.billable,
            price: request.price,
            elapsed_ms,
            signature: Some(signature),
        }
    }
}

pub struct ResponseBuilder {
    service: Service,
    parameters: Map<String, Value>,
    requested_at: DateTime<Utc>,
    remote_ip: String,
    billing: Option<Billing>,
    errors: Vec<String>,
    data: Vec<Value>,
}

impl ResponseBuilder {
    pub fn new(service: Service, remote_ip: impl Into<String>) -> Self {
        Self {
            service,
            parameters: Map::new(),
            requested_at: Utc::now(),
            remote_ip: remote_ip.into(),
            billing: None,
            errors: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Echoes the named input fields, `null` when absent.
    pub fn echo(mut self, input: &Map<String, Value>, fields: &[&str]) -> Self {
        for field in fields {
            let value = input.get(*field).cloned().unwrap_or(Value::Null);
            self.parameters.insert((*field).to_string(), value);
        }
        self
    }

    pub fn requested_at(mut self, at: DateTime<Utc>) -> Self {
        self.requested_at = at;
        self
    }

    pub fn billing(mut self, billing: Billing) -> Self {
        self.billing = Some(billing);
        self
    }

    pub fn errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn row(mut self, row: Value) -> Self {
        self.data.push(row);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Value>) -> Self {
        self.data.extend(rows);
        self
    }

    pub fn build(self, status: StatusCode, code_message: impl Into<String>) -> Envelope {
        let billing = self.billing;

        Envelope {
            code: status.as_u16(),
            code_message: code_message.into(),
            errors: self.errors,
            header: Header {
                api_version: API_VERSION,
                service: self.service.as_str(),
                parameters: self.parameters,
                client_name: billing.as_ref().and_then(|b| b.client_name.clone()),
                token_name: billing.as_ref().and_then(|b| b.token_name.clone()),
                billable: billing.as_ref().map(|b| b.billable),
                price: billing.as_ref().map(|b| format_price(b.price)),
                requested_at: format_timestamp(&self.requested_at),
                elapsed_time_in_milliseconds: billing.as_ref().map(|b| b.elapsed_ms),
                remote_ip: self.remote_ip,
                signature: billing.and_then(|b| b.signature),
            },
            data_count: self.data.len(),
            data: self.data,
            site_receipts: Vec::new(),
        }
    }

    pub fn respond(self, status: StatusCode, code_message: impl Into<String>) -> Response {
        self.build(status, code_message).into_response()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// ISO-8601 with milliseconds and the local offset, e.g. `2025-11-14T18:33:07.123-03:00`.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_price(price: Decimal) -> String {
    format!("{:.2}", price)
}

/// Which flavour of record row to emit.
#[derive(Debug, Clone, Copy)]
pub enum RowShape {
    /// Listing: includes the record id, no identity flags.
    Listing,
    /// Registration: id plus the stored identity flags.
    Registered,
    /// Validation: no id, identity flags and status computed for this call.
    Validated {
        nome_condutor_identico: bool,
        nome_mae_identico: bool,
    },
}

/// Maps a record to its response row; dates are always `dd/mm/yyyy`.
pub fn record_row(record: &LicenseRecord, shape: RowShape, situacao: &str) -> Value {
    let mut row = Map::new();

    if !matches!(shape, RowShape::Validated { .. }) {
        row.insert("id".into(), Value::from(record.id));
    }
    row.insert("categoria".into(), Value::from(record.categoria.clone()));
    row.insert("codigo_seguranca".into(), Value::from(record.codigo_seguranca.clone()));
    row.insert("cpf".into(), Value::from(record.cpf.clone()));
    row.insert(
        "emissao_data".into(),
        Value::from(record.emissao_data.format(OUTPUT_DATE_FORMAT).to_string()),
    );
    row.insert("espelho".into(), Value::from(record.espelho.clone()));
    row.insert("mae".into(), Value::from(record.mae.clone()));
    row.insert("nome".into(), Value::from(record.nome.clone()));

    let flags = match shape {
        RowShape::Listing => None,
        RowShape::Registered => Some((
            record.nome_condutor_identico_ao_informado,
            record.nome_mae_identico_ao_informado,
        )),
        RowShape::Validated {
            nome_condutor_identico,
            nome_mae_identico,
        } => Some((nome_condutor_identico, nome_mae_identico)),
    };
    if let Some((condutor, mae)) = flags {
        row.insert("nome_condutor_identico_ao_informado".into(), Value::from(condutor));
        row.insert("nome_mae_identico_ao_informado".into(), Value::from(mae));
    }

    row.insert("registro".into(), Value::from(record.registro.clone()));
    row.insert("situacao".into(), Value::from(situacao));
    row.insert(
        "validade_data".into(),
        Value::from(record.validade_data.format(OUTPUT_DATE_FORMAT).to_string()),
    );

    Value::Object(row)
}
