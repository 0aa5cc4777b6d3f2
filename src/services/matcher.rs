use crate::db::store::{CnhStore, StoreResult};
use crate::models::license_record::{LicenseRecord, RecordFilter, SITUACAO_INVALIDA};

pub const CPF_TAKEN: &str = "Já existe uma CNH cadastrada com este CPF.";
pub const REGISTRO_TAKEN: &str = "Já existe uma CNH cadastrada com este número de registro.";

pub const CODIGO_MISMATCH: &str = "Código de segurança não confere";
pub const NOME_CONDUTOR_MISMATCH: &str = "Nome do condutor não confere";
pub const NOME_MAE_MISMATCH: &str = "Nome da mãe não confere";

/// Identity fields submitted for validation.
#[derive(Debug, Clone, Default)]
pub struct IdentityClaim {
    pub codigo_seguranca: String,
    pub nome_condutor: Option<String>,
    pub nome_mae: Option<String>,
}

/// Field-by-field agreement between a claim and the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub codigo_seguranca_confere: bool,
    pub nome_condutor_identico: bool,
    pub nome_mae_identico: bool,
    pub errors: Vec<String>,
}

impl MatchReport {
    pub fn is_valid(&self) -> bool {
        self.codigo_seguranca_confere && self.nome_condutor_identico && self.nome_mae_identico
    }

    /// Stored status when valid, otherwise the response-only "inválida".
    pub fn situacao<'a>(&self, record: &'a LicenseRecord) -> &'a str {
        if self.is_valid() {
            &record.situacao
        } else {
            SITUACAO_INVALIDA
        }
    }
}

/// Uppercase after trimming surrounding whitespace.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// `None` when the caller gave nothing to compare, which counts as a match.
fn name_matches(stored: &str, submitted: Option<&str>) -> bool {
    match submitted.filter(|s| !s.trim().is_empty()) {
        Some(submitted) => normalize_name(stored) == normalize_name(submitted),
        None => true,
    }
}

/// Compares the claim against the stored record.
pub fn compare(record: &LicenseRecord, claim: &IdentityClaim) -> MatchReport {
    let mut errors = Vec::new();

    let codigo_seguranca_confere = record.codigo_seguranca == claim.codigo_seguranca;
    if !codigo_seguranca_confere {
        errors.push(CODIGO_MISMATCH.to_string());
    }

    let nome_condutor_identico = name_matches(&record.nome, claim.nome_condutor.as_deref());
    if !nome_condutor_identico {
        errors.push(NOME_CONDUTOR_MISMATCH.to_string());
    }

    let nome_mae_identico = name_matches(&record.mae, claim.nome_mae.as_deref());
    if !nome_mae_identico {
        errors.push(NOME_MAE_MISMATCH.to_string());
    }

    MatchReport {
        codigo_seguranca_confere,
        nome_condutor_identico,
        nome_mae_identico,
        errors,
    }
}

pub async fn search(store: &dyn CnhStore, filter: &RecordFilter) -> StoreResult<Vec<LicenseRecord>> {
    store.search_records(filter).await
}

/// Checks both keys independently; returns one message per key already in use.
pub async fn find_conflicts(
    store: &dyn CnhStore,
    cpf: &str,
    registro: &str,
) -> StoreResult<Vec<String>> {
    let mut conflicts = Vec::new();

    if store.cpf_taken(cpf).await? {
        conflicts.push(CPF_TAKEN.to_string());
    }
    if store.registro_taken(registro).await? {
        conflicts.push(REGISTRO_TAKEN.to_string());
    }

    Ok(conflicts)
}

pub async fn lookup(
    store: &dyn CnhStore,
    cpf: &str,
    registro: &str,
) -> StoreResult<Option<LicenseRecord>> {
    store.find_record(cpf, registro).await
}
