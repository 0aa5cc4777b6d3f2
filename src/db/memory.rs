use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::store::{CnhStore, StoreError, StoreResult};
use crate::models::{
    LicenseRecord, LicenseRequest, NewLicenseRecord, NewLicenseRequest, RecordFilter,
};

#[derive(Default)]
struct Inner {
    requests: Vec<LicenseRequest>,
    records: Vec<LicenseRecord>,
}

impl Inner {
    fn owner(&self, record: &LicenseRecord) -> Option<&LicenseRequest> {
        self.requests.iter().find(|r| r.id == record.cnh_request_id)
    }

    fn records_where<'a>(
        &'a self,
        pred: impl Fn(&LicenseRequest) -> bool + 'a,
    ) -> impl Iterator<Item = &'a LicenseRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| self.owner(record).map_or(false, &pred))
    }

    fn push_request(&mut self, data: NewLicenseRequest) -> LicenseRequest {
        let now = Utc::now();
        let request = LicenseRequest {
            id: self.requests.len() as i64 + 1,
            cpf: data.cpf,
            registro: data.registro,
            codigo_seguranca: data.codigo_seguranca,
            login_cpf: data.login_cpf,
            login_senha: data.login_senha_hash,
            nome_condutor: data.nome_condutor,
            nome_mae: data.nome_mae,
            client_name: Some(data.client_name),
            token_name: data.token_name,
            billable: data.billable,
            price: data.price,
            remote_ip: Some(data.remote_ip),
            elapsed_time_in_milliseconds: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.push(request.clone());
        request
    }
}

/// In-process store used when no database is configured, and by tests.
///
/// All writes go through a single lock, so the duplicate check inside
/// `create_license` and the insert happen atomically.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored request, oldest first.
    pub async fn requests(&self) -> Vec<LicenseRequest> {
        self.inner.read().await.requests.clone()
    }
}

#[async_trait]
impl CnhStore for MemoryStore {
    async fn search_records(&self, filter: &RecordFilter) -> StoreResult<Vec<LicenseRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records_where(|owner| filter.matches(&owner.cpf, &owner.registro))
            .cloned()
            .collect())
    }

    async fn find_record(&self, cpf: &str, registro: &str) -> StoreResult<Option<LicenseRecord>> {
        let inner = self.inner.read().await;
        let found = inner
            .records_where(|owner| owner.cpf == cpf && owner.registro == registro)
            .next()
            .cloned();
        Ok(found)
    }

    async fn cpf_taken(&self, cpf: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        let taken = inner.records_where(|owner| owner.cpf == cpf).next().is_some();
        Ok(taken)
    }

    async fn registro_taken(&self, registro: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        let taken = inner
            .records_where(|owner| owner.registro == registro)
            .next()
            .is_some();
        Ok(taken)
    }

    async fn create_license(
        &self,
        request: NewLicenseRequest,
        record: NewLicenseRecord,
    ) -> StoreResult<(LicenseRequest, LicenseRecord)> {
        let mut inner = self.inner.write().await;

        if inner.records.iter().any(|r| r.cpf == record.cpf) {
            return Err(StoreError::Duplicate { field: "cpf" });
        }
        if inner.records.iter().any(|r| r.registro == record.registro) {
            return Err(StoreError::Duplicate { field: "registro" });
        }

        let request = inner.push_request(request);
        let now = Utc::now();
        let record = LicenseRecord {
            id: inner.records.len() as i64 + 1,
            cnh_request_id: request.id,
            categoria: record.categoria,
            codigo_seguranca: record.codigo_seguranca,
            cpf: record.cpf,
            emissao_data: record.emissao_data,
            espelho: record.espelho,
            mae: record.mae,
            nome: record.nome,
            nome_condutor_identico_ao_informado: true,
            nome_mae_identico_ao_informado: true,
            registro: record.registro,
            situacao: record.situacao.as_str().to_string(),
            validade_data: record.validade_data,
            created_at: now,
            updated_at: now,
        };
        inner.records.push(record.clone());

        Ok((request, record))
    }

    async fn insert_request(&self, request: NewLicenseRequest) -> StoreResult<LicenseRequest> {
        let mut inner = self.inner.write().await;
        Ok(inner.push_request(request))
    }

    async fn record_elapsed(&self, request_id: i64, elapsed_ms: i32) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(request) = inner.requests.iter_mut().find(|r| r.id == request_id) {
            request.elapsed_time_in_milliseconds = Some(elapsed_ms);
            request.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn request_count(&self) -> StoreResult<i64> {
        Ok(self.inner.read().await.requests.len() as i64)
    }

    async fn record_count(&self) -> StoreResult<i64> {
        Ok(self.inner.read().await.records.len() as i64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::models::Situacao;

    fn new_request(cpf: &str, registro: &str) -> NewLicenseRequest {
        NewLicenseRequest {
            cpf: cpf.to_string(),
            registro: registro.to_string(),
            codigo_seguranca: "12345678901".to_string(),
            login_cpf: None,
            login_senha_hash: None,
            nome_condutor: Some("João da Silva".to_string()),
            nome_mae: Some("Maria da Silva".to_string()),
            client_name: "Sistema Cadastro".to_string(),
            token_name: Some("token".to_string()),
            billable: false,
            price: Decimal::ZERO,
            remote_ip: "127.0.0.1".to_string(),
        }
    }

    fn new_record(cpf: &str, registro: &str) -> NewLicenseRecord {
        NewLicenseRecord {
            categoria: "AB".to_string(),
            codigo_seguranca: "12345678901".to_string(),
            cpf: cpf.to_string(),
            emissao_data: NaiveDate::from_ymd_opt(2018, 6, 15).unwrap(),
            espelho: "9876543210".to_string(),
            mae: "Maria da Silva".to_string(),
            nome: "João da Silva".to_string(),
            registro: registro.to_string(),
            situacao: Situacao::Valida,
            validade_data: NaiveDate::from_ymd_opt(2028, 6, 15).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_links_record_to_request() {
        let store = MemoryStore::new();
        let (request, record) = store
            .create_license(new_request("1", "10"), new_record("1", "10"))
            .await
            .unwrap();

        assert_eq!(record.cnh_request_id, request.id);
        assert!(record.nome_condutor_identico_ao_informado);
        assert!(record.nome_mae_identico_ao_informado);
        assert_eq!(record.situacao, "válida");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_keys_without_writing() {
        let store = MemoryStore::new();
        store
            .create_license(new_request("1", "10"), new_record("1", "10"))
            .await
            .unwrap();

        let err = store
            .create_license(new_request("2", "10"), new_record("2", "10"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "registro" }));
        assert_eq!(store.request_count().await.unwrap(), 1);
        assert_eq!(store.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_audit_requests_do_not_own_records() {
        let store = MemoryStore::new();
        store.insert_request(new_request("1", "10")).await.unwrap();

        assert!(!store.cpf_taken("1").await.unwrap());
        assert!(store.find_record("1", "10").await.unwrap().is_none());
        assert_eq!(store.request_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_elapsed_backfills_request() {
        let store = MemoryStore::new();
        let request = store.insert_request(new_request("1", "10")).await.unwrap();
        store.record_elapsed(request.id, 42).await.unwrap();

        let requests = store.requests().await;
        assert_eq!(requests[0].elapsed_time_in_milliseconds, Some(42));
    }
}
