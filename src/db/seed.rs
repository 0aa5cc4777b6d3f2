use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::store::CnhStore;
use crate::models::{NewLicenseRecord, NewLicenseRequest, Situacao};
use crate::services::password::SecretHasher;

struct DemoLicense {
    cpf: &'static str,
    registro: &'static str,
    codigo_seguranca: &'static str,
    login_senha: Option<&'static str>,
    nome: &'static str,
    mae: &'static str,
    client_name: &'static str,
    token_name: &'static str,
    billable: bool,
    remote_ip: &'static str,
    elapsed_ms: i32,
    categoria: &'static str,
    espelho: &'static str,
    emissao: (i32, u32, u32),
    validade: (i32, u32, u32),
}

const DEMO_LICENSES: &[DemoLicense] = &[
    DemoLicense {
        cpf: "123.456.789-01",
        registro: "11111111111",
        codigo_seguranca: "12345678901",
        login_senha: Some("senha123"),
        nome: "João da Silva",
        mae: "Maria da Silva",
        client_name: "Empresa Teste LTDA",
        token_name: "Token de Desenvolvimento",
        billable: true,
        remote_ip: "192.168.1.100",
        elapsed_ms: 1250,
        categoria: "AB",
        espelho: "9876543210",
        emissao: (2018, 6, 15),
        validade: (2028, 6, 15),
    },
    DemoLicense {
        cpf: "987.654.321-09",
        registro: "22222222222",
        codigo_seguranca: "98765432109",
        login_senha: None,
        nome: "Ana Paula Santos",
        mae: "Rita Santos",
        client_name: "Sistema RH",
        token_name: "Token Produção",
        billable: true,
        remote_ip: "10.0.0.50",
        elapsed_ms: 980,
        categoria: "B",
        espelho: "1234567890",
        emissao: (2020, 3, 20),
        validade: (2025, 3, 20),
    },
    DemoLicense {
        cpf: "111.222.333-44",
        registro: "33333333333",
        codigo_seguranca: "11122233344",
        login_senha: Some("senha456"),
        nome: "Carlos Eduardo Oliveira",
        mae: "Joana Oliveira",
        client_name: "Auto Escola Central",
        token_name: "Token Teste",
        billable: true,
        remote_ip: "172.16.0.10",
        elapsed_ms: 1500,
        categoria: "C",
        espelho: "5555555555",
        emissao: (2019, 11, 10),
        validade: (2024, 11, 10),
    },
    DemoLicense {
        cpf: "444.555.666-77",
        registro: "44444444444",
        codigo_seguranca: "44455566677",
        login_senha: None,
        nome: "Mariana Costa",
        mae: "Sandra Costa",
        client_name: "Transportadora XYZ",
        token_name: "Token API",
        billable: false,
        remote_ip: "192.168.0.200",
        elapsed_ms: 850,
        categoria: "D",
        espelho: "7777777777",
        emissao: (2017, 8, 5),
        validade: (2027, 8, 5),
    },
    DemoLicense {
        cpf: "555.666.777-88",
        registro: "55555555555",
        codigo_seguranca: "55566677788",
        login_senha: Some("senha789"),
        nome: "Pedro Henrique Alves",
        mae: "Lucia Alves",
        client_name: "Consultas Online",
        token_name: "Token Homologação",
        billable: true,
        remote_ip: "10.10.10.10",
        elapsed_ms: 1100,
        categoria: "E",
        espelho: "8888888888",
        emissao: (2021, 1, 15),
        validade: (2026, 1, 15),
    },
    DemoLicense {
        cpf: "666.777.888-99",
        registro: "66666666666",
        codigo_seguranca: "66677788899",
        login_senha: None,
        nome: "Fernanda Lima",
        mae: "Patricia Lima",
        client_name: "App Validação",
        token_name: "Token Mobile",
        billable: true,
        remote_ip: "200.150.100.50",
        elapsed_ms: 920,
        categoria: "A",
        espelho: "3333333333",
        emissao: (2022, 5, 10),
        validade: (2027, 5, 10),
    },
];

fn date((year, month, day): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Inserts the demo licenses when the store has no records yet.
///
/// Returns how many licenses were created.
pub async fn seed_demo_data(store: &dyn CnhStore, hasher: &dyn SecretHasher) -> anyhow::Result<usize> {
    if store.record_count().await? > 0 {
        tracing::info!("Store already has licenses, skipping demo seed");
        return Ok(0);
    }

    for demo in DEMO_LICENSES {
        let login_senha_hash = demo.login_senha.map(|s| hasher.hash(s)).transpose()?;

        let request = NewLicenseRequest {
            cpf: demo.cpf.to_string(),
            registro: demo.registro.to_string(),
            codigo_seguranca: demo.codigo_seguranca.to_string(),
            login_cpf: demo.login_senha.map(|_| demo.cpf.to_string()),
            login_senha_hash,
            nome_condutor: Some(demo.nome.to_string()),
            nome_mae: Some(demo.mae.to_string()),
            client_name: demo.client_name.to_string(),
            token_name: Some(demo.token_name.to_string()),
            billable: demo.billable,
            price: if demo.billable { Decimal::new(24, 2) } else { Decimal::ZERO },
            remote_ip: demo.remote_ip.to_string(),
        };
        let record = NewLicenseRecord {
            categoria: demo.categoria.to_string(),
            codigo_seguranca: demo.codigo_seguranca.to_string(),
            cpf: demo.cpf.to_string(),
            emissao_data: date(demo.emissao),
            espelho: demo.espelho.to_string(),
            mae: demo.mae.to_string(),
            nome: demo.nome.to_string(),
            registro: demo.registro.to_string(),
            situacao: Situacao::Valida,
            validade_data: date(demo.validade),
        };

        let (request, _) = store.create_license(request, record).await?;
        store.record_elapsed(request.id, demo.elapsed_ms).await?;
    }

    tracing::info!(count = DEMO_LICENSES.len(), "Demo licenses seeded");

    Ok(DEMO_LICENSES.len())
}

/// Number of demo licenses available for seeding.
pub fn demo_license_count() -> usize {
    DEMO_LICENSES.len()
}
