//! Declarative field validation.
//!
//! A rule set maps each field name to an ordered list of [`Rule`]s. Every
//! field is checked and every failure produces one message, so a caller sees
//! all problems with the input in a single response.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::models::license_record::{Situacao, CATEGORIAS};

/// Input date format, e.g. `15/03/2020`.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Value must be present and not blank.
    Required,
    /// Blank values are accepted; only documents intent.
    Nullable,
    /// Value must be a JSON string.
    String,
    /// Value must be a calendar date that formats back to itself under the pattern.
    DateFormat(&'static str),
    /// Value must be exactly one of the listed strings.
    In(&'static [&'static str]),
    /// String value may hold at most this many characters.
    Max(usize),
}

/// Width of the plain `VARCHAR` columns.
const TEXT_MAX: usize = 255;

pub type RuleSet = &'static [(&'static str, &'static [Rule])];

pub const SEARCH_RULES: RuleSet = &[
    ("token", &[Rule::Nullable, Rule::String]),
    ("cpf", &[Rule::Nullable, Rule::String]),
    ("registro", &[Rule::Nullable, Rule::String]),
];

pub const CREATE_RULES: RuleSet = &[
    ("token", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("cpf", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("registro", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("codigo_seguranca", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("nome_condutor", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("nome_mae", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("categoria", &[Rule::Required, Rule::String, Rule::In(CATEGORIAS)]),
    ("emissao_data", &[Rule::Required, Rule::DateFormat(DATE_FORMAT)]),
    ("validade_data", &[Rule::Required, Rule::DateFormat(DATE_FORMAT)]),
    ("espelho", &[Rule::Required, Rule::String, Rule::Max(20)]),
    ("situacao", &[Rule::Required, Rule::String, Rule::In(Situacao::ALL)]),
    ("login_cpf", &[Rule::Nullable, Rule::String, Rule::Max(TEXT_MAX)]),
    ("login_senha", &[Rule::Nullable, Rule::String]),
];

pub const VALIDATE_RULES: RuleSet = &[
    ("token", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("cpf", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("registro", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("codigo_seguranca", &[Rule::Required, Rule::String, Rule::Max(TEXT_MAX)]),
    ("nome_condutor", &[Rule::Nullable, Rule::String, Rule::Max(TEXT_MAX)]),
    ("nome_mae", &[Rule::Nullable, Rule::String, Rule::Max(TEXT_MAX)]),
    ("login_cpf", &[Rule::Nullable, Rule::String, Rule::Max(TEXT_MAX)]),
    ("login_senha", &[Rule::Nullable, Rule::String]),
    ("pkcs12_cert", &[Rule::Nullable, Rule::String]),
    ("pkcs12_pass", &[Rule::Nullable, Rule::String]),
];

/// Missing, null, or a whitespace-only string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Returns one message per failing rule; empty means valid.
pub fn validate(input: &Map<String, Value>, rules: RuleSet) -> Vec<String> {
    let mut errors = Vec::new();

    for (field, field_rules) in rules {
        let value = input.get(*field);

        if is_blank(value) {
            if field_rules.iter().any(|r| matches!(r, Rule::Required)) {
                errors.push(format!("O campo {} é obrigatório.", field));
            }
            continue;
        }

        let Some(value) = value else { continue };
        for rule in field_rules.iter() {
            if let Some(message) = check(field, value, rule) {
                errors.push(message);
            }
        }
    }

    errors
}

fn check(field: &str, value: &Value, rule: &Rule) -> Option<String> {
    match rule {
        Rule::Required | Rule::Nullable => None,
        Rule::String => match value {
            Value::String(_) => None,
            _ => Some(format!("O campo {} deve ser uma string.", field)),
        },
        Rule::DateFormat(format) => match value.as_str() {
            Some(s) if parse_date(s, format).is_some() => None,
            _ => Some(format!(
                "O campo {} não corresponde ao formato dd/mm/aaaa.",
                field
            )),
        },
        Rule::In(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => None,
            _ => Some(format!("O campo {} selecionado é inválido.", field)),
        },
        Rule::Max(max) => match value.as_str() {
            Some(s) if s.chars().count() > *max => Some(format!(
                "O campo {} não pode ser superior a {} caracteres.",
                field, max
            )),
            _ => None,
        },
    }
}

/// Strict parse: the date must exist and re-format to the exact input.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, format).ok()?;
    (date.format(format).to_string() == value).then_some(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn valid_create() -> Map<String, Value> {
        object(json!({
            "token": "abc",
            "cpf": "123.456.789-01",
            "registro": "11111111111",
            "codigo_seguranca": "12345678901",
            "nome_condutor": "João da Silva",
            "nome_mae": "Maria da Silva",
            "categoria": "AB",
            "emissao_data": "15/06/2018",
            "validade_data": "15/06/2028",
            "espelho": "9876543210",
            "situacao": "válida"
        }))
    }

    #[test]
    fn test_valid_create_payload_passes() {
        assert!(validate(&valid_create(), CREATE_RULES).is_empty());
    }

    #[test]
    fn test_every_missing_required_field_is_reported() {
        let errors = validate(&Map::new(), VALIDATE_RULES);

        assert_eq!(
            errors,
            vec![
                "O campo token é obrigatório.",
                "O campo cpf é obrigatório.",
                "O campo registro é obrigatório.",
                "O campo codigo_seguranca é obrigatório.",
            ]
        );
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let mut input = valid_create();
        input.insert("cpf".into(), json!("   "));
        input.insert("registro".into(), Value::Null);

        let errors = validate(&input, CREATE_RULES);
        assert_eq!(
            errors,
            vec!["O campo cpf é obrigatório.", "O campo registro é obrigatório."]
        );
    }

    #[test]
    fn test_date_format_is_strict() {
        assert!(parse_date("15/03/2020", DATE_FORMAT).is_some());
        assert!(parse_date("31/02/2020", DATE_FORMAT).is_none());
        assert!(parse_date("2020-03-15", DATE_FORMAT).is_none());
        assert!(parse_date("5/3/2020", DATE_FORMAT).is_none());
        assert!(parse_date("15/03/20", DATE_FORMAT).is_none());

        let mut input = valid_create();
        input.insert("emissao_data".into(), json!("2018-06-15"));
        assert_eq!(
            validate(&input, CREATE_RULES),
            vec!["O campo emissao_data não corresponde ao formato dd/mm/aaaa."]
        );
    }

    #[test]
    fn test_enumerations_are_case_sensitive() {
        let mut input = valid_create();
        input.insert("situacao".into(), json!("Válida"));
        input.insert("categoria".into(), json!("ab"));

        assert_eq!(
            validate(&input, CREATE_RULES),
            vec![
                "O campo categoria selecionado é inválido.",
                "O campo situacao selecionado é inválido.",
            ]
        );
    }

    #[test]
    fn test_all_failing_rules_on_a_field_are_reported() {
        let mut input = valid_create();
        input.insert("situacao".into(), json!(1));

        assert_eq!(
            validate(&input, CREATE_RULES),
            vec![
                "O campo situacao deve ser uma string.",
                "O campo situacao selecionado é inválido.",
            ]
        );
    }

    #[test]
    fn test_lengths_are_counted_in_characters() {
        let mut input = valid_create();
        input.insert("espelho".into(), json!("1".repeat(21)));
        input.insert("nome_mae".into(), json!("é".repeat(255)));

        assert_eq!(
            validate(&input, CREATE_RULES),
            vec!["O campo espelho não pode ser superior a 20 caracteres."]
        );

        input.insert("espelho".into(), json!("1".repeat(20)));
        input.insert("nome_mae".into(), json!("é".repeat(256)));
        assert_eq!(
            validate(&input, CREATE_RULES),
            vec!["O campo nome_mae não pode ser superior a 255 caracteres."]
        );
    }

    #[test]
    fn test_optional_fields_still_type_checked() {
        let input = object(json!({ "cpf": 12345678901u64 }));

        assert_eq!(
            validate(&input, SEARCH_RULES),
            vec!["O campo cpf deve ser uma string."]
        );
        assert!(validate(&Map::new(), SEARCH_RULES).is_empty());
    }
}
