// crates/caseflow-providers/src/servicenow.rs
// ============================================================================
// Module: ServiceNow HTTP Client
// Description: Read-through case access, business-context/similar-case/KB
//              lookups, and CMDB/webhook-auth operations against a ServiceNow
//              instance's Table API.
// Purpose: The only crate in this workspace that knows ServiceNow's REST
//          field shapes; every other crate depends on the trait seams this
//          implements.
// Dependencies: caseflow-core, hmac, reqwest, serde_json, sha2
// ============================================================================

//! ## Overview
//! ServiceNow's Table API represents reference fields (company, assignment
//! group) either as a bare sys_id string or, with `sysparm_display_value`
//! variants, as `{"value": ..., "display_value": ...}`. [`extract_field`]
//! accepts both so this client does not need to pin down which display mode
//! the instance is configured with.

use std::collections::HashMap;

use caseflow_core::BusinessContextRepository;
use caseflow_core::Case;
use caseflow_core::CaseId;
use caseflow_core::CaseRepository;
use caseflow_core::CoreError;
use caseflow_core::KbArticle;
use caseflow_core::KnowledgeBaseRepository;
use caseflow_core::ServiceNowClient;
use caseflow_core::SimilarCase;
use caseflow_core::SimilarCaseRepository;
use hmac::Hmac;
use hmac::Mac;
use reqwest::Method;
use serde_json::Value;
use sha2::Sha256;

use crate::http_policy::HttpPolicyConfig;
use crate::http_policy::HttpPolicyError;
use crate::http_policy::PolicedHttpClient;

type HmacSha256 = Hmac<Sha256>;

const SOURCE: &str = "servicenow";

/// How inbound ServiceNow webhook requests are authenticated.
#[derive(Debug, Clone)]
pub enum ServiceNowAuth {
    /// A static bearer token compared against the `Authorization` header.
    Bearer(String),
    /// An HMAC-SHA256 signature over the raw body, compared against the
    /// `X-Sn-Signature` header (hex-encoded).
    Hmac {
        /// Shared signing secret.
        secret: String,
        /// Header the signature is carried in.
        header_name: String,
    },
}

/// Connection configuration for [`ServiceNowHttpClient`].
#[derive(Debug, Clone)]
pub struct ServiceNowHttpConfig {
    /// Instance base URL, e.g. `https://example.service-now.com`.
    pub base_url: String,
    /// Table holding cases (usually `"incident"` or a custom case table).
    pub case_table: String,
    /// Bearer token used for outbound API calls.
    pub api_token: String,
    /// How inbound webhook requests are authenticated.
    pub inbound_auth: ServiceNowAuth,
    /// Outbound request policy.
    pub http: HttpPolicyConfig,
}

/// A ServiceNow-backed implementation of every read-through case and
/// enrichment trait seam.
pub struct ServiceNowHttpClient {
    config: ServiceNowHttpConfig,
    http: PolicedHttpClient,
}

impl ServiceNowHttpClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    /// Returns [`CoreError::Transient`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: ServiceNowHttpConfig) -> Result<Self, CoreError> {
        let http = PolicedHttpClient::new(config.http.clone()).map_err(policy_error("client_init"))?;
        Ok(Self { config, http })
    }

    fn auth_header(&self) -> (&'static str, String) {
        ("authorization", format!("Bearer {}", self.config.api_token))
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        format!("{}/api/now/table/{table}?{query}", self.config.base_url.trim_end_matches('/'))
    }

    fn record_url(&self, sys_id: &str) -> String {
        format!(
            "{}/api/now/table/{}/{sys_id}",
            self.config.base_url.trim_end_matches('/'),
            self.config.case_table
        )
    }

    fn get_json(&self, url: &str) -> Result<Value, CoreError> {
        let (name, value) = self.auth_header();
        let response = self
            .http
            .execute(Method::GET, url, &[(name, value)], None)
            .map_err(policy_error("get"))?;
        parse_response(SOURCE, response.status, &response.body)
    }

    fn send_json(&self, method: Method, url: &str, body: &Value) -> Result<Value, CoreError> {
        let (name, value) = self.auth_header();
        let payload = serde_json::to_vec(body)
            .map_err(|err| invalid_response("failed to encode request body", err.to_string()))?;
        let response = self
            .http
            .execute(
                method,
                url,
                &[(name, value), ("content-type", "application/json".to_string())],
                Some(payload),
            )
            .map_err(policy_error("write"))?;
        parse_response(SOURCE, response.status, &response.body)
    }
}

impl CaseRepository for ServiceNowHttpClient {
    fn get_case(&self, id: &CaseId) -> Result<Case, CoreError> {
        let url = self.record_url(id.as_str());
        let body = self.get_json(&url)?;
        let record = body.get("result").unwrap_or(&body);
        case_from_record(id, record)
    }

    fn append_work_note(&self, id: &CaseId, note: &str) -> Result<(), CoreError> {
        let url = self.record_url(id.as_str());
        let body = serde_json::json!({ "work_notes": note });
        self.send_json(Method::PATCH, &url, &body)?;
        Ok(())
    }

    fn apply_classification(
        &self,
        id: &CaseId,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<(), CoreError> {
        let url = self.record_url(id.as_str());
        let mut body = serde_json::json!({ "category": category });
        if let Some(subcategory) = subcategory {
            body["subcategory"] = Value::String(subcategory.to_string());
        }
        self.send_json(Method::PATCH, &url, &body)?;
        Ok(())
    }
}

impl BusinessContextRepository for ServiceNowHttpClient {
    fn lookup(&self, company_or_account: &str) -> Result<Option<caseflow_core::BusinessContext>, CoreError> {
        let query = format!(
            "sysparm_query=name={}&sysparm_limit=1",
            urlencode(company_or_account)
        );
        let url = self.table_url("core_company", &query);
        let body = self.get_json(&url)?;
        let rows = body.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
        let Some(record) = rows.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(caseflow_core::BusinessContext {
            entity_name: extract_field(&record, "name").unwrap_or_else(|| company_or_account.to_string()),
            tier: extract_field(&record, "customer_tier"),
            compliance_sensitive: extract_field(&record, "compliance_sensitive")
                .is_some_and(|value| value == "true" || value == "1"),
            notes: extract_field(&record, "notes"),
        }))
    }
}

impl SimilarCaseRepository for ServiceNowHttpClient {
    fn find_similar(&self, case: &Case, limit: usize) -> Result<Vec<SimilarCase>, CoreError> {
        let query = format!(
            "sysparm_query=short_descriptionLIKE{}^stateIN6,7&sysparm_limit={limit}",
            urlencode(&case.short_description)
        );
        let url = self.table_url(&self.config.case_table, &query);
        let body = self.get_json(&url)?;
        let rows = body.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|record| SimilarCase {
                case_number: extract_field(&record, "number").unwrap_or_default(),
                short_description: extract_field(&record, "short_description").unwrap_or_default(),
                resolution_summary: extract_field(&record, "close_notes"),
                similarity: 0.0,
            })
            .collect())
    }
}

impl KnowledgeBaseRepository for ServiceNowHttpClient {
    fn search(&self, case: &Case, limit: usize) -> Result<Vec<KbArticle>, CoreError> {
        let query = format!(
            "sysparm_query=textLIKE{}^workflow_state=published&sysparm_limit={limit}",
            urlencode(&case.short_description)
        );
        let url = self.table_url("kb_knowledge", &query);
        let body = self.get_json(&url)?;
        let rows = body.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|record| KbArticle {
                article_id: extract_field(&record, "number").unwrap_or_default(),
                title: extract_field(&record, "short_description").unwrap_or_default(),
                excerpt: extract_field(&record, "text").map(|text| truncate(&text, 280)).unwrap_or_default(),
            })
            .collect())
    }
}

impl ServiceNowClient for ServiceNowHttpClient {
    fn lookup_configuration_item(&self, name: &str) -> Result<Value, CoreError> {
        let query = format!("sysparm_query=name={}&sysparm_limit=1", urlencode(name));
        let url = self.table_url("cmdb_ci", &query);
        let body = self.get_json(&url)?;
        let rows = body.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
        rows.into_iter().next().ok_or_else(|| CoreError::NotFound {
            entity: "configuration_item",
            id: name.to_string(),
        })
    }

    fn verify_request(&self, headers: &HashMap<String, String>, raw_body: &[u8]) -> Result<(), CoreError> {
        match &self.config.inbound_auth {
            ServiceNowAuth::Bearer(token) => {
                let expected = format!("Bearer {token}");
                let actual = header_value(headers, "authorization");
                if actual == Some(expected.as_str()) {
                    Ok(())
                } else {
                    Err(CoreError::Unauthorized(SOURCE))
                }
            }
            ServiceNowAuth::Hmac { secret, header_name } => {
                let signature = header_value(headers, header_name).ok_or(CoreError::Unauthorized(SOURCE))?;
                let provided = hex_decode(signature).ok_or(CoreError::Unauthorized(SOURCE))?;
                let mut mac =
                    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| CoreError::Unauthorized(SOURCE))?;
                mac.update(raw_body);
                mac.verify_slice(&provided).map_err(|_| CoreError::Unauthorized(SOURCE))
            }
        }
    }
}

fn case_from_record(id: &CaseId, record: &Value) -> Result<Case, CoreError> {
    let number = extract_field(record, "number").ok_or_else(|| invalid_response("missing number field", String::new()))?;
    let short_description = extract_field(record, "short_description").unwrap_or_default();
    Ok(Case {
        id: id.clone(),
        number,
        short_description,
        long_description: extract_field(record, "description"),
        priority: extract_field(record, "priority").and_then(|value| value.parse().ok()).unwrap_or(3),
        urgency: extract_field(record, "urgency").and_then(|value| value.parse().ok()).unwrap_or(3),
        company: extract_field(record, "company").unwrap_or_default(),
        assignment_group: extract_field(record, "assignment_group"),
        account: extract_field(record, "account"),
        current_category: extract_field(record, "category"),
    })
}

/// Reads a field that may be a bare string or a `{"value": ...}` reference
/// object, as ServiceNow represents reference fields depending on the
/// `sysparm_display_value` mode the caller requested.
fn extract_field(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(value) if value.is_empty() => None,
        Value::String(value) => Some(value.clone()),
        Value::Object(map) => map.get("value").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn parse_response(source: &'static str, status: u16, body: &[u8]) -> Result<Value, CoreError> {
    if status == 401 || status == 403 {
        return Err(CoreError::Unauthorized(source));
    }
    if status == 404 {
        return Err(CoreError::NotFound {
            entity: source,
            id: "unknown".to_string(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(CoreError::Transient {
            operation: source,
            detail: format!("unexpected status {status}"),
        });
    }
    serde_json::from_slice(body)
        .map_err(|err| invalid_response(&format!("{source} returned invalid JSON"), err.to_string()))
}

fn invalid_response(detail: &str, extra: String) -> CoreError {
    let detail = if extra.is_empty() {
        detail.to_string()
    } else {
        format!("{detail}: {extra}")
    };
    CoreError::InvalidResponse { source: SOURCE, detail }
}

fn policy_error(operation: &'static str) -> impl Fn(HttpPolicyError) -> CoreError {
    move |err| match err {
        HttpPolicyError::PolicyViolation(detail) => CoreError::InvalidResponse { source: SOURCE, detail },
        HttpPolicyError::RequestFailed(detail) => CoreError::Transient { operation, detail },
        HttpPolicyError::ResponseTooLarge => CoreError::Transient {
            operation,
            detail: "response exceeded size limit".to_string(),
        },
    }
}

fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn hex_decode(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(input.get(i..i + 2)?, 16).ok())
        .collect()
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_field_accepts_bare_string_and_reference_object() {
        let record = serde_json::json!({
            "number": "CS0012345",
            "company": { "value": "acme-sys-id", "display_value": "Acme" },
        });
        assert_eq!(extract_field(&record, "number"), Some("CS0012345".to_string()));
        assert_eq!(extract_field(&record, "company"), Some("acme-sys-id".to_string()));
        assert_eq!(extract_field(&record, "missing"), None);
    }

    #[test]
    fn bearer_auth_rejects_mismatched_token() {
        let config = ServiceNowHttpConfig {
            base_url: "https://example.service-now.com".to_string(),
            case_table: "incident".to_string(),
            api_token: "token".to_string(),
            inbound_auth: ServiceNowAuth::Bearer("expected".to_string()),
            http: HttpPolicyConfig::default(),
        };
        let client = ServiceNowHttpClient::new(config).expect("client builds");
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer wrong".to_string());
        assert!(client.verify_request(&headers, b"{}").is_err());
        headers.insert("Authorization".to_string(), "Bearer expected".to_string());
        assert!(client.verify_request(&headers, b"{}").is_ok());
    }

    #[test]
    fn hmac_auth_verifies_signature_over_raw_body() {
        let config = ServiceNowHttpConfig {
            base_url: "https://example.service-now.com".to_string(),
            case_table: "incident".to_string(),
            api_token: "token".to_string(),
            inbound_auth: ServiceNowAuth::Hmac {
                secret: "shh".to_string(),
                header_name: "x-sn-signature".to_string(),
            },
            http: HttpPolicyConfig::default(),
        };
        let client = ServiceNowHttpClient::new(config).expect("client builds");
        let body = b"{\"event\":\"created\"}";
        let mut mac = HmacSha256::new_from_slice(b"shh").expect("valid key length");
        mac.update(body);
        let signature = hex::encode_for_test(&mac.finalize().into_bytes());
        let mut headers = HashMap::new();
        headers.insert("X-Sn-Signature".to_string(), signature);
        assert!(client.verify_request(&headers, body).is_ok());
        headers.insert("X-Sn-Signature".to_string(), "00".repeat(32));
        assert!(client.verify_request(&headers, body).is_err());
    }

    mod hex {
        pub fn encode_for_test(bytes: &[u8]) -> String {
            bytes.iter().map(|byte| format!("{byte:02x}")).collect()
        }
    }
}
