//! Block explorer access
//!
//! [`ExplorerClient`] makes exactly one HTTP round trip per call. Retrying
//! and status interpretation belong to the verification coordinator.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::VerificationRequest;

/// Etherscan v2 unified endpoint; the chain is selected by `chainid`
pub const ETHERSCAN_V2_URL: &str = "https://api.etherscan.io/v2/api";

/// Result of looking up a contract's published ABI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiLookup {
    Verified(String),
    NotVerified,
}

/// Result of a source submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted; the explorer returned a GUID to poll
    Submitted(String),
    /// The explorer refused the payload
    Rejected(String),
    /// Network failure, server error or unreadable response
    TransientError(String),
}

#[async_trait]
pub trait ExplorerClient: Send + Sync {
    /// Published ABI for an address, if its source is already verified
    async fn fetch_abi(&self, address: Address) -> Result<AbiLookup>;

    /// Submit source for verification
    async fn submit_source(&self, request: &VerificationRequest) -> SubmitOutcome;

    /// Raw status text for a submission
    async fn check_status(&self, guid: &str) -> Result<String>;
}

/// `{status, message, result}` envelope shared by every Etherscan action
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl EtherscanResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    /// `result` as text; some errors put a non-string there
    fn result_text(&self) -> String {
        match &self.result {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => self.message.clone(),
            other => other.to_string(),
        }
    }
}

/// Etherscan-compatible explorer API client
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn new(api_key: impl Into<String>, chain_id: u64, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("An explorer API key is required"));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: ETHERSCAN_V2_URL.to_string(),
            api_key,
            chain_id,
        })
    }

    /// Point at a different Etherscan-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<EtherscanResponse> {
        let chain_id = self.chain_id.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("chainid", chain_id.as_str()), ("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| Error::explorer(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::explorer(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::explorer(format!("unreadable response: {}", e)))
    }
}

#[async_trait]
impl ExplorerClient for EtherscanClient {
    async fn fetch_abi(&self, address: Address) -> Result<AbiLookup> {
        let address = address.to_string();
        let response = self
            .get(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address.as_str()),
            ])
            .await?;

        if response.is_ok() {
            return Ok(AbiLookup::Verified(response.result_text()));
        }

        let text = response.result_text();
        if text.to_ascii_lowercase().contains("not verified") {
            Ok(AbiLookup::NotVerified)
        } else {
            Err(Error::explorer(text))
        }
    }

    async fn submit_source(&self, request: &VerificationRequest) -> SubmitOutcome {
        let address = request.contract_address.to_string();
        let optimization_used = if request.optimization_used { "1" } else { "0" };
        let runs = request.optimization_runs.to_string();
        let license = request.license.code().to_string();

        // `constructorArguements` is the explorer's own spelling
        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", request.source_text.as_str()),
            ("codeformat", request.code_format.as_str()),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            ("optimizationUsed", optimization_used),
            ("runs", runs.as_str()),
            ("constructorArguements", request.constructor_args.as_str()),
            ("licenseType", license.as_str()),
        ];

        let sent = self
            .http
            .post(&self.base_url)
            .query(&[("chainid", self.chain_id)])
            .form(&form)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return SubmitOutcome::TransientError(format!("request failed: {}", e)),
        };

        let status = response.status();
        // throttling and gateway timeouts say nothing about the payload
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            return SubmitOutcome::TransientError(format!("HTTP {}", status));
        }
        if !status.is_success() {
            return SubmitOutcome::Rejected(format!("HTTP {}", status));
        }

        let body: EtherscanResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return SubmitOutcome::TransientError(format!("unreadable response: {}", e)),
        };

        let text = body.result_text();
        if body.is_ok() {
            SubmitOutcome::Submitted(text)
        } else if text.to_ascii_lowercase().contains("rate limit") {
            SubmitOutcome::TransientError(text)
        } else {
            SubmitOutcome::Rejected(text)
        }
    }

    async fn check_status(&self, guid: &str) -> Result<String> {
        let response = self
            .get(&[
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .await?;

        // status "0" carries both "Pending in queue" and "Fail - ..."
        Ok(response.result_text())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::{CodeFormat, License};

    const VAULT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

    async fn client(server: &MockServer) -> EtherscanClient {
        EtherscanClient::new("TESTKEY", 11155111, Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("{}/v2/api/", server.uri()))
    }

    fn request() -> VerificationRequest {
        VerificationRequest {
            contract_address: VAULT,
            contract_name: "EducationVault".to_string(),
            source_text: "contract EducationVault {}".to_string(),
            code_format: CodeFormat::SoliditySingleFile,
            compiler_version: "v0.8.20+commit.a1b79de6".to_string(),
            optimization_used: true,
            optimization_runs: 200,
            constructor_args: "00ab".to_string(),
            license: License::Mit,
        }
    }

    fn envelope(status: &str, result: &str) -> ResponseTemplate {
        let message = if status == "1" { "OK" } else { "NOTOK" };
        ResponseTemplate::new(200).set_body_json(json!({
            "status": status,
            "message": message,
            "result": result,
        }))
    }

    #[test]
    fn test_missing_api_key() {
        let err = EtherscanClient::new("  ", 1, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_default_base_url() {
        let client = EtherscanClient::new("k", 1, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), ETHERSCAN_V2_URL);
    }

    #[tokio::test]
    async fn test_submit_sends_form_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/api"))
            .and(query_param("chainid", "11155111"))
            .and(body_string_contains("action=verifysourcecode"))
            .and(body_string_contains("constructorArguements=00ab"))
            .and(body_string_contains("optimizationUsed=1"))
            .and(body_string_contains("runs=200"))
            .and(body_string_contains("licenseType=3"))
            .and(body_string_contains("codeformat=solidity-single-file"))
            .respond_with(envelope("1", "G123"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).await.submit_source(&request()).await;
        assert_eq!(outcome, SubmitOutcome::Submitted("G123".to_string()));
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(envelope("0", "Fail - compiler version mismatch"))
            .mount(&server)
            .await;

        let outcome = client(&server).await.submit_source(&request()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected("Fail - compiler version mismatch".to_string())
        );
    }

    #[tokio::test]
    async fn test_submit_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let outcome = client(&server).await.submit_source(&request()).await;
        assert!(matches!(outcome, SubmitOutcome::TransientError(_)));
    }

    #[tokio::test]
    async fn test_submit_throttled_is_transient() {
        for code in [429u16, 408] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(code))
                .expect(1)
                .mount(&server)
                .await;

            let outcome = client(&server).await.submit_source(&request()).await;
            assert!(
                matches!(outcome, SubmitOutcome::TransientError(_)),
                "HTTP {} gave {:?}",
                code,
                outcome
            );
        }
    }

    #[tokio::test]
    async fn test_submit_client_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let outcome = client(&server).await.submit_source(&request()).await;
        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_submit_garbage_body_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let outcome = client(&server).await.submit_source(&request()).await;
        assert!(matches!(outcome, SubmitOutcome::TransientError(_)));
    }

    #[tokio::test]
    async fn test_submit_rate_limited_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(envelope("0", "Max rate limit reached"))
            .mount(&server)
            .await;

        let outcome = client(&server).await.submit_source(&request()).await;
        assert!(matches!(outcome, SubmitOutcome::TransientError(_)));
    }

    #[tokio::test]
    async fn test_fetch_abi_not_verified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getabi"))
            .respond_with(envelope("0", "Contract source code not verified"))
            .mount(&server)
            .await;

        let lookup = client(&server).await.fetch_abi(VAULT).await.unwrap();
        assert_eq!(lookup, AbiLookup::NotVerified);
    }

    #[tokio::test]
    async fn test_fetch_abi_verified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getabi"))
            .and(query_param("chainid", "11155111"))
            .respond_with(envelope("1", "[]"))
            .mount(&server)
            .await;

        let lookup = client(&server).await.fetch_abi(VAULT).await.unwrap();
        assert_eq!(lookup, AbiLookup::Verified("[]".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_abi_other_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(envelope("0", "Invalid API Key"))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch_abi(VAULT).await.unwrap_err();
        assert_eq!(err.code(), "EXPLORER_ERROR");
    }

    #[tokio::test]
    async fn test_check_status_returns_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "checkverifystatus"))
            .and(query_param("guid", "G123"))
            .respond_with(envelope("0", "Pending in queue"))
            .mount(&server)
            .await;

        let text = client(&server).await.check_status("G123").await.unwrap();
        assert_eq!(text, "Pending in queue");
    }

    #[tokio::test]
    async fn test_check_status_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).await.check_status("G123").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
