//! X.509 signing request translation.
//!
//! # Invariants
//! - Validity defaults to 30 days and is overridden by the caller's minute
//!   count only when it is strictly between 0 and the configured maximum.
//! - Extended key usage is sent only for client certificates.

use log::debug;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// URI path prefix of the X.509 signing endpoint.
pub const X509_CERTIFICATE_PATH: &str = "/sig/x509-cert/keys/";
/// Default certificate validity: 30 days, in seconds.
pub const DEFAULT_CERT_EXPIRE_SECS: u64 = 30 * 24 * 60 * 60;
/// Key usage label requesting a client-authentication certificate.
pub const CERT_USAGE_CLIENT: &str = "client";
/// `ExtKeyUsageClientAuth` code understood by the signer.
pub const EXT_KEY_USAGE_CLIENT_AUTH: u8 = 2;

/// Signing queue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Unspecified,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Numeric value sent on the wire.
    pub fn value(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::High => 5,
            Self::Medium => 10,
            Self::Low => 15,
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMeta {
    pub identifier: String,
}

/// Wire request for the X.509 signing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct X509SigningRequest {
    pub key_meta: KeyMeta,
    pub csr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_key_usage: Option<Vec<u8>>,
    /// Certificate validity in seconds.
    pub validity: u64,
    pub priority: Priority,
}

#[derive(Debug, Deserialize)]
struct X509CertificateResponse {
    cert: String,
}

#[derive(Debug)]
pub enum CertSignerError {
    Parse(serde_json::Error),
    EmptyCertificate,
}

impl Display for CertSignerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid signer response: {err}"),
            Self::EmptyCertificate => write!(f, "signer response carried an empty certificate"),
        }
    }
}

impl Error for CertSignerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::EmptyCertificate => None,
        }
    }
}

/// Signer key selection and expiry limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CertSignerConfig {
    pub default_key_id: String,
    #[serde(default)]
    pub provider_key_ids: BTreeMap<String, String>,
    pub max_cert_expiry_mins: u32,
}

/// Request/response translator for the HTTP signer.
pub struct HttpCertSigner {
    config: CertSignerConfig,
}

impl HttpCertSigner {
    pub fn new(config: CertSignerConfig) -> Self {
        Self { config }
    }

    /// Signing key for `provider`, falling back to the default key.
    pub fn provider_key_id(&self, provider: Option<&str>) -> &str {
        provider
            .filter(|provider| !provider.is_empty())
            .and_then(|provider| self.config.provider_key_ids.get(provider))
            .map(String::as_str)
            .unwrap_or(&self.config.default_key_id)
    }

    pub fn x509_cert_uri(&self, server_base_uri: &str, provider: Option<&str>) -> String {
        format!(
            "{server_base_uri}{X509_CERTIFICATE_PATH}{}",
            self.provider_key_id(provider)
        )
    }

    pub fn x509_signing_request(
        &self,
        provider: Option<&str>,
        csr: &str,
        key_usage: Option<&str>,
        expire_mins: i64,
        priority: Priority,
    ) -> X509SigningRequest {
        let ext_key_usage =
            (key_usage == Some(CERT_USAGE_CLIENT)).then(|| vec![EXT_KEY_USAGE_CLIENT_AUTH]);
        let max_mins = i64::from(self.config.max_cert_expiry_mins);
        let validity = if expire_mins > 0 && expire_mins < max_mins {
            expire_mins.unsigned_abs() * 60
        } else {
            DEFAULT_CERT_EXPIRE_SECS
        };

        let request = X509SigningRequest {
            key_meta: KeyMeta {
                identifier: self.provider_key_id(provider).to_string(),
            },
            csr: csr.to_string(),
            ext_key_usage,
            validity,
            priority,
        };
        debug!(
            "event=cert_sign_request module=cert status=ok key_id={} ext_key_usage={:?} validity_secs={} priority={}",
            request.key_meta.identifier,
            request.ext_key_usage,
            request.validity,
            priority.value()
        );
        request
    }

    /// Extracts the PEM certificate from a signer response body.
    pub fn parse_response(&self, body: &str) -> Result<String, CertSignerError> {
        let response: X509CertificateResponse =
            serde_json::from_str(body).map_err(CertSignerError::Parse)?;
        if response.cert.trim().is_empty() {
            return Err(CertSignerError::EmptyCertificate);
        }
        Ok(response.cert)
    }
}
