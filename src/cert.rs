use crate::error::AppResult;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::fmt::{Display, Formatter, Write as _};
use x509_certificate::{asn1time::Time, X509Certificate};

/// An X.509 certificate together with the exact DER bytes it was loaded
/// from. Two certificates are the same iff their DER encodings are
/// byte-identical, not merely the same subject/issuer.
#[derive(Clone, Debug)]
pub struct ParsedCertificate {
    der: Vec<u8>,
    cert: X509Certificate,
}

impl ParsedCertificate {
    pub fn from_der(der: Vec<u8>) -> AppResult<Self> {
        let cert = X509Certificate::from_der(&der)?;
        Ok(Self { der, cert })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject_common_name(&self) -> Option<String> {
        self.cert.subject_common_name()
    }

    /// Issuer distinguished name for display. Falls back to the issuer
    /// common name, then to a placeholder when the name is unreadable.
    pub fn issuer_name(&self) -> String {
        if let Ok((_, parsed)) = x509_parser::parse_x509_certificate(&self.der) {
            return parsed.issuer().to_string();
        }
        self.cert
            .issuer_common_name()
            .unwrap_or_else(|| "<unknown issuer>".to_string())
    }

    pub fn serial_number(&self) -> BigUint {
        let number = &self.cert.as_ref().tbs_certificate.serial_number;
        BigUint::from_bytes_be(number.as_slice())
    }

    pub fn not_before(&self) -> i64 {
        match &self.cert.as_ref().tbs_certificate.validity.not_before {
            Time::UtcTime(t) => t.timestamp(),
            Time::GeneralTime(t) => DateTime::<Utc>::from(t.clone()).timestamp(),
        }
    }

    pub fn not_after(&self) -> i64 {
        match &self.cert.as_ref().tbs_certificate.validity.not_after {
            Time::UtcTime(t) => t.timestamp(),
            Time::GeneralTime(t) => DateTime::<Utc>::from(t.clone()).timestamp(),
        }
    }

    pub fn sha256_fingerprint(&self) -> AppResult<Vec<u8>> {
        Ok(self.cert.sha256_fingerprint()?.as_ref().to_owned())
    }

    /// Whether this certificate may act as a CA, per the basic
    /// constraints extension. Absent extension means not a CA.
    pub fn is_ca(&self) -> bool {
        let Ok((_, parsed)) = x509_parser::parse_x509_certificate(&self.der) else {
            return false;
        };
        parsed
            .tbs_certificate
            .basic_constraints()
            .ok()
            .flatten()
            .map(|bc| bc.value.ca)
            .unwrap_or(false)
    }

    /// Default alias for sources that carry no natural alias: the
    /// subject common name when present, otherwise a fingerprint prefix.
    pub fn default_alias(&self) -> String {
        if let Some(cn) = self.subject_common_name() {
            let alias: String = cn
                .trim()
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                        c.to_ascii_lowercase()
                    } else {
                        '_'
                    }
                })
                .collect();
            if !alias.is_empty() {
                return alias;
            }
        }
        let fingerprint = self.sha256_fingerprint().unwrap_or_default();
        hex_string(&fingerprint[..fingerprint.len().min(8)])
    }

    /// Multi-line, indented summary used in warnings and prompts.
    pub fn summary(&self, indent: &str) -> String {
        let mut out = String::new();
        let subject = self
            .subject_common_name()
            .unwrap_or_else(|| "<unknown CN>".to_string());
        let _ = writeln!(out, "{indent}Subject: {subject}");
        let _ = writeln!(out, "{indent}Issuer: {}", self.issuer_name());
        let _ = writeln!(out, "{indent}Serial: {}", self.serial_number());
        let _ = writeln!(
            out,
            "{indent}Validity: {} ~ {}",
            format_timestamp(self.not_before()),
            format_timestamp(self.not_after()),
        );
        if let Ok(fingerprint) = self.sha256_fingerprint() {
            let _ = writeln!(
                out,
                "{indent}SHA-256 fingerprint: {}",
                STANDARD.encode(fingerprint)
            );
        }
        out.truncate(out.trim_end().len());
        out
    }
}

impl PartialEq for ParsedCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for ParsedCertificate {}

impl Display for ParsedCertificate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", STANDARD.encode(&self.der))
    }
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
