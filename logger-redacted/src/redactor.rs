use regex::Regex;
use lazy_static::lazy_static;
use sha2::{Sha256, Digest};
use base64::{Engine as _, engine::general_purpose};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap();
    static ref SSN_REGEX: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();
    static ref MRN_REGEX: Regex = Regex::new(r"(?i)\bMRN[:#\s-]*\d{4,}\b").unwrap();
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_ssn: bool,
    pub redact_mrn: bool,
    pub hash_for_correlation: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_ssn: true,
            redact_mrn: true,
            hash_for_correlation: true,
        }
    }
}

/// Redacts identifiers from free text before it is written to logs.
///
/// Clinical free text (symptom descriptions, medical history) is never
/// logged verbatim; callers log [`PiiRedactor::fingerprint`] instead and
/// only pass short, non-clinical strings through [`PiiRedactor::redact`].
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_mrn {
            result = self.replace(&MRN_REGEX, &result, "MRN", "MRN[REDACTED]");
        }

        if self.config.redact_emails {
            result = self.replace(&EMAIL_REGEX, &result, "EMAIL", "***@***");
        }

        if self.config.redact_ssn {
            result = self.replace(&SSN_REGEX, &result, "SSN", "***-**-****");
        }

        if self.config.redact_phones {
            result = self.replace(&PHONE_REGEX, &result, "PHONE", "(***) ***-****");
        }

        result
    }

    /// Stable, non-reversible correlation token for a piece of free text
    pub fn fingerprint(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return "empty".to_string();
        }
        self.hash_value(text)
    }

    fn replace(&self, pattern: &Regex, text: &str, label: &str, mask: &str) -> String {
        pattern.replace_all(text, |caps: &regex::Captures| {
            if self.config.hash_for_correlation {
                let matched = caps.get(0).map_or("", |m| m.as_str());
                format!("{}[{}]", label, self.hash_value(matched))
            } else {
                mask.to_string()
            }
        }).to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD_NO_PAD.encode(result.get(..8).unwrap_or(result.as_slice()))
    }
}
