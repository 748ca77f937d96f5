use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Patient gender as supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "unknown" | "" => Ok(Gender::Unknown),
            other => Err(format!("unrecognized gender '{}'", other)),
        }
    }
}

/// Age band used for age-specific recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Youth,
    Adult,
    Senior,
}

impl AgeGroup {
    pub fn from_age(age: u32) -> Self {
        if age >= 65 {
            AgeGroup::Senior
        } else if age >= 18 {
            AgeGroup::Adult
        } else {
            AgeGroup::Youth
        }
    }
}

/// Clinical severity of a diagnosis candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// One step more serious, saturating at `Severe`
    pub fn escalate(self) -> Self {
        match self {
            Severity::Mild => Severity::Moderate,
            Severity::Moderate | Severity::Severe => Severity::Severe,
        }
    }
}

/// Severity attached to an imaging finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Normal,
    Warning,
    Critical,
}

impl FindingSeverity {
    /// Parse a classifier label; anything unrecognized is `Normal`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "severe" | "urgent" => FindingSeverity::Critical,
            "warning" | "abnormal" | "moderate" => FindingSeverity::Warning,
            _ => FindingSeverity::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSeverity::Normal => "normal",
            FindingSeverity::Warning => "warning",
            FindingSeverity::Critical => "critical",
        }
    }
}

/// Fixed set of chronic-condition risk categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Cardiovascular,
    Diabetes,
    Hypertension,
    Obesity,
    MentalHealth,
    Respiratory,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 6] = [
        RiskCategory::Cardiovascular,
        RiskCategory::Diabetes,
        RiskCategory::Hypertension,
        RiskCategory::Obesity,
        RiskCategory::MentalHealth,
        RiskCategory::Respiratory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Cardiovascular => "cardiovascular",
            RiskCategory::Diabetes => "diabetes",
            RiskCategory::Hypertension => "hypertension",
            RiskCategory::Obesity => "obesity",
            RiskCategory::MentalHealth => "mental_health",
            RiskCategory::Respiratory => "respiratory",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Imaging technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[serde(alias = "x-ray")]
    Xray,
    Ct,
    Mri,
    Ultrasound,
}

impl Modality {
    pub const ALL: [Modality; 4] = [Modality::Xray, Modality::Ct, Modality::Mri, Modality::Ultrasound];

    /// Parse a caller-supplied tag; unrecognized tags fall back to X-ray
    pub fn parse_lenient(tag: &str) -> Self {
        match tag
            .trim()
            .to_lowercase()
            .replace(|c: char| c == '-' || c == '_' || c.is_whitespace(), "")
            .as_str() {
            "ct" | "ctscan" | "cat" => Modality::Ct,
            "mri" | "mr" => Modality::Mri,
            "ultrasound" | "us" | "sonography" => Modality::Ultrasound,
            _ => Modality::Xray,
        }
    }

    /// Guess the modality from an uploaded file name
    pub fn from_filename(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("xray") || name.contains("x-ray") || name.contains("chest") {
            Modality::Xray
        } else if name.contains("ct") || name.contains("scan") {
            Modality::Ct
        } else if name.contains("mri") {
            Modality::Mri
        } else if name.contains("ultrasound") {
            Modality::Ultrasound
        } else {
            Modality::Xray
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Xray => "xray",
            Modality::Ct => "ct",
            Modality::Mri => "mri",
            Modality::Ultrasound => "ultrasound",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prior conditions, either as free text or as a list of tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MedicalHistory {
    Text(String),
    Tags(Vec<String>),
}

impl MedicalHistory {
    /// Flatten to one searchable string
    pub fn as_text(&self) -> String {
        match self {
            MedicalHistory::Text(text) => text.clone(),
            MedicalHistory::Tags(tags) => tags.join(", "),
        }
    }
}

impl Default for MedicalHistory {
    fn default() -> Self {
        MedicalHistory::Tags(Vec::new())
    }
}

/// Caller-supplied patient attributes; immutable for the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub medical_history: Option<MedicalHistory>,
}

impl PatientProfile {
    pub fn age_group(&self) -> Option<AgeGroup> {
        self.age.map(AgeGroup::from_age)
    }

    pub fn history_text(&self) -> String {
        self.medical_history
            .as_ref()
            .map(MedicalHistory::as_text)
            .unwrap_or_default()
    }
}

/// Opaque reference to an uploaded image; the engine never decodes it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl ImageHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Image attached to an inference request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    #[serde(default)]
    pub modality: Option<String>,
    pub handle: ImageHandle,
    #[serde(default)]
    pub filename: Option<String>,
}

impl ImageInput {
    pub fn new(modality: Modality, handle: impl Into<String>) -> Self {
        Self {
            modality: Some(modality.as_str().to_string()),
            handle: ImageHandle::new(handle),
            filename: None,
        }
    }

    /// Explicit tag first, then the file name, then X-ray
    pub fn resolved_modality(&self) -> Modality {
        match (&self.modality, &self.filename) {
            (Some(tag), _) => Modality::parse_lenient(tag),
            (None, Some(name)) => Modality::from_filename(name),
            (None, None) => Modality::Xray,
        }
    }
}

/// Input to [`crate::DiagnosticService::infer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    #[serde(default)]
    pub patient_profile: PatientProfile,
    #[serde(default)]
    pub symptom_text: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInput>,
}

impl InferenceRequest {
    pub fn new(patient_profile: PatientProfile) -> Self {
        Self {
            patient_profile,
            symptom_text: None,
            image: None,
        }
    }

    pub fn with_symptoms(mut self, text: impl Into<String>) -> Self {
        self.symptom_text = Some(text.into());
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    /// Parse a JSON request; shape errors are `InvalidInput`
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::InvalidInput {
            field: "request".to_string(),
            reason: e.to_string(),
        })
    }

    /// Reject malformed input before any component runs
    pub fn validate(&self, config: &EngineConfig) -> EngineResult<()> {
        if let Some(age) = self.patient_profile.age {
            if age > config.max_age {
                return Err(EngineError::InvalidInput {
                    field: "patientProfile.age".to_string(),
                    reason: format!("age {} exceeds maximum of {}", age, config.max_age),
                });
            }
        }

        if let Some(text) = &self.symptom_text {
            if text.chars().count() > config.max_symptom_text_len {
                return Err(EngineError::InvalidInput {
                    field: "symptomText".to_string(),
                    reason: format!(
                        "symptom text exceeds {} characters",
                        config.max_symptom_text_len
                    ),
                });
            }
        }

        if let Some(image) = &self.image {
            if image.handle.is_empty() {
                return Err(EngineError::InvalidInput {
                    field: "image.handle".to_string(),
                    reason: "image handle is empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
