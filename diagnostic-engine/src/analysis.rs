//! Result types returned across the engine boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::risk::{RiskLevel, RiskProfile};
use crate::types::{AgeGroup, FindingSeverity, Modality, RiskCategory, Severity};

/// One scored disease hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisCandidate {
    pub disease_id: String,
    pub name: String,
    /// Matched canonical symptom ids, sorted
    pub matched_symptoms: Vec<String>,
    /// Weighted coverage in [0,1]
    pub match_score: f64,
    pub confidence: u8,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagingFinding {
    pub text: String,
    pub severity: FindingSeverity,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCode {
    /// Image classification failed or timed out; findings are empty
    AnalysisIncomplete,
}

/// Marker attached to a partial result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisNote {
    pub code: NoteCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,
}

impl AnalysisNote {
    pub fn analysis_incomplete(modality: Modality, message: impl Into<String>) -> Self {
        Self {
            code: NoteCode::AnalysisIncomplete,
            message: message.into(),
            modality: Some(modality),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomSummary {
    pub recognized: Vec<String>,
    pub body_systems: BTreeMap<String, usize>,
}

/// The unified, immutable output of one `infer` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub diagnosis: Option<DiagnosisCandidate>,
    pub differential: Vec<DiagnosisCandidate>,
    pub risk_profile: RiskProfile,
    pub risk_levels: BTreeMap<RiskCategory, RiskLevel>,
    pub findings: Vec<ImagingFinding>,
    pub recommendations: Vec<String>,
    pub overall_assessment: String,
    pub symptoms: SymptomSummary,
    pub age_group: Option<AgeGroup>,
    pub notes: Vec<AnalysisNote>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn has_note(&self, code: NoteCode) -> bool {
        self.notes.iter().any(|note| note.code == code)
    }

    /// False when any part of the analysis was downgraded
    pub fn is_complete(&self) -> bool {
        !self.has_note(NoteCode::AnalysisIncomplete)
    }
}
