//! Static reference data for the inference engine
//!
//! Holds the symptom vocabulary, weighted disease profiles, per-category
//! risk parameters and the imaging finding templates per modality. The
//! knowledge base is loaded and validated once at start-up and shared
//! read-only as `Arc<KnowledgeBase>`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::matcher::normalize_text;
use crate::types::{FindingSeverity, Modality, RiskCategory, Severity};

const EMBEDDED_KNOWLEDGE_BASE: &str = include_str!("../data/knowledge_base.yaml");

/// Vocabulary entry for one canonical symptom
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomEntry {
    pub id: String,
    /// Body system, e.g. respiratory or gastrointestinal
    pub system: String,
    pub aliases: Vec<String>,
}

/// Weighted symptom associations and recommendations for one disease
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseProfile {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub symptoms: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Per-severity lists that replace `recommendations` for that severity
    #[serde(default)]
    pub severity_recommendations: BTreeMap<Severity, Vec<String>>,
}

impl DiseaseProfile {
    pub fn total_weight(&self) -> f64 {
        self.symptoms.values().sum()
    }

    /// Recommendations for a candidate at `severity`, after any escalation
    pub fn recommendations_for(&self, severity: Severity) -> &[String] {
        self.severity_recommendations
            .get(&severity)
            .map(Vec::as_slice)
            .unwrap_or(&self.recommendations)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeBracket {
    pub min_age: u32,
    pub multiplier: f64,
}

/// Scoring parameters for one risk category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCategoryProfile {
    pub base_rate: f64,
    #[serde(default)]
    pub age_brackets: Vec<AgeBracket>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub symptom_bonus: f64,
    #[serde(default)]
    pub symptom_cap: f64,
    #[serde(default)]
    pub history_keywords: Vec<String>,
    #[serde(default)]
    pub history_bonus: f64,
    #[serde(default)]
    pub history_cap: f64,
    pub recommendation: String,
}

impl RiskCategoryProfile {
    /// Multiplier of the highest bracket the age reaches; 1.0 otherwise
    pub fn age_multiplier(&self, age: Option<u32>) -> f64 {
        let Some(age) = age else {
            return 1.0;
        };
        self.age_brackets
            .iter()
            .filter(|bracket| age >= bracket.min_age)
            .max_by_key(|bracket| bracket.min_age)
            .map(|bracket| bracket.multiplier)
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingTemplate {
    pub text: String,
    pub severity: FindingSeverity,
    pub confidence: f64,
    #[serde(default)]
    pub follow_up: Option<String>,
}

/// Named set of findings a classifier may report together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingProfile {
    pub name: String,
    pub findings: Vec<FindingTemplate>,
}

/// On-disk representation
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnowledgeBaseDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    severity_intensifiers: Vec<String>,
    symptoms: Vec<SymptomEntry>,
    diseases: Vec<DiseaseProfile>,
    risk_categories: BTreeMap<RiskCategory, RiskCategoryProfile>,
    imaging: BTreeMap<Modality, Vec<FindingProfile>>,
}

/// Alias normalized for matching, pointing back at its symptom
#[derive(Debug, Clone)]
pub struct AliasEntry {
    pub phrase: String,
    pub symptom_id: String,
    pub multi_word: bool,
}

/// Validated, immutable reference data
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    version: String,
    severity_intensifiers: Vec<String>,
    symptoms: BTreeMap<String, SymptomEntry>,
    aliases: Vec<AliasEntry>,
    diseases: Vec<DiseaseProfile>,
    risk_categories: BTreeMap<RiskCategory, RiskCategoryProfile>,
    imaging: BTreeMap<Modality, Vec<FindingProfile>>,
}

impl KnowledgeBase {
    /// The knowledge base compiled into the binary
    pub fn embedded() -> EngineResult<Self> {
        Self::from_yaml_str(EMBEDDED_KNOWLEDGE_BASE)
    }

    pub fn from_yaml_str(raw: &str) -> EngineResult<Self> {
        let document: KnowledgeBaseDocument = serde_yaml::from_str(raw)?;
        Self::from_document(document)
    }

    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let document: KnowledgeBaseDocument = serde_json::from_str(raw).map_err(|e| {
            EngineError::KnowledgeBaseUnavailable(format!("unreadable knowledge base: {}", e))
        })?;
        Self::from_document(document)
    }

    /// Load from a `.json` file or, for any other extension, YAML
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::KnowledgeBaseUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let kb = if is_json {
            Self::from_json_str(&raw)?
        } else {
            Self::from_yaml_str(&raw)?
        };

        info!(path = %path.display(), version = %kb.version, "Loaded knowledge base");
        Ok(kb)
    }

    /// Load the configured file, or the embedded default when none is set
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::embedded(),
        }
    }

    fn from_document(document: KnowledgeBaseDocument) -> EngineResult<Self> {
        validate_document(&document)?;

        let mut aliases = Vec::new();
        for symptom in &document.symptoms {
            for alias in &symptom.aliases {
                let phrase = normalize_text(alias);
                let multi_word = phrase.contains(' ');
                aliases.push(AliasEntry {
                    phrase,
                    symptom_id: symptom.id.clone(),
                    multi_word,
                });
            }
        }

        let mut diseases = document.diseases;
        diseases.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self {
            version: document.version.unwrap_or_else(|| "unversioned".to_string()),
            severity_intensifiers: document
                .severity_intensifiers
                .iter()
                .map(|word| normalize_text(word))
                .collect(),
            symptoms: document
                .symptoms
                .into_iter()
                .map(|symptom| (symptom.id.clone(), symptom))
                .collect(),
            aliases,
            diseases,
            risk_categories: document.risk_categories,
            imaging: document.imaging,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn symptoms(&self) -> impl Iterator<Item = &SymptomEntry> {
        self.symptoms.values()
    }

    pub fn symptom(&self, id: &str) -> Option<&SymptomEntry> {
        self.symptoms.get(id)
    }

    pub fn aliases(&self) -> &[AliasEntry] {
        &self.aliases
    }

    pub fn severity_intensifiers(&self) -> &[String] {
        &self.severity_intensifiers
    }

    /// Disease profiles ordered by id
    pub fn diseases(&self) -> &[DiseaseProfile] {
        &self.diseases
    }

    pub fn disease(&self, id: &str) -> Option<&DiseaseProfile> {
        self.diseases.iter().find(|disease| disease.id == id)
    }

    pub fn risk_category(&self, category: RiskCategory) -> EngineResult<&RiskCategoryProfile> {
        self.risk_categories.get(&category).ok_or_else(|| {
            EngineError::Internal(format!("risk category {} missing from knowledge base", category))
        })
    }

    /// Finding profiles registered for a modality
    pub fn finding_profiles(&self, modality: Modality) -> &[FindingProfile] {
        self.imaging.get(&modality).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Template whose text matches a reported finding, ignoring case
    pub fn finding_template(&self, modality: Modality, text: &str) -> Option<&FindingTemplate> {
        let wanted = normalize_text(text);
        self.finding_profiles(modality)
            .iter()
            .flat_map(|profile| profile.findings.iter())
            .find(|template| normalize_text(&template.text) == wanted)
    }
}

fn unavailable(reason: impl Into<String>) -> EngineError {
    EngineError::KnowledgeBaseUnavailable(reason.into())
}

fn validate_document(document: &KnowledgeBaseDocument) -> EngineResult<()> {
    if document.symptoms.is_empty() {
        return Err(unavailable("symptom vocabulary is empty"));
    }

    let mut symptom_ids = HashSet::new();
    let mut seen_aliases = HashSet::new();
    for symptom in &document.symptoms {
        if !symptom_ids.insert(symptom.id.as_str()) {
            return Err(unavailable(format!("duplicate symptom id '{}'", symptom.id)));
        }
        if symptom.aliases.is_empty() {
            return Err(unavailable(format!("symptom '{}' has no aliases", symptom.id)));
        }
        for alias in &symptom.aliases {
            let phrase = normalize_text(alias);
            if phrase.is_empty() {
                return Err(unavailable(format!("symptom '{}' has an empty alias", symptom.id)));
            }
            if !seen_aliases.insert(phrase.clone()) {
                return Err(unavailable(format!("alias '{}' is used by more than one symptom", phrase)));
            }
        }
    }

    if document.diseases.is_empty() {
        return Err(unavailable("no disease profiles defined"));
    }

    let mut disease_ids = HashSet::new();
    for disease in &document.diseases {
        if !disease_ids.insert(disease.id.as_str()) {
            return Err(unavailable(format!("duplicate disease id '{}'", disease.id)));
        }
        if disease.symptoms.is_empty() {
            return Err(unavailable(format!("disease '{}' has no symptoms", disease.id)));
        }
        for (symptom, weight) in &disease.symptoms {
            if !symptom_ids.contains(symptom.as_str()) {
                return Err(unavailable(format!(
                    "disease '{}' references unknown symptom '{}'",
                    disease.id, symptom
                )));
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(unavailable(format!(
                    "disease '{}' has non-positive weight for '{}'",
                    disease.id, symptom
                )));
            }
        }
        if let Some((severity, _)) = disease
            .severity_recommendations
            .iter()
            .find(|(_, texts)| texts.is_empty())
        {
            return Err(unavailable(format!(
                "disease '{}' has an empty {:?} recommendation list",
                disease.id, severity
            )));
        }
    }

    for category in RiskCategory::ALL {
        let profile = document
            .risk_categories
            .get(&category)
            .ok_or_else(|| unavailable(format!("risk category '{}' is not defined", category)))?;

        if !(0.0..=100.0).contains(&profile.base_rate) {
            return Err(unavailable(format!(
                "risk category '{}' base rate {} is outside 0-100",
                category, profile.base_rate
            )));
        }
        let adjustments = [
            profile.symptom_bonus,
            profile.symptom_cap,
            profile.history_bonus,
            profile.history_cap,
        ];
        if adjustments.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(unavailable(format!("risk category '{}' has a negative bonus or cap", category)));
        }
        if profile
            .age_brackets
            .iter()
            .any(|bracket| !bracket.multiplier.is_finite() || bracket.multiplier < 0.0)
        {
            return Err(unavailable(format!("risk category '{}' has an invalid age multiplier", category)));
        }
        if let Some(unknown) = profile
            .symptoms
            .iter()
            .find(|symptom| !symptom_ids.contains(symptom.as_str()))
        {
            return Err(unavailable(format!(
                "risk category '{}' references unknown symptom '{}'",
                category, unknown
            )));
        }
    }

    for modality in Modality::ALL {
        let profiles = document.imaging.get(&modality).map(Vec::as_slice).unwrap_or(&[]);
        if profiles.iter().all(|profile| profile.findings.is_empty()) {
            return Err(unavailable(format!("no finding templates for modality '{}'", modality)));
        }
    }

    Ok(())
}
