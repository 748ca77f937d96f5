use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::analysis::DiagnosisCandidate;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::knowledge_base::KnowledgeBase;

/// Single-word aliases at least this long also match as a token prefix
/// ("coughing" -> "cough"); shorter ones must match exactly.
const MIN_PREFIX_ALIAS_LEN: usize = 4;

/// Lowercase, replace anything non-alphanumeric with a space and collapse runs
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a confidence score in [0,1] onto the calibrated 0-100 scale
pub fn calibrate_confidence(match_score: f64, min: u8, max: u8) -> u8 {
    let raw = (match_score.clamp(0.0, 1.0) * 100.0).round() as u8;
    raw.clamp(min, max)
}

/// Symptom text after normalization, built once per request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymptomReport {
    symptoms: BTreeSet<String>,
    intensifiers: usize,
    body_systems: BTreeMap<String, usize>,
}

impl SymptomReport {
    /// Canonical symptom ids recognized in the text
    pub fn symptoms(&self) -> &BTreeSet<String> {
        &self.symptoms
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }

    pub fn intensified(&self) -> bool {
        self.intensifiers > 0
    }

    /// Recognized symptoms counted per body system
    pub fn body_systems(&self) -> &BTreeMap<String, usize> {
        &self.body_systems
    }
}

fn token_matches(token: &str, alias: &str) -> bool {
    token == alias || (alias.len() >= MIN_PREFIX_ALIAS_LEN && token.starts_with(alias))
}

/// Maps free text onto the vocabulary and scores it against every disease
#[derive(Debug, Clone)]
pub struct SymptomMatcher {
    knowledge_base: Arc<KnowledgeBase>,
    min_confidence: u8,
    max_confidence: u8,
}

impl SymptomMatcher {
    pub fn new(knowledge_base: Arc<KnowledgeBase>, config: &EngineConfig) -> Self {
        Self {
            knowledge_base,
            min_confidence: config.min_confidence,
            max_confidence: config.max_confidence,
        }
    }

    /// Normalize the text and collect the symptoms it mentions
    ///
    /// Unknown words are dropped. Negations such as "no fever" are not
    /// recognized and still count as a mention.
    pub fn analyze(&self, text: &str) -> SymptomReport {
        let normalized = normalize_text(text);
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        let padded = format!(" {} ", normalized);

        let mut symptoms = BTreeSet::new();
        for alias in self.knowledge_base.aliases() {
            if symptoms.contains(&alias.symptom_id) {
                continue;
            }
            let found = if alias.multi_word {
                padded.contains(&format!(" {} ", alias.phrase))
            } else {
                tokens.iter().any(|token| token_matches(token, &alias.phrase))
            };
            if found {
                symptoms.insert(alias.symptom_id.clone());
            }
        }

        let intensifiers = tokens
            .iter()
            .filter(|token| {
                self.knowledge_base
                    .severity_intensifiers()
                    .iter()
                    .any(|word| token_matches(token, word))
            })
            .count();

        let mut body_systems = BTreeMap::new();
        for id in &symptoms {
            if let Some(entry) = self.knowledge_base.symptom(id) {
                *body_systems.entry(entry.system.clone()).or_insert(0) += 1;
            }
        }

        debug!(
            tokens = tokens.len(),
            recognized = symptoms.len(),
            intensifiers,
            "Analyzed symptom text"
        );

        SymptomReport {
            symptoms,
            intensifiers,
            body_systems,
        }
    }

    /// Score every disease profile, best first
    ///
    /// Diseases with no matched symptom are left out; an empty report
    /// yields no candidates.
    pub fn rank(&self, report: &SymptomReport) -> EngineResult<Vec<DiagnosisCandidate>> {
        if report.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for disease in self.knowledge_base.diseases() {
            let total = disease.total_weight();
            if !total.is_finite() || total <= 0.0 {
                return Err(EngineError::Internal(format!(
                    "disease '{}' has total symptom weight {}",
                    disease.id, total
                )));
            }

            let matched: Vec<String> = disease
                .symptoms
                .keys()
                .filter(|symptom| report.symptoms.contains(*symptom))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }

            let matched_weight: f64 = matched
                .iter()
                .filter_map(|symptom| disease.symptoms.get(symptom))
                .sum();
            let match_score = (matched_weight / total).clamp(0.0, 1.0);

            let severity = if report.intensified() {
                disease.severity.escalate()
            } else {
                disease.severity
            };

            candidates.push(DiagnosisCandidate {
                disease_id: disease.id.clone(),
                name: disease.name.clone(),
                matched_symptoms: matched,
                match_score,
                confidence: calibrate_confidence(match_score, self.min_confidence, self.max_confidence),
                severity,
            });
        }

        candidates.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| a.disease_id.cmp(&b.disease_id))
        });

        debug!(candidates = candidates.len(), "Ranked disease profiles");
        Ok(candidates)
    }
}
