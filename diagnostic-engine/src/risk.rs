use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::knowledge_base::{KnowledgeBase, RiskCategoryProfile};
use crate::matcher::normalize_text;
use crate::types::{PatientProfile, RiskCategory};

/// Risk percentage per category; always holds every category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskProfile(BTreeMap<RiskCategory, u8>);

impl RiskProfile {
    pub fn get(&self, category: RiskCategory) -> u8 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RiskCategory, u8)> + '_ {
        self.0.iter().map(|(category, value)| (*category, *value))
    }

    /// Categories at or above the threshold, in category order
    pub fn elevated(&self, threshold: u8) -> Vec<RiskCategory> {
        self.iter()
            .filter(|(_, value)| *value >= threshold)
            .map(|(category, _)| category)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_percentage(value: u8, low_threshold: u8, elevated_threshold: u8) -> Self {
        if value >= elevated_threshold {
            RiskLevel::High
        } else if value >= low_threshold {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Computes the chronic-condition risk profile from patient attributes
#[derive(Debug, Clone)]
pub struct RiskScorer {
    knowledge_base: Arc<KnowledgeBase>,
    low_threshold: u8,
    elevated_threshold: u8,
}

impl RiskScorer {
    pub fn new(knowledge_base: Arc<KnowledgeBase>, config: &EngineConfig) -> Self {
        Self {
            knowledge_base,
            low_threshold: config.low_risk_threshold,
            elevated_threshold: config.elevated_risk_threshold,
        }
    }

    pub fn score(&self, patient: &PatientProfile, symptoms: &BTreeSet<String>) -> EngineResult<RiskProfile> {
        let history = format!(" {} ", normalize_text(&patient.history_text()));

        let mut values = BTreeMap::new();
        for category in RiskCategory::ALL {
            let profile = self.knowledge_base.risk_category(category)?;
            let value = category_risk(profile, patient.age, symptoms, &history);
            values.insert(category, value);
        }

        debug!(age = ?patient.age, symptoms = symptoms.len(), "Scored risk profile");
        Ok(RiskProfile(values))
    }

    pub fn levels(&self, profile: &RiskProfile) -> BTreeMap<RiskCategory, RiskLevel> {
        profile
            .iter()
            .map(|(category, value)| {
                (
                    category,
                    RiskLevel::from_percentage(value, self.low_threshold, self.elevated_threshold),
                )
            })
            .collect()
    }
}

fn category_risk(
    profile: &RiskCategoryProfile,
    age: Option<u32>,
    symptoms: &BTreeSet<String>,
    padded_history: &str,
) -> u8 {
    let base = profile.base_rate * profile.age_multiplier(age);

    let symptom_hits = profile
        .symptoms
        .iter()
        .filter(|symptom| symptoms.contains(*symptom))
        .count() as f64;
    let symptom_bonus = (symptom_hits * profile.symptom_bonus).min(profile.symptom_cap);

    let history_hits = profile
        .history_keywords
        .iter()
        .map(|keyword| normalize_text(keyword))
        .filter(|keyword| !keyword.is_empty() && padded_history.contains(&format!(" {} ", keyword)))
        .count() as f64;
    let history_bonus = (history_hits * profile.history_bonus).min(profile.history_cap);

    (base + symptom_bonus + history_bonus).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MedicalHistory;
    use proptest::prelude::*;

    fn scorer() -> RiskScorer {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        RiskScorer::new(kb, &EngineConfig::default())
    }

    fn aged(age: u32) -> PatientProfile {
        PatientProfile {
            age: Some(age),
            ..Default::default()
        }
    }

    #[test]
    fn test_unadjusted_categories_return_base_rate() {
        let profile = scorer().score(&PatientProfile::default(), &BTreeSet::new()).unwrap();
        assert_eq!(profile.get(RiskCategory::Cardiovascular), 15);
        assert_eq!(profile.get(RiskCategory::MentalHealth), 18);
        assert_eq!(profile.iter().count(), RiskCategory::ALL.len());
    }

    #[test]
    fn test_age_raises_cardiovascular_risk() {
        let scorer = scorer();
        let older = scorer.score(&aged(70), &BTreeSet::new()).unwrap();
        let younger = scorer.score(&aged(30), &BTreeSet::new()).unwrap();
        assert_eq!(older.get(RiskCategory::Cardiovascular), 30);
        assert_eq!(younger.get(RiskCategory::Cardiovascular), 15);
    }

    #[test]
    fn test_symptom_bonus_is_capped() {
        let symptoms: BTreeSet<String> = ["cough", "wheezing", "shortness_of_breath", "chest_tightness"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let profile = scorer().score(&aged(30), &symptoms).unwrap();
        // base 10 plus 4 x 6 capped at 18
        assert_eq!(profile.get(RiskCategory::Respiratory), 28);
    }

    #[test]
    fn test_history_keywords_match_text_and_tags() {
        let scorer = scorer();
        let text = PatientProfile {
            age: Some(30),
            medical_history: Some(MedicalHistory::Text("Type 2 Diabetes since 2015".to_string())),
            ..Default::default()
        };
        let tags = PatientProfile {
            age: Some(30),
            medical_history: Some(MedicalHistory::Tags(vec!["diabetes".to_string()])),
            ..Default::default()
        };
        assert_eq!(scorer.score(&text, &BTreeSet::new()).unwrap().get(RiskCategory::Diabetes), 23);
        assert_eq!(scorer.score(&tags, &BTreeSet::new()).unwrap().get(RiskCategory::Diabetes), 23);
    }

    #[test]
    fn test_levels_and_elevated() {
        let scorer = scorer();
        let profile = scorer.score(&aged(70), &BTreeSet::new()).unwrap();
        let levels = scorer.levels(&profile);
        assert_eq!(levels[&RiskCategory::Cardiovascular], RiskLevel::High);
        assert_eq!(levels[&RiskCategory::MentalHealth], RiskLevel::Moderate);
        assert!(profile.elevated(25).contains(&RiskCategory::Cardiovascular));
        assert_eq!(RiskLevel::from_percentage(9, 10, 25), RiskLevel::Low);
    }

    proptest! {
        #[test]
        fn prop_risk_within_bounds(
            age in 0u32..=150,
            picks in prop::collection::vec(0usize..64, 0..20),
            history in prop::collection::vec("[a-z ]{0,20}", 0..4),
        ) {
            let scorer = scorer();
            let vocabulary: Vec<String> = scorer.knowledge_base.symptoms().map(|s| s.id.clone()).collect();
            let symptoms: BTreeSet<String> = picks
                .iter()
                .map(|i| vocabulary[i % vocabulary.len()].clone())
                .collect();

            let mut tags = history;
            tags.extend(["heart disease", "smoker", "diabetes", "obesity", "anxiety", "asthma"].iter().map(|s| s.to_string()));
            let patient = PatientProfile {
                age: Some(age),
                medical_history: Some(MedicalHistory::Tags(tags)),
                ..Default::default()
            };

            let profile = scorer.score(&patient, &symptoms).unwrap();
            prop_assert_eq!(profile.iter().count(), RiskCategory::ALL.len());
            for (_, value) in profile.iter() {
                prop_assert!(value <= 100);
            }
        }

        #[test]
        fn prop_scoring_is_deterministic(age in 0u32..=150) {
            let scorer = scorer();
            let first = scorer.score(&aged(age), &BTreeSet::new()).unwrap();
            let second = scorer.score(&aged(age), &BTreeSet::new()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
