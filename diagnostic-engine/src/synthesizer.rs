use std::collections::HashSet;
use std::sync::Arc;

use crate::analysis::{DiagnosisCandidate, ImagingFinding};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::knowledge_base::KnowledgeBase;
use crate::risk::RiskProfile;
use crate::types::{AgeGroup, FindingSeverity, Severity};

pub const FURTHER_EVALUATION: &str = "Further evaluation recommended";
pub const INCONCLUSIVE: &str = "Inconclusive — insufficient data";

const WELLNESS: &str = "Maintain routine check-ups and a healthy lifestyle";
const CONSULT_PROFESSIONAL: &str = "Consult a healthcare professional for a full evaluation";
const RESUBMIT_IMAGE: &str = "Image analysis could not be completed; resubmit the image for review";
const CRITICAL_FINDING_FOLLOW_UP: &str = "Urgent specialist review of imaging findings";
const WARNING_FINDING_FOLLOW_UP: &str = "Follow-up imaging recommended to monitor findings";

/// Everything the synthesizer reads; borrowed from the request scope
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub diagnosis: Option<&'a DiagnosisCandidate>,
    pub risk_profile: &'a RiskProfile,
    pub findings: &'a [ImagingFinding],
    pub age_group: Option<AgeGroup>,
    pub image_incomplete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub overall_assessment: String,
    pub recommendations: Vec<String>,
}

/// Turns scored outputs into an assessment label and ordered recommendations
#[derive(Debug, Clone)]
pub struct RecommendationSynthesizer {
    knowledge_base: Arc<KnowledgeBase>,
    assessment_threshold: u8,
    elevated_threshold: u8,
}

impl RecommendationSynthesizer {
    pub fn new(knowledge_base: Arc<KnowledgeBase>, config: &EngineConfig) -> Self {
        Self {
            knowledge_base,
            assessment_threshold: config.assessment_confidence_threshold,
            elevated_threshold: config.elevated_risk_threshold,
        }
    }

    /// A critical finding outranks any diagnosis, whatever its confidence
    pub fn assess(&self, diagnosis: Option<&DiagnosisCandidate>, findings: &[ImagingFinding]) -> String {
        if findings.iter().any(|f| f.severity == FindingSeverity::Critical) {
            return FURTHER_EVALUATION.to_string();
        }
        match diagnosis {
            Some(candidate) if candidate.confidence >= self.assessment_threshold => candidate.name.clone(),
            _ => INCONCLUSIVE.to_string(),
        }
    }

    pub fn synthesize(&self, input: SynthesisInput<'_>) -> EngineResult<Synthesis> {
        let mut recommendations = Recommendations::default();

        for finding in input.findings {
            let generic = match finding.severity {
                FindingSeverity::Critical => CRITICAL_FINDING_FOLLOW_UP,
                FindingSeverity::Warning => WARNING_FINDING_FOLLOW_UP,
                FindingSeverity::Normal => continue,
            };
            recommendations.push(finding.follow_up.as_deref().unwrap_or(generic));
        }

        if let Some(candidate) = input.diagnosis {
            if let Some(disease) = self.knowledge_base.disease(&candidate.disease_id) {
                for text in disease.recommendations_for(candidate.severity) {
                    recommendations.push(text);
                }
            }
            if candidate.confidence < self.assessment_threshold {
                recommendations.push(CONSULT_PROFESSIONAL);
            }
            recommendations.push(follow_up_schedule(candidate.severity));
            if let Some(group) = input.age_group {
                for text in age_group_advice(group) {
                    recommendations.push(text);
                }
            }
        }

        for category in input.risk_profile.elevated(self.elevated_threshold) {
            let profile = self.knowledge_base.risk_category(category)?;
            recommendations.push(&profile.recommendation);
        }

        if input.image_incomplete {
            recommendations.push(RESUBMIT_IMAGE);
        }

        let mut recommendations = recommendations.into_vec();
        if recommendations.is_empty() {
            recommendations.push(WELLNESS.to_string());
        }

        Ok(Synthesis {
            overall_assessment: self.assess(input.diagnosis, input.findings),
            recommendations,
        })
    }
}

fn follow_up_schedule(severity: Severity) -> &'static str {
    match severity {
        Severity::Severe => "Follow-up in 24-48 hours",
        Severity::Moderate => "Follow-up in 1-2 weeks",
        Severity::Mild => "Follow-up as needed or if symptoms worsen",
    }
}

fn age_group_advice(group: AgeGroup) -> &'static [&'static str] {
    match group {
        AgeGroup::Senior => &["Extra caution due to age", "Regular health monitoring"],
        AgeGroup::Youth => &["Pediatric dosing considerations", "Parent/guardian supervision"],
        AgeGroup::Adult => &[],
    }
}

/// Insertion-ordered, duplicate-free list
#[derive(Default)]
struct Recommendations {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl Recommendations {
    fn push(&mut self, text: &str) {
        if self.seen.insert(text.to_string()) {
            self.ordered.push(text.to_string());
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskScorer;
    use crate::types::PatientProfile;
    use std::collections::BTreeSet;

    struct Fixture {
        synthesizer: RecommendationSynthesizer,
        scorer: RiskScorer,
    }

    fn fixture() -> Fixture {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        let config = EngineConfig::default();
        Fixture {
            synthesizer: RecommendationSynthesizer::new(kb.clone(), &config),
            scorer: RiskScorer::new(kb, &config),
        }
    }

    fn baseline_risk(scorer: &RiskScorer) -> RiskProfile {
        scorer
            .score(&PatientProfile { age: Some(30), ..Default::default() }, &BTreeSet::new())
            .unwrap()
    }

    fn cold(confidence: u8) -> DiagnosisCandidate {
        DiagnosisCandidate {
            disease_id: "common_cold".to_string(),
            name: "Common Cold".to_string(),
            matched_symptoms: vec!["cough".to_string(), "fever".to_string()],
            match_score: f64::from(confidence) / 100.0,
            confidence,
            severity: Severity::Mild,
        }
    }

    fn finding(severity: FindingSeverity, follow_up: Option<&str>) -> ImagingFinding {
        ImagingFinding {
            text: "Finding".to_string(),
            severity,
            confidence: 80,
            follow_up: follow_up.map(str::to_string),
        }
    }

    #[test]
    fn test_critical_finding_overrides_confident_diagnosis() {
        let f = fixture();
        let diagnosis = cold(95);
        let findings = vec![finding(FindingSeverity::Critical, None)];
        assert_eq!(f.synthesizer.assess(Some(&diagnosis), &findings), FURTHER_EVALUATION);
    }

    #[test]
    fn test_assessment_threshold() {
        let f = fixture();
        assert_eq!(f.synthesizer.assess(Some(&cold(60)), &[]), "Common Cold");
        assert_eq!(f.synthesizer.assess(Some(&cold(59)), &[]), INCONCLUSIVE);
        assert_eq!(f.synthesizer.assess(None, &[]), INCONCLUSIVE);
    }

    #[test]
    fn test_wellness_when_nothing_to_report() {
        let f = fixture();
        let risk = baseline_risk(&f.scorer);
        let normal = vec![finding(FindingSeverity::Normal, None)];
        let synthesis = f
            .synthesizer
            .synthesize(SynthesisInput {
                diagnosis: None,
                risk_profile: &risk,
                findings: &normal,
                age_group: None,
                image_incomplete: false,
            })
            .unwrap();
        assert_eq!(synthesis.recommendations, vec![WELLNESS.to_string()]);
    }

    #[test]
    fn test_recommendation_order_and_dedup() {
        let f = fixture();
        let risk = baseline_risk(&f.scorer);
        let diagnosis = cold(40);
        let findings = vec![
            finding(FindingSeverity::Warning, Some("Follow-up CT scan in 3 months")),
            finding(FindingSeverity::Warning, Some("Follow-up CT scan in 3 months")),
            finding(FindingSeverity::Critical, None),
        ];
        let synthesis = f
            .synthesizer
            .synthesize(SynthesisInput {
                diagnosis: Some(&diagnosis),
                risk_profile: &risk,
                findings: &findings,
                age_group: Some(AgeGroup::Senior),
                image_incomplete: false,
            })
            .unwrap();

        let recs = &synthesis.recommendations;
        assert_eq!(recs[0], "Follow-up CT scan in 3 months");
        assert_eq!(recs[1], CRITICAL_FINDING_FOLLOW_UP);
        let position = |text: &str| recs.iter().position(|r| r == text).unwrap();
        assert!(position(CONSULT_PROFESSIONAL) < position("Follow-up as needed or if symptoms worsen"));
        assert!(position("Follow-up as needed or if symptoms worsen") < position("Extra caution due to age"));

        let unique: HashSet<&String> = recs.iter().collect();
        assert_eq!(unique.len(), recs.len());
        assert_eq!(synthesis.overall_assessment, FURTHER_EVALUATION);
    }

    #[test]
    fn test_escalated_severity_picks_its_recommendation_tier() {
        let f = fixture();
        let risk = baseline_risk(&f.scorer);
        let recommend = |severity: Severity| {
            let diagnosis = DiagnosisCandidate { severity, ..cold(86) };
            f.synthesizer
                .synthesize(SynthesisInput {
                    diagnosis: Some(&diagnosis),
                    risk_profile: &risk,
                    findings: &[],
                    age_group: None,
                    image_incomplete: false,
                })
                .unwrap()
                .recommendations
        };

        let mild = recommend(Severity::Mild);
        assert!(mild.contains(&"Gargle with salt water".to_string()));
        assert!(!mild.contains(&"Take honey for cough".to_string()));

        let severe = recommend(Severity::Severe);
        assert_eq!(severe[0], "Consult a healthcare provider promptly");
        assert!(!severe.contains(&"Gargle with salt water".to_string()));
        assert!(severe.contains(&"Follow-up in 24-48 hours".to_string()));
    }

    #[test]
    fn test_elevated_risk_and_incomplete_image() {
        let f = fixture();
        let risk = f
            .scorer
            .score(&PatientProfile { age: Some(70), ..Default::default() }, &BTreeSet::new())
            .unwrap();
        let synthesis = f
            .synthesizer
            .synthesize(SynthesisInput {
                diagnosis: None,
                risk_profile: &risk,
                findings: &[],
                age_group: Some(AgeGroup::Senior),
                image_incomplete: true,
            })
            .unwrap();

        assert!(synthesis
            .recommendations
            .contains(&"Schedule a cardiovascular screening".to_string()));
        assert_eq!(synthesis.recommendations.last().map(String::as_str), Some(RESUBMIT_IMAGE));
        assert!(!synthesis.recommendations.contains(&"Extra caution due to age".to_string()));
    }
}
