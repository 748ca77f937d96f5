use chrono::Utc;
use error_common::log_error;
use logger_redacted::PiiRedactor;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::{AnalysisNote, AnalysisResult, SymptomSummary};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::imaging::{ImageAnalyzer, ImageClassifier, TemplateClassifier};
use crate::knowledge_base::KnowledgeBase;
use crate::matcher::SymptomMatcher;
use crate::risk::RiskScorer;
use crate::synthesizer::{RecommendationSynthesizer, SynthesisInput};
use crate::types::InferenceRequest;

/// Inference orchestrator for clinical decision support
///
/// Holds no per-request state; concurrent `infer` calls share only the
/// read-only knowledge base.
pub struct DiagnosticService {
    config: EngineConfig,
    knowledge_base: Arc<KnowledgeBase>,
    matcher: SymptomMatcher,
    scorer: RiskScorer,
    analyzer: ImageAnalyzer,
    synthesizer: RecommendationSynthesizer,
    redactor: PiiRedactor,
}

impl DiagnosticService {
    /// Create a service with the configured knowledge base and the built-in classifier
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let knowledge_base = Arc::new(KnowledgeBase::load(config.knowledge_base_path.as_deref())?);
        let classifier = Arc::new(TemplateClassifier::new(knowledge_base.clone()));

        info!(
            version = knowledge_base.version(),
            diseases = knowledge_base.diseases().len(),
            "Diagnostic service initialized"
        );
        Self::with_classifier(config, knowledge_base, classifier)
    }

    /// Create a service around an external classification backend
    pub fn with_classifier(
        config: EngineConfig,
        knowledge_base: Arc<KnowledgeBase>,
        classifier: Arc<dyn ImageClassifier>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            matcher: SymptomMatcher::new(knowledge_base.clone(), &config),
            scorer: RiskScorer::new(knowledge_base.clone(), &config),
            analyzer: ImageAnalyzer::new(classifier, knowledge_base.clone(), config.image_timeout()),
            synthesizer: RecommendationSynthesizer::new(knowledge_base.clone(), &config),
            redactor: PiiRedactor::default(),
            knowledge_base,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge_base
    }

    /// Run the full pipeline for one request
    ///
    /// Invalid input is rejected before any component runs. Image
    /// classification failures and timeouts downgrade the result with an
    /// `analysis_incomplete` note; every other failure is returned with the
    /// request id in its error context.
    pub async fn infer(&self, request: InferenceRequest) -> EngineResult<AnalysisResult> {
        let request_id = Uuid::new_v4();
        self.run(request_id, request)
            .await
            .map_err(|e| e.in_request(request_id))
    }

    async fn run(&self, request_id: Uuid, request: InferenceRequest) -> EngineResult<AnalysisResult> {
        request.validate(&self.config)?;

        let symptom_text = request.symptom_text.as_deref().unwrap_or_default();
        let image = request
            .image
            .as_ref()
            .map(|image| (image.resolved_modality(), &image.handle));

        info!(
            request_id = %request_id,
            symptoms = %self.redactor.fingerprint(symptom_text),
            history = %self.redactor.fingerprint(&request.patient_profile.history_text()),
            modality = ?image.map(|(modality, _)| modality),
            "Running inference"
        );

        let scoring = async {
            let report = self.matcher.analyze(symptom_text);
            let candidates = self.matcher.rank(&report)?;
            let risk_profile = self.scorer.score(&request.patient_profile, report.symptoms())?;
            Ok::<_, EngineError>((report, candidates, risk_profile))
        };
        let imaging = async {
            match image {
                Some((modality, handle)) => Some((modality, self.analyzer.analyze(modality, handle).await)),
                None => None,
            }
        };

        let (scored, imaged) = tokio::join!(scoring, imaging);
        let (report, candidates, risk_profile) = scored?;

        let mut notes = Vec::new();
        let findings = match imaged {
            None => Vec::new(),
            Some((_, Ok(findings))) => findings,
            Some((modality, Err(e @ (EngineError::ImageAnalysis { .. } | EngineError::Timeout { .. })))) => {
                log_error("image analysis", &e);
                notes.push(AnalysisNote::analysis_incomplete(modality, self.redactor.redact(&e.to_string())));
                Vec::new()
            }
            Some((_, Err(e))) => return Err(e),
        };

        let diagnosis = candidates.first().cloned();
        let differential: Vec<_> = candidates.into_iter().take(self.config.max_differential).collect();
        let age_group = request.patient_profile.age_group();

        let synthesis = self.synthesizer.synthesize(SynthesisInput {
            diagnosis: diagnosis.as_ref(),
            risk_profile: &risk_profile,
            findings: &findings,
            age_group,
            image_incomplete: !notes.is_empty(),
        })?;

        debug!(
            request_id = %request_id,
            candidates = differential.len(),
            recommendations = synthesis.recommendations.len(),
            "Synthesized recommendations"
        );

        let result = AnalysisResult {
            request_id,
            diagnosis,
            differential,
            risk_levels: self.scorer.levels(&risk_profile),
            risk_profile,
            findings,
            recommendations: synthesis.recommendations,
            overall_assessment: synthesis.overall_assessment,
            symptoms: SymptomSummary {
                recognized: report.symptoms().iter().cloned().collect(),
                body_systems: report.body_systems().clone(),
            },
            age_group,
            notes,
            generated_at: Utc::now(),
        };

        info!(
            request_id = %request_id,
            confidence = ?result.diagnosis.as_ref().map(|d| d.confidence),
            findings = result.findings.len(),
            complete = result.is_complete(),
            "Inference complete"
        );

        Ok(result)
    }

    /// Parse a JSON request and run it
    pub async fn infer_json(&self, raw: &str) -> EngineResult<AnalysisResult> {
        let request = InferenceRequest::from_json(raw)?;
        self.infer(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::NoteCode;
    use error_common::ClassifiedError;
    use crate::imaging::{ClassifierError, MockImageClassifier, RawFinding};
    use crate::synthesizer::FURTHER_EVALUATION;
    use crate::types::{ImageHandle, ImageInput, Modality, PatientProfile, RiskCategory};

    fn service(classifier: MockImageClassifier) -> DiagnosticService {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        DiagnosticService::with_classifier(EngineConfig::default(), kb, Arc::new(classifier)).unwrap()
    }

    fn adult() -> PatientProfile {
        PatientProfile {
            age: Some(34),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_image_never_calls_classifier() {
        let mut classifier = MockImageClassifier::new();
        classifier.expect_classify().times(0);

        let result = service(classifier)
            .infer(InferenceRequest::new(adult()).with_symptoms("fever, cough, fatigue"))
            .await
            .unwrap();

        assert!(result.findings.is_empty());
        assert!(result.notes.is_empty());
        assert_eq!(result.diagnosis.unwrap().disease_id, "common_cold");
        assert_eq!(result.overall_assessment, "Common Cold");
    }

    #[tokio::test]
    async fn test_critical_finding_wins_over_diagnosis() {
        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .withf(|modality, _| *modality == Modality::Ct)
            .times(1)
            .returning(|_, _| Ok(vec![RawFinding::new("Large mass in left lobe", "critical", 91.0)]));

        let request = InferenceRequest::new(adult())
            .with_symptoms("fever, cough, fatigue")
            .with_image(ImageInput::new(Modality::Ct, "img-ct"));
        let result = service(classifier).infer(request).await.unwrap();

        assert_eq!(result.overall_assessment, FURTHER_EVALUATION);
        assert_eq!(result.findings.len(), 1);
        assert!(result.diagnosis.is_some());
    }

    #[tokio::test]
    async fn test_classifier_failure_downgrades_result() {
        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .times(1)
            .returning(|_, _| Err(ClassifierError::Malformed("truncated payload".to_string())));

        let request = InferenceRequest::new(adult())
            .with_symptoms("wheezing and chest tightness")
            .with_image(ImageInput::new(Modality::Xray, "img-x"));
        let result = service(classifier).infer(request).await.unwrap();

        assert!(result.findings.is_empty());
        assert!(result.has_note(NoteCode::AnalysisIncomplete));
        assert_eq!(result.notes[0].modality, Some(Modality::Xray));
        assert_eq!(result.diagnosis.unwrap().disease_id, "asthma");
        assert_eq!(result.risk_profile.iter().count(), RiskCategory::ALL.len());
    }

    #[tokio::test]
    async fn test_modality_inferred_from_filename() {
        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .withf(|modality, image| *modality == Modality::Mri && image.as_str() == "h-1")
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let image = ImageInput {
            modality: None,
            handle: ImageHandle::new("h-1"),
            filename: Some("head_MRI_0042.dcm".to_string()),
        };
        let result = service(classifier)
            .infer(InferenceRequest::new(adult()).with_image(image))
            .await
            .unwrap();
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_classification() {
        let mut classifier = MockImageClassifier::new();
        classifier.expect_classify().times(0);

        let request = InferenceRequest::new(PatientProfile {
            age: Some(200),
            ..Default::default()
        })
        .with_image(ImageInput::new(Modality::Ct, "img"));

        let error = service(classifier).infer(request).await.unwrap_err();
        assert!(matches!(error.root(), EngineError::InvalidInput { .. }));

        let response = error.to_response();
        assert!(response.context.request_id.is_some());
        assert_eq!(
            response.context.additional.get("field").map(String::as_str),
            Some("patientProfile.age")
        );
    }

    #[tokio::test]
    async fn test_infer_json_rejects_bad_shape() {
        let result = service(MockImageClassifier::new())
            .infer_json(r#"{"patientProfile": {"age": "old"}}"#)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_differential_is_truncated() {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        let config = EngineConfig {
            max_differential: 2,
            ..Default::default()
        };
        let service = DiagnosticService::with_classifier(config, kb, Arc::new(MockImageClassifier::new())).unwrap();

        let result = service
            .infer(InferenceRequest::new(adult()).with_symptoms("fever, cough, fatigue"))
            .await
            .unwrap();
        assert_eq!(result.differential.len(), 2);
        assert_eq!(result.differential[0], result.diagnosis.unwrap());
    }

    #[test]
    fn test_inverted_confidence_bounds_are_rejected() {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        let config = EngineConfig {
            min_confidence: 90,
            max_confidence: 50,
            ..Default::default()
        };

        let result = DiagnosticService::with_classifier(config, kb, Arc::new(MockImageClassifier::new()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
