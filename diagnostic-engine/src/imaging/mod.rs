pub mod template;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::analysis::ImagingFinding;
use crate::error::{EngineError, EngineResult};
use crate::knowledge_base::KnowledgeBase;
use crate::types::{FindingSeverity, ImageHandle, Modality};

pub use template::TemplateClassifier;

/// Finding as reported by a classifier, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawFinding {
    pub text: String,
    pub severity: String,
    pub confidence: f64,
}

impl RawFinding {
    pub fn new(text: impl Into<String>, severity: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            severity: severity.into(),
            confidence,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("malformed classifier output: {0}")]
    Malformed(String),
}

/// Pixel-level classification backend
///
/// The engine never decodes image data itself; it hands the opaque handle
/// to an implementation of this trait. Implementations are called at most
/// once per image per request and are not retried.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, modality: Modality, image: &ImageHandle) -> Result<Vec<RawFinding>, ClassifierError>;
}

/// Runs a classifier under a deadline and normalizes what it returns
#[derive(Clone)]
pub struct ImageAnalyzer {
    classifier: Arc<dyn ImageClassifier>,
    knowledge_base: Arc<KnowledgeBase>,
    timeout: Duration,
}

impl ImageAnalyzer {
    pub fn new(classifier: Arc<dyn ImageClassifier>, knowledge_base: Arc<KnowledgeBase>, timeout: Duration) -> Self {
        Self {
            classifier,
            knowledge_base,
            timeout,
        }
    }

    /// Classify one image
    ///
    /// Fails with `Timeout` when the deadline passes and with
    /// `ImageAnalysis` when the classifier errors or returns malformed
    /// findings.
    pub async fn analyze(&self, modality: Modality, image: &ImageHandle) -> EngineResult<Vec<ImagingFinding>> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.classifier.classify(modality, image)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let raw = match outcome {
            Err(_) => return Err(EngineError::Timeout { modality, elapsed_ms }),
            Ok(Err(e)) => {
                return Err(EngineError::ImageAnalysis {
                    modality,
                    cause: e.to_string(),
                })
            }
            Ok(Ok(raw)) => raw,
        };

        let findings = raw
            .into_iter()
            .map(|finding| self.normalize(modality, finding))
            .collect::<EngineResult<Vec<_>>>()?;

        debug!(modality = %modality, findings = findings.len(), elapsed_ms, "Image classified");
        Ok(findings)
    }

    fn normalize(&self, modality: Modality, raw: RawFinding) -> EngineResult<ImagingFinding> {
        let text = raw.text.trim();
        if text.is_empty() {
            return Err(EngineError::ImageAnalysis {
                modality,
                cause: "finding has no text".to_string(),
            });
        }
        if raw.confidence.is_nan() {
            return Err(EngineError::ImageAnalysis {
                modality,
                cause: format!("finding '{}' has no numeric confidence", text),
            });
        }

        let follow_up = self
            .knowledge_base
            .finding_template(modality, text)
            .and_then(|template| template.follow_up.clone());

        Ok(ImagingFinding {
            text: text.to_string(),
            severity: FindingSeverity::from_label(&raw.severity),
            confidence: raw.confidence.round().clamp(0.0, 100.0) as u8,
            follow_up,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(classifier: MockImageClassifier, timeout: Duration) -> ImageAnalyzer {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        ImageAnalyzer::new(Arc::new(classifier), kb, timeout)
    }

    #[tokio::test]
    async fn test_output_is_normalized() {
        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    RawFinding::new("  Small nodule detected in right lung ", "Warning", 81.6),
                    RawFinding::new("Something odd", "borderline", 140.0),
                    RawFinding::new("Artifact", "normal", -3.0),
                ])
            });

        let findings = analyzer(classifier, Duration::from_secs(1))
            .analyze(Modality::Ct, &ImageHandle::new("img-1"))
            .await
            .unwrap();

        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].text, "Small nodule detected in right lung");
        assert_eq!(findings[0].severity, FindingSeverity::Warning);
        assert_eq!(findings[0].confidence, 82);
        assert_eq!(findings[0].follow_up.as_deref(), Some("Follow-up CT scan in 3 months"));
        assert_eq!(findings[1].severity, FindingSeverity::Normal);
        assert_eq!(findings[1].confidence, 100);
        assert_eq!(findings[2].confidence, 0);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_image_analysis_error() {
        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Err(ClassifierError::Unavailable("model offline".to_string())));

        let result = analyzer(classifier, Duration::from_secs(1))
            .analyze(Modality::Mri, &ImageHandle::new("img-2"))
            .await;

        match result {
            Err(EngineError::ImageAnalysis { modality, cause }) => {
                assert_eq!(modality, Modality::Mri);
                assert!(cause.contains("model offline"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_finding_rejected() {
        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Ok(vec![RawFinding::new("", "critical", 90.0)]));
        let result = analyzer(classifier, Duration::from_secs(1))
            .analyze(Modality::Xray, &ImageHandle::new("img-3"))
            .await;
        assert!(matches!(result, Err(EngineError::ImageAnalysis { .. })));

        let mut classifier = MockImageClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Ok(vec![RawFinding::new("Opacity", "warning", f64::NAN)]));
        let result = analyzer(classifier, Duration::from_secs(1))
            .analyze(Modality::Xray, &ImageHandle::new("img-3"))
            .await;
        assert!(matches!(result, Err(EngineError::ImageAnalysis { .. })));
    }

    struct StalledClassifier;

    #[async_trait]
    impl ImageClassifier for StalledClassifier {
        async fn classify(&self, _modality: Modality, _image: &ImageHandle) -> Result<Vec<RawFinding>, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_deadline_produces_timeout() {
        let kb = Arc::new(KnowledgeBase::embedded().unwrap());
        let analyzer = ImageAnalyzer::new(Arc::new(StalledClassifier), kb, Duration::from_millis(20));

        let result = analyzer.analyze(Modality::Ultrasound, &ImageHandle::new("img-4")).await;
        assert!(matches!(
            result,
            Err(EngineError::Timeout { modality: Modality::Ultrasound, .. })
        ));
    }
}
