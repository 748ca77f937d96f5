//! Clinical decision-support inference engine for CareSense
//!
//! Turns a patient profile, free-text symptoms and an optional medical image
//! into one aggregated [`AnalysisResult`]:
//!
//! - **Symptom Matcher**: maps text onto a canonical symptom set and ranks
//!   disease profiles by weighted coverage
//! - **Risk Scorer**: per-category chronic-condition risk from age, history
//!   and matched symptoms
//! - **Image Analyzer**: runs an [`ImageClassifier`] under a deadline and
//!   normalizes its findings
//! - **Recommendation Synthesizer**: overall assessment plus an ordered,
//!   de-duplicated recommendation list
//!
//! All reference data comes from a [`KnowledgeBase`] loaded once at start-up.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use diagnostic_engine::{DiagnosticService, EngineConfig, InferenceRequest, PatientProfile};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = DiagnosticService::new(EngineConfig::from_env()?)?;
//!
//! let request = InferenceRequest::new(PatientProfile {
//!     age: Some(34),
//!     ..Default::default()
//! })
//! .with_symptoms("fever, cough, fatigue");
//!
//! let result = service.infer(request).await?;
//! println!("{}", result.overall_assessment);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod imaging;
pub mod knowledge_base;
pub mod matcher;
pub mod risk;
pub mod service;
pub mod synthesizer;
pub mod types;

pub use analysis::*;
pub use crate::config::{EngineConfig, ENV_PREFIX};
pub use error::*;
pub use imaging::{ClassifierError, ImageAnalyzer, ImageClassifier, RawFinding, TemplateClassifier};
pub use knowledge_base::KnowledgeBase;
pub use matcher::{SymptomMatcher, SymptomReport};
pub use risk::{RiskLevel, RiskProfile, RiskScorer};
pub use service::*;
pub use synthesizer::{RecommendationSynthesizer, FURTHER_EVALUATION, INCONCLUSIVE};
pub use types::*;
