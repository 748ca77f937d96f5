//! Built-in classifier backed by the knowledge base finding templates
//!
//! Picks one of the finding profiles registered for the modality using a
//! SHA-256 digest of the image handle, so a given image always yields the
//! same findings. Stands in for a pixel-level model.
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{ClassifierError, ImageClassifier, RawFinding};
use crate::knowledge_base::{FindingProfile, KnowledgeBase};
use crate::types::{ImageHandle, Modality};

pub struct TemplateClassifier {
    knowledge_base: Arc<KnowledgeBase>,
}

impl TemplateClassifier {
    pub fn new(knowledge_base: Arc<KnowledgeBase>) -> Self {
        Self { knowledge_base }
    }

    fn select(&self, modality: Modality, image: &ImageHandle) -> Option<&FindingProfile> {
        let profiles = self.knowledge_base.finding_profiles(modality);
        if profiles.is_empty() {
            return None;
        }

        let digest = Sha256::digest(image.as_str().as_bytes());
        let prefix = digest.get(..8).and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())?;
        let index = (u64::from_be_bytes(prefix) % profiles.len() as u64) as usize;
        profiles.get(index)
    }
}

#[async_trait]
impl ImageClassifier for TemplateClassifier {
    async fn classify(&self, modality: Modality, image: &ImageHandle) -> Result<Vec<RawFinding>, ClassifierError> {
        let profile = self.select(modality, image).ok_or_else(|| {
            ClassifierError::Unavailable(format!("no finding templates for {}", modality))
        })?;

        Ok(profile
            .findings
            .iter()
            .map(|template| RawFinding::new(template.text.clone(), template.severity.as_str(), template.confidence))
            .collect())
    }
}
