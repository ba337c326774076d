use image::DynamicImage;
use std::sync::Arc;

use crate::config::{CategoryPolicy, Config};
use crate::error::ClassificationError;
use crate::handlers::prompt::build_prompt;
use crate::handlers::response::parse;
use crate::models::{canonical_category, Classification, ClassificationOutcome, FALLBACK_CATEGORY, VALID_CATEGORIES};
use crate::services::encoder::encode_frame;
use crate::services::VisionService;

/// Frame in, displayable outcome out. Failures never escape as errors.
pub struct WasteClassifier {
    vision: Arc<dyn VisionService>,
    prompt: String,
    policy: CategoryPolicy,
    jpeg_quality: u8,
}

impl WasteClassifier {
    pub fn new(vision: Arc<dyn VisionService>, config: &Config) -> Self {
        Self::with_options(vision, config.category_policy, config.jpeg_quality)
    }

    pub fn with_options(vision: Arc<dyn VisionService>, policy: CategoryPolicy, jpeg_quality: u8) -> Self {
        Self {
            vision,
            prompt: build_prompt(&VALID_CATEGORIES),
            policy,
            jpeg_quality,
        }
    }

    pub fn policy(&self) -> CategoryPolicy {
        self.policy
    }

    pub async fn classify(&self, image: &DynamicImage) -> ClassificationOutcome {
        match self.try_classify(image).await {
            Ok(classification) => {
                log::info!(
                    "♻️ Classified as '{}': {}",
                    classification.category,
                    classification.advice
                );
                ClassificationOutcome::classified(classification)
            }
            Err(ClassificationError::EmptyImage) => {
                log::warn!("⚠️ Empty image input, using fallback classification");
                ClassificationOutcome::unavailable("Empty image input")
            }
            Err(e) => {
                log::error!("❌ Classification error: {}", e);
                ClassificationOutcome::unavailable(format!("Classification error: {}", e))
            }
        }
    }

    async fn try_classify(&self, image: &DynamicImage) -> Result<Classification, ClassificationError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassificationError::EmptyImage);
        }

        let base64_image = encode_frame(image, self.jpeg_quality)?;
        if base64_image.is_empty() {
            return Err(ClassificationError::EmptyImage);
        }

        let reply = self.vision.complete(&base64_image, &self.prompt).await?;
        let (category, advice) = parse(&reply);
        let category = apply_policy(self.policy, category);

        let classification = Classification::new(category, advice);
        if classification.is_fallback() {
            log::warn!("⚠️ Could not parse a two-line reply, using fallback: {:?}", reply);
        }
        Ok(classification)
    }
}

fn apply_policy(policy: CategoryPolicy, category: String) -> String {
    match policy {
        CategoryPolicy::Passthrough => category,
        CategoryPolicy::Strict => match canonical_category(&category) {
            Some(canonical) => canonical.to_string(),
            None => {
                log::warn!("⚠️ Category '{}' is not in the vocabulary, using {}", category, FALLBACK_CATEGORY);
                FALLBACK_CATEGORY.to_string()
            }
        },
    }
}
