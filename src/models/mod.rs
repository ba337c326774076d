use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Waste categories the model is asked to choose from, in prompt order.
pub const VALID_CATEGORIES: [&str; 16] = [
    "Recycling",
    "Organic",
    "Trash",
    "Electronics",
    "Miscellaneous",
    "Plastic",
    "Metal",
    "Glass",
    "Paper",
    "Textiles",
    "Batteries",
    "Hazardous Waste",
    "Food Waste",
    "Bulky Waste",
    "E-waste",
    "Toxic Waste",
];

pub const FALLBACK_CATEGORY: &str = "Miscellaneous";
pub const FALLBACK_ADVICE: &str = "General waste disposal recommended";

/// Case-insensitive lookup of the canonical vocabulary label.
pub fn canonical_category(label: &str) -> Option<&'static str> {
    let label = label.trim();
    VALID_CATEGORIES
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(label))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub advice: String,
    pub classified_at: DateTime<Utc>,
}

impl Classification {
    pub fn new(category: impl Into<String>, advice: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            advice: advice.into(),
            classified_at: Utc::now(),
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_CATEGORY, FALLBACK_ADVICE)
    }

    pub fn is_fallback(&self) -> bool {
        self.category == FALLBACK_CATEGORY && self.advice == FALLBACK_ADVICE
    }
}

/// Result of one classify action. Both variants carry something displayable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ClassificationOutcome {
    Classified {
        #[serde(flatten)]
        classification: Classification,
    },
    Unavailable {
        #[serde(flatten)]
        classification: Classification,
        notice: String,
    },
}

impl ClassificationOutcome {
    pub fn classified(classification: Classification) -> Self {
        ClassificationOutcome::Classified { classification }
    }

    pub fn unavailable(notice: impl Into<String>) -> Self {
        ClassificationOutcome::Unavailable {
            classification: Classification::fallback(),
            notice: notice.into(),
        }
    }

    pub fn classification(&self) -> &Classification {
        match self {
            ClassificationOutcome::Classified { classification } => classification,
            ClassificationOutcome::Unavailable { classification, .. } => classification,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            ClassificationOutcome::Classified { .. } => None,
            ClassificationOutcome::Unavailable { notice, .. } => Some(notice),
        }
    }
}

/// A captured still, owned by exactly one session.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub image: DynamicImage,
    pub captured_at: DateTime<Utc>,
}

impl FrameBuffer {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Live,
    Stopped,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CaptureState::Live => "live",
            CaptureState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}
