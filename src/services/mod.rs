pub mod encoder; // frame -> JPEG -> base64
pub mod groq; // Groq chat-completions vision client

pub use groq::GroqService;

use crate::error::ClassificationError;

/// Remote multimodal model: one base64 JPEG and one instruction in, completion text out.
#[async_trait::async_trait]
pub trait VisionService: Send + Sync {
    async fn complete(&self, image_base64: &str, prompt: &str) -> Result<String, ClassificationError>;
}
