use serde::{Deserialize, Serialize};

use super::VisionService;
use crate::config::Config;
use crate::error::ClassificationError;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Groq's OpenAI-compatible chat completions endpoint, used with a vision model.
pub struct GroqService {
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl GroqService {
    pub fn new(config: &Config) -> Result<Self, ClassificationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            client: builder.build()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, image_base64: &str, prompt: &str) -> ChatRequest {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    content_type: "text".to_string(),
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData {
                        url: format!("data:image/jpeg;base64,{}", image_base64),
                    },
                },
            ],
        }];

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
        }
    }
}

/// Pulls the trimmed text of the first choice out of a raw response body.
fn extract_completion(body: &str) -> Result<String, ClassificationError> {
    let chat_response: ChatResponse = serde_json::from_str(body)?;

    let content = chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(ClassificationError::EmptyReply);
    }
    Ok(content)
}

#[async_trait::async_trait]
impl VisionService for GroqService {
    async fn complete(&self, image_base64: &str, prompt: &str) -> Result<String, ClassificationError> {
        if image_base64.is_empty() {
            return Err(ClassificationError::EmptyImage);
        }

        let request = self.build_request(image_base64, prompt);

        log::info!("🤖 Sending request to Groq with model: {}", self.model);
        log::debug!("🔄 Base64 image size: {} bytes", image_base64.len());

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Groq response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ Groq API error ({}): {}", status, error_text);
            return Err(ClassificationError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let response_text = response.text().await?;
        log::debug!("📄 Raw Groq response size: {} bytes", response_text.len());

        let content = extract_completion(&response_text)?;
        log::info!("💬 Groq response content: {}", content);

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> GroqService {
        let config = Config::from_lookup(|key| match key {
            "GROQ_API_KEY" => Some("test_key".to_string()),
            "GROQ_MODEL" => Some("test_model".to_string()),
            _ => None,
        })
        .unwrap();
        GroqService::new(&config).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let service = test_service();
        let request = service.build_request("QUJD", "Classify this.");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "test_model");
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);

        let content = &json["messages"][0]["content"];
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Classify this.");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_extract_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Glass\nRinse and recycle.  "}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "Glass\nRinse and recycle.");
    }

    #[test]
    fn test_extract_completion_empty_reply() {
        assert!(matches!(
            extract_completion(r#"{"choices":[]}"#),
            Err(ClassificationError::EmptyReply)
        ));
        assert!(matches!(
            extract_completion(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ClassificationError::EmptyReply)
        ));
        assert!(matches!(
            extract_completion(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(ClassificationError::EmptyReply)
        ));
    }

    #[test]
    fn test_extract_completion_malformed() {
        assert!(matches!(
            extract_completion("<html>Bad Gateway</html>"),
            Err(ClassificationError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_image_is_rejected_without_request() {
        let service = test_service();
        let result = service.complete("", "prompt").await;
        assert!(matches!(result, Err(ClassificationError::EmptyImage)));
    }
}
