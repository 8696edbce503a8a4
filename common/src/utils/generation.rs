use std::{sync::Arc, time::Duration};

use async_openai::{
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

use crate::error::AppError;

/// Sampling and budget knobs for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// Call-and-wait interface to the generative model.
///
/// Both variants return plain text; interpreting that text is the output
/// contract layer's problem.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn complete(
        &self,
        persona: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AppError>;

    async fn complete_with_image(
        &self,
        persona: &str,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
        params: &GenerationParams,
    ) -> Result<String, AppError>;
}

pub struct OpenAiGenerationClient {
    client: Arc<Client<async_openai::config::OpenAIConfig>>,
    request_timeout: Duration,
}

impl OpenAiGenerationClient {
    pub fn new(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn build_request(
        persona: &str,
        user_message: ChatCompletionRequestUserMessage,
        params: &GenerationParams,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&params.model)
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .messages([
                ChatCompletionRequestSystemMessage::from(persona).into(),
                user_message.into(),
            ])
            .build()?;
        Ok(request)
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<String, AppError> {
        let response = tokio::time::timeout(
            self.request_timeout,
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| {
            AppError::ExternalCall(format!(
                "generation request timed out after {}s",
                self.request_timeout.as_secs()
            ))
        })??;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or(AppError::LLMParsing(
                "No content found in LLM response".into(),
            ))?;

        debug!(chars = content.len(), "received generation response");
        Ok(content.clone())
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn complete(
        &self,
        persona: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AppError> {
        let user_message = ChatCompletionRequestUserMessage::from(prompt);
        let request = Self::build_request(persona, user_message, params)?;
        self.send(request).await
    }

    async fn complete_with_image(
        &self,
        persona: &str,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
        params: &GenerationParams,
    ) -> Result<String, AppError> {
        let data_url = format!("data:{};base64,{}", mime_type, BASE64.encode(image));

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(ImageUrlArgs::default().url(data_url).build()?)
            .build()?;
        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()?;

        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(vec![image_part.into(), text_part.into()])
            .build()?;

        let request = Self::build_request(persona, user_message, params)?;
        self.send(request).await
    }
}

/// Infers the image mime type from a file extension, defaulting to JPEG.
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
