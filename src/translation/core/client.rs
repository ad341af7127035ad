//! 模型接口客户端
//!
//! `ModelClient` 是对外部大模型的唯一依赖：输入一组对话消息，返回一段文本。
//! `HttpModelClient` 对接 OpenAI 兼容的 chat completions 接口，同时兼容
//! 只返回 `response` 字段的旧式接口（例如 Ollama 的 generate）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::translation::config::ModelConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 大模型调用接口
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// 发送消息并返回模型输出文本；`model` 为空时使用客户端默认模型
    async fn call_model(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> TranslationResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
}

/// 基于 reqwest 的 HTTP 客户端
pub struct HttpModelClient {
    client: reqwest::Client,
    config: ModelConfig,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> TranslationResult<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn send_request(&self, body: &ChatRequest<'_>) -> TranslationResult<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(TranslationError::ApiError {
                status,
                message: server_message(&text),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn call_model(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> TranslationResult<String> {
        let body = ChatRequest {
            model: model.unwrap_or(self.config.model.as_str()),
            messages: &messages,
            stream: false,
            temperature: self.config.temperature,
        };

        tracing::debug!("调用模型 {} ({} 条消息)", body.model, messages.len());

        let response = self.send_request(&body).await?;
        let text = response.text().await?;
        extract_content(&text)
    }
}

/// 从响应体中取出模型输出
pub fn extract_content(body: &str) -> TranslationResult<String> {
    let json: Value = serde_json::from_str(body).map_err(|_| TranslationError::InvalidResponse)?;

    if let Some(content) = json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        return Ok(content.to_string());
    }

    if let Some(content) = json.get("response").and_then(Value::as_str) {
        return Ok(content.to_string());
    }

    Err(TranslationError::InvalidResponse)
}

/// 错误响应中的服务端消息，优先取 `error.message`
fn server_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|error| error.get("message").or(Some(error)))
                .and_then(|message| message.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_openai_shape() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"你好"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "你好");
    }

    #[test]
    fn test_extract_legacy_shape() {
        assert_eq!(extract_content(r#"{"response":"世界"}"#).unwrap(), "世界");
    }

    #[test]
    fn test_extract_rejects_unknown_shape() {
        let err = extract_content(r#"{"data":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "API 返回格式不正确");
        assert!(matches!(extract_content("not json"), Err(TranslationError::InvalidResponse)));
    }

    #[test]
    fn test_server_message() {
        assert_eq!(server_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
        assert_eq!(server_message(r#"{"error":"overloaded"}"#), "overloaded");
        assert_eq!(server_message("plain failure\n"), "plain failure");
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let config = ModelConfig {
            endpoint: "ftp://nowhere".to_string(),
            ..Default::default()
        };
        assert!(HttpModelClient::new(config).is_err());
    }

    mod http {
        use super::*;
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        fn client_for(server: &MockServer, api_key: Option<&str>) -> HttpModelClient {
            HttpModelClient::new(ModelConfig {
                endpoint: format!("{}/v1/chat/completions", server.uri()),
                model: "test-model".to_string(),
                api_key: api_key.map(str::to_string),
                ..Default::default()
            })
            .unwrap()
        }

        #[tokio::test]
        async fn test_call_model_success() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/v1/chat/completions"))
                .and(matchers::header("Authorization", "Bearer secret"))
                .and(matchers::body_partial_json(serde_json::json!({
                    "model": "test-model",
                    "stream": false
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "<text>你好</text>" } }]
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = client_for(&mock_server, Some("secret"));
            let output = client
                .call_model(vec![ChatMessage::user("Hello")], None)
                .await
                .unwrap();
            assert_eq!(output, "<text>你好</text>");
        }

        #[tokio::test]
        async fn test_model_override() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::body_partial_json(serde_json::json!({ "model": "other" })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "response": "ok"
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = client_for(&mock_server, None);
            let output = client
                .call_model(vec![ChatMessage::user("x")], Some("other"))
                .await
                .unwrap();
            assert_eq!(output, "ok");
        }

        #[tokio::test]
        async fn test_api_error_carries_status() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(
                    ResponseTemplate::new(429)
                        .set_body_string(r#"{"error": {"message": "Rate limit exceeded"}}"#),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            let client = client_for(&mock_server, None);
            let err = client
                .call_model(vec![ChatMessage::user("x")], None)
                .await
                .unwrap_err();

            match err {
                TranslationError::ApiError { status, message } => {
                    assert_eq!(status, 429);
                    assert_eq!(message, "Rate limit exceeded");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_malformed_body() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
                .mount(&mock_server)
                .await;

            let client = client_for(&mock_server, None);
            let err = client
                .call_model(vec![ChatMessage::user("x")], None)
                .await
                .unwrap_err();
            assert!(matches!(err, TranslationError::InvalidResponse));
        }
    }
}
