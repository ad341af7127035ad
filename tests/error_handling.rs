//! 错误处理集成测试
//!
//! 测试系统在各种异常情况下的错误处理和恢复能力

use std::rc::Rc;
use std::sync::Arc;

use nws_translator::parsers::html::dom::{parse_html, text_content};
use nws_translator::translation::config::{AppConfig, MemoryStore, SettingsStore};
use nws_translator::translation::error::{ErrorCategory, ErrorSeverity, ErrorStats, TranslationResult};
use nws_translator::translation::{
    ConfigManager, ElementStatus, HttpModelClient, ModelConfig, PageTranslator, StaticPageHost,
    TranslationError, TranslationMode, TranslationService,
};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{MockModel, TestPage};

/// 异常 HTML 不会导致崩溃
#[tokio::test]
async fn test_malformed_html_is_tolerated() {
    let cases = [
        "",
        "<html><head></head><body></body></html>",
        "<div>Unclosed div with Hello world",
        "<html><>Invalid tag</>",
        "Plain text without HTML tags",
        "<script>alert('test')</script>",
        "<!DOCTYPE html>",
    ];

    for (i, html) in cases.iter().enumerate() {
        let page = TestPage::new(html, MockModel::dictionary());
        let report = page.translator.translate_page(None, None).await;
        assert!(report.is_ok(), "case {} should not fail: {:?}", i, report);
        assert_eq!(report.unwrap().failed, 0);
    }

    // 只有脚本的页面不发请求
    let page = TestPage::new("<script>alert('Hello world')</script>", MockModel::dictionary());
    page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(page.model.calls(), 0);
    println!("✅ Malformed HTML handling passed");
}

/// 单个元素失败不影响其他元素
#[tokio::test]
async fn test_partial_failure_isolated() {
    let model = MockModel::new(|text, _| {
        if text.contains("Broken") {
            Err(TranslationError::ApiError {
                status: 400,
                message: "bad request".to_string(),
            })
        } else {
            Ok(format!("<text>{}</text>", common::fake_translate(text)))
        }
    });
    let page = TestPage::new("<p>Hello world</p><p>Broken paragraph here</p>", model);

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(page.blocks().len(), 1);
    assert_eq!(page.translator.status(&page.element("p", 1)), ElementStatus::Error);

    let counts = page.translator.status_counts();
    assert_eq!(counts.translated, 1);
    assert_eq!(counts.error, 1);
    println!("✅ Partial failure isolation passed");
}

/// 出错的元素在下次整页翻译时重试
#[tokio::test]
async fn test_error_elements_retry_on_next_pass() {
    let model = MockModel::new(|text, index| {
        if index == 0 {
            Err(TranslationError::NetworkError("connection reset".to_string()))
        } else {
            Ok(format!("<text>{}</text>", common::fake_translate(text)))
        }
    });
    let page = TestPage::new("<p>Hello world</p>", model);

    assert_eq!(page.translator.translate_page(None, None).await.unwrap().failed, 1);
    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(page.translator.status(&page.element("p", 0)), ElementStatus::Translated);
    println!("✅ Error retry on next pass passed");
}

/// 重试策略只对可重试错误生效
#[tokio::test]
async fn test_retry_policy_recovers_transient_errors() {
    let mut config = AppConfig::default();
    config.retry.max_retries = 2;
    config.retry.base_delay_ms = 1;

    let model = MockModel::new(|text, index| {
        if index < 2 {
            Err(TranslationError::ApiError {
                status: 503,
                message: "busy".to_string(),
            })
        } else {
            Ok(format!("<text>{}</text>", common::fake_translate(text)))
        }
    });
    let page = TestPage::with_config("<p>Hello world</p>", model, config.clone());
    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(page.model.calls(), 3);

    // 4xx 不重试
    let model = MockModel::new(|_, _| {
        Err(TranslationError::ApiError {
            status: 401,
            message: "unauthorized".to_string(),
        })
    });
    let page = TestPage::with_config("<p>Hello world</p>", model, config);
    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(page.model.calls(), 1);
    println!("✅ Retry policy passed");
}

/// 模型返回空内容视为失败
#[tokio::test]
async fn test_empty_model_output_fails() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::new(|_, _| Ok("<text></text>".to_string())));

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(page.blocks().is_empty());
    println!("✅ Empty output handling passed");
}

/// 替换模式下缺失的段保留原文
#[tokio::test]
async fn test_replace_missing_segment_keeps_original() {
    let model = MockModel::new(|_, _| Ok(r#"<nws-text id="0">你好</nws-text>"#.to_string()));
    let page = TestPage::new("<p>Hello <b>Bold</b> world</p>", model);

    page.translator
        .translate_page(None, Some(TranslationMode::Replace))
        .await
        .unwrap();

    assert_eq!(text_content(&page.element("p", 0)), "你好 Bold world");
    println!("✅ Missing segment handling passed");
}

/// 通过真实 HTTP 客户端的端到端错误
#[tokio::test]
async fn test_http_endpoint_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(r#"{"error": {"message": "model crashed"}}"#),
        )
        .mount(&mock_server)
        .await;

    let mut app_config = AppConfig::default();
    app_config.model = ModelConfig {
        endpoint: format!("{}/v1/chat/completions", mock_server.uri()),
        ..Default::default()
    };
    let config = Arc::new(
        ConfigManager::with_store(app_config, Arc::new(MemoryStore::new())).unwrap(),
    );
    let client = Arc::new(HttpModelClient::new(config.model_config().clone()).unwrap());
    let service = Arc::new(TranslationService::new(client, &config));

    let dom = parse_html("<p>Hello world</p>").unwrap();
    let translator = PageTranslator::new(
        dom.document.clone(),
        Rc::new(StaticPageHost::new("about:blank")),
        config,
        service,
    );

    let report = translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(translator.service().queue_stats().failed, 1);
    println!("✅ HTTP endpoint errors passed");
}

/// 无效配置被拒绝
#[test]
fn test_invalid_configuration_rejected() {
    let mut config = AppConfig::default();
    config.translation.target_language = "   ".to_string();
    assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));

    let mut config = AppConfig::default();
    config.cache.capacity = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.model.endpoint = "not a url".to_string();
    assert!(ConfigManager::with_store(config, Arc::new(MemoryStore::new())).is_err());

    assert!("sideways".parse::<TranslationMode>().is_err());
    println!("✅ Invalid configuration rejected");
}

/// 错误分类与统计
#[test]
fn test_error_classification_and_stats() {
    let errors = vec![
        TranslationError::NetworkError("reset".to_string()),
        TranslationError::ApiError {
            status: 429,
            message: "slow down".to_string(),
        },
        TranslationError::ApiError {
            status: 404,
            message: "missing".to_string(),
        },
        TranslationError::BatchMismatch {
            expected: 3,
            actual: 2,
        },
        TranslationError::QueueClosed,
    ];

    assert!(errors[0].is_retryable());
    assert!(errors[1].is_retryable());
    assert!(!errors[2].is_retryable());
    assert_eq!(errors[3].category(), ErrorCategory::ModelOutput);
    assert_eq!(errors[4].severity(), ErrorSeverity::Critical);

    let mut stats = ErrorStats::default();
    for error in &errors {
        stats.record_error(error);
    }
    assert_eq!(stats.total_errors, 5);
    assert_eq!(stats.retryable_errors, 3);
    assert_eq!(stats.critical_errors, 1);
    assert_eq!(stats.by_category.get(&ErrorCategory::Endpoint), Some(&2));

    let with_context = TranslationError::DomError("detached".to_string()).with_context("p#intro");
    assert!(with_context.to_string().contains("p#intro"));
    println!("✅ Error classification passed");
}

/// 设置目录不可写
struct ReadOnlyStore;

impl SettingsStore for ReadOnlyStore {
    fn load(&self, _module: &str) -> TranslationResult<Option<serde_json::Value>> {
        Ok(None)
    }

    fn save(&self, _module: &str, _value: &serde_json::Value) -> TranslationResult<()> {
        Err(TranslationError::StorageError("permission denied".to_string()))
    }
}

/// 设置无法保存时页面翻译照常进行
#[tokio::test]
async fn test_unwritable_settings_do_not_abort_translation() {
    let page = TestPage::with_store(
        "<p>Hello world</p>",
        MockModel::dictionary(),
        AppConfig::default(),
        Arc::new(ReadOnlyStore),
    );

    let report = page
        .translator
        .translate_page(Some("日本語"), Some(TranslationMode::Replace))
        .await
        .expect("settings write failure must not abort");

    assert_eq!(report.translated, 1);
    let config = page.config.config();
    assert_eq!(config.target_language, "日本語");
    assert_eq!(config.translation_mode, TranslationMode::Replace);
    println!("✅ Unwritable settings passed");
}
