// 集成测试公共模块
//
// 提供测试用的模型、页面环境和断言辅助

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, RcDom};

use nws_translator::parsers::html::dom::{find_body, find_elements, has_class, parse_html};
use nws_translator::translation::config::{AppConfig, MemoryStore, SettingsStore};
use nws_translator::translation::core::client::{ChatMessage, ModelClient};
use nws_translator::translation::{
    ConfigManager, PageTranslator, StaticPageHost, TranslationError, TranslationResult,
    TranslationService,
};

/// 假翻译：按词表替换英文单词
pub fn fake_translate(text: &str) -> String {
    const WORDS: &[(&str, &str)] = &[
        ("Hello", "你好"),
        ("world", "世界"),
        ("Welcome", "欢迎"),
        ("Nested", "嵌套"),
        ("paragraph", "段落"),
        ("story", "故事"),
        ("Second", "第二"),
        ("First", "第一"),
        ("Bold", "粗体"),
    ];

    let mut translated = text.to_string();
    for (english, chinese) in WORDS {
        translated = translated.replace(english, chinese);
    }
    translated
}

type Responder = dyn Fn(&str, usize) -> TranslationResult<String> + Send + Sync;

/// 可编程的模型客户端
///
/// 响应函数收到去掉 `<text>` 包装的用户文本和调用序号（从 0 开始）。
pub struct MockModel {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, usize) -> TranslationResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// 按词表翻译的模型
    pub fn dictionary() -> Self {
        Self::new(|text, _| Ok(format!("<text>{}</text>", fake_translate(text))))
    }

    /// 总是失败的模型
    pub fn failing() -> Self {
        Self::new(|_, _| {
            Err(TranslationError::ApiError {
                status: 500,
                message: "upstream unavailable".to_string(),
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|inputs| inputs.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn call_model(
        &self,
        messages: Vec<ChatMessage>,
        _model: Option<&str>,
    ) -> TranslationResult<String> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let text = messages
            .last()
            .map(|m| m.content.replace("<text>", "").replace("</text>", ""))
            .unwrap_or_default();
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(text.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = (self.responder)(&text, index);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// 页面测试环境
pub struct TestPage {
    pub dom: RcDom,
    pub host: Rc<StaticPageHost>,
    pub config: Arc<ConfigManager>,
    pub model: Arc<MockModel>,
    pub translator: PageTranslator,
}

impl TestPage {
    pub fn new(html: &str, model: MockModel) -> Self {
        Self::with_config(html, model, AppConfig::default())
    }

    pub fn with_config(html: &str, model: MockModel, app_config: AppConfig) -> Self {
        Self::with_store(html, model, app_config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(
        html: &str,
        model: MockModel,
        app_config: AppConfig,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        let dom = parse_html(html).expect("HTML should parse");
        let host = Rc::new(StaticPageHost::new("https://example.com/article"));
        let config = Arc::new(
            ConfigManager::with_store(app_config, store).expect("default config should be valid"),
        );
        let model = Arc::new(model);
        let service = Arc::new(TranslationService::new(model.clone(), &config));
        let translator = PageTranslator::new(
            dom.document.clone(),
            host.clone(),
            Arc::clone(&config),
            service,
        );

        Self {
            dom,
            host,
            config,
            model,
            translator,
        }
    }

    pub fn body(&self) -> Handle {
        find_body(&self.dom.document).expect("document should have a body")
    }

    /// 按标签取第 `index` 个元素
    pub fn element(&self, tag: &str, index: usize) -> Handle {
        find_elements(&self.dom.document, tag)
            .into_iter()
            .nth(index)
            .unwrap_or_else(|| panic!("missing <{}> #{}", tag, index))
    }

    /// 注入的双语块
    pub fn blocks(&self) -> Vec<Handle> {
        find_elements(&self.dom.document, "div")
            .into_iter()
            .filter(|div| has_class(div, "nws-translation-block"))
            .collect()
    }

    pub fn tooltips(&self) -> Vec<Handle> {
        find_elements(&self.dom.document, "div")
            .into_iter()
            .filter(|div| has_class(div, "nws-selection-tooltip"))
            .collect()
    }
}

/// 简单的英文测试页面
pub fn simple_english_page() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title><style>p { color: red; }</style></head>
<body>
  <h1>Welcome to the story</h1>
  <p>Hello world, this is the first paragraph.</p>
  <p>Second paragraph with <b>Bold</b> words inside.</p>
  <script>console.log("Hello world");</script>
  <pre>fn main() {}</pre>
</body>
</html>"#
}
