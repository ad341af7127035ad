//! 翻译管道集成测试
//!
//! 从解析页面到写回 DOM 的端到端流程

use std::time::Duration;

use nws_translator::parsers::html::dom::{append_child, new_element, new_text, set_text, text_content};
use nws_translator::parsers::html::serializer::serialize_node;
use nws_translator::translation::config::AppConfig;
use nws_translator::translation::{ElementStatus, MutationRecord, PageEvent, Rect, TranslationMode};
use tokio::sync::mpsc;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{MockModel, TestPage};

/// 双语模式整页翻译
#[tokio::test]
async fn test_bilingual_page_translation() {
    let page = TestPage::new(common::simple_english_page(), MockModel::dictionary());

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 3, "h1 and two paragraphs");
    assert_eq!(report.failed, 0);

    let blocks = page.blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(text_content(&blocks[0]), "欢迎 to the 故事");

    // 行内标签原样还原
    let second = serialize_node(&blocks[2]);
    assert!(second.contains("<b>粗体</b>"), "inline tag restored: {}", second);

    // 脚本和代码块不发送给模型
    let inputs = page.model.inputs();
    assert!(inputs.iter().all(|input| !input.contains("console.log")));
    assert!(inputs.iter().all(|input| !input.contains("fn main")));

    // 原文保持不变
    assert_eq!(
        text_content(&page.element("p", 0)),
        "Hello world, this is the first paragraph."
    );
    println!("✅ Bilingual page translation passed - {} blocks", blocks.len());
}

/// 嵌套块只翻译叶子
#[tokio::test]
async fn test_leaf_reduction() {
    let page = TestPage::new(
        "<div>Intro <p>Nested paragraph text here.</p></div>",
        MockModel::dictionary(),
    );

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(page.model.inputs(), vec!["Nested paragraph text here.".to_string()]);
    assert_eq!(text_content(&page.blocks()[0]), "嵌套 段落 text here.");
    println!("✅ Leaf reduction passed");
}

/// 重复调用不产生重复译文
#[tokio::test]
async fn test_translate_page_is_idempotent() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());

    page.translator.translate_page(None, None).await.unwrap();
    let again = page.translator.translate_page(None, None).await.unwrap();

    assert_eq!(again.translated, 0);
    assert_eq!(again.skipped, 1);
    assert_eq!(page.blocks().len(), 1);
    assert_eq!(page.model.calls(), 1);
    println!("✅ Idempotent translate_page passed");
}

/// 替换模式写回文本节点并可撤销
#[tokio::test]
async fn test_replace_mode_and_revert() {
    let page = TestPage::new(
        "<p>Hello <b>Bold</b> world</p>",
        MockModel::dictionary(),
    );

    let report = page
        .translator
        .translate_page(None, Some(TranslationMode::Replace))
        .await
        .unwrap();
    assert_eq!(report.translated, 1);

    let p = page.element("p", 0);
    assert_eq!(text_content(&p), "你好 粗体 世界");
    assert!(page.blocks().is_empty());
    // 元素结构保持不变
    assert_eq!(page.element("b", 0).children.borrow().len(), 1);

    page.translator.stop();
    assert_eq!(text_content(&p), "Hello Bold world");
    assert_eq!(page.translator.status(&p), ElementStatus::Untranslated);
    println!("✅ Replace mode and revert passed");
}

/// 替换模式译文不含目标文字时重试一次
#[tokio::test]
async fn test_replace_language_guard_retries_once() {
    let model = MockModel::new(|text, index| {
        if index == 0 {
            Ok(text.to_string())
        } else {
            Ok(common::fake_translate(text))
        }
    });
    let page = TestPage::new("<p>Hello world</p>", model);

    page.translator
        .translate_page(None, Some(TranslationMode::Replace))
        .await
        .unwrap();

    assert_eq!(page.model.calls(), 2);
    assert_eq!(text_content(&page.element("p", 0)), "你好 世界");
    println!("✅ Language guard retry passed");
}

/// 重试后仍不符合时照常写回
#[tokio::test]
async fn test_replace_language_guard_applies_after_second_miss() {
    let model = MockModel::new(|text, _| Ok(text.replace("world", "planet")));
    let page = TestPage::new("<p>Hello world</p>", model);

    let report = page
        .translator
        .translate_page(None, Some(TranslationMode::Replace))
        .await
        .unwrap();

    assert_eq!(report.translated, 1);
    assert_eq!(page.model.calls(), 2);
    assert_eq!(text_content(&page.element("p", 0)), "Hello planet");
    println!("✅ Language guard fallback passed");
}

/// 失败的元素标记为错误，不写入 DOM
#[tokio::test]
async fn test_failed_element_is_marked() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::failing());

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(page.blocks().is_empty());
    assert_eq!(page.translator.status(&page.element("p", 0)), ElementStatus::Error);
    println!("✅ Failed element handling passed");
}

/// 新增节点经过防抖后翻译
#[tokio::test]
async fn test_mutation_flush_translates_new_content() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());
    page.translator.translate_page(None, None).await.unwrap();

    let body = page.body();
    let added = new_element("p", &[]);
    append_child(&added, new_text("Second story arrives"));
    append_child(&body, added.clone());

    assert!(page.translator.on_mutation(&MutationRecord::ChildList {
        target: body,
        added: vec![added.clone()],
        removed: vec![],
    }));

    let report = page.translator.flush_mutations().await;
    assert_eq!(report.translated, 1);
    assert_eq!(page.blocks().len(), 2);
    assert_eq!(page.translator.status(&added), ElementStatus::Translated);
    assert!(!page.translator.has_dirty_roots());
    println!("✅ Mutation flush passed");
}

/// 页面改写已翻译元素的文本后重新翻译
#[tokio::test]
async fn test_changed_text_is_retranslated() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());
    page.translator.translate_page(None, None).await.unwrap();

    let p = page.element("p", 0);
    let text = p.children.borrow()[0].clone();
    set_text(&text, "First story");
    page.translator
        .on_mutation(&MutationRecord::CharacterData { target: text });

    let report = page.translator.flush_mutations().await;
    assert_eq!(report.translated, 1);
    let blocks = page.blocks();
    assert_eq!(blocks.len(), 1, "old block replaced");
    assert_eq!(text_content(&blocks[0]), "第一 故事");
    println!("✅ Changed text re-translation passed");
}

/// 视口外元素延迟到滚动后翻译
#[tokio::test]
async fn test_viewport_deferral() {
    let page = TestPage::new(
        "<p>Hello world</p><p>Second story far below</p>",
        MockModel::dictionary(),
    );
    let far = page.element("p", 1);
    page.host.set_rect(&far, Rect::new(0.0, 3000.0, 800.0, 20.0));

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(page.translator.pending_count(), 1);
    assert_eq!(page.translator.status(&far), ElementStatus::Untranslated);

    // 滚动但仍未进入范围
    page.host.scroll_to(1000.0);
    assert_eq!(page.translator.on_viewport_changed().await.translated, 0);

    page.host.scroll_to(2600.0);
    let report = page.translator.on_viewport_changed().await;
    assert_eq!(report.translated, 1);
    assert_eq!(page.translator.pending_count(), 0);
    assert_eq!(page.translator.status(&far), ElementStatus::Translated);
    println!("✅ Viewport deferral passed");
}

/// 关闭视口翻译后待翻译元素立即处理
#[tokio::test]
async fn test_flush_pending_without_viewport() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());
    let p = page.element("p", 0);
    page.host.set_rect(&p, Rect::new(0.0, 5000.0, 800.0, 20.0));

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.deferred, 1);

    let report = page.translator.flush_pending().await;
    assert_eq!(report.translated, 1);
    assert_eq!(page.blocks().len(), 1);
    println!("✅ Flush pending passed");
}

/// 选区翻译显示提示框
#[tokio::test]
async fn test_selection_tooltip() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());

    let translated = page
        .translator
        .translate_selection("Hello   world", Rect::new(10.0, 20.0, 100.0, 16.0))
        .await
        .unwrap();
    assert_eq!(translated.as_deref(), Some("你好 世界"));

    let tooltips = page.tooltips();
    assert_eq!(tooltips.len(), 1);
    assert_eq!(text_content(&tooltips[0]), "你好 世界");

    // 不需要翻译的选区不发请求
    let calls = page.model.calls();
    let skipped = page
        .translator
        .translate_selection("12345", Rect::default())
        .await
        .unwrap();
    assert!(skipped.is_none());
    assert_eq!(page.model.calls(), calls);

    page.translator.set_selection_translation_enabled(false).unwrap();
    let disabled = page
        .translator
        .translate_selection("Hello again", Rect::default())
        .await
        .unwrap();
    assert!(disabled.is_none());
    println!("✅ Selection tooltip passed");
}

/// 并发请求数不超过上限
#[tokio::test]
async fn test_queue_bound_limits_concurrency() {
    let mut config = AppConfig::default();
    config.translation.concurrent_limit = 2;

    let html: String = (0..8)
        .map(|i| format!("<p>Paragraph number {} says Hello</p>", i))
        .collect();
    let page = TestPage::with_config(
        &html,
        MockModel::dictionary().with_delay(Duration::from_millis(20)),
        config,
    );

    let report = page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(report.translated, 8);
    assert!(page.model.peak_concurrency() <= 2, "peak {}", page.model.peak_concurrency());
    assert!(page.translator.service().queue_stats().peak_active <= 2);
    println!("✅ Queue bound passed - peak {}", page.model.peak_concurrency());
}

/// 切换目标语言作废已有译文
#[tokio::test]
async fn test_language_change_resets() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());
    page.translator.translate_page(None, None).await.unwrap();
    assert_eq!(page.model.calls(), 1);

    let report = page.translator.translate_page(Some("日本語"), None).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(page.model.calls(), 2, "different language is a cache miss");
    assert_eq!(page.blocks().len(), 1);
    println!("✅ Language change passed");
}

/// 事件循环驱动整页翻译与停止
#[tokio::test]
async fn test_event_loop() {
    let page = TestPage::new("<p>Hello world</p><p>Second story</p>", MockModel::dictionary());
    let (tx, rx) = mpsc::unbounded_channel();

    tx.send(PageEvent::TranslatePage {
        language: None,
        mode: None,
    })
    .unwrap();
    drop(tx);

    let report = page.translator.run(rx).await;
    assert_eq!(report.translated, 2);
    assert_eq!(page.blocks().len(), 2);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(PageEvent::Stop).unwrap();
    drop(tx);
    page.translator.run(rx).await;

    assert!(page.blocks().is_empty());
    assert!(!page.translator.is_active());
    println!("✅ Event loop passed");
}

/// 事件循环中的防抖、地址轮询、视口和选区事件
#[tokio::test(start_paused = true)]
async fn test_event_loop_timers_and_events() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());
    let (tx, rx) = mpsc::unbounded_channel();
    let body = page.body();

    let driver = async {
        tx.send(PageEvent::TranslatePage {
            language: None,
            mode: None,
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(page.blocks().len(), 1);

        // 变更在防抖结束前不处理
        let added = new_element("p", &[]);
        append_child(&added, new_text("Second story arrives"));
        append_child(&body, added.clone());
        tx.send(PageEvent::Mutations(vec![MutationRecord::ChildList {
            target: body.clone(),
            added: vec![added.clone()],
            removed: vec![],
        }]))
        .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(page.blocks().len(), 1, "debounce still pending");
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(page.blocks().len(), 2);
        assert_eq!(page.translator.status(&added), ElementStatus::Translated);

        // 地址变化：轮询发现后等待稳定再重扫
        let unseen = new_element("p", &[]);
        append_child(&unseen, new_text("Welcome to the next story"));
        append_child(&body, unseen.clone());
        page.host.set_location("https://example.com/article?page=2");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(page.blocks().len(), 3);
        assert_eq!(page.translator.status(&unseen), ElementStatus::Translated);

        // 视口外的新元素等到滚动事件
        let far = new_element("p", &[]);
        append_child(&far, new_text("First story far below"));
        append_child(&body, far.clone());
        page.host.set_rect(&far, Rect::new(0.0, 3000.0, 800.0, 20.0));
        tx.send(PageEvent::Mutations(vec![MutationRecord::ChildList {
            target: body.clone(),
            added: vec![far.clone()],
            removed: vec![],
        }]))
        .unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(page.translator.pending_count(), 1);
        assert_eq!(page.translator.status(&far), ElementStatus::Untranslated);

        page.host.scroll_to(2600.0);
        tx.send(PageEvent::ViewportChanged).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(page.translator.pending_count(), 0);
        assert_eq!(page.translator.status(&far), ElementStatus::Translated);

        tx.send(PageEvent::Selection {
            text: "Hello world".to_string(),
            rect: Rect::new(10.0, 20.0, 100.0, 16.0),
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let tooltips = page.tooltips();
        assert_eq!(tooltips.len(), 1);
        assert_eq!(text_content(&tooltips[0]), "你好 世界");

        drop(tx);
    };

    let (report, ()) = tokio::join!(page.translator.run(rx), driver);
    assert_eq!(report.translated, 4);
    assert_eq!(page.blocks().len(), 4);
    println!("✅ Event loop timers passed");
}

/// 通道关闭时未到期的变更仍会处理
#[tokio::test]
async fn test_event_loop_flushes_mutations_on_close() {
    let page = TestPage::new("<p>Hello world</p>", MockModel::dictionary());
    page.translator.translate_page(None, None).await.unwrap();

    let body = page.body();
    let added = new_element("p", &[]);
    append_child(&added, new_text("Second story arrives"));
    append_child(&body, added.clone());

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(PageEvent::Mutations(vec![MutationRecord::ChildList {
        target: body,
        added: vec![added.clone()],
        removed: vec![],
    }]))
    .unwrap();
    drop(tx);

    let started = std::time::Instant::now();
    let report = page.translator.run(rx).await;
    assert!(started.elapsed() < Duration::from_secs(1), "no wait for the debounce timer");
    assert_eq!(report.translated, 1);
    assert_eq!(page.blocks().len(), 2);
    assert_eq!(page.translator.status(&added), ElementStatus::Translated);
    assert!(!page.translator.has_dirty_roots());
    println!("✅ Flush on close passed");
}

/// 内置表以外的目标语言不做文字系统检查
#[tokio::test]
async fn test_unlisted_language_skips_script_guard() {
    let model = MockModel::new(|text, _| Ok(text.replace("Hello world", "Xin chào thế giới")));
    let page = TestPage::new("<p>Hello world</p>", model);

    let report = page
        .translator
        .translate_page(Some("Vietnamese"), Some(TranslationMode::Replace))
        .await
        .unwrap();

    assert_eq!(report.translated, 1);
    assert_eq!(page.model.calls(), 1, "no language retry");
    assert_eq!(text_content(&page.element("p", 0)), "Xin chào thế giới");
    assert_eq!(page.config.config().target_language, "Vietnamese");
    println!("✅ Unlisted language passed");
}
