//! 页面翻译编排器
//!
//! `PageTranslator` 持有单个文档的翻译会话：
//!
//! - 整页扫描：视口（含边距）内的元素立即翻译，其余登记为待翻译，滚动进入范围后再处理
//! - DOM 变更：驱逐文本缓存、标记脏区，防抖 1 秒后只对脏区重新扫描
//! - 地址轮询：地址变化后稍等片刻重新扫描
//! - 选区翻译：与元素状态机无关，通过提示框展示结果
//!
//! DOM 侧是单线程的（`Rc` 节点），编排器本身作为本地 future 运行；
//! 任何 `RefCell` 借用都不会跨越 `.await`。

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use futures::future::{join_all, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use markup5ever_rcdom::{Handle, Node};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::patcher::{is_injected, DomPatcher};
use super::prompt::TaskKind;
use super::service::TranslationService;
use super::state::{ElementRegistry, Registration, StatusCounts};
use crate::parsers::html::dom::{
    find_body, get_node_name, get_parent_node, is_connected, is_element, node_key, parent_element,
};
use crate::translation::config::{constants, ConfigManager, TranslationConfig, TranslationMode};
use crate::translation::error::{helpers::log_error, TranslationError, TranslationResult};
use crate::translation::host::{PageHost, Rect};
use crate::translation::pipeline::{
    build_placeholder_text, build_replace_payload, extract_replace_segments, normalize_whitespace,
    DomSelector, ElementStatus, TargetLanguage, TextCache,
};

// ============================================================================
// 事件与报告
// ============================================================================

/// DOM 变更记录（由嵌入方的变更观察器产生）
#[derive(Debug, Clone)]
pub enum MutationRecord {
    ChildList {
        target: Handle,
        added: Vec<Handle>,
        removed: Vec<Handle>,
    },
    CharacterData {
        target: Handle,
    },
}

/// 驱动 [`PageTranslator::run`] 的页面事件
#[derive(Debug)]
pub enum PageEvent {
    TranslatePage {
        language: Option<String>,
        mode: Option<TranslationMode>,
    },
    Mutations(Vec<MutationRecord>),
    ViewportChanged,
    Selection {
        text: String,
        rect: Rect,
    },
    Stop,
}

/// 一次扫描或一段会话的结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageReport {
    pub translated: usize,
    pub failed: usize,
    /// 已在翻译中、已按相同模式翻译或没有可译内容
    pub skipped: usize,
    /// 不在视口范围内，等待滚动
    pub deferred: usize,
    /// 会话结束后才返回的结果
    pub discarded: usize,
}

impl PageReport {
    pub fn merge(&mut self, other: PageReport) {
        self.translated += other.translated;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.deferred += other.deferred;
        self.discarded += other.discarded;
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Translated => self.translated += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Discarded => self.discarded += 1,
        }
    }
}

/// 单个元素的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Translated,
    Failed,
    Skipped,
    Discarded,
}

// ============================================================================
// 会话状态
// ============================================================================

#[derive(Default)]
struct Session {
    active: bool,
    /// stop 时递增，旧会话的结果据此丢弃
    epoch: u64,
    language: String,
    pending: Vec<(usize, Weak<Node>)>,
    dirty: Vec<(usize, Weak<Node>)>,
    debounce_deadline: Option<Instant>,
    navigation_deadline: Option<Instant>,
    last_location: String,
}

fn push_unique(list: &mut Vec<(usize, Weak<Node>)>, node: &Handle) {
    let key = node_key(node);
    if !list.iter().any(|(existing, _)| *existing == key) {
        list.push((key, Rc::downgrade(node)));
    }
}

// ============================================================================
// 编排器
// ============================================================================

/// 页面翻译编排器
pub struct PageTranslator {
    document: Handle,
    host: Rc<dyn PageHost>,
    config: Arc<ConfigManager>,
    service: Arc<TranslationService>,
    text_cache: Rc<TextCache>,
    selector: DomSelector,
    registry: RefCell<ElementRegistry>,
    patcher: DomPatcher,
    session: RefCell<Session>,
}

impl PageTranslator {
    pub fn new(
        document: Handle,
        host: Rc<dyn PageHost>,
        config: Arc<ConfigManager>,
        service: Arc<TranslationService>,
    ) -> Self {
        let text_cache = Rc::new(TextCache::new());
        let session = Session {
            last_location: host.location(),
            language: config.config().target_language,
            ..Session::default()
        };

        Self {
            document,
            host,
            config,
            service,
            selector: DomSelector::new(Rc::clone(&text_cache)),
            text_cache,
            registry: RefCell::new(ElementRegistry::new()),
            patcher: DomPatcher::new(),
            session: RefCell::new(session),
        }
    }

    pub fn document(&self) -> &Handle {
        &self.document
    }

    pub fn patcher(&self) -> &DomPatcher {
        &self.patcher
    }

    pub fn text_cache(&self) -> &TextCache {
        &self.text_cache
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    pub fn is_active(&self) -> bool {
        self.session.borrow().active
    }

    pub fn status(&self, element: &Handle) -> ElementStatus {
        self.registry.borrow().status(element)
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.registry.borrow().counts()
    }

    pub fn pending_count(&self) -> usize {
        self.session.borrow().pending.len()
    }

    pub fn has_dirty_roots(&self) -> bool {
        !self.session.borrow().dirty.is_empty()
    }

    fn root(&self) -> Handle {
        find_body(&self.document).unwrap_or_else(|| self.document.clone())
    }

    fn epoch(&self) -> u64 {
        self.session.borrow().epoch
    }

    fn is_stale(&self, epoch: u64) -> bool {
        let session = self.session.borrow();
        !session.active || session.epoch != epoch
    }

    // ========================================================================
    // 设置
    // ========================================================================

    pub fn set_selection_translation_enabled(&self, enabled: bool) -> TranslationResult<()> {
        self.config.set_selection_translation_enabled(enabled)?;
        if !enabled {
            self.patcher.remove_tooltips();
        }
        Ok(())
    }

    /// 关闭时，之后的扫描不再区分视口；已登记的待翻译元素由 [`Self::flush_pending`] 处理
    pub fn set_viewport_translation_enabled(&self, enabled: bool) -> TranslationResult<()> {
        self.config.set_viewport_translation_enabled(enabled)
    }

    // ========================================================================
    // 整页翻译
    // ========================================================================

    /// 开始（或继续）整页翻译
    pub async fn translate_page(
        &self,
        language: Option<&str>,
        mode: Option<TranslationMode>,
    ) -> TranslationResult<PageReport> {
        if let Some(language) = language {
            self.config.set_target_language(language)?;
        }
        if let Some(mode) = mode {
            self.config.set_translation_mode(mode)?;
        }

        let config = self.config.config();
        let language_changed = {
            let mut session = self.session.borrow_mut();
            let changed = session.language != config.target_language;
            session.language = config.target_language.clone();
            session.active = true;
            session.last_location = self.host.location();
            changed
        };

        // 目标语言变化后，已有译文全部作废
        if language_changed {
            self.reset_translations();
            self.session.borrow_mut().active = true;
        }

        tracing::info!(
            "开始页面翻译: 目标语言 {}, 模式 {}",
            config.target_language,
            config.translation_mode
        );

        self.registry.borrow_mut().purge_stale(&self.document);
        let report = self.scan_and_translate(&self.root()).await;

        tracing::info!(
            "页面翻译完成: 成功 {}, 失败 {}, 跳过 {}, 待视口 {}",
            report.translated,
            report.failed,
            report.skipped,
            report.deferred
        );
        Ok(report)
    }

    /// 扫描 `root` 并翻译范围内的候选元素
    async fn scan_and_translate(&self, root: &Handle) -> PageReport {
        let config = self.config.config();
        let candidates = self.selector.collect(root, self.host.as_ref(), &config);
        let viewport = self.host.viewport();

        let mut report = PageReport::default();
        let mut immediate = Vec::new();
        {
            let mut registry = self.registry.borrow_mut();
            for candidate in candidates {
                let element = match candidate.element() {
                    Some(element) => element,
                    None => continue,
                };

                if registry.register(candidate) == Registration::Changed {
                    match registry.status(&element) {
                        ElementStatus::Translated | ElementStatus::Error => {
                            tracing::debug!("元素文本已变化，重新翻译");
                            self.patcher.remove(&element);
                            registry.reset(&element);
                        }
                        _ => {}
                    }
                }

                let done = registry.get(&element).map_or(false, |entry| {
                    entry.status == ElementStatus::Translating
                        || (entry.status == ElementStatus::Translated
                            && entry.mode == Some(config.translation_mode))
                });
                if done {
                    report.skipped += 1;
                } else if self.should_translate_now(&element, &viewport, &config) {
                    immediate.push(element);
                } else {
                    push_unique(&mut self.session.borrow_mut().pending, &element);
                    report.deferred += 1;
                }
            }
        }

        let mode = config.translation_mode;
        let outcomes = join_all(
            immediate
                .iter()
                .map(|element| self.translate_element(element, mode)),
        )
        .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    fn should_translate_now(&self, element: &Handle, viewport: &Rect, config: &TranslationConfig) -> bool {
        if !config.enable_viewport_translation {
            return true;
        }

        let mut rect = self.host.bounding_rect(element);
        if rect.is_empty() {
            rect = self.host.text_range_rect(element);
        }
        rect.intersects(viewport, config.viewport_margin)
    }

    // ========================================================================
    // 单个元素
    // ========================================================================

    /// 翻译单个元素；正在翻译或已按相同模式翻译时跳过
    pub async fn translate_element(&self, element: &Handle, mode: TranslationMode) -> Outcome {
        if !self.registry.borrow_mut().begin(element, mode) {
            return Outcome::Skipped;
        }

        let epoch = self.epoch();
        self.patcher.remove(element);

        let target = TargetLanguage::parse(&self.config.config().target_language);
        let result = match mode {
            TranslationMode::Bilingual => self.translate_bilingual(element, &target, epoch).await,
            TranslationMode::Replace => self.translate_replace(element, &target, epoch).await,
        };

        match result {
            Ok(Outcome::Translated) => {
                self.registry.borrow_mut().finish(element);
                Outcome::Translated
            }
            Ok(Outcome::Skipped) => {
                self.registry.borrow_mut().reset(element);
                Outcome::Skipped
            }
            Ok(other) => other,
            Err(_) if self.is_stale(epoch) => Outcome::Discarded,
            Err(err) => {
                log_error(&err);
                self.registry.borrow_mut().fail(element, err.to_string());
                Outcome::Failed
            }
        }
    }

    async fn translate_bilingual(
        &self,
        element: &Handle,
        target: &TargetLanguage,
        epoch: u64,
    ) -> TranslationResult<Outcome> {
        let (text, placeholders) = build_placeholder_text(element);
        if text.trim().is_empty() {
            return Ok(Outcome::Skipped);
        }

        let kind = if placeholders.is_empty() {
            TaskKind::Plain
        } else {
            TaskKind::InlineHtml
        };

        tracing::debug!("双语翻译: {} 字符, {} 个占位符", text.chars().count(), placeholders.len());
        let translated = self.service.translate(&text, target, kind).await?;

        if self.is_stale(epoch) {
            return Ok(Outcome::Discarded);
        }
        if translated.trim().is_empty() {
            return Err(TranslationError::InvalidResponse);
        }

        self.patcher
            .apply_bilingual(element, &translated, &placeholders, self.host.as_ref())?;
        Ok(Outcome::Translated)
    }

    async fn translate_replace(
        &self,
        element: &Handle,
        target: &TargetLanguage,
        epoch: u64,
    ) -> TranslationResult<Outcome> {
        let payload = build_replace_payload(element, self.selector.classifier(), target, &self.text_cache);
        if payload.is_empty() {
            return Ok(Outcome::Skipped);
        }

        tracing::debug!("替换翻译: {} 个文本段", payload.segments.len());
        let mut translated = self
            .service
            .translate(&payload.html, target, TaskKind::ReplacePayload)
            .await?;

        if !Self::has_target_script(&translated, target) {
            tracing::warn!("译文不含{}字符，重试一次", target.prompt_name());
            self.service
                .forget(&payload.html, target, TaskKind::ReplacePayload);
            translated = self
                .service
                .translate(&payload.html, target, TaskKind::ReplacePayload)
                .await?;

            if !Self::has_target_script(&translated, target) {
                tracing::warn!(
                    "{}",
                    TranslationError::LanguageMismatch {
                        expected: target.prompt_name().to_string()
                    }
                );
            }
        }

        if self.is_stale(epoch) {
            return Ok(Outcome::Discarded);
        }

        self.patcher.apply_replace(element, &payload, &translated);
        Ok(Outcome::Translated)
    }

    fn has_target_script(translated: &str, target: &TargetLanguage) -> bool {
        let segments = extract_replace_segments(translated);
        if segments.is_empty() {
            return target.matches_script(translated);
        }
        segments.values().any(|text| target.matches_script(text))
    }

    // ========================================================================
    // 视口
    // ========================================================================

    /// 视口变化后翻译进入范围的待翻译元素
    pub async fn on_viewport_changed(&self) -> PageReport {
        if !self.is_active() {
            return PageReport::default();
        }

        let config = self.config.config();
        let viewport = self.host.viewport();

        let ready = self.take_pending(|element| self.should_translate_now(element, &viewport, &config));
        self.translate_all(&ready, config.translation_mode).await
    }

    /// 不区分视口，翻译全部待翻译元素
    pub async fn flush_pending(&self) -> PageReport {
        if !self.is_active() {
            return PageReport::default();
        }

        let ready = self.take_pending(|_| true);
        self.translate_all(&ready, self.config.config().translation_mode)
            .await
    }

    fn take_pending<F>(&self, mut ready: F) -> Vec<Handle>
    where
        F: FnMut(&Handle) -> bool,
    {
        let mut session = self.session.borrow_mut();
        let mut taken = Vec::new();
        let document = &self.document;

        session.pending.retain(|(_, weak)| match weak.upgrade() {
            Some(element) if is_connected(document, &element) => {
                if ready(&element) {
                    taken.push(element);
                    false
                } else {
                    true
                }
            }
            _ => false,
        });
        taken
    }

    async fn translate_all(&self, elements: &[Handle], mode: TranslationMode) -> PageReport {
        let mut report = PageReport::default();
        let outcomes = join_all(elements.iter().map(|element| self.translate_element(element, mode))).await;
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    // ========================================================================
    // DOM 变更
    // ========================================================================

    /// 处理一条变更记录，返回是否产生了脏区
    pub fn on_mutation(&self, record: &MutationRecord) -> bool {
        if !self.is_active() {
            return false;
        }

        match record {
            MutationRecord::ChildList {
                target,
                added,
                removed,
            } => {
                if is_within_injected(target) {
                    return false;
                }

                let mut relevant = false;
                for node in added.iter().chain(removed.iter()) {
                    if is_injected(node) {
                        continue;
                    }
                    self.text_cache.evict_subtree(node);
                    relevant = true;
                }

                if relevant {
                    self.mark_dirty(target);
                }
                relevant
            }
            MutationRecord::CharacterData { target } => {
                if is_within_injected(target) || self.patcher.is_own_text_write(target) {
                    return false;
                }

                self.text_cache.evict(target);
                match parent_element(target) {
                    Some(parent) => self.mark_dirty(&parent),
                    None => self.mark_dirty(target),
                }
                true
            }
        }
    }

    fn mark_dirty(&self, node: &Handle) {
        let element = if is_element(node) {
            Some(node.clone())
        } else {
            parent_element(node)
        };

        if let Some(element) = element {
            let mut session = self.session.borrow_mut();
            push_unique(&mut session.dirty, &element);
            session.debounce_deadline = Some(Instant::now() + constants::MUTATION_DEBOUNCE);
        }
    }

    /// 对脏区重新扫描并翻译
    pub async fn flush_mutations(&self) -> PageReport {
        let dirty: Vec<Handle> = {
            let mut session = self.session.borrow_mut();
            session.debounce_deadline = None;
            session
                .dirty
                .drain(..)
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };

        if dirty.is_empty() || !self.is_active() {
            return PageReport::default();
        }

        let roots = self.expand_dirty_roots(dirty);
        tracing::debug!("处理 {} 个变更区域", roots.len());

        self.registry.borrow_mut().purge_stale(&self.document);
        self.text_cache.purge_stale();

        let mut report = PageReport::default();
        for root in roots {
            report.merge(self.scan_and_translate(&root).await);
        }
        report
    }

    /// 把脏节点扩展到最近的块级祖先，并去掉被其他根包含的根
    fn expand_dirty_roots(&self, dirty: Vec<Handle>) -> Vec<Handle> {
        let body = self.root();
        let mut seen = HashSet::new();
        let mut roots: Vec<Handle> = Vec::new();

        for node in dirty {
            if !is_connected(&self.document, &node) {
                continue;
            }

            let mut root = body.clone();
            let mut current = Some(node);
            while let Some(candidate) = current {
                if Rc::ptr_eq(&candidate, &body) {
                    break;
                }
                let tag = get_node_name(&candidate).unwrap_or("");
                if constants::BLOCK_TAGS.contains(&tag) {
                    root = candidate;
                    break;
                }
                current = get_parent_node(&candidate);
            }

            if seen.insert(node_key(&root)) {
                roots.push(root);
            }
        }

        let contained: Vec<bool> = roots
            .iter()
            .map(|root| {
                roots
                    .iter()
                    .any(|other| !Rc::ptr_eq(other, root) && is_connected(other, root))
            })
            .collect();

        roots
            .into_iter()
            .zip(contained)
            .filter(|(_, contained)| !contained)
            .map(|(root, _)| root)
            .collect()
    }

    // ========================================================================
    // 地址变化
    // ========================================================================

    /// 检查地址是否变化；变化时安排一次延迟重扫
    pub fn check_location(&self) -> bool {
        let location = self.host.location();
        let mut session = self.session.borrow_mut();
        if !session.active || session.last_location == location {
            return false;
        }

        tracing::info!("页面地址变化: {} -> {}", session.last_location, location);
        session.last_location = location;
        session.navigation_deadline = Some(Instant::now() + constants::NAVIGATION_SETTLE_DELAY);
        true
    }

    /// 地址变化稳定后重新扫描整页
    pub async fn on_navigation(&self) -> PageReport {
        self.session.borrow_mut().navigation_deadline = None;
        if !self.is_active() {
            return PageReport::default();
        }

        self.registry.borrow_mut().purge_stale(&self.document);
        self.text_cache.purge_stale();
        self.take_pending(|_| false);

        self.scan_and_translate(&self.root()).await
    }

    // ========================================================================
    // 选区翻译
    // ========================================================================

    /// 翻译选中文本并用提示框展示；未开启或文本不需要翻译时返回 `None`
    pub async fn translate_selection(&self, text: &str, rect: Rect) -> TranslationResult<Option<String>> {
        let config = self.config.config();
        if !config.enable_selection_translation {
            return Ok(None);
        }

        let text = normalize_whitespace(text);
        if !self.selector.classifier().should_translate(&text, &config) {
            return Ok(None);
        }

        self.patcher.remove_tooltips();
        let tooltip = self.patcher.show_tooltip(&self.root(), rect);
        let target = TargetLanguage::parse(&config.target_language);

        match self.service.translate(&text, &target, TaskKind::Plain).await {
            Ok(translated) => {
                self.patcher.update_tooltip(&tooltip, &translated);
                Ok(Some(translated))
            }
            Err(err) => {
                tracing::warn!("选区翻译失败: {}", err);
                self.patcher
                    .update_tooltip(&tooltip, &format!("翻译失败: {}", err));
                Err(err)
            }
        }
    }

    // ========================================================================
    // 停止
    // ========================================================================

    /// 停止会话并撤销全部注入；在途请求的结果会被丢弃
    pub fn stop(&self) {
        self.reset_translations();
        tracing::info!("页面翻译已停止");
    }

    fn reset_translations(&self) {
        {
            let mut session = self.session.borrow_mut();
            session.active = false;
            session.epoch += 1;
            session.pending.clear();
            session.dirty.clear();
            session.debounce_deadline = None;
            session.navigation_deadline = None;
        }

        let removed = self.patcher.remove_all(&self.document);
        self.registry.borrow_mut().reset_all();
        tracing::debug!("已撤销 {} 处注入", removed);
    }

    // ========================================================================
    // 事件循环
    // ========================================================================

    /// 事件循环：处理页面事件、变更防抖、地址轮询和设置变化，直到事件通道关闭
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<PageEvent>) -> PageReport {
        let mut settings = self.config.subscribe();
        let mut poll = time::interval(constants::URL_POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut work: FuturesUnordered<LocalBoxFuture<'_, PageReport>> = FuturesUnordered::new();
        let mut total = PageReport::default();

        loop {
            let (debounce, navigation) = {
                let session = self.session.borrow();
                (session.debounce_deadline, session.navigation_deadline)
            };

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event, &mut work),
                    None => break,
                },
                Some(report) = work.next(), if !work.is_empty() => total.merge(report),
                _ = time::sleep_until(debounce.unwrap_or_else(Instant::now)), if debounce.is_some() => {
                    self.session.borrow_mut().debounce_deadline = None;
                    work.push(self.flush_mutations().boxed_local());
                }
                _ = time::sleep_until(navigation.unwrap_or_else(Instant::now)), if navigation.is_some() => {
                    self.session.borrow_mut().navigation_deadline = None;
                    work.push(self.on_navigation().boxed_local());
                }
                _ = poll.tick() => {
                    self.check_location();
                }
                changed = settings.changed() => {
                    if changed.is_ok() {
                        let current = settings.borrow_and_update().clone();
                        self.apply_settings(&current, &mut work);
                    }
                }
            }
        }

        while let Some(report) = work.next().await {
            total.merge(report);
        }

        // 通道关闭后不再等计时器，剩余的导航和脏区直接处理
        if self.session.borrow().navigation_deadline.is_some() {
            total.merge(self.on_navigation().await);
        }
        if self.has_dirty_roots() {
            total.merge(self.flush_mutations().await);
        }
        total
    }

    fn dispatch<'a>(&'a self, event: PageEvent, work: &mut FuturesUnordered<LocalBoxFuture<'a, PageReport>>) {
        match event {
            PageEvent::TranslatePage { language, mode } => work.push(
                async move {
                    self.translate_page(language.as_deref(), mode)
                        .await
                        .unwrap_or_else(|err| {
                            tracing::error!("页面翻译启动失败: {}", err);
                            PageReport::default()
                        })
                }
                .boxed_local(),
            ),
            PageEvent::Mutations(records) => {
                let marked = records
                    .iter()
                    .filter(|record| self.on_mutation(record))
                    .count();
                if marked > 0 {
                    tracing::debug!("{} 条变更记录标记了脏区", marked);
                }
            }
            PageEvent::ViewportChanged => work.push(self.on_viewport_changed().boxed_local()),
            PageEvent::Selection { text, rect } => work.push(
                async move {
                    // 失败已在提示框和日志中体现
                    let _ = self.translate_selection(&text, rect).await;
                    PageReport::default()
                }
                .boxed_local(),
            ),
            PageEvent::Stop => self.stop(),
        }
    }

    fn apply_settings<'a>(
        &'a self,
        settings: &TranslationConfig,
        work: &mut FuturesUnordered<LocalBoxFuture<'a, PageReport>>,
    ) {
        self.service.set_concurrent_limit(settings.concurrent_limit);
        self.service.set_max_chunk_size(settings.max_chunk_size);

        if !settings.enable_selection_translation {
            self.patcher.remove_tooltips();
        }
        if !settings.enable_viewport_translation && self.pending_count() > 0 {
            work.push(self.flush_pending().boxed_local());
        }
    }
}

/// 节点或其祖先是否为注入节点
fn is_within_injected(node: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if is_element(&n) && is_injected(&n) {
            return true;
        }
        current = get_parent_node(&n);
    }
    false
}
