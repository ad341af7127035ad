//! 提示词构建

use serde::{Deserialize, Serialize};

use super::client::ChatMessage;
use crate::translation::pipeline::TargetLanguage;

/// 翻译任务类型，决定提示词和缓存键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// 纯文本
    #[default]
    Plain,
    /// 带占位符令牌的双语文本
    InlineHtml,
    /// 替换模式的 `<nws-text>` 载荷
    ReplacePayload,
    /// JSON 字符串数组
    BatchArray,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Plain => "plain",
            TaskKind::InlineHtml => "inline-html",
            TaskKind::ReplacePayload => "replace-payload",
            TaskKind::BatchArray => "batch-array",
        }
    }
}

/// 构建发送给模型的消息
pub fn build_messages(text: &str, target: &TargetLanguage, kind: TaskKind) -> Vec<ChatMessage> {
    let language = target.prompt_name();

    let mut system = format!(
        "You are a professional translator. Translate the user's text into {language}. \
         Output only the translation, wrapped in <text></text>, without explanations.",
    );

    match kind {
        TaskKind::Plain => {}
        TaskKind::InlineHtml => system.push_str(
            " The text contains markers like [[nws-tag-0-open]] and [[nws-tag-0-close]]. \
             Keep every marker exactly as written and place it around the translated words it \
             belongs to. Keep line breaks and the paragraph separator %% unchanged.",
        ),
        TaskKind::ReplacePayload => system.push_str(
            " The text is an HTML fragment. Translate only the content inside each \
             <nws-text id=\"N\"> element, keep every element and its id attribute, and keep all \
             other tags unchanged.",
        ),
        TaskKind::BatchArray => system.push_str(
            " The text is a JSON array of strings. Return a JSON array with the same number of \
             items, each item translated, in the same order.",
        ),
    }

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("<text>{}</text>", text)),
    ]
}
