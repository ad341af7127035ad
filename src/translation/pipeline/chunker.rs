//! 文本分块与模型输出清理

use std::sync::OnceLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// 按句子边界把文本切成不超过 `max_chars` 个字符的块
///
/// 单个句子本身超长时单独成块，不在句中切断。
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in text.split_sentence_bounds() {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > max_chars && !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
            current.clear();
            current_len = 0;
        }

        current.push_str(sentence);
        current_len += sentence_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    tracing::debug!("文本分为 {} 块（上限 {} 字符）", chunks.len(), max_chars);
    chunks
}

/// 去掉模型常见的包装：`<text>` 标签、代码围栏、CRLF
pub fn clean_model_output(output: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    static WRAPPER: OnceLock<Regex> = OnceLock::new();

    let fence = FENCE.get_or_init(|| {
        Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\n?([\s\S]*?)\n?```$")
            .expect("code fence pattern must compile")
    });
    let wrapper = WRAPPER
        .get_or_init(|| Regex::new(r"</?text\s*>").expect("text wrapper pattern must compile"));

    let normalized = output.replace("\r\n", "\n").replace('\r', "\n");
    let mut cleaned = normalized.trim().to_string();

    if let Some(caps) = fence.captures(&cleaned) {
        cleaned = caps[1].trim().to_string();
    }

    wrapper.replace_all(&cleaned, "").trim().to_string()
}

/// 用单个空格拼接各块译文
pub fn join_chunks<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.as_ref().trim())
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
