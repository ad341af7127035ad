//! 目标语言识别与文字系统检查

use std::borrow::Cow;
use std::fmt;

/// 文字系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptFamily {
    Han,
    Japanese,
    Korean,
    Cyrillic,
    Arabic,
    Hebrew,
    Greek,
    Thai,
    Devanagari,
    Latin,
    /// 表中没有的语言，不做文字系统检查
    Unknown,
}

impl ScriptFamily {
    /// 字符是否属于该文字系统
    pub fn contains(&self, c: char) -> bool {
        match self {
            ScriptFamily::Han => is_han(c),
            ScriptFamily::Japanese => is_kana(c) || is_han(c),
            ScriptFamily::Korean => is_hangul(c),
            ScriptFamily::Cyrillic => ('\u{0400}'..='\u{052f}').contains(&c),
            ScriptFamily::Arabic => ('\u{0600}'..='\u{06ff}').contains(&c)
                || ('\u{0750}'..='\u{077f}').contains(&c),
            ScriptFamily::Hebrew => ('\u{0590}'..='\u{05ff}').contains(&c),
            ScriptFamily::Greek => ('\u{0370}'..='\u{03ff}').contains(&c),
            ScriptFamily::Thai => ('\u{0e00}'..='\u{0e7f}').contains(&c),
            ScriptFamily::Devanagari => ('\u{0900}'..='\u{097f}').contains(&c),
            ScriptFamily::Latin => c.is_ascii_alphabetic()
                || ('\u{00c0}'..='\u{024f}').contains(&c),
            ScriptFamily::Unknown => true,
        }
    }
}

/// 翻译目标语言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLanguage {
    code: Cow<'static, str>,
    prompt_name: Cow<'static, str>,
    family: ScriptFamily,
}

/// (别名, 代码, 提示词中的名称, 文字系统)
const LANGUAGES: &[(&[&str], &str, &str, ScriptFamily)] = &[
    (
        &["中文", "简体中文", "汉语", "chinese", "zh", "zh-cn", "zh-hans", "zh_cn"],
        "zh-CN",
        "Simplified Chinese",
        ScriptFamily::Han,
    ),
    (
        &["繁體中文", "繁体中文", "zh-tw", "zh-hk", "zh-hant", "zh_tw", "traditional chinese"],
        "zh-TW",
        "Traditional Chinese",
        ScriptFamily::Han,
    ),
    (&["日本語", "日语", "japanese", "ja", "jp"], "ja", "Japanese", ScriptFamily::Japanese),
    (&["한국어", "韩语", "korean", "ko", "kr"], "ko", "Korean", ScriptFamily::Korean),
    (&["русский", "俄语", "russian", "ru"], "ru", "Russian", ScriptFamily::Cyrillic),
    (&["العربية", "阿拉伯语", "arabic", "ar"], "ar", "Arabic", ScriptFamily::Arabic),
    (&["עברית", "hebrew", "he"], "he", "Hebrew", ScriptFamily::Hebrew),
    (&["ελληνικά", "greek", "el"], "el", "Greek", ScriptFamily::Greek),
    (&["ไทย", "泰语", "thai", "th"], "th", "Thai", ScriptFamily::Thai),
    (&["हिन्दी", "hindi", "hi"], "hi", "Hindi", ScriptFamily::Devanagari),
    (&["english", "英语", "英文", "en"], "en", "English", ScriptFamily::Latin),
    (&["français", "francais", "法语", "french", "fr"], "fr", "French", ScriptFamily::Latin),
    (&["deutsch", "德语", "german", "de"], "de", "German", ScriptFamily::Latin),
    (&["español", "espanol", "西班牙语", "spanish", "es"], "es", "Spanish", ScriptFamily::Latin),
    (&["português", "葡萄牙语", "portuguese", "pt"], "pt", "Portuguese", ScriptFamily::Latin),
    (&["italiano", "意大利语", "italian", "it"], "it", "Italian", ScriptFamily::Latin),
];

impl TargetLanguage {
    /// 解析语言名称或代码
    ///
    /// 表中没有的语言原样交给模型，缓存代码也使用原始值；空值按简体中文处理。
    pub fn parse(value: &str) -> Self {
        if let Some(language) = Self::lookup(value) {
            return language;
        }

        let value = value.trim();
        if value.is_empty() {
            tracing::warn!("目标语言为空，按简体中文处理");
            return Self::chinese();
        }

        tracing::debug!("目标语言 '{}' 不在内置表中，跳过文字系统检查", value);
        Self {
            code: Cow::Owned(value.to_lowercase()),
            prompt_name: Cow::Owned(value.to_string()),
            family: ScriptFamily::Unknown,
        }
    }

    /// 严格查找
    pub fn lookup(value: &str) -> Option<Self> {
        let needle = value.trim().to_lowercase();
        LANGUAGES
            .iter()
            .find(|(aliases, code, _, _)| {
                aliases.iter().any(|alias| *alias == needle) || code.to_lowercase() == needle
            })
            .map(|(_, code, prompt_name, family)| Self {
                code: Cow::Borrowed(*code),
                prompt_name: Cow::Borrowed(*prompt_name),
                family: *family,
            })
    }

    pub fn chinese() -> Self {
        Self {
            code: Cow::Borrowed("zh-CN"),
            prompt_name: Cow::Borrowed("Simplified Chinese"),
            family: ScriptFamily::Han,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// 用于提示词的英文名称
    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn family(&self) -> ScriptFamily {
        self.family
    }

    pub fn is_chinese_family(&self) -> bool {
        self.family == ScriptFamily::Han
    }

    /// 译文中是否出现目标文字系统的字符
    pub fn matches_script(&self, text: &str) -> bool {
        self.family == ScriptFamily::Unknown || text.chars().any(|c| self.family.contains(c))
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.prompt_name, self.code)
    }
}

pub fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{f900}'..='\u{faff}'
        | '\u{20000}'..='\u{2a6df}')
}

pub fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309f}' | '\u{30a0}'..='\u{30ff}')
}

pub fn is_hangul(c: char) -> bool {
    matches!(c, '\u{ac00}'..='\u{d7af}' | '\u{1100}'..='\u{11ff}' | '\u{3130}'..='\u{318f}')
}

/// 汉字在字母数字字符中的占比
pub fn cjk_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut han = 0usize;
    for c in text.chars().filter(|c| c.is_alphanumeric()) {
        total += 1;
        if is_han(c) {
            han += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        han as f64 / total as f64
    }
}
