//! CSS 解析器模块
//!
//! 此模块负责解析元素的内联 `style` 属性。翻译流程需要它来推导计算样式
//! （`display`、`visibility`、`opacity`、字体与颜色），以及为双语译文块生成
//! 与原文一致的样式声明。该模块使用 cssparser 库进行 CSS 语法解析。
//!
//! # 使用示例
//!
//! ```rust
//! use nws_translator::parsers::css::{get_style_property, parse_inline_style};
//!
//! let style = "display: none; color: rgb(1, 2, 3)";
//! assert_eq!(get_style_property(style, "display").as_deref(), Some("none"));
//! assert_eq!(parse_inline_style(style).len(), 2);
//! ```

use cssparser::{serialize_identifier, Parser, ParserInput, Token};

/// 解析内联样式声明列表
///
/// 返回 `(属性名, 值)` 列表，属性名统一小写，值保持原始写法（去掉首尾空白和
/// `!important` 标记）。无法识别的声明会被跳过而不是中断整个解析。
pub fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();

    loop {
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        let name = match token {
            Token::Ident(ref name) => name.to_ascii_lowercase(),
            Token::Semicolon => continue,
            _ => {
                skip_declaration(&mut parser);
                continue;
            }
        };

        if parser.expect_colon().is_err() {
            skip_declaration(&mut parser);
            continue;
        }

        let start = parser.position();
        let mut end = start;
        loop {
            let before = parser.position();
            let is_semicolon = match parser.next() {
                Ok(token) => matches!(token, Token::Semicolon),
                Err(_) => break,
            };
            if is_semicolon {
                end = before;
                break;
            }
            end = parser.position();
        }

        let raw = parser.slice(start..end).trim();
        let value = strip_important(raw);
        if !value.is_empty() {
            declarations.push((name, value.to_string()));
        }
    }

    declarations
}

/// 跳过当前声明的剩余部分（直到分号或输入结束）
fn skip_declaration(parser: &mut Parser) {
    loop {
        match parser.next() {
            Ok(Token::Semicolon) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

fn strip_important(value: &str) -> &str {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(pos) if lower[pos..].trim() == "!important" => value[..pos].trim_end(),
        _ => value,
    }
}

/// 获取某个属性的值，后出现的声明覆盖先出现的
pub fn get_style_property(style: &str, property: &str) -> Option<String> {
    parse_inline_style(style)
        .into_iter()
        .filter(|(name, _)| name == property)
        .map(|(_, value)| value)
        .last()
}

/// 解析 `opacity` 值（数字或百分比）
pub fn parse_opacity(value: &str) -> Option<f64> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    match parser.next() {
        Ok(Token::Number { value, .. }) => Some(*value as f64),
        Ok(Token::Percentage { unit_value, .. }) => Some(*unit_value as f64),
        _ => None,
    }
}

/// 格式化CSS标识符
///
/// 使用cssparser库的标准化函数来正确格式化CSS标识符，
/// 确保特殊字符被正确转义。
pub fn format_ident(ident: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_identifier(ident, &mut res);
    res = res.trim_end().to_string();
    res
}

/// 将声明列表重新拼成内联样式字符串
pub fn format_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{}: {}", format_ident(name), value))
        .collect::<Vec<_>>()
        .join("; ")
}
