use std::io;

use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, NodeData, SerializableHandle};

/// 序列化文档
pub fn serialize_document(document: &Handle, document_encoding: &str) -> io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            if encoding != encoding_rs::UTF_8 {
                let s: &str = &String::from_utf8_lossy(&buf);
                let (data, _, _) = encoding.encode(s);
                buf = data.to_vec();
            }
        }
    }

    Ok(buf)
}

/// 序列化节点本身（outerHTML）
pub fn serialize_node(node: &Handle) -> String {
    serialize_with_scope(node, TraversalScope::IncludeNode)
}

/// 序列化节点的所有子节点（innerHTML）
pub fn serialize_children(node: &Handle) -> String {
    serialize_with_scope(node, TraversalScope::ChildrenOnly(None))
}

fn serialize_with_scope(node: &Handle, scope: TraversalScope) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };

    match serialize(&mut buf, &serializable, opts) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(err) => {
            tracing::warn!("节点序列化失败: {}", err);
            String::new()
        }
    }
}

/// 生成元素的开始标签（含属性）
pub fn open_tag(node: &Handle) -> String {
    match &node.data {
        NodeData::Element { name, attrs, .. } => {
            let mut tag = format!("<{}", name.local);
            for attr in attrs.borrow().iter() {
                tag.push(' ');
                tag.push_str(&attr.name.local);
                tag.push_str("=\"");
                tag.push_str(&escape_attribute(&attr.value));
                tag.push('"');
            }
            tag.push('>');
            tag
        }
        _ => String::new(),
    }
}

/// 生成元素的结束标签
pub fn close_tag(node: &Handle) -> String {
    match &node.data {
        NodeData::Element { name, .. } => format!("</{}>", name.local),
        _ => String::new(),
    }
}

/// 转义文本内容
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 转义属性值
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 反转义常见 HTML 实体
pub fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.find(';').filter(|end| *end <= 10) {
            Some(end) => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(c) => {
                        result.push(c);
                        rest = &tail[end + 1..];
                    }
                    None => {
                        result.push('&');
                        rest = &tail[1..];
                    }
                }
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{find_body, find_elements, parse_html};

    #[test]
    fn test_inner_and_outer_html() {
        let dom = parse_html("<p class=\"x\">Hello <b>bold</b></p>").unwrap();
        let body = find_body(&dom.document).unwrap();
        let p = find_elements(&body, "p").remove(0);

        assert_eq!(serialize_children(&p), "Hello <b>bold</b>");
        assert_eq!(serialize_node(&p), "<p class=\"x\">Hello <b>bold</b></p>");
        assert_eq!(open_tag(&p), "<p class=\"x\">");
        assert_eq!(close_tag(&p), "</p>");
    }

    #[test]
    fn test_escape_roundtrip() {
        let raw = "a < b && c > \"d\"";
        assert_eq!(unescape_html(&escape_text(raw)), raw);
        assert_eq!(unescape_html("&#x4e2d;&#25991;"), "中文");
        assert_eq!(unescape_html("AT&T"), "AT&T");
        assert_eq!(unescape_html("&unknown; x"), "&unknown; x");
    }
}
