//! 页面宿主抽象
//!
//! 浏览器能直接给出的信息（计算样式、几何尺寸、视口、当前地址）由 `PageHost`
//! 提供。嵌入方可以接入真实的布局引擎；`StaticPageHost` 只根据内联样式和
//! 标签默认值推导，适合离线处理和测试。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use crate::parsers::css::{get_style_property, parse_opacity};
use crate::parsers::html::dom::{
    get_node_attr, get_node_name, get_parent_node, has_node_attr, is_element, node_key,
    text_content,
};

/// 矩形区域（页面坐标，单位像素）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// 是否与向外扩展 `margin` 后的 `other` 相交
    pub fn intersects(&self, other: &Rect, margin: f64) -> bool {
        self.x < other.right() + margin
            && self.right() > other.x - margin
            && self.y < other.bottom() + margin
            && self.bottom() > other.y - margin
    }
}

/// 翻译流程关心的计算样式
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub font_weight: Option<String>,
    pub line_height: Option<String>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "inline".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            color: None,
            font_family: None,
            font_size: None,
            font_weight: None,
            line_height: None,
        }
    }
}

impl ComputedStyle {
    /// 字体与颜色声明，用于让译文块与原文外观一致
    pub fn typography(&self) -> Vec<(String, String)> {
        let mut declarations = Vec::new();
        let pairs = [
            ("font-family", &self.font_family),
            ("font-size", &self.font_size),
            ("font-weight", &self.font_weight),
            ("line-height", &self.line_height),
            ("color", &self.color),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                declarations.push((name.to_string(), value.clone()));
            }
        }
        declarations
    }
}

/// 页面宿主
pub trait PageHost {
    /// 元素的计算样式
    fn computed_style(&self, element: &Handle) -> ComputedStyle;

    /// 元素的包围盒
    fn bounding_rect(&self, element: &Handle) -> Rect;

    /// 元素的各个行盒
    fn client_rects(&self, element: &Handle) -> Vec<Rect>;

    /// 覆盖元素全部内容的文本范围包围盒（用于 `display: contents` 的零尺寸元素）
    fn text_range_rect(&self, element: &Handle) -> Rect;

    /// 当前视口
    fn viewport(&self) -> Rect;

    /// 当前页面地址
    fn location(&self) -> String;
}

/// 根据内联样式推导布局信息的静态宿主
pub struct StaticPageHost {
    viewport: Cell<Rect>,
    location: RefCell<String>,
    rects: RefCell<HashMap<usize, Rect>>,
    line_height: f64,
}

impl StaticPageHost {
    pub fn new(location: &str) -> Self {
        Self {
            viewport: Cell::new(Rect::new(0.0, 0.0, 1280.0, 800.0)),
            location: RefCell::new(location.to_string()),
            rects: RefCell::new(HashMap::new()),
            line_height: 20.0,
        }
    }

    pub fn set_viewport(&self, viewport: Rect) {
        self.viewport.set(viewport);
    }

    /// 垂直滚动到 `y`
    pub fn scroll_to(&self, y: f64) {
        let mut viewport = self.viewport.get();
        viewport.y = y;
        self.viewport.set(viewport);
    }

    pub fn set_location(&self, location: &str) {
        *self.location.borrow_mut() = location.to_string();
    }

    /// 为元素指定布局位置
    pub fn set_rect(&self, element: &Handle, rect: Rect) {
        self.rects.borrow_mut().insert(node_key(element), rect);
    }

    fn explicit_rect(&self, element: &Handle) -> Option<Rect> {
        self.rects.borrow().get(&node_key(element)).copied()
    }

    /// 最近的带显式布局的祖先位置
    fn inherited_rect(&self, element: &Handle) -> Option<Rect> {
        let mut current = Some(element.clone());
        while let Some(node) = current {
            if let Some(rect) = self.explicit_rect(&node) {
                return Some(rect);
            }
            current = get_parent_node(&node);
        }
        None
    }

    fn own_declaration(element: &Handle, property: &str) -> Option<String> {
        get_node_attr(element, "style").and_then(|style| get_style_property(&style, property))
    }

    fn inherited_declaration(element: &Handle, property: &str) -> Option<String> {
        let mut current = Some(element.clone());
        while let Some(node) = current {
            if is_element(&node) {
                if let Some(value) = Self::own_declaration(&node, property) {
                    if value != "inherit" {
                        return Some(value);
                    }
                }
            }
            current = get_parent_node(&node);
        }
        None
    }
}

/// 标签默认的 display
fn default_display(tag: &str) -> &'static str {
    match tag {
        "head" | "script" | "style" | "template" | "title" | "meta" | "link" | "noscript" => {
            "none"
        }
        "li" | "summary" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "caption" => "table-caption",
        "thead" | "tbody" | "tfoot" => "table-row-group",
        "html" | "body" | "div" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol"
        | "dl" | "dd" | "dt" | "blockquote" | "figure" | "figcaption" | "article" | "section"
        | "main" | "aside" | "nav" | "header" | "footer" | "form" | "fieldset" | "pre"
        | "address" | "details" | "hr" => "block",
        _ => "inline",
    }
}

impl PageHost for StaticPageHost {
    fn computed_style(&self, element: &Handle) -> ComputedStyle {
        let tag = get_node_name(element).unwrap_or("");

        let display = if has_node_attr(element, "hidden") {
            "none".to_string()
        } else {
            Self::own_declaration(element, "display")
                .map(|d| d.to_lowercase())
                .unwrap_or_else(|| default_display(tag).to_string())
        };

        let visibility = Self::inherited_declaration(element, "visibility")
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| "visible".to_string());

        let opacity = Self::own_declaration(element, "opacity")
            .and_then(|o| parse_opacity(&o))
            .unwrap_or(1.0);

        ComputedStyle {
            display,
            visibility,
            opacity,
            color: Self::inherited_declaration(element, "color"),
            font_family: Self::inherited_declaration(element, "font-family"),
            font_size: Self::inherited_declaration(element, "font-size"),
            font_weight: Self::inherited_declaration(element, "font-weight"),
            line_height: Self::inherited_declaration(element, "line-height"),
        }
    }

    fn bounding_rect(&self, element: &Handle) -> Rect {
        if let Some(rect) = self.explicit_rect(element) {
            return rect;
        }

        let style = self.computed_style(element);
        if style.display == "none" || style.display == "contents" {
            return Rect::default();
        }

        // display:none 的祖先会让整棵子树不参与布局
        let mut ancestor = get_parent_node(element);
        while let Some(node) = ancestor {
            if is_element(&node) && self.computed_style(&node).display == "none" {
                return Rect::default();
            }
            ancestor = get_parent_node(&node);
        }

        if text_content(element).trim().is_empty() {
            return Rect::default();
        }

        // 未指定布局时沿用祖先位置，默认落在页面顶部
        let anchor = self.inherited_rect(element).unwrap_or_default();
        Rect::new(anchor.x, anchor.y, self.viewport.get().width, self.line_height)
    }

    fn client_rects(&self, element: &Handle) -> Vec<Rect> {
        let rect = self.bounding_rect(element);
        if rect.is_empty() {
            Vec::new()
        } else {
            vec![rect]
        }
    }

    fn text_range_rect(&self, element: &Handle) -> Rect {
        if text_content(element).trim().is_empty() {
            return Rect::default();
        }
        let anchor = self.inherited_rect(element).unwrap_or_default();
        Rect::new(anchor.x, anchor.y, self.viewport.get().width, self.line_height)
    }

    fn viewport(&self) -> Rect {
        self.viewport.get()
    }

    fn location(&self) -> String {
        self.location.borrow().clone()
    }
}
