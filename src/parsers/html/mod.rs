//! HTML解析和处理模块
//!
//! - `dom`: DOM 解析、查询与修改
//! - `serializer`: 序列化与转义

pub mod dom;
pub mod serializer;

pub use dom::{
    find_body, find_elements, get_child_node_by_name, get_node_attr, get_node_name,
    get_parent_node, html_to_dom, parse_html, set_node_attr,
};
pub use serializer::{serialize_children, serialize_document, serialize_node};
