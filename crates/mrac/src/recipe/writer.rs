//! XML serialization for recipe trees.
//!
//! Output follows the MRA conventions: four-space indentation, attributes
//! in insertion order, comments as `<!-- ... -->`, and hex-dump text blocks
//! indented one level past their element.

use super::{Element, RecipeNode};

/// Serialize a recipe tree rooted at `root`.
pub fn write_document(root: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, root, 0);
    out
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

fn write_node(out: &mut String, node: &RecipeNode, level: usize) {
    match node {
        RecipeNode::Comment(text) => {
            push_indent(out, level);
            out.push_str("<!-- ");
            out.push_str(&escape_text(text));
            out.push_str(" -->\n");
        }
        RecipeNode::Element(e) => write_element(out, e, level),
    }
}

fn write_element(out: &mut String, e: &Element, level: usize) {
    push_indent(out, level);
    out.push('<');
    out.push_str(e.name());
    for (key, value) in e.attrs() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    let has_children = !e.children().is_empty();
    if !has_children && e.text().is_none() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');
    if let Some(text) = e.text() {
        if e.indent_text() {
            out.push('\n');
            for line in text.lines() {
                push_indent(out, level + 1);
                out.push_str(&escape_text(line));
                out.push('\n');
            }
            if !has_children {
                push_indent(out, level);
            }
        } else {
            out.push_str(&escape_text(text));
        }
    }
    if has_children {
        out.push('\n');
        for child in e.children() {
            write_node(out, child, level + 1);
        }
        push_indent(out, level);
    }
    out.push_str("</");
    out.push_str(e.name());
    out.push_str(">\n");
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
