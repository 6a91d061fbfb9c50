//! The ROM recipe tree.
//!
//! An MRA document is a tree of elements and comments. Attribute order is
//! significant to downstream loaders and humans alike, so attributes are
//! kept in an insertion-ordered list, never a map.

pub mod writer;

/// A node in the recipe tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeNode {
    Element(Element),
    Comment(String),
}

/// An XML element with ordered attributes, optional text and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    indent_text: bool,
    children: Vec<RecipeNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an attribute. Insertion order is preserved on output.
    pub fn add_attr(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Append an attribute formatted as `0x<HEX>`.
    pub fn add_hex_attr(&mut self, key: impl Into<String>, value: usize) -> &mut Self {
        self.add_attr(key, format!("0x{:X}", value))
    }

    /// Look up an attribute by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Set inline text content.
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(text.into());
        self
    }

    /// Set text content rendered as an indented block (hex dumps).
    pub fn set_indented_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(text.into());
        self.indent_text = true;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn indent_text(&self) -> bool {
        self.indent_text
    }

    /// Append a child element and return a mutable reference to it.
    pub fn add_element(&mut self, name: impl Into<String>) -> &mut Element {
        self.children.push(RecipeNode::Element(Element::new(name)));
        match self.children.last_mut() {
            Some(RecipeNode::Element(e)) => e,
            _ => unreachable!(),
        }
    }

    /// Append a comment child; returns its child index so the caller can
    /// amend it later.
    pub fn add_comment(&mut self, text: impl Into<String>) -> usize {
        self.children.push(RecipeNode::Comment(text.into()));
        self.children.len() - 1
    }

    pub fn push_node(&mut self, node: RecipeNode) {
        self.children.push(node);
    }

    pub fn children(&self) -> &[RecipeNode] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Mutable access to the element child at `idx`, if it is one.
    pub fn child_element_mut(&mut self, idx: usize) -> Option<&mut Element> {
        match self.children.get_mut(idx) {
            Some(RecipeNode::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to the comment child at `idx`, if it is one.
    pub fn comment_at_mut(&mut self, idx: usize) -> Option<&mut String> {
        match self.children.get_mut(idx) {
            Some(RecipeNode::Comment(text)) => Some(text),
            _ => None,
        }
    }

    /// Iterate the element children only.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            RecipeNode::Element(e) => Some(e),
            _ => None,
        })
    }
}
