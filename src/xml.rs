//! A minimal ordered element tree for assembling the pain.001 document.
//!
//! Nodes keep their children in insertion order, which the wire format
//! requires. Rendering pretty-prints with two-space indentation and escapes
//! text content and attribute values; the tree itself stores raw text.

use std::fmt::Write;

/// One element: name, attributes, optional text content, ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.text = Some(text.into());
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    /// Append a child, keeping document order.
    pub fn push(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable access to the first direct child with the given name.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// All descendants (including self) with the given name, in document
    /// order. This is the lookup the finalize cross-check runs on.
    pub fn descendants(&self, name: &str) -> Vec<&XmlNode> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlNode>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect_descendants(name, found);
        }
    }

    /// Resolve a slash-separated path of element names rooted at this node
    /// (the first segment must match this node's name). Returns the child
    /// index path of every match, in document order.
    pub fn locate(&self, path: &str) -> Vec<Vec<usize>> {
        let mut segments = path.split('/');
        match segments.next() {
            Some(first) if first == self.name => {}
            _ => return Vec::new(),
        }

        let mut current: Vec<Vec<usize>> = vec![Vec::new()];
        for segment in segments {
            let mut next = Vec::new();
            for index_path in &current {
                let node = self.node_at(index_path);
                for (i, child) in node.children.iter().enumerate() {
                    if child.name == segment {
                        let mut extended = index_path.clone();
                        extended.push(i);
                        next.push(extended);
                    }
                }
            }
            current = next;
        }
        current
    }

    fn node_at(&self, index_path: &[usize]) -> &XmlNode {
        let mut node = self;
        for &i in index_path {
            node = &node.children[i];
        }
        node
    }

    /// Mutable access by a child index path produced by [`locate`].
    ///
    /// [`locate`]: XmlNode::locate
    pub fn node_at_mut(&mut self, index_path: &[usize]) -> &mut XmlNode {
        let mut node = self;
        for &i in index_path {
            node = &mut node.children[i];
        }
        node
    }

    /// Render the tree as a pretty-printed UTF-8 XML document.
    pub fn render(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{}<{}", indent, self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }

        match (&self.text, self.children.is_empty()) {
            (Some(text), true) => {
                let _ = writeln!(out, ">{}</{}>", escape(text), self.name);
            }
            (None, true) => {
                let _ = writeln!(out, "/>");
            }
            _ => {
                let _ = writeln!(out, ">");
                if let Some(text) = &self.text {
                    let _ = writeln!(out, "{}  {}", indent, escape(text));
                }
                for child in &self.children {
                    child.render_into(out, depth + 1);
                }
                let _ = writeln!(out, "{}</{}>", indent, self.name);
            }
        }
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
