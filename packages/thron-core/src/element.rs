//! Backend-agnostic UI tree.
//!
//! Views describe their output as an [`Element`] tree built with a fluent,
//! chainable API (`div().id("x").class("flex-1").child(...)`). A host
//! renderer walks the tree; [`Element::render_text`] is the plain-text host
//! used by the CLI.

/// Kind of node in the element tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tag {
    #[default]
    Div,
    Heading,
    Paragraph,
    Text,
    Link,
    Button,
}

/// A node in the UI tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: Tag,
    /// Stable identity, used as the render key for list items
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: Option<String>,
    pub href: Option<String>,
    pub children: Vec<Element>,
}

/// Container element.
pub fn div() -> Element {
    Element::default()
}

/// Inline text.
pub fn text(content: impl Into<String>) -> Element {
    Element::leaf(Tag::Text, content)
}

pub fn heading(content: impl Into<String>) -> Element {
    Element::leaf(Tag::Heading, content)
}

pub fn paragraph(content: impl Into<String>) -> Element {
    Element::leaf(Tag::Paragraph, content)
}

/// Hyperlink with a visible label.
pub fn link(label: impl Into<String>, href: impl Into<String>) -> Element {
    let mut el = Element::leaf(Tag::Link, label);
    el.href = Some(href.into());
    el
}

/// Clickable control, identified by `id`.
pub fn button(id: impl Into<String>, label: impl Into<String>) -> Element {
    Element::leaf(Tag::Button, label).id(id)
}

impl Element {
    fn leaf(tag: Tag, content: impl Into<String>) -> Self {
        Self {
            tag,
            text: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Apply `f` only when `condition` holds.
    pub fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Apply `f` with the contained value when `value` is `Some`.
    pub fn when_some<T>(self, value: Option<T>, f: impl FnOnce(Self, T) -> Self) -> Self {
        match value {
            Some(value) => f(self, value),
            None => self,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Depth-first search for the first element with the given id.
    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Count of elements (including self) carrying the given id.
    pub fn count_id(&self, id: &str) -> usize {
        let own = usize::from(self.id.as_deref() == Some(id));
        own + self.children.iter().map(|c| c.count_id(id)).sum::<usize>()
    }

    /// All text in the subtree, in document order, joined by spaces.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(text) = self.text.as_deref() {
            out.push(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Render the tree as plain text, one block per line.
    ///
    /// Containers with the `inline` class put their children on one line.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        self.render_lines(&mut lines);
        lines.join("\n")
    }

    fn render_lines(&self, lines: &mut Vec<String>) {
        if let Some(line) = self.render_leaf() {
            lines.push(line);
        }
        if self.has_class("inline") {
            let line = self
                .children
                .iter()
                .filter_map(Element::render_leaf)
                .collect::<Vec<_>>()
                .join("  ");
            if !line.is_empty() {
                lines.push(line);
            }
            return;
        }
        for child in &self.children {
            child.render_lines(lines);
        }
    }

    fn render_leaf(&self) -> Option<String> {
        let text = self.text.as_deref()?;
        let line = match self.tag {
            Tag::Heading => format!("# {text}"),
            Tag::Link => match self.href.as_deref() {
                Some(href) => format!("{text} <{href}>"),
                None => text.to_string(),
            },
            Tag::Button if self.has_class("active") => format!("[*{text}]"),
            Tag::Button => format!("[{text}]"),
            Tag::Div | Tag::Paragraph | Tag::Text => text.to_string(),
        };
        Some(line)
    }
}
