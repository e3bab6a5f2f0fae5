//! Owned XML element tree and its writer
//!
//! The compiler builds the WiX document as a tree of [`Element`]s, patches it
//! in place (component routing, namespace registration, pruning) and finally
//! serializes it with [`XmlWriter`].

use quick_xml::escape::{escape, partial_escape};

/// Indentation used for generated documents
const INDENT: &str = "  ";

/// Child node of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

/// XML element with ordered attributes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`Element::set_attr`]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set the attribute only when a value is present
    pub fn attr_opt<V: Into<String>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.set_attr(name, value);
        }
        self
    }

    /// Builder form of [`Element::push`]
    pub fn child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    /// Set or replace an attribute, keeping its position
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attr(name).is_some()
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Append a child element
    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append a child element and return it for further editing
    pub fn add(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        match self.children.last_mut() {
            Some(Node::Element(el)) => el,
            _ => unreachable!("element was just pushed"),
        }
    }

    /// Insert a child element before all other children
    pub fn insert_first(&mut self, child: Element) {
        self.children.insert(0, Node::Element(child));
    }

    pub fn add_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn add_cdata(&mut self, text: impl Into<String>) {
        self.children.push(Node::CData(text.into()));
    }

    pub fn add_comment(&mut self, text: impl Into<String>) {
        self.children.push(Node::Comment(text.into()));
    }

    /// Child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First child element named `name`
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.name == name)
    }

    /// First child named `name`, created when missing
    pub fn find_or_add(&mut self, name: &str) -> &mut Element {
        let index = self.elements().position(|el| el.name == name);
        match index {
            Some(index) => self.nth_element_mut(index),
            None => self.add(Element::new(name)),
        }
    }

    fn nth_element_mut(&mut self, index: usize) -> &mut Element {
        match self.elements_mut().nth(index) {
            Some(el) => el,
            None => unreachable!("index comes from elements()"),
        }
    }

    /// Depth-first search including `self`
    pub fn find_descendant<F>(&self, pred: &F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.elements().find_map(|el| el.find_descendant(pred))
    }

    /// Depth-first search including `self`
    pub fn find_descendant_mut<F>(&mut self, pred: &F) -> Option<&mut Element>
    where
        F: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        for el in self.elements_mut() {
            if let Some(found) = el.find_descendant_mut(pred) {
                return Some(found);
            }
        }
        None
    }

    /// All elements of the subtree (including `self`) in document order
    pub fn descendants(&self) -> Vec<&Element> {
        let mut result = vec![self];
        for el in self.elements() {
            result.extend(el.descendants());
        }
        result
    }

    /// Element with the given name and `Id` anywhere in the subtree
    pub fn find_by_id(&self, name: &str, id: &str) -> Option<&Element> {
        self.find_descendant(&|el: &Element| el.name == name && el.get_attr("Id") == Some(id))
    }

    pub fn find_by_id_mut(&mut self, name: &str, id: &str) -> Option<&mut Element> {
        self.find_descendant_mut(&|el: &Element| el.name == name && el.get_attr("Id") == Some(id))
    }

    /// Remove child elements for which `keep` returns false, recursively
    pub fn retain_recursive<F>(&mut self, keep: &F)
    where
        F: Fn(&Element) -> bool,
    {
        self.children.retain(|node| match node {
            Node::Element(el) => keep(el),
            _ => true,
        });
        for el in self.elements_mut() {
            el.retain_recursive(keep);
        }
    }

    /// Child-index path to the first matching element below `self`, in
    /// document order. `self` itself is not tested.
    pub fn path_to<F>(&self, pred: &F) -> Option<Vec<usize>>
    where
        F: Fn(&Element) -> bool,
    {
        for (index, el) in self.elements().enumerate() {
            if pred(el) {
                return Some(vec![index]);
            }
            if let Some(mut rest) = el.path_to(pred) {
                rest.insert(0, index);
                return Some(rest);
            }
        }
        None
    }

    /// Element reached by following a [`Element::path_to`] path
    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.elements().nth(*first)?.at_path(rest),
        }
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.elements_mut().nth(*first)?.at_path_mut(rest),
        }
    }

    /// Text of all text and CDATA children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn has_only_text(&self) -> bool {
        self.children
            .iter()
            .all(|n| matches!(n, Node::Text(_) | Node::CData(_)))
    }
}

/// Indented XML writer
pub struct XmlWriter {
    output: String,
    indent_level: usize,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
        }
    }

    /// Get the written output
    pub fn finish(mut self) -> String {
        if !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.output
    }

    pub fn newline(&mut self) {
        self.output.push('\n');
    }

    fn write_indent(&mut self) {
        self.output.push_str(&INDENT.repeat(self.indent_level));
    }

    pub fn write_declaration(&mut self, version: &str, encoding: Option<&str>) {
        self.output.push_str("<?xml version=\"");
        self.output.push_str(&escape(version));
        self.output.push('"');
        if let Some(enc) = encoding {
            self.output.push_str(" encoding=\"");
            self.output.push_str(&escape(enc));
            self.output.push('"');
        }
        self.output.push_str("?>");
    }

    pub fn write_comment(&mut self, text: &str) {
        self.output.push_str("<!--");
        self.output.push_str(&text.replace("--", "- -"));
        self.output.push_str("-->");
    }

    pub fn write_cdata(&mut self, content: &str) {
        self.output.push_str("<![CDATA[");
        self.output.push_str(&content.replace("]]>", "]]]]><![CDATA[>"));
        self.output.push_str("]]>");
    }

    pub fn write_text(&mut self, text: &str) {
        self.output.push_str(&partial_escape(text));
    }

    /// Write `element` and its subtree at the current indentation
    pub fn write_element(&mut self, element: &Element) {
        self.write_indent();
        self.output.push('<');
        self.output.push_str(&element.name);
        for (name, value) in &element.attributes {
            self.output.push(' ');
            self.output.push_str(name);
            self.output.push_str("=\"");
            self.output.push_str(&escape(value.as_str()));
            self.output.push('"');
        }

        if element.children.is_empty() {
            self.output.push_str(" />");
            return;
        }

        self.output.push('>');

        if element.has_only_text() {
            self.write_inline_children(element);
        } else {
            self.indent_level += 1;
            for node in &element.children {
                self.newline();
                match node {
                    Node::Element(el) => self.write_element(el),
                    Node::Text(text) => {
                        self.write_indent();
                        self.write_text(text);
                    }
                    Node::CData(text) => {
                        self.write_indent();
                        self.write_cdata(text);
                    }
                    Node::Comment(text) => {
                        self.write_indent();
                        self.write_comment(text);
                    }
                }
            }
            self.indent_level -= 1;
            self.newline();
            self.write_indent();
        }

        self.output.push_str("</");
        self.output.push_str(&element.name);
        self.output.push('>');
    }

    fn write_inline_children(&mut self, element: &Element) {
        for node in &element.children {
            match node {
                Node::Text(text) => self.write_text(text),
                Node::CData(text) => self.write_cdata(text),
                _ => {}
            }
        }
    }
}

/// Serialize a complete document: declaration, optional header comment, root
pub fn to_document_string(root: &Element, header_comment: Option<&str>) -> String {
    let mut writer = XmlWriter::new();
    writer.write_declaration("1.0", Some("utf-8"));
    writer.newline();
    if let Some(comment) = header_comment {
        writer.write_comment(comment);
        writer.newline();
    }
    writer.write_element(root);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut el = Element::new("File").attr("Id", "a").attr("Source", "a.txt");
        el.set_attr("Id", "b");
        assert_eq!(el.attributes[0], ("Id".to_string(), "b".to_string()));
        assert_eq!(el.remove_attr("Source").as_deref(), Some("a.txt"));
        assert!(!el.has_attr("Source"));
    }

    #[test]
    fn test_write_nested() {
        let root = Element::new("Wix").child(
            Element::new("Product")
                .attr("Name", "A & B")
                .child(Element::new("Package")),
        );

        assert_eq!(
            to_document_string(&root, None),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Wix>\n  <Product Name=\"A &amp; B\">\n    <Package />\n  </Product>\n</Wix>\n"
        );
    }

    #[test]
    fn test_write_inline_text_and_cdata() {
        let mut condition = Element::new("Condition").attr("Level", "1");
        condition.add_cdata("A < B");
        let mut property = Element::new("Property");
        property.add_text("x<y");

        let mut writer = XmlWriter::new();
        writer.write_element(&condition);
        writer.newline();
        writer.write_element(&property);
        assert_eq!(
            writer.finish(),
            "<Condition Level=\"1\"><![CDATA[A < B]]></Condition>\n<Property>x&lt;y</Property>\n"
        );
    }

    #[test]
    fn test_path_to() {
        let root = Element::new("Wix").child(
            Element::new("Product")
                .child(Element::new("Package"))
                .child(Element::new("Directory").child(Element::new("Component").attr("Id", "c"))),
        );
        let path = root.path_to(&|el: &Element| el.name == "Component").unwrap();
        assert_eq!(path, vec![0, 1, 0]);
        assert_eq!(root.at_path(&path).unwrap().get_attr("Id"), Some("c"));
        assert!(root.path_to(&|el: &Element| el.name == "Wix").is_none());
    }

    #[test]
    fn test_header_comment() {
        let out = to_document_string(&Element::new("Wix"), Some(" generated "));
        assert!(out.contains("<!-- generated -->\n<Wix />"));
    }

    #[test]
    fn test_find_descendant_mut() {
        let mut root = Element::new("Wix").child(
            Element::new("Directory")
                .attr("Id", "TARGETDIR")
                .child(Element::new("Directory").attr("Id", "INSTALLDIR")),
        );

        root.find_by_id_mut("Directory", "INSTALLDIR")
            .unwrap()
            .push(Element::new("Component"));

        let install_dir = root.find_by_id("Directory", "INSTALLDIR").unwrap();
        assert!(install_dir.find("Component").is_some());
        assert_eq!(root.descendants().len(), 4);
    }

    #[test]
    fn test_find_or_add() {
        let mut root = Element::new("Product");
        root.find_or_add("UI").set_attr("Id", "x");
        root.add(Element::new("Media"));
        assert_eq!(root.find_or_add("UI").get_attr("Id"), Some("x"));
        root.find_or_add("Media").set_attr("Id", "1");
        assert_eq!(root.elements().count(), 2);
        assert_eq!(root.find("Media").unwrap().get_attr("Id"), Some("1"));
    }

    #[test]
    fn test_retain_recursive() {
        let mut root = Element::new("Wix").child(
            Element::new("Feature")
                .child(Element::new("Feature"))
                .child(Element::new("ComponentRef")),
        );
        root.retain_recursive(&|el: &Element| el.name != "ComponentRef");
        let feature = root.find("Feature").unwrap();
        assert_eq!(feature.elements().count(), 1);
    }
}
