use std::cell::RefCell;
use std::rc::Rc;

use xml::common::Position;
use xml::reader::{EventReader, ParserConfig, XmlEvent as ReaderEvent};

// Using RefCell because we need to edit the children vec during the parsing.
// Using rc because a Node will be referenced by its parent and by the
// parsing stack.
pub type ChildNodeRef = Rc<RefCell<XMLNode>>;

pub struct XMLReader;

impl XMLReader {
    fn config() -> ParserConfig {
        ParserConfig::new()
            .add_entity("nbsp", "\u{a0}")
            .add_entity("copy", "©")
            .add_entity("reg", "®")
    }

    /// Parses `content` into a tree of [`XMLNode`], returning the root element.
    pub fn parse(content: &[u8]) -> Result<ChildNodeRef, XMLError> {
        let reader: EventReader<&[u8]> = Self::config().create_reader(content);
        let mut root: Option<ChildNodeRef> = None;
        let mut parents: Vec<ChildNodeRef> = vec![];

        for e in reader {
            match e {
                Ok(ReaderEvent::StartElement {
                    name, attributes, ..
                }) => {
                    let node = Rc::new(RefCell::new(XMLNode {
                        name: name.local_name,
                        attrs: attributes
                            .into_iter()
                            .map(|a| (a.name.local_name, a.value))
                            .collect(),
                        text: String::new(),
                        children: vec![],
                    }));

                    if let Some(current) = parents.last() {
                        current.borrow_mut().children.push(Rc::clone(&node));
                    }
                    if root.is_none() {
                        root = Some(Rc::clone(&node));
                    }
                    parents.push(node);
                }
                Ok(ReaderEvent::EndElement { .. }) => {
                    parents.pop();
                }
                Ok(ReaderEvent::Characters(text) | ReaderEvent::CData(text)) => {
                    if let Some(current) = parents.last() {
                        current.borrow_mut().text.push_str(&text);
                    }
                }
                Ok(_) => continue,
                Err(err) => {
                    let pos = err.position();
                    return Err(XMLError::InvalidXml {
                        message: err.msg().to_string(),
                        line: pos.row + 1,
                        column: pos.column + 1,
                    });
                }
            }
        }

        root.ok_or(XMLError::NoElements)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum XMLError {
    #[error("{message} (line {line}, column {column})")]
    InvalidXml {
        message: String,
        line: u64,
        column: u64,
    },
    #[error("Not xml elements")]
    NoElements,
}

#[derive(Debug)]
pub struct XMLNode {
    /// local name, without namespace prefix
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<ChildNodeRef>,
}

impl XMLNode {
    /// Attribute value looked up by its local name.
    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    /// Trimmed text content of this element.
    pub fn text(&self) -> String {
        self.text.trim().to_string()
    }

    /// Returns `true` if the local name matches `tag` ignoring ASCII case.
    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    /// First direct child named `tag`.
    pub fn child(&self, tag: &str) -> Option<ChildNodeRef> {
        self.children.iter().find(|c| c.borrow().is(tag)).cloned()
    }

    /// All direct children named `tag`, in document order.
    pub fn children_named(&self, tag: &str) -> Vec<ChildNodeRef> {
        self.children
            .iter()
            .filter(|c| c.borrow().is(tag))
            .cloned()
            .collect()
    }

    /// Depth-first search for the first descendant named `tag`.
    pub fn find(&self, tag: &str) -> Option<ChildNodeRef> {
        for c in &self.children {
            if c.borrow().is(tag) {
                return Some(Rc::clone(c));
            }
            if let Some(n) = c.borrow().find(tag) {
                return Some(n);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tree() {
        let xml = br#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" version="3.0">
  <metadata><dc:title> Some &amp; title </dc:title></metadata>
  <manifest><item id="a" href="a.xhtml"/><ITEM id="b" href="b.xhtml"/></manifest>
</package>"#;
        let root = XMLReader::parse(xml).unwrap();
        let root = root.borrow();
        assert_eq!("package", root.name);
        assert_eq!(Some("3.0".to_string()), root.get_attr("version"));

        let title = root.find("title").unwrap();
        assert_eq!("Some & title", title.borrow().text());
        assert_eq!("title", title.borrow().name);

        let manifest = root.child("manifest").unwrap();
        assert_eq!(2, manifest.borrow().children_named("item").len());
        assert!(root.child("spine").is_none());
    }

    #[test]
    fn syntax_error_position() {
        let xml = b"<ncx>\n  <navMap>\n    <navPoint>\n  </navMap>\n</ncx>";
        match XMLReader::parse(xml) {
            Err(XMLError::InvalidXml { line, column, .. }) => {
                assert!(line >= 3);
                assert!(column > 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_document() {
        assert!(XMLReader::parse(b"").is_err());
    }
}
