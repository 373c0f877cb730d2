//! Thin quick-xml helpers shared by every entity parser.
//!
//! Layout documents are shallow: a versioned root element with flat children
//! and the odd wrapper (`constraints`, `tc-list`). Reading therefore produces a
//! flat list of elements tagged with their parent name.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

/// One element of a layout document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Name of the enclosing element, `None` for the root
    pub parent: Option<String>,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_child_of(&self, parent: &str) -> bool {
        self.parent.as_deref() == Some(parent)
    }
}

fn element(reader: &Reader<&[u8]>, e: &BytesStart<'_>, parent: Option<String>) -> Result<Element, quick_xml::Error> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element { name, parent, attrs })
}

/// Flatten `xml` into its elements in document order.
pub fn scan(xml: &str) -> Result<Vec<Element>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut elements = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let el = element(&reader, e, stack.last().cloned())?;
                stack.push(el.name.clone());
                elements.push(el);
            }
            Event::Empty(ref e) => {
                let el = element(&reader, e, stack.last().cloned())?;
                elements.push(el);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(elements)
}

/// Indented document writer.
///
/// Attribute values are escaped by quick-xml.
pub struct DocumentWriter {
    writer: Writer<Vec<u8>>,
}

impl DocumentWriter {
    pub fn new() -> Result<Self, quick_xml::Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(quick_xml::Error::from)?;
        Ok(Self { writer })
    }

    /// `<name k="v" .../>`
    pub fn empty(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<(), quick_xml::Error> {
        let start = start_tag(name, attrs);
        self.writer
            .write_event(Event::Empty(start))
            .map_err(quick_xml::Error::from)
    }

    /// `<name k="v" ...>`; close with [`DocumentWriter::end`].
    pub fn start(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<(), quick_xml::Error> {
        let start = start_tag(name, attrs);
        self.writer
            .write_event(Event::Start(start))
            .map_err(quick_xml::Error::from)
    }

    pub fn end(&mut self, name: &str) -> Result<(), quick_xml::Error> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(quick_xml::Error::from)
    }

    pub fn finish(self) -> String {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn start_tag<'a>(name: &'a str, attrs: &[(&str, String)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attrs {
        start.push_attribute((*key, value.as_str()));
    }
    start
}
