use std::fmt::Write as _;

use ahash::AHashMap;
use log::warn;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::errors::ArscError;
use crate::model::{Bag, ResSpec, ResourceId, ResourceTable, SpecOrigin, StyledString, Value};
use crate::resolver::Resolver;
use crate::structs::value::{format_color, format_dimension, format_fraction};

// Internal attribute ids aapt assigns to bag meta entries.
const ATTR_TYPE: u32 = 0x0100_0000;
const ATTR_MIN: u32 = 0x0100_0001;
const ATTR_MAX: u32 = 0x0100_0002;
const ATTR_L10N: u32 = 0x0100_0003;
const ATTR_OTHER: u32 = 0x0100_0004;
const ATTR_MANY: u32 = 0x0100_0009;

const PLURAL_QUANTITIES: [&str; 6] = ["other", "zero", "one", "two", "few", "many"];

// `format=` bits of an attr's ATTR_TYPE entry.
const FORMAT_NAMES: [(u32, &str); 8] = [
    (1 << 0, "reference"),
    (1 << 1, "string"),
    (1 << 2, "integer"),
    (1 << 3, "boolean"),
    (1 << 4, "color"),
    (1 << 5, "float"),
    (1 << 6, "dimension"),
    (1 << 7, "fraction"),
];
const FORMAT_ENUM: u32 = 1 << 16;
const FORMAT_FLAGS: u32 = 1 << 17;

/// One emitted XML file, path relative to the resource tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesDocument {
    pub path: String,
    pub content: String,
}

/// Walks a decoded table and renders `public.xml` plus the per-configuration
/// `values*/*.xml` documents.
pub struct Emitter<'t> {
    table: &'t ResourceTable,
    resolver: Resolver<'t>,
}

impl<'t> Emitter<'t> {
    pub fn new(table: &'t ResourceTable) -> Emitter<'t> {
        Emitter {
            table,
            resolver: Resolver::new(table),
        }
    }

    /// First non-fatal resolution failure hit while emitting.
    pub fn first_error(&self) -> Option<ArscError> {
        self.resolver.first_error()
    }

    /// Render `values/public.xml`: every spec of every main package, sorted
    /// by ascending numeric id.
    pub fn public_xml(&self) -> Result<String, ArscError> {
        let mut entries: Vec<(ResourceId, &str, String)> = Vec::new();
        for package in self.table.list_main_packages() {
            for type_spec in package.type_specs() {
                for spec in type_spec.specs() {
                    entries.push((spec.id, &type_spec.name, spec.display_name().into_owned()));
                }
            }
        }
        entries.sort_by_key(|(id, _, _)| *id);

        let mut xml = XmlDoc::new()?;
        xml.open("resources")?;
        for (id, type_name, name) in entries {
            let mut element = BytesStart::new("public");
            element.push_attribute(("type", type_name));
            element.push_attribute(("name", name.as_str()));
            element.push_attribute(("id", id.to_string().as_str()));
            xml.empty(element)?;
        }
        xml.close("resources")?;
        xml.finish()
    }

    /// Render every `values-<qualifier>/<bucket>.xml` document of the main
    /// packages, grouping in-document values by `(config, type)`.
    pub fn values_documents(&mut self) -> Result<Vec<ValuesDocument>, ArscError> {
        let mut documents = Vec::new();

        let main_ids: Vec<u8> = self.table.list_main_packages().iter().map(|p| p.id).collect();
        for package_id in main_ids {
            let Some(package) = self.table.get_package_by_id(package_id) else {
                continue;
            };
            self.resolver.set_current_package(package_id);

            // (directory, file) -> bucket of (type name, spec, value)
            let mut order: Vec<(String, String)> = Vec::new();
            let mut buckets: AHashMap<(String, String), Vec<(&str, &ResSpec, &Value)>> =
                AHashMap::new();

            for type_spec in package.type_specs() {
                let file = bucket_file_name(&type_spec.name);
                for spec in type_spec.specs() {
                    // placeholders synthesized for anonymous entries carry
                    // no usable value; they stay out of the documents
                    if spec.origin == SpecOrigin::SynthesizedDummy {
                        continue;
                    }
                    for configured in spec.configured() {
                        if !configured.value.is_in_document() {
                            continue;
                        }
                        let key = (configured.config.directory_name(), file.clone());
                        if !buckets.contains_key(&key) {
                            order.push(key.clone());
                        }
                        buckets.entry(key).or_default().push((
                            &type_spec.name,
                            spec,
                            &configured.value,
                        ));
                    }
                }
            }

            for key in order {
                let entries = buckets.remove(&key).unwrap_or_default();
                let (directory, file) = key;
                let content = self.render_document(&entries)?;
                documents.push(ValuesDocument {
                    path: format!("{}/{}", directory, file),
                    content,
                });
            }
        }

        Ok(documents)
    }

    fn render_document(&self, entries: &[(&str, &ResSpec, &Value)]) -> Result<String, ArscError> {
        let mut xml = XmlDoc::new()?;
        xml.open("resources")?;
        for (type_name, spec, value) in entries {
            self.render_entry(&mut xml, type_name, spec, value)?;
        }
        xml.close("resources")?;
        xml.finish()
    }

    fn render_entry(
        &self,
        xml: &mut XmlDoc,
        type_name: &str,
        spec: &ResSpec,
        value: &Value,
    ) -> Result<(), ArscError> {
        let name = spec.display_name();

        if let Value::Bag(bag) = value {
            return match type_name {
                "style" => self.render_style(xml, &name, bag),
                "plurals" => self.render_plurals(xml, &name, bag),
                "attr" | "^attr-private" => self.render_attr(xml, &name, bag),
                t if t == "array" || t.ends_with("array") => self.render_array(xml, &name, bag),
                other => {
                    warn!("bag value for unhandled type '{}', emitted bare", other);
                    let mut element = BytesStart::new("item");
                    element.push_attribute(("type", other));
                    element.push_attribute(("name", name.as_ref()));
                    xml.empty(element)
                }
            };
        }

        match type_name {
            "string" => {
                let mut element = BytesStart::new("string");
                element.push_attribute(("name", name.as_ref()));
                match value {
                    Value::Text(styled) if !styled.spans.is_empty() => {
                        xml.start(element)?;
                        xml.raw_text(&styled_markup(styled))?;
                        xml.close("string")
                    }
                    Value::Text(styled) => {
                        xml.text_element(element, "string", &styled.text)
                    }
                    other => xml.text_element(element, "string", &self.format_value(other)),
                }
            }
            "id" => {
                let mut element = BytesStart::new("item");
                element.push_attribute(("type", "id"));
                element.push_attribute(("name", name.as_ref()));
                xml.empty(element)
            }
            "color" | "bool" | "integer" | "dimen" | "fraction" => {
                let mut element = BytesStart::new(type_name);
                element.push_attribute(("name", name.as_ref()));
                xml.text_element(element, type_name, &self.format_value(value))
            }
            other => {
                let mut element = BytesStart::new("item");
                element.push_attribute(("type", other));
                element.push_attribute(("name", name.as_ref()));
                xml.text_element(element, "item", &self.format_value(value))
            }
        }
    }

    fn render_style(&self, xml: &mut XmlDoc, name: &str, bag: &Bag) -> Result<(), ArscError> {
        let mut element = BytesStart::new("style");
        element.push_attribute(("name", name));
        if bag.parent.0 != 0 {
            let parent = self.resolver.decode_reference(bag.parent, false);
            element.push_attribute(("parent", parent.as_str()));
        }

        if bag.entries.is_empty() {
            return xml.empty(element);
        }

        xml.start(element)?;
        for (attr_id, value) in &bag.entries {
            let mut item = BytesStart::new("item");
            item.push_attribute(("name", self.resolver.attribute_name(*attr_id).as_str()));
            xml.text_element(item, "item", &self.format_value(value))?;
        }
        xml.close("style")
    }

    fn render_array(&self, xml: &mut XmlDoc, name: &str, bag: &Bag) -> Result<(), ArscError> {
        let all = |pred: fn(&Value) -> bool| bag.entries.iter().all(|(_, v)| pred(v));
        let tag = if all(|v| matches!(v, Value::Text(_))) {
            "string-array"
        } else if all(|v| matches!(v, Value::IntDec(_) | Value::IntHex(_))) {
            "integer-array"
        } else {
            "array"
        };

        let mut element = BytesStart::new(tag);
        element.push_attribute(("name", name));
        if bag.entries.is_empty() {
            return xml.empty(element);
        }

        xml.start(element)?;
        for (_, value) in &bag.entries {
            let item = BytesStart::new("item");
            xml.text_element(item, "item", &self.format_value(value))?;
        }
        xml.close(tag)
    }

    fn render_plurals(&self, xml: &mut XmlDoc, name: &str, bag: &Bag) -> Result<(), ArscError> {
        let mut element = BytesStart::new("plurals");
        element.push_attribute(("name", name));
        xml.start(element)?;

        for (quantity_id, value) in &bag.entries {
            let quantity = match quantity_id.0 {
                id @ ATTR_OTHER..=ATTR_MANY => PLURAL_QUANTITIES[(id - ATTR_OTHER) as usize],
                other => {
                    warn!("plurals entry with unknown quantity id 0x{:08x}", other);
                    continue;
                }
            };
            let mut item = BytesStart::new("item");
            item.push_attribute(("quantity", quantity));
            xml.text_element(item, "item", &self.format_value(value))?;
        }

        xml.close("plurals")
    }

    fn render_attr(&self, xml: &mut XmlDoc, name: &str, bag: &Bag) -> Result<(), ArscError> {
        let mut format_bits = 0u32;
        let mut min = None;
        let mut max = None;
        let mut symbols: Vec<(ResourceId, &Value)> = Vec::new();

        for (key, value) in &bag.entries {
            match key.0 {
                ATTR_TYPE => {
                    if let Some(bits) = int_of(value) {
                        format_bits = bits as u32;
                    }
                }
                ATTR_MIN => min = int_of(value),
                ATTR_MAX => max = int_of(value),
                ATTR_L10N => {}
                _ => symbols.push((*key, value)),
            }
        }

        let mut element = BytesStart::new("attr");
        element.push_attribute(("name", name));

        let format = FORMAT_NAMES
            .iter()
            .filter(|entry| format_bits & entry.0 != 0)
            .map(|entry| entry.1)
            .collect::<Vec<_>>()
            .join("|");
        if !format.is_empty() {
            element.push_attribute(("format", format.as_str()));
        }
        if let Some(min) = min {
            element.push_attribute(("min", min.to_string().as_str()));
        }
        if let Some(max) = max {
            element.push_attribute(("max", max.to_string().as_str()));
        }

        if symbols.is_empty() {
            return xml.empty(element);
        }

        let symbol_tag = if format_bits & FORMAT_FLAGS != 0 && format_bits & FORMAT_ENUM == 0 {
            "flag"
        } else {
            "enum"
        };

        xml.start(element)?;
        for (id, value) in symbols {
            let mut symbol = BytesStart::new(symbol_tag);
            symbol.push_attribute(("name", self.resolver.attribute_name(id).as_str()));
            symbol.push_attribute(("value", self.format_value(value).as_str()));
            xml.empty(symbol)?;
        }
        xml.close("attr")
    }

    /// Scalar rendering of a value, references resolved symbolically.
    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "@null".to_owned(),
            Value::Empty => "@empty".to_owned(),
            Value::Reference(id) => self.resolver.decode_reference(*id, false),
            Value::Attribute(id) => self.resolver.decode_reference(*id, true),
            Value::Text(styled) => styled.text.clone(),
            Value::FileRef(path) => path.clone(),
            Value::Float(f) => f.to_string(),
            Value::Dimension(data) => format_dimension(*data),
            Value::Fraction(data) => format_fraction(*data),
            Value::IntDec(v) => v.to_string(),
            Value::IntHex(v) => format!("0x{:08x}", v),
            Value::Bool(v) => v.to_string(),
            Value::Color(format, data) => format_color(*format, *data),
            Value::Raw { data, .. } => format!("0x{:08x}", data),
            Value::Bag(_) => String::new(),
        }
    }
}

fn int_of(value: &Value) -> Option<i32> {
    match value {
        Value::IntDec(v) => Some(*v),
        Value::IntHex(v) => Some(*v as i32),
        _ => None,
    }
}

/// `values` file the specs of a type land in: the type name, pluralized
/// unless it already ends in `s` (`string` -> `strings.xml`,
/// `plurals` -> `plurals.xml`).
fn bucket_file_name(type_name: &str) -> String {
    if type_name.ends_with('s') {
        format!("{}.xml", type_name)
    } else {
        format!("{}s.xml", type_name)
    }
}

/// Expand a styled string into inline markup, escaping the text and
/// emitting span tags around their character ranges. Spans are expected to
/// nest the way aapt produces them.
fn styled_markup(styled: &StyledString) -> String {
    let chars: Vec<char> = styled.text.chars().collect();
    let mut out = String::with_capacity(styled.text.len() + styled.spans.len() * 8);

    for position in 0..=chars.len() as u32 {
        // close spans ending before this character, innermost first
        for span in styled.spans.iter().rev() {
            if span.last + 1 == position {
                let name = span.tag.split(';').next().unwrap_or(&span.tag);
                let _ = write!(out, "</{}>", name);
            }
        }
        // open spans starting here, in declaration order
        for span in &styled.spans {
            if span.first == position {
                out.push('<');
                let mut parts = span.tag.split(';');
                out.push_str(parts.next().unwrap_or(&span.tag));
                for attr in parts {
                    if let Some((key, value)) = attr.split_once('=') {
                        let _ = write!(out, " {}=\"{}\"", key, escape_text(value));
                    }
                }
                out.push('>');
            }
        }
        if let Some(c) = chars.get(position as usize) {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                c => out.push(*c),
            }
        }
    }

    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Thin wrapper over the quick-xml writer: UTF-8, four-space indentation,
/// one trailing newline.
struct XmlDoc {
    writer: Writer<Vec<u8>>,
}

impl XmlDoc {
    fn new() -> Result<XmlDoc, ArscError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|_| ArscError::IoFailure("xml declaration"))?;
        Ok(XmlDoc { writer })
    }

    fn open(&mut self, tag: &str) -> Result<(), ArscError> {
        self.start(BytesStart::new(tag))
    }

    fn start(&mut self, element: BytesStart<'_>) -> Result<(), ArscError> {
        self.writer
            .write_event(Event::Start(element))
            .map_err(|_| ArscError::IoFailure("xml element"))
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<(), ArscError> {
        self.writer
            .write_event(Event::Empty(element))
            .map_err(|_| ArscError::IoFailure("xml element"))
    }

    fn close(&mut self, tag: &str) -> Result<(), ArscError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .map_err(|_| ArscError::IoFailure("xml element"))
    }

    fn text(&mut self, text: &str) -> Result<(), ArscError> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|_| ArscError::IoFailure("xml text"))
    }

    /// Pre-escaped content, used for inline style markup.
    fn raw_text(&mut self, markup: &str) -> Result<(), ArscError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(markup)))
            .map_err(|_| ArscError::IoFailure("xml text"))
    }

    fn text_element(
        &mut self,
        element: BytesStart<'_>,
        tag: &str,
        text: &str,
    ) -> Result<(), ArscError> {
        self.start(element)?;
        self.text(text)?;
        self.close(tag)
    }

    fn finish(self) -> Result<String, ArscError> {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|_| ArscError::IoFailure("xml buffer"))
    }
}
