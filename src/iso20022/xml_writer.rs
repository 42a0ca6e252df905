//! Thin event writer over `quick_xml::Writer` with indented output.

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Display;
use std::io::Cursor;

fn xml_error<E: Display>(err: E) -> Error {
    Error::XmlError(err.to_string())
}

pub struct XmlWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    pub fn declaration(&mut self) -> Result<()> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)
    }

    pub fn start(&mut self, name: &str) -> Result<()> {
        self.inner
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_error)
    }

    pub fn start_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.inner.write_event(Event::Start(start)).map_err(xml_error)
    }

    pub fn end(&mut self, name: &str) -> Result<()> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.inner
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)
    }

    /// `<name>text</name>`, with `text` escaped.
    pub fn element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name)?;
        self.text(text)?;
        self.end(name)
    }

    pub fn element_with(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> Result<()> {
        self.start_with(name, attributes)?;
        self.text(text)?;
        self.end(name)
    }

    /// Write the element only when `text` is present.
    pub fn optional(&mut self, name: &str, text: Option<&str>) -> Result<()> {
        match text {
            Some(text) => self.element(name, text),
            None => Ok(()),
        }
    }

    pub fn date(&mut self, name: &str, date: &NaiveDate) -> Result<()> {
        self.element(name, &date.format("%Y-%m-%d").to_string())
    }

    pub fn date_time(&mut self, name: &str, value: &NaiveDateTime) -> Result<()> {
        self.element(name, &value.format("%Y-%m-%dT%H:%M:%S").to_string())
    }

    /// `<name>` around whatever `body` writes.
    pub fn wrap<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.start(name)?;
        body(self)?;
        self.end(name)
    }

    pub fn finish(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner().into_inner()).map_err(xml_error)
    }
}
