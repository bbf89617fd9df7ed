//! Zero-Copy Slice Parser
//!
//! Parses XML from a byte slice with zero-copy semantics.
//! Input references are maintained directly in the output; only text
//! containing entity references is copied.

use super::events::{EndElement, StartElement, XmlEvent};
use crate::core::attributes::{is_whitespace, parse_attributes};
use crate::core::entities::decode_text;
use memchr::{memchr, memchr3, memmem};

/// Syntax error with the byte offset where it was detected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at byte {offset}")]
pub struct ParseError {
    pub message: &'static str,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: &'static str, offset: usize) -> Self {
        ParseError { message, offset }
    }
}

/// Zero-copy XML reader from a byte slice
pub struct SliceReader<'a> {
    input: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> SliceReader<'a> {
    /// Create a new slice reader
    pub fn new(input: &'a [u8]) -> Self {
        // Skip a UTF-8 byte order mark
        let pos = if input.starts_with(&[0xEF, 0xBB, 0xBF]) { 3 } else { 0 };
        SliceReader {
            input,
            pos,
            failed: false,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the next XML event, `None` at end of input
    pub fn next_event(&mut self) -> Option<Result<XmlEvent<'a>, ParseError>> {
        if self.failed || self.pos >= self.input.len() {
            return None;
        }
        let result = if self.input[self.pos] == b'<' {
            self.read_markup()
        } else {
            self.read_text()
        };
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn read_text(&mut self) -> Result<XmlEvent<'a>, ParseError> {
        let start = self.pos;
        let end = memchr(b'<', &self.input[start..]).map_or(self.input.len(), |i| start + i);
        self.pos = end;
        let raw = &self.input[start..end];
        decode_text(raw)
            .map(XmlEvent::Text)
            .map_err(|msg| ParseError::new(msg, start))
    }

    fn read_markup(&mut self) -> Result<XmlEvent<'a>, ParseError> {
        let start = self.pos;
        let rest = &self.input[start..];

        if rest.starts_with(b"<!--") {
            let body = start + 4;
            let len = memmem::find(&self.input[body..], b"-->")
                .ok_or_else(|| ParseError::new("Unterminated comment", start))?;
            self.pos = body + len + 3;
            return Ok(XmlEvent::Comment(&self.input[body..body + len]));
        }
        if rest.starts_with(b"<![CDATA[") {
            let body = start + 9;
            let len = memmem::find(&self.input[body..], b"]]>")
                .ok_or_else(|| ParseError::new("Unterminated CDATA section", start))?;
            self.pos = body + len + 3;
            return Ok(XmlEvent::CData(&self.input[body..body + len]));
        }
        if rest.starts_with(b"<!DOCTYPE") {
            return self.read_doctype(start);
        }
        if rest.starts_with(b"<?") {
            let body = start + 2;
            let len = memmem::find(&self.input[body..], b"?>")
                .ok_or_else(|| ParseError::new("Unterminated processing instruction", start))?;
            self.pos = body + len + 2;
            let content = &self.input[body..body + len];
            let name_len = content
                .iter()
                .position(|&b| is_whitespace(b))
                .unwrap_or(content.len());
            let target = &content[..name_len];
            if target.eq_ignore_ascii_case(b"xml") {
                return Ok(XmlEvent::XmlDeclaration);
            }
            let data = content[name_len..]
                .iter()
                .position(|&b| !is_whitespace(b))
                .map(|off| &content[name_len + off..]);
            return Ok(XmlEvent::ProcessingInstruction { target, data });
        }
        if rest.starts_with(b"</") {
            let body = start + 2;
            let len = memchr(b'>', &self.input[body..])
                .ok_or_else(|| ParseError::new("Unterminated end tag", start))?;
            self.pos = body + len + 1;
            let name = trim_end(&self.input[body..body + len]);
            if name.is_empty() {
                return Err(ParseError::new("Empty end tag name", start));
            }
            return Ok(XmlEvent::EndElement(EndElement::new(name)));
        }
        self.read_start_tag(start)
    }

    fn read_start_tag(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        let end = self.find_tag_end(start + 1)?;
        self.pos = end + 1;
        let mut inner = &self.input[start + 1..end];
        let empty = inner.last() == Some(&b'/');
        if empty {
            inner = &inner[..inner.len() - 1];
        }
        let name_len = inner
            .iter()
            .position(|&b| is_whitespace(b))
            .unwrap_or(inner.len());
        let name = &inner[..name_len];
        if name.is_empty() {
            return Err(ParseError::new("Missing element name", start));
        }
        let attributes =
            parse_attributes(&inner[name_len..]).map_err(|msg| ParseError::new(msg, start))?;
        let element = StartElement::new(name, attributes);
        Ok(if empty {
            XmlEvent::EmptyElement(element)
        } else {
            XmlEvent::StartElement(element)
        })
    }

    /// Find the closing '>' of a tag, skipping quoted attribute values
    fn find_tag_end(&self, mut pos: usize) -> Result<usize, ParseError> {
        let tag_start = pos - 1;
        loop {
            let o = memchr3(b'>', b'"', b'\'', &self.input[pos..])
                .ok_or_else(|| ParseError::new("Unterminated start tag", tag_start))?;
            let quote = self.input[pos + o];
            if quote == b'>' {
                return Ok(pos + o);
            }
            let value_start = pos + o + 1;
            let close = memchr(quote, &self.input[value_start..])
                .ok_or_else(|| ParseError::new("Unterminated attribute value", tag_start))?;
            pos = value_start + close + 1;
        }
    }

    fn read_doctype(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        let mut depth = 0usize;
        let mut pos = start + 2;
        while pos < self.input.len() {
            match self.input[pos] {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => {
                    self.pos = pos + 1;
                    return Ok(XmlEvent::DocType(&self.input[start + 9..pos]));
                }
                _ => {}
            }
            pos += 1;
        }
        Err(ParseError::new("Unterminated DOCTYPE", start))
    }
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let len = bytes
        .iter()
        .rposition(|&b| !is_whitespace(b))
        .map_or(0, |p| p + 1);
    &bytes[..len]
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = Result<XmlEvent<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}
