//! Paragraph extraction from raw document XML
//!
//! Documents arrive as raw XML where every paragraph lives in a `paratext`
//! element. The extractor walks the event stream once and rebuilds each
//! paragraph from its child elements:
//!
//! - every tag is replaced by a space
//! - curly double quotes and the private-use bullet glyph are dropped
//! - each child's text is split into lines, lines are trimmed, and blank or
//!   purely numeric lines (star-page anchors) are discarded
//! - the surviving lines are joined with single spaces
//! - `&`, `<` and `>` in text keep their escaped form
//!
//! A `paratext` nested in another one is part of the outer paragraph and is
//! also emitted on its own, after it.
//!
//! Text sitting in `paratext` before its first child element is not part of
//! any child and is therefore skipped; text after a child (its tail) belongs
//! to that child.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::utils::error::ExtractError;

const PARAGRAPH_TAG: &[u8] = b"paratext";

/// Characters removed from extracted text
const STRIPPED_CHARS: &[char] = &['\u{201C}', '\u{201D}', '\u{F0A7}'];

/// Extract the plain-text paragraphs of a raw XML document
///
/// # Examples
///
/// ```
/// use knowledge_extractor::loader::extract::extract_paragraphs;
///
/// let xml = "<doc><para><paratext><anchor>3</anchor>\nSome text.\n</paratext></para></doc>";
/// assert_eq!(extract_paragraphs(xml).unwrap(), vec!["Some text.".to_string()]);
/// ```
///
/// # Errors
///
/// Returns `ExtractError::Malformed` if the document is not well-formed XML.
pub fn extract_paragraphs(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);

    // One slot per `paratext` in document order, filled when it closes
    let mut slots: Vec<Option<String>> = Vec::new();
    let mut open: Vec<ParagraphBuilder> = Vec::new();

    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| ExtractError::Malformed {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                saw_root = true;
                for builder in open.iter_mut() {
                    builder.open_tag(depth);
                }
                if depth > 0 && e.local_name().as_ref() == PARAGRAPH_TAG {
                    open.push(ParagraphBuilder::new(depth + 1, slots.len()));
                    slots.push(None);
                }
                depth += 1;
            }
            Event::Empty(_) => {
                saw_root = true;
                for builder in open.iter_mut() {
                    builder.open_tag(depth);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if open.last().is_some_and(|b| b.inner_depth == depth + 1) {
                    if let Some(mut builder) = open.pop() {
                        slots[builder.slot] = builder.finish();
                    }
                }
                for builder in open.iter_mut() {
                    builder.close_tag();
                }
            }
            Event::Text(e) => {
                push_escaped(&mut open, &String::from_utf8_lossy(&e));
            }
            Event::CData(e) => {
                push_escaped(&mut open, &String::from_utf8_lossy(&e));
            }
            Event::GeneralRef(e) => {
                let reference = format!("&{};", String::from_utf8_lossy(&e));
                match quick_xml::escape::unescape(&reference) {
                    Ok(text) => push_escaped(&mut open, &text),
                    // Unknown entities stay verbatim
                    Err(_) => push_text(&mut open, &reference),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ExtractError::Malformed {
            position: 0,
            message: "no element found".to_string(),
        });
    }

    if depth > 0 {
        return Err(ExtractError::Malformed {
            position: xml.len() as u64,
            message: format!("unexpected end of document with {depth} unclosed element(s)"),
        });
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Feed text to every open paragraph with `&`, `<` and `>` escaped again,
/// as they appear in serialized markup
fn push_escaped(open: &mut [ParagraphBuilder], text: &str) {
    if !open.is_empty() {
        push_text(open, &quick_xml::escape::partial_escape(text));
    }
}

fn push_text(open: &mut [ParagraphBuilder], text: &str) {
    for builder in open.iter_mut() {
        builder.push_text(text);
    }
}

/// Accumulates one `paratext` element
struct ParagraphBuilder {
    /// Depth of the direct children of the `paratext` element
    inner_depth: usize,

    /// Position of this paragraph among all `paratext` elements
    slot: usize,

    /// Markup of the child currently being read, tags already replaced
    segment: Option<String>,

    /// Cleaned lines collected so far
    lines: Vec<String>,
}

impl ParagraphBuilder {
    fn new(inner_depth: usize, slot: usize) -> Self {
        Self {
            inner_depth,
            slot,
            segment: None,
            lines: Vec::new(),
        }
    }

    fn open_tag(&mut self, depth: usize) {
        if depth == self.inner_depth {
            self.flush();
            self.segment = Some(String::new());
        }
        self.push_text(" ");
    }

    fn close_tag(&mut self) {
        self.push_text(" ");
    }

    fn push_text(&mut self, text: &str) {
        if let Some(segment) = self.segment.as_mut() {
            segment.push_str(text);
        }
    }

    fn flush(&mut self) {
        if let Some(segment) = self.segment.take() {
            self.lines.extend(clean_segment(&segment));
        }
    }

    fn finish(&mut self) -> Option<String> {
        self.flush();
        let text = self.lines.join(" ").trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Split one child's text into its kept lines
fn clean_segment(segment: &str) -> Vec<String> {
    let cleaned: String = segment
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();

    cleaned
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.chars().all(char::is_numeric))
        .map(str::to_string)
        .collect()
}
