//! WordprocessingML paragraph rewriting.
//!
//! A placeholder can be split across several `<w:t>` runs, so text is joined
//! per `<w:p>` before it is scanned or replaced. Paragraphs inside table cells
//! and text boxes are ordinary `<w:p>` elements and are handled the same way.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use super::placeholder::Replacement;

const PARAGRAPH: &[u8] = b"w:p";
const TEXT: &[u8] = b"w:t";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("rewritten XML is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("document ends inside an unclosed <w:p> element")]
    UnclosedParagraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    ParagraphStart,
    ParagraphEnd,
    TextStart,
    TextEnd,
    Text,
    Other,
    Eof,
}

fn classify(event: &Event<'_>) -> Tag {
    match event {
        Event::Start(start) if start.name().as_ref() == PARAGRAPH => Tag::ParagraphStart,
        Event::End(end) if end.name().as_ref() == PARAGRAPH => Tag::ParagraphEnd,
        Event::Start(start) if start.name().as_ref() == TEXT => Tag::TextStart,
        Event::End(end) if end.name().as_ref() == TEXT => Tag::TextEnd,
        Event::Text(_) => Tag::Text,
        Event::Eof => Tag::Eof,
        _ => Tag::Other,
    }
}

/// One `<w:t>` element: index of its start tag and of its text events.
struct TextRun {
    start: usize,
    texts: Vec<usize>,
}

/// Buffered events of an open `<w:p>`.
struct Paragraph {
    events: Vec<Event<'static>>,
    runs: Vec<TextRun>,
    in_text: bool,
}

impl Paragraph {
    fn open(start: Event<'static>) -> Self {
        Self {
            events: vec![start],
            runs: Vec::new(),
            in_text: false,
        }
    }

    fn push(&mut self, tag: Tag, event: Event<'static>) {
        let index = self.events.len();
        match tag {
            Tag::TextStart => {
                self.runs.push(TextRun {
                    start: index,
                    texts: Vec::new(),
                });
                self.in_text = true;
            }
            Tag::TextEnd => self.in_text = false,
            Tag::Text if self.in_text => {
                if let Some(run) = self.runs.last_mut() {
                    run.texts.push(index);
                }
            }
            _ => {}
        }
        self.events.push(event);
    }

    /// Join the paragraph's text and feed it to `edit`. Each replacement value
    /// is written into the text element where its token starts; the rest of
    /// the token is cut from the elements it spans. Text outside tokens, and
    /// everything that is not text (breaks, tabs, run properties), stays put.
    fn apply<F>(&mut self, edit: &mut F) -> Result<bool, XmlError>
    where
        F: FnMut(&str) -> Vec<Replacement>,
    {
        let mut text = String::new();
        let mut segments = Vec::new();
        for run in &self.runs {
            for &index in &run.texts {
                if let Event::Text(content) = &self.events[index] {
                    let start = text.len();
                    text.push_str(&content.unescape()?);
                    segments.push(Segment {
                        event: index,
                        run_start: run.start,
                        start,
                        end: text.len(),
                    });
                }
            }
        }
        if text.is_empty() {
            return Ok(false);
        }

        let replacements = edit(&text);
        if replacements
            .iter()
            .all(|r| text[r.start..r.end] == r.value)
        {
            return Ok(false);
        }

        let mut changed = false;
        for segment in &segments {
            let Some(rewritten) = rewrite_segment(&text, segment, &replacements) else {
                continue;
            };
            self.events[segment.run_start] =
                Event::Start(preserve_space(&self.events[segment.run_start]));
            self.events[segment.event] = Event::Text(BytesText::new(&rewritten).into_owned());
            changed = true;
        }
        Ok(changed)
    }
}

/// Where one text event sits in the joined paragraph text.
struct Segment {
    event: usize,
    run_start: usize,
    start: usize,
    end: usize,
}

/// New content of `segment`, or `None` when no replacement changes it.
fn rewrite_segment(joined: &str, segment: &Segment, replacements: &[Replacement]) -> Option<String> {
    let (start, end) = (segment.start, segment.end);
    let mut out = String::new();
    let mut position = start;
    let mut touched = false;

    for replacement in replacements
        .iter()
        .filter(|r| r.start < end && r.end > start)
    {
        touched = true;
        out.push_str(&joined[position..replacement.start.max(start)]);
        if replacement.start >= start {
            out.push_str(&replacement.value);
        }
        position = replacement.end.min(end);
    }
    if !touched {
        return None;
    }
    out.push_str(&joined[position..end]);

    (out != joined[start..end]).then_some(out)
}

fn preserve_space(event: &Event<'static>) -> BytesStart<'static> {
    let mut start = BytesStart::new("w:t");
    if let Event::Start(original) = event {
        for attribute in original.attributes().flatten() {
            if attribute.key.as_ref() != b"xml:space" {
                start.push_attribute(attribute);
            }
        }
    }
    start.push_attribute(("xml:space", "preserve"));
    start
}

/// Feed the text of every paragraph in `xml` to `edit` and apply the
/// replacements it returns.
///
/// Returns the rewritten document when at least one paragraph changed, `None`
/// otherwise. Unchanged paragraphs are written back event for event.
pub(crate) fn rewrite_paragraphs<F>(xml: &str, mut edit: F) -> Result<Option<String>, XmlError>
where
    F: FnMut(&str) -> Vec<Replacement>,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut stack: Vec<Paragraph> = Vec::new();
    let mut changed = false;

    loop {
        let event = reader.read_event()?;
        match classify(&event) {
            Tag::Eof => break,
            Tag::ParagraphStart => stack.push(Paragraph::open(event.into_owned())),
            Tag::ParagraphEnd => match stack.pop() {
                Some(mut paragraph) => {
                    paragraph.events.push(event.into_owned());
                    changed |= paragraph.apply(&mut edit)?;
                    for buffered in paragraph.events {
                        match stack.last_mut() {
                            // Nested paragraphs become opaque content of the parent.
                            Some(parent) => parent.events.push(buffered),
                            None => writer.write_event(buffered)?,
                        }
                    }
                }
                None => writer.write_event(event)?,
            },
            tag => match stack.last_mut() {
                Some(paragraph) => paragraph.push(tag, event.into_owned()),
                None => writer.write_event(event)?,
            },
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::UnclosedParagraph);
    }
    if !changed {
        return Ok(None);
    }
    Ok(Some(String::from_utf8(writer.into_inner())?))
}

/// Joined text of every paragraph, in document order.
pub(crate) fn paragraph_texts(xml: &str) -> Result<Vec<String>, XmlError> {
    let mut texts = Vec::new();
    rewrite_paragraphs(xml, |text| {
        texts.push(text.to_string());
        Vec::new()
    })?;
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use crate::template::placeholder::replacements;

    const SPLIT_RUNS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Dear !na</w:t></w:r><w:r><w:t>me!,</w:t></w:r></w:p><w:p><w:r><w:t>static</w:t></w:r></w:p></w:body></w:document>"#;

    fn render(xml: &str, pairs: &[(&str, &str)]) -> Option<String> {
        let record: Record = pairs.iter().copied().collect();
        rewrite_paragraphs(xml, |text| replacements(text, &record)).unwrap()
    }

    #[test]
    fn test_paragraph_text_joins_runs() {
        let texts = paragraph_texts(SPLIT_RUNS).unwrap();
        assert_eq!(texts, vec!["Dear !name!,", "static"]);
    }

    #[test]
    fn test_split_token_value_goes_where_token_starts() {
        let out = render(SPLIT_RUNS, &[("name", "Alice & Bob")]).unwrap();

        assert!(out.contains(r#"<w:t xml:space="preserve">Dear Alice &amp; Bob</w:t>"#));
        assert!(out.contains(r#"<w:t xml:space="preserve">,</w:t>"#));
        assert!(out.contains("<w:rPr><w:b/></w:rPr>"));
        assert!(out.contains("<w:t>static</w:t>"));
        assert_eq!(paragraph_texts(&out).unwrap()[0], "Dear Alice & Bob,");
    }

    #[test]
    fn test_breaks_and_tabs_keep_their_place() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>Owner:</w:t></w:r><w:r><w:br/></w:r><w:r><w:tab/></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>!name!</w:t></w:r><w:r><w:t> end</w:t></w:r></w:p></w:body></w:document>"#;
        let out = render(xml, &[("name", "Alice")]).unwrap();

        let label = out.find("Owner:").unwrap();
        let br = out.find("<w:br/>").unwrap();
        let tab = out.find("<w:tab/>").unwrap();
        let italic = out.find("<w:i/>").unwrap();
        let alice = out.find("Alice").unwrap();
        let end = out.find(" end").unwrap();
        assert!(label < br && br < tab && tab < italic && italic < alice && alice < end);

        // Runs the token does not touch are written back unchanged.
        assert!(out.contains("<w:t>Owner:</w:t>"));
        assert!(out.contains("<w:t> end</w:t>"));
    }

    #[test]
    fn test_token_spanning_three_runs() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>a !ci</w:t></w:r><w:r><w:t>t</w:t></w:r><w:r><w:t>y! b</w:t></w:r></w:p></w:body></w:document>"#;
        let out = render(xml, &[("city", "NY")]).unwrap();

        assert!(out.contains(r#"<w:t xml:space="preserve">a NY</w:t>"#));
        assert!(out.contains(r#"<w:t xml:space="preserve"></w:t>"#));
        assert!(out.contains(r#"<w:t xml:space="preserve"> b</w:t>"#));
    }

    #[test]
    fn test_unchanged_document_returns_none() {
        assert!(render(SPLIT_RUNS, &[]).is_none());
        assert!(render(SPLIT_RUNS, &[("name", "!name!")]).is_none());
    }

    #[test]
    fn test_table_cells_and_nested_paragraphs() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:tbl><w:tr><w:tc><w:p><w:r><w:t>!city!</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>outer !a!</w:t></w:r><w:r><w:txbxContent><w:p><w:r><w:t>inner !b!</w:t></w:r></w:p></w:txbxContent></w:r></w:p></w:body></w:document>"#;

        let texts = paragraph_texts(xml).unwrap();
        assert_eq!(texts, vec!["!city!", "inner !b!", "outer !a!"]);

        let out = render(xml, &[("city", "city"), ("a", "a"), ("b", "b")]).unwrap();
        let texts = paragraph_texts(&out).unwrap();
        assert_eq!(texts, vec!["city", "inner b", "outer a"]);
    }

    #[test]
    fn test_unclosed_paragraph_is_an_error() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>x</w:t></w:r>"#;
        assert!(rewrite_paragraphs(xml, |_| Vec::new()).is_err());
    }
}
