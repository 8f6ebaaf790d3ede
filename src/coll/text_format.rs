use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Bytes, Read, Write};
use std::path::Path;
use crate::coll::fast::FastCollection;
use crate::core::error::{Error, Result};

pub type ItemSet = BTreeSet<String>;
pub type TagSet = BTreeSet<String>;

/// What terminated an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Eof,
    Newline,
    Colon,
    Comma,
}

enum Element {
    Token(Vec<u8>, Separator),
    /// A ':' or ',' found where an element should begin
    LeadingSeparator(u8),
}

#[derive(Clone, Copy)]
enum State {
    LeadingSpace,
    Item,
    InnerSpace,
    InnerSeparator,
    TrailingSpace,
}

/// Byte-level tokenizer with one byte of pushback.
///
/// Keeps the text of the current line read so far, for error messages.
struct ElementReader<R: Read> {
    bytes: Bytes<BufReader<R>>,
    pushback: Option<u8>,
    line_text: Vec<u8>,
    line_done: bool,
}

impl<R: Read> ElementReader<R> {
    fn new(reader: R) -> Self {
        ElementReader {
            bytes: BufReader::new(reader).bytes(),
            pushback: None,
            line_text: Vec::new(),
            line_done: false,
        }
    }

    fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        if let Some(c) = self.pushback.take() {
            return Ok(Some(c));
        }
        let next = self.bytes.next().transpose()?;
        if let Some(c) = next {
            if self.line_done {
                self.line_text.clear();
            }
            self.line_done = c == b'\n';
            if !self.line_done {
                self.line_text.push(c);
            }
        }
        Ok(next)
    }

    fn line_text(&self) -> String {
        String::from_utf8_lossy(&self.line_text).trim().to_string()
    }

    // element: \s*[^ \t,:](.*?[^ \t,:])?\s*([,:]\s+|\n|EOF)
    // A separator only separates when followed by blank space, a newline or
    // the end of input, so "facet::tag" and "a,b" are single tokens.
    fn parse_element(&mut self) -> std::result::Result<Element, ElementError> {
        let mut item = Vec::new();
        let mut sep = Vec::new();
        let mut sepchar: Option<u8> = None;
        let mut state = State::LeadingSpace;

        while let Some(c) = self.next_byte().map_err(ElementError::Io)? {
            if c == b'\n' {
                if matches!(sepchar, Some(s) if s != b':') {
                    return Err(ElementError::SeparatorEndsLine);
                }
                return Ok(Element::Token(item, Separator::Newline));
            }

            match state {
                State::LeadingSpace => match c {
                    b' ' | b'\t' => {}
                    b':' | b',' => return Ok(Element::LeadingSeparator(c)),
                    _ => {
                        item.push(c);
                        state = State::Item;
                    }
                },
                State::Item => match c {
                    b' ' | b'\t' => {
                        sep.push(c);
                        state = State::InnerSpace;
                    }
                    b':' | b',' => {
                        sepchar = Some(c);
                        sep.push(c);
                        state = State::InnerSeparator;
                    }
                    _ => item.push(c),
                },
                State::InnerSpace => match c {
                    b' ' | b'\t' => sep.push(c),
                    b':' | b',' => {
                        sepchar = Some(c);
                        state = State::TrailingSpace;
                    }
                    _ => {
                        item.append(&mut sep);
                        item.push(c);
                        state = State::Item;
                    }
                },
                State::InnerSeparator => match c {
                    b' ' | b'\t' => {
                        if sep.len() > 1 {
                            return Err(ElementError::DoubleSeparator);
                        }
                        state = State::TrailingSpace;
                    }
                    b':' | b',' => sep.push(c),
                    _ => {
                        item.append(&mut sep);
                        item.push(c);
                        sepchar = None;
                        state = State::Item;
                    }
                },
                State::TrailingSpace => match c {
                    b' ' | b'\t' => {}
                    _ => {
                        self.pushback = Some(c);
                        let separator = match sepchar {
                            Some(b':') => Separator::Colon,
                            _ => Separator::Comma,
                        };
                        return Ok(Element::Token(item, separator));
                    }
                },
            }
        }

        Ok(Element::Token(item, Separator::Eof))
    }
}

enum ElementError {
    Io(std::io::Error),
    SeparatorEndsLine,
    DoubleSeparator,
}

/// Lazy, single-pass parser of `item, item: tag, tag` lines.
///
/// Yields one `(items, tags)` pair per non-empty line. The first error ends
/// the sequence.
pub struct TextFormatParser<R: Read> {
    reader: ElementReader<R>,
    source: String,
    line: usize,
    done: bool,
}

impl<R: Read> TextFormatParser<R> {
    pub fn new(reader: R, source: &str) -> Self {
        TextFormatParser {
            reader: ElementReader::new(reader),
            source: source.to_string(),
            line: 1,
            done: false,
        }
    }

    /// Parse error quoting the line up to where parsing stopped
    fn error(&self, message: &str) -> Error {
        Error::parse(&self.source, self.line, format!("{} near \"{}\"", message, self.reader.line_text()))
    }

    fn parse_line(&mut self) -> Result<Option<(ItemSet, TagSet)>> {
        let mut items = ItemSet::new();
        let mut tags = TagSet::new();
        let mut in_tags = false;

        loop {
            let element = match self.reader.parse_element() {
                Ok(element) => element,
                Err(ElementError::Io(e)) => return Err(Error::io(&self.source, e)),
                Err(ElementError::SeparatorEndsLine) => {
                    return Err(self.error("separator character ends the line"));
                }
                Err(ElementError::DoubleSeparator) => {
                    return Err(self.error("item is followed by more than one separator character"));
                }
            };

            let (item, sep) = match element {
                Element::Token(item, sep) => (item, sep),
                Element::LeadingSeparator(b':') if in_tags => {
                    return Err(self.error("separator ':' appears twice"));
                }
                Element::LeadingSeparator(b':') if items.is_empty() => {
                    return Err(self.error("no elements before ':' separator"));
                }
                Element::LeadingSeparator(c) => {
                    return Err(self.error(&format!("element cannot start with separation character '{}'", c as char)));
                }
            };

            if !item.is_empty() {
                let item = String::from_utf8(item)
                    .map_err(|e| self.error(&format!("invalid UTF-8 in element: {}", e)))?;
                if in_tags {
                    tags.insert(item);
                } else {
                    items.insert(item);
                }
            }

            match sep {
                Separator::Newline | Separator::Eof => {
                    if !(items.is_empty() && tags.is_empty()) {
                        if items.is_empty() {
                            return Err(self.error("no elements before ':' separator"));
                        }
                        if sep == Separator::Newline {
                            self.line += 1;
                        }
                        return Ok(Some((items, tags)));
                    }
                    if sep == Separator::Eof {
                        return Ok(None);
                    }
                    self.line += 1;
                }
                Separator::Colon => {
                    if in_tags {
                        return Err(self.error("separator ':' appears twice"));
                    }
                    in_tags = true;
                }
                Separator::Comma => {}
            }
        }
    }
}

impl<R: Read> Iterator for TextFormatParser<R> {
    type Item = Result<(ItemSet, TagSet)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.parse_line() {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub fn parse<R: Read>(reader: R, source: &str) -> TextFormatParser<R> {
    TextFormatParser::new(reader, source)
}

/// Merge every line of `reader` into `out`, returning the number of lines read
pub fn read_into<R: Read>(reader: R, source: &str, out: &mut FastCollection) -> Result<usize> {
    let mut count = 0;
    for pair in parse(reader, source) {
        let (items, tags) = pair?;
        out.insert_many(&items, &tags);
        count += 1;
    }
    Ok(count)
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<FastCollection> {
    let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
    let mut coll = FastCollection::new();
    read_into(file, &path.as_ref().display().to_string(), &mut coll)?;
    Ok(coll)
}

pub fn format_line<'a, I, T>(items: I, tags: T) -> String
where
    I: IntoIterator<Item = &'a String>,
    T: IntoIterator<Item = &'a String>,
{
    let items: Vec<&str> = items.into_iter().map(String::as_str).collect();
    let tags: Vec<&str> = tags.into_iter().map(String::as_str).collect();
    if tags.is_empty() {
        format!("{}\n", items.join(", "))
    } else {
        format!("{}: {}\n", items.join(", "), tags.join(", "))
    }
}

/// Write one `item: tag, tag` line per item, in item order
pub fn write_collection<W: Write>(out: &mut W, coll: &FastCollection) -> std::io::Result<()> {
    for (item, tags) in coll.iter() {
        out.write_all(format_line(std::iter::once(item), tags).as_bytes())?;
    }
    Ok(())
}
