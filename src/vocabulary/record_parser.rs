use std::collections::BTreeMap;
use std::io::BufRead;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, space0};
use nom::sequence::terminated;
use nom::{IResult, Parser};
use crate::core::error::{Error, Result};

/// One Debian-control style record: field name to body
pub type Record = BTreeMap<String, String>;

fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

// Field name, optional blanks, then ':'
fn field_header(line: &str) -> IResult<&str, &str> {
    terminated(take_while1(is_field_char), (space0, char(':'))).parse(line)
}

/// Reads blank-line separated records of `Field: value` lines.
///
/// Continuation lines start with a blank; a continuation line holding only
/// `.` stands for an empty line. When a field repeats within a record the
/// first occurrence wins.
pub struct RecordParser<R: BufRead> {
    reader: R,
    source: String,
    line: usize,
    buf: String,
}

impl<R: BufRead> RecordParser<R> {
    pub fn new(reader: R, source: &str) -> Self {
        RecordParser {
            reader,
            source: source.to_string(),
            line: 0,
            buf: String::new(),
        }
    }

    /// Number of the last line read
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    // Next line without its terminator, and whether it had one
    fn read_line(&mut self) -> Result<Option<bool>> {
        self.buf.clear();
        let read = self
            .reader
            .read_line(&mut self.buf)
            .map_err(|e| Error::io(&self.source, e))?;
        if read == 0 {
            return Ok(None);
        }

        self.line += 1;
        let has_newline = self.buf.ends_with('\n');
        if has_newline {
            self.buf.pop();
        }
        Ok(Some(has_newline))
    }

    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let mut record = Record::new();
        let mut current: Option<(String, String)> = None;

        while let Some(has_newline) = self.read_line()? {
            let line = self.buf.as_str();

            if line.trim().is_empty() {
                if current.is_some() {
                    break;
                }
                continue;
            }

            if line.starts_with([' ', '\t']) {
                let Some((_, body)) = current.as_mut() else {
                    return Err(Error::parse(&self.source, self.line, "continuation line outside of a field"));
                };
                let text = line.trim();
                body.push('\n');
                if text != "." {
                    body.push_str(text);
                }
                continue;
            }

            let (rest, name) = match field_header(line) {
                Ok(parsed) => parsed,
                Err(_) => return Err(self.header_error(line, has_newline)),
            };

            if let Some((name, body)) = current.take() {
                record.entry(name).or_insert(body);
            }
            current = Some((name.to_string(), rest.trim().to_string()));
        }

        if let Some((name, body)) = current {
            record.entry(name).or_insert(body);
        }
        Ok(if record.is_empty() { None } else { Some(record) })
    }

    fn header_error(&self, line: &str, has_newline: bool) -> Error {
        let name_len = line.find(|c: char| !is_field_char(c)).unwrap_or(line.len());
        let after = line[name_len..].trim_start_matches([' ', '\t']);
        let message = match after.chars().next() {
            _ if name_len == 0 => format!("line does not start with a field name: \"{}\"", line),
            Some(c) => format!("invalid character `{}' expecting `:'", c),
            None if has_newline => "invalid character `\\n' expecting `:'".to_string(),
            None => format!("field is truncated at end of file.  Last line begins with: \"{}\"", line),
        };
        Error::parse(&self.source, self.line, message)
    }
}

impl<R: BufRead> Iterator for RecordParser<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
