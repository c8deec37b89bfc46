//! Textual access to one JSON log line.
//!
//! A log line is only ever read, never re-encoded: [`RecordView`] records
//! where the top-level keys of interest sit in the raw bytes, and
//! [`RecordView::insert_after_uid`] splices the new key in right after the
//! `uid` value. Every byte outside the insertion is copied through.

mod locate;

pub use locate::{locate_fields, FieldSpan};

use std::borrow::Cow;
use std::ops::Range;

use serde::de::IgnoredAny;

use crate::error::Result;
use crate::io::LogReader;

/// Located fields of a single JSON object line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView<'a> {
    line: &'a [u8],
    uid: Option<FieldSpan>,
    has_id_field: bool,
}

/// Why a line could not be viewed as a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineIssue {
    /// Empty or whitespace-only line
    Blank,
    /// Not valid JSON, or not a JSON object
    Malformed,
}

impl<'a> RecordView<'a> {
    /// Validate `line` as a JSON object and locate `uid_field` and `id_field`.
    pub fn parse(
        line: &'a [u8],
        uid_field: &str,
        id_field: &str,
    ) -> std::result::Result<Self, LineIssue> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Err(LineIssue::Blank);
        }
        // Full syntax check without building a value tree.
        if serde_json::from_slice::<IgnoredAny>(line).is_err() {
            return Err(LineIssue::Malformed);
        }

        let located = locate_fields(line, &[uid_field, id_field]).ok_or(LineIssue::Malformed)?;
        Ok(Self {
            line,
            uid: located[0].clone(),
            has_id_field: located[1].is_some(),
        })
    }

    /// Whether the record already carries the correlation-id field.
    pub fn has_id_field(&self) -> bool {
        self.has_id_field
    }

    pub fn has_uid(&self) -> bool {
        self.uid.is_some()
    }

    /// The uid as a string, if present and a JSON string.
    pub fn uid(&self) -> Option<Cow<'a, str>> {
        let span = self.uid.as_ref()?;
        decode_json_string(&self.line[span.value.clone()])
    }

    /// Byte range of the uid value (quotes included), if present.
    pub fn uid_span(&self) -> Option<Range<usize>> {
        self.uid.as_ref().map(|s| s.value.clone())
    }

    /// Write the line with `"<key>":"<value>"` inserted after the uid value.
    ///
    /// Returns `false` and writes nothing when the record has no uid.
    pub fn insert_after_uid(&self, key: &str, value: &str, out: &mut Vec<u8>) -> bool {
        let Some(span) = &self.uid else {
            return false;
        };
        let at = span.value.end;
        out.reserve(self.line.len() + key.len() + value.len() + 8);
        out.extend_from_slice(&self.line[..at]);
        out.push(b',');
        push_json_string(out, key);
        out.push(b':');
        push_json_string(out, value);
        out.extend_from_slice(&self.line[at..]);
        true
    }
}

/// Lines read past the start of a file while looking for its first record.
const MAX_LEADING_LINES: usize = 64;

/// What the first record of a log says about the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRecord {
    /// No JSON object among the leading lines (empty file, TSV log, ...)
    Missing,
    /// First record has no uid field
    WithoutUid,
    /// First record has a uid; `has_id_field` if it already carries the id
    WithUid { has_id_field: bool },
}

impl FirstRecord {
    /// Read from `reader` until the first line that parses as a JSON object.
    ///
    /// Blank and malformed leading lines are passed over, up to a limit.
    pub fn read(reader: &mut LogReader, uid_field: &str, id_field: &str) -> Result<Self> {
        let mut line = Vec::new();
        for _ in 0..MAX_LEADING_LINES {
            if !reader.read_line(&mut line)? {
                break;
            }
            match RecordView::parse(&line, uid_field, id_field) {
                Ok(view) if view.has_uid() => {
                    return Ok(FirstRecord::WithUid {
                        has_id_field: view.has_id_field(),
                    })
                }
                Ok(_) => return Ok(FirstRecord::WithoutUid),
                Err(_) => continue,
            }
        }
        Ok(FirstRecord::Missing)
    }
}

/// Decode a raw JSON string token (with quotes). Non-strings give `None`.
fn decode_json_string(raw: &[u8]) -> Option<Cow<'_, str>> {
    let inner = raw.strip_prefix(b"\"")?.strip_suffix(b"\"")?;
    if !inner.contains(&b'\\') {
        return std::str::from_utf8(inner).ok().map(Cow::Borrowed);
    }
    serde_json::from_slice::<String>(raw).ok().map(Cow::Owned)
}

fn push_json_string(out: &mut Vec<u8>, s: &str) {
    // Serializing a &str into a Vec cannot fail.
    if serde_json::to_writer(&mut *out, s).is_err() {
        out.extend_from_slice(b"\"\"");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(line: &str) -> std::result::Result<RecordView<'_>, LineIssue> {
        RecordView::parse(line.as_bytes(), "uid", "community_id")
    }

    #[test]
    fn test_parse_locates_uid() {
        let v = view(r#"{"ts":1.5,"uid":"CHhAvVGS1DHFjwGM9","id.orig_h":"10.0.0.1"}"#).unwrap();
        assert!(v.has_uid());
        assert!(!v.has_id_field());
        assert_eq!(v.uid().as_deref(), Some("CHhAvVGS1DHFjwGM9"));
    }

    #[test]
    fn test_parse_detects_id_field() {
        let v = view(r#"{"uid":"C1","community_id":"1:abc="}"#).unwrap();
        assert!(v.has_id_field());
    }

    #[test]
    fn test_blank_and_malformed() {
        assert_eq!(view("   \n"), Err(LineIssue::Blank));
        assert_eq!(view(r#"{"uid":"C1","ts":"#), Err(LineIssue::Malformed));
        assert_eq!(view(r#"["uid","C1"]"#), Err(LineIssue::Malformed));
        assert_eq!(view("#separator \\x09"), Err(LineIssue::Malformed));
    }

    #[test]
    fn test_insert_preserves_every_other_byte() {
        let line = "{\"uid\":\"C1\",\"ts\":1625000000.123456,\"dur\":2.288818359375e-05}\n";
        let v = view(line).unwrap();
        let mut out = Vec::new();
        assert!(v.insert_after_uid("community_id", "1:LQU9qZlK+B5F3KDmev6m5PMibrg=", &mut out));
        assert_eq!(
            String::from_utf8(out.clone()).unwrap(),
            "{\"uid\":\"C1\",\"community_id\":\"1:LQU9qZlK+B5F3KDmev6m5PMibrg=\",\"ts\":1625000000.123456,\"dur\":2.288818359375e-05}\n"
        );

        let inserted = ",\"community_id\":\"1:LQU9qZlK+B5F3KDmev6m5PMibrg=\"";
        let restored = String::from_utf8(out).unwrap().replacen(inserted, "", 1);
        assert_eq!(restored, line);
    }

    #[test]
    fn test_insert_when_uid_is_last() {
        let v = view(r#"{"ts":1.0,"uid":"C9"}"#).unwrap();
        let mut out = Vec::new();
        assert!(v.insert_after_uid("community_id", "1:x=", &mut out));
        assert_eq!(out, br#"{"ts":1.0,"uid":"C9","community_id":"1:x="}"#);
    }

    #[test]
    fn test_insert_keeps_whitespace() {
        let v = view("{ \"uid\" : \"C2\" , \"a\" : 1 }\r\n").unwrap();
        let mut out = Vec::new();
        v.insert_after_uid("cid", "1:y=", &mut out);
        assert_eq!(out, b"{ \"uid\" : \"C2\",\"cid\":\"1:y=\" , \"a\" : 1 }\r\n");
    }

    #[test]
    fn test_nested_uid_is_not_top_level() {
        let v = view(r#"{"conn":{"uid":"C1"},"x":1}"#).unwrap();
        assert!(!v.has_uid());
        let mut out = Vec::new();
        assert!(!v.insert_after_uid("community_id", "1:x=", &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn test_escaped_uid_decodes() {
        let v = view(r#"{"uid":"\u0043\u0031"}"#).unwrap();
        assert_eq!(v.uid().as_deref(), Some("C1"));
    }

    #[test]
    fn test_non_string_uid() {
        let v = view(r#"{"uid":42}"#).unwrap();
        assert!(v.has_uid());
        assert_eq!(v.uid(), None);
    }
}
