//! Minimal scanner over the top level of a JSON object.
//!
//! Walks key/value pairs of the outermost object and reports the byte spans
//! of the requested keys. Nested values are skipped over, not interpreted.
//! Returns `None` on anything that is not an object; callers check syntax
//! with serde_json first, so this only has to stay in bounds.

use std::ops::Range;

/// Byte spans of one top-level member. Both ranges include the quotes of
/// string tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpan {
    pub key: Range<usize>,
    pub value: Range<usize>,
}

/// Locate the first occurrence of each of `keys` among the top-level members
/// of the JSON object in `line`.
pub fn locate_fields(line: &[u8], keys: &[&str]) -> Option<Vec<Option<FieldSpan>>> {
    let mut found: Vec<Option<FieldSpan>> = vec![None; keys.len()];
    let mut s = Scanner { buf: line, pos: 0 };

    s.skip_ws();
    s.expect(b'{')?;
    s.skip_ws();
    if s.peek() == Some(b'}') {
        return Some(found);
    }

    loop {
        s.skip_ws();
        let key = s.string()?;
        s.skip_ws();
        s.expect(b':')?;
        s.skip_ws();
        let value = s.value()?;

        for (slot, wanted) in found.iter_mut().zip(keys) {
            if slot.is_none() && key_matches(&line[key.clone()], wanted) {
                *slot = Some(FieldSpan {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }

        s.skip_ws();
        match s.bump()? {
            b',' => continue,
            b'}' => break,
            _ => return None,
        }
    }

    Some(found)
}

fn key_matches(raw: &[u8], wanted: &str) -> bool {
    let inner = match raw.strip_prefix(b"\"").and_then(|r| r.strip_suffix(b"\"")) {
        Some(inner) => inner,
        None => return false,
    };
    if !inner.contains(&b'\\') {
        return inner == wanted.as_bytes();
    }
    serde_json::from_slice::<String>(raw).is_ok_and(|k| k == wanted)
}

struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, want: u8) -> Option<()> {
        (self.bump()? == want).then_some(())
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// String token starting at the current quote.
    fn string(&mut self) -> Option<Range<usize>> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.bump()? {
                b'\\' => {
                    self.bump()?;
                }
                b'"' => return Some(start..self.pos),
                _ => {}
            }
        }
    }

    fn value(&mut self) -> Option<Range<usize>> {
        match self.peek()? {
            b'"' => self.string(),
            b'{' | b'[' => self.nested(),
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                    self.pos += 1;
                }
                (self.pos > start).then_some(start..self.pos)
            }
        }
    }

    /// Object or array, skipped by bracket depth with strings respected.
    fn nested(&mut self) -> Option<Range<usize>> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                b'"' => {
                    self.string()?;
                    continue;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        self.pos += 1;
                        return Some(start..self.pos);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}
