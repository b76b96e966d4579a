//! Canonical JSON bytes for signed payloads.
//!
//! The node re-encodes the response `data` object with Go's `encoding/json`
//! before checking our signature, so the bytes we sign must match that
//! encoder: compact output, struct field order, and `<`, `>`, `&`, U+2028 and
//! U+2029 escaped as `\u00XX` sequences.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

struct GoCompatFormatter;

impl Formatter for GoCompatFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serialize `value` to the canonical signed byte form.
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, GoCompatFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}
