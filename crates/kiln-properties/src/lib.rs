//! A minimal reader/writer for Java `.properties` files.
//!
//! The goal is test-harness support rather than perfect spec compliance:
//! parsing understands logical-line continuations, comments, and the common
//! escapes; serialization is deterministic (sorted keys, escaped output, one
//! header comment) so that re-running a producer reproduces the file byte for
//! byte.

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    pub entries: Vec<PropertyEntry>,
}

impl PropertiesFile {
    /// The value of the *last* entry with the given key, mirroring how
    /// `java.util.Properties` resolves duplicates.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    #[must_use]
    pub fn by_key(&self, key: &str) -> impl Iterator<Item = &PropertyEntry> {
        let key = key.to_string();
        self.entries.iter().filter(move |e| e.key == key)
    }
}

/// Parse a `.properties` file into key/value entries.
#[must_use]
pub fn parse(text: &str) -> PropertiesFile {
    let bytes = text.as_bytes();
    let mut offset = 0usize;
    let mut entries = Vec::new();

    while offset < bytes.len() {
        let line_start = offset;
        let logical = read_logical_line(bytes, &mut offset);
        let Some((key, value)) = parse_logical_line(&logical) else {
            continue;
        };

        entries.push(PropertyEntry { key, value });

        // Ensure we always make progress even on pathological inputs.
        if offset == line_start {
            offset += 1;
        }
    }

    PropertiesFile { entries }
}

/// Serialize entries as `key=value` lines in sorted key order, preceded by a
/// single `# <header>` comment line.
#[must_use]
pub fn serialize(entries: &BTreeMap<String, String>, header: &str) -> String {
    let mut out = String::new();
    out.push_str("# ");
    out.push_str(header);
    out.push('\n');

    for (key, value) in entries {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }

    out
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for (idx, ch) in text.char_indices() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(ch);
            }
            '#' | '!' if idx == 0 => {
                out.push('\\');
                out.push(ch);
            }
            ' ' if is_key || idx == 0 => {
                out.push('\\');
                out.push(ch);
            }
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
}

fn read_logical_line(bytes: &[u8], offset: &mut usize) -> Vec<u8> {
    let mut out = Vec::new();

    loop {
        let segment_start = *offset;
        let mut line_end = segment_start;
        while line_end < bytes.len() && bytes[line_end] != b'\n' {
            line_end += 1;
        }

        let mut content_end = line_end;
        if content_end > segment_start && bytes[content_end - 1] == b'\r' {
            content_end -= 1;
        }

        // Does the physical line end with an unescaped `\`?
        let continues = ends_with_unescaped_backslash(&bytes[segment_start..content_end]);
        let copy_end = if continues {
            // Skip the final backslash.
            content_end.saturating_sub(1)
        } else {
            content_end
        };

        out.extend_from_slice(&bytes[segment_start..copy_end]);

        // Consume the newline if present.
        *offset = if line_end < bytes.len() {
            line_end + 1
        } else {
            line_end
        };

        if !continues {
            break;
        }

        // Continuation: skip leading whitespace on the next physical line.
        while *offset < bytes.len() {
            match bytes[*offset] {
                b' ' | b'\t' | b'\x0C' => {
                    *offset += 1;
                }
                _ => break,
            }
        }
    }

    out
}

fn ends_with_unescaped_backslash(line: &[u8]) -> bool {
    let mut i = line.len();
    let mut backslashes = 0usize;
    while i > 0 && line[i - 1] == b'\\' {
        backslashes += 1;
        i -= 1;
    }
    backslashes % 2 == 1
}

fn parse_logical_line(line: &[u8]) -> Option<(String, String)> {
    let mut i = 0usize;
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    if i >= line.len() {
        return None;
    }

    if line[i] == b'#' || line[i] == b'!' {
        return None;
    }

    let key_start = i;
    while i < line.len() {
        match line[i] {
            b'\\' => {
                // Escaped character.
                i += 2;
            }
            b'=' | b':' => break,
            b if is_whitespace(b) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());

    // Skip whitespace between key and separator.
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    // Optional `:` / `=`.
    if i < line.len() && (line[i] == b'=' || line[i] == b':') {
        i += 1;
    }

    // Skip whitespace after separator.
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    let key = unescape(&line[key_start..key_end]);
    let value = unescape(&line[i..]);

    Some((key, value))
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\x0C')
}

fn unescape(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            // Copy the run up to the next escape, decoding it as UTF-8 so
            // multibyte values survive a parse round trip.
            let start = i;
            while i < bytes.len() && bytes[i] != b'\\' {
                i += 1;
            }
            out.push_str(&String::from_utf8_lossy(&bytes[start..i]));
            continue;
        }

        i += 1;
        if i >= bytes.len() {
            out.push('\\');
            break;
        }

        match bytes[i] {
            b't' => out.push('\t'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b'f' => out.push('\x0C'),
            b'\\' => out.push('\\'),
            b'u' => {
                if i + 4 < bytes.len() {
                    let mut value = 0u32;
                    for j in 1..=4 {
                        value <<= 4;
                        value |= from_hex(bytes[i + j]) as u32;
                    }
                    if let Some(ch) = char::from_u32(value) {
                        out.push(ch);
                        i += 4;
                    }
                } else {
                    out.push('u');
                }
            }
            other => out.push(other as char),
        }
        i += 1;
    }

    out
}

fn from_hex(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + (b - b'a'),
        b'A'..=b'F' => 10 + (b - b'A'),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_basic_entries() {
        let text = "# comment\nproject=false\ncomponent.name = true\n";
        let parsed = parse(text);
        assert_eq!(parsed.entries.len(), 2);

        assert_eq!(parsed.entries[0].key, "project");
        assert_eq!(parsed.entries[0].value, "false");
        assert_eq!(parsed.get("component.name"), Some("true"));
        assert_eq!(parsed.get("missing"), None);
    }

    #[test]
    fn last_duplicate_wins() {
        let parsed = parse("key=first\nkey=second\n");
        assert_eq!(parsed.get("key"), Some("second"));
        assert_eq!(parsed.by_key("key").count(), 2);
    }

    #[test]
    fn supports_line_continuations_and_unicode_escapes() {
        let text = "greeting=hello\\\n  world\nunicode=\\u0041\n";
        let parsed = parse(text);
        assert_eq!(parsed.entries.len(), 2);

        assert_eq!(parsed.entries[0].key, "greeting");
        assert_eq!(parsed.entries[0].value, "helloworld");
        assert_eq!(parsed.entries[1].value, "A");
    }

    #[test]
    fn preserves_multibyte_utf8_values() {
        let parsed = parse("greeting=gr\u{00fc}\u{00df} dich\nname=caf\u{00e9}\n");
        assert_eq!(parsed.get("greeting"), Some("gr\u{00fc}\u{00df} dich"));
        assert_eq!(parsed.get("name"), Some("caf\u{00e9}"));
    }

    #[test]
    fn serialize_is_sorted_and_headed() {
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), "2".to_string());
        entries.insert("a".to_string(), "1".to_string());

        let text = serialize(&entries, "KILN-IT-LOG");
        assert_eq!(text, "# KILN-IT-LOG\na=1\nb=2\n");
    }

    #[test]
    fn serialize_escapes_separators_in_keys() {
        let mut entries = BTreeMap::new();
        entries.insert("a key=x".to_string(), "v\tw".to_string());

        let text = serialize(&entries, "h");
        assert_eq!(text, "# h\na\\ key\\=x=v\\tw\n");

        let parsed = parse(&text);
        assert_eq!(parsed.get("a key=x"), Some("v\tw"));
    }

    #[test]
    fn serialize_then_parse_preserves_boolean_records() {
        let mut entries = BTreeMap::new();
        entries.insert("project".to_string(), "false".to_string());
        entries.insert("project.build".to_string(), "true".to_string());

        let text = serialize(&entries, "instanceof results");
        let parsed = parse(&text);
        assert_eq!(parsed.get("project"), Some("false"));
        assert_eq!(parsed.get("project.build"), Some("true"));

        // Deterministic output: serializing the same map twice is identical.
        assert_eq!(text, serialize(&entries, "instanceof results"));
    }
}
