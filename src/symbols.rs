//! The delimiter table shared by the tokenizer, expressions, and places.
//!
//! An expression is written `[path|filter:param|filter]` inside the text,
//! attribute values, or tag names of a document. The characters below are
//! the whole grammar; everything else is ordinary text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Opens an expression
pub const OPEN: char = '[';

/// Closes an expression
pub const CLOSE: char = ']';

/// Separates path segments
pub const PATH: char = '.';

/// Appends a filter to the pipeline
pub const APPEND: char = '|';

/// Separates filter parameters
pub const PARAM: char = ':';

/// Marks a path as optional
pub const OPT: char = '?';

/// Valid raw path segment, before percent-decoding. A segment holding any
/// other character means the bracketed text was never an expression at all
/// and must stay verbatim.
pub static SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w$%\-]*$").unwrap());

/// Valid filter name
pub static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

/// Compact range syntax: an optional count (`3` or `*`) followed by an
/// optional sibling selector (`div` or `*`).
pub static RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+|\*)?([A-Za-z][-\w]*|\*)?$").unwrap());

/// Percent-decode a path segment or parameter. A malformed escape is
/// tolerated: the raw characters are kept as-is.
pub fn decode(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '%' && i + 2 < chars.len() {
            let hex: String = chars[i + 1..=i + 2].iter().collect();
            if let Ok(code) = u8::from_str_radix(&hex, 16) {
                out.push(code as char);
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Percent-encode the delimiter characters so a decoded parameter can be
/// written back into expression syntax unambiguously.
pub fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            OPEN | CLOSE | APPEND | PARAM | '%' => {
                out.push('%');
                out.push_str(&format!("{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

#[test]
fn test_decode() {
    assert_eq!(decode("hello"), "hello");
    assert_eq!(decode("a%20b"), "a b");
    assert_eq!(decode("a%7cb"), "a|b");
    // malformed escapes stay verbatim
    assert_eq!(decode("50%"), "50%");
    assert_eq!(decode("%zz"), "%zz");
}

#[test]
fn test_encode_round_trip() {
    let raw = "a|b:c[d]e%f";
    assert_eq!(decode(&encode(raw)), raw);
}
