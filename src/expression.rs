use crate::symbols::{self, APPEND, OPT, PARAM, PATH, SEGMENT};

/// One filter invocation in an expression pipeline: a name plus the raw,
/// percent-decoded parameter strings it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub params: Vec<String>,
}

/// A parsed `[path|filter:param|filter]` expression.
///
/// An expression is stateful: `cursor` advances monotonically while the
/// pipeline runs, and `last`/`cancel` record what resolution and the
/// filters decided. That makes a value single-use; whenever a filter needs
/// to re-run or fork evaluation it must work on a clone with the cursor
/// reset (see [`Expression::fork`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Raw content between the brackets, as written
    pub initial: String,

    /// Decoded path segments; empty means "the whole current value"
    pub path: Vec<String>,

    /// Ordered filter pipeline
    pub filters: Vec<FilterCall>,

    /// A trailing `?` on the first path segment: an unresolved path is
    /// tolerated (renders as nothing) instead of staying literal text
    pub optional: bool,

    /// Bound pre-/post-hook markers (leading `|` / trailing `||` segments)
    pub prehook: bool,
    pub posthook: bool,

    /// Next filter to run; consumed monotonically
    pub cursor: usize,

    /// True once the path resolved through every segment
    pub last: bool,

    /// Segments left over when resolution stopped at a collection; repeat
    /// rebases them onto the per-item alias
    pub rest: Vec<String>,

    /// Raised by a filter to abort this hit and discard its output
    pub cancel: bool,
}

impl Expression {
    /// Parse the content of one bracket group (delimiters already
    /// stripped). Returns None when the first segment cannot be a path,
    /// which means the bracketed text was ordinary prose and must stay
    /// verbatim in the output.
    pub fn parse(content: &str) -> Option<Expression> {
        let mut segments = content.split(APPEND);
        let path_part = segments.next().unwrap_or("");

        let mut optional = false;
        let mut path = Vec::new();
        if path_part == "?" {
            optional = true;
        } else if !path_part.is_empty() {
            for (i, raw) in path_part.split(PATH).enumerate() {
                let mut raw = raw;
                if i == 0 {
                    if let Some(stripped) = raw.strip_suffix(OPT) {
                        optional = true;
                        raw = stripped;
                    }
                }
                if !check(raw) {
                    return None;
                }
                path.push(symbols::decode(raw));
            }
        }

        let raw_filters: Vec<&str> = segments.collect();
        let mut prehook = false;
        let mut posthook = false;
        let mut filters = Vec::new();
        let count = raw_filters.len();
        for (i, seg) in raw_filters.iter().enumerate() {
            if seg.is_empty() {
                // the rebase no-op; at either end it also binds the
                // matching hook slot
                if i == 0 {
                    prehook = true;
                }
                if i == count - 1 {
                    posthook = true;
                }
                filters.push(FilterCall {
                    name: String::new(),
                    params: Vec::new(),
                });
                continue;
            }
            if seg == &"?" {
                optional = true;
                continue;
            }
            let mut parts = seg.split(PARAM);
            let name = parts.next().unwrap_or("").to_string();
            let params = parts.map(symbols::decode).collect();
            filters.push(FilterCall { name, params });
        }

        Some(Expression {
            initial: content.to_string(),
            path,
            filters,
            optional,
            prehook,
            posthook,
            cursor: 0,
            last: false,
            rest: Vec::new(),
            cancel: false,
        })
    }

    /// Placeholder expression for a context that has not reached its
    /// first hit yet.
    pub fn empty() -> Expression {
        Expression {
            initial: String::new(),
            path: Vec::new(),
            filters: Vec::new(),
            optional: false,
            prehook: false,
            posthook: false,
            cursor: 0,
            last: false,
            rest: Vec::new(),
            cancel: false,
        }
    }

    /// Clone this expression with all run state reset. Cheap by design:
    /// forking is how repeat re-evaluates the pipeline once per item.
    pub fn fork(&self) -> Expression {
        Expression {
            initial: self.initial.clone(),
            path: self.path.clone(),
            filters: self.filters.clone(),
            optional: self.optional,
            prehook: self.prehook,
            posthook: self.posthook,
            cursor: 0,
            last: false,
            rest: Vec::new(),
            cancel: false,
        }
    }

    /// Rewrite this expression as source text referencing `alias` (plus
    /// whatever path segments were left over past the collection) instead
    /// of the original collection path, keeping only the filters not yet
    /// consumed. This is what repeat stamps into an extracted template so
    /// each item clone re-merges against its own scope.
    pub fn rebased_source(&self, alias: Option<&str>) -> String {
        let mut out = String::new();
        out.push(symbols::OPEN);
        let mut segments: Vec<String> = Vec::new();
        if let Some(alias) = alias {
            segments.push(symbols::encode(alias));
        }
        segments.extend(self.rest.iter().map(|s| symbols::encode(s)));
        out.push_str(&segments.join("."));
        for call in &self.filters[self.cursor.min(self.filters.len())..] {
            out.push(APPEND);
            out.push_str(&call.name);
            for p in &call.params {
                out.push(PARAM);
                out.push_str(&symbols::encode(p));
            }
        }
        out.push(symbols::CLOSE);
        out
    }
}

/// Reject a raw segment holding an unescaped delimiter or any character
/// outside the path grammar. This is what keeps arbitrary bracketed prose
/// from ever being misread as a path.
fn check(segment: &str) -> bool {
    SEGMENT.is_match(segment)
}

#[test]
fn test_parse_path_only() {
    let expr = Expression::parse("user.name").unwrap();
    assert_eq!(expr.path, vec!["user", "name"]);
    assert!(expr.filters.is_empty());
    assert!(!expr.optional);
}

#[test]
fn test_parse_rejects_prose() {
    assert!(Expression::parse("not a path").is_none());
    assert!(Expression::parse("a,b").is_none());
}

#[test]
fn test_rebased_source() {
    let mut expr = Expression::parse("list|repeat:item|case:up").unwrap();
    expr.cursor = 1; // repeat consumed
    assert_eq!(expr.rebased_source(Some("item")), "[item|case:up]");
}
