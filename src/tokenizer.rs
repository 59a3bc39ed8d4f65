use crate::symbols::{CLOSE, OPEN};

/// One node of a scanned token tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Verbatim text between expressions
    Literal(String),
    /// A balanced `[...]` group, delimiters stripped. May contain nested
    /// groups for `[...[...]...]`.
    Expr(Vec<Token>),
}

impl Token {
    /// Reconstruct the exact source text of this token, delimiters included.
    pub fn source(&self) -> String {
        match self {
            Token::Literal(s) => s.clone(),
            Token::Expr(parts) => {
                let mut out = String::new();
                out.push(OPEN);
                for p in parts {
                    out.push_str(&p.source());
                }
                out.push(CLOSE);
                out
            }
        }
    }
}

/// Reconstruct the source text of a whole token list.
pub fn source_of(tokens: &[Token]) -> String {
    tokens.iter().map(Token::source).collect()
}

/// True when the token list holds at least one expression group. A list of
/// length <= 1 holding only a literal is not a match and callers must leave
/// the scanned string untouched.
pub fn has_expr(tokens: &[Token]) -> bool {
    tokens.iter().any(|t| matches!(t, Token::Expr(_)))
}

pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Tokenizer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Scan the whole input into a token tree.
    ///
    /// Brackets balance recursively. The format is forgiving of unbalanced
    /// delimiters in surrounding text: an `[` with no matching `]` is kept
    /// verbatim as a literal (its inner balanced groups still tokenize), and
    /// a `]` with no pending `[` is ordinary text.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut list = Vec::new();
        self.scan(&mut list, 0);
        list
    }

    /// Scans into `list` until the input ends or, at depth > 0, until the
    /// matching close bracket. Returns true when the close was found.
    fn scan(&mut self, list: &mut Vec<Token>, depth: usize) -> bool {
        let mut lit = String::new();
        while let Some(c) = self.current_char() {
            if c == OPEN {
                self.advance();
                let mut sub = Vec::new();
                let closed = self.scan(&mut sub, depth + 1);
                if closed {
                    flush(list, &mut lit);
                    list.push(Token::Expr(sub));
                } else {
                    // unmatched open: keep it verbatim and splice whatever
                    // the aborted recursion collected back into this level
                    lit.push(OPEN);
                    for tok in sub {
                        match tok {
                            Token::Literal(s) => lit.push_str(&s),
                            expr => {
                                flush(list, &mut lit);
                                list.push(expr);
                            }
                        }
                    }
                }
            } else if c == CLOSE && depth > 0 {
                self.advance();
                flush(list, &mut lit);
                return true;
            } else {
                // a close at depth 0 is ordinary text
                lit.push(c);
                self.advance();
            }
        }
        flush(list, &mut lit);
        false
    }
}

fn flush(list: &mut Vec<Token>, lit: &mut String) {
    if !lit.is_empty() {
        list.push(Token::Literal(std::mem::take(lit)));
    }
}

#[test]
fn test_plain_text_is_one_literal() {
    let tokens = Tokenizer::new("no brackets here").tokenize();
    assert_eq!(tokens, vec![Token::Literal("no brackets here".to_string())]);
    assert!(!has_expr(&tokens));
}

#[test]
fn test_expression_between_literals() {
    let tokens = Tokenizer::new("a[x.y]b").tokenize();
    assert_eq!(
        tokens,
        vec![
            Token::Literal("a".to_string()),
            Token::Expr(vec![Token::Literal("x.y".to_string())]),
            Token::Literal("b".to_string()),
        ]
    );
}

#[test]
fn test_unbalanced_brackets_stay_verbatim() {
    let tokens = Tokenizer::new("a[b").tokenize();
    assert_eq!(tokens, vec![Token::Literal("a[b".to_string())]);

    let tokens = Tokenizer::new("a]b").tokenize();
    assert_eq!(tokens, vec![Token::Literal("a]b".to_string())]);

    assert_eq!(source_of(&Tokenizer::new("a[b[c]d").tokenize()), "a[b[c]d");
}
