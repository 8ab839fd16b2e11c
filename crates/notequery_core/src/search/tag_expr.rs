//! Tag-expression lexer, parser and AST.
//!
//! # Responsibility
//! - Turn a tag expression such as `nlp AND (transformers OR NOT rnn)` into
//!   a [`TagExpr`] tree.
//! - Report malformed input with the byte offset of the offending token.
//!
//! # Invariants
//! - Precedence from highest to lowest: `NOT`, `AND`, `OR`.
//! - `AND` and `OR` are left-associative.
//! - Operator keywords are case-sensitive; tag identifiers are lowercased.
//! - Parsing is a pure function of the input string.
//!
//! Grammar:
//!
//! ```text
//! expr      := or_expr
//! or_expr   := and_expr ("OR" and_expr)*
//! and_expr  := not_expr ("AND" not_expr)*
//! not_expr  := "NOT" not_expr | atom
//! atom      := TAG_IDENT | "(" expr ")"
//! ```

use crate::model::note::is_tag_char;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Conjunction keyword.
pub const AND_KEYWORD: &str = "AND";
/// Disjunction keyword.
pub const OR_KEYWORD: &str = "OR";
/// Negation keyword.
pub const NOT_KEYWORD: &str = "NOT";

/// Maximum depth of nested `NOT` and parentheses.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parsed tag expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpr {
    Tag(String),
    Not(Box<TagExpr>),
    And(Box<TagExpr>, Box<TagExpr>),
    Or(Box<TagExpr>, Box<TagExpr>),
}

impl TagExpr {
    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }

    pub fn not(child: TagExpr) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn and(left: TagExpr, right: TagExpr) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: TagExpr, right: TagExpr) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }
}

/// Fully parenthesized rendering, re-parseable to an equal tree.
impl Display for TagExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag(name) => write!(f, "{name}"),
            Self::Not(child) => write!(f, "{NOT_KEYWORD} {child}"),
            Self::And(left, right) => write!(f, "({left} {AND_KEYWORD} {right})"),
            Self::Or(left, right) => write!(f, "({left} {OR_KEYWORD} {right})"),
        }
    }
}

/// Malformed tag expression. Every variant carries a byte offset into the
/// parsed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input has no tokens.
    EmptyExpression,
    /// Character that is neither whitespace, a parenthesis nor part of a tag.
    UnexpectedChar { ch: char, position: usize },
    /// Token that is valid on its own but not at this place.
    UnexpectedToken { token: String, position: usize },
    /// Input ended where an operand was required.
    UnexpectedEnd { position: usize },
    /// `(` without a matching `)`.
    UnclosedParen { position: usize },
    /// `)` without a matching `(`.
    UnmatchedParen { position: usize },
    /// Nesting deeper than [`MAX_NESTING_DEPTH`].
    TooDeep { position: usize },
}

impl ParseError {
    /// Byte offset of the offending input.
    pub fn position(&self) -> usize {
        match self {
            Self::EmptyExpression => 0,
            Self::UnexpectedChar { position, .. }
            | Self::UnexpectedToken { position, .. }
            | Self::UnexpectedEnd { position }
            | Self::UnclosedParen { position }
            | Self::UnmatchedParen { position }
            | Self::TooDeep { position } => *position,
        }
    }

    /// Stable machine-readable error kind for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyExpression => "empty_expression",
            Self::UnexpectedChar { .. } => "unexpected_char",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::UnexpectedEnd { .. } => "unexpected_end",
            Self::UnclosedParen { .. } => "unclosed_paren",
            Self::UnmatchedParen { .. } => "unmatched_paren",
            Self::TooDeep { .. } => "too_deep",
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyExpression => write!(f, "empty tag expression"),
            Self::UnexpectedChar { ch, position } => {
                write!(f, "unexpected character `{ch}` at position {position}")
            }
            Self::UnexpectedToken { token, position } => {
                write!(f, "unexpected token `{token}` at position {position}")
            }
            Self::UnexpectedEnd { position } => {
                write!(f, "expected a tag or `(` at position {position}")
            }
            Self::UnclosedParen { position } => {
                write!(f, "parenthesis opened at position {position} is never closed")
            }
            Self::UnmatchedParen { position } => {
                write!(f, "unmatched `)` at position {position}")
            }
            Self::TooDeep { position } => write!(
                f,
                "expression nested deeper than {MAX_NESTING_DEPTH} levels at position {position}"
            ),
        }
    }
}

impl Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Tag(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

impl Token {
    fn text(&self) -> String {
        match &self.kind {
            TokenKind::Tag(name) => name.clone(),
            TokenKind::And => AND_KEYWORD.to_string(),
            TokenKind::Or => OR_KEYWORD.to_string(),
            TokenKind::Not => NOT_KEYWORD.to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
        }
    }
}

/// Parses a tag expression.
///
/// # Errors
/// Returns [`ParseError`] for empty input, unbalanced parentheses, operators
/// in operand position, trailing tokens and characters outside the tag
/// alphabet.
pub fn parse(input: &str) -> Result<TagExpr, ParseError> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    let mut parser = Parser {
        tokens: &tokens,
        cursor: 0,
        end: input.len(),
        open_parens: Vec::new(),
    };
    let expr = parser.parse_or(0)?;

    if let Some(token) = parser.peek() {
        if token.kind == TokenKind::RParen {
            return Err(ParseError::UnmatchedParen {
                position: token.position,
            });
        }
        return Err(ParseError::UnexpectedToken {
            token: token.text(),
            position: token.position,
        });
    }

    Ok(expr)
}

fn lex(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        if ch.is_whitespace() {
            continue;
        }
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ch if is_tag_char(ch) => {
                let mut end = position + ch.len_utf8();
                while let Some(&(next_position, next)) = chars.peek() {
                    if !is_tag_char(next) {
                        break;
                    }
                    end = next_position + next.len_utf8();
                    chars.next();
                }
                match &input[position..end] {
                    AND_KEYWORD => TokenKind::And,
                    OR_KEYWORD => TokenKind::Or,
                    NOT_KEYWORD => TokenKind::Not,
                    word => TokenKind::Tag(word.to_lowercase()),
                }
            }
            other => {
                return Err(ParseError::UnexpectedChar {
                    ch: other,
                    position,
                })
            }
        };
        tokens.push(Token { kind, position });
    }

    Ok(tokens)
}

struct Parser<'t> {
    tokens: &'t [Token],
    cursor: usize,
    end: usize,
    open_parens: Vec<usize>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next_if(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|token| &token.kind == kind) {
            self.cursor += 1;
            return true;
        }
        false
    }

    fn current_position(&self) -> usize {
        self.peek().map_or(self.end, |token| token.position)
    }

    fn parse_or(&mut self, depth: usize) -> Result<TagExpr, ParseError> {
        let mut left = self.parse_and(depth)?;
        while self.next_if(&TokenKind::Or) {
            let right = self.parse_and(depth)?;
            left = TagExpr::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self, depth: usize) -> Result<TagExpr, ParseError> {
        let mut left = self.parse_not(depth)?;
        while self.next_if(&TokenKind::And) {
            let right = self.parse_not(depth)?;
            left = TagExpr::and(left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self, depth: usize) -> Result<TagExpr, ParseError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep {
                position: self.current_position(),
            });
        }
        if self.next_if(&TokenKind::Not) {
            let child = self.parse_not(depth + 1)?;
            return Ok(TagExpr::not(child));
        }
        self.parse_atom(depth)
    }

    fn parse_atom(&mut self, depth: usize) -> Result<TagExpr, ParseError> {
        let Some(token) = self.peek().cloned() else {
            return Err(ParseError::UnexpectedEnd { position: self.end });
        };
        self.cursor += 1;

        match token.kind {
            TokenKind::Tag(name) => Ok(TagExpr::Tag(name)),
            TokenKind::LParen => {
                self.open_parens.push(token.position);
                let inner = self.parse_or(depth + 1)?;
                if !self.next_if(&TokenKind::RParen) {
                    return Err(match self.peek() {
                        None => ParseError::UnclosedParen {
                            position: token.position,
                        },
                        Some(unexpected) => ParseError::UnexpectedToken {
                            token: unexpected.text(),
                            position: unexpected.position,
                        },
                    });
                }
                self.open_parens.pop();
                Ok(inner)
            }
            TokenKind::RParen if self.open_parens.is_empty() => {
                Err(ParseError::UnmatchedParen {
                    position: token.position,
                })
            }
            _ => Err(ParseError::UnexpectedToken {
                token: token.text(),
                position: token.position,
            }),
        }
    }
}
