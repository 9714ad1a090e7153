//! Tokenizer for the JavaScript-flavoured object literals the archetype data
//! is written in.
//!
//! Only enough of the language is understood to find token boundaries:
//! strings in any of the three delimiters, comments, bare words and single
//! punctuation characters. Each token is a small `nom` parser; spans are
//! recovered from how much input is left. Offsets are byte offsets into the
//! scanned text.

use std::ops::Range;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_until, take_while1},
    character::complete::{anychar, char, multispace0},
    combinator::{cut, map, recognize, value},
    multi::many0_count,
    sequence::{pair, preceded, terminated},
};

use crate::ExtractionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Punct(char),
    /// String literal, tagged with its delimiter.
    Str(char),
    /// Identifiers, numbers and keywords such as `null`.
    Word,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Range<usize>,
}

impl Token {
    pub(crate) fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.span.clone()]
    }

    /// String contents without the delimiters. Empty for non-strings.
    pub(crate) fn body<'a>(&self, src: &'a str) -> &'a str {
        match self.kind {
            TokenKind::Str(_) => &src[self.span.start + 1..self.span.end - 1],
            _ => "",
        }
    }

    pub(crate) fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub(crate) fn is_comment(&self) -> bool {
        self.kind == TokenKind::Comment
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '+' | '-')
}

// ── Token parsers ───────────────────────────────────────────────────────

/// A string in `delim`, backslash escapes included. Once the opening
/// delimiter matched, a missing close is a hard failure.
fn quoted(input: &str, delim: char) -> IResult<&str, TokenKind> {
    let stops: String = ['\\', delim].into_iter().collect();
    let body = many0_count(alt((is_not(stops.as_str()), recognize(pair(char('\\'), anychar)))));
    value(
        TokenKind::Str(delim),
        preceded(char(delim), cut(terminated(body, char(delim)))),
    )(input)
}

fn double_quoted(input: &str) -> IResult<&str, TokenKind> {
    quoted(input, '"')
}

fn single_quoted(input: &str) -> IResult<&str, TokenKind> {
    quoted(input, '\'')
}

fn backtick_quoted(input: &str) -> IResult<&str, TokenKind> {
    quoted(input, '`')
}

fn line_comment(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::Comment, pair(tag("//"), take_till(|c: char| c == '\n')))(input)
}

fn block_comment(input: &str) -> IResult<&str, TokenKind> {
    value(
        TokenKind::Comment,
        preceded(tag("/*"), cut(pair(take_until("*/"), tag("*/")))),
    )(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::Word, take_while1(is_word_char))(input)
}

fn punct(input: &str) -> IResult<&str, TokenKind> {
    map(anychar, TokenKind::Punct)(input)
}

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        double_quoted,
        single_quoted,
        backtick_quoted,
        line_comment,
        block_comment,
        word,
        punct,
    ))(input)
}

fn skip_space(input: &str) -> &str {
    multispace0::<&str, nom::error::Error<&str>>(input).map_or(input, |(rest, _)| rest)
}

pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self::at(src, 0)
    }

    /// Start scanning at byte `pos`, which must be a char boundary.
    pub(crate) fn at(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn next_token(&mut self) -> Option<Result<Token, ExtractionError>> {
        let rest = skip_space(&self.src[self.pos..]);
        if rest.is_empty() {
            self.pos = self.src.len();
            return None;
        }
        let start = self.src.len() - rest.len();
        match token(rest) {
            Ok((remaining, kind)) => {
                let end = self.src.len() - remaining.len();
                self.pos = end;
                Some(Ok(Token {
                    kind,
                    span: start..end,
                }))
            }
            Err(_) => {
                self.pos = self.src.len();
                let what = if rest.starts_with('/') { "comment" } else { "string" };
                Some(Err(ExtractionError::Unterminated {
                    what,
                    offset: start,
                }))
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token, ExtractionError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ExtractionError> {
    Scanner::new(src).collect()
}

/// Tokens of the bracketed value opened at `open`, up to and including its
/// matching close bracket.
pub(crate) fn bracketed(src: &str, open: usize) -> Result<Vec<Token>, ExtractionError> {
    let mut stack: Vec<char> = Vec::new();
    let mut tokens = Vec::new();
    for token in Scanner::at(src, open) {
        let token = token?;
        let offset = token.span.start;
        match token.kind {
            TokenKind::Punct(c @ ('[' | '{')) => stack.push(c),
            TokenKind::Punct(c @ (']' | '}')) => {
                let expected = if c == ']' { '[' } else { '{' };
                if stack.pop() != Some(expected) {
                    return Err(ExtractionError::Unbalanced { found: c, offset });
                }
            }
            _ => {}
        }
        tokens.push(token);
        if stack.is_empty() {
            return Ok(tokens);
        }
    }
    Err(ExtractionError::Unterminated {
        what: "array literal",
        offset: open,
    })
}

/// Decode the simple escapes a hand-written key might carry.
pub(crate) fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(ch);
        }
    }
    out
}
