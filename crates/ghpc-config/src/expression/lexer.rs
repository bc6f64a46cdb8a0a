//! Tokenization of expression source text using `nom`.
//!
//! Quoted templates are lexed into `OQuote`, literal, interpolation and
//! `CQuote` tokens, so a token stream can be scanned and spliced without
//! re-reading the source.

use std::fmt;

use ghpc_common::error::{BlueprintError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{opt, recognize, value},
};

/// A token of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An identifier, keyword or function name.
    Ident(String),
    /// A number literal.
    Number(f64),
    /// Opening `"` of a template.
    OQuote,
    /// Literal text inside a template, escapes already resolved.
    QuotedLit(String),
    /// `${` opening an interpolation.
    TemplateInterp,
    /// `}` closing an interpolation.
    TemplateSeqEnd,
    /// Closing `"` of a template.
    CQuote,
    /// `(`
    OParen,
    /// `)`
    CParen,
    /// `[`
    OBrack,
    /// `]`
    CBrack,
    /// `{`
    OBrace,
    /// `}`
    CBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `=`
    Assign,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Bang,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ident(name) => return f.write_str(name),
            Self::Number(n) => return f.write_str(&format_number(*n)),
            Self::QuotedLit(text) => return f.write_str(&escape_template_literal(text)),
            Self::OQuote | Self::CQuote => "\"",
            Self::TemplateInterp => "${",
            Self::TemplateSeqEnd | Self::CBrace => "}",
            Self::OParen => "(",
            Self::CParen => ")",
            Self::OBrack => "[",
            Self::CBrack => "]",
            Self::OBrace => "{",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Colon => ":",
            Self::Question => "?",
            Self::Assign => "=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Bang => "!",
        };
        f.write_str(s)
    }
}

/// Renders a number the way it would be written in source.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Escapes literal template text so it lexes back to the same text.
pub(crate) fn escape_template_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}

/// Joins tokens back into source text that lexes to the same tokens.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for tok in tokens {
        if let Some(p) = prev {
            let glued = matches!(p, Token::OQuote | Token::QuotedLit(_) | Token::TemplateSeqEnd)
                || matches!(tok, Token::CQuote | Token::QuotedLit(_) | Token::TemplateInterp);
            if !glued {
                out.push(' ');
            }
        }
        out.push_str(&tok.to_string());
        prev = Some(tok);
    }
    out
}

/// Lexer state: inside code, or between the quotes of a template.
#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Code, counting unclosed `{` so the `}` ending an interpolation is recognized.
    Code { braces: usize },
    /// Template text.
    Template,
}

fn number(input: &str) -> IResult<&str, Token> {
    let (rest, text) = recognize((
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    let val: f64 = text.parse().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
    })?;
    Ok((rest, Token::Number(val)))
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn identifier(input: &str) -> IResult<&str, Token> {
    let (rest, word) = recognize((take_while1(is_ident_start), take_while(is_ident_continue)))
        .parse(input)?;
    Ok((rest, Token::Ident(word.to_owned())))
}

fn operator(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Equal, tag("==")),
        value(Token::NotEqual, tag("!=")),
        value(Token::LessEqual, tag("<=")),
        value(Token::GreaterEqual, tag(">=")),
        value(Token::And, tag("&&")),
        value(Token::Or, tag("||")),
        value(Token::Less, char('<')),
        value(Token::Greater, char('>')),
        value(Token::Bang, char('!')),
        value(Token::Assign, char('=')),
        value(Token::Plus, char('+')),
        value(Token::Minus, char('-')),
        value(Token::Star, char('*')),
        value(Token::Slash, char('/')),
        value(Token::Percent, char('%')),
    ))
    .parse(input)
}

fn punctuation(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::OParen, char('(')),
        value(Token::CParen, char(')')),
        value(Token::OBrack, char('[')),
        value(Token::CBrack, char(']')),
        value(Token::Comma, char(',')),
        value(Token::Dot, char('.')),
        value(Token::Colon, char(':')),
        value(Token::Question, char('?')),
    ))
    .parse(input)
}

/// Parses a single code token. Quotes and braces are handled by the caller.
fn single_token(input: &str) -> IResult<&str, Token> {
    alt((number, identifier, operator, punctuation)).parse(input)
}

/// Reads template text up to the closing quote or the next interpolation.
fn template_literal(input: &str) -> Result<(&str, String)> {
    let mut text = String::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(idx, c)) = chars.peek() {
        match c {
            '"' => return Ok((&input[idx..], text)),
            '$' if input[idx..].starts_with("${") => return Ok((&input[idx..], text)),
            '$' if input[idx..].starts_with("$${") => {
                text.push_str("${");
                let _ = chars.nth(2);
            }
            '\\' => {
                let _ = chars.next();
                match chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, '\\')) => text.push('\\'),
                    Some((_, '"')) => text.push('"'),
                    Some((_, other)) => {
                        return Err(BlueprintError::expression(format!(
                            "invalid escape sequence \\{other} in quoted string"
                        )));
                    }
                    None => break,
                }
            }
            other => {
                text.push(other);
                let _ = chars.next();
            }
        }
    }
    Err(BlueprintError::expression("unterminated template string"))
}

fn lex_err(remaining: &str, detail: impl fmt::Display) -> BlueprintError {
    let snippet: String = remaining.chars().take(20).collect();
    BlueprintError::expression(format!("unexpected character at: \"{snippet}\" ({detail})"))
}

/// Tokenizes an expression into a vector of tokens.
///
/// # Errors
///
/// Returns an error on characters that do not start a token, unbalanced
/// interpolation braces, or unterminated strings.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut modes = vec![Mode::Code { braces: 0 }];
    let mut remaining = input;

    loop {
        let Some(&mode) = modes.last() else {
            return Err(lex_err(remaining, "unbalanced template"));
        };
        match mode {
            Mode::Template => {
                if let Some(rest) = remaining.strip_prefix('"') {
                    tokens.push(Token::CQuote);
                    let _ = modes.pop();
                    remaining = rest;
                } else if let Some(rest) = remaining.strip_prefix("${") {
                    tokens.push(Token::TemplateInterp);
                    modes.push(Mode::Code { braces: 0 });
                    remaining = rest;
                } else {
                    let (rest, text) = template_literal(remaining)?;
                    tokens.push(Token::QuotedLit(text));
                    remaining = rest;
                }
            }
            Mode::Code { braces } => {
                let (rest, _) = multispace0::<&str, nom::error::Error<&str>>(remaining)
                    .map_err(|e| lex_err(remaining, e))?;
                remaining = rest;
                if remaining.is_empty() {
                    break;
                }
                let depth = modes.len();
                if let Some(rest) = remaining.strip_prefix('"') {
                    tokens.push(Token::OQuote);
                    modes.push(Mode::Template);
                    remaining = rest;
                } else if let Some(rest) = remaining.strip_prefix('{') {
                    tokens.push(Token::OBrace);
                    modes[depth - 1] = Mode::Code { braces: braces + 1 };
                    remaining = rest;
                } else if let Some(rest) = remaining.strip_prefix('}') {
                    if braces > 0 {
                        tokens.push(Token::CBrace);
                        modes[depth - 1] = Mode::Code { braces: braces - 1 };
                    } else if depth > 1 {
                        tokens.push(Token::TemplateSeqEnd);
                        let _ = modes.pop();
                    } else {
                        return Err(lex_err(remaining, "unbalanced closing brace"));
                    }
                    remaining = rest;
                } else {
                    let (rest, token) =
                        single_token(remaining).map_err(|e| lex_err(remaining, e))?;
                    tokens.push(token);
                    remaining = rest;
                }
            }
        }
    }

    if modes.len() > 1 {
        return Err(BlueprintError::expression(
            "unterminated template string or interpolation",
        ));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_traversal() {
        let tokens = tokenize("module.net.subnet[0]").expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("module".into()),
                Token::Dot,
                Token::Ident("net".into()),
                Token::Dot,
                Token::Ident("subnet".into()),
                Token::OBrack,
                Token::Number(0.0),
                Token::CBrack,
            ]
        );
    }

    #[test]
    fn tokenize_template_with_interpolation() {
        let tokens = tokenize(r#""${var.a}_B""#).expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::OQuote,
                Token::TemplateInterp,
                Token::Ident("var".into()),
                Token::Dot,
                Token::Ident("a".into()),
                Token::TemplateSeqEnd,
                Token::QuotedLit("_B".into()),
                Token::CQuote,
            ]
        );
    }

    #[test]
    fn tokenize_object_inside_interpolation() {
        let tokens = tokenize(r#""${merge({a = 1}, var.b)}""#).expect("should tokenize");
        assert!(tokens.contains(&Token::OBrace));
        assert!(tokens.contains(&Token::CBrace));
        assert_eq!(tokens.last(), Some(&Token::CQuote));
        assert_eq!(
            tokens.iter().filter(|t| **t == Token::TemplateSeqEnd).count(),
            1
        );
    }

    #[test]
    fn tokenize_escapes() {
        let tokens = tokenize(r#""a\"b\\c$${x}""#).expect("should tokenize");
        assert_eq!(tokens[1], Token::QuotedLit("a\"b\\c${x}".into()));
    }

    #[test]
    fn tokenize_operators() {
        let tokens = tokenize("a >= 1 && !b || c != 2").expect("should tokenize");
        assert!(tokens.contains(&Token::GreaterEqual));
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::Bang));
        assert!(tokens.contains(&Token::Or));
        assert!(tokens.contains(&Token::NotEqual));
    }

    #[test]
    fn tokenize_numbers() {
        let tokens = tokenize("1.5 2e3 7").expect("should tokenize");
        assert_eq!(
            tokens,
            vec![Token::Number(1.5), Token::Number(2000.0), Token::Number(7.0)]
        );
    }

    #[test]
    fn tokenize_rejects_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(err.to_string().contains("unterminated"), "got: {err}");
    }

    #[test]
    fn tokenize_rejects_stray_characters() {
        let err = tokenize("var.a @ 1").unwrap_err();
        assert!(err.to_string().contains("unexpected character"), "got: {err}");
    }

    #[test]
    fn join_tokens_relexes_identically() {
        let src = r#"merge(var.labels, {"x" = "a${var.b}c"})"#;
        let tokens = tokenize(src).expect("should tokenize");
        let again = tokenize(&join_tokens(&tokens)).expect("should re-tokenize");
        assert_eq!(tokens, again);
    }

    #[test]
    fn escape_round_trips_dollar_brace() {
        assert_eq!(escape_template_literal("${x}"), "$${x}");
        assert_eq!(escape_template_literal("$x"), "$x");
    }
}
