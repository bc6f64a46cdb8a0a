//! Recursive-descent parser from tokens to [`Expr`].

use ghpc_common::error::{BlueprintError, Result};

use super::ast::{BinaryOp, Expr, ObjectKey, Step, TemplatePart, Traversal, UnaryOp};
use super::lexer::Token;

/// Cursor into a token stream for recursive-descent parsing.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    const fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            Some(other) => Err(parse_err(format!("expected \"{expected}\", got \"{other}\""))),
            None => Err(parse_err(format!("expected \"{expected}\", got end of expression"))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s.clone()),
            Some(other) => Err(parse_err(format!("expected identifier, got \"{other}\""))),
            None => Err(parse_err("expected identifier, got end of expression")),
        }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

fn parse_err(message: impl Into<String>) -> BlueprintError {
    BlueprintError::expression(message)
}

/// Parses a complete token stream into one expression.
///
/// # Errors
///
/// Returns an error on syntax errors or trailing tokens.
pub fn parse_tokens(tokens: &[Token]) -> Result<Expr> {
    let mut cursor = TokenCursor::new(tokens);
    if cursor.at_end() {
        return Err(parse_err("empty expression"));
    }
    let expr = parse_expr(&mut cursor)?;
    if let Some(extra) = cursor.peek() {
        return Err(parse_err(format!("unexpected \"{extra}\" after expression")));
    }
    Ok(expr)
}

fn parse_expr(cursor: &mut TokenCursor<'_>) -> Result<Expr> {
    let cond = parse_binary(cursor, 1)?;
    if !cursor.eat(&Token::Question) {
        return Ok(cond);
    }
    let then = parse_expr(cursor)?;
    cursor.expect_token(&Token::Colon)?;
    let otherwise = parse_expr(cursor)?;
    Ok(Expr::Conditional {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    })
}

const fn binary_op(tok: &Token) -> Option<BinaryOp> {
    Some(match tok {
        Token::Or => BinaryOp::Or,
        Token::And => BinaryOp::And,
        Token::Equal => BinaryOp::Equal,
        Token::NotEqual => BinaryOp::NotEqual,
        Token::Less => BinaryOp::Less,
        Token::LessEqual => BinaryOp::LessEqual,
        Token::Greater => BinaryOp::Greater,
        Token::GreaterEqual => BinaryOp::GreaterEqual,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Mod,
        _ => return None,
    })
}

/// Precedence climbing over left-associative binary operators.
fn parse_binary(cursor: &mut TokenCursor<'_>, min_prec: u8) -> Result<Expr> {
    let mut lhs = parse_unary(cursor)?;
    while let Some(op) = cursor.peek().and_then(binary_op) {
        if op.precedence() < min_prec {
            break;
        }
        let _ = cursor.advance();
        let rhs = parse_binary(cursor, op.precedence() + 1)?;
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_unary(cursor: &mut TokenCursor<'_>) -> Result<Expr> {
    let op = match cursor.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Bang) => UnaryOp::Not,
        _ => return parse_postfix(cursor),
    };
    let _ = cursor.advance();
    let operand = parse_unary(cursor)?;
    Ok(Expr::Unary {
        op,
        operand: Box::new(operand),
    })
}

fn parse_steps(cursor: &mut TokenCursor<'_>) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    loop {
        if cursor.eat(&Token::Dot) {
            match cursor.advance() {
                Some(Token::Ident(name)) => steps.push(Step::Attr(name.clone())),
                Some(Token::Number(n)) => {
                    steps.push(Step::Index(Box::new(Expr::Number(*n))));
                }
                Some(other) => {
                    return Err(parse_err(format!(
                        "expected attribute name after \".\", got \"{other}\""
                    )));
                }
                None => return Err(parse_err("expected attribute name after \".\"")),
            }
        } else if cursor.eat(&Token::OBrack) {
            let index = parse_expr(cursor)?;
            cursor.expect_token(&Token::CBrack)?;
            steps.push(Step::Index(Box::new(index)));
        } else {
            return Ok(steps);
        }
    }
}

fn parse_postfix(cursor: &mut TokenCursor<'_>) -> Result<Expr> {
    if let (Some(Token::Ident(name)), next) = (cursor.peek(), cursor.peek_at(1)) {
        if !matches!(name.as_str(), "true" | "false" | "null") && next != Some(&Token::OParen) {
            let root = name.clone();
            let _ = cursor.advance();
            let steps = parse_steps(cursor)?;
            return Ok(Expr::Traversal(Traversal { root, steps }));
        }
    }
    let source = parse_primary(cursor)?;
    let steps = parse_steps(cursor)?;
    if steps.is_empty() {
        Ok(source)
    } else {
        Ok(Expr::Relative {
            source: Box::new(source),
            steps,
        })
    }
}

fn parse_primary(cursor: &mut TokenCursor<'_>) -> Result<Expr> {
    match cursor.advance() {
        Some(Token::Number(n)) => Ok(Expr::Number(*n)),
        Some(Token::Ident(name)) => match name.as_str() {
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            "null" => Ok(Expr::Null),
            _ => {
                cursor.expect_token(&Token::OParen)?;
                let args = parse_items(cursor, &Token::CParen)?;
                Ok(Expr::Call {
                    name: name.clone(),
                    args,
                })
            }
        },
        Some(Token::OQuote) => parse_template(cursor),
        Some(Token::OParen) => {
            let inner = parse_expr(cursor)?;
            cursor.expect_token(&Token::CParen)?;
            Ok(Expr::Parens(Box::new(inner)))
        }
        Some(Token::OBrack) => Ok(Expr::Tuple(parse_items(cursor, &Token::CBrack)?)),
        Some(Token::OBrace) => parse_object(cursor),
        Some(other) => Err(parse_err(format!("unexpected \"{other}\""))),
        None => Err(parse_err("unexpected end of expression")),
    }
}

/// Parses comma-separated expressions up to `close`, allowing a trailing comma.
fn parse_items(cursor: &mut TokenCursor<'_>, close: &Token) -> Result<Vec<Expr>> {
    let mut items = Vec::new();
    loop {
        if cursor.eat(close) {
            return Ok(items);
        }
        items.push(parse_expr(cursor)?);
        if !cursor.eat(&Token::Comma) {
            cursor.expect_token(close)?;
            return Ok(items);
        }
    }
}

fn parse_template(cursor: &mut TokenCursor<'_>) -> Result<Expr> {
    let mut parts = Vec::new();
    loop {
        match cursor.advance() {
            Some(Token::CQuote) => return Ok(Expr::Template(parts)),
            Some(Token::QuotedLit(text)) => parts.push(TemplatePart::Literal(text.clone())),
            Some(Token::TemplateInterp) => {
                let inner = parse_expr(cursor)?;
                cursor.expect_token(&Token::TemplateSeqEnd)?;
                parts.push(TemplatePart::Interp(inner));
            }
            Some(other) => {
                return Err(parse_err(format!("unexpected \"{other}\" in template")));
            }
            None => return Err(parse_err("unterminated template")),
        }
    }
}

fn parse_object(cursor: &mut TokenCursor<'_>) -> Result<Expr> {
    let mut items = Vec::new();
    loop {
        if cursor.eat(&Token::CBrace) {
            return Ok(Expr::Object(items));
        }
        let key = match (cursor.peek(), cursor.peek_at(1)) {
            (Some(Token::Ident(_)), Some(Token::Assign | Token::Colon)) => {
                ObjectKey::Ident(cursor.expect_identifier()?)
            }
            _ => ObjectKey::Expr(parse_expr(cursor)?),
        };
        if !cursor.eat(&Token::Assign) {
            cursor.expect_token(&Token::Colon)?;
        }
        let value = parse_expr(cursor)?;
        items.push((key, value));
        if !cursor.eat(&Token::Comma) {
            cursor.expect_token(&Token::CBrace)?;
            return Ok(Expr::Object(items));
        }
    }
}
