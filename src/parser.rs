// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::*;
use crate::*;

use anyhow::{bail, Result};

#[derive(Clone)]
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    end: u32,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            end: 0,
        })
    }

    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Number | TokenKind::Ident | TokenKind::Eof => {
                self.tok.1.text()
            }
            _ => "",
        }
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.end = self.tok.1.end;
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg))
        }
    }

    fn is_keyword(ident: &str) -> bool {
        matches!(ident, "true" | "false" | "null" | "in")
    }

    fn parse_ident(&mut self) -> Result<Span> {
        let span = self.tok.1.clone();
        if self.tok.0 != TokenKind::Ident || Self::is_keyword(span.text()) {
            bail!(span.error("expecting identifier"));
        }
        self.next_token()?;
        Ok(span)
    }

    fn read_number(span: Span, negate: bool) -> Result<Expr> {
        let text = span.text();
        let digits;
        let text = if negate {
            digits = format!("-{text}");
            digits.as_str()
        } else {
            text
        };

        let hex = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .map(|h| (false, h))
            .or_else(|| {
                text.strip_prefix("-0x")
                    .or_else(|| text.strip_prefix("-0X"))
                    .map(|h| (true, h))
            });
        if let Some((neg, h)) = hex {
            let h = if neg { format!("-{h}") } else { h.to_string() };
            return match i64::from_str_radix(&h, 16) {
                Ok(v) => Ok(Expr::Int(span, v)),
                Err(_) => bail!(span.error("integer literal out of range")),
            };
        }

        if text.contains(['.', 'e', 'E']) {
            match text.parse::<f64>() {
                Ok(v) => Ok(Expr::Float(span, v)),
                Err(_) => bail!(span.error("invalid number")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(Expr::Int(span, v)),
                Err(_) => bail!(span.error("integer literal out of range")),
            }
        }
    }

    fn unescape(span: &Span, bytes: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chars = span.text().chars().peekable();
        let push_char = |out: &mut Vec<u8>, c: char| {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        };
        while let Some(c) = chars.next() {
            if c != '\\' {
                push_char(&mut out, c);
                continue;
            }
            let Some(e) = chars.next() else {
                bail!(span.error("invalid escape sequence"));
            };
            match e {
                'n' => out.push(b'\n'),
                'r' => out.push(b'\r'),
                't' => out.push(b'\t'),
                'a' => out.push(0x07),
                'b' => out.push(0x08),
                'f' => out.push(0x0c),
                'v' => out.push(0x0b),
                '\\' | '"' | '\'' | '`' | '?' => out.push(e as u8),
                'x' | 'u' | 'U' => {
                    let n = match e {
                        'x' => 2,
                        'u' => 4,
                        _ => 8,
                    };
                    let mut code = 0u32;
                    for _ in 0..n {
                        match chars.next().and_then(|h| h.to_digit(16)) {
                            Some(d) => code = code * 16 + d,
                            None => bail!(span.error("invalid hex escape sequence")),
                        }
                    }
                    if bytes && e == 'x' {
                        out.push(code as u8);
                    } else {
                        match char::from_u32(code) {
                            Some(c) => push_char(&mut out, c),
                            None => bail!(span.error("invalid unicode escape sequence")),
                        }
                    }
                }
                '0'..='3' => {
                    let mut code = e as u32 - '0' as u32;
                    for _ in 0..2 {
                        match chars.next().and_then(|o| o.to_digit(8)) {
                            Some(d) => code = code * 8 + d,
                            None => bail!(span.error("invalid octal escape sequence")),
                        }
                    }
                    if bytes {
                        out.push(code as u8);
                    } else {
                        match char::from_u32(code) {
                            Some(c) => push_char(&mut out, c),
                            None => bail!(span.error("invalid octal escape sequence")),
                        }
                    }
                }
                _ => bail!(span.error("invalid escape sequence")),
            }
        }
        Ok(out)
    }

    fn parse_literal(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        let expr = match self.tok.0 {
            TokenKind::Number => Self::read_number(span, false)?,
            TokenKind::String => match String::from_utf8(Self::unescape(&span, false)?) {
                Ok(s) => Expr::String(span, s.into()),
                Err(_) => bail!(span.error("invalid utf-8 in string literal")),
            },
            TokenKind::RawString => {
                let s: Rc<str> = span.text().into();
                Expr::String(span, s)
            }
            TokenKind::Bytes => {
                let b = Self::unescape(&span, true)?;
                Expr::Bytes(span, b.into())
            }
            TokenKind::RawBytes => {
                let b: Rc<[u8]> = span.text().as_bytes().into();
                Expr::Bytes(span, b)
            }
            _ => bail!(span.error("expecting literal")),
        };
        self.next_token()?;
        Ok(expr)
    }

    fn parse_args(&mut self, close: &str, context: &str) -> Result<Vec<ExprRef>> {
        let mut args = vec![];
        if self.token_text() != close {
            args.push(Ref::new(self.parse_expr()?));
            while self.token_text() == "," {
                self.next_token()?;
                if self.token_text() == close {
                    break;
                }
                args.push(Ref::new(self.parse_expr()?));
            }
        }
        self.expect(close, context)?;
        Ok(args)
    }

    fn parse_map(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        self.next_token()?;
        let mut entries = vec![];
        while self.token_text() != "}" {
            let key = self.parse_expr()?;
            self.expect(":", "while parsing map entry")?;
            let value = self.parse_expr()?;
            entries.push((Ref::new(key), Ref::new(value)));
            if self.token_text() != "," {
                break;
            }
            self.next_token()?;
        }
        self.expect("}", "while parsing map")?;
        span.end = self.end;
        Ok(Expr::Map { span, entries })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Eof => bail!(span.error("unexpected end of expression")),
            TokenKind::Ident => match span.text() {
                "true" | "false" => {
                    let v = span.text() == "true";
                    self.next_token()?;
                    Ok(Expr::Bool(span, v))
                }
                "null" => {
                    self.next_token()?;
                    Ok(Expr::Null(span))
                }
                _ => {
                    let name = self.parse_ident()?;
                    if self.token_text() == "(" {
                        self.next_token()?;
                        let args = self.parse_args(")", "while parsing call expr")?;
                        span.end = self.end;
                        Ok(Expr::Call {
                            span,
                            target: None,
                            name,
                            args,
                        })
                    } else {
                        Ok(Expr::Ident(name))
                    }
                }
            },
            TokenKind::Symbol => match span.text() {
                "(" => {
                    self.next_token()?;
                    let expr = self.parse_expr()?;
                    self.expect(")", "while parsing parenthesized expression")?;
                    Ok(expr)
                }
                "[" => {
                    self.next_token()?;
                    let items = self.parse_args("]", "while parsing list")?;
                    span.end = self.end;
                    Ok(Expr::List { span, items })
                }
                "{" => self.parse_map(),
                _ => bail!(span.error("unexpected symbol")),
            },
            _ => self.parse_literal(),
        }
    }

    fn parse_member(&mut self) -> Result<Expr> {
        let start = self.tok.1.start;
        let mut expr = self.parse_primary()?;
        loop {
            let mut span = self.tok.1.clone();
            span.start = start;
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    let field = self.parse_ident()?;
                    if self.token_text() == "(" {
                        self.next_token()?;
                        let args = self.parse_args(")", "while parsing call expr")?;
                        let mut span = field.clone();
                        span.start = start;
                        span.end = self.end;
                        expr = Expr::Call {
                            span,
                            target: Some(Ref::new(expr)),
                            name: field,
                            args,
                        };
                    } else {
                        span.end = self.end;
                        expr = Expr::Select {
                            span,
                            operand: Ref::new(expr),
                            field,
                            test_only: false,
                        };
                    }
                }
                "[" => {
                    self.next_token()?;
                    let index = self.parse_expr()?;
                    self.expect("]", "while parsing index expression")?;
                    span.end = self.end;
                    expr = Expr::Index {
                        span,
                        operand: Ref::new(expr),
                        index: Ref::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        let op = match self.token_text() {
            "!" => UnaryOp::Not,
            "-" => UnaryOp::Neg,
            _ => return self.parse_member(),
        };
        self.next_token()?;

        // Fold negative numeric literals so that i64::MIN can be written.
        if op == UnaryOp::Neg && self.tok.0 == TokenKind::Number {
            let after = self.lexer.clone().next_token()?;
            if !matches!(after.1.text(), "." | "[") || after.0 != TokenKind::Symbol {
                let num = self.tok.1.clone();
                self.next_token()?;
                let mut lit_span = num.clone();
                lit_span.start = span.start;
                lit_span.col = span.col;
                return Ok(match Self::read_number(num, true)? {
                    Expr::Int(_, v) => Expr::Int(lit_span, v),
                    Expr::Float(_, v) => Expr::Float(lit_span, v),
                    e => e,
                });
            }
        }

        let expr = self.parse_unary()?;
        span.end = self.end;
        Ok(Expr::Unary {
            span,
            op,
            expr: Ref::new(expr),
        })
    }

    fn parse_multiplication(&mut self) -> Result<Expr> {
        let start = self.tok.1.start;
        let mut expr = self.parse_unary()?;

        loop {
            let mut span = self.tok.1.clone();
            span.start = start;
            let op = match self.token_text() {
                "*" => ArithOp::Mul,
                "/" => ArithOp::Div,
                "%" => ArithOp::Mod,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let right = self.parse_unary()?;
            span.end = self.end;
            expr = Expr::Arith {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(right),
            };
        }
    }

    fn parse_addition(&mut self) -> Result<Expr> {
        let start = self.tok.1.start;
        let mut expr = self.parse_multiplication()?;

        loop {
            let mut span = self.tok.1.clone();
            span.start = start;
            let op = match self.token_text() {
                "+" => ArithOp::Add,
                "-" => ArithOp::Sub,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let right = self.parse_multiplication()?;
            span.end = self.end;
            expr = Expr::Arith {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(right),
            };
        }
    }

    fn parse_relation(&mut self) -> Result<Expr> {
        let start = self.tok.1.start;
        let mut expr = self.parse_addition()?;

        loop {
            let mut span = self.tok.1.clone();
            span.start = start;
            let op = match self.token_text() {
                "<" => BoolOp::Lt,
                "<=" => BoolOp::Le,
                "==" => BoolOp::Eq,
                ">=" => BoolOp::Ge,
                ">" => BoolOp::Gt,
                "!=" => BoolOp::Ne,
                "in" => BoolOp::In,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let right = self.parse_addition()?;
            span.end = self.end;
            expr = Expr::Compare {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(right),
            };
        }
    }

    fn parse_logic(&mut self, op: LogicOp) -> Result<Expr> {
        let start = self.tok.1.start;
        let (text, mut expr) = match op {
            LogicOp::Or => ("||", self.parse_logic(LogicOp::And)?),
            LogicOp::And => ("&&", self.parse_relation()?),
        };

        while self.token_text() == text {
            let mut span = self.tok.1.clone();
            span.start = start;
            self.next_token()?;
            let right = match op {
                LogicOp::Or => self.parse_logic(LogicOp::And)?,
                LogicOp::And => self.parse_relation()?,
            };
            span.end = self.end;
            expr = Expr::Logic {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(right),
            };
        }
        Ok(expr)
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.start;
        let cond = self.parse_logic(LogicOp::Or)?;
        if self.token_text() != "?" {
            return Ok(cond);
        }
        let mut span = self.tok.1.clone();
        span.start = start;
        self.next_token()?;
        let then = self.parse_logic(LogicOp::Or)?;
        self.expect(":", "while parsing conditional expression")?;
        let otherwise = self.parse_expr()?;
        span.end = self.end;
        Ok(Expr::Cond {
            span,
            cond: Ref::new(cond),
            then: Ref::new(then),
            otherwise: Ref::new(otherwise),
        })
    }

    /// Parses a complete expression; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<ExprRef> {
        let expr = self.parse_expr()?;
        if self.tok.0 != TokenKind::Eof {
            bail!(self.tok.1.error("unexpected token after expression"));
        }
        Ok(Ref::new(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ExprRef> {
        let source = Source::from_contents("test.cel".to_string(), text.to_string())?;
        let mut parser = Parser::new(&source)?;
        parser.parse()
    }

    #[test]
    fn precedence() -> Result<()> {
        let e = parse("1 + 2 * 3 == 7 && true")?;
        let Expr::Logic { lhs, .. } = e.as_ref() else {
            panic!("expected logic expr, got {e:?}");
        };
        let Expr::Compare { lhs, op, .. } = lhs.as_ref() else {
            panic!("expected comparison, got {lhs:?}");
        };
        assert_eq!(*op, BoolOp::Eq);
        assert!(matches!(lhs.as_ref(), Expr::Arith { op: ArithOp::Add, .. }));
        Ok(())
    }

    #[test]
    fn receiver_calls_and_selects() -> Result<()> {
        let e = parse(r#"state.a.collate("b.c")"#)?;
        let Expr::Call { target, name, args, .. } = e.as_ref() else {
            panic!("expected call, got {e:?}");
        };
        assert_eq!(name.text(), "collate");
        assert_eq!(args.len(), 1);
        assert!(matches!(target.as_deref(), Some(Expr::Select { .. })));
        Ok(())
    }

    #[test]
    fn string_escapes() -> Result<()> {
        let e = parse(r#""a\.b\n\x41""#);
        assert!(e.is_err());
        let e = parse(r#""tab\there\x41é""#)?;
        assert!(matches!(e.as_ref(), Expr::String(_, s) if s.as_ref() == "tab\there\u{41}\u{e9}"));
        let e = parse(r#"r"a\.b""#)?;
        assert!(matches!(e.as_ref(), Expr::String(_, s) if s.as_ref() == r"a\.b"));
        Ok(())
    }

    #[test]
    fn negative_literals() -> Result<()> {
        let e = parse("-9223372036854775808")?;
        assert!(matches!(e.as_ref(), Expr::Int(_, i64::MIN)));
        Ok(())
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("1 2").unwrap_err().to_string();
        assert!(err.contains("unexpected token"), "{err}");
    }
}
