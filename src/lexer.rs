// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::*;
use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;

use anyhow::{anyhow, bail, Result};

#[derive(Clone)]
struct SourceInternal {
    pub file: String,
    pub contents: String,
    pub lines: Vec<(u32, u32)>,
}

/// Expression text together with its line table.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceInternal>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.file.fmt(f)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        let max_size = u32::MAX as usize - 2;
        if contents.len() > max_size {
            bail!("{file} exceeds maximum allowed expression size {max_size}");
        }
        let mut lines = vec![];
        let mut prev_ch = ' ';
        let mut prev_pos = 0u32;
        let mut start = 0u32;
        for (i, ch) in contents.char_indices() {
            if ch == '\n' {
                let end = match prev_ch {
                    '\r' => prev_pos,
                    _ => i as u32,
                };
                lines.push((start, end));
                start = i as u32 + 1;
            }
            prev_ch = ch;
            prev_pos = i as u32;
        }

        if (start as usize) < contents.len() {
            lines.push((start, contents.len() as u32));
        } else if contents.is_empty() {
            lines.push((0, 0));
        } else {
            let s = (contents.len() - 1) as u32;
            lines.push((s, s));
        }
        Ok(Self {
            src: Rc::new(SourceInternal {
                file,
                contents,
                lines,
            }),
        })
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Source> {
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {}. {e}", path.as_ref().display()),
        };
        Self::from_contents(path.as_ref().to_string_lossy().to_string(), contents)
    }

    pub fn file(&self) -> &String {
        &self.src.file
    }

    pub fn contents(&self) -> &String {
        &self.src.contents
    }

    pub fn line(&self, idx: u32) -> &str {
        let idx = idx as usize;
        if idx < self.src.lines.len() {
            let (start, end) = self.src.lines[idx];
            &self.src.contents[start as usize..end as usize]
        } else {
            ""
        }
    }

    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line as usize > self.src.lines.len() {
            return format!("{}: invalid line {} specified", self.src.file, line);
        }

        let line_str = format!("{line}");
        let line_num_width = line_str.len() + 1;
        let col_spaces = (col as usize).saturating_sub(1);

        format!(
            "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
		{:<line_num_width$}| {}\n\
		{:<line_num_width$}| {:<col_spaces$}^\n\
		{}: {}",
            self.src.file,
            line,
            col,
            "",
            line,
            self.line(line - 1),
            "",
            "",
            kind,
            msg
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = match t.char_indices().nth(max) {
            Some((cut, _)) => (&t[..cut], "..."),
            None => (t.as_str(), ""),
        };

        f.write_fmt(format_args!(
            "{}:{}:{}:{}, \"{}{}\"",
            self.line, self.col, self.start, self.end, txt, trailer
        ))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    Symbol,
    String,
    RawString,
    Bytes,
    RawBytes,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn read_ident(&mut self) -> Result<Token> {
        let start = self.peek().0;
        let col = self.col;
        loop {
            let ch = self.peek().1;
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.iter.next();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        self.col += (end - start) as u32;
        Ok(Token(TokenKind::Ident, self.span(self.line, col, start, end)))
    }

    fn read_digits(&mut self) {
        while self.peek().1.is_ascii_digit() {
            self.iter.next();
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let (start, chr) = self.peek();
        let col = self.col;
        self.iter.next();

        if chr == '0' && matches!(self.peek().1, 'x' | 'X') {
            self.iter.next();
            while self.peek().1.is_ascii_hexdigit() {
                self.iter.next();
            }
        } else {
            self.read_digits();

            // . must be followed by at least 1 digit.
            if self.peek().1 == '.' && self.peekahead(1).1.is_ascii_digit() {
                self.iter.next();
                self.read_digits();
            }

            let ch = self.peek().1;
            if ch == 'e' || ch == 'E' {
                self.iter.next();
                if matches!(self.peek().1, '+' | '-') {
                    self.iter.next();
                }
                if !self.peek().1.is_ascii_digit() {
                    return Err(self.source.error(self.line, col, "invalid number"));
                }
                self.read_digits();
            }
        }

        let end = self.peek().0;
        self.col += (end - start) as u32;

        let ch = self.peek().1;
        if ch == '_' || ch.is_ascii_alphanumeric() {
            return Err(self.source.error(self.line, self.col, "invalid number"));
        }

        Ok(Token(TokenKind::Number, self.span(self.line, col, start, end)))
    }

    // Reads a quoted literal. The span covers the text between the quotes.
    // `prefix` is the number of prefix characters (r, b, br) already consumed.
    fn read_quoted(&mut self, kind: TokenKind, prefix: u32) -> Result<Token> {
        let (line, col) = (self.line, self.col - prefix);
        let (_, quote) = self.peek();
        self.iter.next();
        self.col += 1;
        let raw = matches!(kind, TokenKind::RawString | TokenKind::RawBytes);
        let (start, _) = self.peek();
        loop {
            let (_, ch) = self.peek();
            match ch {
                '\x00' | '\n' => {
                    return Err(self.source.error(line, col, &format!("unmatched {quote}")));
                }
                '\\' if !raw => {
                    self.iter.next();
                    self.iter.next();
                    self.col += 2;
                }
                c if c == quote => break,
                _ => {
                    self.iter.next();
                    self.col += 1;
                }
            }
        }
        let end = self.peek().0;
        self.iter.next();
        self.col += 1;
        Ok(Token(kind, self.span(line, col, start, end)))
    }

    fn skip_ws(&mut self) -> Result<()> {
        // A tab is considered 4 space characters.
        'outer: loop {
            match self.peek().1 {
                ' ' => self.col += 1,
                '\t' => self.col += 4,
                '\r' => {
                    if self.peekahead(1).1 != '\n' {
                        return Err(self.source.error(
                            self.line,
                            self.col,
                            "\\r must be followed by \\n",
                        ));
                    }
                }
                '\n' => {
                    self.col = 1;
                    self.line += 1;
                }
                '/' if self.peekahead(1).1 == '/' => {
                    self.iter.next();
                    loop {
                        match self.peek().1 {
                            '\n' | '\x00' => continue 'outer,
                            _ => self.iter.next(),
                        };
                    }
                }
                _ => break,
            }
            self.iter.next();
        }
        Ok(())
    }

    fn symbol(&mut self, start: usize, col: u32, len: usize) -> Result<Token> {
        for _ in 0..len {
            self.iter.next();
        }
        self.col += len as u32;
        Ok(Token(
            TokenKind::Symbol,
            self.span(self.line, col, start, start + len),
        ))
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_ws()?;

        let (start, chr) = self.peek();
        let col = self.col;
        let next = self.peekahead(1).1;

        match chr {
            // grouping characters
            '{' | '}' | '[' | ']' | '(' | ')' |
            // arith operator
            '+' | '-' | '*' | '/' | '%' |
            // separators
            ',' | '.' | ':' | '?' => self.symbol(start, col, 1),
            '<' | '>' | '!' if next == '=' => self.symbol(start, col, 2),
            '<' | '>' | '!' => self.symbol(start, col, 1),
            '=' if next == '=' => self.symbol(start, col, 2),
            '&' if next == '&' => self.symbol(start, col, 2),
            '|' if next == '|' => self.symbol(start, col, 2),
            '"' | '\'' => self.read_quoted(TokenKind::String, 0),
            '\x00' => Ok(Token(TokenKind::Eof, self.span(self.line, col, start, start))),
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_alphabetic() || chr == '_' => {
                let ident = self.read_ident()?;
                if matches!(self.peek().1, '"' | '\'') {
                    let kind = match ident.1.text().to_ascii_lowercase().as_str() {
                        "r" => Some(TokenKind::RawString),
                        "b" => Some(TokenKind::Bytes),
                        "br" | "rb" => Some(TokenKind::RawBytes),
                        _ => None,
                    };
                    if let Some(kind) = kind {
                        let prefix = ident.1.text().len() as u32;
                        return self.read_quoted(kind, prefix);
                    }
                }
                Ok(ident)
            }
            _ => Err(self.source.error(self.line, self.col, "invalid character")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Result<Vec<(TokenKind, String)>> {
        let source = Source::from_contents("test.cel".to_string(), text.to_string())?;
        let mut lexer = Lexer::new(&source);
        let mut out = vec![];
        loop {
            let tok = lexer.next_token()?;
            if tok.0 == TokenKind::Eof {
                break;
            }
            out.push((tok.0, tok.1.text().to_string()));
        }
        Ok(out)
    }

    #[test]
    fn operators_and_comments() -> Result<()> {
        let toks = tokens("a.b >= 1 // trailing\n&& !c")?;
        let texts: Vec<_> = toks.iter().map(|t| t.1.as_str()).collect();
        assert_eq!(texts, vec!["a", ".", "b", ">=", "1", "&&", "!", "c"]);
        Ok(())
    }

    #[test]
    fn prefixed_literals() -> Result<()> {
        let toks = tokens(r#"r"a\.b" b'x' "q\"s""#)?;
        assert_eq!(toks[0], (TokenKind::RawString, r"a\.b".to_string()));
        assert_eq!(toks[1], (TokenKind::Bytes, "x".to_string()));
        assert_eq!(toks[2], (TokenKind::String, r#"q\"s"#.to_string()));
        Ok(())
    }

    #[test]
    fn numbers() -> Result<()> {
        let toks = tokens("12 1.5e3 0x1F")?;
        let texts: Vec<_> = toks.iter().map(|t| t.1.as_str()).collect();
        assert_eq!(texts, vec!["12", "1.5e3", "0x1F"]);
        assert!(tokens("12abc").is_err());
        Ok(())
    }

    #[test]
    fn long_span_debug_cuts_on_char_boundary() -> Result<()> {
        let text = format!("\"{}{}\"", "a".repeat(31), "é".repeat(4));
        let source = Source::from_contents("test.cel".to_string(), text)?;
        let mut lexer = Lexer::new(&source);
        let span = lexer.next_token()?.1;
        let shown = format!("{span:?}");
        assert!(shown.ends_with(&format!("\"{}é...\"", "a".repeat(31))), "{shown}");
        Ok(())
    }

    #[test]
    fn unmatched_quote_reports_location() {
        let err = tokens("size('abc").unwrap_err().to_string();
        assert!(err.contains("test.cel:1:6"), "{err}");
        assert!(err.contains("unmatched '"), "{err}");
    }
}
