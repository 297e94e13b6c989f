//! Lexer for the Cell language
//!
//! Produces a flat token stream with source positions. Operators use longest
//! match (`<<=` before `<<` before `<`), keywords are carved out of the
//! identifier rule, and the three real-literal forms take precedence over
//! integers by maximal munch. Whitespace, `//` line comments and `/* */`
//! block comments (non-nesting) are skipped between tokens.

use crate::diag::{CellError, SourcePos};

/// Keywords of the language; excluded from the identifier rule.
pub const KEYWORDS: &[&str] = &[
    "else", "false", "global", "if", "int", "quit", "real", "true", "vec", "while",
];

const THREE_CHAR_OPERATORS: &[&str] = &["<<=", ">>="];

const TWO_CHAR_OPERATORS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "^=", "&=", "|=", "<<", ">>", "==", "!=", "<=", ">=", "&&",
    "||", "++", "--",
];

const ONE_CHAR_OPERATORS: &str = ";,:=().&!~-+*/%<>^|?{}[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// `#`-prefixed identifier; the text keeps the prefix.
    SystemIdentifier,
    IntegerHex,
    IntegerOct,
    IntegerDec,
    Real,
    Keyword,
    Operator,
}

/// A token with its verbatim source text and starting position.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: SourcePos,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, pos: SourcePos) -> Self {
        Token { kind, text: text.into(), pos }
    }

    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

struct Scanner<'s> {
    src: &'s [u8],
    pos: usize,
    line: u32,
    column: u32,
    file: String,
}

impl<'s> Scanner<'s> {
    fn new(source: &'s str, file: &str) -> Self {
        Scanner { src: source.as_bytes(), pos: 0, line: 1, column: 1, file: file.to_string() }
    }

    fn here(&self) -> SourcePos {
        SourcePos::new(self.file.clone(), self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_trivia(&mut self) -> Result<(), CellError> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let open = self.here();
                    self.bump_n(2);
                    loop {
                        if self.starts_with("*/") {
                            self.bump_n(2);
                            break;
                        }
                        if self.bump().is_none() {
                            return Err(CellError::at(&open, "unterminated comment"));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn is_ident_start(c: u8) -> bool {
        c.is_ascii_alphabetic() || c == b'_'
    }

    fn is_ident_continue(c: u8) -> bool {
        c.is_ascii_alphanumeric() || c == b'_'
    }

    fn scan_identifier_text(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if Scanner::is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    /// True when an exponent (`[eE][+-]?[0-9]+`) starts at the cursor.
    fn at_exponent(&self) -> bool {
        if !matches!(self.peek(), Some(b'e') | Some(b'E')) {
            return false;
        }
        let mut offset = 1;
        if matches!(self.peek_at(offset), Some(b'+') | Some(b'-')) {
            offset += 1;
        }
        self.peek_at(offset).is_some_and(|c| c.is_ascii_digit())
    }

    fn scan_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c as char);
                self.bump();
            } else {
                break;
            }
        }
    }

    fn scan_exponent_and_suffix(&mut self, out: &mut String) {
        if self.at_exponent() {
            out.push(self.bump().unwrap() as char);
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                out.push(self.bump().unwrap() as char);
            }
            self.scan_digits(out);
        }
        if matches!(self.peek(), Some(b'f') | Some(b'F')) {
            out.push(self.bump().unwrap() as char);
        }
    }

    fn scan_number(&mut self, pos: SourcePos) -> Result<Token, CellError> {
        let mut text = String::new();

        // .123 form
        if self.peek() == Some(b'.') {
            text.push('.');
            self.bump();
            self.scan_digits(&mut text);
            self.scan_exponent_and_suffix(&mut text);
            return Ok(Token::new(TokenKind::Real, text, pos));
        }

        // 0x... hex
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            text.push(self.bump().unwrap() as char);
            text.push(self.bump().unwrap() as char);
            let mut digits = 0;
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    text.push(c as char);
                    self.bump();
                    digits += 1;
                } else {
                    break;
                }
            }
            if digits == 0 {
                return Err(CellError::at(&pos, "constant expected"));
            }
            return Ok(Token::new(TokenKind::IntegerHex, text, pos));
        }

        self.scan_digits(&mut text);

        // 123. / 123.456 forms
        if self.peek() == Some(b'.') {
            text.push('.');
            self.bump();
            self.scan_digits(&mut text);
            self.scan_exponent_and_suffix(&mut text);
            return Ok(Token::new(TokenKind::Real, text, pos));
        }

        // 123e4 form
        if self.at_exponent() {
            self.scan_exponent_and_suffix(&mut text);
            return Ok(Token::new(TokenKind::Real, text, pos));
        }

        // octal: leading zero and only octal digits
        let kind = if text.len() > 1
            && text.starts_with('0')
            && text[1..].bytes().all(|c| (b'0'..=b'7').contains(&c))
        {
            TokenKind::IntegerOct
        } else {
            TokenKind::IntegerDec
        };
        Ok(Token::new(kind, text, pos))
    }

    fn next_token(&mut self) -> Result<Option<Token>, CellError> {
        self.skip_trivia()?;
        let pos = self.here();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        if Scanner::is_ident_start(c) {
            let text = self.scan_identifier_text();
            let kind = if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            return Ok(Some(Token::new(kind, text, pos)));
        }

        if c == b'#' {
            self.bump();
            match self.peek() {
                Some(n) if Scanner::is_ident_start(n) => {
                    let text = format!("#{}", self.scan_identifier_text());
                    return Ok(Some(Token::new(TokenKind::SystemIdentifier, text, pos)));
                }
                _ => return Err(CellError::at(&pos, "identifier expected after '#'")),
            }
        }

        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()))
        {
            return self.scan_number(pos).map(Some);
        }

        for op in THREE_CHAR_OPERATORS {
            if self.starts_with(op) {
                self.bump_n(3);
                return Ok(Some(Token::new(TokenKind::Operator, *op, pos)));
            }
        }
        for op in TWO_CHAR_OPERATORS {
            if self.starts_with(op) {
                self.bump_n(2);
                return Ok(Some(Token::new(TokenKind::Operator, *op, pos)));
            }
        }
        if ONE_CHAR_OPERATORS.contains(c as char) {
            self.bump();
            return Ok(Some(Token::new(TokenKind::Operator, (c as char).to_string(), pos)));
        }

        Err(CellError::at(&pos, format!("unexpected character '{}'", c as char)))
    }
}

/// Tokenize a whole source file.
pub fn tokenize(source: &str, file: &str) -> Result<Vec<Token>, CellError> {
    let mut scanner = Scanner::new(source, file);
    let mut tokens = Vec::new();
    while let Some(token) = scanner.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source, "test.cell")
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_operators_longest_match() {
        let tokens = kinds("a <<= b << c < d");
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Operator)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(ops, vec!["<<=", "<<", "<"]);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = kinds("if iffy while whiled vec vector");
        assert_eq!(tokens[0], (TokenKind::Keyword, "if".to_string()));
        assert_eq!(tokens[1], (TokenKind::Identifier, "iffy".to_string()));
        assert_eq!(tokens[2], (TokenKind::Keyword, "while".to_string()));
        assert_eq!(tokens[3], (TokenKind::Identifier, "whiled".to_string()));
        assert_eq!(tokens[4], (TokenKind::Keyword, "vec".to_string()));
        assert_eq!(tokens[5], (TokenKind::Identifier, "vector".to_string()));
    }

    #[test]
    fn test_integer_literal_radixes() {
        let tokens = kinds("123 0xFF 0755 0 08");
        assert_eq!(tokens[0].0, TokenKind::IntegerDec);
        assert_eq!(tokens[1].0, TokenKind::IntegerHex);
        assert_eq!(tokens[2].0, TokenKind::IntegerOct);
        assert_eq!(tokens[3].0, TokenKind::IntegerDec);
        // '8' is not an octal digit, so the literal falls back to decimal
        assert_eq!(tokens[4].0, TokenKind::IntegerDec);
    }

    #[test]
    fn test_real_literal_forms() {
        for (source, expected) in [
            ("12e3", "12e3"),
            ("12E+3f", "12E+3f"),
            (".5", ".5"),
            (".5e-2F", ".5e-2F"),
            ("1.", "1."),
            ("1.25e2f", "1.25e2f"),
        ] {
            let tokens = kinds(source);
            assert_eq!(tokens.len(), 1, "source {:?}", source);
            assert_eq!(tokens[0], (TokenKind::Real, expected.to_string()));
        }
    }

    #[test]
    fn test_incomplete_exponent_is_not_consumed() {
        let tokens = kinds("12ex");
        assert_eq!(tokens[0], (TokenKind::IntegerDec, "12".to_string()));
        assert_eq!(tokens[1], (TokenKind::Identifier, "ex".to_string()));
    }

    #[test]
    fn test_system_identifier() {
        let tokens = kinds("#Position[i]");
        assert_eq!(tokens[0], (TokenKind::SystemIdentifier, "#Position".to_string()));
        assert_eq!(tokens[1], (TokenKind::Operator, "[".to_string()));
        assert!(tokenize("# 1", "t").is_err());
    }

    #[test]
    fn test_comments_and_positions() {
        let source = "a // line comment\n/* block\ncomment */ b";
        let tokens = tokenize(source, "t.cell").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].pos.line, 1);
        assert_eq!(tokens[1].text, "b");
        assert_eq!(tokens[1].pos.line, 3);

        assert!(tokenize("/* open", "t.cell").is_err());
    }
}
