use crate::{CompileError, CompileResult};
use log::debug;
#[cfg(test)]
use serde::{Deserialize, Serialize};

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    Else,
    For,
    If,
    Return,
    While,
}

impl Keyword {
    fn from_ident(name: &str) -> Option<Self> {
        match name {
            "else" => Some(Keyword::Else),
            "for" => Some(Keyword::For),
            "if" => Some(Keyword::If),
            "return" => Some(Keyword::Return),
            "while" => Some(Keyword::While),
            _ => None,
        }
    }
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Punct {
    Ampersand,
    Comma,
    Eq,
    EqEq,
    Gt,
    Gte,
    LeftBrace,
    LeftParen,
    Lt,
    Lte,
    Minus,
    Ne,
    Plus,
    RightBrace,
    RightParen,
    Semicolon,
    Slash,
    Star,
    /// Any other ASCII punctuation byte. The grammar never accepts these.
    Other(u8),
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Punct(Punct),
    Number(u64),
    Ident(String),
    Eof,
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tokenizer {
    pub source: Vec<u8>,
    pub index: usize,
    pub line: usize,
    pub line_start: usize,
}

/// Splits `src` into tokens terminated by a single `Eof`.
pub fn tokenize(src: &str) -> CompileResult<Vec<Token>> {
    Tokenizer::new(src).tokenize()
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.bytes().collect(),
            index: 0,
            line: 1,
            line_start: 0,
        }
    }

    pub fn tokenize(&mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = vec![];
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => tokens.push(self.number()),
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => tokens.push(self.ident()),
                b'\n' => self.newline(),
                b' ' | b'\t' | b'\r' | b'\x0b' | b'\x0c' => self.advance(),
                c if c.is_ascii_punctuation() => tokens.push(self.punct()),
                _ => return Err(CompileError::Lex { offset: self.index }),
            }
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            loc: self.location(self.index),
            length: 0,
        });

        convert_keywords(&mut tokens);
        debug!("tokenized {} bytes into {} tokens", self.source.len(), tokens.len());
        Ok(tokens)
    }

    fn ident(&mut self) -> Token {
        let start = self.index;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let name = String::from_utf8_lossy(&self.source[start..self.index]).to_string();
        Token {
            kind: TokenKind::Ident(name),
            loc: self.location(start),
            length: self.index - start,
        }
    }

    fn punct(&mut self) -> Token {
        let start = self.index;
        let (punct, length) = match (self.source[start], self.peek_next()) {
            (b'=', Some(b'=')) => (Punct::EqEq, 2),
            (b'!', Some(b'=')) => (Punct::Ne, 2),
            (b'<', Some(b'=')) => (Punct::Lte, 2),
            (b'>', Some(b'=')) => (Punct::Gte, 2),
            (b'&', _) => (Punct::Ampersand, 1),
            (b',', _) => (Punct::Comma, 1),
            (b'=', _) => (Punct::Eq, 1),
            (b'>', _) => (Punct::Gt, 1),
            (b'{', _) => (Punct::LeftBrace, 1),
            (b'(', _) => (Punct::LeftParen, 1),
            (b'<', _) => (Punct::Lt, 1),
            (b'-', _) => (Punct::Minus, 1),
            (b'+', _) => (Punct::Plus, 1),
            (b'}', _) => (Punct::RightBrace, 1),
            (b')', _) => (Punct::RightParen, 1),
            (b';', _) => (Punct::Semicolon, 1),
            (b'/', _) => (Punct::Slash, 1),
            (b'*', _) => (Punct::Star, 1),
            (c, _) => (Punct::Other(c), 1),
        };
        let loc = self.location(start);
        self.index += length;
        Token {
            kind: TokenKind::Punct(punct),
            loc,
            length,
        }
    }

    // Overflow wraps, matching C's unsigned long arithmetic.
    fn number(&mut self) -> Token {
        let start = self.index;
        let mut num: u64 = 0;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                num = num.wrapping_mul(10).wrapping_add((c - b'0') as u64);
                self.advance();
            } else {
                break;
            }
        }

        Token {
            kind: TokenKind::Number(num),
            loc: self.location(start),
            length: self.index - start,
        }
    }

    fn location(&self, offset: usize) -> SourceLocation {
        SourceLocation {
            offset,
            line: self.line,
            column: offset - self.line_start + 1,
        }
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.index + 1).copied()
    }

    fn newline(&mut self) {
        self.advance();
        self.line += 1;
        self.line_start = self.index;
    }
}

/// Reclassifies identifier tokens that spell a reserved word.
pub fn convert_keywords(tokens: &mut [Token]) {
    for tok in tokens.iter_mut() {
        if let TokenKind::Ident(name) = &tok.kind {
            if let Some(kw) = Keyword::from_ident(name) {
                tok.kind = TokenKind::Keyword(kw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_yaml_snapshot;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn nothing() {
        assert_yaml_snapshot!(tokenize("").unwrap(), @r###"
        ---
        - kind: Eof
          loc:
            offset: 0
            line: 1
            column: 1
          length: 0
        "###);
    }

    #[test]
    fn ten() {
        assert_yaml_snapshot!(tokenize("10").unwrap(), @r###"
        ---
        - kind:
            Number: 10
          loc:
            offset: 0
            line: 1
            column: 1
          length: 2
        - kind: Eof
          loc:
            offset: 2
            line: 1
            column: 3
          length: 0
        "###);
    }

    #[test]
    fn multiple() {
        assert_eq!(
            kinds("10 20  30"),
            vec![
                TokenKind::Number(10),
                TokenKind::Number(20),
                TokenKind::Number(30),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn two_char_operators_are_greedy() {
        assert_eq!(
            kinds("a==b!=c<=d>=e<f>g=h"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct(Punct::EqEq),
                TokenKind::Ident("b".into()),
                TokenKind::Punct(Punct::Ne),
                TokenKind::Ident("c".into()),
                TokenKind::Punct(Punct::Lte),
                TokenKind::Ident("d".into()),
                TokenKind::Punct(Punct::Gte),
                TokenKind::Ident("e".into()),
                TokenKind::Punct(Punct::Lt),
                TokenKind::Ident("f".into()),
                TokenKind::Punct(Punct::Gt),
                TokenKind::Ident("g".into()),
                TokenKind::Punct(Punct::Eq),
                TokenKind::Ident("h".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_reclassified() {
        assert_eq!(
            kinds("return if else for while returns _if"),
            vec![
                TokenKind::Keyword(Keyword::Return),
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Else),
                TokenKind::Keyword(Keyword::For),
                TokenKind::Keyword(Keyword::While),
                TokenKind::Ident("returns".into()),
                TokenKind::Ident("_if".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_take_digits_and_underscores() {
        let tokens = tokenize("foo_1 x2").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("foo_1".into()));
        assert_eq!(tokens[0].length, 5);
        assert_eq!(tokens[1].kind, TokenKind::Ident("x2".into()));
        assert_eq!(tokens[1].loc.offset, 6);
    }

    #[test]
    fn number_followed_by_letters_splits() {
        assert_eq!(
            kinds("12ab"),
            vec![
                TokenKind::Number(12),
                TokenKind::Ident("ab".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn number_overflow_wraps() {
        assert_eq!(kinds("18446744073709551616")[0], TokenKind::Number(0));
        assert_eq!(
            kinds("18446744073709551615")[0],
            TokenKind::Number(u64::MAX)
        );
    }

    #[test]
    fn unknown_punctuation_is_a_token() {
        assert_eq!(kinds("%")[0], TokenKind::Punct(Punct::Other(b'%')));
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = tokenize("{\n  x;\n}").unwrap();
        let x = &tokens[1];
        assert_eq!(x.loc, SourceLocation { offset: 4, line: 2, column: 3 });
        let close = &tokens[3];
        assert_eq!(close.loc, SourceLocation { offset: 7, line: 3, column: 1 });
    }

    #[test]
    fn rejects_non_ascii() {
        assert_eq!(tokenize("1 + é"), Err(CompileError::Lex { offset: 4 }));
    }

    #[test]
    fn rejects_control_bytes() {
        assert_eq!(tokenize("1\x01"), Err(CompileError::Lex { offset: 1 }));
    }
}
