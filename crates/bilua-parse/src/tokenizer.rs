use std::error::Error;
use std::fmt::{self, Display};

use bilua_common::{Location, Range};

const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

const fn build_name_start() -> [bool; 256] {
    let mut tbl = [false; 256];
    let mut c = b'a';
    while c <= b'z' {
        tbl[c as usize] = true;
        c += 1;
    }
    let mut c = b'A';
    while c <= b'Z' {
        tbl[c as usize] = true;
        c += 1;
    }
    tbl[b'_' as usize] = true;
    tbl
}
static NAME_START_TABLE: [bool; 256] = build_name_start();

#[inline(always)]
fn is_name_start(c: u8) -> bool {
    NAME_START_TABLE[c as usize]
}

#[inline(always)]
fn is_name_continue(c: u8) -> bool {
    is_name_start(c) || c.is_ascii_digit()
}

/// A custom error type for the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError at byte {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Name,
    Keyword,
    Number,
    Str,
    Op,
    Eof,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Decoded literal payload, carried alongside the raw token text.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenPayload {
    None,
    Int(i64),
    Float(f64),
    /// Decoded string contents; 8-bit clean (escapes may produce any byte).
    Bytes(Vec<u8>),
}

/// A token of Lua source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub payload: TokenPayload,
    pub range: Range,
}

impl Token {
    fn from_slice(source: &str, token_type: TokenType, range: Range) -> Self {
        Token {
            value: source[range.start.byte..range.end.byte].to_string(),
            token_type,
            payload: TokenPayload::None,
            range,
        }
    }

    pub fn is_op(&self, op: &str) -> bool {
        self.token_type == TokenType::Op && self.value == op
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        self.token_type == TokenType::Keyword && self.value == kw
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {:?} at {}>", self.token_type, self.value, self.range)
    }
}

/// Eager tokenizer over a whole source string.
///
/// Comments are skipped; every produced token carries its byte span plus
/// line/column so the parser can stamp ranges onto AST nodes. The final
/// token is always `Eof`.
pub struct Tokenizer<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    column: u32,
    pub items: Vec<Token>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 0,
            column: 0,
            items: Vec::new(),
        };
        tokenizer.run()?;
        Ok(tokenizer)
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column, self.pos)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Advance one byte, keeping line/column in sync.
    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn error<S: Into<String>>(&self, message: S) -> TokenizerError {
        TokenizerError {
            message: message.into(),
            pos: self.pos,
        }
    }

    fn run(&mut self) -> Result<(), TokenizerError> {
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else { break };

            if is_name_start(c) {
                self.scan_name();
            } else if c.is_ascii_digit()
                || (c == b'.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            {
                self.scan_number()?;
            } else if c == b'"' || c == b'\'' {
                self.scan_short_string(c)?;
            } else if c == b'[' && matches!(self.peek_at(1), Some(b'[') | Some(b'=')) {
                if self.long_bracket_level().is_some() {
                    self.scan_long_string()?;
                } else {
                    self.scan_operator()?;
                }
            } else {
                self.scan_operator()?;
            }
        }

        let here = self.location();
        self.items.push(Token {
            value: String::new(),
            token_type: TokenType::Eof,
            payload: TokenPayload::None,
            range: Range::new(here, here),
        });
        Ok(())
    }

    fn skip_trivia(&mut self) -> Result<(), TokenizerError> {
        loop {
            match self.peek() {
                Some(c) if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' => self.bump(),
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    self.bump_n(2);
                    if self.peek() == Some(b'[') && self.long_bracket_level().is_some() {
                        // long comment: reuse the long-string scanner, drop the token
                        self.scan_long_string()?;
                        self.items.pop();
                    } else {
                        while let Some(c) = self.peek() {
                            if c == b'\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_name(&mut self) {
        let start = self.location();
        while let Some(c) = self.peek() {
            if !is_name_continue(c) {
                break;
            }
            self.bump();
        }
        let range = Range::new(start, self.location());
        let text = &self.source[range.start.byte..range.end.byte];
        let token_type = if KEYWORDS.contains(&text) {
            TokenType::Keyword
        } else {
            TokenType::Name
        };
        self.items.push(Token::from_slice(self.source, token_type, range));
    }

    fn scan_number(&mut self) -> Result<(), TokenizerError> {
        let start = self.location();

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.bump_n(2);
            let digits_start = self.pos;
            while let Some(c) = self.peek() {
                if !c.is_ascii_hexdigit() {
                    break;
                }
                self.bump();
            }
            if self.pos == digits_start {
                return Err(self.error("malformed hexadecimal numeral"));
            }
            let digits = &self.source[digits_start..self.pos];
            // Lua wraps hex literals that exceed 64 bits
            let mut acc: u64 = 0;
            for d in digits.bytes() {
                acc = acc
                    .wrapping_mul(16)
                    .wrapping_add((d as char).to_digit(16).unwrap() as u64);
            }
            let range = Range::new(start, self.location());
            let mut token = Token::from_slice(self.source, TokenType::Number, range);
            token.payload = TokenPayload::Int(acc as i64);
            self.items.push(token);
            return Ok(());
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == b'.' && !is_float {
                is_float = true;
                self.bump();
            } else if (c == b'e' || c == b'E')
                && self
                    .peek_at(1)
                    .is_some_and(|d| d.is_ascii_digit() || d == b'+' || d == b'-')
            {
                is_float = true;
                self.bump_n(2);
                while let Some(d) = self.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    self.bump();
                }
                break;
            } else {
                break;
            }
        }

        let range = Range::new(start, self.location());
        let text = &self.source[range.start.byte..range.end.byte];
        let mut token = Token::from_slice(self.source, TokenType::Number, range);
        token.payload = if is_float {
            match text.parse::<f64>() {
                Ok(f) => TokenPayload::Float(f),
                Err(_) => return Err(self.error(format!("malformed number '{text}'"))),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => TokenPayload::Int(i),
                // an over-long integer literal becomes a float, like Lua
                Err(_) => match text.parse::<f64>() {
                    Ok(f) => TokenPayload::Float(f),
                    Err(_) => return Err(self.error(format!("malformed number '{text}'"))),
                },
            }
        };
        self.items.push(token);
        Ok(())
    }

    fn scan_short_string(&mut self, quote: u8) -> Result<(), TokenizerError> {
        let start = self.location();
        self.bump(); // opening quote
        let mut decoded: Vec<u8> = Vec::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            match c {
                b'\n' => return Err(self.error("unterminated string")),
                c if c == quote => {
                    self.bump();
                    break;
                }
                b'\\' => {
                    self.bump();
                    let Some(esc) = self.peek() else {
                        return Err(self.error("unterminated string"));
                    };
                    match esc {
                        b'n' => {
                            decoded.push(b'\n');
                            self.bump();
                        }
                        b't' => {
                            decoded.push(b'\t');
                            self.bump();
                        }
                        b'r' => {
                            decoded.push(b'\r');
                            self.bump();
                        }
                        b'a' => {
                            decoded.push(0x07);
                            self.bump();
                        }
                        b'b' => {
                            decoded.push(0x08);
                            self.bump();
                        }
                        b'f' => {
                            decoded.push(0x0c);
                            self.bump();
                        }
                        b'v' => {
                            decoded.push(0x0b);
                            self.bump();
                        }
                        b'\\' | b'"' | b'\'' => {
                            decoded.push(esc);
                            self.bump();
                        }
                        b'\n' => {
                            decoded.push(b'\n');
                            self.bump();
                        }
                        b'x' => {
                            self.bump();
                            let hi = self.hex_digit()?;
                            let lo = self.hex_digit()?;
                            decoded.push((hi << 4) | lo);
                        }
                        b'z' => {
                            self.bump();
                            while let Some(w) = self.peek() {
                                if !w.is_ascii_whitespace() {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        d if d.is_ascii_digit() => {
                            let mut value: u32 = 0;
                            let mut count = 0;
                            while count < 3 {
                                match self.peek() {
                                    Some(d) if d.is_ascii_digit() => {
                                        value = value * 10 + (d - b'0') as u32;
                                        self.bump();
                                        count += 1;
                                    }
                                    _ => break,
                                }
                            }
                            if value > 255 {
                                return Err(self.error("decimal escape too large"));
                            }
                            decoded.push(value as u8);
                        }
                        other => {
                            return Err(
                                self.error(format!("invalid escape sequence '\\{}'", other as char))
                            );
                        }
                    }
                }
                _ => {
                    decoded.push(c);
                    self.bump();
                }
            }
        }

        let range = Range::new(start, self.location());
        let mut token = Token::from_slice(self.source, TokenType::Str, range);
        token.payload = TokenPayload::Bytes(decoded);
        self.items.push(token);
        Ok(())
    }

    fn hex_digit(&mut self) -> Result<u8, TokenizerError> {
        match self.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                self.bump();
                Ok((c as char).to_digit(16).unwrap() as u8)
            }
            _ => Err(self.error("hexadecimal digit expected")),
        }
    }

    /// `[`, `[=`, `[==`… followed by `[` opens a long bracket; returns the
    /// `=` count, or None when the bytes at `pos` are not an opener.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_at(1 + level) == Some(b'=') {
            level += 1;
        }
        (self.peek_at(1 + level) == Some(b'[')).then_some(level)
    }

    fn scan_long_string(&mut self) -> Result<(), TokenizerError> {
        let start = self.location();
        let level = self.long_bracket_level().expect("caller checked opener");
        self.bump_n(2 + level);

        // a newline immediately after the opening bracket is dropped
        if self.peek() == Some(b'\n') {
            self.bump();
        }

        let content_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated long string")),
                Some(b']') => {
                    let mut eqs = 0;
                    while self.peek_at(1 + eqs) == Some(b'=') {
                        eqs += 1;
                    }
                    if eqs == level && self.peek_at(1 + eqs) == Some(b']') {
                        let decoded = self.bytes[content_start..self.pos].to_vec();
                        self.bump_n(2 + level);
                        let range = Range::new(start, self.location());
                        let mut token = Token::from_slice(self.source, TokenType::Str, range);
                        token.payload = TokenPayload::Bytes(decoded);
                        self.items.push(token);
                        return Ok(());
                    }
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn scan_operator(&mut self) -> Result<(), TokenizerError> {
        let start = self.location();
        let rest = &self.bytes[self.pos..];

        // longest match first
        let len = if rest.starts_with(b"...") {
            3
        } else if rest.starts_with(b"==")
            || rest.starts_with(b"~=")
            || rest.starts_with(b"<=")
            || rest.starts_with(b">=")
            || rest.starts_with(b"<<")
            || rest.starts_with(b">>")
            || rest.starts_with(b"//")
            || rest.starts_with(b"::")
            || rest.starts_with(b"..")
        {
            2
        } else if matches!(
            rest.first(),
            Some(
                b'+' | b'-'
                    | b'*'
                    | b'/'
                    | b'%'
                    | b'^'
                    | b'#'
                    | b'&'
                    | b'~'
                    | b'|'
                    | b'<'
                    | b'>'
                    | b'='
                    | b'('
                    | b')'
                    | b'{'
                    | b'}'
                    | b'['
                    | b']'
                    | b';'
                    | b':'
                    | b','
                    | b'.'
            )
        ) {
            1
        } else {
            return Err(self.error(format!(
                "unexpected character '{}'",
                rest.first().map(|&c| c as char).unwrap_or('?')
            )));
        };

        self.bump_n(len);
        let range = Range::new(start, self.location());
        self.items.push(Token::from_slice(self.source, TokenType::Op, range));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenType, String)> {
        Tokenizer::new(source)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.value))
            .collect()
    }

    #[test]
    fn names_and_keywords_are_distinguished() {
        let tokens = kinds("local x = nil");
        assert_eq!(tokens[0], (TokenType::Keyword, "local".into()));
        assert_eq!(tokens[1], (TokenType::Name, "x".into()));
        assert_eq!(tokens[2], (TokenType::Op, "=".into()));
        assert_eq!(tokens[3], (TokenType::Keyword, "nil".into()));
        assert_eq!(tokens[4].0, TokenType::Eof);
    }

    #[test]
    fn integer_and_float_numerals() {
        let tokens = Tokenizer::new("25 3.5 1e3 0x10").unwrap().items;
        assert_eq!(tokens[0].payload, TokenPayload::Int(25));
        assert_eq!(tokens[1].payload, TokenPayload::Float(3.5));
        assert_eq!(tokens[2].payload, TokenPayload::Float(1000.0));
        assert_eq!(tokens[3].payload, TokenPayload::Int(16));
    }

    #[test]
    fn string_escapes_decode_to_bytes() {
        let tokens = Tokenizer::new(r#""a\tb\x41\65""#).unwrap().items;
        assert_eq!(tokens[0].payload, TokenPayload::Bytes(b"a\tbAA".to_vec()));
    }

    #[test]
    fn long_strings_and_comments() {
        let tokens = kinds("--[[ skipped ]] x --[==[ also\nskipped ]==] y -- eol\nz");
        let names: Vec<_> = tokens
            .iter()
            .filter(|(t, _)| *t == TokenType::Name)
            .map(|(_, v)| v.clone())
            .collect();
        assert_eq!(names, vec!["x", "y", "z"]);

        let tokens = Tokenizer::new("[[line]]").unwrap().items;
        assert_eq!(tokens[0].payload, TokenPayload::Bytes(b"line".to_vec()));
    }

    #[test]
    fn multibyte_operators_take_longest_match() {
        let tokens = kinds("a ... .. == ~= // << >> ::");
        let ops: Vec<_> = tokens
            .iter()
            .filter(|(t, _)| *t == TokenType::Op)
            .map(|(_, v)| v.clone())
            .collect();
        assert_eq!(ops, vec!["...", "..", "==", "~=", "//", "<<", ">>", "::"]);
    }

    #[test]
    fn spans_track_lines_and_columns() {
        let tokens = Tokenizer::new("x\n  yy").unwrap().items;
        assert_eq!(tokens[0].range.start.line, 0);
        assert_eq!(tokens[1].range.start.line, 1);
        assert_eq!(tokens[1].range.start.column, 2);
        assert_eq!(tokens[1].range.start.byte, 4);
        assert_eq!(tokens[1].range.end.byte, 6);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Tokenizer::new("\"abc").is_err());
        assert!(Tokenizer::new("\"abc\ndef\"").is_err());
    }
}
