//! Reader for Valve's KeyValues text format (`.vdf`, `.acf`).
//!
//! A document is a sequence of `"key" "value"` and `"key" { ... }` pairs.
//! Keys may be quoted or bare, `//` starts a comment that runs to the end of
//! the line, and `[$PLATFORM]` conditional tags after a value are ignored.

use std::collections::HashMap;

use thiserror::Error;

/// Blocks nested deeper than this are rejected instead of recursed into.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum VdfError {
    #[error("line {line}: block opened here is never closed")]
    UnexpectedEof { line: usize },

    #[error("line {line}: closing brace without matching block")]
    UnbalancedBrace { line: usize },

    #[error("line {line}: key {key:?} has no value")]
    MissingValue { key: String, line: usize },

    #[error("line {line}: expected a key, found a block")]
    UnexpectedBlock { line: usize },

    #[error("line {line}: unterminated quoted string")]
    UnterminatedString { line: usize },

    #[error("line {line}: blocks nested deeper than {} levels", MAX_DEPTH)]
    TooDeep { line: usize },

    #[error("invalid UTF-8 at byte {offset}")]
    Encoding { offset: usize },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum VdfValue {
    Str(String),
    Table(VdfTable),
}

impl VdfValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            Self::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&VdfTable> {
        match self {
            Self::Table(table) => Some(table),
            Self::Str(_) => None,
        }
    }
}

/// Ordered mapping. Re-inserting a key replaces its value in place, so
/// iteration order is the order in which keys first appeared.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VdfTable {
    entries: Vec<(String, VdfValue)>,
    positions: HashMap<String, usize>,
}

impl VdfTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: VdfValue) {
        let key = key.into();
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        let pos = *self.positions.get(key)?;
        Some(&self.entries[pos].1)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(VdfValue::as_str)
    }

    pub fn get_table(&self, key: &str) -> Option<&VdfTable> {
        self.get(key).and_then(VdfValue::as_table)
    }

    /// Follows nested tables; every key but the last must name a table.
    pub fn path(&self, keys: &[&str]) -> Option<&VdfValue> {
        let (last, parents) = keys.split_last()?;
        let mut table = self;
        for key in parents {
            table = table.get_table(key)?;
        }
        table.get(last)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VdfValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }
}

pub fn parse(text: &str) -> Result<VdfTable, VdfError> {
    let mut lexer = Lexer::new(text);
    parse_table(&mut lexer, None, 0)
}

/// ISO-8859-1: every byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}

pub fn decode_utf8(bytes: Vec<u8>) -> Result<String, VdfError> {
    let text = String::from_utf8(bytes).map_err(|error| VdfError::Encoding {
        offset: error.utf8_error().valid_up_to(),
    })?;
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => Ok(stripped.to_string()),
        None => Ok(text),
    }
}

fn parse_table(
    lexer: &mut Lexer,
    opened_at: Option<usize>,
    depth: usize,
) -> Result<VdfTable, VdfError> {
    let mut table = VdfTable::new();

    loop {
        let Some((token, line)) = lexer.next_token()? else {
            return match opened_at {
                Some(line) => Err(VdfError::UnexpectedEof { line }),
                None => Ok(table),
            };
        };

        let key = match token {
            Token::Str(key) => key,
            Token::Close => {
                return match opened_at {
                    Some(_) => Ok(table),
                    None => Err(VdfError::UnbalancedBrace { line }),
                };
            }
            Token::Open => return Err(VdfError::UnexpectedBlock { line }),
        };

        match lexer.next_token()? {
            Some((Token::Str(value), _)) => table.insert(key, VdfValue::Str(value)),
            Some((Token::Open, open_line)) => {
                if depth >= MAX_DEPTH {
                    return Err(VdfError::TooDeep { line: open_line });
                }
                let child = parse_table(lexer, Some(open_line), depth + 1)?;
                table.insert(key, VdfValue::Table(child));
            }
            Some((Token::Close, line)) => return Err(VdfError::MissingValue { key, line }),
            None => return Err(VdfError::MissingValue { key, line }),
        }
    }
}

#[derive(Debug)]
enum Token {
    Str(String),
    Open,
    Close,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('[') if matches!(self.peek_next(), Some('$' | '!')) => {
                    while let Some(ch) = self.bump() {
                        if ch == ']' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>, VdfError> {
        self.skip_trivia();
        let line = self.line;

        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '{' => {
                self.bump();
                Token::Open
            }
            '}' => {
                self.bump();
                Token::Close
            }
            '"' => {
                self.bump();
                Token::Str(self.quoted(line)?)
            }
            _ => Token::Str(self.bare()),
        };

        Ok(Some((token, line)))
    }

    fn quoted(&mut self, line: usize) -> Result<String, VdfError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(VdfError::UnterminatedString { line }),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return Err(VdfError::UnterminatedString { line }),
                },
                Some(ch) => out.push(ch),
            }
        }
    }

    fn bare(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '{' | '}' | '"') {
                break;
            }
            out.push(ch);
            self.bump();
        }
        out
    }
}
