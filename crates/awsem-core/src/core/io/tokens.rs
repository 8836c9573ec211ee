use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("{origin}: unexpected end of data while reading {what}")]
    UnexpectedEof { origin: String, what: String },
    #[error("{origin}: invalid value '{value}' for {what}")]
    Invalid {
        origin: String,
        what: String,
        value: String,
    },
}

/// A whitespace-separated token stream with a named origin for error messages.
///
/// Both the coefficient file and the fixed parameter tables are free-format: line breaks
/// carry no meaning, only the order of the tokens does.
#[derive(Debug, Clone)]
pub struct Tokens {
    origin: String,
    items: Vec<String>,
    cursor: usize,
}

impl Tokens {
    pub fn from_text(origin: impl Into<String>, text: &str) -> Self {
        Self {
            origin: origin.into(),
            items: text.split_whitespace().map(str::to_string).collect(),
            cursor: 0,
        }
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text(path.display().to_string(), &text))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn peek(&self) -> Option<&str> {
        self.items.get(self.cursor).map(String::as_str)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.items.len()
    }

    /// Advances past the next token, returning it if any.
    pub fn advance(&mut self) -> Option<&str> {
        let item = self.items.get(self.cursor)?;
        self.cursor += 1;
        Some(item.as_str())
    }

    pub fn next_str(&mut self, what: &str) -> Result<&str, TokenError> {
        if self.cursor >= self.items.len() {
            return Err(TokenError::UnexpectedEof {
                origin: self.origin.clone(),
                what: what.to_string(),
            });
        }
        self.cursor += 1;
        Ok(self.items[self.cursor - 1].as_str())
    }

    pub fn next_parsed<T: FromStr>(&mut self, what: &str) -> Result<T, TokenError> {
        let origin = self.origin.clone();
        let token = self.next_str(what)?;
        token.parse().map_err(|_| TokenError::Invalid {
            origin,
            what: what.to_string(),
            value: token.to_string(),
        })
    }

    #[inline]
    pub fn next_f64(&mut self, what: &str) -> Result<f64, TokenError> {
        self.next_parsed(what)
    }

    #[inline]
    pub fn next_usize(&mut self, what: &str) -> Result<usize, TokenError> {
        self.next_parsed(what)
    }

    #[inline]
    pub fn next_i64(&mut self, what: &str) -> Result<i64, TokenError> {
        self.next_parsed(what)
    }

    /// Reads a 0/1 flag; any non-zero integer counts as set.
    pub fn next_flag(&mut self, what: &str) -> Result<bool, TokenError> {
        Ok(self.next_i64(what)? != 0)
    }

    pub fn next_f64_array<const N: usize>(&mut self, what: &str) -> Result<[f64; N], TokenError> {
        let mut values = [0.0; N];
        for (k, slot) in values.iter_mut().enumerate() {
            *slot = self.next_f64(&format!("{what}[{k}]"))?;
        }
        Ok(values)
    }
}
