//! Parser for the plain-text symbol listings fed to the encoder. Each line
//! holds a hexadecimal address and a name separated by whitespace; the name
//! runs to the end of the line and may itself contain spaces. Blank lines and
//! lines starting with `#` are skipped.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Error as IoError;
use std::path::Path;

use crate::symbol::Symbol;

#[derive(Debug)]
pub enum RawSymbolError {
    FailedToRead(IoError),
    InvalidAddress { line: usize, token: String },
    MissingName { line: usize },
}

impl From<IoError> for RawSymbolError {
    fn from(value: IoError) -> Self {
        RawSymbolError::FailedToRead(value)
    }
}

impl fmt::Display for RawSymbolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RawSymbolError::FailedToRead(err) => {
                write!(f, "unable to read symbol file: {}", err)
            },
            RawSymbolError::InvalidAddress { line, token } => {
                write!(f, "line {}: invalid address \"{}\"", line, token)
            },
            RawSymbolError::MissingName { line } => {
                write!(f, "line {}: expected a name after the address", line)
            },
        }
    }
}

impl Error for RawSymbolError {}

pub fn parse_raw_symbols(text: &str) -> Result<Vec<Symbol>, RawSymbolError> {
    let mut symbols = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_number = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (address, name) = line.split_once(char::is_whitespace)
            .ok_or(RawSymbolError::MissingName { line: line_number })?;
        let digits = address.strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .unwrap_or(address);
        let value = u64::from_str_radix(digits, 16)
            .map_err(|_| RawSymbolError::InvalidAddress { line: line_number, token: address.to_string() })?;

        let name = name.trim_start();
        if name.is_empty() {
            return Err(RawSymbolError::MissingName { line: line_number });
        }

        symbols.push(Symbol::function(name, value));
    }
    Ok(symbols)
}

pub fn load_raw_symbols(path: impl AsRef<Path>) -> Result<Vec<Symbol>, RawSymbolError> {
    let text = fs::read_to_string(path)?;
    parse_raw_symbols(&text)
}
