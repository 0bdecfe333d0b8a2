use std::fmt;

use crate::compiler::Word;

/// A position inside a named input, printed as `path:line:column`.
#[derive(Clone, Copy, Debug)]
pub struct Loc<'a> {
    pub input_path: &'a str,
    pub line_number: usize,
    pub line_offset: usize,
}

impl<'a> fmt::Display for Loc<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.input_path, self.line_number, self.line_offset
        )
    }
}

/// Parse a machine word written either in decimal or as `0x`-prefixed hex.
pub fn parse_word(text: &str) -> Result<Word, std::num::ParseIntError> {
    let text = text.trim();
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => Word::from_str_radix(hex, 16),
        None => text.parse(),
    }
}
