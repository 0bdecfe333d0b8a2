//! All lexical categories recognised by the lexer.

use miette::SourceSpan;

use crate::compiler::Word;
use crate::utils::loc::byte_offset_to_line_col;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub line: usize,   // 1-based
    pub column: usize, // 1-based byte column
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Int(Word),

    Var,       // VAR
    Mem,       // MEM
    MemRead,   // MEM_READ
    MemWrite,  // MEM_WRITE
    PrintChar, // PRINT_CHAR

    Comma,     // ,
    Semicolon, // ;
    LBracket,  // [
    RBracket,  // ]
    LParen,    // (
    RParen,    // )

    Assign, // =
    Plus,   // +
    Minus,  // -
    Star,   // *
    Slash,  // /

    Eof,
}

impl<'a> TokenKind<'a> {
    pub fn keyword(word: &str) -> Option<Self> {
        Some(match word {
            "VAR" => TokenKind::Var,
            "MEM" => TokenKind::Mem,
            "MEM_READ" => TokenKind::MemRead,
            "MEM_WRITE" => TokenKind::MemWrite,
            "PRINT_CHAR" => TokenKind::PrintChar,
            _ => return None,
        })
    }

    /// How the token reads in "expected ..." messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier `{name}`"),
            TokenKind::Int(value) => format!("integer `{value}`"),
            TokenKind::Var => "`VAR`".into(),
            TokenKind::Mem => "`MEM`".into(),
            TokenKind::MemRead => "`MEM_READ`".into(),
            TokenKind::MemWrite => "`MEM_WRITE`".into(),
            TokenKind::PrintChar => "`PRINT_CHAR`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::Semicolon => "`;`".into(),
            TokenKind::LBracket => "`[`".into(),
            TokenKind::RBracket => "`]`".into(),
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::Assign => "`=`".into(),
            TokenKind::Plus => "`+`".into(),
            TokenKind::Minus => "`-`".into(),
            TokenKind::Star => "`*`".into(),
            TokenKind::Slash => "`/`".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

impl<'a> Token<'a> {
    pub fn at(kind: TokenKind<'a>, src: &str, offset: usize, len: usize) -> Self {
        let (line, column) = byte_offset_to_line_col(src, offset);
        Self {
            kind,
            line,
            column,
            span: SourceSpan::from((offset, len)),
        }
    }
}
