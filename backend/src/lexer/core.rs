use miette::Result;

use crate::{
    compiler::{REGISTER_MAX, Word},
    lexer::{
        error::LexError,
        tokens::{Token, TokenKind},
    },
    utils::core::parse_word,
};

pub fn lex<'a>(filename: &str, contents: &'a str) -> Result<Vec<Token<'a>>> {
    let mut tokens = Vec::new();
    let bytes = contents.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        // `//` runs to the end of the line
        if contents[pos..].starts_with("//") {
            pos = contents[pos..]
                .find('\n')
                .map_or(contents.len(), |nl| pos + nl);
            continue;
        }

        let start = pos;
        let kind = match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                let word = &contents[start..pos];
                TokenKind::keyword(word).unwrap_or(TokenKind::Identifier(word))
            }
            b'0'..=b'9' => {
                let hex = contents[pos..].starts_with("0x") || contents[pos..].starts_with("0X");
                if hex {
                    pos += 2;
                }
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_digit() || (hex && bytes[pos].is_ascii_hexdigit()))
                {
                    pos += 1;
                }
                TokenKind::Int(literal(filename, contents, start, pos)?)
            }
            _ => {
                pos += 1;
                match c {
                    b',' => TokenKind::Comma,
                    b';' => TokenKind::Semicolon,
                    b'[' => TokenKind::LBracket,
                    b']' => TokenKind::RBracket,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b'=' => TokenKind::Assign,
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    _ => {
                        let ch = contents[start..].chars().next().unwrap_or('?');
                        return Err(LexError::new(
                            filename,
                            contents,
                            (start, ch.len_utf8()).into(),
                            "not part of the language",
                            format!("unexpected character `{ch}`"),
                        )
                        .into());
                    }
                }
            }
        };

        tokens.push(Token::at(kind, contents, start, pos - start));
    }

    tokens.push(Token::at(TokenKind::Eof, contents, contents.len(), 0));
    Ok(tokens)
}

fn literal(filename: &str, contents: &str, start: usize, end: usize) -> Result<Word> {
    let text = &contents[start..end];
    let error = |label: String, message: String| {
        LexError::new(filename, contents, (start, end - start).into(), label, message)
    };
    let value = parse_word(text)
        .map_err(|e| error(e.to_string(), format!("invalid integer literal `{text}`")))?;
    if value > REGISTER_MAX {
        return Err(error(
            format!("registers hold at most {REGISTER_MAX:#x}"),
            format!("integer literal `{text}` does not fit in 16 bits"),
        )
        .into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind<'_>> {
        lex("test.u8", src)
            .expect("source should lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn statements_and_keywords() {
        assert_eq!(
            kinds("VAR x;\nx = 0x10 + 2;"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("x"),
                TokenKind::Semicolon,
                TokenKind::Identifier("x"),
                TokenKind::Assign,
                TokenKind::Int(16),
                TokenKind::Plus,
                TokenKind::Int(2),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn memory_and_display_keywords() {
        assert_eq!(
            kinds("MEM[1] = MEM_READ(2); MEM_WRITE(3, 4); PRINT_CHAR(1, 2, 65);")[..4],
            [
                TokenKind::Mem,
                TokenKind::LBracket,
                TokenKind::Int(1),
                TokenKind::RBracket
            ]
        );
        let all = kinds("MEM_READ MEM_WRITE PRINT_CHAR MEMORY");
        assert_eq!(
            all,
            vec![
                TokenKind::MemRead,
                TokenKind::MemWrite,
                TokenKind::PrintChar,
                TokenKind::Identifier("MEMORY"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("// header\nVAR a; // trailing\n// last"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("a"),
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn tokens_carry_positions() {
        let tokens = lex("test.u8", "VAR a;\n  a = 1;").expect("source should lex");
        let assign = &tokens[4];
        assert_eq!(assign.kind, TokenKind::Assign);
        assert_eq!((assign.line, assign.column), (2, 5));
        assert_eq!(assign.span.offset(), 11);
        assert_eq!(assign.span.len(), 1);

        let eof = tokens.last().expect("eof token");
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.span.offset(), 15);
    }

    #[test]
    fn unknown_character_is_an_error() {
        let err = lex("test.u8", "VAR a;\na = 1 % 2;").unwrap_err();
        assert!(err.to_string().contains("unexpected character `%`"));
    }

    #[test]
    fn oversized_literal_is_an_error() {
        let err = lex("test.u8", "a = 99999999999;").unwrap_err();
        assert!(err.to_string().contains("invalid integer literal"));
    }

    #[test]
    fn literals_must_fit_a_register() {
        assert_eq!(kinds("0xFFFF 65535")[..2], [TokenKind::Int(0xFFFF), TokenKind::Int(65535)]);

        let err = lex("test.u8", "VAR x; x = 70000;").unwrap_err();
        assert_eq!(err.to_string(), "integer literal `70000` does not fit in 16 bits");
        let label = err.labels().and_then(|mut l| l.next()).unwrap();
        assert_eq!((label.offset(), label.len()), (11, 5));

        assert!(lex("test.u8", "0x10000").is_err());
    }
}
