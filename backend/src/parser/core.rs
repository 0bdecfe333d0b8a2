use std::iter::Peekable;
use std::slice::Iter;

use miette::{NamedSource, Report, Result, SourceSpan};

use crate::compiler::{
    Word,
    ast::*,
    error::CompileError,
    symbols::SymbolTable,
};
use crate::lexer::tokens::{Token, TokenKind};
use crate::parser::error::ParseError;
use crate::utils::loc::join;

/// Binary operators by binding strength, loosest first.
const PRECEDENCE: &[&[BinOp]] = &[&[BinOp::Add, BinOp::Sub], &[BinOp::Mul, BinOp::Div]];

fn binary_op(kind: TokenKind<'_>) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        _ => return None,
    })
}

/// Parse `tokens` into a program, declaring variables from `variable_base`
/// up as `VAR` statements are met. Every variable reference is checked
/// against the declarations before it.
pub fn parse<'a>(
    filename: &str,
    src: &str,
    tokens: &[Token<'a>],
    variable_base: Word,
) -> Result<(Program<'a>, SymbolTable)> {
    let mut p = Parser {
        filename,
        src,
        iter: tokens.iter().peekable(),
        symbols: SymbolTable::new(variable_base),
    };
    let program = p.program()?;
    Ok((program, p.symbols))
}

struct Parser<'t, 'a> {
    filename: &'t str,
    src: &'t str,
    iter: Peekable<Iter<'t, Token<'a>>>,
    symbols: SymbolTable,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn peek(&mut self) -> Option<&'t Token<'a>> {
        self.iter.peek().copied()
    }

    fn peek_kind(&mut self) -> Option<TokenKind<'a>> {
        self.peek().map(|t| t.kind)
    }

    fn next(&mut self) -> Option<&'t Token<'a>> {
        self.iter.next()
    }

    fn expect(&mut self, want: TokenKind<'a>) -> Result<&'t Token<'a>> {
        match self.next() {
            Some(t) if t.kind == want => Ok(t),
            found => Err(self.unexpected(found, &want.describe())),
        }
    }

    fn expect_identifier(&mut self) -> Result<(Identifier<'a>, SourceSpan)> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                span,
                ..
            }) => Ok((*name, *span)),
            found => Err(self.unexpected(found, "identifier")),
        }
    }

    fn unexpected(&self, found: Option<&Token<'a>>, expected: &str) -> Report {
        let (span, found) = match found {
            Some(t) => (t.span, t.kind.describe()),
            None => ((self.src.len(), 0).into(), TokenKind::Eof.describe()),
        };
        ParseError::new(
            self.filename,
            self.src,
            span,
            format!("expected {expected}"),
            format!("expected {expected}, found {found}"),
        )
        .into()
    }

    /// Semantic errors render like the generator's, against this source.
    fn semantic(&self, err: CompileError, span: SourceSpan) -> Report {
        Report::new(err.at(span))
            .with_source_code(NamedSource::new(self.filename, self.src.to_owned()))
    }

    fn declare(&mut self, name: &str, span: SourceSpan) -> Result<()> {
        match self.symbols.declare(name) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.semantic(e, span)),
        }
    }

    fn check_declared(&self, name: &str, span: SourceSpan) -> Result<()> {
        match self.symbols.resolve(name) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.semantic(e, span)),
        }
    }

    fn program(&mut self) -> Result<Program<'a>> {
        let mut statements = Vec::new();
        while !matches!(self.peek_kind(), Some(TokenKind::Eof) | None) {
            statements.push(self.statement()?);
        }
        self.expect(TokenKind::Eof)?;
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Statement<'a>> {
        let Some(first) = self.peek() else {
            return Err(self.unexpected(None, "a statement"));
        };

        let kind = match first.kind {
            TokenKind::Var => {
                self.next();
                let (name, span) = self.expect_identifier()?;
                self.declare(name, span)?;
                StatementKind::Declare(name)
            }
            TokenKind::Identifier(_) => {
                let (target, span) = self.expect_identifier()?;
                self.check_declared(target, span)?;
                self.expect(TokenKind::Assign)?;
                let value = self.expression()?;
                StatementKind::Assign { target, value }
            }
            TokenKind::Mem => {
                self.next();
                self.expect(TokenKind::LBracket)?;
                let address = self.expression()?;
                self.expect(TokenKind::RBracket)?;
                self.expect(TokenKind::Assign)?;
                let value = self.expression()?;
                StatementKind::MemoryWrite { address, value }
            }
            TokenKind::MemWrite => {
                self.next();
                self.expect(TokenKind::LParen)?;
                let address = self.expression()?;
                self.expect(TokenKind::Comma)?;
                let value = self.expression()?;
                self.expect(TokenKind::RParen)?;
                StatementKind::MemoryWrite { address, value }
            }
            TokenKind::PrintChar => {
                self.next();
                self.expect(TokenKind::LParen)?;
                let line = self.expression()?;
                self.expect(TokenKind::Comma)?;
                let column = self.expression()?;
                self.expect(TokenKind::Comma)?;
                let code = self.expression()?;
                self.expect(TokenKind::RParen)?;
                StatementKind::PrintChar { line, column, code }
            }
            _ => return Err(self.unexpected(Some(first), "a statement")),
        };

        let end = self.expect(TokenKind::Semicolon)?;
        Ok(Statement::new(kind, join(first.span, end.span)))
    }

    fn expression(&mut self) -> Result<Expression<'a>> {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, level: usize) -> Result<Expression<'a>> {
        let Some(ops) = PRECEDENCE.get(level) else {
            return self.factor();
        };

        let mut left = self.binary_expr(level + 1)?;
        while let Some(op) = self
            .peek_kind()
            .and_then(binary_op)
            .filter(|op| ops.contains(op))
        {
            self.next();
            let rhs = self.binary_expr(level + 1)?;
            left = Expression::binary(left, op, rhs);
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expression<'a>> {
        let Some(token) = self.next() else {
            return Err(self.unexpected(None, "an expression"));
        };

        Ok(match token.kind {
            TokenKind::Int(value) => Expression::Literal(value),
            TokenKind::Identifier(name) => {
                self.check_declared(name, token.span)?;
                Expression::Variable(name)
            }
            TokenKind::Mem => {
                self.expect(TokenKind::LBracket)?;
                let address = self.expression()?;
                self.expect(TokenKind::RBracket)?;
                Expression::memory(address)
            }
            TokenKind::MemRead => {
                self.expect(TokenKind::LParen)?;
                let address = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Expression::memory(address)
            }
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            _ => return Err(self.unexpected(Some(token), "an expression")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::core::lex;

    fn parse_src(src: &str) -> Result<(Program<'_>, SymbolTable)> {
        let tokens = lex("test.u8", src)?;
        parse("test.u8", src, &tokens, 0x2000)
    }

    fn statements(src: &str) -> Vec<String> {
        let (program, _) = parse_src(src).expect("source should parse");
        program.statements.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_statement_form() {
        assert_eq!(
            statements(
                "VAR a;\na = 1;\nMEM[a] = 2;\nMEM_WRITE(a + 1, MEM_READ(a));\nPRINT_CHAR(1, 2, a);"
            ),
            [
                "VAR a;",
                "a = 1;",
                "MEM[a] = 2;",
                "MEM[(a + 1)] = MEM[a];",
                "PRINT_CHAR(1, 2, a);",
            ]
        );
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            statements("VAR a; a = 1 - 2 - 3; a = 1 + 2 * 3; a = a * 2 + 1; a = (1 + 2) / a;")[1..],
            [
                "a = ((1 - 2) - 3);",
                "a = (1 + (2 * 3));",
                "a = ((a * 2) + 1);",
                "a = ((1 + 2) / a);",
            ]
        );
    }

    #[test]
    fn declarations_fill_the_symbol_table() {
        let (program, symbols) = parse_src("VAR a; VAR b; b = a;").unwrap();
        assert_eq!(program.statements.len(), 3);
        assert_eq!(symbols.resolve("a").unwrap(), 0x2000);
        assert_eq!(symbols.resolve("b").unwrap(), 0x2002);
    }

    #[test]
    fn statement_spans_run_to_the_semicolon() {
        let src = "VAR a;\n  a = MEM[1];";
        let (program, _) = parse_src(src).unwrap();
        let span = program.statements[1].span;
        assert_eq!(&src[span.offset()..span.offset() + span.len()], "a = MEM[1];");
    }

    #[test]
    fn undeclared_references_are_rejected_where_they_appear() {
        let err = parse_src("VAR a;\na = b + 1;").unwrap_err();
        assert!(err.to_string().contains("undeclared variable `b`"));
        let label = err.labels().and_then(|mut l| l.next()).unwrap();
        assert_eq!((label.offset(), label.len()), (11, 1));

        let err = parse_src("x = 1;").unwrap_err();
        assert!(err.to_string().contains("undeclared variable `x`"));
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let err = parse_src("VAR a;\nVAR a;").unwrap_err();
        assert!(err.to_string().contains("already declared"));
        let label = err.labels().and_then(|mut l| l.next()).unwrap();
        assert_eq!(label.offset(), 11);
    }

    #[test]
    fn syntax_errors_name_what_was_expected() {
        let err = parse_src("VAR a\na = 1;").unwrap_err();
        assert_eq!(err.to_string(), "expected `;`, found identifier `a`");

        let err = parse_src("VAR a; a = ;").unwrap_err();
        assert_eq!(err.to_string(), "expected an expression, found `;`");

        let err = parse_src("PRINT_CHAR(1, 2);").unwrap_err();
        assert_eq!(err.to_string(), "expected `,`, found `)`");

        let err = parse_src("VAR a; a = (1 + 2;").unwrap_err();
        assert_eq!(err.to_string(), "expected `)`, found `;`");

        let err = parse_src("= 1;").unwrap_err();
        assert_eq!(err.to_string(), "expected a statement, found `=`");

        let err = parse_src("VAR a; a = 1").unwrap_err();
        assert_eq!(err.to_string(), "expected `;`, found end of input");
    }

    #[test]
    fn empty_source_is_an_empty_program() {
        let (program, symbols) = parse_src("// nothing here\n").unwrap();
        assert!(program.statements.is_empty());
        assert!(symbols.is_empty());
    }
}
