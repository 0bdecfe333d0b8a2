use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// A token the grammar does not allow at this point.
#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic(
    code(u8rop::parser::error),
    help("Statements are `VAR x;`, `x = e;`, `MEM[e] = e;`, `MEM_WRITE(e, e);` or `PRINT_CHAR(e, e, e);`")
)]
pub struct ParseError {
    #[source_code]
    pub source_code: NamedSource<String>,
    #[label("{label}")]
    pub span: SourceSpan,
    pub message: String,
    pub label: String,
}

impl ParseError {
    pub fn new(
        filename: &str,
        full_src: &str,
        span: SourceSpan,
        label: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_code: NamedSource::new(filename, full_src.to_owned()),
            span,
            label: label.into(),
            message: message.into(),
        }
    }
}
