use std::path::PathBuf;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::compiler::{Word, gadgets::GadgetId};

/// Everything that aborts a compilation after the source has been tokenized.
///
/// Semantic and generation errors carry the span of the offending statement
/// once it is known; attach the source text with
/// [`miette::Report::with_source_code`] to render it.
#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    #[error("cannot read `{}`", path.display())]
    #[diagnostic(code(u8rop::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target profile `{}`: {message}", path.display())]
    #[diagnostic(code(u8rop::config), help("see demos/profile.json for the accepted keys"))]
    Config { path: PathBuf, message: String },

    #[error("gadget `{identity}` is not in the loaded catalog")]
    #[diagnostic(
        code(u8rop::codegen::gadget_not_found),
        help("locate a `{identity}` gadget in the firmware and add it to the listing")
    )]
    GadgetNotFound {
        identity: GadgetId,
        #[label("needs `{identity}`")]
        span: Option<SourceSpan>,
    },

    #[error("undeclared variable `{name}`")]
    #[diagnostic(code(u8rop::semantic::undeclared), help("declare it first with `VAR {name};`"))]
    UndeclaredVariable {
        name: String,
        #[label("not declared")]
        span: Option<SourceSpan>,
    },

    #[error("variable `{name}` is already declared")]
    #[diagnostic(code(u8rop::semantic::duplicate), help("remove the second `VAR {name};`"))]
    DuplicateDeclaration {
        name: String,
        #[label("declared again here")]
        span: Option<SourceSpan>,
    },

    #[error("no RAM left to place variable `{name}`")]
    #[diagnostic(code(u8rop::semantic::variable_space))]
    VariableSpaceExhausted {
        name: String,
        #[label("declared here")]
        span: Option<SourceSpan>,
    },

    #[error("unsupported {kind}")]
    #[diagnostic(
        code(u8rop::codegen::unsupported),
        help("the catalog has no gadget convention for this construct")
    )]
    UnsupportedNode {
        kind: String,
        #[label("cannot be generated")]
        span: Option<SourceSpan>,
    },

    #[error("no sequence of catalog moves and pops reaches {goal}")]
    #[diagnostic(
        code(u8rop::codegen::no_placement),
        help("add register-move gadgets to the listing")
    )]
    NoPlacement {
        goal: String,
        #[label("while generating this")]
        span: Option<SourceSpan>,
    },

    #[error("all {slots} scratch slots are in use")]
    #[diagnostic(
        code(u8rop::codegen::scratch),
        help("raise `scratch_slots` in the target profile or split the expression")
    )]
    ScratchExhausted {
        slots: usize,
        #[label("while generating this")]
        span: Option<SourceSpan>,
    },

    #[error("word {word:#x} does not fit in {width} byte(s)")]
    #[diagnostic(code(u8rop::payload::overflow))]
    WordOverflow { word: Word, width: u8 },

    #[error(transparent)]
    #[diagnostic(code(u8rop::payload::json))]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    /// Attach `at` unless the error already points somewhere more precise.
    pub fn at(mut self, at: SourceSpan) -> Self {
        match &mut self {
            CompileError::GadgetNotFound { span, .. }
            | CompileError::UndeclaredVariable { span, .. }
            | CompileError::DuplicateDeclaration { span, .. }
            | CompileError::VariableSpaceExhausted { span, .. }
            | CompileError::UnsupportedNode { span, .. }
            | CompileError::NoPlacement { span, .. }
            | CompileError::ScratchExhausted { span, .. } => {
                span.get_or_insert(at);
            }
            CompileError::Io { .. }
            | CompileError::Config { .. }
            | CompileError::WordOverflow { .. }
            | CompileError::Json(_) => {}
        }
        self
    }

    /// The generator ran out of options along one path; another choice of
    /// gadget or holding register may still work.
    pub fn is_dead_end(&self) -> bool {
        matches!(
            self,
            CompileError::NoPlacement { .. } | CompileError::ScratchExhausted { .. }
        )
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            CompileError::GadgetNotFound { span, .. }
            | CompileError::UndeclaredVariable { span, .. }
            | CompileError::DuplicateDeclaration { span, .. }
            | CompileError::VariableSpaceExhausted { span, .. }
            | CompileError::UnsupportedNode { span, .. }
            | CompileError::NoPlacement { span, .. }
            | CompileError::ScratchExhausted { span, .. } => *span,
            _ => None,
        }
    }
}
