use miette::{NamedSource, Report};

use crate::{
    compiler::{
        ast::Program, catalog::GadgetCatalog, chain::ChainBuilder, error::CompileError,
        payload::Payload, symbols::SymbolTable, target::TargetProfile,
    },
    lexer::core::lex,
    parser::core::parse,
};

/// Generate the chain for an already parsed program.
pub fn compile(
    program: &Program<'_>,
    symbols: &SymbolTable,
    catalog: &GadgetCatalog,
    profile: &TargetProfile,
) -> Result<Payload, CompileError> {
    ChainBuilder::new(catalog, symbols, profile).build(program)
}

/// Lex, parse and compile one source file. Generation errors come back with
/// the source attached so their spans render.
pub fn compile_source(
    filename: &str,
    src: &str,
    catalog: &GadgetCatalog,
    profile: &TargetProfile,
) -> miette::Result<Payload> {
    let tokens = lex(filename, src)?;
    let (program, symbols) = parse(filename, src, &tokens, profile.variable_base)?;
    compile(&program, &symbols, catalog, profile).map_err(|e| {
        Report::new(e).with_source_code(NamedSource::new(filename, src.to_owned()))
    })
}
