pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod utils;
