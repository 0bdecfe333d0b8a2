pub mod ast;
pub mod catalog;
pub mod chain;
pub mod core;
pub mod error;
pub mod gadgets;
pub mod payload;
pub mod registers;
pub mod symbols;
pub mod target;

#[cfg(test)]
pub(crate) mod sim;

/// One machine word of the payload: a gadget address or a literal popped by a gadget.
pub type Word = u32;

/// Largest value an `er` register pair can hold.
pub const REGISTER_MAX: Word = 0xFFFF;
