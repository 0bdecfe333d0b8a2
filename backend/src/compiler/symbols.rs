use std::collections::HashMap;

use tracing::debug;

use crate::compiler::{Word, error::CompileError};

pub const DEFAULT_VARIABLE_BASE: Word = 0x2000;

/// Bytes per variable slot.
pub const SLOT_SIZE: Word = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub address: Word,
}

/// Flat allocator for variable slots in target RAM.
///
/// Addresses grow from the base in declaration order and are never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    next_address: Word,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new(DEFAULT_VARIABLE_BASE)
    }
}

impl SymbolTable {
    pub fn new(base: Word) -> Self {
        Self {
            variables: Vec::new(),
            index: HashMap::new(),
            next_address: base,
        }
    }

    pub fn declare(&mut self, name: &str) -> Result<Word, CompileError> {
        if self.index.contains_key(name) {
            return Err(CompileError::DuplicateDeclaration {
                name: name.to_owned(),
                span: None,
            });
        }

        let address = self.next_address;
        self.next_address = address
            .checked_add(SLOT_SIZE)
            .ok_or_else(|| CompileError::VariableSpaceExhausted {
                name: name.to_owned(),
                span: None,
            })?;

        debug!("declared `{name}` at {address:#06x}");
        self.index.insert(name.to_owned(), self.variables.len());
        self.variables.push(Variable {
            name: name.to_owned(),
            address,
        });
        Ok(address)
    }

    pub fn resolve(&self, name: &str) -> Result<Word, CompileError> {
        self.get(name)
            .map(|v| v.address)
            .ok_or_else(|| CompileError::UndeclaredVariable {
                name: name.to_owned(),
                span: None,
            })
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    /// Declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
