//! Test interpreter for chains: executes payload words against the modeled
//! gadget effects with 16-bit registers and a sparse RAM.

use std::collections::HashMap;

use crate::compiler::{
    REGISTER_MAX, Word,
    catalog::GadgetCatalog,
    gadgets::{ArithOp, Effect, GADGET_TABLE, GadgetId},
    registers::Reg,
};

/// What a clobbered register reads as.
const POISON: Word = 0xDEAD;

/// Where [`catalog`] puts `identity`.
pub fn address_of(identity: GadgetId) -> Word {
    0x8000 + 0x10 * identity as Word
}

/// A catalog resolving every identity in the table.
pub fn catalog() -> GadgetCatalog {
    GadgetId::all().map(|id| (id, address_of(id))).collect()
}

/// The same catalog written as a listing file.
pub fn listing() -> String {
    GADGET_TABLE
        .iter()
        .map(|spec| format!("{:#06X} {}\n", address_of(spec.id), spec.description))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Store {
    pub address: Word,
    pub value: Word,
}

#[derive(Debug, Default)]
pub struct Machine {
    regs: [Word; Reg::COUNT],
    memory: HashMap<Word, Word>,
    pub stores: Vec<Store>,
}

impl Machine {
    pub fn read(&self, address: Word) -> Word {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    pub fn reg(&self, reg: Reg) -> Word {
        self.regs[reg.index()]
    }

    fn set(&mut self, reg: Reg, value: Word) {
        self.regs[reg.index()] = value & REGISTER_MAX;
    }
}

/// Run `words` until a gadget that does not return.
pub fn run(catalog: &GadgetCatalog, words: &[Word]) -> Result<Machine, String> {
    let mut machine = Machine::default();
    let mut pc = 0;

    loop {
        let Some(&address) = words.get(pc) else {
            return Err(format!("chain ran off its end at word {pc}"));
        };
        let Some(identity) = catalog.identity_at(address) else {
            return Err(format!("word {pc} ({address:#06x}) is not a gadget"));
        };
        pc += 1;

        let spec = identity.spec();
        for effect in spec.effects {
            match *effect {
                Effect::Pop(reg) => {
                    let Some(&word) = words.get(pc) else {
                        return Err(format!("`{identity}` pops past the end"));
                    };
                    pc += 1;
                    machine.set(reg, word);
                }
                Effect::Copy { dst, src } => machine.set(dst, machine.reg(src)),
                Effect::Load { dst, addr } => {
                    let value = machine.read(machine.reg(addr));
                    machine.set(dst, value);
                }
                Effect::Store { addr, value } => {
                    let store = Store {
                        address: machine.reg(addr),
                        value: machine.reg(value),
                    };
                    machine.memory.insert(store.address, store.value);
                    machine.stores.push(store);
                }
                Effect::Arith { op, dst, lhs, rhs } => {
                    let (lhs, rhs) = (machine.reg(lhs), machine.reg(rhs));
                    let result = match op {
                        ArithOp::Add => lhs.wrapping_add(rhs),
                        ArithOp::Sub => lhs.wrapping_sub(rhs),
                    };
                    machine.set(dst, result);
                }
                Effect::ShiftLeft { reg, bits } => machine.set(reg, machine.reg(reg) << bits),
                Effect::Clobber(reg) => machine.set(reg, POISON),
            }
        }

        if !spec.returns {
            return Ok(machine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executes_until_the_trap() {
        let catalog = catalog();
        let machine = run(
            &catalog,
            &[
                address_of(GadgetId::PopEr0Rt),
                0x1234,
                address_of(GadgetId::PopEr4Rt),
                0x2000,
                address_of(GadgetId::StoreEr4Er0PopEr0),
                0,
                address_of(GadgetId::Break),
                address_of(GadgetId::PopEr0Rt),
            ],
        )
        .unwrap();
        assert_eq!(machine.read(0x2000), 0x1234);
        assert_eq!(machine.reg(Reg::Er0), 0);
        assert_eq!(
            machine.stores,
            vec![Store {
                address: 0x2000,
                value: 0x1234
            }]
        );
    }

    #[test]
    fn wide_pops_and_sixteen_bit_arithmetic() {
        let catalog = catalog();
        let machine = run(
            &catalog,
            &[
                address_of(GadgetId::PopXr0),
                3,
                5,
                address_of(GadgetId::SubEr0Er2),
                address_of(GadgetId::Break),
            ],
        )
        .unwrap();
        assert_eq!(machine.reg(Reg::Er0), 0xFFFE);
        assert_eq!(machine.reg(Reg::Er2), 5);
    }

    #[test]
    fn unterminated_chains_are_errors() {
        let catalog = catalog();
        assert!(run(&catalog, &[address_of(GadgetId::PopEr0Rt), 1]).is_err());
        assert!(run(&catalog, &[address_of(GadgetId::PopEr0Rt)]).is_err());
        assert!(run(&catalog, &[0x1234]).is_err());
    }

    #[test]
    fn listing_loads_back_into_the_same_catalog() {
        let loaded = GadgetCatalog::load("sim.gadgets", listing().as_bytes()).unwrap();
        assert_eq!(loaded, catalog());
    }
}
