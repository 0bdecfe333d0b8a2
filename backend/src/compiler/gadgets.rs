//! The static gadget identity table.
//!
//! Each row names one firmware fragment the generator knows how to use: the
//! exact description it carries in a listing, what it does to the modeled
//! registers and memory, and whether it returns into the next chain entry.
//! Catalogs only ever differ in the addresses they bind to these rows.
//!
//! Descriptions are written the way the firmware listings write them. A
//! description without a trailing `rt` ends in `pop pc` and still hands
//! control to the next chain word; only `break` stops the chain.

use std::fmt;

use serde::Serialize;

use crate::compiler::registers::{Reg, RegSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GadgetId {
    PopEr0Rt,
    PopEr0,
    PopEr2,
    PopEr4Rt,
    PopEr4,
    PopEr6Rt,
    PopEr6,
    PopEr8Rt,
    PopEr8,
    PopEr10,
    PopEr12Rt,
    PopEr12,
    PopEr14Rt,
    PopEr14,
    PopXr0,
    PopXr4Rt,
    PopXr4,
    PopXr8Rt,
    PopXr8,
    PopQr0Rt,
    PopQr0,
    PopQr8Rt,
    PopQr8,
    MovEr2Er0PopEr8,
    MovEr8Er0,
    MovEr0Er2,
    MovEr0Er4PopEr4,
    MovEr0Er8PopEr8,
    MovEr0Er8,
    MovEr0Er6PopEr8PopXr4,
    MovEr6Er0Er0Er8PopQr8,
    MovEr2Er0PopXr4,
    MovEr14Er0PopXr0,
    MovEr0Er12PopEr12,
    MovEr10Er2,
    MovEr0Er10PopXr8,
    LoadEr0Er2,
    LoadEr0Er0PopXr8,
    LoadEr8Er0,
    LoadEr4Er8PopEr8,
    StoreEr4Er0PopEr0,
    StoreEr0Er2,
    StoreEr2Er0PopEr4,
    StoreEr8Er2PopXr8,
    AddEr0Er8,
    AddEr0Er2,
    AddEr0Er4,
    AddEr4Er0,
    AddEr2Er8,
    MovEr2Er0AddEr0Er4,
    SubEr0Er2,
    SubEr0Er12PopEr8PopEr12,
    SllEr0By4,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

/// One observable step of a gadget, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Takes the next chain word into `reg`.
    Pop(Reg),
    Copy { dst: Reg, src: Reg },
    /// `dst = [addr]`
    Load { dst: Reg, addr: Reg },
    /// `[addr] = value`
    Store { addr: Reg, value: Reg },
    /// `dst = lhs op rhs`
    Arith { op: ArithOp, dst: Reg, lhs: Reg, rhs: Reg },
    ShiftLeft { reg: Reg, bits: u8 },
    /// `reg` holds garbage afterwards, e.g. after a byte-sized write to half of it.
    Clobber(Reg),
}

#[derive(Debug)]
pub struct GadgetSpec {
    pub id: GadgetId,
    pub description: &'static str,
    pub effects: &'static [Effect],
    /// `false` for the trap that ends a chain.
    pub returns: bool,
}

use Effect::*;
use Reg::*;

const fn row(id: GadgetId, description: &'static str, effects: &'static [Effect]) -> GadgetSpec {
    GadgetSpec {
        id,
        description,
        effects,
        returns: true,
    }
}

/// Indexed by `GadgetId as usize`. Multi-register pops fill the lowest
/// register first.
pub static GADGET_TABLE: &[GadgetSpec] = &[
    row(GadgetId::PopEr0Rt, "pop er0,rt", &[Pop(Er0)]),
    row(GadgetId::PopEr0, "pop er0", &[Pop(Er0)]),
    row(GadgetId::PopEr2, "pop er2", &[Pop(Er2)]),
    row(GadgetId::PopEr4Rt, "pop er4,rt", &[Pop(Er4)]),
    row(GadgetId::PopEr4, "pop er4", &[Pop(Er4)]),
    row(GadgetId::PopEr6Rt, "pop er6,rt", &[Pop(Er6)]),
    row(GadgetId::PopEr6, "pop er6", &[Pop(Er6)]),
    row(GadgetId::PopEr8Rt, "pop er8,rt", &[Pop(Er8)]),
    row(GadgetId::PopEr8, "pop er8", &[Pop(Er8)]),
    row(GadgetId::PopEr10, "pop er10", &[Pop(Er10)]),
    row(GadgetId::PopEr12Rt, "pop er12,rt", &[Pop(Er12)]),
    row(GadgetId::PopEr12, "pop er12", &[Pop(Er12)]),
    row(GadgetId::PopEr14Rt, "pop er14,rt", &[Pop(Er14)]),
    row(GadgetId::PopEr14, "pop er14", &[Pop(Er14)]),
    row(GadgetId::PopXr0, "pop xr0", &[Pop(Er0), Pop(Er2)]),
    row(GadgetId::PopXr4Rt, "pop xr4,rt", &[Pop(Er4), Pop(Er6)]),
    row(GadgetId::PopXr4, "pop xr4", &[Pop(Er4), Pop(Er6)]),
    row(GadgetId::PopXr8Rt, "pop xr8,rt", &[Pop(Er8), Pop(Er10)]),
    row(GadgetId::PopXr8, "pop xr8", &[Pop(Er8), Pop(Er10)]),
    row(GadgetId::PopQr0Rt, "pop qr0,rt", &[Pop(Er0), Pop(Er2), Pop(Er4), Pop(Er6)]),
    row(GadgetId::PopQr0, "pop qr0", &[Pop(Er0), Pop(Er2), Pop(Er4), Pop(Er6)]),
    row(GadgetId::PopQr8Rt, "pop qr8,rt", &[Pop(Er8), Pop(Er10), Pop(Er12), Pop(Er14)]),
    row(GadgetId::PopQr8, "pop qr8", &[Pop(Er8), Pop(Er10), Pop(Er12), Pop(Er14)]),
    row(
        GadgetId::MovEr2Er0PopEr8,
        "er2 = er0,er0 = er2,pop er8,rt",
        &[Copy { dst: Er2, src: Er0 }, Copy { dst: Er0, src: Er2 }, Pop(Er8)],
    ),
    row(GadgetId::MovEr8Er0, "er8 = er0", &[Copy { dst: Er8, src: Er0 }]),
    row(GadgetId::MovEr0Er2, "er0 = er2,rt", &[Copy { dst: Er0, src: Er2 }]),
    row(
        GadgetId::MovEr0Er4PopEr4,
        "er0 = er4,pop er4",
        &[Copy { dst: Er0, src: Er4 }, Pop(Er4)],
    ),
    row(
        GadgetId::MovEr0Er8PopEr8,
        "er0 = er8,pop er8,rt",
        &[Copy { dst: Er0, src: Er8 }, Pop(Er8)],
    ),
    row(GadgetId::MovEr0Er8, "er0 = er8", &[Copy { dst: Er0, src: Er8 }]),
    row(
        GadgetId::MovEr0Er6PopEr8PopXr4,
        "er0 = er6,pop er8,pop xr4",
        &[Copy { dst: Er0, src: Er6 }, Pop(Er8), Pop(Er4), Pop(Er6)],
    ),
    row(
        GadgetId::MovEr6Er0Er0Er8PopQr8,
        "er6 = er0,er0 = er8,pop qr8",
        &[
            Copy { dst: Er6, src: Er0 },
            Copy { dst: Er0, src: Er8 },
            Pop(Er8),
            Pop(Er10),
            Pop(Er12),
            Pop(Er14),
        ],
    ),
    row(
        GadgetId::MovEr2Er0PopXr4,
        "er2 = er0,r0 = r4,r1 = 0,pop xr4,rt",
        &[Copy { dst: Er2, src: Er0 }, Clobber(Er0), Pop(Er4), Pop(Er6)],
    ),
    row(
        GadgetId::MovEr14Er0PopXr0,
        "er14 = er0,pop xr0",
        &[Copy { dst: Er14, src: Er0 }, Pop(Er0), Pop(Er2)],
    ),
    row(
        GadgetId::MovEr0Er12PopEr12,
        "er0 = er12,pop er12,rt",
        &[Copy { dst: Er0, src: Er12 }, Pop(Er12)],
    ),
    row(GadgetId::MovEr10Er2, "er10 = er2,rt", &[Copy { dst: Er10, src: Er2 }]),
    row(
        GadgetId::MovEr0Er10PopXr8,
        "er0 = er10,pop xr8",
        &[Copy { dst: Er0, src: Er10 }, Pop(Er8), Pop(Er10)],
    ),
    row(
        GadgetId::LoadEr0Er2,
        "er0=[er2],r2 = 9,rt",
        &[Load { dst: Er0, addr: Er2 }, Clobber(Er2)],
    ),
    row(
        GadgetId::LoadEr0Er0PopXr8,
        "er0=[er0],pop xr8,rt",
        &[Load { dst: Er0, addr: Er0 }, Pop(Er8), Pop(Er10)],
    ),
    row(GadgetId::LoadEr8Er0, "er8=[er0],rt", &[Load { dst: Er8, addr: Er0 }]),
    row(
        GadgetId::LoadEr4Er8PopEr8,
        "er4=[er8],pop er8,rt",
        &[Load { dst: Er4, addr: Er8 }, Pop(Er8)],
    ),
    row(
        GadgetId::StoreEr4Er0PopEr0,
        "[er4]=er0,pop er0,rt",
        &[Store { addr: Er4, value: Er0 }, Pop(Er0)],
    ),
    row(GadgetId::StoreEr0Er2, "[er0]=er2,rt", &[Store { addr: Er0, value: Er2 }]),
    row(
        GadgetId::StoreEr2Er0PopEr4,
        "[er2]=er0,r2 = 0,pop er4,rt",
        &[Store { addr: Er2, value: Er0 }, Clobber(Er2), Pop(Er4)],
    ),
    row(
        GadgetId::StoreEr8Er2PopXr8,
        "[er8]=er2,pop xr8",
        &[Store { addr: Er8, value: Er2 }, Pop(Er8), Pop(Er10)],
    ),
    row(
        GadgetId::AddEr0Er8,
        "er0+=er8,rt",
        &[Arith { op: ArithOp::Add, dst: Er0, lhs: Er0, rhs: Er8 }],
    ),
    row(
        GadgetId::AddEr0Er2,
        "er0+=er2,rt",
        &[Arith { op: ArithOp::Add, dst: Er0, lhs: Er0, rhs: Er2 }],
    ),
    row(
        GadgetId::AddEr0Er4,
        "er0+=er4,rt",
        &[Arith { op: ArithOp::Add, dst: Er0, lhs: Er0, rhs: Er4 }],
    ),
    row(
        GadgetId::AddEr4Er0,
        "er4+=er0,r8 = r8,rt",
        &[Arith { op: ArithOp::Add, dst: Er4, lhs: Er4, rhs: Er0 }],
    ),
    row(
        GadgetId::AddEr2Er8,
        "er2+=er8,rt",
        &[Arith { op: ArithOp::Add, dst: Er2, lhs: Er2, rhs: Er8 }],
    ),
    row(
        GadgetId::MovEr2Er0AddEr0Er4,
        "er2 = er0,er0+=er4,rt",
        &[
            Copy { dst: Er2, src: Er0 },
            Arith { op: ArithOp::Add, dst: Er0, lhs: Er0, rhs: Er4 },
        ],
    ),
    row(
        GadgetId::SubEr0Er2,
        "er0-=er2,rt",
        &[Arith { op: ArithOp::Sub, dst: Er0, lhs: Er0, rhs: Er2 }],
    ),
    row(
        GadgetId::SubEr0Er12PopEr8PopEr12,
        "er0-=er12,pop er8,pop er12,rt",
        &[
            Arith { op: ArithOp::Sub, dst: Er0, lhs: Er0, rhs: Er12 },
            Pop(Er8),
            Pop(Er12),
        ],
    ),
    row(GadgetId::SllEr0By4, "er0 << 4,rt", &[ShiftLeft { reg: Er0, bits: 4 }]),
    GadgetSpec {
        id: GadgetId::Break,
        description: "break",
        effects: &[],
        returns: false,
    },
];

impl GadgetId {
    pub fn spec(self) -> &'static GadgetSpec {
        &GADGET_TABLE[self as usize]
    }

    pub fn description(self) -> &'static str {
        self.spec().description
    }

    /// Exact (whitespace-trimmed) match against the listing descriptions.
    pub fn from_description(text: &str) -> Option<GadgetId> {
        let text = text.trim();
        GADGET_TABLE
            .iter()
            .find(|spec| spec.description == text)
            .map(|spec| spec.id)
    }

    pub fn all() -> impl Iterator<Item = GadgetId> {
        GADGET_TABLE.iter().map(|spec| spec.id)
    }
}

impl fmt::Display for GadgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl GadgetSpec {
    /// Chain words this gadget consumes after its own address.
    pub fn pops(&self) -> usize {
        self.effects
            .iter()
            .filter(|e| matches!(e, Pop(_)))
            .count()
    }

    pub fn writes(&self) -> RegSet {
        self.effects
            .iter()
            .filter_map(|e| match *e {
                Pop(reg) | Copy { dst: reg, .. } | Clobber(reg) => Some(reg),
                Load { dst, .. } | Arith { dst, .. } => Some(dst),
                ShiftLeft { reg, .. } => Some(reg),
                Store { .. } => None,
            })
            .fold(RegSet::EMPTY, |set, r| set | r)
    }

    /// Registers some copy in this gadget writes.
    pub fn copies_into(&self) -> RegSet {
        self.effects
            .iter()
            .filter_map(|e| match *e {
                Copy { dst, .. } => Some(dst),
                _ => None,
            })
            .fold(RegSet::EMPTY, |set, r| set | r)
    }

    /// Nothing but pops.
    pub fn is_pop(&self) -> bool {
        !self.effects.is_empty() && self.effects.iter().all(|e| matches!(e, Pop(_)))
    }

    /// A pure register shuffle: copies, possibly with junk pops or clobbers.
    pub fn is_move(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Copy { .. }))
            && self
                .effects
                .iter()
                .all(|e| matches!(e, Copy { .. } | Pop(_) | Clobber(_)))
    }

    /// `(address, value)` registers of the store this gadget performs.
    pub fn store(&self) -> Option<(Reg, Reg)> {
        self.effects.iter().find_map(|e| match *e {
            Store { addr, value } => Some((addr, value)),
            _ => None,
        })
    }

    /// `(destination, address)` registers of the load this gadget performs.
    pub fn load(&self) -> Option<(Reg, Reg)> {
        self.effects.iter().find_map(|e| match *e {
            Load { dst, addr } => Some((dst, addr)),
            _ => None,
        })
    }

    /// `(op, lhs, rhs, dst)` of the arithmetic this gadget performs.
    pub fn arith(&self) -> Option<(ArithOp, Reg, Reg, Reg)> {
        self.effects.iter().find_map(|e| match *e {
            Arith { op, dst, lhs, rhs } => Some((op, lhs, rhs, dst)),
            _ => None,
        })
    }
}
