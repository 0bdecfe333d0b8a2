//! Generation-time view of the CPU registers.
//!
//! The builder never runs the chain, so it cannot know runtime values. What
//! it does know is *which* value sits where: a literal it popped, or the
//! result of some earlier gadget. [`RegisterState`] records exactly that and
//! is threaded by value through every generation rule.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::compiler::{
    Word,
    gadgets::{Effect, GadgetSpec},
};

/// The 16-bit register pairs `er0` to `er14`. Byte halves and the wider
/// `xr`/`qr` groups are only ever seen through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Er0,
    Er2,
    Er4,
    Er6,
    Er8,
    Er10,
    Er12,
    Er14,
}

impl Reg {
    pub const COUNT: usize = 8;
    pub const ALL: [Reg; Reg::COUNT] = [
        Reg::Er0,
        Reg::Er2,
        Reg::Er4,
        Reg::Er6,
        Reg::Er8,
        Reg::Er10,
        Reg::Er12,
        Reg::Er14,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "er{}", self.index() * 2)
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegSet(u8);

impl RegSet {
    pub const EMPTY: RegSet = RegSet(0);
    pub const ALL: RegSet = RegSet(u8::MAX);

    pub fn of(regs: &[Reg]) -> Self {
        regs.iter().fold(RegSet::EMPTY, |set, &r| set | r)
    }

    pub fn insert(&mut self, reg: Reg) {
        self.0 |= 1 << reg.index();
    }

    pub fn contains(self, reg: Reg) -> bool {
        self.0 & (1 << reg.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Reg> {
        Reg::ALL.into_iter().filter(move |&r| self.contains(r))
    }
}

impl BitOr for RegSet {
    type Output = RegSet;
    fn bitor(self, rhs: RegSet) -> RegSet {
        RegSet(self.0 | rhs.0)
    }
}

impl BitOr<Reg> for RegSet {
    type Output = RegSet;
    fn bitor(mut self, rhs: Reg) -> RegSet {
        self.insert(rhs);
        self
    }
}

impl BitOrAssign for RegSet {
    fn bitor_assign(&mut self, rhs: RegSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for RegSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// What the generator knows about one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Content {
    /// Garbage: never popped, clobbered, or filled with a junk word.
    #[default]
    Unknown,
    /// A literal the chain itself popped.
    Const(Word),
    /// The runtime result of a load, an arithmetic or a shift gadget.
    Value(u32),
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Unknown => f.write_str("?"),
            Content::Const(word) => write!(f, "{word:#06x}"),
            Content::Value(id) => write!(f, "v{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterState {
    regs: [Content; Reg::COUNT],
    next_value: u32,
    written: RegSet,
}

impl RegisterState {
    pub fn get(&self, reg: Reg) -> Content {
        self.regs[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, content: Content) {
        self.regs[reg.index()] = content;
        self.written.insert(reg);
    }

    /// Snapshot of the register contents only, used as a search key.
    pub fn contents(&self) -> [Content; Reg::COUNT] {
        self.regs
    }

    /// Every register some gadget has written since this state was created.
    pub fn written(&self) -> RegSet {
        self.written
    }

    pub fn satisfies(&self, goals: &[(Reg, Content)]) -> bool {
        goals
            .iter()
            .all(|&(reg, content)| content != Content::Unknown && self.get(reg) == content)
    }

    fn fresh(&mut self) -> Content {
        let value = Content::Value(self.next_value);
        self.next_value += 1;
        value
    }

    /// Advance the state past one gadget. `operands` feed its pops in order;
    /// pops beyond them receive filler and leave the register unknown.
    pub fn apply(&mut self, gadget: &GadgetSpec, operands: &[Word]) {
        let mut operands = operands.iter();
        for effect in gadget.effects {
            match *effect {
                Effect::Pop(reg) => {
                    let content = operands.next().map_or(Content::Unknown, |&w| Content::Const(w));
                    self.set(reg, content);
                }
                Effect::Copy { dst, src } => {
                    let content = self.get(src);
                    self.set(dst, content);
                }
                Effect::Load { dst, .. }
                | Effect::Arith { dst, .. }
                | Effect::ShiftLeft { reg: dst, .. } => {
                    let value = self.fresh();
                    self.set(dst, value);
                }
                Effect::Store { .. } => {}
                Effect::Clobber(reg) => self.set(reg, Content::Unknown),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::gadgets::GadgetId;

    #[test]
    fn pops_with_operands_are_constants() {
        let mut state = RegisterState::default();
        state.apply(GadgetId::PopEr0Rt.spec(), &[5]);
        assert_eq!(state.get(Reg::Er0), Content::Const(5));
        assert_eq!(state.written(), RegSet::of(&[Reg::Er0]));
    }

    #[test]
    fn filler_pops_and_clobbers_forget_contents() {
        let mut state = RegisterState::default();
        state.apply(GadgetId::PopEr0Rt.spec(), &[5]);
        state.apply(GadgetId::StoreEr4Er0PopEr0.spec(), &[]);
        assert_eq!(state.get(Reg::Er0), Content::Unknown);

        state.apply(GadgetId::PopEr2.spec(), &[0x2000]);
        state.apply(GadgetId::LoadEr0Er2.spec(), &[]);
        assert_eq!(state.get(Reg::Er2), Content::Unknown);
        assert!(matches!(state.get(Reg::Er0), Content::Value(_)));
    }

    #[test]
    fn copies_share_content_and_results_are_fresh() {
        let mut state = RegisterState::default();
        state.apply(GadgetId::PopEr2.spec(), &[0x2000]);
        state.apply(GadgetId::LoadEr0Er2.spec(), &[]);
        let loaded = state.get(Reg::Er0);
        state.apply(GadgetId::MovEr8Er0.spec(), &[]);
        assert_eq!(state.get(Reg::Er8), loaded);
        assert_eq!(state.get(Reg::Er0), loaded);

        state.apply(GadgetId::AddEr0Er8.spec(), &[]);
        assert_ne!(state.get(Reg::Er0), loaded);
        assert!(matches!(state.get(Reg::Er0), Content::Value(_)));
    }

    #[test]
    fn wide_pops_and_partial_writes() {
        let mut state = RegisterState::default();
        state.apply(GadgetId::PopQr8.spec(), &[1, 2]);
        assert_eq!(state.get(Reg::Er8), Content::Const(1));
        assert_eq!(state.get(Reg::Er10), Content::Const(2));
        assert_eq!(state.get(Reg::Er12), Content::Unknown);

        state.apply(GadgetId::PopEr0Rt.spec(), &[7]);
        state.apply(GadgetId::MovEr2Er0PopXr4.spec(), &[]);
        assert_eq!(state.get(Reg::Er2), Content::Const(7));
        assert_eq!(state.get(Reg::Er0), Content::Unknown);
    }

    #[test]
    fn unknown_never_satisfies_a_goal() {
        let state = RegisterState::default();
        assert!(!state.satisfies(&[(Reg::Er0, Content::Unknown)]));
        assert!(state.satisfies(&[]));
    }

    #[test]
    fn regset_operations() {
        let set = RegSet::of(&[Reg::Er2, Reg::Er8]);
        assert!(set.contains(Reg::Er2));
        assert!(!set.contains(Reg::Er4));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Reg::Er2, Reg::Er8]);
        assert_eq!(
            set | Reg::Er4 | RegSet::of(&[Reg::Er0]),
            RegSet::of(&[Reg::Er0, Reg::Er2, Reg::Er4, Reg::Er8])
        );
        assert_eq!(RegSet::ALL.iter().count(), Reg::COUNT);
        assert_eq!(Reg::Er14.to_string(), "er14");
        assert!(RegSet::EMPTY.is_empty());
    }
}
