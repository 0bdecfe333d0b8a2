//! Realization of statements as gadget chains.
//!
//! Every rule takes a [`Fragment`] (the register knowledge so far plus the
//! entries emitted so far) and returns the extended fragment. Expressions
//! always leave their value in [`ACC`]. Nothing survives a statement
//! boundary: each statement starts from an empty fragment.
//!
//! Beyond the accumulator no register role is fixed. Loads, stores and
//! arithmetic come from whatever the catalog has, in table order, and
//! [`ChainBuilder::place`] searches the catalog's moves and pops to set up
//! each gadget's operands. Every placement is checked against the tracked
//! [`RegisterState`]. A choice that runs into a dead end gives way to the
//! next one, and generation only fails once all of them have.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, trace};

use crate::compiler::{
    Word,
    ast::{BinOp, Expression, Program, Statement, StatementKind},
    catalog::GadgetCatalog,
    error::CompileError,
    gadgets::{ArithOp, Effect, GadgetId, GadgetSpec},
    payload::{Entry, Payload},
    registers::{Content, Reg, RegSet, RegisterState},
    symbols::SymbolTable,
    target::TargetProfile,
};

/// Where every expression leaves its value.
pub const ACC: Reg = Reg::Er0;
/// Multiplies by the 16 character cells of a display line.
const SHIFT_LINE: GadgetId = GadgetId::SllEr0By4;
const TRAP: GadgetId = GadgetId::Break;

/// Longest gadget sequence [`ChainBuilder::place`] will consider.
const MAX_STEPS: usize = 6;

type Goal = (Reg, Content);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub state: RegisterState,
    pub entries: Vec<Entry>,
}

/// A value set aside while another expression is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Held {
    /// A literal, popped again where it is needed.
    Constant(Word),
    Register { reg: Reg, value: Content },
    Spilled { slot: Word, value: Content },
}

impl Held {
    fn value(self) -> Content {
        match self {
            Held::Constant(word) => Content::Const(word),
            Held::Register { value, .. } | Held::Spilled { value, .. } => value,
        }
    }

    /// Live registers and the next free scratch slot while this is held.
    fn scope(self, live: &[Goal], scratch: usize) -> (Vec<Goal>, usize) {
        match self {
            Held::Constant(_) => (live.to_vec(), scratch),
            Held::Register { reg, value } => (with(live, &[(reg, value)]), scratch),
            Held::Spilled { .. } => (live.to_vec(), scratch + 1),
        }
    }
}

/// Ways to set a value aside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldAt {
    Constant(Word),
    Register(Reg),
    Spill,
}

/// Every way to hold `value`, in the order they are tried: re-popping a
/// literal, then registers starting with `prefer`, then scratch RAM.
fn hold_options(value: Content, avoid: RegSet, prefer: Reg, live: &[Goal]) -> Vec<HoldAt> {
    let mut options = Vec::new();
    if let Content::Const(word) = value {
        options.push(HoldAt::Constant(word));
    }
    let taken = avoid | regs_of(live) | ACC;
    for reg in std::iter::once(prefer).chain(Reg::ALL) {
        if !taken.contains(reg) && !options.contains(&HoldAt::Register(reg)) {
            options.push(HoldAt::Register(reg));
        }
    }
    options.push(HoldAt::Spill);
    options
}

/// One gadget [`ChainBuilder::place`] may emit, with the words it pops.
#[derive(Debug, Clone)]
struct Step {
    id: GadgetId,
    operands: Vec<Word>,
}

fn with(live: &[Goal], extra: &[Goal]) -> Vec<Goal> {
    live.iter().chain(extra).copied().collect()
}

fn regs_of(goals: &[Goal]) -> RegSet {
    goals.iter().fold(RegSet::EMPTY, |set, &(reg, _)| set | reg)
}

fn describe(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(|(reg, content)| format!("{reg} = {content}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn arith_op(op: BinOp) -> Result<ArithOp, CompileError> {
    match op {
        BinOp::Add => Ok(ArithOp::Add),
        BinOp::Sub => Ok(ArithOp::Sub),
        BinOp::Mul | BinOp::Div => Err(CompileError::UnsupportedNode {
            kind: format!("binary `{op}`"),
            span: None,
        }),
    }
}

pub struct ChainBuilder<'c> {
    catalog: &'c GadgetCatalog,
    symbols: &'c SymbolTable,
    profile: &'c TargetProfile,
    /// Registers written by a subexpression, keyed by its source form.
    clobbers: HashMap<String, RegSet>,
}

impl<'c> ChainBuilder<'c> {
    pub fn new(
        catalog: &'c GadgetCatalog,
        symbols: &'c SymbolTable,
        profile: &'c TargetProfile,
    ) -> Self {
        Self {
            catalog,
            symbols,
            profile,
            clobbers: HashMap::new(),
        }
    }

    /// Realize every statement in order and terminate the chain with the trap.
    pub fn build(&mut self, program: &Program<'_>) -> Result<Payload, CompileError> {
        let mut entries = Vec::new();
        for stmt in &program.statements {
            let frag = self.statement(stmt).map_err(|e| e.at(stmt.span))?;
            debug!(kind = stmt.kind.name(), statement = %stmt, words = frag.entries.len(), "generated");
            entries.extend(frag.entries);
        }

        let address = self.catalog.resolve(TRAP)?;
        entries.push(Entry::Gadget {
            identity: TRAP,
            address,
        });

        info!("built chain of {} words", entries.len());
        Ok(Payload::new(entries))
    }

    pub fn statement(&mut self, stmt: &Statement<'_>) -> Result<Fragment, CompileError> {
        let frag = Fragment::default();
        match &stmt.kind {
            StatementKind::Declare(name) => {
                self.symbols.resolve(name)?;
                Ok(frag)
            }
            StatementKind::Assign { target, value } => {
                let frag = self.realize(frag, value, &[], 0)?;
                let address = self.symbols.resolve(target)?;
                let value = frag.state.get(ACC);
                self.store(frag, Content::Const(address), value, &[])
            }
            StatementKind::MemoryWrite { address, value } => {
                let frag = self.realize(frag, value, &[], 0)?;
                let stores = self.candidates(GadgetSpec::store)?;
                self.first_viable(&stores, |this, (id, (addr_reg, value_reg))| {
                    let frag = this.pair(frag.clone(), address, value_reg, addr_reg, &[], 0)?;
                    this.gadget(frag, id, &[])
                })
            }
            StatementKind::PrintChar { line, column, code } => {
                // vram_base + (line - 1) * 16 + column
                let frag = self.realize(frag, line, &[], 0)?;
                let frag = self.apply_binary(frag, ArithOp::Sub, &Expression::Literal(1), &[], 0)?;
                let frag = self.gadget(frag, SHIFT_LINE, &[])?;
                let frag = self.apply_binary(frag, ArithOp::Add, column, &[], 0)?;
                let base = Expression::Literal(self.profile.vram_base);
                let frag = self.apply_binary(frag, ArithOp::Add, &base, &[], 0)?;
                let stores = self.candidates(GadgetSpec::store)?;
                self.first_viable(&stores, |this, (id, (addr_reg, value_reg))| {
                    let frag = this.pair(frag.clone(), code, addr_reg, value_reg, &[], 0)?;
                    this.gadget(frag, id, &[])
                })
            }
        }
    }

    /// Realize `expr` into [`ACC`] starting from `frag`.
    pub fn expression(
        &mut self,
        frag: Fragment,
        expr: &Expression<'_>,
    ) -> Result<Fragment, CompileError> {
        self.realize(frag, expr, &[], 0)
    }

    /// `live` values must stay where they are; `scratch` is the first free
    /// scratch slot.
    fn realize(
        &mut self,
        frag: Fragment,
        expr: &Expression<'_>,
        live: &[Goal],
        scratch: usize,
    ) -> Result<Fragment, CompileError> {
        match expr {
            Expression::Literal(value) => {
                self.place(frag, &with(live, &[(ACC, Content::Const(*value))]))
            }
            Expression::Variable(name) => {
                let address = self.symbols.resolve(name)?;
                self.load(frag, Content::Const(address), live)
            }
            Expression::MemoryRef(address) => {
                let frag = self.realize(frag, address, live, scratch)?;
                let pointer = frag.state.get(ACC);
                self.load(frag, pointer, live)
            }
            Expression::Binary(bin) => {
                let op = arith_op(bin.op)?;
                let frag = self.realize(frag, &bin.lhs, live, scratch)?;
                self.apply_binary(frag, op, &bin.rhs, live, scratch)
            }
        }
    }

    /// `ACC = ACC <op> rhs` through the first arithmetic gadget for `op`
    /// that can be set up.
    fn apply_binary(
        &mut self,
        frag: Fragment,
        op: ArithOp,
        rhs: &Expression<'_>,
        live: &[Goal],
        scratch: usize,
    ) -> Result<Fragment, CompileError> {
        let gadgets = self.candidates(|spec| spec.arith().filter(|&(found, ..)| found == op))?;
        self.first_viable(&gadgets, |this, (id, (_, lhs, rhs_reg, dst))| {
            let frag = this.pair(frag.clone(), rhs, lhs, rhs_reg, live, scratch)?;
            let frag = this.gadget(frag, id, &[])?;
            let result = frag.state.get(dst);
            this.place(frag, &with(live, &[(ACC, result)]))
        })
    }

    /// Hold the value in [`ACC`], realize `second`, then put the held value
    /// in `held_to` and `second` in `acc_to`.
    fn pair(
        &mut self,
        frag: Fragment,
        second: &Expression<'_>,
        held_to: Reg,
        acc_to: Reg,
        live: &[Goal],
        scratch: usize,
    ) -> Result<Fragment, CompileError> {
        let avoid = self.clobbers(second)?;
        self.holding(frag, avoid, held_to, live, scratch, |this, frag, held| {
            let (inner, next) = held.scope(live, scratch);
            let frag = this.realize(frag, second, &inner, next)?;
            this.align(frag, held, held_to, acc_to, live, next)
        })
    }

    /// Set the [`ACC`] value aside and continue with `then`. A register the
    /// value cannot be brought back from is a dead end like any other, so
    /// the next register gets its turn before anything is spilled.
    fn holding(
        &mut self,
        frag: Fragment,
        avoid: RegSet,
        prefer: Reg,
        live: &[Goal],
        scratch: usize,
        mut then: impl FnMut(&mut Self, Fragment, Held) -> Result<Fragment, CompileError>,
    ) -> Result<Fragment, CompileError> {
        let options = hold_options(frag.state.get(ACC), avoid, prefer, live);
        self.first_viable(&options, |this, at| {
            let (frag, held) = this.hold(frag.clone(), at, live, scratch)?;
            then(this, frag, held)
        })
    }

    fn hold(
        &mut self,
        frag: Fragment,
        at: HoldAt,
        live: &[Goal],
        scratch: usize,
    ) -> Result<(Fragment, Held), CompileError> {
        let value = frag.state.get(ACC);
        match at {
            HoldAt::Constant(word) => Ok((frag, Held::Constant(word))),
            HoldAt::Register(reg) => {
                let frag = self.place(frag, &with(live, &[(reg, value)]))?;
                Ok((frag, Held::Register { reg, value }))
            }
            HoldAt::Spill => {
                let slot = self.profile.scratch_slot(scratch)?;
                debug!("spilling {value} to {slot:#06x}");
                let frag = self.store(frag, Content::Const(slot), value, live)?;
                Ok((frag, Held::Spilled { slot, value }))
            }
        }
    }

    /// Bring a held value back into [`ACC`] while `keep` stays in place.
    fn restore(&mut self, frag: Fragment, held: Held, keep: &[Goal]) -> Result<Fragment, CompileError> {
        match held {
            Held::Spilled { slot, value } => {
                let mut frag = self.load(frag, Content::Const(slot), keep)?;
                frag.state.set(ACC, value);
                Ok(frag)
            }
            Held::Constant(_) | Held::Register { .. } => {
                self.place(frag, &with(keep, &[(ACC, held.value())]))
            }
        }
    }

    /// Put `held` in `held_to` and the current [`ACC`] value in `acc_to`.
    fn align(
        &mut self,
        frag: Fragment,
        held: Held,
        held_to: Reg,
        acc_to: Reg,
        live: &[Goal],
        scratch: usize,
    ) -> Result<Fragment, CompileError> {
        let goals = with(live, &[(held_to, held.value()), (acc_to, frag.state.get(ACC))]);
        if !matches!(held, Held::Spilled { .. }) {
            return self.place(frag, &goals);
        }

        // Reloads land in the accumulator, so its value steps aside first.
        self.holding(frag, RegSet::EMPTY, acc_to, live, scratch, |this, frag, current| {
            let (keep, next) = current.scope(live, scratch);
            let frag = this.restore(frag, held, &keep)?;
            if !matches!(current, Held::Spilled { .. }) {
                return this.place(frag, &goals);
            }
            this.holding(frag, RegSet::EMPTY, held_to, live, next, |this, frag, reloaded| {
                let (keep, _) = reloaded.scope(live, next);
                let frag = this.restore(frag, current, &keep)?;
                this.place(frag, &goals)
            })
        })
    }

    /// `ACC = [pointer]` through the first load gadget that can be set up
    /// while `live` stays in place.
    fn load(
        &mut self,
        frag: Fragment,
        pointer: Content,
        live: &[Goal],
    ) -> Result<Fragment, CompileError> {
        let loads = self.candidates(GadgetSpec::load)?;
        self.first_viable(&loads, |this, (id, (dst, addr))| {
            let frag = this.place(frag.clone(), &with(live, &[(addr, pointer)]))?;
            let frag = this.gadget(frag, id, &[])?;
            let loaded = frag.state.get(dst);
            this.place(frag, &with(live, &[(ACC, loaded)]))
        })
    }

    /// `[address] = value` through the first store gadget that can be set
    /// up while `live` stays in place.
    fn store(
        &mut self,
        frag: Fragment,
        address: Content,
        value: Content,
        live: &[Goal],
    ) -> Result<Fragment, CompileError> {
        let stores = self.candidates(GadgetSpec::store)?;
        self.first_viable(&stores, |this, (id, (addr_reg, value_reg))| {
            let goals = with(live, &[(addr_reg, address), (value_reg, value)]);
            let frag = this.place(frag.clone(), &goals)?;
            let frag = this.gadget(frag, id, &[])?;
            this.place(frag, live)
        })
    }

    /// Try `options` in order and keep the first that works out. Dead ends
    /// move on to the next option; any other error stops generation.
    fn first_viable<T: Copy>(
        &mut self,
        options: &[T],
        mut attempt: impl FnMut(&mut Self, T) -> Result<Fragment, CompileError>,
    ) -> Result<Fragment, CompileError> {
        let mut last = None;
        for &option in options {
            match attempt(self, option) {
                Ok(frag) => return Ok(frag),
                Err(e) if e.is_dead_end() => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| CompileError::NoPlacement {
            goal: "anything".into(),
            span: None,
        }))
    }

    /// Catalog gadgets `roles` recognizes, in table order. With none in the
    /// catalog, the first such identity in the table is reported missing.
    fn candidates<R>(
        &self,
        roles: impl Fn(&GadgetSpec) -> Option<R>,
    ) -> Result<Vec<(GadgetId, R)>, CompileError> {
        let found: Vec<_> = self
            .catalog
            .iter()
            .filter_map(|(id, _)| roles(id.spec()).map(|role| (id, role)))
            .collect();
        if found.is_empty() {
            let identity = GadgetId::all()
                .find(|id| roles(id.spec()).is_some())
                .unwrap_or(TRAP);
            return Err(CompileError::GadgetNotFound {
                identity,
                span: None,
            });
        }
        Ok(found)
    }

    /// Emit `id` with its pops fed from `operands` (filler for the rest).
    fn gadget(
        &self,
        mut frag: Fragment,
        id: GadgetId,
        operands: &[Word],
    ) -> Result<Fragment, CompileError> {
        let address = self.catalog.resolve(id)?;
        let spec = id.spec();

        frag.entries.push(Entry::Gadget {
            identity: id,
            address,
        });
        for index in 0..spec.pops() {
            frag.entries.push(match operands.get(index) {
                Some(&value) => Entry::Operand { value },
                None => Entry::Filler,
            });
        }
        frag.state.apply(spec, operands);
        Ok(frag)
    }

    /// What [`ChainBuilder::place`] may emit towards `goals`: every catalog
    /// move, and each distinct pop gadget loaded with every constant the
    /// goals name. A popped register that is itself a goal always gets its
    /// own constant.
    fn steps(&self, goals: &[Goal]) -> Vec<Step> {
        let mut constants = Vec::new();
        for &(_, content) in goals {
            if let Content::Const(word) = content {
                if !constants.contains(&word) {
                    constants.push(word);
                }
            }
        }
        let wanted = |reg: Reg| {
            goals.iter().find_map(|&(goal, content)| match content {
                Content::Const(word) if goal == reg => Some(word),
                _ => None,
            })
        };

        let mut steps = Vec::new();
        let mut shapes: Vec<&[Effect]> = Vec::new();
        for (id, _) in self.catalog.iter() {
            let spec = id.spec();
            if spec.is_move() {
                steps.push(Step {
                    id,
                    operands: Vec::new(),
                });
            } else if spec.is_pop() && !shapes.contains(&spec.effects) {
                shapes.push(spec.effects);
                for &fill in &constants {
                    let operands = spec
                        .effects
                        .iter()
                        .filter_map(|effect| match *effect {
                            Effect::Pop(reg) => Some(wanted(reg).unwrap_or(fill)),
                            _ => None,
                        })
                        .collect();
                    steps.push(Step { id, operands });
                }
            }
        }
        steps
    }

    /// Shortest sequence of catalog moves and pops after which every goal
    /// holds.
    ///
    /// Breadth-first over register contents, trying steps in table order, so
    /// the same state and goals always give the same gadgets.
    fn place(&self, frag: Fragment, goals: &[Goal]) -> Result<Fragment, CompileError> {
        if frag.state.satisfies(goals) {
            return Ok(frag);
        }
        let no_placement = || CompileError::NoPlacement {
            goal: describe(goals),
            span: None,
        };
        let conflicting = goals.iter().any(|&(reg, content)| {
            goals
                .iter()
                .any(|&(other, wanted)| other == reg && wanted != content)
        });
        if conflicting {
            return Err(no_placement());
        }

        let steps = self.steps(goals);
        let copies = steps
            .iter()
            .fold(RegSet::EMPTY, |set, step| set | step.id.spec().copies_into());
        let pops = steps
            .iter()
            .filter(|step| step.id.spec().is_pop())
            .fold(RegSet::EMPTY, |set, step| set | step.id.spec().writes());
        let current = frag.state.contents();
        let reachable = |&(reg, content): &Goal| match content {
            Content::Unknown => false,
            _ if frag.state.get(reg) == content => true,
            Content::Const(_) => copies.contains(reg) || pops.contains(reg),
            Content::Value(_) => copies.contains(reg) && current.contains(&content),
        };
        if !goals.iter().all(reachable) {
            return Err(no_placement());
        }

        let wanted: Vec<Content> = goals.iter().map(|&(_, content)| content).collect();
        // Contents no goal asks for cannot help, so they all count as garbage.
        let key = |state: &RegisterState| {
            state.contents().map(|content| {
                if wanted.contains(&content) {
                    content
                } else {
                    Content::Unknown
                }
            })
        };

        let mut visited = HashSet::from([key(&frag.state)]);
        let mut queue = VecDeque::from([(frag.state.clone(), Vec::new())]);

        while let Some((state, path)) = queue.pop_front() {
            if path.len() == MAX_STEPS {
                continue;
            }
            for (index, step) in steps.iter().enumerate() {
                let mut next = state.clone();
                next.apply(step.id.spec(), &step.operands);
                if !visited.insert(key(&next)) {
                    continue;
                }

                let mut next_path: Vec<usize> = path.clone();
                next_path.push(index);
                if next.satisfies(goals) {
                    trace!("placed {} in {} step(s)", describe(goals), next_path.len());
                    return next_path.into_iter().try_fold(frag, |frag, index| {
                        let step = &steps[index];
                        self.gadget(frag, step.id, &step.operands)
                    });
                }
                queue.push_back((next, next_path));
            }
        }

        Err(no_placement())
    }

    /// Registers realizing `expr` writes, from a dry run on an empty state.
    fn clobbers(&mut self, expr: &Expression<'_>) -> Result<RegSet, CompileError> {
        let key = expr.to_string();
        if let Some(&written) = self.clobbers.get(&key) {
            return Ok(written);
        }

        let written = self.realize(Fragment::default(), expr, &[], 0)?.state.written();
        self.clobbers.insert(key, written);
        Ok(written)
    }
}
