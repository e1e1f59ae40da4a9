//! Conditionals and loops.
//!
//! Loops allocate every label a body may exit through before invoking the
//! body, and hand them over in a [`LoopScope`]. The counter update of a
//! bounded `for` sits after the continue label, so it runs exactly once per
//! iteration whether the body falls through or continues.

use typeforge_bytecode::{Instruction, Label, Local};
use typeforge_core::TypeId;

use crate::Result;
use crate::emit::EmitError;

use super::body::BodyBuilder;

/// Labels and local handed to a loop body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopScope {
    /// Counter of a `for`, element of a `foreach`.
    pub var: Local,
    pub break_label: Label,
    pub continue_label: Label,
    region_depth: usize,
}

impl LoopScope {
    /// Exit the loop.
    pub fn brk(&self, b: &mut BodyBuilder<'_>) -> Result<()> {
        b.exit_to(self.break_label, self.region_depth)
    }

    /// Skip to the next iteration.
    pub fn cont(&self, b: &mut BodyBuilder<'_>) -> Result<()> {
        b.exit_to(self.continue_label, self.region_depth)
    }
}

/// Integer range of a bounded `for`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForRange {
    pub start: i32,
    pub end: i32,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
}

impl ForRange {
    /// `start..=end`
    pub fn inclusive(start: i32, end: i32) -> Self {
        Self {
            start,
            end,
            start_inclusive: true,
            end_inclusive: true,
        }
    }

    /// `start..end`
    pub fn exclusive(start: i32, end: i32) -> Self {
        Self {
            end_inclusive: false,
            ..Self::inclusive(start, end)
        }
    }

    /// First counter value.
    fn first(&self) -> Result<i32> {
        if self.start_inclusive {
            return Ok(self.start);
        }
        self.start
            .checked_add(1)
            .ok_or_else(|| EmitError::InvalidRange(format!("exclusive start {} overflows", self.start)))
    }

    fn validate(&self) -> Result<()> {
        // The counter is incremented past `end` before the exit test.
        if self.end_inclusive && self.end == i32::MAX {
            return Err(EmitError::InvalidRange(format!(
                "inclusive end {} overflows the counter",
                self.end
            )));
        }
        Ok(())
    }
}

impl BodyBuilder<'_> {
    pub fn branch(&mut self, label: Label) -> Result<()> {
        self.em.emit(Instruction::Br(label))
    }

    /// Exit protected regions towards `label`.
    pub fn leave(&mut self, label: Label) -> Result<()> {
        self.em.emit(Instruction::Leave(label))
    }

    pub fn break_loop(&mut self, scope: &LoopScope) -> Result<()> {
        scope.brk(self)
    }

    pub fn continue_loop(&mut self, scope: &LoopScope) -> Result<()> {
        scope.cont(self)
    }

    /// `br` within the loop's region, `leave` from a region nested in the body.
    pub(super) fn exit_to(&mut self, label: Label, region_depth: usize) -> Result<()> {
        if self.em.region_depth() == region_depth {
            self.branch(label)
        } else {
            self.leave(label)
        }
    }

    /// `if (cond) { then }`
    pub fn if_then(
        &mut self,
        cond: impl FnOnce(&mut Self) -> Result<()>,
        then: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let end = self.define_label();
        self.balanced("if condition", 1, cond)?;
        self.em.emit(Instruction::BrFalse(end))?;
        self.balanced("if body", 0, then)?;
        self.bind_label(end)
    }

    /// `if (cond) { then } else { otherwise }`. The arms may leave values on
    /// the stack, as long as both leave the same number.
    pub fn if_else(
        &mut self,
        cond: impl FnOnce(&mut Self) -> Result<()>,
        then: impl FnOnce(&mut Self) -> Result<()>,
        otherwise: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let else_label = self.define_label();
        let end = self.define_label();

        self.balanced("if condition", 1, cond)?;
        self.em.emit(Instruction::BrFalse(else_label))?;

        let base = self.em.depth() as i32;
        then(self)?;
        let then_delta = self.em.is_reachable().then(|| self.em.depth() as i32 - base);
        if then_delta.is_some() {
            self.branch(end)?;
        }

        self.bind_label(else_label)?;
        otherwise(self)?;
        if let (Some(expected), true) = (then_delta, self.em.is_reachable()) {
            let found = self.em.depth() as i32 - base;
            if found != expected {
                return Err(EmitError::UnbalancedBlock {
                    construct: "if-else",
                    expected,
                    found,
                });
            }
        }
        self.bind_label(end)
    }

    /// Bounded counting loop over `range`. The body receives the counter and
    /// must leave the stack unchanged.
    pub fn for_range(
        &mut self,
        range: ForRange,
        body: impl FnOnce(&mut Self, LoopScope) -> Result<()>,
    ) -> Result<()> {
        range.validate()?;
        let first = range.first()?;

        let counter = self.declare_local(TypeId::I32)?;
        self.emit(Instruction::LdI32(first))?;
        self.store_local(counter)?;

        let top = self.define_label();
        let cont = self.define_label();
        let end = self.define_label();

        self.bind_label(top)?;
        self.load_local(counter)?;
        self.emit(Instruction::LdI32(range.end))?;
        self.emit(if range.end_inclusive {
            Instruction::Bgt(end)
        } else {
            Instruction::Bge(end)
        })?;

        let scope = self.loop_scope(counter, end, cont);
        self.balanced("for body", 0, |b| body(b, scope))?;

        if self.step_reachable(cont)? {
            self.bind_label(cont)?;
            self.load_local(counter)?;
            self.emit(Instruction::LdI32(1))?;
            self.emit(Instruction::Add)?;
            self.store_local(counter)?;
            self.branch(top)?;
        }

        self.bind_label(end)
    }

    /// General `for (init; cond; step)` over a local of type `ty`.
    ///
    /// `init` pushes the initial value, `cond` pushes a bool, `step` updates
    /// the variable and leaves the stack unchanged.
    pub fn for_loop(
        &mut self,
        ty: TypeId,
        init: impl FnOnce(&mut Self) -> Result<()>,
        cond: impl FnOnce(&mut Self, Local) -> Result<()>,
        step: impl FnOnce(&mut Self, Local) -> Result<()>,
        body: impl FnOnce(&mut Self, LoopScope) -> Result<()>,
    ) -> Result<()> {
        let var = self.declare_local(ty)?;
        self.balanced("for init", 1, init)?;
        self.store_local(var)?;

        let top = self.define_label();
        let cont = self.define_label();
        let end = self.define_label();

        self.bind_label(top)?;
        self.balanced("for condition", 1, |b| cond(b, var))?;
        self.em.emit(Instruction::BrFalse(end))?;

        let scope = self.loop_scope(var, end, cont);
        self.balanced("for body", 0, |b| body(b, scope))?;

        if self.step_reachable(cont)? {
            self.bind_label(cont)?;
            self.balanced("for step", 0, |b| step(b, var))?;
            self.branch(top)?;
        }

        self.bind_label(end)
    }

    /// A body that never falls through and never continues leaves the step
    /// without predecessors, so it is not emitted.
    fn step_reachable(&self, cont: Label) -> Result<bool> {
        Ok(self.em.is_reachable() || self.em.is_referenced(cont)?)
    }

    /// Loop scope for a loop whose labels live at the current region depth.
    pub(super) fn loop_scope(&self, var: Local, break_label: Label, continue_label: Label) -> LoopScope {
        LoopScope {
            var,
            break_label,
            continue_label,
            region_depth: self.em.region_depth(),
        }
    }
}
