//! Flat assembler for one method body.

use tracing::{debug, trace};

use typeforge_bytecode::{
    ExceptionHandler, HandlerKind, Instruction, InstructionIR, Label, Local, MethodBody, SessionId,
    Target,
};
use typeforge_core::{MethodRef, TypeId};

use crate::Result;
use crate::config::EmitConfig;

use super::EmitError;

const TARGET: &str = "typeforge::emit";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Part {
    Try,
    Catch,
    Finally,
}

/// One entry of the region path: which part of which protected region
/// the current position is inside.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Scope {
    id: u32,
    part: Part,
}

#[derive(Debug)]
struct PendingBranch {
    leave: bool,
    from: Vec<Scope>,
}

#[derive(Debug, Default)]
struct LabelState {
    position: Option<u32>,
    /// Stack depth every path reaching the label must agree on.
    depth: Option<u32>,
    scope: Vec<Scope>,
    referenced: bool,
    /// Branches seen before the label was bound; checked at bind time.
    pending: Vec<PendingBranch>,
}

#[derive(Debug)]
struct OpenRegion {
    index: u32,
    end: Label,
    try_start: u32,
    try_end: Option<u32>,
    part: Part,
    handler_kind: HandlerKind,
    handler_start: u32,
    handlers: Vec<(HandlerKind, u32, u32)>,
}

/// Handle for an open protected region returned by `Emitter::begin_try`.
#[derive(Debug)]
#[must_use = "a protected region must be closed with `end_block`"]
pub struct Block {
    session: SessionId,
    index: u32,
    end: Label,
}

impl Block {
    /// Label bound right after the region; the target of `leave`.
    pub fn end_label(&self) -> Label {
        self.end
    }
}

/// Append-only instruction sink with labels, locals and protected regions.
///
/// Every emitted instruction is applied to a simulated evaluation stack.
/// Errors surface at the call that caused them, except unbound labels, which
/// can only be known once the stream is finished.
#[derive(Debug)]
pub struct Emitter {
    session: SessionId,
    config: EmitConfig,
    arg_count: u16,
    returns_value: bool,
    code: Vec<InstructionIR>,
    locals: Vec<TypeId>,
    labels: Vec<LabelState>,
    depth: u32,
    max_depth: u32,
    reachable: bool,
    regions: Vec<OpenRegion>,
    scope: Vec<Scope>,
    handlers: Vec<ExceptionHandler>,
    next_scope: u32,
    next_region: u32,
}

impl Emitter {
    /// Start a body taking `arg_count` arguments (including `this`).
    pub fn new(config: EmitConfig, arg_count: u16, returns_value: bool) -> Self {
        let session = SessionId::fresh();
        debug!(target: TARGET, ?session, arg_count, returns_value, "begin body");
        Self {
            session,
            config,
            arg_count,
            returns_value,
            code: Vec::new(),
            locals: Vec::new(),
            labels: Vec::new(),
            depth: 0,
            max_depth: 0,
            reachable: true,
            regions: Vec::new(),
            scope: Vec::new(),
            handlers: Vec::new(),
            next_scope: 0,
            next_region: 0,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Current simulated stack depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether the next instruction can be reached by falling through.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Number of open protected regions.
    pub fn region_depth(&self) -> usize {
        self.regions.len()
    }

    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    pub fn arg_count(&self) -> u16 {
        self.arg_count
    }

    pub fn instructions(&self) -> &[InstructionIR] {
        &self.code
    }

    pub fn declare_local(&mut self, ty: TypeId) -> Result<Local> {
        let index = u16::try_from(self.locals.len()).map_err(|_| EmitError::TooManyLocals)?;
        self.locals.push(ty);
        Ok(Local::new(self.session, index))
    }

    pub fn local_type(&self, local: Local) -> Result<TypeId> {
        self.check_local(local)?;
        Ok(self.locals[local.index()])
    }

    /// Create an unbound label.
    pub fn define_label(&mut self) -> Label {
        let label = Label::new(self.session, self.labels.len() as u32);
        self.labels.push(LabelState::default());
        label
    }

    /// Whether any branch emitted so far targets `label`.
    pub fn is_referenced(&self, label: Label) -> Result<bool> {
        let idx = self.check_label(label)?;
        Ok(self.labels[idx].referenced)
    }

    /// Fix `label` at the current position.
    pub fn bind_label(&mut self, label: Label) -> Result<()> {
        let idx = self.check_label(label)?;
        let state = &mut self.labels[idx];
        if state.position.is_some() {
            return Err(EmitError::LabelAlreadyBound(label));
        }

        if self.reachable {
            match state.depth {
                Some(expected) if expected != self.depth => {
                    return Err(EmitError::StackMismatch {
                        label,
                        expected,
                        found: self.depth,
                    });
                }
                _ => state.depth = Some(self.depth),
            }
        } else if let Some(depth) = state.depth {
            self.depth = depth;
        }

        state.position = Some(self.code.len() as u32);
        state.scope = self.scope.clone();
        for branch in std::mem::take(&mut state.pending) {
            check_scope(label, &state.scope, &branch.from, branch.leave)?;
        }

        self.reachable = true;
        trace!(target: TARGET, %label, at = self.code.len(), depth = self.depth, "bind");
        Ok(())
    }

    /// Append an instruction with a fixed stack effect.
    pub fn emit(&mut self, instr: InstructionIR) -> Result<()> {
        let (pops, pushes) = match &instr {
            Instruction::Ret => {
                if !self.regions.is_empty() {
                    return Err(EmitError::ReturnInsideRegion);
                }
                let expected = u32::from(self.returns_value);
                if self.reachable && self.depth != expected {
                    return Err(EmitError::InvalidReturn {
                        expected,
                        found: self.depth,
                    });
                }
                (expected, 0)
            }
            other => other
                .fixed_stack_effect()
                .ok_or(EmitError::SignatureRequired(other.mnemonic()))?,
        };

        self.validate_operands(&instr)?;
        self.append(instr, pops, pushes)
    }

    /// Append `call`, `callvirt` or `newobj` with the effect given by `method`.
    pub fn emit_call(&mut self, instr: InstructionIR, method: &MethodRef) -> Result<()> {
        let (pops, pushes) = match instr {
            Instruction::Call(id) | Instruction::CallVirt(id) if id == method.id => (
                u32::from(method.arity) + u32::from(!method.is_static),
                u32::from(method.returns_value()),
            ),
            Instruction::NewObj(id) if id == method.id => (u32::from(method.arity), 1),
            _ => return Err(EmitError::SignatureRequired(instr.mnemonic())),
        };
        self.append(instr, pops, pushes)
    }

    /// Open a protected region. The evaluation stack must be empty.
    pub fn begin_try(&mut self) -> Result<Block> {
        let depth = if self.reachable { self.depth } else { 0 };
        if depth != 0 {
            return Err(EmitError::NonEmptyStackAtRegion(depth));
        }

        let end = self.define_label();
        let index = self.next_region;
        self.next_region += 1;
        self.regions.push(OpenRegion {
            index,
            end,
            try_start: self.code.len() as u32,
            try_end: None,
            part: Part::Try,
            handler_kind: HandlerKind::Finally,
            handler_start: 0,
            handlers: Vec::new(),
        });
        self.enter_scope(Part::Try);

        debug!(target: TARGET, region = index, at = self.code.len(), "begin try");
        Ok(Block {
            session: self.session,
            index,
            end,
        })
    }

    /// Start a catch handler for exceptions assignable to `ty`.
    /// The handler is entered with the exception pushed.
    pub fn begin_catch(&mut self, block: &Block, ty: TypeId) -> Result<()> {
        let part = self.check_block(block)?;
        if part == Part::Finally {
            return Err(EmitError::HandlerOrder("catch after finally"));
        }

        self.close_part()?;
        self.open_handler(Part::Catch, HandlerKind::Catch(ty));
        self.depth = 1;
        self.max_depth = self.max_depth.max(1);
        debug!(target: TARGET, region = block.index, at = self.code.len(), "begin catch");
        Ok(())
    }

    /// Start the finally handler. A region holds either catch handlers or one
    /// finally handler; nest regions to get both.
    pub fn begin_finally(&mut self, block: &Block) -> Result<()> {
        match self.check_block(block)? {
            Part::Try => {}
            Part::Catch => return Err(EmitError::HandlerOrder("finally after catch")),
            Part::Finally => return Err(EmitError::HandlerOrder("second finally")),
        }

        self.close_part()?;
        self.open_handler(Part::Finally, HandlerKind::Finally);
        self.depth = 0;
        debug!(target: TARGET, region = block.index, at = self.code.len(), "begin finally");
        Ok(())
    }

    /// Close the region, record its handlers and bind its end label.
    pub fn end_block(&mut self, block: Block) -> Result<()> {
        if self.check_block(&block)? == Part::Try {
            return Err(EmitError::MissingHandler);
        }

        self.close_part()?;
        let Some(region) = self.regions.pop() else {
            return Err(EmitError::BlockNotInnermost);
        };
        let Some(try_end) = region.try_end else {
            return Err(EmitError::MissingHandler);
        };

        for (kind, handler_start, handler_end) in region.handlers {
            self.handlers.push(ExceptionHandler {
                kind,
                try_start: region.try_start,
                try_end,
                handler_start,
                handler_end,
            });
        }

        debug!(target: TARGET, region = region.index, at = self.code.len(), "end block");
        self.bind_label(region.end)
    }

    /// Resolve labels and produce the finished body.
    pub fn finish(mut self) -> Result<MethodBody> {
        if !self.regions.is_empty() {
            return Err(EmitError::UnclosedBlocks(self.regions.len()));
        }

        let unbound: Vec<Label> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, s)| s.referenced && s.position.is_none())
            .map(|(i, _)| Label::new(self.session, i as u32))
            .collect();
        if !unbound.is_empty() {
            return Err(EmitError::UnboundLabels(unbound));
        }

        if self.reachable {
            if self.returns_value || !self.config.implicit_return {
                return Err(EmitError::MissingTerminator);
            }
            self.emit(Instruction::Ret)?;
        }

        let Self {
            code,
            labels,
            locals,
            handlers,
            max_depth,
            ..
        } = self;

        let instructions = code
            .into_iter()
            .map(|instr| {
                instr.try_map_target(|label| {
                    labels[label.index()]
                        .position
                        .map(Target::new)
                        .ok_or_else(|| EmitError::UnboundLabels(vec![label]))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            target: TARGET,
            instructions = instructions.len(),
            handlers = handlers.len(),
            max_stack = max_depth,
            "finish body"
        );
        Ok(MethodBody {
            instructions,
            locals,
            handlers,
            max_stack: max_depth,
        })
    }

    fn append(&mut self, instr: InstructionIR, pops: u32, pushes: u32) -> Result<()> {
        if self.depth < pops {
            return Err(EmitError::StackUnderflow {
                instr: instr.mnemonic(),
                needed: pops,
                found: self.depth,
            });
        }
        let after_pop = self.depth - pops;

        if let Some(label) = instr.target() {
            let leave = matches!(instr, Instruction::Leave(_));
            let at_target = if leave { 0 } else { after_pop };
            self.reference(label, at_target, leave)?;
        }

        let depth = after_pop + pushes;
        if depth > self.config.max_stack {
            return Err(EmitError::StackTooDeep(self.config.max_stack));
        }
        self.depth = depth;
        self.max_depth = self.max_depth.max(depth);

        trace!(target: TARGET, at = self.code.len(), instr = instr.mnemonic(), depth, "emit");
        let terminator = instr.is_terminator();
        let clears_stack = matches!(
            instr,
            Instruction::Leave(_) | Instruction::EndFinally | Instruction::Rethrow
        );
        self.code.push(instr);

        // Dead code after `br`, `throw` or `ret` keeps the depth the jump left,
        // so a label bound there with no incoming branch resumes at it.
        if terminator {
            self.reachable = false;
            if clears_stack {
                self.depth = 0;
            }
        }
        Ok(())
    }

    fn reference(&mut self, label: Label, depth: u32, leave: bool) -> Result<()> {
        let idx = self.check_label(label)?;
        let from = self.scope.clone();
        let state = &mut self.labels[idx];
        state.referenced = true;

        match state.depth {
            Some(expected) if expected != depth => {
                return Err(EmitError::StackMismatch {
                    label,
                    expected,
                    found: depth,
                });
            }
            Some(_) => {}
            None => state.depth = Some(depth),
        }

        if state.position.is_some() {
            check_scope(label, &state.scope, &from, leave)
        } else {
            state.pending.push(PendingBranch { leave, from });
            Ok(())
        }
    }

    fn validate_operands(&self, instr: &InstructionIR) -> Result<()> {
        match instr {
            Instruction::LdLoc(local) | Instruction::StLoc(local) => self.check_local(*local),
            Instruction::LdArg(index) | Instruction::StArg(index) if *index >= self.arg_count => {
                Err(EmitError::ArgumentOutOfRange {
                    index: *index,
                    count: self.arg_count,
                })
            }
            Instruction::Rethrow if !self.scope.iter().any(|s| s.part == Part::Catch) => {
                Err(EmitError::RethrowOutsideCatch)
            }
            Instruction::EndFinally
                if self.scope.last().map(|s| s.part) != Some(Part::Finally) =>
            {
                Err(EmitError::EndFinallyOutsideFinally)
            }
            _ => Ok(()),
        }
    }

    fn check_label(&self, label: Label) -> Result<usize> {
        if label.session() != self.session || label.index() >= self.labels.len() {
            return Err(EmitError::ForeignHandle("label"));
        }
        Ok(label.index())
    }

    fn check_local(&self, local: Local) -> Result<()> {
        if local.session() != self.session || local.index() >= self.locals.len() {
            return Err(EmitError::ForeignHandle("local"));
        }
        Ok(())
    }

    fn check_block(&self, block: &Block) -> Result<Part> {
        if block.session != self.session {
            return Err(EmitError::ForeignHandle("block"));
        }
        match self.regions.last() {
            Some(region) if region.index == block.index => Ok(region.part),
            _ => Err(EmitError::BlockNotInnermost),
        }
    }

    fn enter_scope(&mut self, part: Part) {
        self.scope.push(Scope {
            id: self.next_scope,
            part,
        });
        self.next_scope += 1;
    }

    /// Terminate the current part of the innermost region and record its extent.
    fn close_part(&mut self) -> Result<()> {
        let Some(region) = self.regions.last() else {
            return Err(EmitError::BlockNotInnermost);
        };
        let (part, end) = (region.part, region.end);

        if self.reachable {
            if self.depth != 0 {
                return Err(EmitError::NonEmptyStackAtRegion(self.depth));
            }
            match part {
                Part::Try | Part::Catch => self.emit(Instruction::Leave(end))?,
                Part::Finally => self.emit(Instruction::EndFinally)?,
            }
        }

        let pos = self.code.len() as u32;
        if let Some(region) = self.regions.last_mut() {
            match part {
                Part::Try => region.try_end = Some(pos),
                Part::Catch | Part::Finally => {
                    region
                        .handlers
                        .push((region.handler_kind, region.handler_start, pos))
                }
            }
        }
        self.scope.pop();
        Ok(())
    }

    fn open_handler(&mut self, part: Part, kind: HandlerKind) {
        let pos = self.code.len() as u32;
        if let Some(region) = self.regions.last_mut() {
            region.part = part;
            region.handler_kind = kind;
            region.handler_start = pos;
        }
        self.enter_scope(part);
        self.reachable = true;
    }
}

/// `br` must stay within one region part; `leave` may only go outward and
/// never out of a finally handler.
fn check_scope(label: Label, target: &[Scope], from: &[Scope], leave: bool) -> Result<()> {
    if leave {
        if !from.starts_with(target) {
            return Err(EmitError::LeaveIntoRegion(label));
        }
        if from[target.len()..].iter().any(|s| s.part == Part::Finally) {
            return Err(EmitError::LeaveOutOfFinally(label));
        }
        return Ok(());
    }
    if from == target {
        Ok(())
    } else {
        Err(EmitError::BranchOutOfRegion(label))
    }
}
