//! Interpreter for finalized method bodies.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use typeforge_bytecode::{HandlerKind, Instruction, MethodBody, Module};
use typeforge_core::{FieldId, MethodId, PropertyId, TypeId, TypeKind, TypeSystem};

use super::error::RuntimeError;
use super::frame::{Continuation, Frame, Pending};
use super::trace::{NoopTracer, Tracer};
use super::value::{ObjRef, Value};

/// Runtime limits for execution.
#[derive(Clone, Copy, Debug)]
pub struct FuelLimits {
    /// Maximum instructions per top-level call (default: 1,000,000).
    pub(crate) exec_fuel: u32,
    /// Maximum call depth (default: 1,024).
    pub(crate) recursion_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            recursion_limit: 1024,
        }
    }
}

impl FuelLimits {
    /// Create new fuel limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn get_exec_fuel(&self) -> u32 {
        self.exec_fuel
    }
    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

/// Host implementation of a method. Receives the arguments, `this` first
/// for instance methods, and returns the result for non-void methods.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Option<Value>, RuntimeError>>;

/// Why a frame stopped early.
enum Abort {
    /// A managed exception, catchable by handlers further out.
    Throw(ObjRef),
    Fault(RuntimeError),
}

impl From<RuntimeError> for Abort {
    fn from(e: RuntimeError) -> Self {
        Abort::Fault(e)
    }
}

type Exec<T> = Result<T, Abort>;

enum Step {
    Next,
    Jump(usize),
    Return(Option<Value>),
}

#[derive(Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
        }
    }
}

/// Virtual machine over one module.
///
/// Each method invocation runs in its own [`Frame`]; calls recurse on the
/// host stack up to the configured recursion limit. Exceptions unwind frame
/// by frame: within a frame the handler table is searched innermost first,
/// and finally handlers entered by `leave` or by unwinding record where
/// control continues once `endfinally` is reached.
pub struct Vm<'m> {
    types: &'m dyn TypeSystem,
    module: &'m Module,
    natives: IndexMap<MethodId, NativeFn>,
    statics: IndexMap<FieldId, Value>,
    limits: FuelLimits,
    exec_fuel: u32,
    depth: u32,
}

impl<'m> Vm<'m> {
    /// Create a VM. `Object` and the built-in exception types get native
    /// constructors; `Object::Equals` and `Exception::get_Message` are native.
    pub fn new(types: &'m dyn TypeSystem, module: &'m Module, limits: FuelLimits) -> Self {
        let mut vm = Self {
            types,
            module,
            natives: IndexMap::new(),
            statics: IndexMap::new(),
            limits,
            exec_fuel: limits.exec_fuel,
            depth: 0,
        };
        vm.register_builtins();
        vm
    }

    fn register_builtins(&mut self) {
        let types = self.types;

        if let Ok(ctor) = types.resolve_constructor(TypeId::OBJECT, &[]) {
            self.register_native(ctor.id, |_| Ok(None));
        }
        if let Ok(equals) = types.resolve_method(TypeId::OBJECT, "Equals", &[TypeId::OBJECT, TypeId::OBJECT]) {
            self.register_native(equals.id, |args| Ok(Some(Value::Bool(args[0].equals(&args[1])))));
        }

        let Ok(message) = types.resolve_field(TypeId::EXCEPTION, "_message") else {
            return;
        };
        let message = message.id;
        for ty in [TypeId::EXCEPTION, TypeId::INVALID_OPERATION, TypeId::ARGUMENT] {
            if let Ok(ctor) = types.resolve_constructor(ty, &[]) {
                self.register_native(ctor.id, |_| Ok(None));
            }
            if let Ok(ctor) = types.resolve_constructor(ty, &[TypeId::STR]) {
                self.register_native(ctor.id, move |args| {
                    if let Some(exc) = args[0].instance() {
                        exc.set(message, args[1].clone());
                    }
                    Ok(None)
                });
            }
        }
        if let Ok(get) = types.resolve_method(TypeId::EXCEPTION, "get_Message", &[]) {
            self.register_native(get.id, move |args| {
                let value = args[0].instance().and_then(|exc| exc.get(message));
                Ok(Some(value.unwrap_or_default()))
            });
        }
    }

    /// Implement `method` in the host. Replaces any body in the module.
    pub fn register_native(
        &mut self,
        method: MethodId,
        f: impl Fn(&[Value]) -> Result<Option<Value>, RuntimeError> + 'static,
    ) {
        self.natives.insert(method, Rc::new(f));
    }

    /// Invoke `method`. Virtual methods dispatch on the runtime type of `this`.
    pub fn invoke(&mut self, method: MethodId, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        self.invoke_with(method, args, &mut NoopTracer)
    }

    /// Invoke `method` with a tracer.
    pub fn invoke_with<T: Tracer>(
        &mut self,
        method: MethodId,
        args: Vec<Value>,
        tracer: &mut T,
    ) -> Result<Option<Value>, RuntimeError> {
        self.refuel();
        let target = match args.first() {
            Some(receiver) if !self.types.method(method).is_static => self.dispatch(method, receiver),
            _ => method,
        };
        self.call(target, args, tracer).map_err(|abort| self.surface(abort))
    }

    /// Allocate an instance and run constructor `ctor` on it.
    pub fn construct(&mut self, ctor: MethodId, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.refuel();
        self.new_object(ctor, args, &mut NoopTracer)
            .map_err(|abort| self.surface(abort))
    }

    pub fn get_property(&mut self, target: &Value, property: PropertyId) -> Result<Value, RuntimeError> {
        let types = self.types;
        let def = types.property(property);
        let getter = def.getter.ok_or_else(|| {
            RuntimeError::InvalidProgram(format!("property `{}` has no getter", types.name(def.name)))
        })?;
        let args = if def.is_static { Vec::new() } else { vec![target.clone()] };
        Ok(self.invoke(getter, args)?.unwrap_or_default())
    }

    pub fn set_property(&mut self, target: &Value, property: PropertyId, value: Value) -> Result<(), RuntimeError> {
        let types = self.types;
        let def = types.property(property);
        let setter = def.setter.ok_or_else(|| {
            RuntimeError::InvalidProgram(format!("property `{}` has no setter", types.name(def.name)))
        })?;
        let args = if def.is_static {
            vec![value]
        } else {
            vec![target.clone(), value]
        };
        self.invoke(setter, args)?;
        Ok(())
    }

    /// Current value of a static field.
    pub fn static_field(&self, field: FieldId) -> Value {
        match self.statics.get(&field) {
            Some(v) => v.clone(),
            None => Value::default_of(self.types, self.types.field(field).ty),
        }
    }

    pub fn set_static_field(&mut self, field: FieldId, value: Value) {
        self.statics.insert(field, value);
    }

    fn refuel(&mut self) {
        self.exec_fuel = self.limits.exec_fuel;
        self.depth = 0;
    }

    fn surface(&self, abort: Abort) -> RuntimeError {
        match abort {
            Abort::Fault(e) => e,
            Abort::Throw(exc) => {
                let message = self
                    .types
                    .resolve_field(TypeId::EXCEPTION, "_message")
                    .ok()
                    .and_then(|f| exc.get(f.id));
                RuntimeError::Unhandled {
                    ty: self.types.type_name(exc.ty()).to_owned(),
                    message: match message {
                        Some(Value::Str(s)) => Some(s.to_string()),
                        _ => None,
                    },
                }
            }
        }
    }

    fn method_name(&self, method: MethodId) -> String {
        let def = self.types.method(method);
        format!("{}::{}", self.types.type_name(def.declaring), self.types.name(def.name))
    }

    /// Most derived override of `method` for the runtime type of `receiver`.
    fn dispatch(&self, method: MethodId, receiver: &Value) -> MethodId {
        match receiver.type_id() {
            Some(runtime) if self.types.method(method).is_virtual => self.types.resolve_virtual(runtime, method),
            _ => method,
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call<T: Tracer>(&mut self, method: MethodId, args: Vec<Value>, tracer: &mut T) -> Exec<Option<Value>> {
        let types = self.types;
        let module = self.module;
        let def = types.method(method);

        let expected = def.params.len() + usize::from(!def.is_static);
        if args.len() != expected {
            return Err(RuntimeError::ArgumentCount {
                method: self.method_name(method),
                expected,
                found: args.len(),
            }
            .into());
        }
        if self.depth >= self.limits.recursion_limit {
            return Err(RuntimeError::RecursionLimitExceeded(self.limits.recursion_limit).into());
        }

        self.depth += 1;
        tracer.trace_call(method);
        let result = if let Some(native) = self.natives.get(&method).cloned() {
            native(args.as_slice()).map_err(Abort::Fault)
        } else if let Some(body) = module.get(method) {
            self.run(method, body, args, tracer)
        } else if def.is_abstract {
            Err(RuntimeError::AbstractCall(self.method_name(method)).into())
        } else {
            Err(RuntimeError::MissingBody(self.method_name(method)).into())
        };
        tracer.trace_return(method);
        self.depth -= 1;
        result
    }

    fn new_object<T: Tracer>(&mut self, ctor: MethodId, args: Vec<Value>, tracer: &mut T) -> Exec<Value> {
        let types = self.types;
        let ty = types.method(ctor).declaring;
        let this = match types.type_def(ty).kind {
            TypeKind::Class => Value::Object(ObjRef::alloc(types, ty)),
            TypeKind::Struct => Value::Struct(ObjRef::alloc(types, ty)),
            TypeKind::Interface | TypeKind::Primitive(_) => {
                return Err(RuntimeError::TypeMismatch {
                    instr: "newobj",
                    found: types.type_name(ty).to_owned(),
                }
                .into());
            }
        };

        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(this.clone());
        full.extend(args);
        self.call(ctor, full, tracer)?;
        Ok(this)
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    fn run<T: Tracer>(
        &mut self,
        method: MethodId,
        body: &'m MethodBody,
        args: Vec<Value>,
        tracer: &mut T,
    ) -> Exec<Option<Value>> {
        let locals = body
            .locals
            .iter()
            .map(|&ty| Value::default_of(self.types, ty))
            .collect();
        let mut frame = Frame::new(method, args, locals);

        loop {
            if self.exec_fuel == 0 {
                return Err(RuntimeError::ExecFuelExhausted(self.limits.exec_fuel).into());
            }
            self.exec_fuel -= 1;

            let ip = frame.ip;
            let instr = body.instructions.get(ip).ok_or_else(|| {
                RuntimeError::InvalidProgram(format!("control fell off the end at {ip:04}"))
            })?;
            tracer.trace_instruction(method, ip, instr);

            match self.step(&mut frame, body, instr, tracer) {
                Ok(Step::Next) => frame.ip += 1,
                Ok(Step::Jump(to)) => frame.ip = to,
                Ok(Step::Return(value)) => return Ok(value),
                Err(Abort::Throw(exc)) => self.raise(&mut frame, body, exc, tracer)?,
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Transfer control to the innermost handler covering `frame.ip` that
    /// accepts `exc`, or propagate it to the caller.
    fn raise<T: Tracer>(&self, frame: &mut Frame, body: &MethodBody, exc: ObjRef, tracer: &mut T) -> Exec<()> {
        let ip = frame.ip;
        for (idx, h) in body.handlers.iter().enumerate() {
            if !h.covers(ip) {
                continue;
            }
            let accepts = match h.kind {
                HandlerKind::Catch(ty) => self.types.is_assignable(exc.ty(), ty),
                HandlerKind::Finally => true,
            };
            if !accepts {
                continue;
            }

            // Handlers the exception escapes from are abandoned.
            let start = h.handler_start as usize;
            let escaped = |handler: usize| {
                let f = &body.handlers[handler];
                f.in_handler(ip) && !f.in_handler(start)
            };
            frame.pending.retain(|p| !escaped(p.handler));
            frame.caught.retain(|(c, _)| !escaped(*c));
            frame.stack.clear();
            tracer.trace_handler(h.kind, start);

            match h.kind {
                HandlerKind::Catch(_) => {
                    frame.caught.retain(|(c, _)| *c != idx);
                    frame.caught.push((idx, exc.clone()));
                    frame.push(Value::Object(exc));
                }
                HandlerKind::Finally => frame.pending.push(Pending {
                    handler: idx,
                    then: Continuation::Unwind { exception: exc },
                }),
            }
            frame.ip = start;
            return Ok(());
        }
        Err(Abort::Throw(exc))
    }

    /// Next instruction for a `leave` from `ip` to `target`: the first finally
    /// handler whose region is being exited, or `target` itself.
    fn leave<T: Tracer>(&self, frame: &mut Frame, body: &MethodBody, ip: usize, target: usize, tracer: &mut T) -> usize {
        let exited = body
            .handlers
            .iter()
            .enumerate()
            .find(|(_, h)| h.kind == HandlerKind::Finally && h.covers(ip) && !h.covers(target));

        match exited {
            Some((idx, h)) => {
                frame.pending.push(Pending {
                    handler: idx,
                    then: Continuation::Leave { target },
                });
                tracer.trace_handler(h.kind, h.handler_start as usize);
                h.handler_start as usize
            }
            None => target,
        }
    }

    fn step<T: Tracer>(
        &mut self,
        frame: &mut Frame,
        body: &MethodBody,
        instr: &Instruction,
        tracer: &mut T,
    ) -> Exec<Step> {
        use Instruction::*;

        let types = self.types;
        let ip = frame.ip;
        let mnemonic = instr.mnemonic();

        match instr {
            Nop => {}
            LdNull => frame.push(Value::Null),
            LdBool(v) => frame.push(Value::Bool(*v)),
            LdI32(v) => frame.push(Value::I32(*v)),
            LdI64(v) => frame.push(Value::I64(*v)),
            LdF64(v) => frame.push(Value::F64(*v)),
            LdStr(s) => frame.push(Value::from(s.as_str())),

            LdArg(i) => {
                let i = usize::from(*i);
                let arg = frame.args.get(i).ok_or_else(|| bad_slot("argument", i))?;
                // `this` of a struct method aliases the receiver.
                let is_this = i == 0 && !types.method(frame.method).is_static;
                let value = if is_this { arg.clone() } else { arg.copied() };
                frame.push(value);
            }
            StArg(i) => {
                let i = usize::from(*i);
                let value = pop(frame, mnemonic)?;
                *frame.args.get_mut(i).ok_or_else(|| bad_slot("argument", i))? = value;
            }
            LdLoc(l) => {
                let value = frame
                    .locals
                    .get(l.index())
                    .ok_or_else(|| bad_slot("local", l.index()))?
                    .copied();
                frame.push(value);
            }
            StLoc(l) => {
                let value = pop(frame, mnemonic)?;
                *frame
                    .locals
                    .get_mut(l.index())
                    .ok_or_else(|| bad_slot("local", l.index()))? = value;
            }

            Dup => {
                let top = frame.stack.last().ok_or_else(|| underflow(mnemonic))?.copied();
                frame.push(top);
            }
            Pop => {
                pop(frame, mnemonic)?;
            }

            Add | Sub | Mul | Div | Rem => {
                let op = match instr {
                    Add => BinOp::Add,
                    Sub => BinOp::Sub,
                    Mul => BinOp::Mul,
                    Div => BinOp::Div,
                    _ => BinOp::Rem,
                };
                let b = pop(frame, mnemonic)?;
                let a = pop(frame, mnemonic)?;
                frame.push(binary(op, a, b)?);
            }
            Neg => {
                let value = match pop(frame, mnemonic)? {
                    Value::I32(v) => Value::I32(v.wrapping_neg()),
                    Value::I64(v) => Value::I64(v.wrapping_neg()),
                    Value::F64(v) => Value::F64(-v),
                    other => return Err(mismatch(mnemonic, &other).into()),
                };
                frame.push(value);
            }
            Not => {
                let value = match pop(frame, mnemonic)? {
                    Value::Bool(v) => Value::Bool(!v),
                    Value::I32(v) => Value::I32(!v),
                    Value::I64(v) => Value::I64(!v),
                    other => return Err(mismatch(mnemonic, &other).into()),
                };
                frame.push(value);
            }
            Ceq => {
                let b = pop(frame, mnemonic)?;
                let a = pop(frame, mnemonic)?;
                frame.push(Value::Bool(a.equals(&b)));
            }
            Cgt | Clt => {
                let b = pop(frame, mnemonic)?;
                let a = pop(frame, mnemonic)?;
                let ord = compare(mnemonic, &a, &b)?;
                let wanted = if matches!(instr, Cgt) { Ordering::Greater } else { Ordering::Less };
                frame.push(Value::Bool(ord == wanted));
            }

            Br(t) => return Ok(Step::Jump(t.index())),
            BrTrue(t) | BrFalse(t) => {
                let truthy = pop(frame, mnemonic)?.is_truthy();
                if truthy == matches!(instr, BrTrue(_)) {
                    return Ok(Step::Jump(t.index()));
                }
            }
            Beq(t) | Bne(t) | Bgt(t) | Bge(t) | Blt(t) | Ble(t) => {
                let b = pop(frame, mnemonic)?;
                let a = pop(frame, mnemonic)?;
                let taken = match instr {
                    Beq(_) => a.equals(&b),
                    Bne(_) => !a.equals(&b),
                    _ => {
                        let ord = compare(mnemonic, &a, &b)?;
                        match instr {
                            Bgt(_) => ord == Ordering::Greater,
                            Bge(_) => ord != Ordering::Less,
                            Blt(_) => ord == Ordering::Less,
                            _ => ord != Ordering::Greater,
                        }
                    }
                };
                if taken {
                    return Ok(Step::Jump(t.index()));
                }
            }

            LdFld(f) => {
                let receiver = pop(frame, mnemonic)?;
                let obj = instance(&receiver, mnemonic)?;
                let value = obj.get(*f).ok_or_else(|| self.missing_field(*f, obj.ty()))?;
                frame.push(value.copied());
            }
            StFld(f) => {
                let value = pop(frame, mnemonic)?;
                let receiver = pop(frame, mnemonic)?;
                let obj = instance(&receiver, mnemonic)?;
                if !obj.set(*f, value) {
                    return Err(self.missing_field(*f, obj.ty()).into());
                }
                tracer.trace_field_store(*f);
            }
            LdSFld(f) => {
                let value = self.static_field(*f).copied();
                frame.push(value);
            }
            StSFld(f) => {
                let value = pop(frame, mnemonic)?;
                self.statics.insert(*f, value);
                tracer.trace_field_store(*f);
            }

            Call(m) | CallVirt(m) => {
                let def = types.method(*m);
                let n = def.params.len() + usize::from(!def.is_static);
                let args = frame.pop_n(n).ok_or_else(|| underflow(mnemonic))?;
                let target = if matches!(instr, CallVirt(_)) {
                    if args.first().is_none_or(Value::is_null) {
                        return Err(RuntimeError::NullReference(mnemonic).into());
                    }
                    self.dispatch(*m, &args[0])
                } else {
                    *m
                };
                if let Some(ret) = self.call(target, args, tracer)? {
                    frame.push(ret);
                }
            }
            NewObj(m) => {
                let n = types.method(*m).params.len();
                let args = frame.pop_n(n).ok_or_else(|| underflow(mnemonic))?;
                let obj = self.new_object(*m, args, tracer)?;
                frame.push(obj);
            }
            IsInst(ty) => {
                let value = pop(frame, mnemonic)?;
                let fits = value.type_id().is_some_and(|t| types.is_assignable(t, *ty));
                frame.push(if fits { value } else { Value::Null });
            }

            Throw => match pop(frame, mnemonic)? {
                Value::Object(exc) if types.is_exception(exc.ty()) => {
                    tracer.trace_throw(exc.ty());
                    return Err(Abort::Throw(exc));
                }
                Value::Null => return Err(RuntimeError::NullReference(mnemonic).into()),
                other => return Err(mismatch(mnemonic, &other).into()),
            },
            Rethrow => {
                let exc = frame
                    .caught_at(ip, |h, at| body.handlers[h].in_handler(at))
                    .ok_or_else(|| RuntimeError::InvalidProgram(format!("`rethrow` at {ip:04} outside a catch handler")))?;
                tracer.trace_throw(exc.ty());
                return Err(Abort::Throw(exc));
            }
            Leave(t) => {
                frame.stack.clear();
                return Ok(Step::Jump(self.leave(frame, body, ip, t.index(), tracer)));
            }
            EndFinally => {
                let pending = frame.pending.pop().ok_or_else(|| {
                    RuntimeError::InvalidProgram(format!("`endfinally` at {ip:04} with no finally in progress"))
                })?;
                frame.stack.clear();
                return match pending.then {
                    Continuation::Leave { target } => Ok(Step::Jump(self.leave(frame, body, ip, target, tracer))),
                    Continuation::Unwind { exception } => Err(Abort::Throw(exception)),
                };
            }
            Ret => {
                let value = if types.method(frame.method).ret == TypeId::VOID {
                    None
                } else {
                    Some(pop(frame, mnemonic)?)
                };
                return Ok(Step::Return(value));
            }
        }

        Ok(Step::Next)
    }

    fn missing_field(&self, field: FieldId, ty: TypeId) -> RuntimeError {
        let def = self.types.field(field);
        RuntimeError::InvalidProgram(format!(
            "`{}` has no field `{}`",
            self.types.type_name(ty),
            self.types.name(def.name)
        ))
    }
}

fn pop(frame: &mut Frame, instr: &'static str) -> Result<Value, RuntimeError> {
    frame.pop().ok_or_else(|| underflow(instr))
}

fn underflow(instr: &'static str) -> RuntimeError {
    RuntimeError::InvalidProgram(format!("`{instr}` on an empty stack"))
}

fn bad_slot(kind: &str, index: usize) -> RuntimeError {
    RuntimeError::InvalidProgram(format!("{kind} #{index} does not exist"))
}

fn mismatch(instr: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        instr,
        found: found.describe(),
    }
}

fn instance<'v>(value: &'v Value, instr: &'static str) -> Result<&'v ObjRef, RuntimeError> {
    match value {
        Value::Null => Err(RuntimeError::NullReference(instr)),
        other => other.instance().ok_or_else(|| mismatch(instr, other)),
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::I32(a), Value::I32(b)) => int_op(op, i64::from(a), i64::from(b)).map(|v| Value::I32(v as i32)),
        (Value::I64(a), Value::I64(b)) => int_op(op, a, b).map(Value::I64),
        (Value::I32(a), Value::I64(b)) => int_op(op, i64::from(a), b).map(Value::I64),
        (Value::I64(a), Value::I32(b)) => int_op(op, a, i64::from(b)).map(Value::I64),
        (Value::F64(a), Value::F64(b)) => Ok(Value::F64(match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Rem => a % b,
        })),
        (Value::Str(a), Value::Str(b)) if matches!(op, BinOp::Add) => {
            Ok(Value::from(format!("{a}{b}").as_str()))
        }
        (a, b) => Err(RuntimeError::TypeMismatch {
            instr: op.mnemonic(),
            found: format!("{} and {}", a.describe(), b.describe()),
        }),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    Ok(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div if b == 0 => return Err(RuntimeError::DivideByZero),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Rem if b == 0 => return Err(RuntimeError::DivideByZero),
        BinOp::Rem => a.wrapping_rem(b),
    })
}

fn compare(instr: &'static str, a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    let ord = match (a, b) {
        (Value::I32(a), Value::I32(b)) => Some(a.cmp(b)),
        (Value::I64(a), Value::I64(b)) => Some(a.cmp(b)),
        (Value::I32(a), Value::I64(b)) => Some(i64::from(*a).cmp(b)),
        (Value::I64(a), Value::I32(b)) => Some(a.cmp(&i64::from(*b))),
        (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ord.ok_or_else(|| RuntimeError::TypeMismatch {
        instr,
        found: format!("{} and {}", a.describe(), b.describe()),
    })
}
