//! Activation records.

use typeforge_core::MethodId;

use super::value::{ObjRef, Value};

/// Why a finally handler is running, and where control goes when it ends.
#[derive(Clone, Debug)]
pub enum Continuation {
    /// A `leave` crossed the handler's region; resume the leave towards `target`.
    Leave { target: usize },
    /// An exception is propagating through the region; rethrow it afterwards.
    Unwind { exception: ObjRef },
}

/// A finally handler in progress.
#[derive(Clone, Debug)]
pub struct Pending {
    /// Index into the body's handler table.
    pub handler: usize,
    pub then: Continuation,
}

/// One method invocation.
#[derive(Debug)]
pub struct Frame {
    pub method: MethodId,
    pub ip: usize,
    /// Arguments, `this` first for instance methods.
    pub args: Vec<Value>,
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
    /// Finally handlers entered and not yet ended, innermost last.
    pub pending: Vec<Pending>,
    /// Exceptions held by running catch handlers, keyed by handler index.
    pub caught: Vec<(usize, ObjRef)>,
}

impl Frame {
    pub fn new(method: MethodId, args: Vec<Value>, locals: Vec<Value>) -> Self {
        Self {
            method,
            ip: 0,
            args,
            locals,
            stack: Vec::new(),
            pending: Vec::new(),
            caught: Vec::new(),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Pop `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<Value>> {
        let at = self.stack.len().checked_sub(n)?;
        Some(self.stack.split_off(at))
    }

    /// Exception held by the innermost catch handler that contains `ip`.
    pub fn caught_at(&self, ip: usize, in_handler: impl Fn(usize, usize) -> bool) -> Option<ObjRef> {
        self.caught
            .iter()
            .rev()
            .find(|(h, _)| in_handler(*h, ip))
            .map(|(_, exc)| exc.clone())
    }
}
