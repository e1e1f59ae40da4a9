//! Finalized method bodies.

use std::fmt;

use serde::{Deserialize, Serialize};

use typeforge_core::TypeId;

use crate::instruction::Instruction;

/// Resolved branch target: an index into `MethodBody::instructions`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Target(u32);

impl Target {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum HandlerKind {
    /// Entered with the exception pushed when its runtime type is assignable
    /// to the given type.
    Catch(TypeId),
    Finally,
}

/// One row of the exception-handler table. Ranges are half-open instruction
/// index ranges.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: u32,
    pub try_end: u32,
    pub handler_start: u32,
    pub handler_end: u32,
}

impl ExceptionHandler {
    /// Whether the protected range contains `ip`.
    #[inline]
    pub fn covers(&self, ip: usize) -> bool {
        (self.try_start as usize..self.try_end as usize).contains(&ip)
    }

    /// Whether the handler code contains `ip`.
    #[inline]
    pub fn in_handler(&self, ip: usize) -> bool {
        (self.handler_start as usize..self.handler_end as usize).contains(&ip)
    }
}

/// A method body ready for execution.
///
/// Handlers are ordered innermost first: a handler nested inside another's
/// protected range or handler code always precedes it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub locals: Vec<TypeId>,
    pub handlers: Vec<ExceptionHandler>,
    pub max_stack: u32,
}

impl MethodBody {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
