//! Errors that can occur during execution.

/// Execution failure. Managed exceptions that nothing catches surface as
/// [`RuntimeError::Unhandled`]; everything else is a fault in the program or
/// the host and cannot be caught by bytecode.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// Execution fuel exhausted (too many instructions).
    #[error("execution limit of {0} instructions exceeded")]
    ExecFuelExhausted(u32),

    /// Too many nested calls.
    #[error("recursion limit of {0} calls exceeded")]
    RecursionLimitExceeded(u32),

    #[error("unhandled exception `{ty}`{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unhandled { ty: String, message: Option<String> },

    #[error("`{0}` on a null reference")]
    NullReference(&'static str),

    #[error("`{instr}` cannot operate on {found}")]
    TypeMismatch { instr: &'static str, found: String },

    #[error("division by zero")]
    DivideByZero,

    #[error("method `{0}` has neither a body nor a native implementation")]
    MissingBody(String),

    #[error("abstract method `{0}` cannot be invoked directly")]
    AbstractCall(String),

    #[error("method `{method}` takes {expected} arguments, got {found}")]
    ArgumentCount {
        method: String,
        expected: usize,
        found: usize,
    },

    /// The body violates an invariant the emitter guarantees.
    #[error("invalid program: {0}")]
    InvalidProgram(String),

    /// Raised by a native method.
    #[error("{0}")]
    Native(String),
}
