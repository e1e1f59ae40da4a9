//! Emission and construction errors.

use typeforge_bytecode::Label;
use typeforge_core::TypeError;

fn join_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while emitting a method body or building a type.
///
/// All of these are programmer errors in the calling code; none is transient.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmitError {
    // Stack simulation
    #[error("`{instr}` needs {needed} stack values but only {found} are available")]
    StackUnderflow {
        instr: &'static str,
        needed: u32,
        found: u32,
    },

    #[error("evaluation stack exceeds the configured limit of {0}")]
    StackTooDeep(u32),

    #[error("stack depth mismatch at {label}: expected {expected}, found {found}")]
    StackMismatch {
        label: Label,
        expected: u32,
        found: u32,
    },

    #[error("`ret` expects {expected} stack values, found {found}")]
    InvalidReturn { expected: u32, found: u32 },

    // Labels and handles
    #[error("label {0} is already bound")]
    LabelAlreadyBound(Label),

    #[error("labels referenced but never bound: {}", join_labels(.0))]
    UnboundLabels(Vec<Label>),

    #[error("{0} belongs to a different instruction stream")]
    ForeignHandle(&'static str),

    #[error("too many locals in one method body")]
    TooManyLocals,

    #[error("argument index {index} is out of range for {count} arguments")]
    ArgumentOutOfRange { index: u16, count: u16 },

    // Protected regions
    #[error("branch to {0} crosses a protected region boundary; use `leave`")]
    BranchOutOfRegion(Label),

    #[error("`leave` to {0} enters a protected region")]
    LeaveIntoRegion(Label),

    #[error("`leave` to {0} exits a finally handler")]
    LeaveOutOfFinally(Label),

    #[error("protected region entered with {0} values on the stack")]
    NonEmptyStackAtRegion(u32),

    #[error("block is not the innermost open protected region")]
    BlockNotInnermost,

    #[error("invalid handler order: {0}")]
    HandlerOrder(&'static str),

    #[error("protected region closed without a handler")]
    MissingHandler,

    #[error("{0} protected regions left open")]
    UnclosedBlocks(usize),

    #[error("`ret` inside a protected region; use `leave`")]
    ReturnInsideRegion,

    #[error("`endfinally` outside a finally handler")]
    EndFinallyOutsideFinally,

    #[error("`rethrow` outside a catch handler")]
    RethrowOutsideCatch,

    #[error("control falls off the end of the method body")]
    MissingTerminator,

    #[error("`{0}` needs a method signature; emit it through `emit_call`")]
    SignatureRequired(&'static str),

    // Constants
    #[error("a value is required; use `ldnull` to push a null reference")]
    ArgumentRequired,

    #[error("no constant representation for type `{0}`")]
    NotConstant(String),

    #[error("constant `{value}` cannot be loaded as `{ty}`")]
    ConstantTypeMismatch { ty: String, value: String },

    #[error("invalid loop range: {0}")]
    InvalidRange(String),

    // Members and control blocks
    #[error("`{0}` is not an exception type")]
    NotAnException(String),

    #[error("static member `{0}` cannot take a receiver")]
    StaticMemberWithReceiver(String),

    #[error("instance member `{0}` needs `this`, but the method is static")]
    NoSelfInStaticContext(String),

    #[error("`this` of type `{ty}` cannot access instance member `{member}`")]
    ReceiverMismatch { ty: String, member: String },

    #[error("property `{0}` has no getter")]
    NoGetter(String),

    #[error("property `{0}` has no setter")]
    NoSetter(String),

    #[error("method `{0}` is not virtual")]
    NotOverridable(String),

    #[error("`{0}` is not a constructor")]
    NotAConstructor(String),

    #[error("`{0}` does not implement IDisposable")]
    NotDisposable(String),

    #[error("try-catch needs at least one catch arm")]
    NoCatchArms,

    #[error("{construct} changed the stack by {found}, expected {expected}")]
    UnbalancedBlock {
        construct: &'static str,
        expected: i32,
        found: i32,
    },

    #[error(transparent)]
    Type(#[from] TypeError),
}
