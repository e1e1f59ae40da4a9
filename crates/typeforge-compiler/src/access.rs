//! Receiver handling for member access.
//!
//! Whether a member needs `this` is decided in exactly one place,
//! [`resolve_access`]. Field, property and call helpers all go through
//! [`push_receiver`], so static members never get a receiver pushed.

use typeforge_bytecode::Instruction;
use typeforge_core::{MemberRef, TypeSystem};

use crate::Result;
use crate::codegen::MethodContext;
use crate::emit::{EmitError, Emitter};

/// How a member is reached.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Access {
    /// An instance reference must be on the stack before the access.
    pub needs_self: bool,
}

pub fn resolve_access(member: &MemberRef) -> Access {
    Access {
        needs_self: !member.is_static(),
    }
}

/// Where the instance for an access comes from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Receiver {
    /// `this` of the method being built.
    Implicit,
    /// The caller already pushed the instance.
    OnStack,
}

pub(crate) fn push_receiver(
    em: &mut Emitter,
    types: &dyn TypeSystem,
    ctx: &MethodContext,
    member: MemberRef,
    receiver: Receiver,
    name: &str,
) -> Result<()> {
    let access = resolve_access(&member);
    match (access.needs_self, receiver) {
        (false, Receiver::OnStack) => Err(EmitError::StaticMemberWithReceiver(name.to_owned())),
        (false, Receiver::Implicit) | (true, Receiver::OnStack) => Ok(()),
        (true, Receiver::Implicit) => {
            if ctx.is_static {
                return Err(EmitError::NoSelfInStaticContext(name.to_owned()));
            }
            if !types.is_assignable(ctx.declaring, member.declaring()) {
                return Err(EmitError::ReceiverMismatch {
                    ty: types.type_name(ctx.declaring).to_owned(),
                    member: name.to_owned(),
                });
            }
            em.emit(Instruction::LdArg(0))
        }
    }
}
