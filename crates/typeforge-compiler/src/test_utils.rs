//! Test utilities.

use typeforge_bytecode::{MethodBody, dump};
use typeforge_core::{TypeId, TypeRegistry, TypeSystem};

use crate::{BodyBuilder, ConstantRegistry, EmitConfig, MethodContext, Result};

/// Build a body for `ctx` with the builtin constant registry.
pub fn build_body(
    types: &dyn TypeSystem,
    ctx: MethodContext,
    f: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
) -> Result<MethodBody> {
    let constants = ConstantRegistry::builtin();
    let mut b = BodyBuilder::new(types, &constants, EmitConfig::default(), ctx);
    f(&mut b)?;
    b.finish()
}

/// Build a static `void()` body and return its disassembly.
pub fn dump_static(types: &TypeRegistry, f: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>) -> String {
    let ctx = MethodContext::static_method(TypeId::OBJECT, [], TypeId::VOID);
    match build_body(types, ctx, f) {
        Ok(body) => dump(&body, types),
        Err(err) => panic!("body failed to build: {err}"),
    }
}

/// Build a static `void()` body that must fail, and return the error.
pub fn static_error(
    types: &TypeRegistry,
    f: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
) -> crate::EmitError {
    let ctx = MethodContext::static_method(TypeId::OBJECT, [], TypeId::VOID);
    match build_body(types, ctx, f) {
        Ok(body) => panic!("expected an error, got:\n{}", dump(&body, types)),
        Err(err) => err,
    }
}
