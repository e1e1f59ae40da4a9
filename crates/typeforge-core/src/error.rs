//! Errors raised while defining or resolving types and members.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type `{0}` is already defined")]
    DuplicateType(String),

    #[error("`{ty}` already declares a member named `{name}`")]
    DuplicateMember { ty: String, name: String },

    #[error("`{ty}` cannot declare {what}")]
    InvalidDeclaration { ty: String, what: &'static str },

    #[error("`{ty}` has no field named `{name}`")]
    FieldNotFound { ty: String, name: String },

    #[error("`{ty}` has no property named `{name}`")]
    PropertyNotFound { ty: String, name: String },

    /// No method with a matching name accepts the given argument types.
    #[error("`{ty}` has no method `{name}({args})`")]
    MethodNotFound {
        ty: String,
        name: String,
        args: String,
    },

    #[error("`{ty}` has no constructor accepting ({args})")]
    ConstructorNotFound { ty: String, args: String },
}
