//! Emission settings.

/// Configuration for method-body emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmitConfig {
    /// Maximum simulated evaluation-stack depth (default: 1,024).
    pub(crate) max_stack: u32,
    /// Append `ret` to void bodies whose end is reachable (default: true).
    pub(crate) implicit_return: bool,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            max_stack: 1024,
            implicit_return: true,
        }
    }
}

impl EmitConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum stack depth.
    pub fn max_stack(mut self, depth: u32) -> Self {
        self.max_stack = depth;
        self
    }

    /// Set whether void bodies get an implicit `ret`.
    pub fn implicit_return(mut self, value: bool) -> Self {
        self.implicit_return = value;
        self
    }

    pub fn get_max_stack(&self) -> u32 {
        self.max_stack
    }

    pub fn get_implicit_return(&self) -> bool {
        self.implicit_return
    }
}
