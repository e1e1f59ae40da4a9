//! Symbolic handles handed out by an emission session.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_SESSION: AtomicU32 = AtomicU32::new(1);

/// Identity of one instruction stream.
///
/// Every `Label` and `Local` records the session that created it, so a handle
/// leaking into another stream is caught instead of silently aliasing a slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    /// Allocate a process-unique session id.
    pub fn fresh() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Symbolic jump target, bound to an instruction index once per stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Label {
    session: SessionId,
    index: u32,
}

impl Label {
    pub fn new(session: SessionId, index: u32) -> Self {
        Self { session, index }
    }

    #[inline]
    pub fn session(self) -> SessionId {
        self.session
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index)
    }
}

/// Typed local-variable slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Local {
    session: SessionId,
    index: u16,
}

impl Local {
    pub fn new(session: SessionId, index: u16) -> Self {
        Self { session, index }
    }

    #[inline]
    pub fn session(self) -> SessionId {
        self.session
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}
