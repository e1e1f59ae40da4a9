use indexmap::IndexMap;

use typeforge_core::MethodId;

use crate::body::MethodBody;

/// Method bodies produced for a set of types, in definition order.
#[derive(Clone, Debug, Default)]
pub struct Module {
    bodies: IndexMap<MethodId, MethodBody>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a body to `method`, replacing any previous one.
    pub fn insert(&mut self, method: MethodId, body: MethodBody) -> Option<MethodBody> {
        self.bodies.insert(method, body)
    }

    pub fn get(&self, method: MethodId) -> Option<&MethodBody> {
        self.bodies.get(&method)
    }

    pub fn contains(&self, method: MethodId) -> bool {
        self.bodies.contains_key(&method)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MethodId, &MethodBody)> {
        self.bodies.iter().map(|(&id, body)| (id, body))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
