//! Opaque references to foreign objects.

use std::sync::Arc;

/// Identifies one object living in the foreign runtime.
///
/// The identifier is meaningful only to the transport and the foreign runtime.
/// A handle is a borrowed reference: cloning it is cheap, dropping it never
/// releases the foreign object.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RemoteHandle(Arc<str>);

impl RemoteHandle {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "remote:{}", self.0)
    }
}

impl From<&str> for RemoteHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RemoteHandle {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
