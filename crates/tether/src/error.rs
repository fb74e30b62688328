//! # Error Definitions
//!
//! Every failure the bridge can surface, and the foreign failure report that
//! travels back inside a reply.

use crate::transport::TransportError;

/// Why the foreign runtime refused or failed an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The target object has no operation with that name.
    MethodNotFound,
    /// The operation exists but rejected the arguments (arity or kind).
    BadArguments,
    /// The target handle does not name a live foreign object.
    ObjectNotFound,
    /// A class lookup by name failed.
    ClassNotFound,
    /// The operation ran and raised.
    Raised,
    /// A category this side does not know about.
    Other(String),
}

impl FailureKind {
    pub fn as_tag(&self) -> &str {
        match self {
            Self::MethodNotFound => "MethodNotFound",
            Self::BadArguments => "BadArguments",
            Self::ObjectNotFound => "ObjectNotFound",
            Self::ClassNotFound => "ClassNotFound",
            Self::Raised => "Raised",
            Self::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "MethodNotFound" => Self::MethodNotFound,
            "BadArguments" => Self::BadArguments,
            "ObjectNotFound" => Self::ObjectNotFound,
            "ClassNotFound" => Self::ClassNotFound,
            "Raised" => Self::Raised,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The `Err` side of a reply: the foreign error's category and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn method_not_found(class: &str, method: &str) -> Self {
        Self::new(FailureKind::MethodNotFound, format!("{class} has no method '{method}'"))
    }

    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BadArguments, message)
    }

    pub fn raised(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Raised, message)
    }
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_tag(), self.message)
    }
}

impl std::error::Error for RemoteFailure {}

/// Coarse classification of an `Error`, for callers that only need to know
/// which side broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The channel to the foreign runtime is broken.
    Transport,
    /// The foreign runtime raised or rejected the call.
    RemoteInvocation,
    /// A value could not be represented on one side of the boundary.
    UnsupportedType,
    /// A wrapper type registration defect.
    AmbiguousOrMissingConstructor,
    /// The peer sent something that is not a well-formed, correlated reply.
    Protocol,
    /// The caller passed an argument the bridge refuses before any invocation.
    Usage,
}

#[derive(Debug, Clone)]
pub enum Error {
    Transport(TransportError),
    Remote(RemoteFailure),
    /// A local value whose runtime type has no foreign representation.
    UnsupportedType(String),
    /// A foreign value did not have the kind the local type requires.
    TypeMismatch { expected: &'static str, found: &'static str },
    /// Two foreign map entries collapse onto one local key.
    DuplicateKey(String),
    /// A foreign class name is claimed by two different wrapper types.
    AmbiguousConstructor { class: String, registered: &'static str, attempted: &'static str },
    /// No wrapper type is registered for a foreign class name.
    MissingConstructor { class: String },
    InvalidPath(String),
    Protocol(String),
    Wire(tetherpack::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Remote(_) => ErrorKind::RemoteInvocation,
            Self::UnsupportedType(_) | Self::TypeMismatch { .. } | Self::DuplicateKey(_) => ErrorKind::UnsupportedType,
            Self::AmbiguousConstructor { .. } | Self::MissingConstructor { .. } => ErrorKind::AmbiguousOrMissingConstructor,
            Self::Protocol(_) | Self::Wire(_) => ErrorKind::Protocol,
            Self::InvalidPath(_) => ErrorKind::Usage,
        }
    }

    /// The foreign failure, if the foreign runtime rejected the call.
    pub fn remote(&self) -> Option<&RemoteFailure> {
        match self {
            Self::Remote(failure) => Some(failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Remote(failure) => write!(f, "Remote invocation failed: {}", failure),
            Self::UnsupportedType(ty) => write!(f, "Unsupported type: {} has no foreign representation", ty),
            Self::TypeMismatch { expected, found } => write!(f, "Type mismatch: expected {}, found {}", expected, found),
            Self::DuplicateKey(key) => write!(f, "Duplicate key after conversion: {}", key),
            Self::AmbiguousConstructor { class, registered, attempted } => write!(
                f,
                "Ambiguous constructor for {}: already bound to {}, cannot bind {}",
                class, registered, attempted
            ),
            Self::MissingConstructor { class } => write!(f, "No wrapper registered for foreign class {}", class),
            Self::InvalidPath(path) => write!(f, "Invalid path: {:?}", path),
            Self::Protocol(msg) => write!(f, "Protocol violation: {}", msg),
            Self::Wire(e) => write!(f, "Wire error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Remote(failure) => Some(failure),
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<tetherpack::Error> for Error {
    fn from(e: tetherpack::Error) -> Self {
        Self::Wire(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
