//! # Tether
//!
//! Drive objects that live in a foreign runtime as if they were local.
//!
//! ## Architecture
//!
//! - `bridge`: remote references. One method call is one Invoke frame over a
//!   `Transport` and one Reply back.
//! - `marshal`: local values to the `Value` union and back, statically through
//!   `IntoForeign`/`FromForeign` or dynamically through a `Marshaller`.
//! - `proxy`: typed wrappers over handles, with a registry for wrapping by the
//!   foreign class name.
//! - `persist`: `Writer`/`Reader` for saving and loading foreign components.
//!
//! The wire format is `tetherpack`.

pub mod bridge;
pub mod builder;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod handle;
pub mod marshal;
pub mod persist;
pub mod proxy;
pub mod transport;
pub mod value;

pub use bridge::Bridge;
pub use bridge::RemoteObject;
pub use builder::BridgeBuilder;
pub use config::BridgeConfig;
pub use error::Error;
pub use error::ErrorKind;
pub use error::FailureKind;
pub use error::RemoteFailure;
pub use error::Result;
pub use handle::RemoteHandle;
pub use marshal::FromForeign;
pub use marshal::IntoForeign;
pub use marshal::Marshaller;
pub use marshal::NeverUnit;
pub use persist::Loadable;
pub use persist::Persistable;
pub use persist::Reader;
pub use persist::Session;
pub use persist::WriteState;
pub use persist::Writer;
pub use proxy::DynWrapper;
pub use proxy::ProxyRegistry;
pub use proxy::Wrapper;
pub use transport::Transport;
pub use transport::TransportError;
pub use value::Value;
