//! # Bridge Builder
//!
//! Fluent construction of a `Bridge`: configuration, extra marshalling kinds and
//! wrapper registrations are settled before the first invocation.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use crate::bridge::Bridge;
use crate::bridge::Inner;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::marshal::Marshaller;
use crate::proxy::ProxyRegistry;
use crate::proxy::Wrapper;
use crate::transport::Transport;

pub struct BridgeBuilder {
    transport: Arc<dyn Transport>,
    config: BridgeConfig,
    marshaller: Marshaller,
    registry: ProxyRegistry,
}

impl BridgeBuilder {
    pub fn new(transport: impl Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            config: BridgeConfig::standard(),
            marshaller: Marshaller::new(),
            registry: ProxyRegistry::new(),
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn entry_point(mut self, id: impl Into<String>) -> Self {
        self.config.entry_point = id.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn marshaller(mut self, marshaller: Marshaller) -> Self {
        self.marshaller = marshaller;
        self
    }

    /// Registers `T` for dynamic wrapping. Fails on a conflicting class name.
    pub fn register<T: Wrapper>(self) -> Result<Self> {
        self.registry.register::<T>()?;
        Ok(self)
    }

    pub fn build(self) -> Bridge {
        tracing::debug!(
            entry_point = %self.config.entry_point,
            max_depth = self.config.max_depth,
            wrappers = self.registry.len(),
            "bridge ready"
        );
        Bridge::from_inner(Inner {
            transport: self.transport,
            config: self.config,
            marshaller: self.marshaller,
            registry: self.registry,
            seq: AtomicU64::new(1),
        })
    }
}
