//! Wrappers and loopback classes shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tether::Bridge;
use tether::DynWrapper;
use tether::Loadable;
use tether::Persistable;
use tether::RemoteObject;
use tether::Value;
use tether::Wrapper;
use tether_loopback::ClassDef;
use tether_loopback::LoopbackRuntime;

pub struct Pipeline {
    remote: RemoteObject,
}

impl Wrapper for Pipeline {
    const FOREIGN_CLASS: &'static str = "ml.Pipeline";

    fn from_remote(remote: RemoteObject) -> Self {
        Self { remote }
    }

    fn remote(&self) -> &RemoteObject {
        &self.remote
    }
}

impl Persistable for Pipeline {}
impl Loadable for Pipeline {}

impl Pipeline {
    pub fn set_stages(&self, stages: &[&dyn DynWrapper]) -> tether::Result<()> {
        let handles = stages.iter().map(|s| Value::Handle(s.object().handle().clone())).collect();
        self.remote.invoke("setStages", &[Value::List(handles)])?;
        Ok(())
    }

    pub fn stages(&self) -> tether::Result<Vec<Box<dyn DynWrapper>>> {
        let handles: Vec<tether::RemoteHandle> = self.remote.call("getStages", &[])?;
        let bridge = self.remote.bridge();
        handles.into_iter().map(|h| bridge.wrap_dynamic(h)).collect()
    }
}

pub struct Tokenizer {
    remote: RemoteObject,
}

impl Wrapper for Tokenizer {
    const FOREIGN_CLASS: &'static str = "ml.feature.Tokenizer";

    fn from_remote(remote: RemoteObject) -> Self {
        Self { remote }
    }

    fn remote(&self) -> &RemoteObject {
        &self.remote
    }
}

impl Persistable for Tokenizer {}
impl Loadable for Tokenizer {}

impl Tokenizer {
    pub fn set_input_col(&self, col: &str) -> tether::Result<()> {
        self.remote.invoke("setInputCol", &[Value::String(col.to_string())])?;
        Ok(())
    }

    pub fn input_col(&self) -> tether::Result<String> {
        self.remote.call("getInputCol", &[])
    }
}

pub struct LogisticRegression {
    remote: RemoteObject,
}

impl Wrapper for LogisticRegression {
    const FOREIGN_CLASS: &'static str = "ml.classification.LogisticRegression";

    fn from_remote(remote: RemoteObject) -> Self {
        Self { remote }
    }

    fn remote(&self) -> &RemoteObject {
        &self.remote
    }
}

impl Persistable for LogisticRegression {}
impl Loadable for LogisticRegression {}

impl LogisticRegression {
    pub fn set_max_iter(&self, n: i32) -> tether::Result<()> {
        self.remote.invoke("setMaxIter", &[Value::Int(n)])?;
        Ok(())
    }

    pub fn max_iter(&self) -> tether::Result<i32> {
        self.remote.call("getMaxIter", &[])
    }
}

/// Loopback runtime with the ml classes and an echo class defined.
pub fn runtime() -> Arc<LoopbackRuntime> {
    let rt = LoopbackRuntime::new();
    rt.define(ClassDef::new(Pipeline::FOREIGN_CLASS).property("stages").persistable());
    rt.define(
        ClassDef::new(Tokenizer::FOREIGN_CLASS)
            .property("inputCol")
            .property("outputCol")
            .persistable(),
    );
    rt.define(
        ClassDef::new(LogisticRegression::FOREIGN_CLASS)
            .property("maxIter")
            .property("regParam")
            .persistable(),
    );
    rt.define(ClassDef::new("test.Echo").static_method("echo", |_, args| {
        args.arity(1)?;
        Ok(args.value(0)?.clone())
    }));
    Arc::new(rt)
}

/// A bridge to `rt` with every ml wrapper registered.
pub fn bridge(rt: &Arc<LoopbackRuntime>) -> anyhow::Result<Bridge> {
    Ok(Bridge::builder(Arc::clone(rt))
        .register::<Pipeline>()?
        .register::<Tokenizer>()?
        .register::<LogisticRegression>()?
        .build())
}

/// Methods the runtime received, in order.
pub fn methods(rt: &LoopbackRuntime) -> Vec<String> {
    rt.journal().into_iter().map(|e| e.method).collect()
}
