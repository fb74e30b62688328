//! Wrappers for the pipeline classes the demo drives.

use tether::DynWrapper;
use tether::Loadable;
use tether::Persistable;
use tether::RemoteHandle;
use tether::RemoteObject;
use tether::Result;
use tether::Value;
use tether::Wrapper;
use tether_loopback::ClassDef;
use tether_loopback::LoopbackRuntime;

macro_rules! wrapper {
    ($name:ident, $class:literal) => {
        pub struct $name {
            remote: RemoteObject,
        }

        impl Wrapper for $name {
            const FOREIGN_CLASS: &'static str = $class;

            fn from_remote(remote: RemoteObject) -> Self {
                Self { remote }
            }

            fn remote(&self) -> &RemoteObject {
                &self.remote
            }
        }

        impl Persistable for $name {}
        impl Loadable for $name {}
    };
}

wrapper!(Pipeline, "ml.Pipeline");
wrapper!(Tokenizer, "ml.feature.Tokenizer");
wrapper!(LogisticRegression, "ml.classification.LogisticRegression");

impl Pipeline {
    pub fn set_stages(&self, stages: &[&dyn DynWrapper]) -> Result<&Self> {
        let handles = stages.iter().map(|s| Value::Handle(s.object().handle().clone())).collect();
        self.remote.invoke("setStages", &[Value::List(handles)])?;
        Ok(self)
    }

    pub fn stages(&self) -> Result<Vec<Box<dyn DynWrapper>>> {
        let handles: Vec<RemoteHandle> = self.remote.call("getStages", &[])?;
        let bridge = self.remote.bridge();
        handles.into_iter().map(|h| bridge.wrap_dynamic(h)).collect()
    }
}

impl Tokenizer {
    pub fn set_input_col(&self, col: &str) -> Result<&Self> {
        self.remote.invoke("setInputCol", &[Value::String(col.to_string())])?;
        Ok(self)
    }

    pub fn set_output_col(&self, col: &str) -> Result<&Self> {
        self.remote.invoke("setOutputCol", &[Value::String(col.to_string())])?;
        Ok(self)
    }

    pub fn input_col(&self) -> Result<String> {
        self.remote.call("getInputCol", &[])
    }
}

impl LogisticRegression {
    pub fn set_max_iter(&self, n: i32) -> Result<&Self> {
        self.remote.invoke("setMaxIter", &[Value::Int(n)])?;
        Ok(self)
    }

    pub fn set_reg_param(&self, p: f64) -> Result<&Self> {
        self.remote.invoke("setRegParam", &[Value::Double(p)])?;
        Ok(self)
    }

    pub fn max_iter(&self) -> Result<i32> {
        self.remote.call("getMaxIter", &[])
    }
}

/// Teaches a loopback runtime the classes above.
pub fn define(rt: &LoopbackRuntime) {
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
}
