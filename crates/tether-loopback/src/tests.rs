//! Tests for dispatch and persistence inside the loopback runtime.

use tether::FailureKind;
use tether::RemoteHandle;
use tether::Value;
use tether::frame::Invocation;

use crate::ClassDef;
use crate::LoopbackRuntime;
use crate::class_handle;

fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

fn counter_class() -> ClassDef {
    ClassDef::new("test.Counter")
        .property("count")
        .method("increment", |ctx, args| {
            args.arity(0)?;
            let next = match ctx.get("count") {
                Value::Long(n) => n + 1,
                _ => 1,
            };
            ctx.set("count", Value::Long(next))?;
            Ok(Value::Long(next))
        })
        .persistable()
}

fn new_counter(rt: &LoopbackRuntime) -> anyhow::Result<RemoteHandle> {
    let class = rt.dispatch(rt.entry_point(), "classForName", &[s("test.Counter")])?;
    let Value::Handle(class) = class else { anyhow::bail!("expected a class handle") };
    let obj = rt.dispatch(&class, "new", &[])?;
    let Value::Handle(obj) = obj else { anyhow::bail!("expected an object handle") };
    Ok(obj)
}

#[test]
fn test_class_lookup_and_instance_methods() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());

    let obj = new_counter(&rt)?;
    assert_eq!(rt.dispatch(&obj, "increment", &[])?, Value::Long(1));
    assert_eq!(rt.dispatch(&obj, "increment", &[])?, Value::Long(2));
    assert_eq!(rt.dispatch(&obj, "getCount", &[])?, Value::Long(2));
    Ok(())
}

#[test]
fn test_get_class_and_name() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());

    let obj = new_counter(&rt)?;
    let class = rt.dispatch(&obj, "getClass", &[])?;
    assert_eq!(class, Value::Handle(class_handle("test.Counter")));
    let Value::Handle(class) = class else { anyhow::bail!("expected a class handle") };
    assert_eq!(rt.dispatch(&class, "getName", &[])?, s("test.Counter"));
    Ok(())
}

#[test]
fn test_refusals_carry_a_category() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());
    let obj = new_counter(&rt)?;

    let missing = rt.dispatch(&obj, "fly", &[]).unwrap_err();
    assert_eq!(missing.kind, FailureKind::MethodNotFound);

    let arity = rt.dispatch(&obj, "setCount", &[]).unwrap_err();
    assert_eq!(arity.kind, FailureKind::BadArguments);

    let gone = rt.dispatch(&RemoteHandle::new("o999"), "getCount", &[]).unwrap_err();
    assert_eq!(gone.kind, FailureKind::ObjectNotFound);

    let unknown = rt.dispatch(rt.entry_point(), "classForName", &[s("no.Such")]).unwrap_err();
    assert_eq!(unknown.kind, FailureKind::ClassNotFound);
    Ok(())
}

#[test]
fn test_journal_records_every_call() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    let reply = rt.handle(Invocation {
        seq: 4,
        target: rt.entry_point().clone(),
        method: "getSession".into(),
        args: vec![],
    });
    assert_eq!(reply.seq, 4);
    assert_eq!(reply.outcome, Ok(Value::Handle(rt.session().clone())));

    let journal = rt.journal();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].method, "getSession");
    rt.clear_journal();
    assert!(rt.journal().is_empty());
    Ok(())
}

#[test]
fn test_journal_keeps_only_the_latest_calls() {
    let rt = LoopbackRuntime::new();
    rt.set_journal_limit(3);
    for seq in 1..=5 {
        rt.handle(Invocation {
            seq,
            target: rt.entry_point().clone(),
            method: "getSession".into(),
            args: vec![],
        });
    }
    let journal = rt.journal();
    assert_eq!(journal.len(), 3);

    rt.set_journal_limit(1);
    assert_eq!(rt.journal().len(), 1);
    rt.set_journal_limit(0);
    rt.handle(Invocation { seq: 6, target: rt.entry_point().clone(), method: "getSession".into(), args: vec![] });
    assert!(rt.journal().is_empty());
}

#[test]
fn test_save_refuses_existing_path_without_overwrite() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());
    let obj = new_counter(&rt)?;

    let Value::Handle(w1) = rt.dispatch(&obj, "write", &[])? else { anyhow::bail!("expected a writer") };
    rt.dispatch(&w1, "save", &[s("/m")])?;

    let Value::Handle(w2) = rt.dispatch(&obj, "write", &[])? else { anyhow::bail!("expected a writer") };
    let err = rt.dispatch(&w2, "save", &[s("/m")]).unwrap_err();
    assert_eq!(err.kind, FailureKind::Raised);
    assert!(err.message.contains("already exists"));

    rt.dispatch(&w2, "overwrite", &[])?;
    rt.dispatch(&w2, "save", &[s("/m")])?;
    Ok(())
}

#[test]
fn test_saved_graph_loads_as_fresh_objects() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());
    rt.define(ClassDef::new("test.Holder").property("items").persistable());

    let a = new_counter(&rt)?;
    rt.dispatch(&a, "setCount", &[Value::Long(7)])?;
    let holder = rt.spawn("test.Holder", vec![("items".into(), Value::List(vec![Value::Handle(a.clone())]))]);

    let Value::Handle(writer) = rt.dispatch(&holder, "write", &[])? else { anyhow::bail!("expected a writer") };
    rt.dispatch(&writer, "option", &[s("k"), s("v1")])?;
    rt.dispatch(&writer, "option", &[s("k"), s("v2")])?;
    rt.dispatch(&writer, "save", &[s("/h")])?;

    let saved = rt.saved("/h").ok_or_else(|| anyhow::anyhow!("nothing saved"))?;
    assert_eq!(saved.class, "test.Holder");
    assert_eq!(saved.options, vec![("k".to_string(), "v2".to_string())]);
    assert_eq!(saved.fields(), vec!["items"]);

    let loaded = rt.load_component("test.Holder", "/h")?;
    assert_ne!(loaded, holder);
    let Value::List(items) = rt.dispatch(&loaded, "getItems", &[])? else { anyhow::bail!("expected a list") };
    let Value::Handle(copy) = &items[0] else { anyhow::bail!("expected a handle") };
    assert_ne!(copy, &a);
    assert_eq!(rt.dispatch(copy, "getCount", &[])?, Value::Long(7));
    Ok(())
}

#[test]
fn test_writer_options_fold_case_and_replace() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());
    let obj = new_counter(&rt)?;
    let Value::Handle(writer) = rt.dispatch(&obj, "write", &[])? else { anyhow::bail!("expected a writer") };

    rt.dispatch(&writer, "option", &[s("key"), s("v1")])?;
    rt.dispatch(&writer, "option", &[s("mode"), s("fast")])?;
    rt.dispatch(&writer, "option", &[s("KEY"), s("v2")])?;
    rt.dispatch(&writer, "save", &[s("/a")])?;
    let saved = rt.saved("/a").ok_or_else(|| anyhow::anyhow!("nothing saved"))?;
    assert_eq!(
        saved.options,
        vec![("KEY".to_string(), "v2".to_string()), ("mode".to_string(), "fast".to_string())]
    );

    rt.dispatch(&writer, "options", &[Value::Map(vec![(s("Format"), s("json"))])])?;
    rt.dispatch(&writer, "save", &[s("/b")])?;
    let saved = rt.saved("/b").ok_or_else(|| anyhow::anyhow!("nothing saved"))?;
    assert_eq!(saved.options, vec![("Format".to_string(), "json".to_string())]);

    rt.dispatch(&writer, "options", &[Value::Map(Vec::new())])?;
    rt.dispatch(&writer, "save", &[s("/c")])?;
    assert!(rt.saved("/c").is_some_and(|c| c.options.is_empty()));

    let err = rt.dispatch(&writer, "options", &[Value::Map(vec![(s("k"), Value::Int(1))])]).unwrap_err();
    assert_eq!(err.kind, FailureKind::BadArguments);
    Ok(())
}

#[test]
fn test_load_checks_class() -> anyhow::Result<()> {
    let rt = LoopbackRuntime::new();
    rt.define(counter_class());
    let obj = new_counter(&rt)?;
    let Value::Handle(writer) = rt.dispatch(&obj, "write", &[])? else { anyhow::bail!("expected a writer") };
    rt.dispatch(&writer, "save", &[s("/c")])?;

    let err = rt.load_component("test.Other", "/c").unwrap_err();
    assert_eq!(err.kind, FailureKind::Raised);
    assert!(rt.load_component("test.Counter", "/missing").is_err());
    Ok(())
}
