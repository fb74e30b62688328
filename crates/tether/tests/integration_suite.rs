//! Integration tests for the bridge against the loopback runtime.

mod common;

use std::sync::Arc;

use tether::ErrorKind;
use tether::FailureKind;
use tether::DynWrapper;
use tether::FromForeign;
use tether::IntoForeign;
use tether::RemoteHandle;
use tether::Transport;
use tether::Value;
use tether::Wrapper;
use tether::channel::channel;
use tether::marshal::wrapper_array;

use common::LogisticRegression;
use common::Pipeline;
use common::Tokenizer;

fn echo<T>(bridge: &tether::Bridge, v: T) -> anyhow::Result<T>
where
    T: IntoForeign + FromForeign,
{
    let class = bridge.class_ref("test.Echo")?;
    Ok(class.call("echo", &[v.into_foreign()])?)
}

// --- Test 1: Scalar round trip through the foreign side ---

#[test]
fn test_scalar_round_trip_at_boundaries() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;

    for v in [i8::MIN, i8::MAX, 0, -1] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in [i16::MIN, i16::MAX, 0, -1] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in [i32::MIN, i32::MAX, 0, -1] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in [i64::MIN, i64::MAX, 0, -1] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in [f32::MIN, f32::MAX, 0.0, -1.0] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in [f64::MIN, f64::MAX, 0.0, -1.0] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in ['\0', char::MAX, 'λ'] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    for v in [true, false] {
        assert_eq!(echo(&bridge, v)?, v);
    }
    assert_eq!(echo(&bridge, String::from("héllo"))?, "héllo");
    Ok(())
}

#[test]
fn test_dynamic_narrowing_round_trip() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;
    let class = bridge.class_ref("test.Echo")?;

    let arg = bridge.marshaller().to_foreign(Box::new(-7i16))?;
    let back = bridge.marshaller().to_local(class.invoke("echo", &[arg])?);
    assert_eq!(back.downcast_ref::<i16>(), Some(&-7));
    Ok(())
}

// --- Test 2: Maps keep every entry ---

#[test]
fn test_map_round_trip_keeps_order_and_keys() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;

    let map = tether::marshal::ordered_map([("z", 1i64), ("a", 2), ("m", 3)]);
    let back = bridge.class_ref("test.Echo")?.invoke("echo", &[map.clone()])?;
    assert_eq!(back, map);
    Ok(())
}

// --- Test 3: Unknown method is a remote error ---

#[test]
fn test_unknown_method_is_remote_invocation_error() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;
    let tok: Tokenizer = bridge.create(&[])?;

    let err = tok.remote().invoke("fly", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteInvocation);
    assert_eq!(err.remote().map(|f| f.kind.clone()), Some(FailureKind::MethodNotFound));

    // the bridge stays usable after a refusal
    tok.set_input_col("text")?;
    assert_eq!(tok.input_col()?, "text");
    Ok(())
}

#[test]
fn test_wrong_result_kind_is_type_mismatch() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;
    let lr: LogisticRegression = bridge.create(&[])?;
    lr.remote().invoke("setMaxIter", &[Value::Long(10)])?;

    let err = lr.max_iter().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    Ok(())
}

// --- Test 4: Transport errors stay distinct ---

#[test]
fn test_transport_error_is_distinct_over_channel() -> anyhow::Result<()> {
    let rt = common::runtime();
    let (transport, inbox) = channel();
    let server_rt = Arc::clone(&rt);
    let server = std::thread::spawn(move || inbox.serve(|bytes| server_rt.call(bytes)));

    let bridge = tether::Bridge::new(transport.clone());
    let tok: Tokenizer = bridge.create(&[])?;
    let remote = tok.remote().invoke("fly", &[]).unwrap_err();
    assert_eq!(remote.kind(), ErrorKind::RemoteInvocation);

    drop(bridge);
    drop(tok);
    drop(transport);
    server.join().map_err(|_| anyhow::anyhow!("server thread panicked"))?;

    let (orphan, inbox) = channel();
    drop(inbox);
    let bridge = tether::Bridge::new(orphan);
    let err = bridge.class_ref("test.Echo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.remote().is_none());
    Ok(())
}

// --- Test 5: Wrapping ---

#[test]
fn test_wrap_twice_gives_independent_instances() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;
    let handle = bridge.construct(Pipeline::FOREIGN_CLASS, &[])?;
    rt.clear_journal();

    let a: Pipeline = bridge.wrap(handle.clone());
    let b: Pipeline = bridge.wrap(handle.clone());
    assert!(rt.journal().is_empty());
    assert_eq!(a.handle(), &handle);
    assert_eq!(b.handle(), &handle);
    assert_eq!(a.remote(), b.remote());
    Ok(())
}

#[test]
fn test_wrap_dynamic_recovers_concrete_types() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;

    let tok: Tokenizer = bridge.create(&[])?;
    let lr: LogisticRegression = bridge.create(&[])?;
    let pipeline: Pipeline = bridge.create(&[])?;
    pipeline.set_stages(&[&tok, &lr])?;

    let stages = pipeline.stages()?;
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0].foreign_class(), Tokenizer::FOREIGN_CLASS);
    assert!(stages[1].is::<LogisticRegression>());
    let mut stages = stages.into_iter();
    let first = stages.next().ok_or_else(|| anyhow::anyhow!("no first stage"))?;
    let tok_again = first.downcast::<Tokenizer>()?;
    assert_eq!(tok_again.handle(), tok.handle());
    Ok(())
}

#[test]
fn test_unregistered_class_is_missing_constructor() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = tether::Bridge::new(Arc::clone(&rt));
    let handle = bridge.construct(Tokenizer::FOREIGN_CLASS, &[])?;

    let err = bridge.wrap_dynamic(handle).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousOrMissingConstructor);
    Ok(())
}

// --- Test 6: Stage arrays ---

#[test]
fn test_three_stages_become_a_foreign_array_in_order() -> anyhow::Result<()> {
    let rt = common::runtime();
    let bridge = common::bridge(&rt)?;
    let stages: Vec<Tokenizer> = (0..3).map(|_| bridge.create(&[])).collect::<tether::Result<_>>()?;

    let array = wrapper_array(&stages);
    let Value::List(items) = &array else { anyhow::bail!("expected a list") };
    assert_eq!(items.len(), 3);
    for (item, stage) in items.iter().zip(&stages) {
        assert_eq!(item.as_handle(), Some(stage.handle()));
    }

    let pipeline: Pipeline = bridge.create(&[])?;
    pipeline.remote().invoke("setStages", &[array])?;
    let stored: Vec<RemoteHandle> = pipeline.remote().call("getStages", &[])?;
    let expected: Vec<RemoteHandle> = stages.iter().map(|s| s.handle().clone()).collect();
    assert_eq!(stored, expected);
    Ok(())
}
