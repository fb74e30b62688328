//! Builds a two-stage pipeline in a loopback runtime on another thread, saves
//! it, loads it back and prints what came back.

mod ml;

use std::sync::Arc;

use tether::Bridge;
use tether::BridgeConfig;
use tether::Loadable;
use tether::Persistable;
use tether::Transport;
use tether::Wrapper;
use tether::channel::channel;
use tether_loopback::LoopbackRuntime;

use ml::LogisticRegression;
use ml::Pipeline;
use ml::Tokenizer;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tether=debug")),
        )
        .init();

    let config = BridgeConfig::from_env();
    let runtime = Arc::new(LoopbackRuntime::with_config(&config));
    ml::define(&runtime);

    let (transport, inbox) = channel();
    let served = Arc::clone(&runtime);
    let server = std::thread::spawn(move || inbox.serve(|bytes| served.call(bytes)));

    let bridge = Bridge::builder(transport)
        .config(config)
        .register::<Pipeline>()?
        .register::<Tokenizer>()?
        .register::<LogisticRegression>()?
        .build();

    let tokenizer: Tokenizer = bridge.create(&[])?;
    tokenizer.set_input_col("text")?.set_output_col("words")?;
    let lr: LogisticRegression = bridge.create(&[])?;
    lr.set_max_iter(10)?.set_reg_param(0.01)?;
    let pipeline: Pipeline = bridge.create(&[])?;
    pipeline.set_stages(&[&tokenizer, &lr])?;

    let path = "/tmp/tether-demo/pipeline";
    let mut writer = pipeline.write()?;
    writer.option("format", "json").overwrite()?.save(path)?;
    tracing::info!(path, state = ?writer.state(), "pipeline saved");

    let loaded = Pipeline::load(&bridge, path)?;
    println!("loaded {} as {}", Pipeline::FOREIGN_CLASS, loaded.handle());
    for stage in loaded.stages()? {
        if stage.is::<Tokenizer>() {
            let t = stage.downcast::<Tokenizer>()?;
            println!("  tokenizer {} reads '{}'", t.handle(), t.input_col()?);
        } else if stage.is::<LogisticRegression>() {
            let l = stage.downcast::<LogisticRegression>()?;
            println!("  logistic regression {} runs {} iterations", l.handle(), l.max_iter()?);
        } else {
            println!("  {:?}", stage);
        }
    }

    drop(loaded);
    drop(lr);
    drop(tokenizer);
    drop(pipeline);
    drop(writer);
    drop(bridge);
    server.join().map_err(|_| anyhow::anyhow!("loopback thread panicked"))?;
    println!("{} calls served", runtime.journal().len());
    Ok(())
}
