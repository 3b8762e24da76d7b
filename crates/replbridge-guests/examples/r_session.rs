//! Drive an R session from Rust: bind data, call a function, read results.
//!
//! Run with `RUST_LOG`-style verbosity by passing `--debug`.

use anyhow::Context;
use replbridge_core::{declare_let, EngineConfig, HostValue};
use replbridge_guests::{check_r, r};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> anyhow::Result<()> {
    let debug = std::env::args().any(|arg| arg == "--debug");
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let check = check_r();
    if !check.available {
        anyhow::bail!("R was not found on PATH");
    }
    println!("Using {}", check.version.as_deref().unwrap_or("R"));

    let engine = r::start_with(EngineConfig::new().with_verbose_logging(debug))
        .context("starting R")?;

    declare_let(&engine, "before", vec![9, 4, 5, 1])?;
    engine.set("after", vec![1, 2, 4, 5])?;

    let t_test = engine.handle("t.test");
    let result = t_test.call_with(
        &[(&engine.handle("before")).into(), (&engine.handle("after")).into()],
        &[("paired", true.into())],
    )?;

    let p_value = result.index("p.value")?.to_value()?;
    let statistic = result.index("statistic")?.to_value()?;
    println!("paired t-test: t = {:?}, p = {:?}", statistic, p_value);

    let summary = engine.handle("summary").call(&[(&engine.handle("before")).into()])?;
    match summary.to_value()? {
        HostValue::Seq(values) => println!("summary of before: {:?}", values),
        other => println!("summary of before: {:?}", other),
    }

    engine.close()?;
    Ok(())
}
