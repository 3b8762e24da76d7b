//! Drive a Deno REPL from Rust.

use replbridge_core::HostValue;
use replbridge_guests::deno;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let engine = deno::start()?;

    let words = HostValue::from(vec!["lazy", "proxy", "handles"]);
    engine.set("words", words)?;
    let joined = engine
        .handle("words")
        .index("join")?
        .call(&[" ".into()])?;
    println!("joined: {:?}", joined.to_value()?);

    let upper = joined.index("toUpperCase")?.call(&[])?;
    println!("upper: {:?}", upper.to_value()?);

    engine.close()?;
    Ok(())
}
