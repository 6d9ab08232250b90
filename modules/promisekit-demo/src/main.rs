use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use promisekit_emitter::{load_config, AsyncEventEmitter, EmitterConfig, ListenerOptions};
use promisekit_series::{debounce, delay};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("promisekit=info".parse()?))
        .init();

    info!("promisekit demo starting...");

    // Optional --config <path>, otherwise PROMISEKIT_* from the environment
    let config = match std::env::args().nth(1).as_deref() {
        Some("--config") => {
            let path = std::env::args()
                .nth(2)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("--config requires a path to a TOML file"))?;
            load_config(&path)?
        }
        _ => EmitterConfig::from_env()?,
    };
    config.log_summary();

    let emitter: AsyncEventEmitter = AsyncEventEmitter::with_config(config);

    emitter.on_with("order.placed", ListenerOptions::last(), |args: Vec<Value>| async move {
        anyhow::Ok(json!({ "audit": args.len() }))
    });
    emitter.on("order.placed", |args: Vec<Value>| async move {
        let total = args.first().and_then(Value::as_f64).unwrap_or_default();
        delay(Duration::from_millis(20)).await;
        anyhow::Ok(json!(total > 100.0))
    });
    emitter.on("order.placed", |_args: Vec<Value>| async move {
        anyhow::Ok(Value::Null)
    });

    let args = vec![json!(120), json!("eur")];

    let all = emitter.emit("order.placed", args.clone()).await?;
    println!("\n=== emit ===");
    println!("{}", Value::Array(all));

    let any = emitter.emit_or("order.placed", args.clone()).await?;
    println!("\n=== emit_or ===");
    println!("{any}");

    let every = emitter.emit_and("order.placed", args).await?;
    println!("\n=== emit_and ===");
    println!("{every}");

    let nothing = emitter.emit("order.cancelled", Vec::new()).await?;
    println!("\n=== emit (no listeners) ===");
    println!("{}", Value::Array(nothing));

    let search = debounce(
        |query: String| async move { Ok::<_, String>(format!("results for '{query}'")) },
        Duration::from_millis(50),
    );
    let burst: Vec<_> = ["p", "pr", "pro", "prom"]
        .into_iter()
        .map(|query| search.call(query.to_string()))
        .collect();

    println!("\n=== debounced burst ===");
    for (i, call) in burst.into_iter().enumerate() {
        match call.await {
            Ok(found) => println!("call #{i}: {found}"),
            Err(e) => println!("call #{i}: {e}"),
        }
    }

    info!("promisekit demo finished");
    Ok(())
}
