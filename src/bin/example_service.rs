//! Serves the `Echo` and `Math` services declared in `schemas/example.json`.
//!
//! ```bash
//! example_service 127.0.0.1:9090 &
//! printf 'ONE\n' | dyncall 127.0.0.1 9090 Echo ping --schema schemas/example.json
//! ```
use async_trait::async_trait;
use dyncall::logger;
use dyncall::server::{ServerBuilder, ServiceHandler};
use dyncall::value::{Record, Value};
use log::LevelFilter;

pub struct Echo;

#[async_trait]
impl ServiceHandler for Echo {
    async fn call(&self, method: &str, args: Vec<Option<Value>>) -> Result<Option<Value>, String> {
        match (method, args.as_slice()) {
            ("ping", [Some(Value::Enum(count))]) => {
                Ok(Some(Value::String(format!("pong x{}", count.value))))
            }
            ("ping", [None]) => Ok(Some(Value::String("pong".into()))),
            ("greet", [Some(Value::Record(who))]) => {
                let name = who.get("name").and_then(Value::as_str).unwrap_or("stranger");
                let reply = Record::new("Person")
                    .with(1, "name", Value::String(format!("Hello, {name}")));
                Ok(Some(Value::Record(reply)))
            }
            _ => Err(format!("Invalid call: {method} with {} argument(s)", args.len())),
        }
    }
}

pub struct Math;

#[async_trait]
impl ServiceHandler for Math {
    async fn call(&self, method: &str, args: Vec<Option<Value>>) -> Result<Option<Value>, String> {
        match (method, args.as_slice()) {
            ("sumList", [Some(Value::List(values))]) => {
                let sum = values
                    .iter()
                    .filter_map(|v| v.as_record()?.get("value")?.as_i64())
                    .sum();
                Ok(Some(Value::I64(sum)))
            }
            ("sumList", [None]) => Ok(Some(Value::I64(0))),
            ("distinct", [Some(Value::Set(values))]) => Ok(Some(Value::I32(values.len() as i32))),
            ("distinct", [None]) => Ok(Some(Value::I32(0))),
            _ => Err(format!("Invalid call: {method} with {} argument(s)", args.len())),
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    logger::setup_logger(LevelFilter::Info);
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9090".to_string());

    let server = ServerBuilder::new()
        .add("Echo", Echo)
        .add("Math", Math)
        .bind(addr.as_str())
        .await?;
    println!("Example services listening on {}", server.local_addr()?);
    server.run().await
}
