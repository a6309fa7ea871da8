//! dispatch-cli: fire one backend action and watch the follow-up dispatches
//!
//! Builds a dispatcher over a real HTTP transport, subscribes a printing
//! callback, dispatches a single request payload and waits for it to settle.
//!
//! # Usage
//!
//! ```sh
//! # POST {"id": 7} to <base>/store.load, follow-ups derived automatically
//! dispatch-cli --base http://localhost:8080/ store.load id=7
//!
//! # values parse as JSON, with a plain-string fallback
//! dispatch-cli store.save title=draft tags='["a","b"]'
//! ```

use std::process;
use std::sync::Arc;

use clap::Parser;
use rpc_dispatch::prelude::*;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Fire one backend action and print the follow-up dispatches
#[derive(Parser, Debug)]
#[command(name = "dispatch-cli")]
#[command(about = "Fire one backend action through rpc-dispatch")]
struct Args {
    /// Base URL of the backend; action names resolve below it
    #[arg(long, short, default_value = "http://localhost:8080/")]
    base: String,

    /// Backend action to invoke, e.g. "store.doSomething"
    action: String,

    /// Request body fields as key=value pairs
    fields: Vec<String>,
}

fn parse_fields(raw: &[String]) -> Result<Map<String, Value>, String> {
    let mut fields = Map::new();

    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("field {:?} is not a key=value pair", pair))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        fields.insert(key.to_string(), value);
    }

    Ok(fields)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let base = Url::parse(&args.base)?;
    let transport = Arc::new(HttpClient::new(base));
    let dispatcher = Arc::new(Dispatcher::new(transport));

    dispatcher.subscribe(|payload| match payload {
        Payload::Request(request) => {
            println!("-> {} (backend action {:?})", request.kind(), request.action());
        }
        Payload::Message(message) => {
            println!("<- {} {}", message.kind(), Value::Object(message.fields().clone()));
        }
    });

    let mut fields = parse_fields(&args.fields)?;
    fields.insert("type".into(), Value::String(args.action));

    let mut payload = Payload::from(RequestPayload::from_fields(fields)?);
    dispatcher.dispatch(&mut payload)?;

    let handle = payload
        .as_request_mut()
        .and_then(RequestPayload::take_handle)
        .ok_or("dispatch did not store a request handle")?;

    let response = handle.outcome().await?;
    println!("settled with status {}", response.status);

    Ok(())
}
