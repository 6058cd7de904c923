//! Ask the router one question from the command line
//!
//! Prints every router event as one JSON line on stdout; logs go to stderr.
//!
//! Usage:
//!   cargo run --features cli --bin ask -- \
//!     "Which ad groups have the highest cost per click?" \
//!     --user-id analyst-7 \
//!     --schema-file docs/neo4j_schema.md
//!
//! Configuration comes from the environment (or `.env`): `OPENAI_API_KEY`,
//! `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD`, ...

use std::path::PathBuf;

use clap::Parser;
use futures::StreamExt;

use adgraph_router::{Router, RouterConfig};

/// Classify a question and stream the router's events
#[derive(Parser, Debug)]
#[command(name = "ask")]
struct Args {
    /// Natural-language question
    query: String,

    /// Conversation owner, used for classifier history
    #[arg(long, env = "ROUTER_USER_ID", default_value = "cli-user")]
    user_id: String,

    /// Schema file for both workflows (overrides SCHEMA_FILE)
    #[arg(long)]
    schema_file: Option<PathBuf>,

    /// Emit the "workflow started" marker events
    #[arg(long)]
    stage_markers: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = RouterConfig::from_env()?;
    if let Some(schema) = args.schema_file {
        config = config.schema_file(schema);
    }
    if args.stage_markers {
        config = config.emit_stage_markers(true);
    }

    let router = Router::from_config(&config)?;
    let mut events = router.run(args.query, args.user_id);

    let mut failed = false;
    while let Some(event) = events.next().await {
        failed |= event.is_error();
        println!("{}", serde_json::to_string(&event)?);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
