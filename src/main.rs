//! RFC 8040 RESTCONF protocol server

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rust_restconf::codec::Format;
use rust_restconf::datastore::Datastore;
use rust_restconf::handler::RequestHandler;
use rust_restconf::schema::SchemaTree;
use rust_restconf::server::{self, ServerState, YANG_LIBRARY_VERSION};

#[derive(Debug, Parser)]
#[command(name = "rust-restconf", about = "open RESTCONF server")]
struct Cli {
    /// bind to address:port
    #[arg(short = 'b', long, default_value = "0.0.0.0:8080")]
    bind_address: String,

    /// schema manifest files to load
    #[arg(short = 'f', long = "file", required = true)]
    files: Vec<PathBuf>,

    /// startup data formatted to json, xml or yaml
    #[arg(long)]
    startup: Option<PathBuf>,

    /// startup data format [xml, json, yaml]
    #[arg(long, default_value = "json")]
    startup_format: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let schema = match SchemaTree::load(&cli.files) {
        Ok(schema) => schema,
        Err(err) => fatal(&format!("error in loading: {}", err)),
    };
    for file in &cli.files {
        tracing::info!(manifest = %file.display(), "module loaded");
    }

    let datastore = Datastore::new(Arc::clone(&schema.data));
    let handler = match RequestHandler::new(&schema, datastore) {
        Ok(handler) => handler,
        Err(err) => fatal(&format!("route installation failed: {}", err)),
    };

    if let Some(path) = &cli.startup {
        let format = match cli.startup_format.as_str() {
            "json" => Format::Json,
            "xml" => Format::Xml,
            "yaml" => Format::Yaml,
            other => fatal(&format!("unknown startup format {:?}", other)),
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => fatal(&format!("{}: {}", path.display(), err)),
        };
        if let Err(err) = handler.load_startup(&bytes, format) {
            fatal(&format!("{}: {}", path.display(), err));
        }
        tracing::info!(startup = %path.display(), format = %format, "startup data loaded");
    }

    let state = ServerState {
        handler: Arc::new(handler),
        yang_library_version: YANG_LIBRARY_VERSION.to_string(),
    };
    if let Err(err) = server::serve(&cli.bind_address, state).await {
        fatal(&err.to_string());
    }
}

fn fatal(message: &str) -> ! {
    tracing::error!("restconf: {}", message);
    process::exit(1);
}
