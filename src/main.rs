//! SBDP command-line tool
//!
//! Encodes and decodes frames from the shell and runs a loopback demo.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sbdp::config::{self, Config};
use sbdp::protocol::{self, Message, Value};
use sbdp::transport::Connection;

/// SBDP - Simple Binary Dictionary Protocol
#[derive(Parser)]
#[command(name = "sbdp")]
#[command(author = "SBDP Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Encode, decode and exchange flat binary key/value messages", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode fields into a frame and print it as hex
    Encode {
        /// Fields as key:type=value (types: int64, uint64, float64, string, binary as hex)
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Decode a hex frame and print its fields
    Decode {
        /// Hex-encoded frame (read from stdin if omitted)
        frame: Option<String>,
    },

    /// Exchange a nested message with a local server over TCP
    Demo {
        /// Port to listen on (0 picks a free port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = match &config.general.log_filter {
        _ if cli.verbose => EnvFilter::new("debug"),
        Some(directive) => EnvFilter::new(directive),
        None if config.general.verbose => EnvFilter::new("debug"),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Encode { fields } => {
            let message = parse_fields(&fields)?;
            let frame = protocol::encode(&message)?;
            tracing::debug!("Encoded {} fields into {} bytes", message.len(), frame.len());
            println!("{}", hex::encode(&frame));
        }
        Commands::Decode { frame } => {
            let text = match frame {
                Some(text) => text,
                None => {
                    let mut text = String::new();
                    std::io::stdin().read_to_string(&mut text)?;
                    text
                }
            };
            let bytes = hex::decode(text.trim()).context("frame is not valid hex")?;
            let message = protocol::decode(&bytes)?;
            print_message(&message);
        }
        Commands::Demo { port } => {
            run_demo(&config, port)?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Parse `key:type=value` arguments into a message
fn parse_fields(fields: &[String]) -> anyhow::Result<Message> {
    let mut message = Message::with_capacity(fields.len());

    for field in fields {
        let (spec, literal) = field
            .split_once('=')
            .with_context(|| format!("field {:?} is missing '=value'", field))?;
        let (key, type_name) = spec
            .rsplit_once(':')
            .with_context(|| format!("field {:?} is missing ':type'", field))?;

        let value = Value::parse(type_name, literal)
            .with_context(|| format!("field {:?}", key))?;
        if message.insert(key, value).is_some() {
            tracing::warn!("Duplicate key {:?}, keeping the last value", key);
        }
    }

    Ok(message)
}

fn print_message(message: &Message) {
    for (key, value) in message.iter() {
        println!("{:?} {} {}", key, value.type_code(), value);
    }
}

/// Run the loopback demo: the client wraps an encoded message inside a
/// binary field, the server unwraps it and replies with a status.
fn run_demo(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let bind_addr = match port {
        Some(port) => format!("{}:{}", config.demo.bind_address, port),
        None => config.demo_addr(),
    };
    let listener = TcpListener::bind(&bind_addr)
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Demo server listening on {}", local_addr);

    let transport = config.transport_config();
    let server_transport = transport.clone();
    let server = thread::spawn(move || -> anyhow::Result<()> {
        let (stream, addr) = listener.accept()?;
        tracing::info!("Connection from {}", addr);
        let mut conn = Connection::with_config(stream, server_transport);

        let outer = conn.recv()?;
        println!("server received (outer): {}", outer);

        match outer.get("payload") {
            Some(Value::Bytes(inner_bytes)) => {
                let inner = protocol::decode(inner_bytes)?;
                println!("server received (inner): {}", inner);
            }
            _ => println!("server: no nested message found"),
        }

        conn.send(&Message::new().with("status", "OK"))?;
        Ok(())
    });

    let stream = TcpStream::connect(local_addr)?;
    let mut client = Connection::with_config(stream, transport);

    let inner = Message::new()
        .with("uid", 9_876_543_210u64)
        .with("note", "nested payload");
    let outer = Message::new().with("payload", protocol::encode(&inner)?);

    let reply = client.request(&outer)?;
    println!("client received: {}", reply);
    tracing::debug!("Client stats: {:?}", client.stats());

    server
        .join()
        .map_err(|_| anyhow::anyhow!("demo server thread panicked"))??;

    Ok(())
}
