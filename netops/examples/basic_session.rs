//! Basic example: open a session to one switch and look around.
//!
//! Tries SSH first and falls back to Telnet, reports the mode after each
//! transition, lists interfaces from `show interfaces status` and, if asked,
//! sets a description on the ones matching a pattern.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example basic_session -- --host 192.168.1.1 --user admin --password secret
//! ```
//!
//! Describe every gigabit port (and save):
//! ```bash
//! cargo run --example basic_session -- --host switch1 --user admin --password secret \
//!     --describe '^Gi' --description 'access port'
//! ```

use std::env;
use std::time::Duration;

use netops::{Credentials, Mode, ParseOutput, Session, TransportKind};
use regex::Regex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = Session::builder(&args.host).timeout(Duration::from_secs(args.timeout));
    if let Some(kind) = args.transport {
        builder = builder.transports([kind]);
    }
    let mut session = builder.build()?;

    println!("Connecting to {}...", args.host);
    session
        .open(Credentials::new(&args.user, &args.password))
        .await?;
    if let Some(kind) = session.transport_kind() {
        println!("Connected over {}", kind);
    }

    println!("Initial mode: {}", session.get_mode().await?);
    session.ensure_mode(Mode::Privileged).await?;
    println!("After enable: {}", session.get_mode().await?);

    println!("Round trip: {:?}", session.latency().await?);

    println!("\n{}", "-".repeat(50));
    match session.get_parsed("interfaces status").await? {
        ParseOutput::Records(records) => {
            for record in &records {
                println!(
                    "{}{:<10} {:<14} vlan {}",
                    record.get("short_type").unwrap_or_default(),
                    record.get("port_number").unwrap_or_default(),
                    record.get("status").unwrap_or_default(),
                    record.get("vlan").unwrap_or_default(),
                );
            }
        }
        ParseOutput::Raw(text) => println!("{}", text),
    }
    println!("{}", "-".repeat(50));

    if let Some(pattern) = &args.describe {
        let pattern = Regex::new(pattern)?;
        let description = args.description.clone();
        let visited = session
            .interfaces(&pattern, async |s, _record| {
                s.set("description", &description).await?;
                Ok(())
            })
            .await?;
        println!("\nDescribed {} interfaces: {}", visited.len(), visited.join(", "));

        session.write().await?;
        println!("Configuration saved");
    }

    println!("\nClosing session...");
    session.close().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    user: String,
    password: String,
    transport: Option<TransportKind>,
    timeout: u64,
    describe: Option<String>,
    description: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = String::new();
        let mut transport = None;
        let mut timeout = 10u64;
        let mut describe = None;
        let mut description = "managed by netops".to_string();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => host = value.unwrap_or(host),
                "--user" | "-u" => user = value.unwrap_or(user),
                "--password" | "-P" => password = value.unwrap_or_default(),
                "--transport" => match value.as_deref().map(str::parse::<TransportKind>) {
                    Some(Ok(kind)) => transport = Some(kind),
                    Some(Err(e)) => eprintln!("{}", e),
                    None => {}
                },
                "--timeout" | "-t" => {
                    timeout = value.and_then(|v| v.parse().ok()).unwrap_or(timeout)
                }
                "--describe" => describe = value,
                "--description" => description = value.unwrap_or(description),
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Self {
            host,
            user,
            password,
            transport,
            timeout,
            describe,
            description,
        }
    }

    fn print_help() {
        println!(
            r#"netops basic_session example

USAGE:
    cargo run --example basic_session -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Target host or serial device [default: localhost]
    -u, --user <USER>          Username [default: $USER]
    -P, --password <PASS>      Password (also used for enable)
    --transport <KIND>         Only try ssh, telnet or serial
    -t, --timeout <SECS>       Prompt timeout [default: 10]
    --describe <REGEX>         Set a description on matching interfaces
    --description <TEXT>       Description to set [default: managed by netops]
    --help                     Print this help message
"#
        );
    }
}
