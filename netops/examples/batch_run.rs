//! Batch example: run one `show` command on many hosts at once.
//!
//! Every host gets its own session; at most `--concurrency` run at a time.
//! An optional YAML parser tree is loaded once and shared by all sessions.
//! Unreachable hosts and rejected commands are reported per host without
//! stopping the run.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example batch_run -- --user admin --password secret \
//!     --hosts 10.0.0.1,10.0.0.2,10.0.0.3 --show "interfaces status"
//! ```
//!
//! With a custom parser tree:
//! ```bash
//! cargo run --example batch_run -- --user admin --password secret \
//!     --hosts-file switches.txt --parser parsers.yaml --show "ip interface brief"
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use netops::{Credentials, ParseOutput, ParserTree, Session, batch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut hosts = args.hosts.clone();
    if let Some(path) = &args.hosts_file {
        let contents = std::fs::read_to_string(path)?;
        hosts.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    if hosts.is_empty() {
        eprintln!("Error: no hosts given (use --hosts or --hosts-file)");
        std::process::exit(1);
    }

    let parser = match &args.parser {
        Some(path) => Arc::new(ParserTree::from_yaml_str(&std::fs::read_to_string(path)?)?),
        None => Arc::new(ParserTree::builtin()),
    };
    let credentials = Credentials::new(&args.user, &args.password);

    println!(
        "Running 'show {}' on {} hosts ({} at a time)\n",
        args.show,
        hosts.len(),
        args.concurrency
    );

    let results = batch::run_per_host(hosts, args.concurrency, |host| {
        let parser = parser.clone();
        let credentials = credentials.clone();
        let item = args.show.clone();
        let timeout = Duration::from_secs(args.timeout);
        async move {
            let mut session = Session::builder(host)
                .timeout(timeout)
                .parser(parser)
                .build()?;
            session.open(credentials).await?;
            let output = session.privileged(async |s| s.get_parsed(&item).await).await;
            session.close().await?;
            output
        }
    })
    .await;

    let mut failed = 0;
    for (host, result) in results {
        match result {
            Ok(ParseOutput::Records(records)) => {
                println!("{}: {} records", host, records.len());
                for record in records {
                    let fields: Vec<String> = record
                        .named()
                        .map(|(name, value)| format!("{}={}", name, value.unwrap_or("-")))
                        .collect();
                    println!("    {}", fields.join(" "));
                }
            }
            Ok(ParseOutput::Raw(text)) => {
                println!("{}: {} lines (no parser)", host, text.lines().count());
            }
            Err(e) if e.is_transport_unavailable() => {
                failed += 1;
                eprintln!("{}: unreachable: {}", host, e);
            }
            Err(e) if e.is_invalid_input() => {
                failed += 1;
                eprintln!("{}: command rejected", host);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", host, e);
            }
        }
    }

    if failed > 0 {
        eprintln!("\n{} hosts failed", failed);
        std::process::exit(2);
    }
    Ok(())
}

/// Simple argument parser
struct Args {
    hosts: Vec<String>,
    hosts_file: Option<String>,
    user: String,
    password: String,
    show: String,
    parser: Option<String>,
    concurrency: usize,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            hosts: Vec::new(),
            hosts_file: None,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            show: "version".to_string(),
            parser: None,
            concurrency: 8,
            timeout: 10,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned().unwrap_or_default();
            match args[i].as_str() {
                "--hosts" => parsed.hosts.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|h| !h.is_empty())
                        .map(str::to_string),
                ),
                "--hosts-file" => parsed.hosts_file = Some(value),
                "--user" | "-u" => parsed.user = value,
                "--password" | "-P" => parsed.password = value,
                "--show" => parsed.show = value,
                "--parser" => parsed.parser = Some(value),
                "--concurrency" | "-c" => {
                    parsed.concurrency = value.parse().unwrap_or(parsed.concurrency)
                }
                "--timeout" | "-t" => parsed.timeout = value.parse().unwrap_or(parsed.timeout),
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

        parsed
    }

    fn print_help() {
        println!(
            r#"netops batch_run example

USAGE:
    cargo run --example batch_run -- [OPTIONS]

OPTIONS:
    --hosts <H1,H2,...>        Comma-separated hosts
    --hosts-file <PATH>        File with one host per line
    -u, --user <USER>          Username [default: $USER]
    -P, --password <PASS>      Password (also used for enable)
    --show <ITEM>              What to show [default: version]
    --parser <PATH>            YAML parser tree [default: built-in]
    -c, --concurrency <N>      Sessions in flight [default: 8]
    -t, --timeout <SECS>       Prompt timeout [default: 10]
    --help                     Print this help message
"#
        );
    }
}
