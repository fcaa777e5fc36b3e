mod debug_report;

use ratecard::{Outcome, PriceResolver, Settings, load_snapshot};
use serde_json::json;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: invalid settings: {err}");
            return ExitCode::from(1);
        }
    };
    init_tracing(&settings.log_level);

    if cli.no_cache {
        settings.cache_enabled = false;
    }
    let rates = cli.rates.clone().unwrap_or_else(|| settings.rates_path.clone());

    let resolver = PriceResolver::from_settings(&settings);
    let loaded = load_snapshot(&rates)
        .map_err(|err| err.to_string())
        .and_then(|services| resolver.load(services).map_err(|err| err.to_string()));
    if let Err(err) = loaded {
        eprintln!("error: cannot load rate tables from {}: {err}", rates.display());
        return ExitCode::from(1);
    }

    if cli.list {
        let services = resolver.services();
        if cli.json {
            print_json(&json!({ "services": services }));
        } else {
            debug_report::print_services(&services, cli.color);
        }
        return ExitCode::SUCCESS;
    }

    let queries = match cli.query {
        Some(query) => vec![query],
        None => match read_stdin_lines() {
            Ok(lines) => lines,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::from(1);
            }
        },
    };
    if queries.is_empty() {
        eprintln!("error: no query provided\n\n{}", help_text());
        return ExitCode::from(2);
    }

    let mut failed = false;
    for query in &queries {
        let outcome = if cli.explain {
            let (outcome, details) = resolver.explain(query);
            if cli.json {
                print_json(&json!({ "query": query, "outcome": outcome_json(&outcome), "trace": details }));
            } else {
                debug_report::print_explain(query, &details, &outcome, cli.color);
            }
            outcome
        } else {
            let outcome = resolver.resolve(query);
            if cli.json {
                print_json(&json!({ "query": query, "outcome": outcome_json(&outcome) }));
            } else {
                debug_report::print_outcome(query, &outcome, cli.color);
            }
            outcome
        };
        failed |= outcome.is_err();
    }

    if failed { ExitCode::from(1) } else { ExitCode::SUCCESS }
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).try_init()
    {
        eprintln!("warning: tracing init failed: {err}");
    }
}

fn outcome_json(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Ok(found) => json!({ "status": "ok", "result": found }),
        Err(failure) => json!({ "status": "error", "error": failure }),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => eprintln!("error: failed to encode output: {err}"),
    }
}

struct CliConfig {
    query: Option<String>,
    rates: Option<PathBuf>,
    json: bool,
    explain: bool,
    list: bool,
    no_cache: bool,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut cli = CliConfig {
        query: None,
        rates: None,
        json: false,
        explain: false,
        list: false,
        no_cache: false,
        color: io::stdout().is_terminal(),
    };
    let mut args = std::env::args().skip(1).peekable();

    let set_query = |slot: &mut Option<String>, value: String| -> Result<(), String> {
        if slot.is_some() {
            return Err("error: query provided multiple times".to_string());
        }
        *slot = Some(value);
        Ok(())
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("ratecard {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => cli.color = true,
            "--no-color" => cli.color = false,
            "--json" => cli.json = true,
            "--explain" => cli.explain = true,
            "--list" => cli.list = true,
            "--no-cache" => cli.no_cache = true,
            "--rates" | "-r" => {
                let value = args.next().ok_or_else(|| "error: --rates expects a path".to_string())?;
                cli.rates = Some(PathBuf::from(value));
            }
            "--query" | "-q" => {
                let value = args.next().ok_or_else(|| "error: --query expects a value".to_string())?;
                set_query(&mut cli.query, value)?;
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    set_query(&mut cli.query, rest)?;
                }
                break;
            }
            _ if arg.starts_with("--rates=") => {
                cli.rates = Some(PathBuf::from(arg.trim_start_matches("--rates=")));
            }
            _ if arg.starts_with("--query=") => {
                set_query(&mut cli.query, arg.trim_start_matches("--query=").to_string())?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                set_query(&mut cli.query, rest)?;
                break;
            }
        }
    }

    if cli.list && cli.query.is_some() {
        return Err("error: --list does not take a query".to_string());
    }

    Ok(cli)
}

/// Non-empty stdin lines, trimmed.
fn read_stdin_lines() -> Result<Vec<String>, String> {
    let stdin = io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| format!("error: failed to read stdin: {err}"))?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "ratecard {version}

Resolve shipping prices from extracted carrier rate tables.

Usage:
  ratecard [OPTIONS] [--] <query...>
  ratecard [OPTIONS] --query <text>
  ratecard [OPTIONS] --list

Queries look like \"FedEx 2Day, Zone 5, 3 lb\". Without a query, each
non-empty line of stdin is resolved.

Options:
  -r, --rates <path>         Rate-table snapshot (JSON). Default: rates_path
                             from ratecard.toml / RATECARD_RATES_PATH.
  -q, --query <text>         Query to resolve.
  --json                     Print one JSON object per query.
  --explain                  Show the parse trace for each query.
  --list                     List loaded services and exit.
  --no-cache                 Resolve every query from scratch.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  RUST_LOG                   Log filter (falls back to log_level setting).
  RATECARD_*                 Override any setting, e.g. RATECARD_CACHE_TTL_SECS=60.

Exit codes:
  0  Every query resolved.
  1  At least one query failed, or rate tables could not be loaded.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
