//! chatscope: check AI-assistant selector specs against recorded fixtures
//! and live browser pages.

mod commands;
mod validate;

use std::path::Path;

use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("chatscope - selector specs for AI assistant chat pages");
    println!();
    println!("Usage:");
    println!("  chatscope validate <site-spec.json>");
    println!("  chatscope extract <site-spec.json> <fixture-dir> [page]");
    println!("  chatscope inspect <site-spec.json> <fixture-dir> [page]");
    println!("  chatscope live <site-spec.json> <devtools-ws-url> [page]");
    println!("  chatscope help");
    println!();
    println!("Commands:");
    println!("  validate   Load a site spec and list its pages and elements");
    println!("  extract    Run the read-only automator calls on a fixture's HTML");
    println!("  inspect    Report which selector candidate each element binds to");
    println!("  live       Attach to a page target over CDP and print a snapshot");
    println!();
    println!("[page] defaults to 'chat' for /c/ URLs and 'landing' otherwise;");
    println!("live picks the page whose urlGlob matches the current URL.");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                        Log filter (default: info)");
    println!("  CHATSCOPE_LOGIN_TIMEOUT_MS      wait_for_login budget (default: 300000)");
    println!("  CHATSCOPE_RESPONSE_TIMEOUT_MS   wait_for_response budget (default: 60000)");
    println!("  CHATSCOPE_POLL_INTERVAL_MS      Wait polling interval (default: 100)");
    println!("  CHATSCOPE_MAX_DEPTH             Nested field limit (default: 32)");
}

fn require<'a>(args: &'a [String], index: usize, name: &str) -> &'a str {
    match args.get(index) {
        Some(arg) => arg,
        None => {
            eprintln!("Missing argument <{}>. Use 'chatscope help' for usage.", name);
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        std::process::exit(1);
    };

    match command.as_str() {
        "validate" | "--validate" => {
            let spec = require(&args, 2, "site-spec.json");
            let report = validate::validate(Path::new(spec));
            validate::print_report(&report);
            if !report.is_valid() {
                std::process::exit(1);
            }
        }
        "extract" => {
            let spec = require(&args, 2, "site-spec.json");
            let fixture = require(&args, 3, "fixture-dir");
            let output =
                commands::extract(Path::new(spec), Path::new(fixture), args.get(4).map(String::as_str))
                    .await?;
            commands::print_json(&output)?;
            if !commands::extraction_ok(&output) {
                std::process::exit(1);
            }
        }
        "inspect" => {
            let spec = require(&args, 2, "site-spec.json");
            let fixture = require(&args, 3, "fixture-dir");
            let report =
                commands::inspect(Path::new(spec), Path::new(fixture), args.get(4).map(String::as_str))
                    .await?;
            commands::print_json(&report)?;
            if !report.is_complete() {
                tracing::warn!("Unresolved elements: {}", report.failures().join(", "));
                std::process::exit(1);
            }
        }
        "live" => {
            let spec = require(&args, 2, "site-spec.json");
            let ws_url = require(&args, 3, "devtools-ws-url");
            let snapshot =
                commands::live(Path::new(spec), ws_url, args.get(4).map(String::as_str)).await?;
            commands::print_json(&snapshot)?;
        }
        "--help" | "-h" | "help" => print_usage(),
        other => {
            eprintln!("Unknown command: {}. Use 'chatscope help' for usage.", other);
            std::process::exit(1);
        }
    }

    Ok(())
}
