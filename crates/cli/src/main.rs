use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use rtrack_api::{InProcApi, RuntimeConfig, ViewApi};
use rtrack_core::{COUNTRY_DEPENDENCIES, METRIC_DEPENDENCIES};
use rtrack_nav::{resolve, NavigationIntent, TabMachine};
use rtrack_query::{decode, encode, overlay, Location};
use rtrack_select::{Score, Selected};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rtrackctl", version, about = "rtrack view-state CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a query string into view state
    Decode {
        /// Query string, leading '?' optional
        query: String,
    },
    /// Re-encode a query after applying changes
    Encode {
        /// Starting query string
        query: String,
        /// Params to set, e.g. "benchmark=best&tab=1"
        #[arg(long = "set", default_value = "")]
        set: String,
        /// Param keys to delete (repeatable)
        #[arg(long = "delete")]
        delete: Vec<String>,
    },
    /// Resolve a navigation from a current location
    Navigate {
        /// Current location, e.g. "/country/USA?tab=2"
        current: String,
        /// Target path, optionally with query
        target: String,
        #[arg(long = "keep-tab", action = ArgAction::SetTrue)]
        keep_tab: bool,
        /// Param keys to delete (repeatable)
        #[arg(long = "delete")]
        delete: Vec<String>,
    },
    /// Country report from the data directory
    Report {
        /// ISO3 country code
        country: String,
        /// View query, e.g. "standard=hi&benchmark=best"
        #[arg(long = "query", default_value = "")]
        query: String,
    },
    /// Country ranking for one metric
    Metric {
        /// Metric code (dimension, right or indicator)
        code: String,
        #[arg(long = "query", default_value = "")]
        query: String,
    },
    /// List datasets found in the data directory
    Datasets,
}

fn init_tracing() {
    let env = std::env::var("RTRACK_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(cfg: &RuntimeConfig) {
    if let Some(addr) = cfg.metrics_addr.as_deref() {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid RTRACK_METRICS_ADDR; expected host:port");
        }
    }
}

fn fmt_score(s: &Score) -> String {
    let value = s.display.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string());
    let mut out = format!("{:<24} {:>7}", s.metric, value);
    if let Some((lo, hi)) = s.band { out.push_str(&format!("  [{:.1}, {:.1}]", lo, hi)); }
    if s.out_of_range { out.push_str("  (clamped)"); }
    if s.has_fallback() {
        let f: Vec<String> = s.fallbacks.iter().map(|f| format!("{:?}", f).to_lowercase()).collect();
        out.push_str(&format!("  fallback: {}", f.join(",")));
    }
    out
}

async fn loaded_api(cfg: &RuntimeConfig, start: Location, deps: &[&str]) -> Result<InProcApi> {
    let api = InProcApi::from_config(cfg);
    api.navigate(NavigationIntent::to(start.href()));
    api.ensure_loaded(deps);
    let r = api.wait_ready(deps, cfg.wait()).await;
    if !r.pending.is_empty() {
        return Err(anyhow!("timed out after {}s waiting for: {}", cfg.wait_secs, r.pending.join(", ")));
    }
    if !r.failed.is_empty() {
        warn!(failed = ?r.failed, "some datasets failed; output is degraded");
    }
    Ok(api)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = RuntimeConfig::from_env();
    init_metrics(&cfg);
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { query } => {
            let v = decode(&query);
            match cli.output {
                Output::Human => {
                    println!("tab:       {}", v.tab.as_ref().map(|t| t.to_string()).unwrap_or_else(|| "-".into()));
                    println!("scale:     {}", v.scale);
                    println!("standard:  {}", v.standard);
                    println!("benchmark: {}", v.benchmark);
                    println!("raw:       {}", v.raw);
                    for (k, val) in v.filters.iter() { println!("filter:    {}={}", k, val); }
                    for (k, vals) in v.extra.iter() { println!("extra:     {}={}", k, vals.join(",")); }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&v)?),
            }
        }
        Commands::Encode { query, set, delete } => {
            let prev = decode(&query);
            let next = overlay(prev.clone(), &set);
            let delete: BTreeSet<String> = delete.into_iter().collect();
            let out = encode(&next, &prev, &delete);
            match cli.output {
                Output::Human => println!("{}", out),
                Output::Json => println!("{}", serde_json::json!({ "query": out })),
            }
        }
        Commands::Navigate { current, target, keep_tab, delete } => {
            let current = Location::parse(&current);
            let intent = NavigationIntent::to(target).keep_tab(keep_tab).delete(delete);
            let next = resolve(&intent, &current);
            let tabs = TabMachine::for_location(&next);
            match cli.output {
                Output::Human => {
                    println!("{}", next.href());
                    if let Some(key) = tabs.active_key(&next.view_state()) { println!("tab: {}", key); }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&next)?),
            }
        }
        Commands::Report { country, query } => {
            let start = Location::new(&format!("/country/{}", country), &query);
            let api = loaded_api(&cfg, start, COUNTRY_DEPENDENCIES).await?;
            let vm = api.entity_view_model(&country);
            match (cli.output, &vm) {
                (Output::Json, _) => println!("{}", serde_json::to_string_pretty(&vm)?),
                (Output::Human, Selected::Ready(m)) => {
                    println!("{} ({})", country.to_ascii_uppercase(), m.income_group.unwrap_or("-"));
                    println!(
                        "scale={} standard={} benchmark={} raw={}",
                        m.options.scale, m.options.standard, m.options.benchmark, m.options.raw
                    );
                    for s in m.options.substitutions.iter() {
                        println!("note: {}={} unknown; using {}", s.param, s.requested, s.used);
                    }
                    println!("-- summary (esr {:?}, cpr {:?})", m.esr_year, m.cpr_year);
                    for s in m.summary.iter() { println!("{}", fmt_score(s)); }
                    if !m.indicators.is_empty() {
                        println!("-- indicators");
                        for s in m.indicators.iter() { println!("{}", fmt_score(s)); }
                    }
                    for r in m.at_risk.iter() {
                        let groups: Vec<&str> = r.groups.iter().map(|g| g.group.as_str()).collect();
                        println!("at risk ({}): {}", r.right, groups.join(", "));
                    }
                    if !m.degraded.is_empty() { println!("degraded: {}", m.degraded.join(", ")); }
                }
                (Output::Human, Selected::Absent) => eprintln!("unknown country: {}", country),
                (Output::Human, Selected::NotReady { pending }) => eprintln!("not ready: {}", pending.join(", ")),
            }
        }
        Commands::Metric { code, query } => {
            let start = Location::new(&format!("/metric/{}", code), &query);
            let api = loaded_api(&cfg, start, METRIC_DEPENDENCIES).await?;
            let vm = api.metric_view_model(&code);
            match (cli.output, &vm) {
                (Output::Json, _) => println!("{}", serde_json::to_string_pretty(&vm)?),
                (Output::Human, Selected::Ready(m)) => {
                    println!("{} ({:?}, year {:?})", m.metric, m.dimension, m.year);
                    for r in m.ranking.iter() { println!("{:>3}. {} {}", r.rank, r.country, fmt_score(&r.score)); }
                }
                (Output::Human, Selected::Absent) => eprintln!("unknown metric: {}", code),
                (Output::Human, Selected::NotReady { pending }) => eprintln!("not ready: {}", pending.join(", ")),
            }
        }
        Commands::Datasets => {
            let files = rtrack_fetch::discover(&cfg.data_dir).await?;
            match cli.output {
                Output::Human => {
                    for f in files.iter() { println!("{:<24} {:?} {} bytes", f.name, f.format, f.bytes); }
                    let missing: Vec<&str> =
                        COUNTRY_DEPENDENCIES.iter().copied().filter(|d| !files.iter().any(|f| f.name == *d)).collect();
                    if !missing.is_empty() { println!("missing for country reports: {}", missing.join(", ")); }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&files)?),
            }
        }
    }
    Ok(())
}
