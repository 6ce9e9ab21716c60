use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use coinflow_core::attribution::{PoolOptions, execute_pool_resolution, select_pools};
use coinflow_core::config::{AppConfig, load_or_default};
use coinflow_core::report::{ReportFormat, generate_pool_report, generate_walk_report, save_report};
use coinflow_core::taint::{TaintOptions, execute_taint_walk};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

pub fn print_banner() {
    println!(
        "{}",
        r#"
                 _          __ _
   ___ ___  _ __(_)_ __    / _| | _____      __
  / __/ _ \| '_ \ | '_ \  | |_| |/ _ \ \ /\ / /
 | (_| (_) | | | | | | | |  _| | (_) \ V  V /
  \___\___/|_| |_|_|_| |_| |_| |_|\___/ \_/\_/
"#
        .bright_cyan()
        .bold()
    );
    println!(
        "  {} {}\n",
        "coinflow".bright_white().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

/// Expand a leading `~` in a user supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Read `--config` when present, otherwise start from the defaults.
pub fn load_base_config(args: &ArgMatches) -> Result<AppConfig> {
    let path = args.get_one::<String>("config").map(|p| expand_path(p));
    load_or_default(path.as_deref()).with_context(|| match path {
        Some(ref p) => format!("Loading configuration from {}", p.display()),
        None => "Loading default configuration".to_string(),
    })
}

fn base_url_arg(args: &ArgMatches) -> Option<String> {
    args.get_one::<Url>("base-url")
        .map(|url| url.as_str().trim_end_matches('/').to_string())
}

/// Configuration for `coinflow taint`: file values overridden by flags.
pub fn taint_config_from_args(args: &ArgMatches) -> Result<AppConfig> {
    let mut config = load_base_config(args)?;

    if let Some(seed) = args.get_one::<String>("seed") {
        config.seed_id = seed.trim().to_string();
    }
    if let Some(steps) = args.get_one::<usize>("steps") {
        config.steps = *steps;
    }
    if let Some(threads) = args.get_one::<usize>("threads") {
        config.max_workers = *threads;
    }
    if let Some(base_url) = base_url_arg(args) {
        config.base_url = base_url;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.request_timeout_secs = *timeout;
    }
    if args.get_flag("dedupe") {
        config.dedupe = true;
    }

    config.validate()?;
    Ok(config)
}

/// Configuration for `coinflow pools`: file values overridden by flags.
pub fn pool_config_from_args(args: &ArgMatches) -> Result<AppConfig> {
    let mut config = load_base_config(args)?;

    if let Some(threads) = args.get_one::<usize>("threads") {
        config.max_workers = *threads;
    }
    if let Some(base_url) = base_url_arg(args) {
        config.base_url = base_url;
    }
    if let Some(attempts) = args.get_one::<u32>("max-attempts") {
        config.retry.max_attempts = *attempts;
    }
    if let Some(proxies) = args.get_many::<Url>("proxy") {
        config.proxies = proxies.map(|proxy| proxy.to_string()).collect();
    }

    config.validate()?;
    Ok(config)
}

pub fn report_format(args: &ArgMatches) -> Result<ReportFormat> {
    let format = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    ReportFormat::from_str(format).ok_or_else(|| anyhow!("Unknown report format '{}'", format))
}

/// Write the report to `--output` or stdout.
pub fn emit_report(content: &str, output: Option<&String>) -> Result<()> {
    match output {
        Some(output) => {
            let path = expand_path(output);
            save_report(content, &path)
                .with_context(|| format!("Writing report to {}", path.display()))?;
            eprintln!(
                "{} Report written to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn step_printer(quiet: bool) -> Option<Arc<dyn Fn(String) + Send + Sync>> {
    if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            eprintln!("  {} {}", "→".blue(), msg);
        }))
    }
}

pub async fn handle_taint(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = taint_config_from_args(args)?;
    let format = report_format(args)?;

    if !quiet {
        print_divider();
        eprintln!("{}", "  TAINT WALK".bright_white().bold());
        print_divider();
        eprintln!("{} Explorer: {}", "→".blue(), config.base_url.bright_white());
        eprintln!("{} Seed: {}", "→".blue(), config.seed_id.bright_white());
        eprintln!(
            "{} Steps: {}  Workers: {}  Timeout: {}s{}",
            "→".blue(),
            config.steps.to_string().cyan(),
            config.max_workers.to_string().cyan(),
            config.request_timeout_secs.to_string().cyan(),
            if config.dedupe { "  (deduplicated)" } else { "" }
        );
        eprintln!();
    }

    let options = TaintOptions {
        config,
        show_progress_bars: !quiet,
    };
    let run = execute_taint_walk(options, step_printer(quiet))
        .await
        .context("Taint walk failed")?;

    if !quiet {
        eprintln!(
            "\n{} Taint walk complete: {} nodes, {} degraded\n",
            "✓".green().bold(),
            run.graph.len().to_string().cyan(),
            run.degraded.to_string().yellow()
        );
    }

    let report = generate_walk_report(&run, format)?;
    emit_report(&report, args.get_one::<String>("output"))
}

pub async fn handle_pools(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = pool_config_from_args(args)?;
    let format = report_format(args)?;
    let names: Vec<String> = args
        .get_many::<String>("pool")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let pools = select_pools(&names)?;

    if !quiet {
        print_divider();
        eprintln!("{}", "  POOL ATTRIBUTION".bright_white().bold());
        print_divider();
        eprintln!("{} Explorer: {}", "→".blue(), config.base_url.bright_white());
        for pool in &pools {
            eprintln!("  {} {} ({})", "•".yellow(), pool.name.bright_white(), pool.wallet);
        }
        eprintln!(
            "{} Workers: {}  Attempts per page: {}  Proxies: {}",
            "→".blue(),
            config.max_workers.to_string().cyan(),
            config.retry.max_attempts.to_string().cyan(),
            config.proxies.len().to_string().cyan()
        );
        eprintln!();
    }

    let options = PoolOptions {
        config,
        pools,
        show_progress_bars: !quiet,
    };
    let run = execute_pool_resolution(options, step_printer(quiet))
        .await
        .context("Pool resolution failed")?;

    if !quiet {
        eprintln!(
            "\n{} Attributed {} addresses\n",
            "✓".green().bold(),
            run.attribution.len().to_string().cyan()
        );
    }

    let report = generate_pool_report(&run, format)?;
    emit_report(&report, args.get_one::<String>("output"))
}
