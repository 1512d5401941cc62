//! Binary entry point: argument handling, report output and the summary.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use surfscan::auth::AuthConfig;
use surfscan::engine::DiscoveryEngine;
use surfscan::input::{Config, Opts};
use surfscan::model::{extract_root_domain, DiscoveryReport};
use surfscan::profile;
use surfscan::tools::runner::ProcessRunner;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone());
    opts.merge(&config);

    if opts.check_tools {
        return check_tools();
    }

    let Some(target) = opts.target.clone() else {
        bail!("--target is required (unless using --check-tools)");
    };

    if !opts.no_banner {
        print_banner();
    }

    let root_domain = extract_root_domain(&target)?;
    let overrides = opts.profile_overrides(&config);
    let profile = profile::resolve(opts.depth, &overrides)?;

    println!("{} {target}", "Target:".cyan().bold());
    println!("{} {}", "Depth:".cyan().bold(), profile.depth);

    let mut engine = DiscoveryEngine::new(profile, Arc::new(ProcessRunner));
    if let Some(path) = &opts.auth_config {
        let auth = AuthConfig::load(path)?;
        println!("{} {}", "Auth config:".cyan().bold(), path.display());
        engine = engine.with_auth(auth);
    }

    let report = engine.discover(&target, &root_domain).await?;

    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("discovery_{root_domain}.json")));
    let document = serde_json::to_string_pretty(&report)?;
    fs::write(&output, document)
        .with_context(|| format!("could not write report to {}", output.display()))?;

    println!(
        "\n{} Results saved to: {}\n",
        "✓".green().bold(),
        output.display()
    );
    print_summary(&report);
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("{}", "Checking required tools...".cyan().bold());

    let report = ProcessRunner::check_tools();
    for (tool, available) in &report {
        let status = if *available {
            "✓ installed".green()
        } else {
            "✗ missing".red()
        };
        println!("  {tool:<12} {status}");
    }

    let missing: Vec<&str> = report
        .iter()
        .filter(|(_, available)| !available)
        .map(|(tool, _)| *tool)
        .collect();
    if missing.is_empty() {
        println!("\n{}", "All required tools are installed.".green().bold());
        Ok(())
    } else {
        bail!("missing tools: {}", missing.join(", "));
    }
}

fn print_banner() {
    let banner = r"
                  __
 ___ _   _ _ __ / _|___  ___ __ _ _ __
/ __| | | | '__| |_/ __|/ __/ _` | '_ \
\__ \ |_| | |  |  _\__ \ (_| (_| | | | |
|___/\__,_|_|  |_| |___/\___\__,_|_| |_|
";
    println!("{}", banner.cyan());
    println!("{}", "Web attack surface discovery".bold());
}

fn print_summary(report: &DiscoveryReport) {
    let stats = &report.statistics;

    println!("{}", "Discovery summary".bold());
    println!("  Subdomains found      {}", stats.passive.subdomains_found);
    println!("  Live services         {}", stats.active.live_services);
    println!("  Open ports            {}", stats.ports.open_ports_found);
    println!("  URLs discovered       {}", stats.crawl.urls_discovered);
    println!("  Unique endpoints      {}", stats.crawl.unique_endpoints);
    if stats.auth.targets_crawled + stats.auth.targets_failed > 0 {
        println!("  Authenticated URLs    {}", stats.auth.authenticated_urls);
    }
    println!("  Technologies detected {}", stats.technologies_detected);

    println!("\n{} {}", "Scan ID:".bold(), report.scan_id);
    println!(
        "{} {:.2} seconds",
        "Duration:".bold(),
        report.duration_seconds.unwrap_or_default()
    );
}
