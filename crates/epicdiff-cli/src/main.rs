//! CLI binary for classifying iteration snapshots and printing reports.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use epicdiff_engine::{
    load_policy, ClassificationStore, GovernancePolicy, JsonDataStore, Report, ReportEngine,
    ReportOptions, ReportPolicy, SnapshotSource,
};
use epicdiff_types::{Badge, ExclusionReason};

#[derive(Parser)]
#[command(
    name = "epicdiff",
    version,
    about = "Iteration-over-iteration change reports for portfolio work items"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory holding snapshot and classification files
    #[arg(short, long, global = true, default_value = ".epicdiff")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one iteration against its predecessor and cache the result
    Classify {
        /// Iteration number to classify
        iteration: u32,
    },

    /// Build and print the report for one iteration
    Report {
        /// Iteration number to report on
        iteration: u32,

        /// Show every retained item instead of only changes
        #[arg(long)]
        show_all: bool,

        /// Keep carried-over at-risk items in a changes-only report
        #[arg(long)]
        include_at_risk: bool,

        /// Group rows by portfolio, category, or initiative
        #[arg(short, long)]
        group_by: Option<String>,

        /// Write the full report as JSON instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show stored iterations and the active policy
    Info,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Classify { iteration } => {
            cmd_classify(&cli.data_dir, iteration)?;
        }
        Commands::Report {
            iteration,
            show_all,
            include_at_risk,
            group_by,
            out,
        } => {
            cmd_report(
                &cli.data_dir,
                iteration,
                show_all,
                include_at_risk,
                group_by.as_deref(),
                out.as_deref(),
            )?;
        }
        Commands::Info => {
            cmd_info(&cli.data_dir)?;
        }
    }

    Ok(())
}

/// Read `policy.json` under the data root, falling back to defaults.
fn active_policy(data_dir: &Path) -> anyhow::Result<ReportPolicy> {
    Ok(load_policy(data_dir)?.unwrap_or_default())
}

fn cmd_classify(data_dir: &Path, iteration: u32) -> anyhow::Result<()> {
    let store = JsonDataStore::new(data_dir);
    let policy = active_policy(data_dir)?;
    let engine = ReportEngine::new(&store, &store, policy.governance);

    let set = engine.classify_iteration(iteration)?;

    let mode = if set.baseline { " (baseline)" } else { "" };
    println!(
        "Classified iteration {}: {} records{}",
        iteration,
        set.records.len(),
        mode
    );
    let tally: Vec<String> = set
        .badge_tally()
        .iter()
        .map(|(badge, count)| format!("{} {}", badge.label(), count))
        .collect();
    if !tally.is_empty() {
        println!("  {}", tally.join(", "));
    }

    Ok(())
}

fn cmd_report(
    data_dir: &Path,
    iteration: u32,
    show_all: bool,
    include_at_risk: bool,
    group_by: Option<&str>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let store = JsonDataStore::new(data_dir);
    let policy = active_policy(data_dir)?;

    let group_by = match group_by {
        Some(s) => s.parse()?,
        None => policy.group_by,
    };
    let options = ReportOptions {
        show_all,
        include_at_risk,
        group_by,
        ordering: policy.ordering,
    };

    let engine = ReportEngine::new(&store, &store, policy.governance);
    let report = engine.build_report(iteration, &options)?;

    if let Some(path) = out {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("Report written: {}", path.display());
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &Report) {
    let mode = if report.baseline { " (baseline)" } else { "" };
    println!("Iteration {} report{}", report.iteration, mode);
    println!(
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    for group in &report.groups {
        println!("\n== {} ==", group.key);
        for entry in &group.entries {
            let mut line = String::from("  ");
            if entry.record.badge.is_set() {
                line.push_str(&format!("[{}] ", entry.record.badge.label()));
            }
            line.push_str(&entry.item.key);
            if !entry.item.summary.is_empty() {
                line.push_str(&format!("  {}", entry.item.summary));
            }
            if !entry.record.note.is_empty() {
                line.push_str(&format!("  ({})", entry.record.note));
            }
            if entry.record.iteration_risk && entry.record.badge != Badge::Overdue {
                line.push_str("  [OVERDUE]");
            }
            println!("{line}");

            for dep in &entry.dependencies {
                let badges: Vec<&str> = dep.badges.iter().map(|b| b.label()).collect();
                let marker = if badges.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", badges.join(" "))
                };
                let team = if dep.item.team.is_empty() {
                    String::new()
                } else {
                    format!("  ({})", dep.item.team)
                };
                println!("      - {}{}{}", dep.item.key, marker, team);
            }
        }
    }

    if !report.excluded.is_empty() {
        println!("\nExcluded by governance: {}", report.excluded.len());
        for (key, reason) in &report.excluded {
            println!("  {} ({})", key, reason_label(*reason));
        }
    }

    println!(
        "\n{} items, {} dependencies, {} groups",
        report.summary.total_items,
        report.summary.total_dependencies,
        report.summary.group_count
    );
    if !report.summary.badges.is_empty() {
        let tally: Vec<String> = report
            .summary
            .badges
            .iter()
            .map(|(badge, count)| format!("{} {}", badge.label(), count))
            .collect();
        println!("Badges: {}", tally.join(", "));
    }
}

fn reason_label(reason: ExclusionReason) -> &'static str {
    match reason {
        ExclusionReason::ExplicitFlag => "explicit flag",
        ExclusionReason::ParentFlag => "parent flag",
        ExclusionReason::Category => "category",
    }
}

fn cmd_info(data_dir: &Path) -> anyhow::Result<()> {
    let store = JsonDataStore::new(data_dir);
    println!("Data root: {}", data_dir.display());

    let policy = load_policy(data_dir)?;
    match &policy {
        Some(_) => println!("Policy: policy.json"),
        None => println!("Policy: defaults"),
    }
    let policy = policy.unwrap_or_default();
    print_governance(&policy.governance);
    println!("  Grouping: {}", policy.group_by.as_str());

    let iterations = stored_iterations(data_dir)?;
    if iterations.is_empty() {
        println!("\nNo snapshots recorded");
        return Ok(());
    }

    println!("\nIterations:");
    for iteration in iterations {
        let Some(snapshot) = store.snapshot(iteration)? else {
            continue;
        };
        let classified = store.read(iteration)?.is_some();
        println!(
            "  {}  items {}  deps {}  {}",
            iteration,
            snapshot.items.len(),
            snapshot.dependencies.len(),
            if classified {
                "classified"
            } else {
                "(not classified)"
            }
        );
    }

    Ok(())
}

fn print_governance(policy: &GovernancePolicy) {
    println!(
        "  Excluded categories: {}",
        policy.excluded_categories.join(", ")
    );
    println!("  Bypass prefixes: {}", policy.bypass_prefixes.join(", "));
}

/// Iteration numbers with a stored snapshot, ascending.
fn stored_iterations(data_dir: &Path) -> anyhow::Result<Vec<u32>> {
    let re = regex::Regex::new(r"^snapshot-(\d+)\.json$").unwrap();
    let mut iterations = Vec::new();
    if !data_dir.exists() {
        return Ok(iterations);
    }
    for dir_entry in std::fs::read_dir(data_dir)? {
        let name = dir_entry?.file_name();
        if let Some(caps) = re.captures(&name.to_string_lossy()) {
            if let Ok(n) = caps[1].parse() {
                iterations.push(n);
            }
        }
    }
    iterations.sort_unstable();
    Ok(iterations)
}
