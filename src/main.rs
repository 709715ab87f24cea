mod assign;
mod client;
mod config;
mod deploy;
mod profiles;

use crate::client::{DashboardClient, Network, Organization};
use crate::config::Scope;
use crate::profiles::ProfileStore;
use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rfctl",
    version,
    about = "Export and bulk-deploy wireless RF profiles via the dashboard REST API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "API key override for this invocation (otherwise env var or config)"
    )]
    api_key: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Base URL for the dashboard API"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "ORG",
        help = "Organization name or ID (skips the selection prompt)"
    )]
    org: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the RF profiles of one network to a directory of YAML files
    Export {
        #[arg(
            long,
            value_name = "NAME",
            help = "Network to export from (prompted when omitted)"
        )]
        network: Option<String>,
        #[arg(
            long,
            value_name = "DIR",
            help = "Directory to write profile files to (prompted when omitted)"
        )]
        out_dir: Option<PathBuf>,
    },
    /// Create or update RF profiles per an assignment CSV and bind APs
    Apply {
        #[arg(
            long,
            value_name = "DIR",
            help = "Directory containing profile YAML files (prompted when omitted)"
        )]
        profile_dir: Option<PathBuf>,
        #[arg(
            long,
            value_name = "FILE",
            help = "Assignment CSV: Network Name,RF Profiles,APs (prompted when omitted)"
        )]
        csv: Option<PathBuf>,
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
    /// Persist an API key to the chosen scope
    Configure {
        #[arg(long, help = "API key to store (prompted without echo when omitted)")]
        key: Option<String>,
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
        #[arg(
            long,
            value_name = "URL",
            help = "Optional base URL to store alongside the key"
        )]
        base_url: Option<String>,
    },
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("reading current directory")?;

    match cli.command {
        Commands::Configure {
            key,
            scope,
            base_url,
        } => {
            let mut existing = config::load_scope(scope.into(), &cwd)?;
            let key = match key {
                Some(key) => key,
                None => rpassword::prompt_password("Dashboard API key: ")
                    .context("reading API key from terminal")?,
            };
            existing.api_key = Some(key);
            if let Some(url) = base_url {
                existing.base_url = Some(url);
            }

            let path = config::save(scope.into(), &existing, &cwd)?;
            println!("Saved API key to {}", path.display());
            Ok(())
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            Ok(())
        }
        Commands::Export { network, out_dir } => {
            let effective = config::resolve_or_prompt(&cwd, cli.api_key, cli.base_url)?;
            let client = DashboardClient::new(&effective.base_url, &effective.api_key)?;
            run_export(&client, cli.org, network, out_dir)
        }
        Commands::Apply {
            profile_dir,
            csv,
            yes,
        } => {
            let effective = config::resolve_or_prompt(&cwd, cli.api_key, cli.base_url)?;
            let client = DashboardClient::new(&effective.base_url, &effective.api_key)?;
            run_apply(&client, cli.org, profile_dir, csv, yes)
        }
    }
}

fn run_export(
    client: &DashboardClient,
    org: Option<String>,
    network: Option<String>,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let org = select_org(client, org)?;
    println!("Collecting networks...");
    let networks = client.networks(&org.id)?;
    println!("Found {} networks.", networks.len());

    let network = select_network(&networks, network)?;
    println!("Collecting RF profiles...");
    let rf_profiles = client.rf_profiles(&network.id)?;
    if rf_profiles.is_empty() {
        println!(
            "Network {} has no RF profiles; nothing to export.",
            network.name
        );
        return Ok(());
    }

    let dir = match out_dir {
        Some(dir) => dir,
        None => PathBuf::from(
            Input::<String>::new()
                .with_prompt("Directory to export profiles to")
                .default("./profiles".into())
                .interact_text()
                .context("reading export directory")?,
        ),
    };

    let written = profiles::export_profiles(&dir, &rf_profiles)?;
    println!(
        "{} Exported {} profile(s) to {}",
        style("✓").green(),
        written.len(),
        dir.display()
    );
    println!("Copy or edit the files, then run `rfctl apply` to deploy changes.");
    Ok(())
}

fn run_apply(
    client: &DashboardClient,
    org: Option<String>,
    profile_dir: Option<PathBuf>,
    csv: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let dir = match profile_dir {
        Some(dir) => dir,
        None => PathBuf::from(
            Input::<String>::new()
                .with_prompt("Directory containing profile files")
                .default("./profiles".into())
                .interact_text()
                .context("reading profile directory")?,
        ),
    };
    let store = ProfileStore::load(&dir)?;
    if store.is_empty() {
        bail!("no profile files found in {}", dir.display());
    }
    for warning in &store.warnings {
        println!("{} {}", style("!").yellow(), warning);
    }
    println!("{} Loaded {} profile(s).", style("✓").green(), store.len());

    let csv_path = match csv {
        Some(path) => path,
        None => PathBuf::from(
            Input::<String>::new()
                .with_prompt("CSV containing profile assignments")
                .interact_text()
                .context("reading CSV path")?,
        ),
    };
    let parsed = assign::parse_rows(&csv_path, &store)?;
    if !parsed.rejected.is_empty() {
        println!(
            "{} {} of {} row(s) failed validation:",
            style("!").yellow(),
            parsed.rejected.len(),
            parsed.rejected.len() + parsed.rows.len()
        );
        let rows: Vec<Vec<String>> = parsed
            .rejected
            .iter()
            .map(|r| {
                vec![
                    r.line.to_string(),
                    r.network_name.clone(),
                    r.raw_profiles.clone(),
                    r.raw_aps.clone(),
                    r.reason.to_string(),
                ]
            })
            .collect();
        print_table(
            &["Line", "Network Name", "RF Profiles", "APs", "Error"],
            &rows,
        );
    }
    if parsed.rows.is_empty() {
        bail!("no valid assignment rows to deploy");
    }

    let org = select_org(client, org)?;
    println!("Collecting networks...");
    let networks = client.networks(&org.id)?;
    println!("Found {} networks.", networks.len());

    let target_networks: HashSet<String> = parsed
        .rows
        .iter()
        .map(|r| r.network_name.to_lowercase())
        .collect();
    let uploads: usize = parsed.rows.iter().map(|r| r.profile_names.len()).sum();
    println!(
        "Ready to deploy {} row(s): {} profile upload(s) across {} network(s).",
        parsed.rows.len(),
        uploads,
        target_networks.len()
    );
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Continue?")
            .default(false)
            .interact()
            .context("reading confirmation")?;
        if !confirmed {
            println!("Aborted; nothing was deployed.");
            return Ok(());
        }
    }

    let progress = ProgressBar::new(parsed.rows.len() as u64);
    let report = deploy::run(client, &networks, &parsed.rows, &store, &progress);
    progress.finish_and_clear();

    println!(
        "Profiles created: {}, updated: {}, APs bound: {}.",
        report.profiles_created, report.profiles_updated, report.aps_bound
    );
    if report.errors.is_empty() {
        println!("{} Completed updates!", style("✓").green());
    } else {
        println!(
            "{} Encountered {} error(s) during updates:",
            style("!").yellow(),
            report.errors.len()
        );
        let rows: Vec<Vec<String>> = report
            .errors
            .iter()
            .map(|e| vec![e.network.clone(), e.profile.clone(), e.message.clone()])
            .collect();
        print_table(&["Network", "RF Profile", "Error"], &rows);
    }
    Ok(())
}

fn select_org(client: &DashboardClient, requested: Option<String>) -> Result<Organization> {
    println!("Connecting to the dashboard...");
    let mut orgs = client.organizations().context("listing organizations")?;
    println!("Found {} organization(s).", orgs.len());

    if let Some(requested) = requested {
        let wanted = requested.trim().to_lowercase();
        return orgs
            .into_iter()
            .find(|o| o.id == requested || o.name.to_lowercase() == wanted)
            .ok_or_else(|| anyhow!("no organization matching `{requested}`"));
    }

    match orgs.len() {
        0 => bail!("this API key has no visible organizations"),
        1 => {
            let org = orgs.remove(0);
            println!("Working with organization: {}", org.name);
            Ok(org)
        }
        _ => {
            let names: Vec<&str> = orgs.iter().map(|o| o.name.as_str()).collect();
            let picked = Select::new()
                .with_prompt("Which organization should we use?")
                .items(&names)
                .default(0)
                .interact()
                .context("selecting organization")?;
            Ok(orgs.swap_remove(picked))
        }
    }
}

fn select_network<'a>(networks: &'a [Network], requested: Option<String>) -> Result<&'a Network> {
    if let Some(requested) = requested {
        let wanted = requested.trim().to_lowercase();
        return networks
            .iter()
            .find(|n| n.name.to_lowercase() == wanted)
            .ok_or_else(|| anyhow!("no network named `{requested}`"));
    }

    loop {
        let input: String = Input::new()
            .with_prompt("Network to export settings from")
            .interact_text()
            .context("reading network name")?;
        let wanted = input.trim().to_lowercase();
        match networks.iter().find(|n| n.name.to_lowercase() == wanted) {
            Some(network) => return Ok(network),
            None => println!(
                "{} Can't find a matching network name. Please try again.",
                style("✗").red()
            ),
        }
    }
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            print!("  ");
        }
        print!("{:width$}", header, width = widths[i]);
    }
    println!();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            print!("  ");
        }
        print!("{:-<width$}", "", width = *width);
    }
    println!();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                print!("  ");
            }
            print!("{:width$}", cell, width = widths[i]);
        }
        println!();
    }
}
