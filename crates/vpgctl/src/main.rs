// # vpgctl - VPG NIC settings export and import, VPG provisioning
//
// This binary is a THIN driver around vpgctl-core:
// - Reads configuration from environment variables
// - Builds the session and HTTP transport
// - Moves tables between CSV files and the core
// - Asks for confirmation on the terminal
//
// Loading, reconciliation, submission and tracking all live in vpgctl-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Manager
// - `VPGCTL_ZVM_ADDRESS`: ZVM address, with or without scheme
// - `VPGCTL_CLIENT_ID`: Keycloak client ID
// - `VPGCTL_CLIENT_SECRET`: Keycloak client secret
// - `VPGCTL_IGNORE_SSL`: Skip certificate verification (default: false)
//
// ### Action
// - `VPGCTL_ACTION`: `export`, `import`, `create` or `journal`
// - `VPGCTL_VPG_NAMES`: Comma-separated VPG names (export, journal: required;
//   import: names rows that have no `VPG Name` cell, only if exactly one)
// - `VPGCTL_CSV_FILE`: Settings table to import, or VPG blueprints to create
// - `VPGCTL_JOURNAL_HOURS`: Journal history to set (journal: required)
// - `VPGCTL_OUTPUT_DIR`: Where exports and diffs are written (default: .)
// - `VPGCTL_DRY_RUN`: Show what would be submitted without submitting
// - `VPGCTL_ASSUME_YES`: Skip the confirmation prompt
//
// ### Tracking
// - `VPGCTL_POLL_INTERVAL_SECS`: Delay between task status polls (default: 5)
// - `VPGCTL_TIMEOUT_SECS`: Stop watching a task after this long, 0 = never
//   (default: 1800)
// - `VPGCTL_MAX_TRANSIENT_ERRORS`: Polling errors tolerated (default: 3)
//
// ### Logging
// - `VPGCTL_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export VPGCTL_ZVM_ADDRESS=192.168.111.20
// export VPGCTL_CLIENT_ID=zerto-api
// export VPGCTL_CLIENT_SECRET=your_secret
// export VPGCTL_IGNORE_SSL=true
// export VPGCTL_ACTION=import
// export VPGCTL_CSV_FILE=ExportedSettings_20260101_120000.csv
//
// vpgctl
// ```

mod table;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use tokio::sync::mpsc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use vpgctl_core::report::{DIFF_COLUMNS, EXPORT_COLUMNS, diff_rows, export_rows};
use vpgctl_core::{
    ApplyOptions, ApplyOrchestrator, ClientConfig, CreationReport, CurrentStateFetcher,
    NicConfiguration, Session, TaskTracker, TrackerConfig, TrackerEvent, Transport,
    VpgProvisioner, VpgctlConfig, load, load_blueprints, reconcile_rows, settings,
};
use vpgctl_http::{HttpTransport, KeycloakCredentials};

/// Exit codes for different termination scenarios
///
/// - 0: Everything requested was done
/// - 1: Configuration error or rejected input table
/// - 2: Runtime error (manager unreachable, submission failed, ...)
/// - 3: Finished, but some targets were excluded or some tasks failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VpgctlExitCode {
    /// Normal exit
    Success = 0,
    /// Configuration error or invalid input
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
    /// Partial outcome: violations or failed tasks
    Incomplete = 3,
}

impl From<VpgctlExitCode> for ExitCode {
    fn from(code: VpgctlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Write the current NIC settings of named VPGs to CSV and JSON
    Export,
    /// Reconcile a CSV table against the manager and apply the differences
    Import,
    /// Create VPGs from a blueprint table
    Create,
    /// Set the journal history of named VPGs
    Journal,
}

impl Action {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "export" => Ok(Action::Export),
            "import" => Ok(Action::Import),
            "create" => Ok(Action::Create),
            "journal" => Ok(Action::Journal),
            other => bail!(
                "Unknown action '{}' (expected export, import, create or journal)",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    vpgctl: VpgctlConfig,
    action: Action,
    vpg_names: Vec<String>,
    csv_file: Option<PathBuf>,
    journal_hours: Option<u64>,
    output_dir: PathBuf,
    dry_run: bool,
    assume_yes: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("{} is required", key))
        };

        let client = ClientConfig::new(
            required("VPGCTL_ZVM_ADDRESS")?,
            required("VPGCTL_CLIENT_ID")?,
            required("VPGCTL_CLIENT_SECRET")?,
        )
        .with_verify_certificate(!parse_switch(&lookup, "VPGCTL_IGNORE_SSL")?);

        let defaults = TrackerConfig::default();
        let tracker = TrackerConfig {
            poll_interval_secs: parse_number(&lookup, "VPGCTL_POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.poll_interval_secs),
            timeout_secs: match parse_number(&lookup, "VPGCTL_TIMEOUT_SECS")? {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => defaults.timeout_secs,
            },
            max_transient_errors: parse_number(&lookup, "VPGCTL_MAX_TRANSIENT_ERRORS")?
                .map(|n| n as usize)
                .unwrap_or(defaults.max_transient_errors),
            ..defaults
        };

        Ok(Self {
            vpgctl: VpgctlConfig { client, tracker },
            action: Action::parse(&required("VPGCTL_ACTION")?)?,
            vpg_names: lookup("VPGCTL_VPG_NAMES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            csv_file: lookup("VPGCTL_CSV_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            journal_hours: parse_number(&lookup, "VPGCTL_JOURNAL_HOURS")?,
            output_dir: lookup("VPGCTL_OUTPUT_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            dry_run: parse_switch(&lookup, "VPGCTL_DRY_RUN")?,
            assume_yes: parse_switch(&lookup, "VPGCTL_ASSUME_YES")?,
            log_level: lookup("VPGCTL_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.vpgctl.validate()?;

        match self.action {
            Action::Export if self.vpg_names.is_empty() => {
                bail!("VPGCTL_VPG_NAMES is required for export");
            }
            Action::Import | Action::Create if self.csv_file.is_none() => {
                bail!("VPGCTL_CSV_FILE is required for {:?}", self.action);
            }
            Action::Journal if self.vpg_names.is_empty() => {
                bail!("VPGCTL_VPG_NAMES is required for journal");
            }
            Action::Journal if !matches!(self.journal_hours, Some(hours) if hours > 0) => {
                bail!("VPGCTL_JOURNAL_HOURS must be at least 1 for journal");
            }
            _ => {}
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            );
        }

        Ok(())
    }

    /// The VPG name used for rows without a `VPG Name` cell
    fn default_vpg_name(&self) -> Option<&str> {
        match self.vpg_names.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Parse a true/false environment switch; unset means false
fn parse_switch(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    let Some(value) = lookup(key) else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        other => bail!("{} must be true or false, found '{}'", key, other),
    }
}

/// Parse an optional non-negative integer variable
fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer", key)),
        _ => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return VpgctlExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return VpgctlExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return VpgctlExitCode::ConfigError.into();
    }

    info!("Starting vpgctl {:?}", config.action);
    info!("Manager: {}", config.vpgctl.client.base_url());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return VpgctlExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(&config).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
                VpgctlExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Build the collaborators and run the configured action
async fn run(config: &Config) -> Result<VpgctlExitCode> {
    let client = &config.vpgctl.client;
    let credentials = KeycloakCredentials::from_config(client)?;
    let session = Session::new(Box::new(credentials)).with_refresh_margin(
        chrono::Duration::seconds(client.token_refresh_margin_secs as i64),
    );
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(client)?);

    match config.action {
        Action::Export => export(config, &session, transport).await,
        Action::Import => import(config, &session, transport).await,
        Action::Create => create(config, &session, transport).await,
        Action::Journal => journal(config, &session, transport).await,
    }
}

/// Write the exported-settings table and the raw documents
async fn export(
    config: &Config,
    session: &Session,
    transport: Arc<dyn Transport>,
) -> Result<VpgctlExitCode> {
    let fetcher = CurrentStateFetcher::new(transport);
    let stamp = timestamp();
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let mut records: Vec<NicConfiguration> = Vec::new();
    for name in &config.vpg_names {
        let identifier = fetcher.resolve_identifier(session, name).await?;
        let document = fetcher.fetch_document(session, &identifier).await?;

        let json_path = config
            .output_dir
            .join(format!("VpgSettings_{}_{}.json", file_safe(name), stamp));
        tokio::fs::write(&json_path, serde_json::to_vec_pretty(&document)?)
            .await
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
        info!("VPG {}: document written to {}", name, json_path.display());

        let mut configs = settings::nic_configurations(&document)?;
        for record in configs.iter_mut().filter(|c| c.vpg_name.is_none()) {
            record.vpg_name = Some(name.clone());
        }
        println!("VPG {}: {} NIC(s) exported", name, configs.len());
        records.extend(configs);
    }

    let csv_path = config
        .output_dir
        .join(format!("ExportedSettings_{}.csv", stamp));
    write_table(&csv_path, &EXPORT_COLUMNS, &export_rows(&records)).await?;
    println!("Settings exported to {}", csv_path.display());

    Ok(VpgctlExitCode::Success)
}

/// Desired rows for one VPG, with their table row numbers
#[derive(Debug)]
struct VpgGroup<'a> {
    vpg_name: String,
    rows: Vec<(usize, &'a NicConfiguration)>,
}

/// Split loaded records by VPG, keeping first-appearance order
fn group_by_vpg<'a>(
    desired: &'a [NicConfiguration],
    default_vpg: Option<&str>,
) -> Result<Vec<VpgGroup<'a>>> {
    let mut groups: Vec<VpgGroup<'a>> = Vec::new();
    let mut unnamed = Vec::new();

    for (index, record) in desired.iter().enumerate() {
        let row = index + 1;
        let Some(name) = record.vpg_name.as_deref().or(default_vpg) else {
            unnamed.push(row.to_string());
            continue;
        };

        match groups.iter_mut().find(|group| group.vpg_name == name) {
            Some(group) => group.rows.push((row, record)),
            None => groups.push(VpgGroup {
                vpg_name: name.to_string(),
                rows: vec![(row, record)],
            }),
        }
    }

    if !unnamed.is_empty() {
        bail!(
            "Rows {} have no VPG Name; set VPGCTL_VPG_NAMES to a single VPG",
            unnamed.join(", ")
        );
    }
    Ok(groups)
}

/// Reconcile the table against each VPG and apply confirmed changes
async fn import(
    config: &Config,
    session: &Session,
    transport: Arc<dyn Transport>,
) -> Result<VpgctlExitCode> {
    let Some(csv_file) = config.csv_file.as_deref() else {
        bail!("VPGCTL_CSV_FILE is required for import");
    };
    let bytes = tokio::fs::read(csv_file)
        .await
        .with_context(|| format!("Failed to read {}", csv_file.display()))?;
    let rows = table::read_rows(bytes.as_slice())?;

    let desired = match load(&rows) {
        Ok(desired) => desired,
        Err(errors) => {
            eprintln!("{} problem(s) in {}:", errors.len(), csv_file.display());
            for e in &errors {
                eprintln!("  {}", e);
            }
            return Ok(VpgctlExitCode::ConfigError);
        }
    };
    info!("Loaded {} NIC row(s) from {}", desired.len(), csv_file.display());

    let groups = match group_by_vpg(&desired, config.default_vpg_name()) {
        Ok(groups) => groups,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(VpgctlExitCode::ConfigError);
        }
    };

    let (event_tx, event_rx) = mpsc::channel(64);
    let progress = tokio::spawn(report_progress(event_rx));

    let fetcher = CurrentStateFetcher::new(transport.clone());
    let orchestrator = ApplyOrchestrator::new(transport.clone())
        .with_tracker(TaskTracker::new(transport).with_events(event_tx));
    let options = ApplyOptions {
        dry_run: config.dry_run,
        track: config.vpgctl.tracker.to_options()?,
    };

    let mut outcome = VpgctlExitCode::Success;
    for group in &groups {
        let result = import_group(config, session, &fetcher, &orchestrator, &options, group).await;
        match result {
            Ok(VpgctlExitCode::Success) => {}
            Ok(code) => {
                if outcome == VpgctlExitCode::Success {
                    outcome = code;
                }
            }
            Err(e) => {
                error!("VPG {}: {:#}", group.vpg_name, e);
                eprintln!("VPG {}: {:#}", group.vpg_name, e);
                outcome = VpgctlExitCode::RuntimeError;
            }
        }
    }

    // Closing the channel ends the progress reporter
    drop(orchestrator);
    if let Err(e) = progress.await {
        warn!("Progress reporter stopped abnormally: {}", e);
    }

    Ok(outcome)
}

async fn import_group(
    config: &Config,
    session: &Session,
    fetcher: &CurrentStateFetcher,
    orchestrator: &ApplyOrchestrator,
    options: &ApplyOptions,
    group: &VpgGroup<'_>,
) -> Result<VpgctlExitCode> {
    let identifier = fetcher.resolve_identifier(session, &group.vpg_name).await?;
    let current = fetcher.fetch(session, &identifier).await?;
    let reconciliation = reconcile_rows(group.rows.iter().copied(), &current);

    let mut outcome = VpgctlExitCode::Success;
    if !reconciliation.violations.is_empty() {
        println!(
            "VPG {}: {} row(s) excluded:",
            group.vpg_name,
            reconciliation.violations.len()
        );
        for violation in &reconciliation.violations {
            println!("  {}", violation);
        }
        outcome = VpgctlExitCode::Incomplete;
    }

    let change_set = &reconciliation.change_set;
    if change_set.is_empty() {
        println!("VPG {}: {}", group.vpg_name, change_set.summary());
        return Ok(outcome);
    }

    let diff_path = config.output_dir.join(format!(
        "Changes_{}_{}.csv",
        file_safe(&group.vpg_name),
        timestamp()
    ));
    tokio::fs::create_dir_all(&config.output_dir).await?;
    write_table(&diff_path, &DIFF_COLUMNS, &diff_rows(change_set)).await?;
    info!("VPG {}: diff written to {}", group.vpg_name, diff_path.display());

    println!("{}", change_set.summary());
    let approved = confirm(
        config.assume_yes,
        format!("Apply {} NIC change(s) to {}?", change_set.len(), group.vpg_name),
    )
    .await?;
    let results = orchestrator
        .apply(session, &identifier, change_set, options, |_| approved)
        .await?;

    for result in &results {
        println!("VPG {}: {}", group.vpg_name, result);
        if !result.is_success() {
            outcome = VpgctlExitCode::Incomplete;
        }
    }
    Ok(outcome)
}

/// Create the VPGs described by the blueprint table
async fn create(
    config: &Config,
    session: &Session,
    transport: Arc<dyn Transport>,
) -> Result<VpgctlExitCode> {
    let Some(csv_file) = config.csv_file.as_deref() else {
        bail!("VPGCTL_CSV_FILE is required for create");
    };
    let bytes = tokio::fs::read(csv_file)
        .await
        .with_context(|| format!("Failed to read {}", csv_file.display()))?;
    let rows = table::read_rows(bytes.as_slice())?;

    let blueprints = match load_blueprints(&rows) {
        Ok(blueprints) => blueprints,
        Err(errors) => {
            eprintln!("{} problem(s) in {}:", errors.len(), csv_file.display());
            for e in &errors {
                eprintln!("  {}", e);
            }
            return Ok(VpgctlExitCode::ConfigError);
        }
    };

    let (event_tx, event_rx) = mpsc::channel(64);
    let progress = tokio::spawn(report_progress(event_rx));
    let provisioner = VpgProvisioner::new(transport.clone())
        .with_tracker(TaskTracker::new(transport).with_events(event_tx));
    let options = ApplyOptions {
        dry_run: config.dry_run,
        track: config.vpgctl.tracker.to_options()?,
    };

    if let Err(e) = provisioner.preflight(session, &blueprints).await {
        eprintln!("{}", e);
        return Ok(match e {
            vpgctl_core::Error::VpgExists(_) => VpgctlExitCode::ConfigError,
            _ => VpgctlExitCode::RuntimeError,
        });
    }

    println!("VPGs to be created ({}):", blueprints.len());
    for blueprint in &blueprints {
        println!("  {} with {} VM(s):", blueprint.name, blueprint.vms.len());
        for vm in &blueprint.vms {
            println!(
                "    {} ({})",
                vm.vm_identifier,
                vm.vm_name.as_deref().unwrap_or("N/A")
            );
        }
    }
    let approved = confirm(
        config.assume_yes,
        format!("Create {} VPG(s)?", blueprints.len()),
    )
    .await?;

    let outcomes = provisioner
        .create_all(session, &blueprints, &options, |_| approved)
        .await?;

    let mut outcome = VpgctlExitCode::Success;
    for created in &outcomes {
        match &created.result {
            Ok(report) if report.is_success() => {
                println!("VPG {}: created ({})", created.vpg_name, report.creation)
            }
            Ok(report) => {
                print_failed_creation(report);
                outcome = VpgctlExitCode::Incomplete;
            }
            Err(e) => {
                eprintln!("VPG {}: {}", created.vpg_name, e);
                outcome = VpgctlExitCode::Incomplete;
            }
        }
    }

    drop(provisioner);
    if let Err(e) = progress.await {
        warn!("Progress reporter stopped abnormally: {}", e);
    }
    Ok(outcome)
}

fn print_failed_creation(report: &CreationReport) {
    if !report.creation.is_success() {
        println!("VPG {}: not created ({})", report.vpg_name, report.creation);
        return;
    }
    println!("VPG {}: failed VM additions:", report.vpg_name);
    for vm in report.vms.iter().filter(|vm| !vm.is_success()) {
        match &vm.result {
            Ok(task) => println!("  {}: {}", vm.vm_identifier, task),
            Err(e) => println!("  {}: {}", vm.vm_identifier, e),
        }
    }
    if report.rolled_back {
        println!("VPG {} was deleted due to VM addition failures.", report.vpg_name);
    } else {
        println!("VPG {} could not be deleted; remove it manually.", report.vpg_name);
    }
}

/// Set the journal history of every named VPG
async fn journal(
    config: &Config,
    session: &Session,
    transport: Arc<dyn Transport>,
) -> Result<VpgctlExitCode> {
    let Some(hours) = config.journal_hours else {
        bail!("VPGCTL_JOURNAL_HOURS is required for journal");
    };

    let (event_tx, event_rx) = mpsc::channel(64);
    let progress = tokio::spawn(report_progress(event_rx));
    let fetcher = CurrentStateFetcher::new(transport.clone());
    let provisioner = VpgProvisioner::new(transport.clone())
        .with_tracker(TaskTracker::new(transport).with_events(event_tx));
    let options = ApplyOptions {
        dry_run: config.dry_run,
        track: config.vpgctl.tracker.to_options()?,
    };

    let mut outcome = VpgctlExitCode::Success;
    for name in &config.vpg_names {
        let identifier = fetcher.resolve_identifier(session, name).await?;
        let Some(change) = provisioner
            .plan_journal_history(session, &identifier, hours)
            .await?
        else {
            println!("VPG {}: journal history already {}h", name, hours);
            continue;
        };

        println!("VPG {}: {}", name, change);
        let approved = confirm(config.assume_yes, format!("Commit journal change for {}?", name))
            .await?;
        let result = provisioner
            .set_journal_history(session, &change, &options, |_| approved)
            .await?;

        if let Some(result) = result {
            println!("VPG {}: {}", name, result);
            if !result.is_success() {
                outcome = VpgctlExitCode::Incomplete;
            }
        }
    }

    drop(provisioner);
    if let Err(e) = progress.await {
        warn!("Progress reporter stopped abnormally: {}", e);
    }
    Ok(outcome)
}

/// Ask a yes/no question off the async workers; `assume_yes` skips it
async fn confirm(assume_yes: bool, question: String) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    tokio::task::spawn_blocking(move || {
        ask_yes_no(io::stdin().lock(), io::stdout(), &question)
    })
    .await
    .context("Confirmation prompt failed")
}

/// Repeat `question` until answered; end of input declines
fn ask_yes_no(mut input: impl BufRead, mut output: impl Write, question: &str) -> bool {
    let mut line = String::new();
    loop {
        if write!(output, "{} (yes/no): ", question).is_err() || output.flush().is_err() {
            return false;
        }

        line.clear();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => return true,
            "no" | "n" => return false,
            _ => {
                let _ = writeln!(output, "Please answer yes or no.");
            }
        }
    }
}

/// Log tracker events until every sender is gone
async fn report_progress(mut events: mpsc::Receiver<TrackerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TrackerEvent::Progress {
                handle,
                state,
                progress: Some(percent),
            } => info!("Task {}: {} ({}%)", handle, state, percent),
            TrackerEvent::Progress { handle, state, .. } => info!("Task {}: {}", handle, state),
            TrackerEvent::TransientError {
                handle,
                error,
                count,
            } => warn!("Task {}: status query failed ({}): {}", handle, count, error),
            TrackerEvent::Finished {
                handle,
                final_status,
            } => info!("Task {}: {}", handle, final_status),
            TrackerEvent::PollStarted { .. } => {}
        }
    }
}

async fn write_table(
    path: &Path,
    columns: &[&str],
    rows: &[vpgctl_core::TabularRow],
) -> Result<()> {
    let mut buffer = Vec::new();
    table::write_rows(&mut buffer, columns, rows)?;
    tokio::fs::write(path, buffer)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// VPG names may contain characters that are not valid in file names
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
