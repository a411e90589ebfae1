/*!
kvsnap CLI - back up and restore the key/value namespace of a Consul cluster.

`backup` and `restore` talk to the store at `--address`; `verify` and
`inspect` only read the local backup file.
*/

use clap::{Parser, Subcommand, ValueEnum};
use kvsnap_core::{
    build_subscriber, verify_record, BackupEngine, ConsulClient, KvPair, LocalFileStorage,
    LogFormat, OperationContext, RestoreReport, StoreConfig, ADDRESS_ENV,
    DEFAULT_BACKUP_FILE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tabled::{Table, Tabled};
use tracing::warn;

/// Exit code when `--strict` is set and some keys failed to restore
const EXIT_PARTIAL_RESTORE: u8 = 2;

#[derive(Parser)]
#[command(name = "kvsnap")]
#[command(about = "Backup and restore for Consul key/value data")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Backup kv values from consul server
    Backup {
        /// Consul server address (host:port)
        #[arg(short, long, env = ADDRESS_ENV)]
        address: Option<String>,
        /// Only back up keys under this prefix
        #[arg(long, default_value = "")]
        prefix: String,
        /// Backup file to write
        #[arg(short, long, default_value = DEFAULT_BACKUP_FILE)]
        file: PathBuf,
    },
    /// Restore kv from file to consul server
    Restore {
        /// Consul server address (host:port)
        #[arg(short, long, env = ADDRESS_ENV)]
        address: Option<String>,
        /// Backup file to read
        #[arg(short, long, default_value = DEFAULT_BACKUP_FILE)]
        file: PathBuf,
        /// Exit non-zero if any single key fails to restore
        #[arg(long)]
        strict: bool,
    },
    /// Check that a backup file is well formed
    Verify {
        /// Backup file to check
        #[arg(short, long, default_value = DEFAULT_BACKUP_FILE)]
        file: PathBuf,
    },
    /// List the keys stored in a backup file
    Inspect {
        /// Backup file to read
        #[arg(short, long, default_value = DEFAULT_BACKUP_FILE)]
        file: PathBuf,
    },
}

#[derive(Tabled)]
struct PairRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Value")]
    preview: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Scoped to this command rather than installed globally
    let subscriber = build_subscriber(cli.verbose, cli.log_format.into());

    tracing::subscriber::with_default(subscriber, || match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    })
}

fn run(command: Commands) -> Result<ExitCode, anyhow::Error> {
    match command {
        Commands::Backup {
            address,
            prefix,
            file,
        } => {
            let config = store_config(address)?.with_prefix(prefix);
            backup(config, &file)
        }
        Commands::Restore {
            address,
            file,
            strict,
        } => {
            let config = store_config(address)?;
            restore(config, &file, strict)
        }
        Commands::Verify { file } => verify(&file),
        Commands::Inspect { file } => inspect(&file),
    }
}

/// Validate the address before any network or file I/O happens
fn store_config(address: Option<String>) -> Result<StoreConfig, anyhow::Error> {
    Ok(StoreConfig::from_address(address.as_deref().unwrap_or(""))?)
}

fn backup(config: StoreConfig, file: &Path) -> Result<ExitCode, anyhow::Error> {
    let ctx = OperationContext::for_store("backup", &config);
    let engine = BackupEngine::new(ConsulClient::new(config)?, LocalFileStorage::new());

    let summary = engine.backup(&ctx, file)?;

    println!(
        "Backup successfully completed: {} pairs, {} written to {}",
        summary.pairs,
        format_size(summary.bytes as u64),
        summary.path.display()
    );
    println!("  SHA-256: {}", summary.sha256);
    Ok(ExitCode::SUCCESS)
}

fn restore(config: StoreConfig, file: &Path, strict: bool) -> Result<ExitCode, anyhow::Error> {
    let ctx = OperationContext::for_store("restore", &config);
    let engine = BackupEngine::new(ConsulClient::new(config)?, LocalFileStorage::new());

    let report = engine.restore(&ctx, file)?;

    if report.is_complete() {
        println!(
            "Backup successfully restored: {} of {} keys",
            report.succeeded, report.attempted
        );
    } else {
        println!(
            "Restore finished with failures: {} attempted, {} succeeded, {} failed",
            report.attempted,
            report.succeeded,
            report.failed()
        );
        for failure in &report.failures {
            eprintln!("  ✗ {}: {}", failure.key, failure.message);
        }
    }

    Ok(restore_exit_code(&report, strict))
}

/// Partial failure is success unless `--strict` was given
fn restore_exit_code(report: &RestoreReport, strict: bool) -> ExitCode {
    if strict && !report.is_complete() {
        warn!(failed = report.failed(), "Strict mode: treating partial restore as failure");
        ExitCode::from(EXIT_PARTIAL_RESTORE)
    } else {
        ExitCode::SUCCESS
    }
}

fn verify(file: &Path) -> Result<ExitCode, anyhow::Error> {
    let ctx = OperationContext::local("verify");
    let info = verify_record(&LocalFileStorage::new(), &ctx, file)?;

    println!("✓ Backup record is valid");
    println!("  File: {}", file.display());
    println!("  Pairs: {}", info.pairs);
    println!("  Key bytes: {}", format_size(info.key_bytes as u64));
    println!("  Value bytes: {}", format_size(info.value_bytes as u64));
    println!("  Record size: {}", format_size(info.bytes as u64));
    println!("  SHA-256: {}", info.sha256);
    Ok(ExitCode::SUCCESS)
}

fn inspect(file: &Path) -> Result<ExitCode, anyhow::Error> {
    let ctx = OperationContext::local("inspect");
    let _guard = ctx.enter();
    let snapshot = kvsnap_core::engine::load_snapshot(&LocalFileStorage::new(), file)?;

    if snapshot.is_empty() {
        println!("No keys in {}", file.display());
    } else {
        let rows: Vec<PairRow> = snapshot.iter().map(pair_row).collect();
        println!("{}", Table::new(rows));
    }
    Ok(ExitCode::SUCCESS)
}

fn pair_row(pair: &KvPair) -> PairRow {
    PairRow {
        key: escape_bytes(&pair.key, usize::MAX),
        size: format_size(pair.value.len() as u64),
        preview: escape_bytes(&pair.value, 40),
    }
}

/// Printable rendering of raw bytes, cut after `max` characters
fn escape_bytes(bytes: &[u8], max: usize) -> String {
    let escaped: String = bytes
        .iter()
        .flat_map(|&b| std::ascii::escape_default(b))
        .map(char::from)
        .collect();

    if escaped.chars().count() > max {
        let mut cut: String = escaped.chars().take(max).collect();
        cut.push('…');
        cut
    } else {
        escaped
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
