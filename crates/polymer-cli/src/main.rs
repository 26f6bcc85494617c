//! Command-line interface for polymer.
//!
//! Embeds a build identifier, log/conf/channel passwords and the
//! configuration filename into a stock core image, then signs the result.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use polymer::{
    failed_stage, ErrorCategory, ExistingOutput, MarkerLayout, PatchResult, Polymer, Secrets, Slot,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Process exit codes. `2` is taken by clap for usage errors.
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    /// Validation, missing key, marker not found or signing failure.
    pub const EMBEDDING_ERROR: u8 = 1;
    /// The output file could not be created or written.
    pub const OUTPUT_ERROR: u8 = 3;
}

#[derive(Parser)]
#[command(name = "polymer")]
#[command(version, about = "Embed secrets into a core image and sign it")]
struct Cli {
    /// Build identifier (at least 14 characters, e.g. RCS_0000000000)
    identifier: String,

    /// Password for the log encryption
    log_pass: String,

    /// Password for the conf encryption
    conf_pass: String,

    /// Password for the channel encryption
    chan_pass: String,

    /// Private key used to sign the output (PEM or DER)
    key: PathBuf,

    /// Core image to be polymerized
    core: PathBuf,

    /// Output file
    output: PathBuf,

    /// TOML file overriding markers, minimum lengths or the config filename
    #[arg(long)]
    layout: Option<PathBuf>,

    /// What to do if the output file already exists
    #[arg(long, value_enum, default_value_t = Existing::Overwrite)]
    existing: Existing,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Existing {
    Overwrite,
    Reject,
    Backup,
}

impl From<Existing> for ExistingOutput {
    fn from(value: Existing) -> Self {
        match value {
            Existing::Overwrite => ExistingOutput::Overwrite,
            Existing::Reject => ExistingOutput::Reject,
            Existing::Backup => ExistingOutput::Backup,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    ExitCode::from(run(&cli))
}

fn run(cli: &Cli) -> u8 {
    let layout = match load_layout(cli.layout.as_deref()) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("{:#}", e);
            return exit_codes::EMBEDDING_ERROR;
        }
    };

    print_banner(cli);

    let secrets = Secrets::new(
        cli.identifier.as_str(),
        cli.log_pass.as_str(),
        cli.conf_pass.as_str(),
        cli.chan_pass.as_str(),
    );

    let result = Polymer::new()
        .layout(layout)
        .existing_output(cli.existing.into())
        .embed_with_progress(&secrets, &cli.key, &cli.core, &cli.output, |slot, result| {
            println!("{}", slot_line(slot, result))
        });

    match result {
        Ok(report) => {
            println!("Using the certificate to sign the code... ok");
            if let Some(backup) = &report.backup {
                println!("Previous output kept as [{}]", backup.display());
            }
            println!("Output file... ok");
            exit_codes::SUCCESS
        }
        Err(e) => {
            match failed_stage(&e) {
                Some(stage) => eprintln!("Failed while {}: {} [{}]", stage, e, cli.output.display()),
                None => eprintln!("{} [{}]", e, cli.output.display()),
            }
            match e.category() {
                ErrorCategory::Embedding => exit_codes::EMBEDDING_ERROR,
                ErrorCategory::Output => exit_codes::OUTPUT_ERROR,
            }
        }
    }
}

fn slot_line(slot: Slot, result: PatchResult) -> String {
    match result {
        PatchResult::Applied { .. } => format!("{} embedded... ok", slot),
        PatchResult::NotFound => format!("Cannot embed {}", slot),
    }
}

fn load_layout(path: Option<&Path>) -> Result<MarkerLayout> {
    match path {
        Some(path) => MarkerLayout::from_file(path)
            .with_context(|| format!("Failed to load layout [{}]", path.display())),
        None => Ok(MarkerLayout::default()),
    }
}

fn print_banner(cli: &Cli) {
    println!("Ready to go...");
    println!("IDENTIFIER    [{}]", cli.identifier);
    println!("LOG PASSWORD  [{}]", cli.log_pass);
    println!("CONF PASSWORD [{}]", cli.conf_pass);
    println!("CHAN PASSWORD [{}]", cli.chan_pass);
    println!("KEYFILE       [{}]", cli.key.display());
    println!("INPUT CORE    [{}]", cli.core.display());
    println!("OUTPUT FILE   [{}]", cli.output.display());
    println!();
}
