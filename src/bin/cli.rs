// src/bin/cli.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! CLI supporting `bucket-info`, `delete-old`, `upload`, and `download`.
//!
//! Examples:
//! ```bash
//! s3manager bucket-info
//! s3manager delete-old --days 30 --folder logs --dry-run
//! s3manager upload project/ notes.txt -d releases -a v1.0.0 -e target -e '*.log'
//! s3manager upload a.txt b.txt --no-archive --confirm
//! s3manager download archives/ -d ./restore --confirm
//! ```
//!
//! Every command prints one JSON document on stdout. Failures print an error document and
//! exit with status 1. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use s3manager::batch_delete::cutoff_for;
use s3manager::confirm::{AutoConfirm, Confirm, StdinConfirm};
use s3manager::constants::{
    DEFAULT_BUCKET_INFO_TIMEOUT_SECS, DEFAULT_DELETE_TIMEOUT_SECS, DEFAULT_DOWNLOAD_TIMEOUT_SECS,
    DEFAULT_UPLOAD_TIMEOUT_SECS, MAX_DELETE_AGE_DAYS,
};
use s3manager::{CallOptions, Client, Error, ErrorResponse, StorageCredentials, UploadRequest};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

// -- Commands

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Increase log verbosity: -v = Info, -vv = Debug
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Override the bucket from the environment
    #[arg(short = 'b', long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show object count, total size and metadata for the bucket.
    BucketInfo {
        /// Timeout in seconds
        #[arg(long, default_value_t = DEFAULT_BUCKET_INFO_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Delete objects older than a number of days.
    DeleteOld {
        /// Delete files older than this many days
        #[arg(short = 'd', long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DELETE_AGE_DAYS)))]
        days: u32,

        /// Only consider objects under this folder
        #[arg(short = 'f', long, default_value = "")]
        folder: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        confirm: bool,

        /// List what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Timeout in seconds
        #[arg(long, default_value_t = DEFAULT_DELETE_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Upload files and folders, archived into one zip by default.
    Upload {
        /// Local files or folders
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Remote folder (default: bucket root)
        #[arg(short = 'd', long, default_value = "")]
        destination: String,

        /// Upload files individually without creating an archive
        #[arg(long)]
        no_archive: bool,

        /// Custom name for the archive file (only used with archiving)
        #[arg(short = 'a', long)]
        archive_name: Option<String>,

        /// Base-name glob to leave out of the archive (repeatable)
        #[arg(short = 'e', long = "exclude")]
        exclude: Vec<String>,

        /// Skip confirmation prompts
        #[arg(long)]
        confirm: bool,

        /// Show what would be uploaded without uploading
        #[arg(long)]
        dry_run: bool,

        /// Timeout in seconds
        #[arg(long, default_value_t = DEFAULT_UPLOAD_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Download the most recently modified object under a folder.
    Download {
        /// Remote folder to pick the newest object from
        folder: String,

        /// Local destination directory
        #[arg(short = 'd', long, default_value = ".")]
        destination: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long)]
        confirm: bool,

        /// Timeout in seconds
        #[arg(long, default_value_t = DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
        timeout: u64,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::BucketInfo { .. } => "bucket-info",
            Command::DeleteOld { .. } => "delete-old",
            Command::Upload { .. } => "upload",
            Command::Download { .. } => "download",
        }
    }

    /// `--confirm` was given.
    fn pre_confirmed(&self) -> bool {
        match self {
            Command::BucketInfo { .. } => false,
            Command::DeleteOld { confirm, .. }
            | Command::Upload { confirm, .. }
            | Command::Download { confirm, .. } => *confirm,
        }
    }
}

/// A confirmed command, ready to run against the bucket.
enum Job {
    BucketInfo,
    DeleteOld { days: u32, folder: String, dry_run: bool },
    Upload { req: UploadRequest, dry_run: bool },
    Download { folder: String, destination: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    safe_println!("{}", text);
    Ok(())
}

/// Print the error document and exit 1.
fn fail(e: anyhow::Error, command: &str) -> Result<()> {
    let message = match e.downcast_ref::<Error>() {
        Some(err) => err.to_string(),
        None => format!("{e:#}"),
    };
    print_json(&ErrorResponse::new(&message, command))?;
    std::process::exit(1);
}

/// Main CLI function
#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",        // no -v: WARN level
        1 => "info",        // -v: INFO level
        _ => "debug",       // -vv or more: DEBUG level
    };

    // Logs on stderr so stdout carries only JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let command = cli.cmd.name();
    let credentials = match StorageCredentials::from_env() {
        Ok(c) => c,
        Err(e) => return fail(e.into(), command),
    };
    let bucket_display = cli
        .bucket
        .clone()
        .unwrap_or_else(|| credentials.bucket().to_string());

    // Prompts happen before any network work, outside the cancellable section.
    let opts_bucket = cli.bucket.clone();
    let mut prompt: Box<dyn Confirm> = if cli.cmd.pre_confirmed() {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(StdinConfirm)
    };
    let Some((job, timeout)) = prepare(cli.cmd, &bucket_display, prompt.as_mut()) else {
        eprintln!("Operation cancelled.");
        return Ok(());
    };
    let opts = CallOptions {
        bucket: opts_bucket,
        timeout: Some(timeout),
    };

    let client = Client::connect(credentials).await;
    let result = tokio::select! {
        res = execute(&client, job, opts) => res,
        _ = tokio::signal::ctrl_c() => Err(Error::Cancelled(command).into()),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            // The operation future is gone; close whatever it left open before exiting.
            client.abort_open_uploads().await;
            fail(e, command)
        }
    }
}

/// Apply confirmations through `prompt`. Summaries are printed unless `--confirm` was
/// given. `None` when the user declined.
fn prepare(cmd: Command, bucket: &str, prompt: &mut dyn Confirm) -> Option<(Job, Duration)> {
    match cmd {
        Command::BucketInfo { timeout } => Some((Job::BucketInfo, Duration::from_secs(timeout))),

        Command::DeleteOld { days, folder, confirm, dry_run, timeout } => {
            if !dry_run {
                if !confirm {
                    let cutoff = cutoff_for(chrono::Utc::now(), days)
                        .map(|c| c.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|_| "out of range".to_string());
                    let mut warning = format!(
                        "WARNING: This will permanently delete files older than {} days ({}) from bucket '{}'",
                        days, cutoff, bucket
                    );
                    if !folder.is_empty() {
                        warning.push_str(&format!(" in folder '{folder}'"));
                    }
                    eprintln!("{warning}");
                }
                if !prompt.confirm("Are you sure?") {
                    return None;
                }
            }
            Some((Job::DeleteOld { days, folder, dry_run }, Duration::from_secs(timeout)))
        }

        Command::Upload {
            paths,
            destination,
            no_archive,
            archive_name,
            exclude,
            confirm,
            dry_run,
            timeout,
        } => {
            let mut archive = !no_archive;
            if archive && paths.len() == 1 && paths[0].is_file() {
                let question = format!("Upload single file '{}' as archive?", paths[0].display());
                archive = prompt.confirm(&question);
            }

            if !dry_run {
                if !confirm {
                    eprintln!("Upload operation summary:");
                    eprintln!("  Bucket: {bucket}");
                    eprintln!(
                        "  Destination: {}",
                        if destination.is_empty() { "(bucket root)" } else { destination.as_str() }
                    );
                    eprintln!("  Files/Folders: {paths:?}");
                    eprintln!("  Archive: {archive}");
                    if let (true, Some(name)) = (archive, &archive_name) {
                        eprintln!("  Archive name: {name}");
                    }
                }
                if !prompt.confirm("Continue with upload?") {
                    return None;
                }
            }

            let mut req = UploadRequest::new(paths)
                .destination(destination)
                .archive(archive)
                .exclude(exclude);
            if let Some(name) = archive_name {
                req = req.archive_name(name);
            }
            Some((Job::Upload { req, dry_run }, Duration::from_secs(timeout)))
        }

        Command::Download { folder, destination, confirm, timeout } => {
            if !confirm {
                eprintln!("Download operation summary:");
                eprintln!("  Bucket: {bucket}");
                eprintln!("  Folder: {folder}");
                eprintln!("  Destination: {}", destination.display());
            }
            if !prompt.confirm("Continue with download?") {
                return None;
            }
            Some((Job::Download { folder, destination }, Duration::from_secs(timeout)))
        }
    }
}

async fn execute(client: &Client, job: Job, opts: CallOptions) -> Result<()> {
    match job {
        Job::BucketInfo => {
            info!("Fetching bucket info");
            print_json(&client.get_bucket_info(&opts).await?)?;
        }
        Job::DeleteOld { days, folder, dry_run } => {
            if dry_run {
                info!("DRY RUN MODE: No files will actually be deleted");
            }
            print_json(&client.delete_old_files(days, &folder, dry_run, &opts).await?)?;
        }
        Job::Upload { req, dry_run } => {
            let result = if dry_run {
                client.preview_upload(&req, &opts).await?
            } else {
                client.upload_files(&req, &opts).await?
            };
            print_json(&result)?;
        }
        Job::Download { folder, destination } => {
            print_json(&client.download_latest_file(&folder, &destination, &opts).await?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["s3manager"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().cmd
    }

    #[test]
    fn confirm_flag_answers_every_prompt() {
        let cmd = parse(&["download", "archives", "--confirm"]);
        assert!(cmd.pre_confirmed());
        assert!(matches!(
            prepare(cmd, "bkt", &mut AutoConfirm(true)),
            Some((Job::Download { .. }, _))
        ));
    }

    #[test]
    fn declined_prompt_cancels() {
        let cmd = parse(&["delete-old", "--days", "30"]);
        assert!(!cmd.pre_confirmed());
        assert!(prepare(cmd, "bkt", &mut AutoConfirm(false)).is_none());
    }

    #[test]
    fn dry_run_delete_needs_no_answer() {
        let cmd = parse(&["delete-old", "--days", "30", "--dry-run"]);
        assert!(matches!(
            prepare(cmd, "bkt", &mut AutoConfirm(false)),
            Some((Job::DeleteOld { dry_run: true, .. }, _))
        ));
    }

    #[test]
    fn delete_age_is_bounded() {
        let s3 = ["s3manager", "delete-old", "--days"];
        assert!(Cli::try_parse_from(s3.iter().copied().chain(["0"])).is_err());
        assert!(Cli::try_parse_from(s3.iter().copied().chain(["100000000"])).is_err());
        assert!(Cli::try_parse_from(s3.iter().copied().chain(["3650000"])).is_ok());
    }
}
