//! CLI command implementations

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};
use maketorrent_core::config::HashingConfig;
use maketorrent_core::torrent::metainfo::{FileLayout, MetainfoSummary};
use maketorrent_core::torrent::{
    MetainfoParser, TracingObserver, encode_metainfo, target_name,
};
use maketorrent_core::{
    CreationOptions, MakeTorrentConfig, MakeTorrentError, TorrentCreator, TorrentError,
};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a .torrent file from a file or directory
    Create(CreateArgs),
    /// Show the contents of a .torrent file
    Inspect {
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options of the `create` command
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// File or directory to share
    pub target: PathBuf,
    /// Tracker announce URL; repeat or separate with commas for backup trackers
    #[arg(
        short,
        long,
        value_name = "URL",
        value_delimiter = ',',
        required = true
    )]
    pub announce: Vec<String>,
    /// Free-form comment stored in the torrent
    #[arg(short, long)]
    pub comment: Option<String>,
    /// Piece length as a power of two, from 16 (64 KiB) to 25 (32 MiB) [default: 18]
    #[arg(short = 'l', long, value_name = "EXPONENT")]
    pub piece_length: Option<u32>,
    /// Torrent name [default: base name of the target]
    #[arg(short, long)]
    pub name: Option<String>,
    /// Output file [default: <name>.torrent]
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Mark the torrent private
    #[arg(short, long)]
    pub private: bool,
    /// Number of hashing threads [default: number of CPUs]
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,
    /// Overwrite an existing output file without asking
    #[arg(short, long)]
    pub force: bool,
}

/// How a command ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The user refused to overwrite the output file
    Declined,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Completed => ExitCode::SUCCESS,
            Outcome::Declined => ExitCode::FAILURE,
        }
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<Outcome> {
    match command {
        Commands::Create(args) => {
            let mut config = MakeTorrentConfig::from_env();
            if let Some(threads) = args.threads {
                config.hashing = HashingConfig::with_workers(threads);
            }
            let mut stdin = BufReader::new(tokio::io::stdin());
            create_torrent(args, &config, &mut stdin).await
        }
        Commands::Inspect { torrent, json } => inspect_torrent(&torrent, json).await,
    }
}

/// Creates a torrent file for `args.target`.
///
/// Every option is checked before the target is read. An existing output
/// file is only replaced after confirmation on `input` or with `--force`.
///
/// # Errors
/// - Invalid piece length, tracker URL or name
/// - Target missing or unreadable
/// - Output file could not be written
pub async fn create_torrent<R>(
    args: CreateArgs,
    config: &MakeTorrentConfig,
    input: &mut R,
) -> Result<Outcome>
where
    R: AsyncBufRead + Unpin,
{
    let exponent = args
        .piece_length
        .unwrap_or(config.creation.default_piece_exponent);
    let piece_length = config.creation.piece_length(exponent).map_err(describe)?;

    let mut options = CreationOptions::new(args.announce, piece_length, &config.creation);
    options.name = args.name;
    options.comment = args.comment;
    options.private = args.private;
    options.validate().map_err(describe)?;

    check_target(&args.target).await?;
    let name = match options.name.clone() {
        Some(name) => name,
        None => default_name(&args.target).await?,
    };
    options.name = Some(name.clone());

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{name}.torrent")));
    let exists = fs::try_exists(&output)
        .await
        .with_context(|| format!("could not check {}", output.display()))?;
    if exists && !args.force && !confirm_overwrite(input, &output).await? {
        debug!("Keeping existing {}", output.display());
        return Ok(Outcome::Declined);
    }

    let creator = TorrentCreator::new(config).with_observer(Arc::new(TracingObserver));
    let metainfo = creator
        .create(&args.target, options)
        .await
        .map_err(describe)?;

    write_atomically(&output, encode_metainfo(&metainfo))
        .await
        .with_context(|| format!("could not write {}", output.display()))?;
    info!("Wrote {}", output.display());

    println!(
        "Created {} ({} pieces of {} bytes, info hash {})",
        output.display(),
        metainfo.piece_count(),
        metainfo.piece_length.bytes(),
        metainfo.info_hash()
    );

    Ok(Outcome::Completed)
}

/// Prints the summary of an existing torrent file.
///
/// # Errors
/// - File missing, unreadable or not a valid torrent
pub async fn inspect_torrent(path: &Path, json: bool) -> Result<Outcome> {
    let parsed = MetainfoParser::parse_file(path).await.map_err(describe)?;

    // Hash of the info bytes as stored, not as re-encoded
    let mut summary = parsed.metainfo.summary();
    summary.info_hash = parsed.info_hash.to_string();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }

    Ok(Outcome::Completed)
}

/// Asks on stdout until the answer is yes or no; end of input means no.
async fn confirm_overwrite<R>(input: &mut R, output: &Path) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut answer = String::new();
    loop {
        print!("{} already exists. Overwrite? [y/n]: ", output.display());
        std::io::stdout().flush()?;

        answer.clear();
        if input.read_line(&mut answer).await? == 0 {
            println!();
            return Ok(false);
        }

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}

/// Fails early when the target cannot be inspected.
async fn check_target(target: &Path) -> Result<()> {
    match fs::metadata(target).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(describe(TorrentError::TargetNotFound {
                path: target.to_path_buf(),
            }))
        }
        Err(source) => Err(describe(TorrentError::FileRead {
            path: target.to_path_buf(),
            source,
        })),
    }
}

/// Base name of the target, resolving `.` and `..` to the real directory.
async fn default_name(target: &Path) -> Result<String> {
    if let Ok(name) = target_name(target) {
        return Ok(name);
    }

    let resolved = fs::canonicalize(target).await.map_err(|_| {
        describe(TorrentError::TargetNotFound {
            path: target.to_path_buf(),
        })
    })?;
    target_name(&resolved).map_err(describe)
}

/// Writes to a uniquely named temporary file next to `output` and renames
/// it into place. The temporary file is removed if any step fails.
async fn write_atomically(output: &Path, contents: Vec<u8>) -> std::io::Result<()> {
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let directory = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = NamedTempFile::new_in(&directory)?;
        temp.write_all(&contents)?;
        temp.as_file().sync_all()?;
        temp.persist(&output).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

fn render_summary(summary: &MetainfoSummary) -> String {
    let mut text = String::new();
    let layout = match summary.layout {
        FileLayout::SingleFile => "single file",
        FileLayout::MultiFile => "multi file",
    };

    text.push_str(&format!("Name:          {}\n", summary.name));
    text.push_str(&format!("Info hash:     {}\n", summary.info_hash));
    for (tier, tracker) in summary.trackers.iter().enumerate() {
        text.push_str(&format!("Tracker {:<6} {}\n", tier + 1, tracker));
    }
    if let Some(comment) = &summary.comment {
        text.push_str(&format!("Comment:       {comment}\n"));
    }
    text.push_str(&format!("Created by:    {}\n", summary.created_by));
    text.push_str(&format!("Created on:    {}\n", summary.creation_date));
    text.push_str(&format!("Private:       {}\n", summary.private));
    text.push_str(&format!(
        "Pieces:        {} x {} bytes\n",
        summary.piece_count,
        summary.piece_length.bytes()
    ));
    text.push_str(&format!(
        "Size:          {} bytes ({layout})\n",
        summary.total_length
    ));
    for file in &summary.files {
        text.push_str(&format!("  {} ({} bytes)\n", file.display_path(), file.length));
    }

    text
}

/// Turns a core error into a CLI error carrying its user-facing message.
fn describe(error: impl Into<MakeTorrentError>) -> anyhow::Error {
    let error = error.into();
    let message = error.user_message();
    if error.is_user_error() {
        anyhow!(message)
    } else {
        anyhow::Error::new(error).context(message)
    }
}
