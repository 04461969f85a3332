use archvolio::config::ArchiveOptions;
use archvolio::error::{FatalError, ReadOutcome};
use archvolio::frame::{FormatProfile, MAGIC_DATA_BLOCK, MAGIC_MAIN_HEADER};
use archvolio::writer::BlockInfo;
use archvolio::{Reader, Writer};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "archvolio", version = "1.0.0", about = "Archive volume I/O core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum FormatVersion {
    V1,
    V2,
}

impl From<FormatVersion> for FormatProfile {
    fn from(v: FormatVersion) -> Self {
        match v {
            FormatVersion::V1 => FormatProfile::V1,
            FormatVersion::V2 => FormatProfile::V2,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write stdin (or a file) into a new archive as a single data block.
    Write {
        /// Archive base path, or "-" for stdout.
        output: String,
        /// Read payload from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "262144")]
        datablocksize: u64,
        #[arg(long, default_value = "1")]
        devblocksize: u64,
        /// Per-volume byte cap; 0 = unlimited.
        #[arg(long, default_value = "0")]
        splitsize: u64,
        #[arg(long)]
        overwrite: bool,
        #[arg(long, value_enum, default_value = "v2")]
        format: FormatVersion,
    },
    /// Read an archive and print its record sequence.
    Read {
        /// Archive base path, or "-" for stdin.
        input: String,
        #[arg(long, default_value = "262144")]
        datablocksize: u64,
        #[arg(long, default_value = "1")]
        devblocksize: u64,
        /// Write the first data block's payload to this file.
        #[arg(long)]
        extract: Option<PathBuf>,
    },
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Write {
            output,
            input,
            datablocksize,
            devblocksize,
            splitsize,
            overwrite,
            format,
        } => cmd_write(output, input, datablocksize, devblocksize, splitsize, overwrite, format.into()),
        Commands::Read {
            input,
            datablocksize,
            devblocksize,
            extract,
        } => cmd_read(input, datablocksize, devblocksize, extract),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("archvolio: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn cmd_write(
    output: String,
    input: Option<PathBuf>,
    datablocksize: u64,
    devblocksize: u64,
    splitsize: u64,
    overwrite: bool,
    format: FormatProfile,
) -> Result<(), FatalError> {
    let mut payload = Vec::new();
    match input {
        Some(path) => {
            std::fs::File::open(&path)?.read_to_end(&mut payload)?;
        }
        None => {
            std::io::stdin().lock().read_to_end(&mut payload)?;
        }
    }

    let options = ArchiveOptions {
        datablocksize,
        splitsize,
        overwrite,
    };
    let mut writer = Writer::create(&output, options, devblocksize, format)?;
    info!(archive_id = writer.archive_id(), "created archive");

    let dico = archvolio::Dictionary::new();
    writer.write_header(MAGIC_MAIN_HEADER, archvolio::frame::FSID_NONE, &dico)?;

    let block = BlockInfo {
        payload,
        logical_offset: 0,
        comp_algo: 0,
        enc_algo: 0,
    };
    writer.write_block(MAGIC_DATA_BLOCK, archvolio::frame::FSID_NONE, &block)?;
    writer.close()?;
    Ok(())
}

fn cmd_read(
    input: String,
    datablocksize: u64,
    devblocksize: u64,
    extract: Option<PathBuf>,
) -> Result<(), FatalError> {
    let mut reader = Reader::open(&input, datablocksize, devblocksize)?;
    info!(archive_id = ?reader.archive_id(), "opened archive");

    loop {
        match reader.read_header()? {
            ReadOutcome::EndOfArchive => {
                println!("-- end of archive --");
                break;
            }
            ReadOutcome::Minor(e) => {
                warn!("minor error reading header: {e}");
                continue;
            }
            ReadOutcome::Success(rec) => {
                println!(
                    "record magic={:?} fsid={} attrs={}",
                    String::from_utf8_lossy(&rec.magic),
                    rec.fsid,
                    rec.dico.len()
                );
                if rec.magic == MAGIC_DATA_BLOCK {
                    if let Some(block) = reader.read_block(&rec.dico, false)? {
                        println!("  payload: {} bytes, sumok={}", block.payload.len(), block.sumok);
                        if let Some(path) = &extract {
                            std::fs::write(path, &block.payload)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
