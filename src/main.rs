use clap::{Parser, Subcommand};
use sparsestream::codec::{CodecId, DEFAULT_COMPRESSION_LEVEL};
use sparsestream::image::{restore_image, scan_extents, write_backup};
use sparsestream::{Block, Directory, DiskInfo, SparseStream, StreamReader, ZipStream};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sparsestream", about = "Sparse disk backup stream tool")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up a raw disk image into a sparse stream
    Backup {
        image: PathBuf,
        /// Target directory (created if missing)
        #[arg(short, long, required_unless_present = "zip", conflicts_with = "zip")]
        output: Option<PathBuf>,
        /// Write a zip archive to stdout instead of a directory
        #[arg(short, long)]
        zip: bool,
        /// Disk target name recorded in the metadata (default: image file stem)
        #[arg(long)]
        disk_name: Option<String>,
        #[arg(long, default_value = "raw")]
        disk_format: String,
        #[arg(long, default_value = "sparsestream.0")]
        checkpoint: String,
        /// Parent checkpoint; marks the backup as incremental
        #[arg(long)]
        parent: Option<String>,
        /// Codec: none (default), lz4, zstd
        #[arg(short, long, default_value = "none")]
        compress: String,
        /// Compression level (zstd 1-19; ignored for lz4)
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
        /// Block size in KiB used to detect unallocated regions
        #[arg(long, default_value = "64")]
        block_size: usize,
    },
    /// Rebuild a raw disk image from a sparse stream
    Restore {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show stream metadata, blocks and compression trailer
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Backup ───────────────────────────────────────────────────────────
        Commands::Backup {
            image, output, zip, disk_name, disk_format, checkpoint, parent,
            compress, level, block_size,
        } => {
            let mut src = File::open(&image)?;
            let virtual_size = src.metadata()?.len();
            let extents = scan_extents(&mut src, block_size.max(1) * 1024)?;
            let data_size = extents.iter().filter(|e| e.data).map(|e| e.length).sum();

            let codec = parse_codec(&compress);
            let compressed = codec != CodecId::None;
            let mut format = SparseStream::default();
            if compressed {
                format = format.with_compression(codec);
            }
            let disk = DiskInfo {
                target: disk_name.unwrap_or_else(|| file_stem(&image)),
                format: disk_format,
            };
            let meta = format.metadata(
                virtual_size,
                data_size,
                &disk,
                &checkpoint,
                parent.as_deref(),
                parent.is_some(),
                compressed,
            )?;
            info!(
                image = %image.display(),
                virtual_size,
                data_size,
                extents = extents.len(),
                "scanned disk image"
            );

            if zip {
                let mut target = ZipStream::stdout();
                write_backup(&mut target, &mut src, &extents, &meta, level)?;
                target.finish()?;
            } else {
                let dir = output.ok_or("--output is required without --zip")?;
                let mut target = match Directory::new(&dir) {
                    Ok(t) => t,
                    Err(e) => {
                        error!("{e}");
                        std::process::exit(1);
                    }
                };
                write_backup(&mut target, &mut src, &extents, &meta, level)?;
            }
        }

        // ── Restore ──────────────────────────────────────────────────────────
        Commands::Restore { input, output } => {
            let mut reader = StreamReader::open(BufReader::new(File::open(&input)?))?;
            let mut out = File::create(&output)?;
            restore_image(&mut reader, &mut out)?;
            info!(output = %output.display(), "wrote raw image");
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let mut reader = StreamReader::open(BufReader::new(File::open(&input)?))?;
            let meta = reader.metadata().clone();
            println!("── Sparse stream ────────────────────────────────────────");
            println!("  Path             {}", input.display());
            println!("  Stream version   {}", meta.stream_version());
            println!("  Date             {}", meta.date);
            println!("  Disk             {} ({})", meta.disk_name, meta.disk_format);
            println!("  Virtual size     {} B", meta.virtual_size);
            println!("  Data size        {} B", meta.data_size);
            println!("  Checkpoint       {}", meta.checkpoint_name);
            println!("  Parent           {}", meta.parent_checkpoint.as_deref().unwrap_or("—"));
            println!("  Incremental      {}", meta.incremental);
            println!("  Compressed       {} ({})", meta.compressed, meta.compression_method);
            if let Some(trailer) = reader.trailer() {
                println!("  Trailer entries  {}", trailer.len());
                println!("  Compressed bytes {} B", trailer.total());
            }
            println!("{:<6} {:>18} {:>14} {:>14}", "Kind", "Start", "Length", "On wire");
            let trailer = reader.trailer().cloned();
            for block in &mut reader {
                let block = block?;
                let (kind, wire) = match &block {
                    Block::Data { start, data } => (
                        "data",
                        trailer.as_ref().and_then(|t| t.get(*start)).unwrap_or(data.len() as u64),
                    ),
                    Block::Zero { .. } => ("zero", 0),
                };
                println!("{:<6} {:>#18x} {:>14} {:>14}", kind, block.start(), block.len(), wire);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout may carry the zip stream
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_codec(s: &str) -> CodecId {
    CodecId::from_name(s).unwrap_or_else(|| {
        warn!("Unknown codec '{}', writing uncompressed", s);
        CodecId::None
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "disk".to_string())
}
