use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fonoteca::config::{AppConfig, CliConfig, FileConfig};
use fonoteca::library::{FileNameMetadataCodec, LibraryManager, LibraryStore, WalkdirLibraryWalker};
use fonoteca::{Database, FileStore, SqliteEventLog, TAG_ARTWORK_EMBEDDED, TAG_ARTWORK_EXTERNAL};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file; its values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    config: Option<PathBuf>,

    /// Path to the SQLite library database file.
    #[clap(long, value_parser = parse_path)]
    db_path: Option<PathBuf>,

    /// Directory owning the physical file storage.
    #[clap(long, value_parser = parse_path)]
    storage_root: Option<PathBuf>,

    /// Library root directory to walk for song files (repeatable).
    #[clap(long = "library-root", value_parser = parse_path)]
    library_roots: Vec<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the library roots and import every discovered song file.
    Import,
    /// Remove catalog rows for songs whose files no longer exist.
    CleanSongs,
    /// Remove externally sourced artwork whose source files no longer exist.
    CleanArtworks,
    /// Pair artwork-less songs with image files found next to them.
    ImportArtworks,
    /// Print storage usage per artwork tag.
    Stats,
}

/// Progress reporter logging at every completed decile.
fn decile_logger(label: &'static str) -> impl FnMut(f64) {
    let mut last_decile = 0u8;
    move |fraction: f64| {
        let decile = (fraction * 10.0) as u8;
        if decile > last_decile {
            last_decile = decile;
            info!("{}: {}%", label, decile * 10);
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path.clone(),
        storage_root: cli_args.storage_root.clone(),
        library_roots: cli_args.library_roots.clone(),
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening library database at {:?}", config.db_path);
    let db = Database::open(&config.db_path)?;
    let files = Arc::new(FileStore::new(db.clone(), &config.storage_root)?);
    let library = LibraryStore::new(db.clone());
    let events = Arc::new(SqliteEventLog::new(db.clone()));
    let manager = LibraryManager::new(
        db,
        Arc::clone(&files),
        library,
        events,
        Arc::new(FileNameMetadataCodec),
    );
    let walker = WalkdirLibraryWalker::new(config.library_roots.clone());

    match cli_args.command {
        Command::Import => {
            use fonoteca::library::LibraryWalker;
            let songs = walker.discover_songs()?;
            let total = songs.len();
            info!("Discovered {} song files", total);
            let mut imported = 0usize;
            for path in songs {
                manager
                    .import_song(&path)
                    .with_context(|| format!("Failed to import {:?}", path))?;
                imported += 1;
                if imported % 100 == 0 {
                    info!("Imported {}/{} songs", imported, total);
                }
            }
            info!("Imported {} songs", imported);
        }
        Command::CleanSongs => {
            let removed = manager.clean_songs(&walker, decile_logger("clean-songs"))?;
            info!("Removed {} orphaned songs", removed);
        }
        Command::CleanArtworks => {
            let removed = manager.clean_artworks(decile_logger("clean-artworks"))?;
            info!("Removed {} orphaned artworks", removed);
        }
        Command::ImportArtworks => {
            let updated = manager.import_artworks(decile_logger("import-artworks"))?;
            info!("Updated artwork on {} songs", updated);
        }
        Command::Stats => {
            for tag in [TAG_ARTWORK_EXTERNAL, TAG_ARTWORK_EMBEDDED] {
                let count = files.count_by_tag(tag)?;
                let size = files.size_by_tag(tag)?;
                println!("{}: {} files, {} bytes", tag, count, size);
            }
            println!("total: {} files", files.count()?);
        }
    }

    Ok(())
}
