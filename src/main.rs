mod cli;

use galleria::config::{self, Config};
use galleria::images::UploadStore;
use galleria::server;
use galleria::transfer::{self, ExportBuilder, ImportEvent, ImportPipeline};
use galleria_core::{ImageId, ImageStatus};
use galleria_db::pool::{get_conn, init_pool_with, DbPool};
use galleria_db::queries::images;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::Path;

fn open_database(config: &Config) -> Result<DbPool> {
    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {:?}",
            config.storage.data_dir
        )
    })?;

    let db_path = config.storage.db_path();
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Opening database at {}", db_path_str);
    Ok(init_pool_with(
        &db_path_str,
        config.storage.pool_settings(),
    )?)
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Galleria server");
    tracing::info!(
        "Serving uploads from {:?} at /{}",
        config.storage.upload_root(),
        config.storage.upload_folder.trim_matches('/')
    );

    let db = open_database(&config)?;
    server::start_server(config, db).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "galleria=trace,galleria_db=debug,galleria_core=debug,tower_http=debug".to_string()
        } else {
            "galleria=info,galleria_db=info,tower_http=info".to_string()
        }
    });

    // Logs go to stderr so import progress on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, config_path))
        }
        Commands::Import { ref archive } => import_archive(archive, config_path),
        Commands::Export {
            ref output,
            ref status,
        } => export_archive(output, status.as_deref(), config_path),
        Commands::Approve { ref id } => moderate(id, ImageStatus::Approved, config_path),
        Commands::Reject { ref id } => moderate(id, ImageStatus::Rejected, config_path),
        Commands::Delete { ref id } => delete_image(id, config_path),
        Commands::Validate {
            config: ref validate_path,
        } => validate_config(validate_path.as_deref().or(config_path)),
        Commands::Version => {
            println!("galleria {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn import_archive(archive: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !archive.exists() {
        anyhow::bail!("Archive does not exist: {:?}", archive);
    }

    let db = open_database(&config)?;
    let uploads = UploadStore::from_config(&config.storage);

    // The pipeline deletes its input, so it gets a staged copy
    let mut src = std::fs::File::open(archive)
        .with_context(|| format!("Failed to open archive {:?}", archive))?;
    let staged = transfer::stage_archive(&config.import.staging_dir(), &mut src)
        .context("Failed to stage archive for import")?;

    tracing::info!("Importing {:?}", archive);
    let pipeline = ImportPipeline::new(staged, db, uploads).with_pace(config.import.pace());

    let mut stdout = std::io::stdout().lock();
    let mut finished = false;
    for event in pipeline {
        write!(stdout, "{event}")?;
        stdout.flush()?;
        finished |= matches!(event, ImportEvent::Finished(_));
    }

    if !finished {
        anyhow::bail!("Import of {:?} aborted", archive);
    }
    Ok(())
}

fn export_archive(output: &Path, status: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let status = status.map(str::parse::<ImageStatus>).transpose()?;

    let db = open_database(&config)?;
    let conn = get_conn(&db)?;
    let uploads = UploadStore::from_config(&config.storage);

    let summary = ExportBuilder::new(&conn, &uploads)
        .with_status(status)
        .write_file(output)
        .with_context(|| format!("Failed to export to {:?}", output))?;

    println!(
        "Exported {} image(s) and {} asset(s) to {}",
        summary.images,
        summary.assets,
        output.display()
    );
    Ok(())
}

fn parse_image_id(raw: &str) -> Result<ImageId> {
    raw.parse()
        .with_context(|| format!("Invalid image id: {raw}"))
}

fn moderate(id: &str, status: ImageStatus, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let id = parse_image_id(id)?;

    let db = open_database(&config)?;
    let conn = get_conn(&db)?;
    if !images::set_status(&conn, id, status)? {
        anyhow::bail!("Image not found: {id}");
    }

    println!("Image {id} is now {status}");
    Ok(())
}

fn delete_image(id: &str, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let id = parse_image_id(id)?;

    let db = open_database(&config)?;
    let conn = get_conn(&db)?;
    if !images::delete_image(&conn, id)? {
        anyhow::bail!("Image not found: {id}");
    }

    println!("Deleted image {id} (asset files were left in place)");
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Data dir: {:?}", config.storage.data_dir);
            println!("  Upload folder: {}", config.storage.upload_folder);
            println!("  Database: {:?}", config.storage.db_path());
            println!("  DB pool size: {}", config.storage.db_pool_size);
            println!("  Import pace: {} ms", config.import.pace_ms);
            println!("  Max upload: {} MB", config.import.max_upload_mb);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Upload folder: {}", config.storage.upload_folder);
        }
    }

    Ok(())
}
