//! ricottad - the mirror server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ricotta_downloader::{Client, DownloaderConfig};
use ricotta_housekeeper::House;
use ricotta_server::{AppState, VERSION, create_router};
use sqlx::mysql::MySqlPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ricotta - a caching beatmap mirror and search front-end
#[derive(Parser, Debug)]
#[command(name = "ricottad", version, about, long_about = None)]
struct Args {
    /// DSN of the primary MySQL catalog
    #[arg(
        short = 'm',
        long,
        env = "MYSQL_DSN",
        default_value = "mysql://root@localhost/ricotta"
    )]
    mysql_dsn: String,

    /// DSN of the full-text engine (SphinxQL/Manticore, MySQL protocol)
    #[arg(
        long,
        env = "SEARCH_DSN",
        default_value = "mysql://root@127.0.0.1:9306/ricotta"
    )]
    search_dsn: String,

    /// Address on which to take HTTP requests
    #[arg(short = 'a', long, env = "HTTP_ADDR", default_value = "127.0.0.1:62011")]
    http_addr: String,

    /// Maximum number of GB used by the beatmap cache
    #[arg(long, env = "MAXIMUM_DISK", default_value_t = 10.0)]
    max_disk: f64,

    /// Host to download beatmaps from
    #[arg(long, env = "DOWNLOAD_HOSTNAME", default_value = "osu.ppy.sh")]
    download_host: String,

    /// Secret token guarding /api/update
    #[arg(long, env = "SECRET_CI", default_value = "", hide_default_value = true)]
    secret: String,

    /// Data volume roots, comma-separated; archives are written to the last
    #[arg(
        long = "folders",
        env = "DATA_FOLDERS",
        default_value = "/data/",
        value_delimiter = ','
    )]
    folders: Vec<PathBuf>,

    /// Purge files that are not zip archives from the data volumes, then exit
    #[arg(long)]
    remove_non_zip: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!(version = VERSION, "starting ricotta");

    let house = House::new(args.folders, args.max_disk);
    if args.remove_non_zip {
        let removed = house
            .remove_non_zip()
            .await
            .context("purging non-zip files")?;
        tracing::info!(removed, "purged non-zip files");
        return Ok(());
    }

    house
        .load_state()
        .await
        .context("scanning data folders")?;
    house.spawn_cleaner();

    let db = MySqlPoolOptions::new()
        .max_connections(16)
        .connect(&args.mysql_dsn)
        .await
        .context("connecting to MySQL")?;
    let search_db = MySqlPoolOptions::new()
        .max_connections(4)
        .connect(&args.search_dsn)
        .await
        .context("connecting to the full-text engine")?;

    let downloader = Arc::new(
        Client::new(DownloaderConfig {
            primary_host: args.download_host,
        })
        .context("building the download client")?,
    );

    let state = AppState {
        db,
        search_db,
        house,
        downloader,
        secret: args.secret.into(),
        refresher: None,
    };

    let listener = TcpListener::bind(&args.http_addr)
        .await
        .with_context(|| format!("binding {}", args.http_addr))?;
    tracing::info!(addr = %args.http_addr, "listening");
    axum::serve(listener, create_router(state))
        .await
        .context("serving HTTP")?;
    Ok(())
}
