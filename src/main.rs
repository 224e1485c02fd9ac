use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use zoned::fs_util::zone_from_file;
use zoned::server::{shutdown_on, Server, ZoneHandler};
use zoned::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Parser)]
/// An authoritative DNS server for IPv4 address records.
///
/// zoned answers `IN A` queries over UDP from a zone database with
/// one record per line:
///
///     www.example.com. IN A 93.184.216.34
///
/// It does not do recursive resolution.
struct Args {
    /// Path to the zone database [required here or in the settings file]
    #[clap(short, long, env = "ZONED_DB")]
    db: Option<PathBuf>,

    /// Address to listen on [default: 127.0.0.1]
    #[clap(long, env = "ZONED_HOST")]
    host: Option<IpAddr>,

    /// UDP port to listen on [default: 53]
    #[clap(short, long, env = "ZONED_PORT")]
    port: Option<u16>,

    /// Number of tasks reading from the socket [default: 1]
    #[clap(short, long, env = "ZONED_WORKERS")]
    workers: Option<NonZeroUsize>,

    /// Path to a YAML settings file, command-line flags take precedence
    #[clap(short, long, env = "ZONED_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[clap(long, value_enum, default_value_t = LogFormat::Plain, env = "ZONED_LOG_FORMAT")]
    log_format: LogFormat,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            db: self.db.clone(),
            host: self.host,
            port: self.port,
            workers: self.workers,
        }
    }
}

fn begin_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Plain => subscriber.init(),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging(args.log_format);

    let file_settings = match &args.config {
        Some(path) => match Settings::new(&path.to_string_lossy()) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::error!(?path, %error, "could not read settings file");
                process::exit(1);
            }
        },
        None => Settings::default(),
    };

    let Some(settings) = args.settings().or(file_settings).resolve() else {
        Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a zone database is required, with --db or in the settings file",
            )
            .exit();
    };

    let zone = match zone_from_file(&settings.db).await {
        Ok(Ok(zone)) => zone,
        Ok(Err(error)) => {
            tracing::error!(path = ?settings.db, line = error.line(), %error, "could not parse zone database");
            process::exit(1);
        }
        Err(error) => {
            tracing::error!(path = ?settings.db, ?error, "could not read zone database");
            process::exit(1);
        }
    };

    tracing::info!(path = ?settings.db, records = zone.len(), "loaded zone database");

    let server = match Server::bind(settings.address, ZoneHandler::new(zone)).await {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(address = %settings.address, ?error, "could not bind UDP socket");
            process::exit(1);
        }
    };

    tracing::info!(address = %settings.address, "bound UDP socket");

    server
        .run_until(settings.workers.get(), shutdown_on(tokio::signal::ctrl_c()))
        .await;
}
