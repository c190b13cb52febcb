use std::error::Error;
use std::process;
use std::sync::Arc;

use clap::{Parser, ValueHint};
use log::{debug, error, info, LevelFilter};

use remote_bridge::{
    config::{Config, FileKeyStore, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_PORT},
    dispatch::Hooks,
    notify::Notifier,
    protocol::PlayerState,
    session::Session,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller server host
    #[arg(short, long, value_hint = ValueHint::Hostname, default_value_t = String::from(DEFAULT_HOST))]
    server: String,

    /// Controller server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path below the server root (optional)
    #[arg(long, default_value_t = String::from(DEFAULT_PATH))]
    path: String,

    /// Use a secure connection (wss)
    #[arg(long, default_value_t = false)]
    secure: bool,

    /// File persisting the session key between runs
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("remote-bridge.toml"))]
    keys_file: String,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Hooks that log every remote command.
///
/// The binary has no playback engine attached; it serves as a diagnostic
/// client for verifying server connectivity and command routing.
fn logging_hooks() -> Hooks {
    Hooks {
        play: Some(Box::new(|| Box::pin(async { info!("remote: play") }))),
        pause: Some(Box::new(|| Box::pin(async { info!("remote: pause") }))),
        next: Some(Box::new(|| Box::pin(async { info!("remote: next") }))),
        previous: Some(Box::new(|| Box::pin(async { info!("remote: previous") }))),
        seek: Some(Box::new(|position| {
            Box::pin(async move { info!("remote: seek to {position} ms") })
        })),
        move_item: Some(Box::new(|from, to| {
            Box::pin(async move { info!("remote: move playlist item {from} -> {to}") })
        })),
        remove_item: Some(Box::new(|index| {
            Box::pin(async move { info!("remote: remove playlist item {index}") })
        })),
        shuffle: Some(Box::new(|enabled| {
            Box::pin(async move { info!("remote: shuffle {enabled}") })
        })),
        repeat: Some(Box::new(|mode| {
            Box::pin(async move { info!("remote: repeat {mode:?}") })
        })),
        volume: Some(Box::new(|volume| {
            Box::pin(async move { info!("remote: volume {volume}") })
        })),
        request_state: Some(Box::new(|| {
            Box::pin(async {
                info!("remote: state requested");
                PlayerState::default()
            })
        })),
    }
}

/// Main application loop: connect, then wait for shutdown.
///
/// There is no automatic reconnect; a dropped connection stays dropped
/// until the process is restarted or the server reconnects us.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config {
        host: args.server,
        port: args.port,
        path: args.path,
        secure: args.secure,
    };

    let keys = Arc::new(FileKeyStore::new(args.keys_file));
    let notifier = Notifier::new(Box::new(|text: &str| info!("status: {text}")));
    let session = Session::new(config, keys, logging_hooks(), notifier);

    session.connect(false).await;

    tokio::signal::ctrl_c().await?;
    info!("shutting down gracefully");
    session.close().await;

    Ok(())
}

/// Main entry point of the application.
#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    info!(
        "starting {}/{}; {BUILD_PROFILE}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
