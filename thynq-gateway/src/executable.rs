//! Main entry point for CLI command to start server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::axum_factory;
use crate::configuration::Configuration;
use crate::configuration::Expansion;
use crate::configuration::generate_config_schema;
use crate::gateway::Gateway;

/// How log lines are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Options for the gateway
#[derive(Parser, Debug)]
#[command(name = "thynq-gateway", about = "A GraphQL query gateway", disable_version_flag = true)]
pub(crate) struct Opt {
    /// Log filter, e.g. info or thynq_gateway=debug (off|error|warn|info|debug|trace).
    #[arg(long = "log", default_value = "info", alias = "log-level", env = "THYNQ_LOG")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "THYNQ_LOG_FORMAT")]
    log_format: LogFormat,

    /// Configuration file location. Defaults apply when absent.
    #[arg(short, long = "config", env = "THYNQ_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Address to listen on, overriding `server.listen`.
    #[arg(long, env = "THYNQ_LISTEN")]
    listen: Option<SocketAddr>,

    /// Prints the configuration schema.
    #[arg(long)]
    schema: bool,

    /// Prints the GraphQL schema.
    #[arg(long)]
    print_sdl: bool,

    /// Display version and exit.
    #[arg(action = clap::ArgAction::SetTrue, long, short = 'V')]
    pub(crate) version: bool,
}

/// This is the main gateway entrypoint.
pub fn main() -> Result<()> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(nb) = std::env::var("THYNQ_NUM_CORES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        builder.worker_threads(nb);
    }
    let runtime = builder.build()?;
    runtime.block_on(Executable::builder().start())
}

/// Entry point into creating a gateway executable.
pub struct Executable {}

#[buildstructor::buildstructor]
impl Executable {
    /// Parses the command line, sets up logging and serves until Ctrl-C or SIGTERM.
    ///
    /// `args` replaces the process arguments, mostly for tests.
    #[builder(entry = "builder", exit = "start", visibility = "pub")]
    async fn start(args: Option<Vec<String>>) -> Result<()> {
        let opt = match args {
            Some(args) => Opt::try_parse_from(args)?,
            None => Opt::parse(),
        };

        if opt.version {
            println!("{}", std::env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        if opt.schema {
            let schema = generate_config_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }

        if opt.print_sdl {
            print!("{}", Gateway::builder().build()?.schema().to_sdl());
            return Ok(());
        }

        let filter =
            EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?;
        let subscriber = tracing_subscriber::fmt::fmt().with_env_filter(filter);
        let installed = match opt.log_format {
            LogFormat::Text => subscriber.try_init(),
            LogFormat::Json => subscriber.json().try_init(),
        };
        if installed.is_err() {
            tracing::debug!("a global subscriber is already installed");
        }

        let configuration = load_configuration(&opt)?;
        tracing::debug!(?configuration, "configuration loaded");

        let gateway = Gateway::from_configuration(&configuration)?;
        let router = axum_factory::make_router(&configuration, gateway)?;
        let listener = axum_factory::bind(&configuration).await?;
        tracing::info!(
            "thynq gateway v{} // introspection {}",
            std::env!("CARGO_PKG_VERSION"),
            if configuration.server.introspection {
                "enabled"
            } else {
                "disabled"
            }
        );
        if let Err(err) = axum_factory::serve(
            listener,
            router,
            &configuration.server.graphql_path,
            shutdown_signal(),
        )
        .await
        {
            tracing::error!("{}", err);
            return Err(err.into());
        }
        Ok(())
    }
}

fn load_configuration(opt: &Opt) -> Result<Configuration> {
    let expansion = Expansion::default_builder().and_listen(opt.listen).build()?;
    let configuration = match &opt.config_path {
        Some(path) => {
            let path = if path.is_relative() {
                std::env::current_dir()?.join(path)
            } else {
                path.clone()
            };
            Configuration::from_file_with_expansion(&path, &expansion)
                .with_context(|| format!("could not load {}", path.display()))?
        }
        None => Configuration::parse("", &expansion)?,
    };
    Ok(configuration)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
