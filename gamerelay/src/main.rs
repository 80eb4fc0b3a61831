use std::{env, io, process::exit};

use args::{ArgumentsRequest, StartupArguments};
use gamerelay::{config::ProxyConfig, protocol::Services, server::ProxyServer};
use tokio::task::LocalSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod args;

fn main() {
    let arguments = match args::parse_arguments(env::args()) {
        Err(err) => {
            eprintln!("{err}\n\nType 'relay --help' for a help menu");
            exit(1);
        }
        Ok(arguments) => arguments,
    };

    let startup_args = match arguments {
        ArgumentsRequest::Version => {
            println!("{}", args::get_version_string());
            return;
        }
        ArgumentsRequest::Help => {
            println!("{}", args::get_help_string());
            return;
        }
        ArgumentsRequest::Run(startup_args) => startup_args,
    };

    init_logging(&startup_args);

    let runtime_result = tokio::runtime::Builder::new_current_thread().enable_all().build();

    let result = match runtime_result {
        Ok(runtime) => LocalSet::new().block_on(&runtime, async_main(startup_args)),
        Err(err) => {
            eprintln!("Failed to start Tokio runtime: {err}");
            exit(1);
        }
    };

    if let Err(error) = result {
        error!("Relay finished with error: {error}");
        exit(1);
    }
}

fn init_logging(startup_args: &StartupArguments) {
    let default_level = match (startup_args.verbose, startup_args.silent) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn async_main(startup_args: StartupArguments) -> Result<(), io::Error> {
    let config = ProxyConfig::new(startup_args.session_timeout, startup_args.save_files_dir);
    if let Some(dir) = &config.save_files_dir {
        std::fs::create_dir_all(dir)?;
        info!("Saving transferred files into {}", dir.display());
    }

    let mut server = ProxyServer::new(config, Services::default());
    for spec in &startup_args.listeners {
        if let Err(error) = server.listen(spec.port, spec.version, spec.default_destination) {
            return Err(io::Error::new(io::ErrorKind::Other, format!("Couldn't listen on port {}: {error}", spec.port)));
        }
    }

    tokio::select! {
        biased;
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted, shutting down");
        }
        _ = server.run() => {}
    }

    Ok(())
}
