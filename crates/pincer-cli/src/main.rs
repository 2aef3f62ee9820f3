//! Pincer CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pincer_cli::cli::{Cli, Commands};
use pincer_cli::commands;
use pincer_cli::CliError;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let dir = cli.config_dir.as_path();
    let interface = cli.interface.as_str();
    match &cli.command {
        Commands::Init(args) => commands::init(dir, interface, args),
        Commands::AddPeer(args) => commands::add_peer(dir, interface, args),
        Commands::GenerateKeys(args) => commands::generate_keys(dir, interface, args),
        Commands::Check => commands::check(dir, interface),
        Commands::ExportServerConfig => commands::export_server_config(dir, interface),
        Commands::ExportClientConfig { name } => {
            commands::export_client_config(dir, interface, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_check_fails_without_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = Cli::parse_from([
            "pincer",
            "--config-dir",
            dir.path().to_str().expect("utf8 path"),
            "check",
        ]);
        assert!(run(&cli).is_err());
    }

    #[test]
    fn run_init_then_export() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dir_arg = dir.path().to_str().expect("utf8 path");
        let init = Cli::parse_from([
            "pincer",
            "--config-dir",
            dir_arg,
            "init",
            "--default-endpoint",
            "vpn.example.org",
        ]);
        run(&init).expect("init");
        let export = Cli::parse_from([
            "pincer",
            "--config-dir",
            dir_arg,
            "export-server-config",
        ]);
        run(&export).expect("export");
    }
}
