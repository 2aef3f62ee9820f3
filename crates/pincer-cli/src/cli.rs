//! Command-line argument parsing with clap.
//!
//! Every decision the tool needs is a flag; nothing prompts. Destructive
//! operations take `--force` and refuse without it.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Pincer - WireGuard tunnel provisioning.
#[derive(Parser, Debug, Clone)]
#[command(name = "pincer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Interface name for WireGuard.
    #[arg(short, long, global = true, default_value = "wg0")]
    pub interface: String,

    /// Directory holding the pincer configs and secrets.
    #[arg(short, long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new interface config and secret.
    Init(InitArgs),

    /// Add a new client to an existing interface.
    AddPeer(AddPeerArgs),

    /// Generate or regenerate public, private and preshared keys.
    GenerateKeys(GenerateKeysArgs),

    /// Check whether the config is ready for export.
    Check,

    /// Print the server's wg-quick config.
    ExportServerConfig,

    /// Print a client's wg-quick config.
    ExportClientConfig {
        /// Name of the peer.
        #[arg(short, long)]
        name: String,
    },
}

/// Arguments for `init`.
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Interface.ListenPort of the relay server.
    #[arg(short = 'p', long, default_value_t = 51820)]
    pub listen_port: u16,

    /// Interface.Address of the relay server (comma-separated CIDRs).
    #[arg(short, long, default_value = "192.168.10.1/24")]
    pub addresses: String,

    /// Default Peer.Endpoint in clients' configs (e.g. example.com:51820).
    /// A missing port is filled in from the listen port.
    #[arg(short = 'e', long)]
    pub default_endpoint: String,

    /// Interface to forward internet traffic to (usually eth0 or wlan0).
    /// Empty disables forwarding and NAT.
    #[arg(long, default_value = "")]
    pub internet_interface_name: String,

    /// Whether clients may connect with each other.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub allow_intranet: bool,

    /// Allow clients to reach any IP on the relay server instead of only
    /// the tunnel addresses.
    #[arg(long)]
    pub allow_all_server_ip: bool,

    /// Overwrite existing config and secret files.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `add-peer`.
#[derive(Args, Debug, Clone)]
pub struct AddPeerArgs {
    /// Name of the peer.
    #[arg(short, long)]
    pub name: String,

    /// Interface.Address of the client (comma-separated CIDRs).
    /// Defaults to the next free host address in the server subnets.
    #[arg(short, long)]
    pub addresses: Option<String>,

    /// Peer.AllowedIPs of the client (comma-separated CIDRs).
    #[arg(long)]
    pub client_allowed_ips: Option<String>,

    /// Peer.PersistentKeepalive of the client.
    #[arg(long, default_value_t = 25)]
    pub client_persistent_keepalive: u16,
}

/// Arguments for `generate-keys`.
#[derive(Args, Debug, Clone)]
pub struct GenerateKeysArgs {
    /// Regenerate the whole secret file.
    #[arg(short, long)]
    pub all: bool,

    /// Regenerate the server secret.
    #[arg(short, long)]
    pub server: bool,

    /// Only generate the missing peer secrets.
    #[arg(short, long)]
    pub missing: bool,

    /// Regenerate a specific peer secret. Can be given multiple times.
    #[arg(short, long)]
    pub peer: Vec<String>,

    /// Overwrite existing keys without refusing.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_check_with_defaults() {
        let cli = Cli::parse_from(["pincer", "check"]);
        assert_eq!(cli.interface, "wg0");
        assert_eq!(cli.config_dir, PathBuf::from("."));
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn cli_parses_init() {
        let cli = Cli::parse_from([
            "pincer",
            "init",
            "--default-endpoint",
            "example.com",
            "--internet-interface-name",
            "eth0",
        ]);
        match cli.command {
            Commands::Init(args) => {
                assert_eq!(args.listen_port, 51820);
                assert_eq!(args.addresses, "192.168.10.1/24");
                assert_eq!(args.default_endpoint, "example.com");
                assert_eq!(args.internet_interface_name, "eth0");
                assert!(args.allow_intranet);
                assert!(!args.allow_all_server_ip);
                assert!(!args.force);
            }
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn cli_parses_negated_intranet() {
        let cli = Cli::parse_from([
            "pincer",
            "init",
            "-e",
            "example.com",
            "--allow-intranet",
            "false",
        ]);
        match cli.command {
            Commands::Init(args) => assert!(!args.allow_intranet),
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn cli_parses_repeated_peer_flags() {
        let cli = Cli::parse_from([
            "pincer",
            "generate-keys",
            "--peer",
            "alice",
            "--peer",
            "bob",
            "--force",
        ]);
        match cli.command {
            Commands::GenerateKeys(args) => {
                assert_eq!(args.peer, vec!["alice", "bob"]);
                assert!(args.force);
            }
            _ => panic!("expected generate-keys"),
        }
    }

    #[test]
    fn cli_respects_global_interface_flag() {
        let cli = Cli::parse_from(["pincer", "export-server-config", "-i", "wg1"]);
        assert_eq!(cli.interface, "wg1");
    }
}
