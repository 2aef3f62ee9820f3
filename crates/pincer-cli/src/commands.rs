//! Command implementations.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tracing::info;

use pincer_core::{
    firewall, Endpoint, GenerateKeys, InterfaceConfig, Keepalive, PeerConfig, Provision,
    ServerSecret,
};
use pincer_keys::X25519KeyService;

use crate::cli::{AddPeerArgs, GenerateKeysArgs, InitArgs};
use crate::error::CliError;

fn parse_address_list(field: &str, text: &str) -> Result<Vec<IpNet>, CliError> {
    text.split(',')
        .map(str::trim)
        .map(|part| {
            part.parse::<IpNet>().map_err(|e| CliError::InvalidArgument {
                field: field.to_string(),
                reason: format!("'{part}': {e}"),
            })
        })
        .collect()
}

/// `0.0.0.0/0, ::/0` - route everything through the tunnel.
fn default_client_allowed_ips() -> Vec<IpNet> {
    vec![
        Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 0)
            .map(IpNet::V4)
            .unwrap_or_else(|_| unreachable!()),
        Ipv6Net::new(Ipv6Addr::UNSPECIFIED, 0)
            .map(IpNet::V6)
            .unwrap_or_else(|_| unreachable!()),
    ]
}

/// Initializes a new interface: config, firewall hooks, and server secret.
pub fn init(config_dir: &Path, interface: &str, args: &InitArgs) -> Result<(), CliError> {
    let mut endpoint = args.default_endpoint.clone();
    if !endpoint.contains(':') {
        endpoint.push_str(&format!(":{}", args.listen_port));
    }
    let endpoint: Endpoint = endpoint.parse().map_err(CliError::Core)?;
    let addresses = parse_address_list("addresses", &args.addresses)?;

    let (post_up, pre_down) = firewall::build_rules(
        &args.internet_interface_name,
        args.allow_intranet,
        args.allow_all_server_ip,
        &addresses,
    );
    let config = InterfaceConfig::new(interface, args.listen_port, addresses, endpoint)?
        .with_post_up(post_up)
        .with_pre_down(pre_down);

    let service = X25519KeyService;
    let secret = ServerSecret::generate(&service)?;
    Provision::new(config, secret).store_new(config_dir, interface, args.force)?;
    info!(interface, "interface initialized");
    Ok(())
}

/// Adds a client to an existing interface and prints its wg-quick config.
pub fn add_peer(config_dir: &Path, interface: &str, args: &AddPeerArgs) -> Result<(), CliError> {
    let service = X25519KeyService;
    let mut provision = Provision::load(config_dir, interface)?;

    let addresses = match &args.addresses {
        Some(text) => parse_address_list("addresses", text)?,
        None => {
            let next = provision
                .config
                .find_next_available_address()
                .ok_or(CliError::AddressPoolExhausted)?;
            vec![IpNet::from(next)]
        }
    };
    let client_allowed_ips = match &args.client_allowed_ips {
        Some(text) => parse_address_list("client-allowed-ips", text)?,
        None => default_client_allowed_ips(),
    };

    let peer = PeerConfig::new(addresses.clone(), addresses, client_allowed_ips)?
        .with_client_persistent_keepalive(Keepalive::Secs(args.client_persistent_keepalive));
    provision.add_peer(&service, &args.name, peer)?;
    provision.store(config_dir, interface)?;
    info!(peer = %args.name, "peer added");

    let ini = provision
        .client_wg_quick(&service, &args.name)?
        .format_ini()?;
    println!("{ini}");
    Ok(())
}

/// Generates or regenerates key material; persists the secret only when
/// something actually changed.
pub fn generate_keys(
    config_dir: &Path,
    interface: &str,
    args: &GenerateKeysArgs,
) -> Result<(), CliError> {
    let service = X25519KeyService;
    let mut provision = Provision::load(config_dir, interface)?;
    let request = GenerateKeys {
        all: args.all,
        server: args.server,
        missing: args.missing,
        peers: args.peer.clone(),
        force: args.force,
    };
    let filled = provision.generate_keys(&service, &request)?;
    if !filled.is_empty() {
        info!(peers = ?filled, "generated secrets for missing peers");
    }
    if args.all || args.server || !args.peer.is_empty() || !filled.is_empty() {
        provision.store_secret(config_dir, interface)?;
    } else {
        info!("nothing changed");
    }
    Ok(())
}

/// Checks that the documents are consistent and ready for export.
pub fn check(config_dir: &Path, interface: &str) -> Result<(), CliError> {
    let provision = Provision::load(config_dir, interface)?;
    provision.check_secret(&X25519KeyService)?;
    info!(interface, "config and secret are consistent");
    Ok(())
}

/// Prints the server's wg-quick config to stdout.
pub fn export_server_config(config_dir: &Path, interface: &str) -> Result<(), CliError> {
    let provision = Provision::load(config_dir, interface)?;
    let ini = provision.server_wg_quick(&X25519KeyService)?.format_ini()?;
    println!("{ini}");
    Ok(())
}

/// Prints a client's wg-quick config to stdout.
pub fn export_client_config(
    config_dir: &Path,
    interface: &str,
    name: &str,
) -> Result<(), CliError> {
    let provision = Provision::load(config_dir, interface)?;
    let ini = provision
        .client_wg_quick(&X25519KeyService, name)?
        .format_ini()?;
    println!("{ini}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{AddPeerArgs, GenerateKeysArgs, InitArgs};

    fn init_args() -> InitArgs {
        InitArgs {
            listen_port: 51820,
            addresses: "192.168.10.1/24".to_string(),
            default_endpoint: "example.com".to_string(),
            internet_interface_name: "eth0".to_string(),
            allow_intranet: true,
            allow_all_server_ip: false,
            force: false,
        }
    }

    fn add_peer_args(name: &str) -> AddPeerArgs {
        AddPeerArgs {
            name: name.to_string(),
            addresses: None,
            client_allowed_ips: None,
            client_persistent_keepalive: 25,
        }
    }

    #[test]
    fn init_completes_endpoint_port_and_wires_firewall() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("init");

        let provision = Provision::load(dir.path(), "wg0").expect("load");
        assert_eq!(
            provision.config.default_endpoint.as_str(),
            "example.com:51820"
        );
        assert_eq!(provision.config.post_up.len(), 6);
        assert_eq!(provision.config.pre_down.len(), 6);
        assert!(provision.config.post_up[0].contains(" -A "));
        assert!(provision.config.pre_down[0].contains(" -D "));
    }

    #[test]
    fn init_refuses_existing_documents_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("first init");
        let err = init(dir.path(), "wg0", &init_args()).expect_err("must refuse");
        assert!(matches!(
            err,
            CliError::Core(pincer_core::Error::ForceRequired { .. })
        ));
        let mut forced = init_args();
        forced.force = true;
        init(dir.path(), "wg0", &forced).expect("forced init");
    }

    #[test]
    fn add_peer_allocates_next_address_and_stays_consistent() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("init");
        add_peer(dir.path(), "wg0", &add_peer_args("client_0")).expect("add");

        let provision = Provision::load(dir.path(), "wg0").expect("load");
        let peer = provision
            .config
            .peers
            .get("client_0")
            .expect("peer configured");
        assert_eq!(peer.addresses[0].to_string(), "192.168.10.2/32");
        assert_eq!(peer.server_allowed_ips, peer.addresses);
        assert_eq!(peer.client_allowed_ips.len(), 2);
        check(dir.path(), "wg0").expect("consistent");
    }

    #[test]
    fn add_peer_rejects_duplicate_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("init");
        add_peer(dir.path(), "wg0", &add_peer_args("client_0")).expect("add");
        let err =
            add_peer(dir.path(), "wg0", &add_peer_args("client_0")).expect_err("must refuse");
        assert!(matches!(
            err,
            CliError::Core(pincer_core::Error::DuplicatePeer(_))
        ));
    }

    #[test]
    fn generate_keys_missing_repairs_a_gap() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("init");
        add_peer(dir.path(), "wg0", &add_peer_args("client_0")).expect("add");

        // Drop the peer's secret behind the tool's back.
        let mut provision = Provision::load(dir.path(), "wg0").expect("load");
        provision.secret.peers.remove("client_0");
        provision
            .store_secret(dir.path(), "wg0")
            .expect("persist gap");
        assert!(check(dir.path(), "wg0").is_err());

        let args = GenerateKeysArgs {
            all: false,
            server: false,
            missing: true,
            peer: Vec::new(),
            force: false,
        };
        generate_keys(dir.path(), "wg0", &args).expect("repair");
        check(dir.path(), "wg0").expect("consistent again");
    }

    #[test]
    fn regenerate_all_requires_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("init");
        let args = GenerateKeysArgs {
            all: true,
            server: false,
            missing: false,
            peer: Vec::new(),
            force: false,
        };
        let err = generate_keys(dir.path(), "wg0", &args).expect_err("must refuse");
        assert!(matches!(
            err,
            CliError::Core(pincer_core::Error::ForceRequired { .. })
        ));
    }

    #[test]
    fn bad_address_list_names_the_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        init(dir.path(), "wg0", &init_args()).expect("init");
        let mut args = add_peer_args("client_0");
        args.addresses = Some("not-a-cidr".to_string());
        let err = add_peer(dir.path(), "wg0", &args).expect_err("must fail");
        assert!(matches!(
            err,
            CliError::InvalidArgument { field, .. } if field == "addresses"
        ));
    }
}
