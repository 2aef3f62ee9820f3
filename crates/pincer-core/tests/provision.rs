//! End-to-end provisioning scenario: initialize an interface, add a
//! client, and export both wg-quick projections from the on-disk
//! documents.

use ipnet::IpNet;

use pincer_core::{firewall, GenerateKeys, InterfaceConfig, Keepalive, PeerConfig, Provision, ServerSecret};
use pincer_keys::SequentialKeyService;

fn net(s: &str) -> IpNet {
    s.parse().expect("valid cidr")
}

fn init_interface(service: &SequentialKeyService) -> Provision {
    let addresses = vec![net("192.168.10.1/24")];
    let (post_up, pre_down) = firewall::build_rules("eth0", true, false, &addresses);
    let config = InterfaceConfig::new(
        "wg0",
        51820,
        addresses,
        "example.com:51820".parse().expect("endpoint"),
    )
    .expect("config")
    .with_post_up(post_up)
    .with_pre_down(pre_down);
    let secret = ServerSecret::generate(service).expect("secret");
    Provision::new(config, secret)
}

#[test]
fn init_add_peer_check_export() {
    let service = SequentialKeyService::starting_at(1);
    let dir = tempfile::tempdir().expect("tempdir");

    // init
    let mut provision = init_interface(&service);
    provision
        .store_new(dir.path(), "wg0", false)
        .expect("initial store");

    // add-peer against the on-disk documents
    let mut provision = Provision::load(dir.path(), "wg0").expect("load");
    let address = provision
        .config
        .find_next_available_address()
        .expect("address available");
    assert_eq!(address, "192.168.10.2".parse::<std::net::IpAddr>().expect("ip"));
    let peer = PeerConfig::new(
        vec![IpNet::from(address)],
        vec![IpNet::from(address)],
        vec![net("0.0.0.0/0"), net("::/0")],
    )
    .expect("peer")
    .with_client_persistent_keepalive(Keepalive::Secs(25));
    provision
        .add_peer(&service, "client_0", peer)
        .expect("add peer");
    provision.store(dir.path(), "wg0").expect("store");

    // check
    let provision = Provision::load(dir.path(), "wg0").expect("reload");
    provision.check_secret(&service).expect("consistent");

    // export server projection
    let server_ini = provision
        .server_wg_quick(&service)
        .expect("server projection")
        .format_ini()
        .expect("format");
    assert!(server_ini.starts_with("[Interface]\nPrivateKey = "));
    assert!(server_ini.contains("\n\n[Peer]\n# client_0\n"));
    assert!(server_ini.contains("PostUp = iptables -A FORWARD -i %i -o eth0 -j ACCEPT"));
    assert!(server_ini.contains("PreDown = iptables -D FORWARD -i %i -o eth0 -j ACCEPT"));
    assert!(server_ini.contains("AllowedIPs = 192.168.10.2/32"));

    // export client projection
    let client_ini = provision
        .client_wg_quick(&service, "client_0")
        .expect("client projection")
        .format_ini()
        .expect("format");
    assert!(client_ini.contains("Address = 192.168.10.2/32"));
    assert!(client_ini.contains("Endpoint = example.com:51820"));
    assert!(client_ini.contains("PersistentKeepalive = 25"));
}

#[test]
fn unmodified_reload_rewrites_documents_verbatim() {
    let service = SequentialKeyService::starting_at(7);
    let dir = tempfile::tempdir().expect("tempdir");
    let provision = init_interface(&service);
    provision
        .store_new(dir.path(), "wg0", false)
        .expect("initial store");

    let config_file = dir.path().join("wg0.yml");
    let secret_file = dir.path().join("wg0_secret.json");
    let config_before = std::fs::read_to_string(&config_file).expect("config");
    let secret_before = std::fs::read_to_string(&secret_file).expect("secret");

    // load, touch nothing, persist again
    let provision = Provision::load(dir.path(), "wg0").expect("load");
    provision.store(dir.path(), "wg0").expect("rewrite");

    assert_eq!(
        std::fs::read_to_string(&config_file).expect("config"),
        config_before
    );
    assert_eq!(
        std::fs::read_to_string(&secret_file).expect("secret"),
        secret_before
    );
}

#[test]
fn partial_write_is_detectable_on_next_load() {
    let service = SequentialKeyService::starting_at(3);
    let dir = tempfile::tempdir().expect("tempdir");
    let mut provision = init_interface(&service);
    provision
        .store_new(dir.path(), "wg0", false)
        .expect("initial store");

    // Simulate the config being persisted while the secret write was lost.
    let peer = PeerConfig::new(
        vec![net("192.168.10.2/32")],
        vec![net("192.168.10.2/32")],
        vec![net("0.0.0.0/0")],
    )
    .expect("peer");
    provision
        .config
        .add_peer("client_0", peer)
        .expect("config-only add");
    std::fs::write(
        dir.path().join("wg0.yml"),
        provision.config.to_yaml_string().expect("dump"),
    )
    .expect("write config");

    let provision = Provision::load(dir.path(), "wg0").expect("load");
    let err = provision.check_secret(&service).expect_err("must detect");
    assert!(err.to_string().contains("client_0"));
    assert!(err.to_string().contains("generate-keys --missing"));

    // the documented remediation repairs it
    let mut provision = provision;
    let filled = provision
        .generate_keys(
            &service,
            &GenerateKeys {
                missing: true,
                ..GenerateKeys::default()
            },
        )
        .expect("fill missing");
    assert_eq!(filled, vec!["client_0"]);
    provision
        .store_secret(dir.path(), "wg0")
        .expect("persist secret");
    Provision::load(dir.path(), "wg0")
        .expect("reload")
        .check_secret(&service)
        .expect("repaired");
}
