//! Derives iptables activation/teardown rules from topology and policy.
//!
//! The builder is a pure function: it never talks to a kernel. The rules it
//! returns are meant to be wired into the interface's `PostUp`/`PreDown`
//! hook lists, where `wg-quick` substitutes `%i` with the tunnel interface
//! name at runtime.

use ipnet::IpNet;

/// Characters that survive shell quoting unwrapped.
const SHELL_SAFE: &str = "@%+=:,./-";

/// Quotes `s` for safe interpolation into a shell command line.
///
/// Mirrors POSIX single-quote escaping: safe strings pass through, anything
/// else is wrapped in single quotes with embedded quotes rewritten.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || SHELL_SAFE.contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Builds the activation and teardown rule lists for one interface.
///
/// Rule order is significant and deterministic:
/// 1. with an internet interface: tunnel→internet forward accept, the
///    reverse accept, then one MASQUERADE per distinct subnet among
///    `server_addresses` (first-seen order);
/// 2. with `allow_intranet`: a tunnel→tunnel forward accept;
/// 3. without `allow_all_server_ip`: one INPUT accept per server address,
///    then a trailing INPUT drop for the tunnel interface.
///
/// Teardown mirrors activation statement-for-statement with only the first
/// append token flipped to a delete.
#[must_use]
pub fn build_rules(
    internet_interface: &str,
    allow_intranet: bool,
    allow_all_server_ip: bool,
    server_addresses: &[IpNet],
) -> (Vec<String>, Vec<String>) {
    let mut post_up = Vec::new();
    if !internet_interface.is_empty() {
        let inet = shell_quote(internet_interface);
        post_up.push(format!("iptables -A FORWARD -i %i -o {inet} -j ACCEPT"));
        post_up.push(format!("iptables -A FORWARD -i {inet} -o %i -j ACCEPT"));
        let mut seen: Vec<IpNet> = Vec::new();
        for address in server_addresses {
            let network = address.trunc();
            if seen.contains(&network) {
                continue;
            }
            seen.push(network);
            let network = shell_quote(&network.to_string());
            post_up.push(format!(
                "iptables -t nat -A POSTROUTING -s {network} -o {inet} -j MASQUERADE"
            ));
        }
    }
    if allow_intranet {
        post_up.push("iptables -A FORWARD -i %i -o %i -j ACCEPT".to_string());
    }
    if !allow_all_server_ip {
        for address in server_addresses {
            let ip = shell_quote(&address.addr().to_string());
            post_up.push(format!("iptables -A INPUT -d {ip} -i %i -j ACCEPT"));
        }
        post_up.push("iptables -A INPUT -i %i -j DROP".to_string());
    }

    let pre_down = post_up
        .iter()
        .map(|rule| rule.replacen(" -A ", " -D ", 1))
        .collect();
    (post_up, pre_down)
}
