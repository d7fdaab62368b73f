use std::path::Path;

use sysinfo::System;

#[cfg(windows)]
const HOSTS_FILE: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(windows))]
const HOSTS_FILE: &str = "/etc/hosts";

/// Host name of the machine running the CA, as reported by the OS.
///
/// Returns `None` when the OS reports nothing usable (empty, or containing
/// characters that cannot appear in a DNS name).
pub fn host_name() -> Option<String> {
    System::host_name()
        .map(|name| name.trim().to_string())
        .filter(|name| is_dns_label_text(name))
}

/// Fully-qualified name of this host.
///
/// A host name that already contains a dot is taken as is. Otherwise the
/// hosts file is searched for a dotted alias of it; without one the short
/// name is returned.
pub fn fully_qualified_name() -> Option<String> {
    let host = host_name()?;
    if host.contains('.') {
        return Some(host);
    }
    let hosts = std::fs::read_to_string(Path::new(HOSTS_FILE)).unwrap_or_default();
    Some(fqdn_from_hosts(&hosts, &host).unwrap_or(host))
}

/// DNS names written into the root certificate: short name, then FQDN.
pub fn host_dns_names() -> Vec<String> {
    let mut names: Vec<String> = host_name().into_iter().collect();
    if let Some(fqdn) = fully_qualified_name()
        && !names.iter().any(|n| n.eq_ignore_ascii_case(&fqdn))
    {
        names.push(fqdn);
    }
    names
}

/// First `<host>.<domain>` alias on a hosts-file line that lists `host`.
fn fqdn_from_hosts(hosts: &str, host: &str) -> Option<String> {
    let prefix = format!("{}.", host.to_ascii_lowercase());
    hosts
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .filter_map(|line| {
            let names: Vec<&str> = line.split_whitespace().skip(1).collect();
            let lists_host = names.iter().any(|n| {
                n.eq_ignore_ascii_case(host) || n.to_ascii_lowercase().starts_with(&prefix)
            });
            if !lists_host {
                return None;
            }
            names
                .into_iter()
                .find(|n| n.to_ascii_lowercase().starts_with(&prefix) && n.len() > prefix.len())
        })
        .map(str::to_string)
        .find(|name| is_dns_label_text(name))
}

fn is_dns_label_text(name: &str) -> bool {
    !name.is_empty() && name.is_ascii() && !name.contains(char::is_whitespace)
}
