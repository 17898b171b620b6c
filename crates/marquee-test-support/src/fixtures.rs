//! Test fixtures and environment helpers.

use std::path::Path;
use std::process::Command;

use marquee_core::Candidate;
use serde_json::json;

/// Returns `true` if a Docker daemon is reachable for integration tests.
#[must_use]
pub fn docker_available() -> bool {
    docker_available_with_host(std::env::var("DOCKER_HOST").ok())
}

fn docker_available_with_host(host: Option<String>) -> bool {
    if let Some(host) = host {
        if let Some(path) = host.strip_prefix("unix://") {
            return Path::new(path).exists();
        }
        return true;
    }

    Path::new("/var/run/docker.sock").exists()
        || Command::new("docker")
            .args(["info"])
            .output()
            .is_ok_and(|output| output.status.success())
}

/// Candidate whose payload carries a magnet locator derived from `hash_seed`.
#[must_use]
pub fn candidate(title: &str, seeds: u32, hash_seed: u8) -> Candidate {
    Candidate {
        title: title.to_string(),
        size: "1.4 GB".to_string(),
        seeds,
        source: "fixture".to_string(),
        payload: json!({ "magnet": magnet_for(hash_seed) }),
    }
}

/// Deterministic magnet URI.
#[must_use]
pub fn magnet_for(hash_seed: u8) -> String {
    format!("magnet:?xt=urn:btih:{}", format!("{hash_seed:02x}").repeat(20))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_available_respects_unix_socket_env() {
        assert!(!docker_available_with_host(Some(
            "unix:///definitely/missing.sock".into()
        )));
    }

    #[test]
    fn docker_available_accepts_tcp_env() {
        assert!(docker_available_with_host(Some(
            "tcp://127.0.0.1:2375".into()
        )));
    }

    #[test]
    fn magnet_fixture_has_forty_hex_digits() {
        let magnet = magnet_for(0xab);
        let hash = magnet.trim_start_matches("magnet:?xt=urn:btih:");
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
