//! Canonical configuration rendering
//!
//! The rendered text is the only equality test the agent uses to decide
//! whether the applied configuration has converged, so field order, key
//! spelling and spacing are fixed. Two configs are "the same" exactly when
//! their renderings are byte-equal.

use crate::types::{DesiredNetworkConfig, InterfaceConfig, PeerConfig};
use std::fmt::Write;

/// Render a desired topology in wg-quick configuration form
///
/// An empty topology renders as the empty string. Blocks are not preceded
/// by a blank line; files written with a leading blank line are drift and
/// get rewritten once.
pub fn render_config(config: &DesiredNetworkConfig) -> String {
    let mut out = String::new();

    if let Some(interface) = &config.interface {
        render_interface(&mut out, interface);
        for peer in &config.peers {
            render_peer(&mut out, peer);
        }
    }

    out
}

fn render_interface(out: &mut String, interface: &InterfaceConfig) {
    out.push_str("[Interface]\n");
    field(out, "PrivateKey", &interface.private_key);
    field(out, "Address", &interface.address);
    field(out, "ListenPort", interface.listen_port);
    field(out, "PostUp", &interface.post_up);
    field(out, "PreDown", &interface.pre_down);
    out.push('\n');
}

fn render_peer(out: &mut String, peer: &PeerConfig) {
    out.push_str("[Peer]\n");
    // wg-quick keys are case-insensitive; the spelling is kept for stable output
    field(out, "Publickey", &peer.public_key);
    field(out, "AllowedIPs", &peer.allowed_ips);
    field(out, "Endpoint", &peer.endpoint);
    field(out, "PersistentKeepalive", peer.persistent_keepalive);
    out.push('\n');
}

fn field(out: &mut String, key: &str, value: impl std::fmt::Display) {
    // Writing to a String cannot fail
    let _ = writeln!(out, "{} = {}", key, value);
}
