use krpc_encoding::{NodeID, NodeInfo, Query, Response};
use serde_bytes::ByteBuf;

pub const SAMPLE_NODES_PER_REPLY: usize = 8;

/// The `ping` response policy: always the plain (unspoofed) self id.
pub fn ping_response(self_id: NodeID) -> Response {
    Response::OnlyID { id: self_id }
}

/// The `find_node` response policy: an id spoofed close to the requester's
/// own search target, plus whatever live nodes the routing deque can spare.
pub fn find_node_response(target: &NodeID, sample: Vec<NodeInfo>) -> Response {
    Response::NextHop {
        id: NodeID::spoof_close_to(target),
        token: None,
        nodes: sample,
    }
}

/// The `get_peers` response policy: never reveal real peers (this node
/// never has any to disclose), just a token and no nodes — just enough to
/// look plausible so the asker keeps talking to us.
pub fn get_peers_response(self_id: NodeID, token: Vec<u8>) -> Response {
    Response::NextHop {
        id: self_id,
        token: Some(ByteBuf::from(token)),
        nodes: Vec::new(),
    }
}

/// The `announce_peer` response policy: plain self id, no payload.
pub fn announce_peer_response(self_id: NodeID) -> Response {
    Response::OnlyID { id: self_id }
}

/// BEP-5's canonical rule: when `implied_port` is set, the announced port
/// is the UDP source port the query arrived on, not whatever (possibly
/// forged) `port` field the message carries.
pub fn announced_port(query_implied_port: bool, query_port: Option<u16>, sender_port: u16) -> u16 {
    if query_implied_port {
        sender_port
    } else {
        query_port.unwrap_or(sender_port)
    }
}

pub fn random_token() -> Vec<u8> {
    let mut token = [0u8; 8];
    rand::Rng::fill(&mut rand::thread_rng(), &mut token);
    token.to_vec()
}

/// Extracts the `info_hash` argument shared by `get_peers`/`announce_peer`,
/// returning `None` for queries that don't carry one.
pub fn info_hash_of(query: &Query) -> Option<NodeID> {
    match query {
        Query::GetPeers { info_hash, .. } => Some(*info_hash),
        Query::AnnouncePeer { info_hash, .. } => Some(*info_hash),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_node_response_spoofs_close_to_target() {
        let target = NodeID::from_bytes([0xAA; 20]);
        let response = find_node_response(&target, Vec::new());
        match response {
            Response::NextHop { id, .. } => {
                assert_eq!(&id.as_bytes()[0..19], &target.as_bytes()[0..19]);
            }
            _ => panic!("expected NextHop"),
        }
    }

    #[test]
    fn implied_port_overrides_announced_port() {
        assert_eq!(announced_port(true, Some(1234), 6881), 6881);
        assert_eq!(announced_port(false, Some(1234), 6881), 1234);
        assert_eq!(announced_port(false, None, 6881), 6881);
    }
}
