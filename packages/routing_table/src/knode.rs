use krpc_encoding::NodeID;
use std::net::{Ipv4Addr, SocketAddrV4};

/// A contact discovered while crawling: a node id plus the address it was
/// last seen at. Immutable once built — the deque never mutates an entry in
/// place, only replaces it wholesale (see the module docs on why).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KNode {
    pub id: NodeID,
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl KNode {
    pub fn new(id: NodeID, ip: Ipv4Addr, port: u16) -> KNode {
        KNode { id, ip, port }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

impl From<krpc_encoding::NodeInfo> for KNode {
    fn from(info: krpc_encoding::NodeInfo) -> KNode {
        KNode {
            id: info.id,
            ip: *info.address.ip(),
            port: info.address.port(),
        }
    }
}
