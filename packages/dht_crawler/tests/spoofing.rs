use krpc_encoding::{Envelope, MessageType, NodeID, Query, Response};
use peer_pool::MetadataPeerStore;
use scheduler::Master;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

struct NullSink;
impl scheduler::MetadataSink for NullSink {
    fn on_success(&self, _info_hash: [u8; 20], _info_dict: Vec<u8>, _peer: std::net::SocketAddrV4) {}
}

#[tokio::test]
async fn find_node_reply_spoofs_self_id_close_to_target() {
    let dir = tempfile::tempdir().unwrap();
    let peer_pool = Arc::new(Mutex::new(MetadataPeerStore::new(10, Duration::from_secs(60))));
    let (master, handle) = Master::new(16, 4, peer_pool, Arc::new(NullSink), 6881, "test/1.0".into(), 0);
    tokio::spawn(master.run());

    let dht = dht_crawler::Dht::bind(
        "127.0.0.1:0".parse().unwrap(),
        dir.path().join("bootstrap_nodes.jsonl"),
        handle,
    )
    .await
    .unwrap();

    let test_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let engine_addr = dht.local_addr().unwrap();
    tokio::spawn(dht.run());

    let target = NodeID::from_bytes([0xCC; 20]);
    let envelope = Envelope::query(b"aa".to_vec(), Query::FindNode { id: NodeID::random(), target });
    test_socket.send_to(&envelope.encode().unwrap(), engine_addr).await.unwrap();

    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), test_socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();

    let reply = Envelope::decode(&buf[..len]).unwrap();
    match reply.body {
        MessageType::Response { response: Response::NextHop { id, .. } } => {
            assert_eq!(&id.as_bytes()[0..19], &target.as_bytes()[0..19]);
        }
        other => panic!("expected find_node NextHop response, got {other:?}"),
    }
}
