//! Routing Module Tests
//!
//! Validates shard placement and the routing node's read/write paths.
//!
//! ## Test Scopes
//! - **Partitioner**: hash stability, index range, replica and fallback sets per shard count.
//! - **RoutingNode**: replication fan-out, primary-only outcome, read fallback, UPDATE, HTTP replies.
//!
//! Shards are real `StorageShard`s over `MemoryStore`, so every hop crosses a socket.

#[cfg(test)]
mod tests {
    use crate::cluster::client;
    use crate::cluster::protocol::{HttpResponse, Request};
    use crate::cluster::server::{LineServer, ServerConfig};
    use crate::cluster::types::{Address, Tier};
    use crate::routing::partitioner::{
        fallback_targets, replica_targets, shard_index, stable_hash,
    };
    use crate::routing::service::{GetOutcome, PutOutcome, RoutingNode};
    use crate::storage::service::StorageShard;
    use crate::storage::store::{MemoryStore, UrlStore};

    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    const LONG: &str = "http://example.com";

    async fn spawn_shards(count: usize) -> (Vec<Address>, Vec<Arc<MemoryStore>>) {
        let mut addresses = Vec::new();
        let mut stores = Vec::new();
        for _ in 0..count {
            let store = Arc::new(MemoryStore::new());
            let server = LineServer::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()))
                .await
                .unwrap();
            let shard = StorageShard::new(store.clone(), server.handle());
            let (addr, _) = server.spawn(shard).unwrap();
            addresses.push(Address::new(Tier::Database, "127.0.0.1", addr.port()));
            stores.push(store);
        }
        (addresses, stores)
    }

    async fn dead_shard() -> Address {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        Address::new(Tier::Database, "127.0.0.1", port)
    }

    async fn spawn_node(node: Arc<RoutingNode>) -> Address {
        let server = LineServer::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        let (addr, _) = server.spawn(node).unwrap();
        Address::new(Tier::Node, "127.0.0.1", addr.port())
    }

    async fn http(node: &Address, request: &str) -> String {
        let mut stream = TcpStream::connect(node.socket_addr()).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    // ============================================================
    // PARTITIONER TESTS
    // ============================================================

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(stable_hash(""), 0);
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("abc"), 96354);
        assert_eq!(stable_hash("polygenelubricants"), i32::MIN);
        assert_ne!(stable_hash("ab"), stable_hash("ba"));
    }

    #[test]
    fn test_shard_index_within_range() {
        assert_eq!(shard_index("abc", 0), None);
        for n in 1..8 {
            for i in 0..200 {
                let key = format!("key_{}", i);
                let index = shard_index(&key, n).unwrap();
                assert!(index < n, "index {} should be < {}", index, n);
                assert_eq!(shard_index(&key, n), Some(index));
            }
        }
    }

    #[test]
    fn test_negative_hash_maps_into_range() {
        assert_eq!(shard_index("polygenelubricants", 4), Some(0));
        assert_eq!(shard_index("polygenelubricants", 3), Some(1));
    }

    #[test]
    fn test_replica_targets_per_shard_count() {
        assert_eq!(replica_targets(0, 1), vec![0]);
        assert_eq!(replica_targets(1, 2), vec![1, 0]);
        assert_eq!(replica_targets(0, 3), vec![0, 1, 2]);
        assert_eq!(replica_targets(2, 4), vec![2, 3, 1]);
    }

    #[test]
    fn test_fallback_targets_per_shard_count() {
        assert_eq!(fallback_targets(0, 1), vec![0]);
        assert_eq!(fallback_targets(0, 2), vec![0, 1]);
        // Previous neighbour only joins past three shards.
        assert_eq!(fallback_targets(0, 3), vec![0, 1]);
        assert_eq!(fallback_targets(0, 4), vec![0, 1, 3]);
    }

    // ============================================================
    // WRITE PATH TESTS
    // ============================================================

    async fn assert_replication(count: usize, expected_copies: usize) {
        let (shards, stores) = spawn_shards(count).await;
        let node = RoutingNode::new(shards);

        assert_eq!(node.put("abc", LONG).await, PutOutcome::Stored);

        let index = shard_index("abc", count).unwrap();
        let targets = replica_targets(index, count);
        assert_eq!(targets.len(), expected_copies);
        for (i, store) in stores.iter().enumerate() {
            let expected = targets.contains(&i).then(|| LONG.to_string());
            assert_eq!(store.read("abc").unwrap(), expected, "shard {}", i);
        }
    }

    #[tokio::test]
    async fn test_single_shard_stores_once() {
        assert_replication(1, 1).await;
    }

    #[tokio::test]
    async fn test_two_shards_store_twice() {
        assert_replication(2, 2).await;
    }

    #[tokio::test]
    async fn test_four_shards_store_three_times() {
        assert_replication(4, 3).await;
    }

    #[tokio::test]
    async fn test_invalid_pair_touches_no_shard() {
        let (shards, stores) = spawn_shards(2).await;
        let node = RoutingNode::new(shards);

        assert_eq!(node.put("bad url", LONG).await, PutOutcome::Invalid);
        assert_eq!(node.put("abc", "not-a-url").await, PutOutcome::Invalid);
        assert!(stores.iter().all(|s| s.is_empty()));
    }

    #[tokio::test]
    async fn test_put_without_shards() {
        let node = RoutingNode::new(vec![]);
        assert_eq!(node.put("abc", LONG).await, PutOutcome::NoShards);
        assert_eq!(node.get("abc").await, GetOutcome::NoShards);
    }

    #[tokio::test]
    async fn test_dead_primary_fails_but_replicas_written() {
        let (mut shards, stores) = spawn_shards(3).await;
        let index = shard_index("abc", 3).unwrap();
        shards[index] = dead_shard().await;
        let node = RoutingNode::new(shards);

        assert_eq!(node.put("abc", LONG).await, PutOutcome::Failed);
        let copies = stores
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != index && s.read("abc").unwrap().is_some())
            .count();
        assert_eq!(copies, 2);
    }

    #[tokio::test]
    async fn test_dead_replica_does_not_fail_put() {
        let (mut shards, _stores) = spawn_shards(3).await;
        let index = shard_index("abc", 3).unwrap();
        shards[(index + 1) % 3] = dead_shard().await;
        let node = RoutingNode::new(shards);

        assert_eq!(node.put("abc", LONG).await, PutOutcome::Stored);
    }

    // ============================================================
    // READ PATH TESTS
    // ============================================================

    #[tokio::test]
    async fn test_read_falls_back_to_next_shard() {
        let (shards, stores) = spawn_shards(3).await;
        let index = shard_index("abc", 3).unwrap();
        stores[(index + 1) % 3].write("abc", LONG).unwrap();
        let node = RoutingNode::new(shards);

        assert_eq!(node.get("abc").await, GetOutcome::Found(LONG.to_string()));
    }

    #[tokio::test]
    async fn test_previous_shard_not_consulted_with_three_shards() {
        let (shards, stores) = spawn_shards(3).await;
        let index = shard_index("abc", 3).unwrap();
        stores[(index + 2) % 3].write("abc", LONG).unwrap();
        let node = RoutingNode::new(shards);

        assert_eq!(node.get("abc").await, GetOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_previous_shard_consulted_with_four_shards() {
        let (shards, stores) = spawn_shards(4).await;
        let index = shard_index("abc", 4).unwrap();
        stores[(index + 3) % 4].write("abc", LONG).unwrap();
        let node = RoutingNode::new(shards);

        assert_eq!(node.get("abc").await, GetOutcome::Found(LONG.to_string()));
    }

    #[tokio::test]
    async fn test_read_skips_dead_primary() {
        let (mut shards, stores) = spawn_shards(2).await;
        let index = shard_index("abc", 2).unwrap();
        stores[(index + 1) % 2].write("abc", LONG).unwrap();
        shards[index] = dead_shard().await;
        let node = RoutingNode::new(shards);

        assert_eq!(node.get("abc").await, GetOutcome::Found(LONG.to_string()));
    }

    // ============================================================
    // CONNECTION HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_node_status_and_update() {
        let node = RoutingNode::new(vec![]);
        let address = spawn_node(node.clone()).await;

        let reply = client::exchange(&address, &Request::Status).await.unwrap();
        assert_eq!((reply.tag.as_str(), reply.body.as_str()), ("NODE", "NODEALIVE"));

        let update = Request::Update {
            payload: "10.0.0.1/7777,10.0.0.2/7777".to_string(),
        };
        let reply = client::exchange(&address, &update).await.unwrap();
        assert_eq!(reply.body, "Updated");
        assert_eq!(
            node.shards().as_slice(),
            &[
                Address::new(Tier::Database, "10.0.0.1", 7777),
                Address::new(Tier::Database, "10.0.0.2", 7777),
            ]
        );
    }

    #[tokio::test]
    async fn test_node_http_round_trip() {
        let (shards, _stores) = spawn_shards(2).await;
        let address = spawn_node(RoutingNode::new(shards)).await;

        let created = http(
            &address,
            "PUT /?short=abc&long=http://example.com HTTP/1.1\r\nHost: x\r\n\r\n",
        )
        .await;
        assert_eq!(HttpResponse::status_of(&created), Some(201));

        let found = http(&address, "GET /abc HTTP/1.1\r\n\r\n").await;
        assert_eq!(HttpResponse::status_of(&found), Some(307));
        assert_eq!(HttpResponse::location_of(&found), Some(LONG.to_string()));

        let missing = http(&address, "GET /zzz HTTP/1.1\r\n\r\n").await;
        assert_eq!(HttpResponse::status_of(&missing), Some(404));
    }

    #[tokio::test]
    async fn test_node_http_rejects_bad_input() {
        let (shards, stores) = spawn_shards(1).await;
        let address = spawn_node(RoutingNode::new(shards)).await;

        let bad = http(
            &address,
            "PUT /?short=bad url&long=http://example.com HTTP/1.1\r\n\r\n",
        )
        .await;
        assert_eq!(HttpResponse::status_of(&bad), Some(400));
        assert!(stores[0].is_empty());

        let favicon = http(&address, "GET /favicon.ico HTTP/1.1\r\n\r\n").await;
        assert_eq!(HttpResponse::status_of(&favicon), Some(404));
    }

    #[tokio::test]
    async fn test_node_without_shards_is_unavailable() {
        let address = spawn_node(RoutingNode::new(vec![])).await;
        let response = http(&address, "GET /abc HTTP/1.1\r\n\r\n").await;
        assert_eq!(HttpResponse::status_of(&response), Some(503));
    }
}
