//! End-to-end tests: client -> load balancer -> routing node -> storage shards, all over
//! real sockets on loopback.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url_shortener::balancer::service::{BalancerConfig, LoadBalancer};
use url_shortener::cluster::protocol::HttpResponse;
use url_shortener::cluster::server::{LineServer, ServerConfig, ServerHandle};
use url_shortener::cluster::types::{Address, Tier};
use url_shortener::routing::service::RoutingNode;
use url_shortener::storage::service::StorageShard;
use url_shortener::storage::store::{MemoryStore, UrlStore};

struct Stack {
    lb: Address,
    node_handle: ServerHandle,
    balancer: Arc<LoadBalancer>,
    stores: Vec<Arc<MemoryStore>>,
}

async fn bind() -> LineServer {
    LineServer::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap()
}

async fn start_stack(shard_count: usize) -> Stack {
    let mut shards = Vec::new();
    let mut stores = Vec::new();
    for _ in 0..shard_count {
        let store = Arc::new(MemoryStore::new());
        let server = bind().await;
        let shard = StorageShard::new(store.clone(), server.handle());
        let (addr, _) = server.spawn(shard).unwrap();
        shards.push(Address::new(Tier::Database, "127.0.0.1", addr.port()));
        stores.push(store);
    }

    let (node_addr, node_handle) = bind().await.spawn(RoutingNode::new(shards)).unwrap();
    let node = Address::new(Tier::Node, "127.0.0.1", node_addr.port());

    let balancer = LoadBalancer::new(BalancerConfig::default(), vec![node]);
    let (lb_addr, _) = bind().await.spawn(balancer.clone()).unwrap();

    Stack {
        lb: Address::new(Tier::LoadBalancer, "127.0.0.1", lb_addr.port()),
        node_handle,
        balancer,
        stores,
    }
}

async fn http(target: &Address, request: &str) -> String {
    let mut stream = TcpStream::connect(target.socket_addr()).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_write_then_cached_read_survives_node_loss() {
    let stack = start_stack(3).await;

    let created = http(
        &stack.lb,
        "PUT /?short=abc&long=http://example.com HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;
    assert_eq!(HttpResponse::status_of(&created), Some(201));

    // Three shards: the pair lands on primary and both neighbours.
    let copies = stack
        .stores
        .iter()
        .filter(|s| s.read("abc").unwrap().is_some())
        .count();
    assert_eq!(copies, 3);

    stack.node_handle.stop();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let found = http(&stack.lb, "GET /abc HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert_eq!(HttpResponse::status_of(&found), Some(307));
    assert_eq!(
        HttpResponse::location_of(&found),
        Some("http://example.com".to_string())
    );

    // Anything not cached now has nowhere to go.
    let missing = http(&stack.lb, "GET /other HTTP/1.1\r\n\r\n").await;
    assert_eq!(HttpResponse::status_of(&missing), Some(503));
}

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let stack = start_stack(1).await;

    let created = http(
        &stack.lb,
        "PUT /?short=ab1&long=https://example.com/x HTTP/1.1\r\n\r\n",
    )
    .await;
    assert_eq!(HttpResponse::status_of(&created), Some(201));
    assert_eq!(stack.stores[0].len(), 1);

    // With the node gone, only the cache can answer.
    stack.node_handle.stop();
    tokio::time::sleep(Duration::from_millis(200)).await;

    for _ in 0..2 {
        let found = http(&stack.lb, "GET /ab1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(HttpResponse::status_of(&found), Some(307));
        assert_eq!(
            HttpResponse::location_of(&found),
            Some("https://example.com/x".to_string())
        );
    }
}

#[tokio::test]
async fn test_invalid_short_is_rejected_without_storage_write() {
    let stack = start_stack(2).await;

    let response = http(
        &stack.lb,
        "PUT /?short=bad url&long=http://example.com HTTP/1.1\r\n\r\n",
    )
    .await;
    assert_eq!(HttpResponse::status_of(&response), Some(400));
    assert!(stack.stores.iter().all(|s| s.is_empty()));
    assert_eq!(stack.balancer.cache_len(), 0);
}

#[tokio::test]
async fn test_read_through_balancer_caches_redirect() {
    let stack = start_stack(4).await;
    for store in &stack.stores {
        store.write("seeded", "http://example.org").unwrap();
    }

    let found = http(&stack.lb, "GET /seeded HTTP/1.1\r\n\r\n").await;
    assert_eq!(HttpResponse::status_of(&found), Some(307));
    assert_eq!(
        stack.balancer.cached("seeded"),
        Some("http://example.org".to_string())
    );

    let missing = http(&stack.lb, "GET /unknown HTTP/1.1\r\n\r\n").await;
    assert_eq!(HttpResponse::status_of(&missing), Some(404));
    assert_eq!(stack.balancer.cached("unknown"), None);
}

#[tokio::test]
async fn test_balancer_without_nodes_is_unavailable() {
    let balancer = LoadBalancer::new(BalancerConfig::default(), vec![]);
    let (addr, _) = bind().await.spawn(balancer).unwrap();
    let lb = Address::new(Tier::LoadBalancer, "127.0.0.1", addr.port());

    let response = http(&lb, "GET /abc HTTP/1.1\r\n\r\n").await;
    assert_eq!(HttpResponse::status_of(&response), Some(503));
}
