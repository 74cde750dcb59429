//! Server lifecycle behavior observed from the outside.

use faro_core::Path;
use faro_net::RpcError;
use faro_tests::TestCluster;

fn path(s: &str) -> Path {
    Path::parse(s).unwrap()
}

#[tokio::test]
async fn test_stopped_naming_server_refuses_connections() {
    let cluster = TestCluster::start().await.unwrap();
    let service = cluster.service();

    cluster.naming.stop().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let err = service.is_directory(&Path::root()).await.unwrap_err();
    assert!(matches!(err, RpcError::Io(_)));
}

#[tokio::test]
async fn test_dead_storage_server_leaves_namespace_entries() {
    let mut cluster = TestCluster::start().await.unwrap();
    let node = cluster.add_storage(0, &[("/a/b.txt", b"x")]).await.unwrap();

    cluster.storage(node).server.stop().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The naming server still routes to the dead server's stub; the client
    // sees the transport failure and is expected to retry via the naming
    // server.
    let stub = cluster
        .service()
        .get_storage(&path("/a/b.txt"))
        .await
        .unwrap();
    let err = stub.size(&path("/a/b.txt")).await.unwrap_err();
    assert!(matches!(err, RpcError::Io(_) | RpcError::Closed));
}

#[tokio::test]
async fn test_namespace_survives_storage_churn() {
    let mut cluster = TestCluster::start().await.unwrap();
    cluster.add_storage(0, &[("/a/b.txt", b"x")]).await.unwrap();
    let second = cluster.add_storage(0, &[("/c.txt", b"y")]).await.unwrap();

    cluster.storage(second).server.stop().await;

    // Listing is served entirely from the naming server's own state.
    let mut names = cluster.service().list(&Path::root()).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["a", "c.txt"]);
}
