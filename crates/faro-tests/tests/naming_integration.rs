//! End-to-end tests for the naming server's service and registration
//! surfaces, driven over real TCP.

use faro_core::Path;
use faro_proto::{ErrorCode, StubAddr};
use faro_tests::TestCluster;

fn path(s: &str) -> Path {
    Path::parse(s).unwrap()
}

async fn sorted_list(cluster: &TestCluster, dir: &str) -> Vec<String> {
    let mut names = cluster.service().list(&path(dir)).await.unwrap();
    names.sort();
    names
}

#[tokio::test]
async fn test_single_registration_builds_namespace() {
    let mut cluster = TestCluster::start().await.unwrap();
    let node = cluster
        .add_storage(0, &[("/a/b.txt", b"hello"), ("/c/d.txt", b"world")])
        .await
        .unwrap();

    // Nothing collided, so the server kept both files.
    assert!(cluster.storage(node).local_path("/a/b.txt").exists());
    assert!(cluster.storage(node).local_path("/c/d.txt").exists());

    assert_eq!(sorted_list(&cluster, "/").await, vec!["a", "c"]);
    assert_eq!(sorted_list(&cluster, "/a").await, vec!["b.txt"]);

    let service = cluster.service();
    assert!(service.is_directory(&path("/a")).await.unwrap());
    assert!(!service.is_directory(&path("/a/b.txt")).await.unwrap());
}

#[tokio::test]
async fn test_second_registration_reconciles_duplicates() {
    let mut cluster = TestCluster::start().await.unwrap();
    cluster
        .add_storage(0, &[("/a/b.txt", b"hello"), ("/c/d.txt", b"world")])
        .await
        .unwrap();
    let second = cluster
        .add_storage(0, &[("/a/b.txt", b"dupe"), ("/e.txt", b"fresh")])
        .await
        .unwrap();

    // The duplicate was deleted locally and its parent pruned away.
    let node = cluster.storage(second);
    assert!(!node.local_path("/a/b.txt").exists());
    assert!(!node.local_path("/a").exists());
    assert!(node.local_path("/e.txt").exists());

    assert_eq!(sorted_list(&cluster, "/").await, vec!["a", "c", "e.txt"]);

    let stub = cluster.service().get_storage(&path("/e.txt")).await.unwrap();
    assert_eq!(stub.addr(), &node.storage_stub);
}

#[tokio::test]
async fn test_create_file_places_on_largest_capacity() {
    let mut cluster = TestCluster::start().await.unwrap();
    let small = cluster.add_storage(10, &[("/a/b.txt", b"x")]).await.unwrap();
    let large = cluster.add_storage(50, &[("/e.txt", b"y")]).await.unwrap();

    assert!(cluster.service().create_file(&path("/a/new.txt")).await.unwrap());

    // The remote create lands on exactly the larger server.
    assert!(cluster.storage(large).local_path("/a/new.txt").exists());
    assert!(!cluster.storage(small).local_path("/a/new.txt").exists());

    let names = sorted_list(&cluster, "/a").await;
    assert!(names.contains(&"new.txt".to_string()));
}

#[tokio::test]
async fn test_create_existing_path_returns_false() {
    let mut cluster = TestCluster::start().await.unwrap();
    cluster.add_storage(0, &[("/a/b.txt", b"x")]).await.unwrap();

    let service = cluster.service();
    assert!(!service.create_file(&path("/a/b.txt")).await.unwrap());
    assert!(!service.create_directory(&path("/a/b.txt")).await.unwrap());
    assert!(!service.create_directory(&path("/a")).await.unwrap());
}

#[tokio::test]
async fn test_create_directory_then_file_inside() {
    let mut cluster = TestCluster::start().await.unwrap();
    let node = cluster.add_storage(0, &[("/seed.txt", b"x")]).await.unwrap();

    let service = cluster.service();
    assert!(service.create_directory(&path("/docs")).await.unwrap());
    assert!(service.is_directory(&path("/docs")).await.unwrap());
    assert!(cluster.storage(node).local_path("/docs").is_dir());

    assert!(service.create_file(&path("/docs/readme.md")).await.unwrap());
    assert_eq!(sorted_list(&cluster, "/docs").await, vec!["readme.md"]);
}

#[tokio::test]
async fn test_delete_directory_removes_subtree() {
    let mut cluster = TestCluster::start().await.unwrap();
    let node = cluster
        .add_storage(0, &[("/a/b.txt", b"x"), ("/a/c.txt", b"y"), ("/keep.txt", b"z")])
        .await
        .unwrap();

    let service = cluster.service();
    assert!(service.delete(&path("/a")).await.unwrap());

    // The hosting server dropped the whole directory.
    assert!(!cluster.storage(node).local_path("/a").exists());
    assert!(cluster.storage(node).local_path("/keep.txt").exists());

    let err = service.is_directory(&path("/a")).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::NotFound));
    assert_eq!(sorted_list(&cluster, "/").await, vec!["keep.txt"]);
}

#[tokio::test]
async fn test_create_without_parent_is_not_found() {
    let mut cluster = TestCluster::start().await.unwrap();
    let node = cluster.add_storage(0, &[("/seed.txt", b"x")]).await.unwrap();

    let err = cluster
        .service()
        .create_file(&path("/does/not/exist/x"))
        .await
        .unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::NotFound));

    // No remote call was made: the storage root is untouched.
    assert!(!cluster.storage(node).local_path("/does").exists());
}

#[tokio::test]
async fn test_create_delete_roundtrip_laws() {
    let mut cluster = TestCluster::start().await.unwrap();
    cluster.add_storage(0, &[("/c/d.txt", b"x")]).await.unwrap();

    let service = cluster.service();
    let target = path("/c/f.txt");

    assert!(service.create_file(&target).await.unwrap());
    assert!(!service.is_directory(&target).await.unwrap());
    assert!(service.get_storage(&target).await.is_ok());

    assert!(service.delete(&target).await.unwrap());
    let dir_err = service.is_directory(&target).await.unwrap_err();
    assert_eq!(dir_err.remote_code(), Some(ErrorCode::NotFound));
    let storage_err = service.get_storage(&target).await.unwrap_err();
    assert_eq!(storage_err.remote_code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn test_list_on_file_is_not_found() {
    let mut cluster = TestCluster::start().await.unwrap();
    cluster.add_storage(0, &[("/a/b.txt", b"x")]).await.unwrap();

    let err = cluster.service().list(&path("/a/b.txt")).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn test_delete_root_reports_failure() {
    let mut cluster = TestCluster::start().await.unwrap();
    cluster.add_storage(0, &[("/a/b.txt", b"x")]).await.unwrap();

    assert!(!cluster.service().delete(&Path::root()).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_registration_is_illegal_state() {
    let cluster = TestCluster::start().await.unwrap();
    let registration = cluster.registration();

    let storage = StubAddr::new("10.0.0.1", 7000);
    let command = StubAddr::new("10.0.0.1", 7001);

    registration
        .register(storage.clone(), command.clone(), 0, vec![])
        .await
        .unwrap();

    let err = registration
        .register(storage, command, 0, vec![])
        .await
        .unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::IllegalState));
}

#[tokio::test]
async fn test_registration_prefix_shadowing_is_deleted() {
    let cluster = TestCluster::start().await.unwrap();
    let registration = cluster.registration();

    registration
        .register(
            StubAddr::new("10.0.0.1", 7000),
            StubAddr::new("10.0.0.1", 7001),
            0,
            vec![path("/a/b/c.txt")],
        )
        .await
        .unwrap();

    // /a/b would shadow the existing /a/b/c.txt subtree.
    let deleted = registration
        .register(
            StubAddr::new("10.0.0.2", 7000),
            StubAddr::new("10.0.0.2", 7001),
            0,
            vec![path("/a/b"), path("/fresh.txt")],
        )
        .await
        .unwrap();

    assert_eq!(deleted, vec![path("/a/b")]);
    assert_eq!(sorted_list(&cluster, "/").await, vec!["a", "fresh.txt"]);
}

#[tokio::test]
async fn test_create_with_no_storage_servers() {
    let cluster = TestCluster::start().await.unwrap();

    let err = cluster
        .service()
        .create_file(&path("/x.txt"))
        .await
        .unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::IllegalState));
}

#[tokio::test]
async fn test_malformed_paths_never_reach_the_wire() {
    let cluster = TestCluster::start().await.unwrap();

    // Illegal paths fail at construction, before any request is framed.
    assert!(Path::parse("/with:colon").is_err());
    assert!(Path::parse("relative").is_err());

    // A well-formed but unknown path is the wire-visible failure mode.
    let err = cluster
        .service()
        .is_directory(&path("/missing"))
        .await
        .unwrap_err();
    assert_eq!(err.remote_code(), Some(ErrorCode::NotFound));
}
