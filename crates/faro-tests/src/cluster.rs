//! Multi-server test cluster.

use std::net::SocketAddr;

use faro_naming::{NamingConfig, NamingServer};
use faro_net::{RegistrationStub, ServiceStub};
use faro_proto::StubAddr;
use faro_storage::{StorageConfig, StorageServer};
use tempfile::TempDir;
use tracing::info;

type Error = Box<dyn std::error::Error + Send + Sync>;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().expect("loopback address")
}

/// One storage server in the cluster, with its backing directory.
pub struct StorageNode {
    /// The running server
    pub server: StorageServer,
    /// Backing directory, removed when the node is dropped
    pub root: TempDir,
    /// The server's advertised data stub
    pub storage_stub: StubAddr,
    /// The server's advertised command stub
    pub command_stub: StubAddr,
}

impl StorageNode {
    /// Returns the local filesystem path backing a logical path.
    pub fn local_path(&self, logical: &str) -> std::path::PathBuf {
        let relative: String = logical.trim_start_matches('/').to_string();
        self.root.path().join(relative)
    }
}

/// A naming server plus storage servers, all on ephemeral loopback ports.
pub struct TestCluster {
    /// The cluster's naming server
    pub naming: NamingServer,
    storages: Vec<StorageNode>,
}

impl TestCluster {
    /// Starts a cluster with a naming server and no storage servers.
    pub async fn start() -> Result<Self, Error> {
        let naming = NamingServer::new(NamingConfig {
            service_addr: loopback(),
            registration_addr: loopback(),
        });
        naming.start().await?;

        info!(
            service = ?naming.service_addr(),
            registration = ?naming.registration_addr(),
            "test cluster naming server up"
        );
        Ok(Self {
            naming,
            storages: Vec::new(),
        })
    }

    /// Returns a client stub for the service surface.
    pub fn service(&self) -> ServiceStub {
        let addr = self.naming.service_addr().expect("naming server running");
        ServiceStub::new(StubAddr::new("127.0.0.1", addr.port()))
    }

    /// Returns a client stub for the registration surface.
    pub fn registration(&self) -> RegistrationStub {
        let addr = self
            .naming
            .registration_addr()
            .expect("naming server running");
        RegistrationStub::new(StubAddr::new("127.0.0.1", addr.port()))
    }

    /// Starts a storage server pre-seeded with the given files and adds it
    /// to the cluster. Returns the node's index.
    pub async fn add_storage(
        &mut self,
        capacity: u64,
        files: &[(&str, &[u8])],
    ) -> Result<usize, Error> {
        let root = TempDir::new()?;
        for (logical, contents) in files {
            let local = root.path().join(logical.trim_start_matches('/'));
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(local, contents)?;
        }

        let registration_addr = self
            .naming
            .registration_addr()
            .ok_or("naming server not running")?;
        let config = StorageConfig {
            hostname: "127.0.0.1".to_string(),
            storage_addr: loopback(),
            command_addr: loopback(),
            capacity,
            ..StorageConfig::new(
                root.path().to_path_buf(),
                StubAddr::new("127.0.0.1", registration_addr.port()),
            )
        };

        let server = StorageServer::new(config);
        server.start().await?;
        let (storage_stub, command_stub) = server.stubs().ok_or("storage server not running")?;

        info!(index = self.storages.len(), storage = %storage_stub, "test cluster storage server up");
        self.storages.push(StorageNode {
            server,
            root,
            storage_stub,
            command_stub,
        });
        Ok(self.storages.len() - 1)
    }

    /// Returns a storage node by index.
    pub fn storage(&self, index: usize) -> &StorageNode {
        &self.storages[index]
    }

    /// Returns the number of storage servers.
    pub fn storage_count(&self) -> usize {
        self.storages.len()
    }
}
