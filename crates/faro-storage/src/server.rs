//! Storage server lifecycle and RPC surfaces.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use faro_core::{COMMAND_PORT, STORAGE_PORT};
use faro_net::{Handler, RegistrationStub, RpcListener};
use faro_proto::{ErrorCode, Payload, StubAddr};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::engine::StorageEngine;
use crate::scan::{prune_empty_dirs, scan_files};
use crate::StorageError;

/// Storage server configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Local directory holding the served files
    pub root: PathBuf,
    /// Externally-routable hostname advertised in this server's stubs
    pub hostname: String,
    /// Bind address for the client-facing data endpoint
    pub storage_addr: SocketAddr,
    /// Bind address for the naming-facing command endpoint
    pub command_addr: SocketAddr,
    /// Registration endpoint of the naming server
    pub naming: StubAddr,
    /// Advisory capacity hint reported at registration
    pub capacity: u64,
}

impl StorageConfig {
    /// Creates a configuration with default bind addresses.
    pub fn new(root: PathBuf, naming: StubAddr) -> Self {
        Self {
            root,
            hostname: "127.0.0.1".to_string(),
            storage_addr: SocketAddr::from(([0, 0, 0, 0], STORAGE_PORT)),
            command_addr: SocketAddr::from(([0, 0, 0, 0], COMMAND_PORT)),
            naming,
            capacity: 0,
        }
    }
}

enum Lifecycle {
    Idle,
    Running {
        storage: RpcListener,
        command: RpcListener,
    },
    Terminated,
}

/// The storage server.
pub struct StorageServer {
    config: StorageConfig,
    engine: Arc<StorageEngine>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    bound: Mutex<Option<(SocketAddr, SocketAddr)>>,
}

impl StorageServer {
    /// Creates a storage server. The server is not started.
    pub fn new(config: StorageConfig) -> Self {
        let engine = Arc::new(StorageEngine::new(config.root.clone()));
        Self {
            config,
            engine,
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Idle),
            bound: Mutex::new(None),
        }
    }

    /// Returns the engine serving this server's files.
    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    /// Starts the server and registers it with the naming server.
    ///
    /// Scans the local root, brings up both endpoints, registers the
    /// inventory, applies the returned delete list, and prunes directories
    /// the deletions left empty.
    pub async fn start(&self) -> Result<(), StorageError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match &*lifecycle {
            Lifecycle::Running { .. } => return Err(StorageError::AlreadyRunning),
            Lifecycle::Terminated => return Err(StorageError::NotRestartable),
            Lifecycle::Idle => {}
        }

        let root_meta = std::fs::metadata(&self.config.root)
            .map_err(|_| StorageError::BadRoot(self.config.root.clone()))?;
        if !root_meta.is_dir() {
            return Err(StorageError::BadRoot(self.config.root.clone()));
        }

        let inventory = scan_files(&self.config.root)?;
        info!(files = inventory.len(), root = ?self.config.root, "scanned local root");

        let storage_handler = Arc::new(StorageHandler {
            engine: Arc::clone(&self.engine),
        });
        let command_handler = Arc::new(CommandHandler {
            engine: Arc::clone(&self.engine),
        });

        let storage = RpcListener::bind(self.config.storage_addr, storage_handler).await?;
        let command = match RpcListener::bind(self.config.command_addr, command_handler).await {
            Ok(listener) => listener,
            Err(e) => {
                storage.shutdown();
                return Err(e.into());
            }
        };

        let storage_stub = StubAddr::advertised(&self.config.hostname, storage.local_addr());
        let command_stub = StubAddr::advertised(&self.config.hostname, command.local_addr());

        let registration = RegistrationStub::new(self.config.naming.clone());
        let delete_list = match registration
            .register(
                storage_stub.clone(),
                command_stub.clone(),
                self.config.capacity,
                inventory,
            )
            .await
        {
            Ok(paths) => paths,
            Err(e) => {
                storage.shutdown();
                command.shutdown();
                return Err(e.into());
            }
        };

        info!(
            deletions = delete_list.len(),
            naming = %self.config.naming,
            "registered with naming server"
        );
        for path in &delete_list {
            if !self.engine.delete(path).await {
                warn!(%path, "could not delete reconciled path");
            }
        }
        prune_empty_dirs(&self.config.root);

        info!(storage = %storage_stub, command = %command_stub, "storage server started");
        *self.bound.lock() = Some((storage.local_addr(), command.local_addr()));
        *lifecycle = Lifecycle::Running { storage, command };
        Ok(())
    }

    /// Stops both endpoints. The server cannot be restarted afterwards.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Running { storage, command } =
            std::mem::replace(&mut *lifecycle, Lifecycle::Terminated)
        {
            storage.shutdown();
            command.shutdown();
            info!("storage server stopped");
        }
    }

    /// Returns the bound data endpoint address once Running.
    pub fn storage_addr(&self) -> Option<SocketAddr> {
        self.bound.lock().map(|(storage, _)| storage)
    }

    /// Returns the bound command endpoint address once Running.
    pub fn command_addr(&self) -> Option<SocketAddr> {
        self.bound.lock().map(|(_, command)| command)
    }

    /// Returns the stub pair this server advertises.
    pub fn stubs(&self) -> Option<(StubAddr, StubAddr)> {
        self.bound.lock().map(|(storage, command)| {
            (
                StubAddr::new(self.config.hostname.clone(), storage.port()),
                StubAddr::new(self.config.hostname.clone(), command.port()),
            )
        })
    }
}

struct StorageHandler {
    engine: Arc<StorageEngine>,
}

#[async_trait]
impl Handler for StorageHandler {
    async fn handle(&self, payload: Payload) -> Payload {
        match payload {
            Payload::Size { path } => match self.engine.size(&path).await {
                Ok(value) => Payload::Length { value },
                Err(e) => e.to_payload(),
            },
            Payload::Read {
                path,
                offset,
                length,
            } => match self.engine.read(&path, offset, length).await {
                Ok(bytes) => Payload::Data { bytes },
                Err(e) => e.to_payload(),
            },
            Payload::Write { path, offset, data } => {
                match self.engine.write(&path, offset, &data).await {
                    Ok(()) => Payload::Done,
                    Err(e) => e.to_payload(),
                }
            }
            other => Payload::error(
                ErrorCode::InvalidRequest,
                format!("not a storage request: {:?}", other.message_type()),
            ),
        }
    }
}

struct CommandHandler {
    engine: Arc<StorageEngine>,
}

#[async_trait]
impl Handler for CommandHandler {
    async fn handle(&self, payload: Payload) -> Payload {
        match payload {
            Payload::CommandCreate { path, directory } => Payload::Flag {
                value: self.engine.create(&path, directory).await,
            },
            Payload::CommandDelete { path } => Payload::Flag {
                value: self.engine.delete(&path).await,
            },
            other => Payload::error(
                ErrorCode::InvalidRequest,
                format!("not a command request: {:?}", other.message_type()),
            ),
        }
    }
}
