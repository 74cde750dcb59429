//! Naming server lifecycle and RPC surfaces.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use faro_core::{Path, REGISTRATION_PORT, SERVICE_PORT};
use faro_net::{CommandStub, Handler, RpcListener};
use faro_proto::{ErrorCode, Payload, StubAddr};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::placement::{choose_server, choose_stub, StorageRegistration};
use crate::tree::{EntryKind, Namespace};
use crate::NamingError;

/// Naming server configuration.
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// Bind address for the client-facing service endpoint
    pub service_addr: SocketAddr,
    /// Bind address for the storage-facing registration endpoint
    pub registration_addr: SocketAddr,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            service_addr: SocketAddr::from(([0, 0, 0, 0], SERVICE_PORT)),
            registration_addr: SocketAddr::from(([0, 0, 0, 0], REGISTRATION_PORT)),
        }
    }
}

/// All mutable naming state, guarded by one lock.
///
/// Registration reconciliation and every tree mutation run under this single
/// lock, so readers never observe a half-updated namespace.
#[derive(Debug, Default)]
struct State {
    namespace: Namespace,
    registrations: Vec<StorageRegistration>,
}

/// Lifecycle of the server: `Idle -> Running -> Terminated`, one way.
enum Lifecycle {
    Idle,
    Running {
        service: RpcListener,
        registration: RpcListener,
    },
    Terminated,
}

/// The naming server.
///
/// All state is owned by the instance; independent servers can coexist in a
/// single process. The instance is not reusable after [`stop`](Self::stop).
pub struct NamingServer {
    config: NamingConfig,
    state: Arc<Mutex<State>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    bound: Mutex<Option<(SocketAddr, SocketAddr)>>,
}

impl NamingServer {
    /// Creates a naming server. The server is not started.
    pub fn new(config: NamingConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Idle),
            bound: Mutex::new(None),
        }
    }

    /// Starts both RPC endpoints.
    ///
    /// The server is Running only once both endpoints are listening; if
    /// either bind fails the other is torn down and the cause is returned.
    /// A second start, or a start after [`stop`](Self::stop), fails.
    pub async fn start(&self) -> Result<(), NamingError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match &*lifecycle {
            Lifecycle::Running { .. } => return Err(NamingError::AlreadyRunning),
            Lifecycle::Terminated => return Err(NamingError::NotRestartable),
            Lifecycle::Idle => {}
        }

        let service_handler = Arc::new(ServiceHandler {
            state: Arc::clone(&self.state),
        });
        let registration_handler = Arc::new(RegistrationHandler {
            state: Arc::clone(&self.state),
        });

        let service = RpcListener::bind(self.config.service_addr, service_handler).await?;
        let registration =
            match RpcListener::bind(self.config.registration_addr, registration_handler).await {
                Ok(listener) => listener,
                Err(e) => {
                    service.shutdown();
                    return Err(e.into());
                }
            };

        info!(
            service = %service.local_addr(),
            registration = %registration.local_addr(),
            "naming server started"
        );

        *self.bound.lock() = Some((service.local_addr(), registration.local_addr()));
        *lifecycle = Lifecycle::Running {
            service,
            registration,
        };
        Ok(())
    }

    /// Stops both endpoints. The server cannot be restarted afterwards.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Running {
            service,
            registration,
        } = std::mem::replace(&mut *lifecycle, Lifecycle::Terminated)
        {
            service.shutdown();
            registration.shutdown();
            info!("naming server stopped");
        }
    }

    /// Returns the bound service address once Running.
    pub fn service_addr(&self) -> Option<SocketAddr> {
        self.bound.lock().map(|(service, _)| service)
    }

    /// Returns the bound registration address once Running.
    pub fn registration_addr(&self) -> Option<SocketAddr> {
        self.bound.lock().map(|(_, registration)| registration)
    }

    /// Determines whether the path names a directory.
    pub fn is_directory(&self, path: &Path) -> Result<bool, NamingError> {
        self.state.lock().namespace.is_directory(path)
    }

    /// Lists the child names of a directory.
    pub fn list(&self, path: &Path) -> Result<Vec<String>, NamingError> {
        self.state.lock().namespace.list(path)
    }

    /// Returns a storage stub hosting the path.
    pub fn get_storage(&self, path: &Path) -> Result<StubAddr, NamingError> {
        get_storage(&self.state, path)
    }

    /// Creates a file on a storage server chosen by placement.
    pub async fn create_file(&self, path: &Path) -> Result<bool, NamingError> {
        create(&self.state, path, EntryKind::File).await
    }

    /// Creates a directory on a storage server chosen by placement.
    pub async fn create_directory(&self, path: &Path) -> Result<bool, NamingError> {
        create(&self.state, path, EntryKind::Directory).await
    }

    /// Deletes a path from every storage server hosting it.
    pub async fn delete(&self, path: &Path) -> Result<bool, NamingError> {
        delete(&self.state, path).await
    }

    /// Registers a storage server and returns its delete list.
    pub fn register(
        &self,
        storage: StubAddr,
        command: StubAddr,
        capacity: u64,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>, NamingError> {
        register(&self.state, storage, command, capacity, paths)
    }
}

fn get_storage(state: &Mutex<State>, path: &Path) -> Result<StubAddr, NamingError> {
    let state = state.lock();
    let set = state
        .namespace
        .stub_set(path)
        .ok_or_else(|| NamingError::NotFound(path.clone()))?;
    choose_stub(set.storage())
        .cloned()
        .ok_or_else(|| NamingError::NotFound(path.clone()))
}

async fn create(state: &Mutex<State>, path: &Path, kind: EntryKind) -> Result<bool, NamingError> {
    if path.is_root() {
        return Ok(false);
    }
    let parent = path.parent()?;

    // Validate and place under the lock; the remote call happens outside it.
    let target = {
        let state = state.lock();
        let parent_is_dir = state.namespace.is_directory(&parent).unwrap_or(false);
        if !parent_is_dir {
            return Err(NamingError::NotFound(parent));
        }
        if state.namespace.contains(path) {
            return Ok(false);
        }
        let chosen = choose_server(&state.registrations).ok_or(NamingError::NoStorage)?;
        (chosen.storage.clone(), chosen.command.clone())
    };

    let (storage, command) = target;
    let created = CommandStub::new(command.clone())
        .create(path, kind == EntryKind::Directory)
        .await?;

    if created {
        let mut state = state.lock();
        // A racing create may have integrated the path meanwhile.
        if !state.namespace.contains(path) {
            state.namespace.insert(path, kind, &storage, &command);
        }
        debug!(%path, ?kind, server = %storage, "created");
    }
    Ok(created)
}

async fn delete(state: &Mutex<State>, path: &Path) -> Result<bool, NamingError> {
    if path.is_root() {
        return Ok(false);
    }

    let commands = {
        let state = state.lock();
        if !state.namespace.contains(path) {
            return Err(NamingError::NotFound(path.clone()));
        }
        state
            .namespace
            .stub_set(path)
            .map(|set| set.command().to_vec())
            .unwrap_or_default()
    };

    // Every hosting server must drop the path; the first failure aborts.
    for command in &commands {
        let deleted = CommandStub::new(command.clone()).delete(path).await?;
        if !deleted {
            warn!(%path, server = %command, "storage server refused delete");
            return Ok(false);
        }
    }

    state.lock().namespace.remove(path);
    debug!(%path, "deleted");
    Ok(true)
}

fn register(
    state: &Mutex<State>,
    storage: StubAddr,
    command: StubAddr,
    capacity: u64,
    paths: Vec<Path>,
) -> Result<Vec<Path>, NamingError> {
    let mut state = state.lock();

    let duplicate = state
        .registrations
        .iter()
        .any(|r| r.storage == storage && r.command == command);
    if duplicate {
        return Err(NamingError::AlreadyRegistered);
    }

    state.registrations.push(StorageRegistration {
        storage: storage.clone(),
        command: command.clone(),
        capacity,
    });

    // Reconcile the offered inventory against the namespace. Survivors are
    // integrated as they are accepted, so the first occurrence wins when one
    // registration collides with itself.
    let mut delete_list: Vec<Path> = Vec::new();
    for path in paths {
        if path.is_root() {
            continue;
        }
        if state.namespace.contains(&path) || state.namespace.collides(&path) {
            if !delete_list.contains(&path) {
                delete_list.push(path);
            }
        } else {
            state
                .namespace
                .insert(&path, EntryKind::File, &storage, &command);
        }
    }

    info!(
        server = %storage,
        known = state.namespace.len(),
        deletions = delete_list.len(),
        "storage server registered"
    );
    Ok(delete_list)
}

struct ServiceHandler {
    state: Arc<Mutex<State>>,
}

fn flag(result: Result<bool, NamingError>) -> Payload {
    match result {
        Ok(value) => Payload::Flag { value },
        Err(e) => e.to_payload(),
    }
}

#[async_trait]
impl Handler for ServiceHandler {
    async fn handle(&self, payload: Payload) -> Payload {
        match payload {
            Payload::IsDirectory { path } => {
                flag(self.state.lock().namespace.is_directory(&path))
            }
            Payload::List { path } => match self.state.lock().namespace.list(&path) {
                Ok(names) => Payload::Names { names },
                Err(e) => e.to_payload(),
            },
            Payload::CreateFile { path } => flag(create(&self.state, &path, EntryKind::File).await),
            Payload::CreateDirectory { path } => {
                flag(create(&self.state, &path, EntryKind::Directory).await)
            }
            Payload::Delete { path } => flag(delete(&self.state, &path).await),
            Payload::GetStorage { path } => match get_storage(&self.state, &path) {
                Ok(addr) => Payload::Stub { addr },
                Err(e) => e.to_payload(),
            },
            other => Payload::error(
                ErrorCode::InvalidRequest,
                format!("not a service request: {:?}", other.message_type()),
            ),
        }
    }
}

struct RegistrationHandler {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Handler for RegistrationHandler {
    async fn handle(&self, payload: Payload) -> Payload {
        match payload {
            Payload::Register {
                storage,
                command,
                capacity,
                paths,
            } => match register(&self.state, storage, command, capacity, paths) {
                Ok(paths) => Payload::DeleteList { paths },
                Err(e) => e.to_payload(),
            },
            other => Payload::error(
                ErrorCode::InvalidRequest,
                format!("not a registration request: {:?}", other.message_type()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> NamingServer {
        NamingServer::new(NamingConfig::default())
    }

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn stub_pair(port: u16) -> (StubAddr, StubAddr) {
        (StubAddr::new("host", port), StubAddr::new("host", port + 1))
    }

    #[test]
    fn test_register_fresh_inventory() {
        let naming = server();
        let (storage, command) = stub_pair(7000);

        let deleted = naming
            .register(
                storage,
                command,
                0,
                vec![path("/a/b.txt"), path("/c/d.txt")],
            )
            .unwrap();

        assert!(deleted.is_empty());
        let mut names = naming.list(&Path::root()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(naming.list(&path("/a")).unwrap(), vec!["b.txt"]);
        assert!(!naming.is_directory(&path("/a/b.txt")).unwrap());
    }

    #[test]
    fn test_register_reports_duplicates() {
        let naming = server();
        let (s1, c1) = stub_pair(7000);
        let (s2, c2) = stub_pair(7100);

        naming
            .register(s1, c1, 0, vec![path("/a/b.txt"), path("/c/d.txt")])
            .unwrap();
        let deleted = naming
            .register(s2.clone(), c2, 0, vec![path("/a/b.txt"), path("/e.txt")])
            .unwrap();

        assert_eq!(deleted, vec![path("/a/b.txt")]);
        let mut names = naming.list(&Path::root()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "c", "e.txt"]);
        assert_eq!(naming.get_storage(&path("/e.txt")).unwrap(), s2);
    }

    #[test]
    fn test_register_reports_prefix_shadowing() {
        let naming = server();
        let (s1, c1) = stub_pair(7000);
        let (s2, c2) = stub_pair(7100);

        naming.register(s1, c1, 0, vec![path("/a/b/c.txt")]).unwrap();
        // Offering /a/b would shadow the existing /a/b/c.txt subtree.
        let deleted = naming.register(s2, c2, 0, vec![path("/a/b")]).unwrap();

        assert_eq!(deleted, vec![path("/a/b")]);
    }

    #[test]
    fn test_register_same_pair_twice_is_illegal() {
        let naming = server();
        let (storage, command) = stub_pair(7000);

        naming
            .register(storage.clone(), command.clone(), 0, vec![])
            .unwrap();
        assert!(matches!(
            naming.register(storage, command, 0, vec![]),
            Err(NamingError::AlreadyRegistered)
        ));
    }

    #[test]
    fn test_register_same_storage_different_command_is_fine() {
        let naming = server();
        let (storage, command) = stub_pair(7000);
        let other_command = StubAddr::new("host", 7777);

        naming
            .register(storage.clone(), command, 0, vec![])
            .unwrap();
        // Matching on either stub alone is insufficient.
        assert!(naming.register(storage, other_command, 0, vec![]).is_ok());
    }

    #[test]
    fn test_register_skips_root() {
        let naming = server();
        let (storage, command) = stub_pair(7000);

        let deleted = naming
            .register(storage, command, 0, vec![Path::root()])
            .unwrap();
        assert!(deleted.is_empty());
        assert!(naming.list(&Path::root()).unwrap().is_empty());
    }

    #[test]
    fn test_register_first_occurrence_wins() {
        let naming = server();
        let (storage, command) = stub_pair(7000);

        let deleted = naming
            .register(
                storage,
                command,
                0,
                vec![path("/x/y.txt"), path("/x/y.txt")],
            )
            .unwrap();
        assert_eq!(deleted, vec![path("/x/y.txt")]);
        assert!(naming.is_directory(&path("/x")).unwrap());
    }

    #[test]
    fn test_get_storage_unknown_path() {
        let naming = server();
        assert!(matches!(
            naming.get_storage(&path("/nope")),
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_without_storage_servers() {
        let naming = server();
        assert!(matches!(
            naming.create_file(&path("/x.txt")).await,
            Err(NamingError::NoStorage)
        ));
    }

    #[tokio::test]
    async fn test_create_without_parent_makes_no_remote_call() {
        let naming = server();
        let (storage, command) = stub_pair(1);
        // The command stub is unreachable; a remote call would error with
        // Rpc, not NotFound.
        naming.register(storage, command, 0, vec![]).unwrap();

        assert!(matches!(
            naming.create_file(&path("/does/not/exist/x")).await,
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_root_is_refused() {
        let naming = server();
        assert!(!naming.delete(&Path::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let naming = server();
        assert!(matches!(
            naming.delete(&path("/ghost")).await,
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_double_start() {
        let naming = NamingServer::new(NamingConfig {
            service_addr: "127.0.0.1:0".parse().unwrap(),
            registration_addr: "127.0.0.1:0".parse().unwrap(),
        });

        naming.start().await.unwrap();
        assert!(naming.service_addr().is_some());
        assert!(matches!(
            naming.start().await,
            Err(NamingError::AlreadyRunning)
        ));

        naming.stop().await;
        assert!(matches!(
            naming.start().await,
            Err(NamingError::NotRestartable)
        ));
    }
}
