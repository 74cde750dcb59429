//! Placement and routing policy.
//!
//! Placement picks the storage server that receives a newly-created path;
//! routing picks the stub a client is sent to for an existing path.

use faro_proto::StubAddr;
use rand::Rng;

/// One registered storage server.
#[derive(Debug, Clone)]
pub struct StorageRegistration {
    /// Client-facing data endpoint
    pub storage: StubAddr,
    /// Naming-facing command endpoint
    pub command: StubAddr,
    /// Advisory capacity hint, set at registration and never refreshed
    pub capacity: u64,
}

/// Chooses the storage server for a new path.
///
/// The server with the largest capacity hint wins; ties resolve to the
/// earliest registration. Returns `None` when no server is registered.
pub fn choose_server(registrations: &[StorageRegistration]) -> Option<&StorageRegistration> {
    let mut best: Option<&StorageRegistration> = None;
    for registration in registrations {
        match best {
            Some(current) if registration.capacity <= current.capacity => {}
            _ => best = Some(registration),
        }
    }
    best
}

/// Chooses the stub a client read or write is routed to.
///
/// Uniform random selection across the registered stubs.
pub fn choose_stub(stubs: &[StubAddr]) -> Option<&StubAddr> {
    if stubs.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..stubs.len());
    stubs.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(port: u16, capacity: u64) -> StorageRegistration {
        StorageRegistration {
            storage: StubAddr::new("host", port),
            command: StubAddr::new("host", port + 1),
            capacity,
        }
    }

    #[test]
    fn test_largest_capacity_wins() {
        let registrations = vec![
            registration(7000, 10),
            registration(7100, 50),
            registration(7200, 20),
        ];

        let chosen = choose_server(&registrations).unwrap();
        assert_eq!(chosen.storage.port, 7100);
    }

    #[test]
    fn test_ties_resolve_to_earliest() {
        let registrations = vec![
            registration(7000, 10),
            registration(7100, 10),
            registration(7200, 10),
        ];

        let chosen = choose_server(&registrations).unwrap();
        assert_eq!(chosen.storage.port, 7000);
    }

    #[test]
    fn test_no_servers() {
        assert!(choose_server(&[]).is_none());
        assert!(choose_stub(&[]).is_none());
    }

    #[test]
    fn test_choose_stub_stays_in_bounds() {
        let stubs = vec![StubAddr::new("a", 1), StubAddr::new("b", 2)];
        for _ in 0..32 {
            let chosen = choose_stub(&stubs).unwrap();
            assert!(stubs.contains(chosen));
        }
    }
}
