use std::net::Ipv4Addr;

use tracing::debug;

use crate::core::ClientId;

/// Last known address suffix of every peer
///
/// All peers are assumed to share the first three octets of the local
/// address, so only the final octet is stored. The directory has a fixed
/// number of slots; ids outside `1..capacity` and the local id are never
/// recorded. Entries are overwritten, never removed.
#[derive(Debug, Clone)]
pub struct Directory {
    local_id: ClientId,
    base: Option<[u8; 3]>,
    octets: Vec<u8>,
}

impl Directory {
    /// Creates an empty directory with `capacity` slots
    pub fn new(local_id: ClientId, capacity: usize) -> Self {
        Directory {
            local_id,
            base: None,
            octets: vec![0; capacity],
        }
    }

    /// Adopts the first three octets of `local_ip` as the network base
    pub fn set_local_ip(&mut self, local_ip: Ipv4Addr) {
        let [a, b, c, _] = local_ip.octets();
        self.base = Some([a, b, c]);
    }

    /// Returns whether the network base is known
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Records the last octet of `client_id`'s address
    ///
    /// Returns whether the entry was stored.
    pub fn record(&mut self, client_id: ClientId, octet: u8) -> bool {
        // Don't track ourselves
        if client_id == self.local_id {
            return false;
        }

        match client_id.slot(self.octets.len()) {
            Some(slot) => {
                debug!(client = %client_id, octet, "Recorded client address");
                self.octets[slot] = octet;
                true
            }
            None => {
                debug!(client = %client_id, "Client id outside roster, ignoring");
                false
            }
        }
    }

    /// Builds the address of `client_id`
    ///
    /// `None` means the address is unknown and the caller should broadcast.
    pub fn resolve(&self, client_id: ClientId) -> Option<Ipv4Addr> {
        let [a, b, c] = self.base?;
        let octet = self.octet(client_id)?;
        Some(Ipv4Addr::new(a, b, c, octet))
    }

    /// Returns the stored octet for `client_id`, if known
    pub fn octet(&self, client_id: ClientId) -> Option<u8> {
        client_id
            .slot(self.octets.len())
            .map(|slot| self.octets[slot])
            .filter(|&octet| octet != 0)
    }

    /// Returns whether an address is known for `client_id`
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.octet(client_id).is_some()
    }

    /// Iterates over known `(client_id, octet)` pairs in id order
    pub fn entries(&self) -> impl Iterator<Item = (ClientId, u8)> + '_ {
        self.octets.iter().enumerate().filter_map(|(slot, &octet)| {
            let id = i32::try_from(slot).ok()?;
            (octet != 0).then_some((ClientId(id), octet))
        })
    }

    /// Returns the number of known peers
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// Returns whether no peer is known
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        let mut directory = Directory::new(ClientId(2), 10);
        directory.set_local_ip(Ipv4Addr::new(10, 0, 0, 2));
        directory
    }

    #[test]
    fn test_record_and_resolve() {
        let mut directory = directory();
        assert!(directory.record(ClientId(3), 7));
        assert_eq!(directory.resolve(ClientId(3)), Some(Ipv4Addr::new(10, 0, 0, 7)));

        // Overwrite
        assert!(directory.record(ClientId(3), 9));
        assert_eq!(directory.resolve(ClientId(3)), Some(Ipv4Addr::new(10, 0, 0, 9)));
    }

    #[test]
    fn test_never_records_self() {
        let mut directory = directory();
        assert!(!directory.record(ClientId(2), 5));
        assert_eq!(directory.octet(ClientId(2)), None);
        assert!(directory.is_empty());
    }

    #[test]
    fn test_unknown_or_zero_is_unresolved() {
        let mut directory = directory();
        assert_eq!(directory.resolve(ClientId(4)), None);

        directory.record(ClientId(4), 0);
        assert_eq!(directory.resolve(ClientId(4)), None);
        assert!(!directory.contains(ClientId(4)));
    }

    #[test]
    fn test_out_of_roster_ids_ignored() {
        let mut directory = directory();
        assert!(!directory.record(ClientId(0), 8));
        assert!(!directory.record(ClientId(10), 8));
        assert!(!directory.record(ClientId(-3), 8));
        assert_eq!(directory.resolve(ClientId(99)), None);
        assert!(directory.is_empty());
    }

    #[test]
    fn test_resolve_requires_base() {
        let mut directory = Directory::new(ClientId(1), 10);
        directory.record(ClientId(3), 7);
        assert!(directory.contains(ClientId(3)));
        assert_eq!(directory.resolve(ClientId(3)), None);

        directory.set_local_ip(Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(directory.resolve(ClientId(3)), Some(Ipv4Addr::new(192, 168, 4, 7)));
    }

    #[test]
    fn test_entries() {
        let mut directory = directory();
        directory.record(ClientId(5), 50);
        directory.record(ClientId(1), 10);

        let entries: Vec<_> = directory.entries().collect();
        assert_eq!(entries, vec![(ClientId(1), 10), (ClientId(5), 50)]);
        assert_eq!(directory.len(), 2);
    }
}
