pub mod deserialise;

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::wire_types::*;

/// TTL given to every record loaded from a zone file.
pub const ZONE_TTL: u32 = 600;

/// The records this server is authoritative for: one `IN A` record
/// per domain name.
///
/// A `ZoneStore` is built once and never changed afterwards.  Cloning
/// it is cheap (the map is shared), so every worker gets its own
/// handle and lookups need no locking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneStore {
    records: Arc<HashMap<String, ResourceRecord>>,
}

impl ZoneStore {
    /// Build a store from a list of records.  If two records share a
    /// name, the later one wins.
    pub fn from_records<I: IntoIterator<Item = ResourceRecord>>(records: I) -> Self {
        let mut map = HashMap::new();
        for rr in records {
            map.insert(rr.name.to_dotted_string(), rr);
        }
        Self {
            records: Arc::new(map),
        }
    }

    /// Find the record for a name.  The comparison is on the exact
    /// label octets, so it is case-sensitive.
    pub fn lookup(&self, name: &DomainName) -> Option<&ResourceRecord> {
        self.records.get(&name.to_dotted_string())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::protocol::wire_types::test_util::*;

    #[test]
    fn lookup_finds_record() {
        let rr = a_record("www.example.com.", Ipv4Addr::new(1, 2, 3, 4));
        let zone = ZoneStore::from_records(vec![rr.clone()]);

        assert_eq!(Some(&rr), zone.lookup(&domain("www.example.com")));
        assert_eq!(None, zone.lookup(&domain("example.com.")));
        assert_eq!(1, zone.len());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let zone = ZoneStore::from_records(vec![a_record(
            "www.example.com.",
            Ipv4Addr::new(1, 2, 3, 4),
        )]);

        assert_eq!(None, zone.lookup(&domain("WWW.example.com.")));
    }

    #[test]
    fn later_record_wins() {
        let zone = ZoneStore::from_records(vec![
            a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
            a_record("www.example.com.", Ipv4Addr::new(2, 2, 2, 2)),
        ]);

        assert_eq!(1, zone.len());
        assert_eq!(
            Some(Ipv4Addr::new(2, 2, 2, 2)),
            zone.lookup(&domain("www.example.com."))
                .and_then(ResourceRecord::address)
        );
    }

    #[test]
    fn clones_share_records() {
        let zone = ZoneStore::from_records(vec![a_record(
            "www.example.com.",
            Ipv4Addr::new(1, 2, 3, 4),
        )]);
        let other = zone.clone();

        assert!(Arc::ptr_eq(&zone.records, &other.records));
    }
}
