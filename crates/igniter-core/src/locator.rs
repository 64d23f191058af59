//! Remote record lookup
//!
//! Update and delete calls need the provider-assigned id. The id is never
//! cached; it is rediscovered from a fresh listing every time.

use crate::model::{DesiredRecord, RemoteRecord};

/// Find the id of the remote record backing `desired`
///
/// Matches on name and on the content being the literal address string.
/// Record type and TTL are ignored. With duplicates, the first record in
/// listing order wins.
pub fn locate<'a>(desired: &DesiredRecord, remote: &'a [RemoteRecord]) -> Option<&'a str> {
    let content = desired.content();
    remote
        .iter()
        .find(|record| record.name == desired.hostname && record.content == content)
        .map(|record| record.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordType;
    use std::net::IpAddr;

    fn remote(id: &str, name: &str, content: &str, record_type: &str) -> RemoteRecord {
        RemoteRecord {
            id: id.to_string(),
            record_type: record_type.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            ttl: 120,
            proxied: false,
            zone: "zone-1".to_string(),
            modified_on: None,
        }
    }

    fn desired(hostname: &str, address: [u8; 4]) -> DesiredRecord {
        DesiredRecord {
            record_type: RecordType::A,
            hostname: hostname.to_string(),
            address: IpAddr::from(address),
        }
    }

    #[test]
    fn finds_matching_name_and_content() {
        let listing = vec![
            remote("r1", "a.example.com", "10.0.0.2", "A"),
            remote("r2", "a.example.com", "10.0.0.1", "A"),
        ];
        assert_eq!(locate(&desired("a.example.com", [10, 0, 0, 1]), &listing), Some("r2"));
    }

    #[test]
    fn first_duplicate_wins() {
        let listing = vec![
            remote("r1", "a.example.com", "10.0.0.1", "A"),
            remote("r2", "a.example.com", "10.0.0.1", "A"),
        ];
        assert_eq!(locate(&desired("a.example.com", [10, 0, 0, 1]), &listing), Some("r1"));
    }

    #[test]
    fn ignores_record_type() {
        let listing = vec![remote("r9", "a.example.com", "10.0.0.1", "TXT")];
        assert_eq!(locate(&desired("a.example.com", [10, 0, 0, 1]), &listing), Some("r9"));
    }

    #[test]
    fn missing_record_is_none() {
        let listing = vec![remote("r1", "b.example.com", "10.0.0.1", "A")];
        assert_eq!(locate(&desired("a.example.com", [10, 0, 0, 1]), &listing), None);
        assert_eq!(locate(&desired("a.example.com", [10, 0, 0, 1]), &[]), None);
    }
}
