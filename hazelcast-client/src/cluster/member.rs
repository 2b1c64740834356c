//! Cluster member values.

use std::collections::HashMap;
use std::fmt;

use hazelcast_core::Address;
use uuid::Uuid;

/// Codebase version a member reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Patch version.
    pub patch: u8,
}

impl MemberVersion {
    /// Creates a version triple.
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for MemberVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Represents a member of the Hazelcast cluster.
///
/// Members are immutable snapshots; a membership update replaces the whole
/// list rather than editing entries in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    uuid: Uuid,
    address: Address,
    lite_member: bool,
    attributes: HashMap<String, String>,
    version: MemberVersion,
}

impl Member {
    /// Creates a data member with no attributes.
    pub fn new(uuid: Uuid, address: Address) -> Self {
        Self {
            uuid,
            address,
            lite_member: false,
            attributes: HashMap::new(),
            version: MemberVersion::default(),
        }
    }

    /// Creates a member with every field given.
    pub fn with_details(
        uuid: Uuid,
        address: Address,
        lite_member: bool,
        attributes: HashMap<String, String>,
        version: MemberVersion,
    ) -> Self {
        Self {
            uuid,
            address,
            lite_member,
            attributes,
            version,
        }
    }

    /// Returns the member's UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the member's client-facing address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns whether this is a lite member, which owns no partitions.
    pub fn is_lite_member(&self) -> bool {
        self.lite_member
    }

    /// Returns the member's attributes.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Returns the member's version.
    pub fn version(&self) -> MemberVersion {
        self.version
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member[uuid={}, address={}", self.uuid, self.address)?;
        if self.lite_member {
            f.write_str(", lite")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_display() {
        let uuid = Uuid::new_v4();
        let member = Member::new(uuid, Address::new("10.0.0.1", 5701));
        assert_eq!(
            member.to_string(),
            format!("Member[uuid={}, address=10.0.0.1:5701]", uuid)
        );
    }

    #[test]
    fn test_lite_member_display() {
        let member = Member::with_details(
            Uuid::nil(),
            Address::new("h", 1),
            true,
            HashMap::new(),
            MemberVersion::new(5, 3, 0),
        );
        assert!(member.to_string().ends_with(", lite]"));
        assert_eq!(member.version().to_string(), "5.3.0");
    }

    #[test]
    fn test_member_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Member>();
    }
}
