//! Cached domain objects and their keys.

use std::fmt;

use hearth_core::{MemberId, NetworkId, NotificationId, PostId, RoleId, SpaceId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of a cached object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Notification,
    SsoMembership,
    SpaceMember,
    PostFollowState,
    NetworkSettings,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Notification => "Notification",
            Self::SsoMembership => "SsoMembership",
            Self::SpaceMember => "SpaceMember",
            Self::PostFollowState => "PostFollowState",
            Self::NetworkSettings => "NetworkSettings",
        };
        f.write_str(name)
    }
}

/// Stable `(type, id)` identity of a cached object.
///
/// Keys order by type first, then id. Locks are always taken in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub entity: EntityType,
    pub id: String,
}

impl CacheKey {
    pub fn new(entity: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity,
            id: id.into(),
        }
    }

    pub fn notification(id: &NotificationId) -> Self {
        Self::new(EntityType::Notification, id.as_str())
    }

    pub fn sso_membership(member_id: &MemberId, sso_type: &str) -> Self {
        Self::new(EntityType::SsoMembership, format!("{member_id}:{sso_type}"))
    }

    pub fn space_member(space_id: &SpaceId, member_id: &MemberId) -> Self {
        Self::new(EntityType::SpaceMember, format!("{space_id}:{member_id}"))
    }

    pub fn post_follow(post_id: &PostId, member_id: &MemberId) -> Self {
        Self::new(EntityType::PostFollowState, format!("{post_id}:{member_id}"))
    }

    pub fn network_settings(network_id: &NetworkId) -> Self {
        Self::new(EntityType::NetworkSettings, network_id.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.id)
    }
}

/// SSO enablement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SsoStatus {
    Enabled,
    Disabled,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A role assignable to a space member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoMembership {
    pub member_id: MemberId,
    pub sso_type: String,
    pub status: SsoStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceMember {
    pub space_id: SpaceId,
    pub member_id: MemberId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFollowState {
    pub post_id: PostId,
    pub member_id: MemberId,
    pub enabled: bool,
    pub followers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSettings {
    pub network_id: NetworkId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub default_sso_status: SsoStatus,
}

/// A normalized cached object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum CacheEntry {
    Notification(Notification),
    SsoMembership(SsoMembership),
    SpaceMember(SpaceMember),
    PostFollowState(PostFollowState),
    NetworkSettings(NetworkSettings),
}

impl CacheEntry {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Notification(_) => EntityType::Notification,
            Self::SsoMembership(_) => EntityType::SsoMembership,
            Self::SpaceMember(_) => EntityType::SpaceMember,
            Self::PostFollowState(_) => EntityType::PostFollowState,
            Self::NetworkSettings(_) => EntityType::NetworkSettings,
        }
    }

    pub fn key(&self) -> CacheKey {
        match self {
            Self::Notification(n) => CacheKey::notification(&n.id),
            Self::SsoMembership(m) => CacheKey::sso_membership(&m.member_id, &m.sso_type),
            Self::SpaceMember(m) => CacheKey::space_member(&m.space_id, &m.member_id),
            Self::PostFollowState(p) => CacheKey::post_follow(&p.post_id, &p.member_id),
            Self::NetworkSettings(s) => CacheKey::network_settings(&s.network_id),
        }
    }

    /// Merges the fields present in `patch`.
    ///
    /// Returns `false`, leaving `self` untouched, when the patch describes a
    /// different kind of object.
    pub fn merge(&mut self, patch: &EntryPatch) -> bool {
        match (self, patch) {
            (Self::Notification(n), EntryPatch::Notification { read, .. }) => {
                if let Some(read) = read {
                    n.read = *read;
                }
                true
            }
            (Self::SsoMembership(m), EntryPatch::SsoMembership { status, .. }) => {
                if let Some(status) = status {
                    m.status = *status;
                }
                true
            }
            (Self::SpaceMember(m), EntryPatch::SpaceMember { role, .. }) => {
                if let Some(role) = role {
                    m.role = role.clone();
                }
                true
            }
            (
                Self::PostFollowState(p),
                EntryPatch::PostFollowState {
                    enabled,
                    followers_count,
                    ..
                },
            ) => {
                if let Some(enabled) = enabled {
                    p.enabled = *enabled;
                }
                if let Some(count) = followers_count {
                    p.followers_count = *count;
                }
                true
            }
            (
                Self::NetworkSettings(s),
                EntryPatch::NetworkSettings {
                    name,
                    description,
                    default_sso_status,
                    ..
                },
            ) => {
                if let Some(name) = name {
                    s.name = name.clone();
                }
                if let Some(description) = description {
                    s.description = Some(description.clone());
                }
                if let Some(status) = default_sso_status {
                    s.default_sso_status = *status;
                }
                true
            }
            _ => false,
        }
    }
}

/// Server-confirmed fields of one cached object.
///
/// `None` fields were not returned and are left as cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPatch {
    Notification {
        id: NotificationId,
        read: Option<bool>,
    },
    SsoMembership {
        member_id: MemberId,
        sso_type: String,
        status: Option<SsoStatus>,
    },
    SpaceMember {
        space_id: SpaceId,
        member_id: MemberId,
        role: Option<Role>,
    },
    PostFollowState {
        post_id: PostId,
        member_id: MemberId,
        enabled: Option<bool>,
        followers_count: Option<u64>,
    },
    NetworkSettings {
        network_id: NetworkId,
        name: Option<String>,
        description: Option<String>,
        default_sso_status: Option<SsoStatus>,
    },
    /// The server confirmed the object no longer exists.
    Removed(CacheKey),
}

impl EntryPatch {
    pub fn key(&self) -> CacheKey {
        match self {
            Self::Notification { id, .. } => CacheKey::notification(id),
            Self::SsoMembership {
                member_id,
                sso_type,
                ..
            } => CacheKey::sso_membership(member_id, sso_type),
            Self::SpaceMember {
                space_id,
                member_id,
                ..
            } => CacheKey::space_member(space_id, member_id),
            Self::PostFollowState {
                post_id, member_id, ..
            } => CacheKey::post_follow(post_id, member_id),
            Self::NetworkSettings { network_id, .. } => CacheKey::network_settings(network_id),
            Self::Removed(key) => key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(space: &str, member: &str) -> CacheEntry {
        CacheEntry::SpaceMember(SpaceMember {
            space_id: SpaceId::new(space),
            member_id: MemberId::new(member),
            role: Role {
                id: RoleId::new("r-member"),
                name: "Member".to_string(),
            },
        })
    }

    #[test]
    fn test_keys() {
        assert_eq!(member("s1", "m1").key().to_string(), "SpaceMember:s1:m1");
        assert_ne!(member("s1", "m1").key(), member("s2", "m1").key());
        assert_eq!(
            CacheKey::sso_membership(&MemberId::new("m1"), "saml").id,
            "m1:saml"
        );
    }

    #[test]
    fn test_key_ordering_groups_by_type() {
        let mut keys = vec![
            CacheKey::new(EntityType::SpaceMember, "a"),
            CacheKey::new(EntityType::Notification, "z"),
            CacheKey::new(EntityType::Notification, "b"),
        ];
        keys.sort();
        assert_eq!(keys[0].id, "b");
        assert_eq!(keys[1].id, "z");
        assert_eq!(keys[2].entity, EntityType::SpaceMember);
    }

    #[test]
    fn test_merge_only_present_fields() {
        let mut entry = CacheEntry::PostFollowState(PostFollowState {
            post_id: PostId::new("p1"),
            member_id: MemberId::new("m1"),
            enabled: false,
            followers_count: 4,
        });
        let patch = EntryPatch::PostFollowState {
            post_id: PostId::new("p1"),
            member_id: MemberId::new("m1"),
            enabled: None,
            followers_count: Some(9),
        };
        assert!(entry.merge(&patch));
        let CacheEntry::PostFollowState(state) = entry else {
            panic!("variant changed");
        };
        assert!(!state.enabled);
        assert_eq!(state.followers_count, 9);
    }

    #[test]
    fn test_merge_rejects_other_kind() {
        let mut entry = member("s1", "m1");
        let before = entry.clone();
        let patch = EntryPatch::Notification {
            id: NotificationId::new("n1"),
            read: Some(true),
        };
        assert!(!entry.merge(&patch));
        assert_eq!(entry, before);
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry: CacheEntry = serde_json::from_value(json!({
            "__typename": "Notification",
            "id": "n1",
            "read": false,
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(entry.entity_type(), EntityType::Notification);
        assert_eq!(entry.key().id, "n1");

        let settings: NetworkSettings = serde_json::from_value(json!({
            "networkId": "net1",
            "name": "Hearth",
            "defaultSsoStatus": "SOMETHING_NEW"
        }))
        .unwrap();
        assert_eq!(settings.default_sso_status, SsoStatus::Unknown);
        assert!(settings.description.is_none());
    }
}
