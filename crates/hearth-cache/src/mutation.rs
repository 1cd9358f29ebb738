//! Mutation descriptors and the transport contract.
//!
//! A [`MutationDescriptor`] names a server mutation and carries its
//! identifiers. It knows which cache keys it touches, how it is sent on the
//! wire, and how to read the server's answer into confirmed patches.

use async_trait::async_trait;
use hearth_core::{MemberId, NetworkId, PostId, SpaceId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::entry::{CacheKey, EntityType, EntryPatch, Role, SsoStatus};
use crate::error::MutationError;
use crate::store::NormalizedCache;

/// A server mutation the engine knows how to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationDescriptor {
    /// Marks every cached notification as read.
    MarkAllNotificationsRead,
    UpdateSpaceMemberRole {
        space_id: SpaceId,
        member_id: MemberId,
        role: Role,
    },
    DeleteSsoMembership {
        member_id: MemberId,
        sso_type: String,
    },
    UpdateDefaultSsoStatus {
        network_id: NetworkId,
        status: SsoStatus,
    },
    UpdateMemberPostFollowSetting {
        post_id: PostId,
        member_id: MemberId,
        enabled: bool,
    },
    UpdateNetworkSettings {
        network_id: NetworkId,
        name: Option<String>,
        description: Option<String>,
    },
}

impl MutationDescriptor {
    /// Operation name on the wire.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::MarkAllNotificationsRead => "readAllNotifications",
            Self::UpdateSpaceMemberRole { .. } => "updateSpaceMemberRole",
            Self::DeleteSsoMembership { .. } => "deleteSsoMembership",
            Self::UpdateDefaultSsoStatus { .. } => "updateDefaultSsoStatus",
            Self::UpdateMemberPostFollowSetting { .. } => "updateMemberPostNotificationSettings",
            Self::UpdateNetworkSettings { .. } => "updateNetwork",
        }
    }

    /// Sorted, de-duplicated keys this mutation touches.
    ///
    /// The bulk mutation touches every notification cached at call time.
    pub fn touched_keys(&self, cache: &NormalizedCache) -> Vec<CacheKey> {
        match self {
            Self::MarkAllNotificationsRead => cache.keys_of(EntityType::Notification),
            Self::UpdateSpaceMemberRole {
                space_id,
                member_id,
                ..
            } => vec![CacheKey::space_member(space_id, member_id)],
            Self::DeleteSsoMembership {
                member_id,
                sso_type,
            } => vec![CacheKey::sso_membership(member_id, sso_type)],
            Self::UpdateDefaultSsoStatus { network_id, .. }
            | Self::UpdateNetworkSettings { network_id, .. } => {
                vec![CacheKey::network_settings(network_id)]
            }
            Self::UpdateMemberPostFollowSetting {
                post_id, member_id, ..
            } => vec![CacheKey::post_follow(post_id, member_id)],
        }
    }

    /// GraphQL document sent for this mutation.
    pub fn document(&self) -> &'static str {
        match self {
            Self::MarkAllNotificationsRead => {
                "mutation readAllNotifications { readAllNotifications { status } }"
            }
            Self::UpdateSpaceMemberRole { .. } => {
                "mutation updateSpaceMemberRole($spaceId: ID!, $memberId: ID!, $input: UpdateSpaceMemberRoleInput!) { \
                 updateSpaceMemberRole(spaceId: $spaceId, memberId: $memberId, input: $input) { status role { id name } } }"
            }
            Self::DeleteSsoMembership { .. } => {
                "mutation deleteSsoMembership($memberId: ID!, $type: SsoType!) { \
                 deleteSsoMembership(memberId: $memberId, type: $type) { status } }"
            }
            Self::UpdateDefaultSsoStatus { .. } => {
                "mutation updateDefaultSsoStatus($status: SsoStatus!) { \
                 updateDefaultSsoStatus(status: $status) { status defaultSsoStatus } }"
            }
            Self::UpdateMemberPostFollowSetting { .. } => {
                "mutation updateMemberPostNotificationSettings($postId: ID!, $memberId: ID!, $input: UpdateMemberPostNotificationSettingsInput!) { \
                 updateMemberPostNotificationSettings(postId: $postId, memberId: $memberId, input: $input) { status enabled followersCount } }"
            }
            Self::UpdateNetworkSettings { .. } => {
                "mutation updateNetwork($input: UpdateNetworkInput!) { \
                 updateNetwork(input: $input) { status name description defaultSsoStatus } }"
            }
        }
    }

    /// GraphQL variables for this mutation.
    pub fn variables(&self) -> Value {
        match self {
            Self::MarkAllNotificationsRead => json!({}),
            Self::UpdateSpaceMemberRole {
                space_id,
                member_id,
                role,
            } => json!({
                "spaceId": space_id,
                "memberId": member_id,
                "input": { "roleId": role.id },
            }),
            Self::DeleteSsoMembership {
                member_id,
                sso_type,
            } => json!({ "memberId": member_id, "type": sso_type }),
            Self::UpdateDefaultSsoStatus { status, .. } => json!({ "status": status }),
            Self::UpdateMemberPostFollowSetting {
                post_id,
                member_id,
                enabled,
            } => json!({
                "postId": post_id,
                "memberId": member_id,
                "input": { "enabled": enabled },
            }),
            Self::UpdateNetworkSettings {
                name, description, ..
            } => {
                let mut input = serde_json::Map::new();
                if let Some(name) = name {
                    input.insert("name".to_string(), json!(name));
                }
                if let Some(description) = description {
                    input.insert("description".to_string(), json!(description));
                }
                json!({ "input": input })
            }
        }
    }

    /// Reads the payload under `data.<operation>` into a response.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::InvalidResponse` if the payload has no
    /// readable `status`.
    pub fn read_response(&self, payload: &Value) -> Result<MutationResponse, MutationError> {
        let payload: ResponsePayload = serde_json::from_value(payload.clone()).map_err(|e| {
            MutationError::invalid_response(format!("{}: {e}", self.operation_name()))
        })?;
        let status = payload.status;
        if status == MutationStatus::Failed {
            return Ok(MutationResponse::failed());
        }

        let confirmed = match self {
            Self::MarkAllNotificationsRead => Vec::new(),
            Self::UpdateSpaceMemberRole {
                space_id,
                member_id,
                ..
            } => payload
                .role
                .map(|role| EntryPatch::SpaceMember {
                    space_id: space_id.clone(),
                    member_id: member_id.clone(),
                    role: Some(role),
                })
                .into_iter()
                .collect(),
            Self::DeleteSsoMembership {
                member_id,
                sso_type,
            } => vec![EntryPatch::Removed(CacheKey::sso_membership(
                member_id, sso_type,
            ))],
            Self::UpdateDefaultSsoStatus { network_id, .. } => payload
                .default_sso_status
                .map(|status| EntryPatch::NetworkSettings {
                    network_id: network_id.clone(),
                    name: None,
                    description: None,
                    default_sso_status: Some(status),
                })
                .into_iter()
                .collect(),
            Self::UpdateMemberPostFollowSetting {
                post_id, member_id, ..
            } => {
                if payload.enabled.is_none() && payload.followers_count.is_none() {
                    Vec::new()
                } else {
                    vec![EntryPatch::PostFollowState {
                        post_id: post_id.clone(),
                        member_id: member_id.clone(),
                        enabled: payload.enabled,
                        followers_count: payload.followers_count,
                    }]
                }
            }
            Self::UpdateNetworkSettings { network_id, .. } => {
                if payload.name.is_none()
                    && payload.description.is_none()
                    && payload.default_sso_status.is_none()
                {
                    Vec::new()
                } else {
                    vec![EntryPatch::NetworkSettings {
                        network_id: network_id.clone(),
                        name: payload.name,
                        description: payload.description,
                        default_sso_status: payload.default_sso_status,
                    }]
                }
            }
        };

        Ok(MutationResponse { status, confirmed })
    }
}

/// Outcome reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationStatus {
    Succeeded,
    Failed,
}

/// Server answer to a dispatched mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResponse {
    pub status: MutationStatus,
    /// Fields the server confirmed. Only these are merged on success.
    pub confirmed: Vec<EntryPatch>,
}

impl MutationResponse {
    pub fn succeeded(confirmed: Vec<EntryPatch>) -> Self {
        Self {
            status: MutationStatus::Succeeded,
            confirmed,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: MutationStatus::Failed,
            confirmed: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePayload {
    status: MutationStatus,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    followers_count: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_sso_status: Option<SsoStatus>,
}

/// Sends mutations to the server.
#[async_trait]
pub trait MutationTransport: Send + Sync {
    /// Dispatches `mutation` and returns the server's answer.
    ///
    /// Transport-level failures are errors; a server that processed the
    /// request and declined it answers with [`MutationStatus::Failed`].
    async fn dispatch(
        &self,
        mutation: &MutationDescriptor,
    ) -> Result<MutationResponse, MutationError>;
}
