//! Pure cache reducers.
//!
//! Both reducers map a snapshot of the touched entries to a new snapshot and
//! never read or write the cache themselves. Absent entries stay absent: a
//! mutation never creates objects the client has not fetched.

use tracing::warn;

use crate::entry::{CacheEntry, CacheKey, EntryPatch};
use crate::mutation::MutationDescriptor;
use crate::store::Snapshot;

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub state: Snapshot,
    /// Keys of confirmed patches that matched no touched entry.
    pub unmatched: Vec<CacheKey>,
}

/// Predicted state of `snapshot` once the server applies `mutation`.
pub fn optimistic(mutation: &MutationDescriptor, snapshot: &Snapshot) -> Snapshot {
    snapshot
        .iter()
        .map(|(key, entry)| {
            let next = entry
                .as_ref()
                .and_then(|entry| predict(mutation, entry.clone()));
            (key.clone(), next)
        })
        .collect()
}

fn predict(mutation: &MutationDescriptor, entry: CacheEntry) -> Option<CacheEntry> {
    match (mutation, entry) {
        (MutationDescriptor::MarkAllNotificationsRead, CacheEntry::Notification(mut n)) => {
            n.read = true;
            Some(CacheEntry::Notification(n))
        }
        (MutationDescriptor::UpdateSpaceMemberRole { role, .. }, CacheEntry::SpaceMember(mut m)) => {
            m.role = role.clone();
            Some(CacheEntry::SpaceMember(m))
        }
        (MutationDescriptor::DeleteSsoMembership { .. }, CacheEntry::SsoMembership(_)) => None,
        (
            MutationDescriptor::UpdateDefaultSsoStatus { status, .. },
            CacheEntry::NetworkSettings(mut s),
        ) => {
            s.default_sso_status = *status;
            Some(CacheEntry::NetworkSettings(s))
        }
        (
            MutationDescriptor::UpdateMemberPostFollowSetting { enabled, .. },
            CacheEntry::PostFollowState(mut p),
        ) => {
            if p.enabled != *enabled {
                p.followers_count = if *enabled {
                    p.followers_count.saturating_add(1)
                } else {
                    p.followers_count.saturating_sub(1)
                };
                p.enabled = *enabled;
            }
            Some(CacheEntry::PostFollowState(p))
        }
        (
            MutationDescriptor::UpdateNetworkSettings {
                name, description, ..
            },
            CacheEntry::NetworkSettings(mut s),
        ) => {
            if let Some(name) = name {
                s.name = name.clone();
            }
            if let Some(description) = description {
                s.description = Some(description.clone());
            }
            Some(CacheEntry::NetworkSettings(s))
        }
        (_, entry) => Some(entry),
    }
}

/// Merges server-confirmed fields into `snapshot`.
///
/// A patch whose key is not in `snapshot`, or that carries fields for an
/// entry that is absent or of another kind, is skipped and reported in
/// [`Reconciled::unmatched`]. A confirmed removal of a touched key always
/// applies.
pub fn reconcile(snapshot: &Snapshot, confirmed: &[EntryPatch]) -> Reconciled {
    let mut state = snapshot.clone();
    let mut unmatched = Vec::new();

    for patch in confirmed {
        let key = patch.key();
        let Some(slot) = state.get_mut(&key) else {
            warn!(key = %key, "Confirmed patch does not match a touched entry");
            unmatched.push(key);
            continue;
        };

        if matches!(patch, EntryPatch::Removed(_)) {
            *slot = None;
            continue;
        }
        if !slot.as_mut().is_some_and(|entry| entry.merge(patch)) {
            warn!(
                key = %key,
                present = slot.is_some(),
                "Confirmed patch does not apply to the cached entry"
            );
            unmatched.push(key);
        }
    }

    Reconciled { state, unmatched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{
        Notification, PostFollowState, Role, SpaceMember, SsoMembership, SsoStatus,
    };
    use hearth_core::{MemberId, NotificationId, PostId, RoleId, SpaceId};
    use time::OffsetDateTime;

    fn notification(id: &str, read: bool) -> CacheEntry {
        CacheEntry::Notification(Notification {
            id: NotificationId::new(id),
            read,
            created_at: OffsetDateTime::UNIX_EPOCH,
        })
    }

    fn snapshot(entries: impl IntoIterator<Item = CacheEntry>) -> Snapshot {
        entries.into_iter().map(|e| (e.key(), Some(e))).collect()
    }

    fn follow(enabled: bool, count: u64) -> CacheEntry {
        CacheEntry::PostFollowState(PostFollowState {
            post_id: PostId::new("p1"),
            member_id: MemberId::new("m1"),
            enabled,
            followers_count: count,
        })
    }

    fn role(id: &str) -> Role {
        Role {
            id: RoleId::new(id),
            name: id.to_string(),
        }
    }

    #[test]
    fn test_mark_all_read() {
        let before = snapshot([notification("n1", false), notification("n2", true)]);
        let after = optimistic(&MutationDescriptor::MarkAllNotificationsRead, &before);

        assert!(after.values().all(|e| matches!(
            e,
            Some(CacheEntry::Notification(Notification { read: true, .. }))
        )));
        // the input is untouched
        assert_eq!(before[&notification("n1", false).key()], Some(notification("n1", false)));
    }

    #[test]
    fn test_absent_entry_stays_absent() {
        let key = CacheKey::space_member(&SpaceId::new("s1"), &MemberId::new("m1"));
        let mut before = Snapshot::new();
        before.insert(key.clone(), None);

        let mutation = MutationDescriptor::UpdateSpaceMemberRole {
            space_id: SpaceId::new("s1"),
            member_id: MemberId::new("m1"),
            role: role("admin"),
        };
        assert_eq!(optimistic(&mutation, &before)[&key], None);
    }

    #[test]
    fn test_delete_removes() {
        let entry = CacheEntry::SsoMembership(SsoMembership {
            member_id: MemberId::new("m1"),
            sso_type: "SAML".to_string(),
            status: SsoStatus::Enabled,
        });
        let mutation = MutationDescriptor::DeleteSsoMembership {
            member_id: MemberId::new("m1"),
            sso_type: "SAML".to_string(),
        };
        let after = optimistic(&mutation, &snapshot([entry.clone()]));
        assert_eq!(after[&entry.key()], None);
    }

    #[test]
    fn test_follow_adjusts_count_once() {
        let follow_on = |enabled| MutationDescriptor::UpdateMemberPostFollowSetting {
            post_id: PostId::new("p1"),
            member_id: MemberId::new("m1"),
            enabled,
        };

        let after = optimistic(&follow_on(true), &snapshot([follow(false, 3)]));
        assert_eq!(after[&follow(true, 0).key()], Some(follow(true, 4)));

        let unchanged = optimistic(&follow_on(true), &snapshot([follow(true, 4)]));
        assert_eq!(unchanged[&follow(true, 0).key()], Some(follow(true, 4)));

        let off = optimistic(&follow_on(false), &snapshot([follow(true, 0)]));
        assert_eq!(off[&follow(true, 0).key()], Some(follow(false, 0)));
    }

    #[test]
    fn test_reconcile_merges_only_confirmed_fields() {
        let optimistic_state = snapshot([follow(true, 4)]);
        let reconciled = reconcile(
            &optimistic_state,
            &[EntryPatch::PostFollowState {
                post_id: PostId::new("p1"),
                member_id: MemberId::new("m1"),
                enabled: None,
                followers_count: Some(10),
            }],
        );
        assert!(reconciled.unmatched.is_empty());
        assert_eq!(reconciled.state[&follow(true, 0).key()], Some(follow(true, 10)));
    }

    #[test]
    fn test_reconcile_skips_unmatched_patches() {
        let member = CacheEntry::SpaceMember(SpaceMember {
            space_id: SpaceId::new("s1"),
            member_id: MemberId::new("m1"),
            role: role("member"),
        });
        let state = snapshot([member.clone()]);

        let stranger = EntryPatch::SpaceMember {
            space_id: SpaceId::new("s1"),
            member_id: MemberId::new("m2"),
            role: Some(role("admin")),
        };
        let reconciled = reconcile(&state, &[stranger.clone()]);

        assert_eq!(reconciled.unmatched, vec![stranger.key()]);
        assert_eq!(reconciled.state, state);
    }

    #[test]
    fn test_reconcile_confirmed_removal() {
        let state = snapshot([notification("n1", true)]);
        let key = notification("n1", true).key();
        let reconciled = reconcile(&state, &[EntryPatch::Removed(key.clone())]);
        assert_eq!(reconciled.state[&key], None);

        // the optimistic step may already have removed it
        let again = reconcile(&reconciled.state, &[EntryPatch::Removed(key.clone())]);
        assert!(again.unmatched.is_empty());

        let elsewhere = CacheKey::new(crate::entry::EntityType::Notification, "n9");
        let stray = reconcile(&state, &[EntryPatch::Removed(elsewhere.clone())]);
        assert_eq!(stray.unmatched, vec![elsewhere]);
    }
}
