//! Resolver contracts consumed by the role adapter

use async_trait::async_trait;
use rolebridge_core::{DirectoryEntry, Lookup, Result};

/// Locates group entries and interprets group identifiers.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait GroupEntryResolver: Send + Sync {
    /// Find the group entry for a role name or group DN.
    ///
    /// With `members_required` the group membership attribute must be
    /// populated on the returned entry, even if that needs a heavier fetch.
    async fn group_entry(&self, name: &str, members_required: bool)
        -> Result<Lookup<DirectoryEntry>>;

    /// Canonical role name for a raw group identifier (DN or plain name)
    fn group_name(&self, identifier: &str) -> String;

    /// Canonical role name of a fetched group entry
    fn group_name_of(&self, entry: &DirectoryEntry) -> String;

    /// Whether two group identifiers denote the same group
    fn groups_equal(&self, a: &str, b: &str) -> bool;

    /// Every group entry in the configured search scope
    async fn all_role_entries(&self) -> Result<Vec<DirectoryEntry>>;

    /// Raw member identifiers of a group, read with ranged retrieval
    async fn group_members_by_ranged_retrieval(&self, role_name: &str)
        -> Result<Lookup<Vec<String>>>;
}

/// Locates user entries and interprets user identifiers.
#[async_trait]
pub trait UserEntryResolver: Send + Sync {
    /// Entry of the user with this username, carrying the user-side membership attribute
    async fn user_entry(&self, username: &str) -> Result<Lookup<DirectoryEntry>>;

    /// Canonical username for a raw member identifier (DN or plain name)
    fn user_name(&self, identifier: &str) -> String;

    /// Canonical username of a fetched user entry
    fn user_name_of(&self, entry: &DirectoryEntry) -> String;

    /// Usernames referenced by `membership_attribute` on an already-fetched entry
    fn users_from_entry(&self, entry: &DirectoryEntry, membership_attribute: &str) -> Vec<String> {
        entry
            .values(membership_attribute)
            .iter()
            .map(|member| self.user_name(member))
            .collect()
    }
}
