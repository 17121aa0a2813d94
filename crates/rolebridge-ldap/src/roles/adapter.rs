//! Role adapter
//!
//! Maps between user entries and group entries through the configured
//! membership attributes. A missing user or role is a normal answer (false or
//! empty); every other failure is returned unchanged, without retries.

use crate::roles::resolver::{GroupEntryResolver, UserEntryResolver};
use crate::roles::retrieval::{strategy_for, MemberRetrieval};
use rolebridge_core::{Error, LdapConfig, Lookup, Result};
use std::sync::Arc;
use tracing::debug;

/// Attribute names and capabilities the adapter reads at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSettings {
    /// Attribute whose presence marks a group entry as a role
    pub rdn_attribute: String,
    /// Attribute on a user entry listing its groups
    pub user_membership_attribute: String,
    /// Attribute on a group entry listing its members
    pub group_membership_attribute: String,
    pub range_retrieval_support: bool,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self::from(&LdapConfig::default())
    }
}

impl From<&LdapConfig> for RoleSettings {
    fn from(config: &LdapConfig) -> Self {
        Self {
            rdn_attribute: config.groups.rdn_attribute.clone(),
            user_membership_attribute: config.users.membership_attribute.clone(),
            group_membership_attribute: config.groups.membership_attribute.clone(),
            range_retrieval_support: config.server.range_retrieval_support,
        }
    }
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::missing_argument(name));
    }
    Ok(())
}

fn into_sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

/// Answers role queries on top of the group and user resolvers.
///
/// Stateless apart from its settings, so one adapter can serve concurrent
/// callers when the resolvers allow it.
pub struct RoleAdapter {
    settings: RoleSettings,
    groups: Arc<dyn GroupEntryResolver>,
    users: Arc<dyn UserEntryResolver>,
    members: Arc<dyn MemberRetrieval>,
}

impl RoleAdapter {
    /// Create an adapter, picking the member retrieval strategy from the
    /// range retrieval capability
    pub fn new(
        settings: RoleSettings,
        groups: Arc<dyn GroupEntryResolver>,
        users: Arc<dyn UserEntryResolver>,
    ) -> Self {
        let members = strategy_for(&settings);
        Self::with_strategy(settings, groups, users, members)
    }

    pub fn with_strategy(
        settings: RoleSettings,
        groups: Arc<dyn GroupEntryResolver>,
        users: Arc<dyn UserEntryResolver>,
        members: Arc<dyn MemberRetrieval>,
    ) -> Self {
        Self {
            settings,
            groups,
            users,
            members,
        }
    }

    pub fn settings(&self) -> &RoleSettings {
        &self.settings
    }

    /// Name of the member retrieval strategy in use
    pub fn strategy_name(&self) -> &'static str {
        self.members.name()
    }

    pub async fn role_exists(&self, role_name: &str) -> Result<bool> {
        require(role_name, "role_name")?;

        match self.groups.group_entry(role_name, false).await? {
            Lookup::Found(role) => Ok(role.contains_attribute(&self.settings.rdn_attribute)),
            Lookup::NotFound => {
                debug!(role = role_name, "Role not found");
                Ok(false)
            }
        }
    }

    pub async fn is_user_in_role(&self, username: &str, role_name: &str) -> Result<bool> {
        require(username, "username")?;
        require(role_name, "role_name")?;

        let user = match self.users.user_entry(username).await? {
            Lookup::Found(user) => user,
            Lookup::NotFound => {
                debug!(user = username, "User not found");
                return Ok(false);
            }
        };

        Ok(user
            .values(&self.settings.user_membership_attribute)
            .iter()
            .any(|group| self.groups.groups_equal(group, role_name)))
    }

    pub async fn roles_for_user(&self, username: &str) -> Result<Vec<String>> {
        require(username, "username")?;

        let user = match self.users.user_entry(username).await? {
            Lookup::Found(user) => user,
            Lookup::NotFound => {
                debug!(user = username, "User not found");
                return Ok(Vec::new());
            }
        };

        let roles = user
            .values(&self.settings.user_membership_attribute)
            .iter()
            .map(|group| self.groups.group_name(group))
            .collect();
        Ok(into_sorted(roles))
    }

    pub async fn users_in_role(&self, role_name: &str) -> Result<Vec<String>> {
        require(role_name, "role_name")?;

        match self
            .members
            .members(self.groups.as_ref(), self.users.as_ref(), role_name)
            .await?
        {
            Lookup::Found(users) => {
                debug!(
                    role = role_name,
                    count = users.len(),
                    strategy = self.members.name(),
                    "Resolved role members"
                );
                Ok(into_sorted(users))
            }
            Lookup::NotFound => {
                debug!(role = role_name, "Role not found");
                Ok(Vec::new())
            }
        }
    }

    pub async fn all_roles(&self) -> Result<Vec<String>> {
        let entries = self.groups.all_role_entries().await?;
        let roles = entries
            .iter()
            .map(|entry| self.groups.group_name_of(entry))
            .collect();
        Ok(into_sorted(roles))
    }
}
