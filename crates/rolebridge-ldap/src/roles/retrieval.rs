//! Role member retrieval strategies

use crate::roles::adapter::RoleSettings;
use crate::roles::resolver::{GroupEntryResolver, UserEntryResolver};
use async_trait::async_trait;
use rolebridge_core::{Lookup, Result};
use std::sync::Arc;
use tracing::debug;

/// How the usernames of a role's members are gathered.
#[async_trait]
pub trait MemberRetrieval: Send + Sync {
    /// Usernames of the members of `role_name`, unsorted
    async fn members(
        &self,
        groups: &dyn GroupEntryResolver,
        users: &dyn UserEntryResolver,
        role_name: &str,
    ) -> Result<Lookup<Vec<String>>>;

    fn name(&self) -> &'static str;
}

/// Reads the group entry once with its membership attribute populated.
#[derive(Debug, Clone)]
pub struct DirectMemberRetrieval {
    membership_attribute: String,
}

impl DirectMemberRetrieval {
    pub fn new(membership_attribute: impl Into<String>) -> Self {
        Self {
            membership_attribute: membership_attribute.into(),
        }
    }
}

#[async_trait]
impl MemberRetrieval for DirectMemberRetrieval {
    async fn members(
        &self,
        groups: &dyn GroupEntryResolver,
        users: &dyn UserEntryResolver,
        role_name: &str,
    ) -> Result<Lookup<Vec<String>>> {
        let group = groups.group_entry(role_name, true).await?;
        Ok(group.map(|entry| users.users_from_entry(&entry, &self.membership_attribute)))
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Pages through the membership attribute for servers that cap it.
#[derive(Debug, Clone, Default)]
pub struct RangedMemberRetrieval;

#[async_trait]
impl MemberRetrieval for RangedMemberRetrieval {
    async fn members(
        &self,
        groups: &dyn GroupEntryResolver,
        users: &dyn UserEntryResolver,
        role_name: &str,
    ) -> Result<Lookup<Vec<String>>> {
        let members = groups.group_members_by_ranged_retrieval(role_name).await?;
        Ok(members.map(|ids| ids.iter().map(|id| users.user_name(id)).collect()))
    }

    fn name(&self) -> &'static str {
        "ranged"
    }
}

/// Strategy matching the server's range retrieval capability
pub fn strategy_for(settings: &RoleSettings) -> Arc<dyn MemberRetrieval> {
    let strategy: Arc<dyn MemberRetrieval> = if settings.range_retrieval_support {
        Arc::new(RangedMemberRetrieval)
    } else {
        Arc::new(DirectMemberRetrieval::new(
            settings.group_membership_attribute.clone(),
        ))
    };
    debug!(strategy = strategy.name(), "Selected member retrieval strategy");
    strategy
}
