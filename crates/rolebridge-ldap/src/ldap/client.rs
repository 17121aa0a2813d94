//! LDAP directory implementation
//!
//! Handles LDAP connections and user/group queries for the role adapter.
//! Supports LDAP, LDAPS (SSL), and STARTTLS connections.

use crate::dn;
use crate::roles::{
    GroupEntryResolver, RangeSource, RangedRetrieval, RoleAdapter, RoleSettings, UserEntryResolver,
};
use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use rolebridge_core::{DirectoryEntry, Error, LdapConfig, Lookup, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// noSuchObject: the search base does not exist
const RC_NO_SUCH_OBJECT: u32 = 32;

/// LDAP directory serving group and user lookups
pub struct LdapDirectory {
    config: LdapConfig,
    ranged: RangedRetrieval,
}

impl LdapDirectory {
    /// Create a new LDAP directory
    pub fn new(config: LdapConfig) -> Self {
        let ranged = RangedRetrieval::new(config.server.range_page_size);
        Self { config, ranged }
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    pub fn role_settings(&self) -> RoleSettings {
        RoleSettings::from(&self.config)
    }

    /// Role adapter using this directory for both groups and users
    pub fn into_role_adapter(self) -> RoleAdapter {
        let settings = self.role_settings();
        let directory = Arc::new(self);
        RoleAdapter::new(settings, directory.clone(), directory)
    }

    // =========================================================================
    // Private methods - connection handling
    // =========================================================================

    /// Connect and bind with the service account
    async fn connect(&self) -> Result<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.timeout_seconds))
            .set_starttls(self.config.start_tls);

        debug!("Connecting to LDAP server: {}", self.config.server_url);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| Error::Directory(format!("Failed to connect to LDAP server: {}", e)))?;

        ldap3::drive!(conn);

        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| Error::Directory(format!("Service bind failed: {}", e)))?
            .success()
            .map_err(|e| Error::Directory(format!("Service bind rejected: {}", e)))?;

        Ok(ldap)
    }

    fn group_attributes(&self, members_required: bool) -> Vec<&str> {
        let groups = &self.config.groups;
        let mut attrs = vec![groups.rdn_attribute.as_str()];
        if !groups.name_attribute.eq_ignore_ascii_case(&groups.rdn_attribute) {
            attrs.push(groups.name_attribute.as_str());
        }
        if members_required {
            attrs.push(groups.membership_attribute.as_str());
        }
        attrs
    }

    /// Locate a group by DN (base search) or by RDN value (subtree search)
    async fn find_group(
        &self,
        ldap: &mut Ldap,
        name: &str,
        attrs: Vec<&str>,
    ) -> Result<Lookup<DirectoryEntry>> {
        let groups = &self.config.groups;

        let found = if dn::is_distinguished_name(name) {
            search(ldap, name, Scope::Base, &groups.filter, attrs).await?
        } else {
            let filter = self.config.build_group_filter(&ldap_escape(name));
            debug!("Searching group with filter: {}", filter);
            search(ldap, &groups.base_dn, Scope::Subtree, &filter, attrs).await?
        };

        Ok(first_entry(found, name))
    }
}

/// Unbind, ignoring failures; the handle is gone either way
async fn release(mut ldap: Ldap) {
    if let Err(e) = ldap.unbind().await {
        debug!("Unbind failed: {}", e);
    }
}

/// noSuchObject on a base read means the identifier itself is missing;
/// under a subtree search it means the configured search base is wrong
fn no_such_object(scope: Scope, base: &str) -> Result<Lookup<Vec<DirectoryEntry>>> {
    match scope {
        Scope::Base => Ok(Lookup::NotFound),
        _ => Err(Error::Directory(format!("Search base {} does not exist", base))),
    }
}

/// Search, mapping a missing base entry to `NotFound`
async fn search(
    ldap: &mut Ldap,
    base: &str,
    scope: Scope,
    filter: &str,
    attrs: Vec<&str>,
) -> Result<Lookup<Vec<DirectoryEntry>>> {
    let SearchResult(rs, res) = ldap
        .search(base, scope, filter, attrs)
        .await
        .map_err(|e| Error::Directory(format!("Search failed: {}", e)))?;

    if res.rc == RC_NO_SUCH_OBJECT {
        return no_such_object(scope, base);
    }

    res.success()
        .map_err(|e| Error::Directory(format!("Search error: {}", e)))?;

    Ok(Lookup::Found(
        rs.into_iter()
            .map(|result| {
                let entry = SearchEntry::construct(result);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect(),
    ))
}

fn first_entry(found: Lookup<Vec<DirectoryEntry>>, name: &str) -> Lookup<DirectoryEntry> {
    match found {
        Lookup::Found(entries) => {
            if entries.len() > 1 {
                warn!("{} entries match '{}', using the first", entries.len(), name);
            }
            entries.into_iter().next().into()
        }
        Lookup::NotFound => Lookup::NotFound,
    }
}

/// Range requests over an already bound connection
struct BoundRangeSource {
    ldap: Ldap,
    filter: String,
}

#[async_trait]
impl RangeSource for BoundRangeSource {
    async fn fetch_range(
        &self,
        dn: &str,
        attribute_description: &str,
    ) -> Result<Lookup<DirectoryEntry>> {
        let mut ldap = self.ldap.clone();
        let found = search(
            &mut ldap,
            dn,
            Scope::Base,
            &self.filter,
            vec![attribute_description],
        )
        .await?;
        Ok(first_entry(found, dn))
    }
}

#[async_trait]
impl GroupEntryResolver for LdapDirectory {
    async fn group_entry(
        &self,
        name: &str,
        members_required: bool,
    ) -> Result<Lookup<DirectoryEntry>> {
        let mut ldap = self.connect().await?;
        let found = self
            .find_group(&mut ldap, name, self.group_attributes(members_required))
            .await;

        // Large groups come back as their first range only
        let result = match found {
            Ok(Lookup::Found(entry)) if members_required => {
                let source = BoundRangeSource {
                    ldap: ldap.clone(),
                    filter: self.config.groups.filter.clone(),
                };
                self.ranged
                    .complete_entry(&source, entry, &self.config.groups.membership_attribute)
                    .await
                    .map(Lookup::Found)
            }
            other => other,
        };
        release(ldap).await;
        result
    }

    fn group_name(&self, identifier: &str) -> String {
        dn::display_name(identifier)
    }

    fn group_name_of(&self, entry: &DirectoryEntry) -> String {
        entry
            .first_value(&self.config.groups.name_attribute)
            .map(str::to_string)
            .unwrap_or_else(|| dn::display_name(&entry.dn))
    }

    fn groups_equal(&self, a: &str, b: &str) -> bool {
        dn::identifiers_equal(a, b)
    }

    async fn all_role_entries(&self) -> Result<Vec<DirectoryEntry>> {
        let groups = &self.config.groups;
        let mut ldap = self.connect().await?;

        debug!("Listing groups with filter: {}", groups.filter);

        let result = search(
            &mut ldap,
            &groups.base_dn,
            Scope::Subtree,
            &groups.filter,
            self.group_attributes(false),
        )
        .await;
        release(ldap).await;

        match result? {
            Lookup::Found(entries) => {
                debug!("Found {} groups", entries.len());
                Ok(entries)
            }
            Lookup::NotFound => Err(Error::Directory(format!(
                "Group base DN {} does not exist",
                groups.base_dn
            ))),
        }
    }

    async fn group_members_by_ranged_retrieval(
        &self,
        role_name: &str,
    ) -> Result<Lookup<Vec<String>>> {
        let mut ldap = self.connect().await?;

        let found = self
            .find_group(&mut ldap, role_name, self.group_attributes(false))
            .await;
        let group = match found {
            Ok(Lookup::Found(group)) => group,
            other => {
                release(ldap).await;
                return other.map(|lookup| lookup.map(|_| Vec::new()));
            }
        };

        let source = BoundRangeSource {
            ldap: ldap.clone(),
            filter: self.config.groups.filter.clone(),
        };
        let result = self
            .ranged
            .retrieve(&source, &group.dn, &self.config.groups.membership_attribute)
            .await;
        drop(source);
        release(ldap).await;
        result
    }
}

#[async_trait]
impl UserEntryResolver for LdapDirectory {
    async fn user_entry(&self, username: &str) -> Result<Lookup<DirectoryEntry>> {
        let users = &self.config.users;
        let filter = self.config.build_user_filter(&ldap_escape(username));
        let attrs = vec![users.name_attribute.as_str(), users.membership_attribute.as_str()];

        debug!("Searching for user with filter: {}", filter);

        let mut ldap = self.connect().await?;
        let result = search(&mut ldap, &users.base_dn, Scope::Subtree, &filter, attrs).await;
        release(ldap).await;

        let found = first_entry(result?, username);
        if !found.is_found() {
            debug!("User not found: {}", username);
        }
        Ok(found)
    }

    fn user_name(&self, identifier: &str) -> String {
        dn::display_name(identifier)
    }

    fn user_name_of(&self, entry: &DirectoryEntry) -> String {
        entry
            .first_value(&self.config.users.name_attribute)
            .map(str::to_string)
            .unwrap_or_else(|| dn::display_name(&entry.dn))
    }
}
