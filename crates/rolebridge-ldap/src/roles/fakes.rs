//! In-memory directory doubles for tests

use crate::dn;
use crate::roles::range::{RangeBounds, RangeSource, RangedRetrieval};
use crate::roles::resolver::{GroupEntryResolver, UserEntryResolver};
use async_trait::async_trait;
use rolebridge_core::{DirectoryEntry, Error, Lookup, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const GROUPS: &str = "ou=groups,dc=example,dc=com";
const PEOPLE: &str = "ou=people,dc=example,dc=com";

fn group_dn(cn: &str) -> String {
    format!("cn={},{}", cn, GROUPS)
}

fn user_dn(uid: &str) -> String {
    format!("uid={},{}", uid, PEOPLE)
}

/// Serves `attr;range=a-b` requests from a fixed value list, returning at
/// most `cap` values per response like a server with a `MaxValRange`.
pub(crate) struct CappedRangeSource {
    dn: String,
    attribute: String,
    values: Vec<String>,
    cap: usize,
    fail_after: Option<usize>,
    requests: Mutex<Vec<String>>,
}

impl CappedRangeSource {
    pub(crate) fn new(dn: &str, attribute: &str, values: Vec<String>, cap: usize) -> Self {
        Self {
            dn: dn.to_string(),
            attribute: attribute.to_string(),
            values,
            cap: cap.max(1),
            fail_after: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request after the first `n`
    pub(crate) fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RangeSource for CappedRangeSource {
    async fn fetch_range(&self, dn: &str, attribute_description: &str) -> Result<Lookup<DirectoryEntry>> {
        let issued = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(attribute_description.to_string());
            requests.len()
        };
        if self.fail_after.is_some_and(|n| issued > n) {
            return Err(Error::Directory("connection reset by peer".to_string()));
        }
        if !dn.eq_ignore_ascii_case(&self.dn) {
            return Ok(Lookup::NotFound);
        }

        let bounds = RangeBounds::parse(attribute_description)?
            .ok_or_else(|| Error::Directory("expected a ranged request".to_string()))?;

        let total = self.values.len();
        let start = bounds.start.min(total);
        let requested_stop = bounds.end.map(|end| end.saturating_add(1)).unwrap_or(total);
        let stop = requested_stop.min(start.saturating_add(self.cap)).min(total);

        let description = if stop == total {
            format!("{};range={}-*", self.attribute, bounds.start)
        } else {
            format!("{};range={}-{}", self.attribute, bounds.start, stop - 1)
        };

        Ok(Lookup::Found(
            DirectoryEntry::new(&self.dn).with_attribute(description, self.values[start..stop].to_vec()),
        ))
    }
}

/// Replays canned responses in order and records what was asked.
pub(crate) struct ScriptedRangeSource {
    responses: Mutex<VecDeque<Result<Lookup<DirectoryEntry>>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedRangeSource {
    pub(crate) fn new(responses: Vec<Result<Lookup<DirectoryEntry>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// One response per `(returned description, values)` pair
    pub(crate) fn from_chunks(dn: &str, chunks: Vec<(&str, Vec<&str>)>) -> Self {
        Self::new(
            chunks
                .into_iter()
                .map(|(description, values)| {
                    Ok(Lookup::Found(DirectoryEntry::new(dn).with_attribute(description, values)))
                })
                .collect(),
        )
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RangeSource for ScriptedRangeSource {
    async fn fetch_range(&self, _dn: &str, attribute_description: &str) -> Result<Lookup<DirectoryEntry>> {
        self.requests
            .lock()
            .unwrap()
            .push(attribute_description.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Directory("script exhausted".to_string())))
    }
}

/// Users and groups held in memory, implementing both resolvers.
pub(crate) struct InMemoryDirectory {
    users: Vec<DirectoryEntry>,
    groups: Vec<DirectoryEntry>,
    server_cap: usize,
    fault: Option<String>,
    range_fault_after: Option<usize>,
    calls: AtomicUsize,
}

impl InMemoryDirectory {
    pub(crate) fn new() -> Self {
        Self {
            users: Vec::new(),
            groups: Vec::new(),
            server_cap: 1500,
            fault: None,
            range_fault_after: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Admins = {bob, alice}, Editors = {bob}, everyone = {carol, alice, bob}
    pub(crate) fn sample() -> Self {
        let group = |cn: &str, members: &[&str]| {
            DirectoryEntry::new(group_dn(cn))
                .with_attribute("cn", [cn])
                .with_attribute("member", members.iter().map(|m| user_dn(m)))
        };
        let user = |uid: &str, groups: &[&str]| {
            DirectoryEntry::new(user_dn(uid))
                .with_attribute("uid", [uid])
                .with_attribute("memberOf", groups.iter().map(|g| group_dn(g)))
        };

        Self::new()
            .with_group(group("Admins", &["bob", "alice"]))
            .with_group(group("Editors", &["bob"]))
            .with_group(group("everyone", &["carol", "alice", "bob"]))
            .with_user(user("bob", &["Editors", "Admins", "everyone"]))
            .with_user(user("alice", &["Admins", "everyone"]))
            .with_user(user("carol", &["everyone"]))
    }

    pub(crate) fn with_group(mut self, entry: DirectoryEntry) -> Self {
        self.groups.push(entry);
        self
    }

    pub(crate) fn with_user(mut self, entry: DirectoryEntry) -> Self {
        self.users.push(entry);
        self
    }

    /// Values per response when reading groups with ranged retrieval
    pub(crate) fn with_server_cap(mut self, cap: usize) -> Self {
        self.server_cap = cap;
        self
    }

    /// Every directory call fails with `message`
    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.fault = Some(message.to_string());
        self
    }

    /// Ranged retrieval fails after `n` successful range requests
    pub(crate) fn failing_range_after(mut self, n: usize) -> Self {
        self.range_fault_after = Some(n);
        self
    }

    /// Same data, every list in the opposite order
    pub(crate) fn reversed(mut self) -> Self {
        for entry in self.users.iter_mut().chain(self.groups.iter_mut()) {
            for values in entry.attributes.values_mut() {
                values.reverse();
            }
        }
        self.users.reverse();
        self.groups.reverse();
        self
    }

    /// Number of directory round-trips served
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn round_trip(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fault {
            Some(message) => Err(Error::Directory(message.clone())),
            None => Ok(()),
        }
    }

    fn find_group(&self, name: &str) -> Option<&DirectoryEntry> {
        self.groups
            .iter()
            .find(|entry| dn::identifiers_equal(&entry.dn, name))
    }
}

#[async_trait]
impl GroupEntryResolver for InMemoryDirectory {
    async fn group_entry(&self, name: &str, members_required: bool) -> Result<Lookup<DirectoryEntry>> {
        self.round_trip()?;
        let mut entry = match self.find_group(name) {
            Some(entry) => entry.clone(),
            None => return Ok(Lookup::NotFound),
        };
        if !members_required {
            entry.attributes.remove("member");
        }
        Ok(Lookup::Found(entry))
    }

    fn group_name(&self, identifier: &str) -> String {
        dn::display_name(identifier)
    }

    fn group_name_of(&self, entry: &DirectoryEntry) -> String {
        entry
            .first_value("cn")
            .map(str::to_string)
            .unwrap_or_else(|| dn::display_name(&entry.dn))
    }

    fn groups_equal(&self, a: &str, b: &str) -> bool {
        dn::identifiers_equal(a, b)
    }

    async fn all_role_entries(&self) -> Result<Vec<DirectoryEntry>> {
        self.round_trip()?;
        Ok(self.groups.clone())
    }

    async fn group_members_by_ranged_retrieval(&self, role_name: &str) -> Result<Lookup<Vec<String>>> {
        self.round_trip()?;
        let group = match self.find_group(role_name) {
            Some(group) => group,
            None => return Ok(Lookup::NotFound),
        };

        let mut source = CappedRangeSource::new(
            &group.dn,
            "member",
            group.values("member").to_vec(),
            self.server_cap,
        );
        if let Some(n) = self.range_fault_after {
            source = source.failing_after(n);
        }

        RangedRetrieval::default()
            .retrieve(&source, &group.dn, "member")
            .await
    }
}

#[async_trait]
impl UserEntryResolver for InMemoryDirectory {
    async fn user_entry(&self, username: &str) -> Result<Lookup<DirectoryEntry>> {
        self.round_trip()?;
        Ok(self
            .users
            .iter()
            .find(|entry| {
                entry
                    .first_value("uid")
                    .is_some_and(|uid| uid.eq_ignore_ascii_case(username))
            })
            .cloned()
            .into())
    }

    fn user_name(&self, identifier: &str) -> String {
        dn::display_name(identifier)
    }

    fn user_name_of(&self, entry: &DirectoryEntry) -> String {
        entry
            .first_value("uid")
            .map(str::to_string)
            .unwrap_or_else(|| dn::display_name(&entry.dn))
    }
}
