//! Configuration for RoleBridge

use crate::{Error, Result, DEFAULT_RANGE_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleBridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ldap: LdapConfig,
}

impl RoleBridgeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok());
        config
    }

    /// Apply `ROLEBRIDGE_*` overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("ROLEBRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ROLEBRIDGE_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Server type first so explicit overrides below win over its presets
        if let Some(server_type) = lookup("ROLEBRIDGE_SERVER_TYPE") {
            match server_type.parse::<LdapServerType>() {
                Ok(t) => self.ldap.apply_server_type(t),
                Err(e) => tracing::warn!("Ignoring ROLEBRIDGE_SERVER_TYPE: {}", e),
            }
        }
        if let Some(url) = lookup("ROLEBRIDGE_LDAP_URL") {
            self.ldap.server_url = url;
        }
        if let Some(dn) = lookup("ROLEBRIDGE_BIND_DN") {
            self.ldap.bind_dn = dn;
        }
        if let Some(password) = lookup("ROLEBRIDGE_BIND_PASSWORD") {
            self.ldap.bind_password = password;
        }
        if let Some(base) = lookup("ROLEBRIDGE_USER_BASE_DN") {
            self.ldap.users.base_dn = base;
        }
        if let Some(base) = lookup("ROLEBRIDGE_GROUP_BASE_DN") {
            self.ldap.groups.base_dn = base;
        }
        if let Some(flag) = lookup("ROLEBRIDGE_RANGE_RETRIEVAL") {
            match parse_flag(&flag) {
                Some(enabled) => self.ldap.server.range_retrieval_support = enabled,
                None => tracing::warn!("Ignoring ROLEBRIDGE_RANGE_RETRIEVAL: '{}' is not a boolean", flag),
            }
        }
        if let Some(size) = lookup("ROLEBRIDGE_RANGE_PAGE_SIZE") {
            match size.trim().parse() {
                Ok(n) => self.ldap.server.range_page_size = n,
                Err(e) => tracing::warn!("Ignoring ROLEBRIDGE_RANGE_PAGE_SIZE '{}': {}", size, e),
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

// ============================================================================
// LDAP Configuration
// ============================================================================

/// LDAP directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LdapConfig {
    /// LDAP server URL (ldap:// or ldaps://)
    /// Example: "ldap://ldap.example.com:389" or "ldaps://ldap.example.com:636"
    #[serde(default = "default_ldap_url")]
    pub server_url: String,

    /// Use STARTTLS for connection upgrade
    #[serde(default)]
    pub start_tls: bool,

    /// Bind DN for LDAP queries (service account)
    /// Example: "cn=admin,dc=example,dc=com"
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password
    #[serde(default)]
    pub bind_password: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// LDAP server type hint
    #[serde(default)]
    pub server_type: LdapServerType,

    #[serde(default)]
    pub users: UserSchema,

    #[serde(default)]
    pub groups: GroupSchema,

    #[serde(default)]
    pub server: ServerCapabilities,
}

/// Where users live and which attributes describe them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserSchema {
    /// Base DN for user searches
    #[serde(default)]
    pub base_dn: String,

    /// User search filter, `{username}` is substituted (escaped)
    #[serde(default = "default_user_filter")]
    pub filter: String,

    /// Attribute holding the canonical username
    #[serde(default = "default_username_attr")]
    pub name_attribute: String,

    /// Attribute listing the groups a user belongs to
    #[serde(default = "default_user_membership_attr")]
    pub membership_attribute: String,
}

/// Where groups live and which attributes describe them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupSchema {
    /// Base DN for group searches
    #[serde(default)]
    pub base_dn: String,

    /// Filter selecting group entries
    #[serde(default = "default_group_filter")]
    pub filter: String,

    /// Attribute forming the group RDN; its presence marks an entry as a role
    #[serde(default = "default_group_rdn_attr")]
    pub rdn_attribute: String,

    /// Attribute holding the group display name
    #[serde(default = "default_group_rdn_attr")]
    pub name_attribute: String,

    /// Attribute listing the members of a group
    #[serde(default = "default_group_membership_attr")]
    pub membership_attribute: String,
}

/// Capabilities of the directory server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerCapabilities {
    /// Server caps multi-valued attributes and needs `attr;range=a-b` requests
    #[serde(default)]
    pub range_retrieval_support: bool,

    /// Values requested per ranged round-trip; the server may return fewer
    #[serde(default = "default_range_page_size")]
    pub range_page_size: usize,
}

fn default_ldap_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_user_filter() -> String {
    "(uid={username})".to_string()
}

fn default_username_attr() -> String {
    "uid".to_string()
}

fn default_user_membership_attr() -> String {
    "memberOf".to_string()
}

fn default_group_filter() -> String {
    "(objectClass=groupOfNames)".to_string()
}

fn default_group_rdn_attr() -> String {
    "cn".to_string()
}

fn default_group_membership_attr() -> String {
    "member".to_string()
}

fn default_range_page_size() -> usize {
    DEFAULT_RANGE_PAGE_SIZE
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            server_url: default_ldap_url(),
            start_tls: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            timeout_seconds: default_timeout(),
            server_type: LdapServerType::default(),
            users: UserSchema::default(),
            groups: GroupSchema::default(),
            server: ServerCapabilities::default(),
        }
    }
}

impl Default for UserSchema {
    fn default() -> Self {
        Self {
            base_dn: String::new(),
            filter: default_user_filter(),
            name_attribute: default_username_attr(),
            membership_attribute: default_user_membership_attr(),
        }
    }
}

impl Default for GroupSchema {
    fn default() -> Self {
        Self {
            base_dn: String::new(),
            filter: default_group_filter(),
            rdn_attribute: default_group_rdn_attr(),
            name_attribute: default_group_rdn_attr(),
            membership_attribute: default_group_membership_attr(),
        }
    }
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            range_retrieval_support: false,
            range_page_size: default_range_page_size(),
        }
    }
}

/// LDAP server type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LdapServerType {
    /// Generic LDAP server
    #[default]
    Ldap,
    /// Microsoft Active Directory
    ActiveDirectory,
    /// OpenLDAP
    OpenLdap,
    /// 389 Directory Server
    Directory389,
}

impl FromStr for LdapServerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ldap" => Ok(LdapServerType::Ldap),
            "ad" | "active_directory" | "activedirectory" => Ok(LdapServerType::ActiveDirectory),
            "openldap" | "open_ldap" => Ok(LdapServerType::OpenLdap),
            "389ds" | "directory389" => Ok(LdapServerType::Directory389),
            other => Err(Error::Config(format!("Unknown server type: {}", other))),
        }
    }
}

impl LdapConfig {
    /// Build user search filter with escaped username substitution
    pub fn build_user_filter(&self, escaped_username: &str) -> String {
        self.users.filter.replace("{username}", escaped_username)
    }

    /// Build a filter selecting one group by its RDN value
    pub fn build_group_filter(&self, escaped_name: &str) -> String {
        format!(
            "(&{}({}={}))",
            self.groups.filter, self.groups.rdn_attribute, escaped_name
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(Error::Config("Server URL is required".to_string()));
        }

        if !self.server_url.starts_with("ldap://") && !self.server_url.starts_with("ldaps://") {
            return Err(Error::Config(
                "Server URL must start with ldap:// or ldaps://".to_string(),
            ));
        }

        if self.users.base_dn.is_empty() {
            return Err(Error::Config("User base DN is required".to_string()));
        }

        if self.groups.base_dn.is_empty() {
            return Err(Error::Config("Group base DN is required".to_string()));
        }

        if !self.users.filter.contains("{username}") {
            return Err(Error::Config(
                "User filter must contain {username} placeholder".to_string(),
            ));
        }

        for (label, attr) in [
            ("User membership attribute", &self.users.membership_attribute),
            ("Group membership attribute", &self.groups.membership_attribute),
            ("Group RDN attribute", &self.groups.rdn_attribute),
        ] {
            if attr.is_empty() {
                return Err(Error::Config(format!("{} is required", label)));
            }
        }

        if self.server.range_page_size == 0 {
            return Err(Error::Config("Range page size must be positive".to_string()));
        }

        Ok(())
    }

    /// Create configuration from server type with sensible defaults
    pub fn from_server_type(server_type: LdapServerType, server_url: &str) -> Self {
        let mut config = Self {
            server_url: server_url.to_string(),
            ..Default::default()
        };
        config.apply_server_type(server_type);
        config
    }

    fn apply_server_type(&mut self, server_type: LdapServerType) {
        self.server_type = server_type;

        match server_type {
            LdapServerType::ActiveDirectory => {
                self.users.filter = "(sAMAccountName={username})".to_string();
                self.users.name_attribute = "sAMAccountName".to_string();
                self.users.membership_attribute = "memberOf".to_string();
                self.groups.filter = "(objectClass=group)".to_string();
                self.groups.rdn_attribute = "cn".to_string();
                self.groups.name_attribute = "cn".to_string();
                self.groups.membership_attribute = "member".to_string();
                self.server.range_retrieval_support = true;
            }
            LdapServerType::OpenLdap | LdapServerType::Directory389 => {
                self.users.filter = "(uid={username})".to_string();
                self.users.name_attribute = "uid".to_string();
                self.users.membership_attribute = "memberOf".to_string();
                self.groups.filter = "(objectClass=groupOfNames)".to_string();
                self.groups.membership_attribute = "member".to_string();
                self.server.range_retrieval_support = false;
            }
            LdapServerType::Ldap => {
                // Use defaults
            }
        }
    }

    /// Copy safe to print or log
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        if !copy.bind_password.is_empty() {
            copy.bind_password = "********".to_string();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid_config() -> LdapConfig {
        let mut config = LdapConfig::default();
        config.users.base_dn = "ou=users,dc=example,dc=com".to_string();
        config.groups.base_dn = "ou=groups,dc=example,dc=com".to_string();
        config
    }

    #[test]
    fn test_user_filter_building() {
        let config = LdapConfig::default();
        assert_eq!(config.build_user_filter("john"), "(uid=john)");
    }

    #[test]
    fn test_group_filter_building() {
        let config = LdapConfig::default();
        assert_eq!(
            config.build_group_filter("admins"),
            "(&(objectClass=groupOfNames)(cn=admins))"
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = LdapConfig {
            server_url: String::new(),
            ..Default::default()
        };

        // Should fail - empty server URL
        assert!(config.validate().is_err());

        config.server_url = "http://localhost".to_string();
        assert!(config.validate().is_err());

        config.server_url = "ldap://localhost:389".to_string();
        assert!(config.validate().is_err());

        config.users.base_dn = "ou=users,dc=example,dc=com".to_string();
        assert!(config.validate().is_err());

        config.groups.base_dn = "ou=groups,dc=example,dc=com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_filter_and_page_size() {
        let mut config = valid_config();
        config.users.filter = "(uid=*)".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.server.range_page_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.groups.membership_attribute.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_active_directory_defaults() {
        let config = LdapConfig::from_server_type(
            LdapServerType::ActiveDirectory,
            "ldaps://dc.example.com:636",
        );

        assert_eq!(config.users.filter, "(sAMAccountName={username})");
        assert_eq!(config.users.name_attribute, "sAMAccountName");
        assert_eq!(config.groups.filter, "(objectClass=group)");
        assert!(config.server.range_retrieval_support);
    }

    #[test]
    fn test_openldap_defaults() {
        let config = LdapConfig::from_server_type(LdapServerType::OpenLdap, "ldap://x:389");
        assert_eq!(config.users.name_attribute, "uid");
        assert!(!config.server.range_retrieval_support);
    }

    #[test]
    fn test_server_type_parsing() {
        assert_eq!("AD".parse::<LdapServerType>().unwrap(), LdapServerType::ActiveDirectory);
        assert_eq!("openldap".parse::<LdapServerType>().unwrap(), LdapServerType::OpenLdap);
        assert_eq!("389ds".parse::<LdapServerType>().unwrap(), LdapServerType::Directory389);
        assert!("novell".parse::<LdapServerType>().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = RoleBridgeConfig::from_toml(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [ldap]
            server_url = "ldaps://dc.example.com:636"
            server_type = "active_directory"

            [ldap.users]
            base_dn = "ou=people,dc=example,dc=com"
            membership_attribute = "memberOf"

            [ldap.groups]
            base_dn = "ou=groups,dc=example,dc=com"

            [ldap.server]
            range_retrieval_support = true
            range_page_size = 1500
            "#,
        )
        .unwrap();

        assert!(config.logging.is_json());
        assert_eq!(config.ldap.server_type, LdapServerType::ActiveDirectory);
        assert_eq!(config.ldap.users.base_dn, "ou=people,dc=example,dc=com");
        assert_eq!(config.ldap.users.filter, "(uid={username})");
        assert_eq!(config.ldap.groups.membership_attribute, "member");
        assert_eq!(config.ldap.server.range_page_size, 1500);
        assert!(config.ldap.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ldap]\nserver_url = \"ldap://files.example.com\"").unwrap();

        let config = RoleBridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ldap.server_url, "ldap://files.example.com");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            RoleBridgeConfig::from_file("/nonexistent/rolebridge.toml"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RoleBridgeConfig::from_toml("[ldap\nbroken"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ROLEBRIDGE_SERVER_TYPE", "active_directory"),
            ("ROLEBRIDGE_LDAP_URL", "ldaps://dc.corp:636"),
            ("ROLEBRIDGE_GROUP_BASE_DN", "ou=groups,dc=corp"),
            ("ROLEBRIDGE_RANGE_RETRIEVAL", "false"),
            ("ROLEBRIDGE_RANGE_PAGE_SIZE", "250"),
            ("ROLEBRIDGE_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = RoleBridgeConfig::default();
        config.apply_env_with(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.ldap.server_url, "ldaps://dc.corp:636");
        assert_eq!(config.ldap.groups.base_dn, "ou=groups,dc=corp");
        assert_eq!(config.ldap.users.name_attribute, "sAMAccountName");
        // Explicit flag beats the Active Directory preset
        assert!(!config.ldap.server.range_retrieval_support);
        assert_eq!(config.ldap.server.range_page_size, 250);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_env_flag_and_bad_values() {
        let mut config = RoleBridgeConfig::default();
        config.apply_env_with(|key| match key {
            "ROLEBRIDGE_RANGE_RETRIEVAL" => Some("TRUE".to_string()),
            _ => None,
        });
        assert!(config.ldap.server.range_retrieval_support);

        // Unusable values leave the previous settings in place
        config.apply_env_with(|key| match key {
            "ROLEBRIDGE_RANGE_RETRIEVAL" => Some("maybe".to_string()),
            "ROLEBRIDGE_RANGE_PAGE_SIZE" => Some("lots".to_string()),
            _ => None,
        });
        assert!(config.ldap.server.range_retrieval_support);
        assert_eq!(config.ldap.server.range_page_size, DEFAULT_RANGE_PAGE_SIZE);

        assert_eq!(parse_flag(" Off "), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn test_masked_hides_password() {
        let config = LdapConfig {
            bind_password: "secret".to_string(),
            ..Default::default()
        };
        assert_eq!(config.masked().bind_password, "********");
        assert_eq!(LdapConfig::default().masked().bind_password, "");
    }
}
