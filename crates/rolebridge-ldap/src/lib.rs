//! Directory-backed role resolution for RoleBridge
//!
//! Answers role queries (does a role exist, is a user in it, which roles
//! does a user hold, who is in a role) against an LDAP directory, with
//! ranged attribute retrieval for servers that cap multi-valued attributes.

pub mod dn;
pub mod ldap;
pub mod roles;

pub use ldap::LdapDirectory;
pub use roles::{
    DirectMemberRetrieval, GroupEntryResolver, MemberRetrieval, RangeSource, RangedMemberRetrieval,
    RangedRetrieval, RoleAdapter, RoleSettings, UserEntryResolver,
};
