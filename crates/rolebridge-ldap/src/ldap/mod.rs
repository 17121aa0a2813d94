//! LDAP/Active Directory backend
//!
//! Implements the group and user resolvers on top of `ldap3`:
//! - one bound connection per query, released before the query returns
//! - DN or plain-name group lookups
//! - ranged retrieval of large membership attributes

mod client;

pub use client::LdapDirectory;
