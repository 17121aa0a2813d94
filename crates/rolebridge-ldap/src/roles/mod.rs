//! Role resolution
//!
//! [`RoleAdapter`] answers role queries through two narrow resolver
//! contracts, so it runs the same against a live directory or in-memory
//! fakes. How a role's members are gathered is a [`MemberRetrieval`]
//! strategy picked once from the server's range retrieval capability.

mod adapter;
mod range;
mod resolver;
mod retrieval;

#[cfg(test)]
pub(crate) mod fakes;

pub use adapter::{RoleAdapter, RoleSettings};
pub use range::{RangeBounds, RangeSource, RangedRetrieval};
pub use resolver::{GroupEntryResolver, UserEntryResolver};
pub use retrieval::{strategy_for, DirectMemberRetrieval, MemberRetrieval, RangedMemberRetrieval};
