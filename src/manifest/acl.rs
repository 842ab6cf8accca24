//! ACL Resolution
//!
//! Decides which canned ACL an uploaded object receives.
//!
//! The precedence here is deliberately inverted compared to most tools: a
//! manifest-level ACL overrides whatever an individual entry asks for.
//! Changing it changes what ends up publicly readable, so any change must be
//! an explicit product decision and must update the tests below.

/// Canned ACL applied when neither the manifest nor the entry names one.
pub const DEFAULT_ACL: &str = "private";

/// Named precedence rules for combining manifest and entry ACLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AclPrecedence {
    /// Manifest ACL wins, then entry ACL, then [`DEFAULT_ACL`].
    #[default]
    GlobalOverridesEntry,
}

impl AclPrecedence {
    pub fn resolve(self, entry_acl: Option<&str>, global_acl: Option<&str>) -> String {
        fn non_empty(acl: Option<&str>) -> Option<&str> {
            acl.map(str::trim).filter(|a| !a.is_empty())
        }

        match self {
            AclPrecedence::GlobalOverridesEntry => non_empty(global_acl)
                .or_else(|| non_empty(entry_acl))
                .unwrap_or(DEFAULT_ACL)
                .to_string(),
        }
    }
}

/// Effective ACL for an entry under [`AclPrecedence::GlobalOverridesEntry`].
pub fn resolve_acl(entry_acl: Option<&str>, global_acl: Option<&str>) -> String {
    AclPrecedence::GlobalOverridesEntry.resolve(entry_acl, global_acl)
}
