//! Local accounts and their sending identities.

use crate::participant::{addresses_match, strip_mailto};

/// A sending identity of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    /// Preferred From address; may be unset for identities without one.
    pub from_address: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>, from_address: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            from_address: Some(from_address.into()),
        }
    }
}

/// A local account as seen by the participant matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    /// Primary address.
    pub name: String,
    pub aliases: Vec<String>,
    /// Addresses the account may send as without owning them.
    pub allow_from: Vec<String>,
    /// The first identity is the default one.
    pub identities: Vec<Identity>,
}

impl Account {
    /// Account with a single default identity sending from `address`.
    #[must_use]
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            id: id.into(),
            identities: vec![Identity::new("default", address.clone())],
            name: address,
            aliases: Vec::new(),
            allow_from: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Every address the account owns or may send as.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .chain(self.allow_from.iter().map(String::as_str))
            .chain(
                self.identities
                    .iter()
                    .filter_map(|i| i.from_address.as_deref()),
            )
    }

    #[must_use]
    pub fn owns_address(&self, address: &str) -> bool {
        let address = strip_mailto(address);
        self.addresses().any(|own| addresses_match(own, address))
    }

    #[must_use]
    pub fn default_identity(&self) -> Option<&Identity> {
        self.identities.first()
    }

    /// ## Summary
    /// Looks up an identity by id.
    ///
    /// An unknown id falls back to the default identity with a warning;
    /// `None` selects the default identity directly.
    #[must_use]
    pub fn identity(&self, identity_id: Option<&str>) -> Option<&Identity> {
        let Some(wanted) = identity_id else {
            return self.default_identity();
        };
        self.identities.iter().find(|i| i.id == wanted).or_else(|| {
            tracing::warn!(
                account = %self.name,
                identity = %wanted,
                "No such identity; using the default identity"
            );
            self.default_identity()
        })
    }
}

/// Resolves calendar user addresses to local accounts.
pub trait AccountDirectory {
    /// Account owning `address`, if it is local.
    fn lookup_account(&self, address: &str) -> Option<Account>;
}

impl AccountDirectory for [Account] {
    fn lookup_account(&self, address: &str) -> Option<Account> {
        self.iter().find(|a| a.owns_address(address)).cloned()
    }
}

impl AccountDirectory for Vec<Account> {
    fn lookup_account(&self, address: &str) -> Option<Account> {
        self.as_slice().lookup_account(address)
    }
}
