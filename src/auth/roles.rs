// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roles and the compact role claim embedded in tokens.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Named capability.
///
/// ## Well-known roles
///
/// - `ADMIN` - super-user, passes every role gate
/// - `RDF` - access to the genomics modules
/// - `SIGNIN` - may obtain tokens at all
///
/// Other names are allowed; they are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("ADMIN"));
    pub const RDF: Role = Role(Cow::Borrowed("RDF"));
    pub const SIGNIN: Role = Role(Cow::Borrowed("SIGNIN"));

    pub fn new(name: &str) -> Self {
        Role(Cow::Owned(name.trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::ADMIN
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::new(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0.into_owned()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user's role set, carried in tokens as a sorted, space-separated string
/// (`"ADMIN RDF SIGNIN"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleClaim(BTreeSet<Role>);

impl RoleClaim {
    pub fn new<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        RoleClaim(roles.into_iter().filter(|r| !r.as_str().is_empty()).collect())
    }

    pub fn parse(encoded: &str) -> Self {
        RoleClaim::new(encoded.split_whitespace().map(Role::new))
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.contains(&Role::ADMIN)
    }

    /// True when any of `required` is held. `ADMIN` bypasses the check.
    pub fn permits(&self, required: &[Role]) -> bool {
        self.is_admin() || required.iter().any(|r| self.contains(r))
    }

    pub fn can_sign_in(&self) -> bool {
        self.permits(&[Role::SIGNIN])
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for RoleClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for role in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(role.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for RoleClaim {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoleClaim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Ok(RoleClaim::parse(&encoded))
    }
}
