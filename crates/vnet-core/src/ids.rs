//! Identifier types for store resources.
//!
//! The resource store generates an opaque id for every row it creates. The ids
//! are unique within their type tag only, so each kind gets its own newtype and
//! the compiler keeps a `DomainId` from being passed where a `PortId` is due.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier string was empty or only whitespace.
    #[error("identifier is empty")]
    Empty,
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wrap a store-issued id.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Empty` if the id is empty.
            pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(IdError::Empty);
                }
                Ok(Self(id))
            }

            /// Return the id as the store knows it.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id! {
    /// Identifier of a switch definition (`compute.vswitch`).
    ///
    /// The same value names the switch's networking scope once it runs, and
    /// the mux reports the switch's connection under this id.
    SwitchId
}

opaque_id! {
    /// Identifier of a running switch instance (`compute.server`).
    RunId
}

opaque_id! {
    /// Identifier of an associate network.
    NetworkId
}

opaque_id! {
    /// Identifier of a subnet.
    SubnetId
}

opaque_id! {
    /// Identifier of a domain.
    DomainId
}

opaque_id! {
    /// Identifier of a GRE or VLAN port.
    ///
    /// GRE and VLAN ports live under different type tags, so a `PortId` is only
    /// meaningful together with the port kind it was issued for.
    PortId
}

opaque_id! {
    /// Identifier of a host NAT rule.
    NatId
}
