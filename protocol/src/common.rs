use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier of a call document, assigned by the store when the document is created.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Wrap String into a `CallId` `struct`
    #[must_use]
    pub const fn new(inner: String) -> Self {
        Self(inner)
    }

    /// Return reference to the underlying string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Acquire the underlying type
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for CallId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl Display for CallId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the call a participant plays.
///
/// The phone initiates the call and publishes the offer,
/// the dispatcher joins an existing call and publishes the answer.
/// Each role only ever writes the document field named after it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Initiating participant, owner of the `phone` field.
    Phone,
    /// Answering participant, owner of the `dispatcher` field.
    Dispatcher,
}

impl Role {
    /// The role on the other end of the call.
    #[must_use]
    pub const fn remote(self) -> Self {
        match self {
            Self::Phone => Self::Dispatcher,
            Self::Dispatcher => Self::Phone,
        }
    }

    /// Name of the document field this role writes to.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Dispatcher => "dispatcher",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(Self::Phone),
            "dispatcher" => Ok(Self::Dispatcher),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
