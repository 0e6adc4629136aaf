//! Verified identities and the optional profile attributes that come with them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A person as vouched for by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable provider-assigned identifier (an ORCID iD such as `0000-0002-1825-0097`).
    pub id: IdentityId,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: IdentityId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Provider-assigned identity key. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return Err(TypesError::InvalidIdentity(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for IdentityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Best-effort profile attributes used to pre-fill the endorsement form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
    /// Every employment on the provider record, in provider order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub employments: Vec<Employment>,
}

impl ProfileHint {
    /// Build a hint, dropping blank values.
    pub fn new(job_title: Option<String>, employer: Option<String>) -> Self {
        Self {
            job_title: non_blank(job_title),
            employer: non_blank(employer),
            employments: Vec::new(),
        }
    }

    pub fn with_employments(mut self, employments: Vec<Employment>) -> Self {
        self.employments = employments;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.job_title.is_none() && self.employer.is_none() && self.employments.is_empty()
    }
}

/// One employment entry as listed by the identity provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employment {
    #[serde(default)]
    pub role_title: Option<String>,
    #[serde(default)]
    pub organization: Organization,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Employment {
    /// Build an entry, dropping blank values.
    pub fn new(
        role_title: Option<String>,
        name: Option<String>,
        city: Option<String>,
        country: Option<String>,
    ) -> Self {
        Self {
            role_title: non_blank(role_title),
            organization: Organization {
                name: non_blank(name),
                city: non_blank(city),
                country: non_blank(country),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.role_title.is_none()
            && self.organization.name.is_none()
            && self.organization.city.is_none()
            && self.organization.country.is_none()
    }

    /// The pre-fill values this entry offers.
    pub fn hint(&self) -> ProfileHint {
        ProfileHint::new(self.role_title.clone(), self.organization.name.clone())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
