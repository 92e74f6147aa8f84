//! Project aggregate and ownership rules.

use super::{ProjectDomainError, ProjectId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// URL-safe project short name used in export artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortName(String);

impl ShortName {
    /// Creates a validated short name.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectDomainError::EmptyShortName`] for blank input and
    /// [`ProjectDomainError::InvalidShortName`] when the value contains
    /// characters other than ASCII letters, digits, `-` or `_`.
    pub fn new(value: impl Into<String>) -> Result<Self, ProjectDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProjectDomainError::EmptyShortName);
        }
        let is_valid = trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(ProjectDomainError::InvalidShortName(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the short name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated data for a project that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    short_name: ShortName,
    name: String,
    owner_id: UserId,
    owners_ids: Vec<UserId>,
    created_at: DateTime<Utc>,
}

impl NewProject {
    /// Creates a new project owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectDomainError`] when the short name or name is invalid.
    pub fn new(
        short_name: impl Into<String>,
        name: impl Into<String>,
        owner_id: UserId,
        clock: &impl Clock,
    ) -> Result<Self, ProjectDomainError> {
        let short_name = ShortName::new(short_name)?;
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ProjectDomainError::EmptyName);
        }
        Ok(Self {
            short_name,
            name,
            owner_id,
            owners_ids: vec![owner_id],
            created_at: clock.utc(),
        })
    }

    /// Adds co-owners; the owner stays first and duplicates are dropped.
    #[must_use]
    pub fn with_coowners(mut self, coowners: impl IntoIterator<Item = UserId>) -> Self {
        let current = std::mem::take(&mut self.owners_ids);
        self.owners_ids = normalize_owners(self.owner_id, current.into_iter().chain(coowners));
        self
    }

    /// Returns the short name.
    #[must_use]
    pub const fn short_name(&self) -> &ShortName {
        &self.short_name
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns owner and co-owner ids, owner first.
    #[must_use]
    pub fn owners_ids(&self) -> &[UserId] {
        &self.owners_ids
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Attaches the store-assigned identifier.
    #[must_use]
    pub fn into_project(self, id: ProjectId) -> Project {
        Project {
            id,
            short_name: self.short_name,
            name: self.name,
            owner_id: self.owner_id,
            owners_ids: self.owners_ids,
            created_at: self.created_at,
        }
    }
}

/// Project aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    short_name: ShortName,
    name: String,
    owner_id: UserId,
    owners_ids: Vec<UserId>,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProjectData {
    /// Persisted identifier.
    pub id: ProjectId,
    /// Persisted short name.
    pub short_name: ShortName,
    /// Persisted display name.
    pub name: String,
    /// Persisted owner.
    pub owner_id: UserId,
    /// Persisted owner and co-owner list.
    pub owners_ids: Vec<UserId>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Reconstructs a project from storage, restoring the owner invariant
    /// if the stored list lost it.
    #[must_use]
    pub fn from_persisted(data: PersistedProjectData) -> Self {
        Self {
            id: data.id,
            short_name: data.short_name,
            name: data.name,
            owner_id: data.owner_id,
            owners_ids: normalize_owners(data.owner_id, data.owners_ids),
            created_at: data.created_at,
        }
    }

    /// Returns the project identifier.
    #[must_use]
    pub const fn id(&self) -> ProjectId {
        self.id
    }

    /// Returns the short name.
    #[must_use]
    pub const fn short_name(&self) -> &ShortName {
        &self.short_name
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns owner and co-owner ids, owner first.
    #[must_use]
    pub fn owners_ids(&self) -> &[UserId] {
        &self.owners_ids
    }

    /// Returns `true` when `user` is the owner or a co-owner.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owners_ids.contains(&user)
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replaces the co-owner list; the owner is always kept.
    pub fn set_coowners(&mut self, coowners: impl IntoIterator<Item = UserId>) {
        self.owners_ids = normalize_owners(self.owner_id, coowners);
    }
}

fn normalize_owners(owner: UserId, others: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut owners = vec![owner];
    for user in others {
        if !owners.contains(&user) {
            owners.push(user);
        }
    }
    owners
}
