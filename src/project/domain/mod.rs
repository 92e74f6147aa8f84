//! Domain model for projects and their owners.

mod error;
mod ids;
mod project;

pub use error::ProjectDomainError;
pub use ids::{ProjectId, UserId};
pub use project::{NewProject, PersistedProjectData, Project, ShortName};
