//! In-memory repository for projects.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::project::{
    domain::{NewProject, Project, ProjectId, ShortName},
    ports::{ProjectRepository, ProjectRepositoryError, ProjectRepositoryResult},
};

/// Thread-safe in-memory project repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectRepository {
    state: Arc<RwLock<InMemoryProjectState>>,
}

#[derive(Debug, Default)]
struct InMemoryProjectState {
    last_id: i64,
    projects: HashMap<ProjectId, Project>,
    short_name_index: HashMap<ShortName, ProjectId>,
}

impl InMemoryProjectRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> ProjectRepositoryError {
    ProjectRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn create(&self, project: &NewProject) -> ProjectRepositoryResult<Project> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.short_name_index.contains_key(project.short_name()) {
            return Err(ProjectRepositoryError::DuplicateShortName(
                project.short_name().clone(),
            ));
        }

        state.last_id += 1;
        let id = ProjectId::new(state.last_id);
        let stored = project.clone().into_project(id);
        state
            .short_name_index
            .insert(stored.short_name().clone(), id);
        state.projects.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, project: &Project) -> ProjectRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let stored = state
            .projects
            .get_mut(&project.id())
            .ok_or(ProjectRepositoryError::NotFound(project.id()))?;
        *stored = project.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: ProjectId) -> ProjectRepositoryResult<Option<Project>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.projects.get(&id).cloned())
    }

    async fn find_by_short_name(
        &self,
        short_name: &ShortName,
    ) -> ProjectRepositoryResult<Option<Project>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .short_name_index
            .get(short_name)
            .and_then(|id| state.projects.get(id))
            .cloned())
    }
}
