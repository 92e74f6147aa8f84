//! `PostgreSQL` repository implementation for projects.

use super::{
    models::{NewProjectRow, ProjectRow},
    schema::project,
};
use crate::project::{
    domain::{NewProject, PersistedProjectData, Project, ProjectId, ShortName, UserId},
    ports::{ProjectRepository, ProjectRepositoryError, ProjectRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by project adapters.
pub type ProjectPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed project repository.
#[derive(Debug, Clone)]
pub struct PostgresProjectRepository {
    pool: ProjectPgPool,
}

impl PostgresProjectRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ProjectPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ProjectRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ProjectRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ProjectRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ProjectRepositoryError::persistence)?
    }
}

#[async_trait]
impl ProjectRepository for PostgresProjectRepository {
    async fn create(&self, new_project: &NewProject) -> ProjectRepositoryResult<Project> {
        let short_name = new_project.short_name().clone();
        let row = NewProjectRow {
            short_name: short_name.as_str().to_owned(),
            name: new_project.name().to_owned(),
            owner_id: new_project.owner_id().value(),
            owners_ids: new_project
                .owners_ids()
                .iter()
                .map(|user| user.value())
                .collect(),
            created: new_project.created_at(),
        };

        self.run_blocking(move |connection| {
            let stored = diesel::insert_into(project::table)
                .values(&row)
                .returning(ProjectRow::as_returning())
                .get_result::<ProjectRow>(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ProjectRepositoryError::DuplicateShortName(short_name.clone())
                    }
                    _ => ProjectRepositoryError::persistence(err),
                })?;
            row_to_project(stored)
        })
        .await
    }

    async fn update(&self, updated: &Project) -> ProjectRepositoryResult<()> {
        let id = updated.id();
        let name = updated.name().to_owned();
        let owners: Vec<i64> = updated.owners_ids().iter().map(|user| user.value()).collect();

        self.run_blocking(move |connection| {
            let affected = diesel::update(project::table.filter(project::id.eq(id.value())))
                .set((project::name.eq(name), project::owners_ids.eq(owners)))
                .execute(connection)
                .map_err(ProjectRepositoryError::persistence)?;
            if affected == 0 {
                return Err(ProjectRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: ProjectId) -> ProjectRepositoryResult<Option<Project>> {
        self.run_blocking(move |connection| {
            project::table
                .filter(project::id.eq(id.value()))
                .select(ProjectRow::as_select())
                .first::<ProjectRow>(connection)
                .optional()
                .map_err(ProjectRepositoryError::persistence)?
                .map(row_to_project)
                .transpose()
        })
        .await
    }

    async fn find_by_short_name(
        &self,
        short_name: &ShortName,
    ) -> ProjectRepositoryResult<Option<Project>> {
        let lookup = short_name.as_str().to_owned();
        self.run_blocking(move |connection| {
            project::table
                .filter(project::short_name.eq(lookup))
                .select(ProjectRow::as_select())
                .first::<ProjectRow>(connection)
                .optional()
                .map_err(ProjectRepositoryError::persistence)?
                .map(row_to_project)
                .transpose()
        })
        .await
    }
}

fn row_to_project(row: ProjectRow) -> ProjectRepositoryResult<Project> {
    let ProjectRow {
        id,
        short_name,
        name,
        owner_id,
        owners_ids,
        created,
    } = row;
    let short_name = ShortName::new(short_name).map_err(ProjectRepositoryError::persistence)?;
    Ok(Project::from_persisted(PersistedProjectData {
        id: ProjectId::new(id),
        short_name,
        name,
        owner_id: UserId::new(owner_id),
        owners_ids: owners_ids.into_iter().map(UserId::new).collect(),
        created_at: created,
    }))
}
