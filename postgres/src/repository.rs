//! `PostgreSQL` implementation of [`EventRepository`].

use chrono::{DateTime, Utc};
use rally_core::repository::{EventRepository, MembershipChange, RepositoryError, RepositoryFuture};
use rally_core::{AttendeeSet, Event, EventId, EventPatch, EventQuery, SortOrder, TimeWindow, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;
use uuid::Uuid;

/// Event columns plus the attendee set in join order.
const SELECT_EVENT: &str = r"
    SELECT e.id, e.name, e.description, e.date, e.location, e.category,
           e.owner_id, e.image, e.created_at, e.updated_at,
           ARRAY(
               SELECT a.user_id FROM event_attendees a
               WHERE a.event_id = e.id
               ORDER BY a.seq
           ) AS attendees
    FROM events e
";

/// `PostgreSQL` event repository.
///
/// Membership changes are single statements against the `event_attendees`
/// join table. Its primary key makes concurrent duplicate joins collapse into
/// one row, and `rows_affected` tells whether this call changed anything.
#[derive(Clone, Debug)]
pub struct PostgresEventRepository {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
}

impl PostgresEventRepository {
    /// Create a repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] if the database cannot be reached.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Unavailable(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Cheap connectivity check for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns the mapped sqlx error if the round trip fails.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load(&self, id: EventId) -> Result<Event, RepositoryError> {
        let sql = format!("{SELECT_EVENT} WHERE e.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?
            .ok_or(RepositoryError::NotFound(id))?;

        event_from_row(&row)
    }

    async fn change_membership(
        &self,
        operation: &'static str,
        statement: &'static str,
        id: EventId,
        user_id: UserId,
    ) -> Result<MembershipChange, RepositoryError> {
        let result = sqlx::query(statement)
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let changed = result.rows_affected() > 0;
        let event = self.load(id).await?;

        tracing::debug!(event_id = %id, user_id = %user_id, operation, changed, "Membership statement applied");
        Ok(MembershipChange { event, changed })
    }
}

/// Insert the pair if the event exists; touch `updated_at` only when a row
/// was actually inserted.
const ADD_ATTENDEE: &str = r"
    WITH inserted AS (
        INSERT INTO event_attendees (event_id, user_id)
        SELECT id, $2 FROM events WHERE id = $1
        ON CONFLICT (event_id, user_id) DO NOTHING
        RETURNING event_id
    )
    UPDATE events SET updated_at = now()
    WHERE id IN (SELECT event_id FROM inserted)
";

const REMOVE_ATTENDEE: &str = r"
    WITH removed AS (
        DELETE FROM event_attendees
        WHERE event_id = $1 AND user_id = $2
        RETURNING event_id
    )
    UPDATE events SET updated_at = now()
    WHERE id IN (SELECT event_id FROM removed)
";

impl EventRepository for PostgresEventRepository {
    fn create(&self, event: Event) -> RepositoryFuture<'_, EventId> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO events
                    (id, name, description, date, location, category,
                     owner_id, image, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(event.id.as_uuid())
            .bind(&event.name)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.location)
            .bind(&event.category)
            .bind(event.owner.as_uuid())
            .bind(event.image.as_deref())
            .bind(event.created_at)
            .bind(event.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return RepositoryError::Database(format!(
                            "Event {} already exists",
                            event.id
                        ));
                    }
                }
                map_sqlx_error("create", e)
            })?;

            Ok(event.id)
        })
    }

    fn find_by_id(&self, id: EventId) -> RepositoryFuture<'_, Event> {
        Box::pin(self.load(id))
    }

    fn find_all(&self, query: EventQuery, now: DateTime<Utc>) -> RepositoryFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let mut builder = QueryBuilder::<Postgres>::new(SELECT_EVENT);
            push_filters(&mut builder, &query, now);

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_all", e))?;

            rows.iter().map(event_from_row).collect()
        })
    }

    fn replace_fields(
        &self,
        id: EventId,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> RepositoryFuture<'_, Event> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE events SET
                    name = COALESCE($2, name),
                    description = COALESCE($3, description),
                    date = COALESCE($4, date),
                    location = COALESCE($5, location),
                    category = COALESCE($6, category),
                    image = COALESCE($7, image),
                    updated_at = $8
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .bind(patch.name.as_deref().map(str::trim))
            .bind(patch.description.as_deref().map(str::trim))
            .bind(patch.date)
            .bind(patch.location.as_deref().map(str::trim))
            .bind(patch.category.as_deref().map(str::trim))
            .bind(patch.image.as_deref().map(str::trim))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("replace_fields", e))?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(id));
            }

            self.load(id).await
        })
    }

    fn delete(&self, id: EventId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("delete", e))?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(id));
            }
            Ok(())
        })
    }

    fn add_attendee(&self, id: EventId, user_id: UserId) -> RepositoryFuture<'_, MembershipChange> {
        Box::pin(self.change_membership("add_attendee", ADD_ATTENDEE, id, user_id))
    }

    fn remove_attendee(
        &self,
        id: EventId,
        user_id: UserId,
    ) -> RepositoryFuture<'_, MembershipChange> {
        Box::pin(self.change_membership("remove_attendee", REMOVE_ATTENDEE, id, user_id))
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &EventQuery, now: DateTime<Utc>) {
    builder.push(" WHERE TRUE");

    if let Some(category) = query.category() {
        builder.push(" AND e.category = ").push_bind(category.to_string());
    }

    match query.when {
        Some(TimeWindow::Upcoming) => {
            builder.push(" AND e.date >= ").push_bind(now);
        }
        Some(TimeWindow::Past) => {
            builder.push(" AND e.date < ").push_bind(now);
        }
        None => {}
    }

    if let Some(term) = query.search_term() {
        builder
            .push(" AND strpos(lower(e.name), ")
            .push_bind(term)
            .push(") > 0");
    }

    builder.push(match query.sort {
        SortOrder::Newest => " ORDER BY e.date DESC, e.created_at DESC, e.id ASC",
        SortOrder::Oldest => " ORDER BY e.date ASC, e.created_at ASC, e.id ASC",
        SortOrder::Popular => {
            " ORDER BY (SELECT count(*) FROM event_attendees a WHERE a.event_id = e.id) DESC, \
             e.date DESC, e.id ASC"
        }
    });
}

fn event_from_row(row: &PgRow) -> Result<Event, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Serialization(format!("Failed to decode event row: {e}"));

    let attendees: Vec<Uuid> = row.try_get("attendees").map_err(decode)?;

    Ok(Event {
        id: EventId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        date: row.try_get("date").map_err(decode)?,
        location: row.try_get("location").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        owner: UserId::from_uuid(row.try_get("owner_id").map_err(decode)?),
        image: row.try_get("image").map_err(decode)?,
        attendees: attendees.into_iter().map(UserId::from_uuid).collect::<AttendeeSet>(),
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

/// Transport-level failures are transient; everything else is not.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    let message = format!("{operation}: {err}");
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            tracing::warn!(operation, error = %message, "Database unavailable");
            RepositoryError::Unavailable(message)
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => RepositoryError::Serialization(message),
        _ => {
            tracing::error!(operation, error = %message, "Database error");
            RepositoryError::Database(message)
        }
    }
}
