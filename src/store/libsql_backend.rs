//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Filters from the query
//! contract are translated to parameterised SQL; nothing user-supplied is
//! ever interpolated into the statement text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::applications::model::{
    ApplicantInfo, ApplicationPatch, ApplicationStatus, JobApplication, StoredApplication,
    TimelineItem, iso,
};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    Database, Direction, Field, Filter, FilterOp, FilterValue, OrderBy,
};

/// Column list shared by every application SELECT. `row_to_application`
/// reads by position, so keep the two in sync.
const APPLICATION_COLUMNS: &str = "id, user_id, job_id, applicant_name, applicant_phone, \
     applicant_email, applicant_cv_url, company_name, role, location, status, is_internship, \
     date_applied, date_interview, date_action, date_rejected, date_offer, timeline, unsured";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
///
/// A transaction on the shared connection would also capture any statement
/// another task issues while it is open, so every write holds `write_lock`.
/// Reads do not take it and may observe a batch before it commits.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    /// Run a SELECT over `job_applications` and strictly parse every row.
    async fn select_applications(
        &self,
        sql: &str,
        values: Vec<libsql::Value>,
        context: &str,
    ) -> Result<Vec<StoredApplication>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, libsql::params_from_iter(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("{context}: {e}")))?;

        let mut applications = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_application(&row) {
                    Ok(app) => applications.push(app),
                    Err(e) => warn!("Skipping invalid job application row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{context}: {e}"))),
            }
        }
        Ok(applications)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Column backing a queryable field.
fn column(field: Field) -> &'static str {
    match field {
        Field::UserId => "user_id",
        Field::JobId => "job_id",
        Field::CompanyName => "company_name",
        Field::ApplicantEmail => "applicant_email",
        Field::Role => "role",
        Field::Location => "location",
        Field::Status => "status",
        Field::DateApplied => "date_applied",
    }
}

/// Translate filters into a WHERE clause and its positional parameters.
fn build_where(filters: &[Filter]) -> Result<(String, Vec<libsql::Value>), DatabaseError> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut values = Vec::new();

    for filter in filters {
        let col = column(filter.field);
        match (filter.op, &filter.value) {
            (FilterOp::In, FilterValue::List(items)) => {
                if items.is_empty() {
                    // `x IN ()` matches nothing.
                    clauses.push("0".to_string());
                    continue;
                }
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| {
                        values.push(libsql::Value::Text(item.clone()));
                        format!("?{}", values.len())
                    })
                    .collect();
                clauses.push(format!("{col} IN ({})", placeholders.join(", ")));
            }
            (op, FilterValue::Text(value)) => {
                let symbol = match op {
                    FilterOp::Eq | FilterOp::In => "=",
                    FilterOp::Gte => ">=",
                    FilterOp::Lte => "<=",
                };
                values.push(libsql::Value::Text(value.clone()));
                clauses.push(format!("{col} {symbol} ?{}", values.len()));
            }
            (op, FilterValue::List(_)) => {
                return Err(DatabaseError::Query(format!(
                    "operator {op:?} on {} does not accept a list",
                    filter.field.path()
                )));
            }
        }
    }

    if clauses.is_empty() {
        Ok((String::new(), values))
    } else {
        Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
    }
}

fn order_clause(order_by: Option<OrderBy>) -> String {
    match order_by {
        Some(order) => {
            let dir = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!(" ORDER BY {} {dir}", column(order.field))
        }
        None => String::new(),
    }
}

/// Build the UPDATE statement for one patch. Returns `None` for an empty patch.
fn update_statement(
    id: &str,
    patch: &ApplicationPatch,
) -> Result<Option<(String, Vec<libsql::Value>)>, DatabaseError> {
    if patch.is_empty() {
        return Ok(None);
    }

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<libsql::Value> = Vec::new();
    let mut push = |col: &str, value: libsql::Value| {
        values.push(value);
        sets.push(format!("{col} = ?{}", values.len()));
    };

    if let Some(status) = patch.status {
        push("status", libsql::Value::Text(status.as_str().to_string()));
    }
    if let Some(ref timeline) = patch.timeline {
        let json = serde_json::to_string(timeline)
            .map_err(|e| DatabaseError::Serialization(format!("timeline: {e}")))?;
        push("timeline", libsql::Value::Text(json));
    }
    if let Some(ref d) = patch.date_interview {
        push("date_interview", libsql::Value::Text(d.clone()));
    }
    if let Some(ref d) = patch.date_action {
        push("date_action", libsql::Value::Text(d.clone()));
    }
    if let Some(ref d) = patch.date_rejected {
        push("date_rejected", libsql::Value::Text(d.clone()));
    }
    if let Some(ref d) = patch.date_offer {
        push("date_offer", libsql::Value::Text(d.clone()));
    }
    if let Some(unsured) = patch.unsured {
        push("unsured", libsql::Value::Integer(i64::from(unsured)));
    }
    push("updated_at", libsql::Value::Text(iso(Utc::now())));

    values.push(libsql::Value::Text(id.to_string()));
    let sql = format!(
        "UPDATE job_applications SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );
    Ok(Some((sql, values)))
}

/// Map a libsql Row to a `StoredApplication`.
///
/// Column order matches `APPLICATION_COLUMNS`. Any missing required column,
/// unknown status, or malformed timeline rejects the whole row.
fn row_to_application(row: &libsql::Row) -> Result<StoredApplication, String> {
    let text = |idx: i32, name: &str| -> Result<String, String> {
        row.get::<String>(idx)
            .map_err(|e| format!("column {name}: {e}"))
    };

    let id = text(0, "id")?;
    let status_str = text(10, "status")?;
    let status: ApplicationStatus = status_str
        .parse()
        .map_err(|e| format!("record {id}: {e}"))?;
    let timeline_str = text(17, "timeline")?;
    let timeline: Vec<TimelineItem> = serde_json::from_str(&timeline_str)
        .map_err(|e| format!("record {id}: malformed timeline: {e}"))?;
    let is_internship: i64 = row
        .get(11)
        .map_err(|e| format!("record {id}: column is_internship: {e}"))?;

    Ok(StoredApplication {
        application: JobApplication {
            user_id: text(1, "user_id")?,
            job_id: row.get::<String>(2).ok(),
            applicant_info: ApplicantInfo {
                name: text(3, "applicant_name")?,
                phone_number: text(4, "applicant_phone")?,
                email: text(5, "applicant_email")?,
                cv_url: text(6, "applicant_cv_url")?,
            },
            company_name: text(7, "company_name")?,
            role: text(8, "role")?,
            location: text(9, "location")?,
            status,
            is_internship: is_internship != 0,
            date_applied: text(12, "date_applied")?,
            date_interview: row.get::<String>(13).ok(),
            date_action: row.get::<String>(14).ok(),
            date_rejected: row.get::<String>(15).ok(),
            date_offer: row.get::<String>(16).ok(),
            timeline,
            unsured: row.get::<i64>(18).ok().map(|v| v != 0),
        },
        id,
    })
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.init_schema().await
    }

    async fn query_applications(
        &self,
        filters: &[Filter],
        order_by: Option<OrderBy>,
    ) -> Result<Vec<StoredApplication>, DatabaseError> {
        let (where_clause, values) = build_where(filters)?;
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications{where_clause}{}",
            order_clause(order_by)
        );
        debug!(sql = %sql, "query_applications");
        self.select_applications(&sql, values, "query_applications")
            .await
    }

    async fn get_applications(
        &self,
        ids: &[String],
    ) -> Result<Vec<StoredApplication>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id IN ({})",
            placeholders.join(", ")
        );
        let values = ids
            .iter()
            .map(|id| libsql::Value::Text(id.clone()))
            .collect();
        self.select_applications(&sql, values, "get_applications")
            .await
    }

    async fn create_application(
        &self,
        application: &JobApplication,
    ) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = iso(Utc::now());
        let timeline = serde_json::to_string(&application.timeline)
            .map_err(|e| DatabaseError::Serialization(format!("timeline: {e}")))?;

        let _guard = self.write_lock.lock().await;
        self.conn()
            .execute(
                "INSERT INTO job_applications (id, user_id, job_id, applicant_name,
                    applicant_phone, applicant_email, applicant_cv_url, company_name, role,
                    location, status, is_internship, date_applied, date_interview, date_action,
                    date_rejected, date_offer, timeline, unsured, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20, ?20)",
                params![
                    id.clone(),
                    application.user_id.clone(),
                    opt_text(application.job_id.as_deref()),
                    application.applicant_info.name.clone(),
                    application.applicant_info.phone_number.clone(),
                    application.applicant_info.email.clone(),
                    application.applicant_info.cv_url.clone(),
                    application.company_name.clone(),
                    application.role.clone(),
                    application.location.clone(),
                    application.status.as_str(),
                    i64::from(application.is_internship),
                    application.date_applied.clone(),
                    opt_text(application.date_interview.as_deref()),
                    opt_text(application.date_action.as_deref()),
                    opt_text(application.date_rejected.as_deref()),
                    opt_text(application.date_offer.as_deref()),
                    timeline,
                    match application.unsured {
                        Some(u) => libsql::Value::Integer(i64::from(u)),
                        None => libsql::Value::Null,
                    },
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_application: {e}")))?;

        debug!(id = %id, company = %application.company_name, "Job application inserted");
        Ok(id)
    }

    async fn update_application(
        &self,
        id: &str,
        patch: &ApplicationPatch,
    ) -> Result<(), DatabaseError> {
        let Some((sql, values)) = update_statement(id, patch)? else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("update_application: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "job_application".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn batch_update_applications(
        &self,
        updates: &[(String, ApplicationPatch)],
    ) -> Result<(), DatabaseError> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut statements = Vec::with_capacity(updates.len());
        for (id, patch) in updates {
            if let Some(stmt) = update_statement(id, patch)? {
                statements.push((id.as_str(), stmt));
            }
        }

        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;

        for (id, (sql, values)) in statements {
            let failure = match tx.execute(&sql, libsql::params_from_iter(values)).await {
                Ok(0) => Some(DatabaseError::NotFound {
                    entity: "job_application".into(),
                    id: id.to_string(),
                }),
                Ok(_) => None,
                Err(e) => Some(DatabaseError::Transaction(format!("update {id}: {e}"))),
            };
            if let Some(err) = failure {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Rollback of batch update failed");
                }
                return Err(err);
            }
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))?;
        debug!(count = updates.len(), "Batch update committed");
        Ok(())
    }

    async fn link_account(&self, email: &str, user_id: &str) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        self.conn()
            .execute(
                "INSERT INTO linked_accounts (email, user_id) VALUES (?1, ?2)
                 ON CONFLICT(email) DO UPDATE SET user_id = excluded.user_id",
                params![email, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("link_account: {e}")))?;
        Ok(())
    }

    async fn linked_emails(&self, user_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT email FROM linked_accounts WHERE user_id = ?1 ORDER BY email",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("linked_emails: {e}")))?;

        let mut emails = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("linked_emails: {e}")))?
        {
            let email: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
            emails.push(email);
        }
        Ok(emails)
    }
}
