use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::sqlite::configure_connection;

use super::keywords::KeywordQuery;
use super::models::{Plan, PlanImportRecord};
use super::{PlanError, PlanResult};

const PLAN_SCHEMA: &str = include_str!("../../../sql/plans.sql");

const DEFAULT_KEYWORD_LIMIT: usize = 3;

/// Read access to the plan catalog.
pub trait CatalogStore: Send + Sync {
    /// Every plan, unfiltered.
    fn fetch_all_plans(&self) -> PlanResult<Vec<Plan>>;

    /// Plans pre-filtered by provider, price ceiling and free text, capped to
    /// a small result count.
    fn search_by_keywords(&self, query: &KeywordQuery) -> PlanResult<Vec<Plan>>;
}

#[derive(Debug, Clone)]
pub struct SqlitePlanStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
    keyword_limit: usize,
}

impl Default for SqlitePlanStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
        }
    }
}

impl SqlitePlanStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn keyword_limit(mut self, value: usize) -> Self {
        self.keyword_limit = value.max(1);
        self
    }

    pub fn build(self) -> PlanResult<SqlitePlanStore> {
        let path = self.path.ok_or(PlanError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };

        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        Ok(SqlitePlanStore {
            path,
            flags,
            read_only: self.read_only,
            keyword_limit: self.keyword_limit,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SqlitePlanStore {
    path: PathBuf,
    flags: OpenFlags,
    read_only: bool,
    keyword_limit: usize,
}

impl SqlitePlanStore {
    pub fn builder() -> SqlitePlanStoreBuilder {
        SqlitePlanStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> PlanResult<Self> {
        SqlitePlanStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> PlanResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            PlanError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        if !self.read_only {
            configure_connection(&conn).map_err(|source| PlanError::OpenDatabase {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(conn)
    }

    pub fn initialize(&self) -> PlanResult<()> {
        let conn = self.open()?;
        conn.execute_batch(PLAN_SCHEMA)?;
        Ok(())
    }

    pub fn upsert_plan(&self, plan: &Plan) -> PlanResult<()> {
        let conn = self.open()?;
        write_plan(&conn, plan)?;
        Ok(())
    }

    /// Loads records in one transaction. Existing ids are skipped unless the
    /// record asks to overwrite; records without an id get a fresh one.
    pub fn import(&self, records: &[PlanImportRecord]) -> PlanResult<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for record in records {
            let mut plan = record.plan.clone();
            if plan.id.trim().is_empty() {
                plan.id = format!("plan-{}", Uuid::new_v4().simple());
            }
            let existing = tx
                .query_row(
                    "SELECT id FROM postpaid_plans WHERE id = ?1",
                    [plan.id.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if existing.is_some() && !record.overwrite {
                debug!(target: "catalog", plan = %plan.id, "skipping existing plan");
                continue;
            }
            plan.updated_at = Some(Utc::now());
            write_plan(&tx, &plan)?;
            inserted += 1;
        }
        tx.commit()?;
        info!(target: "catalog", inserted, total = records.len(), "catalog import finished");
        Ok(inserted)
    }

    pub fn import_json(&self, json: &str) -> PlanResult<usize> {
        let records: Vec<PlanImportRecord> = serde_json::from_str(json)?;
        self.import(&records)
    }

    pub fn count(&self) -> PlanResult<usize> {
        let conn = self.open()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM postpaid_plans", [], |row| {
            row.get(0)
        })?;
        Ok(total as usize)
    }
}

impl CatalogStore for SqlitePlanStore {
    fn fetch_all_plans(&self) -> PlanResult<Vec<Plan>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT * FROM postpaid_plans ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| Plan::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(target: "catalog", count = rows.len(), "fetched catalog");
        Ok(rows)
    }

    fn search_by_keywords(&self, query: &KeywordQuery) -> PlanResult<Vec<Plan>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !query.providers.is_empty() {
            let placeholders = query
                .providers
                .iter()
                .map(|provider| {
                    values.push(Value::Text(provider.to_lowercase()));
                    format!("?{}", values.len())
                })
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("lower(provider) IN ({placeholders})"));
        }

        if let Some(max_cost) = query.max_cost {
            values.push(Value::Real(max_cost));
            clauses.push(format!("cost <= ?{}", values.len()));
        }

        if !query.terms.is_empty() {
            let alternatives = query
                .terms
                .iter()
                .map(|term| {
                    values.push(Value::Text(format!("%{term}%")));
                    let idx = values.len();
                    format!(
                        "package_name LIKE ?{idx} OR total_data LIKE ?{idx} \
                         OR local_calls_mins LIKE ?{idx}"
                    )
                })
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({alternatives})"));
        }

        let mut sql = String::from("SELECT * FROM postpaid_plans");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        values.push(Value::Integer(self.keyword_limit as i64));
        sql.push_str(&format!(" ORDER BY rowid ASC LIMIT ?{}", values.len()));

        let conn = self.open()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| Plan::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(target: "catalog", count = rows.len(), "keyword search finished");
        Ok(rows)
    }
}

fn write_plan(conn: &Connection, plan: &Plan) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO postpaid_plans (
            id, provider, package_name, cost, total_data, data_breakdown,
            local_calls_mins, network_calls_mins, local_sms, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            provider = excluded.provider,
            package_name = excluded.package_name,
            cost = excluded.cost,
            total_data = excluded.total_data,
            data_breakdown = excluded.data_breakdown,
            local_calls_mins = excluded.local_calls_mins,
            network_calls_mins = excluded.network_calls_mins,
            local_sms = excluded.local_sms,
            updated_at = excluded.updated_at",
        params![
            &plan.id,
            &plan.provider,
            &plan.package_name,
            plan.cost,
            &plan.total_data,
            &plan.data_breakdown,
            &plan.local_calls_mins,
            &plan.network_calls_mins,
            &plan.local_sms,
            plan.updated_at.map(|dt| dt.naive_utc()),
        ],
    )
}
