//! Typed data access for issues, users, labels, and the issue<->label edge.
//!
//! All functions check a connection out of the shared pool, return
//! `anyhow::Result<T>` with typed structs (never raw rows), and signal a
//! read miss as `Ok(None)`. List queries are assembled by appending `AND`
//! clauses with numbered placeholders; arguments are always bound, never
//! interpolated. A filtered listing costs at most two statements: one for
//! the issues, one batch query for their labels.

use crate::db::{Pool, PooledConnection};
use crate::model::{Issue, Label, User};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Type, Connection, ToSql};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::str::FromStr;

const ISSUE_COLUMNS: &str = "i.id, i.title, i.description, i.status, i.priority, i.assignee_id, \
     i.created_at, i.updated_at, i.order_index, \
     u.id, u.name, u.avatar_url";

/// Filter criteria for issue listings.
///
/// Multi-valued fields are OR within themselves and AND across fields; empty
/// vectors contribute nothing. `labels` matches by label name and is
/// satisfied when the issue carries at least one of the named labels.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Vec<String>,
    pub assignee: Option<String>,
    pub priority: Vec<String>,
    pub labels: Vec<String>,
    /// 1-based page; only consulted when `page_size > 0`.
    pub page: i64,
    /// Rows per page; `<= 0` disables pagination.
    pub page_size: i64,
}

/// One whitelisted field assignment for a dynamic issue update.
///
/// `Status` and `Priority` carry raw strings on purpose: the move path
/// forwards client values verbatim and relies on the store CHECK constraint
/// as the backstop.
#[derive(Debug, Clone)]
pub enum IssueUpdate {
    Title(String),
    Description(String),
    Status(String),
    Priority(String),
    Assignee(Option<String>),
    OrderIndex(f64),
    UpdatedAt(DateTime<Utc>),
}

impl IssueUpdate {
    const fn column(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Description(_) => "description",
            Self::Status(_) => "status",
            Self::Priority(_) => "priority",
            Self::Assignee(_) => "assignee_id",
            Self::OrderIndex(_) => "order_index",
            Self::UpdatedAt(_) => "updated_at",
        }
    }

    fn boxed_value(&self) -> Box<dyn ToSql> {
        match self {
            Self::Title(v) | Self::Description(v) | Self::Status(v) | Self::Priority(v) => {
                Box::new(v.clone())
            }
            Self::Assignee(v) => Box::new(v.clone()),
            Self::OrderIndex(v) => Box::new(*v),
            Self::UpdatedAt(v) => Box::new(*v),
        }
    }
}

/// Shared, cloneable handle over the connection pool. The repository is the
/// only writer of persistent state.
#[derive(Clone)]
pub struct Repository {
    pool: Pool,
}

impl Repository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        self.pool.get().context("acquire connection from pool")
    }

    /// Cheap store liveness probe for the health endpoint.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("store ping")?;
        Ok(())
    }

    /// List issues matching the filter, assignee- and label-hydrated,
    /// ordered by `order_index` with `id` as tie-breaker.
    pub fn get_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let conn = self.conn()?;

        let mut sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i \
             LEFT JOIN users u ON u.id = i.assignee_id WHERE 1=1"
        );
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        push_in_clause(&mut sql, &mut values, "i.status", &filter.status);
        if let Some(ref assignee) = filter.assignee {
            values.push(Box::new(assignee.clone()));
            let _ = write!(sql, " AND i.assignee_id = ?{}", values.len());
        }
        push_in_clause(&mut sql, &mut values, "i.priority", &filter.priority);

        // Semi-join keeps one row per issue no matter how many of the named
        // labels it carries.
        if !filter.labels.is_empty() {
            let placeholders = push_values(&mut values, &filter.labels);
            let _ = write!(
                sql,
                " AND EXISTS (SELECT 1 FROM issue_labels il \
                 JOIN labels l ON l.id = il.label_id \
                 WHERE il.issue_id = i.id AND l.name IN ({placeholders}))"
            );
        }

        sql.push_str(" ORDER BY i.order_index ASC, i.id ASC");

        if filter.page_size > 0 {
            let offset = (filter.page.max(1) - 1) * filter.page_size;
            values.push(Box::new(filter.page_size));
            let _ = write!(sql, " LIMIT ?{}", values.len());
            values.push(Box::new(offset));
            let _ = write!(sql, " OFFSET ?{}", values.len());
        }

        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("prepare issue listing query: {sql}"))?;
        let params_ref: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let rows = stmt
            .query_map(params_from_iter(params_ref), row_to_issue)
            .context("execute issue listing query")?;

        let mut issues = Vec::new();
        for row in rows {
            issues.push(row.context("read issue row")?);
        }

        attach_labels(&conn, &mut issues)?;
        Ok(issues)
    }

    /// Fetch one issue, hydrated. Returns `None` when the id is unknown.
    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i \
             LEFT JOIN users u ON u.id = i.assignee_id WHERE i.id = ?1"
        );
        let mut stmt = conn.prepare(&sql).context("prepare get_issue query")?;

        match stmt.query_row(params![id], row_to_issue) {
            Ok(mut issue) => {
                attach_labels(&conn, std::slice::from_mut(&mut issue))?;
                Ok(Some(issue))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context(format!("get_issue for '{id}'")),
        }
    }

    /// Insert a new issue row. A dangling `assignee_id` fails the write via
    /// the foreign-key constraint.
    pub fn create_issue(&self, issue: &Issue) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO issues \
             (id, title, description, status, priority, assignee_id, created_at, updated_at, order_index) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                issue.id,
                issue.title,
                issue.description,
                issue.status.as_str(),
                issue.priority.as_str(),
                issue.assignee_id,
                issue.created_at,
                issue.updated_at,
                issue.order_index,
            ],
        )
        .with_context(|| format!("insert issue '{}'", issue.id))?;
        Ok(())
    }

    /// Apply the given field assignments as a single UPDATE statement.
    ///
    /// An empty update list is a no-op. Zero affected rows is reported as an
    /// error ("issue not found").
    pub fn update_issue(&self, id: &str, updates: &[IssueUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let mut assignments = Vec::with_capacity(updates.len());
        let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(updates.len() + 1);
        for update in updates {
            values.push(update.boxed_value());
            assignments.push(format!("{} = ?{}", update.column(), values.len()));
        }
        values.push(Box::new(id.to_owned()));
        let sql = format!(
            "UPDATE issues SET {} WHERE id = ?{}",
            assignments.join(", "),
            values.len()
        );

        let params_ref: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let affected = conn
            .execute(&sql, params_from_iter(params_ref))
            .with_context(|| format!("update issue '{id}'"))?;
        if affected == 0 {
            bail!("issue not found");
        }
        Ok(())
    }

    /// Replace the issue's label set atomically. Duplicate ids in the input
    /// collapse; input order is irrelevant.
    pub fn update_issue_labels(&self, issue_id: &str, label_ids: &[String]) -> Result<()> {
        let mut conn = self.conn()?;
        let unique: BTreeSet<&str> = label_ids.iter().map(String::as_str).collect();

        let tx = conn
            .transaction()
            .context("begin label replacement transaction")?;
        tx.execute(
            "DELETE FROM issue_labels WHERE issue_id = ?1",
            params![issue_id],
        )
        .with_context(|| format!("clear labels for issue '{issue_id}'"))?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO issue_labels (issue_id, label_id) VALUES (?1, ?2)")
                .context("prepare label insert")?;
            for label_id in unique {
                stmt.execute(params![issue_id, label_id])
                    .with_context(|| format!("attach label '{label_id}' to issue '{issue_id}'"))?;
            }
        }
        tx.commit().context("commit label replacement")
    }

    /// Delete the issue; edges go with it by cascade. Zero affected rows is
    /// reported as an error ("issue not found").
    pub fn delete_issue(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let affected = conn
            .execute("DELETE FROM issues WHERE id = ?1", params![id])
            .with_context(|| format!("delete issue '{id}'"))?;
        if affected == 0 {
            bail!("issue not found");
        }
        Ok(())
    }

    /// Smallest `order_index` in the given column, `None` when the column is
    /// empty. Served by `idx_issues_order`.
    pub fn min_order_index(&self, status: &str) -> Result<Option<f64>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT MIN(order_index) FROM issues WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )
        .with_context(|| format!("min order_index for status '{status}'"))
    }

    pub fn get_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, avatar_url FROM users")
            .context("prepare users listing")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    avatar_url: row.get(2)?,
                })
            })
            .context("execute users listing")?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.context("read user row")?);
        }
        Ok(users)
    }

    pub fn get_labels(&self) -> Result<Vec<Label>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, color FROM labels")
            .context("prepare labels listing")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Label {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                })
            })
            .context("execute labels listing")?;

        let mut labels = Vec::new();
        for row in rows {
            labels.push(row.context("read label row")?);
        }
        Ok(labels)
    }
}

/// Append `AND column IN (?n, ...)` for a non-empty value list.
fn push_in_clause(
    sql: &mut String,
    values: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    items: &[String],
) {
    if items.is_empty() {
        return;
    }
    let placeholders = push_values(values, items);
    let _ = write!(sql, " AND {column} IN ({placeholders})");
}

/// Push each item as a bound value and return its placeholder list.
fn push_values(values: &mut Vec<Box<dyn ToSql>>, items: &[String]) -> String {
    let mut placeholders = Vec::with_capacity(items.len());
    for item in items {
        values.push(Box::new(item.clone()));
        placeholders.push(format!("?{}", values.len()));
    }
    placeholders.join(", ")
}

/// Hydrate `labels` for every issue in one batch query keyed by the id set.
/// Issues without labels keep an empty vector.
fn attach_labels(conn: &Connection, issues: &mut [Issue]) -> Result<()> {
    if issues.is_empty() {
        return Ok(());
    }

    let ids: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
    let placeholders: String = (1..=ids.len())
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT il.issue_id, l.id, l.name, l.color \
         FROM issue_labels il JOIN labels l ON l.id = il.label_id \
         WHERE il.issue_id IN ({placeholders}) \
         ORDER BY il.issue_id, l.name"
    );

    let mut stmt = conn.prepare(&sql).context("prepare label hydration query")?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                Label {
                    id: row.get(1)?,
                    name: row.get(2)?,
                    color: row.get(3)?,
                },
            ))
        })
        .context("execute label hydration query")?;

    let mut by_issue: HashMap<String, Vec<Label>> = HashMap::new();
    for row in rows {
        let (issue_id, label) = row.context("read label hydration row")?;
        by_issue.entry(issue_id).or_default().push(label);
    }

    for issue in issues {
        issue.labels = by_issue.remove(&issue.id).unwrap_or_default();
    }
    Ok(())
}

fn row_to_issue(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    let assignee_id: Option<String> = row.get(5)?;
    let user_id: Option<String> = row.get(9)?;
    let assignee = match (&assignee_id, user_id) {
        (Some(_), Some(id)) => Some(User {
            id,
            name: row.get(10)?,
            avatar_url: row.get(11)?,
        }),
        _ => None,
    };

    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_enum_col(3, &row.get::<_, String>(3)?)?,
        priority: parse_enum_col(4, &row.get::<_, String>(4)?)?,
        assignee_id,
        assignee,
        labels: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        order_index: row.get(8)?,
    })
}

/// Map a CHECK-constrained store string onto its closed enum; a mismatch
/// means the store is corrupt, reported as a conversion failure.
fn parse_enum_col<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    T::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

#[cfg(test)]
mod tests {
    use super::{IssueFilter, IssueUpdate, Repository};
    use crate::config::DatabaseConfig;
    use crate::db::{self, migrations};
    use crate::model::{Issue, Priority, Status};
    use chrono::Utc;
    use rusqlite::params;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_repo() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = DatabaseConfig {
            path: dir.path().join("board.sqlite3"),
            migration_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations"),
            max_open_conns: 4,
            max_idle_conns: 1,
            conn_max_lifetime: Duration::from_secs(300),
        };
        let pool = db::open(&cfg).expect("open pool");
        let conn = pool.get().expect("acquire connection");
        migrations::run(&conn, &cfg.migration_dir).expect("apply migrations");
        (dir, Repository::new(pool))
    }

    fn seed_user(repo: &Repository, id: &str, name: &str) {
        let conn = repo.conn().expect("connection");
        conn.execute(
            "INSERT INTO users (id, name, avatar_url) VALUES (?1, ?2, NULL)",
            params![id, name],
        )
        .expect("seed user");
    }

    fn seed_label(repo: &Repository, id: &str, name: &str) {
        let conn = repo.conn().expect("connection");
        conn.execute(
            "INSERT INTO labels (id, name, color) VALUES (?1, ?2, '#888888')",
            params![id, name],
        )
        .expect("seed label");
    }

    fn issue(id: &str, status: Status, priority: Priority, order_index: f64) -> Issue {
        let now = Utc::now();
        Issue {
            id: id.to_owned(),
            title: format!("Issue {id}"),
            description: String::new(),
            status,
            priority,
            assignee_id: None,
            assignee: None,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
            order_index,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let (_dir, repo) = test_repo();
        seed_user(&repo, "u1", "Ada");

        let mut new_issue = issue("i1", Status::Todo, Priority::High, 0.0);
        new_issue.assignee_id = Some("u1".to_owned());
        repo.create_issue(&new_issue).expect("create issue");

        let fetched = repo
            .get_issue("i1")
            .expect("get issue")
            .expect("issue exists");
        assert_eq!(fetched.title, "Issue i1");
        assert_eq!(fetched.status, Status::Todo);
        assert_eq!(fetched.priority, Priority::High);
        assert_eq!(fetched.assignee_id.as_deref(), Some("u1"));
        assert_eq!(fetched.assignee.as_ref().map(|u| u.name.as_str()), Some("Ada"));
        assert!(fetched.labels.is_empty());
    }

    #[test]
    fn get_issue_returns_none_for_unknown_id() {
        let (_dir, repo) = test_repo();
        assert!(repo.get_issue("missing").expect("query").is_none());
    }

    #[test]
    fn create_with_dangling_assignee_fails() {
        let (_dir, repo) = test_repo();
        let mut bad = issue("i1", Status::Todo, Priority::Low, 0.0);
        bad.assignee_id = Some("ghost".to_owned());
        assert!(repo.create_issue(&bad).is_err());
    }

    #[test]
    fn list_filters_are_intersected() {
        let (_dir, repo) = test_repo();
        repo.create_issue(&issue("a", Status::Todo, Priority::High, 0.0))
            .unwrap();
        repo.create_issue(&issue("b", Status::InProgress, Priority::Medium, 1.0))
            .unwrap();
        repo.create_issue(&issue("c", Status::Done, Priority::High, 2.0))
            .unwrap();

        let filter = IssueFilter {
            status: vec!["Todo".to_owned()],
            priority: vec!["High".to_owned()],
            ..IssueFilter::default()
        };
        let matches = repo.get_issues(&filter).expect("list");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[test]
    fn list_multi_value_filters_union_within_field() {
        let (_dir, repo) = test_repo();
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 0.0))
            .unwrap();
        repo.create_issue(&issue("b", Status::Done, Priority::Low, 1.0))
            .unwrap();
        repo.create_issue(&issue("c", Status::Canceled, Priority::Low, 2.0))
            .unwrap();

        let filter = IssueFilter {
            status: vec!["Todo".to_owned(), "Done".to_owned()],
            ..IssueFilter::default()
        };
        let ids: Vec<_> = repo
            .get_issues(&filter)
            .expect("list")
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn list_filters_by_assignee() {
        let (_dir, repo) = test_repo();
        seed_user(&repo, "u1", "Ada");
        seed_user(&repo, "u2", "Grace");
        let mut a = issue("a", Status::Todo, Priority::Low, 0.0);
        a.assignee_id = Some("u1".to_owned());
        let mut b = issue("b", Status::Todo, Priority::Low, 1.0);
        b.assignee_id = Some("u2".to_owned());
        repo.create_issue(&a).unwrap();
        repo.create_issue(&b).unwrap();

        let filter = IssueFilter {
            assignee: Some("u2".to_owned()),
            ..IssueFilter::default()
        };
        let matches = repo.get_issues(&filter).expect("list");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "b");
        assert_eq!(matches[0].assignee.as_ref().map(|u| u.name.as_str()), Some("Grace"));
    }

    #[test]
    fn label_name_filter_keeps_one_row_per_issue() {
        let (_dir, repo) = test_repo();
        seed_label(&repo, "l1", "bug");
        seed_label(&repo, "l2", "backend");
        seed_label(&repo, "l3", "ui");
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 0.0))
            .unwrap();
        repo.create_issue(&issue("b", Status::Todo, Priority::Low, 1.0))
            .unwrap();
        // "a" carries both requested labels; the semi-join must still yield
        // it exactly once.
        repo.update_issue_labels("a", &["l1".to_owned(), "l2".to_owned()])
            .unwrap();
        repo.update_issue_labels("b", &["l3".to_owned()]).unwrap();

        let filter = IssueFilter {
            labels: vec!["bug".to_owned(), "backend".to_owned()],
            ..IssueFilter::default()
        };
        let matches = repo.get_issues(&filter).expect("list");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
        let names: Vec<_> = matches[0].labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["backend", "bug"]);
    }

    #[test]
    fn list_orders_by_order_index_then_id() {
        let (_dir, repo) = test_repo();
        repo.create_issue(&issue("b", Status::Todo, Priority::Low, 1.0))
            .unwrap();
        repo.create_issue(&issue("c", Status::Todo, Priority::Low, 1.0))
            .unwrap();
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, -1.0))
            .unwrap();

        let ids: Vec<_> = repo
            .get_issues(&IssueFilter::default())
            .expect("list")
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn pagination_applies_only_for_positive_page_size() {
        let (_dir, repo) = test_repo();
        for (id, order) in [("a", 0.0), ("b", 1.0), ("c", 2.0), ("d", 3.0), ("e", 4.0)] {
            repo.create_issue(&issue(id, Status::Todo, Priority::Low, order))
                .unwrap();
        }

        let all = repo
            .get_issues(&IssueFilter {
                page: 3,
                page_size: 0,
                ..IssueFilter::default()
            })
            .expect("list all");
        assert_eq!(all.len(), 5);

        let page2 = repo
            .get_issues(&IssueFilter {
                page: 2,
                page_size: 2,
                ..IssueFilter::default()
            })
            .expect("list page 2");
        let ids: Vec<_> = page2.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn update_applies_fields_and_is_idempotent() {
        let (_dir, repo) = test_repo();
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 0.0))
            .unwrap();

        let stamp = Utc::now();
        let updates = [
            IssueUpdate::Title("Renamed".to_owned()),
            IssueUpdate::Status("Done".to_owned()),
            IssueUpdate::OrderIndex(5.5),
            IssueUpdate::UpdatedAt(stamp),
        ];
        repo.update_issue("a", &updates).expect("first update");
        let first = repo.get_issue("a").unwrap().unwrap();

        repo.update_issue("a", &updates).expect("second update");
        let second = repo.get_issue("a").unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.title, "Renamed");
        assert_eq!(second.status, Status::Done);
        assert_eq!(second.order_index, 5.5);
    }

    #[test]
    fn update_clears_assignee_with_explicit_none() {
        let (_dir, repo) = test_repo();
        seed_user(&repo, "u1", "Ada");
        let mut a = issue("a", Status::Todo, Priority::Low, 0.0);
        a.assignee_id = Some("u1".to_owned());
        repo.create_issue(&a).unwrap();

        repo.update_issue("a", &[IssueUpdate::Assignee(None)])
            .expect("clear assignee");
        let fetched = repo.get_issue("a").unwrap().unwrap();
        assert_eq!(fetched.assignee_id, None);
        assert_eq!(fetched.assignee, None);
    }

    #[test]
    fn update_unknown_id_reports_not_found() {
        let (_dir, repo) = test_repo();
        let err = repo
            .update_issue("ghost", &[IssueUpdate::Title("x".to_owned())])
            .expect_err("must fail");
        assert!(err.to_string().contains("issue not found"));
    }

    #[test]
    fn empty_update_list_is_a_no_op() {
        let (_dir, repo) = test_repo();
        repo.update_issue("ghost", &[]).expect("no-op");
    }

    #[test]
    fn label_replacement_is_a_set_operation() {
        let (_dir, repo) = test_repo();
        seed_label(&repo, "l1", "bug");
        seed_label(&repo, "l2", "backend");
        seed_label(&repo, "l3", "ui");
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 0.0))
            .unwrap();
        repo.update_issue_labels("a", &["l1".to_owned(), "l2".to_owned()])
            .unwrap();

        // Replacement with duplicates collapses to the unique set.
        repo.update_issue_labels(
            "a",
            &["l2".to_owned(), "l3".to_owned(), "l2".to_owned()],
        )
        .expect("replace labels");

        let fetched = repo.get_issue("a").unwrap().unwrap();
        let ids: Vec<_> = fetched.labels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["l2", "l3"]);
    }

    #[test]
    fn label_replacement_rolls_back_on_unknown_label() {
        let (_dir, repo) = test_repo();
        seed_label(&repo, "l1", "bug");
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 0.0))
            .unwrap();
        repo.update_issue_labels("a", &["l1".to_owned()]).unwrap();

        let err = repo
            .update_issue_labels("a", &["ghost".to_owned()])
            .expect_err("unknown label id must fail");
        assert!(format!("{err:#}").contains("ghost"));

        // The failed replacement must not have torn down the old set.
        let fetched = repo.get_issue("a").unwrap().unwrap();
        assert_eq!(fetched.labels.len(), 1);
        assert_eq!(fetched.labels[0].id, "l1");
    }

    #[test]
    fn delete_cascades_label_edges() {
        let (_dir, repo) = test_repo();
        seed_label(&repo, "l1", "bug");
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 0.0))
            .unwrap();
        repo.update_issue_labels("a", &["l1".to_owned()]).unwrap();

        repo.delete_issue("a").expect("delete");
        assert!(repo.get_issue("a").unwrap().is_none());

        let conn = repo.conn().unwrap();
        let edges: i64 = conn
            .query_row(
                "SELECT count(*) FROM issue_labels WHERE issue_id = 'a'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(edges, 0);
    }

    #[test]
    fn delete_unknown_id_reports_not_found() {
        let (_dir, repo) = test_repo();
        let err = repo.delete_issue("ghost").expect_err("must fail");
        assert!(err.to_string().contains("issue not found"));
    }

    #[test]
    fn min_order_index_distinguishes_empty_columns() {
        let (_dir, repo) = test_repo();
        repo.create_issue(&issue("a", Status::Todo, Priority::Low, 2.5))
            .unwrap();
        repo.create_issue(&issue("b", Status::Todo, Priority::Low, -3.0))
            .unwrap();

        assert_eq!(repo.min_order_index("Todo").unwrap(), Some(-3.0));
        assert_eq!(repo.min_order_index("Done").unwrap(), None);
    }

    #[test]
    fn users_and_labels_listings() {
        let (_dir, repo) = test_repo();
        seed_user(&repo, "u1", "Ada");
        seed_label(&repo, "l1", "bug");

        let users = repo.get_users().expect("users");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ada");
        assert_eq!(users[0].avatar_url, None);

        let labels = repo.get_labels().expect("labels");
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].color, "#888888");
    }

    #[test]
    fn ping_succeeds_on_open_store() {
        let (_dir, repo) = test_repo();
        repo.ping().expect("ping");
    }

    // The move contract stores client-computed midpoints verbatim, so the
    // split margin is a property of f64, pinned here: starting from adjacent
    // integers, at least 50 consecutive midpoints stay strictly between
    // their neighbors.
    #[test]
    fn midpoint_splits_stay_strictly_bounded() {
        let mut lo = 0.0f64;
        let mut hi = 1.0f64;
        for split in 0..50 {
            let mid = (lo + hi) / 2.0;
            assert!(lo < mid && mid < hi, "split {split} collapsed: {lo} {mid} {hi}");
            hi = mid;
        }
    }
}
