//! `SQLite` query helpers for the repair ticket store.
//!
//! The list path goes through [`RepairFilter`] → [`FilterQuery`]: each
//! present criterion contributes one predicate fragment and one named
//! binding, fragments are joined with `AND`, and values only ever travel as
//! bound parameters.
//!
//! All functions take a shared `&Connection` reference and return
//! `anyhow::Result<T>` with typed structs (never raw rows).

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row, params};

use super::schema::TICKET_COLUMNS;
use crate::model::ticket::RepairTicket;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Filter criteria for ticket listings.
///
/// All fields are optional and combined with AND semantics. An empty or
/// whitespace-only value counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairFilter {
    /// Exact, case-sensitive status match.
    pub status: Option<String>,
    /// Case-insensitive substring of `assigned_to`; unassigned tickets never match.
    pub assigned_to: Option<String>,
    /// Exact `created_by` match.
    pub created_by: Option<String>,
}

fn criterion(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

impl RepairFilter {
    pub fn status(&self) -> Option<&str> {
        criterion(self.status.as_ref())
    }

    pub fn assigned_to(&self) -> Option<&str> {
        criterion(self.assigned_to.as_ref())
    }

    pub fn created_by(&self) -> Option<&str> {
        criterion(self.created_by.as_ref())
    }

    /// `true` when no criterion is present.
    pub fn is_empty(&self) -> bool {
        self.status().is_none() && self.assigned_to().is_none() && self.created_by().is_none()
    }

    /// Translate the criteria into a parameterized predicate.
    pub fn to_query(&self) -> FilterQuery {
        let mut builder = FilterQueryBuilder::new();
        if let Some(status) = self.status() {
            builder.push("status = :status", ":status", status);
        }
        if let Some(assigned_to) = self.assigned_to() {
            builder.push(
                "assigned_to IS NOT NULL AND contains_ci(assigned_to, :assigned_to)",
                ":assigned_to",
                assigned_to,
            );
        }
        if let Some(created_by) = self.created_by() {
            builder.push("created_by = :created_by", ":created_by", created_by);
        }
        builder.build()
    }

    /// Evaluate the same predicate against an in-process ticket.
    pub fn matches(&self, ticket: &RepairTicket) -> bool {
        if let Some(status) = self.status()
            && ticket.status != status
        {
            return false;
        }
        if let Some(needle) = self.assigned_to() {
            match ticket.assigned_to.as_deref() {
                Some(haystack) if contains_ci(haystack, needle) => {}
                _ => return false,
            }
        }
        if let Some(created_by) = self.created_by()
            && ticket.created_by.as_deref() != Some(created_by)
        {
            return false;
        }
        true
    }
}

/// Case-insensitive substring test shared by the SQL function and
/// [`RepairFilter::matches`].
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Predicate that matches every row.
pub const MATCH_ALL: &str = "1 = 1";

/// A predicate expression plus its named parameter bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    /// Fragments joined with `AND`, or [`MATCH_ALL`] when there are none.
    pub predicate: String,
    /// `(name, value)` pairs in fragment order; names carry the `:` prefix.
    pub bindings: Vec<(String, String)>,
}

impl FilterQuery {
    /// Full `SELECT` over the `repairs` table for this predicate.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {TICKET_COLUMNS} FROM repairs WHERE {} ORDER BY created_at ASC, id ASC",
            self.predicate
        )
    }
}

/// Accumulates `(fragment, binding)` pairs and joins them with `AND`.
#[derive(Debug, Default)]
pub struct FilterQueryBuilder {
    fragments: Vec<String>,
    bindings: Vec<(String, String)>,
}

impl FilterQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fragment that references `name`, bound to `value`.
    pub fn push(&mut self, fragment: &str, name: &str, value: &str) -> &mut Self {
        self.fragments.push(fragment.to_string());
        self.bindings.push((name.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> FilterQuery {
        let predicate = if self.fragments.is_empty() {
            MATCH_ALL.to_string()
        } else {
            self.fragments
                .iter()
                .map(|f| format!("({f})"))
                .collect::<Vec<_>>()
                .join(" AND ")
        };
        FilterQuery {
            predicate,
            bindings: self.bindings,
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 encoding used for the `created_at` column.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored `created_at` value.
///
/// # Errors
///
/// Returns an error if the text is not RFC 3339.
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Core query functions
// ---------------------------------------------------------------------------

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<RepairTicket> {
    let raw_created_at: String = row.get(5)?;
    let created_at = decode_timestamp(&raw_created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(RepairTicket {
        id: row.get(0)?,
        item: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        assigned_to: row.get(4)?,
        created_at,
        created_by: row.get(6)?,
    })
}

/// Insert a fully-built ticket.
///
/// # Errors
///
/// Returns an error if the insert fails, including a duplicate `id`.
pub fn insert_ticket(conn: &Connection, ticket: &RepairTicket) -> Result<()> {
    conn.execute(
        "INSERT INTO repairs (id, item, description, status, assigned_to, created_at, created_by) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ticket.id,
            ticket.item,
            ticket.description,
            ticket.status,
            ticket.assigned_to,
            encode_timestamp(&ticket.created_at),
            ticket.created_by,
        ],
    )
    .with_context(|| format!("insert repair '{}'", ticket.id))?;
    Ok(())
}

/// Fetch a single ticket by exact `id`.
///
/// Returns `None` if the ticket does not exist.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_ticket(conn: &Connection, id: &str) -> Result<Option<RepairTicket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM repairs WHERE id = ?1");
    let mut stmt = conn.prepare(&sql).context("prepare get_ticket query")?;

    match stmt.query_row(params![id], row_to_ticket) {
        Ok(ticket) => Ok(Some(ticket)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context(format!("get_ticket for '{id}'")),
    }
}

/// List tickets matching the filter, oldest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_tickets(conn: &Connection, filter: &RepairFilter) -> Result<Vec<RepairTicket>> {
    let query = filter.to_query();
    let sql = query.select_sql();

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare list_tickets query: {sql}"))?;

    let named: Vec<(&str, &dyn ToSql)> = query
        .bindings
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let rows = stmt
        .query_map(named.as_slice(), row_to_ticket)
        .context("execute list_tickets query")?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row.context("read list_tickets row")?);
    }
    Ok(tickets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
