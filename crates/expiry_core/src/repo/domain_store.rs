//! Domain store contract and SQLite-backed implementation.
//!
//! # Responsibility
//! - Bulk-read expiring role/group memberships inside a time window.
//! - Resolve a domain's administrator audience and a resource's tags.
//! - Provide the minimal write surface used to seed and maintain domains.
//!
//! # Invariants
//! - Only memberships with a non-null expiration are ever listed.
//! - A row that cannot be decoded is logged and skipped; it never fails the
//!   listing.
//! - Administrators are the admin role members not yet expired at `now`.
//! - `put_collection` replaces members and tags in a single transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::membership::{
    is_valid_principal_name, Collection, CollectionKind, MembershipRecord,
};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default name of the role whose members administer a domain.
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

const REQUIRED_TABLES: &[&str] = &[
    "domains",
    "collections",
    "collection_members",
    "collection_tags",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for domain reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(String),
    InvalidData(String),
    Validation(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl RepoError {
    /// Whether the failure is transient store unavailability.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_transient())
    }

    /// Whether the failure concerns one stored row rather than the store.
    fn is_row_decode(&self) -> bool {
        match self {
            Self::InvalidData(_) => true,
            Self::Db(DbError::Sqlite(err)) => matches!(
                err,
                rusqlite::Error::InvalidColumnType(..)
                    | rusqlite::Error::FromSqlConversionFailure(..)
                    | rusqlite::Error::IntegralValueOutOfRange(..)
            ),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidData(message) => write!(f, "invalid persisted store data: {message}"),
            Self::Validation(message) => write!(f, "invalid store input: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store connection is not migrated: expected schema {expected_version}, found {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "store table missing: {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Half-open expiration window `[from_ms, until_ms)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub from_ms: i64,
    pub until_ms: i64,
}

impl ExpiryWindow {
    pub fn contains(&self, expiration_ms: i64) -> bool {
        expiration_ms >= self.from_ms && expiration_ms < self.until_ms
    }
}

/// Read contract consumed by the notification engine.
pub trait DomainStore {
    /// Lists memberships of `kind` whose expiration falls inside `window`,
    /// ordered by domain, collection, expiration and member name.
    fn list_expiring_members(
        &self,
        kind: CollectionKind,
        domain_filter: Option<&str>,
        window: &ExpiryWindow,
    ) -> RepoResult<Vec<MembershipRecord>>;

    /// Returns the administrator principals of `domain_name` whose own
    /// membership has not expired at `now_ms`, or `None` when the domain or
    /// its administrator role does not exist.
    fn get_administrators(
        &self,
        domain_name: &str,
        now_ms: i64,
    ) -> RepoResult<Option<Vec<String>>>;

    /// Returns the tag map of one role or group; empty when it has none.
    fn get_resource_tags(
        &self,
        domain_name: &str,
        kind: CollectionKind,
        name: &str,
    ) -> RepoResult<BTreeMap<String, Vec<String>>>;
}

impl<T: DomainStore + ?Sized> DomainStore for &T {
    fn list_expiring_members(
        &self,
        kind: CollectionKind,
        domain_filter: Option<&str>,
        window: &ExpiryWindow,
    ) -> RepoResult<Vec<MembershipRecord>> {
        (**self).list_expiring_members(kind, domain_filter, window)
    }

    fn get_administrators(
        &self,
        domain_name: &str,
        now_ms: i64,
    ) -> RepoResult<Option<Vec<String>>> {
        (**self).get_administrators(domain_name, now_ms)
    }

    fn get_resource_tags(
        &self,
        domain_name: &str,
        kind: CollectionKind,
        name: &str,
    ) -> RepoResult<BTreeMap<String, Vec<String>>> {
        (**self).get_resource_tags(domain_name, kind, name)
    }
}

/// SQLite-backed domain store.
pub struct SqliteDomainStore<'conn> {
    conn: &'conn Connection,
    admin_role: String,
}

impl<'conn> SqliteDomainStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self {
            conn,
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
        })
    }

    /// Overrides the administrator role name used by `get_administrators`.
    pub fn with_admin_role(mut self, admin_role: impl Into<String>) -> Self {
        self.admin_role = admin_role.into();
        self
    }

    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    /// Creates a domain together with its administrator role.
    pub fn create_domain(&self, domain_name: &str, admins: &[String]) -> RepoResult<()> {
        require_name(domain_name, "domain name")?;
        for admin in admins {
            require_principal(admin)?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if domain_exists(&tx, domain_name)? {
            return Err(RepoError::Validation(format!(
                "domain {domain_name} already exists"
            )));
        }
        tx.execute("INSERT INTO domains (name) VALUES (?1);", [domain_name])?;
        let role_id = upsert_collection(&tx, domain_name, CollectionKind::Role, &self.admin_role)?;
        for admin in admins {
            tx.execute(
                "INSERT OR REPLACE INTO collection_members (collection_id, member_name, expiration)
                 VALUES (?1, ?2, NULL);",
                params![role_id, admin],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Creates or fully replaces one role or group, including members and tags.
    pub fn put_collection(&self, collection: &Collection) -> RepoResult<()> {
        require_name(&collection.name, "collection name")?;
        for member in &collection.members {
            require_principal(&member.name)?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !domain_exists(&tx, &collection.domain_name)? {
            return Err(RepoError::NotFound(format!(
                "domain {}",
                collection.domain_name
            )));
        }

        let collection_id = upsert_collection(
            &tx,
            &collection.domain_name,
            collection.kind,
            &collection.name,
        )?;
        tx.execute(
            "DELETE FROM collection_members WHERE collection_id = ?1;",
            [collection_id],
        )?;
        tx.execute(
            "DELETE FROM collection_tags WHERE collection_id = ?1;",
            [collection_id],
        )?;

        for member in &collection.members {
            tx.execute(
                "INSERT OR REPLACE INTO collection_members (collection_id, member_name, expiration)
                 VALUES (?1, ?2, ?3);",
                params![collection_id, member.name, member.expiration_ms],
            )?;
        }
        for (key, values) in &collection.tags {
            for (position, value) in values.iter().enumerate() {
                tx.execute(
                    "INSERT INTO collection_tags (collection_id, tag_key, position, tag_value)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![collection_id, key, position as i64, value],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Deletes a domain and, by cascade, all of its roles and groups.
    pub fn delete_domain(&self, domain_name: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM domains WHERE name = ?1;", [domain_name])?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("domain {domain_name}")));
        }
        Ok(())
    }
}

impl DomainStore for SqliteDomainStore<'_> {
    fn list_expiring_members(
        &self,
        kind: CollectionKind,
        domain_filter: Option<&str>,
        window: &ExpiryWindow,
    ) -> RepoResult<Vec<MembershipRecord>> {
        let mut sql = String::from(
            "SELECT
                c.domain_name,
                c.kind,
                c.name,
                m.member_name,
                m.expiration
             FROM collection_members m
             INNER JOIN collections c ON c.id = m.collection_id
             WHERE c.kind = ?
               AND m.expiration IS NOT NULL
               AND m.expiration >= ?
               AND m.expiration < ?",
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Text(kind.as_str().to_string()),
            Value::Integer(window.from_ms),
            Value::Integer(window.until_ms),
        ];

        if let Some(domain_name) = domain_filter {
            sql.push_str(" AND c.domain_name = ?");
            bind_values.push(Value::Text(domain_name.to_string()));
        }
        sql.push_str(
            " ORDER BY c.domain_name ASC, c.name ASC, m.expiration ASC, m.member_name ASC",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            match parse_membership_row(row) {
                Ok(record) => records.push(record),
                Err(err) if err.is_row_decode() => {
                    warn!(
                        "event=expiry_record module=repo status=skip kind={} error={}",
                        kind, err
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    fn get_administrators(
        &self,
        domain_name: &str,
        now_ms: i64,
    ) -> RepoResult<Option<Vec<String>>> {
        let role_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id
                 FROM collections
                 WHERE domain_name = ?1 AND kind = 'role' AND name = ?2;",
                params![domain_name, self.admin_role],
                |row| row.get(0),
            )
            .optional()?;
        let Some(role_id) = role_id else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT member_name
             FROM collection_members
             WHERE collection_id = ?1
               AND (expiration IS NULL OR expiration >= ?2)
             ORDER BY member_name ASC;",
        )?;
        let admins = stmt
            .query_map(params![role_id, now_ms], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(admins))
    }

    fn get_resource_tags(
        &self,
        domain_name: &str,
        kind: CollectionKind,
        name: &str,
    ) -> RepoResult<BTreeMap<String, Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.tag_key, t.tag_value
             FROM collection_tags t
             INNER JOIN collections c ON c.id = t.collection_id
             WHERE c.domain_name = ?1 AND c.kind = ?2 AND c.name = ?3
             ORDER BY t.tag_key ASC, t.position ASC;",
        )?;
        let mut rows = stmt.query(params![domain_name, kind.as_str(), name])?;
        let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get("tag_key")?;
            let value: String = row.get("tag_value")?;
            tags.entry(key).or_default().push(value);
        }
        Ok(tags)
    }
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<MembershipRecord> {
    let kind_text: String = row.get("kind")?;
    let kind = CollectionKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid collection kind `{kind_text}` in collections.kind"
        ))
    })?;

    Ok(MembershipRecord {
        domain_name: row.get("domain_name")?,
        kind,
        collection_name: row.get("name")?,
        member_name: row.get("member_name")?,
        expiration_ms: row.get("expiration")?,
    })
}

fn upsert_collection(
    tx: &Transaction<'_>,
    domain_name: &str,
    kind: CollectionKind,
    name: &str,
) -> RepoResult<i64> {
    tx.execute(
        "INSERT INTO collections (domain_name, kind, name)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (domain_name, kind, name)
         DO UPDATE SET updated_at = (strftime('%s', 'now') * 1000);",
        params![domain_name, kind.as_str(), name],
    )?;
    let id = tx.query_row(
        "SELECT id FROM collections WHERE domain_name = ?1 AND kind = ?2 AND name = ?3;",
        params![domain_name, kind.as_str(), name],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn domain_exists(tx: &Transaction<'_>, domain_name: &str) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM domains WHERE name = ?1);",
        [domain_name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn require_name(value: &str, what: &str) -> RepoResult<()> {
    if value.trim().is_empty() {
        return Err(RepoError::Validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

fn require_principal(value: &str) -> RepoResult<()> {
    if !is_valid_principal_name(value) {
        return Err(RepoError::Validation(format!(
            "invalid principal name `{value}`"
        )));
    }
    Ok(())
}

fn ensure_store_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
