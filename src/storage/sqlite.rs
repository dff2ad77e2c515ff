//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::changes::{ChangeDetails, ChangeEntry, ChangeKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{format_timestamp, parse_timestamp, ItemQuery, ItemRecord, StoredItem};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const ITEM_COLUMNS: &str = "id, url, title, description, category, price_excl_tax, price_incl_tax,
     availability_raw, availability_count, num_reviews, image_url, rating, raw_html,
     crawled_at, status, fingerprint";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<StoredItem> {
    let crawled_at: String = row.get(13)?;
    let crawled_at = parse_timestamp(&crawled_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e)))?;

    Ok(StoredItem {
        id: row.get(0)?,
        record: ItemRecord {
            url: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            category: row.get(4)?,
            price_excl_tax: row.get(5)?,
            price_incl_tax: row.get(6)?,
            availability_raw: row.get(7)?,
            availability_count: row.get(8)?,
            num_reviews: row.get(9)?,
            image_url: row.get(10)?,
            rating: row.get(11)?,
            raw_html: row.get(12)?,
            crawled_at,
            status: row.get(14)?,
        },
        fingerprint: row.get(15)?,
    })
}

fn upsert_item_on(conn: &Connection, item: &ItemRecord, fingerprint: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO items (url, title, description, category, price_excl_tax, price_incl_tax,
         availability_raw, availability_count, num_reviews, image_url, rating, raw_html,
         crawled_at, status, fingerprint)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(url) DO UPDATE SET
             title = excluded.title,
             description = excluded.description,
             category = excluded.category,
             price_excl_tax = excluded.price_excl_tax,
             price_incl_tax = excluded.price_incl_tax,
             availability_raw = excluded.availability_raw,
             availability_count = excluded.availability_count,
             num_reviews = excluded.num_reviews,
             image_url = excluded.image_url,
             rating = excluded.rating,
             raw_html = excluded.raw_html,
             crawled_at = excluded.crawled_at,
             status = excluded.status,
             fingerprint = excluded.fingerprint",
        params![
            item.url,
            item.title,
            item.description,
            item.category,
            item.price_excl_tax,
            item.price_incl_tax,
            item.availability_raw,
            item.availability_count,
            item.num_reviews,
            item.image_url,
            item.rating,
            item.raw_html,
            format_timestamp(&item.crawled_at),
            item.status,
            fingerprint,
        ],
    )?;
    Ok(())
}

fn insert_change_on(conn: &Connection, entry: &ChangeEntry) -> StorageResult<i64> {
    let details = entry.details.to_json()?;
    conn.execute(
        "INSERT INTO change_log (item_url, change_type, detected_at, details) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.item_url,
            entry.kind.to_db_string(),
            format_timestamp(&entry.detected_at),
            details
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Storage for SqliteStorage {
    // ===== Items =====

    fn find_by_key(&self, url: &str) -> StorageResult<Option<StoredItem>> {
        let sql = format!("SELECT {} FROM items WHERE url = ?1", ITEM_COLUMNS);
        let item = self
            .conn
            .query_row(&sql, params![url], item_from_row)
            .optional()?;
        Ok(item)
    }

    fn upsert_item(&mut self, item: &ItemRecord, fingerprint: &str) -> StorageResult<()> {
        upsert_item_on(&self.conn, item, fingerprint)
    }

    fn record_item(
        &mut self,
        item: &ItemRecord,
        fingerprint: &str,
        change: Option<&ChangeEntry>,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        upsert_item_on(&tx, item, fingerprint)?;
        if let Some(entry) = change {
            insert_change_on(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_items(&self, query: &ItemQuery) -> StorageResult<Vec<ItemRecord>> {
        query.validate()?;

        let mut sql = format!("SELECT {} FROM items WHERE 1 = 1", ITEM_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(category) = &query.category {
            sql.push_str(" AND category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(min_price) = query.min_price {
            sql.push_str(" AND price_incl_tax >= ?");
            values.push(Value::Real(min_price));
        }
        if let Some(max_price) = query.max_price {
            sql.push_str(" AND price_incl_tax <= ?");
            values.push(Value::Real(max_price));
        }
        if let Some(rating) = query.rating {
            sql.push_str(" AND rating = ?");
            values.push(Value::Integer(i64::from(rating)));
        }

        sql.push_str(&format!(
            " ORDER BY {} DESC, id ASC LIMIT ? OFFSET ?",
            query.sort_by.column()
        ));
        values.push(Value::Integer(i64::from(query.size)));
        values.push(Value::Integer(query.offset() as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), item_from_row)?
            .map(|row| row.map(|stored| stored.record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Change Log =====

    fn append_change(&mut self, entry: &ChangeEntry) -> StorageResult<i64> {
        insert_change_on(&self.conn, entry)
    }

    fn list_changes_since(
        &self,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<ChangeEntry>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT item_url, change_type, detected_at, details FROM change_log
             WHERE detected_at >= ?1
             ORDER BY detected_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![format_timestamp(&since), limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(item_url, change_type, detected_at, details)| {
                let kind = ChangeKind::from_db_string(&change_type).ok_or_else(|| {
                    StorageError::Serialization(format!("unknown change type '{}'", change_type))
                })?;
                Ok(ChangeEntry {
                    item_url,
                    kind,
                    detected_at: parse_timestamp(&detected_at)?,
                    details: ChangeDetails::from_json(kind, &details)?,
                })
            })
            .collect()
    }

    fn count_changes(&self, kind: ChangeKind) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM change_log WHERE change_type = ?1",
            params![kind.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
