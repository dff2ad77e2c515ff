//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Catalog-Watch database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per catalog item, keyed by source URL
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL,
    price_excl_tax REAL NOT NULL,
    price_incl_tax REAL NOT NULL,
    availability_raw TEXT NOT NULL,
    availability_count INTEGER NOT NULL CHECK (availability_count >= 0),
    num_reviews INTEGER NOT NULL CHECK (num_reviews >= 0),
    image_url TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 0 AND 5),
    raw_html TEXT NOT NULL,
    crawled_at TEXT NOT NULL,
    status TEXT NOT NULL,
    fingerprint TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_category_price_rating
    ON items(category, price_incl_tax, rating);
CREATE INDEX IF NOT EXISTS idx_items_price ON items(price_incl_tax);
CREATE INDEX IF NOT EXISTS idx_items_rating ON items(rating);

-- Append-only audit log of detected changes
CREATE TABLE IF NOT EXISTS change_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_url TEXT NOT NULL,
    change_type TEXT NOT NULL CHECK (change_type IN ('new', 'updated')),
    detected_at TEXT NOT NULL,
    details TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_log_detected_at ON change_log(detected_at);
CREATE INDEX IF NOT EXISTS idx_change_log_item ON change_log(item_url);

CREATE TRIGGER IF NOT EXISTS change_log_no_update
BEFORE UPDATE ON change_log
BEGIN
    SELECT RAISE(ABORT, 'change_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS change_log_no_delete
BEFORE DELETE ON change_log
BEGIN
    SELECT RAISE(ABORT, 'change_log is append-only');
END;
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
