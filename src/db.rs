use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{CatalogError, CommandResult};
use crate::types::{CategoryCandidate, CategoryFix, CategoryRow, InventoryItem, ItemDraft};
use crate::util::path_display;

const ITEM_COLUMNS: &str = "id, name, category, imageurl, comment";

pub(crate) fn table_has_column(
    connection: &Connection,
    table: &str,
    column: &str,
) -> CommandResult<bool> {
    let mut statement = connection
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|error| {
            CatalogError::storage(format!("Could not inspect table schema for '{table}'"), error)
        })?;

    let rows = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| {
            CatalogError::storage(format!("Could not iterate schema for '{table}'"), error)
        })?;

    for row in rows {
        if row.map_err(|error| {
            CatalogError::storage(format!("Could not parse schema row for '{table}'"), error)
        })? == column
        {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Adds columns that older inventory databases were created without.
pub(crate) fn ensure_inventory_schema(connection: &Connection) -> CommandResult<()> {
    for column in ["imageurl", "comment"] {
        if !table_has_column(connection, "inventory", column)? {
            tracing::info!(column, "Migrating inventory table: adding missing column");
            connection
                .execute(&format!("ALTER TABLE inventory ADD COLUMN {column} TEXT"), [])
                .map_err(|error| {
                    CatalogError::storage(format!("Could not add inventory.{column}"), error)
                })?;
        }
    }

    connection
        .execute_batch("CREATE INDEX IF NOT EXISTS idx_inventory_category ON inventory(category, id);")
        .map_err(|error| CatalogError::storage("Could not create inventory category index", error))?;

    Ok(())
}

pub(crate) fn open_database(db_path: &Path) -> CommandResult<Connection> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|error| {
            CatalogError::io(
                format!("Could not create data dir '{}'", path_display(parent)),
                error,
            )
        })?;
    }

    let connection = Connection::open(db_path).map_err(|error| {
        CatalogError::storage(
            format!("Could not open database '{}'", path_display(db_path)),
            error,
        )
    })?;

    connection
        .query_row("PRAGMA journal_mode = WAL", [], |row| {
            row.get::<_, String>(0)
        })
        .map_err(|error| CatalogError::storage("Could not set journal mode", error))?;
    connection
        .busy_timeout(Duration::from_secs(5))
        .map_err(|error| CatalogError::storage("Could not set busy timeout", error))?;

    connection
        .execute_batch(
            "
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS inventory (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              category TEXT NOT NULL,
              imageurl TEXT,
              comment TEXT
            );
            ",
        )
        .map_err(|error| CatalogError::storage("Could not initialize inventory database", error))?;

    ensure_inventory_schema(&connection)?;

    Ok(connection)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        imageurl: row.get(3)?,
        comment: row.get(4)?,
    })
}

fn query_items(
    connection: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    context: &str,
) -> CommandResult<Vec<InventoryItem>> {
    let mut statement = connection
        .prepare(sql)
        .map_err(|error| CatalogError::storage(format!("Could not prepare {context} query"), error))?;
    let rows = statement
        .query_map(params, item_from_row)
        .map_err(|error| CatalogError::storage(format!("Could not read {context}"), error))?;

    let mut items = Vec::new();
    for row in rows {
        items.push(
            row.map_err(|error| CatalogError::storage(format!("Could not parse {context} row"), error))?,
        );
    }
    Ok(items)
}

pub(crate) fn list_items(connection: &Connection) -> CommandResult<Vec<InventoryItem>> {
    query_items(
        connection,
        &format!("SELECT {ITEM_COLUMNS} FROM inventory ORDER BY category ASC, id ASC"),
        [],
        "inventory",
    )
}

pub(crate) fn list_items_in_category(
    connection: &Connection,
    category: &str,
) -> CommandResult<Vec<InventoryItem>> {
    query_items(
        connection,
        &format!("SELECT {ITEM_COLUMNS} FROM inventory WHERE category = ?1 ORDER BY name ASC, id ASC"),
        params![category],
        "category items",
    )
}

pub(crate) fn get_item(connection: &Connection, id: i64) -> CommandResult<Option<InventoryItem>> {
    connection
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM inventory WHERE id = ?1"),
            params![id],
            item_from_row,
        )
        .optional()
        .map_err(|error| CatalogError::storage(format!("Could not query item {id}"), error))
}

pub(crate) fn insert_item(connection: &Connection, draft: &ItemDraft) -> CommandResult<i64> {
    connection
        .execute(
            "INSERT INTO inventory(name, category, imageurl, comment) VALUES(?1, ?2, ?3, ?4)",
            params![draft.name, draft.category, draft.imageurl, draft.comment],
        )
        .map_err(|error| {
            CatalogError::storage(format!("Could not insert item '{}'", draft.name), error)
        })?;
    Ok(connection.last_insert_rowid())
}

/// Inserts every draft with one cached statement. Callers wrap this in a
/// transaction so a failure leaves nothing behind.
pub(crate) fn insert_items(connection: &Connection, drafts: &[ItemDraft]) -> CommandResult<usize> {
    let mut statement = connection
        .prepare_cached(
            "INSERT INTO inventory(name, category, imageurl, comment) VALUES(?1, ?2, ?3, ?4)",
        )
        .map_err(|error| CatalogError::storage("Could not prepare item insert", error))?;

    let mut inserted = 0;
    for draft in drafts {
        inserted += statement
            .execute(params![draft.name, draft.category, draft.imageurl, draft.comment])
            .map_err(|error| {
                CatalogError::storage(format!("Could not insert item '{}'", draft.name), error)
            })?;
    }
    Ok(inserted)
}

pub(crate) fn update_item(
    connection: &Connection,
    id: i64,
    draft: &ItemDraft,
) -> CommandResult<usize> {
    connection
        .execute(
            "UPDATE inventory SET name = ?1, category = ?2, imageurl = ?3, comment = ?4 WHERE id = ?5",
            params![draft.name, draft.category, draft.imageurl, draft.comment, id],
        )
        .map_err(|error| CatalogError::storage(format!("Could not update item {id}"), error))
}

pub(crate) fn delete_item(connection: &Connection, id: i64) -> CommandResult<usize> {
    connection
        .execute("DELETE FROM inventory WHERE id = ?1", params![id])
        .map_err(|error| CatalogError::storage(format!("Could not delete item {id}"), error))
}

/// Distinct categories, each with the first non-empty image and comment found
/// among its items in id order.
pub(crate) fn load_category_candidates(
    connection: &Connection,
) -> CommandResult<Vec<CategoryCandidate>> {
    let mut statement = connection
        .prepare(
            "
            SELECT
              c.category,
              (
                SELECT i.imageurl FROM inventory i
                WHERE i.category = c.category AND COALESCE(i.imageurl, '') <> ''
                ORDER BY i.id ASC LIMIT 1
              ),
              (
                SELECT i.comment FROM inventory i
                WHERE i.category = c.category AND COALESCE(i.comment, '') <> ''
                ORDER BY i.id ASC LIMIT 1
              )
            FROM (SELECT DISTINCT category FROM inventory) c
            ORDER BY c.category ASC
            ",
        )
        .map_err(|error| CatalogError::storage("Could not prepare category query", error))?;

    let rows = statement
        .query_map([], |row| {
            Ok(CategoryCandidate {
                category: row.get(0)?,
                imageurl: row.get(1)?,
                comment: row.get(2)?,
            })
        })
        .map_err(|error| CatalogError::storage("Could not read categories", error))?;

    let mut candidates = Vec::new();
    for row in rows {
        candidates
            .push(row.map_err(|error| CatalogError::storage("Could not parse category row", error))?);
    }
    Ok(candidates)
}

pub(crate) fn load_category_rows(connection: &Connection) -> CommandResult<Vec<CategoryRow>> {
    let mut statement = connection
        .prepare("SELECT id, category, name FROM inventory ORDER BY id ASC")
        .map_err(|error| CatalogError::storage("Could not prepare inventory row query", error))?;

    let rows = statement
        .query_map([], |row| {
            Ok(CategoryRow {
                id: row.get(0)?,
                category: row.get(1)?,
                name: row.get(2)?,
            })
        })
        .map_err(|error| CatalogError::storage("Could not read inventory rows", error))?;

    let mut loaded = Vec::new();
    for row in rows {
        loaded.push(row.map_err(|error| CatalogError::storage("Could not parse inventory row", error))?);
    }
    Ok(loaded)
}

pub(crate) fn apply_category_fixes(
    connection: &Connection,
    fixes: &[CategoryFix],
) -> CommandResult<usize> {
    let mut statement = connection
        .prepare_cached("UPDATE inventory SET category = ?1, name = ?2 WHERE id = ?3")
        .map_err(|error| CatalogError::storage("Could not prepare category fix", error))?;

    let mut updated = 0;
    for fix in fixes {
        updated += statement
            .execute(params![fix.category, fix.name, fix.id])
            .map_err(|error| {
                CatalogError::storage(format!("Could not clean category of item {}", fix.id), error)
            })?;
    }
    Ok(updated)
}
