use rusqlite::{Connection, TransactionBehavior};

use crate::db::{apply_category_fixes, load_category_rows};
use crate::error::{CatalogError, CommandResult};
use crate::types::{CategoryFix, CategoryRow};
use crate::util::{join_category, split_category};

/// Returns the cleaned `(category, name)` pair for one stored row.
///
/// Segments are trimmed and empty ones dropped, consecutive duplicates are
/// collapsed, and a trailing segment equal to the item name is removed as long
/// as another segment remains. Comparisons ignore case; the first spelling of
/// a duplicated segment is kept.
pub(crate) fn clean_category(category: &str, name: &str) -> (String, String) {
    let name = name.trim();
    let mut segments: Vec<&str> = Vec::new();
    for segment in split_category(category) {
        let repeats_previous = segments
            .last()
            .map(|previous| previous.to_lowercase() == segment.to_lowercase())
            .unwrap_or(false);
        if !repeats_previous {
            segments.push(segment);
        }
    }

    let ends_with_name = !name.is_empty()
        && segments.len() > 1
        && segments
            .last()
            .map(|last| last.to_lowercase() == name.to_lowercase())
            .unwrap_or(false);
    if ends_with_name {
        segments.pop();
    }

    (join_category(&segments), name.to_string())
}

pub(crate) fn plan_fixes(rows: &[CategoryRow]) -> Vec<CategoryFix> {
    rows.iter()
        .filter(|row| !row.category.trim().is_empty())
        .filter_map(|row| {
            let (category, name) = clean_category(&row.category, &row.name);
            if category == row.category && name == row.name {
                return None;
            }
            Some(CategoryFix {
                id: row.id,
                category,
                name,
            })
        })
        .collect()
}

/// Cleans every stored row inside one immediate transaction and returns the
/// number of rows rewritten. Any failure rolls the whole run back.
pub(crate) fn sanitize_inventory(connection: &mut Connection) -> CommandResult<usize> {
    let transaction = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|error| CatalogError::storage("Could not start sanitize transaction", error))?;

    let rows = load_category_rows(&transaction)?;
    let fixes = plan_fixes(&rows);
    if fixes.is_empty() {
        tracing::debug!(scanned = rows.len(), "Inventory already clean");
        return Ok(0);
    }

    let updated = apply_category_fixes(&transaction, &fixes)?;
    transaction
        .commit()
        .map_err(|error| CatalogError::storage("Could not commit sanitize transaction", error))?;

    tracing::info!(scanned = rows.len(), updated, "Sanitized inventory categories");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::{clean_category, plan_fixes, sanitize_inventory};
    use crate::db::{insert_item, list_items, open_database};
    use crate::types::{CategoryRow, ItemDraft};

    fn row(id: i64, category: &str, name: &str) -> CategoryRow {
        CategoryRow {
            id,
            category: category.to_string(),
            name: name.to_string(),
        }
    }

    fn draft(name: &str, category: &str) -> ItemDraft {
        ItemDraft {
            name: name.to_string(),
            category: category.to_string(),
            imageurl: None,
            comment: None,
        }
    }

    #[test]
    fn collapses_duplicate_tail_and_name() {
        assert_eq!(
            clean_category("Phones > iPhone > iPhone", "iPhone"),
            ("Phones".to_string(), "iPhone".to_string())
        );
    }

    #[test]
    fn removes_whitespace_and_empty_segments() {
        assert_eq!(
            clean_category("  Electronics>>  Phones > ", " Pixel 8 "),
            ("Electronics > Phones".to_string(), "Pixel 8".to_string())
        );
    }

    #[test]
    fn collapses_consecutive_duplicates_case_insensitively() {
        assert_eq!(
            clean_category("Home > home > Kitchen > KITCHEN", "Kettle").0,
            "Home > Kitchen"
        );
    }

    #[test]
    fn keeps_single_segment_equal_to_name() {
        assert_eq!(clean_category("Snacks", "snacks").0, "Snacks");
        assert_eq!(clean_category("Snacks > Snacks", "Snacks").0, "Snacks");
    }

    #[test]
    fn leaves_clean_rows_alone() {
        let rows = vec![
            row(1, "Electronics > Mobile Phones", "iPhone 15"),
            row(2, "Groceries > Snacks", "Chips"),
            row(3, "", "Orphan"),
        ];
        assert!(plan_fixes(&rows).is_empty());
    }

    #[test]
    fn plans_fix_for_untrimmed_name() {
        let fixes = plan_fixes(&[row(7, "Groceries > Snacks", "  Chips ")]);
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].id, 7);
        assert_eq!(fixes[0].category, "Groceries > Snacks");
        assert_eq!(fixes[0].name, "Chips");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let samples = [
            ("Phones > iPhone > iPhone", "iPhone"),
            (" A >  > B > b > C ", " C "),
            ("X > Y > X", "X"),
            ("Solo", "Solo"),
            ("Tools >", ""),
        ];
        for (category, name) in samples {
            let (once_category, once_name) = clean_category(category, name);
            let twice = clean_category(&once_category, &once_name);
            assert_eq!(twice, (once_category, once_name));
        }
    }

    #[test]
    fn sanitize_rewrites_only_dirty_rows_and_is_idempotent() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut connection =
            open_database(&directory.path().join("inventory.db")).expect("open database");
        insert_item(&connection, &draft("iPhone", "Phones > iPhone > iPhone")).expect("insert");
        insert_item(&connection, &draft("Chips", "Groceries > Snacks")).expect("insert");
        insert_item(&connection, &draft("Kettle", " Home >> Kitchen ")).expect("insert");

        assert_eq!(sanitize_inventory(&mut connection).expect("first run"), 2);
        assert_eq!(sanitize_inventory(&mut connection).expect("second run"), 0);

        let categories = list_items(&connection)
            .expect("list")
            .into_iter()
            .map(|item| (item.name, item.category))
            .collect::<Vec<(String, String)>>();
        assert!(categories.contains(&("iPhone".to_string(), "Phones".to_string())));
        assert!(categories.contains(&("Kettle".to_string(), "Home > Kitchen".to_string())));
        assert!(categories.contains(&("Chips".to_string(), "Groceries > Snacks".to_string())));
    }

    #[test]
    fn failed_update_rolls_back_every_row() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut connection =
            open_database(&directory.path().join("inventory.db")).expect("open database");
        let first = insert_item(&connection, &draft("Kettle", "Home >> Kitchen")).expect("insert");
        let second = insert_item(&connection, &draft("Cup", "Home > Cups > Cups")).expect("insert");
        connection
            .execute_batch(&format!(
                "CREATE TRIGGER reject_cleanup BEFORE UPDATE ON inventory
                 WHEN NEW.id = {second}
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;"
            ))
            .expect("create trigger");

        assert!(sanitize_inventory(&mut connection).is_err());

        let items = list_items(&connection).expect("list");
        let kettle = items.iter().find(|item| item.id == first).expect("kettle");
        let cup = items.iter().find(|item| item.id == second).expect("cup");
        assert_eq!(kettle.category, "Home >> Kitchen");
        assert_eq!(cup.category, "Home > Cups > Cups");
    }
}
