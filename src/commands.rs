use std::path::PathBuf;

use crate::db;
use crate::error::{CatalogError, CommandResult};
use crate::import::read_item_drafts_from_file;
use crate::query_engine::{clear_query_cache, search_categories};
use crate::runtime::AppHandle;
use crate::sanitize;
use crate::types::*;
use crate::util::{path_display, trimmed_or_none};

pub(crate) const INVENTORY_CHANGED_EVENT: &str = "inventory-changed";

fn notify_changed(app: &AppHandle, action: &str, count: usize) {
    clear_query_cache(app);
    if count == 0 {
        return;
    }
    let payload = InventoryChanged {
        action: action.to_string(),
        count,
    };
    if let Err(error) = app.emit(INVENTORY_CHANGED_EVENT, payload) {
        tracing::warn!(%error, action, "Could not emit inventory change event");
    }
}

fn validate_draft(draft: ItemDraft) -> CommandResult<ItemDraft> {
    let name = draft.name.trim().to_string();
    if name.is_empty() {
        return Err(CatalogError::InvalidInput("Item name cannot be empty.".to_string()));
    }
    let category = draft.category.trim().to_string();
    if category.is_empty() {
        return Err(CatalogError::InvalidInput(
            "Item category cannot be empty.".to_string(),
        ));
    }

    Ok(ItemDraft {
        name,
        category,
        imageurl: trimmed_or_none(draft.imageurl.as_deref()),
        comment: trimmed_or_none(draft.comment.as_deref()),
    })
}

fn item_not_found(id: i64) -> CatalogError {
    CatalogError::NotFound(format!("Item {id} does not exist."))
}

pub(crate) fn require_admin(app: &AppHandle, token: Option<&str>) -> CommandResult<()> {
    if app.authorizer().is_authorized(token) {
        Ok(())
    } else {
        Err(CatalogError::Unauthorized)
    }
}

pub(crate) fn login(app: &AppHandle, username: String, password: String) -> CommandResult<LoginResult> {
    match app.authorizer().login(username.trim(), &password) {
        Some(token) => {
            tracing::info!("Admin login succeeded");
            Ok(LoginResult { token })
        }
        None => {
            tracing::warn!("Admin login rejected");
            Err(CatalogError::Unauthorized)
        }
    }
}

pub(crate) fn search_inventory(
    app: &AppHandle,
    search: Option<String>,
    limit: Option<usize>,
) -> CommandResult<Vec<CategoryHit>> {
    let query = search.unwrap_or_default();
    search_categories(app, &query, limit)
}

pub(crate) fn list_category_items(app: &AppHandle, category: String) -> CommandResult<Vec<InventoryItem>> {
    let category = category.trim();
    if category.is_empty() {
        return Ok(Vec::new());
    }
    app.with_connection(|connection| db::list_items_in_category(connection, category))
}

pub(crate) fn list_inventory(app: &AppHandle) -> CommandResult<Vec<InventoryItem>> {
    app.with_connection(|connection| db::list_items(connection))
}

pub(crate) fn get_item(app: &AppHandle, id: i64) -> CommandResult<InventoryItem> {
    app.with_connection(|connection| db::get_item(connection, id))?
        .ok_or_else(|| item_not_found(id))
}

pub(crate) fn create_item(app: &AppHandle, draft: ItemDraft) -> CommandResult<InventoryItem> {
    let draft = validate_draft(draft)?;
    let id = app.with_connection(|connection| db::insert_item(connection, &draft))?;
    tracing::info!(id, category = %draft.category, "Created inventory item");
    notify_changed(app, "create", 1);

    Ok(InventoryItem {
        id,
        name: draft.name,
        category: draft.category,
        imageurl: draft.imageurl,
        comment: draft.comment,
    })
}

pub(crate) fn update_item(app: &AppHandle, id: i64, draft: ItemDraft) -> CommandResult<InventoryItem> {
    let draft = validate_draft(draft)?;
    let changed = app.with_connection(|connection| db::update_item(connection, id, &draft))?;
    if changed == 0 {
        return Err(item_not_found(id));
    }
    tracing::info!(id, "Updated inventory item");
    notify_changed(app, "update", changed);

    Ok(InventoryItem {
        id,
        name: draft.name,
        category: draft.category,
        imageurl: draft.imageurl,
        comment: draft.comment,
    })
}

pub(crate) fn delete_item(app: &AppHandle, id: i64) -> CommandResult<i64> {
    let removed = app.with_connection(|connection| db::delete_item(connection, id))?;
    if removed == 0 {
        return Err(item_not_found(id));
    }
    tracing::info!(id, "Deleted inventory item");
    notify_changed(app, "delete", removed);
    Ok(id)
}

pub(crate) fn sanitize_inventory(app: &AppHandle) -> CommandResult<BatchReport> {
    let count = app.with_connection(sanitize::sanitize_inventory)?;
    notify_changed(app, "sanitize", count);
    Ok(BatchReport {
        count,
        message: format!("Cleaned {count} items."),
    })
}

pub(crate) fn import_csv(app: &AppHandle, path: String) -> CommandResult<BatchReport> {
    let path = PathBuf::from(path.trim());
    let drafts = read_item_drafts_from_file(&path)?;
    if drafts.is_empty() {
        return Err(CatalogError::InvalidInput("CSV is empty or invalid.".to_string()));
    }

    let count = app.with_connection(|connection| {
        let transaction = connection
            .transaction()
            .map_err(|error| CatalogError::storage("Could not start import transaction", error))?;
        let inserted = db::insert_items(&transaction, &drafts)?;
        transaction
            .commit()
            .map_err(|error| CatalogError::storage("Could not commit import transaction", error))?;
        Ok(inserted)
    })?;

    tracing::info!(count, file = %path_display(&path), "Imported inventory CSV");
    notify_changed(app, "import", count);
    Ok(BatchReport {
        count,
        message: format!("Added {count} items."),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use std::fs;

    fn open_app(directory: &tempfile::TempDir) -> AppHandle {
        let config = CatalogConfig {
            admin_username: Some("keeper".to_string()),
            admin_password: Some("s3cret".to_string()),
            ..CatalogConfig::default()
        };
        AppHandle::open_with_config(directory.path().to_path_buf(), config).expect("open app")
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
    fn create_trims_fields_and_rejects_blanks() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);

        let item = create_item(
            &app,
            ItemDraft {
                name: "  Chips ".to_string(),
                category: " Groceries > Snacks ".to_string(),
                imageurl: Some("   ".to_string()),
                comment: Some(" Aisle 4 ".to_string()),
            },
        )
        .expect("create");
        assert_eq!(item.name, "Chips");
        assert_eq!(item.category, "Groceries > Snacks");
        assert_eq!(item.imageurl, None);
        assert_eq!(item.comment.as_deref(), Some("Aisle 4"));
        assert_eq!(get_item(&app, item.id).expect("get"), item);

        let error = create_item(&app, draft(" ", "Groceries")).expect_err("blank name");
        assert_eq!(error.code(), "invalid_input");
    }

    #[test]
    fn update_and_delete_report_missing_items() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);

        assert_eq!(
            update_item(&app, 42, draft("Chips", "Snacks")).expect_err("missing").code(),
            "not_found"
        );
        assert_eq!(delete_item(&app, 42).expect_err("missing").code(), "not_found");

        let item = create_item(&app, draft("Chips", "Snacks")).expect("create");
        let updated = update_item(&app, item.id, draft("Crisps", "Groceries > Snacks")).expect("update");
        assert_eq!(updated.name, "Crisps");
        assert_eq!(delete_item(&app, item.id).expect("delete"), item.id);
        assert!(list_inventory(&app).expect("list").is_empty());
    }

    #[test]
    fn writes_invalidate_cached_search_results() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);
        create_item(&app, draft("Chips", "Groceries > Snacks")).expect("create");
        assert_eq!(search_inventory(&app, Some("snacks".to_string()), None).expect("search").len(), 1);

        create_item(&app, draft("Cookies", "Bakery > Snacks")).expect("create");
        assert_eq!(search_inventory(&app, Some("snacks".to_string()), None).expect("search").len(), 2);
    }

    #[test]
    fn end_to_end_search_ranks_the_iphone_category() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);
        create_item(&app, draft("Pro", "Electronics > Mobile Phones > iPhone 15")).expect("create");
        create_item(&app, draft("Mini", "Electronics > Mobile Phones > iPhone 15")).expect("create");
        create_item(&app, draft("S24", "Electronics > Mobile Phones > Samsung Galaxy")).expect("create");
        create_item(&app, draft("Chips", "Groceries > Snacks")).expect("create");

        let hits = search_inventory(&app, Some("iphone".to_string()), None).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, "Electronics > Mobile Phones > iPhone 15");
        assert_eq!(hits[0].exact_matches, 1);

        assert!(search_inventory(&app, None, None).expect("search").is_empty());
        assert!(search_inventory(&app, Some(String::new()), None).expect("search").is_empty());
    }

    #[test]
    fn sanitize_reports_count_and_second_run_is_noop() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);
        let item = create_item(&app, draft("iPhone", "Phones > iPhone > iPhone")).expect("create");

        let report = sanitize_inventory(&app).expect("sanitize");
        assert_eq!(report.count, 1);
        assert_eq!(report.message, "Cleaned 1 items.");
        assert_eq!(get_item(&app, item.id).expect("get").category, "Phones");
        assert_eq!(sanitize_inventory(&app).expect("sanitize again").count, 0);
    }

    #[test]
    fn import_adds_rows_and_rejects_empty_files() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);

        let csv_path = directory.path().join("items.csv");
        fs::write(
            &csv_path,
            "name,category,imageurl\nLego,Toys > Blocks,lego.jpg\n,Toys,\nBarbie,Toys > Dolls,\n",
        )
        .expect("write csv");
        let report = import_csv(&app, path_display(&csv_path)).expect("import");
        assert_eq!(report.count, 2);
        assert_eq!(list_inventory(&app).expect("list").len(), 2);

        let empty_path = directory.path().join("empty.csv");
        fs::write(&empty_path, "name,category\n").expect("write csv");
        assert_eq!(
            import_csv(&app, path_display(&empty_path)).expect_err("empty").code(),
            "invalid_input"
        );

        let missing = directory.path().join("missing.csv");
        assert_eq!(import_csv(&app, path_display(&missing)).expect_err("missing").code(), "io");
    }

    #[test]
    fn admin_checks_follow_login() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);

        assert!(require_admin(&app, None).is_err());
        assert_eq!(
            login(&app, "keeper".to_string(), "nope".to_string()).err().map(|error| error.code()),
            Some("unauthorized")
        );
        let session = login(&app, " keeper ".to_string(), "s3cret".to_string()).expect("login");
        assert!(require_admin(&app, Some(&session.token)).is_ok());
    }

    #[test]
    fn category_items_follow_exact_path() {
        let directory = tempfile::tempdir().expect("temp dir");
        let app = open_app(&directory);
        create_item(&app, draft("Chips", "Groceries > Snacks")).expect("create");
        create_item(&app, draft("Apples", "Groceries > Fruit")).expect("create");

        let items = list_category_items(&app, " Groceries > Snacks ".to_string()).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Chips");
        assert!(list_category_items(&app, "  ".to_string()).expect("items").is_empty());
    }
}
