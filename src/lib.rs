use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::sync::{Once, OnceLock, RwLock};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod runtime {
    use serde::Serialize;
    use std::ffi::CString;
    use std::os::raw::c_char;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, OnceLock, RwLock};

    use rusqlite::Connection;

    use crate::auth::{authorizer_from_config, Authorizer};
    use crate::config::CatalogConfig;
    use crate::db::open_database;
    use crate::error::{CatalogError, CommandResult};
    use crate::query_engine::QueryCache;
    use crate::util::path_display;

    pub type EventCallback = extern "C" fn(*const c_char, *const c_char);

    static EVENT_CALLBACK: OnceLock<RwLock<Option<EventCallback>>> = OnceLock::new();

    fn callback_cell() -> &'static RwLock<Option<EventCallback>> {
        EVENT_CALLBACK.get_or_init(|| RwLock::new(None))
    }

    pub fn set_event_callback(callback: Option<EventCallback>) {
        if let Ok(mut writer) = callback_cell().write() {
            *writer = callback;
        }
    }

    /// Shared handle to one configured inventory: its data dir, settings,
    /// database connection, authorizer and search cache.
    #[derive(Clone)]
    pub struct AppHandle {
        state: Arc<AppState>,
    }

    struct AppState {
        data_dir: PathBuf,
        config: CatalogConfig,
        connection: Mutex<Connection>,
        authorizer: Box<dyn Authorizer>,
        query_cache: Mutex<QueryCache>,
    }

    impl AppHandle {
        pub fn open(data_dir: PathBuf) -> CommandResult<Self> {
            let config = CatalogConfig::load(&data_dir)?;
            Self::open_with_config(data_dir, config)
        }

        pub fn open_with_config(data_dir: PathBuf, config: CatalogConfig) -> CommandResult<Self> {
            let authorizer = authorizer_from_config(&config);
            Self::open_with_authorizer(data_dir, config, authorizer)
        }

        pub fn open_with_authorizer(
            data_dir: PathBuf,
            config: CatalogConfig,
            authorizer: Box<dyn Authorizer>,
        ) -> CommandResult<Self> {
            let db_path = config.database_path(&data_dir);
            let connection = open_database(&db_path)?;
            tracing::info!(database = %path_display(&db_path), "Inventory database ready");

            let query_cache = QueryCache::new(config.cache_ttl_ms, config.cache_capacity);
            Ok(Self {
                state: Arc::new(AppState {
                    data_dir,
                    config,
                    connection: Mutex::new(connection),
                    authorizer,
                    query_cache: Mutex::new(query_cache),
                }),
            })
        }

        pub fn data_dir(&self) -> &Path {
            &self.state.data_dir
        }

        pub fn config(&self) -> &CatalogConfig {
            &self.state.config
        }

        pub(crate) fn authorizer(&self) -> &dyn Authorizer {
            self.state.authorizer.as_ref()
        }

        pub(crate) fn query_cache(&self) -> &Mutex<QueryCache> {
            &self.state.query_cache
        }

        /// Runs `operation` with exclusive use of the database connection.
        pub(crate) fn with_connection<T>(
            &self,
            operation: impl FnOnce(&mut Connection) -> CommandResult<T>,
        ) -> CommandResult<T> {
            let mut connection = self
                .state
                .connection
                .lock()
                .map_err(|_| CatalogError::Poisoned("database connection"))?;
            operation(&mut connection)
        }

        pub fn emit<S: Serialize>(&self, event: &str, payload: S) -> Result<(), String> {
            let callback = callback_cell().read().ok().and_then(|reader| *reader);
            let Some(callback) = callback else {
                return Ok(());
            };

            let payload_json = serde_json::to_string(&payload)
                .map_err(|error| format!("Could not serialize event payload: {error}"))?;
            let event_c = CString::new(event)
                .map_err(|_| "Event name contains null byte".to_string())?;
            let payload_c = CString::new(payload_json)
                .map_err(|_| "Event payload contains null byte".to_string())?;

            callback(event_c.as_ptr(), payload_c.as_ptr());
            Ok(())
        }
    }
}

mod auth;
mod commands;
mod config;
mod db;
mod error;
mod import;
mod query_engine;
mod sanitize;
mod scoring;
mod search;
mod types;
mod util;

pub use auth::{AdminAuthorizer, Authorizer, DenyAll};
pub use config::CatalogConfig;
pub use error::{CatalogError, CommandResult};
pub use runtime::{set_event_callback, AppHandle};

use error::CatalogError as Error;
use types::ItemDraft;

static APP_HANDLE: OnceLock<RwLock<Option<AppHandle>>> = OnceLock::new();
static TRACING: Once = Once::new();

fn app_handle_cell() -> &'static RwLock<Option<AppHandle>> {
    APP_HANDLE.get_or_init(|| RwLock::new(None))
}

fn current_app_handle() -> CommandResult<AppHandle> {
    let reader = app_handle_cell()
        .read()
        .map_err(|_| Error::Poisoned("app handle"))?;
    reader.as_ref().cloned().ok_or(Error::NotConfigured)
}

fn set_app_handle(app_handle: AppHandle) -> CommandResult<()> {
    let mut writer = app_handle_cell()
        .write()
        .map_err(|_| Error::Poisoned("app handle"))?;
    *writer = Some(app_handle);
    Ok(())
}

/// Installs the stderr log subscriber once. `RUST_LOG` overrides the default
/// `inventory_core=info` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "inventory_core=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    });
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest {
    command: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    auth_token: Option<String>,
}

#[derive(Serialize)]
struct InvokeResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct EmptyArgs {}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchInventoryArgs {
    search: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryArgs {
    category: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginArgs {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemIdArgs {
    id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemArgs {
    id: i64,
    #[serde(flatten)]
    item: ItemDraft,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportCsvArgs {
    path: String,
}

fn parse_args<T: DeserializeOwned>(value: Value) -> CommandResult<T> {
    // Commands without arguments may be invoked with `args` omitted.
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value)
        .map_err(|error| Error::InvalidInput(format!("Could not parse command args: {error}")))
}

fn to_json_value<T: Serialize>(value: T) -> CommandResult<Value> {
    serde_json::to_value(value)
        .map_err(|error| Error::serialization("Could not serialize command result", error))
}

const KNOWN_COMMANDS: &[&str] = &[
    "search_inventory",
    "list_category_items",
    "login",
    "check_auth",
    "list_inventory",
    "get_item",
    "create_item",
    "update_item",
    "delete_item",
    "sanitize_inventory",
    "import_csv",
];

fn is_public_command(command: &str) -> bool {
    matches!(command, "search_inventory" | "list_category_items" | "login")
}

fn dispatch(app: &AppHandle, request: InvokeRequest) -> CommandResult<Value> {
    let InvokeRequest {
        command,
        args,
        auth_token,
    } = request;

    if !KNOWN_COMMANDS.contains(&command.as_str()) {
        return Err(Error::InvalidInput(format!("Unknown command: {command}")));
    }
    if !is_public_command(&command) {
        commands::require_admin(app, auth_token.as_deref())?;
    }

    match command.as_str() {
        "search_inventory" => {
            let args: SearchInventoryArgs = parse_args(args)?;
            to_json_value(commands::search_inventory(app, args.search, args.limit)?)
        }
        "list_category_items" => {
            let args: CategoryArgs = parse_args(args)?;
            to_json_value(commands::list_category_items(app, args.category)?)
        }
        "login" => {
            let args: LoginArgs = parse_args(args)?;
            to_json_value(commands::login(app, args.username, args.password)?)
        }
        "check_auth" => {
            let _: EmptyArgs = parse_args(args)?;
            to_json_value(serde_json::json!({ "authenticated": true }))
        }
        "list_inventory" => {
            let _: EmptyArgs = parse_args(args)?;
            to_json_value(commands::list_inventory(app)?)
        }
        "get_item" => {
            let args: ItemIdArgs = parse_args(args)?;
            to_json_value(commands::get_item(app, args.id)?)
        }
        "create_item" => {
            let args: ItemDraft = parse_args(args)?;
            to_json_value(commands::create_item(app, args)?)
        }
        "update_item" => {
            let args: UpdateItemArgs = parse_args(args)?;
            to_json_value(commands::update_item(app, args.id, args.item)?)
        }
        "delete_item" => {
            let args: ItemIdArgs = parse_args(args)?;
            let id = commands::delete_item(app, args.id)?;
            to_json_value(serde_json::json!({ "deleted": id }))
        }
        "sanitize_inventory" => {
            let _: EmptyArgs = parse_args(args)?;
            to_json_value(commands::sanitize_inventory(app)?)
        }
        "import_csv" => {
            let args: ImportCsvArgs = parse_args(args)?;
            to_json_value(commands::import_csv(app, args.path)?)
        }
        _ => Err(Error::InvalidInput(format!("Unknown command: {command}"))),
    }
}

fn response_for(command: &str, result: CommandResult<Value>) -> InvokeResponse {
    match result {
        Ok(value) => InvokeResponse {
            ok: true,
            value: Some(value),
            error: None,
            code: None,
        },
        Err(error) => {
            if error.is_internal() {
                tracing::error!(command, %error, "Command failed");
            } else {
                tracing::debug!(command, %error, "Command rejected");
            }
            InvokeResponse {
                ok: false,
                value: None,
                error: Some(error.public_message()),
                code: Some(error.code()),
            }
        }
    }
}

/// Parses and runs one bridge request against `app`.
pub fn invoke_json(app: &AppHandle, raw: &str) -> String {
    let response = match serde_json::from_str::<InvokeRequest>(raw) {
        Ok(request) => {
            let command = request.command.clone();
            response_for(&command, dispatch(app, request))
        }
        Err(error) => response_for(
            "",
            Err(Error::InvalidInput(format!("Could not parse request: {error}"))),
        ),
    };
    serialize_response(&response)
}

fn serialize_response(response: &InvokeResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|error| {
        format!("{{\"ok\":false,\"error\":\"Could not serialize response: {error}\"}}")
    })
}

fn response_json_pointer(raw: String) -> *mut c_char {
    CString::new(raw)
        .unwrap_or_else(|_| {
            CString::new("{\"ok\":false,\"error\":\"Response contains null byte\"}")
                .expect("fallback JSON string is valid")
        })
        .into_raw()
}

unsafe fn pointer_to_string(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("Received null pointer".to_string());
    }

    CStr::from_ptr(ptr)
        .to_str()
        .map(|value| value.to_string())
        .map_err(|error| format!("Could not decode UTF-8 string: {error}"))
}

pub type InventoryEventCallback = extern "C" fn(*const c_char, *const c_char);

#[no_mangle]
pub extern "C" fn inventory_set_event_callback(callback: Option<InventoryEventCallback>) {
    set_event_callback(callback);
}

#[no_mangle]
pub extern "C" fn inventory_configure(data_dir_ptr: *const c_char) -> c_int {
    init_tracing();

    let Ok(data_dir) = (unsafe { pointer_to_string(data_dir_ptr) }) else {
        return 0;
    };
    let data_dir = data_dir.trim();
    if data_dir.is_empty() {
        return 0;
    }

    let app_handle = match AppHandle::open(PathBuf::from(data_dir)) {
        Ok(app_handle) => app_handle,
        Err(error) => {
            tracing::error!(%error, "Could not configure inventory core");
            return 0;
        }
    };
    if set_app_handle(app_handle).is_err() {
        return 0;
    }

    1
}

#[no_mangle]
pub extern "C" fn inventory_invoke_json(request_ptr: *const c_char) -> *mut c_char {
    let raw = match unsafe { pointer_to_string(request_ptr) } {
        Ok(raw) => raw,
        Err(error) => {
            return response_json_pointer(serialize_response(&response_for(
                "",
                Err(Error::InvalidInput(error)),
            )))
        }
    };

    let response = match current_app_handle() {
        Ok(app) => invoke_json(&app, &raw),
        Err(error) => serialize_response(&response_for("", Err(error))),
    };
    response_json_pointer(response)
}

#[no_mangle]
pub extern "C" fn inventory_free_str(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(s));
    }
}
