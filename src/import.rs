use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::{CatalogError, CommandResult};
use crate::types::ItemDraft;
use crate::util::{path_display, trimmed_or_none};

/// Positions of the known columns in the header row.
struct ColumnIndex {
    name: usize,
    category: usize,
    imageurl: Option<usize>,
    comment: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> CommandResult<Self> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(wanted))
        };
        let (Some(name), Some(category)) = (find("name"), find("category")) else {
            return Err(CatalogError::InvalidInput(
                "CSV needs 'name' and 'category' columns.".to_string(),
            ));
        };
        Ok(Self {
            name,
            category,
            imageurl: find("imageurl"),
            comment: find("comment"),
        })
    }
}

fn field(record: &StringRecord, index: Option<usize>) -> Option<String> {
    trimmed_or_none(index.and_then(|index| record.get(index)))
}

/// Reads `name,category[,imageurl][,comment]` rows. Rows without a name or a
/// category are skipped; short rows leave trailing fields empty and unknown
/// columns are ignored.
pub(crate) fn read_item_drafts<R: Read>(reader: R) -> CommandResult<Vec<ItemDraft>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|error| CatalogError::import("Could not read CSV header", error))?
        .clone();
    let columns = ColumnIndex::from_headers(&headers)?;

    let mut drafts = Vec::new();
    let mut skipped = 0_usize;
    for (index, record) in csv_reader.records().enumerate() {
        let record = record
            .map_err(|error| CatalogError::import(format!("Could not parse CSV row {}", index + 2), error))?;
        let name = field(&record, Some(columns.name));
        let category = field(&record, Some(columns.category));
        let (Some(name), Some(category)) = (name, category) else {
            skipped += 1;
            continue;
        };
        drafts.push(ItemDraft {
            name,
            category,
            imageurl: field(&record, columns.imageurl),
            comment: field(&record, columns.comment),
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, kept = drafts.len(), "Skipped incomplete CSV rows");
    }
    Ok(drafts)
}

pub(crate) fn read_item_drafts_from_file(path: &Path) -> CommandResult<Vec<ItemDraft>> {
    let file = File::open(path).map_err(|error| {
        CatalogError::io(format!("Could not open CSV '{}'", path_display(path)), error)
    })?;
    read_item_drafts(file)
}
