use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Error as SqlError, ErrorCode, Row};
use tracing::warn;

use crate::models::{non_empty, ItemKind, Record, RecordId, WineDetails};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw column values for one row, read before we decide whether the row can
/// become a `Record`.
struct ItemRow {
    id: String,
    denomination: String,
    description: Option<String>,
    quantity: i64,
    production_year: i32,
    date_added: String,
    price: f64,
    dlc: Option<String>,
    image: Option<String>,
    position: Option<String>,
    aging_phase: Option<String>,
    rating: f64,
    grape_variety: Option<String>,
    region: Option<String>,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            denomination: row.get(1)?,
            description: row.get(2)?,
            quantity: row.get(3)?,
            production_year: row.get(4)?,
            date_added: row.get(5)?,
            price: row.get(6)?,
            dlc: row.get(7)?,
            image: row.get(8)?,
            position: row.get(9)?,
            aging_phase: row.get(10)?,
            rating: row.get(11)?,
            grape_variety: row.get(12)?,
            region: row.get(13)?,
        })
    }

    /// Turn the row into a record. Rows with an unreadable date or a quantity
    /// out of range are skipped;
    /// an unreadable id is replaced so the record still loads.
    fn into_record(self) -> Option<Record> {
        let Ok(date_added) = NaiveDate::parse_from_str(&self.date_added, DATE_FORMAT) else {
            warn!(denomination = %self.denomination, date = %self.date_added, "skipping row with invalid date");
            return None;
        };

        let Ok(quantity) = u32::try_from(self.quantity) else {
            warn!(denomination = %self.denomination, quantity = self.quantity, "skipping row with invalid quantity");
            return None;
        };

        let id = RecordId::parse(&self.id).unwrap_or_else(|_| {
            warn!(denomination = %self.denomination, id = %self.id, "row id unreadable, assigning a new one");
            RecordId::new()
        });

        let mut record = Record::with_id(
            id,
            self.denomination,
            self.description.unwrap_or_default(),
            quantity,
            self.production_year,
            date_added,
            self.price,
        );
        record.dlc = self.dlc.and_then(non_empty);
        record.image = self.image.and_then(non_empty);
        record.position = self.position.and_then(non_empty);
        record.aging_phase = self.aging_phase.and_then(non_empty);
        record.rating = self.rating;
        if let Some(grape_variety) = self.grape_variety.and_then(non_empty) {
            record.kind = ItemKind::Wine(WineDetails {
                grape_variety,
                region: self.region.unwrap_or_default(),
            });
        }
        Some(record)
    }
}

/// Retrieve every stored record in insertion order.
pub fn fetch_items(conn: &Connection) -> Result<Vec<Record>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, denomination, description, quantite, anneeProduction, dateAjout, prix,
                    dlc, image, position, phaseVieillissement, note, cepage, region
             FROM items
             ORDER BY rowid",
        )
        .context("failed to prepare items query")?;

    let rows = stmt
        .query_map([], ItemRow::from_row)
        .context("failed to load items")?;

    // A row whose columns don't fit the record types is skipped, not fatal.
    let records = rows
        .enumerate()
        .filter_map(|(index, row)| match row {
            Ok(row) => row.into_record(),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable row");
                None
            }
        })
        .collect();
    Ok(records)
}

/// Insert one record. Wine columns are NULL for generic items.
pub fn insert_item(conn: &Connection, record: &Record) -> Result<()> {
    let (grape_variety, region) = match record.wine_details() {
        Some(wine) => (Some(wine.grape_variety.as_str()), Some(wine.region.as_str())),
        None => (None, None),
    };

    conn.execute(
        "INSERT INTO items (id, denomination, description, quantite, anneeProduction, dateAjout,
                            prix, dlc, image, position, phaseVieillissement, note, cepage, region)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.id().to_string(),
            record.denomination,
            record.description,
            record.quantity,
            record.production_year,
            record.date_added.format(DATE_FORMAT).to_string(),
            record.price,
            record.dlc,
            record.image,
            record.position,
            record.aging_phase,
            record.rating,
            grape_variety,
            region,
        ],
    )
    .map_err(|err| map_unique_constraint(err, &record.denomination))
    .context("failed to insert item")?;

    Ok(())
}

/// Replace the stored contents with `records` inside a single transaction, so
/// a failure part way through leaves the previous contents in place.
pub fn replace_items(conn: &Connection, records: &[Record]) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start transaction")?;

    tx.execute("DELETE FROM items", [])
        .context("failed to clear items")?;
    for record in records {
        insert_item(&tx, record)?;
    }

    tx.commit().context("failed to commit items")?;
    Ok(())
}

/// Coerce SQLite constraint errors into human-readable messages. The only
/// constraint a well-formed cellar can trip is the unique denomination.
fn map_unique_constraint(err: SqlError, denomination: &str) -> anyhow::Error {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        anyhow!("A record named \"{denomination}\" already exists.")
    } else {
        err.into()
    }
}
