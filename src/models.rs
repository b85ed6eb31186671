//! Domain models for the cellar inventory. Records stay plain data holders so
//! the store, the codec and the terminal UI can share them without dragging
//! persistence or presentation concerns along.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use uuid::Uuid;

/// Folder that holds the conventional per-type artwork.
const IMAGE_DIR: &str = "images";

/// Surrogate identifier assigned once when a record is created. The
/// denomination is only a display name and may be renamed during an edit, so
/// every lookup in the store goes through this id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Mint a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id previously written with `Display` (the SQLite backend keeps
    /// ids across sessions this way).
    pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Attributes only wines carry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WineDetails {
    pub grape_variety: String,
    pub region: String,
}

/// Explicit tag for the kind of entry a record describes. Code that needs
/// wine-only data matches on this instead of guessing from field contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemKind {
    #[default]
    Generic,
    Wine(WineDetails),
}

impl ItemKind {
    /// Short type name used for the conventional image path and the UI.
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Generic => "Item",
            ItemKind::Wine(_) => "Wine",
        }
    }
}

/// One inventory entry in the cellar.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Immutable surrogate key. Private so edits cannot rewrite it.
    id: RecordId,
    /// Display name. Unique across the cellar but free to change.
    pub denomination: String,
    /// Free text; the pairing heuristic reads colour keywords from here.
    pub description: String,
    pub quantity: u32,
    pub production_year: i32,
    pub date_added: NaiveDate,
    /// Unit price. Must stay finite and non-negative.
    pub price: f64,
    /// Best-before label.
    pub dlc: Option<String>,
    /// Explicit artwork path. `image_path` falls back to a per-type default.
    pub image: Option<String>,
    /// Where the bottle sits (rack, shelf, ...).
    pub position: Option<String>,
    pub aging_phase: Option<String>,
    /// Score out of whatever scale the user likes; 0 means unset.
    pub rating: f64,
    pub kind: ItemKind,
}

impl Record {
    /// Build a generic inventory item with a fresh id.
    pub fn item(
        denomination: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        production_year: i32,
        date_added: NaiveDate,
        price: f64,
    ) -> Self {
        Self::with_id(
            RecordId::new(),
            denomination,
            description,
            quantity,
            production_year,
            date_added,
            price,
        )
    }

    /// Build a wine with a fresh id.
    #[allow(clippy::too_many_arguments)]
    pub fn wine(
        denomination: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        production_year: i32,
        date_added: NaiveDate,
        price: f64,
        grape_variety: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let mut record = Self::item(
            denomination,
            description,
            quantity,
            production_year,
            date_added,
            price,
        );
        record.kind = ItemKind::Wine(WineDetails {
            grape_variety: grape_variety.into(),
            region: region.into(),
        });
        record
    }

    /// Rebuild a record under an id that already exists in storage.
    pub(crate) fn with_id(
        id: RecordId,
        denomination: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        production_year: i32,
        date_added: NaiveDate,
        price: f64,
    ) -> Self {
        Self {
            id,
            denomination: denomination.into(),
            description: description.into(),
            quantity,
            production_year,
            date_added,
            price,
            dlc: None,
            image: None,
            position: None,
            aging_phase: None,
            rating: 0.0,
            kind: ItemKind::Generic,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn wine_details(&self) -> Option<&WineDetails> {
        match &self.kind {
            ItemKind::Wine(details) => Some(details),
            ItemKind::Generic => None,
        }
    }

    pub fn is_wine(&self) -> bool {
        matches!(self.kind, ItemKind::Wine(_))
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Stock value of this entry: unit price times bottles on hand.
    pub fn value(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }

    /// Resolve the artwork to show for this record. An explicit path wins;
    /// otherwise we fall back to `images/<type-name>.png`.
    pub fn image_path(&self) -> PathBuf {
        match self.image.as_deref() {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => Path::new(IMAGE_DIR).join(format!("{}.png", self.type_name())),
        }
    }

    /// Check the invariants the store relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.denomination.trim().is_empty() {
            return Err("Denomination is required.".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!(
                "Price for {} must be a non-negative number.",
                self.denomination
            ));
        }
        Ok(())
    }

    /// Human-readable dump used by the details view. Optional fields only show
    /// up when populated, and the rating only when it has been set.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Denomination: {}", self.denomination),
            format!("Description: {}", self.description),
            format!("Quantity: {}", self.quantity),
            format!("Production year: {}", self.production_year),
            format!("Date added: {}", self.date_added.format("%d/%m/%Y")),
            format!("Price: {:.2}", self.price),
        ];

        let optional = [
            ("DLC", &self.dlc),
            ("Position", &self.position),
            ("Aging phase", &self.aging_phase),
        ];
        for (label, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                lines.push(format!("{label}: {value}"));
            }
        }

        if self.rating != 0.0 {
            lines.push(format!("Rating: {}", self.rating));
        }

        if let Some(wine) = self.wine_details() {
            lines.push(format!("Grape variety: {}", wine.grape_variety));
            lines.push(format!("Region: {}", wine.region));
        }

        lines
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.denomination)
    }
}

/// Collapse empty optional text to `None` so "unset" has one representation.
/// Whitespace is kept as typed; callers that want it gone trim first.
pub(crate) fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
