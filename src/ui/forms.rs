use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{non_empty, ItemKind, Record, WineDetails};

/// Fields of the add/edit dialog, in display (and Tab) order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub(crate) enum RecordField {
    #[default]
    Denomination,
    Description,
    Quantity,
    Price,
    Year,
    GrapeVariety,
    Region,
    Dlc,
    Image,
    Position,
    AgingPhase,
    Rating,
}

impl RecordField {
    pub(crate) const ALL: [RecordField; 12] = [
        RecordField::Denomination,
        RecordField::Description,
        RecordField::Quantity,
        RecordField::Price,
        RecordField::Year,
        RecordField::GrapeVariety,
        RecordField::Region,
        RecordField::Dlc,
        RecordField::Image,
        RecordField::Position,
        RecordField::AgingPhase,
        RecordField::Rating,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            RecordField::Denomination => "Denomination",
            RecordField::Description => "Description (red/white)",
            RecordField::Quantity => "Quantity",
            RecordField::Price => "Price",
            RecordField::Year => "Production year",
            RecordField::GrapeVariety => "Grape variety",
            RecordField::Region => "Region",
            RecordField::Dlc => "DLC",
            RecordField::Image => "Image (path)",
            RecordField::Position => "Position",
            RecordField::AgingPhase => "Aging phase",
            RecordField::Rating => "Rating",
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            RecordField::Denomination
            | RecordField::Quantity
            | RecordField::Price
            | RecordField::Year => "<required>",
            RecordField::GrapeVariety => "<blank for non-wine>",
            _ => "<optional>",
        }
    }

    /// Whether `ch` may be typed into this field. Numeric fields only take
    /// digits (plus one decimal point where fractions make sense).
    fn accepts(self, ch: char, current: &str) -> bool {
        match self {
            RecordField::Quantity | RecordField::Year => ch.is_ascii_digit(),
            RecordField::Price | RecordField::Rating => {
                ch.is_ascii_digit() || ((ch == '.' || ch == ',') && !current.contains(['.', ',']))
            }
            _ => !ch.is_control(),
        }
    }
}

/// Typed values pulled out of a validated form.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordDraft {
    pub(crate) denomination: String,
    pub(crate) description: String,
    pub(crate) quantity: u32,
    pub(crate) price: f64,
    pub(crate) production_year: i32,
    pub(crate) kind: ItemKind,
    pub(crate) dlc: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) position: Option<String>,
    pub(crate) aging_phase: Option<String>,
    pub(crate) rating: f64,
}

impl RecordDraft {
    /// Build a brand new record added on `today`.
    pub(crate) fn into_record(self, today: NaiveDate) -> Record {
        let mut record = Record::item(
            self.denomination.clone(),
            self.description.clone(),
            self.quantity,
            self.production_year,
            today,
            self.price,
        );
        self.apply_to(&mut record);
        record
    }

    /// Copy every editable field onto an existing record. The id and the date
    /// added are left alone.
    pub(crate) fn apply_to(self, record: &mut Record) {
        record.denomination = self.denomination;
        record.description = self.description;
        record.quantity = self.quantity;
        record.price = self.price;
        record.production_year = self.production_year;
        record.kind = self.kind;
        record.dlc = self.dlc;
        record.image = self.image;
        record.position = self.position;
        record.aging_phase = self.aging_phase;
        record.rating = self.rating;
    }
}

/// Internal representation of the add/edit dialog.
#[derive(Default, Clone)]
pub(crate) struct RecordForm {
    values: [String; 12],
    pub(crate) active: RecordField,
    pub(crate) error: Option<String>,
}

impl RecordForm {
    /// Populate the form from an existing record when editing.
    pub(crate) fn from_record(record: &Record) -> Self {
        let mut form = Self::default();
        let (grape, region) = match record.wine_details() {
            Some(wine) => (wine.grape_variety.clone(), wine.region.clone()),
            None => (String::new(), String::new()),
        };
        let rating = if record.rating == 0.0 {
            String::new()
        } else {
            record.rating.to_string()
        };

        form.set(RecordField::Denomination, record.denomination.clone());
        form.set(RecordField::Description, record.description.clone());
        form.set(RecordField::Quantity, record.quantity.to_string());
        form.set(RecordField::Price, record.price.to_string());
        form.set(RecordField::Year, record.production_year.to_string());
        form.set(RecordField::GrapeVariety, grape);
        form.set(RecordField::Region, region);
        form.set(RecordField::Dlc, record.dlc.clone().unwrap_or_default());
        form.set(RecordField::Image, record.image.clone().unwrap_or_default());
        form.set(RecordField::Position, record.position.clone().unwrap_or_default());
        form.set(RecordField::AgingPhase, record.aging_phase.clone().unwrap_or_default());
        form.set(RecordField::Rating, rating);
        form
    }

    pub(crate) fn value(&self, field: RecordField) -> &str {
        &self.values[field.index()]
    }

    pub(crate) fn set(&mut self, field: RecordField, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    /// Move focus forward, wrapping at the end.
    pub(crate) fn next_field(&mut self) {
        let next = (self.active.index() + 1) % RecordField::ALL.len();
        self.active = RecordField::ALL[next];
    }

    /// Move focus backward, wrapping at the start.
    pub(crate) fn previous_field(&mut self) {
        let len = RecordField::ALL.len();
        let previous = (self.active.index() + len - 1) % len;
        self.active = RecordField::ALL[previous];
    }

    /// Append a character to the active field, validating allowed input.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let field = self.active;
        if !field.accepts(ch, self.value(field)) {
            return false;
        }
        self.values[field.index()].push(ch);
        true
    }

    /// Remove the last character from the active field.
    pub(crate) fn backspace(&mut self) {
        self.values[self.active.index()].pop();
    }

    /// Validate the inputs and return typed values ready for the cellar.
    /// Nothing is mutated when this fails.
    pub(crate) fn parse_inputs(&self) -> Result<RecordDraft> {
        let denomination = self.value(RecordField::Denomination).trim();
        if denomination.is_empty() {
            return Err(anyhow!("Denomination is required."));
        }

        let quantity = required(self.value(RecordField::Quantity), "Quantity")?
            .parse::<u32>()
            .context("Quantity must be a whole number.")?;
        let production_year = required(self.value(RecordField::Year), "Production year")?
            .parse::<i32>()
            .context("Production year must be a whole number.")?;
        let price = parse_decimal(required(self.value(RecordField::Price), "Price")?)
            .context("Price must be a number.")?;
        let rating = match self.value(RecordField::Rating).trim() {
            "" => 0.0,
            raw => parse_decimal(raw).context("Rating must be a number.")?,
        };

        let grape_variety = self.value(RecordField::GrapeVariety).trim();
        let kind = if grape_variety.is_empty() {
            ItemKind::Generic
        } else {
            ItemKind::Wine(WineDetails {
                grape_variety: grape_variety.to_string(),
                region: self.value(RecordField::Region).trim().to_string(),
            })
        };

        Ok(RecordDraft {
            denomination: denomination.to_string(),
            description: self.value(RecordField::Description).trim().to_string(),
            quantity,
            price,
            production_year,
            kind,
            dlc: non_empty(self.value(RecordField::Dlc).trim()),
            image: non_empty(self.value(RecordField::Image).trim()),
            position: non_empty(self.value(RecordField::Position).trim()),
            aging_phase: non_empty(self.value(RecordField::AgingPhase).trim()),
            rating,
        })
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, field: RecordField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let display = if value.is_empty() {
            field.placeholder().to_string()
        } else {
            value.to_string()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label())),
            Span::styled(display, style),
        ])
    }

    /// Cursor column offset (label prefix plus typed characters) for the active field.
    pub(crate) fn cursor_offset(&self) -> usize {
        let field = self.active;
        field.label().chars().count() + 2 + self.value(field).chars().count()
    }
}

fn required<'a>(raw: &'a str, name: &str) -> Result<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(anyhow!("{name} is required."))
    } else {
        Ok(trimmed)
    }
}

/// Accept both `12.5` and `12,5`.
fn parse_decimal(raw: &str) -> Result<f64> {
    let value = raw.replace(',', ".").parse::<f64>()?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("negative or non-finite value"));
    }
    Ok(value)
}

/// State for confirming the removal of a record.
#[derive(Clone)]
pub(crate) struct ConfirmRecordDelete {
    pub(crate) record: Record,
}
