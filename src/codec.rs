//! Reader and writer for the legacy cellar document: a JSON array of flat
//! objects keyed by the French field names the legacy flat file used.
//!
//! Decoding is deliberately forgiving. A record that cannot be rebuilt is
//! logged and dropped while the rest of the document still loads, and files
//! written by the old hand-rolled serializer (which never escaped quotes) are
//! recovered fragment by fragment when the document as a whole is not valid
//! JSON.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::{non_empty, ItemKind, Record, WineDetails};

/// Calendar format for `dateAjout`.
const DATE_FORMAT: &str = "%Y-%m-%d";
/// Sequence the legacy writer used between two records.
const RECORD_BOUNDARY: &str = "},{";

const KEY_DENOMINATION: &str = "denomination";
const KEY_DESCRIPTION: &str = "description";
const KEY_QUANTITY: &str = "quantite";
const KEY_YEAR: &str = "anneeProduction";
const KEY_DATE: &str = "dateAjout";
const KEY_PRICE: &str = "prix";
const KEY_DLC: &str = "dlc";
const KEY_IMAGE: &str = "image";
const KEY_POSITION: &str = "position";
const KEY_AGING: &str = "phaseVieillissement";
const KEY_RATING: &str = "note";
const KEY_GRAPE: &str = "cepage";
const KEY_REGION: &str = "region";

/// Why a single stored record could not be rebuilt.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` has invalid value `{value}`")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid date `{0}`")]
    InvalidDate(String),
}

/// Field order matters: the legacy layout is fixed, and struct serialization
/// keeps declaration order.
#[derive(Serialize)]
struct LegacyRecord<'a> {
    denomination: &'a str,
    description: &'a str,
    quantite: u32,
    #[serde(rename = "anneeProduction")]
    annee_production: i32,
    #[serde(rename = "dateAjout")]
    date_ajout: String,
    prix: f64,
    dlc: &'a str,
    image: &'a str,
    position: &'a str,
    #[serde(rename = "phaseVieillissement")]
    phase_vieillissement: &'a str,
    note: f64,
    cepage: &'a str,
    region: &'a str,
}

impl<'a> From<&'a Record> for LegacyRecord<'a> {
    fn from(record: &'a Record) -> Self {
        let (cepage, region) = match &record.kind {
            ItemKind::Wine(wine) => (wine.grape_variety.as_str(), wine.region.as_str()),
            ItemKind::Generic => ("", ""),
        };
        Self {
            denomination: &record.denomination,
            description: &record.description,
            quantite: record.quantity,
            annee_production: record.production_year,
            date_ajout: record.date_added.format(DATE_FORMAT).to_string(),
            prix: record.price,
            dlc: record.dlc.as_deref().unwrap_or_default(),
            image: record.image.as_deref().unwrap_or_default(),
            position: record.position.as_deref().unwrap_or_default(),
            phase_vieillissement: record.aging_phase.as_deref().unwrap_or_default(),
            note: record.rating,
            cepage,
            region,
        }
    }
}

/// Serialize the full record list into one compact document.
pub fn encode(records: &[Record]) -> serde_json::Result<String> {
    let rows: Vec<LegacyRecord<'_>> = records.iter().map(LegacyRecord::from).collect();
    serde_json::to_string(&rows)
}

/// Rebuild every record the document still describes correctly. Never fails:
/// unusable records are logged and skipped.
pub fn decode(document: &str) -> Vec<Record> {
    let trimmed = document.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let values = match serde_json::from_str::<Vec<Value>>(trimmed) {
        Ok(values) => values,
        Err(err) => {
            warn!(error = %err, "cellar document is not valid JSON, recovering per record");
            legacy_fragments(trimmed)
        }
    };

    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match decode_record(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, error = %err, "dropping unreadable record");
                None
            }
        })
        .collect()
}

/// Rebuild one record from a decoded object.
pub fn decode_record(value: &Value) -> Result<Record, DecodeError> {
    let fields = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let denomination = text(fields, KEY_DENOMINATION)
        .filter(|name| !name.trim().is_empty())
        .ok_or(DecodeError::MissingField(KEY_DENOMINATION))?;
    let description = text(fields, KEY_DESCRIPTION).unwrap_or_default();

    let quantity = number(fields, KEY_QUANTITY)?;
    if quantity < 0.0 || quantity.fract() != 0.0 || quantity > f64::from(u32::MAX) {
        return Err(invalid(KEY_QUANTITY, quantity));
    }
    let year = number(fields, KEY_YEAR)?;
    if year.fract() != 0.0 || year < f64::from(i32::MIN) || year > f64::from(i32::MAX) {
        return Err(invalid(KEY_YEAR, year));
    }
    let price = number(fields, KEY_PRICE)?;
    if price < 0.0 {
        return Err(invalid(KEY_PRICE, price));
    }
    let rating = match fields.get(KEY_RATING) {
        None | Some(Value::Null) => 0.0,
        Some(Value::String(raw)) if raw.trim().is_empty() => 0.0,
        Some(_) => number(fields, KEY_RATING)?,
    };

    let raw_date = text(fields, KEY_DATE).ok_or(DecodeError::MissingField(KEY_DATE))?;
    let date_added = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT)
        .map_err(|_| DecodeError::InvalidDate(raw_date.clone()))?;

    let mut record = Record::item(
        denomination,
        description,
        quantity as u32,
        year as i32,
        date_added,
        price,
    );
    record.dlc = text(fields, KEY_DLC).and_then(non_empty);
    record.image = text(fields, KEY_IMAGE).and_then(non_empty);
    record.position = text(fields, KEY_POSITION).and_then(non_empty);
    record.aging_phase = text(fields, KEY_AGING).and_then(non_empty);
    record.rating = rating;

    if let Some(grape_variety) = text(fields, KEY_GRAPE).and_then(non_empty) {
        record.kind = ItemKind::Wine(WineDetails {
            grape_variety,
            region: text(fields, KEY_REGION).unwrap_or_default(),
        });
    }

    Ok(record)
}

/// Split a document the old way: strip the brackets, cut on the record
/// boundary, put back the braces the cut removed and parse each piece alone.
fn legacy_fragments(document: &str) -> Vec<Value> {
    let body = document.strip_prefix('[').unwrap_or(document);
    let body = body.strip_suffix(']').unwrap_or(body).trim();
    if body.is_empty() {
        return Vec::new();
    }

    body.split(RECORD_BOUNDARY)
        .enumerate()
        .filter_map(|(index, fragment)| {
            let mut repaired = String::with_capacity(fragment.len() + 2);
            if !fragment.starts_with('{') {
                repaired.push('{');
            }
            repaired.push_str(fragment);
            if !fragment.ends_with('}') {
                repaired.push('}');
            }
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(index, error = %err, "dropping malformed record fragment");
                    None
                }
            }
        })
        .collect()
}

/// String field, with numbers rendered back to text for leniency.
fn text(fields: &Map<String, Value>, key: &'static str) -> Option<String> {
    match fields.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Numeric field; quoted numbers are accepted because older files wrote them.
fn number(fields: &Map<String, Value>, key: &'static str) -> Result<f64, DecodeError> {
    let value = fields.get(key).ok_or(DecodeError::MissingField(key))?;
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        Value::Null => return Err(DecodeError::MissingField(key)),
        _ => None,
    };
    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(DecodeError::InvalidNumber {
            field: key,
            value: value.to_string(),
        }),
    }
}

fn invalid(field: &'static str, value: f64) -> DecodeError {
    DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Record> {
        let mut margaux = Record::wine(
            "Château Margaux",
            "Vin rouge de Bordeaux",
            5,
            2015,
            date(2024, 2, 29),
            150.0,
            "Cabernet Sauvignon, Merlot",
            "Bordeaux, France",
        );
        margaux.dlc = Some("2045".into());
        margaux.position = Some("Rack A3".into());
        margaux.aging_phase = Some("apogée".into());
        margaux.rating = 18.5;
        margaux.image = Some("images/margaux.png".into());

        let chablis = Record::wine("Chablis", "Vin blanc", 12, 2021, date(2025, 1, 3), 24.9, "Chardonnay", "Bourgogne");
        vec![margaux, chablis]
    }

    fn assert_same_content(left: &[Record], right: &[Record]) {
        assert_eq!(left.len(), right.len());
        for (a, b) in left.iter().zip(right) {
            assert_eq!(a.denomination, b.denomination);
            assert_eq!(a.description, b.description);
            assert_eq!(a.quantity, b.quantity);
            assert_eq!(a.production_year, b.production_year);
            assert_eq!(a.date_added, b.date_added);
            assert_eq!(a.price, b.price);
            assert_eq!(a.dlc, b.dlc);
            assert_eq!(a.image, b.image);
            assert_eq!(a.position, b.position);
            assert_eq!(a.aging_phase, b.aging_phase);
            assert_eq!(a.rating, b.rating);
            assert_eq!(a.kind, b.kind);
        }
    }

    #[test]
    fn round_trip_preserves_every_field_and_order() {
        let records = sample();
        let document = encode(&records).unwrap();
        assert_same_content(&decode(&document), &records);
    }

    #[test]
    fn encode_uses_legacy_keys_in_order() {
        let mut item = Record::item("Tire-bouchon", "outil", 1, 2020, date(2024, 5, 6), 9.5);
        item.rating = 0.0;
        let document = encode(&[item]).unwrap();
        assert_eq!(
            document,
            "[{\"denomination\":\"Tire-bouchon\",\"description\":\"outil\",\"quantite\":1,\
             \"anneeProduction\":2020,\"dateAjout\":\"2024-05-06\",\"prix\":9.5,\"dlc\":\"\",\
             \"image\":\"\",\"position\":\"\",\"phaseVieillissement\":\"\",\"note\":0.0,\
             \"cepage\":\"\",\"region\":\"\"}]"
        );
    }

    #[test]
    fn records_are_joined_with_legacy_boundary() {
        let document = encode(&sample()).unwrap();
        assert_eq!(document.matches(RECORD_BOUNDARY).count(), 1);
        assert!(document.starts_with("[{") && document.ends_with("}]"));
    }

    #[test]
    fn record_missing_quantity_is_dropped() {
        let document = r#"[
            {"denomination":"Margaux","description":"Vin rouge","quantite":5,"anneeProduction":2015,
             "dateAjout":"2024-01-01","prix":150.0,"note":0,"cepage":"Merlot","region":"Bordeaux"},
            {"denomination":"Broken","description":"Vin blanc","anneeProduction":2015,
             "dateAjout":"2024-01-01","prix":10.0,"note":0,"cepage":"Chardonnay","region":"Loire"}
        ]"#;
        let records = decode(document);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].denomination, "Margaux");
    }

    #[test]
    fn bad_dates_and_numbers_are_reported() {
        let value: Value = serde_json::from_str(
            r#"{"denomination":"X","quantite":"abc","anneeProduction":2015,"dateAjout":"2024-01-01","prix":1}"#,
        )
        .unwrap();
        assert!(matches!(
            decode_record(&value),
            Err(DecodeError::InvalidNumber { field: "quantite", .. })
        ));

        let value: Value = serde_json::from_str(
            r#"{"denomination":"X","quantite":1,"anneeProduction":2015,"dateAjout":"01/01/2024","prix":1}"#,
        )
        .unwrap();
        assert_eq!(
            decode_record(&value).unwrap_err(),
            DecodeError::InvalidDate("01/01/2024".into())
        );
    }

    #[test]
    fn quoted_numbers_are_accepted() {
        let value: Value = serde_json::from_str(
            r#"{"denomination":"Petrus","description":"Vin rouge","quantite":"1","anneeProduction":"2010",
                "dateAjout":"2023-12-24","prix":"300.5","note":"","cepage":"Merlot","region":"Pomerol"}"#,
        )
        .unwrap();
        let record = decode_record(&value).unwrap();
        assert_eq!(record.quantity, 1);
        assert_eq!(record.production_year, 2010);
        assert_eq!(record.price, 300.5);
        assert_eq!(record.rating, 0.0);
        assert!(record.is_wine());
    }

    #[test]
    fn negative_or_fractional_quantity_is_rejected() {
        for raw in ["-1", "2.5"] {
            let value: Value = serde_json::from_str(&format!(
                r#"{{"denomination":"X","quantite":{raw},"anneeProduction":2015,"dateAjout":"2024-01-01","prix":1}}"#
            ))
            .unwrap();
            assert!(decode_record(&value).is_err(), "quantite {raw} should fail");
        }
    }

    #[test]
    fn generic_items_round_trip_without_grape() {
        let item = Record::item("Carafe", "verre", 2, 2019, date(2024, 7, 14), 35.0);
        let decoded = decode(&encode(std::slice::from_ref(&item)).unwrap());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].kind, ItemKind::Generic);
    }

    #[test]
    fn legacy_unescaped_quotes_only_lose_the_broken_record() {
        let document = concat!(
            r#"[{"denomination":"Margaux","description":"Vin rouge","quantite":5,"anneeProduction":2015,"#,
            r#""dateAjout":"2024-01-01","prix":150.0,"dlc":"","image":"","position":"","phaseVieillissement":"","#,
            r#""note":0.0,"cepage":"Merlot","region":"Bordeaux"},"#,
            r#"{"denomination":"Le "Petit" Cheval","description":"Vin rouge","quantite":1,"anneeProduction":2016,"#,
            r#""dateAjout":"2024-01-01","prix":90.0,"dlc":"","image":"","position":"","phaseVieillissement":"","#,
            r#""note":0.0,"cepage":"Merlot","region":"Bordeaux"},"#,
            r#"{"denomination":"Chablis","description":"Vin blanc","quantite":6,"anneeProduction":2021,"#,
            r#""dateAjout":"2024-01-02","prix":20.0,"dlc":"","image":"","position":"","phaseVieillissement":"","#,
            r#""note":0.0,"cepage":"Chardonnay","region":"Bourgogne"}]"#,
        );
        let names: Vec<_> = decode(document).into_iter().map(|r| r.denomination).collect();
        assert_eq!(names, ["Margaux", "Chablis"]);
    }

    #[test]
    fn blank_and_empty_documents_decode_to_nothing() {
        assert!(decode("").is_empty());
        assert!(decode("   \n").is_empty());
        assert!(decode("[]").is_empty());
    }

    #[test]
    fn long_decimal_prices_come_back_exactly() {
        let prices = [
            207.96181086732759,
            985.6906946328695,
            50.926322293870044,
            210.73947491912486,
        ];
        let records: Vec<Record> = prices
            .iter()
            .enumerate()
            .map(|(index, price)| {
                Record::item(format!("lot-{index}"), "", 1, 2020, date(2024, 1, 1), *price)
            })
            .collect();

        let decoded = decode(&encode(&records).unwrap());
        let decoded_prices: Vec<f64> = decoded.iter().map(|record| record.price).collect();
        assert_eq!(decoded_prices, prices);
    }

    #[test]
    fn whitespace_optionals_are_kept() {
        let mut item = Record::item("Carafe", "verre", 2, 2019, date(2024, 7, 14), 35.0);
        item.dlc = Some(" ".into());
        item.position = Some("  B2 ".into());

        let decoded = decode(&encode(std::slice::from_ref(&item)).unwrap());
        assert_eq!(decoded[0].dlc.as_deref(), Some(" "));
        assert_eq!(decoded[0].position.as_deref(), Some("  B2 "));
        assert_eq!(decoded[0].image, None);
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        /// Text that stresses the legacy layout: quotes, commas and the record
        /// boundary itself.
        fn awkward_text() -> impl Strategy<Value = String> {
            prop_oneof![
                "[a-zA-Zé0-9 ,\"{}]{0,12}",
                "[a-z ,\"]{0,6}".prop_map(|part| format!("{part}}},{{{part}")),
            ]
        }

        fn any_amount() -> impl Strategy<Value = f64> {
            use proptest::num::f64::{NORMAL, POSITIVE, SUBNORMAL, ZERO};
            POSITIVE | NORMAL | SUBNORMAL | ZERO
        }

        fn any_date() -> impl Strategy<Value = NaiveDate> {
            (1900i32..2100, 1u32..=365)
                .prop_map(|(year, ordinal)| NaiveDate::from_yo_opt(year, ordinal).unwrap())
        }

        fn any_kind() -> impl Strategy<Value = ItemKind> {
            prop_oneof![
                Just(ItemKind::Generic),
                ("[a-zA-Z ,\"{}]{1,10}", awkward_text()).prop_map(|(grape_variety, region)| {
                    ItemKind::Wine(WineDetails {
                        grape_variety,
                        region,
                    })
                }),
            ]
        }

        fn any_record() -> impl Strategy<Value = Record> {
            let core = (
                "[A-Za-z][a-zA-Z0-9 ,\"{}]{0,12}",
                awkward_text(),
                any::<u32>(),
                any::<i32>(),
                any_date(),
                any_amount(),
            );
            let extras = (
                proptest::option::of("[a-z ,\"{}]{1,8}"),
                proptest::option::of(awkward_text().prop_filter("set", |text| !text.is_empty())),
                proptest::option::of("[a-z ,\"{}]{1,8}"),
                proptest::option::of("[a-z ,\"{}]{1,8}"),
                any_amount(),
                any_kind(),
            );
            (core, extras).prop_map(
                |(
                    (denomination, description, quantity, year, date_added, price),
                    (dlc, image, position, aging_phase, rating, kind),
                )| {
                    let mut record =
                        Record::item(denomination, description, quantity, year, date_added, price);
                    record.dlc = dlc;
                    record.image = image;
                    record.position = position;
                    record.aging_phase = aging_phase;
                    record.rating = rating;
                    record.kind = kind;
                    record
                },
            )
        }

        proptest! {
            #[test]
            fn any_record_list_round_trips(
                records in proptest::collection::vec(any_record(), 0..8)
            ) {
                let document = encode(&records).unwrap();
                assert_same_content(&decode(&document), &records);
            }
        }
    }
}
