//! The in-memory cellar: a bounded, ordered collection of records plus the
//! aggregate queries the UI renders and a synchronous change feed. The cellar
//! exclusively owns its records; callers get read-only views and mutate
//! through `add`, `update` and `remove`.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Record, RecordId};

/// Keywords (lowercase) that mark a wine as red.
const RED_KEYWORDS: &[&str] = &["red", "rouge"];
/// Keywords (lowercase) that mark a wine as white.
const WHITE_KEYWORDS: &[&str] = &["white", "blanc"];

/// Why a cellar mutation did not happen. None of these are fatal; the cellar
/// is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CellarError {
    #[error("Cellar is full ({capacity} records).")]
    CapacityExceeded { capacity: usize },
    #[error("No record with id {0}.")]
    NotFound(RecordId),
    #[error("A record named \"{0}\" already exists.")]
    DuplicateDenomination(String),
    #[error("{0}")]
    InvalidRecord(String),
}

/// Payload delivered to observers after every successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CellarEvent {
    Added(Record),
    Updated { before: Record, after: Record },
    Removed(Record),
}

impl CellarEvent {
    /// The record as it stands after the change (or as it was, for removals).
    pub fn record(&self) -> &Record {
        match self {
            CellarEvent::Added(record) | CellarEvent::Removed(record) => record,
            CellarEvent::Updated { after, .. } => after,
        }
    }
}

/// Anything that wants to hear about cellar changes. Closures qualify, which
/// keeps simple subscribers to a one-liner.
pub trait CellarObserver {
    fn on_change(&mut self, event: &CellarEvent);
}

impl<F> CellarObserver for F
where
    F: FnMut(&CellarEvent),
{
    fn on_change(&mut self, event: &CellarEvent) {
        (*self)(event)
    }
}

/// Handle returned by `subscribe`, needed to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Food pairing derived from a wine's colour keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    Steak,
    Fish,
}

/// One suggestion line for the pairing panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingSuggestion {
    pub record: RecordId,
    pub denomination: String,
    pub pairing: Pairing,
}

impl fmt::Display for PairingSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pairing {
            Pairing::Steak => write!(f, "Pairing: steak with red wine ({})", self.denomination),
            Pairing::Fish => write!(f, "Pairing: fish with white wine ({})", self.denomination),
        }
    }
}

/// Bounded, ordered store of cellar records.
pub struct Cellar {
    capacity: usize,
    temperature: f64,
    humidity: f64,
    records: Vec<Record>,
    observers: Vec<(SubscriptionId, Box<dyn CellarObserver>)>,
    next_subscription: u64,
}

impl Cellar {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            temperature: 0.0,
            humidity: 0.0,
            records: Vec::new(),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Record the storage conditions shown in the header.
    pub fn set_conditions(&mut self, temperature: f64, humidity: f64) {
        self.temperature = temperature;
        self.humidity = humidity;
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Read-only view in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn find_by_denomination(&self, denomination: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.denomination == denomination)
    }

    /// Register an observer. Observers are called in subscription order.
    pub fn subscribe(&mut self, observer: Box<dyn CellarObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Drop an observer. Returns `false` when the handle was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    /// Append a record if there is room and its denomination is free.
    pub fn add(&mut self, record: Record) -> Result<RecordId, CellarError> {
        record.validate().map_err(CellarError::InvalidRecord)?;

        if self.is_full() {
            warn!(
                denomination = %record.denomination,
                capacity = self.capacity,
                "cellar full, record rejected"
            );
            return Err(CellarError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        self.ensure_unique(&record.denomination, None)?;

        let id = record.id();
        info!(%id, denomination = %record.denomination, "record added");
        self.records.push(record.clone());
        self.notify(CellarEvent::Added(record));
        Ok(id)
    }

    /// Apply `edit` to the record with `id`. The edit runs on a copy so a
    /// rejected change leaves the stored record untouched.
    pub fn update<F>(&mut self, id: RecordId, edit: F) -> Result<(), CellarError>
    where
        F: FnOnce(&mut Record),
    {
        let index = self.position(id).ok_or(CellarError::NotFound(id))?;

        let before = self.records[index].clone();
        let mut after = before.clone();
        edit(&mut after);

        after.validate().map_err(CellarError::InvalidRecord)?;
        self.ensure_unique(&after.denomination, Some(id))?;

        info!(%id, denomination = %after.denomination, "record updated");
        self.records[index] = after.clone();
        self.notify(CellarEvent::Updated { before, after });
        Ok(())
    }

    /// Remove the record with `id`, returning it.
    pub fn remove(&mut self, id: RecordId) -> Result<Record, CellarError> {
        let Some(index) = self.position(id) else {
            warn!(%id, "remove requested for unknown record");
            return Err(CellarError::NotFound(id));
        };

        let removed = self.records.remove(index);
        info!(%id, denomination = %removed.denomination, "record removed");
        self.notify(CellarEvent::Removed(removed.clone()));
        Ok(removed)
    }

    /// Bulk-load records from a backend, one `add` at a time. Records that do
    /// not fit or collide are logged and skipped; the count of skipped records
    /// is returned.
    pub fn hydrate(&mut self, records: Vec<Record>) -> usize {
        let mut skipped = 0;
        for record in records {
            let denomination = record.denomination.clone();
            if let Err(err) = self.add(record) {
                warn!(%denomination, error = %err, "skipping stored record");
                skipped += 1;
            }
        }
        skipped
    }

    /// Sum of price times quantity over every record.
    pub fn total_value(&self) -> f64 {
        self.records.iter().map(Record::value).sum()
    }

    /// Mean unit price; an empty cellar averages to zero.
    pub fn average_price(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let total: f64 = self.records.iter().map(|record| record.price).sum();
        total / self.records.len() as f64
    }

    /// Colour-keyword pairing hints for every wine, in cellar order.
    pub fn pairing_suggestions(&self) -> Vec<PairingSuggestion> {
        self.records
            .iter()
            .filter(|record| record.is_wine())
            .filter_map(|record| {
                let description = record.description.to_lowercase();
                let pairing = if contains_any(&description, RED_KEYWORDS) {
                    Pairing::Steak
                } else if contains_any(&description, WHITE_KEYWORDS) {
                    Pairing::Fish
                } else {
                    return None;
                };
                Some(PairingSuggestion {
                    record: record.id(),
                    denomination: record.denomination.clone(),
                    pairing,
                })
            })
            .collect()
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    fn ensure_unique(&self, denomination: &str, ignore: Option<RecordId>) -> Result<(), CellarError> {
        let taken = self
            .records
            .iter()
            .any(|record| Some(record.id()) != ignore && record.denomination == denomination);
        if taken {
            Err(CellarError::DuplicateDenomination(denomination.to_string()))
        } else {
            Ok(())
        }
    }

    fn notify(&mut self, event: CellarEvent) {
        debug!(observers = self.observers.len(), "dispatching cellar event");
        for (_, observer) in self.observers.iter_mut() {
            observer.on_change(&event);
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::NaiveDate;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn wine(name: &str, description: &str, price: f64, quantity: u32) -> Record {
        Record::wine(name, description, quantity, 2015, date(), price, "Merlot", "Bordeaux")
    }

    #[test]
    fn capacity_two_end_to_end() {
        let mut cellar = Cellar::new(2);
        cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        cellar.add(wine("Petrus", "Vin rouge", 300.0, 1)).unwrap();

        let err = cellar.add(wine("Third", "Vin blanc", 10.0, 1)).unwrap_err();
        assert_eq!(err, CellarError::CapacityExceeded { capacity: 2 });
        assert_eq!(cellar.len(), 2);

        assert_eq!(cellar.total_value(), 1050.0);
        assert_eq!(cellar.average_price(), 225.0);
    }

    #[test]
    fn empty_cellar_averages_to_zero() {
        let cellar = Cellar::new(5);
        assert_eq!(cellar.average_price(), 0.0);
        assert_eq!(cellar.total_value(), 0.0);
    }

    #[test]
    fn removing_unknown_id_leaves_list_untouched() {
        let mut cellar = Cellar::new(5);
        cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        cellar.add(wine("Chablis", "Vin blanc", 20.0, 6)).unwrap();
        let snapshot = cellar.records().to_vec();

        let missing = RecordId::new();
        assert_eq!(cellar.remove(missing), Err(CellarError::NotFound(missing)));
        assert_eq!(cellar.records(), snapshot.as_slice());
    }

    #[test]
    fn remove_returns_record_and_keeps_order() {
        let mut cellar = Cellar::new(5);
        cellar.add(wine("A", "", 1.0, 1)).unwrap();
        let b = cellar.add(wine("B", "", 1.0, 1)).unwrap();
        cellar.add(wine("C", "", 1.0, 1)).unwrap();

        let removed = cellar.remove(b).unwrap();
        assert_eq!(removed.denomination, "B");
        let names: Vec<_> = cellar.records().iter().map(|r| r.denomination.as_str()).collect();
        assert_eq!(names, ["A", "C"]);
    }

    #[test]
    fn duplicate_denomination_is_rejected() {
        let mut cellar = Cellar::new(5);
        cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        let err = cellar.add(wine("Margaux", "Vin rouge", 10.0, 1)).unwrap_err();
        assert_eq!(err, CellarError::DuplicateDenomination("Margaux".into()));
        assert_eq!(cellar.len(), 1);
    }

    #[test]
    fn update_keeps_identity_across_rename() {
        let mut cellar = Cellar::new(5);
        let id = cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();

        cellar
            .update(id, |record| {
                record.denomination = "Château Margaux".into();
                record.quantity = 4;
            })
            .unwrap();

        let record = cellar.get(id).unwrap();
        assert_eq!(record.denomination, "Château Margaux");
        assert_eq!(record.quantity, 4);
        assert!(cellar.find_by_denomination("Margaux").is_none());
        assert_eq!(cellar.find_by_denomination("Château Margaux").unwrap().id(), id);
    }

    #[test]
    fn rejected_update_leaves_record_unchanged() {
        let mut cellar = Cellar::new(5);
        let margaux = cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        cellar.add(wine("Petrus", "Vin rouge", 300.0, 1)).unwrap();
        let snapshot = cellar.records().to_vec();

        let err = cellar
            .update(margaux, |record| record.denomination = "Petrus".into())
            .unwrap_err();
        assert_eq!(err, CellarError::DuplicateDenomination("Petrus".into()));

        let err = cellar.update(margaux, |record| record.price = -5.0).unwrap_err();
        assert!(matches!(err, CellarError::InvalidRecord(_)));

        assert_eq!(cellar.records(), snapshot.as_slice());
    }

    #[test]
    fn observers_receive_events_in_subscription_order() {
        let log: Rc<RefCell<Vec<String>>> = Rc::default();
        let mut cellar = Cellar::new(5);

        let first = Rc::clone(&log);
        let first_id = cellar.subscribe(Box::new(move |event: &CellarEvent| {
            first.borrow_mut().push(format!("first:{}", event.record().denomination));
        }));
        let second = Rc::clone(&log);
        cellar.subscribe(Box::new(move |event: &CellarEvent| {
            let kind = match event {
                CellarEvent::Added(_) => "added",
                CellarEvent::Updated { .. } => "updated",
                CellarEvent::Removed(_) => "removed",
            };
            second.borrow_mut().push(format!("second:{kind}"));
        }));

        let id = cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        assert!(cellar.unsubscribe(first_id));
        assert!(!cellar.unsubscribe(first_id));
        cellar.remove(id).unwrap();

        assert_eq!(
            *log.borrow(),
            ["first:Margaux", "second:added", "second:removed"]
        );
    }

    #[test]
    fn failed_mutations_do_not_notify() {
        let count = Rc::new(RefCell::new(0));
        let mut cellar = Cellar::new(1);
        let counter = Rc::clone(&count);
        cellar.subscribe(Box::new(move |_: &CellarEvent| *counter.borrow_mut() += 1));

        cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        let _ = cellar.add(wine("Petrus", "Vin rouge", 300.0, 1));
        let _ = cellar.remove(RecordId::new());

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn pairing_follows_colour_keywords() {
        let mut cellar = Cellar::new(10);
        cellar.add(wine("Margaux", "Vin rouge", 150.0, 5)).unwrap();
        cellar.add(wine("Chablis", "Vin blanc", 20.0, 6)).unwrap();
        cellar.add(wine("Tavel", "Vin rosé", 15.0, 3)).unwrap();
        cellar
            .add(Record::item("Red corkscrew", "red handle", 1, 2020, date(), 9.0))
            .unwrap();

        let suggestions = cellar.pairing_suggestions();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].denomination, "Margaux");
        assert_eq!(suggestions[0].pairing, Pairing::Steak);
        assert_eq!(suggestions[1].denomination, "Chablis");
        assert_eq!(suggestions[1].pairing, Pairing::Fish);
        assert_eq!(
            suggestions[0].to_string(),
            "Pairing: steak with red wine (Margaux)"
        );
    }

    #[test]
    fn hydrate_skips_overflow_and_duplicates() {
        let mut cellar = Cellar::new(2);
        let skipped = cellar.hydrate(vec![
            wine("A", "", 1.0, 1),
            wine("A", "", 2.0, 1),
            wine("B", "", 1.0, 1),
            wine("C", "", 1.0, 1),
        ]);
        assert_eq!(skipped, 2);
        assert_eq!(cellar.len(), 2);
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn aggregates_match_their_definitions(
                entries in proptest::collection::vec((0.0f64..10_000.0, 0u32..500), 0..20)
            ) {
                let mut cellar = Cellar::new(entries.len());
                for (index, (price, quantity)) in entries.iter().enumerate() {
                    cellar.add(wine(&format!("wine-{index}"), "", *price, *quantity)).unwrap();
                }

                let expected_total: f64 = entries.iter().map(|(p, q)| p * f64::from(*q)).sum();
                prop_assert!((cellar.total_value() - expected_total).abs() < 1e-6);

                if entries.is_empty() {
                    prop_assert_eq!(cellar.average_price(), 0.0);
                } else {
                    let expected_avg = entries.iter().map(|(p, _)| p).sum::<f64>() / entries.len() as f64;
                    prop_assert!((cellar.average_price() - expected_avg).abs() < 1e-6);
                }
            }
        }
    }
}
