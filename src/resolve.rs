//! Reducing an archetype's cards to its first and latest release date.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{Card, CardSetRef, CardSource, DateRange, LookupError, SetInfo, Strategy};

/// Set release dates, keyed by set code and by set name.
#[derive(Debug, Clone, Default)]
pub(crate) struct SetDateIndex {
    by_code: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl SetDateIndex {
    pub(crate) fn from_sets(sets: &[SetInfo]) -> Self {
        let mut index = Self::default();
        for set in sets {
            let Some(date) = set.tcg_date.as_deref().filter(|d| !d.is_empty()) else {
                continue;
            };
            if let Some(code) = &set.set_code {
                index.by_code.insert(code.clone(), date.to_string());
            }
            if let Some(name) = &set.set_name {
                index.by_name.insert(name.clone(), date.to_string());
            }
        }
        index
    }

    pub(crate) fn len(&self) -> usize {
        self.by_code.len().max(self.by_name.len())
    }

    /// Release date of a printing: exact code, then the code's prefix
    /// (`LOB-EN001` → `LOB`), then the set name.
    pub(crate) fn date_for(&self, printing: &CardSetRef) -> Option<&str> {
        let by_code = printing.set_code.as_deref().and_then(|code| {
            self.by_code.get(code).or_else(|| {
                let (prefix, _) = code.split_once('-')?;
                self.by_code.get(prefix)
            })
        });
        by_code
            .or_else(|| self.by_name.get(printing.set_name.as_deref()?))
            .map(String::as_str)
    }
}

pub(crate) fn direct_range(cards: &[Card]) -> DateRange {
    DateRange::from_dates(cards.iter().filter_map(Card::tcg_date), Some(cards.len()))
}

pub(crate) fn indexed_range(cards: &[Card], index: &SetDateIndex) -> DateRange {
    let dates = cards
        .iter()
        .flat_map(|card| card.card_sets.iter())
        .filter_map(|printing| index.date_for(printing));
    DateRange::from_dates(dates, None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Fetched,
    Cached,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub(crate) range: DateRange,
    pub(crate) outcome: Outcome,
}

/// Resolves archetype names for the duration of one run. Holds the run's
/// set index and memo cache; nothing outlives the value.
pub(crate) struct DateResolver<'a, S: CardSource + ?Sized> {
    source: &'a S,
    strategy: Strategy,
    delay: Duration,
    set_index: Option<SetDateIndex>,
    cache: HashMap<String, DateRange>,
    pauses: usize,
}

impl<'a, S: CardSource + ?Sized> DateResolver<'a, S> {
    pub(crate) fn new(source: &'a S, strategy: Strategy, delay: Duration) -> Self {
        Self {
            source,
            strategy,
            delay,
            set_index: None,
            cache: HashMap::new(),
            pauses: 0,
        }
    }

    /// Use a prebuilt index instead of fetching one.
    #[cfg(test)]
    pub(crate) fn with_set_index(mut self, index: SetDateIndex) -> Self {
        self.set_index = Some(index);
        self
    }

    /// Never fails: a lookup error is logged and degrades to an empty range.
    pub(crate) fn resolve(&mut self, name: &str) -> Resolution {
        if let Some(range) = self.cache.get(name) {
            debug!(archetype = name, "memo cache hit");
            return Resolution {
                range: range.clone(),
                outcome: Outcome::Cached,
            };
        }
        match self.lookup(name) {
            Ok(range) => {
                self.cache.insert(name.to_string(), range.clone());
                Resolution {
                    range,
                    outcome: Outcome::Fetched,
                }
            }
            Err(err) => {
                warn!(archetype = name, error = %err, "archetype lookup failed");
                let count = self.strategy.reports_count().then_some(0);
                Resolution {
                    range: DateRange::empty(count),
                    outcome: Outcome::Failed,
                }
            }
        }
    }

    fn lookup(&mut self, name: &str) -> Result<DateRange, LookupError> {
        match self.strategy {
            Strategy::Direct => {
                let cards = self.source.archetype_cards(name, true)?;
                self.pause();
                Ok(direct_range(&cards))
            }
            Strategy::Indexed => {
                self.ensure_set_index();
                let cards = self.source.archetype_cards(name, false)?;
                self.pause();
                let index = self.set_index.get_or_insert_with(SetDateIndex::default);
                Ok(indexed_range(&cards, index))
            }
        }
    }

    fn ensure_set_index(&mut self) {
        if self.set_index.is_some() {
            return;
        }
        let index = match self.source.card_sets() {
            Ok(sets) => {
                self.pause();
                let index = SetDateIndex::from_sets(&sets);
                info!(sets = index.len(), "loaded set release dates");
                index
            }
            Err(err) => {
                warn!(error = %err, "could not load set release dates; indexed lookups will be empty");
                SetDateIndex::default()
            }
        };
        self.set_index = Some(index);
    }

    /// Number of successful remote calls followed by the request delay.
    pub(crate) fn pauses(&self) -> usize {
        self.pauses
    }

    fn pause(&mut self) {
        self.pauses += 1;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}
