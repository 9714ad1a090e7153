use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the entity name may live under, in lookup order.
pub(crate) const NAME_KEYS: [&str; 2] = ["name", "archetype"];

pub(crate) const FIRST_RELEASE_DATE: &str = "firstReleaseDate";
pub(crate) const LATEST_RELEASE_DATE: &str = "latestReleaseDate";
pub(crate) const TOTAL_CARDS: &str = "totalCards";

/// Fields an enrichment run may write. Everything else is carried through.
pub(crate) const MANAGED_FIELDS: [&str; 3] = [FIRST_RELEASE_DATE, LATEST_RELEASE_DATE, TOTAL_CARDS];

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Strategy {
    /// Per-card release dates from the card lookup itself.
    Direct,
    /// Per-card set memberships mapped through the set release table.
    Indexed,
}

impl Strategy {
    pub(crate) fn reports_count(self) -> bool {
        matches!(self, Strategy::Direct)
    }

    pub(crate) fn default_emit(self) -> EmitMode {
        match self {
            Strategy::Direct => EmitMode::Regenerate,
            Strategy::Indexed => EmitMode::Patch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EmitMode {
    /// Rewrite the whole literal from the decoded records.
    Regenerate,
    /// Replace only the date values in place.
    Patch,
}

/// Earliest and latest release date of an archetype, plus the number of
/// cards the lookup matched when the strategy reports one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DateRange {
    pub(crate) first: Option<String>,
    pub(crate) latest: Option<String>,
    pub(crate) count: Option<usize>,
}

impl DateRange {
    pub(crate) fn empty(count: Option<usize>) -> Self {
        Self {
            first: None,
            latest: None,
            count,
        }
    }

    /// Min/max over the values that parse as `YYYY-MM-DD`; the rest are dropped.
    pub(crate) fn from_dates<'a>(dates: impl IntoIterator<Item = &'a str>, count: Option<usize>) -> Self {
        let mut first: Option<NaiveDate> = None;
        let mut latest: Option<NaiveDate> = None;
        for raw in dates {
            let Ok(date) = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) else {
                tracing::debug!(value = raw, "dropping unparseable release date");
                continue;
            };
            first = Some(first.map_or(date, |d| d.min(date)));
            latest = Some(latest.map_or(date, |d| d.max(date)));
        }
        Self {
            first: first.map(|d| d.format(DATE_FORMAT).to_string()),
            latest: latest.map(|d| d.format(DATE_FORMAT).to_string()),
            count,
        }
    }
}

/// True when both dates parse and `first` falls after `latest`.
fn out_of_order(first: Option<&str>, latest: Option<&str>) -> bool {
    let parse = |raw: &str| NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok();
    match (first.and_then(parse), latest.and_then(parse)) {
        (Some(first), Some(latest)) => first > latest,
        _ => false,
    }
}

/// One entry of the embedded archetype array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct ArchetypeRecord {
    fields: Map<String, Value>,
}

impl From<Map<String, Value>> for ArchetypeRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl ArchetypeRecord {
    pub(crate) fn name(&self) -> Option<&str> {
        NAME_KEYS
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn date(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    fn is_unset(&self, key: &str) -> bool {
        matches!(self.fields.get(key), None | Some(Value::Null))
    }

    /// Merge a resolved range. Without `refresh`, populated fields are kept,
    /// and a single unset date is only filled when it stays on the right side
    /// of the curated one. Returns whether anything changed.
    pub(crate) fn apply(&mut self, range: &DateRange, refresh: bool) -> bool {
        let as_value = |date: &Option<String>| date.clone().map_or(Value::Null, Value::String);
        let mut first = as_value(&range.first);
        let mut latest = as_value(&range.latest);

        if !refresh {
            let keep_first = !self.is_unset(FIRST_RELEASE_DATE);
            let keep_latest = !self.is_unset(LATEST_RELEASE_DATE);
            if keep_first != keep_latest {
                let merged_first = if keep_first { self.date(FIRST_RELEASE_DATE) } else { range.first.as_deref() };
                let merged_latest = if keep_latest { self.date(LATEST_RELEASE_DATE) } else { range.latest.as_deref() };
                if out_of_order(merged_first, merged_latest) {
                    tracing::warn!(
                        archetype = self.name().unwrap_or("<unnamed>"),
                        first = merged_first.unwrap_or_default(),
                        latest = merged_latest.unwrap_or_default(),
                        "resolved date conflicts with curated date; left unset"
                    );
                    if keep_first {
                        latest = Value::Null;
                    } else {
                        first = Value::Null;
                    }
                }
            }
        }

        let mut updates = vec![(FIRST_RELEASE_DATE, first), (LATEST_RELEASE_DATE, latest)];
        if let Some(count) = range.count {
            updates.push((TOTAL_CARDS, Value::from(count)));
        }

        let mut changed = false;
        for (key, value) in updates {
            if !refresh && !self.is_unset(key) {
                continue;
            }
            if self.fields.get(key) != Some(&value) {
                self.fields.insert(key.to_string(), value);
                changed = true;
            }
        }
        changed
    }

    /// Add null placeholders for absent date fields.
    pub(crate) fn ensure_date_fields(&mut self) {
        for key in [FIRST_RELEASE_DATE, LATEST_RELEASE_DATE] {
            self.fields.entry(key).or_insert(Value::Null);
        }
    }
}
