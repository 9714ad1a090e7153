use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{EnrichError, LookupError};

// ── Payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Card {
    #[serde(default)]
    pub(crate) misc_info: Vec<MiscInfo>,
    #[serde(default)]
    pub(crate) card_sets: Vec<CardSetRef>,
}

impl Card {
    /// TCG release date carried in the card's first misc entry.
    pub(crate) fn tcg_date(&self) -> Option<&str> {
        self.misc_info.first()?.tcg_date.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MiscInfo {
    #[serde(default)]
    pub(crate) tcg_date: Option<String>,
}

/// A printing of a card in a set, e.g. `LOB-EN001`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CardSetRef {
    #[serde(default)]
    pub(crate) set_code: Option<String>,
    #[serde(default)]
    pub(crate) set_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SetInfo {
    #[serde(default)]
    pub(crate) set_code: Option<String>,
    #[serde(default)]
    pub(crate) set_name: Option<String>,
    #[serde(default)]
    pub(crate) tcg_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardInfoResponse {
    #[serde(default)]
    data: Vec<Card>,
}

// ── Source ──────────────────────────────────────────────────────────────

/// Read-only view of the remote card database.
pub(crate) trait CardSource {
    /// All cards of an archetype. `with_misc` asks for per-card release dates.
    fn archetype_cards(&self, archetype: &str, with_misc: bool) -> Result<Vec<Card>, LookupError>;

    /// Every set with its release date.
    fn card_sets(&self) -> Result<Vec<SetInfo>, LookupError>;
}

pub(crate) struct YgoProDeckClient {
    agent: ureq::Agent,
    base: Url,
}

impl YgoProDeckClient {
    pub(crate) fn new(api_base: &str, timeout: Duration) -> Result<Self, EnrichError> {
        let mut base = Url::parse(api_base)
            .map_err(|e| EnrichError::Config(format!("invalid api_base {api_base:?}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Ok(Self { agent, base })
    }

    fn endpoint(&self, name: &str) -> Result<Url, LookupError> {
        self.base
            .join(name)
            .map_err(|e| LookupError::Transport(format!("bad endpoint {name}: {e}")))
    }

    fn fetch<T: DeserializeOwned>(&self, request: ureq::Request) -> Result<T, LookupError> {
        match request.call() {
            Ok(resp) => resp
                .into_json::<T>()
                .map_err(|e| LookupError::Payload(e.to_string())),
            Err(ureq::Error::Status(code, _)) => Err(LookupError::Status { code }),
            Err(err) => Err(LookupError::Transport(err.to_string())),
        }
    }
}

impl CardSource for YgoProDeckClient {
    fn archetype_cards(&self, archetype: &str, with_misc: bool) -> Result<Vec<Card>, LookupError> {
        let url = self.endpoint("cardinfo.php")?;
        let mut request = self.agent.get(url.as_str()).query("archetype", archetype);
        if with_misc {
            request = request.query("misc", "yes");
        }
        tracing::debug!(archetype, "fetching archetype cards");
        let response: CardInfoResponse = self.fetch(request)?;
        Ok(response.data)
    }

    fn card_sets(&self) -> Result<Vec<SetInfo>, LookupError> {
        let url = self.endpoint("cardsets.php")?;
        tracing::debug!("fetching card sets");
        self.fetch(self.agent.get(url.as_str()))
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    use super::*;

    /// In-memory card database that records every call made against it.
    #[derive(Default)]
    pub(crate) struct FixtureSource {
        cards: HashMap<String, Vec<Card>>,
        failing: HashSet<String>,
        sets: Vec<SetInfo>,
        sets_fail: bool,
        calls: RefCell<Vec<String>>,
    }

    pub(crate) fn dated_card(date: &str) -> Card {
        Card {
            misc_info: vec![MiscInfo {
                tcg_date: Some(date.to_string()),
            }],
            card_sets: Vec::new(),
        }
    }

    pub(crate) fn printed_card(set_codes: &[&str]) -> Card {
        Card {
            misc_info: Vec::new(),
            card_sets: set_codes
                .iter()
                .map(|code| CardSetRef {
                    set_code: Some(code.to_string()),
                    set_name: None,
                })
                .collect(),
        }
    }

    impl FixtureSource {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_dates(self, archetype: &str, dates: &[&str]) -> Self {
            let cards = dates.iter().map(|d| dated_card(d)).collect();
            self.with_cards(archetype, cards)
        }

        pub(crate) fn with_cards(mut self, archetype: &str, cards: Vec<Card>) -> Self {
            self.cards.insert(archetype.to_string(), cards);
            self
        }

        pub(crate) fn failing(mut self, archetype: &str) -> Self {
            self.failing.insert(archetype.to_string());
            self
        }

        pub(crate) fn with_set(mut self, code: &str, name: &str, date: &str) -> Self {
            self.sets.push(SetInfo {
                set_code: Some(code.to_string()),
                set_name: Some(name.to_string()),
                tcg_date: Some(date.to_string()),
            });
            self
        }

        pub(crate) fn sets_failing(mut self) -> Self {
            self.sets_fail = true;
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CardSource for FixtureSource {
        fn archetype_cards(&self, archetype: &str, _with_misc: bool) -> Result<Vec<Card>, LookupError> {
            self.calls.borrow_mut().push(format!("cards:{archetype}"));
            if self.failing.contains(archetype) {
                return Err(LookupError::Status { code: 500 });
            }
            Ok(self.cards.get(archetype).cloned().unwrap_or_default())
        }

        fn card_sets(&self) -> Result<Vec<SetInfo>, LookupError> {
            self.calls.borrow_mut().push("sets".to_string());
            if self.sets_fail {
                return Err(LookupError::Transport("connection reset".into()));
            }
            Ok(self.sets.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_api_version_path() {
        let client = YgoProDeckClient::new("https://db.ygoprodeck.com/api/v7", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("cardinfo.php").unwrap().as_str(),
            "https://db.ygoprodeck.com/api/v7/cardinfo.php"
        );
    }

    #[test]
    fn invalid_base_is_a_config_error() {
        let err = YgoProDeckClient::new("not a url", Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, EnrichError::Config(_)));
    }

    #[test]
    fn card_payload_tolerates_missing_fields() {
        let payload = r#"{"data": [
            {"name": "Dark Magician", "misc_info": [{"tcg_date": "2002-03-08"}],
             "card_sets": [{"set_code": "LOB-EN005", "set_name": "Legend of Blue Eyes White Dragon"}]},
            {"name": "Bare"}
        ]}"#;
        let response: CardInfoResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].tcg_date(), Some("2002-03-08"));
        assert_eq!(response.data[0].card_sets[0].set_code.as_deref(), Some("LOB-EN005"));
        assert_eq!(response.data[1].tcg_date(), None);
    }
}
