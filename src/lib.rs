pub mod cli;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod gesture;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod prefetch;
pub mod preview;
pub mod session;
pub mod sink;
pub mod source;
pub mod tui;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Review status of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    #[serde(rename = "undecided")]
    Undecided,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "not approved")]
    Rejected,
}

impl ItemStatus {
    /// Wire representation, shared by the webhook payload and the journal.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Undecided => "undecided",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "not approved",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undecided" => Ok(ItemStatus::Undecided),
            "approved" => Ok(ItemStatus::Approved),
            "not approved" | "rejected" => Ok(ItemStatus::Rejected),
            other => Err(format!("invalid item status: {other}")),
        }
    }
}

/// Outcome the reviewer applies to the item under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(self) -> ItemStatus {
        match self {
            Decision::Approve => ItemStatus::Approved,
            Decision::Reject => ItemStatus::Rejected,
        }
    }
}

/// A fetched asset record.
///
/// Only `id` is required. Fields the source sends that we do not model are
/// kept in `extra` so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Asset {
    /// Asset with only an id, as used by tests and simple sources.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            thumb_url: None,
            embed_url: None,
            path: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Human-facing label for a card: the name when present, else the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One unit of review content.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub asset: Asset,
    pub status: ItemStatus,
}

impl Item {
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            status: ItemStatus::Undecided,
        }
    }

    pub fn id(&self) -> &str {
        &self.asset.id
    }
}

/// `{fileId, status}` pair sent at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(rename = "fileId")]
    pub file_id: String,
    pub status: ItemStatus,
}

/// Decision counts over a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReviewTally {
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
}

impl ReviewTally {
    /// Count approved and rejected items in one pass.
    pub fn from_items(items: &[Item]) -> Self {
        items.iter().fold(
            ReviewTally {
                total: items.len(),
                ..ReviewTally::default()
            },
            |mut tally, item| {
                match item.status {
                    ItemStatus::Approved => tally.approved += 1,
                    ItemStatus::Rejected => tally.rejected += 1,
                    ItemStatus::Undecided => {}
                }
                tally
            },
        )
    }

    pub fn undecided(&self) -> usize {
        self.total - self.approved - self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_match_payload_format() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Rejected).unwrap(),
            "\"not approved\""
        );
        assert_eq!(
            "approved".parse::<ItemStatus>().unwrap(),
            ItemStatus::Approved
        );
        assert!("maybe".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn asset_keeps_unknown_fields() {
        let asset: Asset = serde_json::from_str(
            r#"{"id":"a1","thumbUrl":"https://t/1","mimeType":"image/png"}"#,
        )
        .unwrap();
        assert_eq!(asset.thumb_url.as_deref(), Some("https://t/1"));
        assert_eq!(asset.extra["mimeType"], "image/png");
        assert_eq!(asset.label(), "a1");
    }

    #[test]
    fn tally_counts_each_status() {
        let mut items: Vec<Item> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Item::new(Asset::with_id(*id)))
            .collect();
        items[0].status = ItemStatus::Approved;
        items[1].status = ItemStatus::Rejected;
        items[2].status = ItemStatus::Rejected;

        let tally = ReviewTally::from_items(&items);
        assert_eq!(tally.approved, 1);
        assert_eq!(tally.rejected, 2);
        assert_eq!(tally.total, 4);
        assert_eq!(tally.undecided(), 1);
    }
}
