//! HubSpot response payloads

use chrono::{DateTime, FixedOffset};
use hubline_warehouse::Properties;
use serde::Deserialize;

/// One CRM object as returned by a collection endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

/// One page of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<RemoteRecord>,
    /// Cursor for the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    results: Vec<RemoteRecord>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    #[serde(default)]
    after: Option<String>,
}

impl Page {
    /// Parse a collection response body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let parsed: PageBody = serde_json::from_str(body)?;
        let next_cursor = parsed.paging.and_then(|p| p.next).and_then(|n| n.after);
        Ok(Self {
            records: parsed.results,
            next_cursor,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Latest `updatedAt` on the page, by instant when parseable.
    pub fn max_updated_at(&self) -> Option<&str> {
        self.records
            .iter()
            .filter_map(|r| r.updated_at.as_deref())
            .fold(None, |best, ts| match best {
                Some(b) if !is_later(ts, b) => Some(b),
                _ => Some(ts),
            })
    }
}

/// One entry of the property catalogue endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDef {
    pub name: String,
}

/// Parse the property catalogue into its names, in server order.
pub fn parse_property_names(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let defs: Vec<PropertyDef> = serde_json::from_str(body)?;
    Ok(defs.into_iter().map(|d| d.name).collect())
}

/// Parse an ISO-8601 / RFC 3339 timestamp as emitted by HubSpot.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts.trim()).ok()
}

/// Whether timestamp `a` is strictly later than `b`.
///
/// Compares instants when both parse, otherwise falls back to string order
/// (which agrees for same-format UTC timestamps).
pub fn is_later(a: &str, b: &str) -> bool {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(x), Some(y)) => x > y,
        _ => a > b,
    }
}
