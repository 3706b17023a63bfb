//! Typed records and their stored document shape.
//!
//! Field names follow the SQL schema of the benchmark in camelCase, with the
//! natural key stored in `_id` so the store enforces uniqueness for free.

use serde::{Deserialize, Serialize};

/// A `rankings` row: `{ _id: pageURL, pageRank, avgDuration }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    #[serde(rename = "_id")]
    pub page_url: String,
    #[serde(rename = "pageRank")]
    pub page_rank: i32,
    #[serde(rename = "avgDuration")]
    pub avg_duration: i32,
}

/// A `uservisits` row, pre-joined with the visited page's rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVisit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "destURL")]
    pub dest_url: String,
    pub visit_date: String,
    pub ad_revenue: f64,
    pub user_agent: String,
    pub country_code: String,
    pub language_code: String,
    pub search_word: String,
    pub duration: i32,
    /// Filled in from the rankings collection before the record is written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_rank: Option<i32>,
}

/// One crawled page: `{ _id: url, html }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlDocument {
    #[serde(rename = "_id")]
    pub url: String,
    pub html: String,
}

/// A parsed record of any dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Ranking(Ranking),
    UserVisit(UserVisit),
    Crawl(CrawlDocument),
}

impl Record {
    /// The `_id` the record is stored under.
    pub fn id(&self) -> &str {
        match self {
            Self::Ranking(r) => &r.page_url,
            Self::UserVisit(v) => &v.id,
            Self::Crawl(d) => &d.url,
        }
    }
}

impl From<Ranking> for Record {
    fn from(r: Ranking) -> Self {
        Self::Ranking(r)
    }
}

impl From<UserVisit> for Record {
    fn from(v: UserVisit) -> Self {
        Self::UserVisit(v)
    }
}

impl From<CrawlDocument> for Record {
    fn from(d: CrawlDocument) -> Self {
        Self::Crawl(d)
    }
}
