//! Record grammars.
//!
//! Each dataset has its own line-oriented grammar:
//!
//! - **rankings**: `pageURL,pageRank,avgDuration`
//! - **uservisits**: `sourceIP,destURL,visitDate,adRevenue,userAgent,
//!   countryCode,languageCode,searchWord,duration`
//! - **crawl**: concatenated pages. A page starts at a boundary line (begins
//!   with `http` and has exactly five space-separated fields, the first being
//!   the page URL). Every following line up to the next boundary is page
//!   content.
//!
//! All grammars implement [`RecordParser`]; [`parser_for`] picks one by
//! dataset and [`parse_records`] drives it lazily over an inflated blob.
//!
//! The crawl parser holds one open page between lines. That page is only
//! complete when the next boundary arrives or when the caller calls
//! [`RecordParser::finalize`]. [`TrailingDocument`] selects whether
//! [`Records`] finalizes at end of input.

use crate::record::{CrawlDocument, Ranking, Record, UserVisit};
use crate::{Dataset, Error, FIELD_DELIMITER, Result};
use std::str::{FromStr, Lines};

/// What to do with the page still open when a crawl blob ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingDocument {
    /// Finalize the parser and emit the open page.
    #[default]
    Emit,
    /// Discard the open page (legacy behavior).
    Drop,
}

/// What to do when a tabular line does not fit its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLines {
    /// Fail the whole blob.
    #[default]
    Abort,
    /// Log and count the line, then continue with the next one.
    Skip,
}

/// A line-oriented record grammar.
pub trait RecordParser: Send {
    /// Consume one line (1-based `line_number`), possibly completing a record.
    fn feed(&mut self, line_number: usize, line: &str) -> Result<Option<Record>>;

    /// Signal end of input, returning any record still being accumulated.
    fn finalize(&mut self) -> Option<Record> {
        None
    }
}

/// Select the grammar for a dataset.
pub fn parser_for(dataset: Dataset) -> Box<dyn RecordParser> {
    match dataset {
        Dataset::Rankings => Box::new(RankingParser),
        Dataset::UserVisits => Box::new(UserVisitParser),
        Dataset::Crawl => Box::new(CrawlParser::default()),
    }
}

/// Lazily parse an inflated blob into records.
pub fn parse_records(dataset: Dataset, text: &str, trailing: TrailingDocument) -> Records<'_> {
    Records {
        lines: text.lines(),
        line_number: 0,
        parser: parser_for(dataset),
        trailing,
        finished: false,
    }
}

/// Iterator over the records of one blob.
///
/// Yields `Err` for lines the grammar rejects; iteration may continue past
/// an error.
pub struct Records<'a> {
    lines: Lines<'a>,
    line_number: usize,
    parser: Box<dyn RecordParser>,
    trailing: TrailingDocument,
    finished: bool,
}

impl Records<'_> {
    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line_number
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        for line in self.lines.by_ref() {
            self.line_number += 1;
            match self.parser.feed(self.line_number, line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }

        self.finished = true;
        match self.trailing {
            TrailingDocument::Emit => self.parser.finalize().map(Ok),
            TrailingDocument::Drop => {
                if let Some(dropped) = self.parser.finalize() {
                    tracing::debug!("Dropping trailing document {}", dropped.id());
                }
                None
            }
        }
    }
}

// ============================================================================
// Tabular grammars
// ============================================================================

/// `pageURL,pageRank,avgDuration`
pub struct RankingParser;

impl RecordParser for RankingParser {
    fn feed(&mut self, line_number: usize, line: &str) -> Result<Option<Record>> {
        let c = split_fields(line_number, line, 3)?;
        Ok(Some(Record::Ranking(Ranking {
            page_url: c[0].to_string(),
            page_rank: number(line_number, "pageRank", c[1])?,
            avg_duration: number(line_number, "avgDuration", c[2])?,
        })))
    }
}

/// The nine-column visit log. `_id` is generated, `pageRank` is left for the
/// join.
pub struct UserVisitParser;

impl RecordParser for UserVisitParser {
    fn feed(&mut self, line_number: usize, line: &str) -> Result<Option<Record>> {
        let c = split_fields(line_number, line, 9)?;
        Ok(Some(Record::UserVisit(UserVisit {
            id: uuid::Uuid::new_v4().to_string(),
            source_ip: c[0].to_string(),
            dest_url: c[1].to_string(),
            visit_date: c[2].to_string(),
            ad_revenue: number(line_number, "adRevenue", c[3])?,
            user_agent: c[4].to_string(),
            country_code: c[5].to_string(),
            language_code: c[6].to_string(),
            search_word: c[7].to_string(),
            duration: number(line_number, "duration", c[8])?,
            page_rank: None,
        })))
    }
}

fn split_fields(line_number: usize, line: &str, expected: usize) -> Result<Vec<&str>> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < expected {
        return Err(Error::malformed(
            line_number,
            format!("expected {} fields, got {}", expected, fields.len()),
        ));
    }
    Ok(fields)
}

fn number<T: FromStr>(line_number: usize, field: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::malformed(line_number, format!("{field} '{raw}': {e}")))
}

// ============================================================================
// Crawl grammar
// ============================================================================

/// Splits concatenated crawl pages at boundary lines.
///
/// A page's `html` is the lines after its boundary line, joined with `\n`.
/// The boundary line itself is not stored. The legacy loader began each
/// page's HTML with that line, so `html` differs from documents it wrote.
#[derive(Default)]
pub struct CrawlParser {
    open: Option<OpenDocument>,
}

struct OpenDocument {
    url: String,
    html: String,
    lines: usize,
}

impl OpenDocument {
    fn push(&mut self, line: &str) {
        if self.lines > 0 {
            self.html.push('\n');
        }
        self.html.push_str(line);
        self.lines += 1;
    }

    fn into_record(self) -> Record {
        Record::Crawl(CrawlDocument {
            url: self.url,
            html: self.html,
        })
    }
}

impl CrawlParser {
    /// Whether `line` opens a new page, returning its URL.
    fn boundary_url(line: &str) -> Option<&str> {
        if !line.starts_with("http") {
            return None;
        }
        let mut fields = line.split(' ');
        let url = fields.next()?;
        (fields.count() == 4).then_some(url)
    }
}

impl RecordParser for CrawlParser {
    fn feed(&mut self, _line_number: usize, line: &str) -> Result<Option<Record>> {
        if let Some(url) = Self::boundary_url(line) {
            let finished = self.open.take().map(OpenDocument::into_record);
            self.open = Some(OpenDocument {
                url: url.to_string(),
                html: String::new(),
                lines: 0,
            });
            return Ok(finished);
        }

        // Lines before the first boundary belong to no page.
        if let Some(open) = self.open.as_mut() {
            open.push(line);
        }
        Ok(None)
    }

    fn finalize(&mut self) -> Option<Record> {
        self.open.take().map(OpenDocument::into_record)
    }
}
