//! # List Queries & the Page Envelope
//!
//! The shared vocabulary for every list endpoint: 1-based pagination,
//! `field:direction` sorting, `field:value` searching, and the response
//! envelope (`count`, `total_pages`, `has_previous_page`,
//! `has_next_page`, `data`).
//!
//! Search semantics depend on what kind of field is being searched:
//!
//! | Field kind | Match rule                                      |
//! |------------|-------------------------------------------------|
//! | numeric    | exact value (`nominal`, `balance`)              |
//! | date       | anywhere within that UTC calendar day           |
//! | text       | case-insensitive substring                      |
//!
//! The collections themselves declare which of their fields are which
//! through the [`Queryable`] trait, so the matching logic is written
//! once and stays identical for users and transactions.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE};

// ---------------------------------------------------------------------------
// ListQuery
// ---------------------------------------------------------------------------

/// Raw list-query parameters as they arrive from the client.
///
/// Everything is optional; [`ListQuery::page`] applies the defaults and
/// clamps degenerate values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// 1-based page number. Defaults to 1.
    pub page_number: Option<u64>,
    /// Records per page. Defaults to 10.
    pub page_size: Option<u64>,
    /// Sort directive, `field:direction`. Direction `desc` sorts
    /// descending; anything else (including absent) sorts ascending.
    pub sort: Option<String>,
    /// Search directive, `field:value`.
    pub search: Option<String>,
}

impl ListQuery {
    /// Effective `(page_number, page_size)` after defaults and clamping.
    ///
    /// Both values are clamped to a minimum of 1 — page 0 and a page
    /// size of 0 are requests for nothing, which is never what the
    /// caller meant.
    pub fn page(&self) -> (u64, u64) {
        let page_number = self.page_number.unwrap_or(DEFAULT_PAGE_NUMBER).max(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        (page_number, page_size)
    }

    /// Parsed sort directive, if one was supplied.
    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort.as_deref().map(SortSpec::parse)
    }

    /// Parsed search directive, if one was supplied with a non-empty
    /// value. `search=name:` and `search=name` are both treated as
    /// "no filter", matching the source system.
    pub fn search_spec(&self) -> Option<SearchSpec> {
        self.search.as_deref().and_then(SearchSpec::parse)
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending (the default for any unrecognized direction string).
    Ascending,
    /// Descending (`desc`).
    Descending,
}

/// A parsed `field:direction` sort directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// The field to sort by, as named on the wire.
    pub field: String,
    /// Which way to sort it.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parses `field:direction`. Only the literal `desc` selects
    /// descending; a missing or unrecognized direction is ascending.
    pub fn parse(raw: &str) -> Self {
        let (field, direction) = match raw.split_once(':') {
            Some((f, "desc")) => (f, SortDirection::Descending),
            Some((f, _)) => (f, SortDirection::Ascending),
            None => (raw, SortDirection::Ascending),
        };
        Self {
            field: field.to_string(),
            direction,
        }
    }

    /// Orders two records by this spec's field.
    ///
    /// Numeric and date fields compare by value, text fields
    /// lexicographically. Records that don't carry the field at all
    /// compare equal, which keeps the sort stable instead of panicking
    /// on a typo'd field name.
    pub fn compare<T: Queryable>(&self, a: &T, b: &T) -> Ordering {
        let ord = if let (Some(x), Some(y)) = (
            a.numeric_field(&self.field),
            b.numeric_field(&self.field),
        ) {
            x.cmp(&y)
        } else if let (Some(x), Some(y)) =
            (a.date_field(&self.field), b.date_field(&self.field))
        {
            x.cmp(&y)
        } else if let (Some(x), Some(y)) =
            (a.text_field(&self.field), b.text_field(&self.field))
        {
            x.cmp(&y)
        } else {
            Ordering::Equal
        };

        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

// ---------------------------------------------------------------------------
// Searching
// ---------------------------------------------------------------------------

/// A parsed `field:value` search directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    /// The field to search, as named on the wire.
    pub field: String,
    /// The raw search value.
    pub value: String,
}

impl SearchSpec {
    /// Parses `field:value`. Returns `None` when there is no `:` or the
    /// value after it is empty — both mean "no filter".
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, value) = raw.split_once(':')?;
        if value.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    /// Whether a record matches this search.
    ///
    /// The record decides the field kind: numeric fields match exactly,
    /// date fields match anywhere in the named UTC calendar day, text
    /// fields match on a case-insensitive substring. A field the record
    /// doesn't have matches nothing.
    pub fn matches<T: Queryable>(&self, item: &T) -> bool {
        if let Some(n) = item.numeric_field(&self.field) {
            return self.value.parse::<u64>().map(|v| v == n).unwrap_or(false);
        }
        if let Some(ts) = item.date_field(&self.field) {
            return match day_bounds(&self.value) {
                Some((start, end)) => ts >= start && ts < end,
                None => false,
            };
        }
        if let Some(text) = item.text_field(&self.field) {
            return text.to_lowercase().contains(&self.value.to_lowercase());
        }
        false
    }
}

/// The half-open UTC range `[start of day, start of next day)` for a
/// `YYYY-MM-DD` value. Equivalent to the inclusive start-of-day through
/// end-of-day match of the source system.
pub fn day_bounds(value: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let start = day.and_hms_opt(0, 0, 0)?.and_utc();
    Some((start, start + Duration::days(1)))
}

// ---------------------------------------------------------------------------
// Queryable
// ---------------------------------------------------------------------------

/// Exposes a record's searchable/sortable fields by wire name.
///
/// Each accessor returns `Some` only for fields of that kind; a field
/// name appears in at most one accessor. This is what makes `nominal`
/// and `balance` exact-match and `date` a day-range without the query
/// code knowing anything about users or transactions.
pub trait Queryable {
    /// Text fields, matched by case-insensitive substring.
    fn text_field(&self, field: &str) -> Option<String>;
    /// Numeric fields, matched exactly.
    fn numeric_field(&self, field: &str) -> Option<u64>;
    /// Timestamp fields, matched by calendar day.
    fn date_field(&self, field: &str) -> Option<DateTime<Utc>>;
}

// ---------------------------------------------------------------------------
// Page Envelope
// ---------------------------------------------------------------------------

/// The standard paginated-list response shape.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The 1-based page that was returned.
    pub page_number: u64,
    /// The requested page size.
    pub page_size: u64,
    /// Total number of records matching the filter, across all pages.
    pub count: u64,
    /// `ceil(count / page_size)`, clamped to a minimum of 1 — an empty
    /// result set is still "page 1 of 1".
    pub total_pages: u64,
    /// Whether a page exists before this one.
    pub has_previous_page: bool,
    /// Whether a page exists after this one.
    pub has_next_page: bool,
    /// The records on this page.
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Builds the envelope from the full filtered-and-sorted record set.
    ///
    /// `items` must already be filtered and ordered; this slices out the
    /// requested page and fills in the bookkeeping. The previous/next
    /// flags are only raised when there is more than one page at all,
    /// matching the source system's envelope exactly.
    pub fn assemble(items: Vec<T>, page_number: u64, page_size: u64) -> Self {
        let count = items.len() as u64;
        let total_pages = (count.div_ceil(page_size)).max(1);

        let mut has_previous_page = false;
        let mut has_next_page = false;
        if total_pages > 1 {
            has_previous_page = page_number > 1;
            has_next_page = page_number < total_pages;
        }

        let skip = (page_number - 1).saturating_mul(page_size) as usize;
        let data: Vec<T> = items
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .collect();

        Self {
            page_number,
            page_size,
            count,
            total_pages,
            has_previous_page,
            has_next_page,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Ownership Filter
// ---------------------------------------------------------------------------

/// Which side of a transaction an ownership filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRole {
    /// Transactions where the user is the paying party.
    Sender,
    /// Transactions where the user is the receiving party.
    Receiver,
}

impl OwnerRole {
    /// Parses the wire value (`sender` | `receiver`). Anything else is
    /// no filter.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sender" => Some(Self::Sender),
            "receiver" => Some(Self::Receiver),
            _ => None,
        }
    }
}

/// Restricts a transaction listing to one user's view, ANDed with any
/// search filter the request also carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    /// The user whose transactions are being listed.
    pub user_id: String,
    /// Whether to match them as sender or receiver.
    pub role: OwnerRole,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Minimal record for exercising the matcher without dragging in
    /// the real model types.
    struct Row {
        name: String,
        amount: u64,
        when: DateTime<Utc>,
    }

    impl Queryable for Row {
        fn text_field(&self, field: &str) -> Option<String> {
            (field == "name").then(|| self.name.clone())
        }
        fn numeric_field(&self, field: &str) -> Option<u64> {
            (field == "amount").then_some(self.amount)
        }
        fn date_field(&self, field: &str) -> Option<DateTime<Utc>> {
            (field == "when").then_some(self.when)
        }
    }

    fn row(name: &str, amount: u64, when: &str) -> Row {
        Row {
            name: name.to_string(),
            amount,
            when: when.parse().expect("test timestamp"),
        }
    }

    // -- Parsing ------------------------------------------------------------

    #[test]
    fn sort_parse_desc() {
        let spec = SortSpec::parse("name:desc");
        assert_eq!(spec.field, "name");
        assert_eq!(spec.direction, SortDirection::Descending);
    }

    #[test]
    fn sort_parse_anything_else_is_ascending() {
        assert_eq!(SortSpec::parse("name:asc").direction, SortDirection::Ascending);
        assert_eq!(SortSpec::parse("name:DESC").direction, SortDirection::Ascending);
        assert_eq!(SortSpec::parse("name").direction, SortDirection::Ascending);
    }

    #[test]
    fn search_parse_requires_value() {
        assert!(SearchSpec::parse("name:alice").is_some());
        assert!(SearchSpec::parse("name:").is_none());
        assert!(SearchSpec::parse("name").is_none());
    }

    #[test]
    fn search_value_may_contain_colons() {
        // Only the first colon splits; the rest belongs to the value.
        let spec = SearchSpec::parse("when:2024-01-15").unwrap();
        assert_eq!(spec.field, "when");
        assert_eq!(spec.value, "2024-01-15");
    }

    #[test]
    fn list_query_defaults_and_clamping() {
        let q = ListQuery::default();
        assert_eq!(q.page(), (1, 10));

        let q = ListQuery {
            page_number: Some(0),
            page_size: Some(0),
            ..Default::default()
        };
        assert_eq!(q.page(), (1, 1));
    }

    // -- Matching -----------------------------------------------------------

    #[test]
    fn text_match_is_case_insensitive_substring() {
        let r = row("Alice Cooper", 10, "2024-01-15T10:00:00Z");
        assert!(SearchSpec::parse("name:alice").unwrap().matches(&r));
        assert!(SearchSpec::parse("name:COOP").unwrap().matches(&r));
        assert!(!SearchSpec::parse("name:bob").unwrap().matches(&r));
    }

    #[test]
    fn numeric_match_is_exact() {
        let r = row("a", 100, "2024-01-15T10:00:00Z");
        assert!(SearchSpec::parse("amount:100").unwrap().matches(&r));
        assert!(!SearchSpec::parse("amount:10").unwrap().matches(&r));
        // Non-numeric search value against a numeric field: no match,
        // not a substring fallback.
        assert!(!SearchSpec::parse("amount:1oo").unwrap().matches(&r));
    }

    #[test]
    fn date_match_covers_the_whole_utc_day() {
        let spec = SearchSpec::parse("when:2024-01-15").unwrap();
        assert!(spec.matches(&row("a", 0, "2024-01-15T00:00:00Z")));
        assert!(spec.matches(&row("a", 0, "2024-01-15T23:59:59Z")));
        assert!(!spec.matches(&row("a", 0, "2024-01-14T23:59:59Z")));
        assert!(!spec.matches(&row("a", 0, "2024-01-16T00:00:00Z")));
    }

    #[test]
    fn unparseable_date_matches_nothing() {
        let spec = SearchSpec::parse("when:yesterday").unwrap();
        assert!(!spec.matches(&row("a", 0, "2024-01-15T12:00:00Z")));
    }

    #[test]
    fn unknown_field_matches_nothing() {
        let r = row("a", 1, "2024-01-15T10:00:00Z");
        assert!(!SearchSpec::parse("ghost:a").unwrap().matches(&r));
    }

    #[test]
    fn day_bounds_are_half_open() {
        let (start, end) = day_bounds("2024-01-15").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap());
    }

    // -- Sorting ------------------------------------------------------------

    #[test]
    fn sort_by_numeric_field() {
        let a = row("a", 1, "2024-01-15T10:00:00Z");
        let b = row("b", 2, "2024-01-15T10:00:00Z");
        let asc = SortSpec::parse("amount");
        let desc = SortSpec::parse("amount:desc");
        assert_eq!(asc.compare(&a, &b), Ordering::Less);
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn sort_by_unknown_field_is_stable() {
        let a = row("a", 1, "2024-01-15T10:00:00Z");
        let b = row("b", 2, "2024-01-15T10:00:00Z");
        assert_eq!(SortSpec::parse("ghost").compare(&a, &b), Ordering::Equal);
    }

    // -- Envelope -----------------------------------------------------------

    #[test]
    fn envelope_math_for_25_records() {
        // 25 records, page size 10 -> 3 pages.
        let items: Vec<u32> = (0..25).collect();
        let page1 = Page::assemble(items.clone(), 1, 10);
        assert_eq!(page1.count, 25);
        assert_eq!(page1.total_pages, 3);
        assert!(!page1.has_previous_page);
        assert!(page1.has_next_page);
        assert_eq!(page1.data.len(), 10);

        let page3 = Page::assemble(items, 3, 10);
        assert!(page3.has_previous_page);
        assert!(!page3.has_next_page);
        assert_eq!(page3.data.len(), 5);
    }

    #[test]
    fn empty_result_is_one_page() {
        let page = Page::assemble(Vec::<u32>::new(), 1, 10);
        assert_eq!(page.count, 0);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_previous_page);
        assert!(!page.has_next_page);
        assert!(page.data.is_empty());
    }

    #[test]
    fn single_page_raises_no_flags_even_off_the_end() {
        // The source system only raises the flags when total_pages > 1;
        // asking for page 5 of a 1-page set reports neither direction.
        let page = Page::assemble(vec![1, 2, 3], 5, 10);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_previous_page);
        assert!(!page.has_next_page);
        assert!(page.data.is_empty());
    }

    #[test]
    fn page_past_the_end_is_empty_but_counted() {
        let items: Vec<u32> = (0..12).collect();
        let page = Page::assemble(items, 4, 5);
        assert_eq!(page.count, 12);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_previous_page);
        assert!(!page.has_next_page);
        assert!(page.data.is_empty());
    }

    #[test]
    fn owner_role_parse() {
        assert_eq!(OwnerRole::parse("sender"), Some(OwnerRole::Sender));
        assert_eq!(OwnerRole::parse("receiver"), Some(OwnerRole::Receiver));
        assert_eq!(OwnerRole::parse("SENDER"), None);
        assert_eq!(OwnerRole::parse(""), None);
    }
}
