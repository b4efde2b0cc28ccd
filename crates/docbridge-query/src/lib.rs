//! docbridge Request Translator
//!
//! Turns loosely typed request parameters into store operations:
//! - **Write path**: `content` parsing, key selection, timestamps, upsert plan
//! - **Search path**: key clause, condition normalization, sort parsing,
//!   lenient paging
//!
//! Parsing here never fails on malformed JSON. Bad `content`, `conditions`
//! or `sorts` fall back to an empty object or the default sort and the
//! request proceeds. Only missing or illegal routing parameters are errors.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod filter;
pub mod naming;
pub mod pagination;
pub mod params;
pub mod search;
pub mod sort;
pub mod write;

pub use engine::{QueryEngine, SaveOutcome};
pub use filter::{build_query_filter, normalize_conditions};
pub use pagination::{paginate, Page, Pagination};
pub use search::{plan_search, SearchParams, SearchPlan};
pub use sort::{build_sort_criteria, parse_sorts, to_sort_document, SortCriteria, SortDirection};
pub use write::{parse_content, plan_save, SaveRequest, WritePlan};

/// Key field used when a request does not name one
pub const DEFAULT_KEY_FIELD: &str = "uuid";

/// System-managed timestamp fields (milliseconds since the epoch)
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// The store's native identifier, never returned to clients
pub const STORE_ID_FIELD: &str = "_id";
