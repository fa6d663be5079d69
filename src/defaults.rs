/// Default number of concurrent create-and-assign workers
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Digits a normalized phone number must have
pub const PHONE_DIGITS: usize = 10;

/// Maximum number of Q&A columns carried into a lead
pub const MAX_QA_COLUMNS: usize = 6;

/// Offset from a 0-based data row index to its 1-based spreadsheet row (header is row 1)
pub const HEADER_ROW_OFFSET: usize = 2;

pub const DEFAULT_LEAD_API_URL: &str = "http://localhost:3333/graphql";
