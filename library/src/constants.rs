/// Collection call documents live in unless configured otherwise.
pub const DEFAULT_COLLECTION: &str = "calls";
