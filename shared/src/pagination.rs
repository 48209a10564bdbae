//! Page/limit arithmetic for list requests.
//!
//! Parsing is permissive: a missing, unparsable, zero or negative value falls
//! back to the default instead of producing a client error. Limits above the
//! configured maximum are clamped.

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSettings {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// A resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

impl PaginationSettings {
    pub fn paginate(&self, page: Option<&str>, limit: Option<&str>) -> Page {
        let page = parse_positive(page).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(limit)
            .unwrap_or(self.default_limit)
            .min(self.max_limit);

        Page {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}
