pub mod activities;
pub mod agent_memory;
pub mod profiles;

pub use activities::ActivityRepository;
pub use agent_memory::AgentMemoryRepository;
pub use profiles::ProfileRepository;

/// Upper bound on any page size a caller can request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Positive limits are capped at [`MAX_PAGE_SIZE`], anything else falls back
/// to `default_limit`
pub fn capped_limit(limit: Option<i64>, default_limit: i64) -> i64 {
    limit
        .filter(|l| *l > 0)
        .map_or(default_limit, |l| l.min(MAX_PAGE_SIZE))
}

/// Limit/offset pair with the listing defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    /// Limits go through [`capped_limit`]; negative or missing offsets
    /// become zero.
    pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> Self {
        Self {
            limit: capped_limit(limit, default_limit),
            offset: offset.filter(|o| *o >= 0).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults() {
        assert_eq!(
            PageRequest::new(None, None, 50),
            PageRequest { limit: 50, offset: 0 }
        );
        assert_eq!(
            PageRequest::new(Some(0), Some(-3), 10),
            PageRequest { limit: 10, offset: 0 }
        );
        assert_eq!(
            PageRequest::new(Some(1), Some(1), 50),
            PageRequest { limit: 1, offset: 1 }
        );
    }

    #[test]
    fn huge_limits_are_capped() {
        assert_eq!(
            PageRequest::new(Some(i64::MAX), None, 50),
            PageRequest { limit: MAX_PAGE_SIZE, offset: 0 }
        );
        assert_eq!(capped_limit(Some(-5), 10), 10);
    }
}
