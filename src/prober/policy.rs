use std::collections::HashSet;

use crate::connection::EMPTY_RESPONSE_STATUS;

/// Statuses that never count as a discovery.
const NOISE_STATUSES: [u16; 2] = [404, 301];

/// Decides which response statuses are worth reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusPolicy {
    pub exclude_server_errors: bool,
    /// Extra statuses dropped on top of the built-in noise list.
    pub excluded: HashSet<u16>,
}

impl StatusPolicy {
    pub fn new(exclude_server_errors: bool) -> Self {
        Self {
            exclude_server_errors,
            excluded: HashSet::new(),
        }
    }

    pub fn with_excluded(mut self, excluded: HashSet<u16>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn is_interesting(&self, status: u16) -> bool {
        if status == EMPTY_RESPONSE_STATUS || NOISE_STATUSES.contains(&status) {
            return false;
        }
        if self.excluded.contains(&status) {
            return false;
        }
        if status >= 500 {
            return !self.exclude_server_errors;
        }
        true
    }
}
