use serde::Serialize;
use crate::core::types::Timestamp;

/// Which copy of an index to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Location {
    System,
    User,
}

/// Modification times driving the rebuild decisions, 0 meaning "absent"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    pub main_source: Timestamp,
    pub user_source: Timestamp,
    pub main_data: Timestamp,
    pub main_index: Timestamp,
    pub user_data: Timestamp,
    pub user_index: Timestamp,
}

impl Timestamps {
    /// Newest source, system or user
    pub fn source(&self) -> Timestamp {
        self.main_source.max(self.user_source)
    }

    fn nothing_built(&self) -> bool {
        self.user_data == 0 && self.user_index == 0 && self.main_data == 0 && self.main_index == 0
    }

    fn user_is_fresh(&self) -> bool {
        self.user_data >= self.source() && self.user_index >= self.source()
    }

    fn system_is_fresh(&self) -> bool {
        self.main_data >= self.source() && self.main_index >= self.source()
    }

    fn has_user_sources(&self) -> bool {
        self.user_source > 0
    }

    pub fn needs_rebuild(&self) -> bool {
        if self.nothing_built() {
            return true;
        }
        if self.user_is_fresh() {
            return false;
        }
        // User sources rule out falling back on the system copy
        if self.has_user_sources() {
            return true;
        }
        !self.system_is_fresh()
    }

    /// A user copy exists but the fresh system copy makes it useless
    pub fn user_index_is_redundant(&self) -> bool {
        if self.user_data == 0 && self.user_index == 0 {
            return false;
        }
        !self.has_user_sources() && self.system_is_fresh()
    }

    /// The copy that can be used right now, if any
    pub fn up_to_date(&self) -> Option<Location> {
        if self.nothing_built() {
            return None;
        }
        if self.user_is_fresh() {
            return Some(Location::User);
        }
        if self.has_user_sources() {
            return None;
        }
        self.system_is_fresh().then_some(Location::System)
    }
}
