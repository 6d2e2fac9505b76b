use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One physical kitchen screen and what it is allowed to show
///
/// Empty allow-sets mean "no restriction". SLA thresholds and the sound flag
/// are optional overrides on top of the global settings layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub id: i64,
    pub name: String,
    pub allowed_source_ids: BTreeSet<i64>,
    pub allowed_category_ids: BTreeSet<i64>,
    pub sla_warning_minutes: Option<i64>,
    pub sla_critical_minutes: Option<i64>,
    pub sound_enabled: Option<bool>,
}

impl Display {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            allowed_source_ids: BTreeSet::new(),
            allowed_category_ids: BTreeSet::new(),
            sla_warning_minutes: None,
            sla_critical_minutes: None,
            sound_enabled: None,
        }
    }

    pub fn allows_source(&self, source_id: Option<i64>) -> bool {
        if self.allowed_source_ids.is_empty() {
            return true;
        }
        source_id.map_or(false, |id| self.allowed_source_ids.contains(&id))
    }

    pub fn allows_categories(&self, categories: &BTreeSet<i64>) -> bool {
        self.allowed_category_ids.is_empty()
            || !self.allowed_category_ids.is_disjoint(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sets_pass_everything() {
        let display = Display::new(1, "Main");
        assert!(display.allows_source(None));
        assert!(display.allows_source(Some(4)));
        assert!(display.allows_categories(&BTreeSet::new()));
        assert!(display.allows_categories(&BTreeSet::from([9])));
    }

    #[test]
    fn test_restricted_sets() {
        let mut display = Display::new(1, "Bar");
        display.allowed_source_ids.insert(2);
        display.allowed_category_ids.insert(5);

        assert!(display.allows_source(Some(2)));
        assert!(!display.allows_source(Some(3)));
        assert!(!display.allows_source(None));

        assert!(display.allows_categories(&BTreeSet::from([5, 9])));
        assert!(!display.allows_categories(&BTreeSet::from([9])));
        assert!(!display.allows_categories(&BTreeSet::new()));
    }
}
