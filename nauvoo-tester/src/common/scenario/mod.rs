pub mod catalog;

use crate::logic::SessionPlan;
use catalog::catalog_scenarios;

/// A named session plan.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub plan: SessionPlan,
}

impl TestScenario {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, plan: SessionPlan) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            plan,
        }
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = name.trim().to_lowercase();
    catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.name == key)
}

pub fn list_scenarios() -> Vec<(String, String)> {
    catalog_scenarios()
        .into_iter()
        .map(|scenario| (scenario.name, scenario.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert!(get_scenario(" Smoke ").is_some());
        assert!(get_scenario("no-such-scenario").is_none());
    }

    #[test]
    fn listed_names_are_unique() {
        let mut names: Vec<String> = list_scenarios().into_iter().map(|(name, _)| name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
