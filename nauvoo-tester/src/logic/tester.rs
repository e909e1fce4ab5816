use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::common::scenario::TestScenario;
use crate::logic::session::{SessionPlan, SessionSummary, WorldTester};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    tester: WorldTester,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(verbose: bool) -> Self {
        Self {
            tester: WorldTester::new(verbose),
            verbose,
        }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.strategy.label(),
                    seed
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations));
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let (successes, failures, performance_data) =
            self.run_session_iterations(&scenario.plan, seed, iterations);

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    fn run_session_iterations(
        &self,
        plan: &SessionPlan,
        seed: u64,
        iterations: usize,
    ) -> (usize, Vec<String>, Vec<Duration>) {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let outcome = self
                .tester
                .run_plan(plan, iteration_seed)
                .and_then(|summary| evaluate_expectations(plan, &summary).map(|()| summary));

            match outcome {
                Ok(summary) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) minutes:{} ending:{}",
                            i + 1,
                            iterations,
                            summary.metrics.minutes_advanced,
                            summary.final_state.reputation.determine_ending_branch()
                        );
                    }
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    failures.push(format!(
                        "Iteration {} (strategy {}, seed {iteration_seed}): {message}",
                        i + 1,
                        plan.strategy.label(),
                    ));
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            message.red()
                        );
                    }
                }
            }
        }

        (successes, failures, performance_data)
    }
}

fn evaluate_expectations(plan: &SessionPlan, summary: &SessionSummary) -> anyhow::Result<()> {
    for expectation in &plan.expectations {
        expectation
            .evaluate(summary)
            .map_err(|err| err.context(summarize_decision_path(summary)))?;
    }
    Ok(())
}

fn summarize_decision_path(summary: &SessionSummary) -> String {
    if summary.metrics.decision_log.is_empty() {
        return "no decisions recorded".to_string();
    }
    let recent: Vec<&str> = summary
        .metrics
        .decision_log
        .iter()
        .rev()
        .take(3)
        .map(String::as_str)
        .collect();
    format!("last decisions: {}", recent.join(" | "))
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::session::SessionStrategy;

    #[test]
    fn failing_expectation_is_reported_per_iteration() {
        let plan = SessionPlan::new(SessionStrategy::Idle)
            .with_minutes(60)
            .with_expectation(|_: &SessionSummary| -> anyhow::Result<()> {
                anyhow::bail!("always fails")
            });
        let scenario = TestScenario::new("failing", "always fails", plan);
        let results = LogicTester::new(false).run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.passed));
        assert_eq!(results[0].failures.len(), 2);
        assert!(results[0].failures[0].contains("always fails"));
    }

    #[test]
    fn result_serializes_durations_as_millis() {
        let result = ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.performance_data, vec![Duration::from_millis(12)]);
    }
}
