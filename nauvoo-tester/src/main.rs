mod common;
mod logic;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::scenario::{get_scenario, list_scenarios};
use common::split_csv;
use common::util::parse_seeds;
use logic::{LogicTester, ScenarioResult};

#[derive(Debug, Parser)]
#[command(name = "nauvoo-tester", version = "0.1.0")]
#[command(about = "Headless QA runs for the Nauvoo world engine using scripted, seeded sessions")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x-prefixed hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    let results = run_logic_scenarios(&args, &scenarios, &seeds);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🏛  Nauvoo World Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for (name, _) in list_scenarios() {
            if !scenarios.contains(&name) {
                scenarios.push(name);
            }
        }
    }
    scenarios
}

fn run_logic_scenarios(args: &Args, scenarios: &[String], seeds: &[u64]) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(args.verbose);
    let mut results = Vec::new();

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            log::debug!("running {} over {} seeds", scenario.name, seeds.len());
            results.extend(logic_tester.run_scenario(&scenario, seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Nauvoo Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(&mut output_target, results, duration)?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            verbose: false,
            output: None,
        }
    }

    fn temp_file(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "nauvoo-report-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "smoke".to_string(),
            seed: 1337,
            passed,
            iterations_run: 1,
            successful_iterations: usize::from(passed),
            failures: Vec::new(),
            average_duration: Duration::from_millis(5),
            performance_data: vec![Duration::from_millis(5)],
        }
    }

    #[test]
    fn all_expands_to_every_scenario_once() {
        let scenarios = expand_scenarios("smoke,all");
        assert_eq!(scenarios[0], "smoke");
        assert_eq!(scenarios.len(), list_scenarios().len());
        assert!(scenarios.iter().any(|s| s == "save-load-replay"));
    }

    #[test]
    fn maybe_list_scenarios_writes_catalog() {
        let temp = temp_file("list");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("combat-skirmish"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_file("empty.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No scenarios executed"));
    }

    #[test]
    fn write_reports_emits_json_for_results() {
        let temp = temp_file("full.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0].scenario_name, "smoke");
    }

    #[test]
    fn write_reports_console_includes_total_time() {
        let temp = temp_file("console.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(false)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Logic Test Results Summary"));
        assert!(content.contains("Total time"));
    }

    #[test]
    fn run_logic_scenarios_skips_unknown_names() {
        let args = base_args();
        let results = run_logic_scenarios(
            &args,
            &["smoke".to_string(), "missing".to_string()],
            &[1, 2],
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.scenario_name == "smoke"));
    }
}
