use crate::cli::SearchArgs;
use crate::config::SearchDocument;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use sqsgen_core::engine::progress::{Progress, ProgressCallback, ProgressReporter};
use sqsgen_core::engine::SearchOutcome;
use sqsgen_core::workflows;
use std::fs;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct ResultDocument {
    objective: f64,
    rank: String,
    configuration: Vec<u8>,
    parameters: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct TimingDocument {
    thread_id: usize,
    microseconds: u128,
    iterations: u64,
}

#[derive(Debug, Serialize)]
struct ReportDocument {
    results: Vec<ResultDocument>,
    timings: Vec<TimingDocument>,
}

pub fn run(args: SearchArgs) -> Result<()> {
    info!("Loading search problem from {:?}", &args.input);
    let document = SearchDocument::from_file(&args.input)?;
    let settings = document.into_settings()?;

    let progress = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(10));
    let reporter = ProgressReporter::with_callback(progress_callback(progress.clone()));

    info!("Invoking the core search workflow...");
    let outcome = workflows::search::run(&settings, &reporter);

    let report = build_report(&outcome);
    let json = serde_json::to_string_pretty(&report).expect("report serialization cannot fail");

    match &args.output {
        Some(path) => {
            fs::write(path, &json)?;
            println!(
                "✓ {} result(s) written to: {}",
                report.results.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }

    if let Some(best) = outcome
        .results
        .iter()
        .min_by(|a, b| a.objective.total_cmp(&b.objective))
    {
        let rank = best
            .rank
            .as_ref()
            .map(|rank| rank.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("✓ Best objective {:.6} at rank {}", best.objective, rank);
    } else {
        println!("Warning: the search finished without recording any candidates.");
    }

    Ok(())
}

/// Drives a single stderr bar through a search: a spinner while the engine
/// sets up, then a bounded bar counting finished workers once the driver
/// announces the fan-out. The message slot tracks the lowest objective any
/// worker has published so far.
fn progress_callback(bar: ProgressBar) -> ProgressCallback<'static> {
    Box::new(move |event| match event {
        Progress::PhaseStart { name } => {
            bar.reset();
            bar.set_style(spinner_style());
            bar.set_message(name);
            bar.enable_steady_tick(Duration::from_millis(120));
        }
        Progress::TaskStart { total } => {
            bar.disable_steady_tick();
            bar.set_style(worker_style());
            bar.set_length(total);
            bar.set_position(0);
        }
        Progress::TaskIncrement { amount } => bar.inc(amount),
        Progress::TaskFinish => {}
        Progress::StatusUpdate { text } => bar.set_message(text),
        Progress::PhaseFinish => bar.finish_and_clear(),
        Progress::Message(message) => bar.println(message),
    })
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}").expect("invalid template")
}

fn worker_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<28} [{bar:32.cyan/blue}] {pos}/{len} workers")
        .expect("invalid template")
        .progress_chars("=> ")
}

fn build_report(outcome: &SearchOutcome) -> ReportDocument {
    let results = outcome
        .results
        .iter()
        .map(|result| ResultDocument {
            objective: result.objective,
            rank: result
                .rank
                .as_ref()
                .map(|rank| rank.to_string())
                .unwrap_or_default(),
            configuration: result.configuration.clone(),
            parameters: result.parameters.clone(),
        })
        .collect();
    let timings = outcome
        .timings
        .iter()
        .map(|timing| TimingDocument {
            thread_id: timing.thread_id,
            microseconds: timing.duration.as_micros(),
            iterations: timing.iterations,
        })
        .collect();
    ReportDocument { results, timings }
}
