//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, QueryReport};
use crate::retrieval::Outcome;
use console::style;
use std::io::Write;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'screenrag doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    answer_question(&orchestrator, question).await?;
    Ok(())
}

/// Answer one question, streaming tokens to stdout. Ctrl-C abandons the answer.
pub(super) async fn answer_question(
    orchestrator: &Orchestrator,
    question: &str,
) -> crate::Result<QueryReport> {
    let spinner = Output::spinner("Searching the screenplays...");
    let mut streaming = false;

    let cancel = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let result = orchestrator
        .ask(question, cancel, |token| {
            if !streaming {
                spinner.finish_and_clear();
                print!("\n{} ", style("Answer:").cyan().bold());
                streaming = true;
            }
            print!("{}", token);
            let _ = std::io::stdout().flush();
        })
        .await;
    spinner.finish_and_clear();
    if streaming {
        println!();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e);
        }
    };

    match report.outcome {
        Outcome::Answered => print_sources(&report),
        Outcome::Aborted => Output::warning("Answer interrupted; partial answer logged."),
        Outcome::RejectedNoChunks | Outcome::RejectedLowSimilarity => {
            if let Some(refusal) = &report.refusal {
                println!("\n{} {}", style("Answer:").cyan().bold(), refusal);
            }
            let detail = match report.top_similarity {
                Some(top) => format!("{} (best similarity {:.3})", report.outcome, top),
                None => report.outcome.to_string(),
            };
            println!("   {}", style(detail).dim());
        }
    }
    println!();

    Ok(report)
}

fn print_sources(report: &QueryReport) {
    if report.sources.is_empty() {
        return;
    }
    Output::header("Sources");
    for (i, source) in report.sources.iter().enumerate() {
        Output::source(i + 1, &source.film, &source.heading, source.similarity, &source.text);
    }
}
