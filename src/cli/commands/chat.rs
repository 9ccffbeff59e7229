//! Interactive question loop.
//!
//! Every line is an independent question: nothing from earlier turns is sent
//! to the model.

use super::ask::answer_question;
use super::log::print_summary;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use console::style;
use std::future::Future;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// What the prompt produced.
#[derive(Debug, PartialEq)]
enum Prompt {
    Line(String),
    Closed,
    Interrupted,
}

/// Wait for the next input line unless `interrupt` fires first.
async fn next_prompt<R, F>(lines: &mut Lines<R>, interrupt: F) -> io::Result<Prompt>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => Prompt::Line(line),
            None => Prompt::Closed,
        }),
        _ = interrupt => Ok(Prompt::Interrupted),
    }
}

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'screenrag doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    println!("\n{}", style("Screenrag").bold().cyan());
    match orchestrator.query_log().summary() {
        Ok(summary) if summary.total > 0 => print_summary(&summary),
        Ok(_) => {}
        Err(e) => Output::warning(&format!("Could not read query log: {}", e)),
    }
    println!(
        "{}\n",
        style("Ask about the screenplays. Ctrl-C stops an answer; at the prompt, Ctrl-C or 'exit' quits.").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let input = match next_prompt(&mut lines, tokio::signal::ctrl_c()).await? {
            Prompt::Line(input) => input,
            Prompt::Closed => {
                println!();
                break;
            }
            Prompt::Interrupted => {
                println!();
                // The abandoned stdin read would block runtime shutdown until Enter.
                std::process::exit(0);
            }
        };

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("May the Force be with you.");
            break;
        }

        // Failures are reported per question; the loop keeps going.
        let _ = answer_question(&orchestrator, input).await;
    }

    Ok(())
}
