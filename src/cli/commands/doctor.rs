//! Doctor command - verify configuration, corpus, artifacts and index.

use crate::chunking::Chunk;
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::{discover_scripts, read_artifact};
use crate::query_log::QueryLog;
use crate::segmentation::Scene;
use crate::vector_store::{SqliteVectorIndex, VectorIndex};
use console::style;
use std::path::PathBuf;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(config_path: Option<PathBuf>, settings: &Settings) -> anyhow::Result<()> {
    Output::header("Screenrag Doctor");
    println!();

    let mut checks = Vec::new();

    let group = vec![check_config_file(config_path)];
    section("Configuration", &group);
    checks.extend(group);

    let group = vec![
        check_endpoint("Embedding", &settings.embedding.model, settings.embedding.api_base.as_deref()),
        check_endpoint("Generation", &settings.generation.model, settings.generation.endpoint()),
    ];
    section("Services", &group);
    checks.extend(group);

    let group = check_corpus(settings);
    section("Corpus", &group);
    checks.extend(group);

    let group = vec![check_index(settings).await, check_query_log(settings)];
    section("Index", &group);
    checks.extend(group);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!("{} error(s) found. Fix them before building the index.", errors));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Screenrag is ready to answer questions.");
    }

    Ok(())
}

fn check_config_file(config_path: Option<PathBuf>) -> CheckResult {
    let path = config_path.unwrap_or_else(Settings::default_config_path);
    if path.exists() {
        CheckResult::ok("Config file", &path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: screenrag config init",
        )
    }
}

fn check_endpoint(name: &str, model: &str, api_base: Option<&str>) -> CheckResult {
    if let Some(base) = api_base {
        return CheckResult::ok(name, &format!("{} at {}", model, base));
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            CheckResult::ok(name, &format!("{} via OpenAI API (key set)", model))
        }
        _ => CheckResult::error(
            name,
            &format!("{} needs OPENAI_API_KEY", model),
            "export OPENAI_API_KEY='sk-...' or set api_base to a local server",
        ),
    }
}

fn check_corpus(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let scripts_dir = settings.scripts_dir();
    match discover_scripts(&scripts_dir) {
        Ok(files) => {
            let names: Vec<String> = files
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .collect();
            results.push(CheckResult::ok("Screenplays", &names.join(", ")));
        }
        Err(_) => results.push(CheckResult::error(
            "Screenplays",
            &format!("no .txt files in {}", scripts_dir.display()),
            "Drop one plain-text screenplay per film into the scripts directory",
        )),
    }

    let scenes_path = settings.scenes_path();
    match read_artifact::<Scene>(&scenes_path) {
        Ok(scenes) => results.push(CheckResult::ok(
            "Scenes",
            &format!("{} scenes in {}", scenes.len(), scenes_path.display()),
        )),
        Err(_) => results.push(CheckResult::warning(
            "Scenes",
            "not built yet",
            "Run: screenrag ingest",
        )),
    }

    let chunks_path = settings.chunks_path();
    match read_artifact::<Chunk>(&chunks_path) {
        Ok(chunks) => results.push(CheckResult::ok(
            "Chunks",
            &format!("{} chunks in {}", chunks.len(), chunks_path.display()),
        )),
        Err(_) => results.push(CheckResult::warning(
            "Chunks",
            "not built yet",
            "Run: screenrag chunk",
        )),
    }

    results
}

async fn check_index(settings: &Settings) -> CheckResult {
    let path = settings.sqlite_path();
    if !path.exists() {
        return CheckResult::warning("Collection", "index not built yet", "Run: screenrag index");
    }

    let index = match SqliteVectorIndex::new(&path) {
        Ok(index) => index,
        Err(e) => {
            return CheckResult::error("Collection", &e.to_string(), "Delete the index file and rebuild")
        }
    };

    let collection = &settings.index.collection;
    match index.get_collection(collection).await {
        Ok(Some(info)) => {
            let count = index.count(collection).await.unwrap_or(0);
            if info.embedding_model != settings.embedding.model
                || info.dimensions != settings.embedding.dimensions as usize
            {
                CheckResult::error(
                    "Collection",
                    &format!(
                        "'{}' built with {} ({} dims), config uses {} ({} dims)",
                        collection,
                        info.embedding_model,
                        info.dimensions,
                        settings.embedding.model,
                        settings.embedding.dimensions
                    ),
                    "Rebuild with: screenrag index",
                )
            } else if count == 0 {
                CheckResult::warning("Collection", &format!("'{}' is empty", collection), "Run: screenrag build")
            } else {
                CheckResult::ok(
                    "Collection",
                    &format!("'{}' holds {} chunks ({})", collection, count, info.embedding_model),
                )
            }
        }
        Ok(None) => CheckResult::warning(
            "Collection",
            &format!("'{}' does not exist", collection),
            "Run: screenrag index",
        ),
        Err(e) => CheckResult::error("Collection", &e.to_string(), "Delete the index file and rebuild"),
    }
}

fn check_query_log(settings: &Settings) -> CheckResult {
    let log = QueryLog::new(settings.query_log_path());
    match log.summary() {
        Ok(summary) => CheckResult::ok(
            "Query log",
            &format!(
                "{} queries ({} answered, {} rejected, {} aborted)",
                summary.total,
                summary.answered,
                summary.rejected(),
                summary.aborted
            ),
        ),
        Err(e) => CheckResult::warning(
            "Query log",
            &e.to_string(),
            "Inspect or move the log file; it is never rewritten",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_custom_endpoint_is_ok() {
        let result = check_endpoint("Generation", "llama3.2", Some("http://localhost:11434/v1"));
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.message.contains("llama3.2"));
    }

    #[test]
    fn test_corpus_checks_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.data_dir = dir.path().join("data").display().to_string();
        settings.corpus.scripts_dir = dir.path().join("scripts").display().to_string();

        let results = check_corpus(&settings);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, CheckStatus::Error);
        assert_eq!(results[1].status, CheckStatus::Warning);
        assert_eq!(results[2].status, CheckStatus::Warning);
    }

    #[tokio::test]
    async fn test_missing_index_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.data_dir = dir.path().display().to_string();

        let result = check_index(&settings).await;
        assert_eq!(result.status, CheckStatus::Warning);
    }
}
