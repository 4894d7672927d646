mod choice;
mod config;
mod error;
mod inferencer;
mod lexicon;
mod logging;
mod model;
mod parser;
mod reconciler;
mod server;
mod session;
mod store;
mod templates;
mod transcript;
mod ui;
mod workflow;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::choice::ChoiceSelection;
use crate::config::Config;
use crate::inferencer::{QuestionSequence, StackInferencer};
use crate::reconciler::ReconciliationOutcome;
use crate::server::{LocalServer, QuestionScript};
use crate::session::{BootstrapSession, Reply, SubmitReport};
use crate::store::Store;
use crate::workflow::{WorkflowService, transition_checked};

#[derive(Parser, Debug)]
#[command(
    name = "kickoff",
    version,
    about = "Bootstrap a project through a short terminal interview"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the onboarding interview (default).
    Interview {
        /// Ask only the four stack questions.
        #[arg(long)]
        legacy: bool,

        /// Suggested project name (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,
    },

    /// Parse an assistant message and print its options as JSON.
    Parse {
        /// File to read (stdin when omitted).
        file: Option<PathBuf>,
    },

    /// Replay a saved transcript and print the inferred stack.
    Replay {
        /// JSON array or NDJSON transcript.
        file: PathBuf,

        /// Transcript was recorded with the four-question sequence.
        #[arg(long)]
        legacy: bool,
    },

    /// List the statuses a backlog item can move to.
    Transitions {
        item: i64,
    },

    /// Move a backlog item to a new status.
    Move {
        item: i64,

        status: String,

        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    // Initialize logging before anything else
    let logging_ctx = match logging::init() {
        Ok(ctx) => {
            logging::cleanup_old_logs(&ctx.log_directory);
            Some(ctx)
        }
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    let loaded_config = config::load_config();
    debug!(
        config_path = %loaded_config.config_path.display(),
        project_config = ?loaded_config.project_config_path,
        status = ?loaded_config.status,
        "config_loaded"
    );
    if let Some(reason) = loaded_config.status.warning() {
        eprintln!("Warning: {}. Using default settings.", reason);
    }
    let config = loaded_config.config;

    if let Some(ctx) = &logging_ctx
        && !ctx.env_filter_set
        && let Err(e) = logging::update_log_level(&ctx.reload_handle, &config.logging.level)
    {
        warn!(level = %config.logging.level, error = %e, "log_level_invalid");
    }

    let result = match cli.command.unwrap_or(Command::Interview {
        legacy: false,
        name: None,
    }) {
        Command::Interview { legacy, name } => run_interview(&config, legacy, name).await,
        Command::Parse { file } => run_parse(&config, file.as_deref()).await,
        Command::Replay { file, legacy } => run_replay(&config, &file, legacy),
        Command::Transitions { item } => run_transitions(&config, item).await,
        Command::Move {
            item,
            status,
            reason,
        } => run_move(&config, item, &status, reason.as_deref()).await,
    };

    if let Some(ctx) = &logging_ctx {
        info!(
            session_id = %ctx.session_id,
            duration_secs = start_time.elapsed().as_secs_f64(),
            "session_end"
        );
    }

    result
}

async fn run_interview(config: &Config, legacy: bool, name: Option<String>) -> Result<()> {
    let started = Instant::now();
    let sequence = if legacy {
        QuestionSequence::Legacy
    } else {
        config.question_sequence()
    };

    let cwd = std::env::current_dir().ok();
    let script = QuestionScript {
        sequence,
        name_hint: name
            .or_else(|| config.interview.project_name.clone())
            .or_else(|| cwd.as_deref().and_then(directory_name)),
        description_hint: cwd.as_deref().and_then(readme_summary),
    };

    let db_path = config.database_path();
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let server = LocalServer::new(store, script);
    let (conversation_id, transcript) = server.start_conversation()?;
    info!(conversation_id = %conversation_id, sequence = ?sequence, "interview_started");

    let mut session = BootstrapSession::new(
        conversation_id,
        server,
        transcript,
        StackInferencer::new(sequence),
    )
    .with_stack_save(config.behavior.save_stack);

    println!("kickoff: answer each question, or type /quit to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(parsed) = session.current_question() {
        let mut selection = parsed.options.clone().map(ChoiceSelection::new);

        println!();
        println!("{}", ui::format_question(&parsed, session.prefill()));
        if config.behavior.show_parse_trace
            && let Some(turn) = session.transcript().iter().rev().find(|t| t.is_assistant())
        {
            let (_, trace) = parser::parse_with_trace(&turn.content);
            println!("{}", ui::format_parse_trace(&trace));
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input == "/quit" {
            break;
        }

        let reply = match build_reply(input, selection.as_mut(), session.prefill()) {
            Ok(reply) => reply,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match session.submit(reply).await {
            Ok(report) => print_report(&report),
            Err(e) => {
                warn!(conversation_id = %session.conversation_id(), error = %e, "submit_failed");
                eprintln!("Error: {}", e);
            }
        }
    }

    let conversation_id = session.conversation_id();
    let items = session
        .collaborator()
        .with_store(|store| store.items(conversation_id))?;
    println!();
    if !items.is_empty() {
        println!("Backlog:");
        for item in &items {
            println!("{}", ui::format_item(item));
        }
    }
    println!(
        "Conversation {} saved to {} ({})",
        conversation_id,
        ui::contract_path(&db_path),
        ui::format_elapsed(started.elapsed())
    );
    info!(
        conversation_id = %conversation_id,
        turns = session.transcript().len(),
        stack_saved = session.stack_saved(),
        "interview_finished"
    );
    Ok(())
}

/// Turns one line of input into a reply.
///
/// An empty line keeps the prefilled value. Numbers pick options when the
/// question has them. Anything else is sent as free text.
fn build_reply(
    input: &str,
    selection: Option<&mut ChoiceSelection>,
    prefill: Option<&str>,
) -> Result<Reply, String> {
    if input.is_empty() {
        return match prefill {
            Some(value) => Ok(Reply::Text(value.to_string())),
            None => Err("Type an answer, or /quit to stop.".to_string()),
        };
    }

    if let Some(selection) = selection
        && let Some(ordinals) = ui::parse_selection_input(input)
    {
        for ordinal in ordinals {
            if !selection.select_ordinal(ordinal) {
                return Err(format!("There is no option {}.", ordinal));
            }
        }
        return selection
            .submit()
            .map(Reply::Choice)
            .map_err(|e| e.to_string());
    }

    Ok(Reply::Text(input.to_string()))
}

fn print_report(report: &SubmitReport) {
    if let ReconciliationOutcome::Edited {
        field: Some(field),
        new_value,
        ..
    } = &report.outcome
    {
        match &report.field_sync_error {
            None => println!("Updated project {}: {}", field.label(), new_value),
            Some(e) => eprintln!("Warning: project {} not updated: {}", field.label(), e),
        }
    }

    if let Some(stack) = &report.stack {
        println!("\nStack:\n{}", ui::format_stack_summary(stack));
    }
    if let Some(result) = &report.provisioning {
        println!("\nBacklog:\n{}", ui::format_provisioning(result));
    }
    if let Some(e) = &report.stack_save_error {
        eprintln!("Warning: stack configuration not saved: {}", e);
    }
}

async fn run_parse(config: &Config, file: Option<&Path>) -> Result<()> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let (parsed, trace) = parser::parse_with_trace(&content);
    let has_options = parsed.has_options();
    let output = serde_json::json!({
        "question": parsed.question,
        "has_options": has_options,
        "options": parsed.options,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    if config.behavior.show_parse_trace {
        eprintln!("{}", ui::format_parse_trace(&trace));
    }
    Ok(())
}

fn run_replay(config: &Config, file: &Path, legacy: bool) -> Result<()> {
    let turns = transcript::load_transcript(file)?;
    let sequence = if legacy {
        QuestionSequence::Legacy
    } else {
        config.question_sequence()
    };

    println!("{} turns loaded from {}", turns.len(), ui::contract_path(file));
    match StackInferencer::new(sequence).try_infer(&turns) {
        Some(stack) => println!("Stack:\n{}", ui::format_stack_summary(&stack)),
        None => println!(
            "No stack inferred: the transcript is not at the end of the {}-question sequence.",
            sequence.question_count()
        ),
    }
    Ok(())
}

fn workflow_server(config: &Config) -> Result<LocalServer> {
    let db_path = config.database_path();
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    Ok(LocalServer::new(store, QuestionScript::default()))
}

async fn run_transitions(config: &Config, item: i64) -> Result<()> {
    let server = workflow_server(config)?;
    let targets = server.list_valid_transitions(item).await?;
    if targets.is_empty() {
        println!("Item {} is in a terminal status.", item);
    } else {
        println!("Item {} can move to: {}", item, targets.join(", "));
    }
    Ok(())
}

async fn run_move(config: &Config, item: i64, status: &str, reason: Option<&str>) -> Result<()> {
    let server = workflow_server(config)?;
    transition_checked(&server, item, status, reason).await?;
    println!("Item {} moved to {}.", item, status);
    Ok(())
}

/// Name of the directory, used as the default project name.
fn directory_name(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}

/// First prose line of the directory's README, used as the default description.
/// Headings, badges, and HTML lines are skipped.
fn readme_summary(dir: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(dir.join("README.md")).ok()?;
    contents
        .lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with('#')
                && !line.starts_with('!')
                && !line.starts_with('<')
                && !line.starts_with("[!")
        })
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KickoffError;

    fn selection(text: &str) -> ChoiceSelection {
        ChoiceSelection::new(parser::parse(text).options.unwrap())
    }

    #[test]
    fn test_cli_defaults_to_interview() {
        let cli = Cli::try_parse_from(["kickoff"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["kickoff", "move", "3", "done", "--reason", "shipped"])
            .unwrap();
        match cli.command {
            Some(Command::Move {
                item,
                status,
                reason,
            }) => {
                assert_eq!(item, 3);
                assert_eq!(status, "done");
                assert_eq!(reason.as_deref(), Some("shipped"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_build_reply_empty_uses_prefill() {
        assert_eq!(
            build_reply("", None, Some("acme")).unwrap(),
            Reply::Text("acme".to_string())
        );
        assert!(build_reply("", None, None).is_err());
    }

    #[test]
    fn test_build_reply_numbers_pick_options() {
        let mut sel = selection("Pick\n☐ A\n☐ B\n☐ C");
        match build_reply("3, 1", Some(&mut sel), None).unwrap() {
            Reply::Choice(answer) => {
                assert_eq!(answer.content, "C, A");
                assert_eq!(answer.selected_option_ids, vec!["opt-2", "opt-0"]);
            }
            other => panic!("expected choice, got {:?}", other),
        }
    }

    #[test]
    fn test_build_reply_out_of_range() {
        let mut sel = selection("Pick\n○ A\n○ B");
        assert_eq!(
            build_reply("5", Some(&mut sel), None).unwrap_err(),
            "There is no option 5."
        );
    }

    #[test]
    fn test_build_reply_empty_single_selection() {
        // Picking the same option twice clears it again
        let mut sel = selection("Pick\n○ A\n○ B");
        assert_eq!(
            build_reply("1 1", Some(&mut sel), None).unwrap_err(),
            KickoffError::EmptySelection.to_string()
        );
    }

    #[test]
    fn test_build_reply_text_passthrough() {
        let mut sel = selection("Pick\n○ A\n○ B");
        assert_eq!(
            build_reply("Elixir", Some(&mut sel), None).unwrap(),
            Reply::Text("Elixir".to_string())
        );
        assert_eq!(
            build_reply("42", None, None).unwrap(),
            Reply::Text("42".to_string())
        );
    }

    #[test]
    fn test_readme_summary_skips_headings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("README.md"),
            "# acme\n\n![badge](x.svg)\n\nA tool for tracking widgets.\n\nMore text.",
        )
        .unwrap();
        assert_eq!(
            readme_summary(dir.path()).as_deref(),
            Some("A tool for tracking widgets.")
        );
    }

    #[test]
    fn test_readme_summary_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(readme_summary(dir.path()), None);
    }

    #[test]
    fn test_directory_name() {
        assert_eq!(
            directory_name(Path::new("/work/acme-web")).as_deref(),
            Some("acme-web")
        );
    }
}
