use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use pc_core::core::{
    AnnotationSession, BatchProgress, Notice, NoticeLevel, Phase, ProgressObserver, ReviewView,
    SessionError, View,
};
use pc_server::bootstrap::{self, LogFormat, RuntimeConfig};
use pc_server::config::AppConfig;
use pc_server::telemetry;

#[derive(Debug, Parser)]
#[command(name = "pc-annotate", about = "Terminal reviewer for DPO preference pairs")]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Restore the saved session before doing anything else.
    #[arg(long, default_value = "false")]
    resume: bool,
    /// User prompt for the first batch.
    #[arg(long)]
    prompt: Option<String>,
    /// Responses per system prompt for the first batch.
    #[arg(long)]
    responses: Option<usize>,
}

struct TerminalProgress;

impl ProgressObserver for TerminalProgress {
    fn on_progress(&self, progress: BatchProgress) {
        if progress.is_running() {
            println!(
                "{}",
                format!(
                    "Generating group {} / {}...",
                    progress.completed + 1,
                    progress.total
                )
                .bright_black()
            );
        }
    }
}

fn prompt_line(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(input.trim().to_owned())),
        Err(err) => Err(err),
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message.bright_green()),
            NoticeLevel::Warning => eprintln!("{}", notice.message.yellow()),
            NoticeLevel::Error => eprintln!("{}", format!("Error: {}", notice.message).red()),
        }
    }
}

// ---------------------------------------------------------------------------
// Review commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum ReviewCommand {
    /// Zero-based indexes of the responses marked best.
    Select(Vec<usize>),
    Skip,
    Regenerate,
    Edit(usize),
    Quit,
}

fn parse_review_command(input: &str, slots: usize) -> Result<ReviewCommand, String> {
    let input = input.trim();
    match input.to_ascii_lowercase().as_str() {
        "s" | "skip" => return Ok(ReviewCommand::Skip),
        "r" | "regenerate" => return Ok(ReviewCommand::Regenerate),
        "q" | "quit" | "exit" => return Ok(ReviewCommand::Quit),
        "" => return Err("Enter response numbers, s, r, e N or q.".to_owned()),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix("e ").or_else(|| input.strip_prefix("E ")) {
        let index = parse_slot_number(rest.trim(), slots)?;
        return Ok(ReviewCommand::Edit(index));
    }

    let mut selected = Vec::new();
    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let index = parse_slot_number(token, slots)?;
        if !selected.contains(&index) {
            selected.push(index);
        }
    }
    selected.sort_unstable();
    Ok(ReviewCommand::Select(selected))
}

fn parse_slot_number(token: &str, slots: usize) -> Result<usize, String> {
    match token.parse::<usize>() {
        Ok(n) if (1..=slots).contains(&n) => Ok(n - 1),
        _ => Err(format!("Response numbers must be between 1 and {slots}, got {token:?}.")),
    }
}

fn selection_flags(selected: &[usize], slots: usize) -> Vec<bool> {
    (0..slots).map(|i| selected.contains(&i)).collect()
}

fn print_review(review: &ReviewView, edited: &[String]) {
    println!();
    println!("{}", review.progress_text.bold());
    println!("{} {}", "System:".bright_cyan(), review.system);
    println!("{} {}", "User:".bright_cyan(), review.user);
    for slot in &review.slots {
        let text = edited.get(slot.index).unwrap_or(&slot.text);
        println!();
        println!("{}", format!("[{}] {}", slot.index + 1, slot.label).bright_yellow());
        println!("{text}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn load_runtime(args: &Args) -> Result<RuntimeConfig, String> {
    let config = AppConfig::from_file(&args.config)
        .map_err(|e| format!("reading config {}: {e}", args.config.display()))?;
    bootstrap::into_runtime(config).map_err(|e| format!("config invalid: {e}"))
}

#[tokio::main]
async fn main() {
    let mut args = Args::parse();

    let runtime = match load_runtime(&args) {
        Ok(runtime) => runtime,
        Err(message) => {
            eprintln!("{}", format!("Error: {message}").red());
            std::process::exit(1);
        }
    };
    telemetry::init_tracing("warn", LogFormat::Pretty);

    let mut session = match bootstrap::build_session(&runtime, Arc::new(TerminalProgress)) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", format!("Error: {err}").red());
            std::process::exit(1);
        }
    };

    if args.resume {
        print_notices(&session.resume());
    }

    run(&mut session, &mut args, &runtime).await;
}

async fn run(session: &mut AnnotationSession, args: &mut Args, runtime: &RuntimeConfig) {
    // Edited response texts for the group at the given cursor.
    let mut edits: Option<(usize, Vec<String>)> = None;

    loop {
        match session.phase() {
            Phase::Empty => {
                if !start_batch(session, args, runtime).await {
                    break;
                }
            }
            Phase::Complete => {
                if let View::Complete(complete) = session.view().view {
                    println!(
                        "{}",
                        format!(
                            "Round complete: reviewed {} groups, collected {} pairs. Records are in {}.",
                            complete.groups_reviewed,
                            complete.pairs_collected,
                            runtime.output_file.display()
                        )
                        .bright_green()
                    );
                }
                match prompt_line("Start a new round? [y/N]: ") {
                    Ok(Some(answer)) if answer.eq_ignore_ascii_case("y") => {
                        print_notices(&session.start_new_round());
                    }
                    _ => break,
                }
            }
            Phase::Reviewing => {
                let View::Review(review) = session.view().view else {
                    break;
                };
                let edited = match edits.take() {
                    Some((cursor, texts)) if cursor == review.cursor => texts,
                    _ => review.slots.iter().map(|s| s.text.clone()).collect(),
                };
                print_review(&review, &edited);

                let input = match prompt_line(
                    "Best responses (e.g. 1 3), [s]kip, [r]egenerate, [e N] edit, [q]uit: ",
                ) {
                    Ok(Some(value)) => value,
                    Ok(None) => break,
                    Err(err) => {
                        eprintln!("{}", format!("Failed to read input: {err}").red());
                        break;
                    }
                };

                match parse_review_command(&input, review.slots.len()) {
                    Ok(ReviewCommand::Select(selected)) => {
                        let flags = selection_flags(&selected, review.slots.len());
                        report(session.confirm_or_skip(&edited, &flags));
                    }
                    Ok(ReviewCommand::Skip) => report(session.skip()),
                    Ok(ReviewCommand::Regenerate) => {
                        report(session.regenerate_current().await);
                    }
                    Ok(ReviewCommand::Edit(index)) => {
                        let mut edited = edited;
                        match prompt_line(&format!("New text for response {}: ", index + 1)) {
                            Ok(Some(text)) if !text.is_empty() => {
                                // Literal \n in the input becomes a line break.
                                if let Some(slot) = edited.get_mut(index) {
                                    *slot = text.replace("\\n", "\n");
                                }
                            }
                            Ok(_) => {}
                            Err(err) => {
                                eprintln!("{}", format!("Failed to read input: {err}").red());
                            }
                        }
                        edits = Some((review.cursor, edited));
                    }
                    Ok(ReviewCommand::Quit) => break,
                    Err(message) => {
                        eprintln!("{}", message.yellow());
                        edits = Some((review.cursor, edited));
                    }
                }
            }
        }
    }

    if session.phase() != Phase::Empty {
        println!(
            "Session saved to {}. Continue later with --resume.",
            runtime.session_file.display()
        );
    }
}

fn report(result: Result<Vec<Notice>, SessionError>) {
    match result {
        Ok(notices) => print_notices(&notices),
        Err(err) => eprintln!("{}", err.to_string().yellow()),
    }
}

/// Returns false when the operator is done.
async fn start_batch(
    session: &mut AnnotationSession,
    args: &mut Args,
    runtime: &RuntimeConfig,
) -> bool {
    let user_prompt = match args.prompt.take() {
        Some(prompt) => prompt,
        None => {
            let default_hint = if runtime.initial_user_prompt.is_empty() {
                String::new()
            } else {
                format!(" [{}]", runtime.initial_user_prompt)
            };
            match prompt_line(&format!("User prompt{default_hint} (q to quit): ")) {
                Ok(Some(value)) if value.eq_ignore_ascii_case("q") => return false,
                Ok(Some(value)) if value.is_empty() => runtime.initial_user_prompt.clone(),
                Ok(Some(value)) => value,
                Ok(None) => return false,
                Err(err) => {
                    eprintln!("{}", format!("Failed to read input: {err}").red());
                    return false;
                }
            }
        }
    };

    let n = match args.responses.take() {
        Some(n) => n,
        None => {
            let prompt = format!(
                "Responses per system prompt [{}] (max {}): ",
                runtime.limits.default, runtime.limits.max
            );
            match prompt_line(&prompt) {
                Ok(Some(value)) if value.is_empty() => runtime.limits.default,
                Ok(Some(value)) => match value.parse() {
                    Ok(n) => n,
                    Err(_) => {
                        eprintln!("{}", "Please enter a whole number.".yellow());
                        return true;
                    }
                },
                Ok(None) => return false,
                Err(err) => {
                    eprintln!("{}", format!("Failed to read input: {err}").red());
                    return false;
                }
            }
        }
    };

    report(session.start_batch(&user_prompt, n).await);
    true
}
