use genie_app::{AnswerOutcome, GameService, ServiceConfig, ServiceError};
use genie_core::AppInfo;
use genie_core::belief::GradedAnswer;
use genie_core::knowledge::{KnowledgeBase, LoadError};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_SNAPSHOT: &str = "data/knowledge.json";

#[derive(Debug)]
enum CliError {
    Usage(String),
    Load(LoadError),
    Io(io::Error),
    Service(ServiceError),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => {
                write!(f, "{msg}\nusage: mdgenie [--json] [snapshot-path]")
            }
            CliError::Load(err) => write!(f, "could not load knowledge base: {err}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Service(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(value: io::Error) -> Self {
        CliError::Io(value)
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        CliError::Service(value)
    }
}

#[derive(Debug)]
struct CliOptions {
    snapshot: PathBuf,
    json_summary: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliOptions, CliError> {
    let mut snapshot = None;
    let mut json_summary = false;
    for arg in args {
        match arg.as_str() {
            "--json" => json_summary = true,
            "--help" | "-h" => {
                return Err(CliError::Usage(format!(
                    "{} {} ({})",
                    AppInfo::name(),
                    AppInfo::version(),
                    AppInfo::codename()
                )));
            }
            other if other.starts_with('-') => {
                return Err(CliError::Usage(format!("unknown flag: {other}")));
            }
            other => {
                if snapshot.replace(PathBuf::from(other)).is_some() {
                    return Err(CliError::Usage("more than one snapshot path given".into()));
                }
            }
        }
    }
    Ok(CliOptions {
        snapshot: snapshot.unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT)),
        json_summary,
    })
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let options = parse_args(std::env::args().skip(1))?;
    let kb = Arc::new(KnowledgeBase::load(&options.snapshot).map_err(CliError::Load)?);
    println!(
        "{} — think of a person; I will try to guess.\nLoaded {} candidates and {} questions.\nAnswers: y / n / p (probably) / pn (probably not) / dk (don't know); g shows my best guess, q quits.",
        AppInfo::name(),
        kb.entity_count(),
        kb.attribute_count()
    );

    let service = GameService::new(kb, ServiceConfig::from_env());
    let started = service.start_game()?;
    let game_id = started.game_id;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut question_id = started.question_id;
    let mut question = started.question;
    let mut turn = 1u32;

    loop {
        print!("Q{turn}: {question} ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let input = line?;
        let trimmed = input.trim();

        if trimmed.eq_ignore_ascii_case("q") {
            break;
        }
        if trimmed.eq_ignore_ascii_case("g") {
            let top = service.top_guess(game_id)?;
            println!(
                "My best guess so far: {} ({:.0}%)",
                top.name,
                top.confidence * 100.0
            );
            continue;
        }
        let Some(answer) = GradedAnswer::parse(trimmed) else {
            println!("Please answer y, n, p, pn or dk (or g / q).");
            continue;
        };

        match service.submit_answer(game_id, question_id, answer.value())? {
            AnswerOutcome::NextQuestion {
                question_id: next_id,
                question: next_text,
                top_guess,
            } => {
                if let Some(leader) = top_guess {
                    println!(
                        "(still thinking of {} at {:.0}%...)",
                        leader.name,
                        leader.confidence * 100.0
                    );
                }
                question_id = next_id;
                question = next_text;
                turn += 1;
            }
            AnswerOutcome::GuessReady { guess } => {
                print!(
                    "I think it's {} ({:.0}%). Am I right? (y/n) ",
                    guess.name,
                    guess.confidence * 100.0
                );
                io::stdout().flush()?;
                let verdict = lines.next().transpose()?.unwrap_or_default();
                if GradedAnswer::parse(verdict.trim()) == Some(GradedAnswer::Yes) {
                    let accepted = service.accept_guess(game_id)?;
                    println!("Got it: {}!", accepted.name);
                    return Ok(());
                }
                match service.reject_guess(game_id)? {
                    AnswerOutcome::NextQuestion {
                        question_id: next_id,
                        question: next_text,
                        ..
                    } => {
                        println!("Alright, let me keep asking.");
                        question_id = next_id;
                        question = next_text;
                        turn += 1;
                    }
                    AnswerOutcome::Exhausted { guess } => {
                        println!(
                            "I give up. My best remaining answer was {} ({:.0}%).",
                            guess.name,
                            guess.confidence * 100.0
                        );
                        break;
                    }
                    AnswerOutcome::GuessReady { guess } => {
                        println!("Then it must be {}.", guess.name);
                        break;
                    }
                }
            }
            AnswerOutcome::Exhausted { guess } => {
                println!(
                    "I'm out of questions. My best answer is {} ({:.0}%).",
                    guess.name,
                    guess.confidence * 100.0
                );
                break;
            }
        }
    }

    print_summary(&service, game_id, options.json_summary)
}

fn print_summary(
    service: &GameService,
    game_id: genie_app::GameId,
    as_json: bool,
) -> Result<(), CliError> {
    let ranked = match service.ranked_guesses(game_id, 5) {
        Ok(ranked) => ranked,
        // The session is gone once a guess was accepted; nothing to show.
        Err(ServiceError::UnknownGameId(_)) => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ranked).map_err(CliError::Json)?
        );
        return Ok(());
    }

    println!("Top candidates:");
    for (rank, guess) in ranked.iter().enumerate() {
        println!(
            "  {}. {} ({:.1}%)",
            rank + 1,
            guess.name,
            guess.confidence * 100.0
        );
    }
    Ok(())
}
