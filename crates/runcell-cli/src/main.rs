use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use tokio::sync::broadcast;

use runcell_core::output::{normalize, OutputKind};
use runcell_core::preprocess::{InputSource, StaticInputSource};
use runcell_core::session::SessionStore;
use runcell_core::{
    resolve_language, ExecutionResult, LanguageId, Runner, RunnerConfig, RuntimeStatus, LANGUAGES,
};

mod input;

use input::TerminalInputSource;

#[derive(Parser, Debug)]
#[clap(
    name = "runcell",
    version,
    about = "Run code snippets in managed local interpreter runtimes"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        short,
        help = "Path to runcell.yaml (defaults to <runcell home>/runcell.yaml when present)"
    )]
    config: Option<PathBuf>,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a source file
    Run {
        file: PathBuf,

        #[clap(
            long,
            short,
            help = "Language name (defaults to the file extension, then the last session language)"
        )]
        language: Option<String>,

        #[clap(long, help = "Text passed to the program as stdin")]
        stdin: Option<String>,

        #[clap(long, help = "File whose contents are passed as stdin")]
        stdin_file: Option<PathBuf>,

        #[clap(
            long = "input",
            help = "Preset value for an interactive input prompt (repeatable, consumed in prompt order)"
        )]
        inputs: Vec<String>,
    },
    /// Run code given inline
    Eval {
        code: String,

        #[clap(long, short, help = "Language name (defaults to the last session language)")]
        language: Option<String>,

        #[clap(long, help = "Text passed to the program as stdin")]
        stdin: Option<String>,

        #[clap(
            long = "input",
            help = "Preset value for an interactive input prompt (repeatable, consumed in prompt order)"
        )]
        inputs: Vec<String>,
    },
    /// List supported languages
    Languages,
    /// Start every runtime and report how each settles
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .parse_default_env()
        .init();

    let config = RunnerConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run {
            file,
            language,
            stdin,
            stdin_file,
            inputs,
        } => {
            let code = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let language_name = pick_language(language, Some(&file)).await?;
            let stdin_text = resolve_stdin(stdin, stdin_file).await?;
            run(config, &language_name, &code, &stdin_text, inputs).await
        }
        Commands::Eval {
            code,
            language,
            stdin,
            inputs,
        } => {
            let language_name = pick_language(language, None).await?;
            run(config, &language_name, &code, &stdin.unwrap_or_default(), inputs).await
        }
        Commands::Languages => {
            list_languages();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => status(config).await,
    }
}

async fn run(
    config: RunnerConfig,
    language_name: &str,
    code: &str,
    stdin_text: &str,
    preset_inputs: Vec<String>,
) -> Result<ExitCode> {
    let autostart = config.autostart;
    let input: Box<dyn InputSource> = if preset_inputs.is_empty() {
        Box::new(TerminalInputSource::new())
    } else {
        Box::new(StaticInputSource::new(preset_inputs))
    };
    let runner = Runner::new(config, input).await;

    if let Some(language) = resolve_language(language_name) {
        if !autostart {
            runner.start(language.id).await;
        }
        wait_ready(&runner, language.id).await;
    }

    let result = runner.run_code(language_name, code, stdin_text).await;
    remember_language(language_name).await;
    Ok(render(&result))
}

/// Waits for the context to settle, surfacing loading progress as it
/// arrives.
async fn wait_ready(runner: &Runner, language: LanguageId) {
    let mut transitions = runner.subscribe(language).await;
    let status = runner.status(language).await;
    if matches!(status, RuntimeStatus::Idle) || status.is_terminal() {
        report_settled(language, &status);
        return;
    }
    log::info!("Waiting for the {} runtime", language.display_name());
    loop {
        match transitions.recv().await {
            Ok(RuntimeStatus::Loading {
                message: Some(message),
            }) => {
                log::info!("{}: {}", language.display_name(), message);
            }
            Ok(RuntimeStatus::Loading { message: None }) => {}
            Ok(status) => {
                report_settled(language, &status);
                return;
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn report_settled(language: LanguageId, status: &RuntimeStatus) {
    match status {
        RuntimeStatus::Error { message } => log::warn!(
            "{} runtime failed to start: {}",
            language.display_name(),
            message
        ),
        RuntimeStatus::Ready => log::debug!("{} runtime ready", language.display_name()),
        _ => {}
    }
}

/// Prints the display value and picks the exit code.
fn render(result: &ExecutionResult) -> ExitCode {
    let display = normalize(result);
    match display.kind {
        OutputKind::Success => {
            print!("{}", display.text);
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
        }
        OutputKind::Warning => {
            if !display.text.is_empty() {
                eprint!("{}", display.text);
            }
        }
    }
    if run_failed(result) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// A run counts as failed only when it produced nothing but stderr
/// text. Successful programs that also warn on stderr still exit zero.
fn run_failed(result: &ExecutionResult) -> bool {
    result.stdout.is_empty() && !result.stderr.is_empty()
}

async fn pick_language(explicit: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(name) = explicit {
        return Ok(name);
    }
    if let Some(name) = file.and_then(language_from_extension) {
        return Ok(name.to_string());
    }
    if let Some(name) = last_session_language().await {
        log::info!("Using last session language: {}", name);
        return Ok(name);
    }
    anyhow::bail!("No language specified. Pass --language (for example: --language python).")
}

fn language_from_extension(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str())? {
        "py" => Some("python"),
        "js" | "mjs" => Some("javascript"),
        _ => None,
    }
}

/// Stdin for the run: inline `--stdin` text wins over `--stdin-file`;
/// neither means empty stdin.
async fn resolve_stdin(inline: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = inline {
        return Ok(text);
    }
    match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read stdin file {}", path.display())),
        None => Ok(String::new()),
    }
}

async fn last_session_language() -> Option<String> {
    let store = SessionStore::open_default().ok()?;
    match store.load().await {
        Ok(session) => session.last_language,
        Err(error) => {
            log::warn!("Session file unreadable: {}", error);
            None
        }
    }
}

/// Saves the resolved language as the session default. Failures only
/// warn; the run's outcome stands on its own.
async fn remember_language(name: &str) {
    let language = match resolve_language(name) {
        Some(language) => language,
        None => return,
    };
    let store = match SessionStore::open_default() {
        Ok(store) => store,
        Err(error) => {
            log::debug!("No session store available: {}", error);
            return;
        }
    };
    let mut session = match store.load().await {
        Ok(session) => session,
        Err(error) => {
            log::warn!("Session file unreadable, starting fresh: {}", error);
            runcell_core::Session::default()
        }
    };
    session.remember_language(language.name);
    if let Err(error) = store.save(&session).await {
        log::warn!("Failed to save session: {}", error);
    }
}

fn list_languages() {
    for language in LANGUAGES {
        println!("{:<12} (aliases: {})", language.name, language.aliases.join(", "));
    }
}

async fn status(config: RunnerConfig) -> Result<ExitCode> {
    let runner = Runner::new(
        config,
        Box::new(StaticInputSource::new(Vec::<String>::new())),
    )
    .await;
    let mut failed = false;
    for language in runner.languages() {
        runner.start(language.id).await;
        let settled = runner.wait_until_settled(language.id).await;
        if matches!(settled, RuntimeStatus::Error { .. }) {
            failed = true;
        }
        println!("{:<12} {}", language.name, settled);
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
