use anyhow::{Context, Result};
use clap::Parser;
use simile::config::parse_duration;
use simile::{
    Engine, LineEnding, LineKind, LineReport, RunConfig, RunEvent, Syntax, check_str, logging,
    parse_file,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "simile",
    about = "Check an interactive program's console output against a script",
    version
)]
struct Args {
    /// Path to the script file
    #[arg(short, long)]
    script: PathBuf,

    /// Executable to run
    #[arg(short, long, required_unless_present = "check")]
    command: Option<PathBuf>,

    /// Only validate the script, reporting every malformed line
    #[arg(long)]
    check: bool,

    /// Script uses one-character line prefixes ('.' output, ';' prompt, '>' input)
    #[arg(long)]
    legacy: bool,

    /// Warn once if the run takes longer than this (e.g. 5s, 500ms)
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    stall_timeout: Duration,

    /// How long a prompt read waits for more characters
    #[arg(long, default_value = "250ms", value_parser = parse_duration)]
    prompt_wait: Duration,

    /// Terminate input lines with CRLF instead of LF
    #[arg(long)]
    crlf: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Arguments to pass to the executable
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

impl Args {
    fn syntax(&self) -> Syntax {
        if self.legacy {
            Syntax::Legacy
        } else {
            Syntax::Tagged
        }
    }

    fn run_config(&self) -> RunConfig {
        let line_ending = if self.crlf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        RunConfig::default()
            .with_stall_timeout(self.stall_timeout)
            .with_prompt_idle(self.prompt_wait)
            .with_line_ending(line_ending)
            .with_args(self.args.iter().cloned())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    if args.check {
        return check(&args.script, args.syntax());
    }

    let script = parse_file(&args.script, args.syntax())
        .with_context(|| format!("Failed to parse script file: {}", args.script.display()))?;
    let command = args
        .command
        .clone()
        .context("No executable given (use --command)")?;

    let engine = Engine::new(args.run_config());
    let mut handle = engine
        .begin(script, &command)
        .with_context(|| format!("Failed to start {}", command.display()))?;

    let stopper = handle.stop_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    let mut summary = None;
    while let Some(event) = handle.next_event().await {
        match &event {
            RunEvent::Line(report) => println!("{}", render_line(report)),
            RunEvent::Diagnostic(line) => eprintln!("stderr: {line}"),
            RunEvent::Stalled(after) => eprintln!(
                "note: still running after {after:?}; probable input/output mismatch or infinite loop"
            ),
            RunEvent::Started { .. } => {}
            RunEvent::Finished(done) => {
                summary = Some(*done);
                break;
            }
        }
    }

    let summary = match summary {
        Some(summary) => summary,
        None => handle.finish().await.context("Run failed")?,
    };
    println!("{summary}");

    Ok(if summary.all_matched() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn check(path: &Path, syntax: Syntax) -> Result<ExitCode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script file: {}", path.display()))?;
    let errors = check_str(&content, syntax);
    for error in &errors {
        eprintln!("{}:{error}", path.display());
    }
    if errors.is_empty() {
        println!("{}: ok", path.display());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

/// One report as a terminal line. Continuations are indented under the
/// line they extend.
fn render_line(report: &LineReport) -> String {
    let indent = if report.continuation { "    " } else { "" };
    match report.kind {
        LineKind::Input => format!("{indent}> {}", report.display_text()),
        LineKind::Output if report.matched => format!("{indent}✓ {}", report.display_text()),
        LineKind::Output => {
            let actual = match &report.actual {
                Some(text) => text.as_str(),
                None => "<no output>",
            };
            format!("{indent}✗ {actual}\n{indent}  expected: {}", report.expected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(kind: LineKind, actual: Option<&str>, matched: bool) -> LineReport {
        LineReport {
            index: 0,
            kind,
            actual: actual.map(str::to_string),
            expected: "Hi Chris".into(),
            continuation: false,
            matched,
        }
    }

    #[test]
    fn test_render_matched_output() {
        assert_eq!(
            render_line(&report(LineKind::Output, Some("Hi Chris"), true)),
            "✓ Hi Chris"
        );
    }

    #[test]
    fn test_render_mismatch_shows_expected() {
        assert_eq!(
            render_line(&report(LineKind::Output, None, false)),
            "✗ <no output>\n  expected: Hi Chris"
        );
    }

    #[test]
    fn test_render_input_continuation() {
        let mut input = report(LineKind::Input, Some("Chris"), true);
        input.continuation = true;
        assert_eq!(render_line(&input), "    > Chris");
    }

    #[test]
    fn test_args_config() {
        let args = Args::parse_from([
            "simile", "-s", "a.simile", "-c", "./prog", "--crlf", "--stall-timeout", "2s", "--",
            "--flag",
        ]);
        let config = args.run_config();
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.stall_timeout, Duration::from_secs(2));
        assert_eq!(config.args, vec!["--flag".to_string()]);
        assert_eq!(args.syntax(), Syntax::Tagged);
    }
}
