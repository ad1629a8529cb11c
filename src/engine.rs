use crate::cancel::StopToken;
use crate::config::RunConfig;
use crate::error::{RunError, SetupError};
use crate::event::{LineKind, LineReport, RunEvent, Summary};
use crate::matcher::match_line;
use crate::process::{ChildTarget, spawn_stderr_reader};
use crate::script::{Script, ScriptLine, Terminator};
use crate::target::Target;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// How long a finished run waits for the last stderr lines.
const STDERR_DRAIN: Duration = Duration::from_millis(200);

/// Runs scripts against programs, one background task per run.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: RunConfig,
}

/// A run in progress.
pub struct RunHandle {
    events: UnboundedReceiver<RunEvent>,
    stop: StopToken,
    task: JoinHandle<Summary>,
}

impl Engine {
    pub fn new(config: RunConfig) -> Self {
        Engine { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Spawn `executable` and start driving it through `script`.
    ///
    /// Returns as soon as the worker task is running. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails without starting anything if `executable` is not an existing
    /// file or cannot be launched.
    pub fn begin(
        &self,
        script: impl Into<Arc<Script>>,
        executable: impl AsRef<Path>,
    ) -> Result<RunHandle, SetupError> {
        let (target, stderr) = ChildTarget::spawn(executable.as_ref(), &self.config)?;
        let (events, rx) = unbounded_channel();
        let _ = events.send(RunEvent::Started { pid: target.id() });
        let stderr_task = spawn_stderr_reader(stderr, events.clone());
        Ok(self.launch(
            script.into(),
            Box::new(target),
            events,
            rx,
            Some(stderr_task),
        ))
    }

    /// Drive an already running target through `script`.
    pub fn begin_with_target(
        &self,
        script: impl Into<Arc<Script>>,
        target: Box<dyn Target>,
    ) -> RunHandle {
        let (events, rx) = unbounded_channel();
        self.launch(script.into(), target, events, rx, None)
    }

    fn launch(
        &self,
        script: Arc<Script>,
        mut target: Box<dyn Target>,
        events: UnboundedSender<RunEvent>,
        rx: UnboundedReceiver<RunEvent>,
        stderr_task: Option<JoinHandle<()>>,
    ) -> RunHandle {
        let stop = StopToken::new();
        let worker_stop = stop.clone();
        let stall_timeout = self.config.stall_timeout;

        let task = tokio::spawn(async move {
            let watchdog = spawn_watchdog(stall_timeout, events.clone());
            let summary = drive(&script, target.as_mut(), &worker_stop, &events).await;
            watchdog.abort();

            if let Some(mut stderr_task) = stderr_task {
                if timeout(STDERR_DRAIN, &mut stderr_task).await.is_err() {
                    debug!("stderr still open after run; no longer forwarding it");
                    stderr_task.abort();
                }
            }

            info!(
                compared = summary.compared,
                matched = summary.matched,
                stopped = summary.stopped,
                "run finished"
            );
            let _ = events.send(RunEvent::Finished(summary));
            summary
        });

        RunHandle {
            events: rx,
            stop,
            task,
        }
    }

    /// Run `script` against `executable` to completion, logging each event.
    pub async fn run(
        &self,
        script: impl Into<Arc<Script>>,
        executable: impl AsRef<Path>,
    ) -> Result<Summary, RunError> {
        let mut handle = self.begin(script, executable)?;
        while let Some(event) = handle.next_event().await {
            log_event(&event);
            if matches!(event, RunEvent::Finished(_)) {
                break;
            }
        }
        handle.finish().await
    }
}

impl RunHandle {
    /// Ask the worker to stop. The target is killed and the summary is
    /// marked as stopped.
    pub fn request_stop(&self) {
        info!("stop requested");
        self.stop.stop();
    }

    /// A token that stops this run when set, for use from other tasks.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// The next event, or `None` once every sender is gone.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the worker and return its summary.
    pub async fn finish(self) -> Result<Summary, RunError> {
        Ok(self.task.await?)
    }
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::Started { pid } => info!(?pid, "target started"),
        RunEvent::Line(report) if report.matched => {
            debug!(index = report.index, actual = report.display_text(), "line matched")
        }
        RunEvent::Line(report) => warn!(
            index = report.index,
            actual = ?report.actual,
            expected = %report.expected,
            "line did not match"
        ),
        RunEvent::Diagnostic(line) => info!(stderr = %line, "target diagnostic"),
        RunEvent::Stalled(after) => warn!(?after, "target is taking a while"),
        RunEvent::Finished(summary) => info!(%summary, "finished"),
    }
}

/// Fire one stall advisory after `after` of wall-clock time.
fn spawn_watchdog(after: Duration, events: UnboundedSender<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(after).await;
        warn!(
            elapsed = ?after,
            "target is taking a while; probable input/output mismatch or infinite loop"
        );
        let _ = events.send(RunEvent::Stalled(after));
    })
}

/// Counts visual lines. A prompt and the output continuing it are one
/// line, matched only if both parts matched.
#[derive(Debug, Default)]
struct Tally {
    compared: usize,
    matched: usize,
    current_matched: bool,
}

impl Tally {
    fn record(&mut self, matched: bool, continuation: bool) {
        if !continuation {
            self.compared += 1;
            if matched {
                self.matched += 1;
            }
            self.current_matched = matched;
        } else if self.current_matched && !matched {
            self.matched -= 1;
            self.current_matched = false;
        }
    }
}

/// `None` if a stop was requested before `work` completed.
async fn until_stopped<F: Future>(stop: &StopToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = stop.stopped() => None,
        output = work => Some(output),
    }
}

/// Walk the script in order, reporting each line before starting the next.
async fn drive(
    script: &Script,
    target: &mut dyn Target,
    stop: &StopToken,
    events: &UnboundedSender<RunEvent>,
) -> Summary {
    let mut tally = Tally::default();
    let mut previous_same_line = false;
    let mut stopped = false;

    for (index, line) in script.iter().enumerate() {
        let continuation = previous_same_line;
        if stop.is_stopped() {
            stopped = true;
            break;
        }

        let report = match line {
            ScriptLine::Output(expectation) => {
                let read = async {
                    match expectation.terminator {
                        Terminator::LineTerminated => target.read_line().await,
                        Terminator::SameLine => {
                            target.read_prompt(expectation.literal_len()).await
                        }
                    }
                };
                let Some(read) = until_stopped(stop, read).await else {
                    stopped = true;
                    break;
                };
                let actual = read.unwrap_or_else(|e| {
                    warn!(index, error = %e, "reading target output failed");
                    None
                });

                let outcome = match_line(expectation, actual.as_deref());
                debug!(
                    index,
                    matched = outcome.matched,
                    ?actual,
                    expected = %expectation.raw_text,
                    "compared output"
                );
                previous_same_line = expectation.terminator == Terminator::SameLine;
                LineReport {
                    index,
                    kind: LineKind::Output,
                    actual,
                    expected: expectation.raw_text.clone(),
                    continuation,
                    matched: outcome.matched,
                }
            }
            ScriptLine::Input(input) => {
                let Some(written) = until_stopped(stop, target.write_line(&input.text)).await
                else {
                    stopped = true;
                    break;
                };
                if let Err(e) = written {
                    warn!(index, error = %e, "writing input to target failed");
                }
                debug!(index, text = %input.text, "sent input");
                previous_same_line = false;
                LineReport {
                    index,
                    kind: LineKind::Input,
                    actual: Some(input.text.clone()),
                    expected: input.text.clone(),
                    continuation,
                    matched: true,
                }
            }
        };

        // Anything captured after a stop request is dropped, not reported.
        if stop.is_stopped() {
            stopped = true;
            break;
        }
        if report.kind == LineKind::Output {
            tally.record(report.matched, report.continuation);
        }
        let _ = events.send(RunEvent::Line(report));
    }

    let ended = if stopped {
        target.terminate().await
    } else {
        target.shutdown().await
    };
    if let Err(e) = ended {
        debug!(error = %e, "ending target failed");
    }

    Summary {
        compared: tally.compared,
        matched: tally.matched,
        stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Syntax, parse_lines, parse_str};
    use crate::target::StreamTarget;
    use pretty_assertions::assert_eq;
    use tokio::io::{duplex, sink};

    fn canned(output: &'static str) -> Box<dyn Target> {
        Box::new(StreamTarget::new(output.as_bytes(), sink()))
    }

    async fn collect(mut handle: RunHandle) -> (Vec<RunEvent>, Summary) {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            let done = matches!(event, RunEvent::Finished(_));
            events.push(event);
            if done {
                break;
            }
        }
        (events, handle.finish().await.unwrap())
    }

    fn lines(events: &[RunEvent]) -> Vec<&LineReport> {
        events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Line(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_prompt_and_input_session() {
        let script = parse_str("Hello!\nName? {{Chris}}\nHi Chris").unwrap();
        let handle = Engine::default()
            .begin_with_target(script, canned("Hello!\nName? Hi Chris\n"));
        let (events, summary) = collect(handle).await;

        assert_eq!(
            summary,
            Summary {
                compared: 3,
                matched: 3,
                stopped: false
            }
        );
        let reports = lines(&events);
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[1].actual.as_deref(), Some("Name? "));
        assert_eq!(reports[2].kind, LineKind::Input);
        assert!(reports[2].continuation);
        assert!(!reports[3].continuation);
        assert_eq!(events.last(), Some(&RunEvent::Finished(summary)));
    }

    #[tokio::test]
    async fn test_legacy_session() {
        let script = parse_lines(
            [".Hello!", ";Name? ", ">Chris", ".Hi Chris"],
            Syntax::Legacy,
        )
        .unwrap();
        let handle = Engine::default()
            .begin_with_target(script, canned("Hello!\nName? Hi Chris\n"));
        let (_, summary) = collect(handle).await;
        assert_eq!((summary.compared, summary.matched), (3, 3));
    }

    #[tokio::test]
    async fn test_mismatch_and_early_exit_do_not_abort() {
        let script = parse_str("Hello!\nYou are [[t=int;min=0]] years old\nBye").unwrap();
        let handle = Engine::default().begin_with_target(script, canned("Hullo!\n"));
        let (events, summary) = collect(handle).await;

        assert_eq!(
            summary,
            Summary {
                compared: 3,
                matched: 0,
                stopped: false
            }
        );
        let reports = lines(&events);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].actual.as_deref(), Some("Hullo!"));
        assert_eq!(reports[1].actual, None);
        assert_eq!(reports[2].actual, None);
    }

    #[tokio::test]
    async fn test_continuation_counts_one_visual_line() {
        let script = parse_lines([";Total: ", ".42", ";Total: ", ".43"], Syntax::Legacy).unwrap();
        let handle = Engine::default()
            .begin_with_target(script, canned("Total: 42\nTotal: 42\n"));
        let (events, summary) = collect(handle).await;

        assert_eq!((summary.compared, summary.matched), (2, 1));
        let continuations: Vec<bool> = lines(&events).iter().map(|r| r.continuation).collect();
        assert_eq!(continuations, vec![false, true, false, true]);
    }

    #[tokio::test]
    async fn test_stop_while_blocked() {
        let (_program, ours) = duplex(64);
        let target = Box::new(StreamTarget::new(ours, sink()));
        let script = parse_str("one\ntwo\nthree").unwrap();
        let total = script.output_count();

        let handle = Engine::default().begin_with_target(script, target);
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.request_stop();

        let (events, summary) = timeout(Duration::from_secs(2), collect(handle))
            .await
            .expect("stop should unblock the worker");
        assert!(summary.stopped);
        assert!(summary.compared < total);
        assert!(lines(&events).is_empty());
    }

    #[tokio::test]
    async fn test_stall_advisory_fires_once() {
        let (_program, ours) = duplex(64);
        let target = Box::new(StreamTarget::new(ours, sink()));
        let engine =
            Engine::new(RunConfig::default().with_stall_timeout(Duration::from_millis(20)));
        let mut handle = engine.begin_with_target(parse_str("never").unwrap(), target);

        let first = timeout(Duration::from_secs(2), handle.next_event())
            .await
            .unwrap();
        assert_eq!(first, Some(RunEvent::Stalled(Duration::from_millis(20))));

        handle.request_stop();
        let (events, summary) = collect(handle).await;
        assert!(summary.stopped);
        assert!(!events.iter().any(|e| matches!(e, RunEvent::Stalled(_))));
    }

    #[test]
    fn test_tally() {
        let mut tally = Tally::default();
        tally.record(true, false);
        tally.record(true, true);
        tally.record(true, false);
        tally.record(false, true);
        tally.record(false, false);
        tally.record(true, true);
        assert_eq!((tally.compared, tally.matched), (3, 1));
    }

    #[tokio::test]
    async fn test_begin_rejects_missing_executable() {
        let err = Engine::default()
            .begin(parse_str("x").unwrap(), "/definitely/not/here")
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::ExecutableNotFound(_)));
    }
}
