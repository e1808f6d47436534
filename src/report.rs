//! End-of-run summary printed to stdout.
use crate::sequencer::{Outcome, RunSummary, Terminal};

/// Overall verdict for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    ReadyWithDegradations(usize),
    Failed,
}

pub fn verdict(summary: &RunSummary) -> Verdict {
    match summary.terminal {
        Terminal::Failed(_) => Verdict::Failed,
        Terminal::Done => match summary.degraded_count() {
            0 => Verdict::Ready,
            count => Verdict::ReadyWithDegradations(count),
        },
    }
}

/// Render every stage result, the verdict, the endpoint or manual start
/// command, and next steps.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut lines = Vec::new();
    match summary.platform {
        Some(platform) => lines.push(format!("Bootstrap summary ({platform})")),
        None => lines.push("Bootstrap summary".to_string()),
    }
    let label_width = summary
        .results
        .iter()
        .map(|result| result.stage.label().len())
        .max()
        .unwrap_or(0);
    for result in &summary.results {
        let tag = format!("[{}]", result.outcome.as_str());
        lines.push(format!(
            "  {tag:<10} {:<label_width$}  {}",
            result.stage.label(),
            result.detail,
        ));
    }
    lines.push(String::new());

    match verdict(summary) {
        Verdict::Ready => lines.push("Ready.".to_string()),
        Verdict::ReadyWithDegradations(count) => lines.push(format!(
            "Ready with {count} degraded stage{}.",
            if count == 1 { "" } else { "s" }
        )),
        Verdict::Failed => {
            if let Terminal::Failed(stage) = summary.terminal {
                lines.push(format!(
                    "Failed at {}; later stages did not run.",
                    stage.label().to_lowercase()
                ));
            }
        }
    }
    if let Some(endpoint) = &summary.endpoint {
        lines.push(format!("Chat: {endpoint}"));
    } else if let Some(manual) = &summary.manual_start {
        lines.push(format!("Service not running. Start it with: {manual}"));
    }

    let hints: Vec<&str> = summary
        .results
        .iter()
        .filter(|result| result.outcome != Outcome::Ok)
        .filter_map(|result| result.hint.as_deref())
        .collect();
    if !hints.is_empty() {
        lines.push(String::new());
        lines.push("Next steps:".to_string());
        lines.extend(hints.iter().map(|hint| format!("  - {hint}")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::classify;
    use crate::sequencer::{BootstrapResult, Stage};

    fn result(stage: Stage, outcome: Outcome, detail: &str, hint: Option<&str>) -> BootstrapResult {
        BootstrapResult {
            stage,
            outcome,
            detail: detail.to_string(),
            hint: hint.map(str::to_string),
        }
    }

    fn summary(results: Vec<BootstrapResult>, terminal: Terminal) -> RunSummary {
        RunSummary {
            results,
            terminal,
            platform: classify("macos", "arm64").ok(),
            endpoint: None,
            manual_start: None,
        }
    }

    #[test]
    fn clean_run_prints_ready_and_endpoint() {
        let mut run = summary(
            vec![
                result(Stage::Probing, Outcome::Ok, "macos/arm64", None),
                result(Stage::Launching, Outcome::Ok, "service started", None),
            ],
            Terminal::Done,
        );
        run.endpoint = Some("http://127.0.0.1:18789/".to_string());

        let text = render_summary(&run);
        assert_eq!(verdict(&run), Verdict::Ready);
        assert!(text.starts_with("Bootstrap summary (macos/arm64)"));
        assert!(text.contains("[ok]       Platform  macos/arm64"));
        assert!(text.contains("Ready."));
        assert!(text.contains("Chat: http://127.0.0.1:18789/"));
        assert!(!text.contains("Next steps"));
    }

    #[test]
    fn degraded_run_lists_fallbacks_and_manual_start() {
        let mut run = summary(
            vec![
                result(
                    Stage::BootstrappingInference,
                    Outcome::Degraded,
                    "bootstrap script not found",
                    Some("default models: kimi-k2.5, glm-4.7-flash"),
                ),
                result(
                    Stage::Launching,
                    Outcome::Failed,
                    "service launch failed: port in use",
                    Some("start the service manually with `openclaw gateway start`"),
                ),
            ],
            Terminal::Done,
        );
        run.manual_start = Some("openclaw gateway start".to_string());

        let text = render_summary(&run);
        assert_eq!(verdict(&run), Verdict::ReadyWithDegradations(2));
        assert!(text.contains("Ready with 2 degraded stages."));
        assert!(text.contains("Start it with: openclaw gateway start"));
        assert!(text.contains("  - default models: kimi-k2.5, glm-4.7-flash"));
    }

    #[test]
    fn fatal_run_names_the_stage() {
        let run = summary(
            vec![result(
                Stage::ResolvingRuntime,
                Outcome::Failed,
                "could not install node",
                Some("install node 22.0.0 or newer manually, then re-run"),
            )],
            Terminal::Failed(Stage::ResolvingRuntime),
        );
        let text = render_summary(&run);
        assert_eq!(verdict(&run), Verdict::Failed);
        assert!(text.contains("Failed at runtime; later stages did not run."));
        assert!(text.contains("install node 22.0.0 or newer manually"));
    }
}
