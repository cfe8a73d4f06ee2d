//! Built-in demonstrations of the coordinator against the simulated host.
//!
//! User-facing output is collected in a [`Transcript`] and written by the
//! binary.

use std::sync::Arc;

use clap::{Args, ValueEnum};
use tracing::info;

use permiso_core::{CoordinatorConfig, Permission, PermissionCoordinator, ResultSet};

use crate::host::{Session, SimulatedHost, run_event_loop};
use crate::prompt::{DialogCallback, RationaleDialog, prompt_grants};
use crate::transcript::Transcript;

/// Which demonstration to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// Request one permission and report whether it was granted
    Single,
    /// Request two permissions and report how many were granted
    Multiple,
    /// Make two simultaneous requests for the same permission
    Duplicate,
}

#[derive(Debug, Clone, Args)]
pub struct DemoArgs {
    /// Demo to run
    #[arg(value_enum)]
    pub kind: DemoKind,

    /// Deny every host prompt when running non-interactively
    #[arg(long)]
    pub deny: bool,

    /// Have the host ask for a rationale before every prompt
    #[arg(long)]
    pub rationale: bool,
}

fn demo_dialog<F>(transcript: &Transcript, non_interactive: bool, on_result: F) -> DialogCallback<F>
where
    F: FnMut(&ResultSet) + Send,
{
    let dialog = RationaleDialog::new("Needed for demo purposes.")
        .with_title("Permission Rationale")
        .with_button("Continue");
    let out = transcript.clone();
    DialogCallback::new(dialog, non_interactive, on_result)
        .on_shown(move |d: &RationaleDialog| out.push(format!("Rationale: {}", d.message)))
}

/// Run a demo to completion and return its transcript.
pub async fn run(
    args: &DemoArgs,
    config: CoordinatorConfig,
    non_interactive: bool,
) -> anyhow::Result<Transcript> {
    let (host, mut prompts) = SimulatedHost::new();
    let host = if args.rationale {
        host.with_rationale(permissions_for(args.kind))
    } else {
        host
    };
    let coordinator = PermissionCoordinator::new(host, config);
    let session = Arc::new(Session::new("demo"));
    coordinator.set_context(&session);

    let transcript = Transcript::new();
    info!(kind = ?args.kind, "Running demo");

    match args.kind {
        DemoKind::Single => {
            let out = transcript.clone();
            let callback = demo_dialog(&transcript, non_interactive, move |r: &ResultSet| {
                out.push(if r.all_granted() {
                    "Permission Granted!"
                } else {
                    "Permission Denied."
                });
            });
            coordinator.request(permissions_for(args.kind), callback)?;
        }
        DemoKind::Multiple => {
            let out = transcript.clone();
            let callback = demo_dialog(&transcript, non_interactive, move |r: &ResultSet| {
                let granted = r.iter().filter(|(_, o)| o.is_granted()).count();
                out.push(format!("{granted}/2 Permissions Granted."));
            });
            coordinator.request(permissions_for(args.kind), callback)?;
        }
        DemoKind::Duplicate => {
            for n in 1..=2 {
                let out = transcript.clone();
                let callback = demo_dialog(&transcript, non_interactive, move |r: &ResultSet| {
                    out.push(if r.all_granted() {
                        format!("Permission Granted! ({n})")
                    } else {
                        format!("Permission Denied. ({n})")
                    });
                });
                coordinator.request(permissions_for(args.kind), callback)?;
            }
        }
    }

    let log = transcript.clone();
    let answered = run_event_loop(&coordinator, &mut prompts, |prompt| {
        let names: Vec<&str> = prompt.permissions.iter().map(Permission::as_str).collect();
        log.push(format!("Host prompt {}: {}", prompt.token, names.join(", ")));
        prompt_grants(prompt, non_interactive, !args.deny)
    })
    .await?;
    info!(answered, "Demo finished");

    Ok(transcript)
}

fn permissions_for(kind: DemoKind) -> Vec<Permission> {
    let names: &[&str] = match kind {
        DemoKind::Single => &["WRITE_EXTERNAL_STORAGE"],
        DemoKind::Multiple => &["READ_CONTACTS", "READ_CALENDAR"],
        DemoKind::Duplicate => &["CAMERA"],
    };
    names.iter().copied().map(Permission::new).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(kind: DemoKind) -> DemoArgs {
        DemoArgs {
            kind,
            deny: false,
            rationale: false,
        }
    }

    #[tokio::test]
    async fn single_demo_reports_grant() {
        let transcript = run(&args(DemoKind::Single), CoordinatorConfig::default(), true)
            .await
            .unwrap();

        assert_eq!(
            transcript.lines(),
            vec!["Host prompt #1: WRITE_EXTERNAL_STORAGE", "Permission Granted!"]
        );
    }

    #[tokio::test]
    async fn multiple_demo_counts_denials() {
        let demo = DemoArgs {
            deny: true,
            ..args(DemoKind::Multiple)
        };
        let transcript = run(&demo, CoordinatorConfig::default(), true).await.unwrap();

        assert_eq!(transcript.lines().last().unwrap(), "0/2 Permissions Granted.");
    }

    #[tokio::test]
    async fn duplicate_demo_prompts_once_for_both_callbacks() {
        let transcript = run(&args(DemoKind::Duplicate), CoordinatorConfig::default(), true)
            .await
            .unwrap();

        assert_eq!(
            transcript.lines(),
            vec![
                "Host prompt #1: CAMERA",
                "Permission Granted! (1)",
                "Permission Granted! (2)",
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_demo_shows_one_rationale() {
        let demo = DemoArgs {
            rationale: true,
            ..args(DemoKind::Duplicate)
        };
        let transcript = run(&demo, CoordinatorConfig::default(), true).await.unwrap();

        let shown = transcript
            .lines()
            .iter()
            .filter(|l| l.starts_with("Rationale:"))
            .count();
        assert_eq!(shown, 1);
        assert_eq!(transcript.lines()[1], "Host prompt #1: CAMERA");
    }

    #[tokio::test]
    async fn rationale_is_shown_before_prompting() {
        let demo = DemoArgs {
            rationale: true,
            ..args(DemoKind::Single)
        };
        let transcript = run(&demo, CoordinatorConfig::default(), true).await.unwrap();

        assert_eq!(
            transcript.lines(),
            vec![
                "Rationale: Needed for demo purposes.",
                "Host prompt #1: WRITE_EXTERNAL_STORAGE",
                "Permission Granted!",
            ]
        );
    }
}
