//! Scripted scenarios.
//!
//! A scenario is a TOML file describing the host's initial state and an
//! ordered list of steps. Running it produces a transcript of request
//! outcomes, host prompts and callback deliveries:
//!
//! ```toml
//! granted = ["CONTACTS"]
//! rationale = ["LOCATION"]
//!
//! [[steps]]
//! action = "request"
//! label = "a"
//! permissions = ["CAMERA", "CONTACTS"]
//!
//! [[steps]]
//! action = "resolve"
//! token = 1
//! permissions = ["CAMERA"]
//! grants = [true]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use permiso_core::{
    CoordinatorConfig, Permission, PermissionCallback, PermissionCoordinator,
    RationaleContinuation, RequestOutcome, RequestToken, ResultSet,
};

use crate::host::{HostPrompt, Session, SimulatedHost};
use crate::transcript::Transcript;

/// Scenario errors.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[source] permiso_core::Error),

    #[error("Step {step} failed: {source}")]
    Step {
        step: usize,
        source: permiso_core::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Permissions the host reports as granted from the start.
    #[serde(default)]
    pub granted: Vec<String>,
    /// Permissions the host wants a rationale for.
    #[serde(default)]
    pub rationale: Vec<String>,
    /// Overrides the configured request timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Make a request. Rationale requests are logged and left pending for a
    /// later `provide-rationale` step.
    Request {
        label: String,
        permissions: Vec<String>,
    },
    /// Deliver a host result.
    Resolve {
        token: u32,
        permissions: Vec<String>,
        grants: Vec<bool>,
    },
    /// Resume a request waiting on its rationale.
    ProvideRationale { token: u32 },
    /// Expire requests as if `after_secs` had passed.
    Expire { after_secs: u64 },
}

impl Scenario {
    pub fn from_toml(source: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(source)?)
    }
}

/// Read and parse a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let source = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Scenario::from_toml(&source)
}

/// Callback that writes deliveries into the transcript.
struct ScriptCallback {
    label: String,
    transcript: Transcript,
}

impl PermissionCallback for ScriptCallback {
    fn on_result(&mut self, results: &ResultSet) {
        let rendered = serde_json::to_string(results).unwrap_or_else(|_| format!("{results:?}"));
        self.transcript
            .push(format!("  {} <- {rendered}", self.label));
    }

    fn on_rationale_requested(
        &mut self,
        continuation: RationaleContinuation,
        permissions: &[Permission],
    ) {
        self.transcript.push(format!(
            "  {} rationale requested for {} [{}]",
            self.label,
            continuation.token(),
            join(permissions)
        ));
        // Resumed by token from a later step.
        drop(continuation);
    }
}

/// Run `scenario` against a fresh coordinator and return its transcript.
///
/// Stale or duplicate host deliveries are recorded and the run continues;
/// any other coordinator error stops it.
pub fn run_scenario(
    scenario: &Scenario,
    mut config: CoordinatorConfig,
) -> Result<Transcript, ScenarioError> {
    if let Some(secs) = scenario.timeout_secs {
        config.request_timeout_secs = Some(secs);
    }
    config.validate().map_err(ScenarioError::Config)?;

    let (host, mut prompts) = SimulatedHost::new();
    let host = host
        .with_granted(scenario.granted.iter().map(String::as_str))
        .with_rationale(scenario.rationale.iter().map(String::as_str));
    let coordinator = PermissionCoordinator::new(host, config);
    let session = Arc::new(Session::new("scenario"));
    coordinator.set_context(&session);

    let transcript = Transcript::new();
    info!(steps = scenario.steps.len(), "Running scenario");

    for (index, step) in scenario.steps.iter().enumerate() {
        let n = index + 1;
        debug!(step = n, ?step, "Scenario step");
        run_step(&coordinator, &transcript, n, step)
            .map_err(|source| ScenarioError::Step { step: n, source })?;
        drain_prompts(&mut prompts, &transcript);
    }

    let outstanding = coordinator.outstanding_tokens();
    transcript.push(format!("outstanding: [{}]", join(&outstanding)));
    Ok(transcript)
}

fn run_step(
    coordinator: &PermissionCoordinator<SimulatedHost>,
    transcript: &Transcript,
    n: usize,
    step: &Step,
) -> permiso_core::Result<()> {
    match step {
        Step::Request { label, permissions } => {
            transcript.push(format!("[{n}] request {label} [{}]", permissions.join(", ")));
            let callback = ScriptCallback {
                label: label.clone(),
                transcript: transcript.clone(),
            };
            let outcome = coordinator.request(permissions.iter().map(String::as_str), callback)?;
            transcript.push(format!("  -> {}", describe(outcome)));
        }
        Step::Resolve {
            token,
            permissions,
            grants,
        } => {
            let token = RequestToken::new(*token);
            transcript.push(format!("[{n}] resolve {token}"));
            let permissions: Vec<Permission> = permissions.iter().map(Permission::new).collect();
            tolerate_stale(
                transcript,
                coordinator.resolve_from_host(token, &permissions, grants),
            )?;
        }
        Step::ProvideRationale { token } => {
            let token = RequestToken::new(*token);
            transcript.push(format!("[{n}] provide-rationale {token}"));
            tolerate_stale(transcript, coordinator.provide_rationale(token))?;
        }
        Step::Expire { after_secs } => {
            transcript.push(format!("[{n}] expire after {after_secs}s"));
            let expired =
                coordinator.expire_overdue_at(Instant::now() + Duration::from_secs(*after_secs))?;
            transcript.push(format!("  -> expired [{}]", join(&expired)));
        }
    }
    Ok(())
}

fn tolerate_stale(transcript: &Transcript, result: permiso_core::Result<()>) -> permiso_core::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            transcript.push(format!("  -> ignored: {e}"));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn drain_prompts(prompts: &mut mpsc::UnboundedReceiver<HostPrompt>, transcript: &Transcript) {
    while let Ok(prompt) = prompts.try_recv() {
        transcript.push(format!(
            "  host asked {} for [{}]",
            prompt.token,
            join(&prompt.permissions)
        ));
    }
}

fn describe(outcome: RequestOutcome) -> String {
    match outcome {
        RequestOutcome::Granted => "granted".to_string(),
        RequestOutcome::Linked { host } => format!("linked to {host}"),
        RequestOutcome::RationaleRequested { token } => format!("awaiting rationale {token}"),
        RequestOutcome::Dispatched { token } => format!("dispatched {token}"),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
