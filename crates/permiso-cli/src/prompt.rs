//! Terminal dialogs: rationale explanations and grant decisions.
//!
//! Every prompt has a non-interactive fallback so demos and scenarios can run
//! unattended.

use std::io::{self, Write};

use anyhow::Result;
use dialoguer::{Confirm, Select};
use tracing::{info, warn};

use permiso_core::{Permission, PermissionCallback, RationaleContinuation, ResultSet};

use crate::host::HostPrompt;

/// Button label when none is given.
pub const DEFAULT_BUTTON: &str = "OK";

/// Show a rationale dialog and provide `continuation` once it is dismissed.
///
/// The continuation is provided even when the dialog could not be drawn, so a
/// broken terminal never strands the request. The dialog error is still
/// returned.
pub fn show_rationale(
    title: Option<&str>,
    message: &str,
    button: Option<&str>,
    continuation: RationaleContinuation,
    non_interactive: bool,
) -> Result<()> {
    let button = button.unwrap_or(DEFAULT_BUTTON);
    let shown = if non_interactive {
        info!(?title, message, "Rationale shown without a dialog");
        Ok(())
    } else {
        draw_dialog(title, message, button)
    };

    continuation.provide()?;
    shown
}

fn draw_dialog(title: Option<&str>, message: &str, button: &str) -> Result<()> {
    let mut err = io::stderr();
    if let Some(title) = title {
        writeln!(err, "{title}")?;
    }
    writeln!(err, "{message}")?;
    Select::new().item(button).default(0).interact()?;
    Ok(())
}

/// Ask the user to allow or deny each permission in `prompt`.
///
/// Non-interactive runs answer `default` for every permission.
pub fn prompt_grants(prompt: &HostPrompt, non_interactive: bool, default: bool) -> Result<Vec<bool>> {
    if non_interactive {
        return Ok(vec![default; prompt.permissions.len()]);
    }
    prompt
        .permissions
        .iter()
        .map(|permission| -> Result<bool> {
            let allow = Confirm::new()
                .with_prompt(format!("Allow {permission}? (request {})", prompt.token))
                .default(default)
                .interact()?;
            Ok(allow)
        })
        .collect()
}

/// Text of a rationale dialog.
#[derive(Debug, Clone)]
pub struct RationaleDialog {
    pub title: Option<String>,
    pub message: String,
    pub button: Option<String>,
}

impl RationaleDialog {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            button: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Label of the dismiss button; [`DEFAULT_BUTTON`] when unset.
    #[must_use]
    pub fn with_button(mut self, button: impl Into<String>) -> Self {
        self.button = Some(button.into());
        self
    }
}

/// Callback that answers rationale requests with a [`RationaleDialog`] and
/// forwards results to `on_result`.
pub struct DialogCallback<F> {
    dialog: RationaleDialog,
    non_interactive: bool,
    on_result: F,
    on_shown: Option<Box<dyn FnMut(&RationaleDialog) + Send>>,
}

impl<F> DialogCallback<F>
where
    F: FnMut(&ResultSet) + Send,
{
    pub const fn new(dialog: RationaleDialog, non_interactive: bool, on_result: F) -> Self {
        Self {
            dialog,
            non_interactive,
            on_result,
            on_shown: None,
        }
    }

    /// Run `hook` each time the dialog is shown, before the request resumes.
    #[must_use]
    pub fn on_shown(mut self, hook: impl FnMut(&RationaleDialog) + Send + 'static) -> Self {
        self.on_shown = Some(Box::new(hook));
        self
    }
}

impl<F> PermissionCallback for DialogCallback<F>
where
    F: FnMut(&ResultSet) + Send,
{
    fn on_result(&mut self, results: &ResultSet) {
        (self.on_result)(results);
    }

    fn on_rationale_requested(
        &mut self,
        continuation: RationaleContinuation,
        permissions: &[Permission],
    ) {
        let token = continuation.token();
        if let Some(hook) = self.on_shown.as_mut() {
            hook(&self.dialog);
        }
        if let Err(e) = show_rationale(
            self.dialog.title.as_deref(),
            &self.dialog.message,
            self.dialog.button.as_deref(),
            continuation,
            self.non_interactive,
        ) {
            warn!(%token, ?permissions, error = %e, "Rationale dialog failed");
        }
    }
}
