use crate::domain::error::{LayoutLinkError, LayoutLinkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Valid range for layout, input and output identifiers.
pub const ID_RANGE: RangeInclusive<u16> = 1..=256;

/// A single command to send to the controller.
///
/// Descriptors are created per dispatch and consumed by the encoder; they
/// are never retained. Use the checked constructors when the identifiers
/// come from untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Send only the credentials block.
    Login,
    /// Recall a stored layout.
    RecallLayout { id: u16, advance: bool },
    /// Route an audio input to an output.
    SwitchAudio { input_id: u16, output_id: u16 },
}

impl Command {
    pub fn recall_layout(id: u16, advance: bool) -> LayoutLinkResult<Self> {
        check_id("layout id", id)?;
        Ok(Self::RecallLayout { id, advance })
    }

    pub fn switch_audio(input_id: u16, output_id: u16) -> LayoutLinkResult<Self> {
        check_id("input id", input_id)?;
        check_id("output id", output_id)?;
        Ok(Self::SwitchAudio { input_id, output_id })
    }

    /// Action name as used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login => "login",
            Command::RecallLayout { .. } => "recall_layout",
            Command::SwitchAudio { .. } => "switch_audio",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Login => write!(f, "Force Login"),
            Command::RecallLayout { id, advance } => {
                write!(f, "Recall Layout {} (advance: {})", id, advance)
            }
            Command::SwitchAudio { input_id, output_id } => {
                write!(f, "Switch Audio {} -> {}", input_id, output_id)
            }
        }
    }
}

fn check_id(what: &str, value: u16) -> LayoutLinkResult<()> {
    if ID_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(LayoutLinkError::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            what,
            ID_RANGE.start(),
            ID_RANGE.end(),
            value
        )))
    }
}
