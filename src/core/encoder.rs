//! Wire encoding for controller commands.
//!
//! Every message is the credentials block followed by the command element,
//! sent as raw text with no framing. Username and password are embedded
//! verbatim, without XML escaping.

use crate::domain::command::Command;
use crate::domain::config::{AckFlag, Credentials};

/// Encode `command` with `credentials` into a wire payload.
pub fn encode(command: &Command, credentials: &Credentials<'_>) -> Vec<u8> {
    let mut out = credentials_block(credentials);

    match *command {
        Command::Login => {}
        Command::RecallLayout { id, advance } => out.push_str(&format!(
            r#"<recall_layout id="{}" advance="{}" needack="{}"/>"#,
            id,
            AckFlag::from(advance),
            credentials.need_ack
        )),
        Command::SwitchAudio { input_id, output_id } => out.push_str(&format!(
            r#"<audio><connect input_id="{}" output_id="{}"/></audio>"#,
            input_id, output_id
        )),
    }

    out.into_bytes()
}

/// The login block that prefixes every message.
pub fn credentials_block(credentials: &Credentials<'_>) -> String {
    format!(
        r#"<setup version="1"><username>{}</username><password>{}</password><needack>{}</needack></setup>"#,
        credentials.username, credentials.password, credentials.need_ack
    )
}
