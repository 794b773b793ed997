//! Outbound command framing.
//!
//! Commands typed by the operator are sent verbatim to the leader device,
//! terminated by CR-LF. Nothing here waits for or correlates a reply; the
//! device's answer simply arrives as ordinary telemetry lines.

/// Line terminator expected by the leader's command shell.
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Trim `command` and append the terminator. Blank commands yield `None`.
pub fn frame_command(command: &str) -> Option<String> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("{trimmed}{COMMAND_TERMINATOR}"))
}
