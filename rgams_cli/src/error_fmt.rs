//! Human-readable error descriptions and structured JSON error formatting.

use rgams_core::RgaError;

/// Typed RGA error carried anywhere in the report's chain.
fn rga_error(err: &eyre::Report) -> Option<&RgaError> {
    err.downcast_ref::<RgaError>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<RgaError>()))
}

/// Full context chain, outermost first.
fn chain_text(err: &eyre::Report) -> String {
    err.chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(re) = rga_error(err) {
        return match re {
            RgaError::Timeout(cmd) => format!(
                "What happened: The RGA did not answer within 10 s (command: {cmd}).\nLikely causes: Head powered off, wrong serial port, or cable unplugged.\nHow to fix: Check power and the RS-232 cable, and verify serial.port in the config."
            ),
            RgaError::Decode(msg) => format!(
                "What happened: The RGA replied with data that could not be interpreted ({msg}).\nLikely causes: Another program talking to the port, or a firmware reply this driver does not know.\nHow to fix: Close other programs using the port, power-cycle the head and retry."
            ),
            RgaError::Range {
                name,
                value,
                min,
                max,
            } => format!(
                "What happened: {name} = {value} is outside the allowed range {min}...{max}.\nLikely causes: A requested value out of range, or a corrupt readback from the head.\nHow to fix: Use a value within range; if the head reported it, re-run tune to restore a valid calibration."
            ),
            RgaError::Usage(msg) => format!(
                "What happened: Invalid request ({msg}).\nLikely causes: Bad command-line arguments or tuning peak table.\nHow to fix: Check the arguments with --help and the [tuning] section of the config."
            ),
            RgaError::Link(msg) => format!(
                "What happened: Serial link failure ({msg}).\nLikely causes: USB adapter unplugged or port permissions.\nHow to fix: Reconnect the adapter and make sure the user can open the port (e.g. dialout group)."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = chain_text(err);
    let lower = msg.to_ascii_lowercase();

    if lower.contains("must have headers") {
        return "Invalid headers in peak table CSV. Expected 'mz,width,gate,detector'.".to_string();
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing file.\nHow to fix: Pass --config pointing to a TOML file with at least a [serial] port. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [serial] port, or out-of-range values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    if lower.contains("open serial port") {
        return format!(
            "What happened: Failed to open the serial port.\nLikely causes: Wrong device path or insufficient permissions.\nHow to fix: Run `rgams ports` to list ports and fix serial.port in the config. Original: {msg}"
        );
    }

    // Generic fallback
    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error kind; untyped errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match rga_error(err) {
        Some(RgaError::Usage(_)) => 2,
        Some(RgaError::Timeout(_)) => 3,
        Some(RgaError::Decode(_)) => 4,
        Some(RgaError::Range { .. }) => 5,
        Some(RgaError::Link(_)) => 6,
        None => 1,
    }
}

pub fn error_kind_name(err: &eyre::Report) -> &'static str {
    match rga_error(err) {
        Some(RgaError::Usage(_)) => "Usage",
        Some(RgaError::Timeout(_)) => "Timeout",
        Some(RgaError::Decode(_)) => "Decode",
        Some(RgaError::Range { .. }) => "Range",
        Some(RgaError::Link(_)) => "Link",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let obj = match rga_error(err) {
        Some(RgaError::Timeout(cmd)) => {
            json!({ "reason": "Timeout", "details": { "command": cmd }, "message": msg })
        }
        Some(RgaError::Range {
            name,
            value,
            min,
            max,
        }) => json!({
            "reason": "Range",
            "details": { "name": name, "value": value, "min": min, "max": max },
            "message": msg
        }),
        _ => json!({ "reason": error_kind_name(err), "message": msg }),
    };
    obj.to_string()
}
