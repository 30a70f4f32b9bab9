use anyhow::{bail, Context, Result};

use crate::error::MonitorError;

/// Parse a port list given on the command line into a deduplicated list of TCP ports (1..=65535).
///
/// Supported entries, separated by commas and/or whitespace:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
pub fn parse_port_list(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for item in s.split(|c: char| c == ',' || c.is_whitespace()) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        // Range `start-end`
        if let Some((a, b)) = item.split_once('-') {
            let start =
                parse_port(a).with_context(|| format!("invalid start in range: {item}"))?;
            let end = parse_port(b).with_context(|| format!("invalid end in range: {item}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        let p = parse_port(item)?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    Ok(out)
}

/// Parse one port as typed by the user. Anything outside 1..=65535 is rejected.
pub fn parse_port(s: &str) -> Result<u16, MonitorError> {
    let trimmed = s.trim();
    match trimmed.parse::<u32>() {
        Ok(val) if (1..=65535).contains(&val) => Ok(val as u16),
        _ => Err(MonitorError::InvalidPort(trimmed.to_string())),
    }
}
