//! Projection of a [`Snapshot`] onto a fixed-size terminal frame.
//!
//! Rendering is pure: the same snapshot, scroll offset, warning and viewport
//! always produce the same frame. Colors are carried as [`Tone`] tags and
//! mapped to real terminal colors by the front-end.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::types::{Snapshot, Target};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second] - [day].[month].[year]");

const ADDRESS_LABEL: &str = "IP Address";
const REACHABLE_LABEL: &str = "Reachable";
const LATENCY_LABEL: &str = "Response Time";
const PORTS_LABEL: &str = "Http Ports";
const LAST_RESPONSE_LABEL: &str = "Last Response";

/// Widest dotted-quad IPv4 address.
const ADDRESS_WIDTH: usize = "255.255.255.255".len();
/// Length of a formatted timestamp, `HH:MM:SS - DD.MM.YYYY`.
const TIMESTAMP_WIDTH: usize = 21;

const RULE: char = '═';
const SUCCESS_GLYPH: &str = "✓";
const FAILURE_GLYPH: &str = "x";
const PLACEHOLDER: &str = "-";

const COMMAND_HINTS: [&str; 4] = [
    "Press 'T' to add/remove a target",
    "Press 'P' to add/remove a checked http port",
    "Use Up/Down and PgUp/PgDn to scroll",
    "Press 'Q' to quit",
];

/// Color tag attached to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Attention,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub tone: Option<Tone>,
}

/// One frame row made of styled cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    pub cells: Vec<Cell>,
}

impl StyledLine {
    pub fn plain(text: impl Into<String>) -> Self {
        let mut line = Self::default();
        line.push(text, None);
        line
    }

    pub fn push(&mut self, text: impl Into<String>, tone: Option<Tone>) {
        let text = text.into();
        if !text.is_empty() {
            self.cells.push(Cell { text, tone });
        }
    }

    /// Line content without styling.
    pub fn text(&self) -> String {
        self.cells.iter().map(|c| c.text.as_str()).collect()
    }

    pub fn width(&self) -> usize {
        self.cells.iter().map(|c| c.text.chars().count()).sum()
    }

    /// Cut the line down to at most `cols` characters.
    pub fn clip(&mut self, cols: usize) {
        let mut remaining = cols;
        let mut keep = 0;
        for cell in &mut self.cells {
            if remaining == 0 {
                break;
            }
            let len = cell.text.chars().count();
            if len > remaining {
                cell.text = cell.text.chars().take(remaining).collect();
                remaining = 0;
            } else {
                remaining -= len;
            }
            keep += 1;
        }
        self.cells.truncate(keep);
    }
}

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub rows: usize,
    pub cols: usize,
}

impl Viewport {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

/// A rendered frame: exactly `rows` lines once the viewport fits header and footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<StyledLine>,
    /// Scroll offset actually applied, after clamping to the overflow.
    pub scroll_offset: usize,
    /// Number of target rows that do not fit the body.
    pub overflow: usize,
    /// Rows available for targets.
    pub body_rows: usize,
}

impl Frame {
    pub fn text_lines(&self) -> Vec<String> {
        self.lines.iter().map(StyledLine::text).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWidths {
    pub address: usize,
    pub reachable: usize,
    pub latency: usize,
    pub ports: usize,
    pub last_response: usize,
}

impl ColumnWidths {
    pub fn for_targets(targets: &[Target]) -> Self {
        Self {
            address: ADDRESS_WIDTH,
            reachable: REACHABLE_LABEL.len(),
            latency: LATENCY_LABEL.len(),
            ports: ports_column_width(targets),
            last_response: TIMESTAMP_WIDTH,
        }
    }

    fn labelled(&self) -> [(&'static str, usize); 5] {
        [
            (ADDRESS_LABEL, self.address),
            (REACHABLE_LABEL, self.reachable),
            (LATENCY_LABEL, self.latency),
            (PORTS_LABEL, self.ports),
            (LAST_RESPONSE_LABEL, self.last_response),
        ]
    }
}

/// Width of the ports column: the header label or the longest port list, whichever is wider.
pub fn ports_column_width(targets: &[Target]) -> usize {
    targets
        .iter()
        .map(|t| t.formatted_ports().len())
        .max()
        .unwrap_or(0)
        .max(PORTS_LABEL.len())
}

/// Clamp a requested scroll offset to the overflow; no overflow means no scrolling.
pub fn effective_scroll(requested: usize, overflow: usize) -> usize {
    if overflow > 0 {
        requested.min(overflow)
    } else {
        0
    }
}

/// Builds frames; holds the UTC offset used for displayed timestamps.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    offset: UtcOffset,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Renderer {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn render(
        &self,
        snapshot: &Snapshot,
        scroll_offset: usize,
        warning: Option<&str>,
        viewport: Viewport,
    ) -> Frame {
        let widths = ColumnWidths::for_targets(&snapshot.targets);
        let header = self.header(snapshot, &widths, viewport.cols);
        let footer = footer(warning, viewport.cols);

        let mut targets: Vec<&Target> = snapshot.targets.iter().collect();
        // Ipv4Addr orders by octets numerically, not by string.
        targets.sort_by_key(|t| t.address);

        let fixed = header.len() + footer.len();
        let body_rows = viewport.rows.saturating_sub(fixed);
        let overflow = (fixed + targets.len()).saturating_sub(viewport.rows);
        let offset = effective_scroll(scroll_offset, overflow);

        let mut lines = header;
        let window = targets.iter().skip(offset).take(body_rows);
        let mut drawn = 0;
        for target in window {
            lines.push(self.target_row(target, &widths));
            drawn += 1;
        }
        lines.extend((drawn..body_rows).map(|_| StyledLine::default()));
        lines.extend(footer);

        lines.truncate(viewport.rows);
        for line in &mut lines {
            line.clip(viewport.cols);
        }

        Frame {
            lines,
            scroll_offset: offset,
            overflow,
            body_rows,
        }
    }

    fn header(&self, snapshot: &Snapshot, widths: &ColumnWidths, cols: usize) -> Vec<StyledLine> {
        let columns = widths.labelled();
        vec![
            StyledLine::plain(format!(
                "LAN Watch - Last Update {}",
                self.timestamp(snapshot.taken_at)
            )),
            StyledLine::plain(format!(
                "Current Ping Delay: {} ms (+/- to inc/dec by 500ms)",
                snapshot.interval.as_millis()
            )),
            rule(cols),
            StyledLine::default(),
            StyledLine::plain(
                columns
                    .iter()
                    .map(|&(label, w)| format!("{label:<w$}"))
                    .collect::<Vec<_>>()
                    .join(" | "),
            ),
            StyledLine::plain(
                columns
                    .iter()
                    .map(|&(_, w)| "-".repeat(w))
                    .collect::<Vec<_>>()
                    .join("-+-"),
            ),
        ]
    }

    fn target_row(&self, target: &Target, widths: &ColumnWidths) -> StyledLine {
        let mut line = StyledLine::default();
        line.push(
            format!("{:>w$}", target.address.to_string(), w = widths.address),
            None,
        );
        line.push(" | ", None);

        let (glyph, tone) = if target.reachable {
            (SUCCESS_GLYPH, Tone::Success)
        } else {
            (FAILURE_GLYPH, Tone::Failure)
        };
        line.push(center(glyph, widths.reachable), Some(tone));
        line.push(" | ", None);

        let latency = match target.last_round_trip_ms {
            Some(ms) if target.reachable => ms.to_string(),
            _ => PLACEHOLDER.to_string(),
        };
        let w = widths.latency.saturating_sub(3);
        line.push(format!("{latency:>w$} ms"), None);
        line.push(" | ", None);

        let mut used = 0;
        for (i, port) in target.checked_ports().into_iter().enumerate() {
            if i > 0 {
                line.push(" ", None);
                used += 1;
            }
            let text = port.to_string();
            used += text.len();
            let tone = if target.is_open(port) {
                Tone::Success
            } else {
                Tone::Failure
            };
            line.push(text, Some(tone));
        }
        line.push(" ".repeat(widths.ports.saturating_sub(used)), None);
        line.push(" | ", None);

        let last = match target.last_success {
            Some(at) if target.success_count > 0 => self.timestamp(at),
            _ => format!("{PLACEHOLDER:>w$}", w = widths.last_response),
        };
        line.push(last, None);
        line
    }

    fn timestamp(&self, at: OffsetDateTime) -> String {
        at.to_offset(self.offset)
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| PLACEHOLDER.to_string())
    }
}

fn footer(warning: Option<&str>, cols: usize) -> Vec<StyledLine> {
    let mut lines = vec![rule(cols)];
    lines.extend(COMMAND_HINTS.iter().map(|h| StyledLine::plain(*h)));
    if let Some(warning) = warning {
        lines.push(StyledLine::default());
        let mut line = StyledLine::default();
        line.push(format!("!!! {warning} !!!"), Some(Tone::Attention));
        lines.push(line);
    }
    lines
}

fn rule(cols: usize) -> StyledLine {
    StyledLine::plain(RULE.to_string().repeat(cols))
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let left = width.saturating_sub(len) / 2;
    let right = width.saturating_sub(len + left);
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
