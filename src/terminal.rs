use std::io::{self, Stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{Event, EventStream};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use futures::StreamExt;
use tokio::time::{self, Instant};
use tracing::info;

use crate::app::{Dashboard, Flow};
use crate::render::{Frame, StyledLine, Tone, Viewport};

/// Redraw at least this often so the header clock keeps moving.
const FORCED_REDRAW: Duration = Duration::from_secs(1);

/// Raw-mode alternate screen; restored when dropped.
pub struct TerminalSession {
    stdout: Stdout,
}

impl TerminalSession {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)
            .context("failed to enter alternate screen")?;
        Ok(Self { stdout })
    }

    pub fn viewport(&self) -> Result<Viewport> {
        let (cols, rows) = terminal::size().context("failed to read terminal size")?;
        Ok(Viewport::new(rows as usize, cols as usize))
    }

    /// Paint the frame; an open prompt replaces the bottom row.
    pub fn draw(&mut self, frame: &Frame, prompt: Option<&str>) -> Result<()> {
        let last = frame.lines.len().saturating_sub(1);
        for (row, line) in frame.lines.iter().enumerate() {
            queue!(self.stdout, MoveTo(0, row as u16), Clear(ClearType::CurrentLine))?;
            match prompt {
                Some(p) if row == last => queue!(self.stdout, Print(p))?,
                _ => self.queue_line(line)?,
            }
        }
        self.stdout.flush()?;
        Ok(())
    }

    fn queue_line(&mut self, line: &StyledLine) -> Result<()> {
        for cell in &line.cells {
            match cell.tone {
                Some(tone) => queue!(
                    self.stdout,
                    SetForegroundColor(tone_color(tone)),
                    Print(&cell.text),
                    ResetColor
                )?,
                None => queue!(self.stdout, Print(&cell.text))?,
            }
        }
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Success => Color::Green,
        Tone::Failure => Color::Red,
        Tone::Attention => Color::Yellow,
    }
}

/// Main loop: redraw when state changed, then wait for a key, a change or the forced redraw.
pub async fn run(mut dashboard: Dashboard) -> Result<()> {
    let mut session = TerminalSession::enter()?;
    let signal = dashboard.signal();
    let mut events = EventStream::new();
    let mut next_redraw = Instant::now();

    loop {
        if dashboard.is_dirty() || Instant::now() >= next_redraw {
            let viewport = session.viewport()?;
            let frame = dashboard.render(viewport).await;
            session.draw(&frame, dashboard.prompt_line().as_deref())?;
            next_redraw = Instant::now() + FORCED_REDRAW;
        }

        let seen = dashboard.rendered_version().unwrap_or_default();
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => {
                    if let Some(command) = dashboard.handle_key(key) {
                        if dashboard.dispatch(command).await == Flow::Quit {
                            break;
                        }
                    }
                }
                Some(Ok(Event::Resize(..))) => dashboard.request_redraw(),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("failed to read terminal event"),
                None => break,
            },
            _ = signal.changed(seen) => {}
            _ = time::sleep_until(next_redraw) => {}
        }
    }

    info!("dashboard closed");
    Ok(())
}
