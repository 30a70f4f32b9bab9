use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::monitor::{MonitorOrchestrator, Registration};
use crate::ports;
use crate::render::{Frame, Renderer, Viewport};
use crate::signal::{ChangeSignal, RedrawTracker};
use crate::targets;

/// User commands understood by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    IncreaseInterval,
    DecreaseInterval,
    /// Add the address if unknown, remove it otherwise.
    ToggleTarget(String),
    /// Remove the port if every target checks it, add it to all otherwise.
    TogglePort(String),
    Scroll(ScrollMove),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMove {
    Up,
    Down,
    PageUp,
    PageDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Target,
    Port,
}

/// Line input collected while the user types an address or port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

impl Prompt {
    fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            buffer: String::new(),
        }
    }

    pub fn line(&self) -> String {
        let label = match self.kind {
            PromptKind::Target => "Enter IP address: ",
            PromptKind::Port => "Enter port number: ",
        };
        format!("{label}{}", self.buffer)
    }

    fn into_command(self) -> Command {
        match self.kind {
            PromptKind::Target => Command::ToggleTarget(self.buffer),
            PromptKind::Port => Command::TogglePort(self.buffer),
        }
    }
}

/// UI-side state of the dashboard: scroll position, transient warning, open prompt.
pub struct Dashboard {
    orchestrator: MonitorOrchestrator,
    renderer: Renderer,
    signal: Arc<ChangeSignal>,
    tracker: RedrawTracker,
    new_target_ports: Vec<u16>,
    scroll: usize,
    overflow: usize,
    page: usize,
    warning: Option<String>,
    prompt: Option<Prompt>,
}

impl Dashboard {
    /// `new_target_ports` is used for targets added from the keyboard; empty means defaults.
    pub fn new(
        orchestrator: MonitorOrchestrator,
        renderer: Renderer,
        new_target_ports: Vec<u16>,
    ) -> Self {
        let signal = orchestrator.signal();
        Self {
            orchestrator,
            renderer,
            signal,
            tracker: RedrawTracker::new(),
            new_target_ports,
            scroll: 0,
            overflow: 0,
            page: 1,
            warning: None,
            prompt: None,
        }
    }

    pub fn signal(&self) -> Arc<ChangeSignal> {
        self.signal.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty(&self.signal)
    }

    pub fn rendered_version(&self) -> Option<u64> {
        self.tracker.rendered()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn prompt_line(&self) -> Option<String> {
        self.prompt.as_ref().map(Prompt::line)
    }

    /// Force a repaint without any monitor state change, e.g. after a resize.
    pub fn request_redraw(&self) {
        self.signal.mark_dirty();
    }

    /// Snapshot the monitor and build the next frame.
    pub async fn render(&mut self, viewport: Viewport) -> Frame {
        let snapshot = self.orchestrator.snapshot().await;
        let frame = self
            .renderer
            .render(&snapshot, self.scroll, self.warning.as_deref(), viewport);
        self.scroll = frame.scroll_offset;
        self.overflow = frame.overflow;
        self.page = frame.body_rows.max(1);
        self.tracker.mark_rendered(snapshot.version);
        frame
    }

    /// Map a key press to a command. Keys typed into an open prompt are consumed here.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if self.warning.take().is_some() {
            self.signal.mark_dirty();
        }

        if self.prompt.is_some() {
            let mut submitted = None;
            match key.code {
                KeyCode::Esc => self.prompt = None,
                KeyCode::Enter => submitted = self.prompt.take().map(Prompt::into_command),
                KeyCode::Backspace => {
                    if let Some(prompt) = self.prompt.as_mut() {
                        prompt.buffer.pop();
                    }
                }
                KeyCode::Char(c) => {
                    if let Some(prompt) = self.prompt.as_mut() {
                        prompt.buffer.push(c);
                    }
                }
                _ => {}
            }
            self.signal.mark_dirty();
            return submitted;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Command::Quit);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(Command::Quit),
            KeyCode::Char('+') => Some(Command::IncreaseInterval),
            KeyCode::Char('-') => Some(Command::DecreaseInterval),
            KeyCode::Char('t') | KeyCode::Char('T') => {
                self.open_prompt(PromptKind::Target);
                None
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                self.open_prompt(PromptKind::Port);
                None
            }
            KeyCode::Up => Some(Command::Scroll(ScrollMove::Up)),
            KeyCode::Down => Some(Command::Scroll(ScrollMove::Down)),
            KeyCode::PageUp => Some(Command::Scroll(ScrollMove::PageUp)),
            KeyCode::PageDown => Some(Command::Scroll(ScrollMove::PageDown)),
            _ => None,
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        self.warning = None;
        self.prompt = Some(Prompt::new(kind));
        self.signal.mark_dirty();
    }

    /// Apply one command. `Quit` shuts the monitor down before returning.
    pub async fn dispatch(&mut self, command: Command) -> Flow {
        self.warning = None;
        debug!(?command, "dispatching command");

        match command {
            Command::Quit => {
                self.orchestrator.shutdown().await;
                return Flow::Quit;
            }
            Command::IncreaseInterval => {
                self.orchestrator.increase_interval();
            }
            Command::DecreaseInterval => {
                self.orchestrator.decrease_interval();
            }
            Command::ToggleTarget(input) => self.toggle_target(&input).await,
            Command::TogglePort(input) => self.toggle_port(&input).await,
            Command::Scroll(step) => self.scroll_by(step),
        }

        self.signal.mark_dirty();
        Flow::Continue
    }

    async fn toggle_target(&mut self, input: &str) {
        let address = match targets::parse_address(input) {
            Ok(address) => address,
            Err(e) => {
                self.warning = Some(e.to_string());
                return;
            }
        };

        if self.orchestrator.is_registered(address).await {
            self.orchestrator.remove_target(address).await;
            return;
        }
        match self
            .orchestrator
            .register(address, &self.new_target_ports)
            .await
        {
            Ok(Registration::Added) | Ok(Registration::AlreadyRegistered) => {}
            Err(e @ MonitorError::ShutDown) => {
                warn!(%address, "cannot add target after shutdown");
                self.warning = Some(e.to_string());
            }
            Err(e) => self.warning = Some(e.to_string()),
        }
    }

    async fn toggle_port(&mut self, input: &str) {
        let port = match ports::parse_port(input) {
            Ok(port) => port,
            Err(e) => {
                self.warning = Some(e.to_string());
                return;
            }
        };

        if self.orchestrator.all_targets_have_port(port).await {
            self.orchestrator.remove_checked_port(port).await;
        } else {
            self.orchestrator.add_checked_port(port).await;
        }
    }

    fn scroll_by(&mut self, step: ScrollMove) {
        self.scroll = match step {
            ScrollMove::Up => self.scroll.saturating_sub(1),
            ScrollMove::Down => (self.scroll + 1).min(self.overflow),
            ScrollMove::PageUp => self.scroll.saturating_sub(self.page),
            ScrollMove::PageDown => (self.scroll + self.page).min(self.overflow),
        };
    }
}
