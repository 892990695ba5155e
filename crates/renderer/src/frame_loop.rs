//! Owned handle for the continuous render loop.
//!
//! The host asks for at most one outstanding [`FrameTicket`] at a time and
//! hands it back when the redraw arrives. Cancelling bumps the generation, so a
//! redraw that was already queued by the windowing system fires into nothing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    generation: u64,
    sequence: u64,
}

#[derive(Debug, Default)]
pub struct FrameLoop {
    generation: u64,
    sequence: u64,
    running: bool,
    pending: Option<FrameTicket>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh generation. Returns `false` if the loop was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.generation += 1;
        self.running = true;
        self.pending = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Hands out the next ticket, or the one still outstanding. `None` while stopped.
    pub fn schedule(&mut self) -> Option<FrameTicket> {
        if !self.running {
            return None;
        }
        if let Some(ticket) = self.pending {
            return Some(ticket);
        }
        self.sequence += 1;
        let ticket = FrameTicket {
            generation: self.generation,
            sequence: self.sequence,
        };
        self.pending = Some(ticket);
        Some(ticket)
    }

    /// Consumes `ticket`. Returns `true` only for the outstanding ticket of a running loop.
    pub fn fire(&mut self, ticket: FrameTicket) -> bool {
        if !self.running || self.pending != Some(ticket) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Stops the loop and invalidates every ticket handed out so far.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        self.pending = None;
        self.generation += 1;
        was_running
    }
}
