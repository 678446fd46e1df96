/// Streaming rehydration: replace tokens inside a chunked text stream where
/// a token may be split across chunk boundaries at any position.
///
/// An explicit two-state machine over an append-only pending buffer. Text is
/// forwarded until a `«` opens a candidate token; the buffer then grows only
/// while it still looks like a token prefix (`«`, letters/underscores, an
/// underscore, digits). A closing `»` resolves the candidate against the
/// vault; anything else aborts and replays the buffer verbatim.
///
/// Invariant: concatenating `feed` outputs in order, then `flush`, yields
/// exactly the rehydration of the full concatenated input. No token is
/// emitted partially or twice; no character is dropped or duplicated.
use crate::constants::MAX_TOKEN_LEN;
use crate::error::Result;
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Forwarding text; watching for `«`.
    Scanning,
    /// Buffering a candidate token prefix.
    Pending,
}

pub struct StreamRehydrator<'a> {
    vault: &'a dyn Vault,
    session: &'a str,
    state: State,
    pending: String,
    pending_chars: usize,
    seen_digit: bool,
}

impl<'a> StreamRehydrator<'a> {
    pub fn new(vault: &'a dyn Vault, session: &'a str) -> Self {
        Self {
            vault,
            session,
            state: State::Scanning,
            pending: String::new(),
            pending_chars: 0,
            seen_digit: false,
        }
    }

    /// Append a chunk and return all text that is definitively emitted —
    /// everything except a still-open token prefix.
    pub fn feed(&mut self, chunk: &str) -> Result<String> {
        let mut out = String::with_capacity(chunk.len());
        for c in chunk.chars() {
            match self.state {
                State::Scanning => self.scan_char(c, &mut out),
                State::Pending => self.pending_char(c, &mut out)?,
            }
        }
        Ok(out)
    }

    /// Finalize the stream. Residual pending content was not a token and is
    /// emitted verbatim.
    pub fn flush(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.reset();
        rest
    }

    fn scan_char(&mut self, c: char, out: &mut String) {
        if c == '«' {
            self.begin_pending();
        } else {
            out.push(c);
        }
    }

    fn begin_pending(&mut self) {
        self.state = State::Pending;
        self.pending.clear();
        self.pending.push('«');
        self.pending_chars = 1;
        self.seen_digit = false;
    }

    fn pending_char(&mut self, c: char, out: &mut String) -> Result<()> {
        if self.prefix_continues(c) {
            self.pending.push(c);
            self.pending_chars += 1;
            if c.is_ascii_digit() {
                self.seen_digit = true;
            }
            if self.pending_chars > MAX_TOKEN_LEN {
                // Too long to be a token; stop buffering.
                out.push_str(&self.pending);
                self.reset();
            }
            return Ok(());
        }

        if c == '»' && self.seen_digit {
            self.pending.push('»');
            let token = std::mem::take(&mut self.pending);
            self.reset();
            match self.vault.resolve_token(self.session, &token)? {
                Some(value) => out.push_str(&value),
                None => out.push_str(&token),
            }
            return Ok(());
        }

        // The buffer was not a token prefix after all: emit it verbatim and
        // reprocess the offending character as plain text.
        let buffered = std::mem::take(&mut self.pending);
        out.push_str(&buffered);
        self.reset();
        self.scan_char(c, out);
        Ok(())
    }

    /// Whether `c` can extend the buffered prefix toward
    /// `« [A-Z_]+ _ [0-9]+ »`.
    fn prefix_continues(&self, c: char) -> bool {
        match c {
            'A'..='Z' | '_' => !self.seen_digit,
            '0'..='9' => {
                if self.seen_digit {
                    true
                } else {
                    // First digit: needs at least one body char plus the
                    // separator underscore before it.
                    self.pending_chars >= 3 && self.pending.ends_with('_')
                }
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.state = State::Scanning;
        self.pending.clear();
        self.pending_chars = 0;
        self.seen_digit = false;
    }
}
