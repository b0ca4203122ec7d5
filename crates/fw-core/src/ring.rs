//! Bounded, line-oriented text buffer.
//!
//! [`Ring`] collects text streamed in arbitrary chunks, splits it on line
//! terminators (`\r\n`, `\r`, `\n`) across chunk boundaries and keeps only the
//! most recent lines. Subscribers registered with [`Ring::callback`] see every
//! completed line in order.

use std::collections::VecDeque;
use std::fmt;

type LineCallback = Box<dyn FnMut(&str) + Send>;

/// Bounded log buffer with line subscribers.
///
/// With a cap of `n > 0`, [`Ring::get`] returns at most `n` lines: the
/// `n - 1` most recent complete lines followed by the pending partial line.
/// A cap of 0 retains everything.
pub struct Ring {
    lines: VecDeque<String>,
    current: Option<String>,
    max_lines: Option<usize>,
    closed: bool,
    // last chunk ended with '\r'; a leading '\n' in the next chunk belongs to it
    pending_cr: bool,
    callbacks: Vec<LineCallback>,
}

impl Ring {
    /// Create a ring retaining at most `cap` lines (0 = unlimited).
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            current: None,
            max_lines: cap.checked_sub(1),
            closed: false,
            pending_cr: false,
            callbacks: Vec::new(),
        }
    }

    /// Register a line subscriber. Currently retained lines are replayed to
    /// it immediately.
    pub fn callback<F>(&mut self, mut cb: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        for line in &self.lines {
            cb(line);
        }
        self.callbacks.push(Box::new(cb));
    }

    /// Append a chunk of text. Ignored once the ring is closed.
    pub fn append(&mut self, chunk: &str) {
        if self.closed {
            return;
        }

        let mut chunk = chunk;
        if self.pending_cr {
            if let Some(rest) = chunk.strip_prefix('\n') {
                chunk = rest;
            }
        }
        if chunk.is_empty() {
            return;
        }
        self.pending_cr = chunk.ends_with('\r');

        let mut segments = split_lines(chunk);
        if segments.len() == 1 {
            let tail = segments.remove(0);
            match self.current.as_mut() {
                Some(current) => current.push_str(tail),
                None => self.current = Some(tail.to_string()),
            }
            return;
        }

        let last = segments.pop().unwrap_or_default().to_string();
        let mut segments = segments.into_iter();
        if let Some(mut current) = self.current.take() {
            current.push_str(segments.next().unwrap_or_default());
            self.push_line(current);
        }
        for line in segments {
            self.push_line(line.to_string());
        }
        self.current = Some(last);

        if let Some(max) = self.max_lines {
            while self.lines.len() > max {
                self.lines.pop_front();
            }
        }
    }

    /// Retained complete lines followed by the pending partial line, joined
    /// with `\n`.
    pub fn get(&self) -> String {
        let mut out: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if let Some(ref current) = self.current {
            out.push(current);
        }
        out.join("\n")
    }

    /// Flush the pending partial line as a final complete line.
    ///
    /// Idempotent; appends after closing are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(current) = self.current.take() {
            self.push_line(current);
            if let Some(max) = self.max_lines {
                if self.lines.len() > max {
                    self.lines.pop_front();
                }
            }
        }
        self.closed = true;
    }

    /// Whether [`Ring::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn push_line(&mut self, line: String) {
        for cb in &mut self.callbacks {
            cb(&line);
        }
        self.lines.push_back(line);
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("lines", &self.lines)
            .field("current", &self.current)
            .field("max_lines", &self.max_lines)
            .field("closed", &self.closed)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Split on `\r\n`, `\r` or `\n`, keeping empty segments.
fn split_lines(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                out.push(&s[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            b'\n' => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collector(ring: &mut Ring) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ring.callback(move |line| sink.lock().unwrap().push(line.to_string()));
        seen
    }

    #[test]
    fn split_variants() {
        assert_eq!(split_lines("a\r\nb\rc\nd"), ["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n"), ["a", ""]);
        assert_eq!(split_lines("x"), ["x"]);
    }

    #[test]
    fn get_before_close() {
        let mut ring = Ring::new(100);
        ring.append("foo\nbar\nbaz");
        assert_eq!(ring.get(), "foo\nbar\nbaz");
    }

    #[test]
    fn partial_lines_continue_across_chunks() {
        let mut ring = Ring::new(100);
        ring.append("foo");
        ring.append("bar\nbaz");
        ring.append("moo");
        assert_eq!(ring.get(), "foobar\nbazmoo");
    }

    #[test]
    fn cap_keeps_most_recent_lines() {
        let mut ring = Ring::new(2);
        ring.append("foo\nbar\nbaz");
        assert_eq!(ring.get(), "bar\nbaz");
        ring.append("foo\nbar");
        assert_eq!(ring.get(), "bazfoo\nbar");
    }

    #[test]
    fn zero_cap_is_unlimited() {
        let mut ring = Ring::new(0);
        for i in 0..500 {
            ring.append(&format!("line {i}\n"));
        }
        ring.close();
        assert_eq!(ring.get().lines().count(), 500);
        assert!(ring.get().starts_with("line 0\n"));
    }

    #[test]
    fn callbacks_see_complete_lines_only() {
        let mut ring = Ring::new(0);
        let seen = collector(&mut ring);
        ring.append("foo\nba");
        ring.append("r\nbaz");
        assert_eq!(*seen.lock().unwrap(), ["foo", "bar"]);

        ring.close();
        assert_eq!(*seen.lock().unwrap(), ["foo", "bar", "baz"]);
    }

    #[test]
    fn callback_replays_retained_lines() {
        let mut ring = Ring::new(0);
        ring.append("one\ntwo\nthr");
        let seen = collector(&mut ring);
        assert_eq!(*seen.lock().unwrap(), ["one", "two"]);
    }

    #[test]
    fn close_is_idempotent() {
        let mut ring = Ring::new(0);
        let seen = collector(&mut ring);
        ring.append("last");
        ring.close();
        ring.close();
        ring.append("ignored\n");
        assert!(ring.is_closed());
        assert_eq!(ring.get(), "last");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn crlf_split_across_chunks() {
        let mut ring = Ring::new(0);
        let seen = collector(&mut ring);
        ring.append("frame=1\r");
        ring.append("\nframe=2\r\n");
        assert_eq!(*seen.lock().unwrap(), ["frame=1", "frame=2"]);
    }

    #[test]
    fn carriage_returns_end_lines() {
        let mut ring = Ring::new(0);
        ring.append("frame=1\rframe=2\rframe=3");
        assert_eq!(ring.get(), "frame=1\nframe=2\nframe=3");
    }
}
