//! Append-only text sink for the output of a script run

use chrono::{DateTime, Local};

use super::ipc::{OutputEvent, StreamKind};

/// Where a displayed line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    Stdout,
    Stderr,
    /// Written by benchterm itself (run banner, exit summary, errors)
    Host,
}

impl From<StreamKind> for LineSource {
    fn from(stream: StreamKind) -> Self {
        match stream {
            StreamKind::Stdout => LineSource::Stdout,
            StreamKind::Stderr => LineSource::Stderr,
        }
    }
}

/// A single displayed line
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub source: LineSource,
}

/// Ordered sink for run output.
///
/// Chunks are assembled into lines per stream; a trailing partial line stays
/// pending until its newline arrives or [`OutputSink::flush`] is called.
/// Nothing is ever dropped, so growth is bounded only by the script.
#[derive(Debug, Default)]
pub struct OutputSink {
    lines: Vec<OutputLine>,
    pending_stdout: Vec<u8>,
    pending_stderr: Vec<u8>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one output chunk, returning how many complete lines it produced
    pub fn append(&mut self, event: &OutputEvent) -> usize {
        let (pending, lines) = match event.stream {
            StreamKind::Stdout => (&mut self.pending_stdout, &mut self.lines),
            StreamKind::Stderr => (&mut self.pending_stderr, &mut self.lines),
        };
        pending.extend_from_slice(&event.payload);

        let mut added = 0;
        while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = pending.drain(..=pos).collect();
            lines.push(decode_line(&raw, event.stream.into()));
            added += 1;
        }
        added
    }

    /// Emit any partial lines still waiting for a newline
    pub fn flush(&mut self) {
        for stream in [StreamKind::Stdout, StreamKind::Stderr] {
            let pending = match stream {
                StreamKind::Stdout => std::mem::take(&mut self.pending_stdout),
                StreamKind::Stderr => std::mem::take(&mut self.pending_stderr),
            };
            if !pending.is_empty() {
                self.lines.push(decode_line(&pending, stream.into()));
            }
        }
    }

    /// Append text produced by the host rather than the script.
    /// An empty `text` adds one blank separator line.
    pub fn note(&mut self, text: &str) {
        let mut lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            lines.push("");
        }
        for line in lines {
            self.lines.push(OutputLine {
                content: line.to_string(),
                timestamp: Local::now(),
                source: LineSource::Host,
            });
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter()
    }

    /// Get lines in a range for display
    pub fn lines_range(&self, start: usize, count: usize) -> Vec<&OutputLine> {
        self.lines.iter().skip(start).take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.pending_stdout.clear();
        self.pending_stderr.clear();
    }

    /// Contents of every line from one source, in order
    pub fn content_of(&self, source: LineSource) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.source == source)
            .map(|l| l.content.as_str())
            .collect()
    }

    /// All complete lines as plain text, optionally prefixed with their time
    pub fn to_text(&self, timestamps: bool) -> String {
        self.lines
            .iter()
            .map(|l| {
                if timestamps {
                    format!("[{}] {}", l.timestamp.format("%H:%M:%S"), l.content)
                } else {
                    l.content.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lossy decode, dropping the line terminator. Invalid UTF-8 becomes U+FFFD.
fn decode_line(raw: &[u8], source: LineSource) -> OutputLine {
    let mut bytes = raw;
    if let Some(rest) = bytes.strip_suffix(b"\n") {
        bytes = rest;
    }
    if let Some(rest) = bytes.strip_suffix(b"\r") {
        bytes = rest;
    }
    OutputLine {
        content: String::from_utf8_lossy(bytes).into_owned(),
        timestamp: Local::now(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(stream: StreamKind, payload: &[u8], seq: u64) -> OutputEvent {
        OutputEvent {
            stream,
            payload: payload.to_vec(),
            seq,
        }
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut sink = OutputSink::new();
        assert_eq!(sink.append(&chunk(StreamKind::Stdout, b"hel", 0)), 0);
        assert_eq!(sink.append(&chunk(StreamKind::Stdout, b"lo\nwor", 1)), 1);
        assert_eq!(sink.append(&chunk(StreamKind::Stdout, b"ld\r\n", 2)), 1);

        assert_eq!(sink.content_of(LineSource::Stdout), vec!["hello", "world"]);
    }

    #[test]
    fn test_streams_keep_separate_partials() {
        let mut sink = OutputSink::new();
        sink.append(&chunk(StreamKind::Stdout, b"out-", 0));
        sink.append(&chunk(StreamKind::Stderr, b"err-line\n", 0));
        sink.append(&chunk(StreamKind::Stdout, b"line\n", 1));

        assert_eq!(sink.content_of(LineSource::Stdout), vec!["out-line"]);
        assert_eq!(sink.content_of(LineSource::Stderr), vec!["err-line"]);
    }

    #[test]
    fn test_flush_emits_unterminated_tail() {
        let mut sink = OutputSink::new();
        sink.append(&chunk(StreamKind::Stderr, b"no newline", 0));
        assert!(sink.is_empty());

        sink.flush();
        assert_eq!(sink.content_of(LineSource::Stderr), vec!["no newline"]);

        sink.flush();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_degrades() {
        let mut sink = OutputSink::new();
        sink.append(&chunk(StreamKind::Stdout, b"bad \xff byte\n", 0));

        let lines = sink.content_of(LineSource::Stdout);
        assert_eq!(lines, vec!["bad \u{FFFD} byte"]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut sink = OutputSink::new();
        let text = "µA\n".as_bytes();
        sink.append(&chunk(StreamKind::Stdout, &text[..1], 0));
        sink.append(&chunk(StreamKind::Stdout, &text[1..], 1));

        assert_eq!(sink.content_of(LineSource::Stdout), vec!["µA"]);
    }

    #[test]
    fn test_host_notes_and_clear() {
        let mut sink = OutputSink::new();
        sink.note("Running test: today.py");
        sink.append(&chunk(StreamKind::Stdout, b"partial", 0));
        assert_eq!(sink.content_of(LineSource::Host), vec!["Running test: today.py"]);

        sink.clear();
        sink.flush();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_empty_note_is_blank_line() {
        let mut sink = OutputSink::new();
        sink.note("Running test: today.py");
        sink.note("");
        sink.append(&chunk(StreamKind::Stdout, b"PASS: vcc\n", 0));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.content_of(LineSource::Host), vec!["Running test: today.py", ""]);
        assert_eq!(sink.to_text(false), "Running test: today.py\n\nPASS: vcc");
        assert!(sink.to_text(true).starts_with('['));
    }
}
