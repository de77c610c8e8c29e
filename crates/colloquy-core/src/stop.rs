//! Turn-ending detection over a stream of decoded fragments.
//!
//! Markers rarely align with token boundaries, so every check is a
//! substring scan over accumulated text, not a per-token lookup. Text that
//! could still turn out to be the start of a marker is held back from the
//! caller until the next fragment disambiguates it.

use std::borrow::Cow;

/// Outcome of feeding one fragment to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopScan {
    /// Text that is now safe to hand to the caller, if any.
    pub emit: Option<String>,
    /// A stop marker completed; the turn is over.
    pub stop: bool,
}

/// Scans decoded output for stop markers and control-token text.
///
/// Two distinct marker classes:
/// - **stop markers** end the turn and truncate the reply at the marker's
///   start;
/// - **special fragments** (control-token renderings) are removed from the
///   emitted stream but generation continues.
///
/// `scan_suppressed` controls whether stop-marker scanning sees special
/// fragments (`true`, the default) or the cleaned text with them removed.
pub struct StopScanner {
    stop_markers: Vec<String>,
    suppress: Vec<String>,
    scan_suppressed: bool,
    /// Everything decoded so far, untouched.
    raw: String,
    /// Byte length of the visible text already emitted.
    emitted: usize,
    /// Concatenation of every emitted fragment.
    streamed: String,
    stopped: bool,
}

impl StopScanner {
    pub fn new(
        stop_markers: Vec<String>,
        suppress: Vec<String>,
        scan_suppressed: bool,
    ) -> Self {
        Self {
            stop_markers: stop_markers.into_iter().filter(|m| !m.is_empty()).collect(),
            suppress: suppress.into_iter().filter(|m| !m.is_empty()).collect(),
            scan_suppressed,
            raw: String::new(),
            emitted: 0,
            streamed: String::new(),
            stopped: false,
        }
    }

    /// Everything handed back through `emit` so far. After a stop this is
    /// the reply truncated at the marker; after [`Self::flush`] it is the
    /// complete visible reply.
    #[inline]
    pub fn emitted_text(&self) -> &str {
        &self.streamed
    }

    /// Feed the next decoded fragment.
    pub fn scan(&mut self, fragment: &str) -> StopScan {
        if self.stopped {
            return StopScan {
                emit: None,
                stop: true,
            };
        }
        self.raw.push_str(fragment);

        // 1) Completed stop marker anywhere in the scan space ends the turn.
        let scan_space: Cow<'_, str> = if self.scan_suppressed {
            Cow::Borrowed(self.raw.as_str())
        } else {
            Cow::Owned(strip_all(&self.raw, &self.suppress))
        };
        if let Some(pos) = first_hit(&scan_space, &self.stop_markers) {
            let visible = if self.scan_suppressed {
                strip_all(&scan_space[..pos], &self.suppress)
            } else {
                scan_space[..pos].to_string()
            };
            self.stopped = true;
            let emit = self.emit_up_to(&visible, visible.len());
            return StopScan { emit, stop: true };
        }

        // 2) Hold back a trailing partial special, then a trailing partial
        //    stop marker, and emit whatever is left in front of them.
        let held_raw = self.raw.len() - partial_suffix_len(&self.raw, &self.suppress);
        let visible = strip_all(&self.raw[..held_raw], &self.suppress);
        let safe = visible.len() - partial_suffix_len(&visible, &self.stop_markers);

        StopScan {
            emit: self.emit_up_to(&visible, safe),
            stop: false,
        }
    }

    /// Terminal flush for clean endings (end-of-generation token, token
    /// budget, cancellation): held-back text never completed a marker, so
    /// it is ordinary output.
    pub fn flush(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        let visible = strip_all(&self.raw, &self.suppress);
        self.emit_up_to(&visible, visible.len())
    }

    fn emit_up_to(&mut self, visible: &str, safe: usize) -> Option<String> {
        if safe <= self.emitted {
            return None;
        }
        let delta = visible[self.emitted..safe].to_string();
        self.emitted = safe;
        self.streamed.push_str(&delta);
        Some(delta)
    }
}

/// Earliest occurrence of any marker (byte offset), ties broken leftmost.
fn first_hit(buf: &str, markers: &[String]) -> Option<usize> {
    markers
        .iter()
        .filter_map(|m| buf.find(m.as_str()))
        .min()
}

/// Longest tail of `buf` that is a *proper* prefix of some marker, i.e.
/// text that may still complete into that marker.
fn partial_suffix_len(buf: &str, markers: &[String]) -> usize {
    let mut longest = 0;
    for m in markers {
        let cap = (m.len() - 1).min(buf.len());
        for k in (longest + 1..=cap).rev() {
            if m.is_char_boundary(k)
                && buf.is_char_boundary(buf.len() - k)
                && buf.ends_with(&m[..k])
            {
                longest = k;
                break;
            }
        }
    }
    longest
}

/// Remove every occurrence of every marker.
fn strip_all(buf: &str, markers: &[String]) -> String {
    let mut out = buf.to_string();
    for m in markers {
        if out.contains(m.as_str()) {
            out = out.replace(m.as_str(), "");
        }
    }
    out
}
