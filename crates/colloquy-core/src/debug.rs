// Fragment tracing for chasing marker/suppression bugs in streamed output.
#[cfg(feature = "stream-trace")]
pub fn trace_fragment(label: &str, s: &str) {
    use std::fmt::Write;
    let mut hex = String::with_capacity(s.len() * 3);
    for b in s.as_bytes() {
        let _ = write!(&mut hex, "{:02X} ", b);
    }
    println!("🔎 [{label}] text : {s:?}");
    println!("🔎 [{label}] bytes: {hex}");
}

// no-op stub when the feature is off
#[cfg(not(feature = "stream-trace"))]
pub fn trace_fragment(_label: &str, _s: &str) {}
