//! Chart output: the band gauge (PNG for posts, SVG for the dashboard) and
//! the dashboard timeline.

pub mod gauge;
pub mod timeline;

pub use gauge::{Gauge, GaugeSegment};
pub use timeline::Timeline;

/// Escapes text for inclusion in SVG or HTML.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
