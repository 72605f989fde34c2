//! Matplotlib preamble extraction.
//!
//! Matplotlib's PGF backend records the LaTeX preamble it rendered with as a
//! comment block at the top of every `.pgf` file:
//!
//! ```text
//! %% Matplotlib used the following preamble
//! %%   \def\mathdefault#1{#1}
//! %%   \usepackage{fontspec}
//! %%
//! ```
//!
//! Without it, fonts and macros such as `\mathdefault` are undefined and the
//! figure fails to compile standalone. The scan is a heuristic: anything that
//! does not look exactly like this block yields `None`.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^%+\s*Matplotlib used the following preamble").expect("valid marker regex")
});

// Comment run, then at least three spaces; the remainder is the preamble line.
static BLOCK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%+ {3}(.*)$").expect("valid block-line regex"));

/// Return the de-commented, trimmed preamble block, if any.
pub fn extract_preamble(source: &str) -> Option<String> {
    let mut lines = source.lines().skip_while(|line| !MARKER.is_match(line));
    lines.next()?;

    let block: Vec<&str> = lines
        .map_while(|line| BLOCK_LINE.captures(line))
        .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
        .collect();

    let joined = block.join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
