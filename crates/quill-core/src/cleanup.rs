//! Cleanup transforms applied to the accumulated model output.
//!
//! Models asked to "respond in markdown" frequently wrap the whole answer in a
//! fenced block. A cleanup runs over the *entire* running text on every
//! fragment, so a marker that arrives split across fragments is still removed
//! once it is complete.
//!
//! Every mode is idempotent: `apply(apply(x)) == apply(x)`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use strum::{AsRefStr, EnumString};

/// Literal substrings removed by [`Cleanup::StripLiterals`].
const LITERAL_MARKERS: &[&str] = &["```", "markdown"];

/// A code fence plus an optional info string directly attached to it.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+.#-]*").expect("fence pattern is valid"));

/// How formatting artifacts are stripped from the running text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Cleanup {
    /// Leave the text untouched.
    Identity,
    /// Remove every literal "```" and "markdown". This is the baseline
    /// compatibility mode, false positives included (the word "markdown"
    /// in prose disappears too, "```python" leaves "python" behind).
    #[default]
    StripLiterals,
    /// Remove code fences together with any attached language tag
    /// ("```", "```markdown", "```python", ...).
    StripFences,
}

impl Cleanup {
    /// Apply the transform to the full accumulated text.
    pub fn apply(&self, text: &str) -> String {
        match self {
            Cleanup::Identity => text.to_string(),
            Cleanup::StripLiterals => to_fixpoint(text, |s| {
                LITERAL_MARKERS
                    .iter()
                    .fold(s.to_string(), |acc, marker| acc.replace(marker, ""))
            }),
            Cleanup::StripFences => {
                to_fixpoint(text, |s| FENCE_RE.replace_all(s, "").into_owned())
            }
        }
    }

    /// Byte length of the longest suffix of `text` that could still grow into
    /// a marker this cleanup removes.
    ///
    /// Append-only displays hold this tail back, since the next fragment may
    /// complete the marker and make it disappear from the snapshot.
    pub fn unstable_suffix_len(&self, text: &str) -> usize {
        match self {
            Cleanup::Identity => 0,
            Cleanup::StripLiterals => LITERAL_MARKERS
                .iter()
                .map(|marker| longest_partial_marker(text, marker))
                .max()
                .unwrap_or(0),
            Cleanup::StripFences => longest_partial_marker(text, "```"),
        }
    }
}

/// A pure, idempotent transform over the full accumulated text.
///
/// Implemented by [`Cleanup`] and by any `Fn(&str) -> String`.
pub trait TextCleanup {
    fn clean(&self, text: &str) -> String;
}

impl TextCleanup for Cleanup {
    fn clean(&self, text: &str) -> String {
        self.apply(text)
    }
}

impl<F> TextCleanup for F
where
    F: Fn(&str) -> String,
{
    fn clean(&self, text: &str) -> String {
        self(text)
    }
}

/// Re-apply `step` until the text stops changing.
///
/// Removing one marker can splice its neighbours into a new one
/// ("``markdown`" becomes "```"), so a single pass is not idempotent.
fn to_fixpoint(text: &str, step: impl Fn(&str) -> String) -> String {
    let mut current = step(text);
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Length of the longest proper prefix of `marker` that `text` ends with.
fn longest_partial_marker(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&n| text.ends_with(&marker[..n]))
        .unwrap_or(0)
}
