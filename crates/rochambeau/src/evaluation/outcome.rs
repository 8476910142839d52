//! Reading the checker's verdict

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::evaluation::messages::{OUTPUT_CORRECT, OUTPUT_PARTIAL, OUTPUT_WRONG};
use crate::types::Text;

const TRANSLATE_PREFIX: &str = "translate:";

/// A score in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    pub const ZERO: Score = Score(0.0);

    /// Returns `None` for values outside `[0, 1]`, NaN and infinities
    ///
    /// Negative zero is stored as zero.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value.abs()))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Plain decimal, never exponent form; whole numbers keep one fractional digit
        if self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Score and explanation attached to a finished evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub score: Score,
    pub text: Text,
}

impl Outcome {
    pub fn new(score: Score, text: Text) -> Self {
        Self { score, text }
    }

    pub fn zero(text: Text) -> Self {
        Self::new(Score::ZERO, text)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedCheckerOutput {
    #[error("checker output is not valid UTF-8")]
    NotUtf8,

    #[error("checker printed no score")]
    Empty,

    #[error("checker score {0:?} is not a number")]
    NotANumber(String),

    #[error("checker score {0} is outside [0, 1]")]
    OutOfRange(f64),
}

/// Parse the checker's stdout and stderr into an [`Outcome`]
///
/// The score is the first line of stdout. The message is the first line of
/// stderr, or the second line of stdout when stderr has nothing to say.
pub fn extract_outcome(stdout: &[u8], stderr: &[u8]) -> Result<Outcome, MalformedCheckerOutput> {
    let stdout = std::str::from_utf8(stdout).map_err(|_| MalformedCheckerOutput::NotUtf8)?;
    let stderr = std::str::from_utf8(stderr).map_err(|_| MalformedCheckerOutput::NotUtf8)?;

    let mut lines = stdout.lines();
    let first = lines.next().map(str::trim).unwrap_or_default();
    if first.is_empty() {
        return Err(MalformedCheckerOutput::Empty);
    }

    let value: f64 = first
        .parse()
        .map_err(|_| MalformedCheckerOutput::NotANumber(first.to_owned()))?;
    let score = Score::new(value).ok_or(MalformedCheckerOutput::OutOfRange(value))?;

    let message = match stderr.lines().next().map(str::trim) {
        Some(line) if !line.is_empty() => line,
        _ => lines.next().map(str::trim).unwrap_or_default(),
    };

    Ok(Outcome::new(score, translate(message)))
}

fn translate(message: &str) -> Text {
    let Some(key) = message.strip_prefix(TRANSLATE_PREFIX) else {
        return Text::new(message);
    };
    match key {
        "success" => Text::new(OUTPUT_CORRECT),
        "partial" => Text::new(OUTPUT_PARTIAL),
        "wrong" => Text::new(OUTPUT_WRONG),
        _ => {
            warn!(message, "unknown translation key in checker message");
            Text::new(message)
        }
    }
}
