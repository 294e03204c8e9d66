//! Line ending helpers.
//!
//! The tokenizer works on single lines without terminators. Text coming from files or from
//! a network download may use CRLF (`"\r\n"`) or lone CR; it is normalized to LF before it
//! is split into lines.

/// The line ending convention detected in a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    Lf,
    /// Windows-style CRLF (`"\r\n"`).
    Crlf,
}

impl LineEnding {
    /// Detect the dominant line ending from a source text.
    ///
    /// Policy: if the input contains any CRLF (`"\r\n"`), returns [`LineEnding::Crlf`],
    /// otherwise [`LineEnding::Lf`].
    pub fn detect_in_text(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// The newline sequence itself.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

/// Normalize CRLF and lone CR to LF.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split text into lines without terminators.
///
/// A trailing newline produces a final empty line, the way an editor shows it, and empty
/// input is a single empty line.
pub fn split_lines(text: &str) -> Vec<String> {
    normalize_line_endings(text)
        .split('\n')
        .map(str::to_string)
        .collect()
}
