//! POSIX signals deliverable to a PTY process

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PtyError;

/// Signal sent to the process running inside a PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Signal {
    #[serde(rename = "SIGHUP")]
    Hup,
    #[serde(rename = "SIGINT")]
    Int,
    #[serde(rename = "SIGQUIT")]
    Quit,
    #[serde(rename = "SIGKILL")]
    Kill,
    #[default]
    #[serde(rename = "SIGTERM")]
    Term,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hup => "SIGHUP",
            Self::Int => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::Kill => "SIGKILL",
            Self::Term => "SIGTERM",
        }
    }

    /// Raw signal number for `kill(2)`.
    #[cfg(unix)]
    pub(crate) fn as_raw(&self) -> libc::c_int {
        match self {
            Self::Hup => libc::SIGHUP,
            Self::Int => libc::SIGINT,
            Self::Quit => libc::SIGQUIT,
            Self::Kill => libc::SIGKILL,
            Self::Term => libc::SIGTERM,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = PtyError;

    /// Accepts `SIGTERM`, `TERM` or `term`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "HUP" => Ok(Self::Hup),
            "INT" => Ok(Self::Int),
            "QUIT" => Ok(Self::Quit),
            "KILL" => Ok(Self::Kill),
            "TERM" => Ok(Self::Term),
            _ => Err(PtyError::UnknownSignal(s.to_string())),
        }
    }
}
