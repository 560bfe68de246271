//! Commands a front end can submit to a flow session.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// User picked an update package.
    SelectArchive(String),
    /// Start the transfer with the held archive and device.
    Install,
    /// Pause the running transfer.
    Pause,
    /// Abort the running transfer.
    Stop,
    /// Leave the session from the progress screen.
    Disconnect,
    /// Leave the session.
    NavigateUp,
}

impl fmt::Display for UserCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserCommand::SelectArchive(uri) => write!(f, "select-archive({})", uri),
            UserCommand::Install => write!(f, "install"),
            UserCommand::Pause => write!(f, "pause"),
            UserCommand::Stop => write!(f, "stop"),
            UserCommand::Disconnect => write!(f, "disconnect"),
            UserCommand::NavigateUp => write!(f, "navigate-up"),
        }
    }
}
