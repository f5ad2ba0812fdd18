//! Messages driving the engine loop

/// Everything the engine reacts to besides packager events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Start or restart the packager; `args` follow the configured ones
    Start { args: Vec<String> },
    /// Run a packager sub-command by id
    Command(String),
    /// Show the invocable commands
    Help,
    Quit,
}

impl Message {
    pub fn start(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Start {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn command(id: impl Into<String>) -> Self {
        Self::Command(id.into())
    }
}
