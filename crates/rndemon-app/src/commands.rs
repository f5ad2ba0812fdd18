//! Command descriptors and the registry of currently exposed commands

use rndemon_daemon::{DEV_MENU, RELOAD};

pub const START_COMMAND: &str = "rn.start";
pub const START_TITLE: &str = "start React Native packager";

pub const STOP_COMMAND: &str = "rn.dev.stop";
pub const TOGGLE_CONSOLE_COMMAND: &str = "rn.dev.toggleConsole";
pub const SHOW_DEV_MENU_COMMAND: &str = "rn.dev.showDevMenu";
pub const RELOAD_COMMAND: &str = "rn.dev.reload";
pub const OPEN_PROFILER_COMMAND: &str = "rn.dev.openProfiler";

pub const DEV_MENU_MESSAGE: &str = "Showing the developer menu...";
pub const RELOAD_MESSAGE: &str = "Reloading the app...";

/// Side effect run after a command's bytes have been written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCallback {
    /// Stop the packager
    Stop,
    /// Show a fixed message
    Notify(&'static str),
    /// Open the last announced profiler URL
    OpenProfiler,
}

/// Static description of a packager sub-command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub id: &'static str,
    pub description: &'static str,
    /// Raw bytes written to the packager's stdin
    pub bytes: Option<&'static [u8]>,
    pub callback: Option<CommandCallback>,
}

/// Sub-commands exposed while the packager is running
pub const DEV_COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        id: STOP_COMMAND,
        description: "Stop the React Native packager",
        bytes: None,
        callback: Some(CommandCallback::Stop),
    },
    CommandDescriptor {
        id: TOGGLE_CONSOLE_COMMAND,
        description: "Hide / show the React Native console",
        bytes: Some(DEV_MENU),
        callback: Some(CommandCallback::Notify(DEV_MENU_MESSAGE)),
    },
    CommandDescriptor {
        id: SHOW_DEV_MENU_COMMAND,
        description: "Show the developer menu",
        bytes: Some(DEV_MENU),
        callback: Some(CommandCallback::Notify(DEV_MENU_MESSAGE)),
    },
    CommandDescriptor {
        id: RELOAD_COMMAND,
        description: "Reload the app",
        bytes: Some(RELOAD),
        callback: Some(CommandCallback::Notify(RELOAD_MESSAGE)),
    },
    CommandDescriptor {
        id: OPEN_PROFILER_COMMAND,
        description: "Open the profiler in the browser",
        bytes: None,
        callback: Some(CommandCallback::OpenProfiler),
    },
];

/// Look up a sub-command descriptor by id, registered or not
pub fn find_dev_command(id: &str) -> Option<&'static CommandDescriptor> {
    DEV_COMMANDS.iter().find(|c| c.id == id)
}

/// The sub-commands currently exposed to the user
#[derive(Debug, Default)]
pub struct CommandRegistry {
    registered: Vec<&'static CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose every sub-command. Registering twice does not duplicate.
    pub fn register_all(&mut self) {
        self.registered = DEV_COMMANDS.iter().collect();
    }

    pub fn unregister_all(&mut self) {
        self.registered.clear();
    }

    pub fn get(&self, id: &str) -> Option<&'static CommandDescriptor> {
        self.registered.iter().copied().find(|c| c.id == id)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// `(id, title)` pairs of every invocable command, `start` first
    pub fn titles(&self) -> Vec<(&'static str, &'static str)> {
        std::iter::once((START_COMMAND, START_TITLE))
            .chain(self.registered.iter().map(|c| (c.id, c.description)))
            .collect()
    }
}
