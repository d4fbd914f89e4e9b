use std::collections::HashMap;

/// Built-in commands implemented inside the interpreter process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Cat,
    Cd,
    Echo,
    Grep,
    Pwd,
    Wc,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Cat,
        Builtin::Cd,
        Builtin::Echo,
        Builtin::Grep,
        Builtin::Pwd,
        Builtin::Wc,
    ];

    /// Canonical name of the command, e.g. "echo" or "cd".
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cat => "cat",
            Builtin::Cd => "cd",
            Builtin::Echo => "echo",
            Builtin::Grep => "grep",
            Builtin::Pwd => "pwd",
            Builtin::Wc => "wc",
        }
    }
}

/// How a parsed command is going to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `$NAME=value`: sets a variable in the interpreter environment.
    Assignment,
    /// `exit [CODE]`: requests interpreter termination.
    Exit,
    Builtin(Builtin),
    /// Anything else is looked up as a program.
    External,
}

/// Maps command names to the kind of command they run.
///
/// Lookup is case-insensitive. Names can be (re)bound at run time with
/// [`CommandRegistry::register`], e.g. to alias a new name to an existing built-in.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    entries: HashMap<String, CommandKind>,
}

impl CommandRegistry {
    /// Create a registry that knows nothing; every name resolves to [`CommandKind::External`].
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Resolve the kind of command `name` refers to.
    pub fn resolve(&self, name: &str) -> CommandKind {
        self.entries
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or(CommandKind::External)
    }

    /// Bind `name` to `kind`, replacing any previous binding.
    pub fn register(&mut self, name: &str, kind: CommandKind) {
        log::debug!("register {name} as {kind:?}");
        self.entries.insert(name.to_lowercase(), kind);
    }
}

impl Default for CommandRegistry {
    /// The registry seeded with every built-in and `exit`.
    fn default() -> Self {
        let mut registry = Self::empty();
        for builtin in Builtin::ALL {
            registry.register(builtin.name(), CommandKind::Builtin(builtin));
        }
        registry.register("exit", CommandKind::Exit);
        registry
    }
}
