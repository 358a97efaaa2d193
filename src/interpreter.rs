use crate::builtin;
use crate::command::{CommandFactory, CommandLine, ExitCode, NOT_FOUND, Resolution, Stdin, Stdout};
use crate::env::Environment;
use crate::external::{self, ExternalCommand};
use std::io::{Read, Write};
use std::process::Stdio;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and `ExternalCommand`.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Factory<T> {
    pub(crate) const NEW: Self = Self {
        _phantom: std::marker::PhantomData,
    };
}

/// Decide what `name` would run as, without running it.
///
/// Builtins win unconditionally; otherwise the search path is consulted.
pub fn resolve(env: &Environment, name: &str) -> Resolution {
    if builtin::is_builtin(name) {
        return Resolution::Builtin;
    }
    match external::locate(env, name) {
        Some(path) => Resolution::External(path),
        None => Resolution::NotFound,
    }
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`]. Builtins come from a fixed table and are
/// always tried first; after them a list of [`CommandFactory`] objects is queried in order
/// to create commands by name. See [`Default`] for the factories included out of the box.
///
/// Example
/// ```
/// use minishell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of non-builtin command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self::with_environment(Environment::new(), commands)
    }

    pub fn with_environment(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { env, commands }
    }

    /// The default factories: the external command launcher.
    pub fn default_commands() -> Vec<Box<dyn CommandFactory>> {
        vec![Box::new(Factory::<ExternalCommand>::NEW)]
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Exit code requested by the `exit` builtin, if it ran.
    pub fn exit_request(&self) -> Option<ExitCode> {
        self.env.exit_request
    }

    /// Run a single command invocation by name with arguments, on the process' own
    /// standard streams.
    ///
    /// Returns the command's exit code or an error if the command fails to execute.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        let line = CommandLine::new(name, args.iter().map(|s| s.to_string()).collect());
        self.execute(
            &line,
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
        )
    }

    /// Dispatch one tokenized line.
    ///
    /// An empty command does nothing. A builtin runs in-process; anything else is offered to
    /// the command factories in order. When nobody recognizes the name,
    /// `<name>: command not found` goes to `stderr` and [`NOT_FOUND`] is returned.
    pub fn execute(
        &mut self,
        line: &CommandLine,
        stdout: Box<dyn Stdout>,
        mut stderr: Box<dyn Stdout>,
    ) -> anyhow::Result<ExitCode> {
        if line.is_empty() {
            return Ok(0);
        }

        let name = line.name.as_str();
        let args: Vec<&str> = line.args.iter().map(|s| s.as_str()).collect();

        let cmd = builtin::lookup(name)
            .and_then(|factory| factory.try_create(&self.env, name, &args))
            .or_else(|| {
                self.commands
                    .iter()
                    .find_map(|factory| factory.try_create(&self.env, name, &args))
            });

        match cmd {
            Some(cmd) => {
                let stdin = InheritedStdin(std::io::stdin().lock());
                cmd.execute(Box::new(stdin), stdout, stderr, &mut self.env)
            }
            None => {
                writeln!(stderr, "{}: command not found", name)?;
                stderr.flush()?;
                Ok(NOT_FOUND)
            }
        }
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the builtins and the external command launcher.
    fn default() -> Self {
        Self::new(Self::default_commands())
    }
}

struct InheritedStdin<'a>(std::io::StdinLock<'a>);

impl Read for InheritedStdin<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin<'_> {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}
