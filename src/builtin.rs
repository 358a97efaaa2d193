use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Resolution, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::{Factory, resolve};
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    const NAME: &'static str;

    /// Executes the command using provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is printed to `stderr` by the caller and turned into exit code 1.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        mut stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let result = <T as BuiltinCommand>::execute(*self, &mut stdout, &mut stderr, env);
        stdout.flush()?;
        match result {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{}", e)?;
                Ok(1)
            }
        }
    }
}

/// Output of a failed (or `--help`) argument parse, shown instead of running the builtin.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        mut stderr: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let sink: &mut dyn Write = if self.is_error {
            &mut stderr
        } else {
            &mut stdout
        };
        sink.write_all(self.output.as_bytes())?;
        if !self.output.ends_with('\n') {
            sink.write_all(b"\n")?;
        }
        sink.flush()?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::NAME {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(match status {
                    Ok(()) => InvalidArgs {
                        output,
                        is_error: false,
                    },
                    Err(()) => InvalidArgs {
                        output: format!("{}: {}", T::NAME, output),
                        is_error: true,
                    },
                }),
            })
        } else {
            None
        }
    }
}

/// Every builtin the shell knows, keyed by name.
///
/// The table is immutable and consulted before any search-path lookup.
pub(crate) const BUILTINS: &[(&str, &dyn CommandFactory)] = &[
    (Cd::NAME, &Factory::<Cd>::NEW),
    (Echo::NAME, &Factory::<Echo>::NEW),
    (Exit::NAME, &Factory::<Exit>::NEW),
    (Pwd::NAME, &Factory::<Pwd>::NEW),
    (Type::NAME, &Factory::<Type>::NEW),
];

pub(crate) fn lookup(name: &str) -> Option<&'static dyn CommandFactory> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, factory)| *factory)
}

pub(crate) fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    const NAME: &'static str = "pwd";

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

/// Split the operands of a builtin that takes at most one, answering `--help` with `usage`.
///
/// Operands starting with `-` are taken literally, so `cd -dir` and `exit -1` reach the command.
fn single_operand<'a>(args: &[&'a str], usage: &str) -> Result<Option<&'a str>, EarlyExit> {
    match args {
        ["--help", ..] => Err(EarlyExit {
            output: usage.to_string(),
            status: Ok(()),
        }),
        [] => Ok(None),
        [operand] => Ok(Some(*operand)),
        _ => Err(EarlyExit::from("too many arguments".to_string())),
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    /// directory to switch to; absolute, relative to the current directory, or starting with `~`.
    pub target: Option<String>,
}

impl FromArgs for Cd {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        const USAGE: &str = "Usage: cd [<target>]\n\n\
            Change the current working directory.\n\
            Without a target, changes to $HOME. `~` at the start of the target stands for $HOME.\n";
        let target = single_operand(args, USAGE)?;
        Ok(Cd {
            target: target.map(str::to_string),
        })
    }
}

impl Cd {
    /// Apply `~` expansion and pick `$HOME` when no target was given.
    fn target_dir(&self, env: &Environment) -> Result<PathBuf> {
        let home = || env.home_dir().ok_or_else(|| anyhow!("cd: HOME not set"));
        match self.target.as_deref() {
            None | Some("") | Some("~") => home(),
            Some(t) => match t.strip_prefix("~/") {
                Some(rest) => Ok(home()?.join(rest)),
                None => Ok(PathBuf::from(t)),
            },
        }
    }
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = self.target_dir(env)?;
        let shown = self.target.unwrap_or_else(|| target.display().to_string());
        let not_found = || format!("cd: {}: No such file or directory", shown);

        // `join` keeps absolute targets as they are
        let new_dir = env.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir).with_context(not_found)?;

        env::set_current_dir(&canonical).with_context(not_found)?;
        env.current_dir = canonical;
        Ok(0)
    }
}

/// Exit the shell with the given status.
pub struct Exit {
    /// exit status, 0 when omitted.
    pub code: Option<ExitCode>,
}

impl FromArgs for Exit {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        const USAGE: &str = "Usage: exit [<code>]\n\n\
            Exit the shell with the given status, 0 when omitted.\n";
        let code = match single_operand(args, USAGE)? {
            Some(arg) => Some(arg.parse::<ExitCode>().map_err(|_| {
                EarlyExit::from(format!("{}: numeric argument required", arg))
            })?),
            None => None,
        };
        Ok(Exit { code })
    }
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = self.code.unwrap_or(0);
        env.request_exit(code);
        Ok(code)
    }
}

/// Write the arguments to standard output, separated by spaces.
///
/// Only a leading `-n` is treated as an option (suppress the trailing newline);
/// every other argument is printed as-is.
pub struct Echo {
    /// do not output the trailing newline.
    pub no_newline: bool,

    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let (no_newline, rest) = match args.split_first() {
            Some((&"-n", rest)) => (true, rest),
            _ => (false, args),
        };
        Ok(Echo {
            no_newline,
            args: rest.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    const NAME: &'static str = "echo";

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Tell whether each name is a builtin or which file would be executed for it.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    const NAME: &'static str = "type";

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut code = 0;
        for name in &self.names {
            match resolve(env, name) {
                Resolution::Builtin => writeln!(stdout, "{} is a shell builtin", name)?,
                Resolution::External(path) => writeln!(stdout, "{} is {}", name, path.display())?,
                Resolution::NotFound => {
                    writeln!(stderr, "{}: not found", name)?;
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::testing::{lock_current_dir, scratch_env};
    use std::env as stdenv;
    use std::os::unix::fs::PermissionsExt;

    fn run<T: BuiltinCommand>(cmd: T, env: &mut Environment) -> (Result<ExitCode>, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let res = cmd.execute(&mut out, &mut err, env);
        (
            res,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let mut env = scratch_env("");
        let expected = format!("{}\n", env.current_dir.display());

        let (res, out, _) = run(Pwd {}, &mut env);

        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_echo_with_and_without_newline() {
        let mut env = scratch_env("");

        let echo = Echo::from_args(&["echo"], &["hello", "world"]).unwrap();
        let (res, out, _) = run(echo, &mut env);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "hello world\n");

        let echo = Echo::from_args(&["echo"], &["-n", "foo", "bar"]).unwrap();
        let (_, out, _) = run(echo, &mut env);
        assert_eq!(out, "foo bar");
    }

    #[test]
    fn test_echo_without_arguments_prints_newline() {
        let mut env = scratch_env("");
        let echo = Echo::from_args(&["echo"], &[]).unwrap();
        let (_, out, _) = run(echo, &mut env);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_echo_prints_dashes_verbatim() {
        let mut env = scratch_env("");
        let echo = Echo::from_args(&["echo"], &["--help", "-x", "-n"]).unwrap();
        let (_, out, _) = run(echo, &mut env);
        assert_eq!(out, "--help -x -n\n");
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(temp.path()).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut env = scratch_env("");
        let cmd = Cd {
            target: Some(canonical_temp.to_string_lossy().to_string()),
        };
        let (res, _, _) = run(cmd, &mut env);
        let new_cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(fs::canonicalize(new_cwd).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_relative_to_current_dir() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("sub")).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = scratch_env("");
        env.current_dir = canonical_temp.clone();
        let (res, _, _) = run(Cd { target: Some("sub".into()) }, &mut env);
        let (res_up, _, _) = run(Cd { target: Some("..".into()) }, &mut env);
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(res_up.unwrap(), 0);
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_to_home_when_none_or_tilde() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("docs")).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = scratch_env("");
        env.set_var("HOME", canonical_temp.to_string_lossy().to_string());

        let (res_none, _, _) = run(Cd { target: None }, &mut env);
        let after_none = env.current_dir.clone();

        env.current_dir = stdenv::temp_dir();
        let (res_tilde, _, _) = run(Cd { target: Some("~".into()) }, &mut env);
        let after_tilde = env.current_dir.clone();

        let (res_sub, _, _) = run(Cd { target: Some("~/docs".into()) }, &mut env);
        let after_sub = env.current_dir.clone();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res_none.unwrap(), 0);
        assert_eq!(res_tilde.unwrap(), 0);
        assert_eq!(res_sub.unwrap(), 0);
        assert_eq!(after_none, canonical_temp);
        assert_eq!(after_tilde, canonical_temp);
        assert_eq!(after_sub, canonical_temp.join("docs"));
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = scratch_env("");
        let before = env.current_dir.clone();

        let name = format!("nonexistent_dir_for_minishell_test_{}", std::process::id());
        let (res, _, _) = run(Cd { target: Some(name.clone()) }, &mut env);

        let err = res.unwrap_err();
        assert_eq!(err.to_string(), format!("cd: {}: No such file or directory", name));
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.current_dir, before);
    }

    #[test]
    fn test_cd_into_file_errors() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = scratch_env("");
        let target = file.to_string_lossy().to_string();
        let (res, _, _) = run(Cd { target: Some(target.clone()) }, &mut env);

        assert_eq!(
            res.unwrap_err().to_string(),
            format!("cd: {}: No such file or directory", target)
        );
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_exit_records_code() {
        let mut env = scratch_env("");
        let (res, _, _) = run(Exit { code: None }, &mut env);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.exit_request, Some(0));

        let mut env = scratch_env("");
        let exit = Exit::from_args(&["exit"], &["42"]).unwrap();
        let (res, _, _) = run(exit, &mut env);
        assert_eq!(res.unwrap(), 42);
        assert_eq!(env.exit_request, Some(42));
    }

    #[test]
    fn test_exit_rejects_non_numeric_code() {
        let err = Exit::from_args(&["exit"], &["soon"]).err().unwrap();
        assert_eq!(err.output, "soon: numeric argument required");
        assert!(err.status.is_err());

        assert!(Exit::from_args(&["exit"], &["1", "2"]).is_err());
    }

    #[test]
    fn test_exit_accepts_negative_code() {
        let mut env = scratch_env("");
        let exit = Exit::from_args(&["exit"], &["-1"]).unwrap();
        assert_eq!(exit.code, Some(-1));
        let (res, _, _) = run(exit, &mut env);
        assert_eq!(res.unwrap(), -1);
        assert_eq!(env.exit_request, Some(-1));
    }

    #[test]
    fn test_cd_takes_dash_operand_literally() {
        let cd = Cd::from_args(&["cd"], &["-nodir"]).unwrap();
        assert_eq!(cd.target.as_deref(), Some("-nodir"));

        let help = Cd::from_args(&["cd"], &["--help"]).err().unwrap();
        assert!(help.status.is_ok());
        assert!(help.output.starts_with("Usage: cd"));

        let err = Cd::from_args(&["cd"], &["a", "b"]).err().unwrap();
        assert_eq!(err.output, "too many arguments");
    }

    #[test]
    fn test_cd_into_dash_named_directory() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("-foo")).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = scratch_env("");
        env.current_dir = canonical_temp.clone();
        let cd = Cd::from_args(&["cd"], &["-foo"]).unwrap();
        let (res, _, _) = run(cd, &mut env);
        let (missing, _, _) = run(Cd::from_args(&["cd"], &["-nodir"]).unwrap(), &mut env);
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.current_dir, canonical_temp.join("-foo"));
        assert_eq!(
            missing.unwrap_err().to_string(),
            "cd: -nodir: No such file or directory"
        );
        assert_eq!(env.current_dir, canonical_temp.join("-foo"));
    }

    #[test]
    fn test_type_reports_every_builtin() {
        let mut env = scratch_env("");
        for (name, _) in BUILTINS {
            let cmd = Type {
                names: vec![name.to_string()],
            };
            let (res, out, _) = run(cmd, &mut env);
            assert_eq!(res.unwrap(), 0);
            assert_eq!(out, format!("{} is a shell builtin\n", name));
        }
    }

    #[test]
    fn test_type_reports_path_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("mytool");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let mut env = scratch_env(&dir.path().to_string_lossy());
        let cmd = Type {
            names: vec!["mytool".into(), "doesnotexist123".into()],
        };
        let (res, out, err) = run(cmd, &mut env);

        assert_eq!(res.unwrap(), 1);
        assert_eq!(out, format!("mytool is {}\n", tool.display()));
        assert_eq!(err, "doesnotexist123: not found\n");
    }

    #[test]
    fn test_builtin_lookup() {
        for name in ["cd", "echo", "exit", "pwd", "type"] {
            assert!(is_builtin(name), "{} should be a builtin", name);
        }
        assert!(!is_builtin("ls"));
        assert!(!is_builtin(""));
    }

    #[test]
    fn test_factory_reports_argument_errors() {
        use crate::io_adapters::MemWriter;
        use crate::io_adapters::testing::MemReader;

        let factory = lookup("exit").unwrap();
        let env = scratch_env("");
        let cmd = factory.try_create(&env, "exit", &["nope"]).unwrap();

        let (out, out_rc) = MemWriter::with_handle();
        let (err, err_rc) = MemWriter::with_handle();
        let mut exec_env = env.clone();
        let code = cmd
            .execute(
                Box::new(MemReader::new(Vec::new())),
                Box::new(out),
                Box::new(err),
                &mut exec_env,
            )
            .unwrap();

        assert_eq!(code, 1);
        assert!(out_rc.borrow().is_empty());
        assert_eq!(
            String::from_utf8(err_rc.borrow().clone()).unwrap(),
            "exit: nope: numeric argument required\n"
        );
        assert_eq!(exec_env.exit_request, None);
    }
}
