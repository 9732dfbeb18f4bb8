//! Command-line argument handling shared by the binaries.
//!
//! Configuration flags must precede any command tokens. The split hands the
//! leading flags to `ortho_config` and leaves the rest for the command
//! parser. When no `--config-path` is given, the default `config.toml` under
//! the default root is injected, but only once it exists.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use crate::default_config_root;
use crate::layout::VaultLayout;

/// Flag selecting the configuration file.
pub const CONFIG_PATH_FLAG: &str = "--config-path";

/// Flags consumed by the configuration loader. Each takes a value.
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    CONFIG_PATH_FLAG,
    "--spotify-data-path",
    "--spotify-exec-path",
    "--spotify-config-path",
    "--config-root",
    "--daemon-addr",
    "--allowed-origin",
    "--log-filter",
    "--log-format",
    "--checksum-policy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

/// Result of splitting raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSplit {
    /// Program name followed by the configuration flags.
    pub config_arguments: Vec<OsString>,
    /// Index of the first command token in the raw arguments.
    pub command_start: usize,
}

/// Separates leading configuration flags from command tokens.
#[must_use]
pub fn split_config_arguments(args: &[OsString]) -> ArgumentSplit {
    let Some(program) = args.first() else {
        return ArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_start = 1;
    let mut pending_value = false;
    for argument in args.iter().skip(1) {
        if pending_value {
            pending_value = false;
        } else {
            match classify(argument) {
                FlagAction::Include { needs_value } => pending_value = needs_value,
                FlagAction::Stop => break,
            }
        }
        config_arguments.push(argument.clone());
        command_start += 1;
    }

    ArgumentSplit {
        config_arguments,
        command_start,
    }
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Returns the configuration file named on the command line, if any.
#[must_use]
pub fn explicit_config_file(config_arguments: &[OsString]) -> Option<PathBuf> {
    let mut iter = config_arguments.iter();
    while let Some(argument) = iter.next() {
        let text = argument.to_string_lossy();
        if text == CONFIG_PATH_FLAG {
            return iter.next().map(PathBuf::from);
        }
        if let Some(value) = text
            .strip_prefix(CONFIG_PATH_FLAG)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(PathBuf::from(value));
        }
    }
    None
}

/// The file the binaries read, named explicitly or defaulted.
#[must_use]
pub fn config_file(config_arguments: &[OsString]) -> PathBuf {
    explicit_config_file(config_arguments)
        .unwrap_or_else(|| VaultLayout::config_file_for(&default_config_root()))
}

/// Appends `--config-path <default>` when none is given and the default file
/// exists.
#[must_use]
pub fn with_default_config_file(mut config_arguments: Vec<OsString>) -> Vec<OsString> {
    if explicit_config_file(&config_arguments).is_some() {
        return config_arguments;
    }
    let path = config_file(&config_arguments);
    if path.is_file() {
        if config_arguments.is_empty() {
            config_arguments.push(OsString::from("spicetify"));
        }
        config_arguments.push(OsString::from(CONFIG_PATH_FLAG));
        config_arguments.push(path.into_os_string());
    }
    config_arguments
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case(&["spicetify", "pkg", "list"], &["spicetify"], 1)]
    #[case(
        &["spicetify", "--log-filter", "debug", "pkg", "list"],
        &["spicetify", "--log-filter", "debug"],
        3
    )]
    #[case(
        &["spicetify", "--log-format=compact", "apply"],
        &["spicetify", "--log-format=compact"],
        2
    )]
    #[case(&["spicetify", "--unknown", "apply"], &["spicetify"], 1)]
    fn splits_leading_config_flags(
        #[case] raw: &[&str],
        #[case] expected: &[&str],
        #[case] command_start: usize,
    ) {
        let split = split_config_arguments(&os(raw));
        assert_eq!(split.config_arguments, os(expected));
        assert_eq!(split.command_start, command_start);
    }

    #[test]
    fn flags_after_command_tokens_stay_with_the_command() {
        let split = split_config_arguments(&os(&["spicetify", "apply", "--log-filter", "x"]));
        assert_eq!(split.config_arguments, os(&["spicetify"]));
        assert_eq!(split.command_start, 1);
    }

    #[test]
    fn empty_arguments_split_to_nothing() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert_eq!(split.command_start, 0);
    }

    #[rstest]
    #[case(&["spicetify", "--config-path", "/etc/s.toml"], Some("/etc/s.toml"))]
    #[case(&["spicetify", "--config-path=/etc/s.toml"], Some("/etc/s.toml"))]
    #[case(&["spicetify", "--log-filter", "debug"], None)]
    fn finds_explicit_config_file(#[case] raw: &[&str], #[case] expected: Option<&str>) {
        assert_eq!(explicit_config_file(&os(raw)), expected.map(PathBuf::from));
    }

    #[test]
    fn explicit_config_file_is_not_duplicated() {
        let args = os(&["spicetify", "--config-path", "/nowhere.toml"]);
        assert_eq!(with_default_config_file(args.clone()), args);
    }
}
