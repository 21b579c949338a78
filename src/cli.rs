//! CLI argument parsing.
//!
//! Invocation: background-task.exe <command> <executable> [<arg>...]
//! Commands (case-insensitive): hidecommand, help
//! Flags: --debug/-d, recognized only up to the executable position;
//! everything after the executable belongs to the child verbatim.

use crate::launch::LaunchRequest;

#[derive(Debug, PartialEq)]
pub enum Command {
    /// Launch the executable hidden and wait for its whole process tree.
    HideCommand(LaunchRequest),
    /// Show usage (explicit `help` or too few arguments).
    Help,
    /// Unrecognized command token.
    Invalid(String),
}

#[derive(Debug)]
pub struct Invocation {
    pub command: Command,
    pub debug: bool,
}

/// Parse the raw token list (program name included) into an invocation.
pub fn parse(tokens: Vec<String>) -> Invocation {
    let mut debug = false;
    let mut positional: Vec<String> = Vec::new();
    for token in tokens {
        // Flag stripping stops once the executable positional is filled;
        // later tokens are the child's arguments and pass through even
        // when they look like our own flags.
        if positional.len() < 3 && (token == "--debug" || token == "-d") {
            debug = true;
            continue;
        }
        positional.push(token);
    }

    if positional.len() < 3 || positional[1].eq_ignore_ascii_case("help") {
        return Invocation {
            command: Command::Help,
            debug,
        };
    }

    let command = if positional[1].eq_ignore_ascii_case("hidecommand") {
        Command::HideCommand(LaunchRequest {
            executable: positional[2].clone(),
            args: positional[3..].to_vec(),
        })
    } else {
        Command::Invalid(positional[1].clone())
    };

    Invocation { command, debug }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_shows_help() {
        let inv = parse(tokens(&["background-task.exe"]));
        assert_eq!(inv.command, Command::Help);
    }

    #[test]
    fn two_tokens_is_still_too_few() {
        let inv = parse(tokens(&["background-task.exe", "hidecommand"]));
        assert_eq!(inv.command, Command::Help);
    }

    #[test]
    fn explicit_help_shows_help() {
        let inv = parse(tokens(&["background-task.exe", "HELP", "extra"]));
        assert_eq!(inv.command, Command::Help);
    }

    #[test]
    fn hidecommand_is_case_insensitive() {
        let inv = parse(tokens(&["background-task.exe", "HideCommand", "notepad.exe"]));
        match inv.command {
            Command::HideCommand(req) => {
                assert_eq!(req.executable, "notepad.exe");
                assert!(req.args.is_empty());
            }
            other => panic!("expected HideCommand, got {:?}", other),
        }
    }

    #[test]
    fn extra_tokens_become_arguments_in_order() {
        let inv = parse(tokens(&[
            "background-task.exe",
            "hidecommand",
            "app.exe",
            "--flag",
            "value",
        ]));
        match inv.command {
            Command::HideCommand(req) => {
                assert_eq!(req.args, vec!["--flag", "value"]);
            }
            other => panic!("expected HideCommand, got {:?}", other),
        }
    }

    #[test]
    fn unknown_command_is_invalid() {
        let inv = parse(tokens(&["background-task.exe", "foo", "app.exe"]));
        assert_eq!(inv.command, Command::Invalid("foo".to_string()));
    }

    #[test]
    fn debug_flag_before_executable_is_stripped() {
        let inv = parse(tokens(&[
            "background-task.exe",
            "--debug",
            "hidecommand",
            "app.exe",
        ]));
        assert!(inv.debug);
        match inv.command {
            Command::HideCommand(req) => {
                assert_eq!(req.executable, "app.exe");
                assert!(req.args.is_empty());
            }
            other => panic!("expected HideCommand, got {:?}", other),
        }
    }

    #[test]
    fn flag_lookalikes_after_executable_reach_the_child() {
        let inv = parse(tokens(&[
            "background-task.exe",
            "hidecommand",
            "app.exe",
            "-d",
            "--debug",
            "arg",
        ]));
        assert!(!inv.debug);
        match inv.command {
            Command::HideCommand(req) => {
                assert_eq!(req.executable, "app.exe");
                assert_eq!(req.args, vec!["-d", "--debug", "arg"]);
            }
            other => panic!("expected HideCommand, got {:?}", other),
        }
    }
}
