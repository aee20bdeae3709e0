use std::str::FromStr;

use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List all groups.
    Groups,
    /// Create and select a group.
    AddGroup(String),
    /// Delete a group.
    DeleteGroup(String),
    /// Select a group.
    Select(String),
    /// List the options of the selected group.
    Options,
    /// Add an option to the selected group.
    Add(String),
    /// Delete the option at an index of the selected group.
    Delete(usize),
    /// Spin the selected group.
    Spin,
    /// Stop the running spin.
    Stop,
    /// Show the spin state.
    Status,
    /// Save unsaved changes again.
    Retry,
    /// Print the command list.
    Help,
    /// Leave the application.
    Quit,
}

/// Why a line could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace.
    #[error("empty input")]
    Empty,
    /// The first word is not a known command.
    #[error("unknown command `{0}`; type `help` for the list")]
    Unknown(String),
    /// The command needs an argument.
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    /// The argument is not an option index.
    #[error("`{0}` is not a valid option index")]
    InvalidIndex(String),
}

/// Text printed by `help`.
pub const HELP: &str = "\
commands:
  groups               list groups
  add-group <name>     create a group and select it
  delete-group <name>  delete a group
  select <name>        select a group
  options              list options of the selected group
  add <text>           add an option to the selected group
  delete <index>       delete an option of the selected group
  spin                 spin the wheel
  stop                 stop the wheel before the reveal
  status               show the wheel state
  retry                save changes that could not be saved
  help                 show this list
  quit                 leave";

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let argument = |name: &'static str| {
            if rest.is_empty() {
                Err(ParseError::MissingArgument(name))
            } else {
                Ok(rest.to_owned())
            }
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "groups" | "ls" => Command::Groups,
            "add-group" => Command::AddGroup(argument("add-group")?),
            "delete-group" | "rm-group" => Command::DeleteGroup(argument("delete-group")?),
            "select" | "use" => Command::Select(argument("select")?),
            "options" => Command::Options,
            "add" => Command::Add(argument("add")?),
            "delete" | "rm" => {
                let raw = argument("delete")?;
                let index = raw.parse().map_err(|_| ParseError::InvalidIndex(raw))?;
                Command::Delete(index)
            }
            "spin" => Command::Spin,
            "stop" => Command::Stop,
            "status" => Command::Status,
            "retry" => Command::Retry,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(ParseError::Unknown(word.to_owned())),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_keep_inner_spaces() {
        assert_eq!(
            "add-group  Friday lunch ".parse::<Command>(),
            Ok(Command::AddGroup("Friday lunch".into()))
        );
        assert_eq!(
            "add green curry".parse::<Command>(),
            Ok(Command::Add("green curry".into()))
        );
    }

    #[test]
    fn delete_needs_a_numeric_index() {
        assert_eq!("delete 2".parse::<Command>(), Ok(Command::Delete(2)));
        assert_eq!(
            "delete two".parse::<Command>(),
            Err(ParseError::InvalidIndex("two".into()))
        );
        assert_eq!(
            "delete".parse::<Command>(),
            Err(ParseError::MissingArgument("delete"))
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!("SPIN".parse::<Command>(), Ok(Command::Spin));
        assert_eq!(" Quit ".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn rejects_blank_and_unknown_input() {
        assert_eq!("   ".parse::<Command>(), Err(ParseError::Empty));
        assert_eq!(
            "dance".parse::<Command>(),
            Err(ParseError::Unknown("dance".into()))
        );
    }
}
