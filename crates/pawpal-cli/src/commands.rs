//! Parsing of input lines.  Anything not starting with `/` is a message.

use pawpal_pets::NewPet;
use pawpal_shared::DocumentId;

use crate::error::CommandError;

pub const HELP: &str = "\
Commands:
  /pets                      list pets up for adoption
  /add <name> <type> <age>   list a new pet
  /fav <pet-id>              save a pet to your favorites
  /favs                      list your favorites
  /adopt <pet-id>            adopt a pet
  /help                      show this help
  /quit                      leave the chat
Anything else is sent as a message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Pets,
    Add(NewPet),
    Fav(DocumentId),
    Favs,
    Adopt(DocumentId),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match (name, args.as_slice()) {
            ("pets", []) => Ok(Self::Pets),
            ("pets", _) => Err(CommandError::Usage("/pets")),
            ("add", [name, pet_type, age]) => Ok(Self::Add(NewPet::new(*name, *pet_type, *age))),
            ("add", _) => Err(CommandError::Usage("/add <name> <type> <age>")),
            ("fav", [id]) => Ok(Self::Fav(DocumentId::from(*id))),
            ("fav", _) => Err(CommandError::Usage("/fav <pet-id>")),
            ("favs", []) => Ok(Self::Favs),
            ("favs", _) => Err(CommandError::Usage("/favs")),
            ("adopt", [id]) => Ok(Self::Adopt(DocumentId::from(*id))),
            ("adopt", _) => Err(CommandError::Usage("/adopt <pet-id>")),
            ("help", _) => Ok(Self::Help),
            ("quit" | "exit", _) => Ok(Self::Quit),
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            Command::parse("hello there").unwrap(),
            Command::Say("hello there".into())
        );
        assert_eq!(Command::parse("   ").unwrap(), Command::Say("   ".into()));
    }

    #[test]
    fn test_commands() {
        assert_eq!(Command::parse("/pets").unwrap(), Command::Pets);
        assert_eq!(Command::parse(" /favs ").unwrap(), Command::Favs);
        assert_eq!(Command::parse("/quit").unwrap(), Command::Quit);
        assert_eq!(
            Command::parse("/fav abc123").unwrap(),
            Command::Fav(DocumentId::from("abc123"))
        );
        assert_eq!(
            Command::parse("/add Rex Dog 3").unwrap(),
            Command::Add(NewPet::new("Rex", "Dog", "3"))
        );
    }

    #[test]
    fn test_bad_commands() {
        assert_eq!(
            Command::parse("/add Rex Dog"),
            Err(CommandError::Usage("/add <name> <type> <age>"))
        );
        assert_eq!(
            Command::parse("/adopt"),
            Err(CommandError::Usage("/adopt <pet-id>"))
        );
        assert_eq!(
            Command::parse("/dance"),
            Err(CommandError::Unknown("dance".into()))
        );
    }
}
