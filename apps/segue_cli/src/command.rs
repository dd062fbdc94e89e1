//! 交互命令解析

/// 一行输入对应的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(String),
    Next(String),
    Pause,
    Stop,
    Seek(f64),
    /// 0.0 - 1.0
    Volume(f64),
    Position,
    Status,
    Help,
    Quit,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0} (type `help`)")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("not a number: {0}")]
    InvalidNumber(String),
}

pub const HELP: &str = "\
commands:
  pl | play <file>      stop, drop the queued next track, play <file>
  n  | next <file>      queue <file> to follow the current track
  pa | pause            pause or resume
  s  | stop             stop playback
  sk | seek <seconds>   jump to position
  v  | volume <0-100>   set volume
  pos | position        show position
  status                show state and current track
  h  | help            this text
  q  | quit            exit";

impl Command {
    /// 解析一行输入，空行返回 `None`
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "pl" | "play" | "p" => Command::Play(required("play", rest)?.to_string()),
            "n" | "next" => Command::Next(required("next", rest)?.to_string()),
            "pa" | "pause" => Command::Pause,
            "s" | "st" | "stop" => Command::Stop,
            "sk" | "seek" => Command::Seek(number(required("seek", rest)?)?),
            "v" | "volume" => Command::Volume(number(required("volume", rest)?)? / 100.0),
            "pos" | "position" => Command::Position,
            "status" => Command::Status,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}

fn required<'a>(command: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

fn number(text: &str) -> Result<f64, CommandError> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Command::parse("pa").unwrap(), Some(Command::Pause));
        assert_eq!(Command::parse("STOP").unwrap(), Some(Command::Stop));
        assert_eq!(Command::parse("st").unwrap(), Some(Command::Stop));
        assert_eq!(Command::parse("pos").unwrap(), Some(Command::Position));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            Command::parse("play  /music/a song.flac ").unwrap(),
            Some(Command::Play("/music/a song.flac".to_string()))
        );
        assert_eq!(
            Command::parse("n file:///tmp/b.mp3").unwrap(),
            Some(Command::Next("file:///tmp/b.mp3".to_string()))
        );
        assert_eq!(Command::parse("sk 12.5").unwrap(), Some(Command::Seek(12.5)));
        assert_eq!(Command::parse("v 40").unwrap(), Some(Command::Volume(0.4)));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(
            Command::parse("seek abc"),
            Err(CommandError::InvalidNumber("abc".to_string()))
        );
        assert_eq!(
            Command::parse("volume inf"),
            Err(CommandError::InvalidNumber("inf".to_string()))
        );
        assert_eq!(Command::parse("play"), Err(CommandError::MissingArgument("play")));
        assert_eq!(
            Command::parse("rewind"),
            Err(CommandError::Unknown("rewind".to_string()))
        );
    }
}
