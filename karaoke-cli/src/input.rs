//! Keyboard commands read from stdin during playback.

use karaoke_core::SessionCommand;

pub const HELP: &str = "\
Commands:
  p           play / pause
  + / -       nudge lyrics later / earlier
  t           tap-to-sync: the first line starts now
  o <secs>    set offset
  r           reset offset
  s <line>    jump to lyric line (numbered as displayed)
  l / d       like / dislike the current video
  v <ratio>   report visible fraction of the player (0.0 - 1.0)
  h           help
  q           quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(SessionCommand),
    Help,
    Quit,
    Invalid(String),
}

/// Parse one line of user input.
pub fn parse(line: &str, nudge_step: f64) -> Input {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Input::Command(SessionCommand::TogglePlay);
    };
    let arg = parts.next();

    match (verb, arg) {
        ("p", None) => Input::Command(SessionCommand::TogglePlay),
        ("+", None) => Input::Command(SessionCommand::NudgeOffset(nudge_step)),
        ("-", None) => Input::Command(SessionCommand::NudgeOffset(-nudge_step)),
        ("t", None) => Input::Command(SessionCommand::TapToSync),
        ("r", None) => Input::Command(SessionCommand::ResetOffset),
        ("l", None) => Input::Command(SessionCommand::LikeCurrent),
        ("d", None) => Input::Command(SessionCommand::DislikeCurrent),
        ("o", Some(value)) => match value.parse::<f64>() {
            Ok(offset) if offset.is_finite() => Input::Command(SessionCommand::SetOffset(offset)),
            _ => Input::Invalid(format!("not an offset: {value}")),
        },
        ("s", Some(value)) => match value.parse::<usize>() {
            Ok(number) if number > 0 => Input::Command(SessionCommand::SeekToLine(number - 1)),
            _ => Input::Invalid(format!("not a line number: {value}")),
        },
        ("v", Some(value)) => match value.parse::<f64>() {
            Ok(ratio) if (0.0..=1.0).contains(&ratio) => {
                Input::Command(SessionCommand::PlayerViewport {
                    intersection_ratio: ratio,
                })
            }
            _ => Input::Invalid(format!("not a ratio: {value}")),
        },
        ("h" | "?", None) => Input::Help,
        ("q", None) => Input::Quit,
        _ => Input::Invalid(line.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("", 0.1), Input::Command(SessionCommand::TogglePlay));
        assert_eq!(parse(" p ", 0.1), Input::Command(SessionCommand::TogglePlay));
        assert_eq!(parse("+", 0.1), Input::Command(SessionCommand::NudgeOffset(0.1)));
        assert_eq!(parse("-", 0.25), Input::Command(SessionCommand::NudgeOffset(-0.25)));
        assert_eq!(parse("t", 0.1), Input::Command(SessionCommand::TapToSync));
        assert_eq!(parse("d", 0.1), Input::Command(SessionCommand::DislikeCurrent));
        assert_eq!(parse("q", 0.1), Input::Quit);
        assert_eq!(parse("?", 0.1), Input::Help);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(parse("o -1.5", 0.1), Input::Command(SessionCommand::SetOffset(-1.5)));
        assert_eq!(parse("s 3", 0.1), Input::Command(SessionCommand::SeekToLine(2)));
        assert_eq!(
            parse("v 0.05", 0.1),
            Input::Command(SessionCommand::PlayerViewport {
                intersection_ratio: 0.05
            })
        );
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(parse("s 0", 0.1), Input::Invalid(_)));
        assert!(matches!(parse("o abc", 0.1), Input::Invalid(_)));
        assert!(matches!(parse("o inf", 0.1), Input::Invalid(_)));
        assert!(matches!(parse("v 2", 0.1), Input::Invalid(_)));
        assert!(matches!(parse("p now", 0.1), Input::Invalid(_)));
        assert_eq!(parse("jump", 0.1), Input::Invalid("jump".into()));
    }
}
