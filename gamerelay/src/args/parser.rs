use std::{fmt, path::PathBuf};

use super::{parse_listen_spec_arg, parse_timeout_arg, ArgumentsRequest, ListenSpecErrorType, StartupArguments, TimeoutErrorType};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgumentsError {
    UnknownArgument(String),
    Listen(ListenSpecErrorType),
    Timeout(TimeoutErrorType),
    MissingSaveFilesDir(String),
    DuplicatePort(u16),
    MissingListeners,
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
            Self::Listen(listen_error) => listen_error.fmt(f),
            Self::Timeout(timeout_error) => timeout_error.fmt(f),
            Self::MissingSaveFilesDir(arg) => write!(f, "Expected a directory after {arg}"),
            Self::DuplicatePort(port) => write!(f, "Port {port} was specified more than once"),
            Self::MissingListeners => write!(f, "You must specify at least one port to listen on with --listen"),
        }
    }
}

struct StartupArgumentsParser {
    result: StartupArguments,
}

impl StartupArgumentsParser {
    fn new() -> Self {
        Self {
            result: StartupArguments::new(false, false, Vec::new()),
        }
    }

    fn complete(self) -> Result<StartupArguments, ArgumentsError> {
        let listeners = &self.result.listeners;
        if listeners.is_empty() {
            return Err(ArgumentsError::MissingListeners);
        }

        for (i, spec) in listeners.iter().enumerate() {
            if listeners[..i].iter().any(|other| other.port == spec.port) {
                return Err(ArgumentsError::DuplicatePort(spec.port));
            }
        }

        Ok(self.result)
    }
}

fn try_parse_general_argument(result: &mut StartupArgumentsParser, maybe_arg: &mut Option<String>) -> Result<bool, ArgumentsError> {
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("-v") || arg.eq_ignore_ascii_case("--verbose") {
        result.result.verbose = true;
    } else if arg.eq("-s") || arg.eq_ignore_ascii_case("--silent") {
        result.result.silent = true;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

fn try_parse_relay_argument<F>(
    result: &mut StartupArgumentsParser,
    maybe_arg: &mut Option<String>,
    get_next_arg: F,
) -> Result<bool, ArgumentsError>
where
    F: FnOnce() -> Option<String>,
{
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("-l") || arg.eq_ignore_ascii_case("--listen") {
        let spec = parse_listen_spec_arg(arg, get_next_arg()).map_err(ArgumentsError::Listen)?;
        result.result.listeners.push(spec);
    } else if arg.eq("-t") || arg.eq_ignore_ascii_case("--timeout") {
        result.result.session_timeout = parse_timeout_arg(arg, get_next_arg()).map_err(ArgumentsError::Timeout)?;
    } else if arg.eq_ignore_ascii_case("--save-files") {
        match get_next_arg() {
            Some(dir) if !dir.is_empty() => result.result.save_files_dir = Some(PathBuf::from(dir)),
            _ => return Err(ArgumentsError::MissingSaveFilesDir(arg)),
        }
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

pub fn parse_arguments<T>(mut args: T) -> Result<ArgumentsRequest, ArgumentsError>
where
    T: Iterator<Item = String>,
{
    let mut result = StartupArgumentsParser::new();

    // Ignore the first argument, as it's by convention the name of the program
    args.next();

    while let Some(arg) = args.next() {
        if arg.is_empty() {
            continue;
        } else if arg.eq("-h") || arg.eq_ignore_ascii_case("--help") {
            return Ok(ArgumentsRequest::Help);
        } else if arg.eq("-V") || arg.eq_ignore_ascii_case("--version") {
            return Ok(ArgumentsRequest::Version);
        }

        let mut maybe_arg = Some(arg);
        let _ = !try_parse_general_argument(&mut result, &mut maybe_arg)?
            && !try_parse_relay_argument(&mut result, &mut maybe_arg, || args.next())?;

        if let Some(arg) = maybe_arg {
            return Err(ArgumentsError::UnknownArgument(arg));
        }
    }

    let result = result.complete()?;
    Ok(ArgumentsRequest::Run(result))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gamerelay_proto::version::GameVersion;

    use super::*;
    use crate::args::ListenSpec;

    fn parse(args: &[&str]) -> Result<ArgumentsRequest, ArgumentsError> {
        parse_arguments(std::iter::once("relay").chain(args.iter().copied()).map(String::from))
    }

    #[test]
    fn test_help_and_version_win() {
        assert_eq!(parse(&["-v", "--help"]), Ok(ArgumentsRequest::Help));
        assert_eq!(parse(&["-V"]), Ok(ArgumentsRequest::Version));
    }

    #[test]
    fn test_full_run() {
        let request = parse(&["-v", "--listen", "9100:gc", "-t", "60", "--save-files", "caps", "-l", "9200:pc:127.0.0.1:9000"]).unwrap();

        let mut expected = StartupArguments::new(
            true,
            false,
            vec![
                ListenSpec::new(9100, GameVersion::Gc, None),
                ListenSpec::new(9200, GameVersion::Pc, Some("127.0.0.1:9000".parse().unwrap())),
            ],
        );
        expected.session_timeout = Duration::from_secs(60);
        expected.save_files_dir = Some(PathBuf::from("caps"));

        assert_eq!(request, ArgumentsRequest::Run(expected));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(&[]), Err(ArgumentsError::MissingListeners));
        assert_eq!(parse(&["--frobnicate"]), Err(ArgumentsError::UnknownArgument("--frobnicate".to_string())));
        assert_eq!(parse(&["-l", "9100:gc", "-l", "9100:bb"]), Err(ArgumentsError::DuplicatePort(9100)));
        assert_eq!(
            parse(&["-l", "9100:gc", "--save-files"]),
            Err(ArgumentsError::MissingSaveFilesDir("--save-files".to_string()))
        );
    }
}
