/*!
 * Command Line Tokenizer
 * Splits a command string into argv tokens with shell-like quoting rules
 */

use crate::core::errors::{LaunchError, Result};
use log::error;

/// Split `command_line` into argument tokens the way a shell would,
/// prepending `app_name` as argv[0] by convention.
///
/// Single quotes copy everything literally until the matching quote;
/// double quotes allow backslash-escaping of the following character;
/// adjacent quoted and unquoted fragments concatenate into one token
/// (`'foo''bar'` is the single token `foobar`); an explicitly quoted
/// empty string still yields a token. Whitespace outside quotes is
/// insignificant.
///
/// Fails with [`LaunchError::MalformedInput`] on an unterminated quote or
/// a dangling escape, producing no partial token list.
pub fn tokenize(app_name: &str, command_line: &str) -> Result<Vec<String>> {
    let mut argv = vec![app_name.to_string()];

    if command_line.is_empty() {
        return Ok(argv);
    }

    let mut arg = String::new();
    // a closed quote pair marks an argument even when it stays empty
    let mut have_arg = false;
    let mut squot = false;
    let mut dquot = false;

    let mut chars = command_line.chars();
    while let Some(c) = chars.next() {
        if !dquot && !squot && (c == ' ' || c == '\t') {
            if !arg.is_empty() || have_arg {
                argv.push(std::mem::take(&mut arg));
            }
            have_arg = false;
        } else if !dquot && !squot && c == '"' {
            dquot = true;
            have_arg = true;
        } else if !dquot && !squot && c == '\'' {
            squot = true;
            have_arg = true;
        } else if dquot && c == '"' {
            dquot = false;
        } else if squot && c == '\'' {
            squot = false;
        } else if squot {
            arg.push(c);
        } else if dquot {
            if c == '\\' {
                match chars.next() {
                    Some(escaped) => arg.push(escaped),
                    None => {
                        error!("Malformed command line: {}", command_line);
                        return Err(LaunchError::MalformedInput(format!(
                            "unterminated escape in: {}",
                            command_line
                        )));
                    }
                }
            } else {
                arg.push(c);
            }
        } else {
            arg.push(c);
        }
    }

    if squot || dquot {
        error!("Malformed command line: {}", command_line);
        return Err(LaunchError::MalformedInput(format!(
            "unterminated quote in: {}",
            command_line
        )));
    }

    if !arg.is_empty() || have_arg {
        argv.push(arg);
    }

    Ok(argv)
}
