// Command abbreviation matching for the kboard CLI

/// Find all commands that start with the given prefix (case-insensitive)
pub fn find_matching_commands<'a>(prefix: &str, commands: &'a [&str]) -> Vec<&'a str> {
    let prefix_lower = prefix.to_lowercase();
    commands.iter()
        .filter(|cmd| cmd.to_lowercase().starts_with(&prefix_lower))
        .copied()
        .collect()
}

/// Find a unique command match for the given prefix
/// Exact matches take precedence over prefix matches
pub fn find_unique_command<'a>(prefix: &str, commands: &'a [&str]) -> Result<&'a str, Vec<&'a str>> {
    let prefix_lower = prefix.to_lowercase();
    if let Some(cmd) = commands.iter().find(|cmd| cmd.to_lowercase() == prefix_lower) {
        return Ok(*cmd);
    }

    let matches = find_matching_commands(prefix, commands);
    if matches.len() == 1 {
        Ok(matches[0])
    } else {
        Err(matches)
    }
}

pub const TOP_LEVEL_COMMANDS: &[&str] = &[
    "displays", "select", "forget", "board", "tally", "advance", "reset",
    "watch", "stages", "admin", "help",
];

pub const ADMIN_COMMANDS: &[&str] = &[
    "stage", "source", "category", "product", "display", "remove-display",
    "order", "order-state",
];

/// Expand abbreviated command and admin subcommand names.
///
/// Anything that is not a unique prefix is passed through for clap to report.
pub fn expand_command_abbreviations(args: Vec<String>) -> Result<Vec<String>, String> {
    let mut expanded = args;

    let Some(first) = expanded.first() else {
        return Ok(expanded);
    };
    if first.starts_with('-') {
        return Ok(expanded);
    }

    let command = match find_unique_command(first, TOP_LEVEL_COMMANDS) {
        Ok(cmd) => cmd,
        Err(matches) if matches.is_empty() => return Ok(expanded),
        Err(matches) => {
            return Err(format!(
                "Ambiguous command '{}'. Did you mean one of: {}?",
                first,
                matches.join(", ")
            ));
        }
    };
    expanded[0] = command.to_string();

    if command == "admin" {
        if let Some(sub) = expanded.get(1).filter(|s| !s.starts_with('-')) {
            match find_unique_command(sub, ADMIN_COMMANDS) {
                Ok(full) => expanded[1] = full.to_string(),
                Err(matches) if matches.is_empty() => {}
                Err(matches) => {
                    return Err(format!(
                        "Ambiguous subcommand '{}'. Did you mean one of: {}?",
                        sub,
                        matches.join(", ")
                    ));
                }
            }
        }
    }

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unique_prefix() {
        assert_eq!(find_unique_command("disp", TOP_LEVEL_COMMANDS), Ok("displays"));
        assert_eq!(find_unique_command("w", TOP_LEVEL_COMMANDS), Ok("watch"));
        assert_eq!(find_unique_command("BOARD", TOP_LEVEL_COMMANDS), Ok("board"));
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = find_unique_command("s", TOP_LEVEL_COMMANDS).unwrap_err();
        assert_eq!(err, vec!["select", "stages"]);
        assert!(expand_command_abbreviations(args(&["s"])).is_err());
        assert!(expand_command_abbreviations(args(&["admin", "s"])).is_err());
    }

    #[test]
    fn test_expand() {
        assert_eq!(
            expand_command_abbreviations(args(&["adv", "3", "7"])).unwrap(),
            args(&["advance", "3", "7"])
        );
        assert_eq!(
            expand_command_abbreviations(args(&["adm", "prod", "Soup"])).unwrap(),
            args(&["admin", "product", "Soup"])
        );
        // Unknown names are left for clap
        assert_eq!(
            expand_command_abbreviations(args(&["bogus"])).unwrap(),
            args(&["bogus"])
        );
        assert_eq!(
            expand_command_abbreviations(args(&["--version"])).unwrap(),
            args(&["--version"])
        );
    }
}
