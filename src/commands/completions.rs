//! Shell completions command

use clap::CommandFactory;

use crate::cli::CompletionsArgs;
use crate::error::{PackError, Result};

fn parse_shell(name: &str) -> Option<clap_complete::Shell> {
    match name.to_lowercase().as_str() {
        "bash" => Some(clap_complete::Shell::Bash),
        "elvish" => Some(clap_complete::Shell::Elvish),
        "fish" => Some(clap_complete::Shell::Fish),
        "powershell" | "pwsh" => Some(clap_complete::Shell::PowerShell),
        "zsh" => Some(clap_complete::Shell::Zsh),
        _ => None,
    }
}

/// Generate shell completions
pub fn run(args: CompletionsArgs) -> Result<()> {
    let shell = parse_shell(&args.shell).ok_or_else(|| PackError::ConfigInvalid {
        message: format!(
            "Unknown shell: {}. Supported shells: bash, elvish, fish, powershell, zsh",
            args.shell
        ),
    })?;

    let mut cmd = <crate::cli::Cli as CommandFactory>::command();
    clap_complete::generate(shell, &mut cmd, "upack", &mut std::io::stdout().lock());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_known_shells() {
        for shell in ["bash", "elvish", "fish", "powershell", "pwsh", "zsh"] {
            let args = CompletionsArgs {
                shell: shell.to_string(),
            };
            assert!(run(args).is_ok(), "{shell}");
        }
    }

    #[test]
    fn test_completions_mixed_case() {
        assert_eq!(parse_shell("Zsh"), Some(clap_complete::Shell::Zsh));
        assert_eq!(parse_shell("BASH"), Some(clap_complete::Shell::Bash));
    }

    #[test]
    fn test_completions_unknown_shell() {
        let args = CompletionsArgs {
            shell: "tcsh".to_string(),
        };
        assert!(matches!(run(args), Err(PackError::ConfigInvalid { .. })));
    }
}
