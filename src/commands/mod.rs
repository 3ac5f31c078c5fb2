// Commands module - handles CLI command execution

use anyhow::Result;

pub mod record;
pub mod upload_events;

pub use record::{ReplaySummary, handle_record, replay};
pub use upload_events::{UploadSettings, handle_upload_events, upload_event_logs};

/// Handle shell completion
pub fn handle_completion(shell_type: &str) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{Shell, generate};

    let shell = match shell_type.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "powershell" => Shell::PowerShell,
        _ => {
            anyhow::bail!(
                "Unsupported shell: {}. Supported: bash, zsh, fish, powershell",
                shell_type
            );
        }
    };

    let mut cmd = crate::cli::Cli::command();
    let name = cmd.get_name().to_string();
    let mut stdout = std::io::stdout();

    generate(shell, &mut cmd, name, &mut stdout);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_rejects_unknown_shell() {
        let err = handle_completion("tcsh").unwrap_err();
        assert!(err.to_string().contains("Unsupported shell"));
    }
}
