//! Completions command - shell completion scripts for `s3mirror`
//!
//! The script is generated from the clap command tree, so it always matches
//! the installed binary. It is written to stdout:
//!
//! ```text
//! s3mirror completions zsh > ~/.zfunc/_s3mirror
//! ```

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub async fn execute(&self, _format: OutputFormat, _config_path: &Path) -> Result<()> {
        write_completions(self.shell, &mut io::stdout());
        Ok(())
    }
}

fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = crate::Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_names_binary_and_subcommands() {
        let mut out = Vec::new();
        write_completions(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();

        assert!(script.contains("s3mirror"));
        for sub in ["config", "key", "check", "run", "completions"] {
            assert!(script.contains(sub), "missing subcommand {sub}");
        }
    }
}
