//! External command execution for command-line collaborators (TTS engines,
//! ffmpeg, upload tools).

use std::process::{Output, Stdio};

use factreel_core::domain::ProviderError;
use factreel_core::providers::ProviderResult;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// Lines of stderr kept when a command fails.
const STDERR_TAIL_LINES: usize = 20;

/// A program plus argument template. `{name}` placeholders in the arguments
/// are replaced by [`CommandSpec::expand`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Substitute placeholders. Each argument stays a single argv entry, so
    /// values are never re-split by a shell. Substituted values are copied
    /// verbatim; braces inside them are not expanded again.
    pub fn expand(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args.iter().map(|arg| expand_template(arg, vars)).collect()
    }
}

/// One left-to-right pass over `template`. Unknown `{name}` tokens and
/// unmatched braces are kept as written.
fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Run `program` to completion, capturing stdout and stderr.
///
/// A program that cannot be started is a permanent failure; the caller
/// decides what a non-zero exit means.
pub async fn run(program: &str, args: &[String]) -> ProviderResult<Output> {
    debug!(program = %program, args = ?args, "running command");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProviderError::permanent(format!("failed to start {program}: {e}")))
}

/// Run and require a zero exit status.
pub async fn run_checked(program: &str, args: &[String]) -> ProviderResult<Output> {
    let output = run(program, args).await?;
    if !output.status.success() {
        return Err(ProviderError::permanent(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr_tail(&output.stderr)
        )));
    }
    Ok(output)
}

/// Check that `program` starts and answers `version_flag`.
pub async fn probe(program: &str, version_flag: &str) -> ProviderResult<()> {
    run_checked(program, &[version_flag.to_string()]).await.map(|_| ())
}

/// The last few lines of a command's stderr.
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
