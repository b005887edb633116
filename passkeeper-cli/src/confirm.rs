use std::io::{self, BufRead, Write};

use passkeeper_core::{BiometricAuthenticator, BiometricPrompt, PassKeeperError, PassKeeperResult};

/// Stands in for the device biometric prompt: asks for a typed `y` on the
/// terminal. With `--yes` it reports no biometric capability, so reveals are
/// approved without asking.
pub struct TerminalConfirmation {
    interactive: bool,
}

impl TerminalConfirmation {
    pub const fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

fn answer_is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait::async_trait]
impl BiometricAuthenticator for TerminalConfirmation {
    async fn has_hardware(&self) -> PassKeeperResult<bool> {
        Ok(self.interactive)
    }

    async fn is_enrolled(&self) -> PassKeeperResult<bool> {
        Ok(self.interactive)
    }

    async fn authenticate(&self, prompt: BiometricPrompt) -> PassKeeperResult<bool> {
        let mut stderr = io::stderr().lock();
        write!(
            stderr,
            "{} [y/N, {}] ",
            prompt.prompt_message, prompt.cancel_label
        )
        .and_then(|()| stderr.flush())
        .map_err(|err| PassKeeperError::Unexpected {
            error: err.to_string(),
        })?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|err| PassKeeperError::Unexpected {
                error: err.to_string(),
            })?;
        Ok(answer_is_yes(&answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(answer_is_yes("y\n"));
        assert!(answer_is_yes(" YES "));
        assert!(!answer_is_yes("\n"));
        assert!(!answer_is_yes("nope"));
    }

    #[tokio::test]
    async fn test_non_interactive_reports_no_capability() {
        let confirmation = TerminalConfirmation::new(false);
        assert!(!confirmation.has_hardware().await.unwrap());
        assert!(!confirmation.is_enrolled().await.unwrap());
    }
}
