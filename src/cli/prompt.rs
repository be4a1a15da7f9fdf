//! Line-oriented operator prompts
//!
//! Blocking prompts for the one-shot commands. The monitor reads its
//! console through the core input router instead.

use std::io::{self, BufRead, Write};
use tunnelwatch_core::error::{TokenError, TunnelError};

/// Prompts on `out` and reads answers from `input`
///
/// Secrets are read from the controlling terminal with echo off when the
/// prompter is bound to the process terminal, and from `input` otherwise.
pub struct Prompter<R, W> {
    input: R,
    out: W,
    hide_secrets: bool,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompter bound to the process terminal
    pub fn stdio() -> Self {
        Self {
            input: io::stdin().lock(),
            out: io::stdout(),
            hide_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self {
            input,
            out,
            hide_secrets: false,
        }
    }

    /// Writer for regular output lines
    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.out)
    }

    /// Show `prompt` and read one line, without its terminator
    ///
    /// End of input fails with `TokenError::InputClosed`.
    pub fn line(&mut self, prompt: &str) -> Result<String, TunnelError> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;

        let mut input = String::new();
        if self.input.read_line(&mut input)? == 0 {
            writeln!(self.out)?;
            return Err(TokenError::InputClosed.into());
        }

        Ok(input.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    /// Show `prompt` and read one secret line without echoing it
    pub fn secret(&mut self, prompt: &str) -> Result<String, TunnelError> {
        if !self.hide_secrets {
            return self.line(prompt);
        }

        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        Ok(rpassword::read_password()?)
    }

    /// Prompt for a secret until a non-blank value is entered
    pub fn required_secret(&mut self, prompt: &str) -> Result<String, TunnelError> {
        let prompt_text = format!("{}: ", prompt);
        loop {
            let input = self.secret(&prompt_text)?;
            if input.trim().is_empty() {
                writeln!(self.out, "❌ This field is required. Please enter a value.")?;
                continue;
            }
            return Ok(input);
        }
    }

    /// Prompt for yes/no with default
    pub fn yes_no(&mut self, prompt: &str, default_yes: bool) -> Result<bool, TunnelError> {
        let default_indicator = if default_yes { "[Y/n]" } else { "[y/N]" };
        let prompt_text = format!("{} {}: ", prompt, default_indicator);

        loop {
            let input = self.line(&prompt_text)?.trim().to_lowercase();

            match input.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                "" => return Ok(default_yes),
                _ => {
                    writeln!(self.out, "Please enter 'y' for yes or 'n' for no.")?;
                    continue;
                }
            }
        }
    }
}
