// src/confirm.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Yes/no confirmation used by the CLI before destructive or surprising actions.

use std::io::{self, BufRead, Write};

pub trait Confirm {
    /// Ask `prompt`; true only on an explicit yes.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// `y` or `yes`, any case, surrounding whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Prompts on stderr and reads one line from stdin. EOF or a read error count as "no".
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{prompt} [y/N]: ");
        let _ = stderr.flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&line),
        }
    }
}

/// Answers every prompt the same way (`--confirm` on the command line).
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_is_affirmative() {
        for yes in ["y", "Y", "yes", "YES", " Yes\n"] {
            assert!(is_affirmative(yes), "{yes:?}");
        }
        for no in ["", "n", "no", "yep", "ja"] {
            assert!(!is_affirmative(no), "{no:?}");
        }
    }

    #[test]
    fn auto_confirm_is_fixed() {
        assert!(AutoConfirm(true).confirm("go?"));
        assert!(!AutoConfirm(false).confirm("go?"));
    }
}
