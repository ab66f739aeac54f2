//! Interactive prompts for the auth flow
//!
//! Prompts and progress go to stderr. When stdin is not a terminal the
//! email is read as a plain line and the fallback question is answered no.

use std::io::{self, BufRead, IsTerminal};

use byod_auth::UserInteraction;
use dialoguer::{Confirm, Input};

#[derive(Debug, Default)]
pub struct TerminalPrompts;

impl TerminalPrompts {
    pub fn new() -> Self {
        Self
    }
}

fn to_io(err: dialoguer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

impl UserInteraction for TerminalPrompts {
    fn show(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn prompt_email(&self) -> io::Result<String> {
        if !io::stdin().is_terminal() {
            eprintln!("Enter your company email address:");
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"));
            }
            return Ok(line.trim().to_string());
        }

        Input::<String>::new()
            .with_prompt("Company email address")
            .interact_text()
            .map_err(to_io)
    }

    fn confirm_fallback(&self, reason: &str) -> bool {
        eprintln!("{}", reason);
        if !io::stdin().is_terminal() {
            return false;
        }

        Confirm::new()
            .with_prompt("Continue with email validation instead?")
            .default(true)
            .interact()
            .unwrap_or(false)
    }
}
