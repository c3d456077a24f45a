use std::io::{self, BufRead, Write};

use anyhow::Result;
use is_terminal::IsTerminal;

use crate::select::{Selection, SelectionDialog};

const MAX_LISTED: usize = 20;

pub trait Ui {
    /// Runs `dialog` until the user picks an entry or dismisses it.
    fn select(&mut self, dialog: &mut SelectionDialog) -> Result<Selection>;

    fn confirm(&mut self, message: &str) -> Result<bool>;

    fn notice(&mut self, message: &str);

    fn progress(&mut self, message: &str);

    fn clear_progress(&mut self);
}

pub struct TerminalUi {
    auto_confirm: bool,
    show_progress: bool,
    progress_shown: bool,
}

impl TerminalUi {
    pub fn new(auto_confirm: bool) -> Self {
        Self {
            auto_confirm,
            show_progress: io::stderr().is_terminal(),
            progress_shown: false,
        }
    }

    fn read_line(&self) -> Result<Option<String>> {
        let mut input = String::new();
        let read = io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }
}

impl Ui for TerminalUi {
    fn select(&mut self, dialog: &mut SelectionDialog) -> Result<Selection> {
        let mut query = String::new();
        loop {
            let suggestions = dialog.suggestions(&query);
            println!("{}", dialog.title());
            if suggestions.is_empty() {
                println!("  (no matches)");
            }
            for (idx, suggestion) in suggestions.iter().take(MAX_LISTED).enumerate() {
                println!("  {:>2}. {}", idx + 1, suggestion.text);
            }
            if suggestions.len() > MAX_LISTED {
                println!("  ... {} more, type to narrow", suggestions.len() - MAX_LISTED);
            }
            print_prompt("Type to filter, a number to choose, or enter to cancel: ")?;

            let Some(input) = self.read_line()? else {
                return Ok(Selection::Cancelled);
            };
            if input.is_empty() {
                return Ok(Selection::Cancelled);
            }
            if let Ok(number) = input.parse::<usize>() {
                if let Some(suggestion) = suggestions.get(number.wrapping_sub(1)) {
                    if number <= MAX_LISTED {
                        return Ok(Selection::Chosen(dialog.choose(&suggestion.text)));
                    }
                }
            }
            query = input;
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        if self.auto_confirm {
            return Ok(true);
        }
        loop {
            print_prompt(&format!("{message} [y]es/[n]o: "))?;
            let Some(input) = self.read_line()? else {
                return Ok(false);
            };
            match input.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" | "" => return Ok(false),
                _ => println!("Please enter y or n."),
            }
        }
    }

    fn notice(&mut self, message: &str) {
        self.clear_progress();
        println!("{message}");
    }

    fn progress(&mut self, message: &str) {
        if !self.show_progress {
            return;
        }
        eprint!("\r{message}\x1b[K");
        let _ = io::stderr().flush();
        self.progress_shown = true;
    }

    fn clear_progress(&mut self) {
        if self.progress_shown {
            eprint!("\r\x1b[K");
            let _ = io::stderr().flush();
            self.progress_shown = false;
        }
    }
}

fn print_prompt(message: &str) -> Result<()> {
    print!("{message}");
    io::stdout().flush()?;
    Ok(())
}
