//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Foodie CLI.

use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Foodie banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                r#"
   {}
   {}
   {}
   {}
"#,
                " ___                 _   _       ".bright_yellow().bold(),
                "| __|  ___   ___   __| | (_)  ___ ".bright_yellow().bold(),
                "| _|  / _ \\ / _ \\ / _` | | | / -_)".yellow().bold(),
                "|_|   \\___/ \\___/ \\__,_| |_| \\___|".red().bold(),
            );
            println!(
                "   {} {}\n",
                "Customer-Service Chat Server".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                r#"
 ___                 _   _
| __|  ___   ___   __| | (_)  ___
| _|  / _ \ / _ \ / _` | | | / -_)
|_|   \___/ \___/ \__,_| |_| \___|

   Customer-Service Chat Server v{}
"#,
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file change line (`新增: a.txt`)
    pub fn change(&self, change: &str) {
        if self.colored {
            println!("    {} {}", "±".yellow(), change);
        } else {
            println!("    * {}", change);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print the question prompt without a trailing newline
    pub fn prompt(&self, label: &str) {
        if self.colored {
            print!("\n{} ", label.bright_cyan().bold());
        } else {
            print!("\n{} ", label);
        }
        io::stdout().flush().ok();
    }

    /// Print an answer block
    pub fn answer(&self, text: &str) {
        if self.colored {
            println!("{} {}", "[答案]".green().bold(), text);
        } else {
            println!("[答案] {}", text);
        }
    }

    /// Print a plain block of text (configuration dumps)
    pub fn raw(&self, text: &str) {
        println!("{}", text);
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_new() {
        let output = Output::new();
        assert!(output.colored);
    }

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
    }

    #[test]
    fn test_output_default() {
        let output = Output::default();
        assert!(output.colored);
    }

    #[test]
    fn test_output_methods_no_panic() {
        let output = Output::no_color();

        output.banner();
        output.success("test success");
        output.info("test info");
        output.warning("test warning");
        output.error("test error");
        output.change("新增: a.txt");
        output.header("Test Header");
        output.kv("key", "value");
        output.hint("hint message");
        output.command("some command");
        output.prompt("問題>");
        output.answer("七天內可退貨");
        output.raw("[server]");
        output.newline();
    }

    #[test]
    fn test_output_methods_colored_no_panic() {
        let output = Output::new();

        output.banner();
        output.success("test success");
        output.info("test info");
        output.warning("test warning");
        output.error("test error");
        output.change("修改: b.md");
        output.header("Test Header");
        output.kv("key", "value");
        output.hint("hint message");
        output.command("some command");
        output.prompt("問題>");
        output.answer("七天內可退貨");
        output.newline();
    }
}
