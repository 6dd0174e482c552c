use colored::{ColoredString, Colorize};
use std::io::Write;

use crate::utils::format_hms;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Colors used for the human-readable status lines.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub info: Rgb,
    pub warning: Rgb,
    pub error: Rgb,
    pub success: Rgb,
    pub text: Rgb,
    pub background: Rgb,
    pub purple: Rgb,
    pub cyan: Rgb,
    pub pink: Rgb,
    pub orange: Rgb,
    pub gray: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: Rgb(0x00, 0xff, 0x00),
            secondary: Rgb(0xff, 0xff, 0x00),
            info: Rgb(0x34, 0x98, 0xdb),
            warning: Rgb(0xf3, 0x9c, 0x12),
            error: Rgb(0xe7, 0x4c, 0x3c),
            success: Rgb(0x2e, 0xcc, 0x71),
            text: Rgb(0xff, 0xff, 0xff),
            background: Rgb(0x1a, 0x1a, 0x1a),
            purple: Rgb(0x9b, 0x59, 0xb6),
            cyan: Rgb(0x00, 0xff, 0xff),
            pink: Rgb(0xff, 0x69, 0xb4),
            orange: Rgb(0xff, 0x8c, 0x00),
            gray: Rgb(0x80, 0x80, 0x80),
        }
    }
}

/// Prints colorized status lines to stdout. Not a stable, machine-readable interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    palette: Palette,
}

impl Console {
    fn paint(&self, msg: &str, color: Rgb) -> ColoredString {
        msg.truecolor(color.0, color.1, color.2)
    }

    /// ` LABEL ` on a dark background followed by a colored value.
    pub fn badge(&self, label: &str, value: &str, color: Rgb) -> String {
        let bg = self.palette.background;
        let fg = self.palette.text;
        format!(
            "{} {}",
            format!(" {} ", label)
                .on_truecolor(bg.0, bg.1, bg.2)
                .truecolor(fg.0, fg.1, fg.2),
            self.paint(value, color)
        )
    }

    pub fn success(&self, msg: &str) {
        println!("{}", self.paint(msg, self.palette.success));
    }

    pub fn warning(&self, msg: &str) {
        println!("{}", self.paint(msg, self.palette.warning));
    }

    pub fn error(&self, msg: &str) {
        println!("{}", self.paint(msg, self.palette.error));
    }

    pub fn notice(&self, msg: &str) {
        println!("{}", self.paint(msg, self.palette.orange));
    }

    pub fn info(&self, msg: &str) {
        println!("{}", self.paint(msg, self.palette.info));
    }

    pub fn account_banner(&self, masked_address: &str) {
        let banner = format!("\n========== [ {} ] ==========", masked_address);
        println!("{}", self.paint(&banner, self.palette.cyan));
    }

    pub fn accounts_badge(&self, count: usize) {
        println!("{}", self.badge("ACCOUNTS", &count.to_string(), self.palette.cyan));
    }

    pub fn profile_line(&self, points: f64, credits: f64) -> String {
        format!(
            "{} {} {} {}",
            self.badge("USER", "PROFILE", self.palette.purple),
            self.paint(&format!("Points: {} XP", points), self.palette.info),
            self.paint("|", self.palette.gray),
            self.paint(&format!("Credits: {} $NITRO", credits), self.palette.secondary),
        )
    }

    pub fn separator(&self) {
        let line = "─".repeat(72);
        println!("{}", self.paint(&line, self.palette.purple));
    }

    pub fn countdown_line(&self, remaining_secs: u64) -> String {
        format!(
            "{}{}{}{}",
            self.paint("[WAIT] ", self.palette.cyan),
            self.paint(&format_hms(remaining_secs), self.palette.info),
            self.paint("  |  ", self.palette.gray),
            self.paint("All accounts processed...", self.palette.text),
        )
    }

    /// Rewrites the countdown in place.
    pub fn countdown(&self, remaining_secs: u64) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\r{}", self.countdown_line(remaining_secs));
        let _ = stdout.flush();
    }

    pub fn end_countdown(&self) {
        println!();
    }

    pub fn menu(&self) {
        let bg = self.palette.background;
        let fg = self.palette.text;
        println!(
            "{}",
            "\n=== Nitro Graph Auto Bot ==="
                .on_truecolor(bg.0, bg.1, bg.2)
                .truecolor(fg.0, fg.1, fg.2)
        );
        println!("{}", self.paint("1) Start", self.palette.primary));
        println!("{}", self.paint("2) Exit", self.palette.pink));
    }

    pub fn prompt(&self, question: &str) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", self.paint(question, self.palette.secondary));
        let _ = stdout.flush();
    }
}
