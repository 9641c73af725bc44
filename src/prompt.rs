//! Interactive terminal prompts. Input and output are passed in so the menu
//! logic runs against in-memory buffers in tests.

use crate::error::PeriodError;
use crate::period::{DateWindow, PeriodChoice, parse_choice};
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};
use tracing::debug;

const RULE_WIDTH: usize = 60;

/// Prints `prompt` and reads one trimmed line; `None` once input is exhausted.
pub fn read_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub fn clear_screen() {
    if let Err(e) = clearscreen::clear() {
        debug!(error = %e, "could not clear terminal");
    }
}

pub fn banner<W: Write>(output: &mut W, title: &str) -> io::Result<()> {
    writeln!(output, "\n{}", "=".repeat(RULE_WIDTH))?;
    writeln!(output, "{title}")?;
    writeln!(output, "{}", "=".repeat(RULE_WIDTH))
}

pub fn show_period_menu<W: Write>(output: &mut W) -> io::Result<()> {
    banner(output, "📊 CRYPTO RETURNS ANALYSIS")?;
    writeln!(output, "\n📅 Select the analysis period:\n")?;
    for (i, choice) in PeriodChoice::MENU.iter().enumerate() {
        writeln!(output, "{}.  {}", i + 1, choice.menu_text())?;
    }
    writeln!(output, "\n❌ Q - Quit")?;
    writeln!(output, "{}", "-".repeat(RULE_WIDTH))
}

/// Re-prompts until a valid window is chosen. `Ok(None)` means quit.
///
/// `earliest` is the first stored day across all histories, used by "All Time".
pub fn select_period<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    today: NaiveDate,
    earliest: Option<NaiveDate>,
) -> io::Result<Option<DateWindow>> {
    show_period_menu(output)?;

    let window = loop {
        let Some(raw) = read_line(input, output, "\n➡️  Choose an option (1-9 or Q): ")? else {
            return Ok(None);
        };

        let choice = match parse_choice(&raw) {
            Ok(choice) => choice,
            Err(e) => {
                writeln!(output, "❌ {e}")?;
                continue;
            }
        };

        let resolved = match choice {
            PeriodChoice::Quit => return Ok(None),
            PeriodChoice::AllTime => DateWindow::all_time(earliest, today),
            PeriodChoice::Custom => {
                writeln!(output, "\nEnter the custom dates:")?;
                let Some(start) = read_line(input, output, "Start date (YYYY-MM-DD): ")? else {
                    return Ok(None);
                };
                let Some(end) = read_line(input, output, "End date (YYYY-MM-DD): ")? else {
                    return Ok(None);
                };
                DateWindow::custom(&start, &end)
            }
            relative => DateWindow::relative(relative, today)
                .ok_or_else(|| PeriodError::InvalidChoice(raw.clone())),
        };

        match resolved {
            Ok(window) => break window,
            Err(e) => writeln!(output, "❌ {e}")?,
        }
    };

    writeln!(output, "\n✅ Selected period: {}", window.label)?;
    writeln!(output, "📅 From {} to {}", window.start, window.end)?;
    Ok(Some(window))
}

/// Maps a 1-based menu entry to an index into a list of `len` items.
pub fn select_index(raw: &str, len: usize) -> Result<usize, PeriodError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
        .ok_or_else(|| PeriodError::InvalidSelection(raw.trim().to_string()))
}

pub fn wait_for_enter<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<()> {
    read_line(input, output, prompt).map(|_| ())
}
