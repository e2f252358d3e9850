//! Terminal rendering of session events

use std::io::Write;

use crate::progress::Progress;
use crate::session::SessionEvent;
use crate::status::{DownloadOffer, StatusMessage};

const BAR_WIDTH: usize = 30;

/// Boxed block that brings a fresh download link to the user's attention
pub fn offer_block(offer: &DownloadOffer) -> String {
    let lines = [
        offer.heading().to_string(),
        format!("{}: {}", offer.button_label(), offer.url),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = format!("+{}+", "-".repeat(width + 2));

    let mut block = String::new();
    block.push_str(&rule);
    block.push('\n');
    for line in &lines {
        let pad = width - line.chars().count();
        block.push_str(&format!("| {}{} |\n", line, " ".repeat(pad)));
    }
    block.push_str(&rule);
    block
}

pub fn status_line(message: &StatusMessage) -> String {
    message.text().to_string()
}

/// Writes session events to a terminal stream
pub struct TerminalView<W: Write> {
    out: W,
    bar_visible: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            bar_visible: false,
        }
    }

    pub fn render(&mut self, event: &SessionEvent) -> std::io::Result<()> {
        match event {
            SessionEvent::ProgressChanged(progress) => self.render_progress(progress),
            SessionEvent::StatusChanged(message) => {
                self.end_bar()?;
                writeln!(self.out, "{}", status_line(message))
            }
            SessionEvent::LinkRevealed(offer) => {
                self.end_bar()?;
                writeln!(self.out, "{}", offer_block(offer))
            }
        }
    }

    fn render_progress(&mut self, progress: &Progress) -> std::io::Result<()> {
        match progress.render(BAR_WIDTH) {
            Some(bar) => {
                write!(self.out, "\r{}", bar)?;
                self.bar_visible = true;
                self.out.flush()
            }
            None => self.end_bar(),
        }
    }

    fn end_bar(&mut self) -> std::io::Result<()> {
        if self.bar_visible {
            writeln!(self.out)?;
            self.bar_visible = false;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
