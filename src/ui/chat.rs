//! Transcript display with stream-then-commit rendering.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::transcript::{Role, Transcript};

/// Chat screen body: committed transcript, the in-flight response (shown
/// with a cursor glyph until the stream ends), and an optional notice line.
pub struct ChatView<'a> {
    pub transcript: &'a Transcript,
    pub streaming: Option<&'a str>,
    pub notice: Option<&'a str>,
    pub model_label: &'a str,
}

impl Widget for ChatView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" promptpad [{}] ", self.model_label));
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width.saturating_sub(2) as usize;
        let mut lines: Vec<Line> = Vec::new();

        if self.transcript.is_empty() && self.streaming.is_none() {
            lines.push(Line::from(Span::styled(
                "What is up?",
                Style::default().fg(Color::DarkGray),
            )));
        }

        for message in self.transcript.messages() {
            let (label, style) = role_style(message.role);
            lines.push(Line::from(Span::styled(label, style)));
            for text in wrap_text(&message.content, width) {
                lines.push(Line::from(vec![Span::raw("  "), Span::raw(text)]));
            }
            lines.push(Line::from(""));
        }

        if let Some(partial) = self.streaming {
            let (label, style) = role_style(Role::Assistant);
            lines.push(Line::from(Span::styled(label, style)));
            let mut wrapped = wrap_text(partial, width);
            let last = wrapped.pop().unwrap_or_default();
            for text in wrapped {
                lines.push(Line::from(vec![Span::raw("  "), Span::raw(text)]));
            }
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::raw(last),
                Span::styled("▋", Style::default().fg(Color::Yellow)),
            ]));
            lines.push(Line::from(""));
        }

        if let Some(notice) = self.notice {
            for text in notice.lines() {
                lines.push(Line::from(Span::styled(
                    text.to_string(),
                    Style::default().fg(Color::Yellow),
                )));
            }
        }

        // Keep the most recent lines in view.
        let height = inner.height as usize;
        let start = lines.len().saturating_sub(height);
        for (i, line) in lines[start..].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

fn role_style(role: Role) -> (&'static str, Style) {
    match role {
        Role::User => ("you:", Style::default().fg(Color::Blue)),
        Role::Assistant => ("assistant:", Style::default().fg(Color::Green)),
    }
}

/// Word-wrap to the given width; a zero width passes text through.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.len() + word.len() + 1 <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn preserves_explicit_newlines() {
        let lines = wrap_text("one\ntwo three", 20);
        assert_eq!(lines, vec!["one", "two three"]);
    }

    #[test]
    fn zero_width_passes_through() {
        assert_eq!(wrap_text("anything", 0), vec!["anything"]);
    }

    #[test]
    fn empty_text_yields_one_blank_line() {
        assert_eq!(wrap_text("", 10), vec![""]);
    }
}
