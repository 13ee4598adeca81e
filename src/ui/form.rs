//! Configuration form screen: the four free-text fields plus the model
//! selector.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::form::FormFields;
use crate::models;

/// Which form element has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFocus {
    Data,
    SystemPrompt,
    Persona,
    History,
    Model,
}

impl FormFocus {
    fn next(self) -> Self {
        match self {
            FormFocus::Data => FormFocus::SystemPrompt,
            FormFocus::SystemPrompt => FormFocus::Persona,
            FormFocus::Persona => FormFocus::History,
            FormFocus::History => FormFocus::Model,
            FormFocus::Model => FormFocus::Data,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormFocus::Data => FormFocus::Model,
            FormFocus::SystemPrompt => FormFocus::Data,
            FormFocus::Persona => FormFocus::SystemPrompt,
            FormFocus::History => FormFocus::Persona,
            FormFocus::Model => FormFocus::History,
        }
    }

    fn title(self) -> &'static str {
        match self {
            FormFocus::Data => "Data",
            FormFocus::SystemPrompt => "System Prompt",
            FormFocus::Persona => "Customer Persona",
            FormFocus::History => "Previous Conversation",
            FormFocus::Model => "Model",
        }
    }
}

/// Result of a key press on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Close,
}

/// Form state: field contents plus focus and the selected model.
pub struct FormScreen {
    pub fields: FormFields,
    focus: FormFocus,
    model_index: usize,
}

impl FormScreen {
    pub fn new(fields: FormFields, model_label: &str) -> Self {
        let model_index = models::labels()
            .iter()
            .position(|label| *label == model_label)
            .unwrap_or(0);
        Self {
            fields,
            focus: FormFocus::Data,
            model_index,
        }
    }

    /// Currently selected model label.
    pub fn model_label(&self) -> &'static str {
        let labels = models::labels();
        labels[self.model_index.min(labels.len() - 1)]
    }

    /// Sync the selector to a label chosen elsewhere (e.g. `/model`).
    pub fn set_model_label(&mut self, label: &str) {
        if let Some(index) = models::labels().iter().position(|l| *l == label) {
            self.model_index = index;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        if key.kind != KeyEventKind::Press {
            return FormAction::None;
        }

        match key.code {
            KeyCode::Esc => return FormAction::Close,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::Left if self.focus == FormFocus::Model => {
                let len = models::labels().len();
                self.model_index = (self.model_index + len - 1) % len;
            }
            KeyCode::Right if self.focus == FormFocus::Model => {
                self.model_index = (self.model_index + 1) % models::labels().len();
            }
            KeyCode::Enter if self.focus == FormFocus::Model => return FormAction::Close,
            KeyCode::Enter => {
                if let Some(field) = self.active_field_mut() {
                    field.push('\n');
                }
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.active_field_mut() {
                    field.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = self.active_field_mut() {
                    field.pop();
                }
            }
            _ => {}
        }

        FormAction::None
    }

    fn active_field_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormFocus::Data => Some(&mut self.fields.data_context),
            FormFocus::SystemPrompt => Some(&mut self.fields.system_prompt),
            FormFocus::Persona => Some(&mut self.fields.persona),
            FormFocus::History => Some(&mut self.fields.history_seed),
            FormFocus::Model => None,
        }
    }

    fn field_block(&self, focus: FormFocus) -> Block<'static> {
        let style = if self.focus == focus {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Gray)
        };
        Block::default()
            .borders(Borders::ALL)
            .title(focus.title())
            .style(style)
    }
}

impl Widget for &FormScreen {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Min(3),
                Constraint::Min(3),
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);

        let fields = [
            (FormFocus::Data, self.fields.data_context.as_str()),
            (FormFocus::SystemPrompt, self.fields.system_prompt.as_str()),
            (FormFocus::Persona, self.fields.persona.as_str()),
            (FormFocus::History, self.fields.history_seed.as_str()),
        ];
        for (i, (focus, content)) in fields.iter().enumerate() {
            Paragraph::new(content.to_string())
                .wrap(Wrap { trim: false })
                .block(self.field_block(*focus))
                .render(rows[i], buf);
        }

        let model_line = Line::from(vec![
            Span::raw("◀ "),
            Span::styled(
                self.model_label(),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw(" ▶"),
        ]);
        Paragraph::new(model_line)
            .block(self.field_block(FormFocus::Model))
            .render(rows[4], buf);

        let hint = Line::from(Span::styled(
            "Tab/Shift+Tab switch field · ◀ ▶ change model · Esc back to chat",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(hint).render(rows[5], buf);
    }
}
