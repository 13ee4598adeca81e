use serde::{Deserialize, Serialize};

/// Free-text configuration collected by the form.
///
/// All fields are unconstrained; an empty field simply contributes an empty
/// segment to the instruction block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFields {
    /// Data for the model to understand, and how to use it.
    pub data_context: String,
    /// Instructions describing the model's role.
    pub system_prompt: String,
    /// Instructions about the customer the model is responding to.
    pub persona: String,
    /// Historical conversations, real or mocked up, given as examples.
    pub history_seed: String,
}

impl Default for FormFields {
    fn default() -> Self {
        Self {
            data_context: "The data for the LLM to understand as well as how to use it"
                .to_string(),
            system_prompt: "Any instructions to the LLM to describe its role".to_string(),
            persona: "Any instructions about the customer the LLM would be responding to"
                .to_string(),
            history_seed:
                "Insert any historical conversations real or mock up to give the LLM examples"
                    .to_string(),
        }
    }
}

impl FormFields {
    /// Starts with every field blank instead of the placeholder text.
    #[allow(dead_code)]
    pub fn empty() -> Self {
        Self {
            data_context: String::new(),
            system_prompt: String::new(),
            persona: String::new(),
            history_seed: String::new(),
        }
    }

    /// Newline-joined concatenation in fixed order: data context, system
    /// prompt, persona, history seed.
    pub fn instruction_block(&self) -> String {
        [
            self.data_context.as_str(),
            self.system_prompt.as_str(),
            self.persona.as_str(),
            self.history_seed.as_str(),
        ]
        .join("\n")
    }
}

/// Lifecycle policy for the instruction block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Recompute from current field values on every turn.
    #[default]
    Live,
    /// Hold the block captured by the last initialize action.
    Snapshot,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Live => "live",
            PromptMode::Snapshot => "snapshot",
        }
    }
}

/// Assembles the instruction block under the configured lifecycle policy.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    mode: PromptMode,
    snapshot: Option<String>,
}

impl PromptAssembler {
    pub fn new(mode: PromptMode) -> Self {
        Self {
            mode,
            snapshot: None,
        }
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    /// The initialize action: capture the block from current field values.
    /// Has no effect on the transcript.
    pub fn initialize(&mut self, fields: &FormFields) {
        self.snapshot = Some(fields.instruction_block());
    }

    /// Instruction block for the next request. In snapshot mode before the
    /// first initialize, falls back to the live field values.
    pub fn current(&self, fields: &FormFields) -> String {
        match self.mode {
            PromptMode::Live => fields.instruction_block(),
            PromptMode::Snapshot => self
                .snapshot
                .clone()
                .unwrap_or_else(|| fields.instruction_block()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(data: &str, system: &str, persona: &str, history: &str) -> FormFields {
        FormFields {
            data_context: data.to_string(),
            system_prompt: system.to_string(),
            persona: persona.to_string(),
            history_seed: history.to_string(),
        }
    }

    #[test]
    fn instruction_block_joins_in_fixed_order() {
        let f = fields("data", "system", "persona", "history");
        assert_eq!(f.instruction_block(), "data\nsystem\npersona\nhistory");
    }

    #[test]
    fn empty_fields_keep_their_separator_slot() {
        let f = fields("data", "", "persona", "");
        assert_eq!(f.instruction_block(), "data\n\npersona\n");
    }

    #[test]
    fn live_mode_tracks_field_edits() {
        let assembler = PromptAssembler::new(PromptMode::Live);
        let mut f = fields("a", "b", "c", "d");
        assert_eq!(assembler.current(&f), "a\nb\nc\nd");

        f.persona = "edited".to_string();
        assert_eq!(assembler.current(&f), "a\nb\nedited\nd");
    }

    #[test]
    fn snapshot_mode_holds_until_next_initialize() {
        let mut assembler = PromptAssembler::new(PromptMode::Snapshot);
        let mut f = fields("a", "b", "c", "d");

        assembler.initialize(&f);
        f.data_context = "changed".to_string();
        assert_eq!(assembler.current(&f), "a\nb\nc\nd");

        assembler.initialize(&f);
        assert_eq!(assembler.current(&f), "changed\nb\nc\nd");
    }

    #[test]
    fn snapshot_mode_falls_back_to_live_before_first_initialize() {
        let assembler = PromptAssembler::new(PromptMode::Snapshot);
        let f = fields("a", "b", "c", "d");
        assert_eq!(assembler.current(&f), "a\nb\nc\nd");
    }
}
