//! Terminal chat loop: one session, one stream in flight at most.

use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use std::io;
use tokio::sync::mpsc;

use crate::commands::{help_text, parse_slash_command, SlashCommand};
use crate::config::Config;
use crate::engine::{ConversationEngine, TurnStream};
use crate::form::FormFields;
use crate::llm::LlmClient;
use crate::models;
use crate::session::SessionStore;
use crate::ui::chat::ChatView;
use crate::ui::form::{FormAction, FormScreen};

pub async fn run(config: Config) -> Result<()> {
    let llm = LlmClient::new(config.clone())?;
    let engine = ConversationEngine::new(llm);

    let mut store = SessionStore::new();
    let session_id = store.create(config.prompt_mode, &config.default_model);

    let mut form = FormScreen::new(FormFields::default(), &config.default_model);
    let mut show_form = false;
    let mut input = String::new();
    let mut streaming_text = String::new();
    let mut active_turn: Option<TurnStream> = None;
    let mut notice: Option<String> = Some(
        "Type a message and press Enter. /form opens configuration, /help lists commands."
            .to_string(),
    );

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    // Blocking crossterm reads happen off the async runtime.
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(ev) => {
                if ev_tx.send(ev).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });

    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(33));

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let draw_result = draw(
                    &mut terminal,
                    &store,
                    &session_id,
                    &form,
                    show_form,
                    &input,
                    if active_turn.is_some() { Some(streaming_text.as_str()) } else { None },
                    notice.as_deref(),
                );
                if let Err(e) = draw_result {
                    break Err(e);
                }
            }
            Some(ev) = ev_rx.recv() => {
                if let Event::Key(key) = ev {
                    let outcome = handle_key(
                        key,
                        &engine,
                        &mut store,
                        &session_id,
                        &mut form,
                        &mut show_form,
                        &mut input,
                        &mut streaming_text,
                        &mut active_turn,
                        &mut notice,
                    )
                    .await;
                    match outcome {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(e) => notice = Some(format!("{e:#}")),
                    }
                }
            }
            fragment = next_turn_fragment(&mut active_turn) => {
                match fragment {
                    Some(delta) => streaming_text.push_str(&delta),
                    None => {
                        // Drained: commit the turn exactly once.
                        if let Some(turn) = active_turn.take() {
                            streaming_text.clear();
                            if let Some(session) = store.get_mut(&session_id) {
                                if let Err(e) = engine.complete_turn(session, turn.finish()) {
                                    notice = Some(format!("{e:#}"));
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result
}

/// Resolves to the next streamed fragment, or parks forever while no turn
/// is in flight so the select loop ignores this arm.
async fn next_turn_fragment(active_turn: &mut Option<TurnStream>) -> Option<String> {
    match active_turn.as_mut() {
        Some(turn) => turn.next_fragment().await,
        None => std::future::pending().await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_key(
    key: KeyEvent,
    engine: &ConversationEngine,
    store: &mut SessionStore,
    session_id: &str,
    form: &mut FormScreen,
    show_form: &mut bool,
    input: &mut String,
    streaming_text: &mut String,
    active_turn: &mut Option<TurnStream>,
    notice: &mut Option<String>,
) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }

    if *show_form {
        if form.handle_key(key) == FormAction::Close {
            *show_form = false;
            if let Some(session) = store.get_mut(session_id) {
                session.model_label = form.model_label().to_string();
            }
        }
        return Ok(false);
    }

    match key.code {
        KeyCode::Esc => return Ok(true),
        KeyCode::Char(c) => input.push(c),
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Enter => {
            let message = input.trim().to_string();
            input.clear();
            // Empty submissions are suppressed at the composer.
            if message.is_empty() {
                return Ok(false);
            }

            if let Some(parsed) = parse_slash_command(&message) {
                return run_command(
                    parsed.command,
                    parsed.argument(),
                    store,
                    session_id,
                    form,
                    show_form,
                    notice,
                    active_turn.is_some(),
                );
            }

            if active_turn.is_some() {
                *notice = Some("(streaming in progress; wait for completion)".to_string());
                return Ok(false);
            }

            let session = store
                .get_mut(session_id)
                .context("session missing from store")?;
            *notice = None;
            streaming_text.clear();
            let turn = engine
                .submit_user_turn(session, &form.fields, message)
                .await?;
            *active_turn = Some(turn);
        }
        _ => {}
    }

    Ok(false)
}

#[allow(clippy::too_many_arguments)]
fn run_command(
    command: SlashCommand,
    argument: Option<&str>,
    store: &mut SessionStore,
    session_id: &str,
    form: &mut FormScreen,
    show_form: &mut bool,
    notice: &mut Option<String>,
    stream_active: bool,
) -> Result<bool> {
    // Session-mutating commands wait like plain submissions do; a reset
    // mid-turn would let the draining stream commit an assistant message
    // into an emptied transcript.
    if stream_active
        && matches!(
            command,
            SlashCommand::Init | SlashCommand::Reset | SlashCommand::Model
        )
    {
        *notice = Some("(streaming in progress; wait for completion)".to_string());
        return Ok(false);
    }

    let session = store
        .get_mut(session_id)
        .context("session missing from store")?;

    match command {
        SlashCommand::Init => {
            session.initialize(&form.fields);
            *notice = Some(format!(
                "Instruction block snapshotted ({} mode).",
                session.prompt.mode().as_str()
            ));
        }
        SlashCommand::Reset => {
            session.reset();
            *notice = Some("Transcript cleared. Form fields are kept.".to_string());
        }
        SlashCommand::Form => {
            *show_form = true;
        }
        SlashCommand::Model => match argument {
            Some(label) => {
                let spec = models::resolve(label)?;
                session.model_label = spec.label.to_string();
                form.set_model_label(spec.label);
                *notice = Some(format!("Model set to {} ({}).", spec.label, spec.qualified()));
            }
            None => {
                *notice = Some(format!("Models: {}", models::labels().join(", ")));
            }
        },
        SlashCommand::Help => {
            *notice = Some(help_text());
        }
        SlashCommand::Quit => return Ok(true),
    }

    Ok(false)
}

#[allow(clippy::too_many_arguments)]
fn draw(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    store: &SessionStore,
    session_id: &str,
    form: &FormScreen,
    show_form: bool,
    input: &str,
    streaming: Option<&str>,
    notice: Option<&str>,
) -> Result<()> {
    terminal.draw(|f| {
        if show_form {
            f.render_widget(form, f.size());
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(3)])
            .split(f.size());

        if let Some(session) = store.get(session_id) {
            let view = ChatView {
                transcript: &session.transcript,
                streaming,
                notice,
                model_label: &session.model_label,
            };
            f.render_widget(view, chunks[0]);
        }

        let composer = Paragraph::new(input.to_string())
            .block(Block::default().borders(Borders::ALL).title(" message "));
        f.render_widget(composer, chunks[1]);

        let x = chunks[1].x + 1 + input.chars().count() as u16;
        let y = chunks[1].y + 1;
        f.set_cursor(
            x.min(chunks[1].x + chunks[1].width.saturating_sub(2)),
            y,
        );
    })?;
    Ok(())
}
