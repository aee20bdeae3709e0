//! Line-oriented host: reads commands from an input stream and prints
//! application events as they are broadcast.

use std::{future::Future, io::Write};

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::{BroadcastStream, LinesStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info};

use crate::{
    dto::notification::Notification,
    engine::SpinVariant,
    error::ServiceError,
    routes::command::{Command, HELP, ParseError},
    services::{group_service, spin_service},
    state::{AppEvent, AppState, spin_machine::SpinStatus},
};

enum Flow {
    Continue,
    Quit,
}

/// Serve commands from `input` until `quit`, end of input or `shutdown` resolves.
///
/// At end of input a running spin is allowed to finish so piped scripts still
/// see their result.
pub async fn run<R, W>(
    state: &mut AppState,
    input: R,
    mut out: W,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = LinesStream::new(input.lines());
    let mut events = BroadcastStream::new(state.events().subscribe());
    let mut input_closed = false;
    tokio::pin!(shutdown);

    writeln!(out, "type `help` for the list of commands")?;
    out.flush()?;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            line = lines.next(), if !input_closed => match line {
                Some(Ok(line)) => {
                    // events keep flowing while a command waits on storage
                    let mut reply = Vec::new();
                    let flow = {
                        let command = handle_line(state, &line, &mut reply);
                        tokio::pin!(command);
                        loop {
                            tokio::select! {
                                flow = &mut command => break Some(flow?),
                                _ = &mut shutdown => break None,
                                Some(event) = events.next() => forward(event, &mut out)?,
                            }
                        }
                    };
                    out.write_all(&reply)?;
                    out.flush()?;
                    match flow {
                        Some(Flow::Continue) => {}
                        Some(Flow::Quit) => break,
                        None => {
                            info!("shutdown requested while a command was running");
                            break;
                        }
                    }
                }
                Some(Err(err)) => return Err(err),
                None => {
                    debug!("input closed");
                    input_closed = true;
                }
            },
            Some(event) = events.next() => forward(event, &mut out)?,
        }

        if input_closed && state.engine().status() == SpinStatus::Idle {
            break;
        }
    }

    Ok(())
}

fn forward<W: Write>(
    event: Result<AppEvent, BroadcastStreamRecvError>,
    out: &mut W,
) -> std::io::Result<()> {
    match event {
        Ok(event) => {
            render_event(&event, out)?;
            out.flush()
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "console fell behind the event stream");
            Ok(())
        }
    }
}

async fn handle_line<W: Write>(
    state: &mut AppState,
    line: &str,
    out: &mut W,
) -> std::io::Result<Flow> {
    let command = match line.parse::<Command>() {
        Ok(command) => command,
        Err(ParseError::Empty) => return Ok(Flow::Continue),
        Err(err) => {
            writeln!(out, "{err}")?;
            return Ok(Flow::Continue);
        }
    };

    debug!(?command, "handling command");
    match execute(state, command, out).await {
        Ok(flow) => Ok(flow),
        Err(Failure::Io(err)) => Err(err),
        Err(Failure::Service(err)) => {
            debug!(error = %err, kind = ?err.kind(), "command rejected");
            writeln!(out, "{}", Notification::from(&err))?;
            Ok(Flow::Continue)
        }
    }
}

enum Failure {
    Io(std::io::Error),
    Service(ServiceError),
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::Io(err)
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        Failure::Service(err)
    }
}

async fn execute<W: Write>(
    state: &mut AppState,
    command: Command,
    out: &mut W,
) -> Result<Flow, Failure> {
    match command {
        Command::Groups => {
            let groups = state.store().snapshot();
            if groups.is_empty() {
                writeln!(out, "no groups yet; use `add-group <name>`")?;
            }
            for (name, options) in groups.iter() {
                let marker = if state.selected() == Some(name) { '*' } else { ' ' };
                writeln!(out, "{marker} {name} ({} options)", options.len())?;
            }
        }
        Command::AddGroup(name) => {
            group_service::add_group(state, &name).await?;
        }
        Command::DeleteGroup(name) => {
            group_service::delete_group(state, &name).await?;
            writeln!(out, "group `{name}` deleted")?;
        }
        Command::Select(name) => {
            let options = group_service::select_group(state, &name)?;
            print_options(out, &options)?;
        }
        Command::Options => {
            let (_, options) = group_service::selected_options(state)?;
            print_options(out, &options)?;
        }
        Command::Add(text) => {
            let options = group_service::add_option(state, &text).await?;
            print_options(out, &options)?;
        }
        Command::Delete(index) => {
            let options = group_service::delete_option(state, index).await?;
            print_options(out, &options)?;
        }
        Command::Spin => {
            spin_service::start_spin(state).await?;
        }
        Command::Stop => {
            spin_service::stop_spin(state).await?;
        }
        Command::Status => {
            let snapshot = spin_service::status(state);
            let status = match snapshot.status {
                SpinStatus::Idle => "idle",
                SpinStatus::Spinning => "spinning",
                SpinStatus::Revealing => "revealing",
            };
            let variant = match state.engine().settings().variant {
                SpinVariant::Continuous => "continuous",
                SpinVariant::Discrete => "discrete",
            };
            match snapshot.group {
                Some(group) => writeln!(out, "{variant} wheel {status} ({group})")?,
                None => writeln!(out, "{variant} wheel {status}")?,
            }
            if !state.store().is_loaded() {
                writeln!(out, "stored groups could not be read; use `retry`")?;
            } else if !state.store().is_durable() {
                writeln!(out, "some changes are not saved; use `retry`")?;
            }
        }
        Command::Retry => {
            group_service::retry_sync(state).await?;
            writeln!(out, "all changes saved")?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => return Ok(Flow::Quit),
    }

    Ok(Flow::Continue)
}

fn print_options<W: Write>(out: &mut W, options: &[String]) -> std::io::Result<()> {
    if options.is_empty() {
        return writeln!(out, "no options yet; use `add <text>`");
    }
    for (index, option) in options.iter().enumerate() {
        writeln!(out, "  [{index}] {option}")?;
    }
    Ok(())
}

fn render_event<W: Write>(event: &AppEvent, out: &mut W) -> std::io::Result<()> {
    match event {
        AppEvent::SelectionChanged { group: Some(group) } => {
            writeln!(out, "selected group `{group}`")
        }
        AppEvent::SelectionChanged { group: None } => writeln!(out, "no group selected"),
        AppEvent::GroupsChanged { durable: false, .. } => {
            writeln!(out, "changes may not be saved; use `retry`")
        }
        AppEvent::GroupsChanged { durable: true, .. } => Ok(()),
        AppEvent::SpinStarted {
            group,
            option_count,
            ..
        } => writeln!(out, "spinning `{group}` over {option_count} options..."),
        AppEvent::Revealed(outcome) => writeln!(
            out,
            "winner: {} (option {} of `{}`)",
            outcome.winner, outcome.winner_index, outcome.group
        ),
        AppEvent::SpinCancelled { .. } => writeln!(out, "\nspin stopped"),
        AppEvent::SpinFailed { reason, .. } => writeln!(out, "\nspin failed: {reason}"),
        AppEvent::SpinFinished { .. } => Ok(()),
    }
}
