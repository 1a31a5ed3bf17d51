use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use rollback_types::CheckpointId;

pub(crate) const USAGE: &str = "\
usage: rollback [--project DIR] <command>

commands:
  record <session> <message>        checkpoint the tool call read as JSON from stdin
  resolve <checkpoint-id> <path>    complete a pending checkpoint from disk
  resolve-turn <session> <message>  complete every pending checkpoint of a message
  list <session> <message>          checkpoints recorded for a message
  window <session> <message>        checkpoints a revert at a message covers
  pending <session> <message>       pending checkpoints of a message
  has-changes <session> <message>   whether reverting at a message touches files
  revert <session> <message>        restore files to before the message
  unrevert <session> <message>      re-apply the changes undone by revert
";

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Parsed {
    Help,
    Run(Args),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Args {
    pub project: Option<PathBuf>,
    pub command: Command,
}

/// Conversation position as given on the command line; validated by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Position {
    pub session: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Record(Position),
    Resolve { id: CheckpointId, path: PathBuf },
    ResolveTurn(Position),
    List(Position),
    Window(Position),
    Pending(Position),
    HasChanges(Position),
    Revert(Position),
    Unrevert(Position),
}

impl Parsed {
    pub(crate) fn from_args(raw: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut project = None;
        let mut rest = Vec::new();
        let mut raw = raw.into_iter();

        while let Some(arg) = raw.next() {
            match arg.as_str() {
                "--project" | "-C" => {
                    let dir = raw.next().context("--project requires a directory")?;
                    project = Some(PathBuf::from(dir));
                }
                "-h" | "--help" => return Ok(Self::Help),
                _ => rest.push(arg),
            }
        }

        let Some((name, operands)) = rest.split_first() else {
            bail!("missing command\n\n{USAGE}");
        };
        let command = match name.as_str() {
            "record" => Command::Record(position(name, operands)?),
            "resolve" => {
                let [id, path] = operands else {
                    bail!("`resolve` expects <checkpoint-id> <path>");
                };
                Command::Resolve {
                    id: id.parse()?,
                    path: PathBuf::from(path),
                }
            }
            "resolve-turn" => Command::ResolveTurn(position(name, operands)?),
            "list" => Command::List(position(name, operands)?),
            "window" => Command::Window(position(name, operands)?),
            "pending" => Command::Pending(position(name, operands)?),
            "has-changes" => Command::HasChanges(position(name, operands)?),
            "revert" => Command::Revert(position(name, operands)?),
            "unrevert" => Command::Unrevert(position(name, operands)?),
            "help" => return Ok(Self::Help),
            other => bail!("unknown command `{other}`\n\n{USAGE}"),
        };

        Ok(Self::Run(Args { project, command }))
    }
}

fn position(command: &str, operands: &[String]) -> Result<Position> {
    let [session, message] = operands else {
        bail!("`{command}` expects <session> <message>");
    };
    Ok(Position {
        session: session.clone(),
        message: message.clone(),
    })
}
