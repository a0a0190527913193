use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use corelib::{Decision, RequestId, SlotDetails, SlotId, UserId};

#[derive(Debug, Parser)]
#[clap(name = "slotswap", version, about = "Trade calendar slots between users")]
pub struct Cli {
    /// Overrides DATABASE_URL.
    #[clap(long, global = true)]
    pub database_url: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage users
    #[clap(subcommand)]
    User(UserCmd),

    /// Manage your own slots
    #[clap(subcommand)]
    Slot(SlotCmd),

    /// Swappable slots of other users
    Discover {
        #[clap(long = "as")]
        caller: UserId,
    },

    /// Offer one of your swappable slots for someone else's
    Propose {
        #[clap(long = "as")]
        caller: UserId,
        #[clap(long)]
        offer: SlotId,
        #[clap(long)]
        want: SlotId,
    },

    /// Accept or reject a request addressed to you
    Resolve {
        #[clap(long = "as")]
        caller: UserId,
        #[clap(long)]
        request: RequestId,
        #[clap(long, value_enum)]
        decision: DecisionCli,
    },

    /// Incoming and outgoing requests
    Requests {
        #[clap(long = "as")]
        caller: UserId,
    },

    /// Reservation repair
    #[clap(subcommand)]
    Admin(AdminCmd),
}

#[derive(Debug, Subcommand)]
pub enum UserCmd {
    Add {
        #[clap(long)]
        name: String,
        #[clap(long)]
        email: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SlotCmd {
    /// New slots start BUSY
    Create {
        #[clap(long = "as")]
        caller: UserId,
        #[clap(flatten)]
        details: DetailsArgs,
    },
    List {
        #[clap(long = "as")]
        caller: UserId,
    },
    /// Put a slot on the market, or take it off with --off
    Swappable {
        #[clap(long = "as")]
        caller: UserId,
        #[clap(long)]
        slot: SlotId,
        #[clap(long)]
        off: bool,
    },
    Edit {
        #[clap(long = "as")]
        caller: UserId,
        #[clap(long)]
        slot: SlotId,
        #[clap(flatten)]
        details: DetailsArgs,
    },
    Delete {
        #[clap(long = "as")]
        caller: UserId,
        #[clap(long)]
        slot: SlotId,
    },
}

#[derive(Debug, Subcommand)]
pub enum AdminCmd {
    /// SWAP_PENDING slots no request will resolve
    Stuck,
    /// Clear the reservation on a stuck slot
    Release {
        #[clap(long)]
        slot: SlotId,
    },
}

#[derive(Debug, Args)]
pub struct DetailsArgs {
    #[clap(long)]
    pub title: String,
    /// RFC 3339, e.g. 2025-06-02T09:00:00Z
    #[clap(long)]
    pub start: DateTime<Utc>,
    #[clap(long)]
    pub end: DateTime<Utc>,
}

impl From<DetailsArgs> for SlotDetails {
    fn from(a: DetailsArgs) -> Self {
        SlotDetails {
            title: a.title,
            start_time: a.start,
            end_time: a.end,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DecisionCli {
    Accept,
    Reject,
}

impl From<DecisionCli> for Decision {
    fn from(d: DecisionCli) -> Self {
        match d {
            DecisionCli::Accept => Decision::Accept,
            DecisionCli::Reject => Decision::Reject,
        }
    }
}

impl Command {
    /// Span name for the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::User(_) => "user",
            Command::Slot(SlotCmd::Create { .. }) => "slot.create",
            Command::Slot(SlotCmd::List { .. }) => "slot.list",
            Command::Slot(SlotCmd::Swappable { .. }) => "slot.swappable",
            Command::Slot(SlotCmd::Edit { .. }) => "slot.edit",
            Command::Slot(SlotCmd::Delete { .. }) => "slot.delete",
            Command::Discover { .. } => "discover",
            Command::Propose { .. } => "propose",
            Command::Resolve { .. } => "resolve",
            Command::Requests { .. } => "requests",
            Command::Admin(AdminCmd::Stuck) => "admin.stuck",
            Command::Admin(AdminCmd::Release { .. }) => "admin.release",
        }
    }

    /// The acting user, for commands that have one.
    pub fn caller(&self) -> Option<UserId> {
        match self {
            Command::Slot(
                SlotCmd::Create { caller, .. }
                | SlotCmd::List { caller }
                | SlotCmd::Swappable { caller, .. }
                | SlotCmd::Edit { caller, .. }
                | SlotCmd::Delete { caller, .. },
            )
            | Command::Discover { caller }
            | Command::Propose { caller, .. }
            | Command::Resolve { caller, .. }
            | Command::Requests { caller } => Some(*caller),
            Command::User(_) | Command::Admin(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_resolve() {
        let cli = Cli::try_parse_from([
            "slotswap",
            "resolve",
            "--as",
            "6f1f4a52-2a44-4a4e-9a57-0d6c7e0b8a11",
            "--request",
            "0b4b4d53-4c7e-4d64-9a3f-6a2f3c1f1b22",
            "--decision",
            "accept",
        ])
        .unwrap();

        assert_eq!(cli.command.name(), "resolve");
        assert!(cli.command.caller().is_some());
        match cli.command {
            Command::Resolve { decision, .. } => {
                assert_eq!(Decision::from(decision), Decision::Accept)
            }
            other => panic!("parsed as {other:?}"),
        }
    }

    #[test]
    fn parses_slot_create_with_global_database_url() {
        let cli = Cli::try_parse_from([
            "slotswap",
            "slot",
            "create",
            "--as",
            "6f1f4a52-2a44-4a4e-9a57-0d6c7e0b8a11",
            "--title",
            "Standup",
            "--start",
            "2025-06-02T09:00:00Z",
            "--end",
            "2025-06-02T09:30:00Z",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();

        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
        let Command::Slot(SlotCmd::Create { details, .. }) = cli.command else {
            panic!("wrong command");
        };
        let details = SlotDetails::from(details);
        assert!(details.validate().is_ok());
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(Cli::try_parse_from(["slotswap", "discover", "--as", "alice"]).is_err());
    }
}
