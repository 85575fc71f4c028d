//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{Sentiment, TaskStatus, day_end_ms, day_start_ms};
use crate::error::TaskResult;
use crate::service::{PageRequest, TaskFilters};

/// CallDesk - farmer outreach task allocation and lifecycle
#[derive(Parser)]
#[command(
    name = "calldesk",
    about = "Allocate farmer outreach calls to agents and track their lifecycle",
    version,
    after_help = "Logs are written to: ~/.local/share/calldesk/logs/calldesk.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Act as this registered user (role comes from the registry)
    #[arg(long = "as", global = true, value_name = "CALLER-ID")]
    pub caller: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load agents, farmers, activities, and unassigned tasks from YAML
    Seed {
        /// Seed file
        file: PathBuf,
    },

    /// Distribute unassigned tasks to capable agents
    Allocate {
        /// Language to allocate, or "all"
        #[arg(short = 'L', long)]
        language: String,

        /// Maximum tasks to allocate (0 = up to the cap)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Earliest scheduled date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Latest scheduled date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Open the caller's next task
    Next,

    /// List open tasks for an agent (defaults to the caller)
    Available {
        /// Agent ID
        agent: Option<String>,
    },

    /// Start working an assigned task
    Load {
        /// Task ID
        task: String,
    },

    /// Record the outcome of a call
    Submit {
        /// Task ID
        task: String,

        /// Raw call status ("Connected", "Not Reachable", "Invalid Number", ...)
        #[arg(short, long)]
        status: String,

        #[arg(long)]
        comments: Option<String>,

        #[arg(long)]
        sentiment: Option<Sentiment>,

        #[arg(long)]
        recalled_activity: Option<bool>,

        #[arg(long)]
        purchased_product: Option<bool>,

        #[arg(long)]
        willing_to_purchase: Option<bool>,

        /// Call duration in seconds
        #[arg(long)]
        duration: Option<u32>,
    },

    /// Move a task to another agent
    Reassign {
        /// Task ID
        task: String,

        /// New agent ID
        agent: String,
    },

    /// Force a task's status
    Override {
        /// Task ID
        task: String,

        /// Target status
        status: TaskStatus,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Reassign many tasks to one agent
    BulkReassign {
        /// New agent ID
        agent: String,

        /// Task IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Force the status of many tasks
    BulkOverride {
        /// Target status
        status: TaskStatus,

        /// Task IDs
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List pending (sampled or in progress) tasks
    Pending {
        #[command(flatten)]
        list: ListArgs,
    },

    /// List tasks of a team lead's agents
    Team {
        /// Team lead ID
        lead: String,

        #[command(flatten)]
        list: ListArgs,
    },

    /// List tasks waiting for allocation
    Unassigned {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Show one task with farmer and activity details
    Show {
        /// Task ID
        task: String,
    },
}

/// Filter and paging flags shared by listings
#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Filter by status
    #[arg(short, long)]
    pub status: Option<TaskStatus>,

    /// Filter by assigned agent
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Filter by farmer language
    #[arg(short = 'L', long)]
    pub language: Option<String>,

    /// Earliest scheduled date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest scheduled date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Page number (1-based)
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Page size (0 = configured default)
    #[arg(long, default_value = "0")]
    pub limit: usize,
}

impl ListArgs {
    pub fn filters(&self) -> TaskResult<TaskFilters> {
        let (date_from, date_to) = parse_window(self.from.as_deref(), self.to.as_deref())?;
        Ok(TaskFilters {
            status: self.status,
            agent_id: self.agent.clone(),
            language: self.language.clone(),
            date_from,
            date_to,
        })
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

/// Turn a YYYY-MM-DD window into inclusive millisecond bounds
pub fn parse_window(from: Option<&str>, to: Option<&str>) -> TaskResult<(Option<i64>, Option<i64>)> {
    debug!(?from, ?to, "parse_window: called");
    let from = from.map(day_start_ms).transpose()?;
    let to = to.map(day_end_ms).transpose()?;
    Ok((from, to))
}

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calldesk")
        .join("logs")
        .join("calldesk.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_allocate() {
        let cli = Cli::parse_from([
            "calldesk", "--as", "tl1", "allocate", "--language", "Hindi", "-n", "5", "--from", "2024-05-01",
        ]);
        assert_eq!(cli.caller.as_deref(), Some("tl1"));
        match cli.command {
            Command::Allocate {
                language, count, from, to,
            } => {
                assert_eq!(language, "Hindi");
                assert_eq!(count, Some(5));
                assert_eq!(from.as_deref(), Some("2024-05-01"));
                assert!(to.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_bulk_override() {
        let cli = Cli::parse_from([
            "calldesk", "bulk-override", "not_reachable", "t1", "t2", "--notes", "line dead", "--format", "json",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::BulkOverride { status, ids, notes } => {
                assert_eq!(status, TaskStatus::NotReachable);
                assert_eq!(ids, vec!["t1", "t2"]);
                assert_eq!(notes.as_deref(), Some("line dead"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_bad_status() {
        assert!(Cli::try_parse_from(["calldesk", "override", "t1", "done"]).is_err());
    }

    #[test]
    fn test_list_args_filters() {
        let cli = Cli::parse_from(["calldesk", "pending", "--status", "in-progress", "--to", "2024-05-01", "-p", "2"]);
        let Command::Pending { list } = cli.command else {
            panic!("expected pending");
        };
        let filters = list.filters().unwrap();
        assert_eq!(filters.status, Some(TaskStatus::InProgress));
        assert_eq!(filters.date_to, Some(1_714_521_600_000 + 86_400_000 - 1));
        assert_eq!(list.page(), PageRequest::new(2, 0));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
