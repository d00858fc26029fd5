//! # CLI Module
//!
//! Command-line interface of the `roster` binary.
//!
//! ```text
//! roster [--db <path>] [--json] <command>
//!
//!   serve        run the HTTP + WebSocket server
//!   init         create an empty database
//!   import       load members from CSV or JSON
//!   create-user  add a staff account
//!   list         print members
//!   stats        print check-in statistics
//!   reset        put every member back to "not checked in"
//! ```

mod commands;

pub use commands::{
    cmd_create_user, cmd_import, cmd_init, cmd_list, cmd_reset, cmd_stats, open_roster,
};

use crate::config::{
    DEFAULT_ADDR, DEFAULT_HUB_CAPACITY, DEFAULT_LOGIN_PER_MINUTE, DEFAULT_TOKEN_TTL_SECS,
    ServerConfig,
};
use clap::{Args, Parser, Subcommand};
use roster_core::CheckinPolicy;
use roster_core::password::DEFAULT_ITERATIONS;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Event check-in tracker.
#[derive(Debug, Parser)]
#[command(name = "roster", version, about)]
pub struct Cli {
    /// Database file (redb).
    #[arg(long, env = "ROSTER_DB", default_value = "roster.redb", global = true)]
    pub db: PathBuf,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API and real-time channel.
    Serve(ServeArgs),

    /// Create an empty database.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Import members from a CSV or JSON file.
    Import {
        file: PathBuf,
        /// csv or json (default: from the file extension, else csv).
        #[arg(long)]
        format: Option<String>,
        /// Delete all members before importing.
        #[arg(long)]
        replace: bool,
    },

    /// Create a staff account.
    CreateUser {
        username: String,
        #[arg(long, env = "ROSTER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        mssv: String,
        /// PBKDF2 iteration count.
        #[arg(long, default_value_t = DEFAULT_ITERATIONS, hide = true)]
        iterations: u32,
    },

    /// Print all members.
    List,

    /// Print check-in statistics.
    Stats,

    /// Reset every member to "not checked in".
    Reset,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "ROSTER_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,

    /// Keep everything in memory; nothing is written to --db.
    #[arg(long)]
    pub ephemeral: bool,

    /// HMAC key for bearer tokens (random when unset).
    #[arg(long, env = "ROSTER_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Bearer token lifetime in seconds.
    #[arg(long, env = "ROSTER_TOKEN_TTL_SECS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub token_ttl_secs: u64,

    /// Accept a check-in from members who already arrived (refreshes the time).
    #[arg(long)]
    pub allow_repeat_checkin: bool,

    /// Hand out sequential lottery numbers at first check-in.
    #[arg(long)]
    pub lottery: bool,

    /// Allowed CORS origin; repeat or comma-separate. Default: any.
    #[arg(long = "cors-origin", env = "ROSTER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Login attempts allowed per username per minute.
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE)]
    pub login_per_minute: u32,

    /// Events buffered per real-time client before it is resynced.
    #[arg(long, default_value_t = DEFAULT_HUB_CAPACITY)]
    pub hub_capacity: usize,
}

impl ServeArgs {
    /// Freeze the flags into a server config.
    pub fn to_config(&self) -> roster_core::Result<ServerConfig> {
        ServerConfig {
            addr: self.addr,
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            policy: self.policy(),
            cors_origins: self
                .cors_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            login_per_minute: self.login_per_minute,
            hub_capacity: self.hub_capacity,
            ..ServerConfig::default()
        }
        .with_token_secret(self.token_secret.as_deref())
    }

    pub fn policy(&self) -> CheckinPolicy {
        CheckinPolicy {
            allow_repeat: self.allow_repeat_checkin,
            assign_lottery: self.lottery,
        }
    }
}
