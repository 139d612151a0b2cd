//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// Beacon CLI
///
/// Session and wallet lifecycle tooling for the Beacon tracking API.
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Override the API base URL
    #[arg(long, global = true, env = "BEACON_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a single tracking event
    Track(TrackCommand),

    /// Session management (start, end, list)
    Session(SessionCommand),

    /// Run a scripted wallet lifecycle against the API
    Simulate(SimulateArgs),

    /// Configuration management
    Config(ConfigCommand),

    /// Check API health
    Health,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracking Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct TrackCommand {
    #[command(subcommand)]
    pub action: TrackAction,

    /// Session ID to attach to the event
    #[arg(short, long, global = true)]
    pub session: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TrackAction {
    /// Page view
    PageView {
        /// Route path
        path: String,
        /// Previous route
        #[arg(short, long)]
        referrer: Option<String>,
    },

    /// Wallet connected
    Connect {
        /// Wallet address
        address: String,
    },

    /// Wallet disconnected
    Disconnect {
        /// Wallet address
        address: String,
    },

    /// Course started
    CourseStart {
        /// Course slug
        slug: String,
    },

    /// Course completed
    CourseComplete {
        /// Course slug
        slug: String,
    },

    /// Custom event
    Custom {
        /// Event name (payload `type`)
        name: String,
        /// Extra payload as JSON
        #[arg(short, long)]
        data: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SessionCommand {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Start a new session
    Start {
        /// Wallet address to bind the session to
        #[arg(short, long)]
        wallet: Option<String>,
    },

    /// End a session
    End {
        /// Session ID
        session_id: String,
    },

    /// List sessions recorded by the development server
    List {
        /// Include ended sessions
        #[arg(short, long)]
        all: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Wallet address the scripted provider connects with
    #[arg(short, long, default_value = "Wa11et1")]
    pub wallet: String,

    /// Switch the provider to this account mid-run
    #[arg(long)]
    pub switch_to: Option<String>,

    /// Routes to navigate, in order (first is the landing page)
    #[arg(short, long, value_delimiter = ',', default_value = "/,/courses,/courses/intro")]
    pub routes: Vec<String>,

    /// Course slug to start and complete
    #[arg(long)]
    pub course: Option<String>,

    /// Make the provider reject the connection request
    #[arg(long)]
    pub reject: bool,

    /// Pretend to run in a mobile browser outside the wallet app
    #[arg(long)]
    pub mobile: bool,

    /// Milliseconds to stay on each route
    #[arg(long, default_value_t = 1500)]
    pub dwell_ms: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_with_session() {
        let cli = Cli::try_parse_from(["beacon", "track", "page-view", "/courses", "-r", "/", "-s", "s-1"]).unwrap();
        let Commands::Track(cmd) = cli.command else {
            panic!("expected track");
        };
        assert_eq!(cmd.session.as_deref(), Some("s-1"));
        match cmd.action {
            TrackAction::PageView { path, referrer } => {
                assert_eq!(path, "/courses");
                assert_eq!(referrer.as_deref(), Some("/"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let cli = Cli::try_parse_from(["beacon", "simulate"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.wallet, "Wa11et1");
        assert_eq!(args.routes, vec!["/", "/courses", "/courses/intro"]);
        assert!(!args.reject);
    }

    #[test]
    fn test_parse_simulate_routes() {
        let cli = Cli::try_parse_from(["beacon", "simulate", "--routes", "/a,/b", "--switch-to", "Wa11et9"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.routes, vec!["/a", "/b"]);
        assert_eq!(args.switch_to.as_deref(), Some("Wa11et9"));
    }

    #[test]
    fn test_global_api_url() {
        let cli = Cli::try_parse_from(["beacon", "health", "--api-url", "http://localhost:9000"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9000"));
    }
}
