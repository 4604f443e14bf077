use clap::{Parser, Subcommand};
use krasiot_core::config::Language;
use krasiot_core::models::Theme;

/// Krasiot - sign in to and manage your account from the terminal
#[derive(Parser, Debug)]
#[command(name = "krasiot")]
#[command(version, about = "Sign in to and manage your Krasiot account", long_about = None)]
pub struct Cli {
    /// API base URL (overrides config and KRASIOT_API_URL)
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long)]
        email: Option<String>,

        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },

    /// Create a new account
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long = "first")]
        firstname: Option<String>,

        #[arg(long = "last")]
        lastname: Option<String>,
    },

    /// End the current session
    Logout {
        /// Also forget the remembered password
        #[arg(long)]
        forget: bool,
    },

    /// Show session state
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Show or set the colour theme
    Theme {
        theme: Option<Theme>,

        /// Switch between light and dark
        #[arg(long, conflicts_with = "theme")]
        toggle: bool,
    },

    /// Show or set the interface language
    Lang { language: Option<Language> },

    /// Manage your profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Reload and print the profile
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Change first and/or last name
    Update {
        #[arg(long = "first")]
        firstname: Option<String>,

        #[arg(long = "last")]
        lastname: Option<String>,
    },

    /// Change the account password
    Password,

    /// Permanently delete the account
    Delete {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}
