use clap::{Parser, Subcommand};

/// Identity broker operator tool.
#[derive(Parser, Debug)]
#[command(name = "idbroker", version, about = "Identity broker operator tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List login providers with their directory namespace and token endpoint.
    Providers,

    /// Show how a provider login is presented to the directory.
    Normalize {
        /// Provider name (google, facebook, amazon, twitter, stripe, paypal, ...).
        /// Omit for an email login.
        #[arg(long)]
        provider: Option<String>,

        /// Provider token or email.
        #[arg(long)]
        token: String,
    },

    /// Render the password reset email for an address without sending it.
    ResetMail {
        #[arg(long)]
        email: String,
    },

    /// Sign up, log in and read the profile against an in-memory directory.
    Demo {
        #[arg(long, default_value = "Demo User")]
        name: String,

        #[arg(long, default_value = "demo@example.com")]
        email: String,

        #[arg(long, env = "DEMO_PASSWORD", default_value = "demo-password")]
        password: String,
    },
}
