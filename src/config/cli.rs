use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "batch-relay")]
#[command(about = "Authenticated batch relay: decode, transform and forward user records")]
pub struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the listen address from config
    #[arg(long)]
    pub listen: Option<String>,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    pub check: bool,
}

impl Args {
    pub fn apply_overrides(&self, config: &mut super::AppConfig) {
        if let Some(listen) = &self.listen {
            tracing::info!("🔧 Listen address overridden to: {}", listen);
            config.server.url = listen.clone();
        }
    }
}
