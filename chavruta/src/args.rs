use clap::Parser;

/// Chavruta MCP gateway
#[derive(Debug, Parser)]
#[command(name = "chavruta", about = "Dual-endpoint MCP gateway for Sefaria and safe web research")]
pub struct Args {
    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the log filter (e.g. "debug", "chavruta_web=trace")
    #[arg(long)]
    pub log_level: Option<String>,
}
