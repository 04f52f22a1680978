use crate::net::tls::ClientTrust;
use anyhow::{bail, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5050;

#[derive(Parser, Debug)]
#[command(name = "crabrelay", version, about = "TLS broadcast chat relay and terminal client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay.
    Serve(ServeArgs),
    /// Open the chat client.
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// PEM certificate chain presented to clients.
    #[arg(long)]
    pub cert: PathBuf,
    /// PEM private key for `--cert`.
    #[arg(long)]
    pub key: PathBuf,
    /// Log at debug level.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("trust").required(true).args(["ca", "insecure"])))]
pub struct ConnectArgs {
    #[arg(long)]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Display name. A random one is picked when omitted.
    #[arg(long)]
    pub name: Option<String>,
    /// PEM bundle of CAs trusted to sign the relay's certificate.
    #[arg(long)]
    pub ca: Option<PathBuf>,
    /// Name to verify the certificate against, when it differs from `--host`.
    #[arg(long, requires = "ca", conflicts_with = "insecure")]
    pub server_name: Option<String>,
    /// Skip certificate verification. The session can be intercepted.
    #[arg(long, default_value_t = false)]
    pub insecure: bool,
    /// Log notifier decisions at debug level.
    #[arg(long, default_value_t = false)]
    pub debug_notify: bool,
    /// Log file, overriding the configured one.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ConnectArgs {
    pub fn trust(&self) -> Result<ClientTrust> {
        match (&self.ca, self.insecure) {
            (Some(_), true) => bail!("--ca and --insecure cannot be combined"),
            (Some(ca), false) => Ok(ClientTrust::Verified {
                ca_path: ca.clone(),
                server_name: self.server_name.clone(),
            }),
            (None, true) if self.server_name.is_some() => {
                bail!("--server-name only applies with --ca")
            }
            (None, true) => Ok(ClientTrust::Insecure),
            (None, false) => bail!("either --ca <PEM> or --insecure is required"),
        }
    }
}
