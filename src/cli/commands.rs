use clap::Subcommand;

use super::check::CheckArgs;
use super::discover::DiscoverArgs;
use super::watch::WatchArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Watch every configured target until cancelled
    Watch(WatchArgs),

    /// Evaluate a saved page offline and print each layer's verdict
    Check(CheckArgs),

    /// List the enabled signal layers with their roles and known risks
    Layers,

    /// Find sold-out events through the Ticketmaster Discovery API
    Discover(DiscoverArgs),
}
