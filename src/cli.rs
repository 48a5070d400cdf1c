use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use subdash_types::plan::PlanId;

#[derive(Parser, Debug)]
#[command(name = "subdash", version)]
#[command(about = "Owner and subscriber dashboard for on-chain subscription billing")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connected chain, signer address and balance
    Network,
    /// Balance of any address
    Balance { address: Address },
    /// Billing managers owned by the signer
    #[command(subcommand)]
    Manager(ManagerCommand),
    /// Plans of a billing manager
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Gas sponsorship of a billing manager
    #[command(subcommand)]
    Sponsor(SponsorCommand),
    /// Collected subscription fees
    #[command(subcommand)]
    Revenue(RevenueCommand),
    /// The signer's smart-wallet account for a manager
    #[command(subcommand)]
    Account(AccountCommand),
    /// Subscribe to a live plan, or resume a cancelled subscription
    Subscribe { manager: Address, plan_id: PlanId },
    /// Cancel the current subscription
    Unsubscribe { manager: Address },
    /// Spending limit of the smart-wallet account
    #[command(subcommand)]
    Limit(LimitCommand),
    /// Payments and failed payments of the smart-wallet account
    History { manager: Address },
    /// Print payment events as they happen, until interrupted
    Watch {
        manager: Address,
        /// Only events of the signer's smart-wallet account
        #[arg(long)]
        mine: bool,
        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ManagerCommand {
    /// Deploy a new billing manager
    Deploy,
    List,
    Show { manager: Address },
    Plans { manager: Address },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    Create {
        manager: Address,
        name: String,
        /// Monthly fee in USD, e.g. 9.99
        fee_usd: String,
    },
    Update {
        manager: Address,
        plan_id: PlanId,
        name: String,
        fee_usd: String,
    },
    Delete { manager: Address, plan_id: PlanId },
    /// Make a plan live. Live plans can no longer be changed.
    Publish { manager: Address, plan_id: PlanId },
}

#[derive(Subcommand, Debug)]
pub enum SponsorCommand {
    /// Attach a paymaster to the manager
    Attach { manager: Address, sponsor: Address },
    /// Send ETH from the signer to the manager's paymaster
    Fund { manager: Address, amount_eth: String },
    /// Withdraw the whole paymaster balance
    Withdraw { manager: Address, to: Address },
}

#[derive(Subcommand, Debug)]
pub enum RevenueCommand {
    Withdraw { manager: Address, amount_eth: String },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    Deploy { manager: Address },
    /// Account balance, spending limit, sponsorship and plans on offer
    Show { manager: Address },
    Fund { manager: Address, amount_eth: String },
    Withdraw { manager: Address, amount_eth: String },
}

#[derive(Subcommand, Debug)]
pub enum LimitCommand {
    Set { manager: Address, amount_usd: String },
    Remove { manager: Address },
}
