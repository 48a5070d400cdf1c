//! Subdash command-line entrypoint.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` selects the configuration file (default `config.json`)
//! - `RUST_LOG` filters log output
//! - `OTEL_*` variables enable span export to systems like Honeycomb

use clap::Parser;
use dotenvy::dotenv;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use subdash::config::Config;
use subdash::dashboard::Dashboard;
use subdash::notice::{Notifier, PrintSink};
use subdash::util::{SigDown, Telemetry};
use subdash::{OwnerConsole, SubscriberConsole};
use subdash_types::ledger::BillingLedger;
use subdash_zksync::RpcLedger;

use crate::cli::{
    AccountCommand, CliArgs, Command, LimitCommand, ManagerCommand, PlanCommand, RevenueCommand,
    SponsorCommand,
};
use crate::render;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize rustls crypto provider (ring)
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .map_err(|_| "Failed to initialize rustls crypto provider")?;

    // Load .env variables
    dotenv().ok();

    let args = CliArgs::parse();

    let _telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load(&args.config)?;
    let ledger = RpcLedger::connect(&config.zksync(), config.contracts()).await?;
    tracing::info!(
        chain_id = config.chain_id(),
        signer = %ledger.signer_address(),
        "Connected"
    );

    let notifier =
        Notifier::new(Arc::new(PrintSink)).with_explorer(config.explorer_url().cloned());
    let dashboard = Dashboard::new(Arc::new(ledger), notifier, config.sponsorship_gate()?);

    Output { json: args.json }
        .dispatch(args.command, dashboard)
        .await
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<T, F>(&self, value: &T, human: F) -> Result<(), Box<dyn std::error::Error>>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human(value));
        }
        Ok(())
    }

    async fn dispatch<L: BillingLedger>(
        &self,
        command: Command,
        dashboard: Dashboard<L>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let owner = OwnerConsole::new(dashboard.clone());
        let subscriber = SubscriberConsole::new(dashboard.clone());
        match command {
            Command::Network => self.emit(&dashboard.network().await?, render::network),
            Command::Balance { address } => {
                self.emit(&dashboard.balance(address).await?, render::balance)
            }
            Command::Manager(command) => match command {
                ManagerCommand::Deploy => {
                    self.emit(&owner.deploy_manager().await?, render::deployment)
                }
                ManagerCommand::List => {
                    self.emit(&owner.managers().await?, |managers| render::managers(managers))
                }
                ManagerCommand::Show { manager } => {
                    self.emit(&owner.overview(manager).await?, render::overview)
                }
                ManagerCommand::Plans { manager } => {
                    self.emit(&owner.plans(manager).await?, |plans| render::plans(plans))
                }
            },
            Command::Plan(command) => {
                let change = match command {
                    PlanCommand::Create {
                        manager,
                        name,
                        fee_usd,
                    } => owner.create_plan(manager, &name, &fee_usd).await?,
                    PlanCommand::Update {
                        manager,
                        plan_id,
                        name,
                        fee_usd,
                    } => {
                        owner
                            .update_plan(manager, plan_id, &name, &fee_usd)
                            .await?
                    }
                    PlanCommand::Delete { manager, plan_id } => {
                        owner.delete_plan(manager, plan_id).await?
                    }
                    PlanCommand::Publish { manager, plan_id } => {
                        owner.publish_plan(manager, plan_id).await?
                    }
                };
                self.emit(&change, render::plan_change)
            }
            Command::Sponsor(command) => {
                let outcome = match command {
                    SponsorCommand::Attach { manager, sponsor } => {
                        owner.attach_sponsor(manager, sponsor).await?
                    }
                    SponsorCommand::Fund {
                        manager,
                        amount_eth,
                    } => owner.fund_sponsor(manager, &amount_eth).await?,
                    SponsorCommand::Withdraw { manager, to } => {
                        owner.withdraw_sponsor(manager, to).await?
                    }
                };
                self.emit(&outcome, render::outcome)
            }
            Command::Revenue(RevenueCommand::Withdraw {
                manager,
                amount_eth,
            }) => self.emit(
                &owner.withdraw_revenue(manager, &amount_eth).await?,
                render::outcome,
            ),
            Command::Account(command) => match command {
                AccountCommand::Deploy { manager } => {
                    self.emit(&subscriber.deploy_account(manager).await?, render::outcome)
                }
                AccountCommand::Show { manager } => {
                    self.emit(&subscriber.view(manager).await?, render::subscriber_view)
                }
                AccountCommand::Fund {
                    manager,
                    amount_eth,
                } => self.emit(
                    &subscriber.fund_account(manager, &amount_eth).await?,
                    render::outcome,
                ),
                AccountCommand::Withdraw {
                    manager,
                    amount_eth,
                } => self.emit(
                    &subscriber.withdraw_account(manager, &amount_eth).await?,
                    render::outcome,
                ),
            },
            Command::Subscribe { manager, plan_id } => self.emit(
                &subscriber.subscribe(manager, plan_id).await?,
                render::outcome,
            ),
            Command::Unsubscribe { manager } => {
                self.emit(&subscriber.unsubscribe(manager).await?, render::outcome)
            }
            Command::Limit(command) => {
                let outcome = match command {
                    LimitCommand::Set {
                        manager,
                        amount_usd,
                    } => subscriber.set_spending_limit(manager, &amount_usd).await?,
                    LimitCommand::Remove { manager } => {
                        subscriber.remove_spending_limit(manager).await?
                    }
                };
                self.emit(&outcome, render::outcome)
            }
            Command::History { manager } => self.emit(
                &subscriber.payment_history(manager).await?,
                render::history,
            ),
            Command::Watch {
                manager,
                mine,
                interval,
            } => {
                let account = if mine {
                    Some(
                        subscriber
                            .account(manager)
                            .await?
                            .ok_or(subdash::DashboardError::NoAccount(manager))?,
                    )
                } else {
                    None
                };
                let sig_down = SigDown::try_new()?;
                dashboard
                    .watch_payments(
                        manager,
                        account,
                        Duration::from_secs(interval.max(1)),
                        sig_down.cancellation_token(),
                        |event| {
                            if let Err(error) = self.emit(event, render::payment) {
                                tracing::warn!(error = %error, "Failed to print payment event");
                            }
                        },
                    )
                    .await?;
                Ok(())
            }
        }
    }
}
