use std::time::{SystemTime, UNIX_EPOCH};

use odra::host::HostEnv;
use odra::prelude::Addressable;

use odra_cli::{
    deploy::DeployScript,
    scenario::{Args, Error, Scenario, ScenarioMetadata},
    CommandArg, ContractProvider, DeployedContractsContainer, DeployerExt, OdraCli,
};

use fantasma_lending::oracle::{AssetId, DEFAULT_MAX_PRICE_AGE_SECS};
use fantasma_lending::processor::{FantasmaLending, FantasmaLendingInitArgs};
use fantasma_lending::state::ReserveConfig;

/// Asset listed by the deploy script so the query scenarios have something
/// to look at.
const DEMO_ASSET: AssetId = [7u8; 32];

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Deploys the lending market and lists a demo reserve with the baseline
/// risk parameters.
pub struct MarketDeployScript;

impl DeployScript for MarketDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer,
    ) -> Result<(), odra_cli::deploy::Error> {
        log::info!("Deploying Fantasma lending market...");

        let mut market = FantasmaLending::load_or_deploy(
            env,
            FantasmaLendingInitArgs {
                owner: env.get_account(0),
                max_price_age_secs: DEFAULT_MAX_PRICE_AGE_SECS,
            },
            container,
            200_000_000_000,
        )?;

        log::info!("Market deployed at: {:?}", market.address());

        // idempotent across re-runs; an existing listing is left alone
        match market.try_list_reserve(DEMO_ASSET, ReserveConfig::baseline(), unix_now()) {
            Ok(()) => log::info!("Demo reserve listed"),
            Err(err) => log::warn!("Demo reserve not listed: {:?}", err),
        }

        Ok(())
    }
}

/// Prints the demo reserve's committed snapshot and current utilization.
pub struct ReserveStatusScenario;

impl Scenario for ReserveStatusScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        _args: Args,
    ) -> Result<(), Error> {
        let market = container.contract_ref::<FantasmaLending>(env)?;

        match market.try_get_reserve(DEMO_ASSET) {
            Ok(reserve) => {
                println!("Reserve version:      {}", reserve.version);
                println!("Total liquidity:      {}", reserve.total_liquidity);
                println!("Total borrowed:       {}", reserve.total_borrowed);
                println!("Liquidity index:      {}", reserve.liquidity_index);
                println!("Borrow index:         {}", reserve.variable_borrow_index);
                match market.try_utilization_rate(DEMO_ASSET) {
                    Ok(utilization) => println!("Utilization:          {}", utilization),
                    Err(err) => println!("Utilization query failed: {:?}", err),
                }
            }
            Err(err) => println!("Demo reserve unavailable: {:?}", err),
        }

        Ok(())
    }
}

impl ScenarioMetadata for ReserveStatusScenario {
    const NAME: &'static str = "reserve-status";
    const DESCRIPTION: &'static str = "Prints the demo reserve's committed snapshot";
}

pub fn main() {
    OdraCli::new()
        .about("CLI tool for the Fantasma lending market")
        .deploy(MarketDeployScript)
        .contract::<FantasmaLending>()
        .scenario(ReserveStatusScenario)
        .build()
        .run();
}
