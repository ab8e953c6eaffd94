// src/scheduler/contract.rs

use tracing::{error, info};

use crate::scheduler::{Task, TaskHandler};

/// Seam to the external contract machinery. The scheduler core drives
/// side-effects by name and treats anything non-successful as a logged
/// failure; what "invoking a contract" means is entirely the implementor's
/// business.
pub trait SideEffect: Send + Sync {
    fn invoke(&self, name: &str) -> anyhow::Result<()>;
}

/// Binds one named contract to task firings.
pub struct ContractHandler<E> {
    contract: String,
    effect: E,
}

impl<E: SideEffect> ContractHandler<E> {
    pub fn new(contract: impl Into<String>, effect: E) -> Self {
        Self {
            contract: contract.into(),
            effect,
        }
    }

    #[inline]
    pub fn contract(&self) -> &str {
        &self.contract
    }
}

impl<E: SideEffect> TaskHandler for ContractHandler<E> {
    /// Executes the bound contract. Errors are captured in the log with the
    /// task identity and the contract name, never propagated.
    fn run(&self, task: &Task) {
        if let Err(err) = self.effect.invoke(&self.contract) {
            error!(task = %task, contract = %self.contract, error = %err, "run contract task");
            return;
        }

        info!(task = %task, contract = %self.contract, "run contract task");
    }
}
