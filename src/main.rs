// src/main.rs

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use genesis_node::blocktime::{BlockGenerationState, BlockTimeCalculator};
use genesis_node::clock::SystemClock;
use genesis_node::config::NodeConfig;
use genesis_node::producer::{ProducerLoop, ProducerLoopConfig, ProducerNode};
use genesis_node::roster::{NodeEntry, StaticRoster, ValidatorRoster};
use genesis_node::scheduler::{ContractHandler, SideEffect, Task, TaskHandler};

/// Dev side-effect: no contract VM is wired in, firings just land in the log.
struct LogOnlyContract;

impl SideEffect for LogOnlyContract {
    fn invoke(&self, name: &str) -> Result<()> {
        info!(contract = name, "dev contract invoked");
        Ok(())
    }
}

/// Node that reacts to its owned slots by firing the block task through the
/// contract handler.
struct ContractNode {
    handler: ContractHandler<LogOnlyContract>,
    task: Task,
}

impl ProducerNode for ContractNode {
    fn generate(&mut self, state: &BlockGenerationState) -> Result<()> {
        info!(
            position = state.node_position,
            budget_ms = state.duration.as_millis() as u64,
            "slot owned, running block task"
        );
        self.handler.run(&self.task);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let clock = Arc::new(SystemClock);

    // With a genesis file the node joins its fleet; without one it runs a
    // single-validator dev schedule starting now.
    let (roster, calc) = match std::env::args().nth(1) {
        Some(path) => {
            let cfg = NodeConfig::load(&path)?;
            let roster = StaticRoster::from_genesis(cfg.genesis.validators.clone(), cfg.node_id)?;
            let calc = BlockTimeCalculator::new(
                clock,
                cfg.genesis.first_block_time(),
                cfg.genesis.block_gen_time(),
                cfg.genesis.blocks_gap(),
                roster.nodes_count(),
            )?;
            (roster, calc)
        }
        None => {
            let entries = vec![NodeEntry {
                id: 1,
                name: "dev".to_string(),
            }];
            let roster = StaticRoster::from_genesis(entries, 1)?;
            let calc = BlockTimeCalculator::new(
                clock,
                SystemTime::now(),
                Duration::from_secs(2),
                Duration::ZERO,
                roster.nodes_count(),
            )?;
            (roster, calc)
        }
    };

    info!(
        nodes = roster.nodes_count(),
        position = roster.my_position(),
        slot_ms = calc.slot_length().as_millis() as u64,
        "node up"
    );

    let node = ContractNode {
        handler: ContractHandler::new("NewBlock", LogOnlyContract),
        task: Task::new("block-producer", "@slot"),
    };
    let mut producer = ProducerLoop::new(
        calc,
        roster.my_position(),
        node,
        ProducerLoopConfig::default(),
    );

    // Ticker so polling stays aligned even if producing takes time
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        ticker.tick().await;
        // Idle ticks are normal (boundary second, other nodes' slots); the
        // loop logs the interesting outcomes itself.
        let _ = producer.tick_once();
    }
}
