use clap::{ArgAction, Parser};
use jumpsub_emulator::bytecode::DestinationPolicy;
use jumpsub_emulator::constants::DEFAULT_MEMORY_LIMIT;
use jumpsub_emulator::runtime::{
    Budget, CostLimit, Halt, Machine, MachineConfig, StepLimit, Unlimited,
};
use jumpsub_emulator::word::Word;
use tracing::{debug, info, warn};

use super::input::{InputOpt, Loaded};
use crate::interactive::run_interactive;

/// Hex-encode some output bytes, `0x`-prefixed
fn hex(bytes: &[u8]) -> String {
    let digits: Vec<_> = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("0x{}", digits.concat())
}

#[derive(Parser, Debug)]
pub struct RunOpt {
    #[command(flatten)]
    input: InputOpt,

    /// Which markers are valid jump and subroutine destinations
    #[arg(long, default_value_t = DestinationPolicy::Shared)]
    policy: DestinationPolicy,

    /// Abort after executing this many instructions
    #[arg(long, conflicts_with = "max_cost")]
    max_steps: Option<u64>,

    /// Abort once the total cost of the executed instructions would exceed this
    #[arg(long)]
    max_cost: Option<u64>,

    /// Upper bound on the memory size, in bytes
    #[arg(long, default_value_t = DEFAULT_MEMORY_LIMIT)]
    memory_limit: usize,

    /// Push a word on the data stack before starting. Can be used multiple times, bottom first
    #[arg(long = "push", value_name = "WORD")]
    initial_stack: Vec<Word>,

    /// Run the program in interactive mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    interactive: bool,
}

impl RunOpt {
    fn budget(&self) -> Box<dyn Budget> {
        match (self.max_steps, self.max_cost) {
            (Some(steps), _) => Box::new(StepLimit::new(steps)),
            (None, Some(cost)) => Box::new(CostLimit::new(cost)),
            (None, None) => Box::new(Unlimited),
        }
    }

    pub fn exec(self) -> anyhow::Result<()> {
        let Loaded {
            bytecode,
            debug_info,
        } = self.input.load()?;

        let config = MachineConfig {
            policy: self.policy,
            memory_limit: self.memory_limit,
        };
        debug!(?config, size = bytecode.len(), "Building machine");
        let mut machine = Machine::new(&bytecode, config)
            .with_budget(self.budget())
            .with_stack(self.initial_stack.iter().copied())?;

        if self.interactive {
            return run_interactive(&mut machine, debug_info.unwrap_or_default());
        }

        info!("Running program");
        let outcome = machine.run()?;

        let stack: Vec<String> = outcome.stack.iter().map(ToString::to_string).collect();
        info!(
            halt = %outcome.halt,
            steps = outcome.steps,
            cost = outcome.cost,
            return_stack = machine.return_stack().depth(),
            stack = %stack.join(", "),
            "End of program",
        );

        match &outcome.halt {
            Halt::Stop => {}
            Halt::Return(output) => println!("{}", hex(output)),
            Halt::Revert(output) => {
                warn!("Execution reverted");
                println!("{}", hex(output));
            }
        }

        Ok(())
    }
}
