use clap::Parser;
use jumpsub_emulator::bytecode::DestinationPolicy;
use jumpsub_emulator::disassemble;
use tracing::debug;

use super::input::{InputOpt, Loaded};

#[derive(Parser, Debug)]
pub struct DisasmOpt {
    #[command(flatten)]
    input: InputOpt,

    /// Which markers are valid jump and subroutine destinations
    #[arg(long, default_value_t = DestinationPolicy::Shared)]
    policy: DestinationPolicy,
}

impl DisasmOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let Loaded {
            bytecode,
            debug_info,
        } = self.input.load()?;

        debug!(size = bytecode.len(), policy = %self.policy, "Disassembling");
        let destinations = bytecode.destinations(self.policy);
        print!(
            "{}",
            disassemble(&bytecode, debug_info.as_ref(), Some(&destinations))
        );

        Ok(())
    }
}
