use clap::Parser;
use jumpsub_emulator::bytecode::{DestinationKind, DestinationPolicy};
use tracing::info;

use super::input::{InputOpt, Loaded};

#[derive(Parser, Debug)]
pub struct DestsOpt {
    #[command(flatten)]
    input: InputOpt,

    /// Which markers are valid jump and subroutine destinations
    #[arg(long, default_value_t = DestinationPolicy::Shared)]
    policy: DestinationPolicy,

    /// Only list destinations of this kind
    #[arg(long)]
    kind: Option<DestinationKind>,
}

impl DestsOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let Loaded {
            bytecode,
            debug_info,
        } = self.input.load()?;
        let destinations = bytecode.destinations(self.policy);

        let kinds = match self.kind {
            Some(kind) => vec![kind],
            None => vec![DestinationKind::Jump, DestinationKind::Subroutine],
        };

        for kind in kinds {
            let offsets: Vec<_> = destinations.of_kind(kind).collect();
            info!(%kind, policy = %self.policy, count = offsets.len(), "Destinations");

            let kind = kind.to_string();
            for offset in offsets {
                let labels: Vec<_> = debug_info
                    .iter()
                    .flat_map(|info| info.labels_at(offset))
                    .collect();

                if labels.is_empty() {
                    println!("{kind:<10} {offset:#06x}");
                } else {
                    println!("{kind:<10} {offset:#06x}  {}", labels.join(", "));
                }
            }
        }

        Ok(())
    }
}
