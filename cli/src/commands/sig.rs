use anyhow::Context;
use clap::{Parser, Subcommand};
use jumpsub_emulator::parser::parse_hex_bytes;
use jumpsub_emulator::signature::{CompactSignature, Signature};
use jumpsub_emulator::word::Word;
use tracing::debug;

#[derive(Parser, Debug)]
pub struct SigOpt {
    #[command(subcommand)]
    command: SigCommand,
}

#[derive(Subcommand, Debug)]
enum SigCommand {
    /// Fold the parity of a signature into its `s` value
    Compact {
        /// The `r` value
        r: Word,
        /// The `s` value, its top bit must be cleared
        s: Word,
        /// Recovery id, either 0/1 or 27/28
        v: u8,
    },

    /// Split a compact signature back into `(r, s, v)`
    Expand {
        /// The `r` value
        r: Word,
        /// The `s` value with the parity in its top bit
        vs: Word,
    },

    /// Expand a 64-byte compact signature given in hex
    Decode {
        /// Hex-encoded `r || vs`
        bytes: String,
    },
}

fn print_expanded(signature: &Signature) {
    println!("r  {:#x}", signature.r);
    println!("s  {:#x}", signature.s);
    println!("v  {}", signature.v());
}

impl SigOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        match self.command {
            SigCommand::Compact { r, s, v } => {
                let compact = Signature::new(r, s, v)?.to_compact()?;
                debug!(%compact, "Compacted signature");
                println!("r  {:#x}", compact.r);
                println!("vs {:#x}", compact.vs);
                println!("{compact}");
            }

            SigCommand::Expand { r, vs } => {
                print_expanded(&CompactSignature { r, vs }.expand());
            }

            SigCommand::Decode { bytes } => {
                let bytes = parse_hex_bytes(&bytes).context("invalid hex input")?;
                let compact = CompactSignature::from_bytes(&bytes)?;
                print_expanded(&compact.expand());
            }
        }

        Ok(())
    }
}
