//! Loading programs from files, either as assembly source or as bytecode

use std::process::exit;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum, ValueHint};
use jumpsub_emulator::compiler::DebugInfo;
use jumpsub_emulator::{assemble, Bytecode};
use miette::NamedSource;
use tracing::{debug, info};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Assembly source
    Asm,
    /// Hex-encoded bytecode, optionally prefixed with `0x`
    Hex,
    /// Raw bytecode
    Bin,
}

impl Format {
    /// Guess the format from the file extension, defaulting to assembly
    fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some("hex") => Self::Hex,
            Some("bin") => Self::Bin,
            _ => Self::Asm,
        }
    }
}

#[derive(Args, Debug)]
pub struct InputOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Format of the input file. Guessed from its extension if not set
    #[arg(short, long, value_enum)]
    format: Option<Format>,
}

/// A program ready to run
pub struct Loaded {
    pub bytecode: Bytecode,
    pub debug_info: Option<DebugInfo>,
}

impl InputOpt {
    pub fn load(&self) -> anyhow::Result<Loaded> {
        let format = self
            .format
            .unwrap_or_else(|| Format::from_path(&self.input));
        info!(path = %self.input, ?format, "Reading program");

        match format {
            Format::Bin => {
                let code = std::fs::read(&self.input)
                    .with_context(|| format!("could not read {}", self.input))?;
                Ok(Loaded {
                    bytecode: Bytecode::new(code),
                    debug_info: None,
                })
            }

            Format::Hex => {
                let source = std::fs::read_to_string(&self.input)
                    .with_context(|| format!("could not read {}", self.input))?;
                let bytecode = Bytecode::from_hex(&source)?;
                Ok(Loaded {
                    bytecode,
                    debug_info: None,
                })
            }

            Format::Asm => {
                let source = std::fs::read_to_string(&self.input)
                    .with_context(|| format!("could not read {}", self.input))?;

                debug!("Assembling program");
                match assemble(&source) {
                    Ok((bytecode, debug_info)) => Ok(Loaded {
                        bytecode,
                        debug_info: Some(debug_info),
                    }),
                    Err(e) => {
                        let report = miette::Report::new(e)
                            .with_source_code(NamedSource::new(self.input.as_str(), source));
                        eprintln!("{report:?}");
                        exit(1);
                    }
                }
            }
        }
    }
}
