use clap::Parser;

mod completion;
mod dests;
mod disasm;
mod input;
mod run;
mod sig;

#[derive(Parser, Debug)]
pub enum Subcommand {
    /// Assemble or load a program, and run it
    Run(self::run::RunOpt),

    /// Print a listing of a program
    Disasm(self::disasm::DisasmOpt),

    /// List the valid jump and subroutine destinations of a program
    Dests(self::dests::DestsOpt),

    /// Convert signatures to and from their compact form
    Sig(self::sig::SigOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
            Self::Disasm(opt) => opt.exec(),
            Self::Dests(opt) => opt.exec(),
            Self::Sig(opt) => opt.exec(),
            Self::Completion(opt) => opt.exec(),
        }
    }
}
