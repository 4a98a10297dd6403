//! This module implements the TTY interactive interface.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands
//!
//! Using Parser to do this is a bit of a hack, and requires some weird options
//! to have it working but works nonetheless.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use anyhow::Context as _;
use clap::Parser;
use jumpsub_emulator::compiler::DebugInfo;
use jumpsub_emulator::constants::Address;
use jumpsub_emulator::runtime::{Budget, Machine, Status};
use jumpsub_emulator::word::{Word, WordError};
use rustyline::history::DefaultHistory;
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use tracing::{debug, info, warn};

mod helper;
use self::helper::RunHelper;

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

/// Bytes shown per line by the `memory` command
const MEMORY_ROW: usize = 16;

/// A code offset, either a number literal or a label
#[derive(Clone, Debug)]
enum Location {
    Offset(Word),
    Label(String),
}

impl FromStr for Location {
    type Err = WordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            Word::from_str(s).map(Self::Offset)
        } else {
            Ok(Self::Label(s.to_owned()))
        }
    }
}

impl Location {
    fn resolve(&self, labels: &BTreeMap<String, Address>) -> anyhow::Result<Address> {
        match self {
            Self::Offset(word) => word
                .to_usize()
                .with_context(|| format!("offset {word} is out of range")),
            Self::Label(label) => labels
                .get(label)
                .copied()
                .with_context(|| format!("unknown label {label:?}")),
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[clap(
    help_template = "{about}\n\nCOMMANDS:\n{subcommands}\n{after-help}",
    after_help = HELP,
    disable_version_flag = true,
    infer_subcommands = true,
    no_binary_name = true,
)]
/// Interactive mode commands
enum Command {
    /// Execute the next instructions
    #[command(alias = "s")]
    Step {
        /// Number of steps to execute
        #[clap(value_parser, default_value = "1")]
        number: u64,
    },

    /// Exit the emulator
    Exit,

    /// Show the data stack, top first
    Stack,

    /// Show the return-address stack, top first
    Returns,

    /// Show the content of a block in memory
    Memory {
        /// Offset of the first byte to show
        #[clap(value_parser)]
        offset: Word,

        /// Number of bytes to show
        #[clap(value_parser, default_value = "32")]
        number: usize,
    },

    /// Show the next few instructions
    List {
        /// Number of instructions to show
        #[clap(value_parser, default_value = "10")]
        number: usize,
    },

    /// Set a breakpoint
    Break {
        /// The offset where to set the breakpoint, or a label
        #[clap(value_parser)]
        location: Location,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The offset of the breakpoint to remove, or a label
        #[clap(value_parser)]
        location: Location,
    },

    /// Continue the program until the next breakpoint or the end
    #[command(alias = "c")]
    Continue,

    /// Show informations about the current debugging session
    Info {
        #[clap(subcommand)]
        sub: Option<InfoCommand>,
    },
}

#[derive(Parser, Clone, Debug)]
enum InfoCommand {
    /// List active breakpoints
    Breakpoints,

    /// List program labels
    Labels,

    /// Show the number of steps executed and their total cost
    Cost,
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// List of active breakpoints
    breakpoints: HashSet<Address>,

    /// Map of labels in program
    labels: BTreeMap<String, Address>,

    /// Current offset for the `list` command
    list_address: Option<Address>,
}

impl Session {
    fn from_debug_info(info: DebugInfo) -> Session {
        Session {
            labels: info.labels,
            ..Default::default()
        }
    }

    fn add_breakpoint(&mut self, address: Address) {
        if self.breakpoints.insert(address) {
            info!(address, "Setting a breakpoint");
        } else {
            warn!(address, "A breakpoint was already set");
        }
    }

    fn remove_breakpoint(&mut self, address: Address) {
        if self.breakpoints.remove(&address) {
            info!(address, "Removing breakpoint");
        } else {
            warn!(address, "No breakpoint was set here");
        }
    }

    fn has_breakpoint(&self, address: Address) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Display the list of breakpoints
    fn display_breakpoints<B>(&self, machine: &Machine<'_, B>) {
        match self.breakpoints.len() {
            0 => info!("No breakpoints"),
            1 => info!("1 breakpoint:"),
            x => info!("{} breakpoints:", x),
        }

        let mut bp: Vec<_> = self.breakpoints.iter().copied().collect();
        bp.sort_unstable();
        for addr in bp {
            self.display_instruction(machine, addr);
        }
    }

    /// Display the instruction at an offset, returns the offset of the next one
    fn display_instruction<B>(&self, machine: &Machine<'_, B>, address: Address) -> Address {
        for label in self
            .labels
            .iter()
            .filter(|&(_, &at)| at == address)
            .map(|(label, _)| label)
        {
            info!("          {}:", label);
        }

        let is_current_line = machine.pc() == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        let instruction = machine.code().fetch(address);
        info!("{:<2} {:#06x}    {}", gutter, address, instruction);
        address + instruction.size()
    }

    /// Display the next `number` instructions, continuing the previous listing
    fn display_list<B>(&mut self, machine: &Machine<'_, B>, number: usize) {
        let mut address = self.list_address.unwrap_or(machine.pc());
        for _ in 0..number {
            if address >= machine.code().len() {
                info!("End of code");
                break;
            }
            address = self.display_instruction(machine, address);
        }
        self.list_address = Some(address);
    }

    fn display_labels(&self) {
        match self.labels.len() {
            0 => info!("No labels"),
            1 => info!("1 label:"),
            x => info!("{} labels:", x),
        }

        for (label, &addr) in &self.labels {
            info!("  {} => {:#06x}", label, addr);
        }
    }

    fn display_cost<B>(machine: &Machine<'_, B>) {
        info!(steps = machine.steps(), cost = machine.cost(), "Execution cost");
    }
}

fn display_stack<B>(machine: &Machine<'_, B>) {
    let stack = machine.stack().as_slice();
    if stack.is_empty() {
        info!("Stack is empty");
    }

    for (depth, word) in stack.iter().rev().enumerate() {
        info!("  {:>4}  {:#x}", depth, word);
    }
}

fn display_returns<B>(machine: &Machine<'_, B>) {
    let return_stack = machine.return_stack();
    info!(
        depth = return_stack.depth(),
        outstanding = return_stack.outstanding(),
        "Return stack"
    );

    let entries: Vec<_> = return_stack.iter().collect();
    for (depth, call_site) in entries.into_iter().rev().enumerate() {
        info!("  {:>4}  {:#06x}", depth, call_site);
    }
}

fn display_memory<B>(machine: &Machine<'_, B>, offset: Address, number: usize) {
    let bytes = machine.memory().as_bytes();
    let end = offset.saturating_add(number).min(bytes.len());
    let Some(block) = bytes.get(offset..end) else {
        warn!(offset, size = bytes.len(), "Offset is past the end of memory");
        return;
    };

    for (i, row) in block.chunks(MEMORY_ROW).enumerate() {
        let hex: Vec<_> = row.iter().map(|byte| format!("{byte:02x}")).collect();
        info!("{:#06x}  {}", offset + i * MEMORY_ROW, hex.join(" "));
    }
}

/// Execute one instruction, returns `true` if the machine stopped
fn step<B: Budget>(machine: &mut Machine<'_, B>) -> bool {
    match machine.step() {
        Ok(Status::Running) => false,
        Ok(Status::Halted(halt)) => {
            info!(%halt, steps = machine.steps(), "Halted");
            true
        }
        Err(e) => {
            warn!(error = &e as &dyn std::error::Error, "Aborted");
            true
        }
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive<B: Budget>(
    machine: &mut Machine<'_, B>,
    debug_info: DebugInfo,
) -> anyhow::Result<()> {
    info!("Running in interactive mode. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut session = Session::from_debug_info(debug_info);

    let h: RunHelper<Command> = RunHelper::new(session.labels.keys().cloned().collect());
    let mut rl = Editor::<RunHelper<Command>, DefaultHistory>::with_config(config)
        .context("could not initialize terminal input")?;
    rl.set_helper(Some(h));

    let mut last_command: Option<Command> = None;
    let mut halted = false;

    'read: loop {
        // A macro to unwrap an error, log it and continue the loop
        macro_rules! warn_and_continue {
            ($e:expr) => {
                match $e {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(error = %e);
                        continue 'read;
                    }
                }
            };
        }

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exitting");
            return Ok(());
        };

        let command = if readline.is_empty() {
            if let Some(command) = &last_command {
                command.clone()
            } else {
                info!("Type \"help\" to get the list of available commands");
                continue 'read;
            }
        } else {
            let Ok(words) = shell_words::split(readline.as_str()) else {
                warn!("Invalid input");
                continue 'read;
            };

            let command = warn_and_continue!(Command::try_parse_from(words));
            last_command = Some(command.clone());
            command
        };

        debug!("Executing command: {:?}", command);

        match (command, halted) {
            (Command::Exit, _) => break,
            (Command::Step { number }, false) => {
                session.reset_list();

                for _ in 0..number {
                    if step(machine) {
                        halted = true;
                        continue 'read;
                    }
                }
                session.display_instruction(machine, machine.pc());
            }

            (Command::Stack, _) => display_stack(machine),

            (Command::Returns, _) => display_returns(machine),

            (Command::Memory { offset, number }, _) => {
                let offset = warn_and_continue!(offset
                    .to_usize()
                    .with_context(|| format!("offset {offset} is out of range")));
                display_memory(machine, offset, number);
            }

            (Command::List { number }, _) => session.display_list(machine, number),

            (Command::Break { location }, _) => {
                let address = warn_and_continue!(location.resolve(&session.labels));
                session.add_breakpoint(address);
            }

            (Command::Unbreak { location }, _) => {
                let address = warn_and_continue!(location.resolve(&session.labels));
                session.remove_breakpoint(address);
            }

            (Command::Continue, false) => {
                session.reset_list();

                loop {
                    if step(machine) {
                        halted = true;
                        continue 'read;
                    }

                    if session.has_breakpoint(machine.pc()) {
                        info!(address = machine.pc(), "Stopped at a breakpoint");
                        session.display_instruction(machine, machine.pc());
                        break;
                    }
                }
            }

            (Command::Info { sub }, _) => match sub {
                Some(InfoCommand::Breakpoints) => session.display_breakpoints(machine),
                Some(InfoCommand::Labels) => session.display_labels(),
                Some(InfoCommand::Cost) => Session::display_cost(machine),
                None => {
                    session.display_breakpoints(machine);
                    info!("–");
                    session.display_labels();
                    info!("–");
                    Session::display_cost(machine);
                }
            },

            (_, true) => {
                // Machine is halted but the user asked to continue, we just warn
                warn!("Machine is halted. Use \"exit\" to quit");
            }
        }
    }

    Ok(())
}
