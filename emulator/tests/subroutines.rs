use indoc::indoc;
use jumpsub_emulator::bytecode::{Bytecode, DestinationKind, DestinationPolicy};
use jumpsub_emulator::constants::RETURN_STACK_LIMIT;
use jumpsub_emulator::runtime::{
    BudgetExceeded, Exception, Fault, Halt, Machine, MachineConfig, Outcome, Status, StepLimit,
};
use jumpsub_emulator::word::Word;
use jumpsub_emulator::assemble;
use pretty_assertions::assert_eq;

fn shared() -> MachineConfig {
    MachineConfig::default()
}

fn distinct() -> MachineConfig {
    MachineConfig {
        policy: DestinationPolicy::Distinct,
        ..MachineConfig::default()
    }
}

fn run(code: &[u8], config: MachineConfig) -> Result<Outcome, Fault> {
    let bytecode = Bytecode::new(code);
    Machine::new(&bytecode, config).run()
}

/// Step until halted, recording the pc before each step
fn trace_pcs(machine: &mut Machine<'_>) -> Vec<usize> {
    let mut pcs = Vec::new();
    loop {
        pcs.push(machine.pc());
        if let Status::Halted(_) = machine.step().unwrap() {
            return pcs;
        }
    }
}

#[test]
fn single_call_and_return() {
    // push1 4, jumpsub, stop, jumpdest, returnsub
    let bytecode = Bytecode::new([0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7]);
    let mut machine = Machine::new(&bytecode, shared());

    assert_eq!(trace_pcs(&mut machine), [0, 2, 4, 5, 3]);
    assert_eq!(machine.steps(), 4);
    assert_eq!(machine.halt(), Some(&Halt::Stop));
    assert!(machine.stack().is_empty());
    assert_eq!(machine.return_stack().iter().collect::<Vec<_>>(), [6]);
}

#[test]
fn unmatched_return_after_jump() {
    // push1 3, jump, jumpdest, returnsub
    let outcome = run(&[0x60, 0x03, 0x56, 0x5b, 0xb7], shared()).unwrap();
    assert_eq!(
        outcome,
        Outcome {
            halt: Halt::Stop,
            stack: vec![],
            steps: 4,
            cost: 3 + 8 + 1 + 5,
        }
    );
}

#[test]
fn return_falls_through_to_unmatched_return() {
    // push1 3, jumpsub, jumpdest, returnsub
    let bytecode = Bytecode::new([0x60, 0x03, 0xb3, 0x5b, 0xb7]);
    let mut machine = Machine::new(&bytecode, shared());

    // The first return resumes after the call, landing on the subroutine again,
    // whose second return pops the sentinel
    assert_eq!(trace_pcs(&mut machine), [0, 2, 3, 4, 3, 4, 6]);
    assert_eq!(machine.steps(), 6);
    assert!(machine.stack().is_empty());
    assert_eq!(machine.return_stack().depth(), 0);
}

#[test]
fn nested_calls_unwind_in_order() {
    let bytecode = Bytecode::new([
        0x60, 0x04, // 0: push1 4
        0xb3, // 2: jumpsub
        0x00, // 3: stop
        0x5b, // 4: jumpdest
        0x60, 0x09, // 5: push1 9
        0xb3, // 7: jumpsub
        0xb7, // 8: returnsub
        0x5b, // 9: jumpdest
        0xb7, // 10: returnsub
    ]);
    let mut machine = Machine::new(&bytecode, shared());

    let mut returns = Vec::new();
    let mut pcs = Vec::new();
    loop {
        let pc = machine.pc();
        pcs.push(pc);
        let is_return = machine.next_instruction().to_string() == "returnsub";
        if let Status::Halted(_) = machine.step().unwrap() {
            break;
        }
        if is_return {
            returns.push((pc, machine.pc()));
        }
    }

    assert_eq!(pcs, [0, 2, 4, 5, 7, 9, 10, 8, 3]);
    // The inner call (from 7) returns first, each resuming right after its call site
    assert_eq!(returns, [(10, 8), (8, 3)]);
    assert_eq!(machine.steps(), 8);
    assert!(machine.stack().is_empty());
    assert_eq!(machine.return_stack().iter().collect::<Vec<_>>(), [11]);
}

#[test]
fn return_stack_holds_call_sites() {
    let bytecode = Bytecode::new([
        0x60, 0x04, 0xb3, 0x00, // call 4 from 2
        0x5b, 0x60, 0x09, 0xb3, 0x00, // call 9 from 7
        0x5b, 0xb7,
    ]);
    let mut machine = Machine::new(&bytecode, shared());

    while machine.pc() != 9 {
        machine.step().unwrap();
    }
    assert_eq!(machine.return_stack().iter().collect::<Vec<_>>(), [11, 2, 7]);
    assert_eq!(machine.return_stack().outstanding(), 2);
}

#[test]
fn outstanding_call_limit() {
    // 0: jumpdest, push1 0, jumpsub
    let bytecode = Bytecode::new([0x5b, 0x60, 0x00, 0xb3]);
    let mut machine = Machine::new(&bytecode, shared());

    let fault = machine.run().unwrap_err();
    assert_eq!(
        fault,
        Fault {
            pc: 3,
            exception: Exception::ReturnStackOverflow,
        }
    );
    assert_eq!(machine.return_stack().outstanding(), RETURN_STACK_LIMIT);
    assert_eq!(machine.return_stack().depth(), RETURN_STACK_LIMIT + 1);
    // Every iteration is three steps, the last call never completes
    assert_eq!(machine.steps(), 3 * 1023 + 2);
    // Sticky
    assert_eq!(machine.step(), Err(fault));
}

#[test]
fn returns_free_call_slots() {
    // Calling and returning more than the limit in total is fine
    let source = indoc! {"
            push2 2000
        loop:
            jumpdest
            push1 routine
            jumpsub
            push1 1
            swap1
            sub
            dup1
            push1 loop
            jumpi
            stop
        routine:
            jumpdest
            returnsub
    "};
    let (bytecode, _) = assemble(source).unwrap();
    let outcome = Machine::new(&bytecode, shared()).run().unwrap();
    assert_eq!(outcome.halt, Halt::Stop);
    assert_eq!(outcome.stack, [Word::ZERO]);
}

#[test]
fn call_to_non_entry_faults() {
    // push1 <target>, jumpsub, stop, jumpdest, returnsub
    let entry = 4;
    for target in 0..16u8 {
        let code = [0x60, target, 0xb3, 0x00, 0x5b, 0xb7];
        let result = run(&code, shared());
        if usize::from(target) == entry {
            assert!(result.is_ok());
            continue;
        }

        assert_eq!(
            result,
            Err(Fault {
                pc: 2,
                exception: Exception::InvalidDestination {
                    destination: Word::from(u64::from(target)),
                    kind: DestinationKind::Subroutine,
                },
            }),
            "target {target}"
        );
    }
}

#[test]
fn call_into_push_immediate_faults() {
    // push1 4, jumpsub, push1 0x5b: offset 4 looks like a jumpdest but is data
    let result = run(&[0x60, 0x04, 0xb3, 0x60, 0x5b], shared());
    assert!(matches!(
        result,
        Err(Fault {
            pc: 2,
            exception: Exception::InvalidDestination { .. }
        })
    ));
}

#[test]
fn call_without_target_underflows() {
    assert_eq!(
        run(&[0xb3], shared()),
        Err(Fault {
            pc: 0,
            exception: Exception::StackUnderflow,
        })
    );
}

#[test]
fn huge_target_is_invalid() {
    let mut code = vec![0x7f];
    code.extend([0xff; 32]);
    code.push(0xb3);
    assert_eq!(
        run(&code, shared()),
        Err(Fault {
            pc: 33,
            exception: Exception::InvalidDestination {
                destination: Word::MAX,
                kind: DestinationKind::Subroutine,
            },
        })
    );
}

#[test]
fn distinct_policy_uses_beginsub() {
    // push1 4, jumpsub, stop, beginsub, returnsub
    let code = [0x60, 0x04, 0xb3, 0x00, 0xb5, 0xb7];

    let outcome = run(&code, distinct()).unwrap();
    assert_eq!(outcome.steps, 4);
    assert!(outcome.stack.is_empty());

    assert_eq!(
        run(&code, shared()),
        Err(Fault {
            pc: 2,
            exception: Exception::InvalidDestination {
                destination: Word::from(4u64),
                kind: DestinationKind::Subroutine,
            },
        })
    );
}

#[test]
fn distinct_policy_separates_destinations() {
    // Calling a jumpdest
    assert!(matches!(
        run(&[0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7], distinct()),
        Err(Fault {
            pc: 2,
            exception: Exception::InvalidDestination {
                kind: DestinationKind::Subroutine,
                ..
            }
        })
    ));

    // Jumping to a beginsub
    assert!(matches!(
        run(&[0x60, 0x03, 0x56, 0xb5, 0x00], distinct()),
        Err(Fault {
            pc: 2,
            exception: Exception::InvalidDestination {
                kind: DestinationKind::Jump,
                ..
            }
        })
    ));
}

#[test]
fn beginsub_falls_through_only_when_distinct() {
    let outcome = run(&[0xb5, 0x00], distinct()).unwrap();
    assert_eq!(outcome.steps, 1);

    assert_eq!(
        run(&[0xb5, 0x00], shared()),
        Err(Fault {
            pc: 0,
            exception: Exception::InvalidInstruction(0xb5),
        })
    );
}

/// A chain of `calls` subroutine calls that never return, ending with a stop
fn call_chain(calls: u8) -> Vec<u8> {
    let mut code = Vec::new();
    for link in 0..calls {
        // jumpdest, push1 <next link>, jumpsub
        code.extend([0x5b, 0x60, 4 * (link + 1), 0xb3]);
    }
    code.extend([0x5b, 0x00]);
    code
}

#[test]
fn depth_without_returns() {
    for calls in 0..32 {
        let bytecode = Bytecode::new(call_chain(calls));
        let mut machine = Machine::new(&bytecode, shared());
        machine.run().unwrap();

        let calls = usize::from(calls);
        assert_eq!(machine.return_stack().depth(), calls + 1);
        assert_eq!(machine.return_stack().outstanding(), calls);
        let call_sites: Vec<_> = machine.return_stack().iter().skip(1).collect();
        let expected: Vec<_> = (0..calls).map(|link| 4 * link + 3).collect();
        assert_eq!(call_sites, expected);
    }
}

#[test]
fn unmatched_return_halts_on_any_code() {
    let prefixes: [&[u8]; 5] = [
        &[],
        &[0x5b],
        &[0x60, 0x01, 0x50],
        &[0x60, 0x01, 0x60, 0x02, 0x01],
        &[0x58, 0x59, 0x03],
    ];

    for prefix in prefixes {
        let mut code = prefix.to_vec();
        code.push(0xb7);
        let bytecode = Bytecode::new(code);
        let mut machine = Machine::new(&bytecode, shared());

        while machine.next_instruction().to_string() != "returnsub" {
            machine.step().unwrap();
        }
        let steps = machine.steps();
        assert_eq!(machine.return_stack().iter().collect::<Vec<_>>(), [bytecode.len()]);

        // Resumes one past the sentinel, which is the code size
        assert_eq!(machine.step(), Ok(Status::Running));
        assert_eq!(machine.pc(), bytecode.len() + 1);
        assert_eq!(machine.steps(), steps + 1);

        assert_eq!(machine.step(), Ok(Status::Halted(Halt::Stop)));
        assert_eq!(machine.steps(), steps + 1);
        assert_eq!(machine.return_stack().depth(), 0);
    }
}

#[test]
fn budget_preserves_state() {
    let bytecode = Bytecode::new([0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7]);
    let mut machine = Machine::new(&bytecode, shared()).with_budget(StepLimit::new(2));

    let fault = machine.run().unwrap_err();
    assert_eq!(
        fault,
        Fault {
            pc: 4,
            exception: Exception::BudgetExceeded(BudgetExceeded::Steps { limit: 2 }),
        }
    );
    assert_eq!(machine.pc(), 4);
    assert_eq!(machine.steps(), 2);
    assert_eq!(machine.return_stack().outstanding(), 1);
}

#[test]
fn budget_never_charges_the_halt() {
    let bytecode = Bytecode::new([0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7]);
    let outcome = Machine::new(&bytecode, shared())
        .with_budget(StepLimit::new(4))
        .run()
        .unwrap();
    assert_eq!(outcome.steps, 4);
}
