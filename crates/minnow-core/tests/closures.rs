use std::sync::Arc;

use minnow_core::vm::LambdaFactory;
use minnow_core::{Lambda, Opcode, Program, Value, Vm};

// A factory whose lambda body lives at `entry` in the shared program. The
// private frame has three slots: the capture at 0, the parameter at 1, the
// result at 2.
fn add_capture_factory(entry: u32, capture_reg: u32) -> LambdaFactory {
    LambdaFactory {
        model: Lambda {
            ext_top: 1,
            prm_top: 2,
            dest: 2,
            entry,
            frame: Arc::new(vec![Value::Undefined, Value::Undefined, Value::Undefined]),
            captures: Vec::new(),
        },
        ext_mem: vec![capture_reg],
    }
}

#[test]
fn a_closure_adds_its_capture_to_its_argument() {
    let mut p = Program::blank();
    let x = p.reserve(Value::Int(41));
    let f = p.reserve(Value::Undefined);
    let arg = p.reserve(Value::Int(1));
    let dst = p.reserve(Value::Undefined);
    let lfc = p.add_factory(add_capture_factory(1, x));
    p.emit(Opcode::Jmp, vec![3]);
    p.emit(Opcode::Addi, vec![2, 0, 1]);
    p.emit(Opcode::Ret, vec![]);
    p.emit(Opcode::Mkfn, vec![f, lfc]);
    p.emit(Opcode::Dofn, vec![dst, f, arg]);
    p.emit(Opcode::Halt, vec![]);

    let mut vm = Vm::new(Arc::new(p));
    vm.run(0).unwrap();
    assert_eq!(vm.mem[dst as usize], Value::Int(42));
}

#[test]
fn captures_snapshot_the_registers_at_mkfn_time() {
    let mut p = Program::blank();
    let x = p.reserve(Value::Int(41));
    let later = p.reserve(Value::Int(1000));
    let f = p.reserve(Value::Undefined);
    let arg = p.reserve(Value::Int(1));
    let dst = p.reserve(Value::Undefined);
    let lfc = p.add_factory(add_capture_factory(1, x));
    p.emit(Opcode::Jmp, vec![3]);
    p.emit(Opcode::Addi, vec![2, 0, 1]);
    p.emit(Opcode::Ret, vec![]);
    p.emit(Opcode::Mkfn, vec![f, lfc]);
    // Clobber the captured register after the snapshot.
    p.emit(Opcode::Asgm, vec![x, later]);
    p.emit(Opcode::Dofn, vec![dst, f, arg]);
    p.emit(Opcode::Halt, vec![]);

    let mut vm = Vm::new(Arc::new(p));
    vm.run(0).unwrap();
    assert_eq!(vm.mem[dst as usize], Value::Int(42));
}

#[test]
fn repeated_invocations_are_pure() {
    // The body clobbers its own capture slot after using it; a fresh frame
    // per activation means the second call cannot see that.
    let mut p = Program::blank();
    let x = p.reserve(Value::Int(41));
    let f = p.reserve(Value::Undefined);
    let arg = p.reserve(Value::Int(1));
    let first = p.reserve(Value::Undefined);
    let second = p.reserve(Value::Undefined);
    let lfc = p.add_factory(add_capture_factory(1, x));
    p.emit(Opcode::Jmp, vec![4]);
    p.emit(Opcode::Addi, vec![2, 0, 1]);
    p.emit(Opcode::Asgm, vec![0, 2]);
    p.emit(Opcode::Ret, vec![]);
    p.emit(Opcode::Mkfn, vec![f, lfc]);
    p.emit(Opcode::Dofn, vec![first, f, arg]);
    p.emit(Opcode::Dofn, vec![second, f, arg]);
    p.emit(Opcode::Halt, vec![]);

    let mut vm = Vm::new(Arc::new(p));
    vm.run(0).unwrap();
    assert_eq!(vm.mem[first as usize], Value::Int(42));
    assert_eq!(vm.mem[first as usize], vm.mem[second as usize]);
}

#[test]
fn two_closures_from_one_factory_hold_separate_captures() {
    let mut p = Program::blank();
    let x = p.reserve(Value::Int(10));
    let swap = p.reserve(Value::Int(20));
    let f1 = p.reserve(Value::Undefined);
    let f2 = p.reserve(Value::Undefined);
    let arg = p.reserve(Value::Int(1));
    let r1 = p.reserve(Value::Undefined);
    let r2 = p.reserve(Value::Undefined);
    let lfc = p.add_factory(add_capture_factory(1, x));
    p.emit(Opcode::Jmp, vec![3]);
    p.emit(Opcode::Addi, vec![2, 0, 1]);
    p.emit(Opcode::Ret, vec![]);
    p.emit(Opcode::Mkfn, vec![f1, lfc]);
    p.emit(Opcode::Asgm, vec![x, swap]);
    p.emit(Opcode::Mkfn, vec![f2, lfc]);
    p.emit(Opcode::Dofn, vec![r1, f1, arg]);
    p.emit(Opcode::Dofn, vec![r2, f2, arg]);
    p.emit(Opcode::Halt, vec![]);

    let mut vm = Vm::new(Arc::new(p));
    vm.run(0).unwrap();
    assert_eq!(vm.mem[r1 as usize], Value::Int(11));
    assert_eq!(vm.mem[r2 as usize], Value::Int(21));
}
