//! End-to-end dispatch-loop scenarios (spec §8): each test builds a raw
//! instruction stream by hand (no front end exists yet) and drives it
//! through `VirtualMachine::run`.

use scriptvm_classes::{ClassDefinition, ClassRegistry, Field, FunctionHandle, Method, Visibility};
use scriptvm_config::VMConfig;
use scriptvm_core_types::TypeDescriptor;
use scriptvm_errors::ErrorKind;
use scriptvm_functions::{FunctionSignature, NativeCallback};
use scriptvm_runtime::{fork_join, Environment, Instruction, OpCode, VirtualMachine};
use scriptvm_types::{Instance, Payload, Value};
use std::sync::{Arc, Mutex};

fn int(op: OpCode, line: u32, value: i64) -> Instruction {
    Instruction::new(op, line).with_int(value)
}

fn bare(op: OpCode, line: u32) -> Instruction {
    Instruction::new(op, line)
}

fn named(op: OpCode, line: u32, name: &str) -> Instruction {
    Instruction::new(op, line).with_string(name)
}

/// Scenario 1: `PushInt 3; PushFloat 2.5; Add` widens to Float64 5.5
/// (spec §8, arithmetic widening).
#[test]
fn arithmetic_widens_int_and_float_to_float() {
    let bytecode = vec![
        int(OpCode::PushInt, 0, 3),
        Instruction::new(OpCode::PushFloat, 1).with_float(2.5),
        bare(OpCode::Add, 2),
        bare(OpCode::Return, 3),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    let mut ctx = vm.new_context();
    let result = vm.run(&mut ctx).expect("arithmetic scenario must not raise");
    assert_eq!(result, Value::float64(5.5));
}

/// Scenario 2a: a function returning `Some(7)`, unwrapped by its caller's
/// `UnwrapSomeOrPropagate` (spec §8, Option propagation — present branch).
#[test]
fn unwrap_some_or_propagate_unwraps_a_present_option() {
    let bytecode = vec![
        // f: [0, 3)
        int(OpCode::PushInt, 0, 7),
        bare(OpCode::WrapSome, 1),
        bare(OpCode::Return, 2),
        // caller
        named(OpCode::Call, 3, "f"),
        bare(OpCode::UnwrapSomeOrPropagate, 4),
        bare(OpCode::Return, 5),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    vm.functions.write().register_user("f", FunctionSignature::new(Vec::new(), TypeDescriptor::any()), 0, 3);

    let mut ctx = vm.new_context();
    ctx.ip = 3;
    let result = vm.run(&mut ctx).expect("present Option must not propagate");
    assert_eq!(result, Value::int64(7));
}

/// Scenario 2b: a function returning `None` propagates straight through
/// the caller's `UnwrapSomeOrPropagate` instead of unwrapping (spec §8,
/// Option propagation — absent branch).
#[test]
fn unwrap_some_or_propagate_propagates_an_absent_option() {
    let bytecode = vec![
        // f: [0, 2)
        bare(OpCode::PushNone, 0),
        bare(OpCode::Return, 1),
        // caller
        named(OpCode::Call, 2, "f"),
        bare(OpCode::UnwrapSomeOrPropagate, 3),
        bare(OpCode::Return, 4),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    vm.functions.write().register_user("f", FunctionSignature::new(Vec::new(), TypeDescriptor::any()), 0, 2);

    let mut ctx = vm.new_context();
    ctx.ip = 2;
    let result = vm.run(&mut ctx).expect("absent Option must still be a clean return, not an error");
    assert!(result.is_none(), "None must propagate out of the caller unchanged");
}

/// Scenario 3: `PushInt 10; PushInt 0; Div` with no enclosing `try` raises
/// `DivisionByZero` straight out of `run` (spec §8).
#[test]
fn division_by_zero_escapes_with_no_try_in_scope() {
    let bytecode = vec![int(OpCode::PushInt, 0, 10), int(OpCode::PushInt, 1, 0), bare(OpCode::Div, 2)];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    let mut ctx = vm.new_context();
    let err = vm.run(&mut ctx).expect_err("division by zero must escape the context");
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
}

/// Scenario 4: `BeginTry H; PushInt 1; PushInt 2; Throw; H: StoreException
/// e; LoadVar e; Return` — after the catch, the operand stack is back to
/// its pre-`BeginTry` depth (plus the delivered exception) and the handler
/// observes exactly the thrown value (spec §8).
#[test]
fn try_catch_restores_pre_try_stack_depth_and_delivers_the_exception() {
    let bytecode = vec![
        int(OpCode::BeginTry, 0, 3), // target index 4, 3 ahead of ip+1=1
        int(OpCode::PushInt, 1, 1),
        int(OpCode::PushInt, 2, 2),
        bare(OpCode::Throw, 3),
        named(OpCode::StoreException, 4, "e"), // H
        named(OpCode::LoadVar, 5, "e"),
        bare(OpCode::Return, 6),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    let mut ctx = vm.new_context();
    let result = vm.run(&mut ctx).expect("a caught exception must not escape run()");
    // The handler observes the exact Value `Throw` popped — here the raw
    // `Int64(2)` pushed just before it — not a re-synthesized `ErrorValue`.
    assert_eq!(result, Value::int64(2));
}

/// `Call`'s omitted optional argument is not padded with Nil: its
/// declared default-value expression runs in the callee's own
/// environment and the result is bound instead (spec §4.5 call protocol,
/// step 2).
#[test]
fn call_with_omitted_optional_argument_evaluates_its_default_in_the_callee_environment() {
    let bytecode = vec![
        // add(a, b = 10): [0, 4)
        named(OpCode::LoadVar, 0, "a"),
        named(OpCode::LoadVar, 1, "b"),
        bare(OpCode::Add, 2),
        bare(OpCode::Return, 3),
        // default-value expr for `b`, offset 4
        int(OpCode::PushInt, 4, 10),
        bare(OpCode::SetDefaultValue, 5),
        // caller: add(5)
        int(OpCode::PushInt, 6, 5),
        Instruction::new(OpCode::Call, 7).with_string("add").with_int(1),
        bare(OpCode::Return, 8),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    vm.functions.write().register_user(
        "add",
        FunctionSignature::new(
            vec![
                scriptvm_functions::Parameter::required("a", TypeDescriptor::any()),
                scriptvm_functions::Parameter::optional("b", TypeDescriptor::any(), 4),
            ],
            TypeDescriptor::any(),
        ),
        0,
        4,
    );
    let mut ctx = vm.new_context();
    ctx.ip = 6;
    let result = vm.run(&mut ctx).expect("call with an omitted optional argument must not raise");
    assert_eq!(result, Value::int64(15));
}

/// `Call` with too few arguments for the required parameters fails
/// outright rather than silently padding them with Nil.
#[test]
fn call_missing_a_required_argument_raises_type_mismatch() {
    let bytecode = vec![
        named(OpCode::LoadVar, 0, "a"),
        bare(OpCode::Return, 1),
        Instruction::new(OpCode::Call, 2).with_string("needs_a").with_int(0),
        bare(OpCode::Return, 3),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    vm.functions.write().register_user(
        "needs_a",
        FunctionSignature::new(vec![scriptvm_functions::Parameter::required("a", TypeDescriptor::any())], TypeDescriptor::any()),
        0,
        2,
    );
    let mut ctx = vm.new_context();
    ctx.ip = 2;
    let err = vm.run(&mut ctx).expect_err("omitting a required argument must raise");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

/// `NewInstance` allocates every declared field and lazily evaluates each
/// field's default-value expression in place of leaving it Nil (spec
/// §4.3, "Instance creation").
#[test]
fn new_instance_allocates_declared_fields_and_evaluates_lazy_defaults() {
    let bytecode = vec![
        named(OpCode::NewInstance, 0, "Counter"),
        bare(OpCode::Return, 1),
        // default-value expr for field `start`, offset 2
        int(OpCode::PushInt, 2, 10),
        bare(OpCode::SetDefaultValue, 3),
    ];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    {
        let mut classes = vm.classes.write();
        classes.register(
            ClassDefinition::new("Counter")
                .with_field(Field::new("start", TypeDescriptor::any(), Visibility::Public).with_default_expr(2))
                .with_field(Field::new("label", TypeDescriptor::any(), Visibility::Public)),
        );
    }
    let mut ctx = vm.new_context();
    let result = vm.run(&mut ctx).expect("instance construction must not raise");
    match result.data {
        Payload::UserDefined(instance) => {
            assert_eq!(instance.fields.get("start"), Some(&Value::int64(10)));
            assert_eq!(instance.fields.get("label"), Some(&Value::nil()));
        }
        other => panic!("expected a UserDefined instance, got {other:?}"),
    }
}

fn class_with_pub_and_priv_native_methods(classes: &mut ClassRegistry) -> (scriptvm_classes::ClassId, scriptvm_classes::ClassId) {
    let a = classes.register(
        ClassDefinition::new("A")
            .with_method(Method::new("pub", FunctionHandle(0), Visibility::Public))
            .with_method(Method::new("priv", FunctionHandle(1), Visibility::Private))
            .with_field(Field::new("x", TypeDescriptor::any(), Visibility::Public)),
    );
    let b = classes.register(
        ClassDefinition::new("B")
            .with_superclass(a)
            .with_method(Method::new("priv", FunctionHandle(2), Visibility::Private)),
    );
    (a, b)
}

fn instance_of(class_id: scriptvm_classes::ClassId) -> Value {
    Value::new(
        TypeDescriptor::any(),
        Payload::UserDefined(Instance {
            class_id: class_id.0,
            fields: Default::default(),
        }),
    )
}

fn any_sig() -> FunctionSignature {
    FunctionSignature::new(vec![], TypeDescriptor::any())
}

/// Scenario 5a: from outside the class hierarchy (no bound `this`),
/// `B.pub` — inherited from `A`, public — succeeds, while `B.priv` —
/// `B`'s own private method — does not (spec §8).
#[test]
fn method_resolution_enforces_visibility_from_outside_the_hierarchy() {
    let bytecode = vec![named(OpCode::Call, 0, "B.pub"), bare(OpCode::Return, 1)];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    let (_, b) = class_with_pub_and_priv_native_methods(&mut vm.classes.write());
    vm.register_native("a_pub", any_sig(), NativeCallback::new(|_| Ok(Value::int64(1))));
    let mut ctx = vm.new_context();
    ctx.push(instance_of(b));
    let result = vm.run(&mut ctx).expect("public inherited method must be callable from outside");
    assert_eq!(result, Value::int64(1));

    let bytecode = vec![named(OpCode::Call, 0, "B.priv"), bare(OpCode::Return, 1)];
    let vm = VirtualMachine::new(bytecode, VMConfig::default());
    let (_, b) = class_with_pub_and_priv_native_methods(&mut vm.classes.write());
    vm.register_native("b_priv", any_sig(), NativeCallback::new(|_| Ok(Value::int64(3))));
    let mut ctx = vm.new_context();
    ctx.push(instance_of(b));
    let err = vm.run(&mut ctx).expect_err("private methods are unreachable with no bound receiver scope");
    assert_eq!(err.kind, ErrorKind::VisibilityViolation);
}

/// Scenario 5b: from within a method of `B` (i.e. `this` bound to a `B`
/// instance):
/// `A.pub` succeeds, `A.priv` fails (declared outside `B`), and `B.priv`
/// succeeds because `B` declares its own `priv` (only a class's own
/// privates are reachable, never an ancestor's).
#[test]
fn method_resolution_from_within_a_method_of_the_subclass() {
    let bytecode_pub = vec![named(OpCode::Call, 0, "A.pub"), bare(OpCode::Return, 1)];
    let vm = VirtualMachine::new(bytecode_pub, VMConfig::default());
    let (_, b) = class_with_pub_and_priv_native_methods(&mut vm.classes.write());
    vm.register_native("a_pub", any_sig(), NativeCallback::new(|_| Ok(Value::int64(1))));
    let mut ctx = vm.new_context();
    ctx.environments.push(Environment::with_this(instance_of(b)));
    ctx.push(instance_of(b));
    let result = vm.run(&mut ctx).expect("A.pub is public, reachable from a B method");
    assert_eq!(result, Value::int64(1));

    let bytecode_a_priv = vec![named(OpCode::Call, 0, "A.priv"), bare(OpCode::Return, 1)];
    let vm = VirtualMachine::new(bytecode_a_priv, VMConfig::default());
    let (_, b) = class_with_pub_and_priv_native_methods(&mut vm.classes.write());
    vm.register_native("a_priv", any_sig(), NativeCallback::new(|_| Ok(Value::int64(2))));
    let mut ctx = vm.new_context();
    ctx.environments.push(Environment::with_this(instance_of(b)));
    ctx.push(instance_of(b));
    let err = vm.run(&mut ctx).expect_err("A.priv is declared outside B, unreachable even from a B method");
    assert_eq!(err.kind, ErrorKind::VisibilityViolation);

    let bytecode_b_priv = vec![named(OpCode::Call, 0, "B.priv"), bare(OpCode::Return, 1)];
    let vm = VirtualMachine::new(bytecode_b_priv, VMConfig::default());
    let (_, b) = class_with_pub_and_priv_native_methods(&mut vm.classes.write());
    vm.register_native("b_priv", any_sig(), NativeCallback::new(|_| Ok(Value::int64(3))));
    let mut ctx = vm.new_context();
    ctx.environments.push(Environment::with_this(instance_of(b)));
    ctx.push(instance_of(b));
    let result = vm.run(&mut ctx).expect("B.priv is B's own private method, reachable from within B");
    assert_eq!(result, Value::int64(3));
}

/// Scenario 6: `fork_join` launches `k` child contexts, each an idempotent
/// body recording its ordinal into a list guarded by one mutex; after
/// join, the list holds exactly the multiset `{0, .., k-1}` (spec §8).
#[test]
fn fork_join_produces_the_full_multiset_of_child_ordinals() {
    const K: u32 = 8;

    let shared: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&shared);

    // Every child runs the same two-instruction body (`entry_ip` is
    // constant); `prime` pushes each child's own ordinal onto its fresh
    // operand stack before `run` starts, since ordinals aren't known until
    // `fork_join` assigns them at dispatch time.
    let bytecode = vec![named(OpCode::Call, 0, "record"), bare(OpCode::Return, 1)];
    let vm = Arc::new(VirtualMachine::new(bytecode, VMConfig::default()));
    vm.register_native(
        "record",
        FunctionSignature::new(vec![scriptvm_functions::Parameter::required("ordinal", TypeDescriptor::any())], TypeDescriptor::any()),
        NativeCallback::new(move |args: &[Value]| {
            let ordinal = args[0].as_i128().expect("record's argument must be an integer ordinal");
            recorded.lock().unwrap().push(ordinal as i64);
            Ok(Value::nil())
        }),
    );

    let outcomes = fork_join(
        &vm,
        K,
        |_ordinal| 0,
        |ordinal, ctx| ctx.push(Value::int64(ordinal as i64)),
    );

    for outcome in &outcomes {
        outcome.result.as_ref().expect("every child context must return cleanly");
    }

    let mut seen = shared.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..K as i64).collect::<Vec<_>>());
}
