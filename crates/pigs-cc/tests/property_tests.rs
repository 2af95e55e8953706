//! Property tests: randomly generated expressions must compile and
//! agree with native evaluation, and emitted programs must keep the
//! flag invariant.

use pigs_cc::pigs::instruction::Instruction;
use pigs_cc::test_harness::{try_compile_c, Vm};
use pigs_cc::Error;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    AndL,
    OrL,
}

impl Op {
    fn c_str(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::AndL => "&&",
            Op::OrL => "||",
        }
    }

    /// Reference semantics. Ordered comparisons follow the VM contract:
    /// they are decided by the sign of the wrapped difference, which
    /// matches C for any operands whose difference fits in 32 bits.
    fn eval(self, a: i32, b: i32) -> i32 {
        let diff = a.wrapping_sub(b);
        match self {
            Op::Add => a.wrapping_add(b),
            Op::Sub => diff,
            Op::Mul => a.wrapping_mul(b),
            Op::BitAnd => a & b,
            Op::BitOr => a | b,
            Op::BitXor => a ^ b,
            Op::Lt => i32::from(diff < 0),
            Op::Le => i32::from(diff <= 0),
            Op::Gt => i32::from(diff > 0),
            Op::Ge => i32::from(diff >= 0),
            Op::Eq => i32::from(a == b),
            Op::Ne => i32::from(a != b),
            Op::AndL => i32::from(a != 0 && b != 0),
            Op::OrL => i32::from(a != 0 || b != 0),
        }
    }
}

#[derive(Debug, Clone)]
enum E {
    Lit(i32),
    Var(usize),
    Neg(Box<E>),
    Not(Box<E>),
    Bin(Op, Box<E>, Box<E>),
}

impl E {
    fn to_c(&self) -> String {
        match self {
            E::Lit(v) => {
                if *v < 0 {
                    format!("({v})")
                } else {
                    v.to_string()
                }
            }
            E::Var(i) => format!("p{i}"),
            E::Neg(e) => format!("(-{})", e.to_c()),
            E::Not(e) => format!("(!{})", e.to_c()),
            E::Bin(op, a, b) => format!("({} {} {})", a.to_c(), op.c_str(), b.to_c()),
        }
    }

    fn eval(&self, vars: &[i32; 3]) -> i32 {
        match self {
            E::Lit(v) => *v,
            E::Var(i) => vars[*i],
            E::Neg(e) => e.eval(vars).wrapping_neg(),
            E::Not(e) => i32::from(e.eval(vars) == 0),
            E::Bin(op, a, b) => op.eval(a.eval(vars), b.eval(vars)),
        }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Add),
        Just(Op::Sub),
        Just(Op::Mul),
        Just(Op::BitAnd),
        Just(Op::BitOr),
        Just(Op::BitXor),
        Just(Op::Lt),
        Just(Op::Le),
        Just(Op::Gt),
        Just(Op::Ge),
        Just(Op::Eq),
        Just(Op::Ne),
        Just(Op::AndL),
        Just(Op::OrL),
    ]
}

fn expr_strategy() -> impl Strategy<Value = E> {
    let leaf = prop_oneof![
        (-1000i32..1000).prop_map(E::Lit),
        (0usize..3).prop_map(E::Var),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| E::Neg(Box::new(e))),
            inner.clone().prop_map(|e| E::Not(Box::new(e))),
            (op_strategy(), inner.clone(), inner)
                .prop_map(|(op, a, b)| E::Bin(op, Box::new(a), Box::new(b))),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_expressions_match_native_evaluation(
        expr in expr_strategy(),
        vars in [(-100i32..100), (-100i32..100), (-100i32..100)],
    ) {
        let src = format!("void main(void) {{ p9 = {}; }}", expr.to_c());
        let program = match try_compile_c(&src) {
            Ok(program) => program,
            // Deep chains of compound right operands legitimately blow
            // the three scratch slots; that limit is its own test.
            Err(errors) if matches!(errors[0], Error::ScratchExhaustion { .. }) => return Ok(()),
            Err(errors) => panic!("unexpected compile failure: {}", errors[0]),
        };
        let mut vm = Vm::new();
        vm.params[0] = vars[0];
        vm.params[1] = vars[1];
        vm.params[2] = vars[2];
        let vm = vm.run(&program).unwrap();
        prop_assert_eq!(vm.param(9), expr.eval(&vars));
    }

    #[test]
    fn branches_always_follow_flag_setting_ops(expr in expr_strategy()) {
        let src = format!(
            "void main(void) {{ if ({}) {{ p0 = 1; }} else {{ p0 = 2; }} }}",
            expr.to_c()
        );
        let program = match try_compile_c(&src) {
            Ok(program) => program,
            Err(errors) if matches!(errors[0], Error::ScratchExhaustion { .. }) => return Ok(()),
            Err(errors) => panic!("unexpected compile failure: {}", errors[0]),
        };
        let code = program.instructions();
        for (i, asm) in code.iter().enumerate() {
            if matches!(asm.instr, Instruction::Jz(_) | Instruction::Jnz(_)) {
                let fresh = matches!(
                    i.checked_sub(1).map(|p| &code[p].instr),
                    Some(Instruction::Alu(op, _)) if op.refreshes_flags()
                );
                prop_assert!(fresh, "branch at {} has stale flags", i);
            }
        }
    }

    #[test]
    fn reduction_preserves_semantics(
        expr in expr_strategy(),
        vars in [(-50i32..50), (-50i32..50), (-50i32..50)],
    ) {
        let src = format!("void main(void) {{ p8 = {}; p9 = p8 + 1; }}", expr.to_c());
        let reduced = match try_compile_c(&src) {
            Ok(program) => program,
            Err(_) => return Ok(()),
        };
        let unreduced = pigs_cc::compile_with_options(
            &[("test.c", src.as_str())],
            &pigs_cc::CompileOptions { reduce: false },
        )
        .unwrap();
        let run = |program| {
            let mut vm = Vm::new();
            vm.params[0] = vars[0];
            vm.params[1] = vars[1];
            vm.params[2] = vars[2];
            vm.run(program).unwrap()
        };
        let a = run(&reduced);
        let b = run(&unreduced);
        prop_assert_eq!(a.param(8), b.param(8));
        prop_assert_eq!(a.param(9), b.param(9));
    }
}
