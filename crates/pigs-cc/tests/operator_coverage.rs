//! Arithmetic, bitwise and comparison operators against the reference VM.

use pigs_cc::test_harness::run_c;

#[test]
fn basic_arithmetic() {
    let vm = run_c(
        r"
        void main(void)
        {
            p0 = 3 + 5;
            p1 = 13 * 11;
            p2 = 73 % 20;
            p3 = 100 / 7;
            p4 = 3 - 10;
        }
        ",
    );
    assert_eq!(vm.param(0), 8);
    assert_eq!(vm.param(1), 143);
    assert_eq!(vm.param(2), 13);
    assert_eq!(vm.param(3), 14);
    assert_eq!(vm.param(4), -7);
}

#[test]
fn bitwise_and_shifts() {
    let vm = run_c(
        r"
        void main(void)
        {
            p0 = 0xf0 & 0x3c;
            p1 = 0xf0 | 0x0f;
            p2 = 0xff ^ 0x0f;
            p3 = 1 << 10;
            p4 = 1024 >> 3;
            p5 = ~0;
        }
        ",
    );
    assert_eq!(vm.param(0), 0x30);
    assert_eq!(vm.param(1), 0xff);
    assert_eq!(vm.param(2), 0xf0);
    assert_eq!(vm.param(3), 1024);
    assert_eq!(vm.param(4), 128);
    assert_eq!(vm.param(5), -1);
}

#[test]
fn comparisons_yield_zero_or_one() {
    let vm = run_c(
        r"
        int a = 5;
        int b = -3;
        void main(void)
        {
            p0 = a == 5;
            p1 = a != 5;
            p2 = b < a;
            p3 = a < b;
            p4 = a <= 5;
            p5 = a > b;
            p6 = b > a;
            p7 = b >= -3;
            p8 = b >= a;
            p9 = (a > 0) + (b > 0);
        }
        ",
    );
    assert_eq!(
        (0..10).map(|i| vm.param(i)).collect::<Vec<_>>(),
        vec![1, 0, 1, 0, 1, 1, 0, 1, 0, 1]
    );
}

#[test]
fn compound_operands_nest() {
    let vm = run_c(
        r"
        void main(void)
        {
            p0 = (1 + 2) * (3 + 4);
            p1 = (10 - (2 * 3)) * ((8 / 2) - 1);
            p2 = 100 - (10 - (5 - 1));
        }
        ",
    );
    assert_eq!(vm.param(0), 21);
    assert_eq!(vm.param(1), 12);
    assert_eq!(vm.param(2), 94);
}

#[test]
fn compound_assignment() {
    let vm = run_c(
        r"
        void main(void)
        {
            int a = 10;
            a += 5;
            p0 = a;
            a -= 3;
            p1 = a;
            a *= 4;
            p2 = a;
            a /= 6;
            p3 = a;
            a %= 5;
            p4 = a;
            a <<= 4;
            p5 = a;
            a >>= 2;
            p6 = a;
            a |= 0x10;
            p7 = a;
            a &= 0x1c;
            p8 = a;
            a ^= 0xff;
            p9 = a;
        }
        ",
    );
    assert_eq!(
        (0..10).map(|i| vm.param(i)).collect::<Vec<_>>(),
        vec![15, 12, 48, 8, 3, 48, 12, 28, 28, 227]
    );
}

#[test]
fn compound_assignment_with_compound_rhs() {
    let vm = run_c(
        r"
        void main(void)
        {
            int a = 7;
            a += 2 * (3 + 1);
            p0 = a;
        }
        ",
    );
    assert_eq!(vm.param(0), 15);
}

#[test]
fn unary_minus_and_not() {
    let vm = run_c(
        r"
        int a = 7;
        void main(void)
        {
            p0 = -a;
            p1 = -(a + 1);
            p2 = !a;
            p3 = !0;
            p4 = !!a;
            p5 = -5;
            p6 = +a;
        }
        ",
    );
    assert_eq!(vm.param(0), -7);
    assert_eq!(vm.param(1), -8);
    assert_eq!(vm.param(2), 0);
    assert_eq!(vm.param(3), 1);
    assert_eq!(vm.param(4), 1);
    assert_eq!(vm.param(5), -5);
    assert_eq!(vm.param(6), 7);
}

#[test]
fn assignment_is_an_expression() {
    let vm = run_c(
        r"
        void main(void)
        {
            int a;
            int b;
            p0 = a = 5;
            p1 = b = a + 1;
            p2 = a;
        }
        ",
    );
    assert_eq!(vm.param(0), 5);
    assert_eq!(vm.param(1), 6);
    assert_eq!(vm.param(2), 5);
}

#[test]
fn parameters_readable_and_writable() {
    let program = pigs_cc::test_harness::compile_c(
        r"
        void main(void)
        {
            p1 = p0 + 1;
            p2 = p0 * p1;
        }
        ",
    );
    let mut vm = pigs_cc::test_harness::Vm::new();
    vm.params[0] = 6;
    let vm = vm.run(&program).unwrap();
    assert_eq!(vm.param(1), 7);
    assert_eq!(vm.param(2), 42);
}

#[test]
fn wrapping_arithmetic() {
    let vm = run_c(
        r"
        int big = 2147483647;
        void main(void)
        {
            p0 = big + 1;
        }
        ",
    );
    assert_eq!(vm.param(0), i32::MIN);
}
