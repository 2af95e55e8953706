//! Pre- and post-increment/decrement semantics.

use pigs_cc::test_harness::run_c;

#[test]
fn post_and_pre_increment_values() {
    let vm = run_c(
        r"
        void main(void)
        {
            int a = 10;
            p0 = a++;
            p1 = a;
            p2 = ++a;
        }
        ",
    );
    assert_eq!(vm.param(0), 10);
    assert_eq!(vm.param(1), 11);
    assert_eq!(vm.param(2), 12);
}

#[test]
fn full_increment_decrement_matrix() {
    // Mirrors the original compiler's increment/decrement test program.
    let vm = run_c(
        r"
        int test_incr_decr_ops(void)
        {
            int a = 10;

            if (a++ != 10) {
                return -1;
            }
            if (a != 11) {
                return -2;
            }
            if (++a != 12) {
                return -3;
            }
            if (a != 12) {
                return -4;
            }
            if (a-- != 12) {
                return -5;
            }
            if (a != 11) {
                return -6;
            }
            if (--a != 10) {
                return -7;
            }
            if (a != 10) {
                return -8;
            }
            return 1;
        }
        void main(void)
        {
            p0 = test_incr_decr_ops();
        }
        ",
    );
    assert_eq!(vm.param(0), 1);
}

#[test]
fn increment_inside_expressions() {
    let vm = run_c(
        r"
        void main(void)
        {
            int a = 3;
            p0 = a++ * 2;
            p1 = ++a * 2;
            p2 = a;
        }
        ",
    );
    assert_eq!(vm.param(0), 6);
    assert_eq!(vm.param(1), 10);
    assert_eq!(vm.param(2), 5);
}

#[test]
fn increment_on_parameters() {
    let program = pigs_cc::test_harness::compile_c(
        r"
        void main(void)
        {
            p1 = p0++;
            p2 = ++p0;
        }
        ",
    );
    let mut vm = pigs_cc::test_harness::Vm::new();
    vm.params[0] = 41;
    let vm = vm.run(&program).unwrap();
    assert_eq!(vm.param(0), 43);
    assert_eq!(vm.param(1), 41);
    assert_eq!(vm.param(2), 43);
}
