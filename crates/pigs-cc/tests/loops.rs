//! Loop statements, break/continue, and C-semantics agreement with a
//! native reference loop.

use pigs_cc::test_harness::run_c;

#[test]
fn while_loop_sums() {
    let vm = run_c(
        r"
        void main(void)
        {
            int i = 0;
            int sum = 0;
            while (i < 10) {
                sum += i;
                ++i;
            }
            p0 = sum;
        }
        ",
    );
    assert_eq!(vm.param(0), 45);
}

#[test]
fn while_false_never_runs() {
    let vm = run_c(
        r"
        void main(void)
        {
            int ran = 0;
            while (0) {
                ran = 1;
            }
            p0 = ran;
        }
        ",
    );
    assert_eq!(vm.param(0), 0);
}

#[test]
fn do_while_runs_at_least_once() {
    let vm = run_c(
        r"
        void main(void)
        {
            int i = 100;
            int runs = 0;
            do {
                ++runs;
            } while (i < 10);
            p0 = runs;

            i = 0;
            do {
                ++i;
            } while (i < 5);
            p1 = i;
        }
        ",
    );
    assert_eq!(vm.param(0), 1);
    assert_eq!(vm.param(1), 5);
}

#[test]
fn for_loop_with_break_and_continue() {
    // Reference semantics computed by the equivalent native loop.
    let mut a = 0i32;
    let mut i = 0i32;
    while i < 10 {
        if i != 7 {
            a = (a + 2) * 3;
            if i == 8 {
                break;
            }
        }
        i += 1;
    }
    let expected = a;

    let vm = run_c(
        r"
        void main(void)
        {
            int a = 0;
            int i;
            for (i = 0; i < 10; ++i) {
                if (i == 7) {
                    continue;
                }
                a = (a + 2) * 3;
                if (i == 8) {
                    break;
                }
            }
            p0 = a;
        }
        ",
    );
    assert_eq!(vm.param(0), expected);
}

#[test]
fn for_with_declaration_and_comma_step() {
    let vm = run_c(
        r"
        void main(void)
        {
            int total = 0;
            for (int i = 0, j = 10; i < j; ++i, --j) {
                total += 1;
            }
            p0 = total;
        }
        ",
    );
    assert_eq!(vm.param(0), 5);
}

#[test]
fn for_without_condition_breaks_out() {
    let vm = run_c(
        r"
        void main(void)
        {
            int i = 0;
            for (;;) {
                ++i;
                if (i == 4) {
                    break;
                }
            }
            p0 = i;
        }
        ",
    );
    assert_eq!(vm.param(0), 4);
}

#[test]
fn nested_loops_break_innermost() {
    let vm = run_c(
        r"
        void main(void)
        {
            int hits = 0;
            int i;
            int j;
            for (i = 0; i < 3; ++i) {
                for (j = 0; j < 10; ++j) {
                    if (j == 2) {
                        break;
                    }
                    ++hits;
                }
            }
            p0 = hits;
        }
        ",
    );
    assert_eq!(vm.param(0), 6);
}

#[test]
fn continue_in_while_reevaluates_condition() {
    let vm = run_c(
        r"
        void main(void)
        {
            int i = 0;
            int odd = 0;
            while (i < 10) {
                ++i;
                if (i % 2 == 0) {
                    continue;
                }
                odd += 1;
            }
            p0 = odd;
        }
        ",
    );
    assert_eq!(vm.param(0), 5);
}
