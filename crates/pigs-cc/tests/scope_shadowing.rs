//! Scope shadowing: nested re-declarations get fresh slots and outer
//! values survive inner blocks. Mirrors the original test_scope.c.

use pigs_cc::test_harness::run_c;

#[test]
fn shadowed_blocks_restore_outer_values() {
    let vm = run_c(
        r"
        void test_scope();

        int a = 1;

        void main(void)
        {
            p0 = a;             // p0=1
            test_scope();
            p9 = a;             // p9=1
        }

        void test_scope(void)
        {
            p1 = a;             // p1=1
            int a = 2;
            p2 = a;             // p2=2
            {
                p3 = a;         // p3=2
                int a = 3;
                p4 = a;         // p4=3
                {
                    p5 = a;     // p5=3
                    int a = 4;
                    p6 = a;     // p6=4
                }
                p7 = a;         // p7=3
            }
            p8 = a;             // p8=2
        }
        ",
    );
    assert_eq!(
        (0..10).map(|i| vm.param(i)).collect::<Vec<_>>(),
        vec![1, 1, 2, 2, 3, 3, 4, 3, 2, 1]
    );
}

#[test]
fn sibling_blocks_do_not_interfere() {
    let vm = run_c(
        r"
        void main(void)
        {
            int outer = 7;
            {
                int x = 1;
                outer += x;
            }
            {
                int y = 100;
                outer += y;
            }
            p0 = outer;
        }
        ",
    );
    assert_eq!(vm.param(0), 108);
}

#[test]
fn for_header_scope_encloses_body() {
    let vm = run_c(
        r"
        void main(void)
        {
            int i = 1000;
            int sum = 0;
            for (int i = 0; i < 3; ++i) {
                sum += i;
            }
            p0 = sum;
            p1 = i;
        }
        ",
    );
    assert_eq!(vm.param(0), 3);
    assert_eq!(vm.param(1), 1000);
}
