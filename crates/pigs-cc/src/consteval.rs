//! Compile-time folding of integer constant expressions, used for
//! enumerator values, global initialisers and mapped API arguments.

use crate::frontend::ast::{Ast, BinOp, Expr, ExprId, UnaryOp};

/// Fold `id` to a constant if possible. `resolve_ident` supplies values of
/// identifier leaves (enumeration constants); anything else is not constant.
pub fn eval<F>(ast: &Ast, id: ExprId, resolve_ident: &F) -> Option<i32>
where
    F: Fn(ExprId) -> Option<i32>,
{
    match ast.expr(id) {
        Expr::IntLit { value, .. } => Some(*value),
        Expr::Ident { .. } => resolve_ident(id),
        Expr::Unary { op, operand, .. } => {
            let v = eval(ast, *operand, resolve_ident)?;
            fold_unary(*op, v)
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let a = eval(ast, *lhs, resolve_ident)?;
            let b = eval(ast, *rhs, resolve_ident)?;
            fold_binary(*op, a, b)
        }
        Expr::Assign { .. } | Expr::Call { .. } => None,
    }
}

fn fold_unary(op: UnaryOp, v: i32) -> Option<i32> {
    match op {
        UnaryOp::Plus => Some(v),
        UnaryOp::Neg => Some(v.wrapping_neg()),
        UnaryOp::BitNot => Some(!v),
        UnaryOp::LogicalNot => Some(i32::from(v == 0)),
        UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => None,
    }
}

fn fold_binary(op: BinOp, a: i32, b: i32) -> Option<i32> {
    Some(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl => a.wrapping_shl(b as u32),
        BinOp::Shr => a.wrapping_shr(b as u32),
        BinOp::Eq => i32::from(a == b),
        BinOp::Ne => i32::from(a != b),
        BinOp::Lt => i32::from(a < b),
        BinOp::Le => i32::from(a <= b),
        BinOp::Gt => i32::from(a > b),
        BinOp::Ge => i32::from(a >= b),
        BinOp::LogicalAnd => i32::from(a != 0 && b != 0),
        BinOp::LogicalOr => i32::from(a != 0 || b != 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_into;

    fn eval_src(src: &str) -> Option<i32> {
        let mut ast = Ast::new();
        parse_into(&mut ast, "t.c".into(), &format!("int x = {src};")).unwrap();
        let crate::frontend::ast::Item::Variables(decl) = &ast.items[0] else {
            panic!()
        };
        eval(&ast, decl.vars[0].init.unwrap(), &|_| None)
    }

    #[test]
    fn folds_arithmetic() {
        assert_eq!(eval_src("2 + 3 * 4"), Some(14));
        assert_eq!(eval_src("-(7 % 4)"), Some(-3));
        assert_eq!(eval_src("1 << 5"), Some(32));
        assert_eq!(eval_src("~0"), Some(-1));
        assert_eq!(eval_src("!3"), Some(0));
        assert_eq!(eval_src("3 < 5"), Some(1));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(eval_src("1 / 0"), None);
        assert_eq!(eval_src("1 % 0"), None);
    }

    #[test]
    fn wrapping_semantics() {
        assert_eq!(eval_src("2147483647 + 1"), Some(i32::MIN));
    }
}
