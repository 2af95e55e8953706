//! Variable allocator.
//!
//! Globals are pinned from `v4` upward in declaration order. Every
//! function then gets a frame holding its parameters, its call-crossing
//! temporaries and its locals; frames are overlaid by call-graph
//! layering (`base(f) = max(base(g) + size(g))` over all callers `g`), so
//! two functions never on a common call path share slots while a callee
//! can never touch its caller's frame. Inside a function, slots are
//! assigned per scope: all objects of a scope at scope entry, sibling
//! scopes reusing the same range.
//!
//! Call-crossing temporaries exist because `v1..v3` are free-for-all
//! scratch: any operand value that must survive a user-function call is
//! parked in the caller's frame instead. The number of such slots is
//! computed here by mirroring the code generator's lowering discipline.

use std::collections::HashMap;

use crate::frontend::ast::{Ast, Expr, ExprId, Stmt, StmtId};
use crate::pigs::instruction::{VarId, RESERVED_SLOTS};
use crate::resolve::{FuncId, Resolved, ScopeId, Symbol};

#[derive(Debug, Clone)]
pub struct SlotNote {
    pub slot: u32,
    pub what: String,
}

#[derive(Debug)]
pub struct Allocation {
    /// Absolute slot per `VarId`; `u32::MAX` for objects of dropped
    /// functions, which the code generator never touches.
    slots: Vec<u32>,
    /// Call-crossing temporaries reserved per function.
    temps: HashMap<u32, Vec<VarId>>,
    pub notes: Vec<SlotNote>,
    /// High-water mark of user slots in use (the `n` of `n/146`).
    pub slots_used: u32,
}

impl Allocation {
    pub fn slot(&self, var: VarId) -> u32 {
        self.slots[var.0 as usize]
    }

    pub fn call_temp(&self, func: FuncId, index: usize) -> Option<VarId> {
        self.temps.get(&func.0).and_then(|t| t.get(index)).copied()
    }
}

pub fn allocate(ast: &Ast, resolved: &Resolved) -> Allocation {
    let mut slots = vec![u32::MAX; resolved.var_count as usize];
    let mut notes = Vec::new();
    for reserved in 0..RESERVED_SLOTS {
        slots[reserved as usize] = reserved;
    }

    // Globals first, in declaration order.
    let mut cursor = RESERVED_SLOTS;
    for &sym in &resolved.scopes[0].vars {
        if let Symbol::Global { name, var, .. } = resolved.symbol(sym) {
            slots[var.0 as usize] = cursor;
            notes.push(SlotNote { slot: cursor, what: name.clone() });
            cursor += 1;
        }
    }
    let globals_end = cursor;

    // Per-function relative layout: parameters, call temporaries, locals.
    let func_count = resolved.functions.len();
    let mut rel: Vec<Vec<(VarId, u32)>> = vec![Vec::new(); func_count];
    let mut size = vec![0u32; func_count];
    let mut temps: HashMap<u32, Vec<VarId>> = HashMap::new();
    let mut next_temp_var = resolved.var_count;

    for (idx, func) in resolved.functions.iter().enumerate() {
        if !func.reachable || func.body.is_none() {
            continue;
        }
        let mut layout = Vec::new();
        let mut end = 0u32;
        for &param in &func.params {
            if let Symbol::Local { var, .. } = resolved.symbol(param) {
                layout.push((*var, end));
                end += 1;
            }
        }
        let temp_count = body_temps(ast, resolved, func.body.unwrap());
        let mut temp_vars = Vec::with_capacity(temp_count as usize);
        for _ in 0..temp_count {
            let var = VarId(next_temp_var);
            next_temp_var += 1;
            layout.push((var, end));
            end += 1;
            temp_vars.push(var);
        }
        temps.insert(idx as u32, temp_vars);
        if let Some(root) = func.root_scope {
            walk_scope(resolved, root, end, &mut layout, &mut end);
        }
        tracing::debug!(
            "frame of \"{}\": {} param(s), {temp_count} call temp(s), {end} slot(s) total",
            func.name,
            func.params.len(),
        );
        rel[idx] = layout;
        size[idx] = end;
    }
    slots.resize(next_temp_var as usize, u32::MAX);

    // Overlay frames along the acyclic call graph, callers before callees.
    let mut base = vec![globals_end; func_count];
    let order = topo_order(resolved);
    let mut high = globals_end;
    for &f in &order {
        let end = base[f.0 as usize] + size[f.0 as usize];
        high = high.max(end);
        for &g in &resolved.functions[f.0 as usize].layout_calls {
            base[g.0 as usize] = base[g.0 as usize].max(end);
        }
    }

    for &f in &order {
        let func = &resolved.functions[f.0 as usize];
        for &(var, offset) in &rel[f.0 as usize] {
            slots[var.0 as usize] = base[f.0 as usize] + offset;
        }
        for &param in func.params.iter() {
            if let Symbol::Local { name, var, .. } = resolved.symbol(param) {
                notes.push(SlotNote {
                    slot: slots[var.0 as usize],
                    what: format!("{}.{}", func.name, name),
                });
            }
        }
        if let Some(root) = func.root_scope {
            collect_notes(resolved, root, &func.name, &slots, &mut notes);
        }
    }
    notes.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.what.cmp(&b.what)));

    Allocation {
        slots,
        temps,
        notes,
        slots_used: high - RESERVED_SLOTS,
    }
}

fn walk_scope(
    resolved: &Resolved,
    scope: ScopeId,
    cursor: u32,
    layout: &mut Vec<(VarId, u32)>,
    max_end: &mut u32,
) {
    let frame = &resolved.scopes[scope.0 as usize];
    let mut end = cursor;
    for &sym in &frame.vars {
        if let Symbol::Local { var, .. } = resolved.symbol(sym) {
            layout.push((*var, end));
            end += 1;
        }
    }
    *max_end = (*max_end).max(end);
    for &child in &frame.children {
        walk_scope(resolved, child, end, layout, max_end);
    }
}

fn collect_notes(
    resolved: &Resolved,
    scope: ScopeId,
    func_name: &str,
    slots: &[u32],
    notes: &mut Vec<SlotNote>,
) {
    let frame = &resolved.scopes[scope.0 as usize];
    for &sym in &frame.vars {
        if let Symbol::Local { name, var, .. } = resolved.symbol(sym) {
            notes.push(SlotNote {
                slot: slots[var.0 as usize],
                what: format!("{func_name}.{name}"),
            });
        }
    }
    for &child in &frame.children {
        collect_notes(resolved, child, func_name, slots, notes);
    }
}

/// Reverse postorder over the layout call graph, starting at `main`.
fn topo_order(resolved: &Resolved) -> Vec<FuncId> {
    fn visit(resolved: &Resolved, f: FuncId, seen: &mut Vec<bool>, out: &mut Vec<FuncId>) {
        if seen[f.0 as usize] {
            return;
        }
        seen[f.0 as usize] = true;
        for &g in &resolved.functions[f.0 as usize].layout_calls {
            visit(resolved, g, seen, out);
        }
        out.push(f);
    }
    let mut seen = vec![false; resolved.functions.len()];
    let mut order = Vec::new();
    visit(resolved, resolved.main, &mut seen, &mut order);
    order.reverse();
    order
}

// --- call-crossing temporary analysis ----------------------------------
//
// Mirrors the lowering discipline of codegen: a temporary needs a frame
// slot exactly when its live range crosses a user-function call.

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExprTemps {
    /// Peak number of frame temporaries live during lowering.
    pub temps: u32,
    /// The expression contains a user-function call.
    pub calls: bool,
}

/// A leaf lowers to a bare operand: literal, enum constant, variable or
/// parameter read.
pub(crate) fn is_leaf(ast: &Ast, id: ExprId) -> bool {
    matches!(ast.expr(id), Expr::IntLit { .. } | Expr::Ident { .. })
}

pub(crate) fn contains_user_call(ast: &Ast, resolved: &Resolved, id: ExprId) -> bool {
    expr_temps(ast, resolved, id).calls
}

pub(crate) fn expr_temps(ast: &Ast, resolved: &Resolved, id: ExprId) -> ExprTemps {
    match ast.expr(id) {
        Expr::IntLit { .. } | Expr::Ident { .. } => ExprTemps::default(),
        Expr::Unary { operand, .. } => expr_temps(ast, resolved, *operand),
        Expr::Binary { op, lhs, rhs, .. } => {
            let l = expr_temps(ast, resolved, *lhs);
            let r = expr_temps(ast, resolved, *rhs);
            let calls = l.calls || r.calls;
            if op.is_short_circuit() {
                // Both sides run with nothing held across them.
                return ExprTemps { temps: l.temps.max(r.temps), calls };
            }
            if op.is_comparison() {
                // Non-leaf left operand is parked while the right side
                // evaluates; the slot must survive calls inside it.
                if is_leaf(ast, *lhs) {
                    return ExprTemps { temps: r.temps, calls };
                }
                let parked = u32::from(r.calls);
                return ExprTemps { temps: l.temps.max(r.temps + parked), calls };
            }
            // Arithmetic: a compound right operand is evaluated first and
            // parked while the left side evaluates.
            if is_leaf(ast, *rhs) {
                return ExprTemps { temps: l.temps, calls };
            }
            let parked = u32::from(l.calls);
            ExprTemps { temps: r.temps.max(l.temps + parked), calls }
        }
        Expr::Assign { value, .. } => expr_temps(ast, resolved, *value),
        Expr::Call { args, .. } => {
            let infos: Vec<ExprTemps> =
                args.iter().map(|a| expr_temps(ast, resolved, *a)).collect();
            let arg_calls = infos.iter().any(|i| i.calls);
            match resolved.expr_symbol(id).map(|s| resolved.symbol(s)) {
                Some(Symbol::Api { spec, .. }) => {
                    // Non-leaf arguments park in scratch unless a later
                    // argument performs a user call, in which case they
                    // get a frame temporary that stays held until the
                    // API instruction itself.
                    let mut held = 0u32;
                    let mut peak = 0u32;
                    for (i, info) in infos.iter().enumerate() {
                        if spec.arg_map.is_some_and(|(idx, _)| idx == i) {
                            continue; // mapped constant, no evaluation
                        }
                        if is_leaf(ast, args[i]) {
                            continue;
                        }
                        peak = peak.max(held + info.temps);
                        if infos[i + 1..].iter().any(|later| later.calls) {
                            held += 1;
                        }
                    }
                    ExprTemps { temps: peak.max(held), calls: arg_calls }
                }
                _ => {
                    // User call: arguments containing calls are evaluated
                    // first and all but the last park in a frame
                    // temporary.
                    let call_args = infos.iter().filter(|i| i.calls).count() as u32;
                    let saved = call_args.saturating_sub(1);
                    let mut held = 0u32;
                    let mut peak = saved;
                    let mut seen_calls = 0u32;
                    for info in &infos {
                        if info.calls {
                            peak = peak.max(held + info.temps);
                            seen_calls += 1;
                            if seen_calls <= saved {
                                held += 1;
                            }
                        }
                    }
                    ExprTemps { temps: peak, calls: true }
                }
            }
        }
    }
}

fn body_temps(ast: &Ast, resolved: &Resolved, body: StmtId) -> u32 {
    stmt_temps(ast, resolved, body)
}

fn stmt_temps(ast: &Ast, resolved: &Resolved, id: StmtId) -> u32 {
    let expr = |e: &ExprId| expr_temps(ast, resolved, *e).temps;
    match ast.stmt(id) {
        Stmt::Expr { expr: Some(e), .. } => expr(e),
        Stmt::Expr { expr: None, .. } => 0,
        Stmt::ExprList { exprs, .. } => exprs.iter().map(expr).max().unwrap_or(0),
        Stmt::Decl(decl) => decl
            .vars
            .iter()
            .filter_map(|v| v.init.as_ref())
            .map(expr)
            .max()
            .unwrap_or(0),
        Stmt::Enum(_) | Stmt::Prototype(_) | Stmt::Break { .. } | Stmt::Continue { .. } => 0,
        Stmt::Compound { items, .. } => items
            .iter()
            .map(|s| stmt_temps(ast, resolved, *s))
            .max()
            .unwrap_or(0),
        Stmt::If { cond, then_branch, else_branch, .. } => expr(cond)
            .max(stmt_temps(ast, resolved, *then_branch))
            .max(else_branch.map_or(0, |s| stmt_temps(ast, resolved, s))),
        Stmt::While { cond, body, .. } | Stmt::DoWhile { body, cond, .. } => {
            expr(cond).max(stmt_temps(ast, resolved, *body))
        }
        Stmt::For { init, cond, step, body, .. } => {
            let mut max = init.map_or(0, |s| stmt_temps(ast, resolved, s));
            max = max.max(cond.as_ref().map_or(0, expr));
            max = max.max(step.iter().map(expr).max().unwrap_or(0));
            max.max(stmt_temps(ast, resolved, *body))
        }
        Stmt::Return { value, .. } => value.as_ref().map_or(0, expr),
        Stmt::Asm { .. } => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_into;
    use crate::resolve::resolve;

    fn setup(src: &str) -> (Ast, Resolved) {
        let mut ast = Ast::new();
        parse_into(&mut ast, "vm_api.h".into(), crate::api::API_HEADER).unwrap();
        parse_into(&mut ast, "t.c".into(), src).unwrap();
        let resolved = resolve(&ast).unwrap();
        (ast, resolved)
    }

    fn slot_of(resolved: &Resolved, alloc: &Allocation, name: &str) -> Vec<u32> {
        resolved
            .symbols
            .iter()
            .filter_map(|s| match s {
                Symbol::Global { name: n, var, .. } | Symbol::Local { name: n, var, .. }
                    if n == name =>
                {
                    Some(alloc.slot(*var))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn globals_pinned_from_v4() {
        let (ast, resolved) = setup("int a; int b; void main(void) { a = b; }");
        let alloc = allocate(&ast, &resolved);
        assert_eq!(slot_of(&resolved, &alloc, "a"), vec![4]);
        assert_eq!(slot_of(&resolved, &alloc, "b"), vec![5]);
    }

    #[test]
    fn sibling_scopes_reuse_slots() {
        let (ast, resolved) = setup(
            "void main(void) { { int a; a = 1; } { int b; b = 2; } }",
        );
        let alloc = allocate(&ast, &resolved);
        assert_eq!(slot_of(&resolved, &alloc, "a"), slot_of(&resolved, &alloc, "b"));
    }

    #[test]
    fn shadowed_variables_get_distinct_slots() {
        let (ast, resolved) = setup("void main(void) { int a; { int a; a = 1; } a = 2; }");
        let alloc = allocate(&ast, &resolved);
        let slots = slot_of(&resolved, &alloc, "a");
        assert_eq!(slots.len(), 2);
        assert_ne!(slots[0], slots[1]);
    }

    #[test]
    fn callee_frame_above_caller() {
        let (ast, resolved) = setup(
            "int f(int x) { return x; } void main(void) { int a; a = f(1); p0 = a; }",
        );
        let alloc = allocate(&ast, &resolved);
        let a = slot_of(&resolved, &alloc, "a")[0];
        let x = slot_of(&resolved, &alloc, "x")[0];
        assert!(x > a, "callee param slot {x} must lie above caller local {a}");
    }

    #[test]
    fn sibling_functions_share_slots() {
        let (ast, resolved) = setup(
            "int f(void) { int a; a = 1; return a; } \
             int g(void) { int b; b = 2; return b; } \
             void main(void) { p0 = f(); p1 = g(); }",
        );
        let alloc = allocate(&ast, &resolved);
        assert_eq!(slot_of(&resolved, &alloc, "a"), slot_of(&resolved, &alloc, "b"));
    }

    #[test]
    fn nested_call_argument_reserves_temp() {
        let (ast, resolved) = setup(
            "int f(int a, int b) { return a + b; } \
             int g(void) { return 1; } \
             void main(void) { p0 = f(g(), g()); }",
        );
        let alloc = allocate(&ast, &resolved);
        assert!(alloc.call_temp(resolved.main, 0).is_some());
    }

    #[test]
    fn call_free_body_needs_no_temps() {
        let (ast, resolved) = setup("void main(void) { p0 = (1 + 2) * (3 + 4); }");
        let alloc = allocate(&ast, &resolved);
        assert!(alloc.call_temp(resolved.main, 0).is_none());
    }

    #[test]
    fn high_water_counts_deepest_chain() {
        let (ast, resolved) = setup(
            "int f(int x) { int y; y = x + 1; return y; } \
             void main(void) { int a; a = f(2); p0 = a; }",
        );
        let alloc = allocate(&ast, &resolved);
        // main.a plus f's frame (x, y) stacked above it.
        assert_eq!(alloc.slots_used, 3);
    }
}
