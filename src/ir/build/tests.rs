//! Builder tests: the structural properties of the emitted IR, and
//! end-to-end semantics through the interpreter.

use crate::common::target::X86_64_LINUX;
use crate::frontend::ast::testing::*;
use crate::frontend::ast::{
    self, AstType, BinaryOp as AstBinOp, DeclOrExpr, Expr, ExprKind, Init, InitList, Scalar,
    Stmt, StmtKind, UnaryOp as AstUnOp, Var, SCOPE_GLOBAL, SCOPE_PARAMS,
};
use crate::ir::build::{build_unit, BuildFlags};
use crate::ir::cfg::live_blocks;
use crate::ir::interp::exec_unit;
use crate::ir::ir::*;
use crate::ir::ty::{IrType, Primitive};

fn build(tu: &ast::TranslationUnit) -> Unit {
    build_unit(X86_64_LINUX, tu, BuildFlags::empty())
}

fn run(tu: &ast::TranslationUnit) -> i32 {
    let unit = build(tu);
    exec_unit(&unit, "main").expect("interpretation failed").exit_code
}

fn ops_of<'f>(func: &'f Func) -> Vec<&'f Op> {
    func.op_ids().into_iter().map(|id| func.op(id)).collect()
}

fn find_phi(func: &Func) -> Vec<OpId> {
    func.op_ids()
        .into_iter()
        .filter(|&id| matches!(func.op(id).kind, OpKind::Phi { .. }))
        .collect()
}

// ── spec scenarios ────────────────────────────────────────────────────────────

#[test]
fn add_one_to_param_is_a_single_block() {
    // int f(int x) { return x + 1; }
    let f = func_def(
        "f",
        func_ty(int_ty(), vec![("x", int_ty())]),
        vec![ret(bin(
            AstBinOp::Add,
            int_ty(),
            var("x", SCOPE_PARAMS, int_ty()),
            int(1),
        ))],
    );
    let unit = build(&unit(vec![ast::ExternalDecl::FuncDef(f)]));
    let func = unit.func_by_name("f").unwrap();

    assert_eq!(live_blocks(func).len(), 1);

    let ops = ops_of(func);
    let mov = ops
        .iter()
        .find(|op| matches!(op.kind, OpKind::Mov { value: None }))
        .expect("no param mov");
    assert!(mov.flags.contains(OpFlags::PARAM));
    assert_eq!(mov.ty, IrType::Primitive(Primitive::I32));

    let add = ops
        .iter()
        .find(|op| matches!(op.kind, OpKind::Binary { op: BinaryOp::Add, .. }))
        .expect("no add");
    let OpKind::Binary { lhs, rhs, .. } = add.kind else { unreachable!() };
    assert_eq!(lhs, mov.id);
    assert!(matches!(func.op(rhs).kind, OpKind::CnstInt(1)));

    let ret_op = ops
        .iter()
        .find(|op| matches!(op.kind, OpKind::Ret { .. }))
        .expect("no ret");
    assert!(matches!(ret_op.kind, OpKind::Ret { value: Some(v) } if v == add.id));
}

#[test]
fn ternary_max_builds_split_merge_with_phi() {
    // int max(int a, int b) { return a > b ? a : b; }
    let max = func_def(
        "max",
        func_ty(int_ty(), vec![("a", int_ty()), ("b", int_ty())]),
        vec![ret(ternary(
            int_ty(),
            bin(
                AstBinOp::Gt,
                int_ty(),
                var("a", SCOPE_PARAMS, int_ty()),
                var("b", SCOPE_PARAMS, int_ty()),
            ),
            var("a", SCOPE_PARAMS, int_ty()),
            var("b", SCOPE_PARAMS, int_ty()),
        ))],
    );
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(call(
            int_ty(),
            "max",
            func_ty(int_ty(), vec![("a", int_ty()), ("b", int_ty())]),
            vec![int(3), int(7)],
        ))],
    );
    let tu = unit(vec![
        ast::ExternalDecl::FuncDef(max),
        ast::ExternalDecl::FuncDef(main),
    ]);

    let built = build(&tu);
    let func = built.func_by_name("max").unwrap();

    // entry split, two arms, a merge block
    assert_eq!(live_blocks(func).len(), 4);
    let entry = func.entry_block();
    assert!(matches!(func.block(entry).term, Terminator::Split { .. }));

    let phis = find_phi(func);
    assert_eq!(phis.len(), 1);
    let phi = func.op(phis[0]);
    assert_eq!(phi.ty, IrType::Primitive(Primitive::I32));
    let OpKind::Phi { entries } = &phi.kind else { unreachable!() };
    assert_eq!(entries.len(), 2);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 7);
}

#[test]
fn short_to_int_spill_all_uses_locals_and_sext() {
    // short s = 1; int i = s;  (spill-all build: everything addressable)
    let f = func_def(
        "f",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("s", 2, short_ty(), Some(Init::Expr(cnst(short_ty(), 1)))),
            decl_stmt("i", 2, int_ty(), Some(Init::Expr(cast(int_ty(), var("s", 2, short_ty()))))),
            ret(var("i", 2, int_ty())),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(f)]);
    let built = build_unit(X86_64_LINUX, &tu, BuildFlags::SPILL_ALL);
    let func = built.func_by_name("f").unwrap();

    let local_tys: Vec<IrType> = func.locals.iter().map(|l| l.ty.clone()).collect();
    assert_eq!(
        local_tys,
        vec![IrType::Primitive(Primitive::I16), IrType::Primitive(Primitive::I32)]
    );

    let has_sext = func
        .op_ids()
        .into_iter()
        .any(|id| matches!(func.op(id).kind, OpKind::Cast { op: CastOp::Sext, .. }));
    assert!(has_sext, "widening short to int must sign-extend");
}

#[test]
fn struct_init_zeroes_then_stores_fields() {
    // struct P { int x, y; } p = { 1, 2 }; int a = p.y; return a;
    let p_ty = struct_ty("P", vec![("x", int_ty()), ("y", int_ty())]);
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("p", 2, p_ty.clone(), Some(init_list(p_ty.clone(), vec![int(1), int(2)]))),
            decl_stmt(
                "a",
                2,
                int_ty(),
                Some(Init::Expr(member(int_ty(), var("p", 2, p_ty.clone()), "y"))),
            ),
            ret(var("a", 2, int_ty())),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);
    let func = built.func_by_name("main").unwrap();

    // the whole 8-byte object is zeroed ahead of the member stores
    let memset = func
        .op_ids()
        .into_iter()
        .find(|&id| matches!(func.op(id).kind, OpKind::MemSet { .. }))
        .expect("no zero memset");
    let OpKind::MemSet { len, .. } = func.op(memset).kind else { unreachable!() };
    assert!(matches!(func.op(len).kind, OpKind::CnstInt(8)));

    // two field stores, at +0 and +4
    let mut store_offsets = Vec::new();
    for id in func.op_ids() {
        if let OpKind::Store { dst: MemLoc::Addr(addr), value } = func.op(id).kind {
            if !matches!(func.op(value).kind, OpKind::CnstInt(_)) {
                continue;
            }
            match func.op(addr).kind {
                OpKind::AddrOffset { offset, .. } => store_offsets.push(offset),
                OpKind::Addr(_) => store_offsets.push(0),
                _ => {}
            }
        }
    }
    assert_eq!(store_offsets, vec![0, 4]);

    // and the memset precedes both stores in layout order
    let order = func.op_ids();
    let memset_pos = order.iter().position(|&id| id == memset).unwrap();
    let first_store = order
        .iter()
        .position(|&id| matches!(func.op(id).kind, OpKind::Store { dst: MemLoc::Addr(_), .. }))
        .unwrap();
    assert!(memset_pos < first_store);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 2);
}

#[test]
fn address_of_compound_literal_becomes_global() {
    // int *p = &(int){10};   (file scope)
    let literal = Expr::new(
        int_ty(),
        ExprKind::CompoundLiteral {
            init: InitList {
                ty: int_ty(),
                inits: vec![ast::InitEntry { designators: vec![], init: Init::Expr(int(10)) }],
            },
        },
    );
    let p_ty = AstType::ptr_to(int_ty());
    let tu = unit(vec![global_decl(
        "p",
        p_ty.clone(),
        Some(Init::Expr(unary(AstUnOp::AddrOf, p_ty, literal))),
    )]);

    let built = build(&tu);

    let p = built
        .globals
        .iter()
        .find(|g| g.name.as_deref() == Some("p"))
        .expect("no global p");
    assert_eq!(p.def, DefState::Defined);
    let GlobalValue::Addr { glb, offset: 0 } = p.var.as_ref().unwrap().value else {
        panic!("p not initialised with an address")
    };

    let hoisted = built.global(glb);
    assert!(hoisted.name.is_none(), "hoisted literal is anonymous");
    assert_eq!(hoisted.def, DefState::Defined);
    assert_eq!(hoisted.ty, IrType::Primitive(Primitive::I32));
    assert!(matches!(
        hoisted.var.as_ref().unwrap().value,
        GlobalValue::Int { value: 10, .. }
    ));
}

#[test]
fn short_circuit_and_phis_zero_and_one() {
    // int f(int a, int b) { return a && b; }
    let f = func_def(
        "f",
        func_ty(int_ty(), vec![("a", int_ty()), ("b", int_ty())]),
        vec![ret(bin(
            AstBinOp::LogicalAnd,
            int_ty(),
            var("a", SCOPE_PARAMS, int_ty()),
            var("b", SCOPE_PARAMS, int_ty()),
        ))],
    );
    let fty = func_ty(int_ty(), vec![("a", int_ty()), ("b", int_ty())]);
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(bin(
            AstBinOp::Add,
            int_ty(),
            call(int_ty(), "f", fty.clone(), vec![int(1), int(0)]),
            bin(
                AstBinOp::Mul,
                int_ty(),
                call(int_ty(), "f", fty, vec![int(3), int(4)]),
                int(10),
            ),
        ))],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(f), ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);

    let func = built.func_by_name("f").unwrap();
    let phis = find_phi(func);
    assert_eq!(phis.len(), 1);
    let OpKind::Phi { entries } = &func.op(phis[0]).kind else { unreachable!() };
    let mut entry_values: Vec<u64> = entries
        .iter()
        .map(|e| match func.op(e.value).kind {
            OpKind::CnstInt(v) => v,
            ref other => panic!("phi entry is not a constant: {:?}", other),
        })
        .collect();
    entry_values.sort_unstable();
    assert_eq!(entry_values, vec![0, 1]);

    // f(1,0) == 0, f(3,4) == 1
    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 10);
}

// ── pointer arithmetic ────────────────────────────────────────────────────────

#[test]
fn array_index_and_pointer_add_lower_identically() {
    // long f(int *a, long i) { return *(a + i); }
    // long g(int *a, long i) { return a[i]; }
    let a_ty = AstType::ptr_to(int_ty());
    let params = vec![("a", a_ty.clone()), ("i", long_ty())];

    let f = func_def(
        "f",
        func_ty(int_ty(), params.clone()),
        vec![ret(unary(
            AstUnOp::Deref,
            int_ty(),
            bin(
                AstBinOp::Add,
                a_ty.clone(),
                var("a", SCOPE_PARAMS, a_ty.clone()),
                var("i", SCOPE_PARAMS, long_ty()),
            ),
        ))],
    );
    let g = func_def(
        "g",
        func_ty(int_ty(), params),
        vec![ret(index(
            int_ty(),
            var("a", SCOPE_PARAMS, a_ty.clone()),
            var("i", SCOPE_PARAMS, long_ty()),
        ))],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(f), ast::ExternalDecl::FuncDef(g)]);
    let built = build(&tu);

    for name in ["f", "g"] {
        let func = built.func_by_name(name).unwrap();
        let offsets: Vec<(u64, bool)> = func
            .op_ids()
            .into_iter()
            .filter_map(|id| match func.op(id).kind {
                OpKind::AddrOffset { scale, index, .. } => Some((scale, index.is_some())),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![(4, true)], "{} must use one scaled address-offset", name);
    }
}

// ── phi back-patching ─────────────────────────────────────────────────────────

#[test]
fn join_after_if_backpatches_a_phi() {
    // int f(int c) { int x = 1; if (c) { x = 2; } return x; }
    let f = func_def(
        "f",
        func_ty(int_ty(), vec![("c", int_ty())]),
        vec![
            decl_stmt("x", 2, int_ty(), Some(Init::Expr(int(1)))),
            if_stmt(
                var("c", SCOPE_PARAMS, int_ty()),
                block(vec![expr_stmt(assign(var("x", 2, int_ty()), int(2)))]),
            ),
            ret(var("x", 2, int_ty())),
        ],
    );
    let fty = func_ty(int_ty(), vec![("c", int_ty())]);
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(bin(
            AstBinOp::Add,
            int_ty(),
            bin(AstBinOp::Mul, int_ty(), call(int_ty(), "f", fty.clone(), vec![int(1)]), int(10)),
            call(int_ty(), "f", fty, vec![int(0)]),
        ))],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(f), ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);

    let func = built.func_by_name("f").unwrap();
    let phis = find_phi(func);
    assert_eq!(phis.len(), 1, "the join needs exactly one phi for x");
    let OpKind::Phi { entries } = &func.op(phis[0]).kind else { unreachable!() };
    assert_eq!(entries.len(), 2);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 21);
}

#[test]
fn backward_goto_loop_terminates_phi_fixpoint() {
    // int main() { int i = 0; again: i = i + 1; if (i < 5) goto again; return i; }
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("i", 2, int_ty(), Some(Init::Expr(int(0)))),
            Stmt::new(StmtKind::Label(
                "again".to_string(),
                Box::new(expr_stmt(assign(
                    var("i", 2, int_ty()),
                    bin(AstBinOp::Add, int_ty(), var("i", 2, int_ty()), int(1)),
                ))),
            )),
            if_stmt(
                bin(AstBinOp::Lt, int_ty(), var("i", 2, int_ty()), int(5)),
                Stmt::new(StmtKind::Goto("again".to_string())),
            ),
            ret(var("i", 2, int_ty())),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 5);
}

// ── loops, switch ─────────────────────────────────────────────────────────────

#[test]
fn for_loop_sums() {
    // int main() { int acc = 0; int i;
    //              for (i = 0; i < 10; i = i + 1) acc = acc + i;
    //              return acc; }   -> 45
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("acc", 2, int_ty(), Some(Init::Expr(int(0)))),
            decl_stmt("i", 2, int_ty(), None),
            for_stmt(
                Some(DeclOrExpr::Expr(assign(var("i", 2, int_ty()), int(0)))),
                Some(bin(AstBinOp::Lt, int_ty(), var("i", 2, int_ty()), int(10))),
                Some(assign(
                    var("i", 2, int_ty()),
                    bin(AstBinOp::Add, int_ty(), var("i", 2, int_ty()), int(1)),
                )),
                block(vec![expr_stmt(assign(
                    var("acc", 2, int_ty()),
                    bin(AstBinOp::Add, int_ty(), var("acc", 2, int_ty()), var("i", 2, int_ty())),
                ))]),
            ),
            ret(var("acc", 2, int_ty())),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 45);
}

#[test]
fn switch_dispatches_cases_and_default() {
    // int classify(int x) { switch (x) { case 0: return 10;
    //                                    case 5: return 50;
    //                                    default: return 1; } }
    let classify = func_def(
        "classify",
        func_ty(int_ty(), vec![("x", int_ty())]),
        vec![Stmt::new(StmtKind::Switch {
            ctrl: var("x", SCOPE_PARAMS, int_ty()),
            body: Box::new(block(vec![
                Stmt::new(StmtKind::Case(0, Box::new(ret(int(10))))),
                Stmt::new(StmtKind::Case(5, Box::new(ret(int(50))))),
                Stmt::new(StmtKind::Default(Box::new(ret(int(1))))),
            ])),
        })],
    );
    let fty = func_ty(int_ty(), vec![("x", int_ty())]);
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(bin(
            AstBinOp::Add,
            int_ty(),
            call(int_ty(), "classify", fty.clone(), vec![int(0)]),
            bin(
                AstBinOp::Add,
                int_ty(),
                call(int_ty(), "classify", fty.clone(), vec![int(5)]),
                call(int_ty(), "classify", fty, vec![int(3)]),
            ),
        ))],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(classify), ast::ExternalDecl::FuncDef(main)]);

    let built = build(&tu);
    let func = built.func_by_name("classify").unwrap();
    let has_switch = live_blocks(func)
        .iter()
        .any(|&b| matches!(func.block(b).term, Terminator::Switch { .. }));
    assert!(has_switch);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 61);
}

#[test]
fn recursion_fibonacci() {
    // int fib(int n) { if (n < 2) { return n; } return fib(n-1) + fib(n-2); }
    let fty = func_ty(int_ty(), vec![("n", int_ty())]);
    let fib = func_def(
        "fib",
        fty.clone(),
        vec![
            if_stmt(
                bin(AstBinOp::Lt, int_ty(), var("n", SCOPE_PARAMS, int_ty()), int(2)),
                block(vec![ret(var("n", SCOPE_PARAMS, int_ty()))]),
            ),
            ret(bin(
                AstBinOp::Add,
                int_ty(),
                call(
                    int_ty(),
                    "fib",
                    fty.clone(),
                    vec![bin(AstBinOp::Sub, int_ty(), var("n", SCOPE_PARAMS, int_ty()), int(1))],
                ),
                call(
                    int_ty(),
                    "fib",
                    fty.clone(),
                    vec![bin(AstBinOp::Sub, int_ty(), var("n", SCOPE_PARAMS, int_ty()), int(2))],
                ),
            )),
        ],
    );
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(call(int_ty(), "fib", fty, vec![int(10)]))],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(fib), ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 55);
}

// ── defer ─────────────────────────────────────────────────────────────────────

#[test]
fn defer_runs_at_scope_exit_in_lifo_order() {
    // int g;
    // int main() { { defer g = g + 1; defer g = g * 10; g = 3; } return g; }
    // LIFO: *10 first, then +1 -> 31
    let g = || var("g", SCOPE_GLOBAL, int_ty());
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            block(vec![
                defer_stmt(expr_stmt(assign(g(), bin(AstBinOp::Add, int_ty(), g(), int(1))))),
                defer_stmt(expr_stmt(assign(g(), bin(AstBinOp::Mul, int_ty(), g(), int(10))))),
                expr_stmt(assign(g(), int(3))),
            ]),
            ret(g()),
        ],
    );
    let tu = unit(vec![
        global_decl("g", int_ty(), None),
        ast::ExternalDecl::FuncDef(main),
    ]);
    assert_eq!(run(&tu), 31);
}

#[test]
fn defer_runs_on_early_return_across_scopes() {
    // int g;
    // void h() { defer g = g + 1; { defer g = g + 10; return; } }
    // int main() { g = 0; h(); return g; }  -> 11
    let g = || var("g", SCOPE_GLOBAL, int_ty());
    let h = func_def(
        "h",
        func_ty(AstType::Void, vec![]),
        vec![
            defer_stmt(expr_stmt(assign(g(), bin(AstBinOp::Add, int_ty(), g(), int(1))))),
            block(vec![
                defer_stmt(expr_stmt(assign(g(), bin(AstBinOp::Add, int_ty(), g(), int(10))))),
                Stmt::new(StmtKind::Return(None)),
            ]),
        ],
    );
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            expr_stmt(assign(g(), int(0))),
            expr_stmt(call(AstType::Void, "h", func_ty(AstType::Void, vec![]), vec![])),
            ret(g()),
        ],
    );
    let tu = unit(vec![
        global_decl("g", int_ty(), None),
        ast::ExternalDecl::FuncDef(h),
        ast::ExternalDecl::FuncDef(main),
    ]);
    assert_eq!(run(&tu), 11);
}

#[test]
fn defer_runs_on_loop_break() {
    // int main() { int i; int acc = 0;
    //   for (i = 0; i < 10; i = i + 1) {
    //     defer acc = acc + 1;
    //     if (i == 2) break;
    //   }
    //   return acc; }   -> three body exits (i = 0, 1, and the break)
    let acc = || var("acc", 2, int_ty());
    let i = || var("i", 2, int_ty());
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("i", 2, int_ty(), None),
            decl_stmt("acc", 2, int_ty(), Some(Init::Expr(int(0)))),
            for_stmt(
                Some(DeclOrExpr::Expr(assign(i(), int(0)))),
                Some(bin(AstBinOp::Lt, int_ty(), i(), int(10))),
                Some(assign(i(), bin(AstBinOp::Add, int_ty(), i(), int(1)))),
                block(vec![
                    defer_stmt(expr_stmt(assign(
                        acc(),
                        bin(AstBinOp::Add, int_ty(), acc(), int(1)),
                    ))),
                    if_stmt(
                        bin(AstBinOp::Eq, int_ty(), i(), int(2)),
                        Stmt::new(StmtKind::Break),
                    ),
                ]),
            ),
            ret(acc()),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 3);
}

// ── bitfields ─────────────────────────────────────────────────────────────────

#[test]
fn bitfield_store_and_load_roundtrip() {
    // struct F { int a : 5; int b : 3; } f;
    // f.a = 9; f.b = 5; f.b = f.b; return f.a + f.b;  -> 14
    let f_ty = AstType::Aggregate(std::sync::Arc::new(ast::AggregateType {
        kind: ast::AggregateKind::Struct,
        name: Some("F".to_string()),
        fields: vec![
            ast::Field { name: Some("a".to_string()), ty: int_ty(), bitfield_width: Some(5) },
            ast::Field { name: Some("b".to_string()), ty: int_ty(), bitfield_width: Some(3) },
        ],
    }));
    let fv = || var("f", 2, f_ty.clone());
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("f", 2, f_ty.clone(), None),
            expr_stmt(assign(member(int_ty(), fv(), "a"), int(9))),
            expr_stmt(assign(member(int_ty(), fv(), "b"), int(5))),
            // a read immediately written back must be a no-op
            expr_stmt(assign(member(int_ty(), fv(), "b"), member(int_ty(), fv(), "b"))),
            ret(bin(
                AstBinOp::Add,
                int_ty(),
                member(int_ty(), fv(), "a"),
                member(int_ty(), fv(), "b"),
            )),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);

    let func = built.func_by_name("main").unwrap();
    let has_bf_store = func
        .op_ids()
        .into_iter()
        .any(|id| matches!(func.op(id).kind, OpKind::StoreBitfield { .. }));
    let has_bf_load = func
        .op_ids()
        .into_iter()
        .any(|id| matches!(func.op(id).kind, OpKind::LoadBitfield { .. }));
    assert!(has_bf_store && has_bf_load);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 14);
}

// ── globals, strings, builtins ────────────────────────────────────────────────

#[test]
fn global_values_and_tentative_zeroing() {
    // int g = 5; int t; int main() { return g + t; }
    let tu = unit(vec![
        global_decl("g", int_ty(), Some(Init::Expr(int(5)))),
        global_decl("t", int_ty(), None),
        ast::ExternalDecl::FuncDef(func_def(
            "main",
            func_ty(int_ty(), vec![]),
            vec![ret(bin(
                AstBinOp::Add,
                int_ty(),
                var("g", SCOPE_GLOBAL, int_ty()),
                var("t", SCOPE_GLOBAL, int_ty()),
            ))],
        )),
    ]);

    let built = build(&tu);
    let t = built.globals.iter().find(|g| g.name.as_deref() == Some("t")).unwrap();
    assert_eq!(t.def, DefState::Defined);
    assert!(matches!(t.var.as_ref().unwrap().value, GlobalValue::Zero));

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 5);
}

#[test]
fn string_literal_indexing() {
    // char *s = "AB"; return s[1];  -> 'B'
    let s_ty = AstType::ptr_to(AstType::Scalar(Scalar::Char));
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt(
                "s",
                2,
                s_ty.clone(),
                Some(Init::Expr(Expr::new(
                    s_ty.clone(),
                    ExprKind::ConstString(ast::StringLiteral::Ascii(b"AB".to_vec())),
                ))),
            ),
            ret(cast(
                int_ty(),
                index(AstType::Scalar(Scalar::Char), var("s", 2, s_ty), int(1)),
            )),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 66);
}

#[test]
fn builtin_popcount_lowers_to_unary_op() {
    // return __builtin_popcount(255);  -> 8
    let builtin_ty = func_ty(int_ty(), vec![("x", int_ty())]);
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(Expr::new(
            int_ty(),
            ExprKind::Call {
                target: Box::new(Expr::new(
                    builtin_ty,
                    ExprKind::Builtin("__builtin_popcount".to_string()),
                )),
                args: vec![int(255)],
            },
        ))],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);

    let func = built.func_by_name("main").unwrap();
    let has_popcount = func
        .op_ids()
        .into_iter()
        .any(|id| matches!(func.op(id).kind, OpKind::Unary { op: UnaryOp::Popcount, .. }));
    assert!(has_popcount);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 8);
}

#[test]
fn variadic_sum_through_va_arg() {
    // int sum(int n, ...) { unsigned long ap; __builtin_va_start(ap);
    //   int total = 0; int i;
    //   for (i = 0; i < n; i = i + 1) total = total + va_arg(ap, int);
    //   return total; }
    // int main() { return sum(3, 30, 10, 2); }  -> 42
    let ap_ty = AstType::Scalar(Scalar::UnsignedLong);
    let ap = || var("ap", 2, ap_ty.clone());
    let total = || var("total", 2, int_ty());
    let i = || var("i", 2, int_ty());

    let va_start_ty = func_ty(AstType::Void, vec![("ap", ap_ty.clone())]);
    let sum_sig = AstType::Func(std::sync::Arc::new(ast::FuncType {
        ret: int_ty(),
        params: vec![ast::Param { name: Some("n".to_string()), ty: int_ty() }],
        variadic: true,
    }));

    let sum = ast::FuncDef {
        storage: ast::StorageClass::None,
        is_inline: false,
        var: Var::new("sum", SCOPE_GLOBAL),
        ty: sum_sig.clone(),
        body: block(vec![
            decl_stmt("ap", 2, ap_ty.clone(), None),
            expr_stmt(Expr::new(
                AstType::Void,
                ExprKind::Call {
                    target: Box::new(Expr::new(
                        va_start_ty,
                        ExprKind::Builtin("__builtin_va_start".to_string()),
                    )),
                    args: vec![ap()],
                },
            )),
            decl_stmt("total", 2, int_ty(), Some(Init::Expr(int(0)))),
            decl_stmt("i", 2, int_ty(), None),
            for_stmt(
                Some(DeclOrExpr::Expr(assign(i(), int(0)))),
                Some(bin(AstBinOp::Lt, int_ty(), i(), var("n", SCOPE_PARAMS, int_ty()))),
                Some(assign(i(), bin(AstBinOp::Add, int_ty(), i(), int(1)))),
                block(vec![expr_stmt(assign(
                    total(),
                    bin(
                        AstBinOp::Add,
                        int_ty(),
                        total(),
                        Expr::new(int_ty(), ExprKind::VaArg { list: Box::new(ap()) }),
                    ),
                ))]),
            ),
            ret(total()),
        ]),
    };

    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![ret(Expr::new(
            int_ty(),
            ExprKind::Call {
                target: Box::new(Expr::new(
                    sum_sig,
                    ExprKind::Var(Var::new("sum", SCOPE_GLOBAL)),
                )),
                args: vec![int(3), int(30), int(10), int(2)],
            },
        ))],
    );

    let tu = unit(vec![ast::ExternalDecl::FuncDef(sum), ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);

    let func = built.func_by_name("sum").unwrap();
    assert!(func.flags.contains(FuncFlags::USES_VA_ARGS));

    // arguments past the fixed parameters are flagged variadic at the call
    let main_func = built.func_by_name("main").unwrap();
    let variadic_args = main_func
        .op_ids()
        .into_iter()
        .filter(|&id| main_func.op(id).flags.contains(OpFlags::VARIADIC_ARG))
        .count();
    assert_eq!(variadic_args, 3);

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 42);
}

#[test]
fn compound_literal_in_function_materialises_local() {
    // int main() { int *p = &(int){10}; return *p; }
    let literal = Expr::new(
        int_ty(),
        ExprKind::CompoundLiteral {
            init: InitList {
                ty: int_ty(),
                inits: vec![ast::InitEntry { designators: vec![], init: Init::Expr(int(10)) }],
            },
        },
    );
    let p_ty = AstType::ptr_to(int_ty());
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt(
                "p",
                2,
                p_ty.clone(),
                Some(Init::Expr(unary(AstUnOp::AddrOf, p_ty.clone(), literal))),
            ),
            ret(unary(AstUnOp::Deref, int_ty(), var("p", 2, p_ty))),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 10);
}

#[test]
fn while_loop_with_compound_assign() {
    // int main() { int n = 1; while (n < 100) { n = n * 2; } return n; } -> 128
    let n = || var("n", 2, int_ty());
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("n", 2, int_ty(), Some(Init::Expr(int(1)))),
            while_stmt(
                bin(AstBinOp::Lt, int_ty(), n(), int(100)),
                block(vec![expr_stmt(assign(
                    n(),
                    bin(AstBinOp::Mul, int_ty(), n(), int(2)),
                ))]),
            ),
            ret(n()),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    assert_eq!(run(&tu), 128);
}

#[test]
fn textual_dump_names_the_interesting_ops() {
    let f = func_def(
        "f",
        func_ty(int_ty(), vec![("x", int_ty())]),
        vec![ret(bin(
            AstBinOp::Add,
            int_ty(),
            var("x", SCOPE_PARAMS, int_ty()),
            int(1),
        ))],
    );
    let built = build(&unit(vec![ast::ExternalDecl::FuncDef(f)]));

    let dump = crate::ir::print::print_unit(&built);
    assert!(dump.contains("func f (i32) -> i32"));
    assert!(dump.contains("add"));
    assert!(dump.contains("ret"));
    assert!(dump.contains("(param)"));
}

#[test]
fn every_live_block_terminates() {
    // structural invariant over a mixed-control function
    let main = func_def(
        "main",
        func_ty(int_ty(), vec![]),
        vec![
            decl_stmt("x", 2, int_ty(), Some(Init::Expr(int(0)))),
            if_else(
                var("x", 2, int_ty()),
                block(vec![expr_stmt(assign(var("x", 2, int_ty()), int(1)))]),
                block(vec![expr_stmt(assign(var("x", 2, int_ty()), int(2)))]),
            ),
            ret(var("x", 2, int_ty())),
        ],
    );
    let tu = unit(vec![ast::ExternalDecl::FuncDef(main)]);
    let built = build(&tu);
    let func = built.func_by_name("main").unwrap();

    for &block in &func.block_order {
        assert!(
            !matches!(func.block(block).term, Terminator::None),
            "block {} has no terminator",
            block
        );
        let last = func.last_op(block).expect("empty live block");
        assert!(func.op(last).kind.is_terminator(), "block {} does not end in a branch", block);
    }

    assert_eq!(exec_unit(&built, "main").unwrap().exit_code, 2);
}
