use expect_test::expect;

use crate::{
    Binding, Block, BlockKind, Constant, DType, ExprData, Function, Module, Opcode, Shape, Ty,
    VarKind,
};

#[test]
fn write_expressions() {
    let mut func = Function::new("exprs");
    let x = func.make_param("x", Ty::Tensor { shape: Shape::runtime(Some(2)), dtype: DType::F64 });
    let state = func.make_param(
        "state",
        Ty::Tuple(Box::new([
            Ty::Tensor { shape: Shape::runtime(None), dtype: DType::I64 },
            Ty::Tuple(Box::new([])),
        ])),
    );

    let mut block = Block::new(BlockKind::Binding);
    let ones = func.make_init(Opcode::Ones, &[], DType::F32);
    let a = func.make_var("a", Ty::scalar(DType::F32), VarKind::Output);
    block.bindings.push(Binding { var: a, value: ones });

    let half = func.make_expr(ExprData::Constant(Constant { val: 0.5, dtype: DType::F32 }));
    let state_ref = func.var_ref(state);
    let item = func.make_tuple_get_item(state_ref, 0);
    let fields = [func.var_ref(x), half];
    let single = func.make_tuple([item]);
    let tuple = func.make_tuple([fields[0], fields[1], single]);
    let b = func.make_var("b", Ty::Tuple(Box::new([])), VarKind::Output);
    block.bindings.push(Binding { var: b, value: tuple });

    let zeros = func.make_init(Opcode::Zeros, &[2], DType::F32);
    let c = func.make_var("c", Ty::tensor(&[2], DType::F32), VarKind::Output);
    block.bindings.push(Binding { var: c, value: zeros });
    func.blocks.push(block);

    let ret = [func.var_ref(a), func.var_ref(c)];
    func.ret = Some(func.make_tuple(ret));

    expect![[r#"
        function %exprs(x: Tensor(?2, f64), state: Tuple(Tensor(?, i64), Tuple())) {
            bindings {
                a: Tensor((), f32) = ones((), f32)
                b: Tuple() = (x, 0.5, (state[0],))
                c: Tensor((2,), f32) = zeros((2,), f32)
            }
            return (a, c)
        }
    "#]]
    .assert_eq(&func.to_debug_string());
}

#[test]
fn write_module() {
    let mut module = Module::new();
    for name in ["first", "second"] {
        let mut func = Function::new(name);
        let x = func.make_param("x", Ty::scalar(DType::F32));
        func.blocks.push(Block::new(BlockKind::Dataflow));
        func.ret = Some(func.var_ref(x));
        func.ret_ty = Some(Ty::scalar(DType::F32));
        module.add(func);
    }

    expect![[r#"
        function %first(x: Tensor((), f32)) -> Tensor((), f32) {
            dataflow {
            }
            return x
        }

        function %second(x: Tensor((), f32)) -> Tensor((), f32) {
            dataflow {
            }
            return x
        }
    "#]]
    .assert_eq(&module.to_string());
}
