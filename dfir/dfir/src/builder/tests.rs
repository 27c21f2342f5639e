use expect_test::expect;

use crate::{
    Attrs, BlockBuilder, DType, ExprData, Function, Module, Opcode, Shape, Ty, TypeError,
    TypeInference, VarKind,
};

/// Calls return the type of their first argument
struct FirstArg;

impl TypeInference for FirstArg {
    fn infer_call(&self, op: Opcode, args: &[Ty], attrs: &Attrs) -> Result<Ty, TypeError> {
        match attrs {
            Attrs::Init { shape, dtype } => {
                Ok(Ty::Tensor { shape: Shape::Known(shape.clone()), dtype: *dtype })
            }
            Attrs::None => {
                args.first().cloned().ok_or(TypeError::ArgCount { op, expected: 1, found: 0 })
            }
        }
    }
}

fn vector_fn() -> Function {
    let mut func = Function::new("test");
    func.make_param("x", Ty::tensor(&[3], DType::F32));
    func.make_param("y", Ty::tensor(&[3], DType::F32));
    func
}

#[test]
fn normalize_nested() {
    let mut func = vector_fn();
    let (x, y) = (func.params[0], func.params[1]);

    let arg = func.var_ref(x);
    let exp = func.make_call(Opcode::Exp, [arg]);
    let fields = [func.var_ref(x), func.var_ref(y)];
    let tuple = func.make_tuple(fields);
    let item = func.make_tuple_get_item(tuple, 1);
    let sum = func.make_call(Opcode::Add, [exp, item]);

    let mut builder = BlockBuilder::dataflow(&mut func, &FirstArg);
    let out = builder.emit_new("out", sum, VarKind::Output).unwrap();
    builder.finish();
    func.ret = Some(func.var_ref(out));
    func.ret_ty = Some(func.vars[out].ty.clone());

    assert!(func.validate());
    expect![[r#"
        function %test(x: Tensor((3,), f32), y: Tensor((3,), f32)) -> Tensor((3,), f32) {
            dataflow {
                lv: Tensor((3,), f32) = exp(x)
                lv1: Tuple(Tensor((3,), f32), Tensor((3,), f32)) = (x, y)
                lv2: Tensor((3,), f32) = lv1[1]
                output out: Tensor((3,), f32) = add(lv, lv2)
            }
            return out
        }
    "#]]
    .assert_eq(&func.to_debug_string());
}

#[test]
fn normal_form_is_kept() {
    let mut func = vector_fn();
    let (x, y) = (func.params[0], func.params[1]);
    let args = [func.var_ref(x), func.var_ref(y)];
    let call = func.make_call(Opcode::Multiply, args);
    let zeros = func.make_init(Opcode::Zeros, &[3], DType::F32);
    let nested = [func.var_ref(x), func.var_ref(y)];
    let nested = func.make_tuple(nested);
    let tuple = [nested, func.var_ref(x)];
    let tuple = func.make_tuple(tuple);

    let mut builder = BlockBuilder::dataflow(&mut func, &FirstArg);
    assert_eq!(builder.normalize(call), Ok(call));
    assert_eq!(builder.normalize(zeros), Ok(zeros));
    assert_eq!(builder.normalize(tuple), Ok(tuple));
    assert!(builder.bindings().is_empty());
}

#[test]
fn tuple_fields_are_bound() {
    let mut func = vector_fn();
    let x = func.params[0];
    let arg = func.var_ref(x);
    let neg = func.make_call(Opcode::Negative, [arg]);
    let zeros = func.make_init(Opcode::Zeros, &[3], DType::F32);
    let inner = func.make_tuple([zeros]);
    let tuple = func.make_tuple([neg, inner]);

    let mut builder = BlockBuilder::dataflow(&mut func, &FirstArg);
    let normalized = builder.normalize(tuple).unwrap();
    assert_eq!(builder.bindings().len(), 2);
    builder.finish();

    let ExprData::Tuple(fields) = &func.exprs[normalized] else { panic!("expected a tuple") };
    assert!(matches!(func.exprs[fields[0]], ExprData::Var(_)));
    let ExprData::Tuple(inner) = &func.exprs[fields[1]] else { panic!("expected a tuple") };
    assert!(matches!(func.exprs[inner[0]], ExprData::Var(_)));
    assert_eq!(func.display_expr(normalized).to_string(), "(lv, (lv1,))");
}

#[test]
fn unique_names() {
    let mut func = Function::new("names");
    let ty = Ty::scalar(DType::F32);
    func.make_var("lv1", ty.clone(), VarKind::Dataflow);
    let names: Vec<_> = (0..3)
        .map(|_| {
            let var = func.make_var("lv", ty.clone(), VarKind::Dataflow);
            func.var_name(var).to_owned()
        })
        .collect();
    assert_eq!(names, ["lv", "lv2", "lv3"]);
    assert_eq!(func.var_by_name("lv2").map(|var| func.var_name(var)), Some("lv2"));
}

#[test]
fn validation() {
    let mut func = vector_fn();
    let x = func.params[0];
    let arg = func.var_ref(x);
    let exp = func.make_call(Opcode::Exp, [arg]);
    let mut builder = BlockBuilder::dataflow(&mut func, &FirstArg);
    let local = builder.emit_new("local", exp, VarKind::Dataflow).unwrap();
    builder.finish();
    func.ret = Some(func.var_ref(local));
    assert_eq!(func.validation_errors(), ["dataflow variable local escapes its block"]);

    func.vars[local].kind = VarKind::Output;
    assert!(func.validate());

    let value = func.blocks[0].bindings[0].value;
    func.blocks[0].bindings.push(crate::Binding { var: x, value });
    assert_eq!(func.validation_errors(), ["parameter x is rebound"]);
}

#[test]
fn module_copy_on_write() {
    let mut module = Module::new();
    module.add(vector_fn());
    let extended = module.with_function(Function::new("other"));
    assert_eq!(module.len(), 1);
    assert_eq!(extended.len(), 2);
    assert!(module.shares(&extended, "test"));
    assert!(!module.contains("other"));
    assert_eq!(extended.lookup("other").map(|id| extended[id].name.as_str()), Some("other"));
}
