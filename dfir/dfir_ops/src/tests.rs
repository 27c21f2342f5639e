use dfir::{Attrs, DType, Function, Opcode, Shape, Ty, TypeError, TypeInference};

use crate::{broadcast_shapes, CallInfo, OpRegistry};

fn shape(dims: &[u64]) -> Shape {
    Shape::from(dims)
}

#[test]
fn broadcasting() {
    assert_eq!(broadcast_shapes(&shape(&[5, 5]), &shape(&[5])), shape(&[5, 5]));
    assert_eq!(broadcast_shapes(&shape(&[3, 1]), &shape(&[1, 4])), shape(&[3, 4]));
    assert_eq!(broadcast_shapes(&shape(&[]), &shape(&[2, 3])), shape(&[2, 3]));
    assert_eq!(broadcast_shapes(&shape(&[2, 3]), &shape(&[4, 3])), Shape::runtime(Some(2)));
    assert_eq!(broadcast_shapes(&Shape::runtime(None), &shape(&[4])), Shape::runtime(None));
    assert_eq!(
        broadcast_shapes(&Shape::runtime(Some(3)), &shape(&[4])),
        Shape::Runtime { ndim: Some(3) }
    );
}

#[test]
fn infer_types() {
    let registry = OpRegistry::builtin();
    let matrix = Ty::tensor(&[5, 4], DType::F32);
    let weights = Ty::tensor(&[4, 2], DType::F32);

    let infer = |op, args: &[Ty]| registry.infer_call(op, args, &Attrs::None);
    assert_eq!(infer(Opcode::Matmul, &[matrix.clone(), weights.clone()]), Ok(Ty::tensor(&[5, 2], DType::F32)));
    assert_eq!(infer(Opcode::Transpose, &[matrix.clone()]), Ok(Ty::tensor(&[4, 5], DType::F32)));
    assert_eq!(infer(Opcode::Sum, &[matrix.clone()]), Ok(Ty::scalar(DType::F32)));
    assert_eq!(
        infer(Opcode::Less, &[matrix.clone(), Ty::scalar(DType::F32)]),
        Ok(Ty::tensor(&[5, 4], DType::Bool))
    );
    assert_eq!(
        infer(Opcode::CollapseSumLike, &[matrix.clone(), Ty::tensor(&[4], DType::F32)]),
        Ok(Ty::tensor(&[4], DType::F32))
    );
    assert_eq!(
        infer(Opcode::Matmul, &[weights.clone(), matrix.clone()]),
        Err(TypeError::ShapeMismatch { op: Opcode::Matmul, lhs: shape(&[4, 2]), rhs: shape(&[5, 4]) })
    );
    assert_eq!(
        infer(Opcode::Add, &[matrix.clone(), Ty::tensor(&[5, 4], DType::F64)]),
        Err(TypeError::DTypeMismatch { op: Opcode::Add, lhs: DType::F32, rhs: DType::F64 })
    );
    assert_eq!(
        infer(Opcode::Exp, &[matrix.clone(), matrix.clone()]),
        Err(TypeError::ArgCount { op: Opcode::Exp, expected: 1, found: 2 })
    );
    assert_eq!(infer(Opcode::Zeros, &[]), Err(TypeError::MissingInitAttrs { op: Opcode::Zeros }));

    let attrs = Attrs::Init { shape: Box::new([2, 3]), dtype: DType::F64 };
    assert_eq!(registry.infer_call(Opcode::Ones, &[], &attrs), Ok(Ty::tensor(&[2, 3], DType::F64)));

    let tuple = Ty::Tuple(Box::new([matrix.clone()]));
    assert_eq!(
        infer(Opcode::Relu, &[tuple.clone()]),
        Err(TypeError::ExpectedTensor { op: Opcode::Relu, pos: 0, ty: tuple })
    );
    assert_eq!(
        OpRegistry::new().infer_call(Opcode::Exp, &[matrix], &Attrs::None),
        Err(TypeError::NoRule { op: Opcode::Exp })
    );
}

#[test]
fn gradient_rules() {
    let registry = OpRegistry::builtin();
    for op in [Opcode::Less, Opcode::Softmax, Opcode::CollapseSumLike] {
        assert!(!registry.has_gradient(op), "{op}");
    }

    let mut func = Function::new("rules");
    let a = func.make_param("a", Ty::tensor(&[4, 3], DType::F32));
    let b = func.make_param("b", Ty::tensor(&[3, 2], DType::F32));
    let g = func.make_param("g", Ty::tensor(&[4, 2], DType::F32));

    let mut partials = |op: Opcode| {
        let args = [func.var_ref(a), func.var_ref(b)];
        let call = func.make_call(op, args);
        let call = CallInfo::new(&func, call).unwrap();
        let rule = registry.gradient(op).unwrap();
        let partials = rule(&mut func, &call, g);
        partials.into_iter().map(|partial| func.display_expr(partial).to_string()).collect::<Vec<_>>()
    };

    assert_eq!(
        partials(Opcode::Matmul),
        [
            "collapse_sum_like(matmul(g, transpose(b)), a)",
            "collapse_sum_like(matmul(transpose(a), g), b)"
        ]
    );
    assert_eq!(
        partials(Opcode::Divide),
        [
            "collapse_sum_like(divide(g, b), a)",
            "collapse_sum_like(negative(divide(multiply(g, a), multiply(b, b))), b)"
        ]
    );
    assert_eq!(
        partials(Opcode::SoftmaxCrossEntropy),
        ["multiply(g, subtract(softmax(a), b))", "multiply(g, negative(log(softmax(a))))"]
    );
    assert_eq!(partials(Opcode::Subtract), ["collapse_sum_like(g, a)", "collapse_sum_like(negative(g), b)"]);

    // calls with the wrong number of arguments get no partials
    let arities = [(Opcode::Add, 1), (Opcode::Matmul, 3), (Opcode::Exp, 2), (Opcode::Sum, 0)];
    for (op, arity) in arities {
        let args = vec![func.var_ref(a); arity];
        let call = func.make_call(op, args);
        let call = CallInfo::new(&func, call).unwrap();
        let rule = registry.gradient(op).unwrap();
        assert!(rule(&mut func, &call, g).is_empty(), "{op}");
    }
}
