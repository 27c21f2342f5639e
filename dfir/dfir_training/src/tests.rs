use dfir::{DType, Function, Module, Ty};
use dfir_autodiff::{simple_ad, AdOptions};
use dfir_interpret::{evaluate, Tensor, Value};
use dfir_ops::OpRegistry;
use dfir_reader::{parse_function, parse_module};
use expect_test::expect;
use float_cmp::{ApproxEq, F64Margin};

use crate::{append_loss, AppendLossError};

const BACKBONE: &str = r#"
    function %predict(x: Tensor((2, 3), f64), w: Tensor((3, 2), f64), state: Tensor((2,), f64)) {
        dataflow {
            output out = matmul(x, w)
            output new_state = exp(state)
        }
        return (out, new_state)
    }
    function %linear(x: Tensor((2, 3), f64), w: Tensor((3, 2), f64)) {
        dataflow {
            output out = matmul(x, w)
        }
        return out
    }
"#;

const LOSS: &str = r#"
    function %loss(pred: Tensor((2, 2), f64), label: Tensor((2, 2), f64)) {
        dataflow {
            output loss = softmax_cross_entropy(pred, label)
        }
        return loss
    }
"#;

fn setup(loss: &str) -> (Module, Function) {
    let registry = OpRegistry::builtin();
    (parse_module(BACKBONE, &registry).unwrap(), parse_function(loss, &registry).unwrap())
}

#[test]
fn append_with_states() {
    let (module, loss) = setup(LOSS);
    let res = append_loss(&module, "predict", &loss, 1, None).unwrap();
    assert_eq!(res.len(), 3);
    assert!(res.shares(&module, "predict"));

    let func = res.get("predict_loss").unwrap();
    assert!(func.validate());
    expect![[r#"
        function %predict_loss(x: Tensor((2, 3), f64), w: Tensor((3, 2), f64), state: Tensor((2,), f64), label: Tensor((2, 2), f64)) -> Tuple(Tensor((), f64), Tensor((2,), f64)) {
            dataflow {
                output out: Tensor((2, 2), f64) = matmul(x, w)
                output new_state: Tensor((2,), f64) = exp(state)
                output loss: Tensor((), f64) = softmax_cross_entropy(out, label)
            }
            return (loss, new_state)
        }
    "#]]
    .assert_eq(&func.to_debug_string());
}

#[test]
fn differentiate_appended_loss() {
    let registry = OpRegistry::builtin();
    let (module, loss) = setup(LOSS);
    let module = append_loss(&module, "linear", &loss, 1, Some("train")).unwrap();
    let module =
        simple_ad(&module, &registry, &AdOptions::new("train").require_grads(["w"])).unwrap();
    let func = module.get("train_adjoint").unwrap();
    assert!(func.validate(), "{func}");

    let x = Tensor::from_fn(&[2, 3], |i| (0.7 * i as f64).sin());
    let w = Tensor::from_fn(&[3, 2], |i| (1.1 * i as f64 + 0.3).cos());
    let label = Tensor::new(&[2, 2], [0.0, 1.0, 1.0, 0.0]);
    let args = vec![Value::from(x.clone()), w.clone().into(), label.clone().into()];
    let res = evaluate(func, args).unwrap();
    let dw = res.as_tuple().unwrap()[1].as_tuple().unwrap()[0].as_tensor().unwrap().clone();

    // d/dw = x^T (softmax(x w) - label)
    let mut logits = [0.0; 4];
    for (i, row) in logits.chunks_mut(2).enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = (0..3).map(|k| x.data[i * 3 + k] * w.data[k * 2 + j]).sum();
        }
    }
    let mut diff = [0.0; 4];
    for (i, row) in logits.chunks(2).enumerate() {
        let norm: f64 = row.iter().map(|val| val.exp()).sum();
        for j in 0..2 {
            diff[i * 2 + j] = row[j].exp() / norm - label.data[i * 2 + j];
        }
    }
    let expected = Tensor::from_fn(&[3, 2], |idx| {
        let (k, j) = (idx / 2, idx % 2);
        (0..2).map(|i| x.data[i * 3 + k] * diff[i * 2 + j]).sum()
    });

    assert_eq!(dw.shape, expected.shape);
    for (&lhs, &rhs) in dw.data.iter().zip(&*expected.data) {
        assert!(lhs.approx_eq(rhs, F64Margin { epsilon: 1e-12, ulps: 4 }), "{dw} != {expected}");
    }
}

#[test]
fn errors() {
    let (module, loss) = setup(LOSS);
    assert_eq!(
        append_loss(&module, "foo", &loss, 1, None).unwrap_err(),
        AppendLossError::UnknownFunction("foo".to_owned())
    );
    assert_eq!(
        append_loss(&module, "predict", &loss, 1, Some("linear")).unwrap_err(),
        AppendLossError::FunctionExists("linear".to_owned())
    );
    let appended = append_loss(&module, "predict", &loss, 1, None).unwrap();
    assert_eq!(
        append_loss(&appended, "predict", &loss, 1, None).unwrap_err(),
        AppendLossError::FunctionExists("predict_loss".to_owned())
    );
    assert_eq!(
        append_loss(&module, "predict", &loss, 3, None).unwrap_err(),
        AppendLossError::OutputCountMismatch { func: "predict".to_owned(), expected: 3, found: 2 }
    );
    assert_eq!(
        append_loss(&module, "predict", &loss, 2, None).unwrap_err(),
        AppendLossError::ParamTypeMismatch {
            func: "loss".to_owned(),
            param: "label".to_owned(),
            expected: Ty::tensor(&[2], DType::F64),
            found: Ty::tensor(&[2, 2], DType::F64),
        }
    );

    let (_, loss) = setup(
        r#"
        function %loss(pred: Tensor((2, 2), f64)) {
            dataflow {
                output loss = sum(pred)
            }
            return loss
        }
        "#,
    );
    assert_eq!(
        append_loss(&module, "predict", &loss, 2, None).unwrap_err(),
        AppendLossError::MissingLossParams { func: "loss".to_owned(), expected: 2, found: 1 }
    );

    let (_, loss) = setup(
        r#"
        function %loss(pred: Tensor((2, 2), f64)) {
            dataflow {
                output loss = exp(pred)
            }
            return loss
        }
        "#,
    );
    assert_eq!(
        append_loss(&module, "predict", &loss, 1, None).unwrap_err(),
        AppendLossError::InvalidLossReturn { func: "loss".to_owned() }
    );
}
