//! Converting IR to text.
//!
//! [`write_function`] converts a [`Function`] to an equivalent textual form which
//! can be read back by the `dfir_reader` crate. Scalar constants are written
//! without their dtype and read back as `f32`.

use core::fmt::{self, Write};

use crate::{Attrs, BlockKind, Expr, ExprData, Function, VarKind};

#[cfg(test)]
mod tests;

pub fn write_function(w: &mut dyn Write, func: &Function) -> fmt::Result {
    write!(w, "function %{}(", func.name)?;
    for (i, &param) in func.params.iter().enumerate() {
        if i != 0 {
            w.write_str(", ")?;
        }
        let data = &func.vars[param];
        write!(w, "{}: {}", data.name, data.ty)?;
    }
    w.write_str(")")?;
    if let Some(ty) = &func.ret_ty {
        write!(w, " -> {ty}")?;
    }
    writeln!(w, " {{")?;

    for block in &func.blocks {
        let kind = match block.kind {
            BlockKind::Dataflow => "dataflow",
            BlockKind::Binding => "bindings",
        };
        writeln!(w, "    {kind} {{")?;
        for binding in &block.bindings {
            let var = &func.vars[binding.var];
            w.write_str("        ")?;
            if var.kind == VarKind::Output && block.kind == BlockKind::Dataflow {
                w.write_str("output ")?;
            }
            write!(w, "{}: {} = ", var.name, var.ty)?;
            write_expr(w, func, binding.value)?;
            writeln!(w)?;
        }
        writeln!(w, "    }}")?;
    }

    if let Some(ret) = func.ret {
        w.write_str("    return ")?;
        write_expr(w, func, ret)?;
        writeln!(w)?;
    }
    writeln!(w, "}}")
}

pub fn write_expr(w: &mut dyn Write, func: &Function, expr: Expr) -> fmt::Result {
    match func.exprs[expr] {
        ExprData::Var(var) => w.write_str(&func.vars[var].name),
        ExprData::Constant(val) => write!(w, "{:?}", val.val),
        ExprData::Call { op, ref args, ref attrs } => {
            write!(w, "{op}(")?;
            write_list(w, func, args)?;
            if let Attrs::Init { shape, dtype } = attrs {
                if !args.is_empty() {
                    w.write_str(", ")?;
                }
                write!(w, "{}, {dtype}", crate::Shape::from(&**shape))?;
            }
            w.write_str(")")
        }
        ExprData::Tuple(ref fields) => {
            w.write_str("(")?;
            write_list(w, func, fields)?;
            if fields.len() == 1 {
                w.write_str(",")?;
            }
            w.write_str(")")
        }
        ExprData::TupleGetItem { tuple, index } => {
            write_expr(w, func, tuple)?;
            write!(w, "[{index}]")
        }
    }
}

fn write_list(w: &mut dyn Write, func: &Function, exprs: &[Expr]) -> fmt::Result {
    for (i, &expr) in exprs.iter().enumerate() {
        if i != 0 {
            w.write_str(", ")?;
        }
        write_expr(w, func, expr)?;
    }
    Ok(())
}

/// Displays a single expression of a function.
pub struct DisplayExpr<'a> {
    pub func: &'a Function,
    pub expr: Expr,
}

impl fmt::Display for DisplayExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self.func, self.expr)
    }
}

impl Function {
    pub fn display_expr(&self, expr: Expr) -> DisplayExpr<'_> {
        DisplayExpr { func: self, expr }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_function(f, self)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_function(f, self)
    }
}
