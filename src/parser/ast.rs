// Abstract syntax tree for column formulas

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            // Floored modulo, sign follows the divisor
            BinaryOp::Mod => a - b * (a / b).floor(),
            BinaryOp::Pow => a.powf(b),
        }
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Function {
    Abs,
    Sqrt,
    Exp,
    Expm1,
    Log,
    Log1p,
    Log10,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Sinh,
    Cosh,
    Tanh,
    Arcsinh,
    Arccosh,
    Arctanh,
    Floor,
    Ceil,
    Arctan2,
    Min,
    Max,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "expm1" => Function::Expm1,
            "log" => Function::Log,
            "log1p" => Function::Log1p,
            "log10" => Function::Log10,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "arcsin" => Function::Arcsin,
            "arccos" => Function::Arccos,
            "arctan" => Function::Arctan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "arcsinh" => Function::Arcsinh,
            "arccosh" => Function::Arccosh,
            "arctanh" => Function::Arctanh,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "arctan2" => Function::Arctan2,
            "min" => Function::Min,
            "max" => Function::Max,
            _ => return None,
        };
        Some(f)
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Arctan2 | Function::Min | Function::Max => 2,
            _ => 1,
        }
    }

    pub fn apply(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(f64::NAN);
        let b = args.get(1).copied().unwrap_or(f64::NAN);
        match self {
            Function::Abs => a.abs(),
            Function::Sqrt => a.sqrt(),
            Function::Exp => a.exp(),
            Function::Expm1 => a.exp_m1(),
            Function::Log => a.ln(),
            Function::Log1p => a.ln_1p(),
            Function::Log10 => a.log10(),
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Arcsin => a.asin(),
            Function::Arccos => a.acos(),
            Function::Arctan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Arcsinh => a.asinh(),
            Function::Arccosh => a.acosh(),
            Function::Arctanh => a.atanh(),
            Function::Floor => a.floor(),
            Function::Ceil => a.ceil(),
            Function::Arctan2 => a.atan2(b),
            // NaN propagates like numpy's minimum/maximum
            Function::Min => {
                if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    a.min(b)
                }
            }
            Function::Max => {
                if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    a.max(b)
                }
            }
        }
    }
}

/// Formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Column(String),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// Names of all referenced columns, in order of first appearance
    pub fn columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_columns(&mut names);
        names
    }

    fn collect_columns(&self, names: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Column(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Expr::Neg(inner) => inner.collect_columns(names),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_columns(names);
                rhs.collect_columns(names);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_columns(names);
                }
            }
        }
    }
}
