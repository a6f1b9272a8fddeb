// Derived columns: unit conversions and formulas evaluated over the table

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::f64::consts::PI;

use crate::data::{Column, ColumnData, Table};
use crate::parser::{parse_formula, Expr};

/// Unit conversion catalogue. Every entry is an affine map `x * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitConversion {
    #[value(name = "c-to-f")]
    CelsiusToFahrenheit,
    #[value(name = "f-to-c")]
    FahrenheitToCelsius,
    #[value(name = "c-to-k")]
    CelsiusToKelvin,
    #[value(name = "k-to-c")]
    KelvinToCelsius,
    #[value(name = "deg-to-rad")]
    DegreesToRadians,
    #[value(name = "rad-to-deg")]
    RadiansToDegrees,
    #[value(name = "nm-to-lbft")]
    NewtonMetresToPoundFeet,
    #[value(name = "lbft-to-nm")]
    PoundFeetToNewtonMetres,
    #[value(name = "km-to-mi")]
    KilometresToMiles,
    #[value(name = "mi-to-km")]
    MilesToKilometres,
    #[value(name = "kph-to-mph")]
    KphToMph,
    #[value(name = "mph-to-kph")]
    MphToKph,
    #[value(name = "m-to-ft")]
    MetresToFeet,
    #[value(name = "ft-to-m")]
    FeetToMetres,
    #[value(name = "bar-to-psi")]
    BarToPsi,
    #[value(name = "psi-to-bar")]
    PsiToBar,
    #[value(name = "kw-to-hp")]
    KilowattsToHorsepower,
    #[value(name = "hp-to-kw")]
    HorsepowerToKilowatts,
    #[value(name = "kg-to-lb")]
    KilogramsToPounds,
    #[value(name = "lb-to-kg")]
    PoundsToKilograms,
    #[value(name = "l-to-gal")]
    LitresToGallons,
    #[value(name = "gal-to-l")]
    GallonsToLitres,
}

impl UnitConversion {
    pub fn label(self) -> &'static str {
        match self {
            UnitConversion::CelsiusToFahrenheit => "C -> F",
            UnitConversion::FahrenheitToCelsius => "F -> C",
            UnitConversion::CelsiusToKelvin => "C -> K",
            UnitConversion::KelvinToCelsius => "K -> C",
            UnitConversion::DegreesToRadians => "deg -> rad",
            UnitConversion::RadiansToDegrees => "rad -> deg",
            UnitConversion::NewtonMetresToPoundFeet => "N*m -> lb*ft",
            UnitConversion::PoundFeetToNewtonMetres => "lb*ft -> N*m",
            UnitConversion::KilometresToMiles => "km -> mi",
            UnitConversion::MilesToKilometres => "mi -> km",
            UnitConversion::KphToMph => "km/h -> mph",
            UnitConversion::MphToKph => "mph -> km/h",
            UnitConversion::MetresToFeet => "m -> ft",
            UnitConversion::FeetToMetres => "ft -> m",
            UnitConversion::BarToPsi => "bar -> psi",
            UnitConversion::PsiToBar => "psi -> bar",
            UnitConversion::KilowattsToHorsepower => "kW -> hp",
            UnitConversion::HorsepowerToKilowatts => "hp -> kW",
            UnitConversion::KilogramsToPounds => "kg -> lb",
            UnitConversion::PoundsToKilograms => "lb -> kg",
            UnitConversion::LitresToGallons => "L -> gal",
            UnitConversion::GallonsToLitres => "gal -> L",
        }
    }

    /// `(scale, offset)` of the affine map
    fn coefficients(self) -> (f64, f64) {
        match self {
            UnitConversion::CelsiusToFahrenheit => (9.0 / 5.0, 32.0),
            UnitConversion::FahrenheitToCelsius => (5.0 / 9.0, -32.0 * 5.0 / 9.0),
            UnitConversion::CelsiusToKelvin => (1.0, 273.15),
            UnitConversion::KelvinToCelsius => (1.0, -273.15),
            UnitConversion::DegreesToRadians => (PI / 180.0, 0.0),
            UnitConversion::RadiansToDegrees => (180.0 / PI, 0.0),
            UnitConversion::NewtonMetresToPoundFeet => (0.737562149, 0.0),
            UnitConversion::PoundFeetToNewtonMetres => (1.35581795, 0.0),
            UnitConversion::KilometresToMiles | UnitConversion::KphToMph => (0.621371192, 0.0),
            UnitConversion::MilesToKilometres | UnitConversion::MphToKph => (1.609344, 0.0),
            UnitConversion::MetresToFeet => (3.2808399, 0.0),
            UnitConversion::FeetToMetres => (0.3048, 0.0),
            UnitConversion::BarToPsi => (14.5037738, 0.0),
            UnitConversion::PsiToBar => (0.0689475729, 0.0),
            UnitConversion::KilowattsToHorsepower => (1.34102209, 0.0),
            UnitConversion::HorsepowerToKilowatts => (0.745699872, 0.0),
            UnitConversion::KilogramsToPounds => (2.20462262, 0.0),
            UnitConversion::PoundsToKilograms => (0.45359237, 0.0),
            UnitConversion::LitresToGallons => (0.264172052, 0.0),
            UnitConversion::GallonsToLitres => (3.78541178, 0.0),
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        let (scale, offset) = self.coefficients();
        x * scale + offset
    }
}

/// Working copy of the table. Operations append to the copy only; the caller
/// decides whether to keep the result.
#[derive(Debug, Clone)]
pub struct Derivation {
    working: Table,
}

impl Derivation {
    pub fn new(table: &Table) -> Self {
        Self {
            working: table.clone(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.working
    }

    pub fn into_table(self) -> Table {
        self.working
    }

    /// Append `output = conversion(source)`
    pub fn convert(&mut self, source: &str, conversion: UnitConversion, output: &str) -> Result<()> {
        if source.trim().is_empty() {
            anyhow::bail!("No source variable selected");
        }
        self.check_output_name(output)?;

        let values = self.working.numeric(source)?;
        let converted = values.into_iter().map(|x| conversion.apply(x)).collect();
        self.working
            .push_column(Column::new(output, ColumnData::Numeric(converted)))
    }

    /// Append `output = expression`, evaluated row by row
    pub fn formula(&mut self, expression: &str, output: &str) -> Result<()> {
        if expression.trim().is_empty() {
            anyhow::bail!("Formula is empty");
        }
        self.check_output_name(output)?;

        let (_, expr) =
            parse_formula(expression).map_err(|e| anyhow!("Invalid formula: {}", describe_parse_error(e)))?;
        let values = evaluate(&expr, &self.working)?.into_column(self.working.row_count());
        self.working
            .push_column(Column::new(output, ColumnData::Numeric(values)))
    }

    fn check_output_name(&self, output: &str) -> Result<()> {
        if output.trim().is_empty() {
            anyhow::bail!("New variable name cannot be empty");
        }
        if self.working.has_column(output) {
            anyhow::bail!("Variable '{}' already exists", output);
        }
        Ok(())
    }
}

fn describe_parse_error(err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) if e.input.is_empty() => {
            "unexpected end of formula".to_string()
        }
        nom::Err::Error(e) | nom::Err::Failure(e) => format!("syntax error near '{}'", e.input),
        nom::Err::Incomplete(_) => "incomplete formula".to_string(),
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Intermediate value: a single number broadcast over every row, or one per row
#[derive(Debug, Clone, PartialEq)]
enum Values {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Values {
    fn map(self, f: impl Fn(f64) -> f64) -> Values {
        match self {
            Values::Scalar(x) => Values::Scalar(f(x)),
            Values::Vector(v) => Values::Vector(v.into_iter().map(f).collect()),
        }
    }

    fn zip(self, other: Values, f: impl Fn(f64, f64) -> f64) -> Values {
        match (self, other) {
            (Values::Scalar(a), Values::Scalar(b)) => Values::Scalar(f(a, b)),
            (Values::Scalar(a), Values::Vector(b)) => Values::Vector(b.into_iter().map(|y| f(a, y)).collect()),
            (Values::Vector(a), Values::Scalar(b)) => Values::Vector(a.into_iter().map(|x| f(x, b)).collect()),
            (Values::Vector(a), Values::Vector(b)) => {
                Values::Vector(a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect())
            }
        }
    }

    fn into_column(self, rows: usize) -> Vec<f64> {
        match self {
            Values::Scalar(x) => vec![x; rows],
            Values::Vector(v) => v,
        }
    }
}

fn evaluate(expr: &Expr, table: &Table) -> Result<Values> {
    let values = match expr {
        Expr::Number(n) => Values::Scalar(*n),
        Expr::Column(name) => Values::Vector(table.numeric(name)?),
        Expr::Neg(inner) => evaluate(inner, table)?.map(|x| -x),
        Expr::Binary(op, lhs, rhs) => {
            let op = *op;
            evaluate(lhs, table)?.zip(evaluate(rhs, table)?, move |a, b| op.apply(a, b))
        }
        Expr::Call(function, args) => {
            let function = *function;
            let mut evaluated = args.iter().map(|a| evaluate(a, table));
            let first = evaluated
                .next()
                .ok_or_else(|| anyhow!("Function called without arguments"))??;
            match evaluated.next() {
                Some(second) => first.zip(second?, move |a, b| function.apply(&[a, b])),
                None => first.map(move |a| function.apply(&[a])),
            }
        }
    };
    Ok(values)
}
