//! Dialect scalar functions
//!
//! Functions the warehouse dialect has but the engine does not: IFF, NVL,
//! NVL2, DECODE, DIV0, DIV0NULL. Registered on every engine context so
//! translated SQL can call them by name.

use std::any::Any;
use std::sync::Arc;

use datafusion::arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringBuilder};
use datafusion::arrow::compute::kernels::zip::zip;
use datafusion::arrow::datatypes::DataType;
use datafusion::common::{Result, ScalarValue};
use datafusion::execution::context::SessionContext;
use datafusion::logical_expr::{
    ColumnarValue, ScalarFunctionArgs, ScalarUDF, ScalarUDFImpl, Signature, TypeSignature,
    Volatility,
};

/// Register every dialect function on a context.
pub fn register_all(ctx: &SessionContext) {
    ctx.register_udf(ScalarUDF::from(IffFunc::new()));
    ctx.register_udf(ScalarUDF::from(NvlFunc::new()));
    ctx.register_udf(ScalarUDF::from(Nvl2Func::new()));
    ctx.register_udf(ScalarUDF::from(DecodeFunc::new()));
    ctx.register_udf(ScalarUDF::from(DivFunc::div0()));
    ctx.register_udf(ScalarUDF::from(DivFunc::div0null()));
}

fn execution_err(msg: &str) -> datafusion::error::DataFusionError {
    datafusion::error::DataFusionError::Execution(msg.to_string())
}

/// `IFF(condition, true_value, false_value)`
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct IffFunc {
    signature: Signature,
}

impl Default for IffFunc {
    fn default() -> Self {
        Self::new()
    }
}

impl IffFunc {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(TypeSignature::Any(3), Volatility::Immutable),
        }
    }
}

impl ScalarUDFImpl for IffFunc {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "iff"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(arg_types.get(1).cloned().unwrap_or(DataType::Null))
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let [condition, when_true, when_false] = args.args.as_slice() else {
            return Err(execution_err("IFF requires exactly 3 arguments"));
        };

        let condition = condition.to_array(args.number_rows)?;
        let condition = condition
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| execution_err("IFF condition must be boolean"))?;

        let result = zip(
            condition,
            &when_true.to_array(args.number_rows)?,
            &when_false.to_array(args.number_rows)?,
        )?;
        Ok(ColumnarValue::Array(result))
    }
}

/// `NVL(expr, fallback)`: `fallback` where `expr` is NULL.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NvlFunc {
    signature: Signature,
}

impl Default for NvlFunc {
    fn default() -> Self {
        Self::new()
    }
}

impl NvlFunc {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(TypeSignature::Any(2), Volatility::Immutable),
        }
    }
}

impl ScalarUDFImpl for NvlFunc {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "nvl"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(arg_types.first().cloned().unwrap_or(DataType::Null))
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let [expr, fallback] = args.args.as_slice() else {
            return Err(execution_err("NVL requires exactly 2 arguments"));
        };

        if let (ColumnarValue::Scalar(v), ColumnarValue::Scalar(f)) = (expr, fallback) {
            return Ok(ColumnarValue::Scalar(if v.is_null() {
                f.clone()
            } else {
                v.clone()
            }));
        }

        let expr = expr.to_array(args.number_rows)?;
        let Some(nulls) = expr.nulls().cloned() else {
            return Ok(ColumnarValue::Array(expr));
        };
        let fallback = fallback.to_array(args.number_rows)?;
        let is_null: BooleanArray = (0..expr.len()).map(|i| Some(!nulls.is_valid(i))).collect();
        Ok(ColumnarValue::Array(zip(&is_null, &fallback, &expr)?))
    }
}

/// `NVL2(expr, when_present, when_null)`: `when_present` where `expr` is
/// NOT NULL, else `when_null`.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Nvl2Func {
    signature: Signature,
}

impl Default for Nvl2Func {
    fn default() -> Self {
        Self::new()
    }
}

impl Nvl2Func {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(TypeSignature::Any(3), Volatility::Immutable),
        }
    }
}

impl ScalarUDFImpl for Nvl2Func {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "nvl2"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        Ok(arg_types.get(1).cloned().unwrap_or(DataType::Null))
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let [expr, when_present, when_null] = args.args.as_slice() else {
            return Err(execution_err("NVL2 requires exactly 3 arguments"));
        };

        if let (ColumnarValue::Scalar(v), ColumnarValue::Scalar(p), ColumnarValue::Scalar(n)) =
            (expr, when_present, when_null)
        {
            return Ok(ColumnarValue::Scalar(if v.is_null() {
                n.clone()
            } else {
                p.clone()
            }));
        }

        let expr = expr.to_array(args.number_rows)?;
        let is_present: BooleanArray = match expr.nulls() {
            Some(nulls) => (0..expr.len()).map(|i| Some(nulls.is_valid(i))).collect(),
            None => (0..expr.len()).map(|_| Some(true)).collect(),
        };
        let result = zip(
            &is_present,
            &when_present.to_array(args.number_rows)?,
            &when_null.to_array(args.number_rows)?,
        )?;
        Ok(ColumnarValue::Array(result))
    }
}

/// `DECODE(expr, search1, result1[, search2, result2, ...][, default])`
///
/// Matches `expr` against each search value in order; NULL never matches.
/// Falls back to the default when the argument count after `expr` is odd,
/// otherwise to NULL. Results come back string-typed.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DecodeFunc {
    signature: Signature,
}

impl Default for DecodeFunc {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeFunc {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(TypeSignature::VariadicAny, Volatility::Immutable),
        }
    }
}

fn scalar_text(value: &ScalarValue) -> Option<String> {
    if value.is_null() {
        return None;
    }
    match value {
        ScalarValue::Utf8(Some(s))
        | ScalarValue::LargeUtf8(Some(s)) => Some(s.clone()),
        ScalarValue::Utf8View(Some(s)) => Some(s.to_string()),
        other => Some(other.to_string()),
    }
}

/// Search comparison: NULL matches nothing, numbers compare by value, and
/// everything else by its text form.
fn search_matches(expr: &ScalarValue, search: &ScalarValue) -> bool {
    if expr.is_null() || search.is_null() {
        return false;
    }
    if let (Some(a), Some(b)) = (scalar_to_f64(expr), scalar_to_f64(search)) {
        return a == b;
    }
    match (scalar_text(expr), scalar_text(search)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl ScalarUDFImpl for DecodeFunc {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "decode"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Utf8)
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        if args.args.len() < 3 {
            return Err(execution_err(
                "DECODE requires at least 3 arguments: DECODE(expr, search, result, ...)",
            ));
        }
        let num_rows = args.number_rows;
        let arrays = args
            .args
            .iter()
            .map(|a| a.to_array(num_rows))
            .collect::<Result<Vec<ArrayRef>>>()?;

        let remaining = arrays.len() - 1;
        let num_pairs = remaining / 2;
        let default = (remaining % 2 == 1).then(|| arrays.len() - 1);

        let mut builder = StringBuilder::new();
        for row in 0..num_rows {
            let expr = ScalarValue::try_from_array(&arrays[0], row)?;

            let mut chosen = None;
            for pair in 0..num_pairs {
                let search = ScalarValue::try_from_array(&arrays[1 + pair * 2], row)?;
                if search_matches(&expr, &search) {
                    chosen = Some(ScalarValue::try_from_array(&arrays[2 + pair * 2], row)?);
                    break;
                }
            }
            if chosen.is_none() {
                if let Some(idx) = default {
                    chosen = Some(ScalarValue::try_from_array(&arrays[idx], row)?);
                }
            }

            match chosen.as_ref().and_then(scalar_text) {
                Some(text) => builder.append_value(&text),
                None => builder.append_null(),
            }
        }

        let result: ArrayRef = Arc::new(builder.finish());
        Ok(ColumnarValue::Array(result))
    }
}

/// `DIV0(a, b)` and `DIV0NULL(a, b)`: division as Float64 that yields 0
/// instead of a divide-by-zero error. `DIV0NULL` additionally treats a
/// NULL divisor like zero.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DivFunc {
    signature: Signature,
    name: &'static str,
    null_divisor_is_zero: bool,
}

impl DivFunc {
    pub fn div0() -> Self {
        Self {
            signature: Signature::new(TypeSignature::Any(2), Volatility::Immutable),
            name: "div0",
            null_divisor_is_zero: false,
        }
    }

    pub fn div0null() -> Self {
        Self {
            signature: Signature::new(TypeSignature::Any(2), Volatility::Immutable),
            name: "div0null",
            null_divisor_is_zero: true,
        }
    }

    fn divide(&self, dividend: Option<f64>, divisor: Option<f64>) -> Option<f64> {
        let dividend = dividend?;
        let divisor = match divisor {
            Some(d) => d,
            None if self.null_divisor_is_zero => 0.0,
            None => return None,
        };
        if divisor == 0.0 {
            Some(0.0)
        } else {
            Some(dividend / divisor)
        }
    }
}

fn scalar_to_f64(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Float64(v) => *v,
        ScalarValue::Float32(v) => v.map(f64::from),
        ScalarValue::Int8(v) => v.map(f64::from),
        ScalarValue::Int16(v) => v.map(f64::from),
        ScalarValue::Int32(v) => v.map(f64::from),
        ScalarValue::Int64(v) => v.map(|x| x as f64),
        ScalarValue::UInt8(v) => v.map(f64::from),
        ScalarValue::UInt16(v) => v.map(f64::from),
        ScalarValue::UInt32(v) => v.map(f64::from),
        ScalarValue::UInt64(v) => v.map(|x| x as f64),
        ScalarValue::Decimal128(v, _, scale) => {
            v.map(|x| x as f64 / 10_f64.powi(*scale as i32))
        }
        _ => None,
    }
}

impl ScalarUDFImpl for DivFunc {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Float64)
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let [dividend, divisor] = args.args.as_slice() else {
            return Err(execution_err("division takes exactly 2 arguments"));
        };

        if let (ColumnarValue::Scalar(a), ColumnarValue::Scalar(b)) = (dividend, divisor) {
            let result = self.divide(scalar_to_f64(a), scalar_to_f64(b));
            return Ok(ColumnarValue::Scalar(ScalarValue::Float64(result)));
        }

        let dividend = dividend.to_array(args.number_rows)?;
        let divisor = divisor.to_array(args.number_rows)?;
        let values = (0..args.number_rows)
            .map(|row| {
                let a = scalar_to_f64(&ScalarValue::try_from_array(&dividend, row)?);
                let b = scalar_to_f64(&ScalarValue::try_from_array(&divisor, row)?);
                Ok(self.divide(a, b))
            })
            .collect::<Result<Vec<Option<f64>>>>()?;
        let result: ArrayRef = Arc::new(Float64Array::from(values));
        Ok(ColumnarValue::Array(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::StringArray;
    use datafusion::arrow::datatypes::Field;
    use datafusion::common::config::ConfigOptions;

    fn invoke<T: ScalarUDFImpl>(
        udf: &T,
        args: &[ColumnarValue],
        return_type: DataType,
    ) -> Result<ColumnarValue> {
        let arg_fields: Vec<Arc<Field>> = args
            .iter()
            .enumerate()
            .map(|(i, cv)| {
                let dt = match cv {
                    ColumnarValue::Scalar(sv) => sv.data_type(),
                    ColumnarValue::Array(arr) => arr.data_type().clone(),
                };
                Arc::new(Field::new(format!("arg{i}"), dt, true))
            })
            .collect();
        udf.invoke_with_args(ScalarFunctionArgs {
            args: args.to_vec(),
            arg_fields,
            number_rows: 1,
            return_field: Arc::new(Field::new("result", return_type, true)),
            config_options: Arc::new(ConfigOptions::default()),
        })
    }

    fn utf8(s: &str) -> ColumnarValue {
        ColumnarValue::Scalar(ScalarValue::Utf8(Some(s.to_string())))
    }

    fn int64(v: Option<i64>) -> ColumnarValue {
        ColumnarValue::Scalar(ScalarValue::Int64(v))
    }

    fn float64(v: Option<f64>) -> ColumnarValue {
        ColumnarValue::Scalar(ScalarValue::Float64(v))
    }

    fn as_string(result: ColumnarValue) -> Option<String> {
        let ColumnarValue::Array(arr) = result else {
            panic!("expected array result");
        };
        let arr = arr.as_any().downcast_ref::<StringArray>().unwrap();
        (!arr.is_null(0)).then(|| arr.value(0).to_string())
    }

    #[test]
    fn iff_picks_branch_by_condition() {
        let udf = IffFunc::new();
        let out = invoke(
            &udf,
            &[
                ColumnarValue::Scalar(ScalarValue::Boolean(Some(true))),
                utf8("yes"),
                utf8("no"),
            ],
            DataType::Utf8,
        )
        .unwrap();
        assert_eq!(as_string(out).as_deref(), Some("yes"));

        let out = invoke(
            &udf,
            &[
                ColumnarValue::Scalar(ScalarValue::Boolean(Some(false))),
                utf8("yes"),
                utf8("no"),
            ],
            DataType::Utf8,
        )
        .unwrap();
        assert_eq!(as_string(out).as_deref(), Some("no"));
    }

    #[test]
    fn nvl_falls_back_on_null() {
        let udf = NvlFunc::new();
        let out = invoke(&udf, &[int64(Some(10)), int64(Some(20))], DataType::Int64).unwrap();
        assert!(matches!(
            out,
            ColumnarValue::Scalar(ScalarValue::Int64(Some(10)))
        ));

        let out = invoke(&udf, &[int64(None), int64(Some(20))], DataType::Int64).unwrap();
        assert!(matches!(
            out,
            ColumnarValue::Scalar(ScalarValue::Int64(Some(20)))
        ));
    }

    #[test]
    fn nvl2_inverts_the_null_test() {
        let udf = Nvl2Func::new();
        let out = invoke(
            &udf,
            &[int64(Some(1)), utf8("present"), utf8("missing")],
            DataType::Utf8,
        )
        .unwrap();
        assert!(
            matches!(out, ColumnarValue::Scalar(ScalarValue::Utf8(Some(ref s))) if s == "present")
        );

        let out = invoke(
            &udf,
            &[int64(None), utf8("present"), utf8("missing")],
            DataType::Utf8,
        )
        .unwrap();
        assert!(
            matches!(out, ColumnarValue::Scalar(ScalarValue::Utf8(Some(ref s))) if s == "missing")
        );
    }

    #[test]
    fn decode_walks_pairs_in_order() {
        let udf = DecodeFunc::new();
        let args = |expr: i64| {
            vec![
                int64(Some(expr)),
                int64(Some(1)),
                utf8("one"),
                int64(Some(2)),
                utf8("two"),
                utf8("other"),
            ]
        };
        assert_eq!(
            as_string(invoke(&udf, &args(1), DataType::Utf8).unwrap()).as_deref(),
            Some("one")
        );
        assert_eq!(
            as_string(invoke(&udf, &args(2), DataType::Utf8).unwrap()).as_deref(),
            Some("two")
        );
        assert_eq!(
            as_string(invoke(&udf, &args(3), DataType::Utf8).unwrap()).as_deref(),
            Some("other")
        );
    }

    #[test]
    fn decode_without_default_yields_null() {
        let udf = DecodeFunc::new();
        let out = invoke(
            &udf,
            &[int64(Some(3)), int64(Some(1)), utf8("one")],
            DataType::Utf8,
        )
        .unwrap();
        assert_eq!(as_string(out), None);
    }

    #[test]
    fn decode_null_expr_matches_nothing() {
        let udf = DecodeFunc::new();
        let out = invoke(
            &udf,
            &[int64(None), int64(Some(1)), utf8("one"), utf8("fallback")],
            DataType::Utf8,
        )
        .unwrap();
        assert_eq!(as_string(out).as_deref(), Some("fallback"));
    }

    #[test]
    fn div0_zero_divisor_yields_zero() {
        let udf = DivFunc::div0();
        let out = invoke(
            &udf,
            &[float64(Some(10.0)), float64(Some(0.0))],
            DataType::Float64,
        )
        .unwrap();
        assert!(matches!(
            out,
            ColumnarValue::Scalar(ScalarValue::Float64(Some(v))) if v == 0.0
        ));

        let out = invoke(
            &udf,
            &[float64(Some(10.0)), float64(Some(4.0))],
            DataType::Float64,
        )
        .unwrap();
        assert!(matches!(
            out,
            ColumnarValue::Scalar(ScalarValue::Float64(Some(v))) if v == 2.5
        ));
    }

    #[test]
    fn div0_null_divisor_stays_null() {
        let udf = DivFunc::div0();
        let out = invoke(&udf, &[float64(Some(10.0)), float64(None)], DataType::Float64).unwrap();
        assert!(matches!(
            out,
            ColumnarValue::Scalar(ScalarValue::Float64(None))
        ));
    }

    #[test]
    fn div0null_folds_null_divisor_to_zero() {
        let udf = DivFunc::div0null();
        for divisor in [float64(Some(0.0)), float64(None)] {
            let out = invoke(&udf, &[float64(Some(10.0)), divisor], DataType::Float64).unwrap();
            assert!(matches!(
                out,
                ColumnarValue::Scalar(ScalarValue::Float64(Some(v))) if v == 0.0
            ));
        }
    }
}
