//! Plain text report of a fitted model.
//!
//! ```text
//! # of Mixture : 2
//! Dimension : 1
//! lambda
//! 1.500000e+00
//! 5.033333e+01
//!
//! id,Ns,theta1,theta2,...
//! A,3,1.000000e+00,0.000000e+00
//! ```
//!
//! Components are listed in ascending parameter order and each group's
//! mixing coefficients follow that same order.
use crate::error::Result;
use crate::model::MixtureModel;
use crate::traits::ComponentFamily;
use std::io::Write;

/// Format `x` in scientific notation with six decimals and an exponent of
/// at least two digits, e.g. `1.500000e+00`.
pub fn sci(x: f64) -> String {
    if !x.is_finite() {
        return format!("{}", x);
    }
    let s = format!("{:.6e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

fn join_sci<'a, I: IntoIterator<Item = &'a f64>>(xs: I) -> String {
    xs.into_iter().map(|&x| sci(x)).collect::<Vec<_>>().join(",")
}

/// Write the component parameters and every group's mixing coefficients
pub fn write_summary<W, Fx>(
    writer: &mut W,
    model: &MixtureModel<Fx>,
) -> Result<()>
where
    W: Write,
    Fx: ComponentFamily,
{
    let order = model.component_order();

    writeln!(writer, "# of Mixture : {}", model.k())?;
    writeln!(writer, "Dimension : {}", model.d())?;
    writeln!(writer, "lambda")?;
    for &ix in &order {
        writeln!(writer, "{}", join_sci(model.params()[ix].as_ref()))?;
    }
    writeln!(writer)?;

    writeln!(writer, "id,Ns,theta1,theta2,...")?;
    for group in model.groups() {
        let theta = group.theta();
        writeln!(
            writer,
            "{},{},{}",
            group.id(),
            group.len(),
            join_sci(order.iter().map(|&ix| &theta[ix]))
        )?;
    }
    writer.flush()?;
    Ok(())
}
