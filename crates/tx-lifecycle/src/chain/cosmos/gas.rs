use core::fmt;

use ibc_proto::cosmos::base::v1beta1::Coin;
use ibc_proto::cosmos::tx::v1beta1::Fee;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::ToPrimitive;

use crate::config::GasPrice;
use crate::error::Error;

/// Computes the fee for a simulated transaction.
///
/// - `gas_limit = round(gas_used * gas_multiplier)`, halves rounded up
/// - `base = ceil(gas_limit * gas_price)`
/// - `amount = ceil(base * fee_multiplier)`
///
/// All arithmetic is exact: the floating-point configuration values are
/// converted from their shortest decimal representation, so `0.005` is
/// exactly `5/1000`.
pub fn calculate_fee(
    gas_used: u64,
    gas_multiplier: f64,
    gas_price: &GasPrice,
    fee_multiplier: f64,
) -> Result<Fee, Error> {
    let gas_multiplier = decimal_to_ratio(gas_multiplier)?;
    let price = decimal_to_ratio(gas_price.price)?;
    let fee_multiplier = decimal_to_ratio(fee_multiplier)?;

    let gas_limit = mul_round(gas_used, &gas_multiplier);

    let base = mul_ceil(&BigInt::from(gas_limit), &price);
    let amount = mul_ceil(&base, &fee_multiplier);

    Ok(Fee {
        amount: vec![Coin {
            denom: gas_price.denom.clone(),
            amount: amount.to_string(),
        }],
        gas_limit,
        payer: "".to_string(),
        granter: "".to_string(),
    })
}

/// Multiply `a` with `f` and round the result to the nearest integer,
/// saturating at `u64::MAX`.
pub fn mul_round(a: u64, f: &BigRational) -> u64 {
    let product = BigRational::from_integer(BigInt::from(a)) * f;

    product.round().to_integer().to_u64().unwrap_or(u64::MAX)
}

/// Multiply `a` with `f` and round the result up to the nearest integer.
pub fn mul_ceil(a: &BigInt, f: &BigRational) -> BigInt {
    (BigRational::from_integer(a.clone()) * f).ceil().to_integer()
}

/// Converts a non-negative, finite float into the exact rational denoted by
/// its decimal representation.
pub fn decimal_to_ratio(value: f64) -> Result<BigRational, Error> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid_decimal(value.to_string()));
    }

    // `Display` for `f64` never uses exponent notation.
    let repr = value.to_string();

    let (int_part, frac_part) = match repr.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (repr.as_str(), ""),
    };

    let digits = format!("{int_part}{frac_part}");
    let numer = digits
        .parse::<BigInt>()
        .map_err(|_| Error::invalid_decimal(repr.clone()))?;

    let denom = BigInt::from(10u32).pow(frac_part.len() as u32);

    Ok(BigRational::new(numer, denom))
}

pub struct PrettyFee<'a>(pub &'a Fee);

impl fmt::Display for PrettyFee<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = match self.0.amount.first() {
            Some(coin) => format!("{}{}", coin.amount, coin.denom),
            None => "<no amount specified>".to_string(),
        };

        f.debug_struct("Fee")
            .field("amount", &amount)
            .field("gas_limit", &self.0.gas_limit)
            .finish()
    }
}
