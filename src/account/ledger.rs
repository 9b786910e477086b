use std::collections::HashMap;

use crate::models::{AssetBalance, Side};

/// Decimal precision implied by an exchange step-size string
///
/// The position of the leading `1` digit relative to the decimal point gives
/// the precision: "0.001" -> 3, "0.1" -> 1, "1" -> 0. A step string with no
/// resolvable leading digit yields `None` and callers skip rounding.
pub fn precision_from_step(step: &str) -> Option<u32> {
    let one = step.find('1')?;
    match step.find('.') {
        Some(dot) if one > dot => Some((one - dot) as u32),
        _ => Some(0),
    }
}

/// Floor a size to the precision of the given step size
///
/// Malformed step strings degrade to "no rounding applied" with a warning,
/// never an error.
pub fn round_down_step(value: f64, step: &str) -> f64 {
    match precision_from_step(step) {
        Some(precision) => {
            let factor = 10f64.powi(precision as i32);
            (value * factor).floor() / factor
        }
        None => {
            tracing::warn!(step, "unparseable step size; skipping rounding");
            value
        }
    }
}

/// Round a monetary amount to the precision of the given step size
pub fn round_step(value: f64, step: &str) -> f64 {
    match precision_from_step(step) {
        Some(precision) => {
            let factor = 10f64.powi(precision as i32);
            (value * factor).round() / factor
        }
        None => {
            tracing::warn!(step, "unparseable step size; skipping rounding");
            value
        }
    }
}

/// Simulated account balances
///
/// The only component allowed to mutate balances. Keeps the map minimal:
/// an asset whose triple reaches exactly zero is removed, so membership
/// doubles as a non-zero check. Performs no I/O and never blocks.
#[derive(Debug, Default)]
pub struct BalanceLedger {
    balances: HashMap<String, AssetBalance>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }

    /// Balance triple for an asset; zeroes when absent - never fails
    pub fn get_balance(&self, asset: &str) -> AssetBalance {
        self.balances
            .get(asset)
            .copied()
            .unwrap_or(AssetBalance::new(0.0, 0.0, 0.0))
    }

    pub fn has_asset(&self, asset: &str) -> bool {
        self.balances.contains_key(asset)
    }

    /// Asset -> total, for every non-zero asset
    pub fn get_all_balances(&self) -> HashMap<String, f64> {
        self.balances
            .iter()
            .map(|(asset, b)| (asset.clone(), b.total))
            .collect()
    }

    /// Asset -> full triple, for every non-zero asset
    pub fn get_all_balances_detailed(&self) -> HashMap<String, AssetBalance> {
        self.balances.clone()
    }

    /// Overwrite the stored triple for an asset
    ///
    /// An exact-zero triple removes the entry. Negative components violate
    /// the ledger invariant and are ignored with a warning. Only valid in
    /// simulation - live balances are refreshed wholesale via
    /// [`BalanceLedger::replace_all`].
    pub fn update_balance(&mut self, asset: &str, total: f64, available: f64, hold: f64) {
        if total < 0.0 || available < 0.0 || hold < 0.0 {
            tracing::warn!(
                asset,
                total,
                available,
                hold,
                "ignoring balance update with negative component"
            );
            return;
        }

        if total == 0.0 && available == 0.0 && hold == 0.0 {
            self.balances.remove(asset);
        } else {
            self.balances
                .insert(asset.to_string(), AssetBalance::new(total, available, hold));
        }
    }

    /// Wholesale refresh from exchange-reported balances (live mode)
    pub fn replace_all(&mut self, balances: HashMap<String, AssetBalance>) {
        self.balances = balances
            .into_iter()
            .filter(|(_, b)| !b.is_zero())
            .collect();
    }

    /// Simulate the execution of one fill against the ledger
    ///
    /// The size is floored to the base step, monetary amounts rounded to the
    /// quote step. A BUY needs `notional + fee` available in the quote asset;
    /// a SELL needs `size` available in the base asset. Insufficient funds is
    /// a normal rejection: returns `false` with nothing mutated.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_fill(
        &mut self,
        side: Side,
        base_asset: &str,
        quote_asset: &str,
        size: f64,
        price: f64,
        fee_rate: f64,
        base_step: &str,
        quote_step: &str,
    ) -> bool {
        let size = round_down_step(size, base_step);
        if size <= 0.0 || price <= 0.0 {
            tracing::debug!(
                base_asset,
                quote_asset,
                size,
                price,
                "rejecting fill with non-positive size or price"
            );
            return false;
        }

        let notional = round_step(size * price, quote_step);
        let fee = round_step(notional * fee_rate, quote_step);

        let base = self.get_balance(base_asset);
        let quote = self.get_balance(quote_asset);

        match side {
            Side::Buy => {
                let cost = notional + fee;
                if cost > quote.available {
                    tracing::debug!(
                        quote_asset,
                        cost,
                        available = quote.available,
                        "buy rejected: insufficient quote balance"
                    );
                    return false;
                }

                self.update_balance(
                    base_asset,
                    base.total + size,
                    base.available + size,
                    base.hold,
                );
                self.update_balance(
                    quote_asset,
                    quote.total - cost,
                    quote.available - cost,
                    quote.hold,
                );
                true
            }
            Side::Sell => {
                if size > base.available {
                    tracing::debug!(
                        base_asset,
                        size,
                        available = base.available,
                        "sell rejected: insufficient base balance"
                    );
                    return false;
                }

                let proceeds = notional - fee;
                self.update_balance(
                    base_asset,
                    base.total - size,
                    base.available - size,
                    base.hold,
                );
                self.update_balance(
                    quote_asset,
                    quote.total + proceeds,
                    quote.available + proceeds,
                    quote.hold,
                );
                true
            }
            Side::Unknown | Side::None => false,
        }
    }
}
