//! Fee-adjusted share prices.
//!
//! The raw share price reported by a vault ignores fees that have accrued
//! but not yet been minted as shares. Diluting it by those pending shares
//! gives holders a fees-aware valuation:
//!
//! ```text
//! net        = price * supply / (supply + mgmt + perf)
//! net of mgmt = price * supply / (supply + mgmt)
//! net of perf = price * supply / (supply + perf)
//! ```
//!
//! All arithmetic is unsigned 256-bit with truncating division. While no
//! shares exist the three prices are the unit sentinel `1`.

use alloy_primitives::U256;
use vaultscan_types::DerivedPrices;

/// Errors raised by the share-price arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    /// An intermediate value does not fit in 256 bits.
    #[error("share price arithmetic overflowed 256 bits while computing {operation}")]
    Overflow {
        /// Which intermediate overflowed.
        operation: &'static str,
    },
}

/// Compute the three fee-adjusted share prices.
///
/// Deterministic in its four inputs. Returns [`DerivedPrices::unit`] when
/// `share_supply` is zero, whatever the other inputs.
///
/// # Errors
///
/// Returns [`MetricsError::Overflow`] if `share_price * share_supply` or
/// one of the diluted supplies does not fit in 256 bits.
pub fn compute_derived_prices(
    share_price: U256,
    share_supply: U256,
    pending_management_fees: U256,
    pending_performance_fees: U256,
) -> Result<DerivedPrices, MetricsError> {
    if share_supply.is_zero() {
        return Ok(DerivedPrices::unit());
    }

    let value = share_price
        .checked_mul(share_supply)
        .ok_or(MetricsError::Overflow {
            operation: "share price times supply",
        })?;

    let supply_net_of_mgmt = checked_supply(share_supply, pending_management_fees)?;
    let supply_net_of_perf = checked_supply(share_supply, pending_performance_fees)?;
    let supply_net_of_all = checked_supply(supply_net_of_mgmt, pending_performance_fees)?;

    Ok(DerivedPrices {
        net_share_price: dilute(value, supply_net_of_all),
        share_price_net_from_mng_fees: dilute(value, supply_net_of_mgmt),
        share_price_net_from_perf_fees: dilute(value, supply_net_of_perf),
    })
}

fn checked_supply(supply: U256, pending: U256) -> Result<U256, MetricsError> {
    supply.checked_add(pending).ok_or(MetricsError::Overflow {
        operation: "diluted share supply",
    })
}

/// Truncating division. `diluted` is never zero: it is at least the
/// non-zero share supply.
fn dilute(value: U256, diluted: U256) -> U256 {
    value.checked_div(diluted).unwrap_or_default()
}
