/// Native asset units
///
/// Two precisions are in play:
/// - **Native subunits**: what atomic transactions and shared-memory UTXOs
///   carry (9 decimals).
/// - **Ledger units**: what local account balances hold, native subunits
///   scaled by `x2c_rate`.
///
/// Number of native subunits in one whole unit
pub const SUBUNITS_PER_UNIT: u64 = 1_000_000_000;

/// Native subunits to ledger units
pub fn to_ledger_units(subunits: u64, x2c_rate: u64) -> u128 {
    subunits as u128 * x2c_rate as u128
}

/// Ledger units to native subunits, truncating; saturates at `u64::MAX`
pub fn to_native_subunits(ledger_units: u128, x2c_rate: u64) -> u64 {
    if x2c_rate == 0 {
        return 0;
    }
    u64::try_from(ledger_units / x2c_rate as u128).unwrap_or(u64::MAX)
}

/// Format native subunits as a human-readable string
///
/// # Examples
/// ```
/// use atomic_ledger::core::monetary::format_subunits;
/// assert_eq!(format_subunits(1_000_000_000), "1.000000000 units");
/// assert_eq!(format_subunits(1_000), "0.000001000 units");
/// ```
pub fn format_subunits(subunits: u64) -> String {
    format!(
        "{}.{:09} units",
        subunits / SUBUNITS_PER_UNIT,
        subunits % SUBUNITS_PER_UNIT
    )
}
