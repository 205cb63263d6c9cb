// Turns one provider transaction into the canonical wallet events for one
// wallet. Deterministic in the payload alone: metadata is resolved up
// front and prices are attached later by the reconstructor.

use once_cell::sync::Lazy;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use crate::models::{Direction, Side, TokenMeta, WalletEvent};
use crate::provider::models::EnhancedTransaction;

pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const NATIVE_DECIMALS: u8 = 9;

/// AMM programs whose presence in the instruction list marks a swap.
pub static AMM_PROGRAMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        // Raydium AMM v4
        "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8",
        // Raydium CPMM
        "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C",
        // Orca Whirlpool
        "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc",
        // Meteora DLMM
        "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo",
        // Pump.fun
        "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",
        // Jupiter aggregator v6
        "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
    ])
});

/// Every mint a transaction references, for batch metadata resolution.
/// Native transfers always reference the native mint.
pub fn referenced_mints(tx: &EnhancedTransaction) -> HashSet<String> {
    let mut mints: HashSet<String> = tx
        .token_transfers
        .iter()
        .filter_map(|t| t.mint.clone())
        .collect();
    if !tx.native_transfers.is_empty() {
        mints.insert(NATIVE_MINT.to_string());
    }
    mints
}

pub fn normalize(
    tx: &EnhancedTransaction,
    wallet: &str,
    meta: &HashMap<String, TokenMeta>,
) -> Vec<WalletEvent> {
    let block_time = tx.timestamp.unwrap_or(0);
    let program = detect_program(tx);
    let mut events: Vec<WalletEvent> = Vec::new();

    for transfer in &tx.token_transfers {
        let Some(mint) = transfer.mint.as_deref() else {
            continue;
        };
        let amount = Decimal::from_f64(transfer.token_amount.unwrap_or(0.0)).unwrap_or_default();
        let from = transfer.from_user_account.as_deref();
        let to = transfer.to_user_account.as_deref();

        let Some((side, direction, signed)) = classify_transfer(wallet, from, to, amount) else {
            continue;
        };

        let (symbol, decimals) = symbol_and_decimals(meta, mint);
        events.push(make_event(
            tx,
            wallet,
            block_time,
            program.clone(),
            side,
            direction,
            mint,
            symbol,
            decimals,
            signed,
            to_base_units(signed, decimals),
        ));
    }

    for transfer in &tx.native_transfers {
        let lamports = transfer.amount.unwrap_or(0);
        let amount = Decimal::from(lamports.unsigned_abs());
        let ui = amount / Decimal::from(10u64.pow(NATIVE_DECIMALS as u32));
        let from = transfer.from_user_account.as_deref();
        let to = transfer.to_user_account.as_deref();

        let Some((side, direction, signed)) = classify_transfer(wallet, from, to, ui) else {
            continue;
        };

        let raw = if signed.is_sign_negative() {
            format!("-{}", lamports.unsigned_abs())
        } else {
            lamports.unsigned_abs().to_string()
        };
        events.push(make_event(
            tx,
            wallet,
            block_time,
            program.clone(),
            side,
            direction,
            NATIVE_MINT,
            "SOL".to_string(),
            NATIVE_DECIMALS,
            signed,
            raw,
        ));
    }

    if is_swap(tx) && events.len() >= 2 {
        let link_id = format!("swap:{}", tx.signature);
        let swap_payload = tx
            .events
            .swap
            .as_ref()
            .and_then(|v| serde_json::to_string(v).ok());
        let len = events.len();
        for event in &mut events[len - 2..] {
            event.link_id = Some(link_id.clone());
            event.metadata = swap_payload.clone();
        }
    }

    let fee = tx.fee.unwrap_or(0);
    if fee > 0 && !events.is_empty() {
        let target = events
            .iter()
            .position(|e| e.side == Side::Sell)
            .unwrap_or(0);
        events[target].fee_base_units = Some(fee);
    }

    for (index, event) in events.iter_mut().enumerate() {
        event.event_index = index as i64;
    }

    events
}

/// Swap classification: a structured swap event, a known AMM program, or a
/// multi-mint multi-transfer shape.
pub fn is_swap(tx: &EnhancedTransaction) -> bool {
    if tx.events.swap.is_some() {
        return true;
    }
    if tx
        .instructions
        .iter()
        .filter_map(|i| i.program_id.as_deref())
        .any(|p| AMM_PROGRAMS.contains(p))
    {
        return true;
    }
    let distinct_mints: HashSet<&str> = tx
        .token_transfers
        .iter()
        .filter_map(|t| t.mint.as_deref())
        .collect();
    distinct_mints.len() >= 2 && tx.token_transfers.len() >= 2
}

fn classify_transfer(
    wallet: &str,
    from: Option<&str>,
    to: Option<&str>,
    amount: Decimal,
) -> Option<(Side, Direction, Decimal)> {
    match (from == Some(wallet), to == Some(wallet)) {
        (true, true) => Some((Side::Transfer, Direction::SelfTransfer, amount)),
        (true, false) if to.is_none() => Some((Side::Burn, Direction::Out, -amount)),
        (true, false) => Some((Side::Sell, Direction::Out, -amount)),
        (false, true) if from.is_none() => Some((Side::Mint, Direction::In, amount)),
        (false, true) => Some((Side::Buy, Direction::In, amount)),
        (false, false) => None,
    }
}

fn detect_program(tx: &EnhancedTransaction) -> Option<String> {
    let programs: Vec<&str> = tx
        .instructions
        .iter()
        .filter_map(|i| i.program_id.as_deref())
        .collect();
    programs
        .iter()
        .find(|p| AMM_PROGRAMS.contains(**p))
        .or(programs.first())
        .map(|p| p.to_string())
}

fn symbol_and_decimals(meta: &HashMap<String, TokenMeta>, mint: &str) -> (String, u8) {
    match meta.get(mint) {
        Some(m) => (m.symbol.clone(), m.decimals),
        None => (short_mint(mint), 9),
    }
}

/// Derived display symbol: first four and last four characters of the mint.
pub fn short_mint(mint: &str) -> String {
    if mint.len() <= 8 {
        return mint.to_string();
    }
    format!("{}…{}", &mint[..4], &mint[mint.len() - 4..])
}

fn to_base_units(ui: Decimal, decimals: u8) -> String {
    // 10^19 overflows u64; no real mint comes close.
    let scale = Decimal::from(10u64.pow(decimals.min(18) as u32));
    (ui * scale).normalize().to_string()
}

#[allow(clippy::too_many_arguments)]
fn make_event(
    tx: &EnhancedTransaction,
    wallet: &str,
    block_time: i64,
    program: Option<String>,
    side: Side,
    direction: Direction,
    mint: &str,
    symbol: String,
    decimals: u8,
    amount_ui: Decimal,
    amount_raw: String,
) -> WalletEvent {
    WalletEvent {
        wallet: wallet.to_string(),
        signature: tx.signature.clone(),
        event_index: 0,
        slot: tx.slot,
        block_time,
        program,
        side,
        direction,
        token_mint: mint.to_string(),
        token_symbol: symbol,
        token_decimals: decimals,
        amount_raw,
        amount_ui,
        amount_usd: None,
        price_usd_at_tx: None,
        link_id: None,
        fee_base_units: None,
        metadata: None,
    }
}
