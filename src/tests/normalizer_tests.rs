use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::ingest::normalizer::{self, NATIVE_MINT};
use crate::models::{Direction, MetaSourceKind, Side, TokenMeta};
use crate::tests::support::*;

fn meta_with(mint: &str, symbol: &str, decimals: u8) -> HashMap<String, TokenMeta> {
    HashMap::from([(
        mint.to_string(),
        TokenMeta {
            mint: mint.to_string(),
            symbol: symbol.to_string(),
            name: None,
            decimals,
            source: MetaSourceKind::Local,
        },
    )])
}

#[test]
fn outgoing_transfer_is_a_sell() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(WALLET),
        Some(COUNTERPARTY),
        5.0,
    )];

    let events = normalizer::normalize(&t, WALLET, &meta_with(TOKEN1, "TKN", 6));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].side, Side::Sell);
    assert_eq!(events[0].direction, Direction::Out);
    assert_eq!(events[0].amount_ui, dec!(-5));
    assert_eq!(events[0].token_symbol, "TKN");
    assert_eq!(events[0].token_decimals, 6);
}

#[test]
fn incoming_transfer_is_a_buy() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(COUNTERPARTY),
        Some(WALLET),
        5.0,
    )];

    let events = normalizer::normalize(&t, WALLET, &meta_with(TOKEN1, "TKN", 6));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].side, Side::Buy);
    assert_eq!(events[0].direction, Direction::In);
    assert_eq!(events[0].amount_ui, dec!(5));
}

#[test]
fn unrelated_transfer_emits_nothing() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(COUNTERPARTY),
        Some(TOKEN2),
        5.0,
    )];

    assert!(normalizer::normalize(&t, WALLET, &HashMap::new()).is_empty());
}

#[test]
fn token_amount_is_stored_verbatim_with_resolver_decimals() {
    // The provider supplies decimals-adjusted amounts; base units are
    // recomputed from the resolver's decimals.
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(COUNTERPARTY),
        Some(WALLET),
        12.5,
    )];

    let events = normalizer::normalize(&t, WALLET, &meta_with(TOKEN1, "TKN", 6));
    assert_eq!(events[0].amount_ui, dec!(12.5));
    assert_eq!(events[0].amount_raw, "12500000");
}

#[test]
fn native_transfer_converts_lamports() {
    let mut t = tx("sig1", 1000, 100);
    t.native_transfers = vec![native_transfer(Some(WALLET), Some(COUNTERPARTY), 1_500_000_000)];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].side, Side::Sell);
    assert_eq!(events[0].token_mint, NATIVE_MINT);
    assert_eq!(events[0].token_symbol, "SOL");
    assert_eq!(events[0].amount_ui, dec!(-1.5));
    assert_eq!(events[0].amount_raw, "-1500000000");
}

#[test]
fn self_transfer_is_marked_self() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![token_transfer(TOKEN1, Some(WALLET), Some(WALLET), 5.0)];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].side, Side::Transfer);
    assert_eq!(events[0].direction, Direction::SelfTransfer);
}

#[test]
fn missing_counterparties_mean_mint_and_burn() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![
        token_transfer(TOKEN1, None, Some(WALLET), 5.0),
        token_transfer(TOKEN1, Some(WALLET), None, 2.0),
    ];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events[0].side, Side::Mint);
    assert_eq!(events[0].direction, Direction::In);
    assert_eq!(events[1].side, Side::Burn);
    assert_eq!(events[1].direction, Direction::Out);
}

#[test]
fn multi_mint_transfers_link_as_a_swap() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![
        token_transfer(TOKEN1, Some(WALLET), Some(COUNTERPARTY), 5.0),
        token_transfer(TOKEN2, Some(COUNTERPARTY), Some(WALLET), 10.0),
    ];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].link_id.as_deref(), Some("swap:sig1"));
    assert_eq!(events[1].link_id.as_deref(), Some("swap:sig1"));
}

#[test]
fn amm_program_marks_a_swap() {
    let mut t = tx("sig1", 1000, 100);
    t.instructions = vec![instruction("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8")];
    t.token_transfers = vec![
        token_transfer(TOKEN1, Some(WALLET), Some(COUNTERPARTY), 5.0),
        token_transfer(TOKEN1, Some(COUNTERPARTY), Some(WALLET), 1.0),
    ];

    assert!(normalizer::is_swap(&t));
    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert!(events.iter().all(|e| e.link_id.is_some()));
    assert_eq!(
        events[0].program.as_deref(),
        Some("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8")
    );
}

#[test]
fn structured_swap_event_marks_a_swap() {
    let mut t = tx("sig1", 1000, 100);
    t.events.swap = Some(serde_json::json!({"nativeInput": {"amount": "100"}}));
    t.token_transfers = vec![
        token_transfer(TOKEN1, Some(WALLET), Some(COUNTERPARTY), 5.0),
        token_transfer(TOKEN2, Some(COUNTERPARTY), Some(WALLET), 1.0),
    ];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert!(events.iter().all(|e| e.link_id.is_some()));
    assert!(events[0].metadata.as_deref().unwrap().contains("nativeInput"));
}

#[test]
fn fee_lands_on_the_first_sell() {
    let mut t = tx("sig1", 1000, 100);
    t.fee = Some(5000);
    t.token_transfers = vec![
        token_transfer(TOKEN2, Some(COUNTERPARTY), Some(WALLET), 10.0),
        token_transfer(TOKEN1, Some(WALLET), Some(COUNTERPARTY), 5.0),
    ];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events[0].fee_base_units, None);
    assert_eq!(events[1].side, Side::Sell);
    assert_eq!(events[1].fee_base_units, Some(5000));
}

#[test]
fn fee_falls_back_to_the_first_event() {
    let mut t = tx("sig1", 1000, 100);
    t.fee = Some(5000);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(COUNTERPARTY),
        Some(WALLET),
        10.0,
    )];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events[0].fee_base_units, Some(5000));
}

#[test]
fn indices_are_dense_and_ascending() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![
        token_transfer(TOKEN1, Some(WALLET), Some(COUNTERPARTY), 1.0),
        token_transfer(TOKEN2, Some(COUNTERPARTY), Some(WALLET), 2.0),
    ];
    t.native_transfers = vec![native_transfer(Some(WALLET), Some(COUNTERPARTY), 100)];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    let indices: Vec<i64> = events.iter().map(|e| e.event_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn normalization_is_deterministic() {
    let mut t = tx("sig1", 1000, 100);
    t.fee = Some(5000);
    t.token_transfers = vec![
        token_transfer(TOKEN1, Some(WALLET), Some(COUNTERPARTY), 5.0),
        token_transfer(TOKEN2, Some(COUNTERPARTY), Some(WALLET), 10.0),
    ];

    let meta = meta_with(TOKEN1, "TKN", 6);
    let first = normalizer::normalize(&t, WALLET, &meta);
    let second = normalizer::normalize(&t, WALLET, &meta);
    assert_eq!(first, second);
}

#[test]
fn unknown_mint_gets_derived_symbol() {
    let mut t = tx("sig1", 1000, 100);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(COUNTERPARTY),
        Some(WALLET),
        5.0,
    )];

    let events = normalizer::normalize(&t, WALLET, &HashMap::new());
    assert_eq!(events[0].token_symbol, normalizer::short_mint(TOKEN1));
    assert_eq!(events[0].token_decimals, 9);
}
