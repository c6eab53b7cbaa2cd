//! Summary computation.
//!
//! # Score
//! ```text
//! min(8 × networks, 40) + min(3 × top tokens, 30) + max(0, (1 − top network share) × 30)
//! ```
//! The top network share is 0 when the portfolio has no value.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::portfolio::types::{NetworkSummary, PortfolioSummary, TokenSummary, WalletRecord};
use crate::types::{Network, Query, QueryResult};

const MAX_TOP_TOKENS: usize = 10;

#[derive(Default)]
struct NetworkAcc {
    value: f64,
    wallets: usize,
}

#[derive(Default)]
struct TokenAcc {
    value: f64,
    amount: f64,
    holders: HashSet<usize>,
}

/// Summarize `wallets` using the matching entries of `results`.
///
/// Wallets without a successful result count towards wallet totals with a
/// value of 0.
pub fn summarize(wallets: &[WalletRecord], results: &[QueryResult]) -> PortfolioSummary {
    let by_key: HashMap<Query, &QueryResult> = results
        .iter()
        .filter(|r| r.is_success())
        .map(|r| (r.query(), r))
        .collect();

    let mut networks: BTreeMap<Network, NetworkAcc> = BTreeMap::new();
    let mut tokens: BTreeMap<String, TokenAcc> = BTreeMap::new();
    let mut total_value = 0.0;

    for (index, wallet) in wallets.iter().enumerate() {
        let result = by_key.get(&wallet.query()).copied();
        let wallet_value = result.map(QueryResult::total_usd_value).unwrap_or(0.0);

        let net = networks.entry(wallet.network.clone()).or_default();
        net.value += wallet_value;
        net.wallets += 1;
        total_value += wallet_value;

        let Some(result) = result else {
            continue;
        };

        let native = tokens.entry(result.unit_symbol.clone()).or_default();
        native.amount += result.display_balance;
        native.value += result.usd_value.unwrap_or(0.0);
        native.holders.insert(index);

        for token in &result.tokens {
            let acc = tokens.entry(token.symbol.clone()).or_default();
            acc.amount += token.amount;
            acc.value += token.usd_value.unwrap_or(0.0);
            acc.holders.insert(index);
        }
    }

    let mut network_summaries: Vec<NetworkSummary> = networks
        .into_iter()
        .map(|(network, acc)| NetworkSummary {
            network,
            total_value: acc.value,
            wallet_count: acc.wallets,
            share_percent: share(acc.value, total_value) * 100.0,
        })
        .collect();
    network_summaries.sort_by(|a, b| by_value_desc(a.total_value, b.total_value).then_with(|| a.network.cmp(&b.network)));

    let mut top_tokens: Vec<TokenSummary> = tokens
        .into_iter()
        .map(|(symbol, acc)| TokenSummary {
            symbol,
            total_value: acc.value,
            total_amount: acc.amount,
            holder_count: acc.holders.len(),
        })
        .collect();
    top_tokens.sort_by(|a, b| by_value_desc(a.total_value, b.total_value).then_with(|| a.symbol.cmp(&b.symbol)));
    top_tokens.truncate(MAX_TOP_TOKENS);

    let top_share = network_summaries
        .first()
        .map(|n| share(n.total_value, total_value))
        .unwrap_or(0.0);
    let diversification_score = diversification_score(network_summaries.len(), top_tokens.len(), top_share);

    PortfolioSummary {
        total_value,
        wallet_count: wallets.len(),
        networks: network_summaries,
        top_tokens,
        diversification_score,
    }
}

/// Score from counts and the share (0..=1) held by the largest network.
pub fn diversification_score(network_count: usize, token_count: usize, top_network_share: f64) -> u32 {
    let networks = (8.0 * network_count as f64).min(40.0);
    let tokens = (3.0 * token_count as f64).min(30.0);
    let spread = ((1.0 - top_network_share) * 30.0).max(0.0);
    (networks + tokens + spread).round() as u32
}

fn share(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total
    } else {
        0.0
    }
}

fn by_value_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
