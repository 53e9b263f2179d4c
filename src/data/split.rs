use crate::error::{AppError, Result};
use crate::models::Ticket;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::info;

/// Split tickets into train/test sets, preserving each category's share.
///
/// Categories are visited in lexicographic order and each one is shuffled
/// from a single seeded generator, so a fixed seed always yields the same
/// partition. Every category keeps at least one training row.
pub fn stratified_split(
    tickets: &[Ticket],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<Ticket>, Vec<Ticket>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Validation(format!(
            "test_size must lie in (0, 1), got {test_size}"
        )));
    }
    if tickets.is_empty() {
        return Err(AppError::Validation("cannot split an empty corpus".to_string()));
    }

    let mut by_category: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, ticket) in tickets.iter().enumerate() {
        by_category.entry(ticket.category.as_str()).or_default().push(idx);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut test_rows = Vec::new();
    let mut train_rows = Vec::new();

    for rows in by_category.values_mut() {
        rows.shuffle(&mut rng);
        let n = rows.len();
        let n_test = ((test_size * n as f64).round() as usize).min(n - 1);

        test_rows.extend_from_slice(&rows[..n_test]);
        train_rows.extend_from_slice(&rows[n_test..]);
    }

    // corpus order within each side
    train_rows.sort_unstable();
    test_rows.sort_unstable();

    let train: Vec<Ticket> = train_rows.into_iter().map(|i| tickets[i].clone()).collect();
    let test: Vec<Ticket> = test_rows.into_iter().map(|i| tickets[i].clone()).collect();

    log_distribution("train", &train);
    log_distribution("test", &test);

    Ok((train, test))
}

/// Ticket count per category
pub fn class_distribution(tickets: &[Ticket]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        *counts.entry(ticket.category.clone()).or_insert(0) += 1;
    }
    counts
}

fn log_distribution(split: &str, tickets: &[Ticket]) {
    for (category, count) in class_distribution(tickets) {
        info!(split, category = %category, count, "Class distribution");
    }
    info!(split, total = tickets.len(), "Split size");
}
