//! Shared fixtures for integration tests: a small labelled corpus, a
//! fast configuration, and a Prometheus output parser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use ticket_triage::config::Config;
use ticket_triage::ml::{LogisticSolver, ModelFamily};

pub const CATEGORIES: [&str; 5] = [
    "Account Management",
    "Billing Inquiry",
    "Bug Report",
    "Feature Request",
    "Technical Issue",
];

const TEMPLATES: [(&str, [&str; 4], [&str; 4]); 5] = [
    (
        "Account Management",
        ["Change my email", "Delete account", "Update profile", "Reset username"],
        [
            "please update the email address on my account profile",
            "i want to delete my account and profile data",
            "how do i change my account username and profile",
            "need to transfer account ownership to a colleague",
        ],
    ),
    (
        "Billing Inquiry",
        ["Charged twice", "Refund request", "Invoice question", "Payment failed"],
        [
            "my card was charged twice for the monthly invoice",
            "please refund the duplicate payment on my invoice",
            "the invoice amount does not match my subscription price",
            "payment was declined but the bill still shows due",
        ],
    ),
    (
        "Bug Report",
        ["App crashes", "Error on save", "Button broken", "Crash on start"],
        [
            "the app crashes with an error when i open settings",
            "saving a document throws an unexpected error and crashes",
            "the submit button does nothing and the console shows an error",
            "application crashes on startup after the latest update",
        ],
    ),
    (
        "Feature Request",
        ["Dark mode", "Export to CSV", "Calendar sync", "Keyboard shortcuts"],
        [
            "please add a dark mode feature to the dashboard",
            "would love a feature to export reports to csv",
            "feature request sync tasks with my google calendar",
            "add keyboard shortcuts feature for power users",
        ],
    ),
    (
        "Technical Issue",
        ["Cannot connect", "Slow network", "VPN drops", "Server timeout"],
        [
            "cannot connect to the server over the company network",
            "the network connection is very slow and times out",
            "vpn connection drops every few minutes on wifi",
            "server timeout when connecting through the proxy network",
        ],
    ),
];

/// Twelve tickets per category, phrased from fixed templates
pub fn corpus_csv() -> String {
    let mut csv = String::from("ticket_id,subject,description,category,priority,timestamp\n");
    let priorities = ["Low", "Medium", "High", "Critical"];
    let mut id = 0;

    for (category, subjects, descriptions) in TEMPLATES.iter() {
        for round in 0..3 {
            for i in 0..4 {
                id += 1;
                csv.push_str(&format!(
                    "TCK-{id:04},{},\"{} {}\",{},{},2024-01-{:02}T09:00:00\n",
                    subjects[(i + round) % 4],
                    descriptions[i],
                    descriptions[(i + round + 1) % 4],
                    category,
                    priorities[(i + round) % 4],
                    (id % 28) + 1,
                ));
            }
        }
    }
    csv
}

/// Write the fixture corpus under `dir`
pub fn write_corpus(dir: &Path) -> PathBuf {
    let path = dir.join("data/raw/tickets.csv");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, corpus_csv()).unwrap();
    path
}

/// Configuration sized for tests, rooted in `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.data.raw_path = write_corpus(dir);
    config.data.processed_dir = Some(dir.join("data/processed"));
    config.artifacts.dir = dir.join("models");

    config.selection.forest.n_trees = 15;

    config.tuning.family = ModelFamily::LogisticRegression;
    config.tuning.cv_folds = 3;
    config.tuning.c_values = vec![0.1, 10.0];
    config.tuning.solvers = vec![LogisticSolver::Lbfgs, LogisticSolver::Liblinear];

    config.evaluation.warmup_iterations = 2;
    config.evaluation.iterations = 25;
    config
}

/// Parse Prometheus exposition format into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
