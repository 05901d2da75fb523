// snapshotrestore/src/restore/planner.rs
use std::collections::{BTreeSet, HashSet};

/// Parent tables come before the tables that reference them.
pub const DEFAULT_TABLE_PRIORITY: &[&str] = &[
    "users",
    "accounts",
    "sessions",
    "verification_tokens",
    "organizations",
    "organization_members",
    "affiliates",
    "campaigns",
    "campaign_affiliates",
    "posts",
    "comments",
    "projects",
    "tasks",
    "task_assignments",
    "invoices",
    "invoice_line_items",
    "payments",
    "notifications",
    "audit_logs",
];

/// Orders the tables present in a snapshot for restoration: priority-list
/// tables first in list order, then the rest alphabetically.
pub fn plan_restore_order(priority: &[String], present: &BTreeSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut plan: Vec<String> = priority
        .iter()
        .filter(|table| present.contains(*table) && seen.insert(table.as_str()))
        .cloned()
        .collect();

    // BTreeSet iteration is already alphabetical
    plan.extend(
        present
            .iter()
            .filter(|table| !seen.contains(table.as_str()))
            .cloned(),
    );
    plan
}

/// Children before parents. Not filtered against the snapshot: cleanup targets the live database.
pub fn cleanup_order(priority: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    priority
        .iter()
        .rev()
        .filter(|table| seen.insert(table.as_str()))
        .cloned()
        .collect()
}

/// Priority-list tables with no file in the snapshot, in list order.
pub fn missing_priority_tables(priority: &[String], present: &BTreeSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    priority
        .iter()
        .filter(|table| !present.contains(*table) && seen.insert(table.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parent_before_child_regardless_of_listing_order() {
        let priority = names(&["users", "posts"]);
        let plan = plan_restore_order(&priority, &set(&["posts", "users"]));
        assert_eq!(plan, names(&["users", "posts"]));
    }

    #[test]
    fn test_unknown_tables_appended_alphabetically() {
        let priority = names(&["users", "sessions"]);
        let plan = plan_restore_order(&priority, &set(&["zebra", "sessions", "alpha", "users"]));
        assert_eq!(plan, names(&["users", "sessions", "alpha", "zebra"]));
    }

    #[test]
    fn test_priority_tables_absent_from_snapshot_are_dropped() {
        let priority = names(&["users", "accounts", "sessions"]);
        let plan = plan_restore_order(&priority, &set(&["sessions", "users"]));
        assert_eq!(plan, names(&["users", "sessions"]));
    }

    #[test]
    fn test_no_duplicates_in_plan() {
        let priority = names(&["users", "posts", "users"]);
        let plan = plan_restore_order(&priority, &set(&["users", "posts"]));
        assert_eq!(plan, names(&["users", "posts"]));
    }

    #[test]
    fn test_cleanup_order_is_reverse_priority() {
        let priority = names(&["invoices", "invoice_line_items", "payments"]);
        assert_eq!(
            cleanup_order(&priority),
            names(&["payments", "invoice_line_items", "invoices"])
        );
    }

    #[test]
    fn test_missing_priority_tables() {
        let priority = names(&["users", "accounts", "posts"]);
        let missing = missing_priority_tables(&priority, &set(&["posts", "extra"]));
        assert_eq!(missing, names(&["users", "accounts"]));
    }

    #[test]
    fn test_default_priority_keeps_known_relationships() {
        let priority: Vec<String> = DEFAULT_TABLE_PRIORITY.iter().map(|t| t.to_string()).collect();
        let position = |name: &str| priority.iter().position(|t| t == name);
        assert!(position("accounts") < position("sessions"));
        assert!(position("campaigns") < position("campaign_affiliates"));
        assert!(position("invoices") < position("invoice_line_items"));
    }
}
