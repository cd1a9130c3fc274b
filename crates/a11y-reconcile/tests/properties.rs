//! Reconciliation properties

use a11y_reconcile::{plan, IdentityKey, ReconcilePlan};
use a11y_types::{Finding, NewFinding, ScanId, Severity};
use chrono::Utc;
use proptest::prelude::*;
use std::collections::HashSet;

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Critical),
        Just(Severity::Serious),
        Just(Severity::Moderate),
        Just(Severity::Minor),
    ]
}

fn new_finding() -> impl Strategy<Value = NewFinding> {
    (
        prop::sample::select(vec!["https://a.com", "https://a.com/about", "https://b.com"]),
        prop::sample::select(vec!["Missing alt", "Low contrast", "Empty link", "No label"]),
        prop::option::of(prop::sample::select(vec!["<img>", "<p>", "<a href=\"#\">"])),
        severity(),
        prop::option::of("[a-z]{1,6}"),
        prop::collection::vec(
            prop::sample::select(vec!["wcag2a", "wcag2aa", "section508", "best-practice"]),
            0..3,
        ),
        prop::option::of(prop::sample::select(vec!["main > img", "#hero"])),
    )
        .prop_map(|(url, message, element, severity, help, tags, path)| {
            let mut finding = NewFinding::new(url, message, severity).with_tags(tags);
            finding.element = element.map(str::to_string);
            finding.help = help;
            finding.element_path = path.map(str::to_string);
            finding
        })
}

fn findings() -> impl Strategy<Value = Vec<NewFinding>> {
    prop::collection::vec(new_finding(), 0..24)
}

fn unique(findings: Vec<NewFinding>) -> Vec<NewFinding> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert(IdentityKey::of_new(f)))
        .collect()
}

fn persist(scan_id: ScanId, findings: Vec<NewFinding>) -> Vec<Finding> {
    let now = Utc::now();
    findings
        .into_iter()
        .map(|f| Finding::from_new(scan_id, f, now))
        .collect()
}

fn apply(scan_id: ScanId, mut state: Vec<Finding>, plan: ReconcilePlan) -> Vec<Finding> {
    state.retain(|f| !plan.to_remove.contains(&f.id));
    for patch in &plan.to_update {
        if let Some(f) = state.iter_mut().find(|f| f.id == patch.id) {
            f.apply_patch(patch);
        }
    }
    state.extend(persist(scan_id, plan.to_add));
    state
}

proptest! {
    #[test]
    fn same_keys_never_add_or_remove(r1 in findings(), help in prop::option::of("[A-Z]{3}")) {
        let r1 = unique(r1);
        let existing = persist(ScanId::new(), r1.clone());
        let r2: Vec<NewFinding> = r1
            .iter()
            .cloned()
            .map(|mut f| { f.help = help.clone(); f })
            .collect();
        let expected_updates = r1.iter().filter(|f| f.help != help).count();

        let plan = plan(&existing, r2, Utc::now());

        prop_assert!(plan.to_add.is_empty());
        prop_assert!(plan.to_remove.is_empty());
        prop_assert_eq!(plan.to_update.len(), expected_updates);
        prop_assert!(plan.to_update.iter().all(|p| p.touches("help") && p.changes.len() == 1));
    }

    #[test]
    fn empty_incoming_removes_everything(r1 in findings()) {
        let existing = persist(ScanId::new(), r1);
        let plan = plan(&existing, Vec::new(), Utc::now());
        prop_assert!(plan.to_add.is_empty());
        prop_assert!(plan.to_update.is_empty());
        prop_assert_eq!(plan.to_remove.len(), existing.len());
    }

    #[test]
    fn empty_existing_adds_every_distinct_finding(r2 in findings()) {
        let distinct = unique(r2.clone()).len();
        let plan = plan(&[], r2.clone(), Utc::now());
        prop_assert!(plan.to_remove.is_empty());
        prop_assert!(plan.to_update.is_empty());
        prop_assert_eq!(plan.to_add.len(), distinct);
        prop_assert_eq!(plan.duplicates_collapsed, r2.len() - distinct);
    }

    #[test]
    fn reconciliation_is_idempotent(r1 in findings(), r2 in findings()) {
        let scan_id = ScanId::new();
        let existing = persist(scan_id, r1);

        let first = plan(&existing, r2.clone(), Utc::now());
        let state = apply(scan_id, existing, first);
        let second = plan(&state, r2, Utc::now());

        prop_assert!(second.is_empty(), "second pass planned {:?}", second);
    }

    #[test]
    fn result_keys_match_incoming_keys(r1 in findings(), r2 in findings()) {
        let scan_id = ScanId::new();
        let existing = persist(scan_id, unique(r1));
        let planned = plan(&existing, r2.clone(), Utc::now());
        let state = apply(scan_id, existing, planned);

        let got: HashSet<IdentityKey> = state.iter().map(IdentityKey::of).collect();
        let want: HashSet<IdentityKey> = r2.iter().map(IdentityKey::of_new).collect();
        prop_assert_eq!(got, want);
    }
}

#[test]
fn documented_example() {
    let scan_id = ScanId::new();
    let existing = persist(
        scan_id,
        vec![NewFinding::new("https://a.com", "Missing alt", Severity::Critical)
            .with_element("<img>")
            .with_help("old")],
    );
    let incoming = vec![
        NewFinding::new("https://a.com", "Missing alt", Severity::Critical)
            .with_element("<img>")
            .with_help("new"),
        NewFinding::new("https://a.com", "Low contrast", Severity::Moderate).with_element("<p>"),
    ];

    let plan = plan(&existing, incoming, Utc::now());

    assert_eq!(plan.to_add.len(), 1);
    assert_eq!(plan.to_add[0].message, "Low contrast");
    assert!(plan.to_remove.is_empty());
    assert_eq!(plan.to_update.len(), 1);
    assert_eq!(plan.to_update[0].id, existing[0].id);
    assert!(plan.to_update[0].touches("help"));
}
