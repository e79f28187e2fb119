use anyhow::{Result, anyhow};
use chrono::Utc;
use repairs_core::authorship::{CallerContext, ContextSource, UNKNOWN_CREATOR};
use repairs_core::db::query::RepairFilter;
use repairs_core::error::{ErrorCode, RepairError};
use repairs_core::model::ticket::{NewRepair, RepairTicket};
use repairs_core::store::{MemoryStore, SqliteStore, TicketStore};
use repairs_core::tickets::{create_ticket, get_ticket, list_tickets};
use std::collections::{HashMap, HashSet};

/// Store whose writes always fail.
struct FailingStore {
    inner: MemoryStore,
}

impl TicketStore for FailingStore {
    fn insert(&self, _ticket: &RepairTicket) -> Result<()> {
        Err(anyhow!("disk full"))
    }

    fn query(&self, filter: &RepairFilter) -> Result<Vec<RepairTicket>> {
        self.inner.query(filter)
    }

    fn get(&self, id: &str) -> Result<Option<RepairTicket>> {
        self.inner.get(id)
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

struct Headers(HashMap<String, String>);

impl ContextSource for Headers {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

fn caller(tenant: Option<&str>, conversation: Option<&str>) -> CallerContext {
    CallerContext::new(tenant.map(str::to_string), conversation.map(str::to_string))
}

#[test]
fn created_at_falls_inside_the_call_window() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let before = Utc::now();
    let new = NewRepair::new("Laptop", "No power");
    let ticket = create_ticket(&store, new, &caller(None, None)).expect("create");
    let after = Utc::now();

    assert!(before <= ticket.created_at && ticket.created_at <= after);
    assert_eq!(get_ticket(&store, &ticket.id).expect("get"), ticket);
}

#[test]
fn sequential_creates_get_distinct_ids_and_ordered_timestamps() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let anonymous = CallerContext::anonymous();

    let created: Vec<RepairTicket> = (0..20)
        .map(|n| {
            let new = NewRepair::new(format!("item {n}"), "broken");
            create_ticket(&store, new, &anonymous).expect("create")
        })
        .collect();

    let unique: HashSet<&str> = created.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(unique.len(), created.len());
    let ordered = created
        .windows(2)
        .all(|w| w[0].created_at <= w[1].created_at);
    assert!(ordered);

    let listed = list_tickets(&store, &RepairFilter::default()).expect("list");
    assert_eq!(listed.len(), created.len());
}

#[test]
fn authorship_follows_context_headers() {
    let store = MemoryStore::new();
    let cases = [
        (Some("T1"), Some("C1"), "T1|C1"),
        (Some("T1"), None, "T1"),
        (None, Some("C1"), UNKNOWN_CREATOR),
        (None, None, UNKNOWN_CREATOR),
        (Some("  "), Some("C1"), UNKNOWN_CREATOR),
    ];

    for (tenant, conversation, expected) in cases {
        let ctx = caller(tenant, conversation);
        let ticket = create_ticket(&store, NewRepair::new("Desk", "Loose"), &ctx).expect("create");
        assert_eq!(ticket.created_by.as_deref(), Some(expected));
        assert_ne!(ticket.created_by.as_deref(), Some("None"));
    }
}

#[test]
fn header_resolution_feeds_created_by_filter() {
    let store = MemoryStore::new();
    let headers = Headers(HashMap::from([
        ("x-microsoft-tenantid".to_string(), "contoso".to_string()),
        ("x-microsoft-ai-conversationid".to_string(), "abc".to_string()),
    ]));
    let ctx = CallerContext::resolve(&headers);

    let ticket = create_ticket(&store, NewRepair::new("Chair", "Squeaks"), &ctx).expect("create");
    let anonymous = CallerContext::anonymous();
    create_ticket(&store, NewRepair::new("Lamp", "Flickers"), &anonymous).expect("anonymous");

    let mine = list_tickets(
        &store,
        &RepairFilter {
            created_by: Some("contoso|abc".to_string()),
            ..RepairFilter::default()
        },
    )
    .expect("list");
    assert_eq!(mine, vec![ticket]);
}

#[test]
fn failed_write_is_reported_and_leaves_nothing_behind() {
    let store = FailingStore {
        inner: MemoryStore::new(),
    };
    let ctx = caller(Some("T1"), None);
    let err = create_ticket(&store, NewRepair::new("Phone", "Cracked"), &ctx).expect_err("fails");

    assert!(matches!(err, RepairError::WriteFailed(_)));
    assert_eq!(err.code(), ErrorCode::StoreWriteFailed);
    assert!(err.to_string().contains("disk full"));
    let listed = list_tickets(&store, &RepairFilter::default()).expect("list");
    assert!(listed.is_empty());
}

#[test]
fn status_and_assignee_are_preserved() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let ticket = create_ticket(
        &store,
        NewRepair::new("Monitor", "Dead pixels")
            .with_status("In Progress")
            .with_assignee("Jane Doe"),
        &CallerContext::anonymous(),
    )
    .expect("create");

    let stored = get_ticket(&store, &ticket.id).expect("get");
    assert_eq!(stored.status, "In Progress");
    assert_eq!(stored.assigned_to.as_deref(), Some("Jane Doe"));
}
