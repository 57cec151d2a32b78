#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use issue_store::{Iri, IssueRecord, IssueStatus, OboId, ProjectId, TrackerRef};

/// Base time for test fixtures. Fixed to keep records deterministic and
/// whole-second so RFC 3339 storage round-trips exactly.
fn base_time() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_735_689_600, 0).unwrap() // 2025-01-01 00:00:00 UTC
}

pub fn record(id: &str, project: &str) -> IssueRecord {
    let base = base_time();
    IssueRecord {
        id: id.to_string(),
        project_id: ProjectId::new(project),
        iris: std::collections::BTreeSet::new(),
        obo_ids: std::collections::BTreeSet::new(),
        title: format!("Issue {id}"),
        body: None,
        status: IssueStatus::Open,
        tracker: None,
        created_at: base,
        updated_at: base + Duration::seconds(1),
    }
}

pub struct RecordBuilder {
    record: IssueRecord,
}

impl RecordBuilder {
    pub fn new(id: &str, project: &str) -> Self {
        Self {
            record: record(id, project),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.record.title = title.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.record.body = Some(body.to_string());
        self
    }

    pub fn status(mut self, status: IssueStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn iri(mut self, iri: &str) -> Self {
        self.record.iris.insert(Iri::new(iri));
        self
    }

    pub fn obo(mut self, obo_id: &str) -> Self {
        self.record.obo_ids.insert(OboId::new(obo_id));
        self
    }

    pub fn tracker(mut self, system: &str, number: i64) -> Self {
        self.record.tracker = Some(TrackerRef {
            system: system.to_string(),
            number: Some(number),
            url: None,
        });
        self
    }

    pub fn build(self) -> IssueRecord {
        self.record
    }
}
