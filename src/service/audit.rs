use serde_json::Value;

use crate::{
    auth::context::RequestContext,
    error::AppResult,
    model::audit_log::{AuditAction, AuditLogEntry, NewAuditLog},
    store::Store,
};

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 500;

/// One sensitive action, before the actor and request metadata are attached.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<u64>,
    pub details: Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, details: Value) -> Self {
        Self {
            action,
            entity_type: None,
            entity_id: None,
            details,
        }
    }

    pub fn entity(mut self, entity_type: &'static str, entity_id: Option<u64>) -> Self {
        self.entity_type = Some(entity_type);
        self.entity_id = entity_id;
        self
    }
}

/// Appends one audit entry. Failures are logged and dropped so the action
/// being audited still answers normally.
pub async fn record<S: Store>(store: &S, ctx: &RequestContext, event: AuditEvent) {
    let entry = NewAuditLog {
        user_id: ctx.actor_id,
        action: event.action.to_string(),
        entity_type: event.entity_type.map(str::to_string),
        entity_id: event.entity_id,
        details: event.details,
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
    };

    if let Err(e) = store.insert_audit_log(&entry).await {
        tracing::error!(
            error = %e,
            actor_id = ctx.actor_id,
            action = %entry.action,
            "Failed to write audit log"
        );
    }
}

/// Newest-first audit entries, optionally for one user.
pub async fn recent<S: Store>(
    store: &S,
    user_id: Option<u64>,
    limit: Option<u32>,
) -> AppResult<Vec<AuditLogEntry>> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Ok(store.audit_logs(user_id, limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::context::fixtures::staff, store::memory::MemoryStore};
    use serde_json::json;

    #[actix_web::test]
    async fn records_actor_and_request_metadata() {
        let store = MemoryStore::new();
        let ctx = staff(1);

        record(
            &store,
            &ctx,
            AuditEvent::new(AuditAction::StudentLookup, json!({"admissionNumber": "A1"}))
                .entity("student", Some(9)),
        )
        .await;

        let rows = store.audit_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "student_lookup");
        assert_eq!(rows[0].entity_type.as_deref(), Some("student"));
        assert_eq!(rows[0].entity_id, Some(9));
        assert_eq!(rows[0].ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(rows[0].details.0["admissionNumber"], "A1");
    }

    #[actix_web::test]
    async fn write_failures_are_swallowed() {
        let store = MemoryStore::new();
        store.fail_audit_writes();

        record(
            &store,
            &staff(1),
            AuditEvent::new(AuditAction::DataExport, json!({})),
        )
        .await;

        assert!(store.audit_rows().is_empty());
    }

    #[actix_web::test]
    async fn listing_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        let ctx = staff(1);
        for n in 0..5 {
            record(
                &store,
                &ctx,
                AuditEvent::new(AuditAction::MarksUpload, json!({ "n": n })),
            )
            .await;
        }

        let rows = recent(&store, None, Some(2)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].details.0["n"], 4);

        assert_eq!(recent(&store, Some(42), None).await.unwrap().len(), 0);
        assert_eq!(recent(&store, None, Some(0)).await.unwrap().len(), 1);
    }
}
