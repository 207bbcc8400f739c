use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::parse_column;
use crate::audit::{Event, EventKind, NewEvent};
use crate::models::comment::Comment;
use crate::models::decision::{
    Assignment, AssignmentStatus, Decision, DecisionPage, DecisionQuery, DecisionStatus, StatusFilter,
};
use crate::models::link::{Link, LinkInput};
use crate::store::{EditApplied, EditWrite, NewDecision, Settled, StatusRule, StoreError, VoteApplied, VoteWrite};

const DECISION_COLUMNS: &str =
    "d.id, d.workspace_id, d.title, d.summary, d.context, d.status, d.owner_user_id, d.created_at, d.updated_at";

#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: Uuid,
    workspace_id: Uuid,
    title: String,
    summary: String,
    context: String,
    status: String,
    owner_user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DecisionRow {
    fn into_decision(self) -> Result<Decision, StoreError> {
        Ok(Decision {
            id: self.id,
            workspace_id: self.workspace_id,
            title: self.title,
            summary: self.summary,
            context: self.context,
            status: parse_column(&self.status, "decisions")?,
            owner_user_id: self.owner_user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub async fn find_decision(pool: &PgPool, id: Uuid) -> Result<Option<Decision>, StoreError> {
    let row = sqlx::query_as::<_, DecisionRow>(&format!(
        "SELECT {DECISION_COLUMNS} FROM decisions d WHERE d.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(DecisionRow::into_decision).transpose()
}

/// Escape `%`, `_` and `\` so user input matches literally under ILIKE.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &DecisionQuery) {
    qb.push(" WHERE d.workspace_id = ").push_bind(query.workspace_id);

    if let Some(user) = query.visible_to {
        qb.push(" AND (d.owner_user_id = ")
            .push_bind(user)
            .push(" OR EXISTS (SELECT 1 FROM decision_approvers a WHERE a.decision_id = d.id AND a.approver_user_id = ")
            .push_bind(user)
            .push("))");
    }
    if let Some(user) = query.assigned_to {
        qb.push(" AND EXISTS (SELECT 1 FROM decision_approvers a WHERE a.decision_id = d.id AND a.approver_user_id = ")
            .push_bind(user)
            .push(")");
    }
    if let StatusFilter::Only(status) = query.status {
        qb.push(" AND d.status = ").push_bind(status.as_str());
    }

    let needle = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(needle) = needle {
        let pattern = like_pattern(needle);
        qb.push(" AND (d.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.summary ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.context ILIKE ")
            .push_bind(pattern.clone())
            .push(
                " OR EXISTS (SELECT 1 FROM workspace_members m \
                   WHERE m.workspace_id = d.workspace_id \
                     AND (m.user_id = d.owner_user_id OR m.user_id IN \
                          (SELECT a.approver_user_id FROM decision_approvers a WHERE a.decision_id = d.id)) \
                     AND (m.member_name ILIKE ",
            )
            .push_bind(pattern.clone())
            .push(" OR m.member_email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR m.member_title ILIKE ")
            .push_bind(pattern.clone())
            .push(")) OR EXISTS (SELECT 1 FROM decision_links l WHERE l.decision_id = d.id AND (l.label ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.url ILIKE ")
            .push_bind(pattern)
            .push(")))");
    }
}

pub async fn list_decisions(pool: &PgPool, query: &DecisionQuery) -> Result<DecisionPage, StoreError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM decisions d");
    push_filters(&mut count, query);
    let (total_count,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    let mut data = QueryBuilder::<Postgres>::new(format!("SELECT {DECISION_COLUMNS} FROM decisions d"));
    push_filters(&mut data, query);
    data.push(" ORDER BY d.created_at DESC, d.id LIMIT ")
        .push_bind(query.per_page)
        .push(" OFFSET ")
        .push_bind(query.offset());
    let rows: Vec<DecisionRow> = data.build_query_as().fetch_all(pool).await?;

    let decisions = rows
        .into_iter()
        .map(DecisionRow::into_decision)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DecisionPage::new(decisions, query.page.max(1), query.per_page, total_count))
}

async fn fetch_assignments<'e, E>(executor: E, decision_id: Uuid) -> Result<Vec<Assignment>, StoreError>
where
    E: PgExecutor<'e>,
{
    #[derive(sqlx::FromRow)]
    struct Row {
        id: Uuid,
        decision_id: Uuid,
        approver_user_id: Uuid,
        status: String,
        decided_at: Option<DateTime<Utc>>,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT id, decision_id, approver_user_id, status, decided_at \
         FROM decision_approvers WHERE decision_id = $1 ORDER BY created_at, id",
    )
    .bind(decision_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(Assignment {
                id: r.id,
                decision_id: r.decision_id,
                approver_user_id: r.approver_user_id,
                status: parse_column(&r.status, "decision_approvers")?,
                decided_at: r.decided_at,
            })
        })
        .collect()
}

pub async fn list_assignments(pool: &PgPool, decision_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
    fetch_assignments(pool, decision_id).await
}

pub async fn list_links(pool: &PgPool, decision_id: Uuid) -> Result<Vec<Link>, StoreError> {
    let rows: Vec<(Uuid, Uuid, String, String)> = sqlx::query_as(
        "SELECT id, decision_id, label, url FROM decision_links \
         WHERE decision_id = $1 ORDER BY created_at, id",
    )
    .bind(decision_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, decision_id, label, url)| Link { id, decision_id, label, url })
        .collect())
}

pub async fn list_events(pool: &PgPool, decision_id: Uuid) -> Result<Vec<Event>, StoreError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: Uuid,
        seq: i64,
        decision_id: Uuid,
        event_type: String,
        actor_user_id: Option<Uuid>,
        metadata_json: Value,
        created_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT id, seq, decision_id, type AS event_type, actor_user_id, metadata_json, created_at \
         FROM decision_events WHERE decision_id = $1 ORDER BY created_at, seq",
    )
    .bind(decision_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let kind = EventKind::from_parts(&r.event_type, r.metadata_json).map_err(StoreError::Corrupt)?;
            Ok(Event {
                id: r.id,
                seq: r.seq,
                decision_id: r.decision_id,
                kind,
                actor_user_id: r.actor_user_id,
                created_at: r.created_at,
            })
        })
        .collect()
}

pub async fn list_comments(pool: &PgPool, decision_id: Uuid) -> Result<Vec<Comment>, StoreError> {
    let rows: Vec<(Uuid, Uuid, Uuid, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, decision_id, user_id, body, created_at FROM decision_comments \
         WHERE decision_id = $1 ORDER BY created_at, id",
    )
    .bind(decision_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, decision_id, user_id, body, created_at)| Comment {
            id,
            decision_id,
            user_id,
            body,
            created_at,
        })
        .collect())
}

// --- writes ---

async fn append_events(conn: &mut PgConnection, events: &[NewEvent]) -> Result<(), StoreError> {
    for e in events {
        sqlx::query(
            "INSERT INTO decision_events (id, decision_id, type, actor_user_id, metadata_json, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(e.id)
        .bind(e.decision_id)
        .bind(e.kind.type_name())
        .bind(e.actor_user_id)
        .bind(e.kind.metadata())
        .bind(e.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_approvers(conn: &mut PgConnection, decision_id: Uuid, approvers: &[Uuid]) -> Result<(), StoreError> {
    for approver in approvers {
        sqlx::query(
            "INSERT INTO decision_approvers (id, decision_id, approver_user_id, status) \
             VALUES ($1, $2, $3, 'pending')",
        )
        .bind(Uuid::new_v4())
        .bind(decision_id)
        .bind(approver)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_links(conn: &mut PgConnection, decision_id: Uuid, links: &[LinkInput]) -> Result<(), StoreError> {
    for link in links {
        sqlx::query("INSERT INTO decision_links (id, decision_id, label, url) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(decision_id)
            .bind(&link.label)
            .bind(&link.url)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Lock the decision row for the rest of the transaction and return its status.
async fn lock_status(conn: &mut PgConnection, decision_id: Uuid) -> Result<Option<DecisionStatus>, StoreError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM decisions WHERE id = $1 FOR UPDATE")
        .bind(decision_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|(s,)| parse_column(&s, "decisions")).transpose()
}

/// Fold the assignments visible to this transaction and persist a terminal
/// result. The caller already holds the decision row lock.
async fn settle(
    conn: &mut PgConnection,
    decision_id: Uuid,
    rule: StatusRule,
    at: DateTime<Utc>,
) -> Result<Settled, StoreError> {
    let assignments = fetch_assignments(&mut *conn, decision_id).await?;
    let statuses: Vec<AssignmentStatus> = assignments.iter().map(|a| a.status).collect();
    let folded = rule(&statuses);
    if folded == DecisionStatus::Pending {
        return Ok(Settled {
            assignments,
            status: DecisionStatus::Pending,
            finalized: false,
        });
    }

    let result = sqlx::query(
        "UPDATE decisions SET status = $2, updated_at = $3 WHERE id = $1 AND status = 'pending'",
    )
    .bind(decision_id)
    .bind(folded.as_str())
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(Settled {
        assignments,
        status: folded,
        finalized: result.rows_affected() > 0,
    })
}

pub async fn create_decision(pool: &PgPool, new: &NewDecision) -> Result<(), StoreError> {
    let d = &new.decision;
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO decisions \
             (id, workspace_id, title, summary, context, status, owner_user_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(d.id)
    .bind(d.workspace_id)
    .bind(&d.title)
    .bind(&d.summary)
    .bind(&d.context)
    .bind(d.status.as_str())
    .bind(d.owner_user_id)
    .bind(d.created_at)
    .bind(d.updated_at)
    .execute(&mut *tx)
    .await?;
    insert_approvers(&mut tx, d.id, &new.approvers).await?;
    insert_links(&mut tx, d.id, &new.links).await?;
    append_events(&mut tx, std::slice::from_ref(&new.event)).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn apply_edit(pool: &PgPool, edit: &EditWrite) -> Result<EditApplied, StoreError> {
    let mut tx = pool.begin().await?;
    match lock_status(&mut tx, edit.decision_id).await? {
        None => return Ok(EditApplied::NotFound),
        Some(status) if status != DecisionStatus::Pending => return Ok(EditApplied::NotPending(status)),
        Some(_) => {}
    }

    if !edit.remove_approvers.is_empty() {
        sqlx::query("DELETE FROM decision_approvers WHERE decision_id = $1 AND approver_user_id = ANY($2)")
            .bind(edit.decision_id)
            .bind(&edit.remove_approvers)
            .execute(&mut *tx)
            .await?;
    }
    insert_approvers(&mut tx, edit.decision_id, &edit.add_approvers).await?;

    if !edit.links.delete.is_empty() {
        sqlx::query("DELETE FROM decision_links WHERE decision_id = $1 AND url = ANY($2)")
            .bind(edit.decision_id)
            .bind(&edit.links.delete)
            .execute(&mut *tx)
            .await?;
    }
    for link in &edit.links.relabel {
        sqlx::query("UPDATE decision_links SET label = $3 WHERE decision_id = $1 AND url = $2")
            .bind(edit.decision_id)
            .bind(&link.url)
            .bind(&link.label)
            .execute(&mut *tx)
            .await?;
    }
    insert_links(&mut tx, edit.decision_id, &edit.links.insert).await?;

    match &edit.fields {
        Some(fields) => {
            sqlx::query(
                "UPDATE decisions SET title = $2, summary = $3, context = $4, updated_at = $5 WHERE id = $1",
            )
            .bind(edit.decision_id)
            .bind(&fields.title)
            .bind(&fields.summary)
            .bind(&fields.context)
            .bind(edit.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query("UPDATE decisions SET updated_at = $2 WHERE id = $1")
                .bind(edit.decision_id)
                .bind(edit.updated_at)
                .execute(&mut *tx)
                .await?;
        }
    }

    append_events(&mut tx, &edit.events).await?;
    let settled = settle(&mut tx, edit.decision_id, edit.settle, edit.updated_at).await?;
    tx.commit().await?;
    Ok(EditApplied::Applied(settled))
}

pub async fn apply_vote(pool: &PgPool, vote: &VoteWrite) -> Result<VoteApplied, StoreError> {
    let mut tx = pool.begin().await?;
    match lock_status(&mut tx, vote.decision_id).await? {
        None => return Ok(VoteApplied::DecisionNotFound),
        Some(status) if status != DecisionStatus::Pending => {
            return Ok(VoteApplied::DecisionNotPending(status));
        }
        Some(_) => {}
    }

    let hit: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE decision_approvers SET status = $3, decided_at = $4 \
         WHERE decision_id = $1 AND approver_user_id = $2 AND status = 'pending' \
         RETURNING id",
    )
    .bind(vote.decision_id)
    .bind(vote.approver_user_id)
    .bind(vote.outcome.as_str())
    .bind(vote.decided_at)
    .fetch_optional(&mut *tx)
    .await?;

    if hit.is_none() {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM decision_approvers WHERE decision_id = $1 AND approver_user_id = $2",
        )
        .bind(vote.decision_id)
        .bind(vote.approver_user_id)
        .fetch_optional(&mut *tx)
        .await?;
        return match row {
            Some((s,)) => Ok(VoteApplied::AlreadyVoted(parse_column::<AssignmentStatus>(
                &s,
                "decision_approvers",
            )?)),
            None => Ok(VoteApplied::NotAssigned),
        };
    }

    append_events(&mut tx, std::slice::from_ref(&vote.event)).await?;
    let settled = settle(&mut tx, vote.decision_id, vote.settle, vote.decided_at).await?;
    tx.commit().await?;
    Ok(VoteApplied::Recorded(settled))
}

pub async fn finalize_status(
    pool: &PgPool,
    decision_id: Uuid,
    status: DecisionStatus,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if status == DecisionStatus::Pending {
        return Ok(false);
    }
    let result = sqlx::query(
        "UPDATE decisions SET status = $2, updated_at = $3 WHERE id = $1 AND status = 'pending'",
    )
    .bind(decision_id)
    .bind(status.as_str())
    .bind(at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_comment(pool: &PgPool, comment: &Comment, event: &NewEvent) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO decision_comments (id, decision_id, user_id, body, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(comment.id)
    .bind(comment.decision_id)
    .bind(comment.user_id)
    .bind(&comment.body)
    .bind(comment.created_at)
    .execute(&mut *tx)
    .await?;
    append_events(&mut tx, std::slice::from_ref(event)).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
