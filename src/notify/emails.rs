//! Email bodies. HTML comes from the askama templates under
//! `templates/email/`; the plain-text alternative is built inline.

use askama::Template;
use uuid::Uuid;

use super::{Email, NotifyError};
use crate::models::decision::{DecisionStatus, Vote};

/// The decision an email is about.
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    pub title: &'a str,
    pub link: String,
}

impl<'a> Subject<'a> {
    pub fn new(site_url: &str, decision_id: Uuid, title: &'a str) -> Self {
        Subject {
            title,
            link: format!("{}/decisions/{decision_id}", site_url.trim_end_matches('/')),
        }
    }
}

#[derive(Template)]
#[template(path = "email/approval_request.html")]
struct ApprovalRequest<'a> {
    owner: &'a str,
    title: &'a str,
    summary: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/approver_added.html")]
struct ApproverAdded<'a> {
    title: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/approver_removed.html")]
struct ApproverRemoved<'a> {
    title: &'a str,
}

#[derive(Template)]
#[template(path = "email/vote_cast.html")]
struct VoteCast<'a> {
    voter: &'a str,
    verb: &'a str,
    title: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/final_status.html")]
struct FinalStatus<'a> {
    status: &'a str,
    title: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/comment.html")]
struct NewComment<'a> {
    author: &'a str,
    title: &'a str,
    body: &'a str,
    link: &'a str,
}

pub fn approval_request(to: &str, d: &Subject<'_>, owner: &str, summary: &str) -> Result<Email, NotifyError> {
    let html = ApprovalRequest {
        owner,
        title: d.title,
        summary,
        link: &d.link,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: format!("Approval requested: {}", d.title),
        html,
        text: format!("{owner} asked for your approval: {}\n\n{summary}\n\n{}", d.title, d.link),
    })
}

pub fn approver_added(to: &str, d: &Subject<'_>) -> Result<Email, NotifyError> {
    let html = ApproverAdded {
        title: d.title,
        link: &d.link,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: format!("You've been added as an approver: {}", d.title),
        html,
        text: format!("You've been added as an approver: {}\n{}", d.title, d.link),
    })
}

pub fn approver_removed(to: &str, d: &Subject<'_>) -> Result<Email, NotifyError> {
    let html = ApproverRemoved { title: d.title }.render()?;
    Ok(Email {
        to: to.to_string(),
        subject: format!("You've been removed as an approver: {}", d.title),
        html,
        text: format!("You've been removed as an approver: {}", d.title),
    })
}

pub fn vote_cast(to: &str, d: &Subject<'_>, voter: &str, vote: Vote) -> Result<Email, NotifyError> {
    let verb = match vote {
        Vote::Approve => "approved",
        Vote::Reject => "rejected",
    };
    let html = VoteCast {
        voter,
        verb,
        title: d.title,
        link: &d.link,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: format!("{voter} {verb}: {}", d.title),
        html,
        text: format!("{voter} {verb} the decision: {}\n{}", d.title, d.link),
    })
}

pub fn final_status(to: &str, d: &Subject<'_>, status: DecisionStatus) -> Result<Email, NotifyError> {
    let html = FinalStatus {
        status: status.as_str(),
        title: d.title,
        link: &d.link,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: format!("Decision {}: {}", status.as_str(), d.title),
        html,
        text: format!("The decision is now {}: {}\n{}", status.as_str(), d.title, d.link),
    })
}

pub fn new_comment(to: &str, d: &Subject<'_>, author: &str, body: &str) -> Result<Email, NotifyError> {
    let html = NewComment {
        author,
        title: d.title,
        body,
        link: &d.link,
    }
    .render()?;
    Ok(Email {
        to: to.to_string(),
        subject: format!("New comment on {}", d.title),
        html,
        text: format!("{author} commented on {}:\n\n{body}\n\n{}", d.title, d.link),
    })
}
